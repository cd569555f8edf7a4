//! 资源对象
//!
//! 缓存和所有持有者共享同一个 `Arc<Resource>`。资源在请求时以占位
//! （dummy）形态注册进缓存，payload 为空、`initialized` 为假；解码完成、
//! 终结阶段成功后原地写入 payload 并置位 `initialized`。终结失败的资源
//! 永远停留在未初始化状态，不会自动重试。被逐出缓存的资源不会复活——
//! 再次请求会得到全新的实例。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::backend::{
    Aabb, ProgramHandle, SubMeshBuffers, TextureCreationParams, TextureHandle,
};
use crate::guid::ResourceGuid;

/// 共享资源句柄
pub type ResourceHandle = Arc<Resource>;

/// GPU 侧纹理资源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureResource {
    pub handle: TextureHandle,
    pub width: u32,
    pub height: u32,
}

/// GPU 侧网格资源
///
/// 可选持有材质库句柄，是清扫阶段传递回收（网格→材质库→纹理）的引用链。
#[derive(Debug, Clone)]
pub struct MeshResource {
    pub submeshes: Vec<SubMeshBuffers>,
    pub aabb: Aabb,
    pub material_lib: Option<ResourceHandle>,
}

/// 材质库里一个采样器的声明
#[derive(Debug, Clone)]
pub struct SamplerDef {
    pub name: String,
    pub path: String,
    pub params: TextureCreationParams,
}

/// 一个材质的定义
#[derive(Debug, Clone)]
pub struct MaterialDef {
    pub name: String,
    pub program: Option<String>,
    pub samplers: Vec<SamplerDef>,
}

/// 材质库资源
///
/// 终结阶段为每个采样器发出异步纹理请求，句柄保存在这里。
#[derive(Debug, Clone, Default)]
pub struct MaterialLibResource {
    pub materials: Vec<MaterialDef>,
    pub textures: Vec<ResourceHandle>,
}

/// GPU 程序资源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuProgramResource {
    pub handle: ProgramHandle,
}

/// 格式相关的资源载荷
#[derive(Debug, Clone, Default)]
pub enum ResourcePayload {
    /// 占位状态，解码尚未完成（或永远失败）
    #[default]
    Empty,
    Texture(TextureResource),
    Mesh(MeshResource),
    MaterialLib(MaterialLibResource),
    GpuProgram(GpuProgramResource),
}

/// 引擎侧资源对象
#[derive(Debug)]
pub struct Resource {
    guid: ResourceGuid,
    initialized: AtomicBool,
    resident: AtomicBool,
    payload: RwLock<ResourcePayload>,
}

impl Resource {
    /// 创建占位资源
    pub fn dummy(guid: ResourceGuid) -> Self {
        Self {
            guid,
            initialized: AtomicBool::new(false),
            resident: AtomicBool::new(false),
            payload: RwLock::new(ResourcePayload::Empty),
        }
    }

    /// 创建已有载荷的资源（手动加载器用）
    pub fn with_payload(guid: ResourceGuid, payload: ResourcePayload) -> Self {
        Self {
            guid,
            initialized: AtomicBool::new(false),
            resident: AtomicBool::new(false),
            payload: RwLock::new(payload),
        }
    }

    pub fn guid(&self) -> &ResourceGuid {
        &self.guid
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// 只由管线在终结成功后调用一次
    pub(crate) fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::Release);
    }

    pub fn is_resident(&self) -> bool {
        self.resident.load(Ordering::Acquire)
    }

    /// 常驻资源不参与任何清扫
    pub fn set_resident(&self, resident: bool) {
        self.resident.store(resident, Ordering::Release);
    }

    /// 原地替换载荷（终结阶段用）
    pub(crate) fn set_payload(&self, payload: ResourcePayload) {
        *self.payload.write().unwrap() = payload;
    }

    pub fn texture(&self) -> Option<TextureResource> {
        match &*self.payload.read().unwrap() {
            ResourcePayload::Texture(t) => Some(*t),
            _ => None,
        }
    }

    pub fn mesh(&self) -> Option<MeshResource> {
        match &*self.payload.read().unwrap() {
            ResourcePayload::Mesh(m) => Some(m.clone()),
            _ => None,
        }
    }

    pub fn material_lib(&self) -> Option<MaterialLibResource> {
        match &*self.payload.read().unwrap() {
            ResourcePayload::MaterialLib(m) => Some(m.clone()),
            _ => None,
        }
    }

    pub fn gpu_program(&self) -> Option<GpuProgramResource> {
        match &*self.payload.read().unwrap() {
            ResourcePayload::GpuProgram(p) => Some(*p),
            _ => None,
        }
    }
}
