//! 渲染后端接口
//!
//! 资源管线不直接接触 GPU API：所有 GPU 侧创建工作都通过 `RenderBackend`
//! trait 完成，由渲染器实现并在主循环里以 `&mut` 传入 `poll()` 和立即模式
//! 加载。后端引用只在主线程出现，这就是终结阶段主线程亲和性的来源。

/// GPU 纹理句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

/// GPU 缓冲区句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

/// GPU 着色器程序句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u64);

/// 纹理过滤方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureFiltering {
    Nearest,
    Bilinear,
    #[default]
    Trilinear,
}

/// 纹理环绕方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureWrapMode {
    #[default]
    Wrap,
    Clamp,
}

/// 纹理创建参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureCreationParams {
    pub filtering: TextureFiltering,
    pub wrap_mode: TextureWrapMode,
    pub mipmaps: bool,
}

impl Default for TextureCreationParams {
    fn default() -> Self {
        Self {
            filtering: TextureFiltering::default(),
            wrap_mode: TextureWrapMode::default(),
            mipmaps: true,
        }
    }
}

// 未知取值回退默认并告警，材质库和纹理描述文件共用
pub(crate) fn parse_filtering(value: &str, context: &str) -> TextureFiltering {
    match value {
        "NEAREST" => TextureFiltering::Nearest,
        "BILINEAR" => TextureFiltering::Bilinear,
        "TRILINEAR" => TextureFiltering::Trilinear,
        other => {
            log::warn!(
                "Invalid filtering value '{}' in {}. Accepted values are: NEAREST, BILINEAR, TRILINEAR",
                other,
                context
            );
            TextureFiltering::default()
        }
    }
}

pub(crate) fn parse_wrap_mode(value: &str, context: &str) -> TextureWrapMode {
    match value {
        "WRAP" => TextureWrapMode::Wrap,
        "CLAMP" => TextureWrapMode::Clamp,
        other => {
            log::warn!(
                "Invalid wrap_mode value '{}' in {}. Accepted values are: WRAP, CLAMP",
                other,
                context
            );
            TextureWrapMode::default()
        }
    }
}

/// 解码后的 CPU 侧纹理数据（RGBA8）
#[derive(Debug, Clone)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// 网格顶点：位置 + 法线 + UV
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// 单个子网格的 CPU 侧几何数据
#[derive(Debug, Clone, Default)]
pub struct SubMeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

/// 轴对齐包围盒
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Default for Aabb {
    fn default() -> Self {
        Self {
            min: [f32::MAX; 3],
            max: [f32::MIN; 3],
        }
    }
}

impl Aabb {
    pub fn extend(&mut self, p: [f32; 3]) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(p[i]);
            self.max[i] = self.max[i].max(p[i]);
        }
    }
}

/// 解码后的 CPU 侧网格数据
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub submeshes: Vec<SubMeshData>,
    pub aabb: Aabb,
}

/// 子网格对应的 GPU 缓冲区
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubMeshBuffers {
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub index_count: u32,
}

/// 渲染后端
///
/// 创建失败返回 `None`，由管线记录为终结失败；不跨线程传播。
pub trait RenderBackend {
    fn create_texture(
        &mut self,
        data: &TextureData,
        params: &TextureCreationParams,
    ) -> Option<TextureHandle>;

    fn create_mesh(&mut self, data: &MeshData) -> Option<Vec<SubMeshBuffers>>;

    fn create_gpu_program(
        &mut self,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Option<ProgramHandle>;
}
