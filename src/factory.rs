//! 资源工厂
//!
//! 管理器之上的类型化便捷门面：按资源类型封装加载器的构造和请求调用，
//! 并负责注册内嵌资源。内嵌着色器程序在引擎启动时以手动、常驻形态进入
//! 缓存，合成 GUID 用 `__embed_` 前缀，之后通过工厂直接取用。

use crate::backend::{RenderBackend, TextureCreationParams, TextureData};
use crate::guid::ResourceGuid;
use crate::loader::LoadingMode;
use crate::loaders::program::GpuProgramManualLoader;
use crate::loaders::texture::{TextureFSLoader, TextureManualLoader};
use crate::manager::ResourceManager;
use crate::resource::ResourceHandle;

pub const SIMPLE_LIGHTING_PROGRAM_EMBED_PATH: &str = "__embed_simple_lighting_program";
pub const COLORED_PROGRAM_EMBED_PATH: &str = "__embed_colored_program";

const SIMPLE_LIGHTING_VERTEX_SRC: &str = "\
attribute vec3 a_position;\n\
attribute vec3 a_normal;\n\
attribute vec2 a_uv;\n\
uniform mat4 u_mvp;\n\
varying vec3 v_normal;\n\
varying vec2 v_uv;\n\
void main() {\n\
    v_normal = a_normal;\n\
    v_uv = a_uv;\n\
    gl_Position = u_mvp * vec4(a_position, 1.0);\n\
}\n";

const SIMPLE_LIGHTING_FRAGMENT_SRC: &str = "\
precision mediump float;\n\
uniform sampler2D diffuseMap;\n\
uniform vec3 u_lightDir;\n\
varying vec3 v_normal;\n\
varying vec2 v_uv;\n\
void main() {\n\
    float ndl = max(dot(normalize(v_normal), -u_lightDir), 0.0);\n\
    gl_FragColor = texture2D(diffuseMap, v_uv) * ndl;\n\
}\n";

const COLORED_VERTEX_SRC: &str = "\
attribute vec3 a_position;\n\
uniform mat4 u_mvp;\n\
void main() { gl_Position = u_mvp * vec4(a_position, 1.0); }\n";

const COLORED_FRAGMENT_SRC: &str = "\
precision mediump float;\n\
uniform vec4 u_color;\n\
void main() { gl_FragColor = u_color; }\n";

/// 类型化资源工厂
pub struct ResourceFactory<'a> {
    manager: &'a ResourceManager,
}

impl<'a> ResourceFactory<'a> {
    pub(crate) fn new(manager: &'a ResourceManager) -> Self {
        Self { manager }
    }

    /// 注册内嵌资源，引擎初始化时调用一次
    pub fn load_embed_resources(&self, backend: &mut dyn RenderBackend) {
        let programs = [
            (
                SIMPLE_LIGHTING_PROGRAM_EMBED_PATH,
                SIMPLE_LIGHTING_VERTEX_SRC,
                SIMPLE_LIGHTING_FRAGMENT_SRC,
            ),
            (
                COLORED_PROGRAM_EMBED_PATH,
                COLORED_VERTEX_SRC,
                COLORED_FRAGMENT_SRC,
            ),
        ];

        for (guid, vertex, fragment) in programs {
            let mut loader = GpuProgramManualLoader::new(guid, vertex, fragment);
            match self.manager.request_manual(&mut loader, backend) {
                Some(handle) => handle.set_resident(true),
                None => log::error!("Failed to create embed program '{}'", guid),
            }
        }
    }

    pub fn create_texture(
        &self,
        path: &str,
        params: TextureCreationParams,
        mode: LoadingMode,
        backend: &mut dyn RenderBackend,
    ) -> Option<ResourceHandle> {
        let loader = TextureFSLoader::new(mode)
            .with_params(params)
            .with_file_system(self.manager.file_system().clone());
        self.manager
            .request_from_file_system(path, Box::new(loader), backend)
    }

    /// 像素数据已在内存的手动纹理
    pub fn create_texture_from_pixels(
        &self,
        guid: &str,
        data: TextureData,
        params: TextureCreationParams,
        backend: &mut dyn RenderBackend,
    ) -> Option<ResourceHandle> {
        let mut loader = TextureManualLoader::new(guid, data, params);
        self.manager.request_manual(&mut loader, backend)
    }

    #[cfg(feature = "gltf")]
    pub fn create_mesh(
        &self,
        path: &str,
        material_lib_path: Option<&str>,
        mode: LoadingMode,
        backend: &mut dyn RenderBackend,
    ) -> Option<ResourceHandle> {
        let mut loader = crate::loaders::mesh::MeshFSLoader::new(mode);
        if let Some(lib) = material_lib_path {
            loader = loader.with_material_lib(lib);
        }
        self.manager
            .request_from_file_system(path, Box::new(loader), backend)
    }

    pub fn create_material_lib(
        &self,
        path: &str,
        backend: &mut dyn RenderBackend,
    ) -> Option<ResourceHandle> {
        let loader = crate::loaders::material::MaterialLibLoader::default();
        self.manager
            .request_from_file_system(path, Box::new(loader), backend)
    }

    /// 合成 GUID 注册 GPU 程序；同一 GUID 再次请求直接返回缓存实例
    pub fn create_gpu_program(
        &self,
        guid: &str,
        vertex_src: &str,
        fragment_src: &str,
        backend: &mut dyn RenderBackend,
    ) -> Option<ResourceHandle> {
        if let Some(existing) = self.manager.find(&ResourceGuid::new(guid)) {
            return Some(existing);
        }
        let mut loader = GpuProgramManualLoader::new(guid, vertex_src, fragment_src);
        self.manager.request_manual(&mut loader, backend)
    }

    pub fn simple_lighting_program(&self) -> Option<ResourceHandle> {
        self.manager
            .find(&ResourceGuid::new(SIMPLE_LIGHTING_PROGRAM_EMBED_PATH))
    }

    pub fn colored_program(&self) -> Option<ResourceHandle> {
        self.manager
            .find(&ResourceGuid::new(COLORED_PROGRAM_EMBED_PATH))
    }
}
