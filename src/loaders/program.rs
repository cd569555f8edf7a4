//! GPU 程序加载器
//!
//! 程序只有手动形态：着色器源码已在内存（内嵌程序或上层拼好的源码），
//! GUID 由调用方合成。编译发生在 `load()` 里，调用线程即主线程。

use crate::backend::RenderBackend;
use crate::guid::ResourceGuid;
use crate::loader::ManualLoader;
use crate::resource::{GpuProgramResource, Resource, ResourcePayload};

/// 手动 GPU 程序加载器
pub struct GpuProgramManualLoader {
    guid: ResourceGuid,
    vertex_src: String,
    fragment_src: String,
}

impl GpuProgramManualLoader {
    pub fn new(
        guid: impl Into<String>,
        vertex_src: impl Into<String>,
        fragment_src: impl Into<String>,
    ) -> Self {
        Self {
            guid: ResourceGuid::new(guid),
            vertex_src: vertex_src.into(),
            fragment_src: fragment_src.into(),
        }
    }
}

impl ManualLoader for GpuProgramManualLoader {
    fn load(&mut self, backend: &mut dyn RenderBackend) -> Option<Resource> {
        let handle = match backend.create_gpu_program(&self.vertex_src, &self.fragment_src) {
            Some(h) => h,
            None => {
                log::warn!("Failed to create GPU program '{}'", self.guid);
                return None;
            }
        };

        Some(Resource::with_payload(
            self.guid.clone(),
            ResourcePayload::GpuProgram(GpuProgramResource { handle }),
        ))
    }
}
