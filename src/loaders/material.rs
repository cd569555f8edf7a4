//! 材质库加载器
//!
//! 材质库是 JSON 文件：材质列表，每个材质给出程序名和采样器声明（名字、
//! 纹理路径、纹理参数）。解码阶段只做解析；终结阶段为每个采样器路径发出
//! 异步纹理请求——这是对管理器的递归调用，只触碰缓存簿记。返回的纹理
//! 句柄保存在材质库载荷里，形成清扫时的传递回收链。

use serde::Deserialize;

use crate::backend::{parse_filtering, parse_wrap_mode, TextureCreationParams};
use crate::datasource::DataSource;
use crate::loader::{FileSystemLoader, FinalizeContext, LoadingMode};
use crate::loaders::texture::TextureFSLoader;
use crate::resource::{MaterialDef, MaterialLibResource, Resource, ResourcePayload, SamplerDef};

#[derive(Deserialize)]
struct RawSampler {
    name: String,
    path: String,
    filtering: Option<String>,
    wrap_mode: Option<String>,
    mipmaps: Option<bool>,
}

#[derive(Deserialize)]
struct RawMaterial {
    name: String,
    program: Option<String>,
    #[serde(default)]
    samplers: Vec<RawSampler>,
}

#[derive(Deserialize)]
struct RawMaterialLib {
    materials: Vec<RawMaterial>,
}

/// 材质库加载器
///
/// 材质库通常以立即模式加载：网格终结时同步拿到材质定义，纹理本身仍然
/// 异步到达。
pub struct MaterialLibLoader {
    mode: LoadingMode,
    defs: Option<Vec<MaterialDef>>,
}

impl MaterialLibLoader {
    pub fn new(mode: LoadingMode) -> Self {
        Self { mode, defs: None }
    }
}

impl Default for MaterialLibLoader {
    fn default() -> Self {
        Self::new(LoadingMode::Immediate)
    }
}

impl FileSystemLoader for MaterialLibLoader {
    fn loading_mode(&self) -> LoadingMode {
        self.mode
    }

    fn decode(&mut self, source: &mut dyn DataSource) -> bool {
        let bytes = match source.read_to_end() {
            Ok(b) => b,
            Err(e) => {
                log::warn!("Failed to read '{}': {}", source.path(), e);
                return false;
            }
        };

        let raw: RawMaterialLib = match serde_json::from_slice(&bytes) {
            Ok(lib) => lib,
            Err(e) => {
                log::warn!("Invalid material lib '{}': {}", source.path(), e);
                return false;
            }
        };

        let context = source.path().to_string();
        let defs = raw
            .materials
            .into_iter()
            .map(|m| MaterialDef {
                name: m.name,
                program: m.program,
                samplers: m
                    .samplers
                    .into_iter()
                    .map(|s| {
                        let mut params = TextureCreationParams::default();
                        if let Some(value) = &s.filtering {
                            params.filtering = parse_filtering(value, &context);
                        }
                        if let Some(value) = &s.wrap_mode {
                            params.wrap_mode = parse_wrap_mode(value, &context);
                        }
                        if let Some(mipmaps) = s.mipmaps {
                            params.mipmaps = mipmaps;
                        }
                        SamplerDef {
                            name: s.name,
                            path: s.path,
                            params,
                        }
                    })
                    .collect(),
            })
            .collect();

        self.defs = Some(defs);
        true
    }

    fn on_decoded(&mut self, resource: &Resource, ctx: &mut FinalizeContext<'_>) -> bool {
        let defs = match self.defs.take() {
            Some(d) => d,
            None => return false,
        };

        let fs = ctx.manager.file_system().clone();
        let mut textures = Vec::new();
        for material in &defs {
            for sampler in &material.samplers {
                let loader = TextureFSLoader::new(LoadingMode::Async)
                    .with_params(sampler.params)
                    .with_file_system(fs.clone());
                // 递归请求：纹理丢失是可恢复错误，材质库本身照常完成
                if let Some(handle) = ctx.manager.request_from_file_system(
                    &sampler.path,
                    Box::new(loader),
                    &mut *ctx.backend,
                ) {
                    textures.push(handle);
                }
            }
        }

        resource.set_payload(ResourcePayload::MaterialLib(MaterialLibResource {
            materials: defs,
            textures,
        }));
        true
    }
}
