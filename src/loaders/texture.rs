//! 纹理加载器
//!
//! 请求的文件要么是图像本体（png/jpeg/webp），要么是 JSON 描述文件——
//! 描述文件给出图像 `path` 和 `filtering` / `wrap_mode` / `mipmaps` 标志，
//! 解码阶段通过解析器打开二级文件。两种形态都解码成 RGBA8，终结阶段交给
//! 后端创建 GPU 纹理。

use std::sync::Arc;

use serde::Deserialize;

use crate::backend::{
    parse_filtering, parse_wrap_mode, RenderBackend, TextureCreationParams, TextureData,
};
use crate::datasource::DataSource;
use crate::guid::{ResourceFileSystem, ResourceGuid};
use crate::loader::{FileSystemLoader, FinalizeContext, LoadingMode, ManualLoader};
use crate::resource::{Resource, ResourcePayload, TextureResource};

#[derive(Deserialize)]
struct TextureDescriptor {
    path: String,
    filtering: Option<String>,
    wrap_mode: Option<String>,
    mipmaps: Option<bool>,
}

/// 文件系统纹理加载器
pub struct TextureFSLoader {
    mode: LoadingMode,
    params: TextureCreationParams,
    // 描述文件引用二级图像文件时用它解析
    fs: Option<Arc<ResourceFileSystem>>,
    data: Option<TextureData>,
}

impl TextureFSLoader {
    pub fn new(mode: LoadingMode) -> Self {
        Self {
            mode,
            params: TextureCreationParams::default(),
            fs: None,
            data: None,
        }
    }

    pub fn with_params(mut self, params: TextureCreationParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_file_system(mut self, fs: Arc<ResourceFileSystem>) -> Self {
        self.fs = Some(fs);
        self
    }

    // 解析描述文件：合并参数标志，读出被引用图像的字节
    fn read_descriptor(&mut self, bytes: &[u8], context: &str) -> Option<Vec<u8>> {
        let desc: TextureDescriptor = match serde_json::from_slice(bytes) {
            Ok(d) => d,
            Err(e) => {
                log::warn!("Invalid texture descriptor '{}': {}", context, e);
                return None;
            }
        };

        if let Some(value) = &desc.filtering {
            self.params.filtering = parse_filtering(value, context);
        }
        if let Some(value) = &desc.wrap_mode {
            self.params.wrap_mode = parse_wrap_mode(value, context);
        }
        if let Some(mipmaps) = desc.mipmaps {
            self.params.mipmaps = mipmaps;
        }

        let fs = match &self.fs {
            Some(fs) => fs,
            None => {
                log::warn!(
                    "Texture descriptor '{}' references '{}' but no file system is attached",
                    context,
                    desc.path
                );
                return None;
            }
        };

        let guid = fs.resolve(&desc.path);
        if !guid.is_valid() {
            log::warn!(
                "Texture descriptor '{}' references missing image '{}'",
                context,
                desc.path
            );
            return None;
        }

        let mut image_source = match fs.open(&guid) {
            Ok(src) => src,
            Err(e) => {
                log::warn!("Failed to open image '{}': {}", desc.path, e);
                return None;
            }
        };
        match image_source.read_to_end() {
            Ok(b) => Some(b),
            Err(e) => {
                log::warn!("Failed to read image '{}': {}", desc.path, e);
                None
            }
        }
    }
}

impl FileSystemLoader for TextureFSLoader {
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

        // JSON 描述文件以 '{' 开头，其余按图像字节处理
        let image_bytes = if bytes.first() == Some(&b'{') {
            match self.read_descriptor(&bytes, source.path()) {
                Some(b) => b,
                None => return false,
            }
        } else {
            bytes
        };

        match image::load_from_memory(&image_bytes) {
            Ok(img) => {
                let rgba = img.to_rgba8();
                let (width, height) = rgba.dimensions();
                self.data = Some(TextureData {
                    width,
                    height,
                    pixels: rgba.into_raw(),
                });
                true
            }
            Err(e) => {
                log::warn!("Failed to decode image '{}': {}", source.path(), e);
                false
            }
        }
    }

    fn on_decoded(&mut self, resource: &Resource, ctx: &mut FinalizeContext<'_>) -> bool {
        // 载荷移出加载器，成功失败都在本次调用内释放
        let data = match self.data.take() {
            Some(d) => d,
            None => return false,
        };

        let handle = match ctx.backend.create_texture(&data, &self.params) {
            Some(h) => h,
            None => return false,
        };

        resource.set_payload(ResourcePayload::Texture(TextureResource {
            handle,
            width: data.width,
            height: data.height,
        }));
        true
    }
}

/// 手动纹理加载器：像素数据已在内存
pub struct TextureManualLoader {
    guid: ResourceGuid,
    params: TextureCreationParams,
    data: Option<TextureData>,
}

impl TextureManualLoader {
    pub fn new(guid: impl Into<String>, data: TextureData, params: TextureCreationParams) -> Self {
        Self {
            guid: ResourceGuid::new(guid),
            params,
            data: Some(data),
        }
    }
}

impl ManualLoader for TextureManualLoader {
    fn load(&mut self, backend: &mut dyn RenderBackend) -> Option<Resource> {
        let data = self.data.take()?;
        let handle = match backend.create_texture(&data, &self.params) {
            Some(h) => h,
            None => {
                log::warn!("Failed to create manual texture '{}'", self.guid);
                return None;
            }
        };

        Some(Resource::with_payload(
            self.guid.clone(),
            ResourcePayload::Texture(TextureResource {
                handle,
                width: data.width,
                height: data.height,
            }),
        ))
    }
}
