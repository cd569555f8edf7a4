//! 网格加载器
//!
//! 解码阶段用 gltf crate 把 glTF/GLB 字节解析成逐子网格的顶点/索引数组，
//! 顺带累出包围盒；终结阶段创建 GPU 缓冲区，并（可选）同步请求关联的
//! 材质库——材质库句柄进入网格载荷，纹理随后异步到达。

use crate::backend::{MeshData, SubMeshData, Vertex};
use crate::datasource::DataSource;
use crate::loader::{FileSystemLoader, FinalizeContext, LoadingMode};
use crate::loaders::material::MaterialLibLoader;
use crate::resource::{MeshResource, Resource, ResourcePayload};

/// 文件系统网格加载器
pub struct MeshFSLoader {
    mode: LoadingMode,
    material_lib_path: Option<String>,
    data: Option<MeshData>,
}

impl MeshFSLoader {
    pub fn new(mode: LoadingMode) -> Self {
        Self {
            mode,
            material_lib_path: None,
            data: None,
        }
    }

    /// 网格终结时同步加载的材质库
    pub fn with_material_lib(mut self, path: impl Into<String>) -> Self {
        self.material_lib_path = Some(path.into());
        self
    }
}

impl FileSystemLoader for MeshFSLoader {
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

        let (doc, buffers, _images) = match gltf::import_slice(&bytes) {
            Ok(loaded) => loaded,
            Err(e) => {
                log::warn!("Failed to parse glTF '{}': {}", source.path(), e);
                return false;
            }
        };

        let mut data = MeshData::default();
        for mesh in doc.meshes() {
            for primitive in mesh.primitives() {
                let reader = primitive.reader(|buf| Some(&buffers[buf.index()]));
                let positions: Vec<[f32; 3]> =
                    reader.read_positions().map(|it| it.collect()).unwrap_or_default();
                if positions.is_empty() {
                    continue;
                }
                let normals: Vec<[f32; 3]> = reader
                    .read_normals()
                    .map(|it| it.collect())
                    .unwrap_or_else(|| vec![[0.0, 1.0, 0.0]; positions.len()]);
                let uvs: Vec<[f32; 2]> = reader
                    .read_tex_coords(0)
                    .map(|tc| tc.into_f32().collect())
                    .unwrap_or_else(|| vec![[0.0, 0.0]; positions.len()]);
                let indices: Vec<u32> = reader
                    .read_indices()
                    .map(|r| r.into_u32().collect())
                    .unwrap_or_else(|| (0..positions.len() as u32).collect());

                let mut vertices = Vec::with_capacity(positions.len());
                for i in 0..positions.len() {
                    data.aabb.extend(positions[i]);
                    vertices.push(Vertex {
                        position: positions[i],
                        normal: normals[i],
                        uv: uvs[i],
                    });
                }

                data.submeshes.push(SubMeshData { vertices, indices });
            }
        }

        if data.submeshes.is_empty() {
            log::warn!("glTF '{}' contains no geometry", source.path());
            return false;
        }

        self.data = Some(data);
        true
    }

    fn on_decoded(&mut self, resource: &Resource, ctx: &mut FinalizeContext<'_>) -> bool {
        let data = match self.data.take() {
            Some(d) => d,
            None => return false,
        };

        let submeshes = match ctx.backend.create_mesh(&data) {
            Some(s) => s,
            None => return false,
        };

        // 递归请求：材质库立即模式加载，丢失时网格照常完成
        let material_lib = self.material_lib_path.as_ref().and_then(|path| {
            ctx.manager.request_from_file_system(
                path,
                Box::new(MaterialLibLoader::default()),
                &mut *ctx.backend,
            )
        });

        resource.set_payload(ResourcePayload::Mesh(MeshResource {
            submeshes,
            aabb: data.aabb,
            material_lib,
        }));
        true
    }
}
