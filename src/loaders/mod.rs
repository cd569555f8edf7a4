//! 各资源格式的加载器适配器
//!
//! 缓存通过 [`crate::loader`] 里的 trait 调用这些实现，不感知具体格式。
//! 新增资源格式只需要实现加载器协议，不动缓存。

pub mod material;
#[cfg(feature = "gltf")]
pub mod mesh;
pub mod program;
pub mod texture;

pub use material::MaterialLibLoader;
#[cfg(feature = "gltf")]
pub use mesh::MeshFSLoader;
pub use program::GpuProgramManualLoader;
pub use texture::{TextureFSLoader, TextureManualLoader};
