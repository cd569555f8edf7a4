//! # game_engine_resources
//!
//! 资源加载与缓存管线：把路径或内存数据变成活的引擎资源（纹理、网格、
//! 材质库、着色器程序），解码重活在后台工作线程执行，GPU 相关工作只在
//! 主线程发生。
//!
//! ## Features
//!
//! - **GUID 缓存**: 规范化路径去重，同一逻辑文件永远是同一个资源实例
//! - **占位先行**: 解码开始前资源就以 dummy 形态注册，并发请求自动折叠
//! - **解码/终结分离**: decode 在工作线程，on_decoded 只在主线程轮询里
//! - **引用计数逐出**: 清扫只回收缓存唯一持有且非常驻的资源，迭代到不动点
//! - **挂起/恢复**: 应用退后台时暂停新解码和终结调用
//!
//! ## 快速开始
//!
//! ```ignore
//! use game_engine_resources::{
//!     LoadingMode, ResourceManager, ResourceManagerConfig, TextureCreationParams,
//! };
//!
//! let manager = ResourceManager::new(ResourceManagerConfig::default());
//! manager.add_search_path("assets");
//!
//! // 引擎初始化时注册内嵌资源
//! manager.factory().load_embed_resources(&mut backend);
//!
//! // 异步请求纹理，立即拿到占位句柄
//! let tex = manager.factory().create_texture(
//!     "wood.png",
//!     TextureCreationParams::default(),
//!     LoadingMode::Async,
//!     &mut backend,
//! );
//!
//! // 每帧在主循环里排空完成队列
//! manager.poll(&mut backend);
//! ```
//!
//! ## 模块
//!
//! - [`manager`]: 资源管理器（缓存、轮询、清扫、挂起/恢复）
//! - [`loader`]: 加载器协议（手动 / 文件系统三阶段）
//! - [`loaders`]: 各格式加载器适配器
//! - [`factory`]: 类型化门面与内嵌资源
//! - [`guid`]: 路径解析与资源标识
//! - [`datasource`]: 抽象字节流
//! - [`backend`]: 渲染后端接口

pub mod backend;
pub mod datasource;
pub mod error;
pub mod factory;
pub mod guid;
pub mod loader;
pub mod loaders;
pub mod manager;
pub mod resource;
mod worker;

pub use backend::{
    Aabb, BufferHandle, MeshData, ProgramHandle, RenderBackend, SubMeshBuffers, SubMeshData,
    TextureCreationParams, TextureData, TextureFiltering, TextureHandle, TextureWrapMode, Vertex,
};
pub use error::{ResourceError, ResourceResult};
pub use factory::ResourceFactory;
pub use guid::{ResourceFileSystem, ResourceGuid};
pub use loader::{FileSystemLoader, FinalizeContext, LoadingMode, ManualLoader};
pub use manager::{
    CacheStats, ResourceListener, ResourceManager, ResourceManagerConfig,
};
pub use resource::{
    GpuProgramResource, MaterialDef, MaterialLibResource, MeshResource, Resource, ResourceHandle,
    ResourcePayload, SamplerDef, TextureResource,
};
pub use worker::WorkerStats;

#[cfg(test)]
mod tests;
