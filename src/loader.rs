//! 加载器抽象
//!
//! 两种加载器形态：
//!
//! - **手动加载器**：数据已在内存里，`load()` 一次调用同步产出完成态资源，
//!   在调用线程（主线程）执行，允许访问后端。
//! - **文件系统加载器**：三阶段协议。`create_dummy` 在主线程便宜地造出
//!   占位资源；`decode` 是重活，在工作线程执行，禁止接触后端和其他主线程
//!   独占状态；`on_decoded` 只在主线程的轮询里执行，把解码产物交给后端，
//!   无论成败都释放 CPU 侧载荷。
//!
//! 加载器是一次性对象：每个请求一个实例，终结（或失败）之后随请求一起
//! 销毁，解码产物的生命周期不会超过资源的初始化完成点。

use crate::backend::RenderBackend;
use crate::datasource::DataSource;
use crate::guid::ResourceGuid;
use crate::manager::ResourceManager;
use crate::resource::{Resource, ResourceHandle};

/// 加载执行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingMode {
    /// 解码 + 终结内联执行，阻塞调用方
    Immediate,
    /// 解码进工作线程，终结由轮询循环执行
    Async,
}

/// 终结阶段上下文
///
/// 只在主线程构造。借助它，终结阶段可以递归请求其他资源（网格请求材质库、
/// 材质库请求纹理）——递归只触碰缓存簿记，不会重入 GPU 状态。
pub struct FinalizeContext<'a> {
    pub backend: &'a mut dyn RenderBackend,
    pub manager: &'a ResourceManager,
}

/// 手动加载器：单次同步产出
pub trait ManualLoader {
    /// 产出带 GUID 的完成态资源，失败返回 `None`
    fn load(&mut self, backend: &mut dyn RenderBackend) -> Option<Resource>;
}

/// 文件系统加载器：三阶段协议
pub trait FileSystemLoader: Send {
    fn loading_mode(&self) -> LoadingMode;

    /// 造占位资源，便宜且主线程安全
    fn create_dummy(&self, guid: ResourceGuid) -> Resource {
        Resource::dummy(guid)
    }

    /// 解码阶段：工作线程安全，产物暂存在加载器内部
    ///
    /// 禁止访问渲染后端。返回 false 表示数据损坏或格式不支持，该失败是
    /// 终态——资源停留在未初始化。
    fn decode(&mut self, source: &mut dyn DataSource) -> bool;

    /// 终结阶段：仅主线程，消费解码产物填充资源
    ///
    /// 实现必须把载荷从自身移出（move），保证成功失败两条路径上 CPU 侧
    /// 字节都被释放。
    fn on_decoded(&mut self, resource: &Resource, ctx: &mut FinalizeContext<'_>) -> bool;
}

/// 一次解码请求
///
/// {加载器, 目标资源, 数据源} 三元组，进工作队列或内联执行，完成后不再
/// 持久化。`decoded` 是解码结果跨线程传播的唯一通道——工作线程不向主线程
/// 抛任何错误。
pub(crate) struct DecodeRequest {
    pub(crate) loader: Box<dyn FileSystemLoader>,
    pub(crate) resource: ResourceHandle,
    pub(crate) source: Box<dyn DataSource>,
    pub(crate) decoded: bool,
    pub(crate) generation: u64,
}

impl DecodeRequest {
    pub(crate) fn new(
        loader: Box<dyn FileSystemLoader>,
        resource: ResourceHandle,
        source: Box<dyn DataSource>,
    ) -> Self {
        Self {
            loader,
            resource,
            source,
            decoded: false,
            generation: 0,
        }
    }
}
