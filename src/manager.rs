//! 资源管理器：GUID 缓存 + 异步加载管线
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                    Resource Loading Pipeline                   │
//! ├───────────────────────────────────────────────────────────────┤
//! │  request_from_file_system(path)                                │
//! │      │ 1. 缓存命中 → 直接返回共享句柄                            │
//! │      │ 2. 解析 GUID，失败 → 告警并返回 None                      │
//! │      │ 3. 注册占位资源（dummy-first，并发请求折叠到同一实例）      │
//! │      ▼                                                         │
//! │  Immediate: 内联 decode + finalize（阻塞调用方）                 │
//! │  Async:     decode 进工作线程 ──▶ 完成队列                       │
//! │                                      │                         │
//! │  poll()（每帧，主线程）◀──排空────────┘                          │
//! │      └─ on_decoded()：GPU 上传，置位 initialized                 │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! 缓存锁的纪律：锁永远不跨加载器回调持有。占位注册（查重 + 插入）在锁内
//! 原子完成；`decode` / `on_decoded` / `load` 全部在锁外执行。因此加载器
//! 在同一线程上递归请求其他资源（网格加载材质库、材质库加载纹理）拿到的
//! 是空闲的锁，不会自锁。

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::backend::RenderBackend;
use crate::datasource::DataSource;
use crate::factory::ResourceFactory;
use crate::guid::{ResourceFileSystem, ResourceGuid};
use crate::loader::{DecodeRequest, FileSystemLoader, FinalizeContext, LoadingMode, ManualLoader};
use crate::resource::ResourceHandle;
use crate::worker::{WorkerPool, WorkerStats};

/// 管理器配置
#[derive(Debug, Clone)]
pub struct ResourceManagerConfig {
    /// 解码工作线程数，构造时按可用并行度收敛
    pub worker_threads: usize,
    /// 初始搜索路径
    pub search_paths: Vec<PathBuf>,
}

impl Default for ResourceManagerConfig {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            search_paths: Vec::new(),
        }
    }
}

/// 资源事件监听器
///
/// 异步请求的完成通知不与发起调用同步，监听器实现不能做此假设。
pub trait ResourceListener: Send + Sync {
    fn on_request_issued(&self, guid: &ResourceGuid);
    fn on_request_completed(&self, guid: &ResourceGuid);
}

/// 缓存统计
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub cached_resources: usize,
    pub requests_issued: u64,
    pub requests_completed: u64,
    pub requests_failed: u64,
}

/// 资源管理器
///
/// 由引擎组合根显式构造并持有，按引用传给需要资源访问的协作者；
/// 生命周期与引擎初始化/关闭绑定。没有全局单例。
pub struct ResourceManager {
    fs: Arc<ResourceFileSystem>,
    cache: Mutex<HashMap<ResourceGuid, ResourceHandle>>,
    listeners: Mutex<Vec<Arc<dyn ResourceListener>>>,
    pool: WorkerPool,
    suspended: AtomicBool,
    requests_issued: AtomicU64,
    requests_completed: AtomicU64,
    requests_failed: AtomicU64,
}

impl ResourceManager {
    pub fn new(config: ResourceManagerConfig) -> Self {
        let workers = config.worker_threads.clamp(1, num_cpus::get());
        let fs = Arc::new(ResourceFileSystem::new());
        for path in config.search_paths {
            fs.add_search_path(path);
        }

        Self {
            fs,
            cache: Mutex::new(HashMap::new()),
            listeners: Mutex::new(Vec::new()),
            pool: WorkerPool::new(workers),
            suspended: AtomicBool::new(false),
            requests_issued: AtomicU64::new(0),
            requests_completed: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
        }
    }

    /// 解析与打开用的文件系统，工厂和描述文件加载器共享
    pub fn file_system(&self) -> &Arc<ResourceFileSystem> {
        &self.fs
    }

    pub fn add_search_path(&self, path: impl Into<PathBuf>) {
        self.fs.add_search_path(path);
    }

    /// 类型化的便捷门面
    pub fn factory(&self) -> ResourceFactory<'_> {
        ResourceFactory::new(self)
    }

    // ========================================================================
    // 请求
    // ========================================================================

    /// 从文件系统请求资源
    ///
    /// 命中缓存立即返回既有句柄；否则注册占位资源后按加载器声明的模式
    /// 内联执行或交给工作线程。路径解析失败返回 `None` 并记录警告，
    /// 不在缓存中留痕。
    pub fn request_from_file_system(
        &self,
        path: &str,
        loader: Box<dyn FileSystemLoader>,
        backend: &mut dyn RenderBackend,
    ) -> Option<ResourceHandle> {
        // 原始路径直接命中（廉价检查，原始路径恰好是规范路径时成立）
        if let Some(found) = self.find(&ResourceGuid::from(path)) {
            return Some(found);
        }

        let guid = self.fs.resolve(path);
        if !guid.is_valid() {
            log::warn!(
                "Can't load resource: the path '{}' doesn't exist or is a directory",
                path
            );
            return None;
        }

        // 两条不同原始路径规范化到同一文件时在这里命中
        if let Some(found) = self.find(&guid) {
            return Some(found);
        }

        // 占位先行：解码开始前就注册进缓存，并发的同 GUID 请求折叠到
        // 同一个在途实例上
        let resource: ResourceHandle = Arc::new(loader.create_dummy(guid.clone()));
        {
            let mut cache = self.cache.lock().unwrap();
            if let Some(existing) = cache.get(&guid) {
                return Some(existing.clone());
            }
            cache.insert(guid.clone(), resource.clone());
        }

        self.requests_issued.fetch_add(1, Ordering::Relaxed);
        self.notify_issued(&guid);

        let source: Box<dyn DataSource> = match self.fs.open(&guid) {
            Ok(src) => Box::new(src),
            Err(e) => {
                // 解析后文件消失等情况：按终态失败处理，占位资源留在缓存
                log::warn!("Failed to open data source for '{}': {}", guid, e);
                self.requests_failed.fetch_add(1, Ordering::Relaxed);
                self.notify_completed(&guid);
                return Some(resource);
            }
        };

        let mode = loader.loading_mode();
        let mut request = DecodeRequest::new(loader, resource.clone(), source);
        match mode {
            LoadingMode::Async => self.pool.enqueue(request),
            LoadingMode::Immediate => {
                log::debug!("Decoding {}", request.source.path());
                request.decoded = request.loader.decode(request.source.as_mut());
                self.finalize_request(request, backend);
            }
        }

        Some(resource)
    }

    /// 注册手动构造的资源
    ///
    /// 同步执行 `load()` 并按其 GUID 注册。重复的手动 GUID 是调用方的
    /// 编程错误：debug 构建断言，release 构建记错误日志并返回 `None`。
    pub fn request_manual(
        &self,
        loader: &mut dyn ManualLoader,
        backend: &mut dyn RenderBackend,
    ) -> Option<ResourceHandle> {
        let resource = match loader.load(backend) {
            Some(r) => r,
            None => {
                log::warn!("Manual resource loader failed");
                return None;
            }
        };

        let guid = resource.guid().clone();
        debug_assert!(guid.is_valid(), "manual resource must carry a GUID");

        resource.mark_initialized();
        let handle: ResourceHandle = Arc::new(resource);
        {
            let mut cache = self.cache.lock().unwrap();
            if cache.contains_key(&guid) {
                debug_assert!(false, "duplicate manual resource GUID: {}", guid);
                log::error!("Duplicate manual resource GUID: {}", guid);
                return None;
            }
            cache.insert(guid, handle.clone());
        }

        Some(handle)
    }

    // ========================================================================
    // 查询
    // ========================================================================

    /// O(1) 查找，无副作用
    pub fn find(&self, guid: &ResourceGuid) -> Option<ResourceHandle> {
        self.cache.lock().unwrap().get(guid).cloned()
    }

    pub fn is_resource_exist(&self, guid: &ResourceGuid) -> bool {
        self.find(guid).is_some()
    }

    /// 存在且已完成初始化
    pub fn is_resource_loaded(&self, guid: &ResourceGuid) -> bool {
        self.find(guid).map_or(false, |r| r.is_initialized())
    }

    // ========================================================================
    // 轮询
    // ========================================================================

    /// 每帧在拥有渲染后端的线程上调用一次
    ///
    /// 非阻塞排空完成队列，逐个执行终结阶段并通知监听器。空队列是空操作。
    /// 解码失败的资源永远停留在未初始化，不会重新排队。
    pub fn poll(&self, backend: &mut dyn RenderBackend) {
        if self.suspended.load(Ordering::Acquire) {
            return;
        }

        while let Some(request) = self.pool.try_pop_completed() {
            self.finalize_request(request, backend);
        }
    }

    // 终结一个解码请求：内联路径和轮询路径共用。请求在函数结束时销毁，
    // 加载器连同残余的 CPU 侧载荷一起释放。
    fn finalize_request(&self, mut request: DecodeRequest, backend: &mut dyn RenderBackend) {
        let guid = request.resource.guid().clone();

        if request.decoded {
            let ok = {
                let mut ctx = FinalizeContext {
                    backend,
                    manager: self,
                };
                request.loader.on_decoded(&request.resource, &mut ctx)
            };
            if ok {
                request.resource.mark_initialized();
                self.requests_completed.fetch_add(1, Ordering::Relaxed);
            } else {
                log::warn!("GPU-side creation failed for resource '{}'", guid);
                self.requests_failed.fetch_add(1, Ordering::Relaxed);
            }
        } else {
            log::warn!("Failed to decode resource '{}'", guid);
            self.requests_failed.fetch_add(1, Ordering::Relaxed);
        }

        self.notify_completed(&guid);
    }

    // ========================================================================
    // 卸载
    // ========================================================================

    /// 卸载单个资源
    ///
    /// 只有当资源非常驻且缓存是唯一持有者时才移除；否则是空操作，
    /// 绝不强制逐出在用或常驻的资源。
    pub fn unload(&self, guid: &ResourceGuid) {
        let mut cache = self.cache.lock().unwrap();
        let removable = match cache.get(guid) {
            Some(res) => !res.is_resident() && Arc::strong_count(res) == 1,
            None => false,
        };
        if removable {
            cache.remove(guid);
        }
    }

    /// 按句柄卸载：消费掉调用方的持有再尝试移除
    pub fn unload_handle(&self, handle: ResourceHandle) {
        let guid = handle.guid().clone();
        drop(handle);
        self.unload(&guid);
    }

    /// 清扫所有未被引用的资源
    ///
    /// 先丢弃还没开始的排队请求并等待解码中的请求进完成队列（完成队列里
    /// 的请求持有资源句柄，在途资源因此不会被逐出），然后迭代清扫到不动
    /// 点：释放一个资源可能让它引用的资源变为唯一持有（材质库引用纹理），
    /// 下一轮继续回收。
    pub fn unload_unused(&self) {
        self.pool.clear();
        self.pool.wait_idle();

        let mut cache = self.cache.lock().unwrap();
        loop {
            let before = cache.len();
            cache.retain(|_, res| res.is_resident() || Arc::strong_count(res) > 1);
            if cache.len() == before {
                break;
            }
        }
    }

    // ========================================================================
    // 挂起/恢复
    // ========================================================================

    /// 应用退到后台时调用：不再开始新的异步解码，也不再发出终结调用
    ///
    /// 已完成的解码停留在完成队列，恢复后的下一次 `poll` 处理。幂等。
    pub fn suspend(&self) {
        if self.suspended.swap(true, Ordering::AcqRel) {
            return;
        }
        self.pool.pause();
        log::info!("Resource manager suspended");
    }

    /// 恢复正常运转，幂等
    pub fn resume(&self) {
        if !self.suspended.swap(false, Ordering::AcqRel) {
            return;
        }
        self.pool.unpause();
        log::info!("Resource manager resumed");
    }

    // ========================================================================
    // 监听器
    // ========================================================================

    pub fn add_listener(&self, listener: Arc<dyn ResourceListener>) {
        let mut listeners = self.listeners.lock().unwrap();
        if listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            log::warn!("Trying to add duplicate resource listener");
            return;
        }
        listeners.push(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn ResourceListener>) {
        let mut listeners = self.listeners.lock().unwrap();
        match listeners.iter().position(|l| Arc::ptr_eq(l, listener)) {
            Some(idx) => {
                listeners.remove(idx);
            }
            None => log::warn!("remove_listener failed: listener doesn't exist"),
        }
    }

    // 回调在锁外执行，监听器自己再发资源请求也不会自锁
    fn notify_issued(&self, guid: &ResourceGuid) {
        let listeners = self.listeners.lock().unwrap().clone();
        for listener in listeners {
            listener.on_request_issued(guid);
        }
    }

    fn notify_completed(&self, guid: &ResourceGuid) {
        let listeners = self.listeners.lock().unwrap().clone();
        for listener in listeners {
            listener.on_request_completed(guid);
        }
    }

    // ========================================================================
    // 统计
    // ========================================================================

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            cached_resources: self.cache.lock().unwrap().len(),
            requests_issued: self.requests_issued.load(Ordering::Relaxed),
            requests_completed: self.requests_completed.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
        }
    }

    pub fn worker_stats(&self) -> WorkerStats {
        self.pool.stats()
    }
}
