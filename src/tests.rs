//! 管线跨模块场景测试
//!
//! 用记录式后端驱动完整管线：去重、终态失败、清扫、线程亲和、挂起恢复。

use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;
use std::time::{Duration, Instant};

use crate::backend::{
    MeshData, ProgramHandle, RenderBackend, SubMeshBuffers, TextureCreationParams, TextureData,
    TextureHandle,
};
use crate::guid::ResourceGuid;
use crate::loader::LoadingMode;
use crate::loaders::texture::TextureFSLoader;
use crate::manager::{ResourceListener, ResourceManager, ResourceManagerConfig};

// ============================================================================
// 测试用后端与夹具
// ============================================================================

/// 记录式后端：记下每次创建调用发生在哪个线程
#[derive(Default)]
struct MockBackend {
    next_handle: u64,
    fail_textures: bool,
    textures_created: u32,
    create_threads: Vec<ThreadId>,
}

impl RenderBackend for MockBackend {
    fn create_texture(
        &mut self,
        _data: &TextureData,
        _params: &TextureCreationParams,
    ) -> Option<TextureHandle> {
        self.create_threads.push(std::thread::current().id());
        if self.fail_textures {
            return None;
        }
        self.next_handle += 1;
        self.textures_created += 1;
        Some(TextureHandle(self.next_handle))
    }

    fn create_mesh(&mut self, data: &MeshData) -> Option<Vec<SubMeshBuffers>> {
        self.create_threads.push(std::thread::current().id());
        let mut out = Vec::new();
        for submesh in &data.submeshes {
            self.next_handle += 2;
            out.push(SubMeshBuffers {
                vertex_buffer: crate::backend::BufferHandle(self.next_handle - 1),
                index_buffer: crate::backend::BufferHandle(self.next_handle),
                index_count: submesh.indices.len() as u32,
            });
        }
        Some(out)
    }

    fn create_gpu_program(
        &mut self,
        _vertex_src: &str,
        _fragment_src: &str,
    ) -> Option<ProgramHandle> {
        self.create_threads.push(std::thread::current().id());
        self.next_handle += 1;
        Some(ProgramHandle(self.next_handle))
    }
}

#[derive(Default)]
struct RecordingListener {
    issued: Mutex<Vec<ResourceGuid>>,
    completed: Mutex<Vec<ResourceGuid>>,
}

impl ResourceListener for RecordingListener {
    fn on_request_issued(&self, guid: &ResourceGuid) {
        self.issued.lock().unwrap().push(guid.clone());
    }

    fn on_request_completed(&self, guid: &ResourceGuid) {
        self.completed.lock().unwrap().push(guid.clone());
    }
}

fn png_bytes() -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 255]));
    let mut buf = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut buf, image::ImageOutputFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn write_file(dir: &Path, name: &str, bytes: &[u8]) {
    std::fs::File::create(dir.join(name))
        .unwrap()
        .write_all(bytes)
        .unwrap();
}

fn manager_with(dir: &Path) -> ResourceManager {
    ResourceManager::new(ResourceManagerConfig {
        worker_threads: 2,
        search_paths: vec![dir.to_path_buf()],
    })
}

/// 反复轮询直到条件满足或超时
fn poll_until(
    manager: &ResourceManager,
    backend: &mut MockBackend,
    mut done: impl FnMut() -> bool,
) -> bool {
    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(5) {
        manager.poll(backend);
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    false
}

fn async_texture_loader() -> Box<TextureFSLoader> {
    Box::new(TextureFSLoader::new(LoadingMode::Async))
}

// ============================================================================
// 去重与幂等
// ============================================================================

#[test]
fn test_async_requests_collapse_onto_same_instance() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "t.png", &png_bytes());
    let manager = manager_with(dir.path());
    let mut backend = MockBackend::default();

    // 背靠背两次请求，第一次还没完成
    let a = manager
        .request_from_file_system("t.png", async_texture_loader(), &mut backend)
        .unwrap();
    let b = manager
        .request_from_file_system("t.png", async_texture_loader(), &mut backend)
        .unwrap();

    // 同一个占位实例
    assert!(Arc::ptr_eq(&a, &b));
    assert!(!a.is_initialized());

    assert!(poll_until(&manager, &mut backend, || a.is_initialized()));

    // 只跑了一条解码管线
    assert_eq!(manager.stats().requests_issued, 1);
    assert_eq!(manager.worker_stats().enqueued, 1);
    assert_eq!(backend.textures_created, 1);

    // 两个句柄观察到同一个 GPU 句柄
    assert!(b.is_initialized());
    assert_eq!(a.texture().unwrap().handle, b.texture().unwrap().handle);
}

#[test]
fn test_sequential_resolution_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "t.png", &png_bytes());
    let manager = manager_with(dir.path());
    let mut backend = MockBackend::default();

    let a = manager
        .request_from_file_system("t.png", async_texture_loader(), &mut backend)
        .unwrap();
    assert!(poll_until(&manager, &mut backend, || a.is_initialized()));

    // 第二次请求：同一个 GUID、同一个缓存实例，没有第二次解码
    let b = manager
        .request_from_file_system("t.png", async_texture_loader(), &mut backend)
        .unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(manager.worker_stats().enqueued, 1);
}

#[test]
fn test_missing_path_returns_none_without_cache_entry() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager_with(dir.path());
    let mut backend = MockBackend::default();

    let result =
        manager.request_from_file_system("missing.png", async_texture_loader(), &mut backend);
    assert!(result.is_none());
    assert_eq!(manager.stats().cached_resources, 0);
    assert_eq!(manager.stats().requests_issued, 0);
}

// ============================================================================
// 失败是终态
// ============================================================================

#[test]
fn test_decode_failure_is_terminal() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "bad.png", &[0xba, 0xad, 0xf0, 0x0d]);
    let manager = manager_with(dir.path());
    let mut backend = MockBackend::default();

    let handle = manager
        .request_from_file_system("bad.png", async_texture_loader(), &mut backend)
        .unwrap();

    assert!(poll_until(&manager, &mut backend, || {
        manager.stats().requests_failed == 1
    }));
    assert!(!handle.is_initialized());

    // 后续轮询不会重试，也不会重新排队
    for _ in 0..10 {
        manager.poll(&mut backend);
    }
    assert!(!handle.is_initialized());
    assert_eq!(manager.stats().requests_failed, 1);
    assert_eq!(manager.worker_stats().enqueued, 1);
    // 占位资源仍在缓存里，挡住重复请求
    assert!(manager.is_resource_exist(handle.guid()));
    assert!(!manager.is_resource_loaded(handle.guid()));
}

#[test]
fn test_finalize_failure_leaves_resource_uninitialized() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "t.png", &png_bytes());
    let manager = manager_with(dir.path());
    let mut backend = MockBackend {
        fail_textures: true,
        ..Default::default()
    };

    let handle = manager
        .request_from_file_system("t.png", async_texture_loader(), &mut backend)
        .unwrap();
    assert!(poll_until(&manager, &mut backend, || {
        manager.stats().requests_failed == 1
    }));
    // 解码成功但 GPU 创建失败：资源停留在未初始化
    assert!(!handle.is_initialized());
    assert_eq!(manager.worker_stats().decoded, 1);
}

// ============================================================================
// 卸载与清扫
// ============================================================================

#[test]
fn test_unload_respects_external_holders_and_resident() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "t.png", &png_bytes());
    let manager = manager_with(dir.path());
    let mut backend = MockBackend::default();

    let handle = manager
        .request_from_file_system(
            "t.png",
            Box::new(TextureFSLoader::new(LoadingMode::Immediate)),
            &mut backend,
        )
        .unwrap();
    let guid = handle.guid().clone();

    // 外部还持有句柄：卸载是空操作
    manager.unload(&guid);
    assert!(manager.is_resource_exist(&guid));

    // 常驻资源无论引用计数如何都不卸载
    handle.set_resident(true);
    drop(handle);
    manager.unload(&guid);
    assert!(manager.is_resource_exist(&guid));

    // 取消常驻后才可卸载
    manager.find(&guid).unwrap().set_resident(false);
    manager.unload(&guid);
    assert!(!manager.is_resource_exist(&guid));
}

#[test]
fn test_unload_by_handle_consumes_the_hold() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "t.png", &png_bytes());
    let manager = manager_with(dir.path());
    let mut backend = MockBackend::default();

    let handle = manager
        .request_from_file_system(
            "t.png",
            Box::new(TextureFSLoader::new(LoadingMode::Immediate)),
            &mut backend,
        )
        .unwrap();
    let guid = handle.guid().clone();

    // 句柄被卸载调用消费，缓存成为唯一持有者后移除
    manager.unload_handle(handle);
    assert!(!manager.is_resource_exist(&guid));
}

#[test]
fn test_sweep_reclaims_material_lib_chain() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "wood.png", &png_bytes());
    write_file(
        dir.path(),
        "lib.json",
        br#"{ "materials": [ { "name": "wood", "samplers": [ { "name": "diffuseMap", "path": "wood.png" } ] } ] }"#,
    );
    let manager = manager_with(dir.path());
    let mut backend = MockBackend::default();

    let lib = manager
        .factory()
        .create_material_lib("lib.json", &mut backend)
        .unwrap();
    // 材质库立即模式：返回时已初始化，纹理请求已发出
    assert!(lib.is_initialized());
    assert!(poll_until(&manager, &mut backend, || {
        manager.stats().requests_completed == 2
    }));
    assert_eq!(manager.stats().cached_resources, 2);

    // 只有材质库被外部持有；放掉它，一次清扫传递回收纹理
    drop(lib);
    manager.unload_unused();
    assert_eq!(manager.stats().cached_resources, 0);
}

#[cfg(feature = "gltf")]
#[test]
fn test_sweep_reclaims_three_level_chain() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "wood.png", &png_bytes());
    write_file(
        dir.path(),
        "lib.json",
        br#"{ "materials": [ { "name": "wood", "samplers": [ { "name": "diffuseMap", "path": "wood.png" } ] } ] }"#,
    );
    write_file(
        dir.path(),
        "tri.gltf",
        crate::loaders::mesh::tests::TRIANGLE_GLTF.as_bytes(),
    );
    let manager = manager_with(dir.path());
    let mut backend = MockBackend::default();

    // 网格 → 材质库 → 纹理 三级链
    let mesh = manager
        .factory()
        .create_mesh("tri.gltf", Some("lib.json"), LoadingMode::Immediate, &mut backend)
        .unwrap();
    assert!(mesh.is_initialized());
    assert!(mesh.mesh().unwrap().material_lib.is_some());
    assert!(poll_until(&manager, &mut backend, || {
        manager.stats().requests_completed == 3
    }));
    assert_eq!(manager.stats().cached_resources, 3);

    // 放掉对链头的外部持有，一次调用回收整条链
    drop(mesh);
    manager.unload_unused();
    assert_eq!(manager.stats().cached_resources, 0);
}

#[test]
fn test_sweep_never_evicts_held_or_resident() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.png", &png_bytes());
    write_file(dir.path(), "b.png", &png_bytes());
    let manager = manager_with(dir.path());
    let mut backend = MockBackend::default();

    let held = manager
        .request_from_file_system("a.png", async_texture_loader(), &mut backend)
        .unwrap();
    let resident = manager
        .request_from_file_system("b.png", async_texture_loader(), &mut backend)
        .unwrap();
    assert!(poll_until(&manager, &mut backend, || {
        held.is_initialized() && resident.is_initialized()
    }));

    resident.set_resident(true);
    drop(resident);

    manager.unload_unused();
    // 外部持有的和常驻的都活着
    assert_eq!(manager.stats().cached_resources, 2);
    assert!(held.is_initialized());
}

// ============================================================================
// 线程亲和与挂起
// ============================================================================

#[test]
fn test_finalize_runs_on_polling_thread_only() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "t.png", &png_bytes());
    let manager = manager_with(dir.path());
    let mut backend = MockBackend::default();
    let main_thread = std::thread::current().id();

    let handle = manager
        .request_from_file_system("t.png", async_texture_loader(), &mut backend)
        .unwrap();
    assert!(poll_until(&manager, &mut backend, || handle.is_initialized()));

    // 解码在工作线程，但所有后端调用都发生在轮询线程
    assert!(!backend.create_threads.is_empty());
    assert!(backend.create_threads.iter().all(|id| *id == main_thread));
}

#[test]
fn test_suspend_defers_finalize_until_resume() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "t.png", &png_bytes());
    let manager = manager_with(dir.path());
    let mut backend = MockBackend::default();

    let handle = manager
        .request_from_file_system("t.png", async_texture_loader(), &mut backend)
        .unwrap();

    // 等解码完成，然后挂起
    let start = Instant::now();
    while manager.worker_stats().decoded == 0 && start.elapsed() < Duration::from_secs(5) {
        std::thread::sleep(Duration::from_millis(1));
    }
    manager.suspend();
    manager.suspend(); // 幂等

    // 挂起期间不发出终结调用
    for _ in 0..10 {
        manager.poll(&mut backend);
    }
    assert!(!handle.is_initialized());
    assert_eq!(backend.textures_created, 0);

    manager.resume();
    manager.resume(); // 幂等
    assert!(poll_until(&manager, &mut backend, || handle.is_initialized()));
}

// ============================================================================
// 手动资源与内嵌资源
// ============================================================================

#[test]
fn test_manual_texture_registration() {
    let manager = ResourceManager::new(ResourceManagerConfig::default());
    let mut backend = MockBackend::default();

    let data = TextureData {
        width: 1,
        height: 1,
        pixels: vec![255; 4],
    };
    let handle = manager
        .factory()
        .create_texture_from_pixels("ui/white", data, TextureCreationParams::default(), &mut backend)
        .unwrap();

    assert!(handle.is_initialized());
    assert!(manager.is_resource_loaded(&ResourceGuid::new("ui/white")));
}

#[test]
#[should_panic(expected = "duplicate manual resource GUID")]
fn test_duplicate_manual_guid_asserts() {
    let manager = ResourceManager::new(ResourceManagerConfig::default());
    let mut backend = MockBackend::default();

    let data = || TextureData {
        width: 1,
        height: 1,
        pixels: vec![0; 4],
    };
    manager
        .factory()
        .create_texture_from_pixels("dup", data(), TextureCreationParams::default(), &mut backend)
        .unwrap();
    // 同一手动 GUID 二次注册：调试构建断言
    manager.factory().create_texture_from_pixels(
        "dup",
        data(),
        TextureCreationParams::default(),
        &mut backend,
    );
}

#[test]
fn test_embed_programs_are_resident() {
    let manager = ResourceManager::new(ResourceManagerConfig::default());
    let mut backend = MockBackend::default();

    manager.factory().load_embed_resources(&mut backend);
    let program = manager.factory().simple_lighting_program().unwrap();
    assert!(program.is_initialized());
    assert!(program.is_resident());
    drop(program);

    // 常驻：清扫后依然可用
    manager.unload_unused();
    assert!(manager.factory().simple_lighting_program().is_some());
    assert!(manager.factory().colored_program().is_some());
}

// ============================================================================
// 监听器
// ============================================================================

#[test]
fn test_listeners_observe_async_completion() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "t.png", &png_bytes());
    let manager = manager_with(dir.path());
    let mut backend = MockBackend::default();

    let listener = Arc::new(RecordingListener::default());
    manager.add_listener(listener.clone());
    // 重复添加被拒绝
    manager.add_listener(listener.clone());

    let handle = manager
        .request_from_file_system("t.png", async_texture_loader(), &mut backend)
        .unwrap();

    // 发出事件同步产生，完成事件异步到达
    assert_eq!(listener.issued.lock().unwrap().len(), 1);
    assert_eq!(listener.completed.lock().unwrap().len(), 0);

    assert!(poll_until(&manager, &mut backend, || handle.is_initialized()));
    {
        let completed = listener.completed.lock().unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(&completed[0], handle.guid());
    }

    // 移除后不再收到事件
    let dyn_listener: Arc<dyn ResourceListener> = listener.clone();
    manager.remove_listener(&dyn_listener);
    write_file(dir.path(), "u.png", &png_bytes());
    let other = manager
        .request_from_file_system("u.png", async_texture_loader(), &mut backend)
        .unwrap();
    assert!(poll_until(&manager, &mut backend, || other.is_initialized()));
    assert_eq!(listener.issued.lock().unwrap().len(), 1);
}
