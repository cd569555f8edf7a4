//! 解码工作线程池
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 Decode Worker Pool                    │
//! ├──────────────────────────────────────────────────────┤
//! │  main thread ──enqueue──▶ job queue (FIFO)            │
//! │                              │                        │
//! │            res-worker-0 ◀────┤────▶ res-worker-1      │
//! │                 │ decode()          decode() │        │
//! │                 ▼                            ▼        │
//! │              completion queue (FIFO, thread-safe)     │
//! │                              │                        │
//! │  main thread ◀──try_pop─────┘   (poll loop)          │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! 固定数量的工作线程按提交顺序消费解码请求（单个工作线程内 FIFO，跨线程
//! 无顺序保证）。`enqueue` 永不阻塞；解码结束后请求无论成败都进完成队列，
//! 失败以请求上的布尔结果传播，绝不跨线程边界抛 panic。
//!
//! `clear()` 基于代数（generation）：抬高当前代数后，队列里还没开始的
//! 请求会被工作线程直接丢弃，正在解码的请求不受影响。`wait_idle()` 等到
//! 队列排空且没有请求在解码中，是 `unload_unused` 清扫前的排水步骤。

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use crate::loader::DecodeRequest;

/// 工作线程统计
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerStats {
    pub enqueued: u64,
    pub decoded: u64,
    pub failed: u64,
    pub dropped: u64,
}

#[derive(Default)]
struct PoolShared {
    generation: AtomicU64,
    // queued + active 一起覆盖请求从入队到进完成队列的整个窗口，
    // wait_idle 依赖这一点
    queued: AtomicUsize,
    active: AtomicUsize,
    paused: AtomicBool,
    enqueued: AtomicU64,
    decoded: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

pub(crate) struct WorkerPool {
    job_tx: Option<Sender<DecodeRequest>>,
    done_rx: Receiver<DecodeRequest>,
    workers: Vec<JoinHandle<()>>,
    shared: Arc<PoolShared>,
}

impl WorkerPool {
    pub fn new(worker_count: usize) -> Self {
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<DecodeRequest>();
        let (done_tx, done_rx) = crossbeam_channel::unbounded::<DecodeRequest>();
        let shared = Arc::new(PoolShared::default());

        let mut workers = Vec::with_capacity(worker_count);
        for i in 0..worker_count {
            let rx = job_rx.clone();
            let tx = done_tx.clone();
            let shared = shared.clone();
            let handle = std::thread::Builder::new()
                .name(format!("res-worker-{}", i))
                .spawn(move || worker_loop(rx, tx, shared))
                .expect("Failed to spawn resource worker thread");
            workers.push(handle);
        }

        Self {
            job_tx: Some(job_tx),
            done_rx,
            workers,
            shared,
        }
    }

    /// 提交解码请求，永不阻塞
    pub fn enqueue(&self, mut request: DecodeRequest) {
        request.generation = self.shared.generation.load(Ordering::Acquire);
        self.shared.queued.fetch_add(1, Ordering::AcqRel);
        self.shared.enqueued.fetch_add(1, Ordering::Relaxed);
        if let Some(tx) = &self.job_tx {
            let _ = tx.send(request);
        }
    }

    /// 丢弃所有还没开始的排队请求，不打断解码中的请求
    pub fn clear(&self) {
        self.shared.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// 阻塞到队列排空且无请求在解码中
    ///
    /// 解码完成的请求此时停在完成队列里，持有各自资源的句柄，所以随后的
    /// 清扫不会把在途资源逐出。
    pub fn wait_idle(&self) {
        loop {
            let queued = self.shared.queued.load(Ordering::Acquire);
            let active = self.shared.active.load(Ordering::Acquire);
            if queued == 0 && active == 0 {
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    /// 非阻塞取一个已完成请求，轮询循环用
    pub fn try_pop_completed(&self) -> Option<DecodeRequest> {
        self.done_rx.try_recv().ok()
    }

    /// 暂停：工作线程不再开始新的解码
    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::Release);
    }

    pub fn unpause(&self) {
        self.shared.paused.store(false, Ordering::Release);
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            enqueued: self.shared.enqueued.load(Ordering::Relaxed),
            decoded: self.shared.decoded.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
            dropped: self.shared.dropped.load(Ordering::Relaxed),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // 关闭任务通道，工作线程在 recv 出错后退出
        self.job_tx.take();
        for handle in self.workers.drain(..) {
            if let Err(e) = handle.join() {
                log::error!("Resource worker thread panicked: {:?}", e);
            }
        }
    }
}

fn worker_loop(
    job_rx: Receiver<DecodeRequest>,
    done_tx: Sender<DecodeRequest>,
    shared: Arc<PoolShared>,
) {
    while let Ok(mut request) = job_rx.recv() {
        // 过期请求（clear 之前入队）直接丢弃
        if request.generation != shared.generation.load(Ordering::Acquire) {
            shared.queued.fetch_sub(1, Ordering::AcqRel);
            shared.dropped.fetch_add(1, Ordering::Relaxed);
            continue;
        }

        // 暂停期间不开始新解码；期间如果发生 clear，醒来后按过期处理
        while shared.paused.load(Ordering::Acquire) {
            if request.generation != shared.generation.load(Ordering::Acquire) {
                break;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        if request.generation != shared.generation.load(Ordering::Acquire) {
            shared.queued.fetch_sub(1, Ordering::AcqRel);
            shared.dropped.fetch_add(1, Ordering::Relaxed);
            continue;
        }

        // 先置 active 再清 queued，wait_idle 观察不到两者同时为零的空窗
        shared.active.fetch_add(1, Ordering::AcqRel);
        shared.queued.fetch_sub(1, Ordering::AcqRel);

        log::debug!("ASYNC decoding {}", request.source.path());
        request.decoded = request.loader.decode(request.source.as_mut());

        if request.decoded {
            shared.decoded.fetch_add(1, Ordering::Relaxed);
        } else {
            shared.failed.fetch_add(1, Ordering::Relaxed);
        }

        let _ = done_tx.send(request);
        shared.active.fetch_sub(1, Ordering::AcqRel);
    }
}
