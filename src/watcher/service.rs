//! # 监视服务
//!
//! ## 设计思路
//!
//! 剪贴板与位图 API 不能并发访问，所以整条流水线运行在一个专用线程上：
//! 线程内是单线程 tokio 运行时，唯一的事件循环同时等待
//! 剪贴板通知、防抖到期、状态恢复与周期清理四类触发。
//! 通知线程只通过通道投递信号，从不直接修改流水线状态。
//!
//! ## 关闭顺序
//!
//! 1. 向循环发送 `Shutdown`，循环退出后防抖与清理定时器随之失效；
//! 2. 清空全部缓存截图；
//! 3. 处理线程结束后，再注销剪贴板监听。

use std::future::pending;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};

use super::orchestrator::CaptureOrchestrator;
use super::status::{SharedStatus, StatusSink};
use crate::clipboard::listener::{spawn_listener, ListenerHandle};
use crate::clipboard::{ClipboardError, ClipboardReader, ClipboardWriter, SystemClipboard};
use crate::config::WatcherConfig;
use crate::error::AppError;
use crate::storage::{CaptureStore, CleanupReport, StoreError};

/// 投递给处理循环的事件。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherEvent {
    ClipboardChanged,
    Shutdown,
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending::<()>().await,
    }
}

fn log_sweep(result: Result<CleanupReport, StoreError>) {
    match result {
        Ok(report) if !report.is_clean() => {
            log::warn!("🧹 过期清理有 {} 个文件删除失败", report.failed.len());
        }
        Ok(_) => {}
        Err(err) => log::warn!("🧹 过期清理失败: {}", err),
    }
}

/// 单消费者事件循环。收到 `Shutdown` 或通道关闭后清空缓存并返回编排器。
pub async fn run_event_loop<B, S>(
    mut orchestrator: CaptureOrchestrator<B, S>,
    mut rx: UnboundedReceiver<WatcherEvent>,
    sweep_interval: Duration,
) -> CaptureOrchestrator<B, S>
where
    B: ClipboardReader + ClipboardWriter,
    S: StatusSink,
{
    // 启动时先清理一次
    log_sweep(orchestrator.sweep());

    let mut sweep = interval_at(Instant::now() + sweep_interval, sweep_interval);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let debounce_deadline = orchestrator.debounce_deadline();
        let status_deadline = orchestrator.status_deadline();

        tokio::select! {
            biased;
            event = rx.recv() => match event {
                Some(WatcherEvent::ClipboardChanged) => {
                    orchestrator.on_clipboard_changed(Instant::now());
                }
                Some(WatcherEvent::Shutdown) | None => break,
            },
            _ = sleep_until_opt(debounce_deadline) => {
                orchestrator.on_debounce_elapsed(Instant::now());
            }
            _ = sleep_until_opt(status_deadline) => {
                orchestrator.on_status_elapsed(Instant::now());
            }
            _ = sweep.tick() => log_sweep(orchestrator.sweep()),
        }
    }

    match orchestrator.shutdown() {
        Ok(report) if !report.is_clean() => {
            log::warn!("🛑 退出清理有 {} 个文件删除失败", report.failed.len());
        }
        Ok(_) => log::info!("🛑 处理循环已停止"),
        Err(err) => log::warn!("🛑 退出清理失败: {}", err),
    }
    orchestrator
}

/// 运行中的监视服务。`Drop` 时同样会按顺序关闭。
pub struct WatcherHandle {
    tx: UnboundedSender<WatcherEvent>,
    processor: Option<JoinHandle<()>>,
    listener: Option<ListenerHandle>,
    status: SharedStatus,
}

impl WatcherHandle {
    /// 当前状态文本。
    pub fn status(&self) -> String {
        self.status.get()
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(processor) = self.processor.take() else {
            return;
        };
        log::info!("🛑 正在关闭剪贴板图片监视器");
        if self.tx.send(WatcherEvent::Shutdown).is_err() {
            log::debug!("处理循环已提前退出");
        }
        if processor.join().is_err() {
            log::error!("🛑 处理线程异常退出");
        }
        if let Some(listener) = self.listener.take() {
            listener.shutdown();
        }
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct WatcherService;

impl WatcherService {
    /// 使用系统剪贴板启动服务。
    pub fn start(config: WatcherConfig) -> Result<WatcherHandle, AppError> {
        Self::start_with_backend(config, SystemClipboard::new)
    }

    /// 启动服务；后端在处理线程内创建，之后只在该线程上使用。
    pub fn start_with_backend<B, F>(config: WatcherConfig, make_backend: F) -> Result<WatcherHandle, AppError>
    where
        B: ClipboardReader + ClipboardWriter + 'static,
        F: FnOnce() -> Result<B, ClipboardError> + Send + 'static,
    {
        let config = config.normalized();
        let store = CaptureStore::open(&config)?;
        let status = SharedStatus::default();
        let (tx, rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), AppError>>();

        let processor = {
            let status = status.clone();
            thread::Builder::new()
                .name("capture-pipeline".to_string())
                .spawn(move || {
                    let runtime = match tokio::runtime::Builder::new_current_thread()
                        .enable_time()
                        .build()
                    {
                        Ok(runtime) => runtime,
                        Err(err) => {
                            let _ = ready_tx.send(Err(AppError::Io(err)));
                            return;
                        }
                    };
                    let backend = match make_backend() {
                        Ok(backend) => backend,
                        Err(err) => {
                            let _ = ready_tx.send(Err(AppError::Clipboard(err)));
                            return;
                        }
                    };
                    let _ = ready_tx.send(Ok(()));

                    let sweep_interval = config.sweep_interval();
                    let orchestrator = CaptureOrchestrator::new(&config, backend, store, status);
                    runtime.block_on(run_event_loop(orchestrator, rx, sweep_interval));
                })?
        };

        let ready = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(AppError::Listener("处理线程启动前退出".to_string())));
        if let Err(err) = ready {
            let _ = processor.join();
            return Err(err);
        }

        let listener = match spawn_listener(tx.clone()) {
            Ok(listener) => listener,
            Err(err) => {
                let _ = tx.send(WatcherEvent::Shutdown);
                let _ = processor.join();
                return Err(AppError::Listener(err.to_string()));
            }
        };

        log::info!("🚀 剪贴板图片监视器已启动");
        Ok(WatcherHandle {
            tx,
            processor: Some(processor),
            listener: Some(listener),
            status,
        })
    }
}
