//! # 剪贴板变化监听
//!
//! 系统通知由 `clipboard-master` 在独立线程上投递，这里只把“发生了变化”
//! 这一信号转发到处理循环的通道，不在通知线程上读取剪贴板，也不触碰流水线状态。
//!
//! 监听器退出或创建失败时按指数退避重启；`ListenerHandle::shutdown()`
//! 会通知 `Master` 退出并等待线程结束。

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use clipboard_master::{CallbackResult, ClipboardHandler, Master, Shutdown};
use tokio::sync::mpsc::UnboundedSender;

use crate::watcher::WatcherEvent;

const MONITOR_RESTART_BASE_DELAY_MS: u64 = 100;
const MONITOR_RESTART_MAX_DELAY_MS: u64 = 5_000;
const STOP_POLL_INTERVAL_MS: u64 = 50;

fn compute_restart_backoff_ms(restart_attempt: u32) -> u64 {
    let exp = 1_u64 << restart_attempt.saturating_sub(1).min(6);
    MONITOR_RESTART_BASE_DELAY_MS
        .saturating_mul(exp)
        .min(MONITOR_RESTART_MAX_DELAY_MS)
}

/// 剪贴板事件处理器（内部实现）
struct Handler {
    tx: UnboundedSender<WatcherEvent>,
}

impl ClipboardHandler for Handler {
    fn on_clipboard_change(&mut self) -> CallbackResult {
        if self.tx.send(WatcherEvent::ClipboardChanged).is_err() {
            log::debug!("📋 处理循环已关闭，停止转发剪贴板变化");
            return CallbackResult::Stop;
        }
        CallbackResult::Next
    }

    fn on_clipboard_error(&mut self, error: io::Error) -> CallbackResult {
        log::error!("剪贴板错误：{}", error);
        CallbackResult::Next
    }
}

type ShutdownSlot = Arc<Mutex<Option<Shutdown>>>;

fn lock_slot(slot: &ShutdownSlot) -> std::sync::MutexGuard<'_, Option<Shutdown>> {
    match slot.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("剪贴板监听关闭句柄锁中毒，继续使用恢复数据");
            poisoned.into_inner()
        }
    }
}

/// 监听线程句柄
pub struct ListenerHandle {
    stop: Arc<AtomicBool>,
    shutdown: ShutdownSlot,
    thread: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    /// 通知监听器退出并等待线程结束。
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(shutdown) = lock_slot(&self.shutdown).take() {
            shutdown.signal();
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("📋 剪贴板监听线程异常退出");
            } else {
                log::info!("📋 剪贴板监听已注销");
            }
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.stop_and_join();
        }
    }
}

/// 在后台线程启动剪贴板监听，变化信号发送到 `tx`。
pub fn spawn_listener(tx: UnboundedSender<WatcherEvent>) -> io::Result<ListenerHandle> {
    let stop = Arc::new(AtomicBool::new(false));
    let shutdown: ShutdownSlot = Arc::new(Mutex::new(None));

    let thread = {
        let stop = Arc::clone(&stop);
        let shutdown = Arc::clone(&shutdown);
        thread::Builder::new()
            .name("clipboard-listener".to_string())
            .spawn(move || run_listener(tx, stop, shutdown))?
    };

    Ok(ListenerHandle {
        stop,
        shutdown,
        thread: Some(thread),
    })
}

fn run_listener(tx: UnboundedSender<WatcherEvent>, stop: Arc<AtomicBool>, slot: ShutdownSlot) {
    let mut restart_attempt: u32 = 0;
    while !stop.load(Ordering::SeqCst) {
        match Master::new(Handler { tx: tx.clone() }) {
            Ok(mut master) => {
                {
                    let mut guard = lock_slot(&slot);
                    // 关闭请求可能恰好发生在创建期间
                    if stop.load(Ordering::SeqCst) {
                        break;
                    }
                    *guard = Some(master.shutdown_channel());
                }
                restart_attempt = 0;
                log::info!("📋 剪贴板监听已启动");
                let result = master.run();
                lock_slot(&slot).take();

                if stop.load(Ordering::SeqCst) || tx.is_closed() {
                    break;
                }
                match result {
                    Ok(()) => log::warn!("📋 剪贴板监听已退出，将尝试重启"),
                    Err(err) => log::warn!("📋 剪贴板监听异常退出: {}，将尝试重启", err),
                }
            }
            Err(err) => {
                log::error!("📋 创建剪贴板监听失败: {}", err);
            }
        }

        restart_attempt = restart_attempt.saturating_add(1);
        let backoff_ms = compute_restart_backoff_ms(restart_attempt);
        log::warn!("📋 剪贴板监听 {}ms 后重试（attempt={}）", backoff_ms, restart_attempt);
        sleep_unless_stopped(&stop, Duration::from_millis(backoff_ms));
    }
}

fn sleep_unless_stopped(stop: &AtomicBool, total: Duration) {
    let slice = Duration::from_millis(STOP_POLL_INTERVAL_MS);
    let mut remaining = total;
    while !remaining.is_zero() && !stop.load(Ordering::SeqCst) {
        let step = remaining.min(slice);
        thread::sleep(step);
        remaining -= step;
    }
}
