//! # 状态文本
//!
//! 托盘图标等外部界面只需要一行简短状态。捕获成功后显示
//! “上次捕获: HH:MM:SS”，经过固定延迟后恢复默认文本。

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::time::Instant;

pub const DEFAULT_STATUS: &str = "剪贴板图片监视器";

/// 状态文本的输出端。
pub trait StatusSink {
    fn show(&mut self, text: &str);
}

/// 可跨线程读取的状态文本，供外部界面轮询。
#[derive(Debug, Clone)]
pub struct SharedStatus(Arc<Mutex<String>>);

impl Default for SharedStatus {
    fn default() -> Self {
        Self(Arc::new(Mutex::new(DEFAULT_STATUS.to_string())))
    }
}

impl SharedStatus {
    pub fn get(&self) -> String {
        match self.0.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl StatusSink for SharedStatus {
    fn show(&mut self, text: &str) {
        log::info!("💬 状态: {}", text);
        let mut guard = match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("状态文本锁中毒，继续使用恢复数据");
                poisoned.into_inner()
            }
        };
        *guard = text.to_string();
    }
}

/// 管理“捕获提示 → 默认文本”的切换。
#[derive(Debug)]
pub struct StatusReporter<S> {
    sink: S,
    revert_after: Duration,
    revert_at: Option<Instant>,
}

impl<S: StatusSink> StatusReporter<S> {
    pub fn new(mut sink: S, revert_after: Duration) -> Self {
        sink.show(DEFAULT_STATUS);
        Self {
            sink,
            revert_after,
            revert_at: None,
        }
    }

    /// 显示捕获时间，并安排恢复默认文本。
    pub fn captured(&mut self, now: Instant, at: DateTime<Local>) {
        let text = format!("上次捕获: {}", at.format("%H:%M:%S"));
        self.sink.show(&text);
        self.revert_at = Some(now + self.revert_after);
    }

    pub fn revert_deadline(&self) -> Option<Instant> {
        self.revert_at
    }

    /// 到期则恢复默认文本，返回是否发生了恢复。
    pub fn revert_if_due(&mut self, now: Instant) -> bool {
        match self.revert_at {
            Some(deadline) if deadline <= now => {
                self.revert_at = None;
                self.sink.show(DEFAULT_STATUS);
                true
            }
            _ => false,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
