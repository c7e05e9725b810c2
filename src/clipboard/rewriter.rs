//! # 剪贴板改写
//!
//! 保存成功后把剪贴板内容替换为指向截图文件的单文件引用，
//! 这样粘贴到邮件附件、聊天上传框等只认文件的目标也能工作。
//!
//! 剪贴板可能正被其他进程占用，所以改写会按配置重试几次，
//! 间隔按指数退避增长并带少量随机抖动，避免与占用方同步撞车；
//! 最终失败只返回错误，已保存的文件不受影响。

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::{ClipboardError, ClipboardWriter};
use crate::config::WatcherConfig;

const RETRY_MAX_DELAY_MS: u64 = 1_000;

static JITTER_STATE: AtomicU64 = AtomicU64::new(0);

fn seed_jitter_state() -> u64 {
    let time_seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    let state = time_seed ^ ((std::process::id() as u64) << 32) ^ 0x9E37_79B9_7F4A_7C15;
    if state == 0 { 0xA5A5_5A5A_0123_4567 } else { state }
}

/// xorshift 伪随机数，只用于错开重试时间。
fn next_jitter_u64() -> u64 {
    let mut current = JITTER_STATE.load(Ordering::Relaxed);
    loop {
        let mut next = if current == 0 { seed_jitter_state() } else { current };
        next ^= next << 13;
        next ^= next >> 7;
        next ^= next << 17;

        match JITTER_STATE.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(observed) => current = observed,
        }
    }
}

/// 第 `attempt` 次失败后的等待时间：`base * 2^(attempt-1)`，
/// 不超过 `max_delay_ms`，再加上至多三分之一的抖动。
fn compute_retry_delay_ms(base_delay_ms: u64, attempt: u32, max_delay_ms: u64) -> u64 {
    let exp = base_delay_ms.saturating_mul(1_u64 << attempt.saturating_sub(1).min(8));
    let capped = exp.min(max_delay_ms.max(base_delay_ms));
    let jitter_bound = (capped / 3).max(1);
    let jitter = next_jitter_u64() % (jitter_bound + 1);
    capped.saturating_add(jitter)
}

#[derive(Debug, Clone)]
pub struct ClipboardRewriter {
    attempts: u32,
    retry_delay: Duration,
}

impl ClipboardRewriter {
    pub fn new(attempts: u32, retry_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            retry_delay,
        }
    }

    pub fn from_config(config: &WatcherConfig) -> Self {
        Self::new(config.clipboard_retries, config.clipboard_retry_delay())
    }

    /// 清空剪贴板并写入单个文件引用。
    pub fn replace_with_file_reference<W: ClipboardWriter + ?Sized>(
        &self,
        writer: &mut W,
        path: &Path,
    ) -> Result<(), ClipboardError> {
        let absolute = std::path::absolute(path).map_err(|e| {
            ClipboardError::Write(format!("无法解析绝对路径 '{}': {}", path.display(), e))
        })?;
        let paths = [absolute];

        let mut attempt = 1;
        loop {
            let result = writer
                .clear()
                .and_then(|()| writer.set_file_drop_list(&paths));

            match result {
                Ok(()) => {
                    log::info!("📎 剪贴板已改写为文件引用: {}", paths[0].display());
                    return Ok(());
                }
                Err(err) if attempt < self.attempts => {
                    let delay_ms = compute_retry_delay_ms(
                        self.retry_delay.as_millis() as u64,
                        attempt,
                        RETRY_MAX_DELAY_MS,
                    );
                    log::debug!(
                        "📎 改写剪贴板失败（attempt={}/{}），{}ms 后重试: {}",
                        attempt,
                        self.attempts,
                        delay_ms,
                        err
                    );
                    attempt += 1;
                    thread::sleep(Duration::from_millis(delay_ms));
                }
                Err(err) => return Err(err),
            }
        }
    }
}
