//! # 捕获编排
//!
//! ## 设计思路
//!
//! `CaptureOrchestrator` 拥有流水线的全部可变状态：剪贴板后端、截图缓存、
//! 提取器、防抖调度器与状态文本。它只由唯一的处理循环调用，
//! 因此内部不需要任何锁。
//!
//! ## 流程
//!
//! ```text
//! 通知 → classify ─┬─ 来自文件 / 无图片 → 跳过（并取消待处理的捕获）
//!                  └─ 内存图片 → 复制负载 → 防抖布置
//! 防抖到期 → make_space → extract ─┬─ 失败 → 记录日志，剪贴板保持不变
//!                                  └─ 成功 → save → 改写剪贴板 → 状态提示
//! ```
//!
//! 改写剪贴板失败不会回滚已保存的文件。

use std::path::PathBuf;

use chrono::Local;
use tokio::time::Instant;

use super::debounce::{ArmOutcome, DebounceScheduler};
use super::status::{StatusReporter, StatusSink};
use crate::capture::{ExtractionFailure, ImageExtractor, Strategy};
use crate::clipboard::{
    classify, ClipboardPayload, ClipboardReader, ClipboardRewriter, ClipboardWriter, FormatTag,
};
use crate::config::WatcherConfig;
use crate::storage::{CaptureStore, CleanupReport, StoreError};

/// 流水线计数器，用于日志与测试断言。
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub notifications: u64,
    pub skipped_file_origin: u64,
    pub skipped_no_image: u64,
    pub scheduled: u64,
    pub superseded: u64,
    pub extractions: u64,
    pub saved: u64,
    pub failed: u64,
    pub rewrites_failed: u64,
}

/// 一次捕获的结果。
#[derive(Debug)]
pub enum CaptureOutcome {
    Saved {
        path: PathBuf,
        strategy: Strategy,
        rewritten: bool,
    },
    ExtractionFailed(ExtractionFailure),
    SaveFailed(StoreError),
}

pub struct CaptureOrchestrator<B, S> {
    backend: B,
    store: CaptureStore,
    extractor: ImageExtractor,
    rewriter: ClipboardRewriter,
    debounce: DebounceScheduler<ClipboardPayload>,
    status: StatusReporter<S>,
    stats: PipelineStats,
}

impl<B, S> CaptureOrchestrator<B, S>
where
    B: ClipboardReader + ClipboardWriter,
    S: StatusSink,
{
    pub fn new(config: &WatcherConfig, backend: B, store: CaptureStore, sink: S) -> Self {
        Self {
            backend,
            store,
            extractor: ImageExtractor::new(config),
            rewriter: ClipboardRewriter::from_config(config),
            debounce: DebounceScheduler::new(config.debounce()),
            status: StatusReporter::new(sink, config.status_revert()),
            stats: PipelineStats::default(),
        }
    }

    pub fn with_extractor(mut self, extractor: ImageExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn store(&self) -> &CaptureStore {
        &self.store
    }

    pub fn status_sink(&self) -> &S {
        self.status.sink()
    }

    pub fn debounce_deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }

    pub fn status_deadline(&self) -> Option<Instant> {
        self.status.revert_deadline()
    }

    fn cancel_pending(&mut self, reason: &str) {
        if self.debounce.cancel() {
            log::debug!("⏹️ 剪贴板已变为{}，取消待处理的捕获", reason);
        }
    }

    /// 处理一次剪贴板变化通知。
    pub fn on_clipboard_changed(&mut self, now: Instant) {
        self.stats.notifications += 1;
        let snapshot = classify(&mut self.backend);

        // 必须先于任何解码判断文件来源
        if snapshot.originates_from_file {
            self.stats.skipped_file_origin += 1;
            let indicators: Vec<&str> = snapshot.file_indicators().map(FormatTag::name).collect();
            log::debug!("📂 剪贴板内容来自文件，跳过 (indicators={:?})", indicators);
            self.cancel_pending("文件");
            return;
        }
        if !snapshot.has_image {
            self.stats.skipped_no_image += 1;
            log::trace!("📋 剪贴板中没有图片，忽略");
            self.cancel_pending("非图片内容");
            return;
        }

        let names: Vec<&str> = snapshot.formats.iter().map(FormatTag::name).collect();
        log::info!("📋 检测到内存图片，可用格式: {}", names.join(", "));

        let payload = ClipboardPayload::capture(&mut self.backend, &snapshot);
        for (tag, kind) in payload.describe() {
            log::debug!("🔎 图片格式 {}: {}", tag, kind);
        }
        if let Some(bitmap) = payload.generic_bitmap.as_ref() {
            log::info!(
                "🖼️ 图片信息: {}x{} format={:?} alpha={}",
                bitmap.width,
                bitmap.height,
                bitmap.pixel_format,
                bitmap.pixel_format.has_alpha()
            );
        }
        if !payload.has_any_image() {
            log::warn!("📋 剪贴板声称有图片，但没有读到任何图片数据");
        }

        match self.debounce.arm(now, payload) {
            ArmOutcome::Armed => {
                self.stats.scheduled += 1;
                log::debug!("⏱️ 捕获已布置，{}ms 后处理", self.debounce.delay().as_millis());
            }
            ArmOutcome::Superseded { bursts } => {
                self.stats.superseded += 1;
                log::debug!("⏱️ 连续写入（第 {} 次），重置防抖计时", bursts);
            }
        }
    }

    /// 防抖到期时调用；未到期返回 `None`。
    pub fn on_debounce_elapsed(&mut self, now: Instant) -> Option<CaptureOutcome> {
        let payload = self.debounce.fire(now)?;
        Some(self.process_capture(payload, now))
    }

    fn process_capture(&mut self, mut payload: ClipboardPayload, now: Instant) -> CaptureOutcome {
        self.stats.extractions += 1;

        if let Err(err) = self.store.make_space() {
            log::warn!("🗂️ 腾出空间失败: {}", err);
        }

        let captured = match self.extractor.extract(&mut payload) {
            Ok(captured) => captured,
            Err(failure) => {
                self.stats.failed += 1;
                log::error!("❌ 截图提取失败，剪贴板保持不变: {}", failure);
                return CaptureOutcome::ExtractionFailed(failure);
            }
        };

        let path = match self.store.save(&captured) {
            Ok(path) => path,
            Err(err) => {
                self.stats.failed += 1;
                log::error!("❌ 保存截图失败，剪贴板保持不变: {}", err);
                return CaptureOutcome::SaveFailed(err);
            }
        };

        let rewritten = match self
            .rewriter
            .replace_with_file_reference(&mut self.backend, &path)
        {
            Ok(()) => true,
            Err(err) => {
                self.stats.rewrites_failed += 1;
                log::warn!("⚠️ 改写剪贴板失败，截图文件已保留: {}", err);
                false
            }
        };

        self.stats.saved += 1;
        self.status.captured(now, Local::now());

        CaptureOutcome::Saved {
            path,
            strategy: captured.strategy,
            rewritten,
        }
    }

    /// 状态提示到期时恢复默认文本。
    pub fn on_status_elapsed(&mut self, now: Instant) -> bool {
        self.status.revert_if_due(now)
    }

    /// 过期清理。
    pub fn sweep(&mut self) -> Result<CleanupReport, StoreError> {
        self.store.sweep()
    }

    /// 停止防抖并清空缓存；之后不应再调用其他方法。
    pub fn shutdown(&mut self) -> Result<CleanupReport, StoreError> {
        if self.debounce.cancel() {
            log::info!("⏹️ 退出时丢弃尚未处理的捕获");
        }
        self.store.purge_all()
    }
}
