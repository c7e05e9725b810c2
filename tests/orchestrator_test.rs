mod common;

use std::path::PathBuf;
use std::time::Duration;

use clipboard_image_watcher::capture::Strategy;
use clipboard_image_watcher::clipboard::FormatTag;
use clipboard_image_watcher::config::WatcherConfig;
use clipboard_image_watcher::storage::CaptureStore;
use clipboard_image_watcher::watcher::{
    CaptureOrchestrator, CaptureOutcome, SharedStatus, DEFAULT_STATUS,
};
use common::{opaque_raster, png_bytes, test_config, unique_temp_dir, FakeClipboard};
use proptest::prelude::*;
use tokio::time::Instant;

type Orchestrator = CaptureOrchestrator<FakeClipboard, SharedStatus>;

struct Fixture {
    dir: PathBuf,
    config: WatcherConfig,
    clipboard: FakeClipboard,
    status: SharedStatus,
    orchestrator: Orchestrator,
}

impl Fixture {
    fn new(tag: &str) -> Self {
        let dir = unique_temp_dir(tag);
        let config = test_config(&dir);
        let clipboard = FakeClipboard::default();
        let status = SharedStatus::default();
        let store = CaptureStore::open(&config).expect("open store");
        let orchestrator =
            CaptureOrchestrator::new(&config, clipboard.clone(), store, status.clone());
        Self {
            dir,
            config,
            clipboard,
            status,
            orchestrator,
        }
    }

    /// 防抖恰好到期的时刻。
    fn after_debounce(&self, from: Instant) -> Instant {
        from + self.config.debounce()
    }

    fn saved_files(&self) -> usize {
        self.orchestrator
            .store()
            .list_captured()
            .expect("list")
            .len()
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

#[test]
fn memory_image_is_saved_and_clipboard_points_to_the_file() {
    let mut fx = Fixture::new("orch-save");
    let png = png_bytes(4, 4, 33);
    fx.clipboard.put_png(png.clone());

    let start = Instant::now();
    fx.orchestrator.on_clipboard_changed(start);
    assert!(fx.orchestrator.on_debounce_elapsed(start).is_none(), "not due yet");

    let outcome = fx
        .orchestrator
        .on_debounce_elapsed(fx.after_debounce(start))
        .expect("capture due");
    let CaptureOutcome::Saved { path, strategy, rewritten } = outcome else {
        panic!("expected a saved capture");
    };

    assert_eq!(strategy, Strategy::DirectStream);
    assert!(rewritten);
    assert_eq!(std::fs::read(&path).expect("read capture"), png);

    let state = fx.clipboard.state();
    assert_eq!(state.written.len(), 1);
    assert!(state.written[0][0].is_absolute());
    assert_eq!(state.written[0][0].file_name(), path.file_name());
    drop(state);

    assert_eq!(fx.orchestrator.stats().saved, 1);
    assert!(fx.status.get().starts_with("上次捕获: "));
}

#[test]
fn rewritten_clipboard_is_not_captured_again() {
    let mut fx = Fixture::new("orch-loop");
    fx.clipboard.put_png(png_bytes(2, 2, 1));

    let start = Instant::now();
    fx.orchestrator.on_clipboard_changed(start);
    fx.orchestrator.on_debounce_elapsed(fx.after_debounce(start));

    // 改写本身触发的通知
    fx.orchestrator.on_clipboard_changed(fx.after_debounce(start));
    assert_eq!(fx.orchestrator.debounce_deadline(), None);
    assert_eq!(fx.orchestrator.stats().skipped_file_origin, 1);
    assert_eq!(fx.saved_files(), 1);
}

#[test]
fn burst_of_writes_yields_one_capture_of_the_last_image() {
    let mut fx = Fixture::new("orch-burst");
    let start = Instant::now();
    let step = Duration::from_millis(100);

    let mut last = Vec::new();
    for i in 0..3_u32 {
        last = png_bytes(3, 3, 10 * i as u8 + 5);
        fx.clipboard.put_png(last.clone());
        fx.orchestrator.on_clipboard_changed(start + step * i);
    }

    // 第一次通知后 500ms 仍未到期
    assert!(fx.orchestrator.on_debounce_elapsed(start + Duration::from_millis(500)).is_none());

    let last_change = start + step * 2;
    let outcome = fx
        .orchestrator
        .on_debounce_elapsed(fx.after_debounce(last_change))
        .expect("capture due");
    let CaptureOutcome::Saved { path, .. } = outcome else {
        panic!("expected a saved capture");
    };
    assert_eq!(std::fs::read(path).expect("read capture"), last);

    let stats = fx.orchestrator.stats();
    assert_eq!((stats.scheduled, stats.superseded, stats.extractions), (1, 2, 1));
    assert_eq!(fx.saved_files(), 1);
    assert_eq!(fx.clipboard.state().written.len(), 1);
}

#[test]
fn text_copy_is_ignored_and_cancels_a_pending_capture() {
    let mut fx = Fixture::new("orch-text");
    let start = Instant::now();
    fx.clipboard.put_png(png_bytes(2, 2, 1));
    fx.orchestrator.on_clipboard_changed(start);

    fx.clipboard.put_text();
    fx.orchestrator.on_clipboard_changed(start + Duration::from_millis(50));

    assert!(fx.orchestrator.on_debounce_elapsed(start + Duration::from_secs(5)).is_none());
    assert_eq!(fx.orchestrator.stats().skipped_no_image, 1);
    assert_eq!(fx.saved_files(), 0);
    assert!(fx.clipboard.state().written.is_empty());
}

#[test]
fn extraction_failure_leaves_clipboard_and_directory_untouched() {
    let mut fx = Fixture::new("orch-fail");
    {
        let mut state = fx.clipboard.state();
        state.formats = vec![FormatTag::Png];
        state.png = Some(b"broken".to_vec());
    }

    let start = Instant::now();
    fx.orchestrator.on_clipboard_changed(start);
    let outcome = fx
        .orchestrator
        .on_debounce_elapsed(fx.after_debounce(start))
        .expect("capture due");

    assert!(matches!(outcome, CaptureOutcome::ExtractionFailed(_)));
    assert_eq!(fx.saved_files(), 0);
    let state = fx.clipboard.state();
    assert_eq!((state.clears, state.written.len()), (0, 0));
    drop(state);
    assert_eq!(fx.orchestrator.stats().failed, 1);
    assert_eq!(fx.status.get(), DEFAULT_STATUS);
}

#[test]
fn failed_rewrite_keeps_the_saved_file() {
    let mut fx = Fixture::new("orch-rewrite");
    fx.clipboard.put_generic(opaque_raster(3, 3));
    fx.clipboard.state().fail_writes = 10;

    let start = Instant::now();
    fx.orchestrator.on_clipboard_changed(start);
    let outcome = fx
        .orchestrator
        .on_debounce_elapsed(fx.after_debounce(start))
        .expect("capture due");

    let CaptureOutcome::Saved { path, strategy, rewritten } = outcome else {
        panic!("expected a saved capture");
    };
    assert_eq!(strategy, Strategy::GenericReencode);
    assert!(!rewritten);
    assert!(path.exists());
    assert_eq!(fx.orchestrator.stats().rewrites_failed, 1);
    assert!(fx.clipboard.state().written.is_empty());
}

#[test]
fn query_failure_is_treated_as_not_from_a_file() {
    let mut fx = Fixture::new("orch-query");
    fx.clipboard.put_generic(opaque_raster(2, 2));
    fx.clipboard.state().fail_queries = true;

    let start = Instant::now();
    fx.orchestrator.on_clipboard_changed(start);
    assert!(fx.orchestrator.debounce_deadline().is_some());

    let outcome = fx.orchestrator.on_debounce_elapsed(fx.after_debounce(start));
    assert!(matches!(outcome, Some(CaptureOutcome::Saved { .. })));
    assert_eq!(fx.saved_files(), 1);
}

#[test]
fn every_query_failing_still_schedules_a_capture() {
    let mut fx = Fixture::new("orch-query-all");
    fx.clipboard.put_generic(opaque_raster(2, 2));
    {
        let mut state = fx.clipboard.state();
        state.fail_queries = true;
        state.fail_image_query = true;
    }

    let start = Instant::now();
    fx.orchestrator.on_clipboard_changed(start);
    assert_eq!(fx.orchestrator.stats().skipped_no_image, 0);
    assert!(fx.orchestrator.debounce_deadline().is_some());

    let outcome = fx.orchestrator.on_debounce_elapsed(fx.after_debounce(start));
    assert!(matches!(
        outcome,
        Some(CaptureOutcome::Saved { strategy: Strategy::GenericReencode, .. })
    ));
    assert_eq!(fx.saved_files(), 1);
}

#[test]
fn shutdown_discards_pending_capture_and_purges_the_cache() {
    let mut fx = Fixture::new("orch-shutdown");
    let start = Instant::now();
    fx.clipboard.put_png(png_bytes(2, 2, 1));
    fx.orchestrator.on_clipboard_changed(start);
    fx.orchestrator.on_debounce_elapsed(fx.after_debounce(start));

    let later = fx.after_debounce(start) + Duration::from_secs(1);
    fx.clipboard.put_png(png_bytes(2, 2, 2));
    fx.orchestrator.on_clipboard_changed(later);

    let report = fx.orchestrator.shutdown().expect("shutdown");
    assert_eq!(report.deleted.len(), 1);
    assert_eq!(fx.orchestrator.debounce_deadline(), None);
    assert_eq!(fx.saved_files(), 0);
}

#[test]
fn status_reverts_after_the_configured_delay() {
    let mut fx = Fixture::new("orch-status");
    let start = Instant::now();
    fx.clipboard.put_png(png_bytes(2, 2, 1));
    fx.orchestrator.on_clipboard_changed(start);
    let captured_at = fx.after_debounce(start);
    fx.orchestrator.on_debounce_elapsed(captured_at);

    assert_eq!(
        fx.orchestrator.status_deadline(),
        Some(captured_at + fx.config.status_revert())
    );
    assert!(!fx.orchestrator.on_status_elapsed(captured_at + Duration::from_secs(1)));
    assert!(fx.orchestrator.on_status_elapsed(captured_at + fx.config.status_revert()));
    assert_eq!(fx.status.get(), DEFAULT_STATUS);
}

const FILE_INDICATORS: [FormatTag; 6] = [
    FormatTag::FileDrop,
    FormatTag::FileName,
    FormatTag::FileNameW,
    FormatTag::ShellIdList,
    FormatTag::PreferredDropEffect,
    FormatTag::FileUriList,
];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// 只要出现任意文件标记，就不写盘也不改写剪贴板。
    #[test]
    fn file_copies_are_never_captured(
        mask in 0_u8..64,
        with_drop_list in any::<bool>(),
    ) {
        prop_assume!(mask != 0 || with_drop_list);

        let mut fx = Fixture::new("orch-prop-file");
        let indicators: Vec<FormatTag> = FILE_INDICATORS
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, tag)| tag.clone())
            .collect();
        fx.clipboard.put_file_copy(indicators, with_drop_list);

        let start = Instant::now();
        fx.orchestrator.on_clipboard_changed(start);
        prop_assert!(fx.orchestrator.on_debounce_elapsed(start + Duration::from_secs(5)).is_none());

        prop_assert_eq!(fx.orchestrator.stats().skipped_file_origin, 1);
        prop_assert_eq!(fx.saved_files(), 0);
        let state = fx.clipboard.state();
        prop_assert_eq!(state.clears, 0);
        prop_assert!(state.written.is_empty());
    }
}
