use super::raster::OpacityReport;
use super::{ExtractionFailure, Strategy};
use crate::clipboard::ClipboardPayload;
use crate::config::WatcherConfig;

/// 提取成功的图片，`png` 即最终写盘的字节。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    pub strategy: Strategy,
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

/// 按固定优先级依次尝试各提取策略。
#[derive(Debug, Clone)]
pub struct ImageExtractor {
    strategies: Vec<Strategy>,
    opacity_sample_rows: usize,
    opacity_warn_ratio: f64,
}

impl ImageExtractor {
    pub fn new(config: &WatcherConfig) -> Self {
        Self {
            strategies: Strategy::ALL.to_vec(),
            opacity_sample_rows: config.opacity_sample_rows,
            opacity_warn_ratio: config.opacity_warn_ratio,
        }
    }

    /// 替换策略列表（保持给定顺序）。
    pub fn with_strategies(mut self, strategies: Vec<Strategy>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// 透明度诊断：采样通用位图（没有则用原生位图）的前若干行。
    ///
    /// 只输出日志，不影响是否保存。
    pub fn analyze_opacity(&self, payload: &ClipboardPayload) -> Option<OpacityReport> {
        let bitmap = payload
            .generic_bitmap
            .as_ref()
            .or(payload.native_bitmap.as_ref())?;
        let report = bitmap.opacity(self.opacity_sample_rows)?;

        if report.ratio < self.opacity_warn_ratio {
            log::warn!(
                "🫥 截图几乎完全透明：采样 {} 个像素，仅 {} 个不透明（{:.2}%）",
                report.sampled,
                report.opaque,
                report.ratio * 100.0
            );
        } else {
            log::debug!(
                "🔬 透明度采样: opaque={}/{} ({:.2}%)",
                report.opaque,
                report.sampled,
                report.ratio * 100.0
            );
        }
        Some(report)
    }

    /// 依次尝试各策略，返回第一个成功的结果。
    ///
    /// 单个策略失败只会继续下一个；全部失败时返回
    /// `AllStrategiesFailed`，其中按顺序保存了每次失败的原因。
    pub fn extract(&self, payload: &mut ClipboardPayload) -> Result<CapturedImage, ExtractionFailure> {
        self.analyze_opacity(payload);

        let mut failures = Vec::with_capacity(self.strategies.len());
        for &strategy in &self.strategies {
            log::debug!("🧪 尝试提取策略: {}", strategy);
            match strategy.attempt(payload) {
                Ok(captured) => {
                    log::info!(
                        "✅ 提取成功: strategy={} size={}x{} bytes={}",
                        strategy,
                        captured.width,
                        captured.height,
                        captured.png.len()
                    );
                    return Ok(captured);
                }
                Err(err) => {
                    log::debug!("⏭️ {}", err);
                    failures.push(err);
                }
            }
        }

        Err(ExtractionFailure::AllStrategiesFailed(failures))
    }
}

#[cfg(test)]
mod tests {
    use super::ImageExtractor;
    use crate::capture::raster::{PixelFormat, RasterImage};
    use crate::capture::{ExtractionFailure, Strategy};
    use crate::clipboard::ClipboardPayload;
    use crate::config::WatcherConfig;

    #[test]
    fn empty_payload_reports_every_strategy_in_order() {
        let extractor = ImageExtractor::new(&WatcherConfig::default());
        let err = extractor
            .extract(&mut ClipboardPayload::default())
            .expect_err("nothing to extract");

        assert!(matches!(err, ExtractionFailure::AllStrategiesFailed(_)));
        assert_eq!(err.failed_strategies(), Strategy::ALL.to_vec());
    }

    #[test]
    fn custom_strategy_list_is_respected() {
        let extractor = ImageExtractor::new(&WatcherConfig::default())
            .with_strategies(vec![Strategy::DrawThrough]);
        let mut payload = ClipboardPayload {
            generic_bitmap: Some(RasterImage::new(2, 2, PixelFormat::Rgba32, vec![9; 16])),
            ..ClipboardPayload::default()
        };

        let captured = extractor.extract(&mut payload).expect("draw through");
        assert_eq!(captured.strategy, Strategy::DrawThrough);
        assert_eq!(extractor.strategies(), &[Strategy::DrawThrough]);
    }

    #[test]
    fn transparent_capture_is_reported_but_still_extracted() {
        let extractor = ImageExtractor::new(&WatcherConfig::default());
        let mut payload = ClipboardPayload {
            generic_bitmap: Some(RasterImage::new(3, 3, PixelFormat::Bgra32, vec![0; 36])),
            ..ClipboardPayload::default()
        };

        let report = extractor.analyze_opacity(&payload).expect("report");
        assert_eq!(report.opaque, 0);
        let captured = extractor.extract(&mut payload).expect("extract");
        assert_eq!(captured.strategy, Strategy::GenericReencode);
    }
}
