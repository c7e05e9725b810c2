//! # 提取策略
//!
//! 剪贴板上的图片往往同时以多种格式存在，而且各格式的质量参差不齐：
//! 有的程序写入的 DIB 缺了掩码，有的位图缓冲被截断。
//! 每个策略只负责一种数据来源，失败即返回 `StrategyFailed`，
//! 由提取器按固定顺序依次尝试。

use std::fmt;

use image::{ImageFormat, RgbaImage};

use super::dib::decode_dib;
use super::raster::{encode_png, inspect_dimensions, RasterImage};
use super::{CapturedImage, ExtractionFailure};
use crate::clipboard::{ClipboardPayload, FormatTag};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// PNG 等压缩数据流，原样写盘
    DirectStream,
    /// 平台原生位图对象
    NativeBitmap,
    /// `CF_DIB` / `CF_DIBV5`
    DeviceIndependentBitmap,
    /// 通用位图归一化后重新编码
    GenericReencode,
    /// 通用位图绘制到全新 32 位画布后编码
    DrawThrough,
}

impl Strategy {
    /// 默认尝试顺序。
    pub const ALL: [Strategy; 5] = [
        Strategy::DirectStream,
        Strategy::NativeBitmap,
        Strategy::DeviceIndependentBitmap,
        Strategy::GenericReencode,
        Strategy::DrawThrough,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::DirectStream => "direct-stream",
            Self::NativeBitmap => "native-bitmap",
            Self::DeviceIndependentBitmap => "dib",
            Self::GenericReencode => "generic-reencode",
            Self::DrawThrough => "draw-through",
        }
    }

    pub fn attempt(self, payload: &mut ClipboardPayload) -> Result<CapturedImage, ExtractionFailure> {
        let fail = |reason: String| ExtractionFailure::strategy_failed(self, reason);
        match self {
            Self::DirectStream => direct_stream(payload).map_err(fail),
            Self::NativeBitmap => {
                let bitmap = payload
                    .native_bitmap
                    .as_ref()
                    .ok_or_else(|| fail("剪贴板中没有原生位图".to_string()))?;
                let rgba = bitmap.to_rgba_strict().map_err(fail)?;
                encode(self, &rgba)
            }
            Self::DeviceIndependentBitmap => {
                let rgba = device_independent_bitmap(payload).map_err(fail)?;
                encode(self, &rgba)
            }
            Self::GenericReencode => {
                let bitmap = generic(payload).map_err(fail)?;
                let rgba = bitmap
                    .normalized()
                    .and_then(|normalized| normalized.to_rgba_strict())
                    .map_err(fail)?;
                let captured = encode(self, &rgba)?;
                // 编码结果必须能被读回，否则交给兜底策略
                let dimensions = inspect_dimensions(&captured.png).map_err(fail)?;
                if dimensions != (bitmap.width, bitmap.height) {
                    return Err(fail(format!(
                        "重编码结果尺寸 {:?} 与原图 {}x{} 不一致",
                        dimensions, bitmap.width, bitmap.height
                    )));
                }
                Ok(captured)
            }
            Self::DrawThrough => {
                let bitmap = generic(payload).map_err(fail)?;
                let surface = bitmap.draw_onto_surface().map_err(fail)?;
                encode(self, &surface)
            }
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn encode(strategy: Strategy, rgba: &RgbaImage) -> Result<CapturedImage, ExtractionFailure> {
    let png = encode_png(rgba).map_err(|reason| ExtractionFailure::strategy_failed(strategy, reason))?;
    Ok(CapturedImage {
        strategy,
        width: rgba.width(),
        height: rgba.height(),
        png,
    })
}

fn generic(payload: &ClipboardPayload) -> Result<&RasterImage, String> {
    payload
        .generic_bitmap
        .as_ref()
        .ok_or_else(|| "剪贴板中没有通用位图".to_string())
}

fn direct_stream(payload: &mut ClipboardPayload) -> Result<CapturedImage, String> {
    let raw = payload
        .raw_mut(&FormatTag::Png)
        .ok_or_else(|| "剪贴板中没有 PNG 数据流".to_string())?;
    let bytes = raw
        .read_all()
        .map_err(|e| format!("读取 PNG 数据流失败：{}", e))?;

    if !matches!(image::guess_format(&bytes), Ok(ImageFormat::Png)) {
        return Err(format!("PNG 数据签名无效（{} 字节）", bytes.len()));
    }
    // 完整解码一次，确认写盘的字节是可读的
    let decoded = image::load_from_memory_with_format(&bytes, ImageFormat::Png)
        .map_err(|e| format!("PNG 数据损坏：{}", e))?;

    Ok(CapturedImage {
        strategy: Strategy::DirectStream,
        width: decoded.width(),
        height: decoded.height(),
        png: bytes,
    })
}

fn device_independent_bitmap(payload: &mut ClipboardPayload) -> Result<RgbaImage, String> {
    let mut reasons = Vec::new();
    for tag in [FormatTag::Dib, FormatTag::DibV5] {
        let Some(raw) = payload.raw_mut(&tag) else {
            continue;
        };
        match decode_dib(raw) {
            Ok(image) => return Ok(image.to_rgba8()),
            Err(reason) => {
                log::debug!("🧩 {} 解码失败: {}", tag, reason);
                reasons.push(format!("{}: {}", tag, reason));
            }
        }
    }

    if reasons.is_empty() {
        Err("剪贴板中没有 DIB 数据".to_string())
    } else {
        Err(reasons.join("; "))
    }
}
