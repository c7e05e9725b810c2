//! # 位图与像素格式
//!
//! ## 设计思路
//!
//! `RasterImage` 是剪贴板后端交给提取链的“已解码位图”：宽、高、行跨度、
//! 像素格式与一段按行存储的像素缓冲。剪贴板给出的位图经常并不规整，
//! 行跨度可能带填充，缓冲也可能被截断，所以这里提供两套转换：
//!
//! - **严格转换**（`to_rgba_strict`）：缓冲必须完整，否则报错，
//!   用于格式级别的重编码。
//! - **宽松绘制**（`draw_onto_surface`）：在一张全新的 32 位透明画布上
//!   逐行合成可用数据，缺失的行保持透明，用于最后的兜底策略。
//!
//! 另外提供采样若干行的透明度诊断，只用于日志告警。

use std::borrow::Cow;

use image::{ImageEncoder, RgbaImage};
use image::codecs::png::PngEncoder;

/// 剪贴板位图的像素格式。
///
/// `Bgra32`、`Bgr32`、`Pbgra32` 视为可直接编码的 32 位格式，
/// 其余格式在重编码前需先归一化为 `Bgra32`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// B G R A，直通 alpha。
    Bgra32,
    /// B G R X，第四个字节无意义。
    Bgr32,
    /// B G R A，预乘 alpha。
    Pbgra32,
    Rgba32,
    Rgb24,
    Bgr24,
    Gray8,
    /// 无法识别的格式，仅记录每像素位数。
    Unknown { bits_per_pixel: u16 },
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            Self::Bgra32 | Self::Bgr32 | Self::Pbgra32 | Self::Rgba32 => Some(4),
            Self::Rgb24 | Self::Bgr24 => Some(3),
            Self::Gray8 => Some(1),
            Self::Unknown { .. } => None,
        }
    }

    /// 是否已是无需归一化的 32 位格式。
    pub fn is_encoder_ready(self) -> bool {
        matches!(self, Self::Bgra32 | Self::Bgr32 | Self::Pbgra32)
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, Self::Bgra32 | Self::Pbgra32 | Self::Rgba32)
    }

    /// 将单个像素转换为直通 alpha 的 RGBA。
    fn to_rgba(self, px: &[u8]) -> Option<[u8; 4]> {
        match self {
            Self::Bgra32 => Some([px[2], px[1], px[0], px[3]]),
            Self::Bgr32 | Self::Bgr24 => Some([px[2], px[1], px[0], 255]),
            Self::Pbgra32 => {
                let a = px[3];
                if a == 0 {
                    return Some([0, 0, 0, 0]);
                }
                let unpremultiply = |c: u8| ((c as u32 * 255 + a as u32 / 2) / a as u32).min(255) as u8;
                Some([unpremultiply(px[2]), unpremultiply(px[1]), unpremultiply(px[0]), a])
            }
            Self::Rgba32 => Some([px[0], px[1], px[2], px[3]]),
            Self::Rgb24 => Some([px[0], px[1], px[2], 255]),
            Self::Gray8 => Some([px[0], px[0], px[0], 255]),
            Self::Unknown { .. } => None,
        }
    }
}

/// 剪贴板中已解码的位图。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    /// 每行字节数（可能大于 `width * bytes_per_pixel`）。
    pub stride: usize,
    pub pixel_format: PixelFormat,
    pub pixels: Vec<u8>,
}

/// 透明度采样结果。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpacityReport {
    pub opaque: usize,
    pub sampled: usize,
    pub ratio: f64,
}

impl RasterImage {
    /// 以紧凑行跨度创建位图。
    pub fn new(width: u32, height: u32, pixel_format: PixelFormat, pixels: Vec<u8>) -> Self {
        let stride = match pixel_format.bytes_per_pixel() {
            Some(bpp) => width as usize * bpp,
            None if height > 0 => pixels.len() / height as usize,
            None => 0,
        };
        Self::with_stride(width, height, stride, pixel_format, pixels)
    }

    pub fn with_stride(
        width: u32,
        height: u32,
        stride: usize,
        pixel_format: PixelFormat,
        pixels: Vec<u8>,
    ) -> Self {
        Self {
            width,
            height,
            stride,
            pixel_format,
            pixels,
        }
    }

    fn row_bytes(&self) -> Option<usize> {
        self.pixel_format
            .bytes_per_pixel()
            .and_then(|bpp| (self.width as usize).checked_mul(bpp))
    }

    /// 第 `y` 行的有效像素字节；缓冲不足时返回 `None`。
    fn row(&self, y: u32) -> Option<&[u8]> {
        let row_bytes = self.row_bytes()?;
        let start = (y as usize).checked_mul(self.stride)?;
        let end = start.checked_add(row_bytes)?;
        self.pixels.get(start..end)
    }

    /// 缓冲中完整可用的行数。
    pub fn available_rows(&self) -> u32 {
        (0..self.height)
            .take_while(|&y| self.row(y).is_some())
            .count() as u32
    }

    fn validate_layout(&self) -> Result<usize, String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!("位图尺寸无效：{}x{}", self.width, self.height));
        }
        let row_bytes = self
            .row_bytes()
            .ok_or_else(|| format!("无法识别的像素格式：{:?}", self.pixel_format))?;
        if self.stride < row_bytes {
            return Err(format!("行跨度 {} 小于行宽 {}", self.stride, row_bytes));
        }
        let required = self
            .stride
            .checked_mul(self.height as usize - 1)
            .and_then(|n| n.checked_add(row_bytes))
            .ok_or_else(|| "位图尺寸导致内存溢出风险".to_string())?;
        if self.pixels.len() < required {
            return Err(format!(
                "像素缓冲不完整：期望至少 {} 字节，实际 {} 字节",
                required,
                self.pixels.len()
            ));
        }
        Ok(row_bytes)
    }

    /// 归一化为可编码的 32 位格式。
    ///
    /// 已是 `Bgra32`/`Bgr32`/`Pbgra32` 时原样借用，否则整体转换为紧凑的 `Bgra32`。
    pub fn normalized(&self) -> Result<Cow<'_, RasterImage>, String> {
        if self.pixel_format.is_encoder_ready() {
            return Ok(Cow::Borrowed(self));
        }

        self.validate_layout()?;
        let mut out = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for y in 0..self.height {
            let row = self.row(y).ok_or_else(|| format!("第 {} 行缺失", y))?;
            for px in row.chunks_exact(self.bytes_per_pixel_or_err()?) {
                let [r, g, b, a] = self
                    .pixel_format
                    .to_rgba(px)
                    .ok_or_else(|| format!("无法转换像素格式：{:?}", self.pixel_format))?;
                out.extend_from_slice(&[b, g, r, a]);
            }
        }

        Ok(Cow::Owned(RasterImage::new(
            self.width,
            self.height,
            PixelFormat::Bgra32,
            out,
        )))
    }

    fn bytes_per_pixel_or_err(&self) -> Result<usize, String> {
        self.pixel_format
            .bytes_per_pixel()
            .ok_or_else(|| format!("无法识别的像素格式：{:?}", self.pixel_format))
    }

    /// 严格转换为 RGBA，缓冲必须完整。
    pub fn to_rgba_strict(&self) -> Result<RgbaImage, String> {
        self.validate_layout()?;
        let bpp = self.bytes_per_pixel_or_err()?;
        let mut out = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for y in 0..self.height {
            let row = self.row(y).ok_or_else(|| format!("第 {} 行缺失", y))?;
            for px in row.chunks_exact(bpp) {
                let rgba = self
                    .pixel_format
                    .to_rgba(px)
                    .ok_or_else(|| format!("无法转换像素格式：{:?}", self.pixel_format))?;
                out.extend_from_slice(&rgba);
            }
        }

        RgbaImage::from_raw(self.width, self.height, out)
            .ok_or_else(|| "创建 RGBA 图像缓冲区失败".to_string())
    }

    /// 在全新的 32 位 ARGB 画布上合成位图，容忍截断的缓冲。
    pub fn draw_onto_surface(&self) -> Result<RgbaImage, String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!("位图尺寸无效：{}x{}", self.width, self.height));
        }
        let bpp = self.bytes_per_pixel_or_err()?;
        let rows = self.available_rows();
        if rows == 0 {
            return Err("位图中没有任何完整的像素行".to_string());
        }

        let mut layer = RgbaImage::new(self.width, rows);
        for y in 0..rows {
            let Some(row) = self.row(y) else { break };
            for (x, px) in row.chunks_exact(bpp).enumerate() {
                if let Some(rgba) = self.pixel_format.to_rgba(px) {
                    layer.put_pixel(x as u32, y, image::Rgba(rgba));
                }
            }
        }

        let mut surface = RgbaImage::new(self.width, self.height);
        image::imageops::overlay(&mut surface, &layer, 0, 0);
        Ok(surface)
    }

    /// 采样前 `max_rows` 行，统计 alpha > 0 的像素比例。
    ///
    /// 无 alpha 通道的格式视为全部不透明。
    pub fn opacity(&self, max_rows: usize) -> Option<OpacityReport> {
        let bpp = self.pixel_format.bytes_per_pixel()?;
        let rows = (self.available_rows() as usize).min(max_rows);

        let mut opaque = 0;
        let mut sampled = 0;
        for y in 0..rows as u32 {
            let row = self.row(y)?;
            for px in row.chunks_exact(bpp) {
                sampled += 1;
                if self.pixel_format.to_rgba(px).is_some_and(|[_, _, _, a]| a > 0) {
                    opaque += 1;
                }
            }
        }

        if sampled == 0 {
            return None;
        }

        Some(OpacityReport {
            opaque,
            sampled,
            ratio: opaque as f64 / sampled as f64,
        })
    }
}

/// 将 RGBA 图像编码为 PNG 字节。
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ColorType::Rgba8.into(),
        )
        .map_err(|e| format!("PNG 编码失败: {}", e))?;
    Ok(buf)
}

/// 仅读取图片头部获取尺寸，用于校验编码结果是否可读。
pub fn inspect_dimensions(bytes: &[u8]) -> Result<(u32, u32), String> {
    image::ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| format!("无法识别图片格式：{}", e))?
        .into_dimensions()
        .map_err(|e| format!("无法读取图片尺寸：{}", e))
}
