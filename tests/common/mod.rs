#![allow(dead_code)]

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use clipboard_image_watcher::capture::raster::encode_png;
use clipboard_image_watcher::capture::{CapturedImage, PixelFormat, RasterImage, Strategy};
use clipboard_image_watcher::clipboard::{
    ClipboardError, ClipboardReader, ClipboardWriter, FormatTag, RawPayload,
};
use clipboard_image_watcher::config::WatcherConfig;

pub fn unique_temp_dir(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock error")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("clipboard-watcher-{tag}-{nanos}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

pub fn test_config(dir: &Path) -> WatcherConfig {
    WatcherConfig {
        capture_dir: dir.to_path_buf(),
        clipboard_retry_delay_ms: 1,
        ..WatcherConfig::default()
    }
}

pub fn png_bytes(width: u32, height: u32, shade: u8) -> Vec<u8> {
    let rgba = image::RgbaImage::from_pixel(width, height, image::Rgba([shade, shade, shade, 255]));
    encode_png(&rgba).expect("encode png")
}

/// 没有 14 字节文件头的 24 位 DIB。
pub fn dib_bytes(width: u32, height: u32) -> Vec<u8> {
    let rgb = image::RgbImage::from_pixel(width, height, image::Rgb([40, 80, 120]));
    let mut bmp = Vec::new();
    image::DynamicImage::ImageRgb8(rgb)
        .write_to(&mut Cursor::new(&mut bmp), image::ImageFormat::Bmp)
        .expect("encode bmp");
    bmp[14..].to_vec()
}

pub fn captured(shade: u8) -> CapturedImage {
    CapturedImage {
        strategy: Strategy::DirectStream,
        width: 2,
        height: 2,
        png: png_bytes(2, 2, shade),
    }
}

pub fn opaque_raster(width: u32, height: u32) -> RasterImage {
    RasterImage::new(
        width,
        height,
        PixelFormat::Bgra32,
        [10_u8, 20, 30, 255].repeat((width * height) as usize),
    )
}

#[derive(Default)]
pub struct FakeState {
    pub formats: Vec<FormatTag>,
    pub file_drop: bool,
    pub png: Option<Vec<u8>>,
    pub dib: Option<Vec<u8>>,
    pub dib_as_stream: bool,
    pub native: Option<RasterImage>,
    pub generic: Option<RasterImage>,
    pub fail_queries: bool,
    /// 连 `has_image` 查询也失败
    pub fail_image_query: bool,
    /// 剩余的写入失败次数
    pub fail_writes: u32,
    pub clears: u32,
    pub written: Vec<Vec<PathBuf>>,
}

/// 内存中的假剪贴板，克隆后共享同一份状态。
#[derive(Clone, Default)]
pub struct FakeClipboard(pub Arc<Mutex<FakeState>>);

impl FakeClipboard {
    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.0.lock().expect("fake clipboard lock")
    }

    /// 截图工具写入的 PNG 流。
    pub fn put_png(&self, png: Vec<u8>) {
        let mut state = self.state();
        state.formats = vec![FormatTag::Png];
        state.file_drop = false;
        state.png = Some(png);
        state.dib = None;
        state.native = None;
        state.generic = None;
    }

    /// 只有通用位图的截图。
    pub fn put_generic(&self, raster: RasterImage) {
        let mut state = self.state();
        state.formats = vec![FormatTag::Dib];
        state.file_drop = false;
        state.png = None;
        state.dib = None;
        state.native = None;
        state.generic = Some(raster);
    }

    /// 从文件管理器复制图片文件：同时带有图片格式与文件标记。
    pub fn put_file_copy(&self, indicators: Vec<FormatTag>, with_drop_list: bool) {
        let mut state = self.state();
        let mut formats = indicators;
        formats.push(FormatTag::Png);
        state.formats = formats;
        state.file_drop = with_drop_list;
        state.png = Some(png_bytes(2, 2, 7));
        state.generic = Some(opaque_raster(2, 2));
    }

    pub fn put_text(&self) {
        let mut state = self.state();
        state.formats = vec![FormatTag::Text];
        state.file_drop = false;
        state.png = None;
        state.dib = None;
        state.native = None;
        state.generic = None;
    }
}

impl ClipboardReader for FakeClipboard {
    fn has_image(&mut self) -> Result<bool, ClipboardError> {
        let state = self.state();
        if state.fail_image_query {
            return Err(ClipboardError::Open("held by another process".to_string()));
        }
        Ok(state.png.is_some()
            || state.dib.is_some()
            || state.native.is_some()
            || state.generic.is_some())
    }

    fn has_file_drop_list(&mut self) -> Result<bool, ClipboardError> {
        let state = self.state();
        if state.fail_queries {
            return Err(ClipboardError::Open("held by another process".to_string()));
        }
        Ok(state.file_drop)
    }

    fn formats(&mut self) -> Result<Vec<FormatTag>, ClipboardError> {
        let state = self.state();
        if state.fail_queries {
            return Err(ClipboardError::Open("held by another process".to_string()));
        }
        Ok(state.formats.clone())
    }

    fn raw_payload(&mut self, format: &FormatTag) -> Result<Option<RawPayload>, ClipboardError> {
        let state = self.state();
        let payload = match format {
            FormatTag::Png => state.png.clone().map(RawPayload::Bytes),
            FormatTag::Dib => state.dib.clone().map(|bytes| {
                if state.dib_as_stream {
                    let mut cursor = Cursor::new(bytes);
                    cursor.set_position(cursor.get_ref().len() as u64);
                    RawPayload::Stream(Box::new(cursor))
                } else {
                    RawPayload::Bytes(bytes)
                }
            }),
            _ => None,
        };
        Ok(payload)
    }

    fn native_bitmap(&mut self) -> Result<Option<RasterImage>, ClipboardError> {
        Ok(self.state().native.clone())
    }

    fn generic_bitmap(&mut self) -> Result<Option<RasterImage>, ClipboardError> {
        Ok(self.state().generic.clone())
    }
}

impl ClipboardWriter for FakeClipboard {
    fn clear(&mut self) -> Result<(), ClipboardError> {
        let mut state = self.state();
        if state.fail_writes > 0 {
            state.fail_writes -= 1;
            return Err(ClipboardError::Open("held by another process".to_string()));
        }
        state.clears += 1;
        state.formats.clear();
        state.png = None;
        state.dib = None;
        state.native = None;
        state.generic = None;
        Ok(())
    }

    fn set_file_drop_list(&mut self, paths: &[PathBuf]) -> Result<(), ClipboardError> {
        let mut state = self.state();
        state.written.push(paths.to_vec());
        state.formats = vec![FormatTag::FileDrop];
        state.file_drop = true;
        Ok(())
    }
}
