//! # 通用桌面剪贴板后端（`arboard`）
//!
//! `arboard` 只暴露文本与 RGBA 图片，没有格式枚举，也没有文件列表。
//! 因此格式列表是合成的：有图片时列出一个位图格式，
//! 文本全部由 `file://` URI 组成时视为文件来源。
//! 改写剪贴板时写入截图文件的 `file://` URI 文本。
//!
//! `arboard` 判断有没有图片的唯一办法就是完整读取并解码一次，
//! 所以每次通知最多解码一次：`formats()` 作为分类的第一步清空缓存，
//! 先检查 URI 列表，确认不是文件来源后才读取图片，
//! 之后的 `has_image()` 与 `generic_bitmap()` 复用同一份结果。

use std::path::{Path, PathBuf};

use arboard::Clipboard;

use super::{ClipboardError, ClipboardReader, ClipboardWriter, FormatTag, RawPayload};
use crate::capture::{PixelFormat, RasterImage};

const IMAGE_FORMAT_NAME: &str = "image/x-arboard-bitmap";
const FILE_URI_SCHEME: &str = "file://";

/// 单次通知内的图片读取缓存，外层 `None` 表示尚未读取。
#[derive(Debug, Default)]
struct ImageCache {
    probed: Option<Option<RasterImage>>,
}

impl ImageCache {
    fn reset(&mut self) {
        self.probed = None;
    }

    fn has_image(
        &mut self,
        read: impl FnOnce() -> Result<Option<RasterImage>, ClipboardError>,
    ) -> Result<bool, ClipboardError> {
        if let Some(probed) = &self.probed {
            return Ok(probed.is_some());
        }
        let image = read()?;
        let present = image.is_some();
        self.probed = Some(image);
        Ok(present)
    }

    /// 取出缓存的图片，没有读取过时直接读取。
    fn take(
        &mut self,
        read: impl FnOnce() -> Result<Option<RasterImage>, ClipboardError>,
    ) -> Result<Option<RasterImage>, ClipboardError> {
        match self.probed.take() {
            Some(image) => Ok(image),
            None => read(),
        }
    }
}

fn read_image(clipboard: &mut Clipboard) -> Result<Option<RasterImage>, ClipboardError> {
    match clipboard.get_image() {
        Ok(image) => Ok(Some(RasterImage::new(
            image.width as u32,
            image.height as u32,
            PixelFormat::Rgba32,
            image.bytes.into_owned(),
        ))),
        Err(arboard::Error::ContentNotAvailable) => Ok(None),
        Err(err) => Err(ClipboardError::read(IMAGE_FORMAT_NAME, err)),
    }
}

pub struct PortableClipboard {
    inner: Clipboard,
    image: ImageCache,
}

impl PortableClipboard {
    pub fn new() -> Result<Self, ClipboardError> {
        let inner = Clipboard::new().map_err(|e| ClipboardError::Open(e.to_string()))?;
        Ok(Self {
            inner,
            image: ImageCache::default(),
        })
    }

    fn text(&mut self) -> Option<String> {
        self.inner.get_text().ok()
    }
}

impl std::fmt::Debug for PortableClipboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PortableClipboard")
    }
}

/// 文本是否由一个或多个 `file://` URI 组成。
fn is_file_uri_list(text: &str) -> bool {
    let mut lines = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .peekable();
    lines.peek().is_some() && lines.all(|line| line.starts_with(FILE_URI_SCHEME))
}

/// 路径转为 `file://` URI，只转义 URI 中有歧义的字符。
fn file_uri(path: &Path) -> String {
    let mut uri = String::from(FILE_URI_SCHEME);
    let raw = path.to_string_lossy();
    if !raw.starts_with('/') {
        uri.push('/');
    }
    for ch in raw.chars() {
        match ch {
            '\\' => uri.push('/'),
            '%' => uri.push_str("%25"),
            ' ' => uri.push_str("%20"),
            '#' => uri.push_str("%23"),
            '?' => uri.push_str("%3F"),
            other => uri.push(other),
        }
    }
    uri
}

impl ClipboardReader for PortableClipboard {
    fn has_image(&mut self) -> Result<bool, ClipboardError> {
        let inner = &mut self.inner;
        self.image.has_image(|| read_image(inner))
    }

    fn has_file_drop_list(&mut self) -> Result<bool, ClipboardError> {
        Ok(self.text().is_some_and(|text| is_file_uri_list(&text)))
    }

    /// 分类的第一步：开始新一轮读取。
    fn formats(&mut self) -> Result<Vec<FormatTag>, ClipboardError> {
        self.image.reset();

        let text = self.text();
        if text.as_deref().is_some_and(is_file_uri_list) {
            return Ok(vec![FormatTag::FileUriList]);
        }

        let mut formats = Vec::new();
        if self.has_image()? {
            formats.push(FormatTag::from_name(IMAGE_FORMAT_NAME));
        }
        if text.is_some() {
            formats.push(FormatTag::Text);
        }
        Ok(formats)
    }

    fn raw_payload(&mut self, _format: &FormatTag) -> Result<Option<RawPayload>, ClipboardError> {
        Ok(None)
    }

    fn native_bitmap(&mut self) -> Result<Option<RasterImage>, ClipboardError> {
        Ok(None)
    }

    fn generic_bitmap(&mut self) -> Result<Option<RasterImage>, ClipboardError> {
        let inner = &mut self.inner;
        self.image.take(|| read_image(inner))
    }
}

impl ClipboardWriter for PortableClipboard {
    fn clear(&mut self) -> Result<(), ClipboardError> {
        self.image.reset();
        self.inner
            .clear()
            .map_err(|e| ClipboardError::Write(format!("清空剪贴板失败：{}", e)))
    }

    fn set_file_drop_list(&mut self, paths: &[PathBuf]) -> Result<(), ClipboardError> {
        if paths.is_empty() {
            return Err(ClipboardError::Write("没有可写入的文件路径".to_string()));
        }
        let uris = paths
            .iter()
            .map(|path| file_uri(path))
            .collect::<Vec<_>>()
            .join("\n");
        self.inner
            .set_text(uris)
            .map_err(|e| ClipboardError::Write(format!("写入文件 URI 失败：{}", e)))
    }
}
