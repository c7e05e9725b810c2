//! 剪贴板访问模块
//!
//! # 设计思路
//!
//! 捕获流水线只通过两个 trait 接触系统剪贴板：
//! - **`ClipboardReader`**：查询是否有图片、是否有文件列表、枚举格式、
//!   按格式读取原始负载、读取原生位图与通用位图。
//! - **`ClipboardWriter`**：清空剪贴板、写入文件引用列表。
//!
//! 具体平台实现放在子模块中（Windows 走 Win32 API，其他桌面走 `arboard`），
//! 测试则使用内存中的假剪贴板，流水线本身与平台无关。
//!
//! # 实现思路
//!
//! - `snapshot`：通知到达后先分类，文件来源的图片直接跳过。
//! - `payload`：把当前剪贴板内容一次性复制出来，供防抖结束后提取。
//! - `rewriter`：保存完成后把剪贴板改写为文件引用，带有限次重试。
//! - `listener`：基于 `clipboard-master` 的变化通知线程，带退避重启。
//! - 所有后端错误统一为 `ClipboardError`，由调用方决定记录日志还是向上传播。

pub mod format;
pub mod listener;
pub mod payload;
pub mod rewriter;
pub mod snapshot;

#[cfg(not(windows))]
pub mod portable;
#[cfg(windows)]
pub mod windows;

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::PathBuf;

use crate::capture::RasterImage;

pub use format::FormatTag;
pub use payload::ClipboardPayload;
pub use rewriter::ClipboardRewriter;
pub use snapshot::{classify, ClipboardSnapshot};

#[cfg(not(windows))]
pub use portable::PortableClipboard as SystemClipboard;
#[cfg(windows)]
pub use windows::NativeClipboard as SystemClipboard;

/// 剪贴板操作错误
#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    /// 剪贴板被其他进程占用或无法打开
    #[error("无法打开剪贴板: {0}")]
    Open(String),

    /// 读取某个格式的数据失败
    #[error("读取剪贴板格式 {format} 失败: {reason}")]
    Read { format: String, reason: String },

    /// 写入剪贴板失败
    #[error("写入剪贴板失败: {0}")]
    Write(String),

    /// 当前后端不支持该操作
    #[error("当前剪贴板后端不支持: {0}")]
    Unsupported(&'static str),
}

impl ClipboardError {
    pub fn read(format: impl fmt::Display, reason: impl fmt::Display) -> Self {
        Self::Read {
            format: format.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// 可读且可定位的字节流。
pub trait SeekRead: Read + Seek + Send {}

impl<T: Read + Seek + Send> SeekRead for T {}

/// 按格式读取到的原始负载。
///
/// 同一种格式在不同来源下可能是连续字节，也可能是游标位置不确定的流。
pub enum RawPayload {
    Bytes(Vec<u8>),
    Stream(Box<dyn SeekRead>),
}

impl RawPayload {
    /// 读出全部字节；流会先回到起点再读。
    pub fn read_all(&mut self) -> io::Result<Vec<u8>> {
        match self {
            Self::Bytes(bytes) => Ok(bytes.clone()),
            Self::Stream(stream) => {
                let position = stream.stream_position()?;
                if position != 0 {
                    log::debug!("🔁 数据流当前位置 {}，重置到起点", position);
                }
                stream.seek(SeekFrom::Start(0))?;
                let mut bytes = Vec::new();
                stream.read_to_end(&mut bytes)?;
                Ok(bytes)
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bytes(_) => "字节缓冲",
            Self::Stream(_) => "数据流",
        }
    }
}

impl fmt::Debug for RawPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => write!(f, "RawPayload::Bytes({} bytes)", bytes.len()),
            Self::Stream(_) => f.write_str("RawPayload::Stream(..)"),
        }
    }
}

/// 剪贴板读接口
pub trait ClipboardReader {
    /// 剪贴板中是否存在图片。
    fn has_image(&mut self) -> Result<bool, ClipboardError>;

    /// 剪贴板中是否存在文件列表。
    fn has_file_drop_list(&mut self) -> Result<bool, ClipboardError>;

    /// 当前所有可用的格式。
    fn formats(&mut self) -> Result<Vec<FormatTag>, ClipboardError>;

    /// 按格式读取原始负载，格式不存在时返回 `Ok(None)`。
    fn raw_payload(&mut self, format: &FormatTag) -> Result<Option<RawPayload>, ClipboardError>;

    /// 平台原生位图对象（如 Windows 的 `CF_BITMAP`）。
    fn native_bitmap(&mut self) -> Result<Option<RasterImage>, ClipboardError>;

    /// 剪贴板抽象层已解码好的通用位图。
    fn generic_bitmap(&mut self) -> Result<Option<RasterImage>, ClipboardError>;
}

/// 剪贴板写接口
pub trait ClipboardWriter {
    fn clear(&mut self) -> Result<(), ClipboardError>;

    /// 将剪贴板内容设置为文件引用列表。
    fn set_file_drop_list(&mut self, paths: &[PathBuf]) -> Result<(), ClipboardError>;
}

#[cfg(test)]
mod tests {
    use super::RawPayload;
    use std::io::{Cursor, Seek, SeekFrom};

    #[test]
    fn read_all_rewinds_streams() {
        let mut cursor = Cursor::new(vec![1_u8, 2, 3, 4]);
        cursor.seek(SeekFrom::Start(3)).expect("seek");
        let mut payload = RawPayload::Stream(Box::new(cursor));
        assert_eq!(payload.read_all().expect("read"), vec![1, 2, 3, 4]);
        // 第二次读取依然完整
        assert_eq!(payload.read_all().expect("read again"), vec![1, 2, 3, 4]);
    }

    #[test]
    fn read_all_returns_bytes_unchanged() {
        let mut payload = RawPayload::Bytes(vec![9, 8, 7]);
        assert_eq!(payload.read_all().expect("read"), vec![9, 8, 7]);
        assert_eq!(payload.kind(), "字节缓冲");
    }
}
