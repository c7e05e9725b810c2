//! # Windows 剪贴板后端
//!
//! ## 实现思路
//!
//! - `ClipboardSession`：RAII 打开剪贴板，`Drop` 时自动 `CloseClipboard`；
//!   打开失败（被其他进程占用）会短暂重试。
//! - 格式枚举：`EnumClipboardFormats` + `GetClipboardFormatNameW`，
//!   标准格式没有注册名，按编号映射。
//! - 原始负载：`GetClipboardData` 得到全局内存句柄，`GlobalLock` 后整块复制。
//! - 原生位图：`CF_BITMAP` 通过 `GetDIBits` 取出 32 位自顶向下像素。
//! - 通用位图：交给 `arboard`，它已处理好 DIB/DIBV5 的各种变体。
//! - 写入文件列表：构造 `DROPFILES` + 宽字符路径，作为 `CF_HDROP` 写入。

use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use once_cell::sync::Lazy;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{GlobalFree, HANDLE, HGLOBAL};
use windows::Win32::Graphics::Gdi::{
    GetDC, GetDIBits, GetObjectW, ReleaseDC, BITMAP, BITMAPINFO, BITMAPINFOHEADER,
    DIB_RGB_COLORS, HBITMAP,
};
use windows::Win32::System::DataExchange::{
    CloseClipboard, EmptyClipboard, EnumClipboardFormats, GetClipboardData,
    GetClipboardFormatNameW, IsClipboardFormatAvailable, OpenClipboard,
    RegisterClipboardFormatW, SetClipboardData,
};
use windows::Win32::System::Memory::{
    GlobalAlloc, GlobalLock, GlobalSize, GlobalUnlock, GMEM_MOVEABLE,
};
use windows::Win32::System::Ole::{
    CF_BITMAP, CF_DIB, CF_DIBV5, CF_HDROP, CF_TEXT, CF_UNICODETEXT,
};
use windows::Win32::UI::Shell::DROPFILES;

use super::{ClipboardError, ClipboardReader, ClipboardWriter, FormatTag, RawPayload};
use crate::capture::{PixelFormat, RasterImage};

const OPEN_ATTEMPTS: u32 = 5;
const OPEN_RETRY_DELAY_MS: u64 = 20;
const FORMAT_NAME_CAPACITY: usize = 256;

/// 注册格式 "PNG" 的编号，进程内只注册一次。
static PNG_FORMAT_ID: Lazy<u32> = Lazy::new(|| register_format("PNG"));

fn register_format(name: &str) -> u32 {
    let wide: Vec<u16> = OsStr::new(name)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();
    unsafe { RegisterClipboardFormatW(PCWSTR(wide.as_ptr())) }
}

/// 已打开的剪贴板，离开作用域自动关闭。
struct ClipboardSession;

impl ClipboardSession {
    fn open() -> Result<Self, ClipboardError> {
        let mut last_error = None;
        for attempt in 1..=OPEN_ATTEMPTS {
            match unsafe { OpenClipboard(None) } {
                Ok(()) => return Ok(Self),
                Err(err) => {
                    log::trace!("打开剪贴板失败（attempt={}）: {:?}", attempt, err);
                    last_error = Some(err);
                    thread::sleep(Duration::from_millis(OPEN_RETRY_DELAY_MS));
                }
            }
        }
        Err(ClipboardError::Open(format!("{:?}", last_error)))
    }
}

impl Drop for ClipboardSession {
    fn drop(&mut self) {
        let _ = unsafe { CloseClipboard() };
    }
}

fn format_available(id: u32) -> bool {
    unsafe { IsClipboardFormatAvailable(id).is_ok() }
}

fn standard_format_name(id: u32) -> Option<&'static str> {
    match id {
        id if id == CF_TEXT.0 as u32 => Some("CF_TEXT"),
        id if id == CF_BITMAP.0 as u32 => Some("CF_BITMAP"),
        id if id == CF_DIB.0 as u32 => Some("CF_DIB"),
        id if id == CF_UNICODETEXT.0 as u32 => Some("CF_UNICODETEXT"),
        id if id == CF_HDROP.0 as u32 => Some("CF_HDROP"),
        id if id == CF_DIBV5.0 as u32 => Some("CF_DIBV5"),
        _ => None,
    }
}

fn format_name(id: u32) -> String {
    if let Some(name) = standard_format_name(id) {
        return name.to_string();
    }
    let mut buf = [0_u16; FORMAT_NAME_CAPACITY];
    let len = unsafe { GetClipboardFormatNameW(id, &mut buf) };
    if len > 0 {
        String::from_utf16_lossy(&buf[..len as usize])
    } else {
        format!("Format{}", id)
    }
}

fn format_id(tag: &FormatTag) -> Option<u32> {
    match tag {
        FormatTag::Png => Some(*PNG_FORMAT_ID),
        FormatTag::Dib => Some(CF_DIB.0 as u32),
        FormatTag::DibV5 => Some(CF_DIBV5.0 as u32),
        FormatTag::Bitmap => Some(CF_BITMAP.0 as u32),
        FormatTag::FileDrop => Some(CF_HDROP.0 as u32),
        FormatTag::Text => Some(CF_UNICODETEXT.0 as u32),
        _ => None,
    }
}

/// 复制全局内存块中的全部字节；调用方须已打开剪贴板。
unsafe fn read_global(id: u32, tag: &FormatTag) -> Result<Option<Vec<u8>>, ClipboardError> {
    let handle = match unsafe { GetClipboardData(id) } {
        Ok(handle) if !handle.is_invalid() => handle,
        _ => return Ok(None),
    };
    let hglobal = HGLOBAL(handle.0);
    let size = unsafe { GlobalSize(hglobal) };
    let ptr = unsafe { GlobalLock(hglobal) } as *const u8;
    if ptr.is_null() {
        return Err(ClipboardError::read(tag, "锁定全局内存失败"));
    }
    let bytes = unsafe { std::slice::from_raw_parts(ptr, size) }.to_vec();
    let _ = unsafe { GlobalUnlock(hglobal) };
    Ok(Some(bytes))
}

/// 通过 `GetDIBits` 读取 `CF_BITMAP` 像素；调用方须已打开剪贴板。
unsafe fn read_native_bitmap() -> Result<Option<RasterImage>, ClipboardError> {
    let handle = match unsafe { GetClipboardData(CF_BITMAP.0 as u32) } {
        Ok(handle) if !handle.is_invalid() => handle,
        _ => return Ok(None),
    };
    let hbitmap = HBITMAP(handle.0);

    let mut bitmap = BITMAP::default();
    let written = unsafe {
        GetObjectW(
            hbitmap.into(),
            std::mem::size_of::<BITMAP>() as i32,
            Some(&mut bitmap as *mut BITMAP as *mut std::ffi::c_void),
        )
    };
    if written == 0 || bitmap.bmWidth <= 0 || bitmap.bmHeight <= 0 {
        return Err(ClipboardError::read(FormatTag::Bitmap, "无法读取位图信息"));
    }

    let width = bitmap.bmWidth;
    let height = bitmap.bmHeight;
    let mut header = BITMAPINFOHEADER::default();
    header.biSize = std::mem::size_of::<BITMAPINFOHEADER>() as u32;
    header.biWidth = width;
    // 负高度表示自顶向下
    header.biHeight = -height;
    header.biPlanes = 1;
    header.biBitCount = 32;
    let mut info = BITMAPINFO {
        bmiHeader: header,
        ..Default::default()
    };

    let mut pixels = vec![0_u8; width as usize * height as usize * 4];
    let hdc = unsafe { GetDC(None) };
    let lines = unsafe {
        GetDIBits(
            hdc,
            hbitmap,
            0,
            height as u32,
            Some(pixels.as_mut_ptr() as *mut std::ffi::c_void),
            &mut info,
            DIB_RGB_COLORS,
        )
    };
    let _ = unsafe { ReleaseDC(None, hdc) };

    if lines <= 0 {
        return Err(ClipboardError::read(FormatTag::Bitmap, "GetDIBits 失败"));
    }

    Ok(Some(RasterImage::new(
        width as u32,
        height as u32,
        PixelFormat::Bgr32,
        pixels,
    )))
}

/// Win32 剪贴板
#[derive(Debug, Default)]
pub struct NativeClipboard;

impl NativeClipboard {
    pub fn new() -> Result<Self, ClipboardError> {
        Ok(Self)
    }
}

impl ClipboardReader for NativeClipboard {
    fn has_image(&mut self) -> Result<bool, ClipboardError> {
        Ok([*PNG_FORMAT_ID, CF_DIB.0 as u32, CF_DIBV5.0 as u32, CF_BITMAP.0 as u32]
            .into_iter()
            .any(format_available))
    }

    fn has_file_drop_list(&mut self) -> Result<bool, ClipboardError> {
        Ok(format_available(CF_HDROP.0 as u32))
    }

    fn formats(&mut self) -> Result<Vec<FormatTag>, ClipboardError> {
        let _session = ClipboardSession::open()?;
        let mut formats = Vec::new();
        let mut id = 0;
        loop {
            id = unsafe { EnumClipboardFormats(id) };
            if id == 0 {
                break;
            }
            formats.push(FormatTag::from_name(&format_name(id)));
        }
        Ok(formats)
    }

    fn raw_payload(&mut self, format: &FormatTag) -> Result<Option<RawPayload>, ClipboardError> {
        let Some(id) = format_id(format) else {
            return Ok(None);
        };
        if !format_available(id) {
            return Ok(None);
        }
        let _session = ClipboardSession::open()?;
        let bytes = unsafe { read_global(id, format) }?;
        Ok(bytes.map(RawPayload::Bytes))
    }

    fn native_bitmap(&mut self) -> Result<Option<RasterImage>, ClipboardError> {
        if !format_available(CF_BITMAP.0 as u32) {
            return Ok(None);
        }
        let _session = ClipboardSession::open()?;
        unsafe { read_native_bitmap() }
    }

    fn generic_bitmap(&mut self) -> Result<Option<RasterImage>, ClipboardError> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| ClipboardError::Open(e.to_string()))?;
        match clipboard.get_image() {
            Ok(image) => Ok(Some(RasterImage::new(
                image.width as u32,
                image.height as u32,
                PixelFormat::Rgba32,
                image.bytes.into_owned(),
            ))),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(err) => Err(ClipboardError::read("generic bitmap", err)),
        }
    }
}

impl ClipboardWriter for NativeClipboard {
    fn clear(&mut self) -> Result<(), ClipboardError> {
        let _session = ClipboardSession::open()?;
        unsafe { EmptyClipboard() }
            .map_err(|e| ClipboardError::Write(format!("清空剪贴板失败：{:?}", e)))
    }

    fn set_file_drop_list(&mut self, paths: &[PathBuf]) -> Result<(), ClipboardError> {
        if paths.is_empty() {
            return Err(ClipboardError::Write("没有可写入的文件路径".to_string()));
        }

        let encoded_paths: Vec<Vec<u16>> = paths
            .iter()
            .map(|path| {
                path.as_os_str()
                    .encode_wide()
                    .chain(std::iter::once(0))
                    .collect::<Vec<u16>>()
            })
            .collect();

        let _session = ClipboardSession::open()?;

        unsafe {
            EmptyClipboard()
                .map_err(|e| ClipboardError::Write(format!("清空剪贴板失败：{:?}", e)))?;

            let mut size = std::mem::size_of::<DROPFILES>();
            size += encoded_paths
                .iter()
                .map(|wide| wide.len() * std::mem::size_of::<u16>())
                .sum::<usize>();
            size += std::mem::size_of::<u16>();

            let hglobal = GlobalAlloc(GMEM_MOVEABLE, size)
                .map_err(|e| ClipboardError::Write(format!("分配内存失败：{:?}", e)))?;

            let ptr = GlobalLock(hglobal) as *mut u8;
            if ptr.is_null() {
                let _ = GlobalFree(Some(hglobal));
                return Err(ClipboardError::Write("锁定内存失败".to_string()));
            }

            let drop_files = ptr as *mut DROPFILES;
            std::ptr::write_bytes(drop_files, 0, 1);
            (*drop_files).pFiles = std::mem::size_of::<DROPFILES>() as u32;
            (*drop_files).fWide = true.into();

            let mut file_ptr = ptr.add(std::mem::size_of::<DROPFILES>()) as *mut u16;
            for wide in &encoded_paths {
                std::ptr::copy_nonoverlapping(wide.as_ptr(), file_ptr, wide.len());
                file_ptr = file_ptr.add(wide.len());
            }
            *file_ptr = 0;

            let _ = GlobalUnlock(hglobal);

            // 成功后内存归剪贴板所有，失败时才需要自行释放
            if let Err(e) = SetClipboardData(CF_HDROP.0 as u32, Some(HANDLE(hglobal.0))) {
                let _ = GlobalFree(Some(hglobal));
                return Err(ClipboardError::Write(format!("设置剪贴板数据失败：{:?}", e)));
            }
        }

        Ok(())
    }
}
