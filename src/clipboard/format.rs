use std::fmt;

/// 剪贴板格式标签。
///
/// 已知格式统一映射为枚举变体，其余格式保留原始名称。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FormatTag {
    /// 压缩的 PNG 数据流
    Png,
    /// `CF_DIB`
    Dib,
    /// `CF_DIBV5`
    DibV5,
    /// 平台原生位图句柄（`CF_BITMAP`）
    Bitmap,
    /// 文件列表（`CF_HDROP`）
    FileDrop,
    FileName,
    FileNameW,
    /// 资源管理器对象列表
    ShellIdList,
    /// 拖放效果标记
    PreferredDropEffect,
    /// `file://` URI 列表
    FileUriList,
    Text,
    Other(String),
}

impl FormatTag {
    /// 由平台给出的格式名称解析标签。
    pub fn from_name(name: &str) -> Self {
        match name {
            "PNG" | "image/png" => Self::Png,
            "CF_DIB" | "DeviceIndependentBitmap" => Self::Dib,
            "CF_DIBV5" | "Format17" => Self::DibV5,
            "CF_BITMAP" | "Bitmap" => Self::Bitmap,
            "CF_HDROP" | "FileDrop" => Self::FileDrop,
            "FileName" => Self::FileName,
            "FileNameW" => Self::FileNameW,
            "Shell IDList Array" => Self::ShellIdList,
            "Preferred DropEffect" => Self::PreferredDropEffect,
            "text/uri-list" => Self::FileUriList,
            "CF_TEXT" | "CF_UNICODETEXT" | "text/plain" => Self::Text,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Png => "PNG",
            Self::Dib => "CF_DIB",
            Self::DibV5 => "CF_DIBV5",
            Self::Bitmap => "CF_BITMAP",
            Self::FileDrop => "CF_HDROP",
            Self::FileName => "FileName",
            Self::FileNameW => "FileNameW",
            Self::ShellIdList => "Shell IDList Array",
            Self::PreferredDropEffect => "Preferred DropEffect",
            Self::FileUriList => "text/uri-list",
            Self::Text => "CF_UNICODETEXT",
            Self::Other(name) => name,
        }
    }

    /// 该格式是否说明剪贴板内容来自文件（而非内存中的新截图）。
    pub fn is_file_indicator(&self) -> bool {
        matches!(
            self,
            Self::FileDrop
                | Self::FileName
                | Self::FileNameW
                | Self::ShellIdList
                | Self::PreferredDropEffect
                | Self::FileUriList
        )
    }

    /// 诊断日志关心的图片相关格式。
    pub fn is_image_related(&self) -> bool {
        match self {
            Self::Png | Self::Dib | Self::DibV5 | Self::Bitmap => true,
            Self::Other(name) => {
                let upper = name.to_ascii_uppercase();
                ["PNG", "BITMAP", "DIB", "CF_"]
                    .iter()
                    .any(|needle| upper.contains(needle))
            }
            _ => false,
        }
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
