//! # 剪贴板快照分类
//!
//! 每次收到变化通知都先分类：只有“内存图片”（有图片、且没有任何文件来源标记）
//! 才进入捕获流程。从资源管理器复制的图片文件同样会让剪贴板出现图片格式，
//! 但它已经有磁盘文件了，不应再次捕获。
//!
//! 分类只做查询，没有副作用。文件来源判定在图片查询之前完成，
//! 判定为文件来源时不再查询图片，后端也就不必为此解码。
//! 查询失败时按“内存图片”处理，宁可多捕获一次也不悄悄丢掉截图：
//! 文件来源查询失败视为否，图片查询失败且没有可供推断的格式列表时视为是。

use std::collections::BTreeSet;

use super::{ClipboardReader, FormatTag};

/// 单次通知对应的剪贴板分类结果。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipboardSnapshot {
    pub has_image: bool,
    pub originates_from_file: bool,
    pub formats: BTreeSet<FormatTag>,
}

impl ClipboardSnapshot {
    /// 是否为需要捕获的内存图片。
    pub fn is_memory_image(&self) -> bool {
        self.has_image && !self.originates_from_file
    }

    /// 触发“文件来源”判定的格式。
    pub fn file_indicators(&self) -> impl Iterator<Item = &FormatTag> {
        self.formats.iter().filter(|tag| tag.is_file_indicator())
    }
}

/// 对当前剪贴板内容分类。
pub fn classify<R: ClipboardReader + ?Sized>(reader: &mut R) -> ClipboardSnapshot {
    let formats: BTreeSet<FormatTag> = match reader.formats() {
        Ok(formats) => formats.into_iter().collect(),
        Err(err) => {
            log::warn!("🔍 枚举剪贴板格式失败: {}", err);
            BTreeSet::new()
        }
    };

    let has_file_drop = match reader.has_file_drop_list() {
        Ok(present) => present,
        Err(err) => {
            log::warn!("🔍 查询文件列表失败，按非文件来源处理: {}", err);
            false
        }
    };
    let originates_from_file =
        has_file_drop || formats.iter().any(FormatTag::is_file_indicator);

    let has_image = if originates_from_file {
        // 文件来源一律跳过，图片格式只用于日志
        formats.iter().any(FormatTag::is_image_related)
    } else {
        match reader.has_image() {
            Ok(present) => present,
            Err(err) => {
                let fallback =
                    formats.is_empty() || formats.iter().any(FormatTag::is_image_related);
                log::warn!(
                    "🔍 查询图片失败，推断 has_image={} (formats={}): {}",
                    fallback,
                    formats.len(),
                    err
                );
                fallback
            }
        }
    };

    let snapshot = ClipboardSnapshot {
        has_image,
        originates_from_file,
        formats,
    };

    log::debug!(
        "🔍 剪贴板分类: has_image={} from_file={} formats={}",
        snapshot.has_image,
        snapshot.originates_from_file,
        snapshot.formats.len()
    );

    snapshot
}
