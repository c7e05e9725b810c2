//! # 剪贴板负载副本
//!
//! 防抖期间剪贴板可能再次变化，而系统剪贴板无法“持有引用”。
//! 因此在每次合格通知到达时，把提取链可能用到的全部数据复制一份：
//! PNG/DIB 原始负载、原生位图与通用位图。防抖结束时只处理最后一份副本。

use std::collections::BTreeSet;

use super::{ClipboardReader, ClipboardSnapshot, FormatTag, RawPayload};
use crate::capture::RasterImage;

/// 按提取优先级需要预先读取原始负载的格式。
const RAW_FORMATS: [FormatTag; 3] = [FormatTag::Png, FormatTag::Dib, FormatTag::DibV5];

/// 某一时刻剪贴板图片数据的完整副本。
#[derive(Debug, Default)]
pub struct ClipboardPayload {
    pub formats: BTreeSet<FormatTag>,
    pub raw: Vec<(FormatTag, RawPayload)>,
    pub native_bitmap: Option<RasterImage>,
    pub generic_bitmap: Option<RasterImage>,
}

impl ClipboardPayload {
    /// 从剪贴板复制快照中列出的图片数据。
    ///
    /// 单个格式读取失败只记录日志，其余格式照常读取。
    pub fn capture<R: ClipboardReader + ?Sized>(
        reader: &mut R,
        snapshot: &ClipboardSnapshot,
    ) -> Self {
        let mut payload = ClipboardPayload {
            formats: snapshot.formats.clone(),
            ..ClipboardPayload::default()
        };

        for tag in RAW_FORMATS.iter().filter(|tag| snapshot.formats.contains(*tag)) {
            match reader.raw_payload(tag) {
                Ok(Some(raw)) => payload.raw.push((tag.clone(), raw)),
                Ok(None) => log::debug!("📦 格式 {} 已列出但没有数据", tag),
                Err(err) => log::debug!("📦 读取格式 {} 失败: {}", tag, err),
            }
        }

        if snapshot.formats.contains(&FormatTag::Bitmap) {
            match reader.native_bitmap() {
                Ok(bitmap) => payload.native_bitmap = bitmap,
                Err(err) => log::debug!("📦 读取原生位图失败: {}", err),
            }
        }

        match reader.generic_bitmap() {
            Ok(bitmap) => payload.generic_bitmap = bitmap,
            Err(err) => log::debug!("📦 读取通用位图失败: {}", err),
        }

        payload
    }

    pub fn raw_mut(&mut self, tag: &FormatTag) -> Option<&mut RawPayload> {
        self.raw
            .iter_mut()
            .find(|(candidate, _)| candidate == tag)
            .map(|(_, raw)| raw)
    }

    /// 至少有一种可供提取的数据。
    pub fn has_any_image(&self) -> bool {
        !self.raw.is_empty() || self.native_bitmap.is_some() || self.generic_bitmap.is_some()
    }

    /// 诊断用：列出图片相关格式及其负载形态。
    pub fn describe(&self) -> Vec<(FormatTag, String)> {
        self.formats
            .iter()
            .filter(|tag| tag.is_image_related())
            .map(|tag| {
                let kind = if let Some((_, raw)) = self.raw.iter().find(|(t, _)| t == tag) {
                    match raw {
                        RawPayload::Bytes(bytes) => format!("{} {} 字节", raw.kind(), bytes.len()),
                        RawPayload::Stream(_) => raw.kind().to_string(),
                    }
                } else if *tag == FormatTag::Bitmap && self.native_bitmap.is_some() {
                    "原生位图对象".to_string()
                } else {
                    "未读取".to_string()
                };
                (tag.clone(), kind)
            })
            .collect()
    }
}
