//! 截图缓存目录管理模块
//!
//! # 设计思路
//!
//! 截图文件本身就是缓存的唯一事实来源：没有索引文件，也没有内存中的列表。
//! 每次需要知道“有哪些截图”时都重新列目录、读创建时间，
//! 这样内存状态永远不会与磁盘脱节（捕获频率很低，列目录的开销可以接受）。
//!
//! 缓存受两个上限约束：
//! - **数量**：写入新截图前淘汰最旧的文件，保证写入后不超过 `max_files`。
//! - **时间**：周期性清理超过 `max_age` 的文件。
//!
//! # 实现思路
//!
//! - 只管理匹配 `<prefix>*.png` 的文件，目录中的其他文件一概不碰。
//! - 删除失败（如文件被其他进程锁定）逐个记录到 `CleanupReport`，
//!   不中断同批次的其余删除；文件已不存在视为删除成功。
//! - 删除函数可注入，便于测试模拟被锁定的文件。
//! - 文件名使用毫秒级时间戳，同一毫秒内冲突时追加补零的序号。

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Local};

use crate::capture::CapturedImage;
use crate::config::{WatcherConfig, CAPTURE_EXTENSION};

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S%3f";
/// 序号补零到 4 位，同一毫秒内的文件名按字典序即写入顺序
const MAX_NAME_COLLISIONS: u32 = 9_999;

/// 缓存目录操作错误
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("创建截图目录 '{}' 失败: {source}", .path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("读取截图目录 '{}' 失败: {source}", .path.display())]
    List { path: PathBuf, source: io::Error },

    #[error("写入截图 '{}' 失败: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("删除截图 '{}' 失败: {source}", .path.display())]
    Delete { path: PathBuf, source: io::Error },
}

/// 缓存中的一个截图文件。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFile {
    pub path: PathBuf,
    pub created_at: SystemTime,
}

impl CapturedFile {
    /// 相对 `now` 的存活时间；时钟回拨时视为 0。
    pub fn age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.created_at).unwrap_or_default()
    }
}

/// 一批删除操作的结果。
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub deleted: Vec<PathBuf>,
    pub failed: Vec<StoreError>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

type DeleteFn = Box<dyn Fn(&Path) -> io::Result<()> + Send>;

/// 截图缓存
pub struct CaptureStore {
    dir: PathBuf,
    prefix: String,
    max_files: usize,
    max_age: Duration,
    delete_fn: DeleteFn,
}

impl std::fmt::Debug for CaptureStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureStore")
            .field("dir", &self.dir)
            .field("prefix", &self.prefix)
            .field("max_files", &self.max_files)
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}

impl CaptureStore {
    /// 打开（必要时创建）截图目录。
    pub fn open(config: &WatcherConfig) -> Result<Self, StoreError> {
        let dir = config.capture_dir.clone();
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|source| StoreError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }

        log::info!(
            "🗂️ 截图缓存目录: {} (max_files={}, max_age={}s)",
            dir.display(),
            config.max_files,
            config.max_age_secs
        );

        Ok(Self {
            dir,
            prefix: config.file_prefix.clone(),
            max_files: config.max_files.max(1),
            max_age: config.max_age(),
            delete_fn: Box::new(|path| fs::remove_file(path)),
        })
    }

    /// 替换删除函数。
    pub fn with_delete_fn(mut self, delete_fn: DeleteFn) -> Self {
        self.delete_fn = delete_fn;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_files(&self) -> usize {
        self.max_files
    }

    /// `<prefix>*.png`，扩展名不区分大小写。
    fn is_capture_name(&self, name: &str) -> bool {
        let Some(rest) = name.strip_prefix(self.prefix.as_str()) else {
            return false;
        };
        let Some(split) = rest.len().checked_sub(CAPTURE_EXTENSION.len() + 1) else {
            return false;
        };
        match (rest.get(..split), rest.get(split..)) {
            (Some(stem), Some(ext)) => {
                !stem.is_empty()
                    && ext.starts_with('.')
                    && ext[1..].eq_ignore_ascii_case(CAPTURE_EXTENSION)
            }
            _ => false,
        }
    }

    /// 列出所有截图，按创建时间升序。每次调用都重新读取目录。
    pub fn list_captured(&self) -> Result<Vec<CapturedFile>, StoreError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| StoreError::List {
            path: self.dir.clone(),
            source,
        })?;

        let mut files = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !self.is_capture_name(name) {
                continue;
            }
            // 列目录与读取元数据之间文件可能已被删除
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let created_at = metadata
                .created()
                .or_else(|_| metadata.modified())
                .unwrap_or(UNIX_EPOCH);
            files.push(CapturedFile {
                path: entry.path(),
                created_at,
            });
        }

        files.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.path.cmp(&b.path))
        });
        Ok(files)
    }

    fn delete(&self, path: &Path) -> Result<(), StoreError> {
        match (self.delete_fn)(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Delete {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn delete_all<'a>(
        &self,
        files: impl IntoIterator<Item = &'a CapturedFile>,
        reason: &str,
    ) -> CleanupReport {
        let mut report = CleanupReport::default();
        for file in files {
            match self.delete(&file.path) {
                Ok(()) => {
                    log::info!("🗑️ 已删除截图（{}）: {}", reason, file.path.display());
                    report.deleted.push(file.path.clone());
                }
                Err(err) => {
                    log::warn!("⚠️ {}", err);
                    report.failed.push(err);
                }
            }
        }
        report
    }

    /// 淘汰最旧的截图，直到数量低于 `max_files`，为下一次写入腾出位置。
    ///
    /// 正常情况下最多只删除一个文件。
    pub fn make_space(&self) -> Result<CleanupReport, StoreError> {
        let files = self.list_captured()?;
        if files.len() < self.max_files {
            return Ok(CleanupReport::default());
        }
        let excess = files.len() + 1 - self.max_files;
        log::debug!(
            "🗂️ 截图数量 {} 已达上限 {}，淘汰最旧的 {} 个",
            files.len(),
            self.max_files,
            excess
        );
        Ok(self.delete_all(&files[..excess], "超出数量上限"))
    }

    fn next_path(&self, now: DateTime<Local>) -> PathBuf {
        let stamp = now.format(TIMESTAMP_FORMAT).to_string();
        self.dir
            .join(format!("{}{}.{}", self.prefix, stamp, CAPTURE_EXTENSION))
    }

    fn collision_path(&self, now: DateTime<Local>, n: u32) -> PathBuf {
        let stamp = now.format(TIMESTAMP_FORMAT).to_string();
        self.dir
            .join(format!("{}{}_{:04}.{}", self.prefix, stamp, n, CAPTURE_EXTENSION))
    }

    /// 写入新截图，返回文件路径。
    ///
    /// 写入前先腾出空间；淘汰失败只记录日志，不阻止写入。
    pub fn save(&self, image: &CapturedImage) -> Result<PathBuf, StoreError> {
        match self.make_space() {
            Ok(report) if !report.is_clean() => {
                log::warn!("🗂️ 有 {} 个旧截图未能淘汰", report.failed.len());
            }
            Ok(_) => {}
            Err(err) => log::warn!("🗂️ 腾出空间失败: {}", err),
        }

        let now = Local::now();
        let mut path = self.next_path(now);
        let mut collisions = 0;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let written = file.write_all(&image.png).and_then(|()| file.sync_all());
                    if let Err(source) = written {
                        drop(file);
                        let _ = fs::remove_file(&path);
                        return Err(StoreError::Write { path, source });
                    }
                    break;
                }
                Err(err)
                    if err.kind() == io::ErrorKind::AlreadyExists
                        && collisions < MAX_NAME_COLLISIONS =>
                {
                    collisions += 1;
                    path = self.collision_path(now, collisions);
                }
                Err(source) => return Err(StoreError::Write { path, source }),
            }
        }

        log::info!(
            "💾 已保存截图: {} ({}x{}, {} 字节, strategy={})",
            path.display(),
            image.width,
            image.height,
            image.png.len(),
            image.strategy
        );
        Ok(path)
    }

    /// 删除所有超过 `max_age` 的截图。
    pub fn sweep(&self) -> Result<CleanupReport, StoreError> {
        self.sweep_at(SystemTime::now())
    }

    /// 以 `now` 为当前时间执行过期清理。
    pub fn sweep_at(&self, now: SystemTime) -> Result<CleanupReport, StoreError> {
        let files = self.list_captured()?;
        let expired: Vec<&CapturedFile> = files
            .iter()
            .filter(|file| file.age(now) > self.max_age)
            .collect();

        if expired.is_empty() {
            log::debug!("🧹 过期清理: 没有超过 {}s 的截图", self.max_age.as_secs());
            return Ok(CleanupReport::default());
        }

        let report = self.delete_all(expired, "已过期");
        log::info!(
            "🧹 过期清理完成: 删除 {} 个，失败 {} 个",
            report.deleted.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// 删除全部截图，退出时调用。
    pub fn purge_all(&self) -> Result<CleanupReport, StoreError> {
        let files = self.list_captured()?;
        log::info!("🧹 正在关闭，清理全部 {} 个缓存截图", files.len());
        let report = self.delete_all(&files, "退出清理");
        log::info!(
            "🧹 缓存清理完成: 删除 {} 个，失败 {} 个",
            report.deleted.len(),
            report.failed.len()
        );
        Ok(report)
    }
}
