//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `WatcherConfig`：缓存容量、过期时间、清理周期、
//! 防抖延迟、状态回退延迟、剪贴板写入重试以及透明度诊断阈值。
//! 核心流程不依赖任何配置文件，`Default` 即为生产可用的参数。
//!
//! ## 实现思路
//!
//! - 可选的 `settings.json`（camelCase 键，所有键均可省略）覆盖默认值。
//! - 读取后统一 `normalized()`，将越界值夹紧到安全范围，而不是报错。
//! - 配置文件缺失不是错误；解析失败时记录日志并回退默认配置。

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::AppError;

/// 截图文件扩展名。
pub const CAPTURE_EXTENSION: &str = "png";

/// 指定配置文件路径的环境变量。
pub const CONFIG_ENV_VAR: &str = "CLIPBOARD_WATCHER_CONFIG";

const SETTINGS_FILE_NAME: &str = "settings.json";
const DEFAULT_FILE_PREFIX: &str = "capture_";

const MAX_FILES_RANGE: (usize, usize) = (1, 1_000);
const MAX_AGE_SECS_RANGE: (u64, u64) = (10, 7 * 24 * 3_600);
const SWEEP_INTERVAL_SECS_RANGE: (u64, u64) = (5, 24 * 3_600);
const DEBOUNCE_MS_RANGE: (u64, u64) = (50, 10_000);
const STATUS_REVERT_MS_RANGE: (u64, u64) = (500, 60_000);
const CLIPBOARD_RETRIES_RANGE: (u32, u32) = (1, 10);
const CLIPBOARD_RETRY_DELAY_MS_RANGE: (u64, u64) = (10, 1_000);
const OPACITY_SAMPLE_ROWS_RANGE: (usize, usize) = (1, 1_000);

/// 剪贴板截图监视器配置。
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WatcherConfig {
    /// 截图文件所在目录。
    pub capture_dir: PathBuf,
    /// 截图文件名前缀，文件名形如 `<prefix><yyyyMMddHHmmssfff>.png`。
    pub file_prefix: String,
    /// 缓存中最多保留的截图数量。
    pub max_files: usize,
    /// 截图最长保留时间（秒）。
    pub max_age_secs: u64,
    /// 过期清理周期（秒）。
    pub sweep_interval_secs: u64,
    /// 防抖延迟（毫秒）。
    pub debounce_ms: u64,
    /// 状态文本回退到默认值的延迟（毫秒）。
    pub status_revert_ms: u64,
    /// 改写剪贴板失败时的最大尝试次数。
    pub clipboard_retries: u32,
    /// 改写剪贴板重试间隔（毫秒）。
    pub clipboard_retry_delay_ms: u64,
    /// 透明度诊断时采样的像素行数。
    pub opacity_sample_rows: usize,
    /// 低于该不透明像素比例时输出警告。
    pub opacity_warn_ratio: f64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            capture_dir: default_capture_dir(),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            max_files: 3,
            max_age_secs: 3_600,
            sweep_interval_secs: 5 * 60,
            debounce_ms: 500,
            status_revert_ms: 3_000,
            clipboard_retries: 3,
            clipboard_retry_delay_ms: 50,
            opacity_sample_rows: 10,
            opacity_warn_ratio: 0.01,
        }
    }
}

impl WatcherConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn status_revert(&self) -> Duration {
        Duration::from_millis(self.status_revert_ms)
    }

    pub fn clipboard_retry_delay(&self) -> Duration {
        Duration::from_millis(self.clipboard_retry_delay_ms)
    }

    /// 将所有数值夹紧到允许范围，并修正非法的文件名前缀。
    pub fn normalized(mut self) -> Self {
        self.max_files = clamp(self.max_files, MAX_FILES_RANGE);
        self.max_age_secs = clamp(self.max_age_secs, MAX_AGE_SECS_RANGE);
        self.sweep_interval_secs = clamp(self.sweep_interval_secs, SWEEP_INTERVAL_SECS_RANGE);
        self.debounce_ms = clamp(self.debounce_ms, DEBOUNCE_MS_RANGE);
        self.status_revert_ms = clamp(self.status_revert_ms, STATUS_REVERT_MS_RANGE);
        self.clipboard_retries = clamp(self.clipboard_retries, CLIPBOARD_RETRIES_RANGE);
        self.clipboard_retry_delay_ms =
            clamp(self.clipboard_retry_delay_ms, CLIPBOARD_RETRY_DELAY_MS_RANGE);
        self.opacity_sample_rows = clamp(self.opacity_sample_rows, OPACITY_SAMPLE_ROWS_RANGE);

        if !self.opacity_warn_ratio.is_finite() {
            self.opacity_warn_ratio = 0.01;
        }
        self.opacity_warn_ratio = self.opacity_warn_ratio.clamp(0.0, 1.0);

        if !is_valid_prefix(&self.file_prefix) {
            log::warn!(
                "⚙️ 非法的文件名前缀 {:?}，回退为 {:?}",
                self.file_prefix,
                DEFAULT_FILE_PREFIX
            );
            self.file_prefix = DEFAULT_FILE_PREFIX.to_string();
        }

        if self.capture_dir.as_os_str().is_empty() {
            self.capture_dir = default_capture_dir();
        }

        self
    }

    /// 从 JSON 文件读取配置。
    ///
    /// # 返回
    /// - `Ok(Some(config))`：文件存在且解析成功（已夹紧）
    /// - `Ok(None)`：文件不存在
    /// - `Err(AppError::Config)`：文件存在但无法读取或解析
    pub fn load(path: &Path) -> Result<Option<Self>, AppError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("读取配置文件 '{}' 失败: {}", path.display(), e)))?;
        let parsed = serde_json::from_str::<WatcherConfig>(&content)
            .map_err(|e| AppError::Config(format!("解析配置文件 '{}' 失败: {}", path.display(), e)))?;

        Ok(Some(parsed.normalized()))
    }

    /// 读取配置，任何失败都回退到默认值。
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(Some(config)) => {
                log::info!("⚙️ 已加载配置文件: {}", path.display());
                config
            }
            Ok(None) => {
                log::debug!("⚙️ 未找到配置文件 {}，使用默认配置", path.display());
                Self::default()
            }
            Err(err) => {
                log::warn!("⚙️ {}，使用默认配置", err);
                Self::default()
            }
        }
    }
}

/// 配置文件路径：优先环境变量，否则为可执行文件旁的 `settings.json`。
pub fn settings_path() -> PathBuf {
    match std::env::var_os(CONFIG_ENV_VAR) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => default_capture_dir().join(SETTINGS_FILE_NAME),
    }
}

/// 默认捕获目录：可执行文件所在目录，取不到时回退到当前目录。
fn default_capture_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn is_valid_prefix(prefix: &str) -> bool {
    !prefix.is_empty()
        && !prefix.contains(['/', '\\', '*', '?', ':'])
        && prefix.trim() == prefix
}

fn clamp<T: PartialOrd>(value: T, (min, max): (T, T)) -> T {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::WatcherConfig;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    fn unique_temp_dir() -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock error")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("clipboard-watcher-config-test-{nanos}"));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn defaults_match_reference_constants() {
        let config = WatcherConfig::default();
        assert_eq!(config.max_files, 3);
        assert_eq!(config.max_age(), Duration::from_secs(3_600));
        assert_eq!(config.sweep_interval(), Duration::from_secs(300));
        assert_eq!(config.debounce(), Duration::from_millis(500));
        assert_eq!(config.status_revert(), Duration::from_secs(3));
        assert_eq!(config.file_prefix, "capture_");
    }

    #[test]
    fn normalized_clamps_out_of_range_values() {
        let config = WatcherConfig {
            max_files: 0,
            debounce_ms: 1,
            opacity_warn_ratio: 4.0,
            file_prefix: "../evil".to_string(),
            ..WatcherConfig::default()
        }
        .normalized();

        assert_eq!(config.max_files, 1);
        assert_eq!(config.debounce_ms, 50);
        assert_eq!(config.opacity_warn_ratio, 1.0);
        assert_eq!(config.file_prefix, "capture_");
    }

    #[test]
    fn load_reads_partial_camel_case_settings() {
        let dir = unique_temp_dir();
        let path = dir.join("settings.json");
        std::fs::write(&path, r#"{ "maxFiles": 5, "debounceMs": 250 }"#).expect("write settings");

        let config = WatcherConfig::load(&path)
            .expect("load settings")
            .expect("settings present");
        assert_eq!(config.max_files, 5);
        assert_eq!(config.debounce_ms, 250);
        assert_eq!(config.max_age_secs, 3_600);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn load_missing_file_returns_none_and_malformed_is_error() {
        let dir = unique_temp_dir();
        assert!(WatcherConfig::load(&dir.join("missing.json")).expect("missing ok").is_none());

        let broken = dir.join("broken.json");
        std::fs::write(&broken, "{ not json").expect("write broken");
        assert!(WatcherConfig::load(&broken).is_err());
        assert_eq!(WatcherConfig::load_or_default(&broken).max_files, 3);

        let _ = std::fs::remove_dir_all(dir);
    }
}
