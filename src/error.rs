//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义全局统一的 `AppError` 枚举，聚合各子模块的错误：
//! 剪贴板读写 (`ClipboardError`)、图片提取 (`ExtractionFailure`)、
//! 截图缓存 (`StoreError`) 以及配置与监听器启动失败。
//!
//! 流水线内部的错误一律只写日志、不终止进程；只有启动阶段
//! （捕获目录不可用、监听线程无法创建）才会通过 `AppError` 向上传播。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为各子模块错误提供 `From` 转换，调用侧直接 `?` 即可。

use crate::capture::ExtractionFailure;
use crate::clipboard::ClipboardError;
use crate::storage::StoreError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 剪贴板读写操作失败
    #[error("{0}")]
    Clipboard(#[from] ClipboardError),

    /// 图片提取链全部失败
    #[error("{0}")]
    Extraction(#[from] ExtractionFailure),

    /// 截图缓存目录操作失败
    #[error("{0}")]
    Store(#[from] StoreError),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 配置文件无法解析
    #[error("配置错误: {0}")]
    Config(String),

    /// 剪贴板监听器无法启动
    #[error("剪贴板监听失败: {0}")]
    Listener(String),
}
