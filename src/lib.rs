//! # 剪贴板图片监视器：库入口
//!
//! 监视系统剪贴板中新出现的内存图片（截图、画图软件的复制等），
//! 把它们保存到一个小型轮转缓存目录，再把剪贴板改写为指向该文件的引用，
//! 这样粘贴到只接受文件的目标（邮件附件、聊天上传）也能工作。
//!
//! ## 架构总览
//!
//! ```text
//! ┌─ clipboard-listener 线程 ─┐
//! │  clipboard-master 通知    │
//! └────────────┬──────────────┘
//!              │ WatcherEvent (mpsc)
//! ┌────────────▼─────────────────────────────────────────────┐
//! │ capture-pipeline 线程（单线程 tokio 运行时）              │
//! │                                                          │
//! │  run_event_loop ── 通知 / 防抖 / 状态恢复 / 周期清理      │
//! │       │                                                  │
//! │  CaptureOrchestrator                                     │
//! │   ├─ clipboard::classify      内存图片 or 文件来源        │
//! │   ├─ DebounceScheduler        至多一个待处理捕获          │
//! │   ├─ ImageExtractor           五级提取策略链              │
//! │   ├─ CaptureStore             数量 + 时间受限的文件缓存   │
//! │   └─ ClipboardRewriter        改写为文件引用              │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError` |
//! | [`config`] | `WatcherConfig` 默认值、JSON 配置文件与范围夹紧 |
//! | [`clipboard`] | 读写 trait、格式标签、快照分类、负载副本、改写、监听、平台后端 |
//! | [`capture`] | 位图归一化、DIB 解码、提取策略链 |
//! | [`storage`] | 以目录为唯一事实来源的截图缓存 |
//! | [`watcher`] | 防抖、状态文本、编排器与事件循环 |

pub mod capture;
pub mod clipboard;
pub mod config;
pub mod error;
pub mod storage;
pub mod watcher;
