//! 捕获流水线的调度与运行
//!
//! - `debounce`：至多一个待处理捕获的防抖状态机
//! - `status`：对外的简短状态文本
//! - `orchestrator`：分类 → 防抖 → 提取 → 保存 → 改写的完整流程
//! - `service`：专用处理线程、单消费者事件循环与关闭顺序

pub mod debounce;
pub mod orchestrator;
pub mod service;
pub mod status;

pub use debounce::{ArmOutcome, DebounceScheduler};
pub use orchestrator::{CaptureOrchestrator, CaptureOutcome, PipelineStats};
pub use service::{run_event_loop, WatcherEvent, WatcherHandle, WatcherService};
pub use status::{SharedStatus, StatusReporter, StatusSink, DEFAULT_STATUS};
