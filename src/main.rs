//! # 剪贴板图片监视器：应用入口
//!
//! 只负责日志初始化、读取配置、启动服务并等待退出信号。
//! 业务逻辑见 `lib.rs` 架构文档。

use clipboard_image_watcher::config::{settings_path, WatcherConfig};
use clipboard_image_watcher::watcher::WatcherService;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = WatcherConfig::load_or_default(&settings_path());

    let handle = match WatcherService::start(config) {
        Ok(handle) => handle,
        Err(err) => {
            log::error!("启动失败: {err}");
            std::process::exit(1);
        }
    };
    log::info!("状态: {}，按 Ctrl+C 退出", handle.status());

    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("等待退出信号失败: {err}");
    }

    // 关闭过程会阻塞等待处理线程，放到阻塞线程池中执行
    if let Err(err) = tokio::task::spawn_blocking(move || handle.shutdown()).await {
        log::error!("关闭服务失败: {err}");
    }
    log::info!("已退出");
}
