//! # ChatStamp - 命令行入口点
//!
//! 初始化日志后端后把控制权交给 `stamp_lib::run()`，
//! 核心管线的构建与事件循环均在 lib 中完成。
//!
//! 日志级别通过 `RUST_LOG` 环境变量控制（默认 info）。

/// 应用程序主入口函数
#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = stamp_lib::run().await {
        log::error!("启动失败: {}", e);
        std::process::exit(1);
    }
}
