//! # ChatStamp - 核心初始化模块
//!
//! 聊天网页界面不展示消息的创建时间，但后端 API 的响应里一直带着它。
//! ChatStamp 以本地中转的方式坐在聊天客户端与后端之间，从三种响应形状
//! （会话详情文档、分页会话列表、实时 SSE 流）中旁路提取时间戳，
//! 经消息总线投递给展示端渲染。
//!
//! ## 模块结构
//! - `models/` - 数据模型（时间戳记录、设置、运行配置）
//! - `services/` - 核心业务逻辑（中转抓取、总线、展示、设置存储）
//! - `utils/` - 通用工具函数（路径、时间转换）
//!
//! ## 运行时拓扑
//! `run()` 在同一个 tokio runtime 上铺开三个长生命周期任务：
//! 中转服务器（抓取端）、排水监听、展示端主循环。
//! 抓取端与展示端互相隔离，只通过总线通信。

pub mod models;
pub mod services;
pub mod utils;

use std::sync::Arc;

use models::config::RelayConfig;
use services::bus::MessageBus;
use services::interceptor::{Interceptor, buffer::CaptureBuffer, proxy};
use services::presenter::Presenter;
use services::renderer::LogRenderer;
use services::settings_store::SettingsStore;

/// 应用启动函数
///
/// 构建并连接管线的所有组件，随后阻塞运行直到收到退出信号（Ctrl-C）。
///
/// # 错误
/// 配置目录不可定位、监听端口被占用等启动期失败返回错误信息；
/// 运行期的单次抓取失败不会让进程退出（fail open）。
pub async fn run() -> Result<(), String> {
    let config = RelayConfig::from_env();

    // 总线以上游 origin 作为同源标识；缓冲构造一次，进程生命周期共享
    let bus = MessageBus::new(config.upstream_base_url.clone());
    let buffer = Arc::new(CaptureBuffer::new());
    let interceptor = Arc::new(Interceptor::new(buffer, bus.clone()));

    let settings = SettingsStore::load().await?;

    let presenter = Presenter::new(
        bus.clone(),
        settings.subscribe(),
        Box::new(LogRenderer),
    );

    // 排水监听：应答展示端的 DRAIN_REQUEST
    let drain_task = {
        let interceptor = interceptor.clone();
        tokio::spawn(async move { interceptor.run_drain_listener().await })
    };
    let presenter_task = tokio::spawn(presenter.run());

    // 中转服务器在前台运行；Ctrl-C 触发整体退出
    let result = tokio::select! {
        served = proxy::serve(interceptor, config) => served,
        _ = tokio::signal::ctrl_c() => {
            log::info!("收到退出信号，停止中转");
            Ok(())
        }
    };

    drain_task.abort();
    presenter_task.abort();
    result
}
