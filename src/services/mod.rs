//! # 业务逻辑服务模块
//!
//! 包含抓取-投递管线两端及其协作方的实现：
//! - `bus` - 抓取端与展示端之间唯一的消息总线（同源校验 + 封闭消息模式）
//! - `interceptor` - 抓取端：本地中转、URL 分类、提取、缓冲、排水应答
//! - `presenter` - 展示端：记录合并、排水调度、渲染触发
//! - `renderer` - 渲染协作方边界（trait + 日志默认实现 + 展示格式化）
//! - `settings_store` - 用户偏好的持久化与变更通知

pub mod bus;
pub mod interceptor;
pub mod presenter;
pub mod renderer;
pub mod settings_store;
