//! # 时间戳数据模型
//!
//! 定义从上游响应中抓取到的两类时间戳记录：
//! - `MessageTimestamp` - 单条消息的创建时间，以消息 id 为键
//! - `ConversationTimestamp` - 会话列表条目的创建/更新时间，以会话 id 为键
//!
//! 两类记录一旦写入即视为既成事实：创建时间不会事后改变，
//! 同键重复写入在语义上是无操作（上游对同一 id 总是返回相同的值）。
//! 记录只增不删，随页面生命周期（进程生命周期）存在。

use serde::{Deserialize, Serialize};

/// 消息时间戳记录
///
/// 从会话详情文档的 `mapping` 节点或 SSE 流式事件中提取。
/// 序列化为总线消息时使用 camelCase 字段名（`createTime`），
/// 与展示端约定的消息格式保持一致。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageTimestamp {
    /// 创建时间：Unix 秒（上游以浮点秒返回，可能带小数部分）
    pub create_time: f64,

    /// 消息作者角色（"user" / "assistant" 等），上游缺失时为 None
    pub role: Option<String>,
}

/// 会话时间戳记录
///
/// 从会话列表文档的 `items` 条目中提取，仅服务于侧边栏列表视图。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTimestamp {
    /// 创建时间：ISO 8601 格式字符串（上游原样透传，不做解析）
    pub create_time: String,

    /// 最后更新时间：ISO 8601 格式字符串，上游缺失时为 None
    pub update_time: Option<String>,

    /// 会话标题，上游缺失时为 None
    pub title: Option<String>,
}
