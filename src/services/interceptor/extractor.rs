//! # 响应体提取器
//!
//! 从两种一次性 JSON 文档中提取时间戳记录：
//! - 会话详情文档：`mapping` 对象，节点可选地携带 message 记录
//! - 会话列表文档：`items` 数组，条目携带会话元信息
//!
//! 上游的 JSON 模式不受我们控制，且会随版本变化，因此统一使用
//! `serde_json::Value` 动态访问字段而非强类型反序列化。
//!
//! 每条路径都静默容错：JSON 解析失败、顶层键缺失、单个节点字段缺失，
//! 都只导致该调用贡献零条记录，绝不向上抛错。最坏结果是"少一个时间戳"，
//! 而被中转的响应本身不受任何影响。

use std::collections::HashMap;

use serde_json::Value;

use crate::models::timestamp::{ConversationTimestamp, MessageTimestamp};

/// 从 message 对象中提取一条消息时间戳记录
///
/// SSE 流式事件和详情文档的 message 对象共用同一形状：
/// `{"id": "...", "create_time": 秒, "author": {"role": "..."}}`。
///
/// # 参数
/// - `message` - message 对象的 `Value` 引用
///
/// # 返回值
/// - `Some((id, stamp))` - id 和 create_time 均非空时
/// - `None` - id 缺失、create_time 缺失或为 null 时（该节点被跳过）
pub fn message_from_value(message: &Value) -> Option<(String, MessageTimestamp)> {
    let id = message.get("id")?.as_str()?;
    // create_time 为 null 的节点（系统占位消息等）不产出记录
    let create_time = message.get("create_time")?.as_f64()?;
    let role = message
        .get("author")
        .and_then(|author| author.get("role"))
        .and_then(Value::as_str)
        .map(String::from);

    Some((
        id.to_string(),
        MessageTimestamp { create_time, role },
    ))
}

/// 从会话详情文档中提取全部消息时间戳
///
/// 文档形状：`{"mapping": {节点id: {"message": {...}}}}`。
/// 节点 id 是任意的树节点标识，产出记录以其中 message 的 id 为键。
/// 没有 message、或 message 缺少 id / create_time 的节点被跳过。
///
/// # 参数
/// - `body` - 响应体文本（恰好解析一次）
///
/// # 返回值
/// 提取到的记录映射；文档不符合预期形状时为空映射
pub fn extract_message_timestamps(body: &str) -> HashMap<String, MessageTimestamp> {
    let Ok(document) = serde_json::from_str::<Value>(body) else {
        return HashMap::new();
    };
    let Some(mapping) = document.get("mapping").and_then(Value::as_object) else {
        return HashMap::new();
    };

    mapping
        .values()
        .filter_map(|node| node.get("message"))
        .filter_map(message_from_value)
        .collect()
}

/// 从会话列表文档中提取全部会话时间戳
///
/// 文档形状：`{"items": [{"id","create_time","update_time","title"}, ...]}`。
/// `id` 和 `create_time`（字符串）是必需字段，缺失的条目被跳过；
/// `update_time` 和 `title` 缺失时记为 None。
///
/// # 参数
/// - `body` - 响应体文本（恰好解析一次）
///
/// # 返回值
/// 提取到的记录映射；文档不符合预期形状时为空映射
pub fn extract_conversation_timestamps(body: &str) -> HashMap<String, ConversationTimestamp> {
    let Ok(document) = serde_json::from_str::<Value>(body) else {
        return HashMap::new();
    };
    let Some(items) = document.get("items").and_then(Value::as_array) else {
        return HashMap::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let id = item.get("id")?.as_str()?;
            let create_time = item.get("create_time")?.as_str()?;
            Some((
                id.to_string(),
                ConversationTimestamp {
                    create_time: create_time.to_string(),
                    update_time: item
                        .get("update_time")
                        .and_then(Value::as_str)
                        .map(String::from),
                    title: item.get("title").and_then(Value::as_str).map(String::from),
                },
            ))
        })
        .collect()
}
