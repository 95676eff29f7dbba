//! # 抓取缓冲
//!
//! 抓取端的长生命周期缓冲区，保存进程启动以来提取到的全部时间戳记录。
//! 作为迟到订阅者的重播数据源：展示端随时可以通过排水请求取得完整状态。
//!
//! ## 并发不变量
//! 每次被拦截的网络调用都是独立的异步任务，多个调用可能同时写入缓冲。
//! 合并操作是"按键覆盖"：对相同键的重复写入可交换、幂等
//! （同一 id 的时间戳是不变的既成事实），因此除了 RwLock 自身的
//! 短临界区之外不需要任何跨调用的全局锁。修改本模块时必须保持这一性质。
//!
//! ## 容量
//! 缓冲只增不减，也不设上限。对超长生命周期的进程这是无界增长，
//! 原设计未解决此问题，这里保持原语义不做静默修改。

use std::collections::HashMap;
use std::sync::RwLock;

use crate::models::timestamp::{ConversationTimestamp, MessageTimestamp};

/// 两类时间戳记录的进程级缓冲
///
/// 在启动时构造一次，以 `Arc` 共享给中转处理器和排水监听任务。
pub struct CaptureBuffer {
    /// 消息时间戳：消息 id → 记录
    messages: RwLock<HashMap<String, MessageTimestamp>>,

    /// 会话时间戳：会话 id → 记录
    conversations: RwLock<HashMap<String, ConversationTimestamp>>,
}

impl CaptureBuffer {
    /// 创建新的空缓冲
    pub fn new() -> Self {
        Self {
            messages: RwLock::new(HashMap::new()),
            conversations: RwLock::new(HashMap::new()),
        }
    }

    /// 将一批消息时间戳合并进缓冲（按键覆盖）
    pub fn merge_messages(&self, batch: &HashMap<String, MessageTimestamp>) {
        if let Ok(mut map) = self.messages.write() {
            for (id, stamp) in batch {
                map.insert(id.clone(), stamp.clone());
            }
        }
    }

    /// 将一批会话时间戳合并进缓冲（按键覆盖）
    pub fn merge_conversations(&self, batch: &HashMap<String, ConversationTimestamp>) {
        if let Ok(mut map) = self.conversations.write() {
            for (id, stamp) in batch {
                map.insert(id.clone(), stamp.clone());
            }
        }
    }

    /// 取得消息缓冲的完整快照（排水重播用）
    pub fn message_snapshot(&self) -> HashMap<String, MessageTimestamp> {
        self.messages.read().map(|m| m.clone()).unwrap_or_default()
    }

    /// 取得会话缓冲的完整快照（排水重播用）
    pub fn conversation_snapshot(&self) -> HashMap<String, ConversationTimestamp> {
        self.conversations
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}

impl Default for CaptureBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(secs: f64) -> MessageTimestamp {
        MessageTimestamp {
            create_time: secs,
            role: None,
        }
    }

    #[test]
    fn test_merge_is_idempotent() {
        let buffer = CaptureBuffer::new();
        let batch = HashMap::from([("m1".to_string(), message(1.0))]);

        buffer.merge_messages(&batch);
        let once = buffer.message_snapshot();
        buffer.merge_messages(&batch);
        let twice = buffer.message_snapshot();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_merge_overwrites_by_key_and_never_removes() {
        let buffer = CaptureBuffer::new();
        buffer.merge_messages(&HashMap::from([("m1".to_string(), message(1.0))]));
        buffer.merge_messages(&HashMap::from([("m2".to_string(), message(2.0))]));
        // 同键重插：覆盖为相同语义的值
        buffer.merge_messages(&HashMap::from([("m1".to_string(), message(1.0))]));

        let snapshot = buffer.message_snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["m1"].create_time, 1.0);
        assert_eq!(snapshot["m2"].create_time, 2.0);
    }
}
