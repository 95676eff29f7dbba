//! # 抓取端（Interceptor）
//!
//! 响应拦截与时间戳提取的核心子系统。组成：
//! - `proxy` - 本地中转服务器：透明转发请求，旁路观察响应
//! - `classifier` - 按 URL 形状对调用分类
//! - `extractor` - 一次性 JSON 文档（详情/列表）的记录提取
//! - `stream_tap` - SSE 实时流的不延迟旁路提取
//! - `buffer` - 进程级抓取缓冲，排水重播的数据源
//!
//! 本模块的 [`Interceptor`] 是上述组件的汇聚点：提取结果经由它
//! 合并进缓冲并立即广播，排水请求也由它应答。

pub mod buffer;
pub mod classifier;
pub mod extractor;
pub mod proxy;
pub mod stream_tap;

use std::collections::HashMap;
use std::sync::Arc;

use crate::models::timestamp::{ConversationTimestamp, MessageTimestamp};
use crate::services::bus::{BusMessage, MessageBus};
use self::buffer::CaptureBuffer;
use self::classifier::UrlKind;

/// 抓取端句柄
///
/// 持有抓取缓冲和总线发布端。进程内构造一次，以 `Arc` 共享给
/// 所有中转连接任务和排水监听任务。
pub struct Interceptor {
    buffer: Arc<CaptureBuffer>,
    bus: MessageBus,
}

impl Interceptor {
    /// 创建抓取端
    pub fn new(buffer: Arc<CaptureBuffer>, bus: MessageBus) -> Self {
        Self { buffer, bus }
    }

    /// 记录一批消息时间戳：合并进缓冲并立即广播该批次
    ///
    /// 空批次直接忽略（不更新缓冲、不广播，避免噪声）。
    /// 广播的是本次新提取的批次而非整个缓冲；完整状态由排水协议提供。
    pub fn record_messages(&self, batch: HashMap<String, MessageTimestamp>) {
        if batch.is_empty() {
            return;
        }
        log::debug!("抓取到 {} 条消息时间戳", batch.len());
        self.buffer.merge_messages(&batch);
        self.bus.publish(BusMessage::Timestamps { timestamps: batch });
    }

    /// 记录一批会话时间戳：合并进缓冲并立即广播该批次
    pub fn record_conversations(&self, batch: HashMap<String, ConversationTimestamp>) {
        if batch.is_empty() {
            return;
        }
        log::debug!("抓取到 {} 条会话时间戳", batch.len());
        self.buffer.merge_conversations(&batch);
        self.bus.publish(BusMessage::Conversations {
            conversations: batch,
        });
    }

    /// 按分类结果处理一份完整响应体（详情/列表两条提取路径）
    ///
    /// 流式响应不走这里，由 `stream_tap` 逐事件处理。
    ///
    /// # 参数
    /// - `kind` - 该调用的 URL 分类
    /// - `body` - 响应体文本
    pub fn capture_document(&self, kind: &UrlKind, body: &str) {
        match kind {
            UrlKind::ConversationDetail(_) => {
                self.record_messages(extractor::extract_message_timestamps(body));
            }
            UrlKind::ConversationList => {
                self.record_conversations(extractor::extract_conversation_timestamps(body));
            }
            UrlKind::LiveStream | UrlKind::None => {}
        }
    }

    /// 排水监听循环
    ///
    /// 收到 `DRAIN_REQUEST`（总线已保证同源）时，把两类缓冲的完整快照
    /// 按与增量广播相同的消息类型重播出去，各自仅在非空时发送。
    /// 广播是即发即忘、可幂等重播的，因此无需跟踪任何接收方状态。
    pub async fn run_drain_listener(&self) {
        let mut sub = self.bus.subscribe();
        while let Some(message) = sub.recv().await {
            if !matches!(message, BusMessage::DrainRequest) {
                continue;
            }

            let messages = self.buffer.message_snapshot();
            if !messages.is_empty() {
                self.bus.publish(BusMessage::Timestamps {
                    timestamps: messages,
                });
            }

            let conversations = self.buffer.conversation_snapshot();
            if !conversations.is_empty() {
                self.bus.publish(BusMessage::Conversations { conversations });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::services::bus::BusMessage;

    fn interceptor_with_bus() -> (Arc<Interceptor>, MessageBus) {
        let bus = MessageBus::new("https://chat.example");
        let interceptor = Arc::new(Interceptor::new(Arc::new(CaptureBuffer::new()), bus.clone()));
        (interceptor, bus)
    }

    #[tokio::test]
    async fn test_record_merges_and_broadcasts_batch() {
        let (interceptor, bus) = interceptor_with_bus();
        let mut sub = bus.subscribe();

        interceptor.record_messages(HashMap::from([(
            "m1".to_string(),
            MessageTimestamp {
                create_time: 1.0,
                role: None,
            },
        )]));

        match sub.recv().await {
            Some(BusMessage::Timestamps { timestamps }) => {
                assert_eq!(timestamps.len(), 1)
            }
            other => panic!("收到意外消息: {:?}", other),
        }
        assert_eq!(interceptor.buffer.message_snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_is_silent() {
        let (interceptor, bus) = interceptor_with_bus();
        let mut sub = bus.subscribe();

        interceptor.record_messages(HashMap::new());
        // 空批次不广播：随后发布的排水请求应是订阅者收到的第一条消息
        bus.publish(BusMessage::DrainRequest);
        assert!(matches!(sub.recv().await, Some(BusMessage::DrainRequest)));
    }

    #[tokio::test]
    async fn test_drain_replays_full_buffer() {
        let (interceptor, bus) = interceptor_with_bus();

        // 预先积累两个增量批次
        interceptor.record_messages(HashMap::from([(
            "m1".to_string(),
            MessageTimestamp {
                create_time: 1.0,
                role: None,
            },
        )]));
        interceptor.record_messages(HashMap::from([(
            "m2".to_string(),
            MessageTimestamp {
                create_time: 2.0,
                role: Some("assistant".to_string()),
            },
        )]));

        let listener = {
            let interceptor = interceptor.clone();
            tokio::spawn(async move { interceptor.run_drain_listener().await })
        };
        // 让监听任务先完成订阅，再发出排水请求
        tokio::task::yield_now().await;

        let mut sub = bus.subscribe();
        bus.publish(BusMessage::DrainRequest);

        loop {
            match sub.recv().await {
                Some(BusMessage::Timestamps { timestamps }) => {
                    assert_eq!(timestamps.len(), 2);
                    assert!(timestamps.contains_key("m1"));
                    assert!(timestamps.contains_key("m2"));
                    break;
                }
                Some(_) => continue,
                None => panic!("总线被意外关闭"),
            }
        }
        listener.abort();
    }

    #[tokio::test]
    async fn test_drain_skips_empty_categories() {
        let (interceptor, bus) = interceptor_with_bus();
        let listener = {
            let interceptor = interceptor.clone();
            tokio::spawn(async move { interceptor.run_drain_listener().await })
        };
        // 让监听任务先完成订阅，再发出排水请求
        tokio::task::yield_now().await;

        let mut sub = bus.subscribe();
        bus.publish(BusMessage::DrainRequest);
        // 两类缓冲都为空：排水不产生任何重播。发一条哨兵消息验证顺序。
        bus.publish(BusMessage::DrainRequest);
        interceptor.record_conversations(HashMap::from([(
            "c1".to_string(),
            ConversationTimestamp {
                create_time: "2024-01-01T00:00:00Z".to_string(),
                update_time: None,
                title: None,
            },
        )]));

        loop {
            match sub.recv().await {
                Some(BusMessage::Conversations { conversations }) => {
                    // 第一条数据消息就是增量广播，之前没有空缓冲的重播
                    assert_eq!(conversations.len(), 1);
                    break;
                }
                Some(BusMessage::DrainRequest) => continue,
                Some(other) => panic!("空缓冲不应被重播: {:?}", other),
                None => panic!("总线被意外关闭"),
            }
        }
        listener.abort();
    }
}
