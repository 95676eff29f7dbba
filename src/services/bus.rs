//! # 消息总线
//!
//! 抓取端（interceptor）与展示端（presenter）之间唯一的通信通道。
//! 两端运行在互相隔离的任务中：抓取端看得到网络流量但接触不到展示层，
//! 展示端可以驱动渲染但看不到网络流量，跨边界只能投递消息。
//!
//! ## 通道语义
//! - 异步、无序（相对其他通道）、单次投递尽力送达
//! - 每条消息携带来源标识（origin），接收方丢弃非同源消息
//! - 无确认、无重发：落后的订阅者丢失消息由排水协议（DRAIN_REQUEST）补偿
//!
//! 消息模式是封闭的三个带标签变体（见 [`BusMessage`]），不接受开放式对象。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::timestamp::{ConversationTimestamp, MessageTimestamp};

/// 总线通道容量
///
/// 广播通道的环形缓冲大小。订阅者落后超过此数量会丢失最旧的消息，
/// 丢失的增量批次可通过一次排水请求完整补回。
const BUS_CAPACITY: usize = 256;

/// 总线消息：封闭的三个带标签变体
///
/// 序列化后与展示端约定的消息模式逐字段一致：
/// - `{"type":"TIMESTAMPS","timestamps":{id: MessageTimestamp}}`
/// - `{"type":"CONVERSATIONS","conversations":{id: ConversationTimestamp}}`
/// - `{"type":"DRAIN_REQUEST"}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BusMessage {
    /// 消息时间戳批次（增量广播与排水回放共用同一类型）
    Timestamps {
        timestamps: HashMap<String, MessageTimestamp>,
    },
    /// 会话时间戳批次
    Conversations {
        conversations: HashMap<String, ConversationTimestamp>,
    },
    /// 排水请求：要求抓取端重播其全部缓冲内容（无载荷）
    DrainRequest,
}

/// 带来源标识的消息信封
///
/// origin 对应宿主平台的同源校验：接收方只处理与自身 origin 相同的信封。
#[derive(Debug, Clone)]
struct Envelope {
    origin: String,
    message: BusMessage,
}

/// 消息总线句柄
///
/// 可廉价克隆；所有克隆共享同一个底层广播通道。
/// 发布方自动为消息盖上本总线的 origin。
#[derive(Clone)]
pub struct MessageBus {
    origin: String,
    sender: broadcast::Sender<Envelope>,
}

impl MessageBus {
    /// 创建新总线
    ///
    /// # 参数
    /// - `origin` - 本总线的来源标识（通常取上游后端的 origin）
    pub fn new(origin: impl Into<String>) -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self {
            origin: origin.into(),
            sender,
        }
    }

    /// 发布一条消息
    ///
    /// 投递是尽力而为的：没有任何订阅者时发送失败，直接忽略
    /// （广播本就不关心接收方是否存在，与排水协议的无状态设计一致）。
    pub fn publish(&self, message: BusMessage) {
        let _ = self.sender.send(Envelope {
            origin: self.origin.clone(),
            message,
        });
    }

    /// 订阅总线
    ///
    /// 返回的订阅句柄只会交出与本总线同源的消息。
    pub fn subscribe(&self) -> BusSubscription {
        BusSubscription {
            origin: self.origin.clone(),
            receiver: self.sender.subscribe(),
        }
    }
}

/// 总线订阅句柄
pub struct BusSubscription {
    origin: String,
    receiver: broadcast::Receiver<Envelope>,
}

impl BusSubscription {
    /// 接收下一条同源消息
    ///
    /// - 非同源信封直接丢弃，继续等待
    /// - 订阅落后导致的消息丢失静默跳过（排水协议可补回完整状态）
    ///
    /// # 返回值
    /// - `Some(message)` - 下一条同源消息
    /// - `None` - 通道已关闭（所有发送端被释放）
    pub async fn recv(&mut self) -> Option<BusMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) if envelope.origin == self.origin => {
                    return Some(envelope.message);
                }
                // 非同源消息：拒收
                Ok(_) => continue,
                // 落后丢失：跳过，等待后续消息
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
