//! # SSE 流式旁路
//!
//! 实时流式响应的 body 就是正在流向宿主界面的会话内容，
//! 必须在不消费、不延迟的前提下旁路观察。做法：
//! 把上游字节流包装成直通流，对每个分块
//! (a) 立即原样转发给原始调用方，
//! (b) 同时把字节累积进解码缓冲，按空行分隔符切出完整事件逐个解析。
//!
//! ## 直通契约
//! - 转发永远先于（且不被阻塞于）提取：`feed` 是纯同步的解析与广播，
//!   不做任何 I/O 等待，不对转发流施加背压
//! - 解析失败只影响该事件自身，既不中断转发也不污染后续事件
//! - 调用方取消读取时，包装流被丢弃，上游读取随之取消（无孤儿读）
//!
//! 每个成功解析出的消息时间戳在事件到达的那一刻立即广播
//! （不等流结束），展示端越早拿到越有用。

use std::sync::Arc;

use bytes::Bytes;
use futures_util::{Stream, StreamExt, stream};
use serde_json::Value;

use super::{Interceptor, extractor};

/// SSE 事件之间的空行分隔符
const EVENT_DELIMITER: &[u8] = b"\n\n";

/// 事件载荷行的固定前缀标记
const DATA_PREFIX: &str = "data:";

/// 流结束哨兵载荷：不是 JSON，静默忽略
const DONE_SENTINEL: &str = "[DONE]";

/// SSE 旁路状态
///
/// 每个被旁路的流式响应持有一个实例，随包装流一起存亡。
/// 跨分块的未完成事件文本保留在 `pending` 中，等待后续分块补全。
pub struct SseTap {
    interceptor: Arc<Interceptor>,
    pending: Vec<u8>,
}

impl SseTap {
    /// 创建旁路状态
    pub fn new(interceptor: Arc<Interceptor>) -> Self {
        Self {
            interceptor,
            pending: Vec::new(),
        }
    }

    /// 喂入一个原始分块
    ///
    /// 把分块追加进缓冲后，切出所有完整事件逐个处理；
    /// 结尾的不完整事件留在缓冲中等下一个分块。
    pub fn feed(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);

        // 空行分隔符定位使用 memmem 子串搜索
        while let Some(pos) = memchr::memmem::find(&self.pending, EVENT_DELIMITER) {
            let event: Vec<u8> = self.pending.drain(..pos + EVENT_DELIMITER.len()).collect();
            self.handle_event(&event[..pos]);
        }
    }

    /// 流结束：把缓冲里残留的部分文本当作最后一个事件解析
    pub fn finish(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let remainder = std::mem::take(&mut self.pending);
        self.handle_event(&remainder);
    }

    /// 解析单个完整事件
    ///
    /// 提取 `data:` 前缀的载荷行并 JSON 解码；解码失败或哨兵载荷静默忽略。
    fn handle_event(&self, raw: &[u8]) {
        let text = String::from_utf8_lossy(raw);
        for line in text.lines() {
            let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
                continue;
            };
            let payload = payload.trim();
            if payload.is_empty() || payload == DONE_SENTINEL {
                continue;
            }
            let Ok(value) = serde_json::from_str::<Value>(payload) else {
                continue;
            };
            if let Some((id, stamp)) = extract_stream_message(&value) {
                self.interceptor
                    .record_messages(std::collections::HashMap::from([(id, stamp)]));
            }
        }
    }
}

/// 从单个流式事件载荷中提取消息时间戳
///
/// 识别两种携带 message 记录的已知信封：
/// - 输入消息信封：`{"type":"input_message","input_message":{...}}`
/// - 增量信封：`{"v":{"message":{...}}}`（首轮）或 `{"message":{...}}`（后续轮次）
///
/// 其余事件形状（纯文本增量、状态标记等）返回 None。
fn extract_stream_message(value: &Value) -> Option<(String, crate::models::timestamp::MessageTimestamp)> {
    let message = if value.get("type").and_then(Value::as_str) == Some("input_message") {
        value.get("input_message")?
    } else if let Some(nested) = value.get("v").and_then(|v| v.get("message")) {
        nested
    } else {
        value.get("message")?
    };

    extractor::message_from_value(message)
}

/// 把上游字节流包装成带旁路的直通流
///
/// 每个分块先喂给旁路、再原样交出；错误分块原样透传；
/// 流正常结束时冲刷旁路缓冲的残留事件。
/// 包装流被调用方丢弃时，内部的上游流一并丢弃，取消向上游传播。
///
/// # 参数
/// - `upstream` - 上游响应的字节流
/// - `tap` - 本次响应的旁路状态
pub fn tap_stream<S, E>(upstream: S, tap: SseTap) -> impl Stream<Item = Result<Bytes, E>>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    stream::unfold((upstream, tap), |(mut upstream, mut tap)| async move {
        match upstream.next().await {
            Some(Ok(chunk)) => {
                tap.feed(&chunk);
                Some((Ok(chunk), (upstream, tap)))
            }
            // 传输错误原样交给调用方，旁路不做任何干预
            Some(Err(e)) => Some((Err(e), (upstream, tap))),
            None => {
                tap.finish();
                None
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::convert::Infallible;

    use crate::services::bus::{BusMessage, MessageBus};
    use crate::services::interceptor::buffer::CaptureBuffer;

    fn tap_with_bus() -> (SseTap, MessageBus) {
        let bus = MessageBus::new("https://chat.example");
        let interceptor = Arc::new(Interceptor::new(Arc::new(CaptureBuffer::new()), bus.clone()));
        (SseTap::new(interceptor.clone()), bus)
    }

    /// 收集旁路后的流，返回 (转发字节拼接, 捕获到的消息批次数)
    async fn run_through_tap(chunks: Vec<&'static [u8]>) -> (Vec<u8>, Vec<HashMap<String, crate::models::timestamp::MessageTimestamp>>) {
        let (tap, bus) = tap_with_bus();
        let mut sub = bus.subscribe();

        let upstream = stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<_, Infallible>(Bytes::from_static(c))),
        );
        let forwarded: Vec<Bytes> = tap_stream(upstream, tap)
            .map(|r| r.unwrap())
            .collect()
            .await;

        let mut batches = Vec::new();
        // 流已结束，广播的批次全部在通道缓冲里，非阻塞地取空
        drop(bus);
        while let Some(message) = sub.recv().await {
            if let BusMessage::Timestamps { timestamps } = message {
                batches.push(timestamps);
            }
        }

        (forwarded.concat(), batches)
    }

    #[tokio::test]
    async fn test_forwarding_is_byte_identical() {
        let chunks: Vec<&[u8]> = vec![
            b"data: {\"type\":\"input_message\",\"input_mess",
            b"age\":{\"id\":\"m2\",\"create_time\":1700000100}}\n\ndata: [DONE]\n\n",
        ];
        let original: Vec<u8> = chunks.concat();

        let (forwarded, batches) = run_through_tap(chunks).await;

        // 无论解析出多少事件，转发字节必须与原始响应体逐字节一致
        assert_eq!(forwarded, original);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0]["m2"].create_time, 1_700_000_100.0);
        assert_eq!(batches[0]["m2"].role, None);
    }

    #[tokio::test]
    async fn test_event_split_across_chunks() {
        // 事件边界与分块边界错开：载荷被拦腰截断
        let (_, batches) = run_through_tap(vec![
            b"data: {\"v\":{\"message\":{\"id\":\"m1\",\"create_time\":17000",
            b"00000,\"author\":{\"role\":\"assistant\"}}}}\n\n",
        ])
        .await;

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0]["m1"].create_time, 1_700_000_000.0);
        assert_eq!(batches[0]["m1"].role.as_deref(), Some("assistant"));
    }

    #[tokio::test]
    async fn test_trailing_partial_event_flushed_at_end() {
        // 最后一个事件没有结尾空行，流结束时作为最终事件解析
        let (_, batches) = run_through_tap(vec![
            b"data: {\"message\":{\"id\":\"m3\",\"create_time\":1700000200}}",
        ])
        .await;

        assert_eq!(batches.len(), 1);
        assert!(batches[0].contains_key("m3"));
    }

    #[tokio::test]
    async fn test_malformed_events_do_not_break_forwarding() {
        let chunks: Vec<&[u8]> = vec![
            b"data: not json\n\n",
            b"event: ping\n\n",
            b"data: [DONE]\n\n",
            b"data: {\"message\":{\"id\":\"m4\",\"create_time\":null}}\n\n",
        ];
        let original: Vec<u8> = chunks.concat();

        let (forwarded, batches) = run_through_tap(chunks).await;

        // 全部事件都无记录可提取，但转发不受影响
        assert_eq!(forwarded, original);
        assert!(batches.is_empty());
    }

    #[tokio::test]
    async fn test_each_event_broadcast_immediately() {
        // 两个事件各自成批广播，而不是合并到流结束
        let (_, batches) = run_through_tap(vec![
            b"data: {\"message\":{\"id\":\"m5\",\"create_time\":1}}\n\ndata: {\"message\":{\"id\":\"m6\",\"create_time\":2}}\n\n",
        ])
        .await;

        assert_eq!(batches.len(), 2);
        assert!(batches[0].contains_key("m5"));
        assert!(batches[1].contains_key("m6"));
    }
}
