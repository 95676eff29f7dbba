//! # 展示端（Presenter）
//!
//! 总线的消费侧：把收到的时间戳批次合并进本地记录映射，
//! 在出现新记录时驱动渲染协作方刷新对应类别。
//!
//! 展示端对网络流量零可见，记录映射完全由总线消息填充。
//! 一致性契约是最终一致：导航后短暂渲染到旧的/缺失的时间戳是允许的，
//! 下一次广播或排水响应到达后自然补齐。
//!
//! ## 排水重试
//! 启动时抓取端的缓冲可能仍在异步填充，因此排水请求按固定时刻表
//! 发送三次：立即、+1 秒、+3 秒。时刻表之外不再主动拉取，
//! 后续数据只经由实时广播到达。请求是即发即忘的，没有确认跟踪。

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::watch;

use crate::models::settings::StampSettings;
use crate::services::bus::{BusMessage, MessageBus};
use crate::services::renderer::Renderer;

/// 排水重试时刻表：首次请求后的追加等待间隔（累计 +1s、+3s）
const DRAIN_RETRY_INTERVALS: [Duration; 2] = [Duration::from_secs(1), Duration::from_secs(2)];

/// 展示端状态
pub struct Presenter {
    bus: MessageBus,
    settings: watch::Receiver<StampSettings>,
    renderer: Box<dyn Renderer>,
    messages: HashMap<String, crate::models::timestamp::MessageTimestamp>,
    conversations: HashMap<String, crate::models::timestamp::ConversationTimestamp>,
}

impl Presenter {
    /// 创建展示端
    ///
    /// # 参数
    /// - `bus` - 消息总线句柄
    /// - `settings` - 设置变更订阅（watch 通道接收端）
    /// - `renderer` - 渲染协作方，拥有全部展示逻辑
    pub fn new(
        bus: MessageBus,
        settings: watch::Receiver<StampSettings>,
        renderer: Box<dyn Renderer>,
    ) -> Self {
        Self {
            bus,
            settings,
            renderer,
            messages: HashMap::new(),
            conversations: HashMap::new(),
        }
    }

    /// 主循环：排水调度 + 消息合并 + 渲染触发
    pub async fn run(mut self) {
        let mut sub = self.bus.subscribe();
        let mut settings_rx = self.settings.clone();
        spawn_drain_schedule(self.bus.clone());

        loop {
            tokio::select! {
                message = sub.recv() => match message {
                    Some(BusMessage::Timestamps { timestamps }) => {
                        let fresh = merge_batch(&mut self.messages, timestamps);
                        if fresh > 0 {
                            log::debug!("新增 {} 条消息时间戳，触发渲染", fresh);
                            let settings = settings_rx.borrow().clone();
                            self.renderer.render_messages(&self.messages, &settings);
                        }
                    }
                    Some(BusMessage::Conversations { conversations }) => {
                        let fresh = merge_batch(&mut self.conversations, conversations);
                        if fresh > 0 {
                            log::debug!("新增 {} 条会话时间戳，触发渲染", fresh);
                            let settings = settings_rx.borrow().clone();
                            self.renderer.render_conversations(&self.conversations, &settings);
                        }
                    }
                    // 自己（或其他消费者）发出的排水请求，与展示端无关
                    Some(BusMessage::DrainRequest) => {}
                    None => break,
                },
                changed = settings_rx.changed() => {
                    if changed.is_err() {
                        // 设置存储被释放，进程正在退出
                        break;
                    }
                    // 偏好变化：两个类别都按当前记录重新渲染
                    let settings = settings_rx.borrow().clone();
                    self.renderer.render_messages(&self.messages, &settings);
                    self.renderer.render_conversations(&self.conversations, &settings);
                }
            }
        }
    }
}

/// 把一个批次合并进记录映射，返回其中新键的数量
///
/// 无条件按键覆盖/插入；重复投递同一批次是幂等的（新键数为 0，不触发渲染）。
fn merge_batch<V>(target: &mut HashMap<String, V>, batch: HashMap<String, V>) -> usize {
    let mut fresh = 0;
    for (id, value) in batch {
        if !target.contains_key(&id) {
            fresh += 1;
        }
        target.insert(id, value);
    }
    fresh
}

/// 按固定时刻表发送排水请求（立即、+1s、+3s）
fn spawn_drain_schedule(bus: MessageBus) {
    tokio::spawn(async move {
        bus.publish(BusMessage::DrainRequest);
        for interval in DRAIN_RETRY_INTERVALS {
            tokio::time::sleep(interval).await;
            bus.publish(BusMessage::DrainRequest);
        }
    });
}
