//! # 渲染协作方边界
//!
//! 核心管线只负责把时间戳送到渲染协作方手里；在哪里插入、长什么样
//! 全部属于协作方。这里定义协作方必须实现的 trait，并提供一个
//! 基于日志输出的默认实现，让二进制开箱即可观察抓取效果。
//!
//! 展示格式化（Unix 秒 / ISO 8601 → 可读文本）也放在本模块，
//! 供任何渲染实现复用。

use std::collections::HashMap;

use crate::models::settings::{DisplayFormat, StampSettings};
use crate::models::timestamp::{ConversationTimestamp, MessageTimestamp};
use crate::utils::time;

/// 渲染协作方接口
///
/// 每次调用都携带对应类别的完整当前记录映射和当前设置；
/// 调用本身即"有新数据到达"的信号。实现方拥有全部展示决策，
/// 包括是否遵守可见性开关、如何去重、渲染到哪里。
pub trait Renderer: Send {
    /// 渲染消息时间戳（消息 id → 记录）
    fn render_messages(&self, stamps: &HashMap<String, MessageTimestamp>, settings: &StampSettings);

    /// 渲染会话时间戳（会话 id → 记录）
    fn render_conversations(
        &self,
        stamps: &HashMap<String, ConversationTimestamp>,
        settings: &StampSettings,
    );
}

/// 日志渲染器：把抓取结果摘要输出到日志
///
/// 默认的渲染协作方实现。尊重两个可见性开关；
/// 展示格式跟随设置中的 `display_format`。
pub struct LogRenderer;

impl Renderer for LogRenderer {
    fn render_messages(
        &self,
        stamps: &HashMap<String, MessageTimestamp>,
        settings: &StampSettings,
    ) {
        if !settings.show_message_stamps {
            return;
        }
        log::info!("消息时间戳: 共 {} 条", stamps.len());
        if log::log_enabled!(log::Level::Debug) {
            for (id, stamp) in stamps {
                log::debug!(
                    "  {} -> {}",
                    id,
                    format_unix_seconds(stamp.create_time, settings.display_format)
                );
            }
        }
    }

    fn render_conversations(
        &self,
        stamps: &HashMap<String, ConversationTimestamp>,
        settings: &StampSettings,
    ) {
        if !settings.show_sidebar_stamps {
            return;
        }
        log::info!("会话时间戳: 共 {} 条", stamps.len());
        if log::log_enabled!(log::Level::Debug) {
            for (id, stamp) in stamps {
                log::debug!(
                    "  {} -> {}",
                    id,
                    format_iso8601(&stamp.create_time, settings.display_format)
                );
            }
        }
    }
}

/// 把 Unix 秒格式化为设置指定的展示文本
pub fn format_unix_seconds(secs: f64, format: DisplayFormat) -> String {
    let (year, month, day, hour, minute, second) = time::unix_to_datetime(secs);
    match format {
        DisplayFormat::Datetime => format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            year, month, day, hour, minute, second
        ),
        DisplayFormat::Date => format!("{:04}-{:02}-{:02}", year, month, day),
        DisplayFormat::Relative => format_relative(secs),
    }
}

/// 把 ISO 8601 字符串格式化为设置指定的展示文本
///
/// 解析失败时原样返回输入（fail open：宁可展示原始字符串也不报错）。
pub fn format_iso8601(iso: &str, format: DisplayFormat) -> String {
    match time::parse_iso8601(iso) {
        Some(secs) => format_unix_seconds(secs, format),
        None => iso.to_string(),
    }
}

/// 相对时间文本（参照当前时刻）
fn format_relative(secs: f64) -> String {
    let elapsed = time::now_unix_seconds() - secs;
    if elapsed < 60.0 {
        return "刚刚".to_string();
    }
    let minutes = (elapsed / 60.0) as u64;
    if minutes < 60 {
        return format!("{} 分钟前", minutes);
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{} 小时前", hours);
    }
    format!("{} 天前", hours / 24)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_unix_seconds_datetime_and_date() {
        assert_eq!(
            format_unix_seconds(1_700_000_000.0, DisplayFormat::Datetime),
            "2023-11-14 22:13:20"
        );
        assert_eq!(
            format_unix_seconds(1_700_000_000.0, DisplayFormat::Date),
            "2023-11-14"
        );
    }

    #[test]
    fn test_format_iso8601_falls_back_to_raw_input() {
        assert_eq!(
            format_iso8601("2023-11-14T22:13:20Z", DisplayFormat::Date),
            "2023-11-14"
        );
        // 解析不了的输入原样返回
        assert_eq!(
            format_iso8601("昨天下午", DisplayFormat::Date),
            "昨天下午"
        );
    }

    #[test]
    fn test_format_relative_buckets() {
        let now = time::now_unix_seconds();
        assert_eq!(format_relative(now), "刚刚");
        assert_eq!(format_relative(now - 120.0), "2 分钟前");
        assert_eq!(format_relative(now - 7200.0), "2 小时前");
        assert_eq!(format_relative(now - 172_800.0), "2 天前");
    }
}
