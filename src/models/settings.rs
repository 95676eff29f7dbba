//! # 设置数据模型
//!
//! 定义用户偏好设置（StampSettings）的 Rust 结构体，
//! 对应 `~/.chatstamp/settings.json` 文件内容。
//!
//! 核心抓取管线只读取这些偏好并订阅其变更通知；
//! 写入由设置界面协作方（或用户直接编辑配置文件后调用保存接口）完成。

use serde::{Deserialize, Serialize};

/// 时间戳展示格式
///
/// 决定渲染协作方如何把抓取到的创建时间格式化为可读文本。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayFormat {
    /// 完整日期时间（如 "2024-01-01 08:30:00"）
    Datetime,
    /// 仅日期（如 "2024-01-01"）
    Date,
    /// 相对时间（如 "3 小时前"）
    Relative,
}

/// 用户偏好设置
///
/// 三个字段与设置界面的三个控件一一对应。
/// 文件中缺失的字段按默认值补齐，保证旧版本配置文件可以直接使用。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StampSettings {
    /// 时间戳展示格式
    #[serde(default = "default_display_format")]
    pub display_format: DisplayFormat,

    /// 是否在消息旁展示创建时间
    #[serde(default = "default_true")]
    pub show_message_stamps: bool,

    /// 是否在侧边栏会话列表展示创建时间
    #[serde(default = "default_true")]
    pub show_sidebar_stamps: bool,
}

fn default_display_format() -> DisplayFormat {
    DisplayFormat::Datetime
}

fn default_true() -> bool {
    true
}

impl Default for StampSettings {
    fn default() -> Self {
        Self {
            display_format: default_display_format(),
            show_message_stamps: true,
            show_sidebar_stamps: true,
        }
    }
}
