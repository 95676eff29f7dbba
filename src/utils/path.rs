//! # 路径工具函数
//!
//! 提供 ChatStamp 自身配置目录的定位。
//! 配置数据独立存储在 `~/.chatstamp/` 目录下，不触碰聊天应用的任何本地数据。

use std::path::PathBuf;

/// 获取 ChatStamp 配置目录的绝对路径
///
/// 使用 `dirs` crate 获取跨平台的主目录路径。
///
/// # 返回值
/// 返回 `~/.chatstamp/` 目录的绝对路径。
///
/// # 错误
/// 如果无法确定用户主目录（极端情况，如无 HOME 环境变量），返回错误信息。
pub fn get_config_dir() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or_else(|| "无法获取用户主目录".to_string())?;
    Ok(home.join(".chatstamp"))
}
