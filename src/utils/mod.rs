//! # 通用工具模块
//!
//! - `path` - 配置目录定位
//! - `time` - Unix 秒与公历日期的手动转换、ISO 8601 解析

pub mod path;
pub mod time;
