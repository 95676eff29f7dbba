//! # 数据模型模块
//!
//! 定义在管线各组件之间流动的数据结构。
//! 所有需要跨越总线或读写 JSON 文件的结构体均派生 `Serialize` 和 `Deserialize`。
//! - `timestamp` - 消息时间戳和会话时间戳记录
//! - `settings` - 用户偏好设置（展示格式与可见性开关）
//! - `config` - 中转服务器自身的运行配置

pub mod config;
pub mod settings;
pub mod timestamp;
