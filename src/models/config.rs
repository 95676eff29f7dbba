//! # 中转服务配置
//!
//! 定义中转服务器自身的运行参数（监听地址、上游后端地址）。
//! 与用户偏好设置（`settings`）分开管理：运行参数在进程启动时确定，
//! 通过环境变量覆盖默认值，运行期间不再变化。

/// 中转服务运行配置
///
/// 两个字段分别来自环境变量 `CHATSTAMP_LISTEN` 和 `CHATSTAMP_UPSTREAM`，
/// 未设置时使用默认值。
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// 本地监听地址（默认 `127.0.0.1:8787`），聊天客户端把后端地址指向这里
    pub listen_addr: String,

    /// 上游聊天后端的基地址（默认 `https://chatgpt.com`），不含路径部分
    pub upstream_base_url: String,
}

impl RelayConfig {
    /// 从环境变量构建配置，缺省值兜底
    pub fn from_env() -> Self {
        Self {
            listen_addr: std::env::var("CHATSTAMP_LISTEN")
                .unwrap_or_else(|_| "127.0.0.1:8787".to_string()),
            upstream_base_url: std::env::var("CHATSTAMP_UPSTREAM")
                .unwrap_or_else(|_| "https://chatgpt.com".to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }
}
