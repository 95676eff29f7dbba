//! # URL 分类器
//!
//! 按 URL 形状把被拦截的调用分为四类，决定后续走哪条提取路径。
//! 四个模式在构造上互斥，分类不依赖判断顺序：
//!
//! | 分类 | 路径形状 | 提取方式 |
//! |------|----------|----------|
//! | ConversationDetail | `.../conversation/{id}`（id 为 ≥20 位十六进制+连字符） | 一次性 JSON 文档 |
//! | ConversationList | `.../conversations`（可带查询串） | 分页 JSON 列表 |
//! | LiveStream | 恰好以 `.../conversation` 结尾 | SSE 流式旁路 |
//! | None | 其余全部 | 不提取 |
//!
//! LiveStream 的最终判定还需要响应侧条件（`text/event-stream` 媒体类型
//! 且带可读 body），由中转处理器在拿到响应后补充验证。
//!
//! ## 性能策略
//! 列表与流式端点用 `str::ends_with` 判断，零 regex；
//! 仅详情 id 校验使用 1 个 `LazyLock` 预编译正则。

use std::sync::LazyLock;

use regex::Regex;

/// 会话详情路径匹配正则
///
/// 匹配以 `/conversation/{id}` 结尾的路径，id 必须是长度 ≥ 20 的
/// 十六进制+连字符 token（即 UUID 形状）。长度与字符集约束在构造上排除了
/// 保留字子路由（如 `/conversation/init`），也不可能与列表端点
/// `/conversations` 的路径前缀冲突。
static DETAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/conversation/([0-9a-fA-F-]{20,})$").unwrap());

/// URL 分类结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlKind {
    /// 会话详情文档：携带提取到的会话 id
    ConversationDetail(String),
    /// 会话列表文档
    ConversationList,
    /// 实时流式端点（候选，最终判定还需响应侧条件）
    LiveStream,
    /// 与时间戳无关的调用：原样放行，不提取
    None,
}

/// 对请求路径进行分类
///
/// 只检查路径部分；查询串对分类没有影响（列表端点允许携带分页参数）。
/// 空路径或无法解析的路径落入 `None`，提取被跳过（fail open）。
///
/// # 参数
/// - `path` - 请求的 URL 路径（不含查询串）
///
/// # 返回值
/// 四个互斥分类之一
pub fn classify(path: &str) -> UrlKind {
    if path.is_empty() {
        return UrlKind::None;
    }

    if path.ends_with("/conversations") {
        return UrlKind::ConversationList;
    }

    if path.ends_with("/conversation") {
        return UrlKind::LiveStream;
    }

    if let Some(caps) = DETAIL_RE.captures(path) {
        if let Some(id) = caps.get(1) {
            return UrlKind::ConversationDetail(id.as_str().to_string());
        }
    }

    UrlKind::None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_requires_uuid_shaped_id() {
        assert_eq!(
            classify("/backend-api/conversation/67e9fc9c-3a5b-4c8d-9e2f-0a1b2c3d4e5f"),
            UrlKind::ConversationDetail("67e9fc9c-3a5b-4c8d-9e2f-0a1b2c3d4e5f".to_string())
        );
    }

    #[test]
    fn test_reserved_subroutes_are_not_detail() {
        // 保留字子路由：字符集或长度不满足 UUID 形状
        assert_eq!(classify("/backend-api/conversation/init"), UrlKind::None);
        assert_eq!(classify("/backend-api/conversation/gen_title"), UrlKind::None);
        // 长度达标但包含非十六进制字符
        assert_eq!(
            classify("/backend-api/conversation/zzzzzzzz-3a5b-4c8d-9e2f-0a1b2c3d4e5f"),
            UrlKind::None
        );
    }

    #[test]
    fn test_short_hex_id_is_not_detail() {
        assert_eq!(classify("/backend-api/conversation/abc123"), UrlKind::None);
    }

    #[test]
    fn test_list_endpoint() {
        assert_eq!(
            classify("/backend-api/conversations"),
            UrlKind::ConversationList
        );
    }

    #[test]
    fn test_stream_endpoint_is_exact() {
        assert_eq!(classify("/backend-api/conversation"), UrlKind::LiveStream);
        // 带 id 的详情路径不是流式端点
        assert_ne!(
            classify("/backend-api/conversation/67e9fc9c-3a5b-4c8d-9e2f-0a1b2c3d4e5f"),
            UrlKind::LiveStream
        );
    }

    #[test]
    fn test_patterns_are_disjoint() {
        // 三个模式对同一路径不可能同时成立
        // 查询串由调用方剥离后再传入，这里只验证路径部分
        assert_eq!(classify("/backend-api/conversation"), UrlKind::LiveStream);
        assert_eq!(
            classify("/backend-api/conversations"),
            UrlKind::ConversationList
        );
        assert_eq!(
            classify("/backend-api/conversation/67e9fc9c-3a5b-4c8d-9e2f-0a1b2c3d4e5f"),
            UrlKind::ConversationDetail("67e9fc9c-3a5b-4c8d-9e2f-0a1b2c3d4e5f".to_string())
        );
    }

    #[test]
    fn test_unrelated_and_empty_paths() {
        assert_eq!(classify("/backend-api/me"), UrlKind::None);
        assert_eq!(classify("/"), UrlKind::None);
        assert_eq!(classify(""), UrlKind::None);
    }
}
