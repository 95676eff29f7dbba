//! # 本地中转服务器
//!
//! "包装网络原语"的落地形态：聊天客户端把后端基地址指向本地监听端口，
//! 每个请求被原样转发到真正的上游后端，响应原样返回，唯一的副作用
//! 是时间戳提取。对调用方而言中转是行为透明的：同样的输入、同样的
//! 响应字节、同样的错误表现。
//!
//! ## 转发路径
//! hyper HTTP/1.1 服务器接收请求 → reqwest 客户端转发到上游 →
//! 按 URL 分类决定响应的处理方式：
//! - 详情/列表：完整读取 body，提取后把同一份字节返回
//! - 流式（且响应是 `text/event-stream`）：挂上 SSE 旁路后直通
//! - 其余：字节流直通，不读取不缓冲
//!
//! ## 失败语义
//! 提取路径上的任何失败都不影响被转发的响应（fail open）；
//! 只有上游本身不可达时才返回 502，等价于直连失败。
//!
//! 每个连接、每个请求都是独立的异步任务；并发调用之间只共享
//! 可交换合并的抓取缓冲，不需要全局锁。

use std::sync::Arc;

use bytes::Bytes;
use futures_util::{Stream, StreamExt, TryStreamExt};
use http::{HeaderMap, StatusCode, header};
use http_body_util::{BodyExt, Full, StreamBody, combinators::UnsyncBoxBody};
use hyper::body::{Frame, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use super::{Interceptor, classifier, classifier::UrlKind, stream_tap};
use crate::models::config::RelayConfig;

/// 中转响应的统一 body 类型
///
/// reqwest 的字节流不满足 `Sync`，统一使用 unsync 的 box body
/// （hyper 的 HTTP/1 连接服务不要求 body 为 `Sync`）。
type RelayBody = UnsyncBoxBody<Bytes, std::io::Error>;

/// 不参与端到端转发的逐跳头与编码协商头
///
/// - 逐跳头只对单段连接有意义，透传会破坏 hyper/reqwest 自身的连接管理
/// - `accept-encoding` 被剥除是为了让上游返回明文 JSON：中转无法在
///   压缩字节流上做提取（浏览器内的 fetch 包装拿到的是解压后的文档，
///   这里通过编码协商达到同样的效果）
const STRIPPED_REQUEST_HEADERS: [header::HeaderName; 4] = [
    header::HOST,
    header::CONNECTION,
    header::CONTENT_LENGTH,
    header::ACCEPT_ENCODING,
];

/// 不回传给客户端的逐跳响应头
const STRIPPED_RESPONSE_HEADERS: [header::HeaderName; 4] = [
    header::CONNECTION,
    header::TRANSFER_ENCODING,
    header::TRAILER,
    header::UPGRADE,
];

/// 单个中转进程共享的上下文
struct RelayContext {
    interceptor: Arc<Interceptor>,
    client: reqwest::Client,
    upstream_base: String,
}

/// 启动中转服务器并持续接受连接
///
/// 每个连接在独立任务中服务，单连接失败只记日志不影响其他连接。
/// 本函数正常情况下不返回；由调用方通过 select 配合退出信号终止。
///
/// # 参数
/// - `interceptor` - 抓取端句柄
/// - `config` - 监听地址与上游基地址
///
/// # 错误
/// 端口绑定失败或 HTTP 客户端构建失败时返回错误
pub async fn serve(interceptor: Arc<Interceptor>, config: RelayConfig) -> Result<(), String> {
    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|e| format!("绑定监听地址 {} 失败: {}", config.listen_addr, e))?;

    let client = reqwest::Client::builder()
        .build()
        .map_err(|e| format!("构建上游 HTTP 客户端失败: {}", e))?;

    let ctx = Arc::new(RelayContext {
        interceptor,
        client,
        upstream_base: config.upstream_base_url.clone(),
    });

    log::info!(
        "中转服务器启动: {} -> {}",
        config.listen_addr,
        config.upstream_base_url
    );

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                log::warn!("接受连接失败: {}", e);
                continue;
            }
        };

        let ctx = ctx.clone();
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req| handle(req, ctx.clone()));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                // 客户端中途断开属于正常现象（取消读取会传播到上游）
                log::debug!("连接 {} 结束: {}", peer, e);
            }
        });
    }
}

/// 处理单个被拦截的请求
///
/// 流程与"包装 fetch"一致：解析目标 URL → 调用原始网络原语 →
/// 按分类提取 → 原样返回响应。提取失败不阻断、不修改响应。
async fn handle(
    req: Request<Incoming>,
    ctx: Arc<RelayContext>,
) -> Result<Response<RelayBody>, String> {
    let (parts, body) = req.into_parts();

    // 目标 URL 解析：路径拿不到时按空路径处理，分类落入 None，提取被跳过
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_default();
    let kind = classifier::classify(parts.uri.path());

    // 请求体一次性读入（聊天后端的请求体都是小 JSON）
    let request_body = body
        .collect()
        .await
        .map_err(|e| format!("读取请求体失败: {}", e))?
        .to_bytes();

    // 调用原始网络原语（reqwest 转发到上游）
    let url = format!("{}{}", ctx.upstream_base, path_and_query);
    let mut forward_headers = HeaderMap::new();
    for (name, value) in parts.headers.iter() {
        if STRIPPED_REQUEST_HEADERS.contains(name) {
            continue;
        }
        forward_headers.append(name.clone(), value.clone());
    }

    let upstream_req = ctx
        .client
        .request(parts.method.clone(), url.as_str())
        .headers(forward_headers);

    let upstream_resp = match upstream_req.body(request_body).send().await {
        Ok(resp) => resp,
        // 上游不可达：对客户端表现为网关错误，与直连失败等价
        Err(e) => {
            log::warn!("上游请求失败 ({}): {}", url, e);
            return text_response(
                StatusCode::BAD_GATEWAY,
                format!("上游请求失败: {}", e),
            );
        }
    };

    let status = upstream_resp.status();
    let headers = filtered_response_headers(upstream_resp.headers());

    match kind {
        // 一次性 JSON 文档：完整读取、提取、把同一份字节返回
        UrlKind::ConversationDetail(_) | UrlKind::ConversationList => {
            let bytes = match upstream_resp.bytes().await {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::warn!("读取上游响应失败 ({}): {}", url, e);
                    return text_response(
                        StatusCode::BAD_GATEWAY,
                        format!("读取上游响应失败: {}", e),
                    );
                }
            };
            // 非 UTF-8 的 body 不可能是预期的 JSON 文档，跳过提取
            if let Ok(text) = std::str::from_utf8(&bytes) {
                ctx.interceptor.capture_document(&kind, text);
            }
            build_response(status, headers, full_body(bytes))
        }

        // 流式端点：响应确实是事件流时才挂旁路，否则原样直通
        UrlKind::LiveStream if is_event_stream(&headers) => {
            let tap = stream_tap::SseTap::new(ctx.interceptor.clone());
            let tapped = stream_tap::tap_stream(upstream_resp.bytes_stream().boxed(), tap);
            build_response(status, headers, stream_body(tapped))
        }

        // 其余调用：字节流直通，不读取不缓冲不延迟
        _ => build_response(
            status,
            headers,
            stream_body(upstream_resp.bytes_stream().boxed()),
        ),
    }
}

/// 判断响应是否声明了 SSE 媒体类型
fn is_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("text/event-stream"))
        .unwrap_or(false)
}

/// 过滤掉逐跳头后的响应头集合
fn filtered_response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in upstream.iter() {
        if STRIPPED_RESPONSE_HEADERS.contains(name) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

/// 组装回传给客户端的响应
fn build_response(
    status: StatusCode,
    headers: HeaderMap,
    body: RelayBody,
) -> Result<Response<RelayBody>, String> {
    let mut response = Response::builder()
        .status(status)
        .body(body)
        .map_err(|e| format!("构造响应失败: {}", e))?;
    *response.headers_mut() = headers;
    Ok(response)
}

/// 纯文本错误响应（上游不可达时使用）
fn text_response(status: StatusCode, message: String) -> Result<Response<RelayBody>, String> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(full_body(Bytes::from(message)))
        .map_err(|e| format!("构造响应失败: {}", e))
}

/// 完整字节 body
fn full_body(bytes: Bytes) -> RelayBody {
    Full::new(bytes)
        .map_err(std::io::Error::other)
        .boxed_unsync()
}

/// 流式直通 body
fn stream_body<S>(stream: S) -> RelayBody
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
{
    StreamBody::new(
        stream
            .map_ok(Frame::data)
            .map_err(std::io::Error::other),
    )
    .boxed_unsync()
}
