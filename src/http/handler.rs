use bytes::Bytes;
use http::Method;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    time::timeout,
};
use tracing::{debug, error, warn};

use super::{
    ProxyState,
    error::ProxyError,
    request::{ClientRequest, parse_request},
    response::{header_section, post_ack, status_response},
};
use crate::consts::CLOSE_DRAIN_TIMEOUT;

/// 单个连接的处理阶段
///
/// `Parsing -> Dispatching -> Forwarding | CacheHit -> Replying -> Closed`，
/// 任何出口最终都会到达 `Closed`。
#[derive(Debug)]
enum Stage {
    Parsing,
    Dispatching(ClientRequest),
    CacheHit { target: String, response: Bytes },
    Forwarding(ClientRequest),
    Replying(Vec<Bytes>),
    Closed,
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Stage::Parsing => "parsing",
            Stage::Dispatching(_) => "dispatching",
            Stage::CacheHit { .. } => "cache_hit",
            Stage::Forwarding(_) => "forwarding",
            Stage::Replying(_) => "replying",
            Stage::Closed => "closed",
        }
    }
}

/// 处理一个客户端连接
///
/// 解析请求，命中缓存时直接返回缓存内容，否则转发到源站；
/// GET 的完整响应写入缓存，HEAD 只返回头部，POST 先返回一个确认响应再转发源站的响应。
/// 源站不可达时只记录日志，不给客户端任何响应。
///
/// 函数返回前连接一定会被关闭，关闭前会读掉客户端已经发来但没有解析的数据。
pub async fn handle_connection<S>(stream: S, state: &ProxyState)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = BufReader::new(stream);
    let mut stage = Stage::Parsing;

    loop {
        debug!("connection stage {}", stage.name());
        stage = match stage {
            Stage::Parsing => match parse_request(&mut stream, state.limits).await {
                Ok(req) => Stage::Dispatching(req),
                Err(err) => reject(err, state),
            },
            Stage::Dispatching(req) => {
                state
                    .access_log
                    .log(&format!("Method: {} | URL: {}", req.method, req.target));
                let cached = if req.method == Method::GET {
                    state.cache.get(&req.target)
                } else {
                    None
                };
                match cached {
                    Some(response) => Stage::CacheHit {
                        target: req.target,
                        response,
                    },
                    None => Stage::Forwarding(req),
                }
            }
            Stage::CacheHit { target, response } => {
                state.access_log.log(&format!("Cache hit for: {target}"));
                Stage::Replying(vec![response])
            }
            Stage::Forwarding(req) => match state.forwarder.forward(&req).await {
                Ok(response) => relay(req, response, state),
                Err(err) => {
                    error!("Error forwarding request: {err}");
                    Stage::Closed
                }
            },
            Stage::Replying(chunks) => {
                if let Err(err) = reply(&mut stream, &chunks).await {
                    warn!("Failed to write response to client: {err}");
                }
                Stage::Closed
            }
            Stage::Closed => break,
        };
    }

    drain(&mut stream, state.limits.max_header_size).await;
    if let Err(err) = stream.shutdown().await {
        debug!("Error closing client connection: {err}");
    }
}

/// Map a parse failure to the synthesized response, if the client gets one.
fn reject(err: ProxyError, state: &ProxyState) -> Stage {
    if let ProxyError::MethodNotAllowed { method, target } = &err {
        state
            .access_log
            .log(&format!("Method: {method} | URL: {target}"));
    }
    match err.status() {
        Some(status) => {
            debug!("Rejected request: {err}");
            Stage::Replying(vec![status_response(status)])
        }
        None => {
            debug!("Dropped connection: {err}");
            Stage::Closed
        }
    }
}

fn relay(req: ClientRequest, response: Bytes, state: &ProxyState) -> Stage {
    if req.method == Method::GET {
        state.cache.put(req.target.as_str(), response.clone());
        state
            .access_log
            .log(&format!("Response cached for: {}", req.target));
        Stage::Replying(vec![response])
    } else if req.method == Method::HEAD {
        Stage::Replying(vec![header_section(&response)])
    } else {
        Stage::Replying(vec![post_ack(), response])
    }
}

/// 读掉未解析的请求剩余部分，最多 `limit` 字节
///
/// 套接字关闭时接收缓冲区里还有数据会发送 RST，客户端可能因此收不到已经写出的响应。
/// 客户端在 [`CLOSE_DRAIN_TIMEOUT`] 内没有新数据就直接关闭。
async fn drain<R>(reader: &mut R, limit: usize)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0; 1024];
    let mut drained = 0;
    while drained < limit {
        match timeout(CLOSE_DRAIN_TIMEOUT, reader.read(&mut buf)).await {
            Ok(Ok(n)) if n > 0 => drained += n,
            _ => break,
        }
    }
    if drained > 0 {
        debug!("drained {} unread bytes before close", drained);
    }
}

async fn reply<W>(writer: &mut W, chunks: &[Bytes]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    for chunk in chunks {
        writer.write_all(chunk).await?;
    }
    writer.flush().await
}
