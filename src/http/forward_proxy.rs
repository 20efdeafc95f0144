use std::io;

use bytes::Bytes;
use http::{Method, Uri};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};
use tracing::debug;

use super::{
    error::{ProxyError, ProxyResult},
    request::ClientRequest,
};
use crate::consts::READ_BUFFER_SIZE;

/// 源站转发
///
/// 每个请求新建一条到源站的 TCP 连接，不复用、不保持长连接。
/// 请求头只包含 `Host`、`Connection: close`，POST 额外带上 `Content-Length`，
/// 客户端的其他头部不会转发。
#[derive(Debug, Clone)]
pub struct OriginForwarder {
    /// URL 中没有显式端口时使用
    default_port: u16,
}

impl OriginForwarder {
    pub fn new(default_port: u16) -> Self {
        Self { default_port }
    }

    /// 将请求发往源站并读取完整响应
    ///
    /// 一直读到源站关闭连接为止，不根据 `Content-Length` 判断响应结束。
    /// 连接、写入、读取过程中的任何 IO 错误都会转换为 [`ProxyError::OriginUnreachable`]。
    pub async fn forward(&self, req: &ClientRequest) -> ProxyResult<Bytes> {
        // 解析阶段已经保证有 host
        let host = req.uri.host().ok_or_else(|| ProxyError::OriginUnreachable {
            authority: req.target.clone(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "url without host"),
        })?;
        let port = req.uri.port_u16().unwrap_or(self.default_port);
        let authority = format!("{host}:{port}");

        let request = build_origin_request(req);
        debug!("forward {} {} to {}", req.method, req.target, authority);

        let response = exchange(strip_brackets(host), port, &request)
            .await
            .map_err(|source| ProxyError::OriginUnreachable {
                authority: authority.clone(),
                source,
            })?;
        debug!("origin {} returned {} bytes", authority, response.len());
        Ok(Bytes::from(response))
    }
}

async fn exchange(host: &str, port: u16, request: &[u8]) -> io::Result<Vec<u8>> {
    let mut stream = TcpStream::connect((host, port)).await?;
    stream.write_all(request).await?;
    stream.flush().await?;

    let mut response = Vec::with_capacity(READ_BUFFER_SIZE);
    stream.read_to_end(&mut response).await?;
    Ok(response)
}

/// 重新构造发往源站的请求，目标改写为 URL 的路径和查询部分
pub fn build_origin_request(req: &ClientRequest) -> Vec<u8> {
    let mut head = format!(
        "{} {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n",
        req.method,
        origin_path(&req.uri),
        host_header(&req.uri)
    );

    let body = req.body.as_ref().filter(|_| req.method == Method::POST);
    if let Some(body) = body {
        head.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    head.push_str("\r\n");

    let mut request = head.into_bytes();
    if let Some(body) = body {
        request.extend_from_slice(body);
    }
    request
}

fn origin_path(uri: &Uri) -> String {
    let path_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("");
    if path_query.starts_with('/') {
        path_query.to_string()
    } else {
        format!("/{path_query}")
    }
}

fn host_header(uri: &Uri) -> String {
    let host = uri.host().unwrap_or_default();
    match uri.port_u16() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

/// `[::1]` -> `::1`
fn strip_brackets(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}
