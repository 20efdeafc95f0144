use std::io;

use bytes::Bytes;
use http::{Method, Uri};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use super::error::{ProxyError, ProxyResult};
use crate::consts::{MAX_BODY_SIZE, MAX_HEADER_SIZE};

/// 一次客户端请求
///
/// 每个连接只解析一次，响应发送完毕后丢弃。
#[derive(Debug, Clone)]
pub struct ClientRequest {
    /// GET, HEAD or POST
    pub method: Method,
    /// 请求行中的原始 URL，同时也是缓存键
    pub target: String,
    pub uri: Uri,
    /// 只有 POST 请求才有请求体
    pub body: Option<Bytes>,
}

/// 请求大小限制
#[derive(Debug, Clone, Copy)]
pub struct RequestLimits {
    /// 请求行加头部的最大字节数
    pub max_header_size: usize,
    /// POST 请求体的最大字节数
    pub max_body_size: usize,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_header_size: MAX_HEADER_SIZE,
            max_body_size: MAX_BODY_SIZE,
        }
    }
}

/// 从客户端连接中读取并校验请求
///
/// 读到请求行后立即校验，不合法时直接返回错误，不等待后续头部。
/// 只有 POST 会继续读取头部（到空行为止）以取得 `Content-Length`，
/// 其他头部不会转发给源站。
/// 请求行和头部共用 `max_header_size` 的读取额度。
pub async fn parse_request<R>(reader: &mut R, limits: RequestLimits) -> ProxyResult<ClientRequest>
where
    R: AsyncBufRead + Unpin,
{
    let mut budget = limits.max_header_size;
    let request_line = match read_line(reader, &mut budget).await? {
        Some(line) if !line.is_empty() => line,
        _ => return Err(ProxyError::EmptyRequest),
    };

    let parts: Vec<&str> = request_line.split(' ').collect();
    if parts.len() < 3 {
        return Err(ProxyError::BadRequest(format!(
            "malformed request line {request_line:?}"
        )));
    }
    let (method, target) = (parts[0], parts[1]);

    if !target.starts_with("http") {
        return Err(ProxyError::BadRequest(format!(
            "target is not an absolute url {target:?}"
        )));
    }
    let uri = parse_target(target)?;

    let method = match method {
        "GET" => Method::GET,
        "HEAD" => Method::HEAD,
        "POST" => Method::POST,
        _ => {
            return Err(ProxyError::MethodNotAllowed {
                method: method.to_string(),
                target: target.to_string(),
            });
        }
    };

    let body = if method == Method::POST {
        let headers = read_headers(reader, &mut budget).await?;
        let length = content_length(&headers)?;
        if length > limits.max_body_size {
            return Err(ProxyError::BadRequest(format!(
                "body of {length} bytes exceeds limit of {}",
                limits.max_body_size
            )));
        }
        Some(read_body(reader, length).await?)
    } else {
        None
    };

    Ok(ClientRequest {
        method,
        target: target.to_string(),
        uri,
        body,
    })
}

fn parse_target(target: &str) -> ProxyResult<Uri> {
    let uri: Uri = target
        .parse()
        .map_err(|err| ProxyError::BadRequest(format!("invalid url {target:?}: {err}")))?;
    if uri.scheme().is_none() || uri.host().is_none() {
        return Err(ProxyError::BadRequest(format!(
            "target is not an absolute url {target:?}"
        )));
    }
    Ok(uri)
}

/// Read one line without its line terminator, `None` at end of stream.
///
/// At most `budget` bytes are consumed; a line that does not fit is rejected.
async fn read_line<R>(reader: &mut R, budget: &mut usize) -> ProxyResult<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let read = (&mut *reader)
        .take(*budget as u64)
        .read_until(b'\n', &mut buf)
        .await?;
    if read == 0 {
        if *budget == 0 {
            return Err(header_too_large());
        }
        return Ok(None);
    }
    *budget -= read;
    if buf.last() == Some(&b'\n') {
        buf.pop();
    } else if *budget == 0 {
        return Err(header_too_large());
    }
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

fn header_too_large() -> ProxyError {
    ProxyError::BadRequest("request header too large".to_string())
}

async fn read_headers<R>(reader: &mut R, budget: &mut usize) -> ProxyResult<Vec<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut headers = Vec::new();
    while let Some(line) = read_line(reader, budget).await? {
        if line.is_empty() {
            break;
        }
        headers.push(line);
    }
    Ok(headers)
}

/// 查找 `Content-Length`，头部名称区分大小写
fn content_length(headers: &[String]) -> ProxyResult<usize> {
    let value = headers
        .iter()
        .filter_map(|header| header.split_once(':'))
        .find(|(name, _)| *name == "Content-Length")
        .map(|(_, value)| value.trim())
        .ok_or_else(|| ProxyError::BadRequest("POST without Content-Length".to_string()))?;

    match value.parse::<usize>() {
        Ok(0) => Err(ProxyError::BadRequest("POST with empty body".to_string())),
        Ok(length) => Ok(length),
        Err(_) => Err(ProxyError::BadRequest(format!(
            "invalid Content-Length {value:?}"
        ))),
    }
}

async fn read_body<R>(reader: &mut R, length: usize) -> ProxyResult<Bytes>
where
    R: AsyncBufRead + Unpin,
{
    let mut body = vec![0; length];
    match reader.read_exact(&mut body).await {
        Ok(_) => Ok(Bytes::from(body)),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Err(ProxyError::BadRequest(
            format!("body shorter than Content-Length {length}"),
        )),
        Err(err) => Err(err.into()),
    }
}
