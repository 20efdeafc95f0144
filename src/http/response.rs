use bytes::Bytes;
use http::StatusCode;

use crate::consts::POST_ACK_BODY;

/// Build a plain-text response whose body is the reason phrase.
pub fn status_response(status: StatusCode) -> Bytes {
    let reason = status.canonical_reason().unwrap_or("Unknown");
    text_response(status, reason)
}

/// 转发 POST 前先发给客户端的确认响应
pub fn post_ack() -> Bytes {
    text_response(StatusCode::OK, POST_ACK_BODY)
}

fn text_response(status: StatusCode, body: &str) -> Bytes {
    let reason = status.canonical_reason().unwrap_or("Unknown");
    Bytes::from(format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/plain\r\n\r\n{}\r\n",
        status.as_u16(),
        reason,
        body
    ))
}

/// 截取响应的头部部分
///
/// 从头扫描第一个空行（先找 `\r\n\r\n`，找不到再找 `\n\n`），返回到空行为止的字节，
/// 包含空行本身。没有空行时返回整个响应。
/// 只做字节扫描，不解析状态行和头部。
pub fn header_section(response: &Bytes) -> Bytes {
    let end = find(response, b"\r\n\r\n")
        .map(|pos| pos + 4)
        .or_else(|| find(response, b"\n\n").map(|pos| pos + 2))
        .unwrap_or(response.len());
    response.slice(..end)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
