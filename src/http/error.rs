use std::io;

use http::StatusCode;

/// 单个连接处理过程中的错误
///
/// 只影响当前连接，不会波及监听循环、缓存或其他连接。
#[derive(thiserror::Error, Debug)]
pub enum ProxyError {
    /// Client closed the connection before sending a request line.
    #[error("empty request")]
    EmptyRequest,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("method {method} not allowed for {target}")]
    MethodNotAllowed { method: String, target: String },
    #[error("origin {authority} unreachable: {source}")]
    OriginUnreachable {
        authority: String,
        #[source]
        source: io::Error,
    },
    #[error("client io {0}")]
    Io(#[from] io::Error),
}

impl ProxyError {
    /// 需要回复给客户端的状态码
    ///
    /// 返回 `None` 时直接关闭连接，不发送任何响应。
    pub fn status(&self) -> Option<StatusCode> {
        use ProxyError::*;

        match self {
            BadRequest(_) => Some(StatusCode::BAD_REQUEST),
            MethodNotAllowed { .. } => Some(StatusCode::METHOD_NOT_ALLOWED),
            EmptyRequest | OriginUnreachable { .. } | Io(_) => None,
        }
    }
}

pub type ProxyResult<T, E = ProxyError> = Result<T, E>;
