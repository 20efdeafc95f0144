use std::{env, time::Duration};

pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const OS: &str = env::consts::OS;
pub const ARCH: &str = env::consts::ARCH;
pub const COMPILER: &str = env!("STASH_COMPILER");

// config defaults
pub const HOST_IP: &str = "0.0.0.0";
pub fn host_ip() -> String {
    HOST_IP.to_string()
}

pub const PROXY_PORT: u16 = 8888;
pub fn proxy_port() -> u16 {
    PROXY_PORT
}

pub const ORIGIN_PORT: u16 = 80;
pub fn origin_port() -> u16 {
    ORIGIN_PORT
}

/// 10 MiB
pub const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;
pub fn max_body_size() -> usize {
    MAX_BODY_SIZE
}

/// 请求行加头部，64 KiB
pub const MAX_HEADER_SIZE: usize = 64 * 1024;
pub fn max_header_size() -> usize {
    MAX_HEADER_SIZE
}

pub const LOG_LEVEL: &str = "info";
pub fn log_level() -> String {
    LOG_LEVEL.to_string()
}

pub const LOG_FOLDER: &str = "./logs";
pub fn log_folder() -> String {
    LOG_FOLDER.to_string()
}

pub const ACCESS_LOG: &str = "./proxy.log";
pub fn access_log() -> String {
    ACCESS_LOG.to_string()
}

/// Body of the synthetic 200 sent to clients before a relayed POST response.
pub const POST_ACK_BODY: &str = "POST request successfully received by proxy server";

/// Read buffer used when draining origin responses.
pub const READ_BUFFER_SIZE: usize = 8192;

/// Pause after a failed `accept` (e.g. out of file descriptors).
pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// 关闭连接前等待客户端剩余数据的时间
pub const CLOSE_DRAIN_TIMEOUT: Duration = Duration::from_millis(10);
