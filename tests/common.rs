//! 集成测试的公共辅助函数和工具

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use anyhow::Result;
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use stash::config::Settings;
use stash::http::{ProxyState, ServerHandle, make_server};

/// 模拟源站
///
/// 每个连接读完请求（包括按 Content-Length 读取的请求体）后返回固定响应并关闭，
/// 同时记录连接数和收到的原始请求。
pub struct MockOrigin {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockOrigin {
    /// 返回 `200 OK`，正文为 `body`
    pub async fn start(body: &str) -> Result<Self> {
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        Self::with_response(response.into_bytes()).await
    }

    pub async fn with_response(response: Vec<u8>) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let hits = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let response = Arc::new(response);

        let (counter, log) = (hits.clone(), requests.clone());
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let (log, response) = (log.clone(), response.clone());
                tokio::spawn(async move {
                    let mut reader = BufReader::new(stream);
                    if let Ok(request) = read_request(&mut reader).await {
                        log.lock().push(request);
                    }
                    let _ = reader.get_mut().write_all(&response).await;
                });
            }
        });

        Ok(Self {
            addr,
            hits,
            requests,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// 已接受的连接数
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

/// 只接受连接、从不响应的源站
///
/// 已接受的连接一直保持打开，直到 `StalledOrigin` 被丢弃。
pub struct StalledOrigin {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl StalledOrigin {
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        let task = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                held.push(stream);
            }
        });

        Ok(Self { addr, hits, task })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for StalledOrigin {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn read_request(reader: &mut BufReader<TcpStream>) -> Result<String> {
    let mut request = String::new();
    let mut content_length = 0;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        if let Some(value) = line.strip_prefix("Content-Length:") {
            content_length = value.trim().parse()?;
        }
        request.push_str(&line);
        if line == "\r\n" {
            break;
        }
    }
    let mut body = vec![0; content_length];
    reader.read_exact(&mut body).await?;
    request.push_str(&String::from_utf8_lossy(&body));
    Ok(request)
}

/// 启动代理，监听随机端口，访问日志写到临时目录
pub async fn start_proxy() -> Result<(ServerHandle, ProxyState, TempDir)> {
    let temp_dir = TempDir::new()?;
    let settings = Settings {
        ip: "127.0.0.1".to_string(),
        port: 0,
        access_log: temp_dir
            .path()
            .join("proxy.log")
            .to_string_lossy()
            .into_owned(),
        ..Settings::default()
    };
    let state = ProxyState::new(&settings);
    let handle = make_server(&settings, state.clone()).await?;
    Ok((handle, state, temp_dir))
}

/// 发送原始请求，读取直到代理关闭连接
pub async fn send_raw(addr: SocketAddr, raw: &[u8]) -> Result<Vec<u8>> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(raw).await?;
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await?;
    Ok(response)
}

pub async fn get(addr: SocketAddr, url: &str) -> Result<Vec<u8>> {
    send_raw(
        addr,
        format!("GET {url} HTTP/1.1\r\nHost: proxy\r\nUser-Agent: stash-test\r\n\r\n").as_bytes(),
    )
    .await
}

/// 一个当前没有监听的本地端口
pub async fn closed_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}
