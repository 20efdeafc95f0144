use std::{io, net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::{
    net::TcpListener,
    sync::{OwnedSemaphorePermit, Semaphore},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{config::Settings, consts::ACCEPT_BACKOFF, logger::AccessLog};

// 响应缓存
pub mod cache;
pub mod error;
// 转发到源站
pub mod forward_proxy;
// 单个连接的处理流程
pub mod handler;
// 解析客户端请求
pub mod request;
pub mod response;

use cache::CacheStore;
use forward_proxy::OriginForwarder;
use handler::handle_connection;
use request::RequestLimits;

/// 所有连接共享的组件
///
/// 启动时创建一次，每个连接拿到一份克隆，内部通过 `Arc` 共享同一份缓存和访问日志。
#[derive(Debug, Clone)]
pub struct ProxyState {
    pub cache: CacheStore,
    pub access_log: Arc<AccessLog>,
    pub forwarder: OriginForwarder,
    /// 请求头和 POST 请求体的大小限制
    pub limits: RequestLimits,
}

impl ProxyState {
    pub fn new(settings: &Settings) -> Self {
        Self {
            cache: CacheStore::new(),
            access_log: Arc::new(AccessLog::new(&settings.access_log)),
            forwarder: OriginForwarder::new(settings.origin_port),
            limits: RequestLimits {
                max_header_size: settings.max_header_size,
                max_body_size: settings.max_body_size,
            },
        }
    }

    /// 清空全部缓存
    pub fn clear_cache(&self) {
        let entries = self.cache.len();
        self.cache.clear();
        info!("Cache cleared, {} entries removed", entries);
    }
}

/// 运行中的监听器
///
/// `shutdown` 只会停止接收新连接，已经在处理的连接会继续执行完。
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Wait for the accept loop to exit.
    pub async fn stopped(self) {
        if let Err(err) = self.task.await {
            error!("Accept loop failed: {:?}", err);
        }
    }
}

/// 绑定监听端口并启动接收循环
///
/// 每接收一个连接就启动一个新任务处理，接收循环不会等待任务结束。
/// 配置了 `max_connections` 时，接收前先获取信号量许可，许可随连接任务一起释放。
///
/// # 错误
///
/// 端口绑定失败时返回错误，调用方应当终止进程。
pub async fn make_server(settings: &Settings, state: ProxyState) -> anyhow::Result<ServerHandle> {
    let addr = settings.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    let local_addr = listener
        .local_addr()
        .with_context(|| format!("failed to read local address of {addr}"))?;

    let limit = settings
        .max_connections
        .map(|max| Arc::new(Semaphore::new(max)));
    let token = CancellationToken::new();
    let task = tokio::spawn(accept_loop(listener, state, limit, token.clone()));

    info!("Listening on http://{}", local_addr);
    Ok(ServerHandle {
        local_addr,
        token,
        task,
    })
}

async fn accept_loop(
    listener: TcpListener,
    state: ProxyState,
    limit: Option<Arc<Semaphore>>,
    token: CancellationToken,
) {
    loop {
        let permit = match acquire(limit.as_ref(), &token).await {
            Some(permit) => permit,
            None => break,
        };

        let (stream, peer) = tokio::select! {
            _ = token.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(err) => {
                    accept_backoff(&err).await;
                    continue;
                }
            },
        };
        info!("Client connected: {}", peer);

        let state = state.clone();
        tokio::spawn(async move {
            let _permit = permit;
            handle_connection(stream, &state).await;
            debug!("Client {} closed", peer);
        });
    }
    info!("Listener stopped");
}

/// `accept` 失败后暂停一段时间再继续
async fn accept_backoff(err: &io::Error) {
    error!("Failed to accept connection: {err}");
    tokio::time::sleep(ACCEPT_BACKOFF).await;
}

/// 获取连接许可，不限制连接数时返回 `Some(None)`，监听器关闭时返回 `None`
async fn acquire(
    limit: Option<&Arc<Semaphore>>,
    token: &CancellationToken,
) -> Option<Option<OwnedSemaphorePermit>> {
    let Some(limit) = limit else {
        return Some(None);
    };
    tokio::select! {
        _ = token.cancelled() => None,
        permit = limit.clone().acquire_owned() => permit.ok().map(Some),
    }
}
