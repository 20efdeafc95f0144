use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;

/// 响应缓存
///
/// 键为客户端请求中的完整 URL（原样，不做规范化），值为源站返回的原始字节。
/// 没有容量限制也没有过期，条目一直保留到 [`CacheStore::clear`] 或进程退出。
/// 克隆得到的是同一份存储的句柄。
#[derive(Debug, Clone, Default)]
pub struct CacheStore {
    inner: Arc<DashMap<String, Bytes>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.inner.get(key).map(|entry| entry.value().clone())
    }

    /// Insert or overwrite; the last writer wins.
    pub fn put(&self, key: impl Into<String>, response: Bytes) {
        self.inner.insert(key.into(), response);
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
