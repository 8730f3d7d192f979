use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{Result, schedule::ScheduleBook};

/// 字节级缓存后端
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn set_raw(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;
    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn exists(&self, key: &str) -> Result<bool>;
}

#[async_trait]
pub trait Cache: CacheBackend {
    async fn set<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>
    where
        T: Serialize + Send + Sync,
    {
        let value_bytes = serde_json::to_vec(value)?;
        self.set_raw(key, &value_bytes, ttl).await
    }

    async fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get_raw(key).await? {
            Some(raw) => Ok(Some(serde_json::from_slice::<T>(&raw)?)),
            None => Ok(None),
        }
    }
}

/// 为所有实现了 CacheBackend 的类型自动实现 Cache
impl<T: CacheBackend + ?Sized> Cache for T {}

/// 进程内缓存，条目在 TTL 到期后失效
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, (Instant, Vec<u8>)>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn set_raw(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        // 顺便清理过期条目
        entries.retain(|_, (expires_at, _)| *expires_at > now);
        entries.insert(key.to_string(), (now + ttl, value.to_vec()));
        Ok(())
    }

    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|(expires_at, _)| *expires_at > Instant::now())
            .map(|(_, value)| value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get_raw(key).await?.is_some())
    }
}

/// 会话存储：每个会话保存一份按学期划分的课表
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl SessionStore {
    /// 默认会话有效期：7 天
    pub const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self {
            backend,
            ttl,
            locks: Arc::default(),
        }
    }

    pub fn schedules_key(session_id: &str) -> String {
        format!("session:{session_id}:schedules")
    }

    /// 会话写锁；持有期间同一会话的其他 load-modify-save 会等待
    ///
    /// 只在本进程内生效。
    pub async fn lock(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // 无人持有或等待的锁
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(session_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// 读取会话课表；不存在或无法解析时返回空课表
    pub async fn load(&self, session_id: &str) -> Result<ScheduleBook> {
        let key = Self::schedules_key(session_id);
        match self.backend.get::<ScheduleBook>(&key).await {
            Ok(book) => Ok(book.unwrap_or_default()),
            Err(crate::Error::Json(e)) => {
                tracing::warn!("Discarding unreadable schedules of session {}: {}", session_id, e);
                Ok(ScheduleBook::default())
            }
            Err(e) => Err(e),
        }
    }

    /// 保存会话课表并刷新有效期
    pub async fn save(&self, session_id: &str, book: &ScheduleBook) -> Result<()> {
        let key = Self::schedules_key(session_id);
        self.backend.set(&key, book, self.ttl).await
    }

    pub async fn clear(&self, session_id: &str) -> Result<()> {
        self.backend.delete(&Self::schedules_key(session_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        testing::{catalog_from, row},
        types::Semester,
    };

    fn store() -> (MemoryCache, SessionStore) {
        let cache = MemoryCache::new();
        let store = SessionStore::new(Arc::new(cache.clone()), SessionStore::DEFAULT_TTL);
        (cache, store)
    }

    #[test]
    fn test_memory_cache_roundtrip_and_delete() {
        tokio_test::block_on(async {
            let cache = MemoryCache::new();
            cache.set_raw("k", b"v", Duration::from_secs(60)).await.unwrap();
            assert_eq!(cache.get_raw("k").await.unwrap(), Some(b"v".to_vec()));
            assert!(cache.exists("k").await.unwrap());

            cache.delete("k").await.unwrap();
            assert_eq!(cache.get_raw("k").await.unwrap(), None);
        });
    }

    #[test]
    fn test_memory_cache_expires_entries() {
        tokio_test::block_on(async {
            let cache = MemoryCache::new();
            cache.set_raw("gone", b"x", Duration::ZERO).await.unwrap();
            assert!(!cache.exists("gone").await.unwrap());
        });
    }

    #[test]
    fn test_unknown_session_starts_empty() {
        tokio_test::block_on(async {
            let (_, store) = store();
            let book = store.load("fresh").await.unwrap();
            assert!(book.schedule(Semester::Sem1).is_none());
        });
    }

    #[test]
    fn test_sessions_are_isolated() {
        tokio_test::block_on(async {
            let (_, store) = store();
            let catalog = catalog_from(vec![
                row("COMP101", "1001", "1", &["MON"], "09:00", "10:00").build(),
            ]);

            let mut book = store.load("alice").await.unwrap();
            book.schedule_mut(Semester::Sem1)
                .add(&catalog, "COMP101", "1001")
                .unwrap();
            store.save("alice", &book).await.unwrap();

            let alice = store.load("alice").await.unwrap();
            assert_eq!(alice.schedule(Semester::Sem1).map(|s| s.len()), Some(1));
            assert!(store.load("bob").await.unwrap().schedule(Semester::Sem1).is_none());

            store.clear("alice").await.unwrap();
            assert!(store.load("alice").await.unwrap().schedule(Semester::Sem1).is_none());
        });
    }

    #[tokio::test]
    async fn test_session_lock_serialises_writers() {
        let (_, store) = store();
        let catalog = catalog_from(vec![
            row("COMP101", "1001", "1", &["MON"], "09:00", "10:00").build(),
            row("COMP103", "2001", "2", &["TUE"], "09:00", "10:00").build(),
        ]);

        let add = |code: &'static str, label: &'static str| {
            let store = store.clone();
            let catalog = catalog.clone();
            async move {
                let _guard = store.lock("alice").await;
                let mut book = store.load("alice").await.unwrap();
                tokio::task::yield_now().await;
                book.schedule_mut(Semester::Sem1)
                    .add(&catalog, code, label)
                    .unwrap();
                store.save("alice", &book).await.unwrap();
            }
        };
        tokio::join!(add("COMP101", "1001"), add("COMP103", "2001"));

        let book = store.load("alice").await.unwrap();
        assert_eq!(book.schedule(Semester::Sem1).map(|s| s.len()), Some(2));
    }

    #[tokio::test]
    async fn test_session_lock_is_per_session() {
        let (_, store) = store();
        let guard = store.lock("alice").await;

        let blocked = tokio::time::timeout(Duration::from_millis(20), store.lock("alice")).await;
        assert!(blocked.is_err());
        let _bob = store.lock("bob").await;

        drop(guard);
        let _alice = store.lock("alice").await;
    }

    #[test]
    fn test_corrupt_session_is_discarded() {
        tokio_test::block_on(async {
            let (cache, store) = store();
            cache
                .set_raw(&SessionStore::schedules_key("broken"), b"{not json", Duration::from_secs(60))
                .await
                .unwrap();

            let book = store.load("broken").await.unwrap();
            assert!(book.schedule(Semester::Sem1).is_none());
        });
    }
}
