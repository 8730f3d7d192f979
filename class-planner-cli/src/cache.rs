use std::{
    fmt::Write as _,
    path::PathBuf,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;

use class_planner_core::{Error, Result, cache::CacheBackend};

#[inline]
fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// 缓存条目头部大小：[过期时间戳(8字节)] + [创建时间戳(8字节)]
const HEADER_SIZE: usize = 16;

fn create_cache_entry(data: &[u8], ttl: Duration) -> Vec<u8> {
    let now = now_secs();
    let expires_at = now.saturating_add(ttl.as_secs());

    let mut entry = Vec::with_capacity(HEADER_SIZE + data.len());
    entry.extend_from_slice(&expires_at.to_le_bytes());
    entry.extend_from_slice(&now.to_le_bytes());
    entry.extend_from_slice(data);
    entry
}

fn parse_cache_entry(raw: &[u8]) -> Result<(bool, &[u8])> {
    if raw.len() < HEADER_SIZE {
        return Err(Error::Internal("Invalid cache entry format".to_string()));
    }

    let expires_at = u64::from_le_bytes(
        raw[0..8]
            .try_into()
            .map_err(|_| Error::Internal("Invalid expires_at format".to_string()))?,
    );

    let is_expired = now_secs() > expires_at;
    let data = &raw[HEADER_SIZE..];

    Ok((is_expired, data))
}

/// 文件缓存，CLI 用它在多次调用之间保存课表
#[derive(Debug, Clone)]
pub struct FileCache {
    cache_dir: PathBuf,
}

impl FileCache {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        if !cache_dir.exists() {
            std::fs::create_dir_all(&cache_dir).map_err(|e| {
                Error::Config(format!("Failed to create cache directory: {e}"))
            })?;
        }

        Ok(Self { cache_dir })
    }

    pub fn with_default_dir(app_name: &str) -> Result<Self> {
        let cache_dir = Self::get_default_cache_dir(app_name)?;
        Self::new(cache_dir)
    }

    fn get_default_cache_dir(app_name: &str) -> Result<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            if let Some(home) = std::env::var_os("HOME") {
                Ok(PathBuf::from(home)
                    .join("Library")
                    .join("Caches")
                    .join(app_name))
            } else {
                Err(Error::Config("Cannot determine cache directory".to_string()))
            }
        }

        #[cfg(target_os = "linux")]
        {
            if let Some(cache_dir) = std::env::var_os("XDG_CACHE_HOME") {
                Ok(PathBuf::from(cache_dir).join(app_name))
            } else if let Some(home) = std::env::var_os("HOME") {
                Ok(PathBuf::from(home).join(".cache").join(app_name))
            } else {
                Err(Error::Config("Cannot determine cache directory".to_string()))
            }
        }

        #[cfg(target_os = "windows")]
        {
            if let Some(local_app_data) = std::env::var_os("LOCALAPPDATA") {
                Ok(PathBuf::from(local_app_data).join(app_name))
            } else {
                Err(Error::Config("Cannot determine cache directory".to_string()))
            }
        }

        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            Err(Error::Config(
                "Unsupported operating system for cache directory detection".to_string(),
            ))
        }
    }

    /// 缓存文件名由键转义得到：字母数字、`-`、`_` 原样保留，其余字节写成 `%XX`
    fn cache_file_path(&self, key: &str) -> PathBuf {
        let mut name = String::with_capacity(key.len() + 5);
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
                name.push(char::from(byte));
            } else {
                let _ = write!(name, "%{byte:02X}");
            }
        }
        name.push_str(".json");

        self.cache_dir.join(name)
    }
}

#[async_trait]
impl CacheBackend for FileCache {
    async fn set_raw(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|e| Error::Internal(format!("Failed to create cache directory: {e}")))?;

        let entry_with_header = create_cache_entry(value, ttl);

        let file_path = self.cache_file_path(key);
        tokio::fs::write(file_path, entry_with_header)
            .await
            .map_err(|e| Error::Internal(format!("Failed to write cache file: {e}")))?;
        Ok(())
    }

    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let file_path = self.cache_file_path(key);

        if !file_path.exists() {
            return Ok(None);
        }

        let content = tokio::fs::read(file_path)
            .await
            .map_err(|e| Error::Internal(format!("Failed to read cache file: {e}")))?;

        match parse_cache_entry(&content) {
            Ok((false, data)) => Ok(Some(data.to_vec())),
            Ok((true, _)) | Err(_) => {
                let _ = self.delete(key).await;
                Ok(None)
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let file_path = self.cache_file_path(key);
        if file_path.exists() {
            tokio::fs::remove_file(file_path)
                .await
                .map_err(|e| Error::Internal(format!("Failed to delete cache file: {e}")))?;
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get_raw(key).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_cache_roundtrip() {
        tokio_test::block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let cache = FileCache::new(dir.path().join("planner")).unwrap();

            cache
                .set_raw("session:cli:schedules", b"{}", Duration::from_secs(60))
                .await
                .unwrap();
            assert_eq!(
                cache.get_raw("session:cli:schedules").await.unwrap(),
                Some(b"{}".to_vec())
            );
            assert!(cache.exists("session:cli:schedules").await.unwrap());

            cache.delete("session:cli:schedules").await.unwrap();
            assert!(!cache.exists("session:cli:schedules").await.unwrap());
        });
    }

    #[test]
    fn test_truncated_entries_are_dropped() {
        tokio_test::block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let cache = FileCache::new(dir.path().to_path_buf()).unwrap();
            std::fs::write(cache.cache_file_path("k"), b"short").unwrap();

            assert_eq!(cache.get_raw("k").await.unwrap(), None);
            assert!(!cache.cache_file_path("k").exists());
        });
    }

    #[test]
    fn test_file_names_are_readable_and_distinct() {
        let cache = FileCache {
            cache_dir: PathBuf::from("/tmp/planner"),
        };

        assert_eq!(
            cache.cache_file_path("session:cli:schedules"),
            PathBuf::from("/tmp/planner/session%3Acli%3Aschedules.json")
        );
        assert_ne!(cache.cache_file_path("a:b"), cache.cache_file_path("a_b"));
        assert_eq!(
            cache.cache_file_path("../escape"),
            PathBuf::from("/tmp/planner/%2E%2E%2Fescape.json")
        );
    }

    #[test]
    fn test_expired_entries_are_dropped() {
        let mut raw = 0u64.to_le_bytes().to_vec();
        raw.extend_from_slice(&0u64.to_le_bytes());
        raw.extend_from_slice(b"data");

        let (expired, data) = parse_cache_entry(&raw).unwrap();
        assert!(expired);
        assert_eq!(data, b"data");
    }
}
