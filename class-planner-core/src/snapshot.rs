use std::{
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use crate::{Error, Result, builder, catalog::Catalog, source::TimetableSource};

/// 快照头部大小：[来源修改时间(8字节)] + [写入时间(8字节)]
const HEADER_SIZE: usize = 16;

fn millis_since_epoch(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// 编码快照：头部 + JSON
pub fn encode_snapshot(catalog: &Catalog, source_modified: SystemTime) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(catalog)?;

    let mut entry = Vec::with_capacity(HEADER_SIZE + body.len());
    entry.extend_from_slice(&millis_since_epoch(source_modified).to_le_bytes());
    entry.extend_from_slice(&now_secs().to_le_bytes());
    entry.extend_from_slice(&body);
    Ok(entry)
}

/// 解析快照头部，返回记录的来源修改时间(毫秒)与 JSON 部分
pub fn decode_header(raw: &[u8]) -> Result<(u64, &[u8])> {
    if raw.len() < HEADER_SIZE {
        return Err(Error::Snapshot("truncated header".to_string()));
    }

    let recorded = u64::from_le_bytes(
        raw[0..8]
            .try_into()
            .map_err(|_| Error::Snapshot("invalid mtime field".to_string()))?,
    );
    Ok((recorded, &raw[HEADER_SIZE..]))
}

/// 默认快照路径：与来源文件同目录，扩展名为 `.cache`
pub fn default_snapshot_path(source: &Path) -> PathBuf {
    source.with_extension("cache")
}

/// 目录加载器：优先使用未过期的快照，否则重新构建并写回快照
///
/// 来源修改时间晚于快照记录的时间即视为过期；快照损坏时重新构建，不会报错。
pub struct CatalogLoader<S: TimetableSource> {
    source: S,
    snapshot_path: Option<PathBuf>,
}

impl<S: TimetableSource> CatalogLoader<S> {
    /// 不使用快照的加载器
    pub const fn new(source: S) -> Self {
        Self {
            source,
            snapshot_path: None,
        }
    }

    pub fn with_snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    pub const fn source(&self) -> &S {
        &self.source
    }

    /// 加载目录
    ///
    /// 来源本身无法读取时返回错误；快照读写失败只记录日志。
    pub fn load(&self) -> Result<Catalog> {
        let modified = self.source.modified()?;

        if let Some(ref path) = self.snapshot_path {
            match read_snapshot(path, modified) {
                Ok(Some(catalog)) => {
                    tracing::info!(
                        "Loaded catalog snapshot {} ({} offerings)",
                        path.display(),
                        catalog.len()
                    );
                    return Ok(catalog);
                }
                Ok(None) => {
                    tracing::debug!("No fresh snapshot at {}", path.display());
                }
                Err(e) => {
                    tracing::warn!("Ignoring snapshot {}: {}", path.display(), e);
                }
            }
        }

        tracing::info!("Building catalog from {}", self.source.describe());
        let rows = self.source.read_rows()?;
        let catalog = builder::build(&rows);

        if let Some(ref path) = self.snapshot_path {
            if let Err(e) = write_snapshot(path, &catalog, modified) {
                tracing::warn!("Failed to write snapshot {}: {}", path.display(), e);
            }
        }

        Ok(catalog)
    }
}

/// 读取快照；不存在或已过期时返回 `Ok(None)`
fn read_snapshot(path: &Path, source_modified: SystemTime) -> Result<Option<Catalog>> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let (recorded, body) = decode_header(&raw)?;
    if millis_since_epoch(source_modified) > recorded {
        return Ok(None);
    }

    let catalog = serde_json::from_slice(body)
        .map_err(|e| Error::Snapshot(format!("invalid catalog: {e}")))?;
    Ok(Some(catalog))
}

/// 先写临时文件再重命名，避免留下半写的快照
fn write_snapshot(path: &Path, catalog: &Catalog, source_modified: SystemTime) -> Result<()> {
    let entry = encode_snapshot(catalog, source_modified)?;
    let tmp = path.with_extension("cache.tmp");
    std::fs::write(&tmp, entry)?;
    std::fs::rename(&tmp, path)?;
    tracing::debug!("Wrote catalog snapshot {}", path.display());
    Ok(())
}
