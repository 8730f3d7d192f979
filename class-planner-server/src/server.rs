use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use class_planner_core::{
    cache::{CacheBackend, MemoryCache, SessionStore},
    planner::Planner,
    snapshot::CatalogLoader,
    source::WorkbookSource,
};
use tokio::net::TcpListener;

use crate::{
    cache::RedisCache,
    config::ServerConfig,
    handlers::{AppState, create_app},
};

/// 会话后端：配置了 REDIS_URL 时使用 Redis，否则使用进程内缓存
async fn session_backend(config: &ServerConfig) -> Result<Arc<dyn CacheBackend>> {
    match config.redis_url {
        Some(ref url) => {
            let cache = RedisCache::new(url, Some("class-planner".to_string())).await?;
            tracing::info!("Sessions stored in Redis");
            Ok(Arc::new(cache))
        }
        None => {
            tracing::info!("REDIS_URL not set, sessions kept in memory");
            Ok(Arc::new(MemoryCache::new()))
        }
    }
}

pub async fn start_server(config: ServerConfig) -> Result<()> {
    // 课表文件损坏时直接启动失败
    let loader = CatalogLoader::new(WorkbookSource::new(&config.timetable_path))
        .with_snapshot(&config.snapshot_path);
    let path = loader.source().path().to_path_buf();
    let catalog = tokio::task::spawn_blocking(move || loader.load())
        .await?
        .map_err(|e| anyhow::anyhow!("Failed to load timetable {}: {}", path.display(), e))?;

    let state = AppState {
        planner: Arc::new(Planner::new(Arc::new(catalog))),
        sessions: SessionStore::new(session_backend(&config).await?, config.session_ttl),
    };
    let app = create_app(state, &config.url_prefix);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    tracing::info!(
        "Class Planner Server starting on {}{}",
        addr,
        if config.url_prefix.is_empty() { "/" } else { config.url_prefix.as_str() }
    );

    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
