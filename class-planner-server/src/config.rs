use std::{env, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use class_planner_core::{cache::SessionStore, snapshot::default_snapshot_path};

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_URL_PREFIX: &str = "/class-planner";

/// 服务配置，启动时从环境变量读取一次
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub timetable_path: PathBuf,
    pub snapshot_path: PathBuf,
    pub port: u16,
    /// 路由挂载前缀，空串表示挂在根路径
    pub url_prefix: String,
    pub redis_url: Option<String>,
    pub session_ttl: Duration,
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let timetable_path = non_empty("TIMETABLE_PATH")
            .map(PathBuf::from)
            .context("TIMETABLE_PATH environment variable is required")?;

        let snapshot_path = non_empty("SNAPSHOT_PATH")
            .map_or_else(|| default_snapshot_path(&timetable_path), PathBuf::from);

        let port = match non_empty("PORT") {
            Some(port) => port
                .parse::<u16>()
                .with_context(|| format!("Invalid PORT: {port}"))?,
            None => DEFAULT_PORT,
        };

        let url_prefix = env::var("URL_PREFIX")
            .map_or_else(|_| DEFAULT_URL_PREFIX.to_string(), |s| normalize_prefix(&s));

        let session_ttl = match non_empty("SESSION_TTL_SECS") {
            Some(secs) => Duration::from_secs(
                secs.parse()
                    .with_context(|| format!("Invalid SESSION_TTL_SECS: {secs}"))?,
            ),
            None => SessionStore::DEFAULT_TTL,
        };

        Ok(Self {
            timetable_path,
            snapshot_path,
            port,
            url_prefix,
            redis_url: non_empty("REDIS_URL"),
            session_ttl,
        })
    }
}

/// "class-planner/" → "/class-planner"，"/" 与空串 → ""
fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("/class-planner"), "/class-planner");
        assert_eq!(normalize_prefix("class-planner/"), "/class-planner");
        assert_eq!(normalize_prefix(" /a/b/ "), "/a/b");
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix(""), "");
    }
}
