//! Centralized configuration (environment variables + defaults).

use crate::infra::auth::ApiKeys;
use anyhow::Context;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub bind_addr: SocketAddr,
    /// PostgreSQL URL. Without it the catalog lives in memory.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    /// Directory for cover blobs. Without it covers live in memory.
    pub cover_dir: Option<PathBuf>,
    pub api_keys: ApiKeys,
}

impl CatalogConfig {
    /// Reads the process environment, after loading `.env` if present.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = non_empty("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .context("BIND_ADDR must be a socket address like 0.0.0.0:3000")?;

        let database_max_connections = match non_empty("DATABASE_MAX_CONNECTIONS") {
            Some(v) => v
                .parse::<u32>()
                .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?
                .max(1),
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let api_keys = match non_empty("CATALOG_API_KEYS") {
            Some(spec) => ApiKeys::parse(&spec).context("CATALOG_API_KEYS is malformed")?,
            None => ApiKeys::default(),
        };

        Ok(Self {
            bind_addr,
            database_url: non_empty("DATABASE_URL"),
            database_max_connections,
            cover_dir: non_empty("COVER_DIR").map(PathBuf::from),
            api_keys,
        })
    }
}
