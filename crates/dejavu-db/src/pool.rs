//! Connection pool setup and health logging.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info, warn};

use dejavu_core::defaults::DB_MAX_CONNECTIONS;
use dejavu_core::{Error, Result};

/// Seconds to wait for a free connection before a query fails.
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Seconds an unused connection stays open.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

/// Pool sizing and timeouts.
///
/// A history sweep, live ingestion and retrieval share one pool, so the
/// ceiling bounds how many of them query the store at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DB_MAX_CONNECTIONS,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
        }
    }
}

impl PoolConfig {
    /// Read the pool settings from the environment.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `DB_MAX_CONNECTIONS` | `10` |
    /// | `DB_MIN_CONNECTIONS` | `1` |
    /// | `DB_ACQUIRE_TIMEOUT_SECS` | `30` |
    /// | `DB_IDLE_TIMEOUT_SECS` | `600` |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`PoolConfig::from_env`] with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        fn parse<T: std::str::FromStr>(name: &str, value: Option<String>) -> Result<Option<T>> {
            value
                .map(|v| {
                    v.trim()
                        .parse::<T>()
                        .map_err(|_| Error::Config(format!("{} must be a number, got {:?}", name, v)))
                })
                .transpose()
        }

        let defaults = Self::default();
        let config = Self {
            max_connections: parse("DB_MAX_CONNECTIONS", lookup("DB_MAX_CONNECTIONS"))?
                .unwrap_or(defaults.max_connections),
            min_connections: parse("DB_MIN_CONNECTIONS", lookup("DB_MIN_CONNECTIONS"))?
                .unwrap_or(defaults.min_connections),
            acquire_timeout: parse("DB_ACQUIRE_TIMEOUT_SECS", lookup("DB_ACQUIRE_TIMEOUT_SECS"))?
                .map(Duration::from_secs)
                .unwrap_or(defaults.acquire_timeout),
            idle_timeout: parse("DB_IDLE_TIMEOUT_SECS", lookup("DB_IDLE_TIMEOUT_SECS"))?
                .map(Duration::from_secs)
                .unwrap_or(defaults.idle_timeout),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(Error::Config("DB_MAX_CONNECTIONS must be at least 1".to_string()));
        }
        if self.min_connections > self.max_connections {
            return Err(Error::Config(format!(
                "DB_MIN_CONNECTIONS ({}) exceeds DB_MAX_CONNECTIONS ({})",
                self.min_connections, self.max_connections
            )));
        }
        Ok(())
    }
}

/// Open a pool. Failing to connect is fatal for whatever asked for it.
pub async fn create_pool(database_url: &str, config: &PoolConfig) -> Result<PgPool> {
    config.validate()?;
    let start = Instant::now();

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "db",
        component = "pool",
        op = "connect",
        max_connections = config.max_connections,
        pool_size = pool.size(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Database pool ready"
    );
    Ok(pool)
}

/// Log pool occupancy; warns when every connection is busy.
pub fn log_pool_metrics(pool: &PgPool) {
    let size = pool.size();
    let idle = pool.num_idle();

    debug!(
        subsystem = "db",
        component = "pool",
        op = "metrics",
        pool_size = size,
        pool_idle = idle,
        "Pool health check"
    );
    if idle == 0 && size > 0 {
        warn!(
            subsystem = "db",
            component = "pool",
            pool_size = size,
            "No idle connections, sweeps and searches may queue"
        );
    }
}
