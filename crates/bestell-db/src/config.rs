//! # Database Configuration
//!
//! Which backend to talk to and how to size the pool.
//!
//! ## Backend Selection
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      DbConfig::from_env()                               │
//! │                                                                         │
//! │  DATABASE_URL set and non-empty?                                       │
//! │       │                                                                 │
//! │   yes ├──► Backend::Postgres { url }                                   │
//! │       │                                                                 │
//! │    no └──► Backend::Sqlite { path: $BESTELL_DB_PATH or kunden.db }     │
//! │                                                                         │
//! │  Optional: BESTELL_MAX_CONNECTIONS, BESTELL_BUSY_TIMEOUT_MS            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Default SQLite file when no backend is configured.
pub const DEFAULT_SQLITE_PATH: &str = "kunden.db";

/// Where the data lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Embedded SQLite file (`:memory:` for an in-memory database).
    Sqlite { path: PathBuf },
    /// PostgreSQL server.
    Postgres { url: String },
}

impl Backend {
    /// Connection URL understood by sqlx.
    pub fn url(&self) -> String {
        match self {
            Backend::Sqlite { path } if path.as_os_str() == ":memory:" => {
                "sqlite::memory:".to_string()
            }
            Backend::Sqlite { path } => format!("sqlite://{}?mode=rwc", path.display()),
            Backend::Postgres { url } => url.clone(),
        }
    }

    /// URL safe for logs (no password).
    pub fn redacted(&self) -> String {
        match self {
            Backend::Sqlite { path } => format!("sqlite:{}", path.display()),
            Backend::Postgres { url } => match (url.find("://"), url.rfind('@')) {
                (Some(scheme), Some(at)) if at > scheme => {
                    format!("{}://***{}", &url[..scheme], &url[at..])
                }
                _ => url.clone(),
            },
        }
    }
}

/// Database configuration.
///
/// ## Example
/// ```rust
/// use bestell_db::DbConfig;
///
/// let config = DbConfig::new("./kunden.db")
///     .max_connections(8)
///     .min_connections(1);
/// assert_eq!(config.max_connections, 8);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Backend to connect to.
    pub backend: Backend,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// How long to wait for a pooled connection.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection (`None` keeps it forever).
    /// Default: 10 minutes
    pub idle_timeout: Option<Duration>,

    /// Maximum lifetime of a connection (`None` keeps it forever).
    /// Default: 30 minutes
    pub max_lifetime: Option<Duration>,

    /// How long SQLite waits on a locked database before failing.
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    /// Whether to create missing tables on connect.
    /// Default: true
    pub initialize_schema: bool,
}

impl DbConfig {
    /// Creates a configuration for the SQLite file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig::with_backend(Backend::Sqlite { path: path.into() })
    }

    /// Creates a configuration for a PostgreSQL server.
    pub fn postgres(url: impl Into<String>) -> Self {
        DbConfig::with_backend(Backend::Postgres { url: url.into() })
    }

    fn with_backend(backend: Backend) -> Self {
        DbConfig {
            backend,
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            max_lifetime: Some(Duration::from_secs(1800)),
            busy_timeout: Duration::from_secs(5),
            initialize_schema: true,
        }
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// The database lives as long as its single connection, so the pool
    /// never closes or recycles it.
    pub fn in_memory() -> Self {
        DbConfig {
            backend: Backend::Sqlite {
                path: PathBuf::from(":memory:"),
            },
            max_connections: 1, // In-memory requires single connection
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: None,
            max_lifetime: None,
            busy_timeout: Duration::from_secs(5),
            initialize_schema: true,
        }
    }

    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        DbConfig::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through `lookup` (environment in production, a
    /// map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = match lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()) {
            Some(url) => {
                let url = url.trim().to_string();
                if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) {
                    return Err(ConfigError::InvalidValue("DATABASE_URL".to_string()));
                }
                DbConfig::postgres(url)
            }
            None => DbConfig::new(
                lookup("BESTELL_DB_PATH")
                    .filter(|path| !path.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_SQLITE_PATH.to_string()),
            ),
        };

        if let Some(max) = lookup("BESTELL_MAX_CONNECTIONS") {
            config.max_connections = max
                .trim()
                .parse()
                .ok()
                .filter(|&n: &u32| n > 0)
                .ok_or_else(|| ConfigError::InvalidValue("BESTELL_MAX_CONNECTIONS".to_string()))?;
            config.min_connections = config.min_connections.min(config.max_connections);
        }

        if let Some(ms) = lookup("BESTELL_BUSY_TIMEOUT_MS") {
            let ms: u64 = ms
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue("BESTELL_BUSY_TIMEOUT_MS".to_string()))?;
            config.busy_timeout = Duration::from_millis(ms);
        }

        Ok(config)
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the SQLite busy timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets whether to create missing tables on connect.
    pub fn initialize_schema(mut self, initialize: bool) -> Self {
        self.initialize_schema = initialize;
        self
    }
}

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

// =============================================================================
// Unit Tests
// =============================================================================
