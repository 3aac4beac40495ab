//! Application configuration module
//!
//! Handles loading and validating configuration from environment variables.

use serde::Deserialize;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Ipv4Addr,
    pub port: u16,
    /// Upper bound on a single request, storage calls included
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::new(0, 0, 0, 0), // Bind to 0.0.0.0 for Docker
            port: 3000,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_pool_size: usize,
    pub require_tls: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            database: "postgres".to_string(),
            max_pool_size: 10,
            require_tls: false,
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:5173".to_string()],
        }
    }
}

/// Which store backs the services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(ConfigError::InvalidValue(format!(
                "STORAGE_BACKEND must be 'postgres' or 'memory', got '{}'",
                other
            ))),
        }
    }
}

/// Where the eligible voter count comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RosterSource {
    /// Fixed placeholder count from `ELIGIBLE_MEMBERS`
    Fixed,
    /// Row count of the member directory's `members` table
    Members,
}

impl FromStr for RosterSource {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(RosterSource::Fixed),
            "members" => Ok(RosterSource::Members),
            other => Err(ConfigError::InvalidValue(format!(
                "ROSTER_SOURCE must be 'fixed' or 'members', got '{}'",
                other
            ))),
        }
    }
}

/// Governance rules configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GovernanceConfig {
    pub storage: StorageBackend,
    pub roster: RosterSource,
    /// Placeholder roster size used by `RosterSource::Fixed`
    pub eligible_members: u32,
    /// Cap applied to the `limit` of a vote listing
    pub votes_max_page: u32,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            storage: StorageBackend::Postgres,
            roster: RosterSource::Fixed,
            eligible_members: 10,
            votes_max_page: 100,
        }
    }
}

/// Member authentication configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret for bearer tokens; bearer auth is off when unset
    pub jwt_secret: Option<String>,
    /// Accept `X-User-Id` from a trusted gateway
    pub trust_user_header: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            trust_user_header: false,
        }
    }
}

/// Complete application settings
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub governance: GovernanceConfig,
    pub auth: AuthConfig,
}

impl Settings {
    /// Load settings from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; `load` passes the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server = ServerConfig {
            host: parse_or(&lookup, "HOST", ServerConfig::default().host)?,
            port: parse_or(&lookup, "PORT", ServerConfig::default().port)?,
            request_timeout: Duration::from_secs(parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30u64)?),
        };

        let max_pool_size = parse_or(&lookup, "DB_MAX_CONNECTIONS", 10usize)?;

        // Try to load DATABASE_URL first (modern format), fall back to individual vars
        let database = if let Some(database_url) = lookup("DATABASE_URL") {
            Self::parse_database_url(&database_url, max_pool_size)?
        } else {
            DatabaseConfig {
                host: lookup("DB_HOST").unwrap_or_else(|| "localhost".to_string()),
                port: parse_or(&lookup, "DB_PORT", 5432u16)?,
                user: lookup("DB_USER").unwrap_or_else(|| "postgres".to_string()),
                password: lookup("DB_PASSWORD").unwrap_or_default(),
                database: lookup("DB_NAME").unwrap_or_else(|| "postgres".to_string()),
                max_pool_size,
                require_tls: parse_or(&lookup, "DB_REQUIRE_TLS", false)?,
            }
        };

        let cors = CorsConfig {
            allowed_origins: lookup("ALLOWED_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or_else(|| CorsConfig::default().allowed_origins),
        };

        let defaults = GovernanceConfig::default();
        let governance = GovernanceConfig {
            storage: parse_or(&lookup, "STORAGE_BACKEND", defaults.storage)?,
            roster: parse_or(&lookup, "ROSTER_SOURCE", defaults.roster)?,
            eligible_members: parse_or(&lookup, "ELIGIBLE_MEMBERS", defaults.eligible_members)?,
            votes_max_page: parse_or(&lookup, "VOTES_MAX_PAGE", defaults.votes_max_page)?,
        };
        if governance.votes_max_page == 0 {
            return Err(ConfigError::InvalidValue("VOTES_MAX_PAGE must be positive".to_string()));
        }

        let auth = AuthConfig {
            jwt_secret: lookup("JWT_SECRET").filter(|s| !s.is_empty()),
            trust_user_header: parse_or(&lookup, "TRUST_USER_HEADER", false)?,
        };
        if auth.jwt_secret.is_none() && !auth.trust_user_header {
            return Err(ConfigError::MissingVar(
                "JWT_SECRET (or set TRUST_USER_HEADER=true behind a gateway)".to_string(),
            ));
        }

        Ok(Self {
            server,
            database,
            cors,
            governance,
            auth,
        })
    }

    /// Parse a DATABASE_URL connection string (postgresql://...)
    fn parse_database_url(url: &str, max_pool_size: usize) -> Result<DatabaseConfig, ConfigError> {
        match url::Url::parse(url) {
            Ok(parsed) => {
                let host = parsed.host_str()
                    .ok_or_else(|| ConfigError::InvalidValue("Missing host in DATABASE_URL".to_string()))?
                    .to_string();

                let port = parsed.port().unwrap_or(5432);

                let user = parsed.username().to_string();
                let password = parsed.password()
                    .map(|p| p.to_string())
                    .unwrap_or_default();

                let database = parsed.path()
                    .trim_start_matches('/')
                    .to_string();
                if database.is_empty() {
                    return Err(ConfigError::InvalidValue(
                        "Missing database name in DATABASE_URL".to_string(),
                    ));
                }

                let require_tls = parsed
                    .query_pairs()
                    .any(|(k, v)| k == "sslmode" && (v == "require" || v == "verify-full"))
                    || host.contains("neon.tech");

                Ok(DatabaseConfig {
                    host,
                    port,
                    user,
                    password,
                    database,
                    max_pool_size,
                    require_tls,
                })
            }
            Err(_) => Err(ConfigError::InvalidValue(
                "Invalid DATABASE_URL format (expected postgresql://...)".to_string()
            ))
        }
    }
}

/// Parse an optional variable, falling back to `default` when unset
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{}='{}'", key, raw))),
        None => Ok(default),
    }
}
