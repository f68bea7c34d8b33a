//! Configuration management

use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// Application Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_APP_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_APP_PORT: u16 = 3000;

/// Default protocol advertised in logs.
pub const DEFAULT_APP_PROTOCOL: &str = "http";

/// Default application name returned by the root endpoint.
pub const DEFAULT_APP_NAME: &str = "crud-skeleton";

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Health Check Constants
// ============================================================================

pub const DEFAULT_DISK_HEALTH_KEY: &str = "ms-disk";
pub const DEFAULT_DISK_HEALTH_THRESHOLD: f64 = 0.9;
pub const DEFAULT_DISK_HEALTH_PATH: &str = "/";
pub const DEFAULT_HEAP_HEALTH_KEY: &str = "memory_heap";
pub const DEFAULT_RSS_HEALTH_KEY: &str = "memory_rss";
pub const DEFAULT_PING_HEALTH_KEY: &str = "http-ping";

/// Default heap and RSS threshold (150 MiB).
pub const DEFAULT_MEMORY_THRESHOLD_BYTES: u64 = 150 * 1024 * 1024;

// ============================================================================
// Cache / Database / Crypto Constants
// ============================================================================

/// Default cache entry lifetime in seconds (5 minutes).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Default maximum number of cached entries.
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 100;

pub const DEFAULT_MONGO_HOST: &str = "localhost";
pub const DEFAULT_MONGO_PORT: u16 = 27017;
pub const DEFAULT_MONGO_DATABASE: &str = "crud_skeleton";

/// Replica set every deployment connects to.
pub const DEFAULT_MONGO_REPLICA_SET: &str = "dbrs";

pub const DEFAULT_MONGO_SERVER_SELECTION_TIMEOUT_MS: u64 = 50;
pub const DEFAULT_MONGO_CONNECT_TIMEOUT_MS: u64 = 50;

/// Development-only data key. Override with `DATAKEY` everywhere else.
pub const DEFAULT_ENCRYPTION_KEY: &str = "u8x/A?D(G+KbPdSgVkYp3s6v9y$B&E)H";
pub const DEFAULT_ENCRYPTION_ALGORITHM: &str = "aes-256-cbc";
pub const DEFAULT_CRYPTO_BASE_URL: &str = "http://127.0.0.1:3010";
pub const DEFAULT_CRYPTO_SERVICE_URL: &str = "/api/crypto";

/// Default CORS allowed origin for local development.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:3000";

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            _ => Err(anyhow::anyhow!("Invalid environment: {}", s)),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub health: HealthConfig,
    pub cors: CorsConfig,
    pub cache: CacheConfig,
    pub database: DatabaseConfig,
    pub encryption: EncryptionConfig,
    pub crypto_service: CryptoServiceConfig,
    pub auth: AuthConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub protocol: String,
    pub name: String,
    pub environment: Environment,
    pub shutdown_timeout_secs: u64,
    /// Include the error source chain in 500 responses
    pub enable_error_stack: bool,
}

/// Health check thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    pub disk_key: String,
    /// Maximum fraction of used disk space (0.0 - 1.0)
    pub disk_threshold: f64,
    pub disk_path: String,
    pub heap_key: String,
    pub heap_threshold_bytes: u64,
    pub rss_key: String,
    pub rss_threshold_bytes: u64,
    pub ping_key: String,
    /// Outbound URL to ping; the check is skipped when unset
    pub ping_url: Option<String>,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub enabled: bool,
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

/// TTL cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub max_entries: usize,
}

/// Document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub uri: String,
    /// Explicit database name; when unset the one named in `uri` is used
    pub database: Option<String>,
    pub server_selection_timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

/// Field encryption settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionConfig {
    pub enabled: bool,
    #[serde(skip_serializing)]
    pub secret_key: String,
    pub algorithm: String,
}

/// Remote crypto service endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoServiceConfig {
    pub base_url: String,
    pub service_url: String,
}

impl CryptoServiceConfig {
    /// Full endpoint URL
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.service_url.trim_start_matches('/')
        )
    }
}

/// Service API key allow-list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(skip_serializing)]
    pub api_keys: Vec<String>,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            app: AppConfig {
                host: env_or("APP_HOST", DEFAULT_APP_HOST),
                port: env_parse("APP_PORT", DEFAULT_APP_PORT),
                protocol: env_or("APP_PROTOCOL", DEFAULT_APP_PROTOCOL),
                name: env_or("APP_NAME", DEFAULT_APP_NAME),
                environment: match std::env::var("APP_ENV") {
                    Ok(value) => value.parse()?,
                    Err(_) => Environment::default(),
                },
                shutdown_timeout_secs: env_parse("SHUTDOWN_TIMEOUT", DEFAULT_SHUTDOWN_TIMEOUT_SECS),
                enable_error_stack: env_flag("ENABLE_ERROR_STACK", false),
            },
            health: HealthConfig {
                disk_key: env_or("DISK_HEALTH_KEY", DEFAULT_DISK_HEALTH_KEY),
                disk_threshold: env_parse("DISK_HEALTH_THRESHOLD", DEFAULT_DISK_HEALTH_THRESHOLD),
                disk_path: env_or("DISK_HEALTH_PATH", DEFAULT_DISK_HEALTH_PATH),
                heap_key: env_or("MEMORY_HEALTH_HEAP_KEY", DEFAULT_HEAP_HEALTH_KEY),
                heap_threshold_bytes: env_parse(
                    "MEMORY_HEALTH_HEAP_THRESHOLD",
                    DEFAULT_MEMORY_THRESHOLD_BYTES,
                ),
                rss_key: env_or("MEMORY_HEALTH_RSS_KEY", DEFAULT_RSS_HEALTH_KEY),
                rss_threshold_bytes: env_parse(
                    "MEMORY_HEALTH_RSS_THRESHOLD",
                    DEFAULT_MEMORY_THRESHOLD_BYTES,
                ),
                ping_key: env_or("HEALTH_PING_KEY", DEFAULT_PING_HEALTH_KEY),
                ping_url: std::env::var("HEALTH_PING_URL").ok().filter(|s| !s.is_empty()),
            },
            cors: CorsConfig {
                enabled: env_flag("ENABLE_CORS", false),
                allowed_origins: env_or("ENABLE_CORS_ORIGIN", DEFAULT_CORS_ALLOWED_ORIGIN)
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                allow_credentials: env_flag("ENABLE_CORS_CREDENTIALS", true),
            },
            cache: CacheConfig {
                ttl_secs: env_parse("CACHE_TTL", DEFAULT_CACHE_TTL_SECS),
                max_entries: env_parse("CACHE_MAX_ENTRIES", DEFAULT_CACHE_MAX_ENTRIES),
            },
            database: DatabaseConfig {
                uri: std::env::var("MONGO_URI").unwrap_or_else(|_| {
                    mongo_uri(
                        &env_or("MONGO_HOST", DEFAULT_MONGO_HOST),
                        env_parse("MONGO_PORT", DEFAULT_MONGO_PORT),
                        &env_or("MONGO_DATABASE", DEFAULT_MONGO_DATABASE),
                    )
                }),
                database: std::env::var("MONGO_DATABASE").ok(),
                server_selection_timeout_ms: env_parse(
                    "MONGO_SERVER_SELECTION_TIMEOUT",
                    DEFAULT_MONGO_SERVER_SELECTION_TIMEOUT_MS,
                ),
                connect_timeout_ms: env_parse(
                    "MONGO_CONNECT_TIMEOUT",
                    DEFAULT_MONGO_CONNECT_TIMEOUT_MS,
                ),
            },
            encryption: EncryptionConfig {
                enabled: env_flag("ENABLE_ENCRYPT_DECRYPT_FEATURE", false),
                secret_key: env_or("DATAKEY", DEFAULT_ENCRYPTION_KEY),
                algorithm: env_or("ALGORITHM_KEY", DEFAULT_ENCRYPTION_ALGORITHM),
            },
            crypto_service: CryptoServiceConfig {
                base_url: env_or("CRYPTO_BASE_URL", DEFAULT_CRYPTO_BASE_URL),
                service_url: env_or("CRYPTO_SERVICE_URL", DEFAULT_CRYPTO_SERVICE_URL),
            },
            auth: AuthConfig {
                api_keys: parse_api_keys(&std::env::var("SERVICE_API_KEYS").unwrap_or_default())?,
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.app.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.database.uri.is_empty() {
            anyhow::bail!("Database URI cannot be empty");
        }

        if !(0.0..=1.0).contains(&self.health.disk_threshold) {
            anyhow::bail!(
                "Disk health threshold must be between 0 and 1, got {}",
                self.health.disk_threshold
            );
        }

        if self.cache.max_entries == 0 {
            anyhow::bail!("Cache max entries must be greater than 0");
        }

        if self.environment_is_production()
            && self.encryption.enabled
            && self.encryption.secret_key == DEFAULT_ENCRYPTION_KEY
        {
            anyhow::bail!("DATAKEY must be set when encryption is enabled in production");
        }

        if self.cors.enabled && self.cors.allowed_origins.is_empty() {
            tracing::warn!("CORS enabled without origins - all origins will be allowed");
        }

        Ok(())
    }

    pub fn environment_is_production(&self) -> bool {
        self.app.environment == Environment::Production
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app: AppConfig {
                host: DEFAULT_APP_HOST.to_string(),
                port: DEFAULT_APP_PORT,
                protocol: DEFAULT_APP_PROTOCOL.to_string(),
                name: DEFAULT_APP_NAME.to_string(),
                environment: Environment::Development,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                enable_error_stack: false,
            },
            health: HealthConfig {
                disk_key: DEFAULT_DISK_HEALTH_KEY.to_string(),
                disk_threshold: DEFAULT_DISK_HEALTH_THRESHOLD,
                disk_path: DEFAULT_DISK_HEALTH_PATH.to_string(),
                heap_key: DEFAULT_HEAP_HEALTH_KEY.to_string(),
                heap_threshold_bytes: DEFAULT_MEMORY_THRESHOLD_BYTES,
                rss_key: DEFAULT_RSS_HEALTH_KEY.to_string(),
                rss_threshold_bytes: DEFAULT_MEMORY_THRESHOLD_BYTES,
                ping_key: DEFAULT_PING_HEALTH_KEY.to_string(),
                ping_url: None,
            },
            cors: CorsConfig {
                enabled: false,
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
                allow_credentials: true,
            },
            cache: CacheConfig {
                ttl_secs: DEFAULT_CACHE_TTL_SECS,
                max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            },
            database: DatabaseConfig {
                uri: mongo_uri(DEFAULT_MONGO_HOST, DEFAULT_MONGO_PORT, DEFAULT_MONGO_DATABASE),
                database: None,
                server_selection_timeout_ms: DEFAULT_MONGO_SERVER_SELECTION_TIMEOUT_MS,
                connect_timeout_ms: DEFAULT_MONGO_CONNECT_TIMEOUT_MS,
            },
            encryption: EncryptionConfig {
                enabled: false,
                secret_key: DEFAULT_ENCRYPTION_KEY.to_string(),
                algorithm: DEFAULT_ENCRYPTION_ALGORITHM.to_string(),
            },
            crypto_service: CryptoServiceConfig {
                base_url: DEFAULT_CRYPTO_BASE_URL.to_string(),
                service_url: DEFAULT_CRYPTO_SERVICE_URL.to_string(),
            },
            auth: AuthConfig::default(),
        }
    }
}

/// Builds the replica-set connection string used by every deployment.
pub fn mongo_uri(host: &str, port: u16, database: &str) -> String {
    format!(
        "mongodb://{}:{}/{}?replicaSet={}&directConnection=true",
        host, port, database, DEFAULT_MONGO_REPLICA_SET
    )
}

/// Parses the string-encoded API key list.
///
/// Accepts a JSON array (`["k1","k2"]`) or a comma-separated list (`k1,k2`).
/// Blank entries are dropped.
pub fn parse_api_keys(raw: &str) -> anyhow::Result<Vec<String>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }

    let keys: Vec<String> = if raw.starts_with('[') {
        serde_json::from_str(raw)
            .map_err(|e| anyhow::anyhow!("SERVICE_API_KEYS is not a JSON string array: {}", e))?
    } else {
        raw.split(',').map(str::to_string).collect()
    };

    Ok(keys
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect())
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_mongo_uri() {
        assert_eq!(
            mongo_uri("mongo-0", 27017, "orders"),
            "mongodb://mongo-0:27017/orders?replicaSet=dbrs&directConnection=true"
        );
    }

    #[test]
    fn test_parse_api_keys_json() {
        let keys = parse_api_keys(r#"["apiKey1", "apiKey2"]"#).unwrap();
        assert_eq!(keys, vec!["apiKey1", "apiKey2"]);
    }

    #[test]
    fn test_parse_api_keys_comma_separated() {
        let keys = parse_api_keys("apiKey1, apiKey2,,").unwrap();
        assert_eq!(keys, vec!["apiKey1", "apiKey2"]);
    }

    #[test]
    fn test_parse_api_keys_empty_and_invalid() {
        assert!(parse_api_keys("  ").unwrap().is_empty());
        assert!(parse_api_keys("[1, 2").is_err());
    }

    #[test]
    fn test_crypto_endpoint_joins_paths() {
        let config = CryptoServiceConfig {
            base_url: "http://127.0.0.1:3010/".to_string(),
            service_url: "/api/crypto".to_string(),
        };
        assert_eq!(config.endpoint(), "http://127.0.0.1:3010/api/crypto");
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.app.port, 3000);
        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(config.health.heap_threshold_bytes, 150 * 1024 * 1024);
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut config = Config::default();
        config.health.disk_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_default_key_in_production() {
        let mut config = Config::default();
        config.app.environment = Environment::Production;
        config.encryption.enabled = true;
        assert!(config.validate().is_err());

        config.encryption.secret_key = "a-real-key".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_load_defaults() {
        let config = Config::load().unwrap();
        assert_eq!(config.app.host, DEFAULT_APP_HOST);
        assert_eq!(config.app.environment, Environment::Development);
        assert_eq!(config.health.disk_key, DEFAULT_DISK_HEALTH_KEY);
        assert!(config.health.ping_url.is_none());
        assert!(config.auth.api_keys.is_empty());
        assert!(!config.cors.enabled);
    }

    #[test]
    #[serial]
    fn test_mongo_uri_without_database_override() {
        std::env::set_var("MONGO_URI", "mongodb://db.internal:27017/orders");

        let config = Config::load().unwrap();
        assert_eq!(config.database.uri, "mongodb://db.internal:27017/orders");
        assert!(config.database.database.is_none());

        std::env::remove_var("MONGO_URI");
    }

    #[test]
    #[serial]
    fn test_load_from_env() {
        std::env::set_var("APP_PORT", "4100");
        std::env::set_var("APP_ENV", "production");
        std::env::set_var("MONGO_HOST", "db.internal");
        std::env::set_var("MONGO_DATABASE", "ledger");
        std::env::set_var("SERVICE_API_KEYS", r#"["k1"]"#);
        std::env::set_var("ENABLE_CORS", "TRUE");

        let config = Config::load().unwrap();
        assert_eq!(config.app.port, 4100);
        assert!(config.environment_is_production());
        assert_eq!(
            config.database.uri,
            "mongodb://db.internal:27017/ledger?replicaSet=dbrs&directConnection=true"
        );
        assert_eq!(config.database.database.as_deref(), Some("ledger"));
        assert_eq!(config.auth.api_keys, vec!["k1"]);
        assert!(config.cors.enabled);

        for key in [
            "APP_PORT",
            "APP_ENV",
            "MONGO_HOST",
            "MONGO_DATABASE",
            "SERVICE_API_KEYS",
            "ENABLE_CORS",
        ] {
            std::env::remove_var(key);
        }
    }
}
