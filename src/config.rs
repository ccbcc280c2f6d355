use std::env;
use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than 0")]
    ZeroRateLimit(&'static str),
}

/// Per-minute request budgets for the public surface.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Per-IP budget for /license/check
    pub check_rpm: u32,
    /// Per-IP budget for /health
    pub relaxed_rpm: u32,
    /// Per-license-key budget across all IPs
    pub key_rpm: u32,
    /// Per-hwid budget across all IPs
    pub hwid_rpm: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            check_rpm: 30,
            relaxed_rpm: 60,
            key_rpm: 10,
            hwid_rpm: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub registry_database_path: String,
    pub dev_mode: bool,
    /// Reject checks without `x-forwarded-proto: https`
    pub require_tls: bool,
    /// None disables the admin surface entirely
    pub admin_api_key: Option<Arc<str>>,
    pub registry_enabled: bool,
    /// Days to keep check records (0 = forever)
    pub registry_retention_days: i64,
    pub rate_limit: RateLimitConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let dev_mode = var("LICENSOR_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let parsed = |name: &str| var(name).and_then(|v| v.trim().parse::<u32>().ok());
        let flag = |name: &str, default: bool| {
            var(name)
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(default)
        };

        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            check_rpm: parsed("RATE_LIMIT_CHECK_RPM").unwrap_or(defaults.check_rpm),
            relaxed_rpm: parsed("RATE_LIMIT_RELAXED_RPM").unwrap_or(defaults.relaxed_rpm),
            key_rpm: parsed("RATE_LIMIT_KEY_RPM").unwrap_or(defaults.key_rpm),
            hwid_rpm: parsed("RATE_LIMIT_HWID_RPM").unwrap_or(defaults.hwid_rpm),
        };
        for (name, value) in [
            ("RATE_LIMIT_CHECK_RPM", rate_limit.check_rpm),
            ("RATE_LIMIT_RELAXED_RPM", rate_limit.relaxed_rpm),
            ("RATE_LIMIT_KEY_RPM", rate_limit.key_rpm),
            ("RATE_LIMIT_HWID_RPM", rate_limit.hwid_rpm),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroRateLimit(name));
            }
        }

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: var("PORT").and_then(|p| p.parse().ok()).unwrap_or(3000),
            database_path: var("DATABASE_PATH").unwrap_or_else(|| "licensor.db".to_string()),
            registry_database_path: var("REGISTRY_DATABASE_PATH")
                .unwrap_or_else(|| "licensor_registry.db".to_string()),
            dev_mode,
            require_tls: flag("REQUIRE_TLS", !dev_mode),
            admin_api_key: var("ADMIN_API_KEY")
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .map(Arc::from),
            registry_enabled: flag("REGISTRY_ENABLED", true),
            registry_retention_days: var("REGISTRY_RETENTION_DAYS")
                .and_then(|d| d.trim().parse::<i64>().ok())
                .filter(|d| *d >= 0)
                .unwrap_or(30),
            rate_limit,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
