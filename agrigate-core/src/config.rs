//! Gateway configuration.
//!
//! All configuration is read once at startup from `AGRIGATE_*`
//! environment variables; nothing re-reads the environment afterwards.

use std::net::SocketAddr;
use std::time::Duration;

/// Resolved gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub listen_addr: SocketAddr,

    /// Symmetric token-signing secret
    pub token_secret: String,
    /// Token lifetime in hours
    pub token_ttl_hours: i64,

    /// Weather cache TTL
    pub cache_ttl: Duration,

    /// ReAct loop iteration cap
    pub max_iterations: usize,
    /// Overall per-request deadline
    pub request_deadline: Duration,

    /// Upstream endpoints; tools fall back to offline stand-ins when
    /// unset
    pub search_url: Option<String>,
    pub search_api_key: Option<String>,
    pub translate_url: Option<String>,
    pub weather_url: Option<String>,
    pub generate_url: Option<String>,
    pub session_store_url: Option<String>,

    /// Super administrator provisioned at cold start
    pub admin_email: String,
    pub admin_password: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".parse().expect("static address parses"),
            token_secret: "insecure-dev-secret".to_string(),
            token_ttl_hours: 168,
            cache_ttl: Duration::from_secs(30 * 60),
            max_iterations: 5,
            request_deadline: Duration::from_secs(60),
            search_url: None,
            search_api_key: None,
            translate_url: None,
            weather_url: None,
            generate_url: None,
            session_store_url: None,
            admin_email: "admin@agrigate.local".to_string(),
            admin_password: "ChangeMe1".to_string(),
        }
    }
}

/// Errors raised while resolving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

impl GatewayConfig {
    /// Read configuration from the environment.
    ///
    /// `AGRIGATE_TOKEN_SECRET` is required; everything else has a
    /// default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self {
            token_secret: required("AGRIGATE_TOKEN_SECRET")?,
            ..Self::default()
        };

        if let Some(addr) = optional("AGRIGATE_LISTEN_ADDR") {
            config.listen_addr = addr.parse().map_err(|e| ConfigError::Invalid {
                var: "AGRIGATE_LISTEN_ADDR",
                reason: format!("{}", e),
            })?;
        }
        if let Some(hours) = optional("AGRIGATE_TOKEN_TTL_HOURS") {
            config.token_ttl_hours = parse_num("AGRIGATE_TOKEN_TTL_HOURS", &hours)?;
        }
        if let Some(minutes) = optional("AGRIGATE_CACHE_TTL_MINUTES") {
            let minutes: u64 = parse_num("AGRIGATE_CACHE_TTL_MINUTES", &minutes)?;
            config.cache_ttl = Duration::from_secs(minutes * 60);
        }
        if let Some(iterations) = optional("AGRIGATE_MAX_ITERATIONS") {
            config.max_iterations = parse_num("AGRIGATE_MAX_ITERATIONS", &iterations)?;
        }
        if let Some(secs) = optional("AGRIGATE_REQUEST_DEADLINE_SECS") {
            let secs: u64 = parse_num("AGRIGATE_REQUEST_DEADLINE_SECS", &secs)?;
            config.request_deadline = Duration::from_secs(secs);
        }

        config.search_url = optional("AGRIGATE_SEARCH_URL");
        config.search_api_key = optional("AGRIGATE_SEARCH_API_KEY");
        config.translate_url = optional("AGRIGATE_TRANSLATE_URL");
        config.weather_url = optional("AGRIGATE_WEATHER_URL");
        config.generate_url = optional("AGRIGATE_GENERATE_URL");
        config.session_store_url = optional("AGRIGATE_SESSION_STORE_URL");

        if let Some(email) = optional("AGRIGATE_ADMIN_EMAIL") {
            config.admin_email = email;
        }
        if let Some(password) = optional("AGRIGATE_ADMIN_PASSWORD") {
            config.admin_password = password;
        }

        Ok(config)
    }
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    std::env::var(var).map_err(|_| ConfigError::Missing(var))
}

fn optional(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.is_empty())
}

fn parse_num<T: std::str::FromStr>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })
}
