use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

/// Application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Environment (dev, staging, prod)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// CORS allowed origins, comma separated
    pub cors_origins: Option<String>,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Name used as `sub` in service tokens sent to the app service
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// JWT secret key. Authentication is disabled when unset.
    pub auth_jwt_secret: Option<String>,

    /// Base URL of the app service holding sessions and chat history
    pub app_service_url: Option<String>,

    #[serde(default = "default_app_service_timeout_secs")]
    pub app_service_timeout_secs: u64,

    /// Reject joins from users that are not part of the tutoring session
    #[serde(default)]
    pub require_membership: bool,

    #[serde(default = "default_membership_cache_ttl_secs")]
    pub membership_cache_ttl_secs: u64,

    /// Lifetime of a websocket ticket
    #[serde(default = "default_ticket_ttl_secs")]
    pub ticket_ttl_secs: u64,

    /// Interval of the expired ticket sweep
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Events queued per connection before a slow client is disconnected
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables or app.env file
    pub fn load() -> Result<Self, ConfigError> {
        // Try to load from app.env file first
        if std::path::Path::new("app.env").exists() {
            dotenvy::from_filename("app.env").ok();
        } else {
            // Fallback to .env file
            dotenvy::dotenv().ok();
        }

        match envy::from_env::<Config>() {
            Ok(config) => {
                info!("Configuration loaded successfully");
                Ok(config)
            }
            Err(e) => {
                error!("Failed to load configuration: {}", e);
                Err(ConfigError::EnvError(e))
            }
        }
    }

    /// Get the full server address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if running in development mode
    pub fn is_development(&self) -> bool {
        self.environment.to_lowercase() == "dev" || self.environment.to_lowercase() == "development"
    }

    /// Tracing filter used when `RUST_LOG` is unset. Development adds debug
    /// output for the relay and its HTTP layer on top of `log_level`.
    pub fn log_filter(&self) -> String {
        if self.is_development() {
            format!(
                "tutorconnect_live=debug,tower_http=debug,axum::rejection=trace,{}",
                self.log_level
            )
        } else {
            self.log_level.clone()
        }
    }

    pub fn auth_enabled(&self) -> bool {
        self.auth_jwt_secret.as_deref().is_some_and(|s| !s.is_empty())
    }

    /// Parsed list of allowed CORS origins, `None` means any origin
    pub fn allowed_origins(&self) -> Option<Vec<String>> {
        let origins = self.cors_origins.as_deref()?;
        let list: Vec<String> = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();
        if list.is_empty() {
            None
        } else {
            Some(list)
        }
    }

    pub fn ticket_ttl(&self) -> Duration {
        Duration::from_secs(self.ticket_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn membership_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.membership_cache_ttl_secs)
    }

    /// Bounded queue size, never zero
    pub fn outbound_queue_capacity(&self) -> usize {
        self.outbound_queue_capacity.max(1)
    }

    pub fn app_service_timeout(&self) -> Duration {
        Duration::from_secs(self.app_service_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            cors_origins: None,
            log_level: default_log_level(),
            service_name: default_service_name(),
            auth_jwt_secret: None,
            app_service_url: None,
            app_service_timeout_secs: default_app_service_timeout_secs(),
            require_membership: false,
            membership_cache_ttl_secs: default_membership_cache_ttl_secs(),
            ticket_ttl_secs: default_ticket_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            outbound_queue_capacity: default_outbound_queue_capacity(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    EnvError(envy::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::EnvError(e) => write!(f, "Environment variable error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "tutorconnect-live".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_app_service_timeout_secs() -> u64 {
    10
}

fn default_membership_cache_ttl_secs() -> u64 {
    300
}

fn default_ticket_ttl_secs() -> u64 {
    60
}

fn default_sweep_interval_secs() -> u64 {
    30
}

fn default_outbound_queue_capacity() -> usize {
    1024
}
