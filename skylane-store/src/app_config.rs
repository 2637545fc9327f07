use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub paypal: PayPalSettings,
    pub frontend: FrontendConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

/// Provider credentials handed to the PayPal client at construction
/// time; nothing reads these from process-wide state.
#[derive(Debug, Deserialize, Clone)]
pub struct PayPalSettings {
    /// "sandbox" or "live"
    pub mode: String,
    pub client_id: String,
    pub client_secret: String,
    /// Webhook id registered with the provider; webhook signature
    /// verification is skipped when unset.
    pub webhook_id: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct FrontendConfig {
    /// Base URL for payment redirect targets.
    pub url: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Then the environment-specific file, if present
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Then a local file that stays out of version control
            .add_source(config::File::with_name("config/local").required(false))
            // Finally the environment, e.g. SKYLANE__SERVER__PORT=9000
            .add_source(config::Environment::with_prefix("SKYLANE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
