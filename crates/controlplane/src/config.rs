//! Layered configuration: compiled-in defaults, optional YAML file, then
//! environment variables, resolved through `figment`'s provider stack.

use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

fn default_port() -> u16 {
    8081
}

fn default_core_service_url() -> String {
    "http://localhost:8080".to_owned()
}

fn default_environment() -> Environment {
    Environment::Development
}

fn default_core_timeout_seconds() -> u64 {
    10
}

fn default_shutdown_grace_seconds() -> u64 {
    5
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct TracingConfig {
    /// Empty means tracing export is disabled.
    pub endpoint: String,
    pub sample_rate: f64,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            sample_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct CoreProxyConfig {
    pub service_url: String,
    pub timeout_seconds: u64,
}

impl Default for CoreProxyConfig {
    fn default() -> Self {
        Self {
            service_url: default_core_service_url(),
            timeout_seconds: default_core_timeout_seconds(),
        }
    }
}

/// The control plane's full configuration.
///
/// `jwt_secret` has no default: loading fails closed when `environment` is
/// `production` and no secret was supplied, so the process refuses to start
/// rather than run unauthenticated-by-accident.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct AppConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub jwt_secret: String,
    /// Empty means audit logging is disabled.
    #[serde(default)]
    pub audit_log_path: String,
    #[serde(default = "default_environment")]
    pub environment: Environment,
    #[serde(default)]
    pub core_proxy: CoreProxyConfig,
    #[serde(default)]
    pub tracing: TracingConfig,
    #[serde(default = "default_shutdown_grace_seconds")]
    pub shutdown_grace_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            jwt_secret: String::new(),
            audit_log_path: String::new(),
            environment: default_environment(),
            core_proxy: CoreProxyConfig::default(),
            tracing: TracingConfig::default(),
            shutdown_grace_seconds: default_shutdown_grace_seconds(),
        }
    }
}

impl AppConfig {
    #[must_use]
    pub fn core_proxy_timeout(&self) -> Duration {
        Duration::from_secs(self.core_proxy.timeout_seconds)
    }

    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }

    #[must_use]
    pub fn audit_enabled(&self) -> bool {
        !self.audit_log_path.is_empty()
    }

    #[must_use]
    pub fn tracing_enabled(&self) -> bool {
        !self.tracing.endpoint.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(String),
    #[error("JWT_SECRET is required when ENVIRONMENT=production")]
    MissingProductionSecret,
}

/// Loads `AppConfig` from defaults, an optional YAML file, then environment
/// variables (`PORT`, `JWT_SECRET`, `AUDIT_LOG_PATH`, `CORE_SERVICE_URL`,
/// `ENVIRONMENT`, `TRACING_ENDPOINT`, `TRACING_SAMPLE_RATE`), in that
/// priority order.
///
/// # Errors
/// Returns [`ConfigError::Load`] if the layered sources cannot be merged, or
/// [`ConfigError::MissingProductionSecret`] if running in production without
/// a configured secret.
pub fn load(yaml_path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));
    if let Some(path) = yaml_path {
        figment = figment.merge(Yaml::file(path));
    }
    figment = figment
        .merge(Env::raw().only(&["PORT"]).map(|_| "port".into()))
        .merge(Env::raw().only(&["JWT_SECRET"]).map(|_| "jwt_secret".into()))
        .merge(Env::raw().only(&["AUDIT_LOG_PATH"]).map(|_| "audit_log_path".into()))
        .merge(Env::raw().only(&["ENVIRONMENT"]).map(|_| "environment".into()))
        .merge(Env::raw().only(&["TRACING_ENDPOINT"]).map(|_| "tracing.endpoint".into()))
        .merge(Env::raw().only(&["TRACING_SAMPLE_RATE"]).map(|_| "tracing.sample_rate".into()))
        .merge(Env::raw().only(&["CORE_SERVICE_URL"]).map(|_| "core_proxy.service_url".into()));

    let config: AppConfig = figment.extract().map_err(|e| ConfigError::Load(e.to_string()))?;

    if config.environment == Environment::Production && config.jwt_secret.is_empty() {
        return Err(ConfigError::MissingProductionSecret);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.port, 8081);
        assert_eq!(config.core_proxy.service_url, "http://localhost:8080");
        assert!(!config.audit_enabled());
        assert!(!config.tracing_enabled());
    }

    #[test]
    fn production_without_secret_fails_closed() {
        temp_env::with_vars(
            [("ENVIRONMENT", Some("production")), ("JWT_SECRET", None)],
            || {
                let err = load(None).unwrap_err();
                assert!(matches!(err, ConfigError::MissingProductionSecret));
            },
        );
    }

    #[test]
    fn production_with_secret_loads_successfully() {
        temp_env::with_vars(
            [
                ("ENVIRONMENT", Some("production")),
                ("JWT_SECRET", Some("a-real-secret")),
            ],
            || {
                let config = load(None).unwrap();
                assert_eq!(config.jwt_secret, "a-real-secret");
            },
        );
    }

    #[test]
    fn port_env_var_overrides_default() {
        temp_env::with_var("PORT", Some("9000"), || {
            let config = load(None).unwrap();
            assert_eq!(config.port, 9000);
        });
    }
}
