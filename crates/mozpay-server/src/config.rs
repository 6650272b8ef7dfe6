//! Environment-driven settings for the standalone server and CLI.

use mozpay::{Algorithm, ConfigOptions};

const DEFAULT_PORT: u16 = 4030;
const DEFAULT_RATE_LIMIT_RPM: u64 = 120;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingRequired(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone)]
pub struct ServerConfig {
    /// Signing options passed to `MozPay::configure`.
    pub options: ConfigOptions,
    pub port: u16,
    pub rate_limit_rpm: u64,
    pub allowed_origins: Vec<String>,
    /// Bearer token for `/metrics` (None = forbidden unless `public_metrics`).
    pub metrics_token: Option<Vec<u8>>,
    pub public_metrics: bool,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("options", &self.options)
            .field("port", &self.port)
            .field("rate_limit_rpm", &self.rate_limit_rpm)
            .field("allowed_origins", &self.allowed_origins)
            .field(
                "metrics_token",
                &self.metrics_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("public_metrics", &self.public_metrics)
            .finish()
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn flag(raw: Option<String>) -> bool {
    raw.map(|v| v == "true" || v == "1").unwrap_or(false)
}

/// Read signing options from `MOZPAY_*` variables via `lookup`.
pub fn options_from(
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<ConfigOptions, ConfigError> {
    let key_id = lookup("MOZPAY_KEY").ok_or(ConfigError::MissingRequired("MOZPAY_KEY"))?;
    let secret = lookup("MOZPAY_SECRET").ok_or(ConfigError::MissingRequired("MOZPAY_SECRET"))?;
    let mut options = ConfigOptions::new(key_id, secret);

    if let Some(audience) = lookup("MOZPAY_AUDIENCE") {
        options = options.audience(audience);
    }
    if let Some(token_type) = lookup("MOZPAY_TYPE") {
        options = options.token_type(token_type);
    }
    if let Some(prefix) = lookup("MOZPAY_ROUTE_PREFIX") {
        options = options.route_prefix(Some(&prefix));
    }
    if let Some(raw) = lookup("MOZPAY_ALGORITHMS") {
        let algorithms = split_list(&raw)
            .iter()
            .map(|name| name.parse::<Algorithm>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ConfigError::Invalid {
                name: "MOZPAY_ALGORITHMS",
                value: raw.clone(),
            })?;
        options = options.allowed_algorithms(algorithms);
    }
    Ok(options)
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let options = options_from(&lookup)?;

        let port = match lookup("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value: raw,
            })?,
            None => DEFAULT_PORT,
        };

        // The governor refuses a zero quota.
        let rate_limit_rpm = match lookup("RATE_LIMIT_RPM") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(rpm) if rpm > 0 => rpm,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "RATE_LIMIT_RPM",
                        value: raw,
                    })
                }
            },
            None => DEFAULT_RATE_LIMIT_RPM,
        };

        let allowed_origins = lookup("ALLOWED_ORIGINS")
            .map(|raw| split_list(&raw))
            .unwrap_or_default();

        let metrics_token = lookup("METRICS_TOKEN").map(String::into_bytes);
        let public_metrics = flag(lookup("MOZPAY_PUBLIC_METRICS"));
        if metrics_token.is_none() && !public_metrics {
            tracing::warn!("METRICS_TOKEN not set; /metrics will answer 403");
        }

        Ok(Self {
            options,
            port,
            rate_limit_rpm,
            allowed_origins,
            metrics_token,
            public_metrics,
        })
    }
}
