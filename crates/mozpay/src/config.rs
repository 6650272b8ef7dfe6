//! Signing configuration and its defaults.

use serde::Deserialize;

use crate::error::{PayError, PayResult};
use crate::jws::Algorithm;

pub const DEFAULT_AUDIENCE: &str = "marketplace.firefox.com";
pub const DEFAULT_TOKEN_TYPE: &str = "mozilla-dev/payments/pay/v1";
pub const DEFAULT_ROUTE_PREFIX: &str = "/mozpay";
pub const DEFAULT_ALGORITHM: Algorithm = Algorithm::HS256;

/// Secrets shorter than this still work but get a warning.
const RECOMMENDED_SECRET_LEN: usize = 32;

fn default_route_prefix() -> Option<String> {
    Some(DEFAULT_ROUTE_PREFIX.to_string())
}

/// Caller-supplied options for [`MozPay::configure`](crate::MozPay::configure).
///
/// Everything except `key_id` and `secret` falls back to a default. The route
/// prefix is the odd one out: an absent field gets `/mozpay`, an explicit
/// `null` is kept as "no prefix" and refused when routes are bound.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOptions {
    #[serde(default, alias = "mozPayKey")]
    pub key_id: Option<String>,
    #[serde(default, alias = "mozPaySecret")]
    pub secret: Option<String>,
    #[serde(default, alias = "mozPayAudience")]
    pub audience: Option<String>,
    #[serde(default, alias = "mozPayType")]
    pub token_type: Option<String>,
    #[serde(default = "default_route_prefix", alias = "mozPayRoutePrefix")]
    pub route_prefix: Option<String>,
    #[serde(default, alias = "supportedAlgorithms")]
    pub allowed_algorithms: Option<Vec<Algorithm>>,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            key_id: None,
            secret: None,
            audience: None,
            token_type: None,
            route_prefix: default_route_prefix(),
            allowed_algorithms: None,
        }
    }
}

impl ConfigOptions {
    /// Options with the two required fields set and everything else defaulted.
    pub fn new(key_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key_id: Some(key_id.into()),
            secret: Some(secret.into()),
            ..Self::default()
        }
    }

    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = Some(token_type.into());
        self
    }

    /// `None` clears the prefix; binding routes will then fail.
    pub fn route_prefix(mut self, prefix: Option<&str>) -> Self {
        self.route_prefix = prefix.map(String::from);
        self
    }

    pub fn allowed_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.allowed_algorithms = Some(algorithms);
        self
    }
}

impl std::fmt::Debug for ConfigOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigOptions")
            .field("key_id", &self.key_id)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("audience", &self.audience)
            .field("token_type", &self.token_type)
            .field("route_prefix", &self.route_prefix)
            .field("allowed_algorithms", &self.allowed_algorithms)
            .finish()
    }
}

/// A fully validated configuration snapshot. Never mutated after construction.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub key_id: String,
    pub secret: String,
    pub audience: String,
    pub token_type: String,
    pub route_prefix: Option<String>,
    pub allowed_algorithms: Vec<Algorithm>,
}

impl Config {
    pub fn from_options(options: ConfigOptions) -> PayResult<Self> {
        let key_id = options
            .key_id
            .filter(|k| !k.is_empty())
            .ok_or_else(|| PayError::Config("keyId is required".to_string()))?;
        let secret = options
            .secret
            .filter(|s| !s.is_empty())
            .ok_or_else(|| PayError::Config("secret is required".to_string()))?;

        let allowed_algorithms = options
            .allowed_algorithms
            .unwrap_or_else(|| vec![DEFAULT_ALGORITHM]);
        if allowed_algorithms.is_empty() {
            return Err(PayError::Config(
                "allowedAlgorithms must name at least one algorithm".to_string(),
            ));
        }

        if secret.len() < RECOMMENDED_SECRET_LEN {
            tracing::warn!(
                key_id = %key_id,
                len = secret.len(),
                "signing secret is shorter than {RECOMMENDED_SECRET_LEN} bytes"
            );
        }

        Ok(Self {
            key_id,
            secret,
            audience: options
                .audience
                .unwrap_or_else(|| DEFAULT_AUDIENCE.to_string()),
            token_type: options
                .token_type
                .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string()),
            route_prefix: options.route_prefix,
            allowed_algorithms,
        })
    }

    /// Algorithm used for outbound tokens: the first allowed one.
    pub fn signing_algorithm(&self) -> Algorithm {
        self.allowed_algorithms[0]
    }

    /// The route prefix with any trailing `/` removed.
    pub fn normalized_prefix(&self) -> PayResult<&str> {
        match self.route_prefix.as_deref() {
            None | Some("") => Err(PayError::Config(
                "route prefix must be a non-empty path".to_string(),
            )),
            Some(prefix) => Ok(prefix.strip_suffix('/').unwrap_or(prefix)),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("key_id", &self.key_id)
            .field("secret", &"[REDACTED]")
            .field("audience", &self.audience)
            .field("token_type", &self.token_type)
            .field("route_prefix", &self.route_prefix)
            .field("allowed_algorithms", &self.allowed_algorithms)
            .finish()
    }
}
