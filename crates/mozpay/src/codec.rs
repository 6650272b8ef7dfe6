//! The configured signing/verification handle.

use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::claims::{Notice, NoticeKind, OutboundClaims, PayRequest};
use crate::config::{Config, ConfigOptions};
use crate::dispatch::{DispatchFailure, Dispatcher, SubscriberError};
use crate::error::{PayError, PayResult};
use crate::jws::{self, JwsError};
use crate::validate;

/// Lifetime of tokens produced by [`MozPay::sign`].
pub const REQUEST_TTL_SECS: u64 = 3600;

/// Current time in whole seconds since the Unix epoch.
///
/// This is the clock behind `iat`/`exp`/`nbf` everywhere in the crate.
pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Holds the active configuration snapshot and the notice subscribers.
///
/// A fresh instance is unconfigured; every signing or verifying call fails
/// with [`PayError::NotConfigured`] until [`configure`](Self::configure) runs.
#[derive(Default)]
pub struct MozPay {
    config: RwLock<Option<Arc<Config>>>,
    dispatcher: Dispatcher,
}

impl MozPay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for `new()` followed by `configure(options)`.
    pub fn with_options(options: ConfigOptions) -> PayResult<Self> {
        let pay = Self::new();
        pay.configure(options)?;
        Ok(pay)
    }

    /// Validate `options` and swap them in as the whole configuration.
    ///
    /// On error the previous configuration stays in place.
    pub fn configure(&self, options: ConfigOptions) -> PayResult<()> {
        let config = Arc::new(Config::from_options(options)?);
        tracing::info!(
            key_id = %config.key_id,
            audience = %config.audience,
            algorithms = ?config.allowed_algorithms,
            "mozpay configured"
        );
        *self.slot_mut() = Some(config);
        Ok(())
    }

    /// Forget the configuration.
    pub fn reset_config(&self) {
        *self.slot_mut() = None;
    }

    /// The configuration snapshot currently in force.
    pub fn config(&self) -> PayResult<Arc<Config>> {
        let slot = match self.config.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.clone().ok_or(PayError::NotConfigured)
    }

    fn slot_mut(&self) -> std::sync::RwLockWriteGuard<'_, Option<Arc<Config>>> {
        match self.config.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Wrap `request` in an [`OutboundClaims`] set and sign it.
    pub fn sign(&self, request: &PayRequest) -> PayResult<String> {
        let config = self.config()?;
        let issued_at = now();
        let claims = OutboundClaims {
            iss: config.key_id.clone(),
            aud: config.audience.clone(),
            typ: config.token_type.clone(),
            iat: issued_at,
            exp: issued_at + REQUEST_TTL_SECS,
            request: request.clone(),
        };
        let alg = config.signing_algorithm();
        let token = jws::encode(alg, config.secret.as_bytes(), &claims).map_err(|e| match e {
            JwsError::Serde(e) => PayError::Serde(e),
            other => PayError::MalformedToken(other.to_string()),
        })?;
        tracing::debug!(
            product = request.id.as_deref().unwrap_or(""),
            alg = %alg,
            "signed pay request"
        );
        Ok(token)
    }

    /// Check a token's structure, algorithm and signature and decode it.
    ///
    /// No schema or time checks happen here; see [`validate`](Self::validate).
    pub fn verify(&self, token: &str) -> PayResult<Notice> {
        let config = self.config()?;
        jws::decode(token, config.secret.as_bytes(), &config.allowed_algorithms).map_err(
            |e| match e {
                JwsError::Malformed(why) => PayError::MalformedToken(why),
                JwsError::Serde(e) => PayError::MalformedToken(e.to_string()),
                JwsError::Encode(e) => PayError::MalformedToken(e.to_string()),
                JwsError::AlgorithmNotAllowed(alg) => {
                    tracing::debug!(alg = %alg, "token algorithm outside allow-list");
                    PayError::Signature
                }
                JwsError::BadSignature => PayError::Signature,
            },
        )
    }

    /// Schema and time-window checks against [`now`].
    pub fn validate(&self, notice: Notice) -> PayResult<Notice> {
        validate::validate(notice, now())
    }

    /// `verify` followed by `validate`.
    pub fn process(&self, token: &str) -> PayResult<Notice> {
        let notice = self.verify(token)?;
        self.validate(notice)
    }

    pub fn on<F>(&self, kind: NoticeKind, callback: F)
    where
        F: Fn(&Notice) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.dispatcher.on(kind, callback);
    }

    pub fn on_error<F>(&self, hook: F)
    where
        F: Fn(&DispatchFailure) + Send + Sync + 'static,
    {
        self.dispatcher.on_error(hook);
    }

    pub fn emit(&self, kind: NoticeKind, notice: &Notice) -> Vec<DispatchFailure> {
        self.dispatcher.emit(kind, notice)
    }

    pub fn remove_all_listeners(&self) {
        self.dispatcher.remove_all_listeners();
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}
