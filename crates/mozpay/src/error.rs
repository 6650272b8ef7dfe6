use thiserror::Error;

/// Why a decoded notice was refused by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationReason {
    MissingRequest,
    MissingResponse,
    MissingTransactionId,
    Expired,
    NotYetValid,
}

impl ValidationReason {
    /// Stable machine-readable code for logs and metrics labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationReason::MissingRequest => "missing_request",
            ValidationReason::MissingResponse => "missing_response",
            ValidationReason::MissingTransactionId => "missing_transaction_id",
            ValidationReason::Expired => "expired",
            ValidationReason::NotYetValid => "not_yet_valid",
        }
    }
}

impl std::fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by mozpay operations.
#[derive(Debug, Error)]
pub enum PayError {
    #[error("config error: {0}")]
    Config(String),

    #[error("configure() must be called before anything else")]
    NotConfigured,

    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// Bad MAC and disallowed algorithm both land here.
    #[error("invalid signature")]
    Signature,

    #[error("invalid notice: {0}")]
    Validation(ValidationReason),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl PayError {
    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PayError::Config(_) => "config",
            PayError::NotConfigured => "not_configured",
            PayError::MalformedToken(_) => "malformed",
            PayError::Signature => "signature",
            PayError::Validation(reason) => reason.as_str(),
            PayError::Serde(_) => "serde",
        }
    }
}

pub type PayResult<T> = Result<T, PayError>;
