//! Compact JWS with HMAC-SHA2 signatures, on top of `jsonwebtoken`.
//!
//! Only the `HS*` family is accepted. A header naming anything else
//! (including `none`) is refused the same way a bad MAC is. Claim checks
//! (`exp`, `nbf`, `aud`) are left to [`validate`](crate::validate).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// HMAC signing algorithms understood by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    HS256,
    HS384,
    HS512,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::HS256 => "HS256",
            Algorithm::HS384 => "HS384",
            Algorithm::HS512 => "HS512",
        }
    }

    fn to_jwt(self) -> jsonwebtoken::Algorithm {
        match self {
            Algorithm::HS256 => jsonwebtoken::Algorithm::HS256,
            Algorithm::HS384 => jsonwebtoken::Algorithm::HS384,
            Algorithm::HS512 => jsonwebtoken::Algorithm::HS512,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = JwsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HS256" => Ok(Algorithm::HS256),
            "HS384" => Ok(Algorithm::HS384),
            "HS512" => Ok(Algorithm::HS512),
            other => Err(JwsError::AlgorithmNotAllowed(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum JwsError {
    #[error("jwt malformed: {0}")]
    Malformed(String),

    #[error("algorithm not allowed: {0}")]
    AlgorithmNotAllowed(String),

    #[error("invalid signature")]
    BadSignature,

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("token encoding failed: {0}")]
    Encode(#[source] jsonwebtoken::errors::Error),
}

/// Serialize `claims` and sign them with `alg` under `secret`.
pub fn encode<T: Serialize>(alg: Algorithm, secret: &[u8], claims: &T) -> Result<String, JwsError> {
    let claims = serde_json::to_value(claims)?;
    jsonwebtoken::encode(
        &Header::new(alg.to_jwt()),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(JwsError::Encode)
}

// jsonwebtoken cannot parse a header whose `alg` it does not know, so pick
// that case out of a well-formed three-segment token by hand.
fn unknown_algorithm(token: &str) -> Option<String> {
    if token.split('.').count() != 3 {
        return None;
    }
    let segment = token.split('.').next()?;
    let bytes = URL_SAFE_NO_PAD.decode(segment).ok()?;
    let header: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let alg = header.get("alg")?.as_str()?;
    alg.parse::<jsonwebtoken::Algorithm>()
        .is_err()
        .then(|| alg.to_string())
}

/// Check the structure, algorithm and MAC of `token`, then decode its claims.
///
/// The header's `alg` must be one of `allowed`. The MAC covers the raw
/// `header.payload` text and is checked before the payload is decoded, so
/// any change to the payload or signature segments is a [`JwsError::BadSignature`].
pub fn decode<T: DeserializeOwned>(
    token: &str,
    secret: &[u8],
    allowed: &[Algorithm],
) -> Result<T, JwsError> {
    let header = jsonwebtoken::decode_header(token).map_err(|e| match unknown_algorithm(token) {
        Some(alg) => JwsError::AlgorithmNotAllowed(alg),
        None => JwsError::Malformed(format!("bad header: {e}")),
    })?;

    let mut validation = Validation::new(header.alg);
    validation.algorithms = allowed.iter().map(|alg| alg.to_jwt()).collect();
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;

    jsonwebtoken::decode::<T>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidAlgorithm | ErrorKind::MissingAlgorithm => {
                JwsError::AlgorithmNotAllowed(format!("{:?}", header.alg))
            }
            ErrorKind::InvalidSignature => JwsError::BadSignature,
            _ => JwsError::Malformed(e.to_string()),
        })
}
