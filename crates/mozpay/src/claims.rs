//! Wire types carried inside signed tokens.
//!
//! Unknown fields are ignored on decode. Optional fields are omitted on
//! encode, so a value survives a sign/verify cycle unchanged.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// What is being purchased. Opaque to this crate: every field is optional,
/// and one of the wrong shape reads as absent, so the echoed copy in a
/// [`Notice`] never decides whether the notice is accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayRequest {
    #[serde(default, deserialize_with = "shaped", skip_serializing_if = "Option::is_none")]
    pub price_point: Option<u32>,
    #[serde(default, deserialize_with = "shaped", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "shaped", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "shaped", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "shaped", skip_serializing_if = "Option::is_none")]
    pub product_data: Option<String>,
    #[serde(
        rename = "postbackURL",
        default,
        deserialize_with = "shaped",
        skip_serializing_if = "Option::is_none"
    )]
    pub postback_url: Option<String>,
    #[serde(
        rename = "chargebackURL",
        default,
        deserialize_with = "shaped",
        skip_serializing_if = "Option::is_none"
    )]
    pub chargeback_url: Option<String>,
    #[serde(default, deserialize_with = "shaped", skip_serializing_if = "Option::is_none")]
    pub default_locale: Option<String>,
    #[serde(default, deserialize_with = "shaped", skip_serializing_if = "Option::is_none")]
    pub locales: Option<BTreeMap<String, LocalizedText>>,
    /// Icon URLs keyed by pixel size, e.g. `"64"`.
    #[serde(default, deserialize_with = "shaped", skip_serializing_if = "Option::is_none")]
    pub icons: Option<BTreeMap<String, String>>,
    #[serde(default, deserialize_with = "shaped", skip_serializing_if = "Option::is_none")]
    pub simulate: Option<Simulate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedText {
    pub name: String,
    pub description: String,
}

/// Asks the provider to skip the real purchase and send back a canned notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Simulate {
    pub result: NoticeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Claim set signed by [`MozPay::sign`](crate::MozPay::sign).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundClaims {
    pub iss: String,
    pub aud: String,
    pub typ: String,
    pub iat: u64,
    pub exp: u64,
    pub request: PayRequest,
}

/// The two notification channels a provider calls back on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Postback,
    Chargeback,
}

impl NoticeKind {
    pub const ALL: [NoticeKind; 2] = [NoticeKind::Postback, NoticeKind::Chargeback];

    pub fn as_str(&self) -> &'static str {
        match self {
            NoticeKind::Postback => "postback",
            NoticeKind::Chargeback => "chargeback",
        }
    }
}

impl std::fmt::Display for NoticeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Amount actually charged, as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub amount: String,
    pub currency: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoticeResponse {
    #[serde(
        rename = "transactionID",
        default,
        deserialize_with = "shaped",
        skip_serializing_if = "Option::is_none"
    )]
    pub transaction_id: Option<String>,
    #[serde(default, deserialize_with = "shaped", skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    /// Set on chargebacks, e.g. `"refund"` or `"reversal"`.
    #[serde(default, deserialize_with = "shaped", skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// A decoded inbound claim set. Nothing about it has been checked beyond
/// its signature; see [`validate`](crate::validate::validate).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    #[serde(default, deserialize_with = "seconds", skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    #[serde(default, deserialize_with = "seconds", skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
    #[serde(default, deserialize_with = "seconds", skip_serializing_if = "Option::is_none")]
    pub nbf: Option<u64>,
    #[serde(
        default,
        deserialize_with = "object",
        skip_serializing_if = "Option::is_none"
    )]
    pub request: Option<PayRequest>,
    #[serde(
        default,
        deserialize_with = "object",
        skip_serializing_if = "Option::is_none"
    )]
    pub response: Option<NoticeResponse>,
}

impl Notice {
    /// The provider's transaction id, if the notice carries one.
    pub fn transaction_id(&self) -> Option<&str> {
        self.response
            .as_ref()
            .and_then(|r| r.transaction_id.as_deref())
    }
}

// A field that is present but of the wrong shape reads as absent.
fn shaped<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

// Only a JSON object counts as present.
fn object<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .filter(serde_json::Value::is_object)
        .and_then(|v| serde_json::from_value(v).ok()))
}

// NumericDate: fractional seconds are floored, negatives clamp to zero and
// anything that is not a number reads as absent.
fn seconds<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().map(|f| if f > 0.0 { f.floor() as u64 } else { 0 })),
        _ => None,
    }))
}
