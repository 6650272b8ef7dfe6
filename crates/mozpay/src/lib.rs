//! Signed pay requests and provider notices for in-app payments.
//!
//! An application signs a [`PayRequest`] into a token the client hands to the
//! payment provider. The provider later POSTs a signed notice back (a
//! postback on success, a chargeback on reversal); this crate verifies the
//! signature, checks the notice shape and time window, and hands the result
//! to subscribers registered per [`NoticeKind`].
//!
//! # Modules
//!
//! - [`config`]: required keys, defaults, route prefix rules
//! - [`jws`]: HS256/384/512 tokens via `jsonwebtoken` with an algorithm allow-list
//! - [`claims`]: [`PayRequest`], [`OutboundClaims`], [`Notice`]
//! - [`codec`]: [`MozPay`], the configured sign/verify handle
//! - [`validate`]: schema and `exp`/`nbf` checks
//! - [`dispatch`]: subscriber registry
//!
//! # Example
//!
//! ```
//! use mozpay::{ConfigOptions, MozPay, NoticeKind, PayRequest};
//!
//! let pay = MozPay::with_options(ConfigOptions::new("my-app", "a long shared secret")).unwrap();
//! pay.on(NoticeKind::Postback, |notice| {
//!     println!("paid: {:?}", notice.transaction_id());
//!     Ok(())
//! });
//!
//! let request: PayRequest = serde_json::from_str(r#"{
//!     "pricePoint": 1,
//!     "id": "level-10",
//!     "name": "Unlock Level 10",
//!     "description": "Lets you play Level 10",
//!     "postbackURL": "https://example.com/mozpay/postback",
//!     "chargebackURL": "https://example.com/mozpay/chargeback"
//! }"#).unwrap();
//! let token = pay.sign(&request).unwrap();
//! assert_eq!(pay.verify(&token).unwrap().request, Some(request));
//! ```

pub mod claims;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod jws;
pub mod validate;

pub use claims::{LocalizedText, Notice, NoticeKind, NoticeResponse, OutboundClaims, PayRequest, Price, Simulate};
pub use codec::{now, MozPay, REQUEST_TTL_SECS};
pub use config::{Config, ConfigOptions};
pub use dispatch::{DispatchFailure, Dispatcher, SubscriberError};
pub use error::{PayError, PayResult, ValidationReason};
pub use jws::Algorithm;
