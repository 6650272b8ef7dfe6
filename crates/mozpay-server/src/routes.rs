use actix_web::http::header;
use actix_web::{get, web, HttpRequest, HttpResponse};
use mozpay::{MozPay, NoticeKind, PayResult};
use serde::Deserialize;

use crate::metrics;
use crate::security;

/// The provider posts the signed notice in this field.
const NOTICE_FIELD: &str = "notice";

#[derive(Deserialize)]
struct NoticeBody {
    notice: Option<String>,
}

/// Postback and chargeback endpoints bound under the configured prefix.
///
/// Binding reads the route prefix once, so a bad prefix fails at startup
/// rather than on the first request.
#[derive(Clone)]
pub struct WebhookRoutes {
    pay: web::Data<MozPay>,
    postback_path: String,
    chargeback_path: String,
}

impl WebhookRoutes {
    pub fn bind(pay: web::Data<MozPay>) -> PayResult<Self> {
        let config = pay.config()?;
        let prefix = config.normalized_prefix()?;
        let postback_path = format!("{prefix}/{}", NoticeKind::Postback);
        let chargeback_path = format!("{prefix}/{}", NoticeKind::Chargeback);
        Ok(Self {
            pay,
            postback_path,
            chargeback_path,
        })
    }

    pub fn postback_path(&self) -> &str {
        &self.postback_path
    }

    pub fn chargeback_path(&self) -> &str {
        &self.chargeback_path
    }

    pub fn path(&self, kind: NoticeKind) -> &str {
        match kind {
            NoticeKind::Postback => &self.postback_path,
            NoticeKind::Chargeback => &self.chargeback_path,
        }
    }

    /// Install both POST handlers on an actix app.
    pub fn register(&self, cfg: &mut web::ServiceConfig) {
        cfg.service(
            web::resource(self.postback_path.as_str())
                .app_data(self.pay.clone())
                .route(web::post().to(postback)),
        )
        .service(
            web::resource(self.chargeback_path.as_str())
                .app_data(self.pay.clone())
                .route(web::post().to(chargeback)),
        );
        tracing::info!(
            postback = %self.postback_path,
            chargeback = %self.chargeback_path,
            "notice routes registered"
        );
    }
}

/// Pull the `notice` field out of a JSON or form-encoded body.
fn extract_notice(req: &HttpRequest, body: &[u8]) -> Option<String> {
    let is_json = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/json"))
        .unwrap_or(false);

    let notice = if is_json {
        serde_json::from_slice::<NoticeBody>(body).ok()?.notice
    } else {
        url::form_urlencoded::parse(body)
            .find(|(key, _)| key == NOTICE_FIELD)
            .map(|(_, value)| value.into_owned())
    };
    notice.filter(|n| !n.is_empty())
}

fn reject(kind: NoticeKind, reason: &'static str) -> HttpResponse {
    metrics::NOTICES
        .with_label_values(&[kind.as_str(), reason])
        .inc();
    HttpResponse::BadRequest().finish()
}

async fn handle_notice(
    kind: NoticeKind,
    req: HttpRequest,
    body: web::Bytes,
    pay: web::Data<MozPay>,
) -> HttpResponse {
    let Some(token) = extract_notice(&req, &body) else {
        tracing::warn!(kind = %kind, "notice field missing");
        return reject(kind, "missing_notice");
    };

    let notice = match pay.process(&token) {
        Ok(notice) => notice,
        Err(e) => {
            // Logged here only; the client gets a bare 400.
            tracing::warn!(kind = %kind, reason = e.kind(), error = %e, "notice rejected");
            return reject(kind, e.kind());
        }
    };

    let transaction_id = notice.transaction_id().unwrap_or_default().to_string();
    metrics::NOTICES
        .with_label_values(&[kind.as_str(), "accepted"])
        .inc();
    tracing::info!(kind = %kind, transaction_id = %transaction_id, "notice accepted");

    // Subscribers run after the response is built and cannot change it.
    actix_web::rt::spawn(async move {
        let failures = pay.emit(kind, &notice);
        if !failures.is_empty() {
            metrics::DISPATCH_FAILURES
                .with_label_values(&[kind.as_str()])
                .inc_by(failures.len() as u64);
        }
    });

    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(transaction_id)
}

pub async fn postback(
    req: HttpRequest,
    body: web::Bytes,
    pay: web::Data<MozPay>,
) -> HttpResponse {
    handle_notice(NoticeKind::Postback, req, body, pay).await
}

pub async fn chargeback(
    req: HttpRequest,
    body: web::Bytes,
    pay: web::Data<MozPay>,
) -> HttpResponse {
    handle_notice(NoticeKind::Chargeback, req, body, pay).await
}

#[get("/health")]
pub async fn health(pay: web::Data<MozPay>) -> HttpResponse {
    match pay.config() {
        Ok(config) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "service": "mozpay-server",
            "configured": true,
            "keyId": config.key_id,
        })),
        Err(_) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "degraded",
            "service": "mozpay-server",
            "configured": false,
        })),
    }
}

/// Who may read `/metrics`.
#[derive(Clone, Default)]
pub struct MetricsAccess {
    pub token: Option<Vec<u8>>,
    pub public: bool,
}

#[get("/metrics")]
pub async fn metrics_endpoint(req: HttpRequest, access: web::Data<MetricsAccess>) -> HttpResponse {
    match &access.token {
        Some(expected) => {
            let presented = security::bearer_token(
                req.headers()
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok()),
            );
            let authorized = presented
                .map(|t| security::constant_time_eq(t.as_bytes(), expected))
                .unwrap_or(false);
            if !authorized {
                return HttpResponse::Unauthorized().json(serde_json::json!({
                    "error": "unauthorized",
                    "message": "Valid Bearer token required for /metrics"
                }));
            }
        }
        None if !access.public => {
            return HttpResponse::Forbidden().json(serde_json::json!({
                "error": "forbidden",
                "message": "Set METRICS_TOKEN or MOZPAY_PUBLIC_METRICS=true to access /metrics"
            }));
        }
        None => {}
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(metrics::metrics_output())
}
