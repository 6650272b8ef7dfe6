use std::time::Duration;

use actix_web::{test, web, App};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use mozpay::jws::{self, Algorithm};
use mozpay::{now, ConfigOptions, MozPay, Notice, NoticeKind, PayError};
use mozpay_server::routes::{self, MetricsAccess, WebhookRoutes};

const KEY: &str = "my-app";
const SECRET: &str = "THE SECRET";

fn make_pay(options: ConfigOptions) -> web::Data<MozPay> {
    web::Data::new(MozPay::with_options(options).unwrap())
}

fn default_pay() -> web::Data<MozPay> {
    make_pay(ConfigOptions::new(KEY, SECRET))
}

/// An incoming notice with valid timestamps and a transaction id.
fn notice_claims() -> Value {
    json!({
        "iss": "marketplace.firefox.com",
        "aud": KEY,
        "iat": now(),
        "exp": now() + 3600,
        "request": {
            "pricePoint": 1,
            "id": "my-product:1",
            "name": "Unlock Level 10",
            "description": "Lets you play Level 10! So fun!",
            "productData": "",
            "postbackURL": "https://.../postback",
            "chargebackURL": "https://.../chargeback"
        },
        "response": {"transactionID": "webpay-123"}
    })
}

fn sign(claims: &Value, secret: &str) -> String {
    jws::encode(Algorithm::HS256, secret.as_bytes(), claims).unwrap()
}

/// Subscribe to `kind` and forward every notice into a channel.
fn subscribe(pay: &MozPay, kind: NoticeKind) -> mpsc::UnboundedReceiver<Notice> {
    let (tx, rx) = mpsc::unbounded_channel();
    pay.on(kind, move |notice| {
        tx.send(notice.clone())?;
        Ok(())
    });
    rx
}

async fn next_dispatch(rx: &mut mpsc::UnboundedReceiver<Notice>) -> Notice {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("no dispatch within 2s")
        .expect("channel closed")
}

async fn assert_no_dispatch(rx: &mut mpsc::UnboundedReceiver<Notice>) {
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err(), "unexpected dispatch");
}

// -- Route binding --

#[::core::prelude::v1::test]
fn test_bind_default_paths() {
    let routes = WebhookRoutes::bind(default_pay()).unwrap();
    assert_eq!(routes.postback_path(), "/mozpay/postback");
    assert_eq!(routes.chargeback_path(), "/mozpay/chargeback");
    assert_eq!(routes.path(NoticeKind::Chargeback), "/mozpay/chargeback");
}

#[::core::prelude::v1::test]
fn test_bind_custom_prefix() {
    let pay = make_pay(ConfigOptions::new(KEY, SECRET).route_prefix(Some("/foo")));
    let routes = WebhookRoutes::bind(pay).unwrap();
    assert_eq!(routes.postback_path(), "/foo/postback");
}

#[::core::prelude::v1::test]
fn test_bind_cleans_trailing_slash() {
    let pay = make_pay(ConfigOptions::new(KEY, SECRET).route_prefix(Some("/foo/")));
    let routes = WebhookRoutes::bind(pay).unwrap();
    assert_eq!(routes.postback_path(), "/foo/postback");
    assert_eq!(routes.chargeback_path(), "/foo/chargeback");
}

#[::core::prelude::v1::test]
fn test_bind_rejects_null_prefix() {
    let pay = make_pay(ConfigOptions::new(KEY, SECRET).route_prefix(None));
    assert!(matches!(
        WebhookRoutes::bind(pay),
        Err(PayError::Config(_))
    ));
}

#[::core::prelude::v1::test]
fn test_bind_requires_configuration() {
    let pay = default_pay();
    pay.reset_config();
    assert!(matches!(
        WebhookRoutes::bind(pay),
        Err(PayError::NotConfigured)
    ));
}

// -- Notice handling --

#[actix_rt::test]
async fn test_missing_notice_field() {
    let pay = default_pay();
    let routes = WebhookRoutes::bind(pay.clone()).unwrap();
    let app = test::init_service(App::new().configure(|cfg| routes.register(cfg))).await;

    let req = test::TestRequest::post()
        .uri("/mozpay/postback")
        .set_form(json!({}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    assert!(test::read_body(resp).await.is_empty());
}

#[actix_rt::test]
async fn test_garbage_notice() {
    let pay = default_pay();
    let routes = WebhookRoutes::bind(pay.clone()).unwrap();
    let app = test::init_service(App::new().configure(|cfg| routes.register(cfg))).await;

    let req = test::TestRequest::post()
        .uri("/mozpay/postback")
        .set_form(json!({"notice": "<garbage>"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    assert!(test::read_body(resp).await.is_empty());
}

#[actix_rt::test]
async fn test_wrong_secret_is_rejected_without_dispatch() {
    let pay = default_pay();
    let mut rx = subscribe(&pay, NoticeKind::Postback);
    let routes = WebhookRoutes::bind(pay.clone()).unwrap();
    let app = test::init_service(App::new().configure(|cfg| routes.register(cfg))).await;

    let req = test::TestRequest::post()
        .uri("/mozpay/postback")
        .set_form(json!({"notice": sign(&notice_claims(), "wrong secret")}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    assert!(test::read_body(resp).await.is_empty());
    assert_no_dispatch(&mut rx).await;
}

#[actix_rt::test]
async fn test_schema_failures_are_bare_400s() {
    let pay = default_pay();
    let routes = WebhookRoutes::bind(pay.clone()).unwrap();
    let app = test::init_service(App::new().configure(|cfg| routes.register(cfg))).await;

    let mut no_response = notice_claims();
    no_response.as_object_mut().unwrap().remove("response");
    let mut no_request = notice_claims();
    no_request.as_object_mut().unwrap().remove("request");
    let mut no_transaction = notice_claims();
    no_transaction["response"] = json!({});
    let mut not_yet = notice_claims();
    not_yet["nbf"] = json!(now() + 360);

    for claims in [no_response, no_request, no_transaction, not_yet] {
        let req = test::TestRequest::post()
            .uri("/mozpay/postback")
            .set_form(json!({"notice": sign(&claims, SECRET)}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        assert!(test::read_body(resp).await.is_empty());
    }
}

#[actix_rt::test]
async fn test_expired_notice_rejected() {
    let pay = default_pay();
    let mut rx = subscribe(&pay, NoticeKind::Postback);
    let routes = WebhookRoutes::bind(pay.clone()).unwrap();
    let app = test::init_service(App::new().configure(|cfg| routes.register(cfg))).await;

    let mut claims = notice_claims();
    claims["exp"] = json!(now() - 80);
    let req = test::TestRequest::post()
        .uri("/mozpay/postback")
        .set_form(json!({"notice": sign(&claims, SECRET)}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    assert_no_dispatch(&mut rx).await;
}

#[actix_rt::test]
async fn test_postback_responds_with_transaction_id_and_dispatches() {
    let pay = default_pay();
    let mut postbacks = subscribe(&pay, NoticeKind::Postback);
    let mut chargebacks = subscribe(&pay, NoticeKind::Chargeback);
    let routes = WebhookRoutes::bind(pay.clone()).unwrap();
    let app = test::init_service(App::new().configure(|cfg| routes.register(cfg))).await;

    let claims = notice_claims();
    let req = test::TestRequest::post()
        .uri("/mozpay/postback")
        .set_form(json!({"notice": sign(&claims, SECRET)}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(test::read_body(resp).await, "webpay-123");

    let notice = next_dispatch(&mut postbacks).await;
    assert_eq!(serde_json::to_value(&notice).unwrap(), claims);
    assert_no_dispatch(&mut postbacks).await;
    assert_no_dispatch(&mut chargebacks).await;
}

#[actix_rt::test]
async fn test_sparse_request_is_accepted_and_echoed_as_sent() {
    let pay = default_pay();
    let mut postbacks = subscribe(&pay, NoticeKind::Postback);
    let routes = WebhookRoutes::bind(pay.clone()).unwrap();
    let app = test::init_service(App::new().configure(|cfg| routes.register(cfg))).await;

    let mut claims = notice_claims();
    let request = claims["request"].as_object_mut().unwrap();
    request.remove("description");
    request.remove("productData");
    let req = test::TestRequest::post()
        .uri("/mozpay/postback")
        .set_form(json!({"notice": sign(&claims, SECRET)}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let notice = next_dispatch(&mut postbacks).await;
    let emitted = serde_json::to_value(&notice).unwrap();
    assert!(emitted["request"].get("productData").is_none());
    assert_eq!(emitted, claims);
}

#[actix_rt::test]
async fn test_chargeback_dispatches_on_its_own_channel() {
    let pay = default_pay();
    let mut postbacks = subscribe(&pay, NoticeKind::Postback);
    let mut chargebacks = subscribe(&pay, NoticeKind::Chargeback);
    let routes = WebhookRoutes::bind(pay.clone()).unwrap();
    let app = test::init_service(App::new().configure(|cfg| routes.register(cfg))).await;

    let mut claims = notice_claims();
    claims["response"]["reason"] = json!("refund");
    let req = test::TestRequest::post()
        .uri("/mozpay/chargeback")
        .set_form(json!({"notice": sign(&claims, SECRET)}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(test::read_body(resp).await, "webpay-123");

    let notice = next_dispatch(&mut chargebacks).await;
    assert_eq!(notice.response.unwrap().reason.as_deref(), Some("refund"));
    assert_no_dispatch(&mut postbacks).await;
}

#[actix_rt::test]
async fn test_json_body_accepted() {
    let pay = default_pay();
    let routes = WebhookRoutes::bind(pay.clone()).unwrap();
    let app = test::init_service(App::new().configure(|cfg| routes.register(cfg))).await;

    let req = test::TestRequest::post()
        .uri("/mozpay/postback")
        .set_json(json!({"notice": sign(&notice_claims(), SECRET)}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(test::read_body(resp).await, "webpay-123");
}

#[actix_rt::test]
async fn test_custom_prefix_serves_requests() {
    let pay = make_pay(ConfigOptions::new(KEY, SECRET).route_prefix(Some("/foo/")));
    let routes = WebhookRoutes::bind(pay.clone()).unwrap();
    let app = test::init_service(App::new().configure(|cfg| routes.register(cfg))).await;

    let req = test::TestRequest::post()
        .uri("/foo/postback")
        .set_form(json!({"notice": sign(&notice_claims(), SECRET)}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let req = test::TestRequest::post()
        .uri("/mozpay/postback")
        .set_form(json!({"notice": sign(&notice_claims(), SECRET)}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_rt::test]
async fn test_failing_subscriber_does_not_change_response() {
    let pay = default_pay();
    pay.on(NoticeKind::Postback, |_| Err("subscriber bug".into()));
    let (tx, mut failures) = mpsc::unbounded_channel();
    pay.on_error(move |failure| {
        let _ = tx.send(failure.clone());
    });
    let routes = WebhookRoutes::bind(pay.clone()).unwrap();
    let app = test::init_service(App::new().configure(|cfg| routes.register(cfg))).await;

    let req = test::TestRequest::post()
        .uri("/mozpay/postback")
        .set_form(json!({"notice": sign(&notice_claims(), SECRET)}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(test::read_body(resp).await, "webpay-123");

    let failure = tokio::time::timeout(Duration::from_secs(2), failures.recv())
        .await
        .expect("failure not surfaced")
        .unwrap();
    assert_eq!(failure.kind, NoticeKind::Postback);
    assert_eq!(failure.message, "subscriber bug");
    assert_eq!(failure.transaction_id.as_deref(), Some("webpay-123"));
}

#[actix_rt::test]
async fn test_reset_config_turns_requests_away() {
    let pay = default_pay();
    let routes = WebhookRoutes::bind(pay.clone()).unwrap();
    let app = test::init_service(App::new().configure(|cfg| routes.register(cfg))).await;

    pay.reset_config();
    let req = test::TestRequest::post()
        .uri("/mozpay/postback")
        .set_form(json!({"notice": sign(&notice_claims(), SECRET)}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

// -- Health and metrics --

#[actix_rt::test]
async fn test_health_reports_configuration() {
    let pay = default_pay();
    let app = test::init_service(App::new().app_data(pay.clone()).service(routes::health)).await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["configured"], true);
    assert_eq!(body["keyId"], KEY);

    pay.reset_config();
    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 503);
}

#[actix_rt::test]
async fn test_metrics_requires_token() {
    let access = web::Data::new(MetricsAccess {
        token: Some(b"metrics-token-123".to_vec()),
        public: false,
    });
    let app =
        test::init_service(App::new().app_data(access).service(routes::metrics_endpoint)).await;

    let req = test::TestRequest::get().uri("/metrics").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let req = test::TestRequest::get()
        .uri("/metrics")
        .insert_header(("Authorization", "Bearer wrong"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let req = test::TestRequest::get()
        .uri("/metrics")
        .insert_header(("Authorization", "Bearer metrics-token-123"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
}

#[actix_rt::test]
async fn test_metrics_forbidden_without_token() {
    let access = web::Data::new(MetricsAccess::default());
    let app =
        test::init_service(App::new().app_data(access).service(routes::metrics_endpoint)).await;

    let req = test::TestRequest::get().uri("/metrics").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);
}

#[actix_rt::test]
async fn test_metrics_public_opt_in() {
    let access = web::Data::new(MetricsAccess {
        token: None,
        public: true,
    });
    let app =
        test::init_service(App::new().app_data(access).service(routes::metrics_endpoint)).await;

    let req = test::TestRequest::get().uri("/metrics").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
}
