use actix_cors::Cors;
use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{web, App, HttpServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mozpay::{MozPay, NoticeKind};
use mozpay_server::routes::{self, MetricsAccess, WebhookRoutes};
use mozpay_server::ServerConfig;

fn build_cors(origins: &[String]) -> Cors {
    if origins.is_empty() {
        // Provider callbacks are server-to-server; browsers only need this locally.
        Cors::default()
            .allowed_origin_fn(|origin, _| {
                origin
                    .to_str()
                    .map(|o| o == "http://localhost" || o.starts_with("http://localhost:"))
                    .unwrap_or(false)
            })
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec!["content-type", "authorization"])
            .max_age(3600)
    } else {
        let mut cors = Cors::default();
        for origin in origins {
            cors = cors.allowed_origin(origin);
        }
        cors.allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec!["content-type", "authorization"])
            .max_age(3600)
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    let pay = match MozPay::with_options(config.options.clone()) {
        Ok(pay) => web::Data::new(pay),
        Err(e) => {
            tracing::error!("Refusing to start: {e}");
            std::process::exit(1);
        }
    };

    // Stand-in subscribers; an embedding application registers its own.
    for kind in NoticeKind::ALL {
        pay.on(kind, move |notice| {
            tracing::info!(
                kind = %kind,
                transaction_id = notice.transaction_id().unwrap_or(""),
                product = notice
                    .request
                    .as_ref()
                    .and_then(|r| r.id.as_deref())
                    .unwrap_or(""),
                "notice received"
            );
            Ok(())
        });
    }
    pay.on_error(|failure| {
        tracing::error!(failure = %failure, "unhandled notice subscriber failure");
    });

    let webhook_routes = match WebhookRoutes::bind(pay.clone()) {
        Ok(routes) => routes,
        Err(e) => {
            tracing::error!("Cannot bind notice routes: {e}");
            std::process::exit(1);
        }
    };

    let metrics_access = web::Data::new(MetricsAccess {
        token: config.metrics_token.clone(),
        public: config.public_metrics,
    });

    let port = config.port;
    let cors_origins = config.allowed_origins.clone();

    tracing::info!("mozpay server listening on port {port}");
    tracing::info!("Rate limit: {} req/min per IP", config.rate_limit_rpm);
    tracing::info!("  POST http://localhost:{port}{}", webhook_routes.postback_path());
    tracing::info!("  POST http://localhost:{port}{}", webhook_routes.chargeback_path());

    let Some(governor_conf) = GovernorConfigBuilder::default()
        .requests_per_minute(config.rate_limit_rpm)
        .finish()
    else {
        tracing::error!("Cannot build rate limiter for {} req/min", config.rate_limit_rpm);
        std::process::exit(1);
    };

    HttpServer::new(move || {
        let webhook_routes = webhook_routes.clone();
        App::new()
            .wrap(build_cors(&cors_origins))
            .wrap(Governor::new(&governor_conf))
            .app_data(pay.clone())
            .app_data(metrics_access.clone())
            .app_data(web::JsonConfig::default().limit(65_536))
            .app_data(web::PayloadConfig::new(65_536))
            .service(routes::health)
            .service(routes::metrics_endpoint)
            .configure(move |cfg| webhook_routes.register(cfg))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
