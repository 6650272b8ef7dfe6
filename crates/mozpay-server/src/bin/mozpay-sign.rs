//! Sign a pay request read from stdin and print the token.
//!
//! Uses the same `MOZPAY_*` variables as the server (`.env` is honoured).
//!
//! ```text
//! echo '{"pricePoint":1,"id":"level-10",...}' | mozpay-sign
//! ```

use std::io::Read;

use mozpay::{MozPay, PayRequest};
use mozpay_server::config::options_from;

fn run() -> Result<String, Box<dyn std::error::Error>> {
    let options = options_from(&|name: &str| std::env::var(name).ok().filter(|v| !v.is_empty()))?;
    let pay = MozPay::with_options(options)?;

    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    let request: PayRequest = serde_json::from_str(&input)?;

    Ok(pay.sign(&request)?)
}

fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(token) => println!("{token}"),
        Err(e) => {
            tracing::error!("{e}");
            std::process::exit(1);
        }
    }
}
