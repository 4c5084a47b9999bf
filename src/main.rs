use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let http_port = std::env::var("FITLOG_HTTP_PORT").unwrap_or_else(|_| "8080".to_string());
    // DSN may carry credentials; only log whether it was provided.
    let database_url_set = std::env::var("FITLOG_DATABASE_URL").is_ok();
    info!(
        target: "fitlog",
        "fitlog starting: RUST_LOG='{}', http_port={}, database_url_set={}",
        rust_log, http_port, database_url_set
    );

    fitlog::server::run().await
}
