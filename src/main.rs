use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use tokyo_gas_scraper::{config::AppConfig, server, ScraperError};

#[tokio::main]
async fn main() -> Result<(), ScraperError> {
    let config = AppConfig::load_default()?;

    // RUST_LOGが設定されていればオプションファイルのlog_levelより優先
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    info!(
        "tokyo-gas-scraper starting: port={}, headless={}, timeout={}s",
        config.port, config.headless, config.timeout_secs
    );

    server::run(config).await
}
