use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use coordinator::Config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("coordinator=debug,tower_http=info")),
        )
        .init();

    let config = Config::parse();
    coordinator::run(config).await
}
