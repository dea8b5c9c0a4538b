use tracing_subscriber::EnvFilter;

async fn real_main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::debug!("parsing config...");
    // An explicit config file wins over the environment.
    let config = match std::env::args().nth(1) {
        Some(path) => gatekeeper::BotConfig::from_config(Some(path))?,
        None => gatekeeper::BotConfig::from_env()?,
    };

    tracing::debug!("creating client...");
    gatekeeper::run(config).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // just one trick to get rust-analyzer working in main :-)
    real_main().await
}
