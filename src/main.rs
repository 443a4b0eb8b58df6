use voi_proxy::env::SystemEnv;
use voi_proxy::{serve, Config};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env(&SystemEnv);
    tracing::debug!(config = ?config, "Loaded configuration");

    serve(config).await.expect("Server failed");
}
