use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pagesmith::{api, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        model = %config.llm.model,
        github_user = %config.github.username,
        "Starting pagesmith"
    );

    api::serve(config).await
}
