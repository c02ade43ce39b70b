use tracing_subscriber::EnvFilter;

use campaign_assistant::config::AssistantConfig;
use campaign_assistant::runtime::AssistantRuntime;
use campaign_assistant::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,campaign_assistant=debug")),
        )
        .init();

    tracing::info!("Campaign assistant starting...");

    let config = AssistantConfig::load();
    let runtime = AssistantRuntime::bootstrap(config).await?;

    server::serve(runtime).await
}
