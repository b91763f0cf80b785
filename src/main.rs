use std::sync::Arc;

use devshare::config::AgentConfig;
use devshare::runtime::AgentRuntime;
use devshare::state::{JsonFileStore, StateStore};
use devshare::tunnel::{PublicUrlProvider, StaticUrl};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let mut config = AgentConfig::default();
    if let Ok(url) = std::env::var("DEVSHARE_API_URL") {
        config.api_base_url = url;
    }
    if let Ok(path) = std::env::var("DEVSHARE_STATE_PATH") {
        config.state_path = path.into();
    }
    let tunnel_url = std::env::var("DEVSHARE_PUBLIC_URL").ok();

    eprintln!("devshare-agent v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Coordinator: {}", config.api_base_url);
    eprintln!("   State file:  {}", config.state_path.display());

    let store: Arc<dyn StateStore> = Arc::new(JsonFileStore::new(&config.state_path));
    let initial = store.load().await?;

    if initial.user_id.is_empty() {
        eprintln!("   No user id configured — heartbeating without polling for jobs.");
        eprintln!(
            "   Register the device by setting \"user_id\" in {}.",
            config.state_path.display()
        );
    } else {
        eprintln!("   Device id:   {}", initial.user_id);
    }

    let url_provider: Arc<dyn PublicUrlProvider> = Arc::new(StaticUrl::new(tunnel_url));
    let runtime = AgentRuntime::new(config, initial, store, url_provider);

    runtime.start().await;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Received interrupt; shutting down");
    runtime.stop().await;

    Ok(())
}
