use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seerr_gateway::app_state::{build_state, config_path_from_env};
use seerr_gateway::seerr::gateway::serve_in_background;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seerr_gateway=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = config_path_from_env();
    let state = build_state(config_path)?;
    log::info!("loaded config from {}", state.config_path.display());

    serve_in_background(state.seerr).await
}
