use tracing_subscriber::EnvFilter;

use wordwank_gateway::config::GatewayConfig;
use wordwank_gateway::{build_app, spawn_bootstrap_round};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = GatewayConfig::load();
    config.validate();

    tracing::info!(addr = %config.listen_addr, "Wordwank gateway starting");

    let listen_addr = config.listen_addr.clone();
    let (app, state) = build_app(config);

    spawn_bootstrap_round(state);

    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %listen_addr, error = %e, "Failed to bind listener");
            std::process::exit(1);
        },
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
