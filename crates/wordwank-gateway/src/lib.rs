pub mod config;
pub mod health;
pub mod registry;
pub mod rounds;
pub mod services;
pub mod state;
pub mod ws;

use axum::Router;

use config::GatewayConfig;
use state::AppState;

pub use rounds::spawn_bootstrap_round;

/// Build the axum router and application state from a config.
pub fn build_app(config: GatewayConfig) -> (Router<()>, AppState) {
    let state = AppState::new(config);

    let app = Router::new()
        .route("/ws", axum::routing::get(ws::ws_handler))
        .route("/api/health", axum::routing::get(health::health_check))
        .with_state(state.clone());

    (app, state)
}
