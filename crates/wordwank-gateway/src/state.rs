use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::RwLock;

use crate::config::GatewayConfig;
use crate::registry::Registry;
use crate::services::ServiceClients;

pub type SharedRegistry = Arc<RwLock<Registry>>;

#[derive(Clone)]
pub struct AppState {
    /// Clients, display names, round table, and membership maps — the one
    /// lock-guarded state group. Never held across collaborator I/O.
    pub registry: SharedRegistry,
    pub services: Arc<ServiceClients>,
    pub config: Arc<GatewayConfig>,
    pub ws_connection_count: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(config: GatewayConfig) -> Self {
        let services = ServiceClients::new(&config.services);
        let registry = Registry::new(config.rounds.max_players);
        Self {
            registry: Arc::new(RwLock::new(registry)),
            services: Arc::new(services),
            config: Arc::new(config),
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// RAII guard for the WebSocket connection counter.
pub struct ConnectionGuard {
    count: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(count: Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::Relaxed);
        Self { count }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::Relaxed);
    }
}
