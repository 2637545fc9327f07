use skylane_agent::AgentDispatcher;
use skylane_booking::BookingService;
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<BookingService>,
    pub agent: Arc<AgentDispatcher>,
    pub auth: AuthConfig,
}
