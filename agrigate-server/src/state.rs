//! Shared application state.
//!
//! The composition root builds one `AppState` at startup and axum clones
//! it per request; nothing here is mutable except through the contained
//! services' own synchronization.

use std::sync::Arc;

use agrigate_core::{Agent, AuthService, ConversationStore, GatewayConfig, ToolRegistry};
use agrigate_tools::weather::WeatherService;

#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
    pub registry: Arc<ToolRegistry>,
    pub auth: Arc<AuthService>,
    pub conversations: Arc<dyn ConversationStore>,
    pub weather: Arc<WeatherService>,
    pub config: Arc<GatewayConfig>,
}
