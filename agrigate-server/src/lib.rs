//! # agrigate-server
//!
//! HTTP gateway binding the agrigate orchestration core and tool set to
//! external clients: authentication, the agent/query endpoints, weather,
//! and conversation storage.
//!
//! The composition root ([`bootstrap`]) constructs everything with
//! process lifetime from [`agrigate_core::GatewayConfig`]; handlers
//! receive it through axum state. See the `agrigate-server` binary for
//! the runnable gateway.

pub mod bootstrap;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod router;
pub mod state;

pub use bootstrap::{build_registry, build_state, build_state_with_upstream};
pub use error::{ApiError, ApiResult};
pub use router::build_router;
pub use state::AppState;
