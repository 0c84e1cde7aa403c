//! Tool implementations for the agrigate gateway.
//!
//! Every tool here conforms to the `agrigate_core::Tool` contract and
//! ships with the input extractor the registry pairs it with:
//!
//! - [`predict`] — the six structured predictors (yield, pest-from-image,
//!   soil moisture, crop-by-nutrients, crop-by-climate, soil fertility)
//!   over black-box [`predict::Predictor`] backends
//! - [`retrieval`] — vector-store search behind the
//!   [`retrieval::VectorIndex`] trait
//! - [`websearch`] — external web search over HTTP
//! - [`translate`] — translation over HTTP
//! - [`generate`] — language-model generation over HTTP, with an offline
//!   stand-in
//! - [`weather`] — location resolution, TTL cache, upstream fetch, and
//!   agricultural insights

pub mod generate;
pub mod predict;
pub mod retrieval;
pub mod translate;
pub mod websearch;
pub mod weather;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use agrigate_core::{Tool, ToolCategory, ToolError, ToolOutput};
    pub use schemars::JsonSchema;
    pub use serde::{Deserialize, Serialize};
}
