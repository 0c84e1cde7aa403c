//! Language-model generation.
//!
//! [`HttpGenerationTool`] talks to a configured completion endpoint;
//! [`OfflineGenerationTool`] is the deterministic stand-in used when no
//! endpoint is configured, so the gateway stays answerable end-to-end.

mod generation_tool;

pub use generation_tool::{
    generation_extractor, GenerationInput, HttpGenerationTool, OfflineGenerationTool,
};
