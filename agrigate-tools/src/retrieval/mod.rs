//! Vector-store retrieval.
//!
//! The store itself is external; it surfaces here only as the
//! [`VectorIndex`] search contract. [`StaticIndex`] is the bundled
//! in-memory implementation used for default wiring and tests.

mod vector_search;

pub use vector_search::{rag_extractor, ScoredDocument, StaticIndex, VectorIndex, VectorSearchTool};
