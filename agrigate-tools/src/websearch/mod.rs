//! External web search over HTTP.

mod search_tool;

pub use search_tool::{web_search_extractor, SearchDepth, WebSearchTool};
