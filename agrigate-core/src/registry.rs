//! In-process tool catalog.
//!
//! The registry is populated once at startup and shared immutably (behind
//! an `Arc`) for the life of the process. Each entry pairs a tool with the
//! input extractor that shapes a free-form query into the tool's declared
//! input map, plus the compiled routing patterns.

use std::collections::HashMap;

use regex::Regex;
use serde_json::Value;

use crate::session::Attachment;
use crate::tool::{box_tool, DynTool, Observation, Tool, ToolCategory, ToolError};

/// Everything an extractor may read when shaping a tool's input.
pub struct ExtractionContext<'a> {
    /// The user query, in the canonical processing language
    pub query: &'a str,
    /// Observations accumulated earlier in the trace
    pub observations: &'a [Observation],
    /// Image attachment, when the request carried one
    pub attachment: Option<&'a Attachment>,
}

/// Per-tool input shaping function, registered alongside the tool.
///
/// Extractors are pure with respect to the registry: they read the query
/// and prior observations and produce the tool's input map, or an
/// `InvalidInput` error naming what is missing.
pub type InputExtractor =
    Box<dyn Fn(&ExtractionContext<'_>) -> Result<Value, ToolError> + Send + Sync>;

/// Extractor that forwards the whole query under a single field.
///
/// Suits tools whose input is `{ field: <query text> }` — retrieval,
/// search, and generation.
pub fn query_field_extractor(field: &'static str) -> InputExtractor {
    Box::new(move |cx| Ok(serde_json::json!({ field: cx.query })))
}

/// A registered tool with its routing patterns and input extractor.
pub struct ToolEntry {
    tool: Box<dyn DynTool>,
    extractor: InputExtractor,
    patterns: Vec<Regex>,
}

impl ToolEntry {
    pub fn tool(&self) -> &dyn DynTool {
        self.tool.as_ref()
    }

    pub fn patterns(&self) -> &[Regex] {
        &self.patterns
    }

    pub fn extract_input(&self, cx: &ExtractionContext<'_>) -> Result<Value, ToolError> {
        (self.extractor)(cx)
    }
}

/// Errors raised while populating the registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A tool with this name is already registered
    #[error("duplicate tool name: {0}")]
    Duplicate(String),

    /// A declared routing pattern failed to compile
    #[error("invalid routing pattern for {tool}: {source}")]
    Pattern {
        tool: String,
        #[source]
        source: regex::Error,
    },
}

/// Register-once, read-many tool catalog.
///
/// Lookup is O(1) amortized; `list` preserves insertion order. No
/// operation touches external I/O.
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<ToolEntry>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed tool with its input extractor.
    ///
    /// Fails if the name is already present or a routing pattern does not
    /// compile.
    pub fn register<T: Tool + 'static>(
        &mut self,
        tool: T,
        extractor: InputExtractor,
    ) -> Result<(), RegistryError> {
        self.register_boxed(box_tool(tool), extractor)
    }

    /// Register an already type-erased tool.
    pub fn register_boxed(
        &mut self,
        tool: Box<dyn DynTool>,
        extractor: InputExtractor,
    ) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(RegistryError::Duplicate(name));
        }

        let mut patterns = Vec::with_capacity(tool.patterns().len());
        for source in tool.patterns() {
            let compiled = Regex::new(source).map_err(|source| RegistryError::Pattern {
                tool: name.clone(),
                source,
            })?;
            patterns.push(compiled);
        }

        self.index.insert(name, self.entries.len());
        self.entries.push(ToolEntry {
            tool,
            extractor,
            patterns,
        });
        Ok(())
    }

    /// Look up a tool by name.
    pub fn lookup(&self, name: &str) -> Option<&dyn DynTool> {
        self.entry(name).map(ToolEntry::tool)
    }

    /// Look up a tool's invoke handler by name.
    ///
    /// Alias of [`lookup`](Self::lookup); the handler and the tool are the
    /// same object under the dynamic dispatch contract.
    pub fn handler(&self, name: &str) -> Option<&dyn DynTool> {
        self.lookup(name)
    }

    /// Full entry (tool + patterns + extractor) by name.
    pub fn entry(&self, name: &str) -> Option<&ToolEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// All registered tools in insertion order, optionally filtered by
    /// category.
    pub fn list(&self, category: Option<ToolCategory>) -> Vec<&dyn DynTool> {
        self.entries
            .iter()
            .filter(|e| category.map_or(true, |c| e.tool.category() == c))
            .map(|e| e.tool.as_ref())
            .collect()
    }

    /// Entries in insertion order, for router scoring.
    pub fn entries(&self) -> impl Iterator<Item = &ToolEntry> {
        self.entries.iter()
    }

    /// Shape a query into the named tool's input map.
    pub fn extract_input(
        &self,
        name: &str,
        cx: &ExtractionContext<'_>,
    ) -> Result<Value, ToolError> {
        let entry = self
            .entry(name)
            .ok_or_else(|| ToolError::Internal(format!("unknown tool: {}", name)))?;
        entry.extract_input(cx)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{ToolOutput, ToolCategory};
    use schemars::JsonSchema;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    struct QueryInput {
        query: String,
    }

    struct NamedTool {
        name: &'static str,
        category: ToolCategory,
    }

    impl Tool for NamedTool {
        type Input = QueryInput;

        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "test tool"
        }

        fn category(&self) -> ToolCategory {
            self.category
        }

        fn patterns(&self) -> &[&'static str] {
            &[r"\byield\b"]
        }

        async fn execute(&self, input: Self::Input) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::text(input.query))
        }
    }

    fn registry_with(names: &[(&'static str, ToolCategory)]) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for (name, category) in names {
            registry
                .register(
                    NamedTool {
                        name,
                        category: *category,
                    },
                    query_field_extractor("query"),
                )
                .unwrap();
        }
        registry
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = registry_with(&[("a", ToolCategory::Prediction)]);
        assert!(registry.lookup("a").is_some());
        assert!(registry.lookup("b").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = registry_with(&[("a", ToolCategory::Prediction)]);
        let err = registry
            .register(
                NamedTool {
                    name: "a",
                    category: ToolCategory::Utility,
                },
                query_field_extractor("query"),
            )
            .unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(ref n) if n == "a"));
    }

    #[test]
    fn test_list_preserves_insertion_order() {
        let registry = registry_with(&[
            ("first", ToolCategory::Prediction),
            ("second", ToolCategory::Retrieval),
            ("third", ToolCategory::Prediction),
        ]);
        let names: Vec<&str> = registry.list(None).iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);

        let predictions: Vec<&str> = registry
            .list(Some(ToolCategory::Prediction))
            .iter()
            .map(|t| t.name())
            .collect();
        assert_eq!(predictions, vec!["first", "third"]);
    }

    #[test]
    fn test_patterns_compiled_at_registration() {
        let registry = registry_with(&[("a", ToolCategory::Prediction)]);
        let entry = registry.entry("a").unwrap();
        assert_eq!(entry.patterns().len(), 1);
        assert!(entry.patterns()[0].is_match("predict the yield here"));
    }

    #[test]
    fn test_extract_input_routes_query() {
        let registry = registry_with(&[("a", ToolCategory::Retrieval)]);
        let cx = ExtractionContext {
            query: "what is crop rotation?",
            observations: &[],
            attachment: None,
        };
        let input = registry.extract_input("a", &cx).unwrap();
        assert_eq!(input["query"], "what is crop rotation?");
    }

    #[test]
    fn test_extract_input_unknown_tool_is_internal() {
        let registry = ToolRegistry::new();
        let cx = ExtractionContext {
            query: "q",
            observations: &[],
            attachment: None,
        };
        let err = registry.extract_input("missing", &cx).unwrap_err();
        assert!(matches!(err, ToolError::Internal(_)));
    }
}
