//! Schema overrides for tools whose advertised schema is unusable
//!
//! Some providers advertise schemas the chat vendor rejects or that lack the
//! parameters the model needs. An override replaces the parameters object for
//! one tool name and supplies a description for when the provider has none.

use serde_json::{json, Value};
use std::collections::HashMap;

/// Replacement schema for a single tool
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaOverride {
    /// Description used when the provider supplied none
    pub default_description: String,

    /// Parameters object sent to the chat vendor
    pub parameters: Value,
}

impl SchemaOverride {
    /// Create an override
    pub fn new(default_description: impl Into<String>, parameters: Value) -> Self {
        Self {
            default_description: default_description.into(),
            parameters,
        }
    }

    /// Override with an empty parameters object
    pub fn parameterless(default_description: impl Into<String>) -> Self {
        Self::new(
            default_description,
            json!({"type": "object", "properties": {}, "required": []}),
        )
    }
}

/// Lookup table from tool name to override
#[derive(Debug, Clone, Default)]
pub struct SchemaOverrides {
    table: HashMap<String, SchemaOverride>,
}

impl SchemaOverrides {
    /// Empty table: every tool uses its own schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Table for the Algolia MCP server
    ///
    /// `searchSingleIndex` and `saveObject` take the application, the index and
    /// a free-form request body; account tools take no parameters.
    pub fn algolia_defaults() -> Self {
        Self::new()
            .with_override(
                "searchSingleIndex",
                SchemaOverride::new(
                    "Search Algolia index for relevant data",
                    algolia_index_parameters(
                        "Name of the Algolia index to search",
                        "Search request body with query parameters",
                    ),
                ),
            )
            .with_override(
                "saveObject",
                SchemaOverride::new(
                    "Save an object to Algolia index",
                    algolia_index_parameters(
                        "Name of the Algolia index to save to",
                        "Object data to save to the index",
                    ),
                ),
            )
            .with_override("getUserInfo", SchemaOverride::parameterless(super::NO_DESCRIPTION))
            .with_override(
                "getApplications",
                SchemaOverride::parameterless(super::NO_DESCRIPTION),
            )
    }

    /// Add or replace an override
    pub fn with_override(mut self, name: impl Into<String>, schema: SchemaOverride) -> Self {
        self.table.insert(name.into(), schema);
        self
    }

    /// Override for `name`, if any
    pub fn get(&self, name: &str) -> Option<&SchemaOverride> {
        self.table.get(name)
    }

    /// Number of overrides
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

fn algolia_index_parameters(index_description: &str, body_description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "applicationId": {
                "type": "string",
                "description": "Algolia application ID"
            },
            "indexName": {
                "type": "string",
                "description": index_description
            },
            "requestBody": {
                "type": "object",
                "description": body_description
            }
        },
        "required": ["applicationId", "indexName", "requestBody"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algolia_defaults() {
        let overrides = SchemaOverrides::algolia_defaults();
        assert_eq!(overrides.len(), 4);

        let search = overrides.get("searchSingleIndex").unwrap();
        assert_eq!(
            search.parameters["required"],
            json!(["applicationId", "indexName", "requestBody"])
        );
        assert_eq!(search.parameters["properties"]["requestBody"]["type"], "object");

        let user_info = overrides.get("getUserInfo").unwrap();
        assert_eq!(user_info.parameters["properties"], json!({}));

        assert!(overrides.get("calculator").is_none());
    }

    #[test]
    fn test_with_override_replaces() {
        let overrides = SchemaOverrides::algolia_defaults()
            .with_override("saveObject", SchemaOverride::parameterless("custom"));
        assert_eq!(overrides.get("saveObject").unwrap().default_description, "custom");
    }
}
