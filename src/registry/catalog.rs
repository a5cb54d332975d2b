#![allow(clippy::needless_pass_by_value)]

use schemars::schema_for;
use serde::Serialize;
use serde_json::Value;

use super::{CommandCategory, ToolRegistry, ToolSpec};
use crate::error::CommandError;

/// A catalog entry: metadata + JSON schema for the params.
#[derive(Debug, Clone, Serialize)]
pub struct CommandRegistryEntry {
    pub name: &'static str,
    pub description: &'static str,
    pub category: CommandCategory,
    pub mutates: bool,
    pub param_schema: Value,
}

impl From<&ToolSpec> for CommandRegistryEntry {
    fn from(tool: &ToolSpec) -> Self {
        Self {
            name: tool.info.name,
            description: tool.info.description,
            category: tool.info.category,
            mutates: tool.info.mutates,
            param_schema: tool.param_schema.clone(),
        }
    }
}

pub(super) fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

pub(super) fn schema_value<T: schemars::JsonSchema>() -> Value {
    let root = schema_for!(T);
    serde_json::to_value(root).unwrap_or(empty_object_schema())
}

/// Decode a parameter object. Unknown fields, missing required fields and
/// wrong types are all `INVALID_PARAMETER`.
pub(super) fn de<T: serde::de::DeserializeOwned>(
    command: &str,
    input: &Value,
) -> Result<T, CommandError> {
    serde_json::from_value(input.clone()).map_err(|e| {
        CommandError::invalid_parameter(format!("Invalid parameters for {command}: {e}"))
    })
}

/// Every registered command, in registration order.
pub fn command_registry(registry: &ToolRegistry) -> Vec<CommandRegistryEntry> {
    registry.iter().map(CommandRegistryEntry::from).collect()
}

/// Help text for command discovery.
/// Three tiers: no topic → categories, category → command list, command → full schema.
pub fn help_text(registry: &ToolRegistry, topic: Option<&str>) -> String {
    let entries = command_registry(registry);

    match topic.map(str::trim).filter(|t| !t.is_empty()) {
        None => {
            let mut lines = vec!["Available command categories:".to_string()];
            for category in CommandCategory::all() {
                let count = entries.iter().filter(|e| e.category == *category).count();
                if count > 0 {
                    lines.push(format!(
                        "  {} ({count}): {}",
                        category.slug(),
                        category.description()
                    ));
                }
            }
            lines.push(String::new());
            lines.push("Use help({topic: \"device\"}) to list commands in a category.".to_string());
            lines.push(
                "Use help({topic: \"get_device_details\"}) for full parameter details.".to_string(),
            );
            lines.join("\n")
        }
        Some(topic) => {
            // Command name first (tier 3: full schema)
            if let Some(entry) = entries.iter().find(|e| e.name == topic) {
                let schema_str = serde_json::to_string_pretty(&entry.param_schema)
                    .unwrap_or_else(|_| "{}".to_string());
                return format!(
                    "{}: {}\nCategory: {} | Mutates: {}\n\nParameters:\n{}",
                    entry.name,
                    entry.description,
                    entry.category.slug(),
                    if entry.mutates { "yes" } else { "no" },
                    schema_str,
                );
            }

            // Category name (tier 2: command list)
            let wanted = topic.to_lowercase();
            let matching: Vec<&CommandRegistryEntry> = entries
                .iter()
                .filter(|e| e.category.slug() == wanted)
                .collect();

            if matching.is_empty() {
                format!("Unknown topic: \"{topic}\". Use help() to see categories and commands.")
            } else {
                let mut lines = vec![format!("{wanted} commands:")];
                for entry in &matching {
                    lines.push(format!("  - {}: {}", entry.name, entry.description));
                }
                lines.push(String::new());
                lines.push("Use help({topic: \"command_name\"}) for parameter details.".to_string());
                lines.join("\n")
            }
        }
    }
}

/// JSON Schema formatted tool list (for REST clients and agents).
pub fn to_json_schema(registry: &ToolRegistry) -> Value {
    Value::Array(
        command_registry(registry)
            .iter()
            .map(|e| {
                serde_json::json!({
                    "name": e.name,
                    "description": e.description,
                    "category": e.category.slug(),
                    "mutates": e.mutates,
                    "inputSchema": e.param_schema,
                })
            })
            .collect(),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::registry::params::TrackTargetParams;

    #[test]
    fn test_help_tiers() {
        let registry = ToolRegistry::builtin();

        let overview = help_text(&registry, None);
        assert!(overview.starts_with("Available command categories:"));
        assert!(overview.contains("device ("));

        let category = help_text(&registry, Some("Scene"));
        assert!(category.starts_with("scene commands:"));
        assert!(category.contains("launch_scene"));

        let command = help_text(&registry, Some("get_track_details"));
        assert!(command.contains("Mutates: no"));
        assert!(command.contains("track_name"));

        let unknown = help_text(&registry, Some("nope"));
        assert!(unknown.starts_with("Unknown topic"));
    }

    #[test]
    fn test_blank_topic_is_overview() {
        let registry = ToolRegistry::builtin();
        assert_eq!(help_text(&registry, Some("  ")), help_text(&registry, None));
    }

    #[test]
    fn test_json_schema_lists_every_tool() {
        let registry = ToolRegistry::builtin();
        let tools = to_json_schema(&registry);
        let tools = tools.as_array().unwrap();
        assert_eq!(tools.len(), registry.len());
        let status = tools.iter().find(|t| t["name"] == "status").unwrap();
        assert_eq!(status["category"], "status");
        assert_eq!(status["inputSchema"]["type"], "object");
    }

    #[test]
    fn test_de_rejects_unknown_and_mistyped_fields() {
        let err = de::<TrackTargetParams>("get_track_details", &serde_json::json!({"trak": 1}))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParameter);
        assert!(err.message.contains("trak"));

        let err = de::<TrackTargetParams>(
            "get_track_details",
            &serde_json::json!({"track_index": "two"}),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParameter);

        let err = de::<TrackTargetParams>(
            "get_track_details",
            &serde_json::json!({"track_index": -1}),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParameter);
    }
}
