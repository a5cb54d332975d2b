#![allow(clippy::needless_pass_by_value)]

use serde_json::{json, Map, Value};

use crate::device_catalog::CATEGORIES;
use crate::error::CommandError;
use crate::registry::params::CategoryParams;
use crate::registry::{CommandContext, CommandOutput};

pub fn list_device_catalog(
    ctx: &CommandContext<'_>,
    p: CategoryParams,
) -> Result<CommandOutput, CommandError> {
    let catalog = ctx.device_catalog;

    if let Some(category) = p.category.as_deref() {
        if !CATEGORIES.contains(&category) {
            return Err(CommandError::invalid_parameter(format!(
                "Unknown category: {category}. Available categories: {}",
                CATEGORIES.join(", ")
            )));
        }
        let devices: Vec<Value> = catalog
            .category(category)
            .into_iter()
            .flatten()
            .map(|(name, id)| json!({ "name": name, "id": id }))
            .collect();
        return Ok(CommandOutput::new(
            format!("{} devices in {category}", devices.len()),
            json!({
                "category": category,
                "count": devices.len(),
                "devices": devices,
            }),
        ));
    }

    let mut statistics = Map::new();
    for category in CATEGORIES {
        let count = catalog.category(category).map_or(0, |d| d.len());
        statistics.insert((*category).to_string(), json!(count));
    }
    Ok(CommandOutput::new(
        format!("{} devices in {} categories", catalog.total(), CATEGORIES.len()),
        json!({
            "total": catalog.total(),
            "statistics": statistics,
            "categories": CATEGORIES,
        }),
    ))
}
