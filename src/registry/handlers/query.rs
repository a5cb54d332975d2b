#![allow(clippy::needless_pass_by_value)]

use serde_json::json;

use crate::error::CommandError;
use crate::registry::catalog;
use crate::registry::params::HelpParams;
use crate::registry::{CommandContext, CommandOutput};

pub fn help(ctx: &CommandContext<'_>, p: HelpParams) -> Result<CommandOutput, CommandError> {
    let text = catalog::help_text(ctx.registry, p.topic.as_deref());
    Ok(CommandOutput::new(text.clone(), json!({ "help": text })))
}
