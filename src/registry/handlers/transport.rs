#![allow(clippy::needless_pass_by_value)]

use serde_json::json;

use crate::error::CommandError;
use crate::registry::params::SetPlaybackPositionParams;
use crate::registry::validation::validate_beats;
use crate::registry::{CommandContext, CommandOutput};

pub fn transport_start(ctx: &CommandContext<'_>) -> Result<CommandOutput, CommandError> {
    ctx.bindings.transport.start()?;
    Ok(CommandOutput::new(
        "Transport playback started.",
        json!({ "action": "started", "message": "Transport playback started." }),
    ))
}

pub fn transport_stop(ctx: &CommandContext<'_>) -> Result<CommandOutput, CommandError> {
    ctx.bindings.transport.stop()?;
    Ok(CommandOutput::new(
        "Transport playback stopped.",
        json!({ "action": "stopped", "message": "Transport playback stopped." }),
    ))
}

pub fn set_playback_position(
    ctx: &CommandContext<'_>,
    p: SetPlaybackPositionParams,
) -> Result<CommandOutput, CommandError> {
    validate_beats(p.beats)?;
    ctx.bindings.transport.set_position(p.beats)?;
    let message = format!("Playback position set to beat {}.", p.beats);
    Ok(CommandOutput::new(
        message.clone(),
        json!({
            "action": "playback_position_set",
            "beats": p.beats,
            "message": message,
        }),
    ))
}
