#![allow(clippy::needless_pass_by_value)]

use serde_json::{json, Map, Value};
use tracing::warn;

use crate::error::CommandError;
use crate::registry::CommandContext;
use crate::registry::CommandOutput;
use crate::studio::TransportState;

const TICKS_PER_SIXTEENTH: u64 = 240;
const SIXTEENTHS_PER_BEAT: u64 = 4;
const BEATS_PER_MEASURE: u64 = 4;

const UNKNOWN_PROJECT: &str = "Unknown Project";

/// Overview of project, engine, transport and selection. A failing sub-read
/// is reported in `partial_failures` instead of failing the command.
pub fn status(ctx: &CommandContext<'_>) -> Result<CommandOutput, CommandError> {
    let bindings = &ctx.bindings;
    let mut data = Map::new();
    let mut partial_failures: Vec<String> = Vec::new();

    data.insert("version".into(), json!(env!("CARGO_PKG_VERSION")));

    let project_name = match bindings.transport.project_name() {
        Ok(name) => name,
        Err(e) => {
            partial_failures.push(format!("project_name: {}", e.message));
            UNKNOWN_PROJECT.to_string()
        }
    };
    data.insert("project_name".into(), json!(project_name));

    let engine = bindings.transport.audio_engine_active().unwrap_or_else(|e| {
        partial_failures.push(format!("audio_engine_active: {}", e.message));
        false
    });
    data.insert("audio_engine_active".into(), json!(engine));

    let transport = match bindings.transport.state() {
        Ok(state) => transport_json(&state),
        Err(e) => {
            partial_failures.push(format!("transport: {}", e.message));
            json!({ "error": "Transport status unavailable" })
        }
    };
    data.insert("transport".into(), transport);

    let selected_track = match bindings.tracks.selected() {
        Some(track) => match bindings.tracks.details(&track) {
            Ok(t) => json!({
                "index": t.index,
                "name": t.name,
                "type": t.track_type,
                "muted": t.mute,
                "soloed": t.solo,
                "armed": t.arm,
            }),
            Err(e) => {
                partial_failures.push(format!("selected_track: {}", e.message));
                Value::Null
            }
        },
        None => Value::Null,
    };
    data.insert("selected_track".into(), selected_track);

    let selected_device = match bindings.devices.selected() {
        Ok((track, device)) => match bindings.devices.details(&track, &device) {
            Ok(d) => json!({
                "track_index": track.index,
                "track_name": track.name,
                "index": d.index,
                "name": d.name,
                "bypassed": d.bypassed,
            }),
            Err(e) => {
                partial_failures.push(format!("selected_device: {}", e.message));
                Value::Null
            }
        },
        Err(_) => Value::Null,
    };
    data.insert("selected_device".into(), selected_device);

    let message = if partial_failures.is_empty() {
        format!("Status of '{project_name}'")
    } else {
        warn!(failures = partial_failures.len(), "status assembled with partial failures");
        let note = format!(
            "Status retrieved with {} partial failures",
            partial_failures.len()
        );
        data.insert("status_note".into(), json!(note));
        data.insert("partial_failures".into(), json!(partial_failures));
        note
    };

    Ok(CommandOutput::new(message, Value::Object(data)))
}

fn transport_json(t: &TransportState) -> Value {
    json!({
        "playing": t.playing,
        "recording": t.recording,
        "loop_active": t.loop_active,
        "metronome_active": t.metronome_active,
        "current_tempo": t.tempo,
        "time_signature": format!("{}/{}", t.time_signature.numerator, t.time_signature.denominator),
        "current_beat_str": format_beat_position(t.position_beats),
        "current_time_str": format_time_string(t.position_seconds),
    })
}

/// `measure.beat.sixteenth:tick`, all 1-based except ticks. Assumes 4/4.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn format_beat_position(beats: f64) -> String {
    let beats = if beats.is_finite() { beats.max(0.0) } else { 0.0 };
    let ticks_per_beat = SIXTEENTHS_PER_BEAT * TICKS_PER_SIXTEENTH;
    let ticks_per_measure = BEATS_PER_MEASURE * ticks_per_beat;

    let total = (beats * ticks_per_beat as f64).round() as u64;
    let measure = total / ticks_per_measure + 1;
    let rem = total % ticks_per_measure;
    let beat = rem / ticks_per_beat + 1;
    let rem = rem % ticks_per_beat;
    let sixteenth = rem / TICKS_PER_SIXTEENTH + 1;
    let tick = rem % TICKS_PER_SIXTEENTH;

    format!("{measure}.{beat}.{sixteenth}:{tick}")
}

/// `M:SS.mmm`, or `H:MM:SS.mmm` from one hour on.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_time_string(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    let total_ms = (seconds * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}.{ms:03}")
    } else {
        format!("{minutes}:{secs:02}.{ms:03}")
    }
}
