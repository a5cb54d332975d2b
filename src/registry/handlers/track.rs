#![allow(clippy::needless_pass_by_value)]

use serde_json::{json, Map, Value};

use crate::error::{CommandError, ErrorCode};
use crate::registry::params::{
    ListTracksParams, SetTrackPropertiesParams, SetTrackSendParams, TrackTargetParams,
};
use crate::registry::validation::{validate_normalized, validate_send_index};
use crate::registry::{CommandContext, CommandOutput};
use crate::resolver::EntityRef;
use crate::studio::{DeviceState, TrackChanges, TrackState, TrackType};

fn device_summary(d: &DeviceState) -> Value {
    json!({ "index": d.index, "name": d.name, "type": d.device_type })
}

fn track_summary(t: &TrackState, selected: bool, devices: &[DeviceState]) -> Value {
    json!({
        "index": t.index,
        "name": t.name,
        "type": t.track_type,
        "is_group": t.track_type == TrackType::Group,
        "parent_group_index": t.parent_group,
        "activated": t.activated,
        "color": t.color.css(),
        "is_selected": selected,
        "devices": devices.iter().map(device_summary).collect::<Vec<_>>(),
    })
}

pub fn list_tracks(
    ctx: &CommandContext<'_>,
    p: ListTracksParams,
) -> Result<CommandOutput, CommandError> {
    let bindings = &ctx.bindings;
    let selected = bindings.tracks.selected().map(|t| t.index);

    let mut rows = Vec::new();
    for track in bindings.tracks.list()? {
        if p.track_type.is_some_and(|wanted| wanted != track.track_type) {
            continue;
        }
        let entity = EntityRef::new(track.index, track.name.clone());
        let devices = bindings.devices.list(&entity)?;
        rows.push(track_summary(&track, selected == Some(track.index), &devices));
    }

    Ok(CommandOutput::new(
        format!("{} tracks", rows.len()),
        Value::Array(rows),
    ))
}

pub fn get_track_details(
    ctx: &CommandContext<'_>,
    p: TrackTargetParams,
) -> Result<CommandOutput, CommandError> {
    let bindings = &ctx.bindings;
    let target = bindings.tracks.resolve(&p.selector())?;
    let track = bindings.tracks.details(&target)?;
    let devices = bindings.devices.list(&target)?;
    let selected = bindings.tracks.selected().is_some_and(|s| s.index == target.index);

    let mut data = track_summary(&track, selected, &devices);
    if let Value::Object(map) = &mut data {
        map.insert("volume".into(), json!(track.volume));
        map.insert("pan".into(), json!(track.pan));
        map.insert("muted".into(), json!(track.mute));
        map.insert("soloed".into(), json!(track.solo));
        map.insert("armed".into(), json!(track.arm));
        map.insert(
            "sends".into(),
            Value::Array(
                track
                    .sends
                    .iter()
                    .enumerate()
                    .map(|(i, s)| {
                        json!({ "index": i, "name": s.name, "volume": s.volume, "enabled": s.enabled })
                    })
                    .collect(),
            ),
        );
    }

    Ok(CommandOutput::new(format!("Track: {}", track.name), data))
}

pub fn set_track_properties(
    ctx: &CommandContext<'_>,
    p: SetTrackPropertiesParams,
) -> Result<CommandOutput, CommandError> {
    let changes = TrackChanges {
        mute: p.mute,
        solo: p.solo,
        arm: p.arm,
        volume: p.volume,
        pan: p.pan,
    };
    if changes.is_empty() {
        return Err(CommandError::new(
            ErrorCode::MissingRequiredParameter,
            "Provide at least one of mute, solo, arm, volume or pan",
        ));
    }
    if let Some(volume) = changes.volume {
        validate_normalized(volume, "volume")?;
    }
    if let Some(pan) = changes.pan {
        validate_normalized(pan, "pan")?;
    }

    let bindings = &ctx.bindings;
    let target = bindings.tracks.resolve(&p.selector())?;
    bindings.tracks.update(&target, &changes)?;

    let mut data = Map::new();
    data.insert("action".into(), json!("track_properties_set"));
    data.insert("track_index".into(), json!(target.index));
    data.insert("track_name".into(), json!(target.name));
    for (key, value) in [("mute", changes.mute), ("solo", changes.solo), ("arm", changes.arm)] {
        if let Some(v) = value {
            data.insert(key.into(), json!(v));
        }
    }
    for (key, value) in [("volume", changes.volume), ("pan", changes.pan)] {
        if let Some(v) = value {
            data.insert(key.into(), json!(v));
        }
    }
    let message = format!("Updated track '{}'", target.name);
    data.insert("message".into(), json!(message));

    Ok(CommandOutput::new(message, Value::Object(data)))
}

pub fn set_track_send(
    ctx: &CommandContext<'_>,
    p: SetTrackSendParams,
) -> Result<CommandOutput, CommandError> {
    if p.volume.is_none() && p.enabled.is_none() {
        return Err(CommandError::new(
            ErrorCode::MissingRequiredParameter,
            "Provide volume, enabled, or both",
        ));
    }
    if let Some(volume) = p.volume {
        validate_normalized(volume, "volume")?;
    }

    let bindings = &ctx.bindings;
    let target = bindings.tracks.resolve(&p.selector())?;
    let sends = bindings.tracks.details(&target)?.sends;
    let slot = validate_send_index(p.send_index, sends.len())?;
    let Some(send) = sends.get(slot) else {
        return Err(CommandError::internal(format!("send {slot} disappeared")));
    };
    bindings.tracks.set_send(&target, slot, p.volume, p.enabled)?;

    let volume = p.volume.unwrap_or(send.volume);
    let enabled = p.enabled.unwrap_or(send.enabled);
    let message = format!("Send '{}' on track '{}' updated", send.name, target.name);
    Ok(CommandOutput::new(
        message.clone(),
        json!({
            "action": "track_send_set",
            "track_index": target.index,
            "track_name": target.name,
            "send_index": slot,
            "send_name": send.name,
            "volume": volume,
            "enabled": enabled,
            "message": message,
        }),
    ))
}
