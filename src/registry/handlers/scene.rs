#![allow(clippy::needless_pass_by_value)]

use serde_json::{json, Value};

use crate::error::CommandError;
use crate::registry::params::{ClipSlotTargetParams, SceneTargetParams};
use crate::registry::{CommandContext, CommandOutput};
use crate::resolver::EntityRef;
use crate::studio::ClipSlot;

fn slot_json(slot: &ClipSlot) -> Value {
    json!({
        "track_index": slot.track_index,
        "track_name": slot.track_name,
        "has_content": slot.has_content,
        "clip_name": slot.clip_name,
        "is_playing": slot.is_playing,
        "is_recording": slot.is_recording,
        "is_playback_queued": slot.is_queued,
    })
}

pub fn list_scenes(ctx: &CommandContext<'_>) -> Result<CommandOutput, CommandError> {
    let scenes = &ctx.bindings.scenes;
    let mut rows = Vec::new();
    for scene in scenes.list()? {
        let entity = EntityRef::new(scene.index, scene.name.clone());
        let clip_count = scenes.clips(&entity)?.iter().filter(|s| s.has_content).count();
        rows.push(json!({
            "index": scene.index,
            "name": scene.name,
            "color": scene.color.css(),
            "clip_count": clip_count,
        }));
    }
    Ok(CommandOutput::new(
        format!("{} scenes", rows.len()),
        Value::Array(rows),
    ))
}

pub fn get_clips_in_scene(
    ctx: &CommandContext<'_>,
    p: SceneTargetParams,
) -> Result<CommandOutput, CommandError> {
    let scenes = &ctx.bindings.scenes;
    let scene = scenes.resolve(&p.selector())?;
    let clips: Vec<Value> = scenes.clips(&scene)?.iter().map(slot_json).collect();
    Ok(CommandOutput::new(
        format!("{} slots in scene '{}'", clips.len(), scene.name),
        json!({
            "scene_index": scene.index,
            "scene_name": scene.name,
            "clips": clips,
        }),
    ))
}

pub fn launch_scene(
    ctx: &CommandContext<'_>,
    p: SceneTargetParams,
) -> Result<CommandOutput, CommandError> {
    let scenes = &ctx.bindings.scenes;
    let scene = scenes.resolve(&p.selector())?;
    scenes.launch(&scene)?;
    let message = format!("Scene '{}' launched", scene.name);
    Ok(CommandOutput::new(
        message.clone(),
        json!({
            "action": "scene_launched",
            "scene_index": scene.index,
            "scene_name": scene.name,
            "message": message,
        }),
    ))
}

pub fn launch_clip(
    ctx: &CommandContext<'_>,
    p: ClipSlotTargetParams,
) -> Result<CommandOutput, CommandError> {
    let scenes = &ctx.bindings.scenes;
    let (track, scene) = scenes.resolve_slot(&p.selector())?;
    let slot = scenes.launch_clip(&track, &scene)?;
    let message = format!(
        "Clip '{}' launched on track '{}'",
        slot.clip_name.as_deref().unwrap_or_default(),
        track.name
    );
    Ok(CommandOutput::new(
        message.clone(),
        json!({
            "action": "clip_launched",
            "track_index": track.index,
            "track_name": track.name,
            "scene_index": scene.index,
            "scene_name": scene.name,
            "clip_name": slot.clip_name,
            "message": message,
        }),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Value};

    use crate::demo::demo_project;
    use crate::device_catalog::DeviceCatalog;
    use crate::error::ErrorCode;
    use crate::registry::execute::execute;
    use crate::state::AppState;
    use crate::studio::memory::MemoryStudio;

    fn setup() -> (Arc<MemoryStudio>, AppState) {
        let studio = Arc::new(MemoryStudio::new(demo_project()));
        let state = AppState::new(studio.clone(), Arc::new(DeviceCatalog::default()));
        (studio, state)
    }

    #[test]
    fn test_list_scenes_counts_clips() {
        let (_, state) = setup();
        let out = execute(&state, "list_scenes", &Value::Null).unwrap();
        let scenes = out.data.as_array().unwrap();
        assert_eq!(scenes.len(), 3);
        assert_eq!(scenes[0]["name"], "Intro");
        assert_eq!(scenes[0]["clip_count"], 2);
        assert_eq!(scenes[1]["clip_count"], 4);
    }

    #[test]
    fn test_clips_in_scene() {
        let (_, state) = setup();
        let out = execute(&state, "get_clips_in_scene", &json!({"scene_name": "Verse"})).unwrap();
        let clips = out.data["clips"].as_array().unwrap();
        assert_eq!(clips.len(), 5);
        assert_eq!(clips[1]["clip_name"], "Keys Verse");
        assert_eq!(clips[4]["has_content"], false);
    }

    #[test]
    fn test_scene_defaults_to_selection() {
        let (studio, state) = setup();
        let err = execute(&state, "get_clips_in_scene", &json!({})).unwrap_err();
        assert_eq!(err.code, ErrorCode::SceneNotSelected);

        studio.select(Some(2), Some(0), Some(2));
        let out = execute(&state, "get_clips_in_scene", &json!({})).unwrap();
        assert_eq!(out.data["scene_name"], "Chorus");
    }

    #[test]
    fn test_launch_scene() {
        let (studio, state) = setup();
        execute(&state, "launch_scene", &json!({"scene_index": 1})).unwrap();
        let project = studio.snapshot();
        assert!(project.transport.playing);
        assert!(project.tracks[0].clips[1].as_ref().unwrap().playing);

        let err = execute(&state, "launch_scene", &json!({"scene_index": 9})).unwrap_err();
        assert_eq!(err.code, ErrorCode::SceneNotFound);
    }

    #[test]
    fn test_launch_clip() {
        let (studio, state) = setup();
        let out = execute(
            &state,
            "launch_clip",
            &json!({"track_name": "Drums", "scene_name": "Chorus"}),
        )
        .unwrap();
        assert_eq!(out.data["clip_name"], "Beat B Fill");
        assert!(studio.snapshot().tracks[2].clips[2].as_ref().unwrap().playing);

        let err = execute(
            &state,
            "launch_clip",
            &json!({"track_name": "Keys", "scene_index": 0}),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ClipNotFound);
        assert_eq!(err.operation, "launch_clip");
    }

    #[test]
    fn test_launch_clip_reports_which_selection_is_missing() {
        let (studio, state) = setup();
        studio.select(None, None, Some(1));
        let err = execute(&state, "launch_clip", &json!({})).unwrap_err();
        assert_eq!(err.code, ErrorCode::TrackNotSelected);
        assert_eq!(err.message, "No track is currently selected");

        studio.select(Some(2), Some(0), None);
        let err = execute(&state, "launch_clip", &json!({})).unwrap_err();
        assert_eq!(err.code, ErrorCode::SceneNotSelected);

        studio.select(Some(2), None, Some(2));
        let out = execute(&state, "launch_clip", &json!({})).unwrap();
        assert_eq!(out.data["clip_name"], "Beat B Fill");
    }
}
