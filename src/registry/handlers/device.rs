#![allow(clippy::needless_pass_by_value)]

use serde_json::{json, Map, Value};
use tracing::warn;

use crate::batch::{execute_batch, BatchReport};
use crate::error::CommandError;
use crate::registry::params::{
    DevicePageParams, DeviceTargetParams, ParameterSetting, SetAllDevicePagesParametersParams,
    SetDeviceParametersParams, SetSelectedDeviceParameterParams,
    SetSelectedDeviceParametersParams, SwitchDevicePageParams, TrackTargetParams,
};
use crate::registry::validation::{validate_normalized, validate_page_index, validate_parameter_index};
use crate::registry::{CommandContext, CommandOutput};
use crate::resolver::EntityRef;
use crate::studio::RemoteControl;

fn control_json(c: &RemoteControl) -> Value {
    json!({
        "index": c.index,
        "name": c.name,
        "value": c.value,
        "display_value": c.display_value,
    })
}

pub fn list_devices_on_track(
    ctx: &CommandContext<'_>,
    p: TrackTargetParams,
) -> Result<CommandOutput, CommandError> {
    let bindings = &ctx.bindings;
    let track = bindings.tracks.resolve(&p.selector())?;

    let mut devices = Vec::new();
    for device in bindings.devices.list(&track)? {
        let entity = EntityRef::new(device.index, device.name.clone());
        devices.push(json!({
            "index": device.index,
            "name": device.name,
            "type": device.device_type,
            "is_bypassed": device.bypassed,
            "is_selected": bindings.devices.is_selected(&track, &entity),
        }));
    }

    Ok(CommandOutput::new(
        format!("{} devices on '{}'", devices.len(), track.name),
        json!({
            "track_index": track.index,
            "track_name": track.name,
            "devices": devices,
        }),
    ))
}

pub fn get_device_details(
    ctx: &CommandContext<'_>,
    p: DeviceTargetParams,
) -> Result<CommandOutput, CommandError> {
    let bindings = &ctx.bindings;
    let (track, device) = bindings.devices.resolve(&p.selector())?;
    let state = bindings.devices.details(&track, &device)?;
    let page = bindings.devices.remote_controls(&track, &device)?;

    let data = json!({
        "track_index": track.index,
        "track_name": track.name,
        "index": state.index,
        "name": state.name,
        "type": state.device_type,
        "is_bypassed": state.bypassed,
        "is_selected": bindings.devices.is_selected(&track, &device),
        "remote_controls": page.controls.iter().map(control_json).collect::<Vec<_>>(),
        "page_names": page.page_names,
        "current_page_index": page.page_index,
        "total_pages": page.page_names.len(),
    });
    Ok(CommandOutput::new(format!("Device: {}", state.name), data))
}

pub fn get_selected_device_parameters(
    ctx: &CommandContext<'_>,
) -> Result<CommandOutput, CommandError> {
    let bindings = &ctx.bindings;
    let (track, device) = bindings.devices.selected()?;
    let page = bindings.devices.remote_controls(&track, &device)?;

    Ok(CommandOutput::new(
        format!("{} parameters on '{}'", page.controls.len(), device.name),
        json!({
            "device_name": device.name,
            "track_name": track.name,
            "parameters": page.controls.iter().map(control_json).collect::<Vec<_>>(),
        }),
    ))
}

pub fn set_selected_device_parameter(
    ctx: &CommandContext<'_>,
    p: SetSelectedDeviceParameterParams,
) -> Result<CommandOutput, CommandError> {
    let bindings = &ctx.bindings;
    let (track, device) = bindings.devices.selected()?;
    let count = bindings.devices.remote_controls(&track, &device)?.controls.len();
    let index = validate_parameter_index(p.parameter_index, count)?;
    validate_normalized(p.value, "value")?;
    bindings.devices.set_parameter(&track, &device, index, p.value)?;

    let message = format!(
        "Parameter {} of '{}' set to {}",
        p.parameter_index, device.name, p.value
    );
    Ok(CommandOutput::new(
        message.clone(),
        json!({
            "action": "parameter_set",
            "device_name": device.name,
            "parameter_index": p.parameter_index,
            "new_value": p.value,
            "message": message,
        }),
    ))
}

pub fn set_selected_device_parameters(
    ctx: &CommandContext<'_>,
    p: SetSelectedDeviceParametersParams,
) -> Result<CommandOutput, CommandError> {
    let bindings = &ctx.bindings;
    let report = execute_batch(
        || {
            let (track, device) = bindings.devices.selected()?;
            let count = bindings.devices.remote_controls(&track, &device)?.controls.len();
            Ok((track, device, count))
        },
        &p.parameters,
        |target, item| write_parameter(ctx, target, item),
    )?;
    Ok(batch_output(&report))
}

pub fn set_device_parameters(
    ctx: &CommandContext<'_>,
    p: SetDeviceParametersParams,
) -> Result<CommandOutput, CommandError> {
    let bindings = &ctx.bindings;
    let report = execute_batch(
        || {
            let (track, device) = bindings.devices.resolve(&p.selector())?;
            let count = bindings.devices.remote_controls(&track, &device)?.controls.len();
            Ok((track, device, count))
        },
        &p.parameters,
        |target, item| write_parameter(ctx, target, item),
    )?;
    Ok(batch_output(&report))
}

/// Write `parameters` to the mapped page of one device, one result per write.
pub(super) fn write_parameters(
    ctx: &CommandContext<'_>,
    track: &EntityRef,
    device: &EntityRef,
    parameters: &[ParameterSetting],
) -> Result<BatchReport, CommandError> {
    execute_batch(
        || {
            let count = ctx.bindings.devices.remote_controls(track, device)?.controls.len();
            Ok((track.clone(), device.clone(), count))
        },
        parameters,
        |target, item| write_parameter(ctx, target, item),
    )
}

fn write_parameter(
    ctx: &CommandContext<'_>,
    (track, device, count): &(EntityRef, EntityRef, usize),
    item: &ParameterSetting,
) -> Result<Map<String, Value>, CommandError> {
    let index = validate_parameter_index(item.index, *count)?;
    validate_normalized(item.value, "value")?;
    ctx.bindings
        .devices
        .set_parameter(track, device, index, item.value)?;
    let mut row = Map::new();
    row.insert("new_value".into(), json!(item.value));
    Ok(row)
}

fn batch_output(report: &BatchReport) -> CommandOutput {
    let summary = report.summary();
    CommandOutput::new(
        summary.clone(),
        json!({
            "results": report.results,
            "succeeded": report.succeeded,
            "failed": report.failed,
            "message": summary,
        }),
    )
}

pub fn switch_device_page(
    ctx: &CommandContext<'_>,
    p: SwitchDevicePageParams,
) -> Result<CommandOutput, CommandError> {
    let bindings = &ctx.bindings;
    let (track, device) = bindings.devices.resolve(&p.selector())?;
    let total = bindings.devices.remote_controls(&track, &device)?.page_names.len();
    let page = validate_page_index(p.page_index, total)?;
    bindings.devices.select_page(&track, &device, page)?;

    let message = format!("Switched to page {} of {}", page + 1, total);
    Ok(CommandOutput::new(
        message.clone(),
        json!({
            "action": "page_switched",
            "track_index": track.index,
            "device_index": device.index,
            "device_name": device.name,
            "current_page_index": page,
            "total_pages": total,
            "message": message,
        }),
    ))
}

// ── Remote-control pages ────────────────────────────────────────

pub fn get_device_page_names(
    ctx: &CommandContext<'_>,
    p: DeviceTargetParams,
) -> Result<CommandOutput, CommandError> {
    let bindings = &ctx.bindings;
    let (track, device) = bindings.devices.resolve(&p.selector())?;
    let page = bindings.devices.remote_controls(&track, &device)?;

    Ok(CommandOutput::new(
        format!("{} pages on '{}'", page.page_names.len(), device.name),
        json!({
            "track_index": track.index,
            "device_index": device.index,
            "device_name": device.name,
            "page_count": page.page_names.len(),
            "pages": page.page_names,
            "current_page_index": page.page_index,
        }),
    ))
}

/// Read one page of a device. With `page_index` the device switches to that
/// page first, as the host would when the page is shown.
pub fn get_device_page_parameters(
    ctx: &CommandContext<'_>,
    p: DevicePageParams,
) -> Result<CommandOutput, CommandError> {
    let bindings = &ctx.bindings;
    let (track, device) = bindings.devices.resolve(&p.selector())?;
    if let Some(requested) = p.page_index {
        let total = bindings.devices.remote_controls(&track, &device)?.page_names.len();
        let index = validate_page_index(requested, total)?;
        bindings.devices.select_page(&track, &device, index)?;
    }
    let page = bindings.devices.remote_controls(&track, &device)?;
    let page_name = page.page_names.get(page.page_index).cloned();

    Ok(CommandOutput::new(
        format!(
            "{} parameters on page {} of '{}'",
            page.controls.len(),
            page.page_index,
            device.name
        ),
        json!({
            "track_index": track.index,
            "device_index": device.index,
            "device_name": device.name,
            "page_index": page.page_index,
            "page_name": page_name,
            "parameter_count": page.controls.len(),
            "parameters": page.controls.iter().map(control_json).collect::<Vec<_>>(),
        }),
    ))
}

/// Every page of a device with its controls. The mapped page is unchanged.
pub fn get_all_device_pages_parameters(
    ctx: &CommandContext<'_>,
    p: DeviceTargetParams,
) -> Result<CommandOutput, CommandError> {
    let bindings = &ctx.bindings;
    let (track, device) = bindings.devices.resolve(&p.selector())?;
    let names = bindings.devices.remote_controls(&track, &device)?.page_names;

    let mut pages = Vec::with_capacity(names.len());
    for (index, name) in names.iter().enumerate() {
        let page = bindings.devices.page(&track, &device, index)?;
        pages.push(json!({
            "page_index": index,
            "page_name": name,
            "parameters": page.controls.iter().map(control_json).collect::<Vec<_>>(),
        }));
    }

    Ok(CommandOutput::new(
        format!("{} pages on '{}'", pages.len(), device.name),
        json!({
            "track_index": track.index,
            "device_index": device.index,
            "device": device.name,
            "page_count": pages.len(),
            "pages": pages,
        }),
    ))
}

/// Write several pages of one device. Each page switches the device to it,
/// then writes its parameters as a nested batch. The page that was mapped
/// before the call is mapped again afterwards.
pub fn set_all_device_pages_parameters(
    ctx: &CommandContext<'_>,
    p: SetAllDevicePagesParametersParams,
) -> Result<CommandOutput, CommandError> {
    let bindings = &ctx.bindings;
    let (track, device) = bindings.devices.resolve(&p.selector())?;
    let mapped = bindings.devices.remote_controls(&track, &device)?;

    let report = execute_batch(
        || Ok(&mapped.page_names),
        &p.pages,
        |names, item| {
            let index = validate_page_index(item.page_index, names.len())?;
            let actual = names.get(index).cloned().unwrap_or_default();
            if let Some(expected) = &item.page_name {
                if *expected != actual {
                    return Err(CommandError::invalid_parameter(format!(
                        "Page {index} is named '{actual}', not '{expected}'"
                    )));
                }
            }
            bindings.devices.select_page(&track, &device, index)?;
            let writes = write_parameters(ctx, &track, &device, &item.parameters)?;

            let mut row = Map::new();
            row.insert("page_name".into(), json!(actual));
            row.insert("parameters".into(), json!(writes.results));
            row.insert("succeeded".into(), json!(writes.succeeded));
            row.insert("failed".into(), json!(writes.failed));
            Ok(row)
        },
    )?;

    if let Err(e) = bindings.devices.select_page(&track, &device, mapped.page_index) {
        warn!(device = %device.name, error = %e.message, "could not restore the mapped page");
    }

    let summary = report.summary();
    Ok(CommandOutput::new(
        summary.clone(),
        json!({
            "track_index": track.index,
            "device_index": device.index,
            "device": device.name,
            "pages_updated": report.succeeded,
            "results": report.results,
            "succeeded": report.succeeded,
            "failed": report.failed,
            "message": summary,
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

    fn value_of(studio: &MemoryStudio, track: usize, device: usize, index: usize) -> f64 {
        let project = studio.snapshot();
        let d = &project.tracks[track].devices[device];
        d.pages[d.page_index].parameters[index].value
    }

    #[test]
    fn test_list_devices_marks_selection() {
        let (_, state) = setup();
        let out = execute(&state, "list_devices_on_track", &json!({})).unwrap();
        assert_eq!(out.data["track_name"], "Drums");
        let devices = out.data["devices"].as_array().unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0]["is_selected"], true);
        assert_eq!(devices[1]["type"], "AudioFX");
    }

    #[test]
    fn test_device_details_by_identifiers() {
        let (_, state) = setup();
        let out = execute(
            &state,
            "get_device_details",
            &json!({"track_name": "Keys", "device_name": "FM-4"}),
        )
        .unwrap();
        assert_eq!(out.data["name"], "FM-4");
        assert_eq!(out.data["is_selected"], false);
        assert_eq!(out.data["total_pages"], 2);
        assert_eq!(out.data["remote_controls"].as_array().unwrap().len(), 8);
        assert_eq!(out.data["remote_controls"][0]["display_value"], "50.0 %");
    }

    #[test]
    fn test_device_details_incomplete_identifiers() {
        let (_, state) = setup();
        let err = execute(&state, "get_device_details", &json!({"track_name": "Keys"})).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParameter);

        let err = execute(
            &state,
            "get_device_details",
            &json!({"track_name": "Keys", "device_name": "Nope"}),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::DeviceNotFound);
    }

    #[test]
    fn test_selected_parameters_and_single_write() {
        let (studio, state) = setup();
        let out = execute(&state, "get_selected_device_parameters", &Value::Null).unwrap();
        assert_eq!(out.data["device_name"], "Drum Machine");
        assert_eq!(out.data["parameters"][0]["name"], "Shape");

        let out = execute(
            &state,
            "set_selected_device_parameter",
            &json!({"parameter_index": 2, "value": 0.9}),
        )
        .unwrap();
        assert_eq!(out.data["new_value"], 0.9);
        assert!((value_of(&studio, 2, 0, 2) - 0.9).abs() < f64::EPSILON);

        let err = execute(
            &state,
            "set_selected_device_parameter",
            &json!({"parameter_index": 8, "value": 0.1}),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParameterIndex);
    }

    #[test]
    fn test_no_selected_device() {
        let (studio, state) = setup();
        studio.select(Some(2), None, None);
        let err = execute(&state, "get_selected_device_parameters", &Value::Null).unwrap_err();
        assert_eq!(err.code, ErrorCode::DeviceNotSelected);
        assert_eq!(err.operation, "get_selected_device_parameters");
    }

    #[test]
    fn test_batch_partial_success() {
        let (studio, state) = setup();
        let out = execute(
            &state,
            "set_selected_device_parameters",
            &json!({"parameters": [
                {"index": 0, "value": 0.2},
                {"index": 99, "value": 0.3},
                {"parameter_index": 1, "value": 1.7},
                {"index": 3, "value": 1.0}
            ]}),
        )
        .unwrap();
        let data = out.data;
        assert_eq!(data["succeeded"], 2);
        assert_eq!(data["failed"], 2);
        assert_eq!(data["message"], "Batch operation completed: 2 succeeded, 2 failed");

        let results = data["results"].as_array().unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(results[0]["status"], "success");
        assert_eq!(results[0]["new_value"], 0.2);
        assert_eq!(results[1]["index"], 99);
        assert_eq!(results[1]["error_code"], "INVALID_PARAMETER_INDEX");
        assert_eq!(results[2]["error_code"], "INVALID_RANGE");
        assert!((value_of(&studio, 2, 0, 3) - 1.0).abs() < f64::EPSILON);
        assert!((value_of(&studio, 2, 0, 1) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_batch_negative_index_fails_only_that_item() {
        let (studio, state) = setup();
        let out = execute(
            &state,
            "set_selected_device_parameters",
            &json!({"parameters": [
                {"index": 0, "value": 0.2},
                {"index": -1, "value": 0.5}
            ]}),
        )
        .unwrap();
        let results = out.data["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["status"], "success");
        assert_eq!(results[1]["index"], -1);
        assert_eq!(results[1]["error_code"], "INVALID_PARAMETER_INDEX");
        assert!((value_of(&studio, 2, 0, 0) - 0.2).abs() < f64::EPSILON);

        let err = execute(
            &state,
            "set_selected_device_parameter",
            &json!({"parameter_index": -3, "value": 0.1}),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParameterIndex);
    }

    #[test]
    fn test_batch_precondition_failure_fails_whole_command() {
        let (studio, state) = setup();
        studio.select(None, None, None);
        let err = execute(
            &state,
            "set_selected_device_parameters",
            &json!({"parameters": [{"index": 0, "value": 0.2}]}),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::DeviceNotSelected);
    }

    #[test]
    fn test_batch_on_addressed_device() {
        let (studio, state) = setup();
        let out = execute(
            &state,
            "set_device_parameters",
            &json!({
                "track_index": 1,
                "device_name": "Reverb",
                "parameters": [{"index": 7, "value": 0.25}]
            }),
        )
        .unwrap();
        assert_eq!(out.data["succeeded"], 1);
        assert!((value_of(&studio, 1, 1, 7) - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_batch() {
        let (_, state) = setup();
        let out = execute(&state, "set_selected_device_parameters", &json!({"parameters": []}))
            .unwrap();
        assert_eq!(out.data["succeeded"], 0);
        assert_eq!(out.data["failed"], 0);
    }

    #[test]
    fn test_page_names() {
        let (_, state) = setup();
        let out = execute(
            &state,
            "get_device_page_names",
            &json!({"track_name": "Keys", "device_index": 0}),
        )
        .unwrap();
        assert_eq!(out.data["page_count"], 2);
        assert_eq!(out.data["pages"].as_array().unwrap().len(), 2);
        assert_eq!(out.data["current_page_index"], 0);
    }

    #[test]
    fn test_page_parameters_switches_when_asked() {
        let (studio, state) = setup();
        let out = execute(&state, "get_device_page_parameters", &json!({})).unwrap();
        assert_eq!(out.data["page_index"], 0);
        assert_eq!(out.data["parameter_count"], 8);
        assert_eq!(studio.snapshot().tracks[2].devices[0].page_index, 0);

        let out = execute(&state, "get_device_page_parameters", &json!({"page_index": 1})).unwrap();
        assert_eq!(out.data["page_index"], 1);
        assert_eq!(studio.snapshot().tracks[2].devices[0].page_index, 1);

        let err = execute(&state, "get_device_page_parameters", &json!({"page_index": -1}))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::IndexOutOfBounds);
    }

    #[test]
    fn test_all_pages_read_without_switching() {
        let (studio, state) = setup();
        let out = execute(
            &state,
            "get_all_device_pages_parameters",
            &json!({"track_index": 1, "device_name": "FM-4"}),
        )
        .unwrap();
        assert_eq!(out.data["device"], "FM-4");
        assert_eq!(out.data["page_count"], 2);
        let pages = out.data["pages"].as_array().unwrap();
        assert_eq!(pages[1]["page_index"], 1);
        assert_eq!(pages[1]["parameters"].as_array().unwrap().len(), 8);
        assert_eq!(studio.snapshot().tracks[1].devices[0].page_index, 0);
    }

    #[test]
    fn test_set_all_pages_reports_per_page() {
        let (studio, state) = setup();
        let out = execute(
            &state,
            "set_all_device_pages_parameters",
            &json!({
                "track_index": 1,
                "device_index": 0,
                "pages": [
                    {"page_index": 1, "page_name": "Filter", "parameters": [
                        {"index": 2, "value": 0.9},
                        {"index": 42, "value": 0.1}
                    ]},
                    {"page_index": 5, "parameters": [{"index": 0, "value": 0.3}]},
                    {"page_index": 0, "page_name": "Not A Page", "parameters": []}
                ]
            }),
        )
        .unwrap();
        let data = out.data;
        assert_eq!(data["pages_updated"], 1);
        assert_eq!(data["failed"], 2);
        let results = data["results"].as_array().unwrap();
        assert_eq!(results[0]["status"], "success");
        assert_eq!(results[0]["succeeded"], 1);
        assert_eq!(results[0]["parameters"][1]["error_code"], "INVALID_PARAMETER_INDEX");
        assert_eq!(results[1]["page_index"], 5);
        assert_eq!(results[1]["error_code"], "INDEX_OUT_OF_BOUNDS");
        assert_eq!(results[2]["error_code"], "INVALID_PARAMETER");

        let project = studio.snapshot();
        let fm = &project.tracks[1].devices[0];
        assert!((fm.pages[1].parameters[2].value - 0.9).abs() < f64::EPSILON);
        assert_eq!(fm.page_index, 0);
    }

    #[test]
    fn test_switch_page() {
        let (studio, state) = setup();
        let out = execute(&state, "switch_device_page", &json!({"page_index": 1})).unwrap();
        assert_eq!(out.data["action"], "page_switched");
        assert_eq!(out.data["message"], "Switched to page 2 of 2");
        assert_eq!(studio.snapshot().tracks[2].devices[0].page_index, 1);

        let err = execute(&state, "switch_device_page", &json!({"page_index": 2})).unwrap_err();
        assert_eq!(err.code, ErrorCode::IndexOutOfBounds);
    }
}
