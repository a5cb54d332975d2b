#![allow(clippy::needless_pass_by_value)]

//! `batch_operations`: several device operations fanned out over tracks in
//! one call. Each operation reports one row; inside it, each track reports
//! one row.

use serde_json::{json, Map, Value};

use super::device::write_parameters;
use crate::batch::{execute_batch, execute_batch_with, BatchItem, BatchMode, BatchReport};
use crate::error::{CommandError, ErrorCode};
use crate::registry::catalog::de;
use crate::registry::params::{
    BatchOperationsParams, Operation, PageParametersOnTracksArgs, ParametersOnTracksArgs,
    SwitchPageOnTracksArgs, TrackSpan,
};
use crate::registry::validation::{validate_page_index, validate_track_span};
use crate::registry::{CommandContext, CommandOutput};
use crate::resolver::{EntityRef, Selector};

pub const OPERATION_TYPES: &[&str] = &[
    "switch_device_page_on_tracks",
    "set_device_parameters_on_tracks",
    "set_device_page_parameters_on_tracks",
];

struct Step<'a> {
    position: usize,
    op: &'a Operation,
}

impl BatchItem for Step<'_> {
    fn identifier(&self) -> (&'static str, Value) {
        let id = format!("op_{}_{}", self.position, self.op.op_type);
        ("op_id", Value::from(id))
    }
}

struct TrackSlot(i64);

impl BatchItem for TrackSlot {
    fn identifier(&self) -> (&'static str, Value) {
        ("track_index", Value::from(self.0))
    }
}

pub fn batch_operations(
    ctx: &CommandContext<'_>,
    p: BatchOperationsParams,
) -> Result<CommandOutput, CommandError> {
    let steps: Vec<Step<'_>> = p
        .operations
        .iter()
        .enumerate()
        .map(|(position, op)| Step { position, op })
        .collect();

    let report = execute_batch_with(
        BatchMode::from_continue_flag(p.continue_on_error),
        || Ok(()),
        &steps,
        |_, step| run_operation(ctx, step.op),
    )?;

    let summary = report.summary();
    Ok(CommandOutput::new(
        summary.clone(),
        json!({
            "executed": report.succeeded + report.failed,
            "results": report.results,
            "succeeded": report.succeeded,
            "failed": report.failed,
            "skipped": report.skipped,
            "message": summary,
        }),
    ))
}

fn run_operation(
    ctx: &CommandContext<'_>,
    op: &Operation,
) -> Result<Map<String, Value>, CommandError> {
    let name = op.op_type.as_str();
    let mut row = match name {
        "switch_device_page_on_tracks" => {
            let args: SwitchPageOnTracksArgs = de(name, &op.args)?;
            let mut row = on_tracks(ctx, &args.span(), args.device_position, |track, device| {
                switch_page(ctx, track, device, args.page_index)
            })?;
            row.insert("action".into(), json!("device_page_switched_on_tracks"));
            row.insert("page_index".into(), json!(args.page_index));
            row
        }
        "set_device_parameters_on_tracks" => {
            let args: ParametersOnTracksArgs = de(name, &op.args)?;
            require_parameters(name, args.parameters.is_empty())?;
            let mut row = on_tracks(ctx, &args.span(), args.device_position, |track, device| {
                let writes = write_parameters(ctx, track, device, &args.parameters)?;
                Ok(writes_row(&writes))
            })?;
            row.insert("action".into(), json!("device_parameters_set_on_tracks"));
            row
        }
        "set_device_page_parameters_on_tracks" => {
            let args: PageParametersOnTracksArgs = de(name, &op.args)?;
            require_parameters(name, args.parameters.is_empty())?;
            let mut row = on_tracks(ctx, &args.span(), args.device_position, |track, device| {
                let mut row = switch_page(ctx, track, device, args.page_index)?;
                let writes = write_parameters(ctx, track, device, &args.parameters)?;
                row.extend(writes_row(&writes));
                Ok(row)
            })?;
            row.insert("action".into(), json!("device_page_parameters_set_on_tracks"));
            row.insert("page_index".into(), json!(args.page_index));
            row
        }
        other => {
            return Err(CommandError::invalid_parameter(format!(
                "Unsupported operation type '{other}'. Supported: {}",
                OPERATION_TYPES.join(", ")
            )))
        }
    };
    row.insert("type".into(), json!(name));
    Ok(row)
}

fn require_parameters(operation: &str, empty: bool) -> Result<(), CommandError> {
    if empty {
        return Err(CommandError::new(
            ErrorCode::MissingRequiredParameter,
            format!("{operation} needs a non-empty 'parameters' array"),
        ));
    }
    Ok(())
}

/// Run `per_device` on the device at `device_position` of every track in
/// `span`. A missing track or device fails only that track's row.
fn on_tracks<F>(
    ctx: &CommandContext<'_>,
    span: &TrackSpan,
    device_position: usize,
    mut per_device: F,
) -> Result<Map<String, Value>, CommandError>
where
    F: FnMut(&EntityRef, &EntityRef) -> Result<Map<String, Value>, CommandError>,
{
    let slots: Vec<TrackSlot> = validate_track_span(span)?.into_iter().map(TrackSlot).collect();
    let report = execute_batch(
        || Ok(()),
        &slots,
        |_, slot| {
            let (track, device) = device_at(ctx, slot.0, device_position)?;
            let mut row = per_device(&track, &device)?;
            row.insert("device_name".into(), json!(device.name));
            Ok(row)
        },
    )?;

    let mut row = Map::new();
    row.insert("device_position".into(), json!(device_position));
    row.insert("tracks".into(), json!(report.results));
    row.insert("succeeded".into(), json!(report.succeeded));
    row.insert("failed".into(), json!(report.failed));
    Ok(row)
}

fn device_at(
    ctx: &CommandContext<'_>,
    track_index: i64,
    device_position: usize,
) -> Result<(EntityRef, EntityRef), CommandError> {
    let bindings = &ctx.bindings;
    let index = usize::try_from(track_index).map_err(|_| {
        CommandError::new(ErrorCode::TrackNotFound, format!("No track at index {track_index}"))
    })?;
    let track = bindings.tracks.resolve(&Selector::by_index(index))?;
    let device = bindings
        .devices
        .resolve_on_track(&track, &Selector::by_index(device_position))?;
    Ok((track, device))
}

fn switch_page(
    ctx: &CommandContext<'_>,
    track: &EntityRef,
    device: &EntityRef,
    page_index: i64,
) -> Result<Map<String, Value>, CommandError> {
    let devices = &ctx.bindings.devices;
    let total = devices.remote_controls(track, device)?.page_names.len();
    let page = validate_page_index(page_index, total)?;
    devices.select_page(track, device, page)?;
    let mut row = Map::new();
    row.insert("current_page_index".into(), json!(page));
    Ok(row)
}

fn writes_row(writes: &BatchReport) -> Map<String, Value> {
    let mut row = Map::new();
    row.insert("parameters".into(), json!(writes.results));
    row.insert("parameters_succeeded".into(), json!(writes.succeeded));
    row.insert("parameters_failed".into(), json!(writes.failed));
    row
}
