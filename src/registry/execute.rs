use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::audit;
use crate::envelope::{wrap, WireResponse};
use crate::error::{panic_message, CommandError};
use crate::state::AppState;

use super::{CommandContext, CommandOutput};

/// Execute a command by name against the application state.
/// This is the single dispatch point for every surface (HTTP, CLI).
///
/// Failures without an operation name are tagged with `name`. Panics are
/// caught here and reported as `INTERNAL_ERROR`.
pub fn execute(state: &AppState, name: &str, raw: &Value) -> Result<CommandOutput, CommandError> {
    let started = Instant::now();
    let outcome = run(state, name, raw).map_err(|e| e.in_operation(name));

    match &outcome {
        Ok(_) => debug!(command = name, "command ok"),
        Err(e) => debug!(command = name, code = %e.code, message = %e.message, "command failed"),
    }

    if let Some(dir) = &state.audit_dir {
        audit::log_command_call(
            dir,
            name,
            raw,
            outcome.as_ref().map(|o| o.message.as_str()),
            started.elapsed(),
        );
    }

    outcome
}

/// [`execute`] wrapped into the wire envelope.
pub fn dispatch(state: &AppState, name: &str, raw: &Value) -> WireResponse {
    wrap(execute(state, name, raw).map(|output| output.data))
}

fn run(state: &AppState, name: &str, raw: &Value) -> Result<CommandOutput, CommandError> {
    let tool = state
        .registry
        .get(name)
        .ok_or_else(|| CommandError::invalid_parameter(format!("Unknown command: {name}")))?;
    let params = normalize_params(raw)?;

    let ctx = CommandContext {
        bindings: state.bindings(),
        device_catalog: &state.device_catalog,
        registry: &state.registry,
    };

    panic::catch_unwind(AssertUnwindSafe(|| tool.call(&ctx, &params))).unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        error!(command = name, panic = %message, "command handler panicked");
        Err(CommandError::internal(format!("Unexpected failure: {message}")))
    })
}

/// `null` and absent parameters mean `{}`. Anything other than an object is
/// rejected before the handler runs.
fn normalize_params(raw: &Value) -> Result<Value, CommandError> {
    match raw {
        Value::Null => Ok(Value::Object(Map::new())),
        Value::Object(_) => Ok(raw.clone()),
        other => Err(CommandError::invalid_parameter(format!(
            "Parameters must be a JSON object, got {}",
            json_type(other)
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing, clippy::panic)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::demo::demo_project;
    use crate::device_catalog::DeviceCatalog;
    use crate::envelope::Status;
    use crate::error::ErrorCode;
    use crate::registry::{CommandCategory, CommandInfo};
    use crate::studio::memory::MemoryStudio;

    fn state() -> AppState {
        AppState::new(
            Arc::new(MemoryStudio::new(demo_project())),
            Arc::new(DeviceCatalog::builtin().unwrap()),
        )
    }

    #[test]
    fn test_unknown_command_is_invalid_parameter() {
        let response = dispatch(&state(), "fly_to_moon", &Value::Null);
        let error = response.error().unwrap();
        assert_eq!(error.code, ErrorCode::InvalidParameter);
        assert_eq!(error.message, "Unknown command: fly_to_moon");
        assert_eq!(error.operation, "fly_to_moon");
    }

    #[test]
    fn test_null_params_mean_empty_object() {
        let response = dispatch(&state(), "status", &Value::Null);
        assert_eq!(response.status(), Status::Success);
    }

    #[test]
    fn test_non_object_params_rejected() {
        let err = execute(&state(), "status", &json!([1, 2])).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParameter);
        assert!(err.message.contains("array"));
    }

    #[test]
    fn test_no_param_command_rejects_extra_fields() {
        let err = execute(&state(), "transport_start", &json!({"now": true})).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidParameter);
        assert_eq!(err.operation, "transport_start");
    }

    #[test]
    fn test_panicking_handler_becomes_internal_error() {
        let mut state = state();
        state.registry.register_no_params(
            CommandInfo {
                name: "explode",
                description: "Panics.",
                category: CommandCategory::Status,
                mutates: false,
            },
            |_| panic!("config missing at /home/alice/.config/bridge/settings.json"),
        );
        let response = dispatch(&state, "explode", &Value::Null);
        let error = response.error().unwrap();
        assert_eq!(error.code, ErrorCode::InternalError);
        assert_eq!(error.operation, "explode");
        assert!(error.message.contains("<path>"));
        assert!(!error.message.contains("alice"));

        // The process and the registry survive.
        assert!(dispatch(&state, "status", &Value::Null).is_success());
    }

    #[test]
    fn test_audit_written_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let state = state().with_audit_dir(dir.path());
        execute(&state, "list_scenes", &Value::Null).unwrap();
        let count = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(count, 1);
    }
}
