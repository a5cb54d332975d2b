pub mod catalog;
pub mod execute;
pub mod handlers;
pub mod params;
pub mod validation;

use std::sync::Arc;

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::bindings::Bindings;
use crate::device_catalog::DeviceCatalog;
use crate::error::CommandError;

// ── Param types ─────────────────────────────────────────────────
use params::{
    BatchOperationsParams, CategoryParams, ClipSlotTargetParams, DevicePageParams,
    DeviceTargetParams, HelpParams, ListTracksParams, SceneTargetParams,
    SetAllDevicePagesParametersParams, SetDeviceParametersParams, SetPlaybackPositionParams,
    SetSelectedDeviceParameterParams, SetSelectedDeviceParametersParams,
    SetTrackPropertiesParams, SetTrackSendParams, SwitchDevicePageParams, TrackTargetParams,
};

// ── Handler modules (dispatch targets) ──────────────────────────
use handlers::{device, library, operations, query, scene, status, track, transport};

// ── Command metadata ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandCategory {
    Status,
    Transport,
    Track,
    Device,
    Scene,
    Catalog,
    Help,
}

impl CommandCategory {
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Transport => "transport",
            Self::Track => "track",
            Self::Device => "device",
            Self::Scene => "scene",
            Self::Catalog => "catalog",
            Self::Help => "help",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Status => "Project, transport and selection overview",
            Self::Transport => "Start, stop and move the playhead",
            Self::Track => "List, inspect and mix tracks",
            Self::Device => "Inspect devices and set remote-control parameters",
            Self::Scene => "List scenes, inspect and launch clips",
            Self::Catalog => "Vendor device identifiers by category",
            Self::Help => "Command discovery",
        }
    }

    pub fn all() -> &'static [CommandCategory] {
        &[
            Self::Status,
            Self::Transport,
            Self::Track,
            Self::Device,
            Self::Scene,
            Self::Catalog,
            Self::Help,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub category: CommandCategory,
    /// Changes studio state when it succeeds.
    pub mutates: bool,
}

// ── Command output ──────────────────────────────────────────────

/// What a handler produces. `message` serves the CLI and the audit log,
/// `data` becomes the envelope's `data`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandOutput {
    pub message: String,
    pub data: Value,
}

impl CommandOutput {
    pub fn new(message: impl Into<String>, data: Value) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }

    /// Message-only output: data is `{"message": ...}`.
    pub fn unit(message: impl Into<String>) -> Self {
        let message = message.into();
        let data = serde_json::json!({ "message": message });
        Self { message, data }
    }

    pub fn json<T: Serialize>(message: impl Into<String>, data: &T) -> Result<Self, CommandError> {
        let data = serde_json::to_value(data)
            .map_err(|e| CommandError::internal(format!("Failed to serialize result: {e}")))?;
        Ok(Self::new(message, data))
    }
}

// ── Handler context ─────────────────────────────────────────────

/// Everything a handler may touch. Built per request from `AppState`.
pub struct CommandContext<'a> {
    pub bindings: Arc<Bindings>,
    pub device_catalog: &'a DeviceCatalog,
    pub registry: &'a ToolRegistry,
}

// ── Tool registry ───────────────────────────────────────────────

type Handler =
    Box<dyn Fn(&CommandContext<'_>, &Value) -> Result<CommandOutput, CommandError> + Send + Sync>;

/// A registered tool: metadata, parameter contract and the handler.
pub struct ToolSpec {
    pub info: CommandInfo,
    pub param_schema: Value,
    handler: Handler,
}

impl ToolSpec {
    pub(crate) fn call(
        &self,
        ctx: &CommandContext<'_>,
        params: &Value,
    ) -> Result<CommandOutput, CommandError> {
        (self.handler)(ctx, params)
    }
}

/// Parameter contract for commands that take none.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NoParams {}

/// Command name → tool, in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: IndexMap<&'static str, ToolSpec>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in command.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        register_builtin(&mut registry);
        registry
    }

    /// Register a command whose parameters deserialize into `P`. Decoding
    /// failures become `INVALID_PARAMETER` before `handler` runs.
    pub fn register<P, F>(&mut self, info: CommandInfo, handler: F)
    where
        P: DeserializeOwned + JsonSchema + 'static,
        F: Fn(&CommandContext<'_>, P) -> Result<CommandOutput, CommandError> + Send + Sync + 'static,
    {
        let name = info.name;
        let spec = ToolSpec {
            info,
            param_schema: catalog::schema_value::<P>(),
            handler: Box::new(move |ctx: &CommandContext<'_>, raw: &Value| {
                let params = catalog::de::<P>(name, raw)?;
                handler(ctx, params)
            }),
        };
        self.insert(spec);
    }

    pub fn register_no_params<F>(&mut self, info: CommandInfo, handler: F)
    where
        F: Fn(&CommandContext<'_>) -> Result<CommandOutput, CommandError> + Send + Sync + 'static,
    {
        let name = info.name;
        let spec = ToolSpec {
            info,
            param_schema: catalog::empty_object_schema(),
            handler: Box::new(move |ctx: &CommandContext<'_>, raw: &Value| {
                catalog::de::<NoParams>(name, raw)?;
                handler(ctx)
            }),
        };
        self.insert(spec);
    }

    fn insert(&mut self, spec: ToolSpec) {
        let name = spec.info.name;
        if self.tools.insert(name, spec).is_some() {
            warn!(command = name, "command registered twice; the later registration wins");
        }
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolSpec> {
        self.tools.values()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

// ── define_commands! macro ──────────────────────────────────────

/// Single source of truth for the built-in vocabulary. Generates:
/// 1. `register_builtin()`: registers every command with its contract
/// 2. `BUILTIN_COMMANDS` (tests only): the command names, in declaration order
macro_rules! define_commands {
    (
        params {
            $(
                [ $pc:expr $(, $pf:ident)* ]
                $pn:literal ( $pp:ty ) => $ph:path : $pd:literal ;
            )*
        }
        no_params {
            $(
                [ $nc:expr $(, $nf:ident)* ]
                $nn:literal => $nh:path : $nd:literal ;
            )*
        }
    ) => {
        // ── 1. register_builtin() ──
        pub(crate) fn register_builtin(registry: &mut ToolRegistry) {
            $( registry.register::<$pp, _>(
                CommandInfo {
                    name: $pn,
                    description: $pd,
                    category: $pc,
                    mutates: define_commands!(@has_flag mutates; $($pf)*),
                },
                $ph,
            ); )*
            $( registry.register_no_params(
                CommandInfo {
                    name: $nn,
                    description: $nd,
                    category: $nc,
                    mutates: define_commands!(@has_flag mutates; $($nf)*),
                },
                $nh,
            ); )*
        }

        // ── 2. BUILTIN_COMMANDS ──
        #[cfg(test)]
        pub const BUILTIN_COMMANDS: &[&str] = &[ $( $pn, )* $( $nn, )* ];
    };

    // Literal tokens match before metavariables, so `mutates` hits the first
    // arm and any other ident falls through to the recursive second arm.
    (@has_flag mutates; mutates $($rest:ident)*) => { true };
    (@has_flag mutates; $_other:ident $($rest:ident)*) => { define_commands!(@has_flag mutates; $($rest)*) };
    (@has_flag mutates;) => { false };
}

// ── Command definitions ─────────────────────────────────────────

define_commands! {
    params {
        // ── Transport (1) ───────────────────────────────────────
        [CommandCategory::Transport, mutates]
        "set_playback_position"(SetPlaybackPositionParams)
        => transport::set_playback_position: "Move the playhead to a position in beats (>= 0).";

        // ── Track (4) ───────────────────────────────────────────
        [CommandCategory::Track]
        "list_tracks"(ListTracksParams)
        => track::list_tracks: "List tracks with type, group, color, selection and devices. Optional type filter.";

        [CommandCategory::Track]
        "get_track_details"(TrackTargetParams)
        => track::get_track_details: "Get full details for one track by index, name, or the selected track.";

        [CommandCategory::Track, mutates]
        "set_track_properties"(SetTrackPropertiesParams)
        => track::set_track_properties: "Set mute, solo, arm, volume or pan on a track. At least one property is required.";

        [CommandCategory::Track, mutates]
        "set_track_send"(SetTrackSendParams)
        => track::set_track_send: "Set the volume (0.0-1.0) and/or enabled state of one send on a track.";

        // ── Device (11) ─────────────────────────────────────────
        [CommandCategory::Device]
        "list_devices_on_track"(TrackTargetParams)
        => device::list_devices_on_track: "List the devices on a track by index, name, or the selected track.";

        [CommandCategory::Device]
        "get_device_details"(DeviceTargetParams)
        => device::get_device_details: "Get a device (by track + device identifiers, or the selected device) with its remote controls and pages.";

        [CommandCategory::Device, mutates]
        "set_selected_device_parameter"(SetSelectedDeviceParameterParams)
        => device::set_selected_device_parameter: "Set one remote-control value (0.0-1.0) on the selected device.";

        [CommandCategory::Device, mutates]
        "set_selected_device_parameters"(SetSelectedDeviceParametersParams)
        => device::set_selected_device_parameters: "Set several remote-control values on the selected device. Reports per-parameter results.";

        [CommandCategory::Device, mutates]
        "set_device_parameters"(SetDeviceParametersParams)
        => device::set_device_parameters: "Set several remote-control values on a device addressed by track + device. Reports per-parameter results.";

        [CommandCategory::Device, mutates]
        "switch_device_page"(SwitchDevicePageParams)
        => device::switch_device_page: "Switch the remote-control page of a device (default: the selected device).";

        [CommandCategory::Device]
        "get_device_page_names"(DeviceTargetParams)
        => device::get_device_page_names: "List the remote-control page names of a device.";

        [CommandCategory::Device, mutates]
        "get_device_page_parameters"(DevicePageParams)
        => device::get_device_page_parameters: "Get the parameters of one remote-control page. With page_index the device switches to that page first.";

        [CommandCategory::Device]
        "get_all_device_pages_parameters"(DeviceTargetParams)
        => device::get_all_device_pages_parameters: "Get the parameters of every remote-control page of a device without switching pages.";

        [CommandCategory::Device, mutates]
        "set_all_device_pages_parameters"(SetAllDevicePagesParametersParams)
        => device::set_all_device_pages_parameters: "Set parameters on several pages of one device. Reports per-page and per-parameter results.";

        [CommandCategory::Device, mutates]
        "batch_operations"(BatchOperationsParams)
        => operations::batch_operations: "Run device operations over many tracks: switch_device_page_on_tracks, set_device_parameters_on_tracks, set_device_page_parameters_on_tracks. Stops at the first failure unless continue_on_error.";

        // ── Scene (3) ───────────────────────────────────────────
        [CommandCategory::Scene]
        "get_clips_in_scene"(SceneTargetParams)
        => scene::get_clips_in_scene: "Get the clip slot of every track in a scene by index, name, or the selected scene.";

        [CommandCategory::Scene, mutates]
        "launch_scene"(SceneTargetParams)
        => scene::launch_scene: "Launch every clip in a scene.";

        [CommandCategory::Scene, mutates]
        "launch_clip"(ClipSlotTargetParams)
        => scene::launch_clip: "Launch the clip at a track + scene slot (default: selected track and scene).";

        // ── Catalog (1) ─────────────────────────────────────────
        [CommandCategory::Catalog]
        "list_device_catalog"(CategoryParams)
        => library::list_device_catalog: "List vendor device identifiers, optionally for one category.";

        // ── Help (1) ────────────────────────────────────────────
        [CommandCategory::Help]
        "help"(HelpParams)
        => query::help: "Discover commands. No topic = categories; a category = its commands; a command = its parameter schema.";
    }
    no_params {
        // ── Status (1) ──────────────────────────────────────────
        [CommandCategory::Status]
        "status" => status::status: "Get project, audio engine, transport and selection status.";

        // ── Transport (2) ───────────────────────────────────────
        [CommandCategory::Transport, mutates]
        "transport_start" => transport::transport_start: "Start playback.";

        [CommandCategory::Transport, mutates]
        "transport_stop" => transport::transport_stop: "Stop playback.";

        // ── Device (1) ──────────────────────────────────────────
        [CommandCategory::Device]
        "get_selected_device_parameters" => device::get_selected_device_parameters: "Get the remote-control parameters of the selected device.";

        // ── Scene (1) ───────────────────────────────────────────
        [CommandCategory::Scene]
        "list_scenes" => scene::list_scenes: "List scenes with their clip counts.";
    }
}
