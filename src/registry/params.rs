use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::batch::BatchItem;
use crate::resolver::{CompositeSelector, Selector};
use crate::studio::TrackType;

fn composite(
    outer: Selector,
    inner: Selector,
    use_current: Option<bool>,
) -> CompositeSelector {
    CompositeSelector {
        outer,
        inner,
        use_current,
    }
}

// ── Transport params ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SetPlaybackPositionParams {
    /// Position in beats from the project start. Must be >= 0.
    pub beats: f64,
}

// ── Track params ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ListTracksParams {
    /// Only list tracks of this type.
    #[serde(default, rename = "type")]
    pub track_type: Option<TrackType>,
}

/// Addresses one track. Provide at most one field; none = the selected track.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TrackTargetParams {
    /// Zero-based track index.
    pub track_index: Option<usize>,
    /// Exact, case-sensitive track name.
    pub track_name: Option<String>,
    /// Use the selected track. Defaults to true when no identifier is given.
    pub get_selected: Option<bool>,
}

impl TrackTargetParams {
    pub fn selector(&self) -> Selector {
        Selector::new(self.track_index, self.track_name.clone(), self.get_selected)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SetTrackPropertiesParams {
    /// Zero-based track index.
    pub track_index: Option<usize>,
    /// Exact, case-sensitive track name.
    pub track_name: Option<String>,
    /// Use the selected track. Defaults to true when no identifier is given.
    pub get_selected: Option<bool>,
    pub mute: Option<bool>,
    pub solo: Option<bool>,
    /// Record arm.
    pub arm: Option<bool>,
    /// Volume, 0.0-1.0.
    pub volume: Option<f64>,
    /// Pan, 0.0-1.0 where 0.5 is center.
    pub pan: Option<f64>,
}

impl SetTrackPropertiesParams {
    pub fn selector(&self) -> Selector {
        Selector::new(self.track_index, self.track_name.clone(), self.get_selected)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SetTrackSendParams {
    pub track_index: Option<usize>,
    pub track_name: Option<String>,
    /// Use the selected track. Defaults to true when no identifier is given.
    pub get_selected: Option<bool>,
    /// Zero-based send slot on the track.
    pub send_index: i64,
    /// Send level, 0.0-1.0.
    pub volume: Option<f64>,
    /// Turn the send on or off.
    pub enabled: Option<bool>,
}

impl SetTrackSendParams {
    pub fn selector(&self) -> Selector {
        Selector::new(self.track_index, self.track_name.clone(), self.get_selected)
    }
}

// ── Device params ───────────────────────────────────────────────

/// Addresses one device through its track, or the selected device when no
/// identifier is given. Identifier mode needs one track and one device field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DeviceTargetParams {
    /// Zero-based index of the track holding the device.
    pub track_index: Option<usize>,
    /// Exact name of the track holding the device.
    pub track_name: Option<String>,
    /// Zero-based index of the device on its track.
    pub device_index: Option<usize>,
    /// Exact, case-sensitive device name.
    pub device_name: Option<String>,
    /// Use the selected device. Defaults to true when no identifier is given.
    pub get_for_selected_device: Option<bool>,
}

impl DeviceTargetParams {
    pub fn selector(&self) -> CompositeSelector {
        composite(
            Selector::new(self.track_index, self.track_name.clone(), None),
            Selector::new(self.device_index, self.device_name.clone(), None),
            self.get_for_selected_device,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SetSelectedDeviceParameterParams {
    /// Zero-based remote-control index on the current page.
    pub parameter_index: i64,
    /// Normalized value, 0.0-1.0.
    pub value: f64,
}

/// One remote-control write inside a batch.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ParameterSetting {
    /// Zero-based remote-control index on the current page. Range errors are
    /// reported on this item's result, not for the whole batch.
    #[serde(alias = "parameter_index")]
    pub index: i64,
    /// Normalized value, 0.0-1.0.
    pub value: f64,
}

impl BatchItem for ParameterSetting {
    fn identifier(&self) -> (&'static str, Value) {
        ("index", Value::from(self.index))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SetSelectedDeviceParametersParams {
    /// Parameter writes, applied in order.
    pub parameters: Vec<ParameterSetting>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SetDeviceParametersParams {
    pub track_index: Option<usize>,
    pub track_name: Option<String>,
    pub device_index: Option<usize>,
    pub device_name: Option<String>,
    /// Use the selected device. Defaults to true when no identifier is given.
    pub get_for_selected_device: Option<bool>,
    /// Parameter writes, applied in order.
    pub parameters: Vec<ParameterSetting>,
}

impl SetDeviceParametersParams {
    pub fn selector(&self) -> CompositeSelector {
        composite(
            Selector::new(self.track_index, self.track_name.clone(), None),
            Selector::new(self.device_index, self.device_name.clone(), None),
            self.get_for_selected_device,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SwitchDevicePageParams {
    pub track_index: Option<usize>,
    pub track_name: Option<String>,
    pub device_index: Option<usize>,
    pub device_name: Option<String>,
    /// Use the selected device. Defaults to true when no identifier is given.
    pub get_for_selected_device: Option<bool>,
    /// Zero-based remote-control page to switch to.
    pub page_index: i64,
}

impl SwitchDevicePageParams {
    pub fn selector(&self) -> CompositeSelector {
        composite(
            Selector::new(self.track_index, self.track_name.clone(), None),
            Selector::new(self.device_index, self.device_name.clone(), None),
            self.get_for_selected_device,
        )
    }
}

/// A device plus an optional page to switch to before reading it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DevicePageParams {
    pub track_index: Option<usize>,
    pub track_name: Option<String>,
    pub device_index: Option<usize>,
    pub device_name: Option<String>,
    /// Use the selected device. Defaults to true when no identifier is given.
    pub get_for_selected_device: Option<bool>,
    /// Page to switch to first. Omit to read the mapped page.
    pub page_index: Option<i64>,
}

impl DevicePageParams {
    pub fn selector(&self) -> CompositeSelector {
        composite(
            Selector::new(self.track_index, self.track_name.clone(), None),
            Selector::new(self.device_index, self.device_name.clone(), None),
            self.get_for_selected_device,
        )
    }
}

/// The writes for one remote-control page inside `set_all_device_pages_parameters`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PageSetting {
    /// Zero-based page index.
    pub page_index: i64,
    /// Expected page name. When given it must match the device's page.
    pub page_name: Option<String>,
    pub parameters: Vec<ParameterSetting>,
}

impl BatchItem for PageSetting {
    fn identifier(&self) -> (&'static str, Value) {
        ("page_index", Value::from(self.page_index))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SetAllDevicePagesParametersParams {
    pub track_index: Option<usize>,
    pub track_name: Option<String>,
    pub device_index: Option<usize>,
    pub device_name: Option<String>,
    /// Use the selected device. Defaults to true when no identifier is given.
    pub get_for_selected_device: Option<bool>,
    /// Pages to write, in order. Each page reports its own result.
    pub pages: Vec<PageSetting>,
}

impl SetAllDevicePagesParametersParams {
    pub fn selector(&self) -> CompositeSelector {
        composite(
            Selector::new(self.track_index, self.track_name.clone(), None),
            Selector::new(self.device_index, self.device_name.clone(), None),
            self.get_for_selected_device,
        )
    }
}

// ── Batch operation params ──────────────────────────────────────

fn empty_args() -> Value {
    Value::Object(serde_json::Map::new())
}

/// One step of `batch_operations`. `args` is decoded per `type`, so a bad
/// step fails on its own.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Operation {
    /// Operation type, e.g. "set_device_parameters_on_tracks".
    #[serde(rename = "type")]
    pub op_type: String,
    #[serde(default = "empty_args")]
    pub args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct BatchOperationsParams {
    /// Operations, executed in order.
    pub operations: Vec<Operation>,
    /// Keep going after a failed operation. By default the rest are skipped.
    #[serde(default)]
    pub continue_on_error: bool,
}

/// Tracks addressed by one operation: an explicit list, or an inclusive range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackSpan {
    pub track_indices: Option<Vec<i64>>,
    pub start_index: Option<i64>,
    pub end_index: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SwitchPageOnTracksArgs {
    pub device_position: usize,
    pub page_index: i64,
    pub track_indices: Option<Vec<i64>>,
    pub start_index: Option<i64>,
    pub end_index: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParametersOnTracksArgs {
    pub device_position: usize,
    pub parameters: Vec<ParameterSetting>,
    pub track_indices: Option<Vec<i64>>,
    pub start_index: Option<i64>,
    pub end_index: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PageParametersOnTracksArgs {
    pub device_position: usize,
    pub page_index: i64,
    pub parameters: Vec<ParameterSetting>,
    pub track_indices: Option<Vec<i64>>,
    pub start_index: Option<i64>,
    pub end_index: Option<i64>,
}

macro_rules! track_span {
    ($($args:ty),*) => {
        $(impl $args {
            pub fn span(&self) -> TrackSpan {
                TrackSpan {
                    track_indices: self.track_indices.clone(),
                    start_index: self.start_index,
                    end_index: self.end_index,
                }
            }
        })*
    };
}

track_span!(SwitchPageOnTracksArgs, ParametersOnTracksArgs, PageParametersOnTracksArgs);

// ── Scene params ────────────────────────────────────────────────

/// Addresses one scene. Provide at most one field; none = the selected scene.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SceneTargetParams {
    /// Zero-based scene index.
    pub scene_index: Option<usize>,
    /// Exact, case-sensitive scene name.
    pub scene_name: Option<String>,
    /// Use the selected scene. Defaults to true when no identifier is given.
    pub get_selected: Option<bool>,
}

impl SceneTargetParams {
    pub fn selector(&self) -> Selector {
        Selector::new(self.scene_index, self.scene_name.clone(), self.get_selected)
    }
}

/// Addresses one clip slot as track + scene, or the selected track and scene.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ClipSlotTargetParams {
    pub track_index: Option<usize>,
    pub track_name: Option<String>,
    pub scene_index: Option<usize>,
    pub scene_name: Option<String>,
    /// Use the selected track and scene. Defaults to true when no identifier is given.
    pub get_selected: Option<bool>,
}

impl ClipSlotTargetParams {
    pub fn selector(&self) -> CompositeSelector {
        composite(
            Selector::new(self.track_index, self.track_name.clone(), None),
            Selector::new(self.scene_index, self.scene_name.clone(), None),
            self.get_selected,
        )
    }
}

// ── Catalog / help params ───────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CategoryParams {
    /// One category, e.g. "bitwig_audio_fx". Omit to list all.
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct HelpParams {
    /// Category name (e.g. "device") or command name (e.g. "get_device_details").
    pub topic: Option<String>,
}
