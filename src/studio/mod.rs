//! The external control surface this bridge drives.
//!
//! [`Studio`] is the minimum collaborator contract the command layer needs:
//! identity lookups by index, name and current selection, plus the reads and
//! mutators that individual commands call. Implementations must tolerate
//! concurrent calls; [`memory::MemoryStudio`] is the in-process implementation
//! used by the binaries and tests.

pub mod memory;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resolver::{EntityRef, Lookup};

/// Failures reported by the control surface itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StudioError {
    #[error("{0}")]
    Rejected(String),
    #[error("{what} is unavailable")]
    Unavailable { what: String },
    #[error("no {what} at index {index}")]
    Missing { what: &'static str, index: usize },
}

/// Which entity collection a lookup addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Tracks,
    Devices { track: usize },
    Scenes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TrackType {
    Audio,
    Instrument,
    Group,
    Effect,
    Master,
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    Instrument,
    #[serde(rename = "AudioFX")]
    AudioFx,
    #[serde(rename = "NoteFX")]
    NoteFx,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn css(self) -> String {
        format!("rgb({},{},{})", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u32,
    pub denominator: u32,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            numerator: 4,
            denominator: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportState {
    pub playing: bool,
    pub recording: bool,
    pub loop_active: bool,
    pub metronome_active: bool,
    pub tempo: f64,
    pub time_signature: TimeSignature,
    pub position_beats: f64,
    pub position_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendState {
    pub name: String,
    pub volume: f64,
    #[serde(default = "send_enabled_default")]
    pub enabled: bool,
}

fn send_enabled_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackState {
    pub index: usize,
    pub name: String,
    pub track_type: TrackType,
    pub parent_group: Option<usize>,
    pub activated: bool,
    pub color: Rgb,
    pub volume: f64,
    pub pan: f64,
    pub mute: bool,
    pub solo: bool,
    pub arm: bool,
    pub sends: Vec<SendState>,
}

/// Partial update for a track's mixer state. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackChanges {
    pub mute: Option<bool>,
    pub solo: Option<bool>,
    pub arm: Option<bool>,
    pub volume: Option<f64>,
    pub pan: Option<f64>,
}

impl TrackChanges {
    pub fn is_empty(&self) -> bool {
        self.mute.is_none()
            && self.solo.is_none()
            && self.arm.is_none()
            && self.volume.is_none()
            && self.pan.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub index: usize,
    pub name: String,
    pub device_type: DeviceType,
    pub bypassed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteControl {
    pub index: usize,
    pub name: String,
    pub value: f64,
    pub display_value: String,
}

/// The remote-control page currently mapped on a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteControlPage {
    pub page_index: usize,
    pub page_names: Vec<String>,
    pub controls: Vec<RemoteControl>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneState {
    pub index: usize,
    pub name: String,
    pub color: Rgb,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipSlot {
    pub track_index: usize,
    pub track_name: String,
    pub has_content: bool,
    pub clip_name: Option<String>,
    pub is_playing: bool,
    pub is_recording: bool,
    pub is_queued: bool,
}

/// The control surface of the host application.
pub trait Studio: Send + Sync {
    fn entity_at(&self, collection: Collection, index: usize) -> Option<EntityRef>;
    /// Exact, case-sensitive match. The first match wins.
    fn entity_named(&self, collection: Collection, name: &str) -> Option<EntityRef>;
    fn selected(&self, collection: Collection) -> Option<EntityRef>;

    fn project_name(&self) -> Result<String, StudioError>;
    fn audio_engine_active(&self) -> Result<bool, StudioError>;

    fn transport(&self) -> Result<TransportState, StudioError>;
    fn set_playing(&self, playing: bool) -> Result<(), StudioError>;
    fn set_position(&self, beats: f64) -> Result<(), StudioError>;

    fn tracks(&self) -> Result<Vec<TrackState>, StudioError>;
    fn track(&self, index: usize) -> Result<TrackState, StudioError>;
    fn update_track(&self, index: usize, changes: &TrackChanges) -> Result<(), StudioError>;
    /// Update one send of a track. `None` leaves a field unchanged.
    fn set_send(
        &self,
        track: usize,
        send: usize,
        volume: Option<f64>,
        enabled: Option<bool>,
    ) -> Result<(), StudioError>;

    fn devices(&self, track: usize) -> Result<Vec<DeviceState>, StudioError>;
    fn device(&self, track: usize, device: usize) -> Result<DeviceState, StudioError>;
    /// The selected device together with the track that holds it.
    fn selected_device(&self) -> Option<(EntityRef, EntityRef)>;
    fn remote_controls(&self, track: usize, device: usize)
        -> Result<RemoteControlPage, StudioError>;
    /// Read one page's controls without switching the mapped page.
    fn remote_controls_on_page(
        &self,
        track: usize,
        device: usize,
        page: usize,
    ) -> Result<RemoteControlPage, StudioError>;
    fn set_remote_control(
        &self,
        track: usize,
        device: usize,
        index: usize,
        value: f64,
    ) -> Result<(), StudioError>;
    fn select_remote_page(&self, track: usize, device: usize, page: usize)
        -> Result<(), StudioError>;

    fn scenes(&self) -> Result<Vec<SceneState>, StudioError>;
    fn clips_in_scene(&self, scene: usize) -> Result<Vec<ClipSlot>, StudioError>;
    fn launch_scene(&self, scene: usize) -> Result<(), StudioError>;
    fn launch_clip(&self, track: usize, scene: usize) -> Result<(), StudioError>;
}

/// Adapts one [`Collection`] of a [`Studio`] to the resolver's lookup contract.
pub struct CollectionLookup<'a> {
    studio: &'a dyn Studio,
    collection: Collection,
}

impl<'a> CollectionLookup<'a> {
    pub fn new(studio: &'a dyn Studio, collection: Collection) -> Self {
        Self { studio, collection }
    }
}

impl Lookup for CollectionLookup<'_> {
    fn by_index(&self, index: usize) -> Option<EntityRef> {
        self.studio.entity_at(self.collection, index)
    }

    fn by_name(&self, name: &str) -> Option<EntityRef> {
        self.studio.entity_named(self.collection, name)
    }

    fn current(&self) -> Option<EntityRef> {
        self.studio.selected(self.collection)
    }
}
