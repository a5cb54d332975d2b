use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::{
    ClipSlot, Collection, DeviceState, DeviceType, RemoteControl, RemoteControlPage, Rgb,
    SceneState, SendState, Studio, StudioError, TimeSignature, TrackChanges, TrackState,
    TrackType, TransportState,
};
use crate::resolver::EntityRef;

// ── Project snapshot ─────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_tempo() -> f64 {
    120.0
}

fn default_volume() -> f64 {
    0.75
}

fn default_pan() -> f64 {
    0.5
}

fn default_color() -> Rgb {
    Rgb { r: 128, g: 128, b: 128 }
}

/// Serializable state of a whole project, as loaded from a project file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub name: String,
    #[serde(default = "default_true")]
    pub audio_engine_active: bool,
    #[serde(default)]
    pub transport: TransportSnapshot,
    #[serde(default)]
    pub tracks: Vec<TrackSnapshot>,
    #[serde(default)]
    pub scenes: Vec<SceneSnapshot>,
    #[serde(default)]
    pub selection: SelectionSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportSnapshot {
    #[serde(default)]
    pub playing: bool,
    #[serde(default)]
    pub recording: bool,
    #[serde(default)]
    pub loop_active: bool,
    #[serde(default)]
    pub metronome_active: bool,
    #[serde(default = "default_tempo")]
    pub tempo: f64,
    #[serde(default)]
    pub time_signature: TimeSignature,
    #[serde(default)]
    pub position_beats: f64,
}

impl Default for TransportSnapshot {
    fn default() -> Self {
        Self {
            playing: false,
            recording: false,
            loop_active: false,
            metronome_active: false,
            tempo: default_tempo(),
            time_signature: TimeSignature::default(),
            position_beats: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackSnapshot {
    pub name: String,
    pub track_type: TrackType,
    #[serde(default)]
    pub parent_group: Option<usize>,
    #[serde(default = "default_true")]
    pub activated: bool,
    #[serde(default = "default_color")]
    pub color: Rgb,
    #[serde(default = "default_volume")]
    pub volume: f64,
    #[serde(default = "default_pan")]
    pub pan: f64,
    #[serde(default)]
    pub mute: bool,
    #[serde(default)]
    pub solo: bool,
    #[serde(default)]
    pub arm: bool,
    #[serde(default)]
    pub sends: Vec<SendState>,
    #[serde(default)]
    pub devices: Vec<DeviceSnapshot>,
    /// One slot per scene; `None` is an empty slot.
    #[serde(default)]
    pub clips: Vec<Option<ClipSnapshot>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub name: String,
    pub device_type: DeviceType,
    #[serde(default)]
    pub bypassed: bool,
    #[serde(default)]
    pub pages: Vec<PageSnapshot>,
    #[serde(default)]
    pub page_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub name: String,
    pub parameters: Vec<ParameterSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSnapshot {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipSnapshot {
    pub name: String,
    #[serde(default)]
    pub playing: bool,
    #[serde(default)]
    pub recording: bool,
    #[serde(default)]
    pub queued: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub name: String,
    #[serde(default = "default_color")]
    pub color: Rgb,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionSnapshot {
    #[serde(default)]
    pub track: Option<usize>,
    /// Device index on the selected track.
    #[serde(default)]
    pub device: Option<usize>,
    #[serde(default)]
    pub scene: Option<usize>,
}

// ── In-memory studio ─────────────────────────────────────────────

/// A [`Studio`] backed by a [`ProjectSnapshot`] held in memory.
///
/// The audio engine can be taken offline to simulate a host that refuses
/// transport calls.
pub struct MemoryStudio {
    project: RwLock<ProjectSnapshot>,
    engine_offline: AtomicBool,
}

impl MemoryStudio {
    pub fn new(project: ProjectSnapshot) -> Self {
        Self {
            project: RwLock::new(project),
            engine_offline: AtomicBool::new(false),
        }
    }

    pub fn set_engine_online(&self, online: bool) {
        self.engine_offline.store(!online, Ordering::SeqCst);
    }

    pub fn select(&self, track: Option<usize>, device: Option<usize>, scene: Option<usize>) {
        let mut project = self.project.write();
        project.selection = SelectionSnapshot { track, device, scene };
    }

    pub fn snapshot(&self) -> ProjectSnapshot {
        self.project.read().clone()
    }

    fn check_engine(&self) -> Result<(), StudioError> {
        if self.engine_offline.load(Ordering::SeqCst) {
            return Err(StudioError::Unavailable {
                what: "audio engine".to_string(),
            });
        }
        Ok(())
    }

    fn with_device<R>(
        &self,
        track: usize,
        device: usize,
        f: impl FnOnce(&DeviceSnapshot) -> Result<R, StudioError>,
    ) -> Result<R, StudioError> {
        let project = self.project.read();
        let t = project
            .tracks
            .get(track)
            .ok_or(StudioError::Missing { what: "track", index: track })?;
        let d = t
            .devices
            .get(device)
            .ok_or(StudioError::Missing { what: "device", index: device })?;
        f(d)
    }

    fn with_device_mut<R>(
        &self,
        track: usize,
        device: usize,
        f: impl FnOnce(&mut DeviceSnapshot) -> Result<R, StudioError>,
    ) -> Result<R, StudioError> {
        let mut project = self.project.write();
        let t = project
            .tracks
            .get_mut(track)
            .ok_or(StudioError::Missing { what: "track", index: track })?;
        let d = t
            .devices
            .get_mut(device)
            .ok_or(StudioError::Missing { what: "device", index: device })?;
        f(d)
    }
}

fn track_state(index: usize, t: &TrackSnapshot) -> TrackState {
    TrackState {
        index,
        name: t.name.clone(),
        track_type: t.track_type,
        parent_group: t.parent_group,
        activated: t.activated,
        color: t.color,
        volume: t.volume,
        pan: t.pan,
        mute: t.mute,
        solo: t.solo,
        arm: t.arm,
        sends: t.sends.clone(),
    }
}

fn device_state(index: usize, d: &DeviceSnapshot) -> DeviceState {
    DeviceState {
        index,
        name: d.name.clone(),
        device_type: d.device_type,
        bypassed: d.bypassed,
    }
}

fn control_page(d: &DeviceSnapshot, page_index: usize) -> RemoteControlPage {
    let controls = d
        .pages
        .get(page_index)
        .map(|page| {
            page.parameters
                .iter()
                .enumerate()
                .map(|(i, p)| RemoteControl {
                    index: i,
                    name: p.name.clone(),
                    value: p.value,
                    display_value: format!("{:.1} %", p.value * 100.0),
                })
                .collect()
        })
        .unwrap_or_default();
    RemoteControlPage {
        page_index,
        page_names: d.pages.iter().map(|p| p.name.clone()).collect(),
        controls,
    }
}

fn names_of<'a>(names: impl Iterator<Item = &'a str>) -> Vec<EntityRef> {
    names.enumerate().map(|(i, n)| EntityRef::new(i, n)).collect()
}

impl MemoryStudio {
    fn entities(&self, collection: Collection) -> Vec<EntityRef> {
        let project = self.project.read();
        match collection {
            Collection::Tracks => names_of(project.tracks.iter().map(|t| t.name.as_str())),
            Collection::Scenes => names_of(project.scenes.iter().map(|s| s.name.as_str())),
            Collection::Devices { track } => project
                .tracks
                .get(track)
                .map(|t| names_of(t.devices.iter().map(|d| d.name.as_str())))
                .unwrap_or_default(),
        }
    }
}

impl Studio for MemoryStudio {
    fn entity_at(&self, collection: Collection, index: usize) -> Option<EntityRef> {
        self.entities(collection).into_iter().nth(index)
    }

    fn entity_named(&self, collection: Collection, name: &str) -> Option<EntityRef> {
        self.entities(collection).into_iter().find(|e| e.name == name)
    }

    fn selected(&self, collection: Collection) -> Option<EntityRef> {
        let selection = self.project.read().selection.clone();
        match collection {
            Collection::Tracks => selection.track.and_then(|i| self.entity_at(collection, i)),
            Collection::Scenes => selection.scene.and_then(|i| self.entity_at(collection, i)),
            Collection::Devices { track } if selection.track == Some(track) => {
                selection.device.and_then(|i| self.entity_at(collection, i))
            }
            Collection::Devices { .. } => None,
        }
    }

    fn project_name(&self) -> Result<String, StudioError> {
        Ok(self.project.read().name.clone())
    }

    fn audio_engine_active(&self) -> Result<bool, StudioError> {
        let offline = self.engine_offline.load(Ordering::SeqCst);
        Ok(!offline && self.project.read().audio_engine_active)
    }

    fn transport(&self) -> Result<TransportState, StudioError> {
        self.check_engine()?;
        let project = self.project.read();
        let t = &project.transport;
        let position_seconds = if t.tempo > 0.0 {
            t.position_beats * 60.0 / t.tempo
        } else {
            0.0
        };
        Ok(TransportState {
            playing: t.playing,
            recording: t.recording,
            loop_active: t.loop_active,
            metronome_active: t.metronome_active,
            tempo: t.tempo,
            time_signature: t.time_signature,
            position_beats: t.position_beats,
            position_seconds,
        })
    }

    fn set_playing(&self, playing: bool) -> Result<(), StudioError> {
        self.check_engine()?;
        self.project.write().transport.playing = playing;
        Ok(())
    }

    fn set_position(&self, beats: f64) -> Result<(), StudioError> {
        self.check_engine()?;
        self.project.write().transport.position_beats = beats;
        Ok(())
    }

    fn tracks(&self) -> Result<Vec<TrackState>, StudioError> {
        let project = self.project.read();
        Ok(project
            .tracks
            .iter()
            .enumerate()
            .map(|(i, t)| track_state(i, t))
            .collect())
    }

    fn track(&self, index: usize) -> Result<TrackState, StudioError> {
        let project = self.project.read();
        project
            .tracks
            .get(index)
            .map(|t| track_state(index, t))
            .ok_or(StudioError::Missing { what: "track", index })
    }

    fn update_track(&self, index: usize, changes: &TrackChanges) -> Result<(), StudioError> {
        let mut project = self.project.write();
        let track = project
            .tracks
            .get_mut(index)
            .ok_or(StudioError::Missing { what: "track", index })?;
        if changes.arm == Some(true) && track.track_type == TrackType::Master {
            return Err(StudioError::Rejected(
                "the master track cannot be armed for recording".to_string(),
            ));
        }
        if let Some(mute) = changes.mute {
            track.mute = mute;
        }
        if let Some(solo) = changes.solo {
            track.solo = solo;
        }
        if let Some(arm) = changes.arm {
            track.arm = arm;
        }
        if let Some(volume) = changes.volume {
            track.volume = volume;
        }
        if let Some(pan) = changes.pan {
            track.pan = pan;
        }
        Ok(())
    }

    fn set_send(
        &self,
        track: usize,
        send: usize,
        volume: Option<f64>,
        enabled: Option<bool>,
    ) -> Result<(), StudioError> {
        let mut project = self.project.write();
        let t = project
            .tracks
            .get_mut(track)
            .ok_or(StudioError::Missing { what: "track", index: track })?;
        let s = t
            .sends
            .get_mut(send)
            .ok_or(StudioError::Missing { what: "send", index: send })?;
        if let Some(volume) = volume {
            s.volume = volume;
        }
        if let Some(enabled) = enabled {
            s.enabled = enabled;
        }
        Ok(())
    }

    fn devices(&self, track: usize) -> Result<Vec<DeviceState>, StudioError> {
        let project = self.project.read();
        let t = project
            .tracks
            .get(track)
            .ok_or(StudioError::Missing { what: "track", index: track })?;
        Ok(t.devices
            .iter()
            .enumerate()
            .map(|(i, d)| device_state(i, d))
            .collect())
    }

    fn device(&self, track: usize, device: usize) -> Result<DeviceState, StudioError> {
        self.with_device(track, device, |d| Ok(device_state(device, d)))
    }

    fn selected_device(&self) -> Option<(EntityRef, EntityRef)> {
        let track = self.selected(Collection::Tracks)?;
        let device = self.selected(Collection::Devices { track: track.index })?;
        Some((track, device))
    }

    fn remote_controls(
        &self,
        track: usize,
        device: usize,
    ) -> Result<RemoteControlPage, StudioError> {
        self.with_device(track, device, |d| Ok(control_page(d, d.page_index)))
    }

    fn remote_controls_on_page(
        &self,
        track: usize,
        device: usize,
        page: usize,
    ) -> Result<RemoteControlPage, StudioError> {
        self.with_device(track, device, |d| {
            if page >= d.pages.len() {
                return Err(StudioError::Missing { what: "remote control page", index: page });
            }
            Ok(control_page(d, page))
        })
    }

    fn set_remote_control(
        &self,
        track: usize,
        device: usize,
        index: usize,
        value: f64,
    ) -> Result<(), StudioError> {
        self.with_device_mut(track, device, |d| {
            let page_index = d.page_index;
            let page = d
                .pages
                .get_mut(page_index)
                .ok_or(StudioError::Missing { what: "remote control page", index: page_index })?;
            let param = page
                .parameters
                .get_mut(index)
                .ok_or(StudioError::Missing { what: "remote control", index })?;
            param.value = value;
            Ok(())
        })
    }

    fn select_remote_page(
        &self,
        track: usize,
        device: usize,
        page: usize,
    ) -> Result<(), StudioError> {
        self.with_device_mut(track, device, |d| {
            if page >= d.pages.len() {
                return Err(StudioError::Missing { what: "remote control page", index: page });
            }
            d.page_index = page;
            Ok(())
        })
    }

    fn scenes(&self) -> Result<Vec<SceneState>, StudioError> {
        let project = self.project.read();
        Ok(project
            .scenes
            .iter()
            .enumerate()
            .map(|(i, s)| SceneState {
                index: i,
                name: s.name.clone(),
                color: s.color,
            })
            .collect())
    }

    fn clips_in_scene(&self, scene: usize) -> Result<Vec<ClipSlot>, StudioError> {
        let project = self.project.read();
        if scene >= project.scenes.len() {
            return Err(StudioError::Missing { what: "scene", index: scene });
        }
        Ok(project
            .tracks
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let clip = t.clips.get(scene).and_then(Option::as_ref);
                ClipSlot {
                    track_index: i,
                    track_name: t.name.clone(),
                    has_content: clip.is_some(),
                    clip_name: clip.map(|c| c.name.clone()),
                    is_playing: clip.is_some_and(|c| c.playing),
                    is_recording: clip.is_some_and(|c| c.recording),
                    is_queued: clip.is_some_and(|c| c.queued),
                }
            })
            .collect())
    }

    fn launch_scene(&self, scene: usize) -> Result<(), StudioError> {
        self.check_engine()?;
        let mut project = self.project.write();
        if scene >= project.scenes.len() {
            return Err(StudioError::Missing { what: "scene", index: scene });
        }
        for track in &mut project.tracks {
            for (slot, clip) in track.clips.iter_mut().enumerate() {
                if let Some(clip) = clip {
                    clip.playing = slot == scene;
                }
            }
        }
        project.transport.playing = true;
        Ok(())
    }

    fn launch_clip(&self, track: usize, scene: usize) -> Result<(), StudioError> {
        self.check_engine()?;
        let mut project = self.project.write();
        let t = project
            .tracks
            .get_mut(track)
            .ok_or(StudioError::Missing { what: "track", index: track })?;
        if !matches!(t.clips.get(scene), Some(Some(_))) {
            return Err(StudioError::Missing { what: "clip", index: scene });
        }
        for (slot, clip) in t.clips.iter_mut().enumerate() {
            if let Some(clip) = clip {
                clip.playing = slot == scene;
            }
        }
        project.transport.playing = true;
        Ok(())
    }
}
