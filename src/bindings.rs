//! Collaborator bindings: one adapter per studio subsystem.
//!
//! Adapters turn selectors into resolved entities and studio failures into
//! [`CommandError`]s, so command handlers never touch [`Studio`] directly.
//! The whole set is built at most once per process by [`BindingsCell`] and
//! shared by every listener incarnation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use tracing::info;

use crate::error::{CommandError, ErrorCode};
use crate::resolver::{resolve, resolve_composite, CompositeSelector, EntityKind, EntityRef, Selector};
use crate::studio::{
    ClipSlot, Collection, CollectionLookup, DeviceState, RemoteControlPage, SceneState, Studio,
    TrackChanges, TrackState, TransportState,
};

/// Adapters over one shared [`Studio`].
pub struct Bindings {
    pub transport: TransportBinding,
    pub tracks: TrackBinding,
    pub devices: DeviceBinding,
    pub scenes: SceneBinding,
}

impl Bindings {
    pub fn new(studio: Arc<dyn Studio>) -> Self {
        Self {
            transport: TransportBinding {
                studio: Arc::clone(&studio),
            },
            tracks: TrackBinding {
                studio: Arc::clone(&studio),
            },
            devices: DeviceBinding {
                studio: Arc::clone(&studio),
            },
            scenes: SceneBinding { studio },
        }
    }
}

// ── Transport ───────────────────────────────────────────────────────

pub struct TransportBinding {
    studio: Arc<dyn Studio>,
}

impl TransportBinding {
    pub fn project_name(&self) -> Result<String, CommandError> {
        Ok(self.studio.project_name()?)
    }

    pub fn audio_engine_active(&self) -> Result<bool, CommandError> {
        Ok(self.studio.audio_engine_active()?)
    }

    pub fn state(&self) -> Result<TransportState, CommandError> {
        Ok(self.studio.transport()?)
    }

    pub fn start(&self) -> Result<(), CommandError> {
        Ok(self.studio.set_playing(true)?)
    }

    pub fn stop(&self) -> Result<(), CommandError> {
        Ok(self.studio.set_playing(false)?)
    }

    pub fn set_position(&self, beats: f64) -> Result<(), CommandError> {
        Ok(self.studio.set_position(beats)?)
    }
}

// ── Tracks ──────────────────────────────────────────────────────────

pub struct TrackBinding {
    studio: Arc<dyn Studio>,
}

impl TrackBinding {
    pub fn resolve(&self, selector: &Selector) -> Result<EntityRef, CommandError> {
        let lookup = CollectionLookup::new(self.studio.as_ref(), Collection::Tracks);
        resolve(selector, EntityKind::Track, &lookup)
    }

    pub fn selected(&self) -> Option<EntityRef> {
        self.studio.selected(Collection::Tracks)
    }

    pub fn list(&self) -> Result<Vec<TrackState>, CommandError> {
        Ok(self.studio.tracks()?)
    }

    pub fn details(&self, track: &EntityRef) -> Result<TrackState, CommandError> {
        Ok(self.studio.track(track.index)?)
    }

    pub fn update(&self, track: &EntityRef, changes: &TrackChanges) -> Result<(), CommandError> {
        self.studio
            .update_track(track.index, changes)
            .map_err(|e| CommandError::new(ErrorCode::OperationFailed, e.to_string()))
    }

    pub fn set_send(
        &self,
        track: &EntityRef,
        send: usize,
        volume: Option<f64>,
        enabled: Option<bool>,
    ) -> Result<(), CommandError> {
        self.studio
            .set_send(track.index, send, volume, enabled)
            .map_err(|e| CommandError::new(ErrorCode::OperationFailed, e.to_string()))
    }
}

// ── Devices ─────────────────────────────────────────────────────────

pub struct DeviceBinding {
    studio: Arc<dyn Studio>,
}

impl DeviceBinding {
    /// Resolve a device through its track, or the selected device.
    pub fn resolve(
        &self,
        selector: &CompositeSelector,
    ) -> Result<(EntityRef, EntityRef), CommandError> {
        let studio = self.studio.as_ref();
        resolve_composite(
            selector,
            (EntityKind::Track, EntityKind::Device),
            &CollectionLookup::new(studio, Collection::Tracks),
            |track| CollectionLookup::new(studio, Collection::Devices { track: track.index }),
            || studio.selected_device().ok_or(EntityKind::Device),
        )
    }

    pub fn resolve_on_track(
        &self,
        track: &EntityRef,
        selector: &Selector,
    ) -> Result<EntityRef, CommandError> {
        let lookup = CollectionLookup::new(
            self.studio.as_ref(),
            Collection::Devices { track: track.index },
        );
        resolve(selector, EntityKind::Device, &lookup)
    }

    /// The selected device, or `DEVICE_NOT_SELECTED`.
    pub fn selected(&self) -> Result<(EntityRef, EntityRef), CommandError> {
        self.studio.selected_device().ok_or_else(|| {
            CommandError::new(ErrorCode::DeviceNotSelected, "No device is currently selected")
        })
    }

    pub fn is_selected(&self, track: &EntityRef, device: &EntityRef) -> bool {
        self.studio
            .selected_device()
            .is_some_and(|(t, d)| t.index == track.index && d.index == device.index)
    }

    pub fn list(&self, track: &EntityRef) -> Result<Vec<DeviceState>, CommandError> {
        Ok(self.studio.devices(track.index)?)
    }

    pub fn details(&self, track: &EntityRef, device: &EntityRef) -> Result<DeviceState, CommandError> {
        Ok(self.studio.device(track.index, device.index)?)
    }

    pub fn remote_controls(
        &self,
        track: &EntityRef,
        device: &EntityRef,
    ) -> Result<RemoteControlPage, CommandError> {
        Ok(self.studio.remote_controls(track.index, device.index)?)
    }

    /// One page's controls, read without changing the mapped page.
    pub fn page(
        &self,
        track: &EntityRef,
        device: &EntityRef,
        page: usize,
    ) -> Result<RemoteControlPage, CommandError> {
        Ok(self
            .studio
            .remote_controls_on_page(track.index, device.index, page)?)
    }

    /// Set one remote control. The index must fall inside the mapped page.
    pub fn set_parameter(
        &self,
        track: &EntityRef,
        device: &EntityRef,
        index: usize,
        value: f64,
    ) -> Result<(), CommandError> {
        Ok(self
            .studio
            .set_remote_control(track.index, device.index, index, value)?)
    }

    pub fn select_page(
        &self,
        track: &EntityRef,
        device: &EntityRef,
        page: usize,
    ) -> Result<(), CommandError> {
        Ok(self
            .studio
            .select_remote_page(track.index, device.index, page)?)
    }
}

// ── Scenes and clips ────────────────────────────────────────────────

pub struct SceneBinding {
    studio: Arc<dyn Studio>,
}

impl SceneBinding {
    pub fn resolve(&self, selector: &Selector) -> Result<EntityRef, CommandError> {
        let lookup = CollectionLookup::new(self.studio.as_ref(), Collection::Scenes);
        resolve(selector, EntityKind::Scene, &lookup)
    }

    /// Resolve a clip slot as (track, scene).
    pub fn resolve_slot(
        &self,
        selector: &CompositeSelector,
    ) -> Result<(EntityRef, EntityRef), CommandError> {
        let studio = self.studio.as_ref();
        resolve_composite(
            selector,
            (EntityKind::Track, EntityKind::Scene),
            &CollectionLookup::new(studio, Collection::Tracks),
            |_| CollectionLookup::new(studio, Collection::Scenes),
            || {
                let track = studio
                    .selected(Collection::Tracks)
                    .ok_or(EntityKind::Track)?;
                let scene = studio
                    .selected(Collection::Scenes)
                    .ok_or(EntityKind::Scene)?;
                Ok((track, scene))
            },
        )
    }

    pub fn list(&self) -> Result<Vec<SceneState>, CommandError> {
        Ok(self.studio.scenes()?)
    }

    pub fn clips(&self, scene: &EntityRef) -> Result<Vec<ClipSlot>, CommandError> {
        Ok(self.studio.clips_in_scene(scene.index)?)
    }

    pub fn launch(&self, scene: &EntityRef) -> Result<(), CommandError> {
        Ok(self.studio.launch_scene(scene.index)?)
    }

    /// Launch the clip in one slot. An empty slot is `CLIP_NOT_FOUND`.
    pub fn launch_clip(
        &self,
        track: &EntityRef,
        scene: &EntityRef,
    ) -> Result<ClipSlot, CommandError> {
        let slot = self
            .clips(scene)?
            .into_iter()
            .find(|slot| slot.track_index == track.index && slot.has_content)
            .ok_or_else(|| {
                CommandError::new(
                    ErrorCode::ClipNotFound,
                    format!(
                        "No clip in track '{}' at scene '{}'",
                        track.name, scene.name
                    ),
                )
            })?;
        self.studio.launch_clip(track.index, scene.index)?;
        Ok(slot)
    }
}

// ── Once-per-process construction ───────────────────────────────────

/// Lazily builds [`Bindings`] exactly once and hands out shared handles.
pub struct BindingsCell {
    studio: Arc<dyn Studio>,
    bindings: OnceLock<Arc<Bindings>>,
    builds: AtomicUsize,
}

impl BindingsCell {
    pub fn new(studio: Arc<dyn Studio>) -> Self {
        Self {
            studio,
            bindings: OnceLock::new(),
            builds: AtomicUsize::new(0),
        }
    }

    pub fn get(&self) -> Arc<Bindings> {
        Arc::clone(self.bindings.get_or_init(|| {
            self.builds.fetch_add(1, Ordering::SeqCst);
            info!("Initializing studio bindings");
            Arc::new(Bindings::new(Arc::clone(&self.studio)))
        }))
    }

    /// How many times the bindings have been constructed (0 or 1).
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}
