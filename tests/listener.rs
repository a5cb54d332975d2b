#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use studio_bridge::api::HttpListenerFactory;
use studio_bridge::config::{ConfigStore, ListenerConfig};
use studio_bridge::demo::demo_project;
use studio_bridge::device_catalog::DeviceCatalog;
use studio_bridge::resolver::EntityRef;
use studio_bridge::state::AppState;
use studio_bridge::studio::memory::MemoryStudio;
use studio_bridge::studio::{
    ClipSlot, Collection, DeviceState, RemoteControlPage, SceneState, Studio, StudioError,
    TrackChanges, TrackState, TransportState,
};
use studio_bridge::supervisor::{ListenerState, ListenerSupervisor};
use tokio::time::sleep;

/// Memory studio whose project-name read takes a while, so a `status`
/// request is reliably in flight during a restart.
struct SlowStudio {
    inner: MemoryStudio,
    delay: Duration,
}

impl Studio for SlowStudio {
    fn entity_at(&self, collection: Collection, index: usize) -> Option<EntityRef> {
        self.inner.entity_at(collection, index)
    }
    fn entity_named(&self, collection: Collection, name: &str) -> Option<EntityRef> {
        self.inner.entity_named(collection, name)
    }
    fn selected(&self, collection: Collection) -> Option<EntityRef> {
        self.inner.selected(collection)
    }
    fn project_name(&self) -> Result<String, StudioError> {
        std::thread::sleep(self.delay);
        self.inner.project_name()
    }
    fn audio_engine_active(&self) -> Result<bool, StudioError> {
        self.inner.audio_engine_active()
    }
    fn transport(&self) -> Result<TransportState, StudioError> {
        self.inner.transport()
    }
    fn set_playing(&self, playing: bool) -> Result<(), StudioError> {
        self.inner.set_playing(playing)
    }
    fn set_position(&self, beats: f64) -> Result<(), StudioError> {
        self.inner.set_position(beats)
    }
    fn tracks(&self) -> Result<Vec<TrackState>, StudioError> {
        self.inner.tracks()
    }
    fn track(&self, index: usize) -> Result<TrackState, StudioError> {
        self.inner.track(index)
    }
    fn update_track(&self, index: usize, changes: &TrackChanges) -> Result<(), StudioError> {
        self.inner.update_track(index, changes)
    }
    fn set_send(
        &self,
        track: usize,
        send: usize,
        volume: Option<f64>,
        enabled: Option<bool>,
    ) -> Result<(), StudioError> {
        self.inner.set_send(track, send, volume, enabled)
    }
    fn devices(&self, track: usize) -> Result<Vec<DeviceState>, StudioError> {
        self.inner.devices(track)
    }
    fn device(&self, track: usize, device: usize) -> Result<DeviceState, StudioError> {
        self.inner.device(track, device)
    }
    fn selected_device(&self) -> Option<(EntityRef, EntityRef)> {
        self.inner.selected_device()
    }
    fn remote_controls(&self, track: usize, device: usize) -> Result<RemoteControlPage, StudioError> {
        self.inner.remote_controls(track, device)
    }
    fn remote_controls_on_page(
        &self,
        track: usize,
        device: usize,
        page: usize,
    ) -> Result<RemoteControlPage, StudioError> {
        self.inner.remote_controls_on_page(track, device, page)
    }
    fn set_remote_control(
        &self,
        track: usize,
        device: usize,
        index: usize,
        value: f64,
    ) -> Result<(), StudioError> {
        self.inner.set_remote_control(track, device, index, value)
    }
    fn select_remote_page(&self, track: usize, device: usize, page: usize) -> Result<(), StudioError> {
        self.inner.select_remote_page(track, device, page)
    }
    fn scenes(&self) -> Result<Vec<SceneState>, StudioError> {
        self.inner.scenes()
    }
    fn clips_in_scene(&self, scene: usize) -> Result<Vec<ClipSlot>, StudioError> {
        self.inner.clips_in_scene(scene)
    }
    fn launch_scene(&self, scene: usize) -> Result<(), StudioError> {
        self.inner.launch_scene(scene)
    }
    fn launch_clip(&self, track: usize, scene: usize) -> Result<(), StudioError> {
        self.inner.launch_clip(track, scene)
    }
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

struct Harness {
    state: Arc<AppState>,
    store: ConfigStore,
    supervisor: Arc<ListenerSupervisor>,
    client: Client,
}

async fn harness(studio: Arc<dyn Studio>) -> Harness {
    let state = Arc::new(AppState::new(
        studio,
        Arc::new(DeviceCatalog::builtin().unwrap()),
    ));
    let store = ConfigStore::new(ListenerConfig::new("127.0.0.1", free_port()));
    let supervisor = Arc::new(ListenerSupervisor::new(
        Arc::new(HttpListenerFactory::new(Arc::clone(&state))),
        Duration::from_millis(50),
    ));
    let _watcher = Arc::clone(&supervisor).watch_config(store.subscribe(), store.clone());
    supervisor.start(&store.listener_config()).await.unwrap();
    Harness {
        state,
        store,
        supervisor,
        client: Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap(),
    }
}

impl Harness {
    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.supervisor.local_addr().unwrap())
    }

    async fn wait_for_port(&self, port: u16) {
        for _ in 0..200 {
            if self.supervisor.local_addr().map(|a| a.port()) == Some(port)
                && self.supervisor.state() == ListenerState::Running
            {
                return;
            }
            sleep(Duration::from_millis(25)).await;
        }
        panic!("listener never came up on port {port}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[allow(clippy::panic)]
async fn test_commands_over_http() {
    let h = harness(Arc::new(MemoryStudio::new(demo_project()))).await;

    let response = h
        .client
        .post(h.url("/api/command"))
        .json(&json!({"command": "get_track_details", "parameters": {"track_name": "Drums"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["index"], 2);

    let response = h
        .client
        .post(h.url("/api/tools/get_track_details"))
        .json(&json!({"track_index": 3, "track_name": "Drums"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(body["error"]["code"], "INVALID_PARAMETER");
    assert!(body.get("data").is_none());

    let response = h
        .client
        .post(h.url("/api/tools/set_selected_device_parameters"))
        .json(&json!({"parameters": [{"index": 0, "value": 0.5}, {"index": 99, "value": 0.5}]}))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["results"][1]["error_code"], "INVALID_PARAMETER_INDEX");

    let response = h
        .client
        .post(h.url("/api/tools/get_track_details"))
        .json(&json!({"track_name": "Strings"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "TRACK_NOT_FOUND");

    let response = h
        .client
        .post(h.url("/api/command"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let tools: Value = h.client.get(h.url("/api/tools")).send().await.unwrap().json().await.unwrap();
    assert_eq!(tools["data"].as_array().unwrap().len(), h.state.registry.len());

    h.supervisor.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[allow(clippy::panic)]
async fn test_port_change_keeps_in_flight_request_and_bindings() {
    let studio = Arc::new(SlowStudio {
        inner: MemoryStudio::new(demo_project()),
        delay: Duration::from_millis(600),
    });
    let h = harness(studio).await;
    let old_url = h.url("/api/tools/status");
    let bindings_before = h.state.bindings();

    let in_flight = {
        let client = h.client.clone();
        let url = old_url.clone();
        tokio::spawn(async move { client.post(url).send().await })
    };
    sleep(Duration::from_millis(150)).await;

    let new_port = free_port();
    assert!(h.store.set_port(new_port).is_some());
    h.wait_for_port(new_port).await;

    // The request that was running during the restart still completes.
    let response = in_flight.await.unwrap().unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["project_name"], "Demo Song");

    // Later requests go to the new port; the old one is gone.
    let response = h.client.post(h.url("/api/tools/list_scenes")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(h.client.post(&old_url).send().await.is_err());

    assert!(Arc::ptr_eq(&bindings_before, &h.state.bindings()));
    assert_eq!(h.state.bindings_build_count(), 1);
    h.supervisor.stop().await;
    assert_eq!(h.supervisor.state(), ListenerState::Stopped);
}
