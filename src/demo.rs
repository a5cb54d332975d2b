use crate::studio::memory::{
    ClipSnapshot, DeviceSnapshot, PageSnapshot, ParameterSnapshot, ProjectSnapshot,
    SceneSnapshot, SelectionSnapshot, TrackSnapshot, TransportSnapshot,
};
use crate::studio::{DeviceType, Rgb, SendState, TimeSignature, TrackType};

fn page(name: &str, parameters: [&str; 8]) -> PageSnapshot {
    PageSnapshot {
        name: name.to_string(),
        parameters: parameters
            .iter()
            .map(|p| ParameterSnapshot {
                name: (*p).to_string(),
                value: 0.5,
            })
            .collect(),
    }
}

fn device(name: &str, device_type: DeviceType, pages: Vec<PageSnapshot>) -> DeviceSnapshot {
    DeviceSnapshot {
        name: name.to_string(),
        device_type,
        bypassed: false,
        pages,
        page_index: 0,
    }
}

fn synth(name: &str) -> DeviceSnapshot {
    device(
        name,
        DeviceType::Instrument,
        vec![
            page("Oscillators", ["Shape", "Pitch", "Fine", "Sub", "Noise", "Mix", "Spread", "Glide"]),
            page("Filter", ["Cutoff", "Resonance", "Drive", "Env Amt", "Key Track", "Mode", "Attack", "Decay"]),
        ],
    )
}

fn eq() -> DeviceSnapshot {
    device(
        "EQ+",
        DeviceType::AudioFx,
        vec![page("Bands", ["Low Freq", "Low Gain", "Mid Freq", "Mid Gain", "Mid Q", "High Freq", "High Gain", "Output"])],
    )
}

fn compressor() -> DeviceSnapshot {
    device(
        "Compressor",
        DeviceType::AudioFx,
        vec![page("Main", ["Threshold", "Ratio", "Attack", "Release", "Knee", "Makeup", "Mix", "Output"])],
    )
}

fn reverb() -> DeviceSnapshot {
    device(
        "Reverb",
        DeviceType::AudioFx,
        vec![page("Room", ["Size", "Decay", "Pre-Delay", "Damping", "Width", "Early", "Late", "Mix"])],
    )
}

fn clip(name: &str) -> Option<ClipSnapshot> {
    Some(ClipSnapshot {
        name: name.to_string(),
        playing: false,
        recording: false,
        queued: false,
    })
}

fn track(name: &str, track_type: TrackType, color: Rgb, devices: Vec<DeviceSnapshot>) -> TrackSnapshot {
    TrackSnapshot {
        name: name.to_string(),
        track_type,
        parent_group: None,
        activated: true,
        color,
        volume: 0.75,
        pan: 0.5,
        mute: false,
        solo: false,
        arm: false,
        sends: vec![SendState {
            name: "FX Bus".to_string(),
            volume: 0.0,
            enabled: true,
        }],
        devices,
        clips: Vec::new(),
    }
}

/// A small song sketch: five tracks, three scenes, drums selected.
pub fn demo_project() -> ProjectSnapshot {
    let mut bass = track("Bass", TrackType::Instrument, Rgb { r: 217, g: 46, b: 36 }, vec![synth("Polysynth"), eq()]);
    bass.clips = vec![clip("Bass Intro"), clip("Bass Verse"), clip("Bass Chorus")];

    let mut keys = track("Keys", TrackType::Instrument, Rgb { r: 255, g: 148, b: 0 }, vec![synth("FM-4"), reverb()]);
    keys.clips = vec![None, clip("Keys Verse"), clip("Keys Chorus")];

    let mut drums = track("Drums", TrackType::Instrument, Rgb { r: 92, g: 160, b: 52 }, vec![synth("Drum Machine"), compressor()]);
    drums.clips = vec![clip("Beat A"), clip("Beat B"), clip("Beat B Fill")];

    let mut vocals = track("Vocals", TrackType::Audio, Rgb { r: 68, g: 120, b: 201 }, vec![eq(), compressor()]);
    vocals.clips = vec![None, clip("Lead Verse"), clip("Lead Chorus")];

    let mut fx_bus = track("FX Bus", TrackType::Effect, Rgb { r: 149, g: 73, b: 203 }, vec![reverb()]);
    fx_bus.sends.clear();

    ProjectSnapshot {
        name: "Demo Song".to_string(),
        audio_engine_active: true,
        transport: TransportSnapshot {
            playing: false,
            recording: false,
            loop_active: true,
            metronome_active: false,
            tempo: 124.0,
            time_signature: TimeSignature::default(),
            position_beats: 0.0,
        },
        tracks: vec![bass, keys, drums, vocals, fx_bus],
        scenes: ["Intro", "Verse", "Chorus"]
            .iter()
            .map(|name| SceneSnapshot {
                name: (*name).to_string(),
                color: Rgb { r: 128, g: 128, b: 128 },
            })
            .collect(),
        selection: SelectionSnapshot {
            track: Some(2),
            device: Some(0),
            scene: None,
        },
    }
}
