//! Browser bindings.
//!
//! The page keeps its own viewer, audio element and `requestAnimationFrame`
//! loop. [`WasmSequence`] runs the whole controller against page-owned state
//! passed as JSON; the free functions expose the pure parts (phase
//! resolution, beat detection, camera and effect values) on their own.

use std::cell::RefCell;

use glam::Vec3;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use wasm_bindgen::prelude::*;

use crate::beat::{waveform_energy, BeatDetector};
use crate::choreography::AudioCue;
use crate::config::{BeatConfig, SequenceConfig};
use crate::director::EffectsUniforms;
use crate::host::{to_json, HostSequence};
use crate::stage::BoundingBox;
use crate::timeline::{PhaseName, Timeline, NOMINAL_DURATION_MS};

thread_local! {
    static JITTER: RefCell<SmallRng> = RefCell::new(SmallRng::from_os_rng());
}

#[wasm_bindgen]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);
}

#[wasm_bindgen]
pub struct WasmPhaseSample {
    name: PhaseName,
    progress: f32,
}

#[wasm_bindgen]
impl WasmPhaseSample {
    #[wasm_bindgen(getter)]
    pub fn name(&self) -> String {
        self.name.as_str().to_string()
    }

    #[wasm_bindgen(getter)]
    pub fn progress(&self) -> f32 {
        self.progress
    }
}

#[wasm_bindgen]
pub struct WasmTimeline {
    inner: Timeline,
}

#[wasm_bindgen]
impl WasmTimeline {
    /// Pass the soundtrack duration, or 0 / NaN to keep the nominal table.
    #[wasm_bindgen(constructor)]
    pub fn new(audio_duration_ms: f64) -> Self {
        let inner = if audio_duration_ms.is_finite() && audio_duration_ms > 0.0 {
            Timeline::default_table().fitted(audio_duration_ms, NOMINAL_DURATION_MS)
        } else {
            Timeline::default_table()
        };
        Self { inner }
    }

    pub fn resolve(&self, elapsed_ms: f64) -> Option<WasmPhaseSample> {
        self.inner.resolve(elapsed_ms).map(|s| WasmPhaseSample {
            name: s.name,
            progress: s.progress,
        })
    }

    pub fn end_ms(&self) -> f64 {
        self.inner.end_ms()
    }

    /// The phase table as JSON.
    pub fn to_json(&self) -> String {
        to_json(&self.inner, "null")
    }
}

/// The full controller, driven by page timestamps.
///
/// Per frame the page calls `set_playback` and `set_analyser_data`, then
/// `update(performance.now())`, and applies the returned JSON frame:
/// `stage` to its viewer and `audio` (`paused`, `volume`, `seekTo`, `cues`)
/// to its audio element.
#[wasm_bindgen]
pub struct WasmSequence {
    inner: HostSequence,
}

#[wasm_bindgen]
impl WasmSequence {
    /// Build from a JSON sequence config; an empty string uses the defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Self {
        let inner = match HostSequence::from_config_json(config_json) {
            Ok(inner) => inner,
            Err(e) => {
                log::error!("Failed to parse sequence config: {:#}", e);
                HostSequence::new(SequenceConfig::default())
            }
        };
        Self { inner }
    }

    /// Replace the viewer state with the page's current one. Only accepted
    /// while idle.
    pub fn set_stage(&mut self, stage_json: &str) -> bool {
        match self.inner.set_stage_json(stage_json) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to set stage: {:#}", e);
                false
            }
        }
    }

    pub fn set_model_bounds(
        &mut self,
        min_x: f32,
        min_y: f32,
        min_z: f32,
        max_x: f32,
        max_y: f32,
        max_z: f32,
    ) {
        self.inner.set_model(Some(BoundingBox::from_min_max(
            Vec3::new(min_x, min_y, min_z),
            Vec3::new(max_x, max_y, max_z),
        )));
    }

    pub fn clear_model(&mut self) {
        self.inner.set_model(None);
    }

    pub fn set_soundtrack_loaded(&mut self, loaded: bool) {
        self.inner.set_soundtrack_loaded(loaded);
    }

    /// `duration_ms` is the element's `duration * 1000`; NaN or Infinity
    /// for an unknown length.
    pub fn set_playback(&mut self, current_time_ms: f64, duration_ms: f64, ended: bool) {
        self.inner.set_playback(current_time_ms, Some(duration_ms), ended);
    }

    pub fn set_analyser_data(&mut self, time_domain: &[u8], frequency: &[u8]) {
        self.inner.set_analyser_data(time_domain, frequency);
    }

    /// Returns false when the sequence is already active or no model is set.
    /// Follow with `pending_frame` to pick up the first cues.
    pub fn activate(&mut self, now_ms: f64) -> bool {
        self.inner.activate(now_ms)
    }

    pub fn update(&mut self, now_ms: f64) -> String {
        to_json(&self.inner.update(now_ms), "null")
    }

    pub fn exit(&mut self, now_ms: f64) -> String {
        to_json(&self.inner.exit(now_ms), "null")
    }

    pub fn pending_frame(&mut self) -> String {
        to_json(&self.inner.pending_frame(), "null")
    }

    /// `idle`, `priming`, `running` or `exiting`.
    pub fn state(&self) -> String {
        self.inner.state().as_str().to_string()
    }
}

#[wasm_bindgen]
pub struct WasmBeatDetector {
    inner: BeatDetector,
}

#[wasm_bindgen]
impl WasmBeatDetector {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            inner: BeatDetector::new(BeatConfig::default()),
        }
    }

    /// Build a detector from a JSON `BeatConfig`. Falls back to defaults on
    /// a parse error.
    pub fn with_config(json: &str) -> Self {
        let config = match serde_json::from_str::<BeatConfig>(json) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Failed to parse beat config: {}", e);
                BeatConfig::default()
            }
        };
        Self {
            inner: BeatDetector::new(config),
        }
    }

    /// Feed one `getByteTimeDomainData` buffer. Returns true on a new beat.
    pub fn push_time_domain(&mut self, data: &[u8], now_ms: f64) -> bool {
        self.inner.push_energy(waveform_energy(data), now_ms)
    }

    pub fn beat_count(&self) -> u32 {
        self.inner.beat_count()
    }

    pub fn is_strong_beat(&self) -> bool {
        self.inner.is_strong_beat()
    }

    pub fn in_beat(&self) -> bool {
        self.inner.in_beat()
    }

    pub fn reset(&mut self) {
        self.inner.reset();
    }
}

impl Default for WasmBeatDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Effect levels as `[keyLight, bloomStrength, bloomRadius, vignette, grain,
/// letterbox]`. Empty for an unknown phase name.
#[wasm_bindgen]
pub fn compute_effects(phase: &str, progress: f32) -> Vec<f32> {
    match phase.parse::<PhaseName>() {
        Ok(phase) => {
            let uniforms = EffectsUniforms::from(crate::director::compute_effects(phase, progress));
            uniforms.as_floats().to_vec()
        }
        Err(e) => {
            log::warn!("{}", e);
            Vec::new()
        }
    }
}

/// Camera pose as `[px, py, pz, tx, ty, tz]`. Empty for an unknown phase
/// name or an unusable model box.
#[wasm_bindgen]
#[allow(clippy::too_many_arguments)]
pub fn compute_camera(
    phase: &str,
    progress: f32,
    intensity: f32,
    beat_active: bool,
    punch: f32,
    center_x: f32,
    center_y: f32,
    center_z: f32,
    max_extent: f32,
) -> Vec<f32> {
    let phase = match phase.parse::<PhaseName>() {
        Ok(phase) => phase,
        Err(e) => {
            log::warn!("{}", e);
            return Vec::new();
        }
    };
    let bounds = BoundingBox {
        center: Vec3::new(center_x, center_y, center_z),
        max_extent,
    };
    if !bounds.is_usable() {
        return Vec::new();
    }
    let cue = AudioCue {
        intensity,
        beat_active,
        punch,
    };
    let pose = JITTER.with(|rng| {
        crate::choreography::compute_camera(phase, progress, &cue, &bounds, &mut *rng.borrow_mut())
    });
    let mut out = pose.position.to_array().to_vec();
    out.extend_from_slice(&pose.look_target.to_array());
    out
}

#[wasm_bindgen]
pub fn is_supported_audio_file(name: &str) -> bool {
    crate::soundtrack::is_supported_audio_file(name)
}
