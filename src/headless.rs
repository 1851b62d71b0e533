//! In-memory stage and audio for offline runs and tests.
//!
//! [`HeadlessStage`] records everything the sequence does to it, and
//! [`WaveformSoundtrack`] plays a [`Waveform`] against a [`ManualClock`] so a
//! whole sequence can be simulated frame by frame without a browser.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use anyhow::{bail, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::beat::Analyser;
use crate::clock::{Clock, ManualClock, Millis};
use crate::config::SequenceConfig;
use crate::sequence::{ExitReason, SequenceController, SequenceStateKind, TickReport};
use crate::soundtrack::{AudioBackend, SoundCue, Soundtrack};
use crate::stage::{
    Background, BloomPass, BloomSettings, BoundingBox, CameraRig, EffectSpec, Fog, LightSpec,
    ObjectId, OverlayLayer, OverlayRole, SceneGraph, Stage,
};
use crate::waveform::Waveform;

/// Bin count of a default browser analyser (FFT size 2048).
pub const ANALYSER_BINS: usize = 1024;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeadlessCamera {
    pub position: Vec3,
    pub target: Vec3,
    /// Last point passed to `look_at`.
    pub looking_at: Vec3,
    pub user_input_enabled: bool,
}

impl Default for HeadlessCamera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 1.0, 5.0),
            target: Vec3::ZERO,
            looking_at: Vec3::ZERO,
            user_input_enabled: true,
        }
    }
}

impl CameraRig for HeadlessCamera {
    fn position(&self) -> Vec3 {
        self.position
    }
    fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }
    fn target(&self) -> Vec3 {
        self.target
    }
    fn set_target(&mut self, target: Vec3) {
        self.target = target;
    }
    fn look_at(&mut self, point: Vec3) {
        self.looking_at = point;
    }
    fn set_user_input_enabled(&mut self, enabled: bool) {
        self.user_input_enabled = enabled;
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeadlessScene {
    pub background: Background,
    pub fog: Option<Fog>,
    pub ambient_intensity: f32,
    pub directional_intensity: f32,
    pub directional_position: Vec3,
    pub lights: BTreeMap<u64, LightSpec>,
    pub effects: BTreeMap<u64, EffectSpec>,
    next_id: u64,
}

impl Default for HeadlessScene {
    fn default() -> Self {
        Self {
            background: Background::Color([0.93, 0.93, 0.93]),
            fog: None,
            ambient_intensity: 0.6,
            directional_intensity: 0.8,
            directional_position: Vec3::new(5.0, 10.0, 7.5),
            lights: BTreeMap::new(),
            effects: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl HeadlessScene {
    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Objects added by the sequence and not yet removed.
    pub fn object_count(&self) -> usize {
        self.lights.len() + self.effects.len()
    }
}

impl SceneGraph for HeadlessScene {
    fn background(&self) -> Background {
        self.background.clone()
    }
    fn set_background(&mut self, background: Background) {
        self.background = background;
    }
    fn fog(&self) -> Option<Fog> {
        self.fog.clone()
    }
    fn set_fog(&mut self, fog: Option<Fog>) {
        self.fog = fog;
    }
    fn ambient_intensity(&self) -> f32 {
        self.ambient_intensity
    }
    fn set_ambient_intensity(&mut self, intensity: f32) {
        self.ambient_intensity = intensity;
    }
    fn directional_intensity(&self) -> f32 {
        self.directional_intensity
    }
    fn set_directional_intensity(&mut self, intensity: f32) {
        self.directional_intensity = intensity;
    }
    fn directional_position(&self) -> Vec3 {
        self.directional_position
    }
    fn set_directional_position(&mut self, position: Vec3) {
        self.directional_position = position;
    }

    fn add_light(&mut self, light: LightSpec) -> ObjectId {
        let id = self.allocate();
        self.lights.insert(id, light);
        ObjectId(id)
    }

    fn set_light_intensity(&mut self, id: ObjectId, intensity: f32) {
        if let Some(light) = self.lights.get_mut(&id.0) {
            light.intensity = intensity;
        }
    }

    fn add_effect(&mut self, effect: EffectSpec) -> ObjectId {
        let id = self.allocate();
        self.effects.insert(id, effect);
        ObjectId(id)
    }

    fn remove(&mut self, id: ObjectId) {
        self.lights.remove(&id.0);
        self.effects.remove(&id.0);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeadlessOverlays {
    pub created: bool,
    pub opacity: HashMap<OverlayRole, f32>,
}

impl OverlayLayer for HeadlessOverlays {
    fn ensure_overlays(&mut self) {
        if !self.created {
            for role in OverlayRole::ALL {
                self.opacity.entry(role).or_insert(0.0);
            }
            self.created = true;
        }
    }
    fn set_opacity(&mut self, role: OverlayRole, opacity: f32) {
        self.opacity.insert(role, opacity.clamp(0.0, 1.0));
    }
    fn opacity(&self, role: OverlayRole) -> f32 {
        self.opacity.get(&role).copied().unwrap_or(0.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeadlessBloom {
    pub settings: BloomSettings,
}

impl Default for HeadlessBloom {
    fn default() -> Self {
        Self {
            settings: BloomSettings {
                enabled: false,
                strength: 0.5,
                radius: 0.2,
                threshold: 0.85,
            },
        }
    }
}

impl BloomPass for HeadlessBloom {
    fn settings(&self) -> BloomSettings {
        self.settings
    }
    fn apply(&mut self, settings: BloomSettings) {
        self.settings = settings;
    }
}

/// A complete in-memory stage.
///
/// Serializes to camelCase JSON, so a browser page can own the state and
/// mirror it onto its real viewer after each frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeadlessStage {
    pub camera: HeadlessCamera,
    pub scene: HeadlessScene,
    pub overlays: HeadlessOverlays,
    pub bloom: Option<HeadlessBloom>,
    pub model: Option<BoundingBox>,
}

impl Default for HeadlessStage {
    fn default() -> Self {
        Self {
            camera: HeadlessCamera::default(),
            scene: HeadlessScene::default(),
            overlays: HeadlessOverlays::default(),
            bloom: Some(HeadlessBloom::default()),
            model: Some(BoundingBox::from_min_max(
                Vec3::new(-1.0, 0.0, -1.0),
                Vec3::new(1.0, 2.0, 1.0),
            )),
        }
    }
}

impl HeadlessStage {
    /// Borrow the stage for one controller call.
    pub fn stage(&mut self) -> Stage<'_> {
        Stage {
            camera: &mut self.camera,
            scene: &mut self.scene,
            overlays: &mut self.overlays,
            bloom: self.bloom.as_mut().map(|b| b as &mut dyn BloomPass),
            model: self.model,
        }
    }
}

/// Analyser over a [`Waveform`] at the soundtrack's playhead.
struct WaveformAnalyser {
    waveform: Rc<Waveform>,
    time: Millis,
    window: Vec<f32>,
}

impl WaveformAnalyser {
    fn fill_window(&mut self, len: usize) {
        self.window.resize(len, 0.0);
        self.waveform.window(self.time, &mut self.window);
    }
}

impl Analyser for WaveformAnalyser {
    fn bin_count(&self) -> usize {
        ANALYSER_BINS
    }

    fn byte_time_domain_data(&mut self, out: &mut [u8]) {
        self.fill_window(out.len());
        for (byte, s) in out.iter_mut().zip(&self.window) {
            *byte = (128.0 + s.clamp(-1.0, 1.0) * 127.0).round() as u8;
        }
    }

    /// A flat-ish spectrum scaled by the window's RMS level, falling off
    /// toward the high bins. Enough to drive intensity, not a real FFT.
    fn byte_frequency_data(&mut self, out: &mut [u8]) {
        self.fill_window(out.len().max(1) * 2);
        let rms = if self.window.is_empty() {
            0.0
        } else {
            (self.window.iter().map(|s| s * s).sum::<f32>() / self.window.len() as f32).sqrt()
        };
        let bins = out.len().max(1) as f32;
        for (k, byte) in out.iter_mut().enumerate() {
            let falloff = 1.0 - 0.5 * k as f32 / bins;
            *byte = (rms * 2.0 * falloff * 255.0).clamp(0.0, 255.0) as u8;
        }
    }
}

#[derive(Debug)]
struct TrackState {
    volume: f32,
    /// Playhead position when playback was last paused or seeked.
    offset: Millis,
    /// Clock time playback last resumed, while playing.
    resumed_at: Option<Millis>,
}

/// Shared view of one [`WaveformSoundtrack`]'s playback state, readable
/// after the track has been handed to the controller.
#[derive(Clone, Debug)]
pub struct TrackHandle {
    clock: ManualClock,
    duration: Millis,
    state: Rc<RefCell<TrackState>>,
}

impl TrackHandle {
    pub fn volume(&self) -> f32 {
        self.state.borrow().volume
    }

    pub fn is_paused(&self) -> bool {
        self.state.borrow().resumed_at.is_none()
    }

    pub fn current_time_ms(&self) -> Millis {
        let state = self.state.borrow();
        let played = state
            .resumed_at
            .map(|at| self.clock.now_ms() - at)
            .unwrap_or(0.0);
        (state.offset + played).min(self.duration)
    }
}

/// A [`Soundtrack`] that plays a [`Waveform`] against a manual clock.
pub struct WaveformSoundtrack {
    track: TrackHandle,
    reject_play: bool,
    analyser: WaveformAnalyser,
}

impl WaveformSoundtrack {
    pub fn new(waveform: Rc<Waveform>, clock: ManualClock) -> Self {
        Self {
            track: TrackHandle {
                clock,
                duration: waveform.duration_ms(),
                state: Rc::new(RefCell::new(TrackState {
                    volume: 1.0,
                    offset: 0.0,
                    resumed_at: None,
                })),
            },
            reject_play: false,
            analyser: WaveformAnalyser {
                waveform,
                time: 0.0,
                window: Vec::new(),
            },
        }
    }

    /// Make `play` fail, like a browser blocking autoplay.
    pub fn rejecting_playback(mut self) -> Self {
        self.reject_play = true;
        self
    }

    pub fn handle(&self) -> TrackHandle {
        self.track.clone()
    }
}

impl Soundtrack for WaveformSoundtrack {
    fn play(&mut self) -> Result<()> {
        if self.reject_play {
            bail!("Playback was not allowed");
        }
        if self.track.is_paused() {
            let restart = self.has_ended();
            let now = self.track.clock.now_ms();
            let mut state = self.track.state.borrow_mut();
            if restart {
                state.offset = 0.0;
            }
            state.resumed_at = Some(now);
        }
        Ok(())
    }

    fn pause(&mut self) {
        let position = self.track.current_time_ms();
        let mut state = self.track.state.borrow_mut();
        state.offset = position;
        state.resumed_at = None;
    }

    fn is_paused(&self) -> bool {
        self.track.is_paused()
    }

    fn volume(&self) -> f32 {
        self.track.volume()
    }

    fn set_volume(&mut self, volume: f32) {
        self.track.state.borrow_mut().volume = volume.clamp(0.0, 1.0);
    }

    fn current_time_ms(&self) -> Millis {
        self.track.current_time_ms()
    }

    fn set_current_time_ms(&mut self, time: Millis) {
        let now = self.track.clock.now_ms();
        let mut state = self.track.state.borrow_mut();
        state.offset = time.clamp(0.0, self.track.duration);
        if state.resumed_at.is_some() {
            state.resumed_at = Some(now);
        }
    }

    fn duration_ms(&self) -> Option<Millis> {
        (self.track.duration > 0.0).then_some(self.track.duration)
    }

    fn has_ended(&self) -> bool {
        self.track.current_time_ms() >= self.track.duration
    }

    fn analyser(&mut self) -> Option<&mut dyn Analyser> {
        self.analyser.time = self.track.current_time_ms();
        Some(&mut self.analyser)
    }
}

/// Audio backend for headless runs: records cues and hands out one
/// [`WaveformSoundtrack`] per activation.
pub struct HeadlessAudio {
    clock: ManualClock,
    waveform: Option<Rc<Waveform>>,
    reject_playback: bool,
    cues: Rc<RefCell<Vec<SoundCue>>>,
    tracks: Rc<RefCell<Vec<TrackHandle>>>,
}

impl HeadlessAudio {
    pub fn new(clock: ManualClock, waveform: Option<Waveform>) -> Self {
        Self {
            clock,
            waveform: waveform.map(Rc::new),
            reject_playback: false,
            cues: Rc::default(),
            tracks: Rc::default(),
        }
    }

    pub fn rejecting_playback(mut self) -> Self {
        self.reject_playback = true;
        self
    }

    /// Shared log of played cues, readable after the backend is boxed.
    pub fn cue_log(&self) -> Rc<RefCell<Vec<SoundCue>>> {
        Rc::clone(&self.cues)
    }

    /// Every soundtrack handed out so far, in order.
    pub fn track_log(&self) -> Rc<RefCell<Vec<TrackHandle>>> {
        Rc::clone(&self.tracks)
    }
}

impl AudioBackend for HeadlessAudio {
    fn play_cue(&mut self, cue: SoundCue) -> Result<()> {
        log::debug!("Sound cue {:?}", cue);
        self.cues.borrow_mut().push(cue);
        Ok(())
    }

    fn open_soundtrack(&mut self) -> Option<Box<dyn Soundtrack>> {
        let waveform = self.waveform.as_ref()?;
        let track = WaveformSoundtrack::new(Rc::clone(waveform), self.clock.clone());
        self.tracks.borrow_mut().push(track.handle());
        Some(if self.reject_playback {
            Box::new(track.rejecting_playback())
        } else {
            Box::new(track)
        })
    }
}

/// Options for [`simulate`].
#[derive(Clone, Debug)]
pub struct SimulationOptions {
    pub config: SequenceConfig,
    pub waveform: Option<Waveform>,
    pub fps: f32,
    /// Cancel the sequence at this many ms after activation.
    pub cancel_at: Option<Millis>,
    pub seed: u64,
    /// Give up if the sequence is still going after this long.
    pub max_duration_ms: Millis,
    pub reject_playback: bool,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            config: SequenceConfig::default(),
            waveform: None,
            fps: 60.0,
            cancel_at: None,
            seed: 0,
            max_duration_ms: 600_000.0,
            reject_playback: false,
        }
    }
}

/// Frame-by-frame record of a simulated activation.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationTrace {
    pub frames: Vec<TickReport>,
    pub exit: Option<ExitReason>,
    pub sound_cues: Vec<SoundCue>,
    pub beats: usize,
    pub duration_ms: Millis,
    /// Scene objects still present after the sequence went idle.
    pub leftover_objects: usize,
    /// The stage matches its pre-activation state once the sequence is idle.
    pub restored: bool,
}

/// Run one activation against a fresh [`HeadlessStage`] until it is idle.
pub fn simulate(options: SimulationOptions) -> Result<SimulationTrace> {
    if !options.fps.is_finite() || options.fps <= 0.0 {
        bail!("Frame rate must be positive, got {}", options.fps);
    }
    let frame_ms = 1000.0 / options.fps as f64;

    let clock = ManualClock::new(0.0);
    let mut audio = HeadlessAudio::new(clock.clone(), options.waveform);
    if options.reject_playback {
        audio = audio.rejecting_playback();
    }
    let cue_log = audio.cue_log();

    let mut headless = HeadlessStage::default();
    let before = headless.clone();

    let mut controller = SequenceController::new(options.config, Box::new(clock.clone()))
        .with_audio(Box::new(audio))
        .with_seed(options.seed);

    if !controller.activate(&mut headless.stage()) {
        bail!("Sequence refused to activate");
    }

    let mut frames = Vec::new();
    let mut exit = None;
    let mut cancelled = false;
    while controller.state() != SequenceStateKind::Idle {
        clock.advance(frame_ms);
        let now = clock.now_ms();
        if now > options.max_duration_ms {
            bail!("Sequence still running after {:.0} ms", options.max_duration_ms);
        }

        if let Some(at) = options.cancel_at {
            if !cancelled && now >= at && controller.is_active() {
                controller.exit(&mut headless.stage());
                exit = Some(ExitReason::Cancelled);
                cancelled = true;
            }
        }

        let report = controller.update(&mut headless.stage());
        if report.exit.is_some() {
            exit = report.exit;
        }
        frames.push(report);
    }

    let beats = frames
        .iter()
        .filter(|f| f.audio.map(|a| a.beat_onset).unwrap_or(false))
        .count();
    let sound_cues = cue_log.borrow().clone();

    log::info!(
        "Simulated {} frames, {} beats, exit {:?}",
        frames.len(),
        beats,
        exit
    );

    Ok(SimulationTrace {
        exit,
        sound_cues,
        beats,
        duration_ms: clock.now_ms(),
        leftover_objects: headless.scene.object_count(),
        restored: restored_matches(&before, &headless),
        frames,
    })
}

fn restored_matches(before: &HeadlessStage, after: &HeadlessStage) -> bool {
    before.camera.position == after.camera.position
        && before.camera.target == after.camera.target
        && after.camera.user_input_enabled
        && before.scene.background == after.scene.background
        && before.scene.fog == after.scene.fog
        && before.scene.ambient_intensity == after.scene.ambient_intensity
        && before.scene.directional_intensity == after.scene.directional_intensity
        && before.bloom == after.bloom
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beat::waveform_energy;

    fn square_wave(len: usize) -> Waveform {
        let samples = (0..len).map(|i| if i % 2 == 0 { 0.8 } else { -0.8 }).collect();
        Waveform::new(samples, 1_000.0).unwrap()
    }

    #[test]
    fn test_soundtrack_playhead_follows_clock() {
        let clock = ManualClock::new(100.0);
        let mut track = WaveformSoundtrack::new(Rc::new(square_wave(2_000)), clock.clone());
        assert!(track.is_paused());
        assert_eq!(track.duration_ms(), Some(2_000.0));

        track.play().unwrap();
        clock.advance(500.0);
        assert_eq!(track.current_time_ms(), 500.0);

        track.pause();
        clock.advance(500.0);
        assert_eq!(track.current_time_ms(), 500.0);

        track.play().unwrap();
        clock.advance(5_000.0);
        assert!(track.has_ended());
        assert_eq!(track.current_time_ms(), 2_000.0);
    }

    #[test]
    fn test_track_handle_sees_controller_changes() {
        let clock = ManualClock::new(0.0);
        let mut audio = HeadlessAudio::new(clock.clone(), Some(square_wave(5_000)));
        let log = audio.track_log();
        let mut track = audio.open_soundtrack().unwrap();
        let handle = log.borrow()[0].clone();

        track.set_volume(0.4);
        track.play().unwrap();
        clock.advance(1_000.0);
        assert_eq!(handle.volume(), 0.4);
        assert!(!handle.is_paused());
        assert_eq!(handle.current_time_ms(), 1_000.0);

        track.pause();
        track.set_current_time_ms(0.0);
        assert!(handle.is_paused());
        assert_eq!(handle.current_time_ms(), 0.0);
    }

    #[test]
    fn test_headless_stage_json_round_trip() {
        let mut stage = HeadlessStage::default();
        stage.scene.add_effect(EffectSpec {
            kind: crate::stage::EffectKind::LensFlare,
            position: Vec3::new(0.0, 1.0, 2.0),
        });
        stage.overlays.ensure_overlays();
        let json = serde_json::to_string(&stage).unwrap();
        let back: HeadlessStage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stage);

        let partial: HeadlessStage = serde_json::from_str(r#"{ "model": null }"#).unwrap();
        assert!(partial.model.is_none());
        assert_eq!(partial.camera, HeadlessCamera::default());
    }

    #[test]
    fn test_rejected_playback_stays_paused() {
        let clock = ManualClock::new(0.0);
        let mut track = WaveformSoundtrack::new(Rc::new(square_wave(10)), clock).rejecting_playback();
        assert!(track.play().is_err());
        assert!(track.is_paused());
    }

    #[test]
    fn test_analyser_reads_waveform_energy() {
        let clock = ManualClock::new(0.0);
        let mut track = WaveformSoundtrack::new(Rc::new(square_wave(4_000)), clock.clone());
        track.play().unwrap();
        clock.advance(2_000.0);

        let analyser = track.analyser().unwrap();
        let mut bytes = vec![0u8; analyser.bin_count()];
        analyser.byte_time_domain_data(&mut bytes);
        let energy = waveform_energy(&bytes);
        assert!((energy - 101.6).abs() < 1.0, "energy {}", energy);

        analyser.byte_frequency_data(&mut bytes);
        assert!(bytes[0] > bytes[bytes.len() - 1]);
    }

    #[test]
    fn test_scene_ids_are_unique_and_removable() {
        let mut scene = HeadlessScene::default();
        let a = scene.add_effect(EffectSpec {
            kind: crate::stage::EffectKind::EnergyBurst,
            position: Vec3::ZERO,
        });
        let b = scene.add_effect(EffectSpec {
            kind: crate::stage::EffectKind::LensFlare,
            position: Vec3::ZERO,
        });
        assert_ne!(a, b);
        scene.remove(a);
        scene.remove(a);
        assert_eq!(scene.object_count(), 1);
    }
}
