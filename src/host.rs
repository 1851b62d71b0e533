//! A sequence driven by an outside host through plain data.
//!
//! The host (a browser page) owns the real viewer and `<audio>` element. Each
//! frame it pushes the element's playhead and analyser bytes in, calls
//! [`HostSequence::update`] with its own frame timestamp, and mirrors the
//! returned [`HostFrame`] onto the page: the stage state for the viewer, and
//! the audio commands for the element.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::beat::Analyser;
use crate::clock::{Clock, ManualClock, Millis};
use crate::config::SequenceConfig;
use crate::headless::HeadlessStage;
use crate::sequence::{SequenceController, SequenceStateKind, TickReport};
use crate::soundtrack::{AudioBackend, SoundCue, Soundtrack};
use crate::stage::BoundingBox;

/// Serialize for the host, logging failures and answering `fallback`.
pub fn to_json<T: Serialize + ?Sized>(value: &T, fallback: &str) -> String {
    match serde_json::to_string(value) {
        Ok(json) => json,
        Err(e) => {
            log::error!("Failed to serialize for the host: {}", e);
            fallback.to_string()
        }
    }
}

/// What the page reported about its audio element, plus the commands the
/// controller has issued since the last frame.
#[derive(Debug)]
struct HostAudioState {
    loaded: bool,
    duration_ms: Option<Millis>,
    current_time_ms: Millis,
    ended: bool,
    paused: bool,
    volume: f32,
    seek: Option<Millis>,
    time_domain: Vec<u8>,
    frequency: Vec<u8>,
    cues: Vec<SoundCue>,
}

impl Default for HostAudioState {
    fn default() -> Self {
        Self {
            loaded: false,
            duration_ms: None,
            current_time_ms: 0.0,
            ended: false,
            paused: true,
            volume: 1.0,
            seek: None,
            time_domain: Vec::new(),
            frequency: Vec::new(),
            cues: Vec::new(),
        }
    }
}

type SharedAudio = Rc<RefCell<HostAudioState>>;

/// The page's soundtrack element, seen through the shared state.
struct HostSoundtrack {
    state: SharedAudio,
}

impl Soundtrack for HostSoundtrack {
    fn play(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if !state.loaded {
            bail!("Soundtrack was unloaded");
        }
        if state.ended {
            state.ended = false;
            state.current_time_ms = 0.0;
            state.seek = Some(0.0);
        }
        state.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        self.state.borrow_mut().paused = true;
    }

    fn is_paused(&self) -> bool {
        self.state.borrow().paused
    }

    fn volume(&self) -> f32 {
        self.state.borrow().volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.state.borrow_mut().volume = volume.clamp(0.0, 1.0);
    }

    fn current_time_ms(&self) -> Millis {
        self.state.borrow().current_time_ms
    }

    fn set_current_time_ms(&mut self, time: Millis) {
        let mut state = self.state.borrow_mut();
        state.current_time_ms = time.max(0.0);
        state.ended = false;
        state.seek = Some(state.current_time_ms);
    }

    fn duration_ms(&self) -> Option<Millis> {
        self.state.borrow().duration_ms
    }

    fn has_ended(&self) -> bool {
        self.state.borrow().ended
    }

    fn analyser(&mut self) -> Option<&mut dyn Analyser> {
        if self.state.borrow().time_domain.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

impl Analyser for HostSoundtrack {
    fn bin_count(&self) -> usize {
        let state = self.state.borrow();
        state.time_domain.len().max(state.frequency.len())
    }

    fn byte_time_domain_data(&mut self, out: &mut [u8]) {
        let state = self.state.borrow();
        for (k, byte) in out.iter_mut().enumerate() {
            *byte = state.time_domain.get(k).copied().unwrap_or(128);
        }
    }

    fn byte_frequency_data(&mut self, out: &mut [u8]) {
        let state = self.state.borrow();
        for (k, byte) in out.iter_mut().enumerate() {
            *byte = state.frequency.get(k).copied().unwrap_or(0);
        }
    }
}

struct HostAudio {
    state: SharedAudio,
}

impl AudioBackend for HostAudio {
    fn play_cue(&mut self, cue: SoundCue) -> Result<()> {
        self.state.borrow_mut().cues.push(cue);
        Ok(())
    }

    fn open_soundtrack(&mut self) -> Option<Box<dyn Soundtrack>> {
        {
            let mut state = self.state.borrow_mut();
            if !state.loaded {
                return None;
            }
            state.paused = true;
            state.seek = None;
        }
        Some(Box::new(HostSoundtrack {
            state: Rc::clone(&self.state),
        }))
    }
}

/// What the page should do with its audio this frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioCommands {
    /// Desired state of the soundtrack element.
    pub paused: bool,
    pub volume: f32,
    /// Move the element's playhead here.
    pub seek_to: Option<Millis>,
    /// One-shot cues to start now.
    pub cues: Vec<SoundCue>,
}

/// Everything the page needs to mirror after one call.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostFrame<'a> {
    /// Present for `update`, absent after `activate` or `exit`.
    pub report: Option<TickReport>,
    pub stage: &'a HeadlessStage,
    pub audio: AudioCommands,
}

/// A [`SequenceController`] bound to host-owned state.
pub struct HostSequence {
    clock: ManualClock,
    stage: HeadlessStage,
    audio: SharedAudio,
    controller: SequenceController,
}

impl HostSequence {
    pub fn new(config: SequenceConfig) -> Self {
        let clock = ManualClock::new(0.0);
        let audio = SharedAudio::default();
        let controller = SequenceController::new(config, Box::new(clock.clone())).with_audio(
            Box::new(HostAudio {
                state: Rc::clone(&audio),
            }),
        );
        Self {
            clock,
            stage: HeadlessStage::default(),
            audio,
            controller,
        }
    }

    /// Build from a JSON [`SequenceConfig`]. An empty string means defaults.
    pub fn from_config_json(json: &str) -> Result<Self> {
        let config = if json.trim().is_empty() {
            SequenceConfig::default()
        } else {
            SequenceConfig::from_json_str(json)?
        };
        Ok(Self::new(config))
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.controller = self.controller.with_seed(seed);
        self
    }

    pub fn state(&self) -> SequenceStateKind {
        self.controller.state()
    }

    pub fn stage(&self) -> &HeadlessStage {
        &self.stage
    }

    /// Replace the viewer state. Only allowed while idle, since an active
    /// sequence is the sole writer of the stage.
    pub fn set_stage(&mut self, stage: HeadlessStage) -> Result<()> {
        if self.state() != SequenceStateKind::Idle {
            bail!("Stage can only be replaced while the sequence is idle");
        }
        self.stage = stage;
        Ok(())
    }

    pub fn set_stage_json(&mut self, json: &str) -> Result<()> {
        let stage: HeadlessStage = serde_json::from_str(json).context("Failed to parse stage")?;
        self.set_stage(stage)
    }

    /// The model can come and go at any time; the camera holds while it is
    /// missing.
    pub fn set_model(&mut self, model: Option<BoundingBox>) {
        self.stage.model = model;
    }

    /// Whether a custom soundtrack is loaded into the audio element.
    pub fn set_soundtrack_loaded(&mut self, loaded: bool) {
        self.audio.borrow_mut().loaded = loaded;
    }

    /// Report the element's playhead. A duration that is unknown, infinite
    /// or NaN is passed as `None`.
    pub fn set_playback(&mut self, current_time_ms: Millis, duration_ms: Option<Millis>, ended: bool) {
        let mut audio = self.audio.borrow_mut();
        if audio.seek.is_none() {
            audio.current_time_ms = current_time_ms;
        }
        audio.duration_ms = duration_ms.filter(|d| d.is_finite() && *d > 0.0);
        audio.ended = ended;
    }

    /// Latest `getByteTimeDomainData` / `getByteFrequencyData` buffers.
    /// Empty buffers mean there is no analyser.
    pub fn set_analyser_data(&mut self, time_domain: &[u8], frequency: &[u8]) {
        let mut audio = self.audio.borrow_mut();
        audio.time_domain.clear();
        audio.time_domain.extend_from_slice(time_domain);
        audio.frequency.clear();
        audio.frequency.extend_from_slice(frequency);
    }

    pub fn activate(&mut self, now: Millis) -> bool {
        self.set_time(now);
        self.controller.activate(&mut self.stage.stage())
    }

    pub fn update(&mut self, now: Millis) -> HostFrame<'_> {
        self.set_time(now);
        let report = self.controller.update(&mut self.stage.stage());
        self.frame(Some(report))
    }

    pub fn exit(&mut self, now: Millis) -> HostFrame<'_> {
        self.set_time(now);
        self.controller.exit(&mut self.stage.stage());
        self.frame(None)
    }

    /// Current stage and any audio commands not yet handed out.
    pub fn pending_frame(&mut self) -> HostFrame<'_> {
        self.frame(None)
    }

    fn set_time(&self, now: Millis) {
        // Host timestamps may jitter backwards; the sequence only moves forward.
        self.clock.set(now.max(self.clock.now_ms()));
    }

    fn frame(&mut self, report: Option<TickReport>) -> HostFrame<'_> {
        let mut audio = self.audio.borrow_mut();
        let commands = AudioCommands {
            paused: audio.paused,
            volume: audio.volume,
            seek_to: audio.seek.take(),
            cues: std::mem::take(&mut audio.cues),
        };
        drop(audio);
        HostFrame {
            report,
            stage: &self.stage,
            audio: commands,
        }
    }
}
