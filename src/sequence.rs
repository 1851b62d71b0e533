//! The cinematic sequence controller.
//!
//! An explicit state machine, `Idle → Priming → Running → Exiting → Idle`,
//! driven by a single per-frame [`SequenceController::update`] call. Nothing
//! runs on its own timer: pre-sequence cues, phase resolution, effect
//! lifetimes and audio fades are all polled against the clock on each tick.
//! Leaving the active states drops the whole session, so a pending cue can
//! never fire into a sequence that has already exited.
//!
//! ## Lifecycle
//!
//! - **Priming** starts at activation: the scene is snapshotted, user input is
//!   disabled, the cinematic look is applied and the one-shot cues (drone,
//!   bass thump, reveal lighting and music) fire at their offsets.
//! - **Running** starts with the showcase cue: each tick samples the audio,
//!   resolves the phase table, and applies camera, lights and overlays.
//! - **Exiting** restores the snapshot immediately, then fades the overlays
//!   and the soundtrack before returning to **Idle**.

use glam::Vec3;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::beat::{AudioSnapshot, BeatDetector};
use crate::choreography::{beat_shake, compute_camera, AudioCue, PoseRecord};
use crate::clock::{Clock, Millis};
use crate::config::SequenceConfig;
use crate::director::{compute_effects, EffectsFrame, SHOWCASE_EFFECTS};
use crate::soundtrack::{AudioBackend, AudioFade, FadeStatus, SoundCue, Soundtrack};
use crate::stage::{
    rgb_hex, Background, BloomSettings, BoundingBox, EffectKind, EffectSpec, Fog, LightKind,
    LightSpec, ObjectId, OverlayLayer, OverlayRole, SceneSnapshot, Stage,
};
use crate::timeline::{PhaseSample, Timeline};

const CINEMATIC_BACKGROUND: Background = Background::Color([0.0, 0.0, 0.0]);
const CINEMATIC_AMBIENT: f32 = 0.1;
const CINEMATIC_DIRECTIONAL: f32 = 0.2;
const RIM_LIGHT_COLOR: u32 = 0x4488ff;
const RIM_LIGHT_INTENSITY: f32 = 1.2;

fn cinematic_fog() -> Fog {
    Fog {
        color: [0.0, 0.0, 0.0],
        near: 1.0,
        far: 30.0,
    }
}

/// Observable state of the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SequenceStateKind {
    Idle,
    Priming,
    Running,
    Exiting,
}

impl SequenceStateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SequenceStateKind::Idle => "idle",
            SequenceStateKind::Priming => "priming",
            SequenceStateKind::Running => "running",
            SequenceStateKind::Exiting => "exiting",
        }
    }
}

/// Why the sequence left the running states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ExitReason {
    TimelineComplete,
    SoundtrackEnded,
    FallbackTimeout,
    Cancelled,
}

/// One-shot cues scheduled relative to activation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CueKind {
    AmbientDrone,
    BassThump,
    Reveal,
    Showcase,
    LensFlare,
    FallbackExit,
}

/// What a single update did.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    /// Time since activation (0 while idle).
    pub elapsed: Millis,
    pub state: SequenceStateKind,
    pub cues: Vec<CueKind>,
    pub phase: Option<PhaseSample>,
    pub audio: Option<AudioSnapshot>,
    /// A strong beat started on this tick.
    pub strong_beat: bool,
    pub camera: Option<PoseRecord>,
    pub effects: Option<EffectsFrame>,
    pub exit: Option<ExitReason>,
}

impl TickReport {
    fn new(elapsed: Millis, state: SequenceStateKind) -> Self {
        Self {
            elapsed,
            state,
            cues: Vec::new(),
            phase: None,
            audio: None,
            strong_beat: false,
            camera: None,
            effects: None,
            exit: None,
        }
    }
}

/// Pending cues, ordered by offset.
struct CueSchedule {
    pending: Vec<(Millis, CueKind)>,
}

impl CueSchedule {
    fn from_config(config: &SequenceConfig) -> Self {
        let offsets = &config.cues;
        let mut pending = vec![
            (offsets.ambient_drone, CueKind::AmbientDrone),
            (offsets.bass_thump, CueKind::BassThump),
            (offsets.reveal, CueKind::Reveal),
            (offsets.showcase, CueKind::Showcase),
            (offsets.lens_flare, CueKind::LensFlare),
            (offsets.fallback_exit, CueKind::FallbackExit),
        ];
        // Stable sort keeps declaration order for cues sharing an offset.
        pending.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { pending }
    }

    /// Remove and return every cue due at `elapsed`.
    fn take_due(&mut self, elapsed: Millis) -> Vec<CueKind> {
        let due = self.pending.iter().take_while(|(at, _)| *at <= elapsed).count();
        self.pending.drain(..due).map(|(_, cue)| cue).collect()
    }
}

/// A decoration with a limited lifetime.
struct Transient {
    id: ObjectId,
    expires_at: Millis,
}

/// Everything owned by one activation.
struct Session {
    snapshot: SceneSnapshot,
    activated_at: Millis,
    cues: CueSchedule,
    showcase_started_at: Option<Millis>,
    timeline: Timeline,
    soundtrack: Option<Box<dyn Soundtrack>>,
    music_fade: Option<AudioFade>,
    beats: BeatDetector,
    key_light: Option<ObjectId>,
    rim_light: Option<ObjectId>,
    lens_flare: Option<ObjectId>,
    transients: Vec<Transient>,
    boost_until: Option<Millis>,
    strong_beat_at: Option<Millis>,
    warned_no_analyser: bool,
    warned_no_model: bool,
}

impl Session {
    fn is_running(&self) -> bool {
        self.showcase_started_at.is_some()
    }

    fn kind(&self) -> SequenceStateKind {
        if self.is_running() {
            SequenceStateKind::Running
        } else {
            SequenceStateKind::Priming
        }
    }

    /// Read the soundtrack's analyser, if there is one.
    fn sample_audio(&mut self, now: Millis) -> Option<AudioSnapshot> {
        let track = self.soundtrack.as_deref_mut()?;
        match track.analyser() {
            Some(analyser) => Some(self.beats.sample(analyser, now)),
            None => {
                if !self.warned_no_analyser {
                    log::warn!("Soundtrack has no analyser, camera will not react to audio");
                    self.warned_no_analyser = true;
                }
                None
            }
        }
    }

    fn expire_transients(&mut self, stage: &mut Stage<'_>, now: Millis) {
        self.transients.retain(|t| {
            if t.expires_at <= now {
                stage.scene.remove(t.id);
                false
            } else {
                true
            }
        });
    }

    /// Remove every object the session added to the scene.
    fn clear_scene_objects(&mut self, stage: &mut Stage<'_>) {
        for id in [self.key_light.take(), self.rim_light.take(), self.lens_flare.take()]
            .into_iter()
            .flatten()
        {
            stage.scene.remove(id);
        }
        for transient in self.transients.drain(..) {
            stage.scene.remove(transient.id);
        }
    }
}

/// Overlay and audio wind-down after the snapshot has been restored.
struct Fadeout {
    started_at: Millis,
    overlay_start: Vec<(OverlayRole, f32)>,
    soundtrack: Option<Box<dyn Soundtrack>>,
    fade: Option<AudioFade>,
}

impl Fadeout {
    fn stop_soundtrack(&mut self) {
        if let Some(mut track) = self.soundtrack.take() {
            track.pause();
            track.set_current_time_ms(0.0);
        }
        self.fade = None;
    }
}

enum SequenceState {
    Idle,
    Priming(Box<Session>),
    Running(Box<Session>),
    Exiting(Fadeout),
}

impl SequenceState {
    fn kind(&self) -> SequenceStateKind {
        match self {
            SequenceState::Idle => SequenceStateKind::Idle,
            SequenceState::Priming(_) => SequenceStateKind::Priming,
            SequenceState::Running(_) => SequenceStateKind::Running,
            SequenceState::Exiting(_) => SequenceStateKind::Exiting,
        }
    }
}

/// Drives the cinematic sequence against a [`Stage`].
pub struct SequenceController {
    config: SequenceConfig,
    /// Phase table before it is fitted to a soundtrack.
    timeline: Timeline,
    clock: Box<dyn Clock>,
    audio: Option<Box<dyn AudioBackend>>,
    rng: SmallRng,
    state: SequenceState,
}

impl SequenceController {
    pub fn new(config: SequenceConfig, clock: Box<dyn Clock>) -> Self {
        let timeline = match config.timeline() {
            Ok(timeline) => timeline,
            Err(e) => {
                log::warn!("{:#}, using the default phase table", e);
                Timeline::default_table()
            }
        };
        Self {
            config,
            timeline,
            clock,
            audio: None,
            rng: SmallRng::from_os_rng(),
            state: SequenceState::Idle,
        }
    }

    /// Attach host audio. Without it the sequence runs silently.
    pub fn with_audio(mut self, audio: Box<dyn AudioBackend>) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Seed the camera jitter for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    pub fn state(&self) -> SequenceStateKind {
        self.state.kind()
    }

    /// True while priming or running.
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            SequenceState::Priming(_) | SequenceState::Running(_)
        )
    }

    /// The snapshot taken at the current activation, if any.
    pub fn snapshot(&self) -> Option<&SceneSnapshot> {
        match &self.state {
            SequenceState::Priming(s) | SequenceState::Running(s) => Some(&s.snapshot),
            _ => None,
        }
    }

    /// The phase table in use, once the showcase has started.
    pub fn timeline(&self) -> Option<&Timeline> {
        match &self.state {
            SequenceState::Running(s) => Some(&s.timeline),
            _ => None,
        }
    }

    /// Start the sequence.
    ///
    /// Returns false (and changes nothing) when not idle or when no usable
    /// model is loaded.
    pub fn activate(&mut self, stage: &mut Stage<'_>) -> bool {
        if !matches!(self.state, SequenceState::Idle) {
            log::debug!("Ignoring activation while {:?}", self.state.kind());
            return false;
        }
        if stage.framing().is_none() {
            log::warn!("Cinematic sequence needs a loaded model, activation ignored");
            return false;
        }

        let now = self.clock.now_ms();
        let snapshot = SceneSnapshot::capture(stage);

        stage.camera.set_user_input_enabled(false);
        match stage.bloom.as_mut() {
            Some(bloom) => bloom.apply(BloomSettings::CINEMATIC),
            None => log::warn!("No bloom pass available, running without bloom"),
        }
        stage.scene.set_background(CINEMATIC_BACKGROUND);
        stage.scene.set_fog(Some(cinematic_fog()));
        stage.scene.set_ambient_intensity(CINEMATIC_AMBIENT);
        stage.scene.set_directional_intensity(CINEMATIC_DIRECTIONAL);
        stage.overlays.ensure_overlays();

        let mut session = Box::new(Session {
            snapshot,
            activated_at: now,
            cues: CueSchedule::from_config(&self.config),
            showcase_started_at: None,
            timeline: self.timeline.clone(),
            soundtrack: None,
            music_fade: None,
            beats: BeatDetector::new(self.config.beat.clone()),
            key_light: None,
            rim_light: None,
            lens_flare: None,
            transients: Vec::new(),
            boost_until: None,
            strong_beat_at: None,
            warned_no_analyser: false,
            warned_no_model: false,
        });

        log::info!("Cinematic sequence activated");

        let mut report = TickReport::new(0.0, SequenceStateKind::Priming);
        let exit = self.fire_due_cues(&mut session, stage, now, &mut report);
        self.state = match exit {
            Some(reason) => SequenceState::Exiting(self.begin_exit(session, stage, now, reason)),
            None if session.is_running() => SequenceState::Running(session),
            None => SequenceState::Priming(session),
        };
        true
    }

    /// Advance the sequence. Safe to call every frame in any state.
    pub fn update(&mut self, stage: &mut Stage<'_>) -> TickReport {
        let now = self.clock.now_ms();
        let state = std::mem::replace(&mut self.state, SequenceState::Idle);

        let (next, report) = match state {
            SequenceState::Idle => (SequenceState::Idle, TickReport::new(0.0, SequenceStateKind::Idle)),
            SequenceState::Priming(session) | SequenceState::Running(session) => {
                self.tick_session(session, stage, now)
            }
            SequenceState::Exiting(fadeout) => self.tick_fadeout(fadeout, stage, now),
        };

        self.state = next;
        report
    }

    /// Cancel the sequence from any state.
    ///
    /// From priming or running this restores the snapshot and starts the
    /// fade-out; otherwise it does nothing.
    pub fn exit(&mut self, stage: &mut Stage<'_>) {
        let now = self.clock.now_ms();
        let state = std::mem::replace(&mut self.state, SequenceState::Idle);
        self.state = match state {
            SequenceState::Priming(session) | SequenceState::Running(session) => {
                SequenceState::Exiting(self.begin_exit(session, stage, now, ExitReason::Cancelled))
            }
            other => other,
        };
    }

    fn tick_session(
        &mut self,
        mut session: Box<Session>,
        stage: &mut Stage<'_>,
        now: Millis,
    ) -> (SequenceState, TickReport) {
        let elapsed = now - session.activated_at;
        let mut report = TickReport::new(elapsed, session.kind());

        session.expire_transients(stage, now);

        let mut exit = self.fire_due_cues(&mut session, stage, now, &mut report);

        let fade_done = match (session.soundtrack.as_deref_mut(), session.music_fade.as_mut()) {
            (Some(track), Some(fade)) => fade.advance(track, now) != FadeStatus::Running,
            _ => false,
        };
        if fade_done {
            session.music_fade = None;
        }

        if exit.is_none() && session.is_running() {
            exit = self.tick_showcase(&mut session, stage, now, &mut report);
        }

        report.state = session.kind();
        match exit {
            Some(reason) => {
                report.exit = Some(reason);
                report.state = SequenceStateKind::Exiting;
                let fadeout = self.begin_exit(session, stage, now, reason);
                (SequenceState::Exiting(fadeout), report)
            }
            None if session.is_running() => (SequenceState::Running(session), report),
            None => (SequenceState::Priming(session), report),
        }
    }

    /// Per-frame work once the showcase has started.
    fn tick_showcase(
        &mut self,
        session: &mut Session,
        stage: &mut Stage<'_>,
        now: Millis,
        report: &mut TickReport,
    ) -> Option<ExitReason> {
        let showcase_elapsed = now - session.showcase_started_at.unwrap_or(now);

        let audio = session.sample_audio(now);
        report.audio = audio;
        let cue = match &audio {
            Some(snapshot) => AudioCue::from_snapshot(snapshot, now, self.config.beat.punch_window_ms),
            None => AudioCue::neutral(),
        };

        let framing = stage.framing();
        if framing.is_none() && !session.warned_no_model {
            log::warn!("Model unavailable, holding the camera");
            session.warned_no_model = true;
        }

        if audio.map(|a| a.beat_onset).unwrap_or(false) && session.beats.is_strong_beat() {
            log::debug!("Strong beat #{}", session.beats.beat_count());
            report.strong_beat = true;
            session.boost_until = Some(now + self.config.strong_beat_boost_ms);
            session.strong_beat_at = Some(now);
            if let Some(bounds) = framing {
                let id = stage.scene.add_effect(EffectSpec {
                    kind: EffectKind::BeatParticles,
                    position: bounds.center,
                });
                session.transients.push(Transient {
                    id,
                    expires_at: now + self.config.beat_particles_lifetime_ms,
                });
            }
        }

        if let Some(sample) = session.timeline.resolve(showcase_elapsed) {
            report.phase = Some(sample);

            if let Some(bounds) = framing {
                let mut pose = compute_camera(sample.name, sample.progress, &cue, &bounds, &mut self.rng);
                if let Some(at) = session.strong_beat_at {
                    pose.position += beat_shake(
                        now - at,
                        self.config.strong_beat_shake_ms,
                        self.config.strong_beat_shake,
                        &mut self.rng,
                    );
                }
                if pose.is_finite() {
                    stage.camera.set_position(pose.position);
                    stage.camera.look_at(pose.look_target);
                    stage.camera.set_target(bounds.center);
                    report.camera = Some(pose.into());
                } else {
                    log::warn!("Dropping non-finite camera pose in {}", sample.name);
                }
            }

            let effects = compute_effects(sample.name, sample.progress);
            self.apply_effects(session, stage, &effects, now);
            report.effects = Some(effects);
        }

        if session.soundtrack.as_ref().map(|t| t.has_ended()).unwrap_or(false) {
            return Some(ExitReason::SoundtrackEnded);
        }
        if showcase_elapsed >= session.timeline.end_ms() {
            return Some(ExitReason::TimelineComplete);
        }
        None
    }

    fn apply_effects(
        &self,
        session: &Session,
        stage: &mut Stage<'_>,
        effects: &EffectsFrame,
        now: Millis,
    ) {
        apply_overlays(&mut *stage.overlays, effects);

        if let Some(key) = session.key_light {
            let boosted = session.boost_until.map(|until| now < until).unwrap_or(false);
            let intensity = if boosted {
                effects.key_light_intensity * self.config.strong_beat_boost
            } else {
                effects.key_light_intensity
            };
            stage.scene.set_light_intensity(key, intensity);
        }

        if let Some(bloom) = stage.bloom.as_mut() {
            let mut settings = bloom.settings();
            settings.strength = effects.bloom_strength;
            settings.radius = effects.bloom_radius;
            bloom.apply(settings);
        }
    }

    /// Fire every cue that has come due. Returns an exit request if the
    /// fallback timeout fired with no soundtrack playing.
    fn fire_due_cues(
        &mut self,
        session: &mut Session,
        stage: &mut Stage<'_>,
        now: Millis,
        report: &mut TickReport,
    ) -> Option<ExitReason> {
        let elapsed = now - session.activated_at;
        for cue in session.cues.take_due(elapsed) {
            log::debug!("Cue {:?} at {:.0} ms", cue, elapsed);
            report.cues.push(cue);
            match cue {
                CueKind::AmbientDrone => self.play_cue(SoundCue::AmbientDrone),
                CueKind::BassThump => {
                    self.play_cue(SoundCue::BassThump);
                    if let Some(bounds) = stage.framing() {
                        let id = stage.scene.add_effect(EffectSpec {
                            kind: EffectKind::EnergyBurst,
                            position: bounds.center,
                        });
                        session.transients.push(Transient {
                            id,
                            expires_at: now + self.config.energy_burst_lifetime_ms,
                        });
                    }
                }
                CueKind::Reveal => {
                    if let Some(bounds) = stage.framing() {
                        add_reveal_lights(session, stage, &bounds);
                    }
                    self.start_music(session, now);
                }
                CueKind::Showcase => {
                    apply_overlays(&mut *stage.overlays, &SHOWCASE_EFFECTS);
                    // The music has been playing since the reveal, so only the
                    // rest of the track is left for the phase table.
                    let remaining = session
                        .soundtrack
                        .as_ref()
                        .and_then(|t| t.duration_ms().map(|d| d - t.current_time_ms()));
                    session.timeline = match remaining {
                        Some(remaining) => self.timeline.fitted(remaining, self.config.nominal_duration_ms),
                        None => self.timeline.clone(),
                    };
                    session.showcase_started_at = Some(now);
                    log::info!(
                        "Showcase started, timeline {:.0} ms",
                        session.timeline.end_ms()
                    );
                }
                CueKind::LensFlare => {
                    if let Some(bounds) = stage.framing() {
                        if let Some(old) = session.lens_flare.take() {
                            stage.scene.remove(old);
                        }
                        session.lens_flare = Some(stage.scene.add_effect(EffectSpec {
                            kind: EffectKind::LensFlare,
                            position: bounds.center + Vec3::Z * bounds.max_extent,
                        }));
                    }
                }
                CueKind::FallbackExit => {
                    if session.soundtrack.is_none() {
                        return Some(ExitReason::FallbackTimeout);
                    }
                }
            }
        }
        None
    }

    fn play_cue(&mut self, cue: SoundCue) {
        if let Some(audio) = self.audio.as_mut() {
            if let Err(e) = audio.play_cue(cue) {
                log::warn!("Sound cue {:?} failed: {:#}", cue, e);
            }
        }
    }

    fn start_music(&mut self, session: &mut Session, now: Millis) {
        let Some(audio) = self.audio.as_mut() else {
            log::info!("No audio backend, running without music");
            return;
        };
        let Some(mut track) = audio.open_soundtrack() else {
            log::info!("No custom soundtrack loaded");
            return;
        };

        let volume = self.config.music_volume.clamp(0.0, 1.0);
        track.set_volume(if self.config.music_fade_in { 0.0 } else { volume });
        match track.play() {
            Ok(()) => {
                if self.config.music_fade_in {
                    session.music_fade = Some(AudioFade::new(
                        volume,
                        self.config.fade_step,
                        self.config.fade_interval_ms,
                        now,
                    ));
                }
                session.soundtrack = Some(track);
            }
            Err(e) => {
                log::warn!("Soundtrack playback refused, continuing without audio: {:#}", e);
            }
        }
    }

    fn begin_exit(
        &mut self,
        mut session: Box<Session>,
        stage: &mut Stage<'_>,
        now: Millis,
        reason: ExitReason,
    ) -> Fadeout {
        session.clear_scene_objects(stage);
        session.snapshot.restore(stage);
        stage.camera.set_user_input_enabled(true);

        let overlay_start = OverlayRole::ALL
            .iter()
            .map(|&role| (role, stage.overlays.opacity(role)))
            .collect();

        let fade = session.soundtrack.as_ref().map(|_| {
            AudioFade::new(0.0, self.config.fade_step, self.config.fade_interval_ms, now)
        });

        log::info!(
            "Cinematic sequence exiting ({:?}) after {:.0} ms",
            reason,
            now - session.activated_at
        );

        Fadeout {
            started_at: now,
            overlay_start,
            soundtrack: session.soundtrack.take(),
            fade,
        }
    }

    fn tick_fadeout(
        &mut self,
        mut fadeout: Fadeout,
        stage: &mut Stage<'_>,
        now: Millis,
    ) -> (SequenceState, TickReport) {
        let elapsed = now - fadeout.started_at;
        let t = if self.config.overlay_fade_ms > 0.0 {
            (elapsed / self.config.overlay_fade_ms).clamp(0.0, 1.0) as f32
        } else {
            1.0
        };
        for &(role, start) in &fadeout.overlay_start {
            stage.overlays.set_opacity(role, start * (1.0 - t));
        }

        let mut audio_done = true;
        if let (Some(track), Some(fade)) = (fadeout.soundtrack.as_deref_mut(), fadeout.fade.as_mut()) {
            audio_done = fade.advance(track, now) != FadeStatus::Running;
        }
        if audio_done {
            fadeout.stop_soundtrack();
        }

        if t >= 1.0 && fadeout.soundtrack.is_none() {
            log::info!("Cinematic sequence finished");
            (SequenceState::Idle, TickReport::new(0.0, SequenceStateKind::Idle))
        } else {
            (
                SequenceState::Exiting(fadeout),
                TickReport::new(elapsed, SequenceStateKind::Exiting),
            )
        }
    }
}

fn apply_overlays(overlays: &mut dyn OverlayLayer, effects: &EffectsFrame) {
    overlays.set_opacity(OverlayRole::LetterboxTop, effects.letterbox_opacity);
    overlays.set_opacity(OverlayRole::LetterboxBottom, effects.letterbox_opacity);
    overlays.set_opacity(OverlayRole::Vignette, effects.vignette_opacity);
    overlays.set_opacity(OverlayRole::FilmGrain, effects.grain_opacity);
}

fn add_reveal_lights(session: &mut Session, stage: &mut Stage<'_>, bounds: &BoundingBox) {
    let c = bounds.center;
    let m = bounds.max_extent;

    session.key_light = Some(stage.scene.add_light(LightSpec {
        kind: LightKind::Spot,
        color: rgb_hex(0xffffff),
        intensity: SHOWCASE_EFFECTS.key_light_intensity,
        position: c + Vec3::new(m, m * 2.0, m),
        target: Some(c),
        cast_shadow: true,
    }));
    session.rim_light = Some(stage.scene.add_light(LightSpec {
        kind: LightKind::Directional,
        color: rgb_hex(RIM_LIGHT_COLOR),
        intensity: RIM_LIGHT_INTENSITY,
        position: c + Vec3::new(-m, 0.0, -m),
        target: None,
        cast_shadow: false,
    }));
}
