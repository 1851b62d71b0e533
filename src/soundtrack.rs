//! Soundtrack playback seam and volume fades.
//!
//! The sequence owns the soundtrack while it runs: it starts it, reads its
//! analyser, watches for the end of the track, and fades it out on exit.
//! Fades are stepwise (a fixed volume step every fixed interval) and are
//! polled from the per-frame update instead of running on their own timer,
//! so a fade can never outlive the track it operates on.

use anyhow::Result;
use serde::Serialize;

use crate::beat::Analyser;
use crate::clock::Millis;

/// File extensions accepted as custom soundtracks.
pub const SUPPORTED_AUDIO_EXTENSIONS: [&str; 7] = ["mp3", "wav", "ogg", "m4a", "aac", "flac", "wma"];

/// Check a file name against [`SUPPORTED_AUDIO_EXTENSIONS`] (case-insensitive).
pub fn is_supported_audio_file(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_AUDIO_EXTENSIONS.contains(&ext.as_str())
        }
        _ => false,
    }
}

/// One-shot sound effects fired before the music starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SoundCue {
    AmbientDrone,
    BassThump,
}

/// A playable music track.
pub trait Soundtrack {
    /// Start or resume playback. Hosts may refuse (autoplay policies).
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self);
    fn is_paused(&self) -> bool;
    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32);
    fn current_time_ms(&self) -> Millis;
    fn set_current_time_ms(&mut self, time: Millis);
    /// Track length, when known.
    fn duration_ms(&self) -> Option<Millis>;
    /// The track reached its end.
    fn has_ended(&self) -> bool;
    /// Live analyser over the playing audio, when the host provides one.
    fn analyser(&mut self) -> Option<&mut dyn Analyser>;
}

/// Host audio services.
pub trait AudioBackend {
    fn play_cue(&mut self, cue: SoundCue) -> Result<()>;
    /// Open the user's custom soundtrack, if one is loaded.
    fn open_soundtrack(&mut self) -> Option<Box<dyn Soundtrack>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FadeStatus {
    Running,
    Finished,
    /// The track was paused underneath the fade.
    Cancelled,
}

/// Stepwise volume ramp toward a target.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioFade {
    target: f32,
    step: f32,
    interval: Millis,
    next_step_at: Millis,
}

impl AudioFade {
    pub fn new(target: f32, step: f32, interval: Millis, now: Millis) -> Self {
        Self {
            target: target.clamp(0.0, 1.0),
            step: step.abs().max(f32::EPSILON),
            interval: interval.max(1.0),
            next_step_at: now,
        }
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    /// Apply every step that has come due by `now`.
    pub fn advance(&mut self, track: &mut dyn Soundtrack, now: Millis) -> FadeStatus {
        while now >= self.next_step_at {
            if track.is_paused() {
                return FadeStatus::Cancelled;
            }
            let volume = track.volume();
            if volume == self.target {
                return FadeStatus::Finished;
            }
            let next = if volume < self.target {
                (volume + self.step).min(self.target)
            } else {
                (volume - self.step).max(self.target)
            };
            track.set_volume(next);
            self.next_step_at += self.interval;
        }

        if track.volume() == self.target {
            FadeStatus::Finished
        } else {
            FadeStatus::Running
        }
    }
}
