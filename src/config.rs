//! Tunable constants for the cinematic sequence.
//!
//! Every field has a default, so a config file only needs the keys it
//! overrides. The JSON format uses camelCase keys.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::clock::Millis;
use crate::timeline::{Phase, Timeline, NOMINAL_DURATION_MS};

/// Beat detection and audio-reactivity constants.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct BeatConfig {
    /// Number of recent energy values kept for the adaptive threshold.
    pub history_len: usize,
    /// Lowest threshold the detector will ever use.
    pub threshold_floor: f32,
    /// Threshold = mean(history) * multiplier (never below the floor).
    pub threshold_multiplier: f32,
    /// Beat state releases once energy drops below threshold * release_ratio.
    pub release_ratio: f32,
    /// Every Nth beat counts as a strong beat.
    pub strong_beat_every: u32,
    /// How long after a beat the main-theme camera punch lasts.
    pub punch_window_ms: Millis,
    /// Mean spectrum magnitude that maps to an intensity of 1.0.
    pub intensity_reference: f32,
}

impl Default for BeatConfig {
    fn default() -> Self {
        Self {
            history_len: 30,
            threshold_floor: 80.0,
            threshold_multiplier: 1.3,
            release_ratio: 0.6,
            strong_beat_every: 4,
            punch_window_ms: 200.0,
            intensity_reference: 128.0,
        }
    }
}

/// Offsets (from activation) of the one-shot pre-sequence cues.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct CueOffsets {
    pub ambient_drone: Millis,
    pub bass_thump: Millis,
    pub reveal: Millis,
    pub showcase: Millis,
    pub lens_flare: Millis,
    /// Exit time used when no soundtrack is playing.
    pub fallback_exit: Millis,
}

impl Default for CueOffsets {
    fn default() -> Self {
        Self {
            ambient_drone: 0.0,
            bass_thump: 3_000.0,
            reveal: 4_500.0,
            showcase: 9_500.0,
            lens_flare: 24_500.0,
            fallback_exit: 29_500.0,
        }
    }
}

/// Top-level sequence configuration.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct SequenceConfig {
    pub cues: CueOffsets,
    pub beat: BeatConfig,
    /// Custom showcase phase table. The built-in seven-phase table is used
    /// when absent.
    pub phases: Option<Vec<Phase>>,
    /// Length the phase table is calibrated against.
    pub nominal_duration_ms: Millis,
    /// Playback volume of the soundtrack once faded in.
    pub music_volume: f32,
    /// Ramp the soundtrack in from silence instead of starting at full volume.
    pub music_fade_in: bool,
    /// Volume change per fade step.
    pub fade_step: f32,
    /// Time between fade steps.
    pub fade_interval_ms: Millis,
    /// Time for overlays to fade to transparent on exit.
    pub overlay_fade_ms: Millis,
    /// Key light multiplier applied on strong beats.
    pub strong_beat_boost: f32,
    pub strong_beat_boost_ms: Millis,
    /// Peak camera displacement of the shake that follows a strong beat.
    pub strong_beat_shake: f32,
    pub strong_beat_shake_ms: Millis,
    pub energy_burst_lifetime_ms: Millis,
    pub beat_particles_lifetime_ms: Millis,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            cues: CueOffsets::default(),
            beat: BeatConfig::default(),
            phases: None,
            nominal_duration_ms: NOMINAL_DURATION_MS,
            music_volume: 0.7,
            music_fade_in: true,
            fade_step: 0.02,
            fade_interval_ms: 50.0,
            overlay_fade_ms: 500.0,
            strong_beat_boost: 1.3,
            strong_beat_boost_ms: 150.0,
            strong_beat_shake: 0.15,
            strong_beat_shake_ms: 200.0,
            energy_burst_lifetime_ms: 650.0,
            beat_particles_lifetime_ms: 830.0,
        }
    }
}

impl SequenceConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SequenceConfig =
            serde_json::from_str(json).context("Failed to parse sequence config")?;
        config.timeline().context("Invalid phase table")?;
        Ok(config)
    }

    /// The base phase table, before it is fitted to a soundtrack.
    pub fn timeline(&self) -> Result<Timeline> {
        match &self.phases {
            Some(phases) => Timeline::new(phases.clone()),
            None => Ok(Timeline::default_table()),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_json_str(&contents).with_context(|| format!("Invalid config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::PhaseName;

    #[test]
    fn test_empty_json_is_default() {
        let config = SequenceConfig::from_json_str("{}").unwrap();
        assert_eq!(config, SequenceConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = SequenceConfig::from_json_str(
            r#"{ "musicVolume": 0.5, "beat": { "thresholdFloor": 60 }, "cues": { "showcase": 8000 } }"#,
        )
        .unwrap();
        assert_eq!(config.music_volume, 0.5);
        assert_eq!(config.beat.threshold_floor, 60.0);
        assert_eq!(config.beat.history_len, 30);
        assert_eq!(config.cues.showcase, 8_000.0);
        assert_eq!(config.cues.reveal, 4_500.0);
    }

    #[test]
    fn test_custom_phase_table() {
        let config = SequenceConfig::from_json_str(
            r#"{ "phases": [
                { "name": "outro", "start": 2000, "duration": 1000 },
                { "name": "intro", "start": 0, "duration": 1000 }
            ] }"#,
        )
        .unwrap();
        let timeline = config.timeline().unwrap();
        assert_eq!(timeline.phases().len(), 2);
        assert_eq!(timeline.phases()[0].name, PhaseName::Intro);
        assert_eq!(timeline.end_ms(), 3_000.0);
        assert!(timeline.resolve(1_500.0).is_none());
    }

    #[test]
    fn test_overlapping_phase_table_rejected() {
        let result = SequenceConfig::from_json_str(
            r#"{ "phases": [
                { "name": "intro", "start": 0, "duration": 2000 },
                { "name": "drop", "start": 1000, "duration": 1000 }
            ] }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(SequenceConfig::from_json_str(r#"{ "musicVolum": 0.5 }"#).is_err());
    }
}
