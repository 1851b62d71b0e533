//! Audio feature extraction: beat triggers and loudness.
//!
//! Two independent signals are derived from the analyser each tick:
//!
//! - **Beats**: a fast trigger from the time-domain waveform. Energy is the
//!   mean absolute deviation from the 128 zero line; a beat fires on the rising
//!   edge above an adaptive threshold and re-arms only after energy drops
//!   below `release_ratio * threshold`.
//! - **Intensity**: a slow loudness value, the mean of the magnitude spectrum
//!   divided by a reference level.

use serde::Serialize;

use crate::clock::Millis;
use crate::config::BeatConfig;

/// Zero line of unsigned 8-bit waveform data.
const WAVEFORM_CENTER: f32 = 128.0;

/// Frequency/time-domain analyser over the playing soundtrack.
///
/// Data layout follows the Web Audio `AnalyserNode` byte API: one byte per
/// bin, time-domain samples centred on 128.
pub trait Analyser {
    /// Number of bins written by the data getters.
    fn bin_count(&self) -> usize;
    fn byte_time_domain_data(&mut self, out: &mut [u8]);
    fn byte_frequency_data(&mut self, out: &mut [u8]);
}

/// Audio features for one tick.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioSnapshot {
    /// Loudness, 1.0 at the reference level.
    pub intensity: f32,
    /// A beat started on this tick.
    pub beat_onset: bool,
    /// The detector is inside a beat (between onset and release).
    pub beat_active: bool,
    pub time_of_last_beat: Option<Millis>,
    pub energy: f32,
    pub threshold: f32,
}

impl AudioSnapshot {
    /// Features used when no analyser is available.
    pub fn silent() -> Self {
        Self {
            intensity: 1.0,
            beat_onset: false,
            beat_active: false,
            time_of_last_beat: None,
            energy: 0.0,
            threshold: 0.0,
        }
    }
}

/// Mean absolute deviation of a byte waveform from its zero line.
pub fn waveform_energy(data: &[u8]) -> f32 {
    if data.is_empty() {
        return 0.0;
    }
    let sum: f32 = data.iter().map(|&b| (b as f32 - WAVEFORM_CENTER).abs()).sum();
    sum / data.len() as f32
}

/// Mean magnitude of a byte spectrum relative to `reference`.
pub fn audio_intensity(spectrum: &[u8], reference: f32) -> f32 {
    if spectrum.is_empty() || reference <= 0.0 {
        return 0.0;
    }
    let sum: f32 = spectrum.iter().map(|&b| b as f32).sum();
    (sum / spectrum.len() as f32) / reference
}

/// Fixed-capacity history of recent energy values.
#[derive(Clone, Debug)]
struct EnergyHistory {
    data: Vec<f32>,
    cursor: usize,
    count: usize,
}

impl EnergyHistory {
    fn new(capacity: usize) -> Self {
        Self {
            data: vec![0.0; capacity.max(1)],
            cursor: 0,
            count: 0,
        }
    }

    fn push(&mut self, value: f32) {
        self.data[self.cursor] = value;
        self.cursor = (self.cursor + 1) % self.data.len();
        if self.count < self.data.len() {
            self.count += 1;
        }
    }

    fn mean(&self) -> f32 {
        if self.count == 0 {
            return 0.0;
        }
        self.data[..self.count].iter().sum::<f32>() / self.count as f32
    }

    fn clear(&mut self) {
        self.cursor = 0;
        self.count = 0;
    }
}

/// Rising-edge beat detector with hysteresis.
#[derive(Clone, Debug)]
pub struct BeatDetector {
    config: BeatConfig,
    history: EnergyHistory,
    in_beat: bool,
    beat_count: u32,
    last_beat: Option<Millis>,
    threshold: f32,
    scratch: Vec<u8>,
}

impl BeatDetector {
    pub fn new(config: BeatConfig) -> Self {
        Self {
            history: EnergyHistory::new(config.history_len),
            threshold: config.threshold_floor,
            config,
            in_beat: false,
            beat_count: 0,
            last_beat: None,
            scratch: Vec::new(),
        }
    }

    /// Feed one energy value. Returns true only on a new beat.
    ///
    /// The threshold is computed from the history *before* the new value is
    /// added, so a transient cannot raise its own bar.
    pub fn push_energy(&mut self, energy: f32, now: Millis) -> bool {
        self.threshold = (self.history.mean() * self.config.threshold_multiplier)
            .max(self.config.threshold_floor);
        self.history.push(energy);

        if energy > self.threshold && !self.in_beat {
            self.in_beat = true;
            self.beat_count += 1;
            self.last_beat = Some(now);
            return true;
        }
        if energy < self.threshold * self.config.release_ratio {
            self.in_beat = false;
        }
        false
    }

    /// Read the analyser and update beat state.
    pub fn sample(&mut self, analyser: &mut dyn Analyser, now: Millis) -> AudioSnapshot {
        let bins = analyser.bin_count();
        if bins == 0 {
            return AudioSnapshot::silent();
        }
        self.scratch.resize(bins, WAVEFORM_CENTER as u8);

        analyser.byte_time_domain_data(&mut self.scratch);
        let energy = waveform_energy(&self.scratch);
        let beat_onset = self.push_energy(energy, now);

        analyser.byte_frequency_data(&mut self.scratch);
        let intensity = audio_intensity(&self.scratch, self.config.intensity_reference);

        AudioSnapshot {
            intensity,
            beat_onset,
            beat_active: self.in_beat,
            time_of_last_beat: self.last_beat,
            energy,
            threshold: self.threshold,
        }
    }

    /// Whether the latest beat lands on the strong-beat grid.
    ///
    /// This approximates bar accents by counting; there is no tempo tracking.
    pub fn is_strong_beat(&self) -> bool {
        let every = self.config.strong_beat_every.max(1);
        self.beat_count > 0 && self.beat_count % every == 0
    }

    pub fn beat_count(&self) -> u32 {
        self.beat_count
    }

    pub fn in_beat(&self) -> bool {
        self.in_beat
    }

    pub fn last_beat(&self) -> Option<Millis> {
        self.last_beat
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.in_beat = false;
        self.beat_count = 0;
        self.last_beat = None;
        self.threshold = self.config.threshold_floor;
    }
}
