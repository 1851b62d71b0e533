//! Offline audio input for headless runs.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};

use crate::clock::Millis;

/// Mono PCM samples in `[-1, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: f32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: f32) -> Result<Self> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            bail!("Sample rate must be positive, got {}", sample_rate);
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Parse a JSON array of floats, or whitespace separated floats.
    pub fn parse(contents: &str, sample_rate: f32) -> Result<Self> {
        let samples: Vec<f32> = serde_json::from_str(contents)
            .or_else(|_| {
                contents
                    .split_whitespace()
                    .map(|s| s.parse::<f32>())
                    .collect::<Result<Vec<_>, _>>()
            })
            .map_err(|_| {
                anyhow!("Failed to parse waveform as a JSON list of floats or whitespace separated floats")
            })?;
        Self::new(samples, sample_rate)
    }

    pub fn load(path: &Path, sample_rate: f32) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read waveform {}", path.display()))?;
        let waveform = Self::parse(&contents, sample_rate)
            .with_context(|| format!("Invalid waveform {}", path.display()))?;
        log::info!(
            "Loaded waveform {}: {} samples at {} Hz ({:.1} s)",
            path.display(),
            waveform.len(),
            waveform.sample_rate(),
            waveform.duration_ms() / 1000.0
        );
        Ok(waveform)
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_ms(&self) -> Millis {
        self.samples.len() as f64 / self.sample_rate as f64 * 1000.0
    }

    /// The `len` samples ending at `time`, zero-padded where the window
    /// falls outside the recording.
    pub fn window(&self, time: Millis, out: &mut [f32]) {
        let end = (time / 1000.0 * self.sample_rate as f64).floor() as isize;
        let start = end - out.len() as isize + 1;
        for (k, slot) in out.iter_mut().enumerate() {
            let idx = start + k as isize;
            *slot = if idx >= 0 {
                self.samples.get(idx as usize).copied().unwrap_or(0.0)
            } else {
                0.0
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_and_whitespace() {
        let json = Waveform::parse("[0.0, 0.5, -0.5]", 100.0).unwrap();
        assert_eq!(json.len(), 3);

        let plain = Waveform::parse("0.0 0.5\n-0.5", 100.0).unwrap();
        assert_eq!(json, plain);

        assert!(Waveform::parse("not numbers", 100.0).is_err());
        assert!(Waveform::parse("[1.0]", 0.0).is_err());
    }

    #[test]
    fn test_duration() {
        let wave = Waveform::new(vec![0.0, 1.0, 0.0, -1.0], 4.0).unwrap();
        assert_eq!(wave.duration_ms(), 1_000.0);
        assert_eq!(wave.sample_rate(), 4.0);
        assert!(Waveform::new(Vec::new(), 8_000.0).unwrap().is_empty());
    }

    #[test]
    fn test_window_pads_outside_recording() {
        let wave = Waveform::new(vec![0.1, 0.2, 0.3, 0.4], 1_000.0).unwrap();
        let mut out = [9.0; 3];
        wave.window(1.0, &mut out);
        assert_eq!(out, [0.0, 0.1, 0.2]);

        wave.window(10.0, &mut out);
        assert_eq!(out, [0.0, 0.0, 0.0]);
    }
}
