//! Phase table for the showcase part of the sequence.
//!
//! A [`Timeline`] is an ordered list of named, non-overlapping phase windows.
//! Windows are half-open (`[start, start + duration)`), and gaps are allowed:
//! resolving a time that falls in a gap, or past the last phase, yields
//! `None`, which callers treat as "hold the last frame".

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::clock::Millis;

/// Nominal length of the default phase table, in milliseconds.
pub const NOMINAL_DURATION_MS: Millis = 25_000.0;

/// The named phases of the showcase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PhaseName {
    Intro,
    Buildup,
    Drop,
    MainTheme,
    Bridge,
    Climax,
    Outro,
}

impl PhaseName {
    pub const ALL: [PhaseName; 7] = [
        PhaseName::Intro,
        PhaseName::Buildup,
        PhaseName::Drop,
        PhaseName::MainTheme,
        PhaseName::Bridge,
        PhaseName::Climax,
        PhaseName::Outro,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseName::Intro => "intro",
            PhaseName::Buildup => "buildup",
            PhaseName::Drop => "drop",
            PhaseName::MainTheme => "mainTheme",
            PhaseName::Bridge => "bridge",
            PhaseName::Climax => "climax",
            PhaseName::Outro => "outro",
        }
    }
}

impl fmt::Display for PhaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhaseName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        PhaseName::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown phase name: {}", s))
    }
}

/// One phase window.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Phase {
    pub name: PhaseName,
    /// Start offset from the beginning of the showcase (inclusive).
    pub start: Millis,
    pub duration: Millis,
}

impl Phase {
    pub const fn new(name: PhaseName, start: Millis, duration: Millis) -> Self {
        Self {
            name,
            start,
            duration,
        }
    }

    /// End boundary (exclusive).
    pub fn end(&self) -> Millis {
        self.start + self.duration
    }

    pub fn contains(&self, elapsed: Millis) -> bool {
        elapsed >= self.start && elapsed < self.end()
    }
}

/// The result of resolving an elapsed time against a [`Timeline`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseSample {
    pub name: PhaseName,
    /// Normalized position within the phase, in `[0, 1]`.
    pub progress: f32,
}

const DEFAULT_PHASES: [Phase; 7] = [
    Phase::new(PhaseName::Intro, 0.0, 3_000.0),
    Phase::new(PhaseName::Buildup, 3_000.0, 2_000.0),
    Phase::new(PhaseName::Drop, 5_000.0, 1_000.0),
    Phase::new(PhaseName::MainTheme, 6_000.0, 8_000.0),
    Phase::new(PhaseName::Bridge, 14_000.0, 4_000.0),
    Phase::new(PhaseName::Climax, 18_000.0, 3_000.0),
    Phase::new(PhaseName::Outro, 21_000.0, 4_000.0),
];

/// Ordered, non-overlapping set of phases.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Timeline {
    phases: Vec<Phase>,
}

impl Timeline {
    /// Build a timeline from arbitrary phases.
    ///
    /// Phases are sorted by start time. Names must be unique, durations
    /// positive and windows must not overlap.
    pub fn new(mut phases: Vec<Phase>) -> Result<Self> {
        phases.sort_by(|a, b| a.start.total_cmp(&b.start));

        for (i, phase) in phases.iter().enumerate() {
            if !phase.start.is_finite() || !phase.duration.is_finite() || phase.duration <= 0.0 {
                bail!(
                    "Phase '{}' has an invalid window (start {}, duration {})",
                    phase.name,
                    phase.start,
                    phase.duration
                );
            }
            if phases[..i].iter().any(|p| p.name == phase.name) {
                bail!("Phase '{}' appears more than once", phase.name);
            }
            if i > 0 && phases[i - 1].end() > phase.start {
                bail!(
                    "Phase '{}' overlaps phase '{}'",
                    phase.name,
                    phases[i - 1].name
                );
            }
        }

        Ok(Self { phases })
    }

    /// The built-in seven-phase table calibrated for a 25 s track.
    pub fn default_table() -> Self {
        Self {
            phases: DEFAULT_PHASES.to_vec(),
        }
    }

    /// This table stretched so that `nominal_ms` maps onto `audio_ms`.
    ///
    /// A duration that is not a positive finite number (streams, broken
    /// metadata) leaves the table unscaled.
    pub fn fitted(&self, audio_ms: Millis, nominal_ms: Millis) -> Self {
        if audio_ms.is_finite() && audio_ms > 0.0 && nominal_ms.is_finite() && nominal_ms > 0.0 {
            self.scaled(audio_ms / nominal_ms)
        } else {
            log::warn!(
                "Soundtrack duration {} is unusable, keeping the nominal timeline",
                audio_ms
            );
            self.clone()
        }
    }

    /// Multiply every start and duration by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            phases: self
                .phases
                .iter()
                .map(|p| Phase::new(p.name, p.start * factor, p.duration * factor))
                .collect(),
        }
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn phase(&self, name: PhaseName) -> Option<&Phase> {
        self.phases.iter().find(|p| p.name == name)
    }

    /// End of the last phase.
    pub fn end_ms(&self) -> Millis {
        self.phases.last().map(|p| p.end()).unwrap_or(0.0)
    }

    /// Find the phase containing `elapsed` and the progress through it.
    pub fn resolve(&self, elapsed: Millis) -> Option<PhaseSample> {
        let phase = self.phases.iter().find(|p| p.contains(elapsed))?;
        let progress = ((elapsed - phase.start) / phase.duration).clamp(0.0, 1.0);
        Some(PhaseSample {
            name: phase.name,
            progress: progress as f32,
        })
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::default_table()
    }
}
