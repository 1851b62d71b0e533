//! Cinematic "superhero mode" sequencing for a 3D model viewer.
//!
//! An activation snapshots the viewer, plays a scripted intro, then drives the
//! camera, lights and overlays through a phase table stretched to the
//! soundtrack, reacting to beats, before restoring everything on exit.

pub mod clock;
pub mod config;
pub mod stage;
pub mod timeline;

// Audio
pub mod beat;
pub mod soundtrack;
pub mod waveform;

// Per-phase values
pub mod choreography;
pub mod director;

pub mod sequence;
pub mod headless;
pub mod host;

#[cfg(not(target_arch = "wasm32"))]
pub mod cli;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use sequence::{ExitReason, SequenceController, SequenceStateKind, TickReport};
