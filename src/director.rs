//! Lighting and overlay levels for each showcase phase.
//!
//! Deterministic in `(phase, progress)`: no audio, no randomness. Beat
//! reactions (key light boosts) are layered on top by the sequence.

use bytemuck::{Pod, Zeroable};
use serde::Serialize;

use crate::timeline::PhaseName;

/// Lighting, bloom and overlay levels for one tick.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectsFrame {
    pub key_light_intensity: f32,
    pub bloom_strength: f32,
    pub bloom_radius: f32,
    pub vignette_opacity: f32,
    pub grain_opacity: f32,
    pub letterbox_opacity: f32,
}

/// Overlay levels applied the moment the showcase starts, before the first
/// phase has been resolved.
pub const SHOWCASE_EFFECTS: EffectsFrame = EffectsFrame {
    key_light_intensity: 2.0,
    bloom_strength: 1.0,
    bloom_radius: 0.4,
    vignette_opacity: 0.3,
    grain_opacity: 0.15,
    letterbox_opacity: 1.0,
};

const KEY_LIGHT_PEAK: f32 = 1.8;

fn key_light(phase: PhaseName, p: f32) -> f32 {
    match phase {
        PhaseName::Intro => 0.5 + p * (KEY_LIGHT_PEAK - 0.5),
        PhaseName::Outro => KEY_LIGHT_PEAK - p * 0.8,
        _ => KEY_LIGHT_PEAK,
    }
}

fn bloom(phase: PhaseName, p: f32) -> (f32, f32) {
    match phase {
        PhaseName::Climax => (1.6 + p * 0.2, 0.6 + p * 0.1),
        // Relax from the climax peak back to the base level.
        PhaseName::Outro => (1.8 - p * 0.8, 0.7 - p * 0.3),
        _ => (1.0, 0.4),
    }
}

fn vignette(phase: PhaseName, p: f32) -> f32 {
    match phase {
        PhaseName::Climax => 0.5,
        PhaseName::Outro => 0.3 - p * 0.2,
        _ => 0.3,
    }
}

fn grain(phase: PhaseName, p: f32) -> f32 {
    match phase {
        PhaseName::Climax => 0.25,
        PhaseName::Outro => 0.25 - p * 0.1,
        _ => 0.15,
    }
}

fn letterbox(phase: PhaseName, p: f32) -> f32 {
    match phase {
        PhaseName::Outro => 0.7 - p * 0.2,
        _ => 1.0,
    }
}

/// Compute the effect levels for a phase.
pub fn compute_effects(phase: PhaseName, progress: f32) -> EffectsFrame {
    let p = progress.clamp(0.0, 1.0);
    let (bloom_strength, bloom_radius) = bloom(phase, p);
    EffectsFrame {
        key_light_intensity: key_light(phase, p),
        bloom_strength,
        bloom_radius,
        vignette_opacity: vignette(phase, p),
        grain_opacity: grain(phase, p),
        letterbox_opacity: letterbox(phase, p),
    }
}

/// GPU/JS-ready effect levels.
///
/// Laid out for a uniform buffer or a `Float32Array`. Total size: 32 bytes.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct EffectsUniforms {
    pub key_light_intensity: f32,
    pub bloom_strength: f32,
    pub bloom_radius: f32,
    pub vignette_opacity: f32,
    pub grain_opacity: f32,
    pub letterbox_opacity: f32,
    pub _padding: [f32; 2],
}

impl From<EffectsFrame> for EffectsUniforms {
    fn from(frame: EffectsFrame) -> Self {
        Self {
            key_light_intensity: frame.key_light_intensity,
            bloom_strength: frame.bloom_strength,
            bloom_radius: frame.bloom_radius,
            vignette_opacity: frame.vignette_opacity,
            grain_opacity: frame.grain_opacity,
            letterbox_opacity: frame.letterbox_opacity,
            _padding: [0.0; 2],
        }
    }
}

impl EffectsUniforms {
    /// The six meaningful values as a flat float slice (padding excluded).
    pub fn as_floats(&self) -> &[f32] {
        &bytemuck::cast_slice::<EffectsUniforms, f32>(std::slice::from_ref(self))[..6]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn test_key_light_ramps() {
        assert!((compute_effects(PhaseName::Intro, 0.0).key_light_intensity - 0.5).abs() < EPS);
        assert!((compute_effects(PhaseName::Intro, 1.0).key_light_intensity - 1.8).abs() < EPS);
        assert_eq!(compute_effects(PhaseName::MainTheme, 0.4).key_light_intensity, 1.8);
        assert!((compute_effects(PhaseName::Outro, 1.0).key_light_intensity - 1.0).abs() < EPS);

        let mut last = 0.0;
        for i in 0..=20 {
            let v = compute_effects(PhaseName::Intro, i as f32 / 20.0).key_light_intensity;
            assert!(v >= last);
            last = v;
        }
    }

    #[test]
    fn test_climax_intensifies_overlays() {
        let main = compute_effects(PhaseName::MainTheme, 0.5);
        let climax = compute_effects(PhaseName::Climax, 0.5);
        assert!(climax.vignette_opacity > main.vignette_opacity);
        assert!(climax.grain_opacity > main.grain_opacity);
        assert!(climax.bloom_strength > main.bloom_strength);

        let early = compute_effects(PhaseName::Climax, 0.0);
        let late = compute_effects(PhaseName::Climax, 1.0);
        assert!(late.bloom_strength > early.bloom_strength);
        assert!(late.bloom_radius > early.bloom_radius);
    }

    #[test]
    fn test_outro_fades() {
        let start = compute_effects(PhaseName::Outro, 0.0);
        let end = compute_effects(PhaseName::Outro, 1.0);
        assert!(end.vignette_opacity < start.vignette_opacity);
        assert!(end.grain_opacity < start.grain_opacity);
        assert!(end.letterbox_opacity < start.letterbox_opacity);
        assert!((end.letterbox_opacity - 0.5).abs() < EPS);
    }

    #[test]
    fn test_letterbox_opaque_before_outro() {
        for phase in PhaseName::ALL {
            if phase != PhaseName::Outro {
                assert_eq!(compute_effects(phase, 0.6).letterbox_opacity, 1.0);
            }
        }
    }

    #[test]
    fn test_values_stay_in_range() {
        for phase in PhaseName::ALL {
            for i in 0..=10 {
                let e = compute_effects(phase, i as f32 / 10.0);
                for v in [e.vignette_opacity, e.grain_opacity, e.letterbox_opacity] {
                    assert!((0.0..=1.0).contains(&v));
                }
                assert!(e.key_light_intensity > 0.0);
                assert!(e.bloom_strength > 0.0);
            }
        }
    }

    #[test]
    fn test_uniforms_layout() {
        assert_eq!(std::mem::size_of::<EffectsUniforms>(), 32);
        let uniforms = EffectsUniforms::from(compute_effects(PhaseName::Climax, 0.0));
        let floats = uniforms.as_floats();
        assert_eq!(floats.len(), 6);
        assert_eq!(floats[0], 1.8);
        assert_eq!(floats[3], 0.5);
    }
}
