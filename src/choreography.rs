//! Camera choreography for each showcase phase.
//!
//! [`compute_camera`] maps `(phase, progress, audio, model bounds)` to a camera
//! position and look target. Every phase is a closed-form trajectory over
//! `progress ∈ [0, 1]`, scaled by the model's largest extent and centred on
//! the model. The only non-determinism is positional jitter, drawn from the
//! caller's RNG and only when the audio calls for it.

use std::f32::consts::PI;

use glam::Vec3;
use rand::Rng;
use serde::Serialize;

use crate::beat::AudioSnapshot;
use crate::clock::Millis;
use crate::stage::BoundingBox;
use crate::timeline::PhaseName;

/// Peak displacement of the main-theme beat punch.
const PUNCH_AMPLITUDE: f32 = 0.15;
/// Per-axis shake while a beat is held during the climax.
const CLIMAX_SHAKE: f32 = 0.08;
/// Shake per unit of intensity above 1.0 during the buildup.
const BUILDUP_SHAKE_PER_INTENSITY: f32 = 0.05;

/// Audio inputs to the choreography for one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AudioCue {
    /// Loudness, 1.0 at the reference level.
    pub intensity: f32,
    /// The beat detector is inside a beat.
    pub beat_active: bool,
    /// Decaying punch amplitude from the most recent beat, 0 when none.
    pub punch: f32,
}

impl AudioCue {
    /// Cue used when there is no analyser.
    pub fn neutral() -> Self {
        Self {
            intensity: 1.0,
            beat_active: false,
            punch: 0.0,
        }
    }

    /// Derive the cue from a snapshot taken at `now`.
    ///
    /// The punch decays linearly over `punch_window_ms` after a beat and only
    /// applies while the beat is still held.
    pub fn from_snapshot(snapshot: &AudioSnapshot, now: Millis, punch_window_ms: Millis) -> Self {
        let punch = match snapshot.time_of_last_beat {
            Some(at) if snapshot.beat_active && punch_window_ms > 0.0 => {
                let since = (now - at).max(0.0);
                if since < punch_window_ms {
                    PUNCH_AMPLITUDE * (1.0 - (since / punch_window_ms) as f32)
                } else {
                    0.0
                }
            }
            _ => 0.0,
        };
        Self {
            intensity: snapshot.intensity.max(0.0),
            beat_active: snapshot.beat_active,
            punch,
        }
    }
}

impl Default for AudioCue {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Camera placement for one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub look_target: Vec3,
}

impl CameraPose {
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.look_target.is_finite()
    }
}

/// Serializable form of a pose, for traces.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoseRecord {
    pub position: [f32; 3],
    pub look_target: [f32; 3],
}

impl From<CameraPose> for PoseRecord {
    fn from(pose: CameraPose) -> Self {
        Self {
            position: pose.position.to_array(),
            look_target: pose.look_target.to_array(),
        }
    }
}

/// Point on a horizontal orbit around `center`.
fn orbit(center: Vec3, angle: f32, distance: f32, height: f32) -> Vec3 {
    center + Vec3::new(angle.cos() * distance, height, angle.sin() * distance)
}

/// Uniform jitter in `[-amount/2, amount/2]` on each axis.
fn jitter<R: Rng>(rng: &mut R, amount: f32) -> Vec3 {
    Vec3::new(
        rng.random::<f32>() - 0.5,
        rng.random::<f32>() - 0.5,
        rng.random::<f32>() - 0.5,
    ) * amount
}

/// Offset added to the pose for `since_ms` after a strong beat.
///
/// The envelope is `amount * sin(pi * since / window)`, jittered per axis, so
/// it starts and ends at zero. Zero outside `(0, window_ms)`.
pub fn beat_shake<R: Rng>(since_ms: Millis, window_ms: Millis, amount: f32, rng: &mut R) -> Vec3 {
    if window_ms <= 0.0 || since_ms <= 0.0 || since_ms >= window_ms {
        return Vec3::ZERO;
    }
    let envelope = amount * (PI * (since_ms / window_ms) as f32).sin();
    jitter(rng, envelope)
}

/// Compute the camera pose for a phase.
///
/// Callers must only invoke this with a usable bounding box (see
/// [`BoundingBox::is_usable`]).
pub fn compute_camera<R: Rng>(
    phase: PhaseName,
    progress: f32,
    audio: &AudioCue,
    bounds: &BoundingBox,
    rng: &mut R,
) -> CameraPose {
    let p = progress.clamp(0.0, 1.0);
    let c = bounds.center;
    let m = bounds.max_extent;
    let intensity = audio.intensity;

    match phase {
        PhaseName::Intro => {
            // High overhead descent.
            let height = m * (10.0 - p * 7.0);
            let distance = m * (4.0 - p * 2.0);
            CameraPose {
                position: c + Vec3::new(distance * 0.3, height, distance * 0.5),
                look_target: c + Vec3::Y * (m * 0.3 * (1.0 - p)),
            }
        }
        PhaseName::Buildup => {
            let angle = PI * 0.5 * p;
            let distance = m * (2.5 - p * 1.5);
            let height = m * (2.0 - p * 1.2);
            let mut position = orbit(c, angle, distance, height);
            if intensity > 1.0 {
                position += jitter(rng, (intensity - 1.0) * BUILDUP_SHAKE_PER_INTENSITY);
            }
            CameraPose {
                position,
                look_target: c,
            }
        }
        PhaseName::Drop => {
            // Picks up where the buildup spiral ends and dives in.
            let angle = PI * 0.5 * (1.0 - p);
            let distance = m * (1.0 - p * 0.4);
            let height = m * (0.8 - p * 0.3);
            CameraPose {
                position: orbit(c, angle, distance, height),
                look_target: c,
            }
        }
        PhaseName::MainTheme => {
            let orbit_speed = 1.0 + intensity * 0.8;
            let angle = p * PI * 4.0 * orbit_speed;
            let distance = m * (1.1 + intensity * 0.3);
            let height = m * (0.7 + (p * PI * 2.0).sin() * 0.3);
            let mut position = orbit(c, angle, distance, height);
            if audio.punch > 0.0 {
                let kick = jitter(rng, audio.punch);
                position.x += kick.x;
                position.y += kick.y;
            }
            CameraPose {
                position,
                look_target: c + Vec3::Y * (m * (0.2 + intensity * 0.2)),
            }
        }
        PhaseName::Bridge => {
            let angle = p * PI * 2.0;
            let distance = m * 1.6;
            let height = m * (0.5 + (p * PI).sin() * 0.2);
            // Look slightly off-centre, toward the side of the model facing the camera.
            let focus = Vec3::new(angle.cos(), 0.0, angle.sin()) * (m * 0.3) + Vec3::Y * (m * 0.15);
            CameraPose {
                position: orbit(c, angle, distance, height),
                look_target: c + focus,
            }
        }
        PhaseName::Climax => {
            let angle = PI * 8.0 + p * PI * 2.0;
            let distance = m * (2.5 + (p * PI).sin() * 0.5);
            let height = m * (1.2 + (p * PI).cos() * 0.3);
            let mut position = orbit(c, angle, distance, height);
            if audio.beat_active {
                position += jitter(rng, CLIMAX_SHAKE);
            }
            CameraPose {
                position,
                look_target: c + Vec3::Y * (m * 0.4),
            }
        }
        PhaseName::Outro => {
            let angle = PI * 10.0 + p * PI * 0.5;
            let distance = m * (2.0 + p * 1.5);
            let height = m * (1.0 - p * 0.5);
            CameraPose {
                position: orbit(c, angle, distance, height),
                look_target: c + Vec3::Y * (m * (0.3 - p * 0.2)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    const EPS: f32 = 1e-4;

    fn unit_box() -> BoundingBox {
        BoundingBox {
            center: Vec3::ZERO,
            max_extent: 1.0,
        }
    }

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(7)
    }

    #[test]
    fn test_intro_midpoint() {
        let pose = compute_camera(PhaseName::Intro, 0.5, &AudioCue::neutral(), &unit_box(), &mut rng());
        // height 10 - 3.5, distance 4 - 1
        assert!((pose.position.y - 6.5).abs() < EPS);
        assert!((pose.position.x - 3.0 * 0.3).abs() < EPS);
        assert!((pose.position.z - 3.0 * 0.5).abs() < EPS);
        assert!((pose.look_target.y - 0.15).abs() < EPS);
    }

    #[test]
    fn test_intro_settles_on_center() {
        let bounds = BoundingBox {
            center: Vec3::new(2.0, 1.0, -3.0),
            max_extent: 2.0,
        };
        let pose = compute_camera(PhaseName::Intro, 1.0, &AudioCue::neutral(), &bounds, &mut rng());
        assert!((pose.look_target - bounds.center).length() < EPS);
        assert!((pose.position.y - (1.0 + 2.0 * 3.0)).abs() < EPS);
    }

    #[test]
    fn test_main_theme_closed_form() {
        let audio = AudioCue::neutral();
        let p = 0.125_f32;
        let pose = compute_camera(PhaseName::MainTheme, p, &audio, &unit_box(), &mut rng());

        let angle = p * PI * 4.0 * 1.8;
        let distance = 1.4;
        let height = 0.7 + (p * PI * 2.0).sin() * 0.3;
        assert!((pose.position.x - angle.cos() * distance).abs() < EPS);
        assert!((pose.position.y - height).abs() < EPS);
        assert!((pose.position.z - angle.sin() * distance).abs() < EPS);
        assert!((pose.look_target.y - 0.4).abs() < EPS);
    }

    #[test]
    fn test_main_theme_punch_only_moves_x_and_y() {
        let audio = AudioCue {
            intensity: 1.0,
            beat_active: true,
            punch: 0.15,
        };
        let calm = compute_camera(PhaseName::MainTheme, 0.3, &AudioCue::neutral(), &unit_box(), &mut rng());
        let punched = compute_camera(PhaseName::MainTheme, 0.3, &audio, &unit_box(), &mut rng());
        assert_eq!(calm.position.z, punched.position.z);
        assert!((calm.position - punched.position).length() <= 0.15);
    }

    #[test]
    fn test_deterministic_without_audio_triggers() {
        for phase in PhaseName::ALL {
            for p in [0.0, 0.3, 0.77, 1.0] {
                let a = compute_camera(phase, p, &AudioCue::neutral(), &unit_box(), &mut SmallRng::seed_from_u64(1));
                let b = compute_camera(phase, p, &AudioCue::neutral(), &unit_box(), &mut SmallRng::seed_from_u64(2));
                assert_eq!(a, b, "{} at {}", phase, p);
                assert!(a.is_finite());
            }
        }
    }

    #[test]
    fn test_buildup_jitter_bounded_by_intensity() {
        let loud = AudioCue {
            intensity: 3.0,
            beat_active: false,
            punch: 0.0,
        };
        let calm = compute_camera(PhaseName::Buildup, 0.5, &AudioCue::neutral(), &unit_box(), &mut rng());
        let mut r = rng();
        for _ in 0..50 {
            let shaken = compute_camera(PhaseName::Buildup, 0.5, &loud, &unit_box(), &mut r);
            let offset = shaken.position - calm.position;
            assert!(offset.abs().max_element() <= 0.05 + EPS);
        }
    }

    #[test]
    fn test_climax_shakes_only_during_beat() {
        let held = AudioCue {
            intensity: 1.0,
            beat_active: true,
            punch: 0.0,
        };
        let calm = compute_camera(PhaseName::Climax, 0.5, &AudioCue::neutral(), &unit_box(), &mut rng());
        let shaken = compute_camera(PhaseName::Climax, 0.5, &held, &unit_box(), &mut rng());
        assert_ne!(calm.position, shaken.position);
        assert!((calm.position - shaken.position).abs().max_element() <= CLIMAX_SHAKE / 2.0 + EPS);
        assert_eq!(calm.look_target, shaken.look_target);
    }

    #[test]
    fn test_drop_pulls_in() {
        let audio = AudioCue::neutral();
        let start = compute_camera(PhaseName::Drop, 0.0, &audio, &unit_box(), &mut rng());
        let end = compute_camera(PhaseName::Drop, 1.0, &audio, &unit_box(), &mut rng());
        assert!(end.position.length() < start.position.length());

        // Continues from where the buildup ends.
        let buildup_end = compute_camera(PhaseName::Buildup, 1.0, &audio, &unit_box(), &mut rng());
        assert!((buildup_end.position - start.position).length() < EPS);
    }

    #[test]
    fn test_outro_pulls_back_and_lowers() {
        let audio = AudioCue::neutral();
        let mut last_distance = 0.0;
        let mut last_height = f32::MAX;
        for i in 0..=10 {
            let pose = compute_camera(PhaseName::Outro, i as f32 / 10.0, &audio, &unit_box(), &mut rng());
            let distance = Vec3::new(pose.position.x, 0.0, pose.position.z).length();
            assert!(distance >= last_distance);
            assert!(pose.position.y <= last_height);
            last_distance = distance;
            last_height = pose.position.y;
        }
    }

    #[test]
    fn test_bridge_looks_off_center() {
        let pose = compute_camera(PhaseName::Bridge, 0.25, &AudioCue::neutral(), &unit_box(), &mut rng());
        assert!(pose.look_target.length() > 0.1);
        assert!(pose.look_target.y > 0.0);
    }

    #[test]
    fn test_beat_shake_envelope() {
        let mut rng = rng();
        assert_eq!(beat_shake(0.0, 200.0, 0.15, &mut rng), Vec3::ZERO);
        assert_eq!(beat_shake(200.0, 200.0, 0.15, &mut rng), Vec3::ZERO);
        assert_eq!(beat_shake(-5.0, 200.0, 0.15, &mut rng), Vec3::ZERO);
        assert_eq!(beat_shake(50.0, 0.0, 0.15, &mut rng), Vec3::ZERO);

        let mut moved = false;
        for i in 1..200 {
            let since = i as f64;
            let limit = 0.15 * (PI * since as f32 / 200.0).sin() / 2.0 + 1e-6;
            let offset = beat_shake(since, 200.0, 0.15, &mut rng);
            assert!(offset.abs().max_element() <= limit, "{} at {}", offset, since);
            moved |= offset != Vec3::ZERO;
        }
        assert!(moved);
    }

    #[test]
    fn test_cue_from_snapshot_punch_decays() {
        let mut snapshot = AudioSnapshot::silent();
        snapshot.beat_active = true;
        snapshot.time_of_last_beat = Some(1_000.0);

        let fresh = AudioCue::from_snapshot(&snapshot, 1_000.0, 200.0);
        assert!((fresh.punch - PUNCH_AMPLITUDE).abs() < EPS);

        let half = AudioCue::from_snapshot(&snapshot, 1_100.0, 200.0);
        assert!((half.punch - PUNCH_AMPLITUDE * 0.5).abs() < EPS);

        let stale = AudioCue::from_snapshot(&snapshot, 1_250.0, 200.0);
        assert_eq!(stale.punch, 0.0);

        snapshot.beat_active = false;
        let released = AudioCue::from_snapshot(&snapshot, 1_000.0, 200.0);
        assert_eq!(released.punch, 0.0);
    }
}
