//! Capability interfaces the sequence drives.
//!
//! The controller never sees a viewer object. It borrows a [`Stage`] for the
//! duration of one call, made of narrow traits: a camera rig, a scene graph
//! (background, fog, lights, transient meshes), overlay elements, and an
//! optional bloom pass. The host also supplies the model's bounding box,
//! recomputed every tick.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Linear RGB, 0-1.
pub type Rgb = [f32; 3];

/// Converts a `0xRRGGBB` literal to linear RGB.
pub const fn rgb_hex(hex: u32) -> Rgb {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}

/// Scene background.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Background {
    None,
    Color(Rgb),
    /// Host-owned texture or environment map, by handle.
    Texture(u64),
}

/// Linear distance fog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fog {
    pub color: Rgb,
    pub near: f32,
    pub far: f32,
}

/// Handle for an object the sequence added to the scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LightKind {
    Spot,
    Directional,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightSpec {
    pub kind: LightKind,
    pub color: Rgb,
    pub intensity: f32,
    pub position: Vec3,
    /// Aim point for spot lights.
    pub target: Option<Vec3>,
    pub cast_shadow: bool,
}

/// Self-animating scene decorations. The host owns their animation; the
/// sequence only adds them and removes them when their lifetime is over.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EffectKind {
    /// Expanding white sphere at the bass thump.
    EnergyBurst,
    /// Burst of points on strong beats.
    BeatParticles,
    /// Pulsing flare disc in front of the model during the finale.
    LensFlare,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectSpec {
    pub kind: EffectKind,
    pub position: Vec3,
}

/// Post-process bloom parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BloomSettings {
    pub enabled: bool,
    pub strength: f32,
    pub radius: f32,
    pub threshold: f32,
}

impl BloomSettings {
    /// Bloom used while the sequence is active.
    pub const CINEMATIC: BloomSettings = BloomSettings {
        enabled: true,
        strength: 1.0,
        radius: 0.4,
        threshold: 0.7,
    };
}

/// Overlay elements layered above the viewport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OverlayRole {
    LetterboxTop,
    LetterboxBottom,
    Vignette,
    FilmGrain,
}

impl OverlayRole {
    pub const ALL: [OverlayRole; 4] = [
        OverlayRole::LetterboxTop,
        OverlayRole::LetterboxBottom,
        OverlayRole::Vignette,
        OverlayRole::FilmGrain,
    ];
}

/// Camera plus orbit-control target.
pub trait CameraRig {
    fn position(&self) -> Vec3;
    fn set_position(&mut self, position: Vec3);
    /// Orbit-control pivot.
    fn target(&self) -> Vec3;
    fn set_target(&mut self, target: Vec3);
    /// Orient the camera toward `point` without moving the orbit pivot.
    fn look_at(&mut self, point: Vec3);
    /// Enable or disable user orbit/pan input.
    fn set_user_input_enabled(&mut self, enabled: bool);
}

pub trait SceneGraph {
    fn background(&self) -> Background;
    fn set_background(&mut self, background: Background);
    fn fog(&self) -> Option<Fog>;
    fn set_fog(&mut self, fog: Option<Fog>);

    fn ambient_intensity(&self) -> f32;
    fn set_ambient_intensity(&mut self, intensity: f32);
    fn directional_intensity(&self) -> f32;
    fn set_directional_intensity(&mut self, intensity: f32);
    fn directional_position(&self) -> Vec3;
    fn set_directional_position(&mut self, position: Vec3);

    fn add_light(&mut self, light: LightSpec) -> ObjectId;
    fn set_light_intensity(&mut self, id: ObjectId, intensity: f32);
    fn add_effect(&mut self, effect: EffectSpec) -> ObjectId;
    /// Remove an object added by the sequence. Unknown ids are ignored.
    fn remove(&mut self, id: ObjectId);
}

pub trait OverlayLayer {
    /// Create any missing overlay elements. Calling it again is harmless.
    fn ensure_overlays(&mut self);
    fn set_opacity(&mut self, role: OverlayRole, opacity: f32);
    fn opacity(&self, role: OverlayRole) -> f32;
}

pub trait BloomPass {
    fn settings(&self) -> BloomSettings;
    fn apply(&mut self, settings: BloomSettings);
}

/// World-space bounds of the active model, reduced to what the camera needs.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub center: Vec3,
    /// Largest side of the axis-aligned box.
    pub max_extent: f32,
}

impl BoundingBox {
    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        Self {
            center: (min + max) * 0.5,
            max_extent: (max - min).max_element(),
        }
    }

    /// A box the camera can frame: finite and with a positive extent.
    pub fn is_usable(&self) -> bool {
        self.center.is_finite() && self.max_extent.is_finite() && self.max_extent > 0.0
    }
}

/// Everything the sequence may touch, borrowed for one call.
pub struct Stage<'a> {
    pub camera: &'a mut dyn CameraRig,
    pub scene: &'a mut dyn SceneGraph,
    pub overlays: &'a mut dyn OverlayLayer,
    pub bloom: Option<&'a mut dyn BloomPass>,
    /// `None` when no model is loaded.
    pub model: Option<BoundingBox>,
}

impl<'a> Stage<'a> {
    /// The model bounds, if they can be used for framing.
    pub fn framing(&self) -> Option<BoundingBox> {
        self.model.filter(BoundingBox::is_usable)
    }
}

/// Pre-sequence state, captured once at activation and written back on exit.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneSnapshot {
    pub camera_position: Vec3,
    pub camera_target: Vec3,
    pub background: Background,
    pub fog: Option<Fog>,
    pub ambient_intensity: f32,
    pub directional_intensity: f32,
    pub directional_position: Vec3,
    pub bloom: Option<BloomSettings>,
}

impl SceneSnapshot {
    pub fn capture(stage: &Stage<'_>) -> Self {
        Self {
            camera_position: stage.camera.position(),
            camera_target: stage.camera.target(),
            background: stage.scene.background(),
            fog: stage.scene.fog(),
            ambient_intensity: stage.scene.ambient_intensity(),
            directional_intensity: stage.scene.directional_intensity(),
            directional_position: stage.scene.directional_position(),
            bloom: stage.bloom.as_ref().map(|b| b.settings()),
        }
    }

    pub fn restore(&self, stage: &mut Stage<'_>) {
        stage.camera.set_position(self.camera_position);
        stage.camera.set_target(self.camera_target);
        stage.camera.look_at(self.camera_target);

        stage.scene.set_background(self.background.clone());
        stage.scene.set_fog(self.fog.clone());
        stage.scene.set_ambient_intensity(self.ambient_intensity);
        stage.scene.set_directional_intensity(self.directional_intensity);
        stage.scene.set_directional_position(self.directional_position);

        if let (Some(bloom), Some(settings)) = (stage.bloom.as_mut(), self.bloom) {
            bloom.apply(settings);
        }
    }
}
