//! Configuration for both scenes.
//!
//! Every struct has defaults reproducing the stock demos, so a config file
//! only needs the values it changes:
//!
//! ```json
//! { "rain": { "count": 5000 }, "window": { "title": "Monsoon" } }
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Range checks run after parsing, for values serde accepts but the scenes cannot use.
pub trait Validate {
    fn validate(&self) -> Result<(), ConfigError>;
}

/// Read a JSON config file. Missing fields take their defaults.
pub fn load<T: DeserializeOwned + Validate>(path: impl AsRef<Path>) -> Result<T, ConfigError> {
    let text = fs::read_to_string(path)?;
    from_json(&text)
}

pub fn from_json<T: DeserializeOwned + Validate>(text: &str) -> Result<T, ConfigError> {
    let config: T = serde_json::from_str(text)?;
    config.validate()?;
    Ok(config)
}

/// Load `path` if given, otherwise use defaults.
pub fn load_or_default<T: DeserializeOwned + Validate + Default>(path: Option<&Path>) -> Result<T, ConfigError> {
    match path {
        Some(path) => load(path),
        None => Ok(T::default()),
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    /// Logical width.
    pub width: u32,
    /// Logical height.
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "diorama".into(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    /// Camera distance along +Z; it looks toward -Z.
    pub z: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: 75.0,
            near: 0.1,
            far: 1000.0,
            z: 5.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WaterConfig {
    /// Side length of the square surface.
    pub size: f32,
    pub color: u32,
    pub opacity: f32,
}

impl Default for WaterConfig {
    fn default() -> Self {
        Self {
            size: 100.0,
            color: 0x00aaff,
            opacity: 0.7,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FishConfig {
    pub count: usize,
    /// Spawn width on X and Z, centered on the origin.
    pub spawn_extent: f32,
    /// Spawn height above the floor.
    pub spawn_height: f32,
    /// Velocity range per axis, centered on zero.
    pub velocity_extent: f32,
    /// Initial size is `size_min + r * size_span`.
    pub size_min: f32,
    pub size_span: f32,
    /// Viewport pixels per world unit when computing the swim boundary.
    pub boundary_divisor: f32,
    /// Distance over which the depth cue fades out.
    pub size_falloff: f32,
    /// Lower clamp of the depth-cue scale factor.
    pub min_scale: f32,
    /// Rendered size at scale factor 1.
    pub size_scale: f32,
    pub point_size: f32,
}

impl Default for FishConfig {
    fn default() -> Self {
        Self {
            count: 100,
            spawn_extent: 20.0,
            spawn_height: 5.0,
            velocity_extent: 0.05,
            size_min: 0.1,
            size_span: 0.2,
            boundary_divisor: 100.0,
            size_falloff: 10.0,
            min_scale: 0.1,
            size_scale: 0.2,
            point_size: 0.2,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RainConfig {
    pub count: usize,
    /// Width of the rain volume on X and Z.
    pub extent: f32,
    /// Drops respawn at `respawn_min + r * respawn_span`.
    pub respawn_min: f32,
    pub respawn_span: f32,
    /// Fall speed is `fall_min + r * fall_span` units per frame.
    pub fall_min: f32,
    pub fall_span: f32,
    pub color: u32,
    pub point_size: f32,
}

impl Default for RainConfig {
    fn default() -> Self {
        Self {
            count: 2000,
            extent: 50.0,
            respawn_min: 20.0,
            respawn_span: 50.0,
            fall_min: 0.1,
            fall_span: 0.1,
            color: 0x0000ff,
            point_size: 0.05,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AquariumConfig {
    pub window: WindowConfig,
    pub camera: CameraConfig,
    pub background: u32,
    pub water: WaterConfig,
    pub fish: FishConfig,
    pub rain: RainConfig,
}

impl Default for AquariumConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig {
                title: "diorama - aquarium".into(),
                ..WindowConfig::default()
            },
            camera: CameraConfig::default(),
            background: 0x000000,
            water: WaterConfig::default(),
            fish: FishConfig::default(),
            rain: RainConfig::default(),
        }
    }
}

/// Linear speed ramp parameters.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RampConfig {
    pub initial: f32,
    /// Added to the speed every frame.
    pub acceleration: f32,
    /// Terminal speed.
    pub max: f32,
}

impl Default for RampConfig {
    fn default() -> Self {
        Self {
            initial: 0.001,
            acceleration: 0.0001,
            max: 0.05,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StarConfig {
    pub count: usize,
    /// Width of the field on X and Y.
    pub spread: f32,
    /// Where recycled stars reappear, far from the camera.
    pub reset_z: f32,
    /// Random extra initial speed per star, in `[0, speed_jitter)`.
    pub speed_jitter: f32,
    pub speed: RampConfig,
    pub radius: f32,
    pub color: u32,
}

impl Default for StarConfig {
    fn default() -> Self {
        Self {
            count: 200,
            spread: 50.0,
            reset_z: -30.0,
            speed_jitter: 0.02,
            speed: RampConfig {
                initial: 0.01,
                acceleration: 0.0005,
                max: 0.25,
            },
            radius: 0.05,
            color: 0xffffff,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SwordConfig {
    /// glTF or GLB file.
    pub path: PathBuf,
    /// Largest extent of the model after loading.
    pub fit_size: f32,
    pub color: u32,
    /// Angular speed around Y, radians per frame.
    pub spin: RampConfig,
}

impl Default for SwordConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("assets/sword.glb"),
            fit_size: 4.0,
            color: 0xc0c8d0,
            spin: RampConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StarfieldConfig {
    pub window: WindowConfig,
    pub camera: CameraConfig,
    pub background: u32,
    pub stars: StarConfig,
    pub sword: SwordConfig,
}

impl Default for StarfieldConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig {
                title: "diorama - starfield".into(),
                ..WindowConfig::default()
            },
            camera: CameraConfig::default(),
            background: 0x000005,
            stars: StarConfig::default(),
            sword: SwordConfig::default(),
        }
    }
}

fn invalid(field: &str, requirement: &str, value: f32) -> ConfigError {
    ConfigError::Invalid(format!("{} must be {}, got {}", field, requirement, value))
}

fn require_positive(field: &str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, "positive", value))
    }
}

fn require_non_negative(field: &str, value: f32) -> Result<(), ConfigError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, "zero or more", value))
    }
}

impl CameraConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fov > 0.0 && self.fov < 180.0) {
            return Err(invalid("camera.fov", "between 0 and 180 degrees", self.fov));
        }
        require_positive("camera.near", self.near)?;
        if !(self.far > self.near && self.far.is_finite()) {
            return Err(invalid("camera.far", "beyond camera.near", self.far));
        }
        Ok(())
    }
}

impl FishConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        require_positive("fish.boundary_divisor", self.boundary_divisor)?;
        require_positive("fish.size_falloff", self.size_falloff)?;
        if !(0.0..=1.0).contains(&self.min_scale) {
            return Err(invalid("fish.min_scale", "within [0, 1]", self.min_scale));
        }
        require_non_negative("fish.velocity_extent", self.velocity_extent)
    }
}

impl RampConfig {
    fn validate(&self, field: &str) -> Result<(), ConfigError> {
        require_non_negative(&format!("{}.acceleration", field), self.acceleration)?;
        require_non_negative(&format!("{}.max", field), self.max)
    }
}

impl Validate for AquariumConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.camera.validate()?;
        self.fish.validate()?;
        require_non_negative("rain.respawn_min", self.rain.respawn_min)?;
        require_non_negative("rain.fall_min", self.rain.fall_min)
    }
}

impl Validate for StarfieldConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.camera.validate()?;
        if !(self.stars.reset_z < self.camera.z) {
            return Err(invalid("stars.reset_z", "behind camera.z", self.stars.reset_z));
        }
        self.stars.speed.validate("stars.speed")?;
        self.sword.spin.validate("sword.spin")?;
        require_positive("sword.fit_size", self.sword.fit_size)
    }
}
