//! Starfield scene: stars rushing toward the camera around a spinning sword.
//!
//! The sword comes from an external model file. Nothing moves until it has
//! loaded; if loading fails the error is logged and the scene stays frozen.

use std::sync::Arc;

use glam::Vec3;

use crate::camera::PerspectiveCamera;
use crate::config::{RampConfig, StarConfig, StarfieldConfig};
use crate::demo::{fit_camera, Demo, Viewport};
use crate::geometry::Geometry;
use crate::model::{Model, PendingModel};
use crate::random::RandomSource;
use crate::scene::{color_hex, DirectionalLight, Mesh, MeshMaterial, NodeId, Scene, Transform};

/// Speed that grows by a fixed step every frame until it reaches a cap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedRamp {
    speed: f32,
    acceleration: f32,
    max: f32,
}

impl SpeedRamp {
    /// Starting speeds above `max` are clamped, so the ramp never slows down.
    pub fn new(initial: f32, acceleration: f32, max: f32) -> Self {
        Self {
            speed: initial.min(max),
            acceleration: acceleration.max(0.0),
            max,
        }
    }

    pub fn from_config(config: &RampConfig) -> Self {
        Self::new(config.initial, config.acceleration, config.max)
    }

    /// Accelerate one frame and return the new speed.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        self.speed = (self.speed + self.acceleration).min(self.max);
        self.speed
    }

    #[inline]
    pub fn speed(&self) -> f32 {
        self.speed
    }

    #[inline]
    pub fn max(&self) -> f32 {
        self.max
    }
}

/// One star: a scene node plus its own speed.
#[derive(Debug, Clone)]
pub struct Star {
    pub node: NodeId,
    pub speed: SpeedRamp,
}

/// The loaded sword and its spin.
#[derive(Debug, Clone)]
pub struct Sword {
    pub node: NodeId,
    pub spin: SpeedRamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the sword model. Also where a failed load leaves the scene.
    Loading,
    /// Stars and sword animate every frame.
    Running,
}

/// Move a star toward the camera, wrapping it to `reset_z` once it passes `camera_z`.
///
/// Returns the new Z.
pub fn step_star(z: f32, speed: &mut SpeedRamp, camera_z: f32, reset_z: f32) -> f32 {
    let z = z + speed.advance();
    if z > camera_z {
        reset_z
    } else {
        z
    }
}

/// Session state for the starfield scene.
pub struct Starfield {
    config: StarfieldConfig,
    scene: Scene,
    camera: PerspectiveCamera,
    viewport: Viewport,
    stars: Vec<Star>,
    sword: Option<Sword>,
    pending: Option<PendingModel>,
    phase: Phase,
    frames: u64,
}

impl Starfield {
    /// Build the star field. The scene stays in [`Phase::Loading`] until a
    /// model is delivered through [`Starfield::load`] or [`Starfield::attach_model`].
    pub fn new(config: StarfieldConfig, viewport: Viewport, rng: &mut dyn RandomSource) -> Self {
        let mut camera = PerspectiveCamera::new(config.camera.fov, viewport.aspect(), config.camera.near, config.camera.far);
        camera.position.z = config.camera.z;

        let mut scene = Scene::new();
        scene.background = color_hex(config.background);
        scene.ambient_light = Vec3::splat(0.25);
        scene.sun = Some(DirectionalLight {
            direction: Vec3::new(-1.0, -1.0, -1.0).normalize(),
            color: Vec3::ONE,
            intensity: 1.0,
        });

        let stars = spawn_stars(&mut scene, &config.stars, camera.position.z, rng);

        log::info!("starfield ready: {} stars, waiting for sword model", stars.len());

        Self {
            config,
            scene,
            camera,
            viewport,
            stars,
            sword: None,
            pending: None,
            phase: Phase::Loading,
            frames: 0,
        }
    }

    /// Wait on `pending` for the sword; animation starts when it resolves.
    pub fn load(&mut self, pending: PendingModel) {
        self.pending = Some(pending);
    }

    /// Place the sword and start animating.
    pub fn attach_model(&mut self, model: Model) {
        let mut geometry = model.geometry;
        geometry.fit_to(self.config.sword.fit_size);

        let node = self.scene.add_mesh(Mesh::new(
            Arc::new(geometry),
            MeshMaterial::lit(color_hex(self.config.sword.color)),
        ));
        self.sword = Some(Sword {
            node,
            spin: SpeedRamp::from_config(&self.config.sword.spin),
        });
        self.phase = Phase::Running;
        log::info!("sword model loaded ({} meshes), starfield running", model.mesh_count);
    }

    /// Check on the pending model without blocking.
    fn poll_model(&mut self) {
        let Some(pending) = self.pending.as_mut() else {
            return;
        };
        match pending.try_take() {
            None => {}
            Some(Ok(model)) => {
                self.pending = None;
                self.attach_model(model);
            }
            Some(Err(e)) => {
                self.pending = None;
                log::error!("{}", e);
            }
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether a model load is still outstanding.
    pub fn is_waiting(&self) -> bool {
        self.pending.is_some()
    }

    pub fn config(&self) -> &StarfieldConfig {
        &self.config
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn stars(&self) -> &[Star] {
        &self.stars
    }

    pub fn star_position(&self, star: &Star) -> Vec3 {
        self.scene
            .mesh(star.node)
            .map(|mesh| mesh.transform.position)
            .unwrap_or(Vec3::ZERO)
    }

    pub fn sword(&self) -> Option<&Sword> {
        self.sword.as_ref()
    }

    /// Accumulated sword rotation around Y, in radians.
    pub fn sword_angle(&self) -> Option<f32> {
        let sword = self.sword.as_ref()?;
        self.scene.mesh(sword.node).map(|mesh| mesh.transform.rotation.y)
    }

    /// Frames animated so far (frames spent loading are not counted).
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

fn spawn_stars(scene: &mut Scene, config: &StarConfig, camera_z: f32, rng: &mut dyn RandomSource) -> Vec<Star> {
    let geometry = Arc::new(Geometry::sphere(config.radius, 8, 6));
    let material = MeshMaterial::basic(color_hex(config.color));
    let depth = (camera_z - config.reset_z).max(0.0);

    (0..config.count)
        .map(|_| {
            let position = Vec3::new(
                rng.centered(config.spread),
                rng.centered(config.spread),
                rng.span(config.reset_z, depth),
            );
            let initial = config.speed.initial + rng.next_f32() * config.speed_jitter;

            let mut mesh = Mesh::new(geometry.clone(), material);
            mesh.transform = Transform::from_position(position);
            Star {
                node: scene.add_mesh(mesh),
                speed: SpeedRamp::new(initial, config.speed.acceleration, config.speed.max),
            }
        })
        .collect()
}

impl Demo for Starfield {
    fn title(&self) -> &str {
        &self.config.window.title
    }

    fn scene(&self) -> &Scene {
        &self.scene
    }

    fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    fn frame(&mut self) -> (&mut Scene, &PerspectiveCamera) {
        (&mut self.scene, &self.camera)
    }

    fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        fit_camera(&mut self.camera, viewport);
        log::debug!("starfield resized to {}x{}", viewport.width, viewport.height);
    }

    fn update(&mut self, _rng: &mut dyn RandomSource) {
        if self.phase == Phase::Loading {
            self.poll_model();
            if self.phase == Phase::Loading {
                return;
            }
        }

        if let Some(sword) = self.sword.as_mut() {
            let spin = sword.spin.advance();
            if let Some(mesh) = self.scene.mesh_mut(sword.node) {
                mesh.transform.rotation.y += spin;
            }
        }

        let camera_z = self.camera.position.z;
        let reset_z = self.config.stars.reset_z;
        for star in &mut self.stars {
            if let Some(mesh) = self.scene.mesh_mut(star.node) {
                let z = &mut mesh.transform.position.z;
                *z = step_star(*z, &mut star.speed, camera_z, reset_z);
            }
        }

        self.frames += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{load_with, Model};
    use crate::error::ModelError;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use std::path::PathBuf;
    use std::time::Duration;

    fn cube_model() -> Model {
        Model {
            geometry: Geometry::sphere(1.0, 4, 3),
            mesh_count: 1,
        }
    }

    fn wait_for_phase_change(starfield: &mut Starfield, rng: &mut SmallRng) {
        for _ in 0..500 {
            starfield.update(rng);
            if !starfield.is_waiting() {
                return;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        panic!("model load never resolved");
    }

    #[test]
    fn test_ramp_reaches_cap_and_stays() {
        let mut ramp = SpeedRamp::new(0.001, 0.0001, 0.05);
        let mut last = ramp.speed();
        for _ in 0..1000 {
            let speed = ramp.advance();
            assert!(speed >= last);
            assert!(speed <= 0.05);
            last = speed;
        }
        assert_eq!(ramp.speed(), 0.05);
    }

    #[test]
    fn test_ramp_clamps_initial_above_cap() {
        let mut ramp = SpeedRamp::new(1.0, 0.1, 0.5);
        assert_eq!(ramp.speed(), 0.5);
        assert_eq!(ramp.advance(), 0.5);
    }

    #[test]
    fn test_step_star_wraps_past_camera() {
        let mut ramp = SpeedRamp::new(0.5, 0.0, 0.5);
        assert_eq!(step_star(4.0, &mut ramp, 5.0, -30.0), 4.5);
        assert_eq!(step_star(4.75, &mut ramp, 5.0, -30.0), -30.0);
    }

    #[test]
    fn test_frozen_until_model_arrives() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut starfield = Starfield::new(StarfieldConfig::default(), Viewport::default(), &mut rng);
        let before: Vec<Vec3> = starfield.stars().iter().map(|s| starfield.star_position(s)).collect();

        for _ in 0..10 {
            starfield.update(&mut rng);
        }

        let after: Vec<Vec3> = starfield.stars().iter().map(|s| starfield.star_position(s)).collect();
        assert_eq!(before, after);
        assert_eq!(starfield.phase(), Phase::Loading);
        assert_eq!(starfield.frames(), 0);
        assert!(starfield.sword_angle().is_none());
    }

    #[test]
    fn test_async_load_starts_animation() {
        let mut rng = SmallRng::seed_from_u64(2);
        let mut starfield = Starfield::new(StarfieldConfig::default(), Viewport::default(), &mut rng);
        starfield.load(load_with(|| Ok(cube_model())));

        wait_for_phase_change(&mut starfield, &mut rng);
        assert_eq!(starfield.phase(), Phase::Running);

        starfield.update(&mut rng);
        let angle = starfield.sword_angle().unwrap();
        assert!(angle > 0.0);

        let (min, max) = starfield.scene().mesh(starfield.sword().unwrap().node).unwrap().geometry.bounds().unwrap();
        assert!(((max - min).max_element() - starfield.config().sword.fit_size).abs() < 1e-4);
    }

    #[test]
    fn test_failed_load_stays_frozen() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut starfield = Starfield::new(StarfieldConfig::default(), Viewport::default(), &mut rng);
        starfield.load(load_with(|| Err(ModelError::NoMeshes(PathBuf::from("sword.glb")))));

        wait_for_phase_change(&mut starfield, &mut rng);
        assert_eq!(starfield.phase(), Phase::Loading);
        assert!(!starfield.is_waiting());

        starfield.update(&mut rng);
        assert_eq!(starfield.frames(), 0);
        assert!(starfield.sword().is_none());
    }

    #[test]
    fn test_stars_spawn_between_reset_plane_and_camera() {
        let mut rng = SmallRng::seed_from_u64(4);
        let starfield = Starfield::new(StarfieldConfig::default(), Viewport::default(), &mut rng);
        assert_eq!(starfield.stars().len(), 200);
        for star in starfield.stars() {
            let p = starfield.star_position(star);
            assert!((-30.0..=5.0).contains(&p.z));
            assert!(p.x.abs() <= 25.0 && p.y.abs() <= 25.0);
            assert!(star.speed.speed() <= star.speed.max());
        }
    }

    #[test]
    fn test_resize_updates_camera() {
        let mut rng = SmallRng::seed_from_u64(6);
        let mut starfield = Starfield::new(StarfieldConfig::default(), Viewport::default(), &mut rng);
        starfield.resize(Viewport::new(1000.0, 500.0));
        assert_eq!(starfield.camera().aspect, 2.0);
        assert_eq!(starfield.viewport().width, 1000.0);
    }
}
