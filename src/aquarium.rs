//! Underwater scene: a water surface, a bouncing fish swarm and rain.
//!
//! Fish drift with constant speed and bounce off walls derived from the
//! viewport size. Rain falls straight down and is recycled above the scene
//! once it drops through the floor.

use std::sync::Arc;

use glam::Vec3;

use crate::buffer::AttributeBuffer;
use crate::camera::PerspectiveCamera;
use crate::config::{AquariumConfig, FishConfig, RainConfig};
use crate::demo::{fit_camera, Demo, Viewport};
use crate::geometry::Geometry;
use crate::random::RandomSource;
use crate::scene::{color_hex, Mesh, MeshMaterial, NodeId, PointCloud, PointsMaterial, Scene, Transform};

/// Region the fish swim in: `[-half_width, half_width]` on X and Z,
/// `[0, ceiling]` on Y.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwimBounds {
    pub half_width: f32,
    pub ceiling: f32,
}

impl SwimBounds {
    pub fn from_viewport(viewport: Viewport, divisor: f32) -> Self {
        Self {
            half_width: viewport.width / divisor,
            ceiling: viewport.height / divisor,
        }
    }

    /// Whether `p` lies inside, widened by `slack` on every side.
    pub fn contains(&self, p: Vec3, slack: f32) -> bool {
        let w = self.half_width + slack;
        (-w..=w).contains(&p.x) && (-w..=w).contains(&p.z) && (-slack..=self.ceiling + slack).contains(&p.y)
    }
}

/// Depth cue for a fish at height `y`.
///
/// Compares camera Z with fish Y. The result is clamped to
/// `[min_scale, 1] * size_scale`.
pub fn fish_size(camera_z: f32, y: f32, fish: &FishConfig) -> f32 {
    let distance = camera_z - y;
    // min() keeps clamp's bounds ordered for configs built in code.
    let scale = (1.0 - distance / fish.size_falloff).clamp(fish.min_scale.min(1.0), 1.0);
    scale * fish.size_scale
}

/// Advance every fish one frame: move, reflect off the bounds, resize.
pub fn step_fish(
    positions: &mut AttributeBuffer,
    velocities: &mut AttributeBuffer,
    sizes: &mut AttributeBuffer,
    bounds: SwimBounds,
    camera_z: f32,
    fish: &FishConfig,
) {
    let pos = positions.as_mut_slice();
    let vel = velocities.as_mut_slice();
    let size = sizes.as_mut_slice();

    for i in 0..size.len() {
        let base = i * 3;
        for axis in 0..3 {
            pos[base + axis] += vel[base + axis];
        }

        let (x, y, z) = (pos[base], pos[base + 1], pos[base + 2]);
        if x < -bounds.half_width || x > bounds.half_width {
            vel[base] = -vel[base];
        }
        // Floor at zero, not mirrored.
        if y < 0.0 || y > bounds.ceiling {
            vel[base + 1] = -vel[base + 1];
        }
        if z < -bounds.half_width || z > bounds.half_width {
            vel[base + 2] = -vel[base + 2];
        }

        size[i] = fish_size(camera_z, y, fish);
    }

    positions.mark_dirty();
    velocities.mark_dirty();
    sizes.mark_dirty();
}

/// Advance every rain drop one frame, recycling drops that hit the floor.
///
/// `fall` holds one (negative) vertical speed per drop.
pub fn step_rain(positions: &mut AttributeBuffer, fall: &AttributeBuffer, rain: &RainConfig, rng: &mut dyn RandomSource) {
    let pos = positions.as_mut_slice();
    for (i, vy) in fall.as_slice().iter().enumerate() {
        let y = &mut pos[i * 3 + 1];
        *y += vy;
        if *y < 0.0 {
            *y = rng.span(rain.respawn_min, rain.respawn_span);
        }
    }
    positions.mark_dirty();
}

/// Initial fish buffers: `(positions, velocities, sizes, colors)`.
///
/// Draws per fish, in order: position x/y/z, velocity x/y/z, size, color r/g/b.
pub fn spawn_fish(
    fish: &FishConfig,
    rng: &mut dyn RandomSource,
) -> (AttributeBuffer, AttributeBuffer, AttributeBuffer, AttributeBuffer) {
    let mut positions = AttributeBuffer::new(fish.count, 3);
    let mut velocities = AttributeBuffer::new(fish.count, 3);
    let mut sizes = AttributeBuffer::new(fish.count, 1);
    let mut colors = AttributeBuffer::new(fish.count, 3);

    for i in 0..fish.count {
        let position = Vec3::new(
            rng.centered(fish.spawn_extent),
            rng.next_f32() * fish.spawn_height,
            rng.centered(fish.spawn_extent),
        );
        let velocity = Vec3::new(
            rng.centered(fish.velocity_extent),
            rng.centered(fish.velocity_extent),
            rng.centered(fish.velocity_extent),
        );
        positions.set_vec3(i, position);
        velocities.set_vec3(i, velocity);
        sizes.set(i, 0, rng.span(fish.size_min, fish.size_span));
        let color = Vec3::new(rng.next_f32(), rng.next_f32(), rng.next_f32());
        colors.set_vec3(i, color);
    }

    (positions, velocities, sizes, colors)
}

/// Initial rain buffers: `(positions, fall speeds)`.
///
/// Draws per drop, in order: position x/y/z, fall speed.
pub fn spawn_rain(rain: &RainConfig, rng: &mut dyn RandomSource) -> (AttributeBuffer, AttributeBuffer) {
    let mut positions = AttributeBuffer::new(rain.count, 3);
    let mut fall = AttributeBuffer::new(rain.count, 1);

    for i in 0..rain.count {
        let position = Vec3::new(
            rng.centered(rain.extent),
            rng.span(rain.respawn_min, rain.respawn_span),
            rng.centered(rain.extent),
        );
        positions.set_vec3(i, position);
        fall.set(i, 0, -rng.next_f32() * rain.fall_span - rain.fall_min);
    }

    (positions, fall)
}

/// Session state for the underwater scene.
pub struct Aquarium {
    config: AquariumConfig,
    scene: Scene,
    camera: PerspectiveCamera,
    viewport: Viewport,
    water: NodeId,
    fish: NodeId,
    rain: NodeId,
    fish_velocities: AttributeBuffer,
    rain_fall: AttributeBuffer,
    frames: u64,
}

impl Aquarium {
    pub fn new(config: AquariumConfig, viewport: Viewport, rng: &mut dyn RandomSource) -> Self {
        let mut camera = PerspectiveCamera::new(config.camera.fov, viewport.aspect(), config.camera.near, config.camera.far);
        camera.position.z = config.camera.z;

        let mut scene = Scene::new();
        scene.background = color_hex(config.background);

        let water = {
            let material = MeshMaterial {
                opacity: config.water.opacity,
                double_sided: true,
                ..MeshMaterial::basic(color_hex(config.water.color))
            };
            let mut mesh = Mesh::new(Arc::new(Geometry::plane(config.water.size, config.water.size)), material);
            mesh.transform = Transform {
                rotation: Vec3::new(-std::f32::consts::FRAC_PI_2, 0.0, 0.0),
                ..Transform::default()
            };
            scene.add_mesh(mesh)
        };

        let (positions, fish_velocities, sizes, colors) = spawn_fish(&config.fish, rng);
        let fish = scene.add_points(
            PointCloud::new(
                positions,
                PointsMaterial {
                    size: config.fish.point_size,
                    vertex_colors: true,
                    ..PointsMaterial::default()
                },
            )
            .with_colors(colors)
            .with_sizes(sizes),
        );

        let (positions, rain_fall) = spawn_rain(&config.rain, rng);
        let rain = scene.add_points(PointCloud::new(
            positions,
            PointsMaterial {
                color: color_hex(config.rain.color),
                size: config.rain.point_size,
                ..PointsMaterial::default()
            },
        ));

        log::info!(
            "aquarium ready: {} fish, {} rain drops, viewport {}x{}",
            config.fish.count,
            config.rain.count,
            viewport.width,
            viewport.height
        );

        Self {
            config,
            scene,
            camera,
            viewport,
            water,
            fish,
            rain,
            fish_velocities,
            rain_fall,
            frames: 0,
        }
    }

    pub fn config(&self) -> &AquariumConfig {
        &self.config
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Current fish boundary, following the viewport.
    pub fn swim_bounds(&self) -> SwimBounds {
        SwimBounds::from_viewport(self.viewport, self.config.fish.boundary_divisor)
    }

    pub fn water(&self) -> Option<&Mesh> {
        self.scene.mesh(self.water)
    }

    pub fn fish(&self) -> Option<&PointCloud> {
        self.scene.points(self.fish)
    }

    pub fn fish_velocities(&self) -> &AttributeBuffer {
        &self.fish_velocities
    }

    pub fn rain(&self) -> Option<&PointCloud> {
        self.scene.points(self.rain)
    }

    pub fn rain_fall(&self) -> &AttributeBuffer {
        &self.rain_fall
    }

    /// Frames stepped so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Demo for Aquarium {
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
        let bounds = self.swim_bounds();
        log::debug!(
            "aquarium resized to {}x{}, fish bounds ±{:.2} x [0, {:.2}]",
            viewport.width,
            viewport.height,
            bounds.half_width,
            bounds.ceiling
        );
    }

    fn update(&mut self, rng: &mut dyn RandomSource) {
        let bounds = self.swim_bounds();
        let camera_z = self.camera.position.z;

        if let Some(fish) = self.scene.points_mut(self.fish) {
            if let Some(sizes) = fish.sizes.as_mut() {
                step_fish(
                    &mut fish.positions,
                    &mut self.fish_velocities,
                    sizes,
                    bounds,
                    camera_z,
                    &self.config.fish,
                );
            }
        }

        if let Some(rain) = self.scene.points_mut(self.rain) {
            step_rain(&mut rain.positions, &self.rain_fall, &self.config.rain, rng);
        }

        self.frames += 1;
    }
}
