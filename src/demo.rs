//! The interface between a scene session and the frame loop.

use winit::dpi::PhysicalSize;

use crate::camera::PerspectiveCamera;
use crate::random::RandomSource;
use crate::scene::Scene;

/// Output area in logical pixels plus the device pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub scale_factor: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            scale_factor: 1.0,
        }
    }

    pub fn from_physical(size: PhysicalSize<u32>, scale_factor: f64) -> Self {
        let logical = size.to_logical::<f32>(scale_factor);
        Self {
            width: logical.width,
            height: logical.height,
            scale_factor: scale_factor as f32,
        }
    }

    /// Width over height; 1 for a degenerate (minimized) viewport.
    pub fn aspect(&self) -> f32 {
        if self.width > 0.0 && self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280.0, 720.0)
    }
}

/// Match the camera projection to a new viewport.
pub fn fit_camera(camera: &mut PerspectiveCamera, viewport: Viewport) {
    camera.aspect = viewport.aspect();
    camera.update_projection_matrix();
}

/// A running scene: owns its scene graph, camera and particle state.
///
/// The frame loop calls [`Demo::update`] once per display refresh, then
/// renders whatever [`Demo::frame`] hands back.
pub trait Demo {
    /// Window title.
    fn title(&self) -> &str;

    fn scene(&self) -> &Scene;

    fn camera(&self) -> &PerspectiveCamera;

    /// Scene and camera together, for the renderer.
    fn frame(&mut self) -> (&mut Scene, &PerspectiveCamera);

    /// The output area changed size.
    fn resize(&mut self, viewport: Viewport);

    /// Advance one frame.
    fn update(&mut self, rng: &mut dyn RandomSource);
}
