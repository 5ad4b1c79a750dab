//! # diorama
//!
//! Two small animated 3D scenes drawn with wgpu, each advancing one fixed
//! step per displayed frame.
//!
//! - [`Aquarium`]: a translucent water plane with a school of fish points
//!   swimming in a box sized from the viewport, under falling rain.
//! - [`Starfield`]: a loaded glTF sword spinning in place while stars rush
//!   toward the camera, both on speed ramps that accelerate to a cap.
//!
//! ## Quick Start
//!
//! ```ignore
//! use diorama::prelude::*;
//!
//! fn main() -> Result<(), DemoError> {
//!     let config = AquariumConfig::default();
//!     let mut rng = random::from_entropy();
//!     let aquarium = Aquarium::new(config.clone(), Viewport::default(), &mut rng);
//!     diorama::run(aquarium, &config.window)
//! }
//! ```
//!
//! ## Structure
//!
//! Scene logic is independent of the GPU. A [`Demo`] owns a [`Scene`] of
//! point clouds and meshes plus a [`PerspectiveCamera`], and mutates them in
//! [`Demo::update`]. Point attributes live in [`AttributeBuffer`]s that flag
//! themselves dirty; the renderer uploads only flagged buffers.
//!
//! Randomness is drawn through [`RandomSource`] so that tests can feed a
//! fixed sequence and check exact results.
//!
//! ## Controls
//!
//! - **Escape** or closing the window: quit
//! - **Space**: pause and resume the simulation

pub mod app;
pub mod aquarium;
pub mod buffer;
pub mod camera;
pub mod clock;
pub mod config;
pub mod demo;
pub mod error;
pub mod geometry;
pub mod gpu;
pub mod model;
pub mod random;
pub mod scene;
pub mod starfield;

pub use app::run;
pub use aquarium::Aquarium;
pub use buffer::AttributeBuffer;
pub use camera::PerspectiveCamera;
pub use demo::{Demo, Viewport};
pub use error::{ConfigError, DemoError, GpuError, ModelError};
pub use glam::{Vec2, Vec3, Vec4};
pub use random::RandomSource;
pub use scene::Scene;
pub use starfield::Starfield;

/// Convenient re-exports for building and running a scene.
pub mod prelude {
    pub use crate::aquarium::Aquarium;
    pub use crate::buffer::AttributeBuffer;
    pub use crate::camera::PerspectiveCamera;
    pub use crate::config::{AquariumConfig, StarfieldConfig};
    pub use crate::demo::{Demo, Viewport};
    pub use crate::error::{ConfigError, DemoError, GpuError, ModelError};
    pub use crate::model::{self, Model, PendingModel};
    pub use crate::random::{self, RandomSource};
    pub use crate::scene::{Mesh, Node, NodeId, PointCloud, Scene};
    pub use crate::starfield::{Phase, Starfield};
    pub use crate::{Vec2, Vec3, Vec4};
}
