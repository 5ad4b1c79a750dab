//! Window and frame loop.
//!
//! [`run`] opens a window, attaches a [`Renderer`] and then, once per
//! display refresh, advances the demo a single step and draws it. Escape or
//! closing the window ends the loop; Space pauses the simulation while
//! rendering continues.

use std::sync::Arc;

use rand::rngs::SmallRng;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::clock::FrameClock;
use crate::config::WindowConfig;
use crate::demo::{Demo, Viewport};
use crate::error::DemoError;
use crate::gpu::Renderer;
use crate::random;

struct App<D: Demo> {
    demo: D,
    window_config: WindowConfig,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    clock: FrameClock,
    rng: SmallRng,
    /// Set when startup fails inside the event loop.
    error: Option<DemoError>,
}

impl<D: Demo> App<D> {
    fn new(demo: D, window_config: WindowConfig) -> Self {
        Self {
            demo,
            window_config,
            window: None,
            renderer: None,
            clock: FrameClock::new(),
            rng: random::from_entropy(),
            error: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<(), DemoError> {
        let window_attrs = Window::default_attributes()
            .with_title(self.demo.title())
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.window_config.width,
                self.window_config.height,
            ));

        let window = Arc::new(event_loop.create_window(window_attrs)?);
        let renderer = pollster::block_on(Renderer::new(window.clone()))?;

        self.demo
            .resize(Viewport::from_physical(window.inner_size(), window.scale_factor()));
        window.request_redraw();

        self.window = Some(window);
        self.renderer = Some(renderer);
        Ok(())
    }

    fn resize(&mut self, size: winit::dpi::PhysicalSize<u32>) {
        let Some(window) = &self.window else {
            return;
        };
        let scale_factor = window.scale_factor();
        if let Some(renderer) = &mut self.renderer {
            renderer.resize(size, scale_factor);
        }
        if size.width > 0 && size.height > 0 {
            self.demo.resize(Viewport::from_physical(size, scale_factor));
        }
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: KeyEvent) {
        if event.state != ElementState::Pressed || event.repeat {
            return;
        }
        match event.physical_key {
            PhysicalKey::Code(KeyCode::Escape) => event_loop.exit(),
            PhysicalKey::Code(KeyCode::Space) => {
                let paused = self.clock.toggle_pause();
                log::info!("{}", if paused { "paused" } else { "resumed" });
            }
            _ => {}
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        if self.clock.tick() {
            self.demo.update(&mut self.rng);
        }

        if let Some(renderer) = &mut self.renderer {
            let (scene, camera) = self.demo.frame();
            match renderer.render(scene, camera) {
                Ok(_) => {}
                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => renderer.reconfigure(),
                Err(wgpu::SurfaceError::OutOfMemory) => {
                    log::error!("out of GPU memory, stopping");
                    event_loop.exit();
                }
                Err(e) => log::warn!("render error: {:?}", e),
            }
        }

        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

impl<D: Demo> ApplicationHandler for App<D> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() || self.error.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            self.error = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                self.resize(physical_size);
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(size) = self.window.as_ref().map(|w| w.inner_size()) {
                    self.resize(size);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                self.handle_key(event_loop, event);
            }
            WindowEvent::RedrawRequested => {
                self.redraw(event_loop);
            }
            _ => {}
        }
    }
}

/// Install the logger used by the binaries.
///
/// Info level by default with the graphics stack held to warnings;
/// `RUST_LOG` overrides both.
pub fn init_logging() {
    let mut builder = env_logger::Builder::new();
    builder.write_style(env_logger::WriteStyle::Auto);
    builder.filter_level(log::LevelFilter::Info);
    builder.filter_module("naga", log::LevelFilter::Warn);
    builder.filter_module("wgpu_core", log::LevelFilter::Warn);
    builder.filter_module("wgpu_hal", log::LevelFilter::Warn);
    builder.parse_default_env();
    let _ = builder.try_init();
}

/// Open a window and run `demo` until the window is closed.
pub fn run<D: Demo>(demo: D, window_config: &WindowConfig) -> Result<(), DemoError> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(demo, window_config.clone());
    event_loop.run_app(&mut app)?;

    log::info!(
        "stopped after {} frames ({} simulated) in {:.1?}",
        app.clock.frames(),
        app.clock.steps(),
        app.clock.elapsed()
    );

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
