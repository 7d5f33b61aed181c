//! Windowed front end and the helpers shared with headless runs.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use glam::{Vec2, Vec3};
use log::info;
use pollster::block_on;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, MouseButton as WinitMouseButton, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowId};

use crate::camera::OrbitCamera;
use crate::config::ViewerConfig;
use crate::frame::{FrameOrchestrator, LoopStats};
use crate::input::{InputState, MouseButton};
use crate::render::{GpuRenderer, ShaderSet};

pub const WINDOW_TITLE: &str = "orbit-viewer";
pub const WINDOW_SIZE: (u32, u32) = (1200, 800);

/// Spacing of the synthetic clock used when no display is attached.
pub const HEADLESS_FRAME_TIME: Duration = Duration::from_micros(16_667);

/// Timestamps of `frames` ticks at roughly 60 Hz, starting at zero.
pub fn headless_timestamps(frames: u32) -> impl Iterator<Item = Duration> {
    (0..frames).map(|frame| HEADLESS_FRAME_TIME * frame)
}

pub fn map_mouse_button(button: WinitMouseButton) -> Option<MouseButton> {
    let index = match button {
        WinitMouseButton::Left => 0,
        WinitMouseButton::Right => 1,
        WinitMouseButton::Middle => 2,
        WinitMouseButton::Back => 3,
        WinitMouseButton::Forward => 4,
        WinitMouseButton::Other(value) => u8::try_from(value).ok()?,
    };
    Some(MouseButton::new(index))
}

pub fn print_summary(frames: u32, stats: &LoopStats, camera: &OrbitCamera) {
    println!(
        "Simulated {frames} frame(s): {} update(s), {} submitted, {} skipped",
        stats.updates, stats.submitted, stats.skipped
    );
    print_camera(camera.eye());
}

pub fn print_camera(eye: Vec3) {
    println!("Camera eye=({:.2}, {:.2}, {:.2})", eye.x, eye.y, eye.z);
}

/// The platform refused to give us a window or an event loop.
#[derive(Debug)]
pub struct WindowInitError {
    message: String,
}

impl WindowInitError {
    pub fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    pub fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

/// Interactive viewer driven by the winit event loop.
///
/// The window and GPU state are created on the first `resumed` call. A
/// fatal error stops the loop and is kept for the caller in `last_error`.
pub struct ViewerApp {
    config: ViewerConfig,
    shaders: ShaderSet,
    orchestrator: Option<FrameOrchestrator<GpuRenderer>>,
    input: InputState,
    cursor: Vec2,
    start: Instant,
    frames: u32,
    last_error: Option<anyhow::Error>,
}

impl ViewerApp {
    pub fn new(config: ViewerConfig, shaders: ShaderSet) -> Self {
        Self {
            config,
            shaders,
            orchestrator: None,
            input: InputState::new(),
            cursor: Vec2::ZERO,
            start: Instant::now(),
            frames: 0,
            last_error: None,
        }
    }

    /// Consumes the app after the event loop returns.
    pub fn finish(self) -> anyhow::Result<()> {
        if let Some(err) = self.last_error {
            return Err(err);
        }
        if let Some(orchestrator) = &self.orchestrator {
            print_summary(self.frames, &orchestrator.stats(), orchestrator.camera());
        }
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        self.last_error = Some(err);
        event_loop.exit();
    }

    fn create_orchestrator(
        &self,
        event_loop: &ActiveEventLoop,
    ) -> anyhow::Result<FrameOrchestrator<GpuRenderer>> {
        let attributes = Window::default_attributes()
            .with_title(WINDOW_TITLE)
            .with_inner_size(LogicalSize::new(WINDOW_SIZE.0, WINDOW_SIZE.1));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|err| WindowInitError::from_error("window", err))?,
        );
        let renderer = block_on(GpuRenderer::new(
            Arc::clone(&window),
            &self.shaders,
            self.config.drawables.len(),
        ))
        .context("failed to set up renderer")?;
        let orchestrator = FrameOrchestrator::new(renderer, &self.config)
            .context("failed to prepare drawables")?;
        info!(
            "viewer ready: {:?} layout, {} drawable(s)",
            orchestrator.layout(),
            orchestrator.drawables().len()
        );
        Ok(orchestrator)
    }

    fn handle_mouse_button(&mut self, state: ElementState, button: WinitMouseButton) {
        let Some(button) = map_mouse_button(button) else {
            return;
        };
        if !button.drives_drag() {
            return;
        }
        match state {
            ElementState::Pressed => self.input.press(self.cursor),
            ElementState::Released => self.input.release(),
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(orchestrator) = self.orchestrator.as_mut() else {
            return;
        };
        match orchestrator.tick(self.start.elapsed(), &mut self.input) {
            Ok(_) => self.frames += 1,
            Err(err) => self.fail(event_loop, anyhow!(err).context("frame failed")),
        }
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.orchestrator.is_some() {
            return;
        }
        match self.create_orchestrator(event_loop) {
            Ok(orchestrator) => {
                self.orchestrator = Some(orchestrator);
                self.start = Instant::now();
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(orchestrator) = self.orchestrator.as_mut() else {
            return;
        };
        if window_id != orchestrator.backend().window_id() {
            return;
        }

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => orchestrator.backend_mut().resize(size),
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Vec2::new(position.x as f32, position.y as f32);
                self.input.move_to(self.cursor);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.handle_mouse_button(state, button);
            }
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed && !event.repeat =>
            {
                match event.logical_key {
                    Key::Named(NamedKey::Escape) => event_loop.exit(),
                    Key::Named(NamedKey::Space) => {
                        let layout = orchestrator.layout().toggled();
                        orchestrator.set_layout(layout);
                        info!("layout switched to {:?}", orchestrator.layout());
                    }
                    _ => {}
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(orchestrator) = &self.orchestrator {
            orchestrator.backend().window().request_redraw();
        }
    }
}
