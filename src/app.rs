//! Frame drivers: a windowed loop on wgpu and a fixed-length headless run.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use glam::Vec2;
use log::{info, warn};
use pollster::block_on;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
use winit::keyboard::{Key, NamedKey as WinitNamedKey};
use winit::window::WindowBuilder;

use crate::assets::AssetLoader;
use crate::camera::Camera;
use crate::config::ViewerConfig;
use crate::gpu::{ClearMask, Gpu, GpuHandle, GraphicsDevice, HeadlessDevice, WgpuDevice};
use crate::input::{CameraInput, InputAction, KeyCode, MouseButton, NamedKey};
use crate::scene::Scene;

/// Counters gathered by [`run_headless`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeadlessReport {
    pub frames: u32,
    pub draw_calls: usize,
    /// Draws that landed in the mirror target.
    pub mirror_draw_calls: usize,
    pub point_lights: usize,
    pub spot_lights: usize,
    /// Device objects still alive after the scene was dropped.
    pub leaked_objects: usize,
}

impl fmt::Display for HeadlessReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Rendered {} frames", self.frames)?;
        writeln!(
            f,
            " - draw calls: {} ({} into the mirror)",
            self.draw_calls, self.mirror_draw_calls
        )?;
        writeln!(
            f,
            " - lights: {} point, {} spot",
            self.point_lights, self.spot_lights
        )?;
        write!(f, " - live device objects after teardown: {}", self.leaked_objects)
    }
}

/// Builds the scene on a [`HeadlessDevice`] and runs `config.frames`
/// update/draw cycles at the configured rate.
pub fn run_headless(config: &ViewerConfig, assets: &dyn AssetLoader) -> Result<HeadlessReport> {
    let device = Arc::new(HeadlessDevice::new());
    let gpu: Gpu = device.clone();
    let mut scene = Scene::new(gpu.clone(), assets, config).context("failed to build scene")?;
    let camera = Camera::new(config.width as f32, config.height as f32);
    let dt = config.frame_delta();

    let mirror = scene.mirror().framebuffer();
    let mut report = HeadlessReport {
        frames: config.frames,
        point_lights: scene.lights().point_lights().len(),
        spot_lights: scene.lights().spot_lights().len(),
        ..HeadlessReport::default()
    };

    for _ in 0..config.frames {
        scene.update(dt);
        gpu.bind_framebuffer(GpuHandle::EMPTY);
        gpu.clear(ClearMask::COLOR_DEPTH);
        scene.draw(&camera);

        // Tally the frame and drop its log so long runs stay flat.
        let draws = device.draws();
        report.draw_calls += draws.len();
        report.mirror_draw_calls += draws
            .iter()
            .filter(|draw| draw.framebuffer == mirror)
            .count();
        device.clear_draws();
        device.clear_calls();
    }

    drop(scene);
    report.leaked_objects = device.live_objects();
    if report.leaked_objects > 0 {
        warn!("{} device objects outlived the scene", report.leaked_objects);
    }
    Ok(report)
}

/// Window or event loop creation failed; the caller may fall back to a
/// headless run.
#[derive(Debug)]
pub struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
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

/// Opens a window and drives the scene until it is closed or `Escape` is
/// pressed.
pub fn run_interactive(config: &ViewerConfig, assets: &dyn AssetLoader) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Animated Scene")
            .with_inner_size(LogicalSize::new(config.width, config.height))
            .build(&event_loop)
            .map_err(|err| WindowInitError::from_error("window", err))?,
    );

    let device = Arc::new(block_on(WgpuDevice::new(Arc::clone(&window)))?);
    let gpu: Gpu = device.clone();
    let scene = Scene::new(gpu, assets, config).context("failed to build scene")?;
    let size = window.inner_size();

    let mut app = AppState {
        device,
        scene,
        camera: Camera::new(size.width as f32, size.height as f32),
        input: CameraInput::new(),
        frame_interval: Duration::from_secs_f32(config.frame_delta()),
        next_frame: Instant::now(),
        dt: config.frame_delta(),
        last_error: None,
    };

    event_loop
        .run(|event, elwt| {
            if let Err(err) = app.process_event(event, elwt) {
                app.last_error = Some(err);
                elwt.exit();
            }
        })
        .context("event loop terminated abnormally")?;

    info!("window closed");
    match app.last_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct AppState {
    device: Arc<WgpuDevice>,
    scene: Scene,
    camera: Camera,
    input: CameraInput,
    frame_interval: Duration,
    next_frame: Instant,
    dt: f32,
    last_error: Option<anyhow::Error>,
}

impl AppState {
    fn process_event(&mut self, event: Event<()>, elwt: &EventLoopWindowTarget<()>) -> Result<()> {
        match event {
            Event::WindowEvent { event, window_id } if window_id == self.device.window().id() => {
                match event {
                    WindowEvent::CloseRequested => elwt.exit(),
                    WindowEvent::Resized(size) => {
                        self.device.resize(size);
                        self.camera.resize(size.width as f32, size.height as f32);
                    }
                    WindowEvent::KeyboardInput { event, .. } => {
                        if event.state != ElementState::Pressed {
                            return Ok(());
                        }
                        let Some(key) = map_key(&event.logical_key) else {
                            return Ok(());
                        };
                        if self.input.key_pressed(&mut self.camera, key) == InputAction::Exit {
                            elwt.exit();
                        }
                    }
                    WindowEvent::MouseInput { state, button, .. } => {
                        self.input
                            .mouse_button(map_button(button), state == ElementState::Pressed);
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        let position = Vec2::new(position.x as f32, position.y as f32);
                        self.input.cursor_moved(&mut self.camera, position);
                    }
                    WindowEvent::MouseWheel { delta, .. } => {
                        let delta = match delta {
                            MouseScrollDelta::LineDelta(_, y) => y,
                            MouseScrollDelta::PixelDelta(position) => position.y as f32,
                        };
                        self.input.wheel(&mut self.camera, delta);
                    }
                    WindowEvent::RedrawRequested => self.render_frame()?,
                    _ => {}
                }
            }
            Event::AboutToWait => {
                let now = Instant::now();
                if now >= self.next_frame {
                    self.next_frame = now + self.frame_interval;
                    self.device.window().request_redraw();
                }
                elwt.set_control_flow(ControlFlow::WaitUntil(self.next_frame));
            }
            _ => {}
        }
        Ok(())
    }

    fn render_frame(&mut self) -> Result<()> {
        self.scene.update(self.dt);
        self.device.bind_framebuffer(GpuHandle::EMPTY);
        self.device.clear(ClearMask::COLOR_DEPTH);
        self.scene.draw(&self.camera);
        if let Err(err) = self.device.present() {
            match err {
                wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                    warn!("surface {err:?}; reconfiguring");
                    let size = self.device.window().inner_size();
                    self.device.resize(size);
                }
                wgpu::SurfaceError::OutOfMemory => {
                    return Err(anyhow!("GPU is out of memory"));
                }
                wgpu::SurfaceError::Timeout => {
                    info!("Surface timeout; retrying next frame");
                }
            }
        }
        Ok(())
    }
}

fn map_key(key: &Key) -> Option<KeyCode> {
    match key {
        Key::Named(WinitNamedKey::Escape) => Some(KeyCode::Named(NamedKey::Escape)),
        Key::Named(WinitNamedKey::Space) => Some(KeyCode::Named(NamedKey::Space)),
        Key::Named(WinitNamedKey::Enter) => Some(KeyCode::Named(NamedKey::Enter)),
        Key::Character(text) => KeyCode::from_name(text.as_str()),
        _ => None,
    }
}

fn map_button(button: winit::event::MouseButton) -> MouseButton {
    use winit::event::MouseButton as Winit;
    match button {
        Winit::Left => MouseButton::Left,
        Winit::Right => MouseButton::Right,
        Winit::Middle => MouseButton::Middle,
        Winit::Back => MouseButton::Other(3),
        Winit::Forward => MouseButton::Other(4),
        Winit::Other(value) => MouseButton::Other(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::BuiltinAssets;

    #[test]
    fn headless_run_counts_both_passes() {
        let config = ViewerConfig {
            frames: 2,
            seed: Some(1),
            ..ViewerConfig::default()
        };
        let report = run_headless(&config, &BuiltinAssets).unwrap();
        assert_eq!(report.frames, 2);
        assert_eq!(report.point_lights, 2);
        assert_eq!(report.spot_lights, 2);
        assert!(report.mirror_draw_calls > 0);
        // Each frame: reflected pass, real pass and the mirror surface.
        assert_eq!(report.draw_calls, 2 * report.mirror_draw_calls + 2);
        assert_eq!(report.leaked_objects, 0);
    }

    #[test]
    fn longer_runs_scale_the_tally_linearly() {
        let run = |frames| {
            let config = ViewerConfig {
                frames,
                seed: Some(5),
                ..ViewerConfig::default()
            };
            run_headless(&config, &BuiltinAssets).unwrap()
        };
        let one = run(1);
        let four = run(4);
        assert_eq!(four.draw_calls, 4 * one.draw_calls);
        assert_eq!(four.mirror_draw_calls, 4 * one.mirror_draw_calls);
    }

    #[test]
    fn report_mentions_frame_count() {
        let report = HeadlessReport {
            frames: 4,
            ..HeadlessReport::default()
        };
        assert!(report.to_string().starts_with("Rendered 4 frames"));
    }

    #[test]
    fn maps_winit_keys() {
        assert_eq!(
            map_key(&Key::Named(WinitNamedKey::Escape)),
            Some(KeyCode::Named(NamedKey::Escape))
        );
        assert_eq!(
            map_key(&Key::Character("r".into())),
            Some(KeyCode::Character('R'))
        );
    }
}
