use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use tracing_subscriber::EnvFilter;
use winit::dpi::{LogicalSize, PhysicalPosition};
use winit::event::{ElementState, Event, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::WindowBuilder;

use surface::{
    CameraHandle, CameraState, LifecyclePhase, SurfaceManager, SurfaceSize, UniformMap,
    WgpuBackend,
};

use crate::cli::Args;

const DEFAULT_SHADER: &str = include_str!("../shaders/galaxy.frag");

pub fn run(args: Args) -> Result<()> {
    initialise_tracing();

    let fragment_src = match args.shader.as_deref() {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read shader {}", path.display()))?,
        None => DEFAULT_SHADER.to_owned(),
    };

    let container = args.size.unwrap_or(SurfaceSize::new(1280, 720));

    let event_loop = EventLoop::new().context("failed to initialize event loop")?;
    let window = WindowBuilder::new()
        .with_title("backdrop")
        .with_inner_size(LogicalSize::new(container.width, container.height))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create preview window: {err}"))?;
    let window = Arc::new(window);

    let pixel_ratio = window.scale_factor() as f32;
    let mut config = args.surface_config(pixel_ratio);
    let uniforms: UniformMap = args.uniforms.iter().cloned().collect();

    let camera = CameraHandle::new(CameraState::default());
    let mut orbit = OrbitController::default();
    orbit.apply(&camera);

    let target = window.clone();
    let mut manager = SurfaceManager::mount(
        move |size| WgpuBackend::new(target.as_ref(), size),
        container,
        &fragment_src,
        config,
        camera.clone(),
        Box::new(|err| tracing::error!(error = %err, "surface error")),
    );
    if manager.phase() == LifecyclePhase::Failed {
        bail!("surface failed to initialise; see log for details");
    }
    manager.update(config, uniforms.clone());

    let mut fps = FpsCounter::new();
    window.request_redraw();

    event_loop
        .run(move |event, elwt| {
            elwt.set_control_flow(ControlFlow::Wait);
            let Event::WindowEvent { event, .. } = event else {
                return;
            };
            match event {
                WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                    manager.unmount();
                    elwt.exit();
                }
                WindowEvent::Resized(new_size) => {
                    let logical: LogicalSize<u32> =
                        new_size.to_logical(f64::from(config.pixel_ratio));
                    manager.resize(SurfaceSize::new(logical.width, logical.height));
                    window.request_redraw();
                }
                WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                    if args.pixel_ratio.is_none() {
                        config.pixel_ratio = scale_factor as f32;
                        manager.update(config, uniforms.clone());
                        window.request_redraw();
                    }
                }
                WindowEvent::CursorMoved { position, .. } => {
                    if orbit.handle_cursor_moved(position) {
                        orbit.apply(&camera);
                        window.request_redraw();
                    }
                }
                WindowEvent::MouseInput { state, button, .. } => {
                    if button == MouseButton::Left {
                        orbit.handle_button(state);
                    }
                }
                WindowEvent::MouseWheel { delta, .. } => {
                    orbit.handle_scroll(delta);
                    orbit.apply(&camera);
                    window.request_redraw();
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    if event.state != ElementState::Pressed || event.repeat {
                        return;
                    }
                    match &event.logical_key {
                        Key::Named(NamedKey::Escape) => {
                            manager.unmount();
                            elwt.exit();
                        }
                        Key::Named(NamedKey::Space) => {
                            config.is_playing = !config.is_playing;
                            tracing::info!(playing = config.is_playing, "toggled playback");
                            manager.update(config, uniforms.clone());
                            window.request_redraw();
                        }
                        Key::Character(value) => match value.as_str() {
                            "h" | "H" => {
                                config.is_hd_enabled = !config.is_hd_enabled;
                                tracing::info!(hd = config.is_hd_enabled, "toggled HD mode");
                                manager.update(config, uniforms.clone());
                                window.request_redraw();
                            }
                            "q" | "Q" => {
                                config.should_reduce_quality = !config.should_reduce_quality;
                                tracing::info!(
                                    reduced = config.should_reduce_quality,
                                    "toggled reduced quality"
                                );
                                manager.update(config, uniforms.clone());
                                window.request_redraw();
                            }
                            "f" | "F" => {
                                config.is_fps_enabled = !config.is_fps_enabled;
                                manager.update(config, uniforms.clone());
                                window.request_redraw();
                            }
                            _ => {}
                        },
                        _ => {}
                    }
                }
                WindowEvent::RedrawRequested => {
                    let keep_animating = manager.tick(Instant::now());
                    if config.is_fps_enabled {
                        fps.mark_frame();
                    }
                    if keep_animating {
                        window.request_redraw();
                    }
                }
                _ => {}
            }
        })
        .map_err(|err| anyhow!("window event loop error: {err}"))
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Drag-to-orbit camera control; left drag adjusts yaw/pitch, scroll zooms.
struct OrbitController {
    yaw: f32,
    pitch: f32,
    radius: f32,
    dragging: bool,
    last_cursor: Option<PhysicalPosition<f64>>,
}

impl Default for OrbitController {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            radius: 5.0,
            dragging: false,
            last_cursor: None,
        }
    }
}

impl OrbitController {
    const DRAG_SENSITIVITY: f32 = 0.005;
    const MIN_RADIUS: f32 = 0.5;
    const MAX_RADIUS: f32 = 50.0;

    fn handle_button(&mut self, state: ElementState) {
        match state {
            ElementState::Pressed => self.dragging = true,
            ElementState::Released => {
                self.dragging = false;
                self.last_cursor = None;
            }
        }
    }

    fn handle_cursor_moved(&mut self, position: PhysicalPosition<f64>) -> bool {
        if !self.dragging {
            return false;
        }
        let moved = if let Some(last) = self.last_cursor {
            let dx = (position.x - last.x) as f32;
            let dy = (position.y - last.y) as f32;
            self.yaw += dx * Self::DRAG_SENSITIVITY;
            self.pitch += dy * Self::DRAG_SENSITIVITY;
            dx != 0.0 || dy != 0.0
        } else {
            false
        };
        self.last_cursor = Some(position);
        moved
    }

    fn handle_scroll(&mut self, delta: MouseScrollDelta) {
        let steps = match delta {
            MouseScrollDelta::LineDelta(_, y) => y,
            MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 40.0,
        };
        self.radius =
            (self.radius * (1.0 - steps * 0.1)).clamp(Self::MIN_RADIUS, Self::MAX_RADIUS);
    }

    fn apply(&self, camera: &CameraHandle) {
        camera.set(CameraState::from_orbit(self.yaw, self.pitch, self.radius));
    }
}

struct FpsCounter {
    window_start: Instant,
    frames: u32,
}

impl FpsCounter {
    fn new() -> Self {
        Self {
            window_start: Instant::now(),
            frames: 0,
        }
    }

    fn mark_frame(&mut self) {
        self.frames += 1;
        let elapsed = self.window_start.elapsed();
        if elapsed >= Duration::from_secs(1) {
            let fps = self.frames as f64 / elapsed.as_secs_f64();
            tracing::info!(fps = format_args!("{fps:.1}"), "frame rate");
            self.window_start = Instant::now();
            self.frames = 0;
        }
    }
}
