//! Per-tick translation of application state into shader inputs.
//!
//! The bridge writes, in fixed order: built-in time/resolution uniforms,
//! camera-derived uniforms from the tick's snapshot, then every entry of
//! the host's uniform map through the active program's registry. It only
//! reads camera state and never changes which draws happen.

use std::collections::HashSet;

use bytemuck::{Pod, Zeroable};

use crate::camera::CameraState;
use crate::clock::TimeSample;
use crate::compile::UniformRegistry;
use crate::error::SurfaceError;
use crate::types::{SurfaceConfig, SurfaceSize, UniformMap};

/// Built-in uniform block, std140-compatible.
///
/// Field order and padding must match the `SurfaceParams` block in
/// `compile.rs::HEADER`.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug)]
pub struct BuiltinUniforms {
    /// xy: backing size in pixels, z: pixel ratio, w: mirrored time.
    pub resolution: [f32; 4],
    pub time: f32,
    pub time_delta: f32,
    pub frame: i32,
    pub quality_scale: f32,
    /// xyz: eye position, w: vertical fov in radians.
    pub camera_position: [f32; 4],
    /// xyz: look direction, w: aspect ratio.
    pub camera_forward: [f32; 4],
    /// xyz: up vector, w: unused.
    pub camera_up: [f32; 4],
    /// x: hd, y: fps overlay, z: reduced quality, w: playing.
    pub flags: [f32; 4],
}

unsafe impl Zeroable for BuiltinUniforms {}
unsafe impl Pod for BuiltinUniforms {}

/// Writes frame uniforms and rate-limits per-name diagnostics.
///
/// Unknown or mismatched names are reported once per program rather than
/// every frame; `reset` clears the ledger when a new program installs.
#[derive(Debug, Default)]
pub(crate) struct UniformBridge {
    reported: HashSet<String>,
}

impl UniformBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.reported.clear();
    }

    /// Packs one frame's uniforms.
    ///
    /// `user_bytes` must be `registry.byte_len()` bytes; values land at
    /// their registry offsets. Each diagnostic is delivered through
    /// `report` at most once per name until the next `reset`.
    #[allow(clippy::too_many_arguments)]
    pub fn push_frame(
        &mut self,
        builtin: &mut BuiltinUniforms,
        user_bytes: &mut [u8],
        registry: &UniformRegistry,
        sample: TimeSample,
        size: SurfaceSize,
        camera: &CameraState,
        uniforms: &UniformMap,
        config: &SurfaceConfig,
        report: &mut dyn FnMut(SurfaceError),
    ) {
        builtin.resolution = [
            size.width as f32,
            size.height as f32,
            config.pixel_ratio,
            sample.seconds,
        ];
        builtin.time = sample.seconds;
        builtin.time_delta = sample.delta;
        builtin.frame = sample.frame.min(i32::MAX as u32) as i32;
        builtin.quality_scale = if config.should_reduce_quality { 0.5 } else { 1.0 };

        builtin.camera_position = [
            camera.position[0],
            camera.position[1],
            camera.position[2],
            camera.fov_y,
        ];
        builtin.camera_forward = [
            camera.forward[0],
            camera.forward[1],
            camera.forward[2],
            size.aspect(),
        ];
        builtin.camera_up = [camera.up[0], camera.up[1], camera.up[2], 0.0];
        builtin.flags = [
            config.is_hd_enabled as u32 as f32,
            config.is_fps_enabled as u32 as f32,
            config.should_reduce_quality as u32 as f32,
            config.is_playing as u32 as f32,
        ];

        for (name, value) in uniforms {
            match registry.lookup(name) {
                Some(slot) if slot.ty == value.ty() => {
                    value.write_into(&mut user_bytes[slot.offset..]);
                }
                Some(slot) => {
                    self.report_once(
                        name,
                        SurfaceError::UniformTypeMismatch {
                            name: name.clone(),
                            expected: slot.ty.glsl_name(),
                            supplied: value.ty().glsl_name(),
                        },
                        report,
                    );
                }
                None => {
                    self.report_once(
                        name,
                        SurfaceError::UnknownUniform { name: name.clone() },
                        report,
                    );
                }
            }
        }
    }

    fn report_once(
        &mut self,
        name: &str,
        error: SurfaceError,
        report: &mut dyn FnMut(SurfaceError),
    ) {
        if self.reported.insert(name.to_string()) {
            tracing::debug!(uniform = name, error = %error, "skipping uniform");
            report(error);
        }
    }
}
