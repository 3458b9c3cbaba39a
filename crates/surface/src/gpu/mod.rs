//! wgpu implementation of the [`RenderBackend`] seam.
//!
//! - `context` owns instance/device/surface wiring and swapchain
//!   reconfiguration on resize.
//! - `pipeline` compiles wrapped GLSL into render pipelines behind a
//!   validation error scope so bad edits stay recoverable.
//! - This module glues them into `WgpuBackend`: uniform buffers, bind
//!   groups, and the one-draw-per-tick render pass.

mod context;
mod pipeline;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::backend::RenderBackend;
use crate::bridge::BuiltinUniforms;
use crate::compile::WrappedShader;
use crate::error::SurfaceError;
use crate::types::SurfaceSize;

use context::GpuContext;
use pipeline::PipelineLayouts;

/// Smallest legal uniform buffer; used when a program has no user block.
const EMPTY_USER_BLOCK_BYTES: u64 = 16;

/// A compiled program plus the per-program user uniform buffer.
///
/// All wgpu resources release on drop, so `destroy_program` is a plain
/// move into oblivion.
pub struct WgpuProgram {
    pipeline: wgpu::RenderPipeline,
    user_buffer: wgpu::Buffer,
    user_bind_group: wgpu::BindGroup,
}

/// GPU context, shared layouts, and the built-in uniform buffer.
pub struct WgpuBackend {
    context: GpuContext,
    layouts: PipelineLayouts,
    builtin_buffer: wgpu::Buffer,
    builtin_bind_group: wgpu::BindGroup,
}

impl WgpuBackend {
    /// Acquires a GPU context for the given window target.
    ///
    /// Every acquisition failure (no surface, no adapter, no device) maps
    /// to [`SurfaceError::ContextUnavailable`].
    pub fn new<T>(target: &T, size: SurfaceSize) -> Result<Self, SurfaceError>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, size).map_err(|err| {
            SurfaceError::ContextUnavailable {
                reason: format!("{err:#}"),
            }
        })?;
        let layouts = PipelineLayouts::new(&context.device);

        let builtin_buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("builtin uniform buffer"),
            size: std::mem::size_of::<BuiltinUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let builtin_bind_group = context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("builtin bind group"),
                layout: &layouts.builtin_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: builtin_buffer.as_entire_binding(),
                }],
            });

        Ok(Self {
            context,
            layouts,
            builtin_buffer,
            builtin_bind_group,
        })
    }
}

impl RenderBackend for WgpuBackend {
    type Program = WgpuProgram;

    fn create_program(&mut self, shader: &WrappedShader) -> Result<WgpuProgram, SurfaceError> {
        let pipeline = pipeline::build_pipeline(
            &self.context.device,
            &self.layouts,
            self.context.surface_format,
            shader,
        )?;

        let user_size = (shader.uniforms.byte_len() as u64).max(EMPTY_USER_BLOCK_BYTES);
        let user_buffer = self.context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("user uniform buffer"),
            size: user_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let user_bind_group = self
            .context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("user bind group"),
                layout: &self.layouts.user_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: user_buffer.as_entire_binding(),
                }],
            });

        Ok(WgpuProgram {
            pipeline,
            user_buffer,
            user_bind_group,
        })
    }

    fn destroy_program(&mut self, program: WgpuProgram) {
        drop(program);
    }

    fn resize(&mut self, size: SurfaceSize) {
        self.context.resize(size);
    }

    fn draw(
        &mut self,
        program: &WgpuProgram,
        builtin: &BuiltinUniforms,
        user_bytes: &[u8],
    ) -> Result<(), SurfaceError> {
        let frame = match self.context.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Timeout) => {
                tracing::debug!("surface timeout; skipping frame");
                return Ok(());
            }
            Err(err) => {
                tracing::warn!(error = ?err, "surface unusable");
                return Err(SurfaceError::ContextLost);
            }
        };

        self.context
            .queue
            .write_buffer(&self.builtin_buffer, 0, bytemuck::bytes_of(builtin));
        if !user_bytes.is_empty() {
            self.context
                .queue
                .write_buffer(&program.user_buffer, 0, user_bytes);
        }

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("backdrop encoder"),
                });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("backdrop pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(&program.pipeline);
            render_pass.set_bind_group(0, &self.builtin_bind_group, &[]);
            render_pass.set_bind_group(1, &program.user_bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }

        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}
