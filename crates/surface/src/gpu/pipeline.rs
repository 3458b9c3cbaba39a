use std::borrow::Cow;

use wgpu::naga::ShaderStage;

use crate::compile::{WrappedShader, VERTEX_SHADER_GLSL};
use crate::error::SurfaceError;

/// Bind group layouts and the shared vertex module, created once per
/// context and reused across program swaps.
pub(crate) struct PipelineLayouts {
    pub builtin_layout: wgpu::BindGroupLayout,
    pub user_layout: wgpu::BindGroupLayout,
    pub vertex_module: wgpu::ShaderModule,
}

impl PipelineLayouts {
    pub(crate) fn new(device: &wgpu::Device) -> Self {
        let builtin_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("builtin uniform layout"),
            entries: &[uniform_entry(0)],
        });
        let user_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("user uniform layout"),
            entries: &[uniform_entry(0)],
        });

        let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("fullscreen triangle vertex"),
            source: wgpu::ShaderSource::Glsl {
                shader: Cow::Borrowed(VERTEX_SHADER_GLSL),
                stage: ShaderStage::Vertex,
                defines: &[],
            },
        });

        Self {
            builtin_layout,
            user_layout,
            vertex_module,
        }
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Compiles the wrapped fragment and links the render pipeline.
///
/// Compile and link diagnostics are captured through a validation error
/// scope so a bad edit surfaces as a recoverable [`SurfaceError`] instead
/// of an uncaptured device error.
pub(crate) fn build_pipeline(
    device: &wgpu::Device,
    layouts: &PipelineLayouts,
    surface_format: wgpu::TextureFormat,
    shader: &WrappedShader,
) -> Result<wgpu::RenderPipeline, SurfaceError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("backdrop fragment"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(&shader.source),
            stage: ShaderStage::Fragment,
            defines: &[],
        },
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("backdrop pipeline layout"),
        bind_group_layouts: &[&layouts.builtin_layout, &layouts.user_layout],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("backdrop pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &layouts.vertex_module,
            entry_point: Some("main"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        fragment: Some(wgpu::FragmentState {
            module: &fragment_module,
            entry_point: Some("main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: surface_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    });

    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        return Err(SurfaceError::ShaderCompileError {
            diagnostic: error.to_string(),
        });
    }

    Ok(pipeline)
}
