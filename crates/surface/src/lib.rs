//! GPU render surface for animated fragment-shader backdrops.
//!
//! The host application supplies fragment source text, a uniform map, a
//! shared camera handle, and a handful of quality flags; this crate owns
//! everything downstream of that boundary. The overall flow is:
//!
//! ```text
//!   host (window, input, flags)
//!          │ mount / update / resize / set_fragment_source
//!          ▼
//!   SurfaceManager ──▶ tick(now) ──▶ UniformBridge ──▶ RenderBackend
//!          │                              ▲                  │
//!          └── on_error ◀─ diagnostics ───┘       wgpu draw ─┘
//! ```
//!
//! [`SurfaceManager`] runs the lifecycle state machine (mount, coalesced
//! recompiles and resizes, per-frame ticks, scoped teardown) against the
//! [`RenderBackend`] seam; [`WgpuBackend`] is the shipped implementation.
//! Fragment sources are plain `mainImage` shaders; `compile` wraps them
//! with the built-in uniform prelude and resolves their declared uniforms
//! into a registry so host-supplied uniform maps get WebGL-style
//! skip-and-diagnose semantics for unknown names.

mod backend;
mod bridge;
mod camera;
mod clock;
mod compile;
mod error;
mod gpu;
mod manager;
mod types;

pub use backend::RenderBackend;
pub use bridge::BuiltinUniforms;
pub use camera::{CameraHandle, CameraState};
pub use clock::{FrameClock, TimeSample};
pub use compile::{wrap_fragment, UniformRegistry, UniformSlot, WrappedShader};
pub use error::{ErrorSink, SurfaceError};
pub use gpu::{WgpuBackend, WgpuProgram};
pub use manager::{LifecyclePhase, SurfaceManager};
pub use types::{
    QualityMode, SurfaceConfig, SurfaceSize, UniformMap, UniformType, UniformValue,
};
