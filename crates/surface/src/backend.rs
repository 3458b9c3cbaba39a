use crate::bridge::BuiltinUniforms;
use crate::compile::WrappedShader;
use crate::error::SurfaceError;
use crate::types::SurfaceSize;

/// The GPU seam the surface manager drives.
///
/// The shipped implementation is [`crate::gpu::WgpuBackend`]; tests run
/// the manager against a recording fake. Implementations own the drawing
/// context; programs they hand out are owned exclusively by the manager
/// and returned through `destroy_program` on swap or teardown.
pub trait RenderBackend {
    type Program;

    /// Compiles and links a wrapped fragment against the fixed
    /// full-screen vertex stage.
    ///
    /// A failed compile must leave the context untouched so the previous
    /// program keeps drawing.
    fn create_program(&mut self, shader: &WrappedShader) -> Result<Self::Program, SurfaceError>;

    /// Releases a program's GPU resources.
    fn destroy_program(&mut self, program: Self::Program);

    /// Reallocates the backing store at the new physical size.
    fn resize(&mut self, size: SurfaceSize);

    /// Uploads uniforms and issues one full-screen draw.
    ///
    /// `user_bytes` is the std140 user block for the program's registry;
    /// empty when the program declares no user uniforms. `ContextLost` is
    /// fatal; any other error is reported and the loop continues.
    fn draw(
        &mut self,
        program: &Self::Program,
        builtin: &BuiltinUniforms,
        user_bytes: &[u8],
    ) -> Result<(), SurfaceError>;
}
