/// Failures the render surface reports through the host's error callback.
///
/// Fatal variants stop the frame loop and leave the surface in the
/// `Failed` phase; recoverable variants leave the previous program and
/// the loop untouched so the backdrop never goes blank over a bad edit.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SurfaceError {
    #[error("no GPU context could be acquired: {reason}")]
    ContextUnavailable { reason: String },

    #[error("fragment shader failed to compile: {diagnostic}")]
    ShaderCompileError { diagnostic: String },

    #[error("GPU context was lost; the surface must be remounted")]
    ContextLost,

    #[error("uniform '{name}' is not declared by the active program")]
    UnknownUniform { name: String },

    #[error("uniform '{name}' expects {expected} but was supplied {supplied}")]
    UniformTypeMismatch {
        name: String,
        expected: &'static str,
        supplied: &'static str,
    },
}

impl SurfaceError {
    /// Fatal errors terminate the surface; everything else is a diagnostic.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SurfaceError::ContextUnavailable { .. } | SurfaceError::ContextLost
        )
    }
}

/// Host-supplied callback invoked for every diagnostic and failure.
///
/// The surface never panics across this boundary.
pub type ErrorSink = Box<dyn FnMut(&SurfaceError)>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatality_split_matches_taxonomy() {
        assert!(SurfaceError::ContextLost.is_fatal());
        assert!(SurfaceError::ContextUnavailable {
            reason: "no adapter".into()
        }
        .is_fatal());
        assert!(!SurfaceError::ShaderCompileError {
            diagnostic: "syntax".into()
        }
        .is_fatal());
        assert!(!SurfaceError::UnknownUniform {
            name: "speed".into()
        }
        .is_fatal());
    }
}
