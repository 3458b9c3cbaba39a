use std::sync::{Arc, RwLock};

/// Camera parameters an input controller writes and the surface reads.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraState {
    /// Eye position in world space.
    pub position: [f32; 3],
    /// Normalised look direction.
    pub forward: [f32; 3],
    /// Normalised up vector.
    pub up: [f32; 3],
    /// Vertical field of view in radians.
    pub fov_y: f32,
}

impl CameraState {
    /// Orbit camera around the origin; the shape drag controllers produce.
    pub fn from_orbit(yaw: f32, pitch: f32, radius: f32) -> Self {
        let pitch = pitch.clamp(
            -std::f32::consts::FRAC_PI_2 + 0.01,
            std::f32::consts::FRAC_PI_2 - 0.01,
        );
        let radius = radius.max(0.1);
        let position = [
            radius * pitch.cos() * yaw.sin(),
            radius * pitch.sin(),
            radius * pitch.cos() * yaw.cos(),
        ];
        let length = (position[0] * position[0]
            + position[1] * position[1]
            + position[2] * position[2])
            .sqrt()
            .max(f32::EPSILON);
        let forward = [
            -position[0] / length,
            -position[1] / length,
            -position[2] / length,
        ];
        Self {
            position,
            forward,
            up: [0.0, 1.0, 0.0],
            fov_y: CameraState::default().fov_y,
        }
    }
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 5.0],
            forward: [0.0, 0.0, -1.0],
            up: [0.0, 1.0, 0.0],
            fov_y: 60f32.to_radians(),
        }
    }
}

/// Shared camera reference crossing from input handling into the surface.
///
/// Single writer (the host's pointer/drag controller), many readers (one
/// snapshot per tick). The surface never writes through this handle, so
/// rendering cannot feed back into input handling.
#[derive(Clone, Debug)]
pub struct CameraHandle {
    inner: Arc<RwLock<CameraState>>,
}

impl CameraHandle {
    pub fn new(state: CameraState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    /// Replaces the camera state wholesale. Writer side only.
    pub fn set(&self, state: CameraState) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = state;
    }

    /// Applies an in-place mutation. Writer side only.
    pub fn update(&self, apply: impl FnOnce(&mut CameraState)) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        apply(&mut guard);
    }

    /// Reads a consistent copy of the current state.
    ///
    /// Called once per tick so a frame never observes a half-applied
    /// camera update. A poisoned lock (panicked writer) still yields the
    /// last written state rather than taking the render loop down.
    pub fn snapshot(&self) -> CameraState {
        *self
            .inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for CameraHandle {
    fn default() -> Self {
        Self::new(CameraState::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_latest_write() {
        let handle = CameraHandle::default();
        let before = handle.snapshot();

        handle.update(|camera| camera.position = [1.0, 2.0, 3.0]);
        let after = handle.snapshot();

        assert_eq!(before.position, [0.0, 0.0, 5.0]);
        assert_eq!(after.position, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn clones_share_state() {
        let writer = CameraHandle::default();
        let reader = writer.clone();
        writer.set(CameraState {
            fov_y: 1.0,
            ..CameraState::default()
        });
        assert_eq!(reader.snapshot().fov_y, 1.0);
    }

    #[test]
    fn orbit_looks_at_origin() {
        let camera = CameraState::from_orbit(0.0, 0.0, 5.0);
        assert!((camera.position[2] - 5.0).abs() < 1e-5);
        assert!((camera.forward[2] + 1.0).abs() < 1e-5);
    }

    #[test]
    fn orbit_clamps_pitch() {
        let camera = CameraState::from_orbit(0.0, 10.0, 5.0);
        assert!(camera.position[1] < 5.0);
        assert!(camera.position[1] > 0.0);
    }
}
