use std::collections::HashMap;

/// Physical pixel dimensions of a drawing surface or its container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A zero-area surface cannot back a swapchain.
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}

impl Default for SurfaceSize {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

/// Feature flags and display parameters the host passes into
/// `mount`/`update`. Replaces ambient per-flag state with one struct
/// that is applied atomically.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceConfig {
    /// Raises the device-pixel-ratio cap on the backing store.
    pub is_hd_enabled: bool,
    /// Enables the optional FPS-overlay uniform (and host-side counters).
    pub is_fps_enabled: bool,
    /// Gates whether `tick` asks the host to schedule another frame.
    pub is_playing: bool,
    /// Live hint to lower the resolution scale under load. No auto-tuning
    /// policy sets this; hosts decide.
    pub should_reduce_quality: bool,
    /// Device pixel ratio of the hosting display.
    pub pixel_ratio: f32,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            is_hd_enabled: false,
            is_fps_enabled: false,
            is_playing: true,
            should_reduce_quality: false,
            pixel_ratio: 1.0,
        }
    }
}

/// Resolution policy derived from the HD and reduce-quality flags.
///
/// Never stored: recomputed from the current [`SurfaceConfig`] wherever
/// a backing-store size is needed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QualityMode {
    /// Multiplier applied to the container size after the pixel-ratio cap.
    pub resolution_scale: f32,
    /// Upper bound on the device pixel ratio honoured by the surface.
    pub pixel_ratio_cap: f32,
}

impl QualityMode {
    pub fn derive(config: &SurfaceConfig) -> Self {
        let pixel_ratio_cap = if config.is_hd_enabled { 2.0 } else { 1.0 };
        let resolution_scale = if config.should_reduce_quality { 0.5 } else { 1.0 };
        Self {
            resolution_scale,
            pixel_ratio_cap,
        }
    }

    /// Maps a logical container size to the physical backing-store size.
    pub fn physical_size(&self, container: SurfaceSize, pixel_ratio: f32) -> SurfaceSize {
        let ratio = pixel_ratio.min(self.pixel_ratio_cap).max(0.1);
        let scale = ratio * self.resolution_scale;
        SurfaceSize::new(
            ((container.width as f32 * scale).round() as u32).max(1),
            ((container.height as f32 * scale).round() as u32).max(1),
        )
    }
}

/// GLSL types the user-uniform scanner recognises.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformType {
    Float,
    Int,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
}

impl UniformType {
    pub(crate) fn from_glsl(keyword: &str) -> Option<Self> {
        match keyword {
            "float" => Some(UniformType::Float),
            "int" => Some(UniformType::Int),
            "vec2" => Some(UniformType::Vec2),
            "vec3" => Some(UniformType::Vec3),
            "vec4" => Some(UniformType::Vec4),
            "mat4" => Some(UniformType::Mat4),
            _ => None,
        }
    }

    pub(crate) fn glsl_name(self) -> &'static str {
        match self {
            UniformType::Float => "float",
            UniformType::Int => "int",
            UniformType::Vec2 => "vec2",
            UniformType::Vec3 => "vec3",
            UniformType::Vec4 => "vec4",
            UniformType::Mat4 => "mat4",
        }
    }

    /// std140 base alignment in bytes.
    pub(crate) fn align(self) -> usize {
        match self {
            UniformType::Float | UniformType::Int => 4,
            UniformType::Vec2 => 8,
            UniformType::Vec3 | UniformType::Vec4 | UniformType::Mat4 => 16,
        }
    }

    /// std140 size in bytes (vec3 occupies 12; the packer handles padding).
    pub(crate) fn size(self) -> usize {
        match self {
            UniformType::Float | UniformType::Int => 4,
            UniformType::Vec2 => 8,
            UniformType::Vec3 => 12,
            UniformType::Vec4 => 16,
            UniformType::Mat4 => 64,
        }
    }
}

/// A named value the host supplies each frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat4([[f32; 4]; 4]),
}

impl UniformValue {
    pub fn ty(&self) -> UniformType {
        match self {
            UniformValue::Float(_) => UniformType::Float,
            UniformValue::Int(_) => UniformType::Int,
            UniformValue::Vec2(_) => UniformType::Vec2,
            UniformValue::Vec3(_) => UniformType::Vec3,
            UniformValue::Vec4(_) => UniformType::Vec4,
            UniformValue::Mat4(_) => UniformType::Mat4,
        }
    }

    /// Writes the value's std140 byte representation into `out`.
    ///
    /// `out` must be at least `self.ty().size()` bytes.
    pub(crate) fn write_into(&self, out: &mut [u8]) {
        match self {
            UniformValue::Float(v) => out[..4].copy_from_slice(&v.to_le_bytes()),
            UniformValue::Int(v) => out[..4].copy_from_slice(&v.to_le_bytes()),
            UniformValue::Vec2(v) => write_floats(out, v),
            UniformValue::Vec3(v) => write_floats(out, v),
            UniformValue::Vec4(v) => write_floats(out, v),
            UniformValue::Mat4(columns) => {
                for (index, column) in columns.iter().enumerate() {
                    write_floats(&mut out[index * 16..], column);
                }
            }
        }
    }
}

fn write_floats(out: &mut [u8], values: &[f32]) {
    for (index, value) in values.iter().enumerate() {
        out[index * 4..index * 4 + 4].copy_from_slice(&value.to_le_bytes());
    }
}

/// Insertion-order-irrelevant mapping from uniform name to value.
pub type UniformMap = HashMap<String, UniformValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_defaults_to_sd_full_scale() {
        let mode = QualityMode::derive(&SurfaceConfig::default());
        assert_eq!(mode.pixel_ratio_cap, 1.0);
        assert_eq!(mode.resolution_scale, 1.0);
    }

    #[test]
    fn hd_raises_pixel_ratio_cap() {
        let config = SurfaceConfig {
            is_hd_enabled: true,
            pixel_ratio: 2.0,
            ..SurfaceConfig::default()
        };
        let mode = QualityMode::derive(&config);
        let physical = mode.physical_size(SurfaceSize::new(800, 600), config.pixel_ratio);
        assert_eq!(physical, SurfaceSize::new(1600, 1200));
    }

    #[test]
    fn sd_caps_pixel_ratio_at_one() {
        let config = SurfaceConfig {
            pixel_ratio: 2.0,
            ..SurfaceConfig::default()
        };
        let mode = QualityMode::derive(&config);
        let physical = mode.physical_size(SurfaceSize::new(800, 600), config.pixel_ratio);
        assert_eq!(physical, SurfaceSize::new(800, 600));
    }

    #[test]
    fn reduce_quality_halves_scale() {
        let config = SurfaceConfig {
            should_reduce_quality: true,
            ..SurfaceConfig::default()
        };
        let mode = QualityMode::derive(&config);
        let physical = mode.physical_size(SurfaceSize::new(800, 600), 1.0);
        assert_eq!(physical, SurfaceSize::new(400, 300));
    }

    #[test]
    fn physical_size_never_collapses_to_zero() {
        let config = SurfaceConfig {
            should_reduce_quality: true,
            ..SurfaceConfig::default()
        };
        let mode = QualityMode::derive(&config);
        let physical = mode.physical_size(SurfaceSize::new(1, 1), 1.0);
        assert_eq!(physical, SurfaceSize::new(1, 1));
    }

    #[test]
    fn uniform_value_reports_matching_type() {
        assert_eq!(UniformValue::Vec3([0.0; 3]).ty(), UniformType::Vec3);
        assert_eq!(UniformValue::Mat4([[0.0; 4]; 4]).ty(), UniformType::Mat4);
    }
}
