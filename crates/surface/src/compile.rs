//! Fragment-source wrapping and uniform-name resolution.
//!
//! Caller shaders are plain `mainImage(out vec4, in vec2)` fragments that
//! may declare `uniform <type> <name>;` inputs at file scope. Vulkan-style
//! GLSL has no free-standing uniforms, so wrapping performs three steps:
//!
//! 1. Strip `#version` directives and any declarations of the built-in
//!    uniform names so our own definitions win.
//! 2. Scan out recognised user uniform declarations and replay them as a
//!    generated std140 block (set 1, binding 0) with `#define` aliases,
//!    recording each name's type and byte offset in a [`UniformRegistry`].
//! 3. Prepend [`HEADER`] (built-in block + aliases) and append [`FOOTER`]
//!    (bottom-left `gl_FragCoord` remap, `mainImage` dispatch).
//!
//! The registry is what gives host-supplied uniform maps WebGL-style
//! semantics: names absent from it are skipped with a diagnostic instead
//! of failing the frame.

use crate::types::UniformType;

/// Built-in names whose declarations are stripped so the header's block
/// and macros take precedence.
const BUILTIN_UNIFORM_NAMES: &[&str] = &[
    "uResolution",
    "uTime",
    "uTimeDelta",
    "uFrame",
    "uQualityScale",
    "uCameraPosition",
    "uCameraForward",
    "uCameraUp",
    "uCameraFov",
    "uCameraAspect",
    "uFlags",
];

/// One scanned user uniform: where its bytes live in the user block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UniformSlot {
    pub name: String,
    pub ty: UniformType,
    pub offset: usize,
}

/// Name/type/offset table for the active program's user uniforms.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UniformRegistry {
    slots: Vec<UniformSlot>,
    byte_len: usize,
}

impl UniformRegistry {
    pub fn lookup(&self, name: &str) -> Option<&UniformSlot> {
        self.slots.iter().find(|slot| slot.name == name)
    }

    pub fn slots(&self) -> &[UniformSlot] {
        &self.slots
    }

    /// Size of the user block in bytes, rounded to std140 block alignment.
    /// Zero when the program declares no user uniforms.
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// std140 member packer. Offsets honour each type's base alignment; the
/// block size rounds up to 16 bytes.
#[derive(Debug, Default)]
struct Std140Packer {
    cursor: usize,
}

impl Std140Packer {
    fn push(&mut self, ty: UniformType) -> usize {
        let offset = round_up(self.cursor, ty.align());
        self.cursor = offset + ty.size();
        offset
    }

    fn finish(self) -> usize {
        round_up(self.cursor, 16)
    }
}

fn round_up(value: usize, align: usize) -> usize {
    value.div_ceil(align) * align
}

/// A fragment source ready for the GPU plus its uniform registry.
#[derive(Clone, Debug)]
pub struct WrappedShader {
    pub source: String,
    pub uniforms: UniformRegistry,
}

/// Produces a self-contained Vulkan GLSL fragment shader from caller code.
pub fn wrap_fragment(source: &str) -> WrappedShader {
    let mut sanitized_lines = Vec::new();
    let mut declarations = Vec::new();
    let mut skipped_version = false;

    for line in source.lines() {
        let trimmed = line.trim_start();
        if !skipped_version && trimmed.starts_with("#version") {
            skipped_version = true;
            continue;
        }
        match classify_uniform_line(trimmed) {
            UniformLine::Builtin => continue,
            UniformLine::User(scanned) => {
                for name in scanned.names {
                    if !declarations
                        .iter()
                        .any(|(existing, _)| *existing == name)
                    {
                        declarations.push((name, scanned.ty));
                    }
                }
                continue;
            }
            UniformLine::NotAUniform => sanitized_lines.push(line),
        }
    }

    let mut packer = Std140Packer::default();
    let mut slots = Vec::with_capacity(declarations.len());
    for (name, ty) in &declarations {
        let offset = packer.push(*ty);
        slots.push(UniformSlot {
            name: name.clone(),
            ty: *ty,
            offset,
        });
    }
    let registry = UniformRegistry {
        byte_len: if slots.is_empty() { 0 } else { packer.finish() },
        slots,
    };

    let mut wrapped = String::with_capacity(source.len() + HEADER.len() + FOOTER.len() + 256);
    wrapped.push_str(HEADER);
    wrapped.push_str(&user_block(&registry));
    wrapped.push_str("#line 1\n");
    for line in sanitized_lines {
        wrapped.push_str(line);
        wrapped.push('\n');
    }
    wrapped.push_str(FOOTER);

    WrappedShader {
        source: wrapped,
        uniforms: registry,
    }
}

struct ScannedUniform {
    ty: UniformType,
    names: Vec<String>,
}

enum UniformLine {
    /// Declares a built-in name; dropped without recording.
    Builtin,
    /// Recognised user declaration; dropped and recorded.
    User(ScannedUniform),
    /// Anything else, including uniform types we do not pack (samplers,
    /// arrays). Left in place; if it fails to compile that surfaces as a
    /// regular compile error.
    NotAUniform,
}

fn classify_uniform_line(trimmed: &str) -> UniformLine {
    let Some(rest) = trimmed.strip_prefix("uniform ") else {
        return UniformLine::NotAUniform;
    };
    let Some(body) = rest.trim_end().strip_suffix(';') else {
        return UniformLine::NotAUniform;
    };
    if body.contains('[') || body.contains('=') {
        return UniformLine::NotAUniform;
    }

    let mut parts = body.split_whitespace();
    let Some(type_keyword) = parts.next() else {
        return UniformLine::NotAUniform;
    };
    let names: Vec<String> = parts
        .collect::<Vec<_>>()
        .join(" ")
        .split(',')
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
    if names.is_empty() {
        return UniformLine::NotAUniform;
    }

    if names
        .iter()
        .any(|name| BUILTIN_UNIFORM_NAMES.contains(&name.as_str()))
    {
        return UniformLine::Builtin;
    }

    match UniformType::from_glsl(type_keyword) {
        Some(ty) => UniformLine::User(ScannedUniform { ty, names }),
        None => UniformLine::NotAUniform,
    }
}

/// Emits the generated user block plus one alias macro per uniform.
fn user_block(registry: &UniformRegistry) -> String {
    if registry.is_empty() {
        return String::new();
    }
    let mut block = String::from("layout(std140, set = 1, binding = 0) uniform UserParams {\n");
    for slot in registry.slots() {
        block.push_str(&format!(
            "    {} _user_{};\n",
            slot.ty.glsl_name(),
            slot.name
        ));
    }
    block.push_str("} usr;\n");
    for slot in registry.slots() {
        block.push_str(&format!("#define {} usr._user_{}\n", slot.name, slot.name));
    }
    block
}

/// GLSL prologue injected ahead of every caller fragment.
///
/// The block layout must match `BuiltinUniforms` in `bridge.rs`.
/// `_uResolution` carries the pixel ratio in `.z` and mirrors the time in
/// `.w` so shaders keep animating even if swizzles collapse the vector.
pub(crate) const HEADER: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

layout(std140, set = 0, binding = 0) uniform SurfaceParams {
    vec4 _uResolution;
    float _uTime;
    float _uTimeDelta;
    int _uFrame;
    float _uQualityScale;
    vec4 _uCameraPosition;
    vec4 _uCameraForward;
    vec4 _uCameraUp;
    vec4 _uFlags;
} srf;

#define uResolution srf._uResolution
#define uTime srf._uTime
#define uTimeDelta srf._uTimeDelta
#define uFrame srf._uFrame
#define uQualityScale srf._uQualityScale
#define uCameraPosition srf._uCameraPosition.xyz
#define uCameraFov srf._uCameraPosition.w
#define uCameraForward srf._uCameraForward.xyz
#define uCameraAspect srf._uCameraForward.w
#define uCameraUp srf._uCameraUp.xyz
#define uHdEnabled (srf._uFlags.x > 0.5)
#define uFpsOverlay srf._uFlags.y
#define uReducedQuality (srf._uFlags.z > 0.5)

vec4 backdrop_gl_FragCoord;
#define gl_FragCoord backdrop_gl_FragCoord
";

/// GLSL epilogue that remaps coordinates and delegates to `mainImage`.
pub(crate) const FOOTER: &str = r"void main() {
    // Capture the real builtin gl_FragCoord, then remap to a bottom-left
    // origin. The macro is undefined briefly so the hardware builtin is
    // readable.
    #undef gl_FragCoord
    vec2 builtinFC = vec2(gl_FragCoord.x, gl_FragCoord.y);
    #define gl_FragCoord backdrop_gl_FragCoord

    vec2 fragCoord = vec2(builtinFC.x, uResolution.y - builtinFC.y);
    backdrop_gl_FragCoord = vec4(fragCoord, 0.0, 1.0);

    vec4 color = vec4(0.0);
    mainImage(color, fragCoord);
    outColor = vec4(color.rgb, 1.0);
}
";

/// Minimal full-screen triangle vertex shader.
pub(crate) const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) out vec2 v_uv;

const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    vec2 pos = positions[vertex_index];
    v_uv = pos * 0.5 + vec2(0.5, 0.5);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"
        #version 300 es
        uniform float speed;
        uniform vec3 tint;
        uniform float uTime;
        void mainImage(out vec4 fragColor, in vec2 fragCoord) {
            fragColor = vec4(tint * speed, 1.0);
        }
    "#;

    #[test]
    fn wrap_strips_version_and_uniform_declarations() {
        let wrapped = wrap_fragment(BODY);
        assert!(!wrapped.source.contains("#version 300 es"));
        assert!(!wrapped.source.contains("uniform float speed"));
        assert!(!wrapped.source.contains("uniform float uTime"));
        assert!(wrapped.source.contains("mainImage"));
        assert!(wrapped.source.contains("SurfaceParams"));
    }

    #[test]
    fn scanned_uniforms_become_block_and_aliases() {
        let wrapped = wrap_fragment(BODY);
        assert!(wrapped.source.contains("float _user_speed;"));
        assert!(wrapped.source.contains("vec3 _user_tint;"));
        assert!(wrapped.source.contains("#define speed usr._user_speed"));
        assert_eq!(wrapped.uniforms.slots().len(), 2);
    }

    #[test]
    fn builtin_declarations_are_dropped_without_recording() {
        let wrapped = wrap_fragment("uniform vec4 uResolution;\nvoid mainImage(out vec4 c, in vec2 f) {}\n");
        assert!(wrapped.uniforms.is_empty());
        assert!(!wrapped.source.contains("uniform vec4 uResolution;"));
    }

    #[test]
    fn std140_offsets_respect_alignment() {
        let wrapped = wrap_fragment(
            "uniform float a;\nuniform vec3 b;\nuniform float c;\nuniform mat4 m;\nvoid mainImage(out vec4 o, in vec2 f) {}\n",
        );
        let registry = &wrapped.uniforms;
        assert_eq!(registry.lookup("a").unwrap().offset, 0);
        // vec3 aligns to 16, not to the float's end at 4.
        assert_eq!(registry.lookup("b").unwrap().offset, 16);
        // a float may slot into vec3 tail padding.
        assert_eq!(registry.lookup("c").unwrap().offset, 28);
        assert_eq!(registry.lookup("m").unwrap().offset, 32);
        assert_eq!(registry.byte_len(), 96);
    }

    #[test]
    fn comma_separated_declarators_each_get_a_slot() {
        let wrapped =
            wrap_fragment("uniform vec2 drift, sway;\nvoid mainImage(out vec4 o, in vec2 f) {}\n");
        assert_eq!(wrapped.uniforms.lookup("drift").unwrap().offset, 0);
        assert_eq!(wrapped.uniforms.lookup("sway").unwrap().offset, 8);
        assert_eq!(wrapped.uniforms.byte_len(), 16);
    }

    #[test]
    fn duplicate_declarations_collapse_to_one_slot() {
        let wrapped = wrap_fragment(
            "uniform float speed;\nuniform float speed;\nvoid mainImage(out vec4 o, in vec2 f) {}\n",
        );
        assert_eq!(wrapped.uniforms.slots().len(), 1);
    }

    #[test]
    fn unsupported_uniform_types_are_left_in_place() {
        let wrapped = wrap_fragment(
            "uniform sampler2D tex;\nvoid mainImage(out vec4 o, in vec2 f) {}\n",
        );
        assert!(wrapped.uniforms.is_empty());
        assert!(wrapped.source.contains("uniform sampler2D tex;"));
    }

    #[test]
    fn empty_registry_emits_no_user_block() {
        let wrapped = wrap_fragment("void mainImage(out vec4 o, in vec2 f) {}\n");
        assert!(!wrapped.source.contains("UserParams"));
        assert_eq!(wrapped.uniforms.byte_len(), 0);
    }
}
