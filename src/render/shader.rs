use std::borrow::Cow;
use std::fs;
use std::path::Path;

use crate::error::SetupError;

/// Shader program payload consumed by pipeline creation.
#[derive(Debug, Clone, PartialEq)]
pub enum ShaderCode {
    Wgsl(Cow<'static, str>),
    /// Precompiled SPIR-V words as raw little-endian bytes.
    SpirV(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShaderStage {
    pub code: ShaderCode,
    pub entry_point: String,
}

/// Vertex and fragment programs for the cube pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderSet {
    pub vertex: ShaderStage,
    pub fragment: ShaderStage,
}

impl ShaderSet {
    /// Programs compiled into the binary.
    pub fn builtin() -> Self {
        Self {
            vertex: ShaderStage {
                code: ShaderCode::Wgsl(Cow::Borrowed(SHADER)),
                entry_point: "vs_main".to_string(),
            },
            fragment: ShaderStage {
                code: ShaderCode::Wgsl(Cow::Borrowed(SHADER)),
                entry_point: "fs_main".to_string(),
            },
        }
    }

    /// Loads precompiled SPIR-V programs. Both use the `main` entry point.
    ///
    /// The blobs are passed through untouched; only their length is checked.
    pub fn from_spirv_files(vertex: &Path, fragment: &Path) -> Result<Self, SetupError> {
        Ok(Self {
            vertex: ShaderStage {
                code: ShaderCode::SpirV(read_blob("vertex", vertex)?),
                entry_point: "main".to_string(),
            },
            fragment: ShaderStage {
                code: ShaderCode::SpirV(read_blob("fragment", fragment)?),
                entry_point: "main".to_string(),
            },
        })
    }
}

fn read_blob(stage: &'static str, path: &Path) -> Result<Vec<u8>, SetupError> {
    let bytes = fs::read(path).map_err(|source| SetupError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    check_spirv_length(stage, &bytes)?;
    log::info!("loaded {stage} shader from {} ({} bytes)", path.display(), bytes.len());
    Ok(bytes)
}

fn check_spirv_length(stage: &'static str, bytes: &[u8]) -> Result<(), SetupError> {
    if bytes.is_empty() {
        return Err(SetupError::Shader {
            stage,
            reason: "file is empty".to_string(),
        });
    }
    if bytes.len() % 4 != 0 {
        return Err(SetupError::Shader {
            stage,
            reason: format!("{} bytes is not a whole number of 32-bit words", bytes.len()),
        });
    }
    Ok(())
}

pub(crate) const SHADER: &str = r#"
struct DrawUniforms {
    transform: mat4x4<f32>,
    primary: vec4<f32>,
    accent: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> draw: DrawUniforms;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) color: vec3<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) color: vec3<f32>,
    @location(1) height: f32,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.position = draw.transform * vec4<f32>(input.position, 1.0);
    out.color = input.color;
    out.height = clamp(input.position.y + 0.5, 0.0, 1.0);
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let tint = mix(draw.primary, draw.accent, input.height);
    return vec4<f32>(input.color + tint.rgb * 0.5, tint.a);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn blob(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp shader");
        file.write_all(bytes).expect("write shader");
        file
    }

    #[test]
    fn builtin_uses_wgsl_entry_points() {
        let shaders = ShaderSet::builtin();
        assert_eq!(shaders.vertex.entry_point, "vs_main");
        assert_eq!(shaders.fragment.entry_point, "fs_main");
        assert!(matches!(shaders.vertex.code, ShaderCode::Wgsl(_)));
    }

    #[test]
    fn spirv_blobs_are_passed_through() {
        let words = 0x0723_0203u32.to_le_bytes();
        let vertex = blob(&words);
        let fragment = blob(&[words, words].concat());
        let shaders = ShaderSet::from_spirv_files(vertex.path(), fragment.path()).unwrap();
        assert_eq!(shaders.vertex.code, ShaderCode::SpirV(words.to_vec()));
        assert_eq!(shaders.fragment.entry_point, "main");
    }

    #[test]
    fn truncated_blob_is_rejected() {
        let vertex = blob(&[1, 2, 3]);
        let fragment = blob(&[0; 4]);
        let err = ShaderSet::from_spirv_files(vertex.path(), fragment.path()).unwrap_err();
        assert!(matches!(err, SetupError::Shader { stage: "vertex", .. }));
    }

    #[test]
    fn missing_file_reports_path() {
        let fragment = blob(&[0; 4]);
        let err =
            ShaderSet::from_spirv_files(Path::new("/nonexistent/cube.vert.spv"), fragment.path())
                .unwrap_err();
        assert!(err.to_string().contains("cube.vert.spv"));
    }
}
