//! Shader descriptions and source-to-SPIR-V translation.

use crate::error::{EngineError, EngineResult};
use naga::back::spv;
use naga::front::{glsl, wgsl};
use naga::valid::{Capabilities, ValidationFlags, Validator};

/// Vertex shader for the demo triangle. Positions and colors come from the vertex index.
pub const TRIANGLE_VS: &str = include_str!("../shaders/triangle.vert");
pub const TRIANGLE_PS: &str = include_str!("../shaders/triangle.frag");

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ShaderType {
    Vertex,
    Pixel,
}

impl ShaderType {
    fn naga_stage(&self) -> naga::ShaderStage {
        match self {
            ShaderType::Vertex => naga::ShaderStage::Vertex,
            ShaderType::Pixel => naga::ShaderStage::Fragment,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ShaderSourceLanguage {
    Glsl,
    Wgsl,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ShaderCreateInfo {
    pub name: String,
    pub shader_type: ShaderType,
    pub entry_point: String,
    pub source: String,
    pub source_language: ShaderSourceLanguage,
}

impl ShaderCreateInfo {
    pub fn glsl(name: &str, shader_type: ShaderType, source: &str) -> Self {
        Self {
            name: name.to_owned(),
            shader_type,
            entry_point: "main".to_owned(),
            source: source.to_owned(),
            source_language: ShaderSourceLanguage::Glsl,
        }
    }

    fn error(&self, message: impl Into<String>) -> EngineError {
        EngineError::ShaderCompilation {
            name: self.name.clone(),
            message: message.into(),
        }
    }
}

/// Translates the shader source into validated SPIR-V with a single entry point.
pub fn compile_spirv(info: &ShaderCreateInfo) -> EngineResult<Vec<u32>> {
    log::debug!(
        "Compiling {:?} shader '{}' ({:?})",
        info.shader_type,
        info.name,
        info.source_language
    );
    let stage = info.shader_type.naga_stage();

    let module = match info.source_language {
        ShaderSourceLanguage::Glsl => glsl::Frontend::default()
            .parse(&glsl::Options::from(stage), &info.source)
            .map_err(|err| info.error(err.emit_to_string(&info.source)))?,
        ShaderSourceLanguage::Wgsl => wgsl::parse_str(&info.source)
            .map_err(|err| info.error(err.emit_to_string(&info.source)))?,
    };

    let has_entry_point = module
        .entry_points
        .iter()
        .any(|ep| ep.name == info.entry_point && ep.stage == stage);
    if !has_entry_point {
        return Err(info.error(format!(
            "no {:?} entry point named '{}'",
            info.shader_type, info.entry_point
        )));
    }

    let module_info = Validator::new(ValidationFlags::all(), Capabilities::empty())
        .validate(&module)
        .map_err(|err| info.error(err.emit_to_string(&info.source)))?;

    spv::write_vec(
        &module,
        &module_info,
        &spv::Options::default(),
        Some(&spv::PipelineOptions {
            shader_stage: stage,
            entry_point: info.entry_point.clone(),
        }),
    )
    .map_err(|err| info.error(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPIRV_MAGIC: u32 = 0x0723_0203;

    #[test]
    fn embedded_triangle_shaders_compile() {
        let vs = ShaderCreateInfo::glsl("vertex shader", ShaderType::Vertex, TRIANGLE_VS);
        let ps = ShaderCreateInfo::glsl("pixel shader", ShaderType::Pixel, TRIANGLE_PS);

        for info in [vs, ps] {
            let words = compile_spirv(&info).unwrap();
            assert_eq!(words[0], SPIRV_MAGIC, "{}", info.name);
        }
    }

    #[test]
    fn wgsl_entry_point_is_selected_by_name() {
        let source = r#"
            @fragment
            fn shade() -> @location(0) vec4<f32> {
                return vec4<f32>(1.0, 0.0, 1.0, 1.0);
            }
        "#;
        let mut info = ShaderCreateInfo {
            name: "magenta".to_owned(),
            shader_type: ShaderType::Pixel,
            entry_point: "shade".to_owned(),
            source: source.to_owned(),
            source_language: ShaderSourceLanguage::Wgsl,
        };
        assert_eq!(compile_spirv(&info).unwrap()[0], SPIRV_MAGIC);

        info.entry_point = "main".to_owned();
        assert!(matches!(
            compile_spirv(&info),
            Err(EngineError::ShaderCompilation { name, .. }) if name == "magenta"
        ));
    }

    #[test]
    fn malformed_source_is_reported() {
        let info = ShaderCreateInfo::glsl(
            "broken",
            ShaderType::Vertex,
            "#version 450\nvoid main() { gl_Position = ; }\n",
        );
        assert!(matches!(
            compile_spirv(&info),
            Err(EngineError::ShaderCompilation { .. })
        ));
    }
}
