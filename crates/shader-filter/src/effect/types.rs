use serde::{Deserialize, Serialize};

/// Semantic type of a shader uniform or annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    #[default]
    Unknown,
    Bool,
    Float,
    Int,
    String,
    Vec2,
    Vec3,
    Vec4,
    Int2,
    Int3,
    Int4,
    Matrix4x4,
    Texture,
}

impl ParamType {
    /// Component count of a numeric type (1, 2, 3, 4 or 16); 0 otherwise.
    pub fn component_count(self) -> usize {
        match self {
            ParamType::Vec4 | ParamType::Int4 => 4,
            ParamType::Vec3 | ParamType::Int3 => 3,
            ParamType::Vec2 | ParamType::Int2 => 2,
            ParamType::Float | ParamType::Int | ParamType::Bool => 1,
            ParamType::Matrix4x4 => 16,
            ParamType::Unknown | ParamType::String | ParamType::Texture => 0,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(
            self,
            ParamType::Float
                | ParamType::Vec2
                | ParamType::Vec3
                | ParamType::Vec4
                | ParamType::Matrix4x4
        )
    }

    pub fn is_int(self) -> bool {
        matches!(
            self,
            ParamType::Int | ParamType::Int2 | ParamType::Int3 | ParamType::Int4
        )
    }

    /// Map an effect-language type keyword to a parameter type.
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword {
            "bool" => ParamType::Bool,
            "float" => ParamType::Float,
            "float2" => ParamType::Vec2,
            "float3" => ParamType::Vec3,
            "float4" => ParamType::Vec4,
            "int" => ParamType::Int,
            "int2" => ParamType::Int2,
            "int3" => ParamType::Int3,
            "int4" => ParamType::Int4,
            "float4x4" => ParamType::Matrix4x4,
            "texture2d" | "texture3d" | "texture_cube" | "texture_rect" => ParamType::Texture,
            "string" => ParamType::String,
            _ => ParamType::Unknown,
        }
    }
}

/// Compiler-reported metadata for one uniform: name, type, raw default bytes
/// and its annotations (which are themselves descriptors).
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDescriptor {
    pub name: String,
    pub param_type: ParamType,
    pub default: Vec<u8>,
    pub annotations: Vec<ParamDescriptor>,
}

impl ParamDescriptor {
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            default: Vec::new(),
            annotations: Vec::new(),
        }
    }

    pub fn with_default(mut self, default: Vec<u8>) -> Self {
        self.default = default;
        self
    }

    pub fn with_annotation(mut self, annotation: ParamDescriptor) -> Self {
        self.annotations.push(annotation);
        self
    }
}
