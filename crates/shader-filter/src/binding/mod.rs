pub mod builtin;
pub mod numeric;
pub mod string;
pub mod texture;

pub use builtin::Builtin;
pub use numeric::{ComponentState, NumericBinding, NumericKind};
pub use string::StringBinding;
pub use texture::{TextureBinding, TextureKind};

use crate::config::EngineConfig;
use crate::effect::{ParamHandle, ParamType};
use crate::expr::Environment;
use crate::filter::FrameState;
use crate::host::{CompiledProgram, FilterHost};
use crate::properties::Properties;
use crate::settings::SettingsStore;

/// The live binding behind one shader parameter. The variant is fixed when
/// the parameter is created; later calls only change values.
pub enum ShaderData {
    Numeric(NumericBinding),
    Texture(TextureBinding),
    String(StringBinding),
    Unbound,
}

impl ShaderData {
    /// Pick the binding for `handle` by its declared type. Numeric bindings
    /// register their component variables in `env`.
    pub fn new(handle: &ParamHandle, env: &mut Environment, config: &EngineConfig) -> Self {
        match handle.param_type() {
            ParamType::Texture => ShaderData::Texture(TextureBinding::new(handle, config)),
            ParamType::String => ShaderData::String(StringBinding::new(handle)),
            ParamType::Unknown => ShaderData::Unbound,
            _ => ShaderData::Numeric(NumericBinding::new(handle, env)),
        }
    }

    pub fn bind_expressions(&mut self, env: &Environment) {
        if let ShaderData::Numeric(n) = self {
            n.bind_expressions(env);
        }
    }

    pub fn update(&mut self, settings: &dyn SettingsStore, host: &mut dyn FilterHost) {
        match self {
            ShaderData::Numeric(n) => n.update(settings),
            ShaderData::Texture(t) => t.update(settings, host),
            ShaderData::String(s) => s.update(settings),
            ShaderData::Unbound => {}
        }
    }

    pub fn tick(&mut self, state: &FrameState) {
        if let ShaderData::Numeric(n) = self {
            n.tick(state);
        }
    }

    pub fn render(&mut self, index: usize, program: &mut dyn CompiledProgram, host: &mut dyn FilterHost) {
        match self {
            ShaderData::Numeric(n) => n.render(index, program),
            ShaderData::Texture(t) => t.render(index, program, host),
            ShaderData::String(_) | ShaderData::Unbound => {}
        }
    }

    pub fn properties(&self, host: &dyn FilterHost, props: &mut Properties) {
        match self {
            ShaderData::Numeric(n) => n.properties(props),
            ShaderData::Texture(t) => t.properties(host, props),
            ShaderData::String(s) => s.properties(props),
            ShaderData::Unbound => {}
        }
    }

    /// Release host resources held by the binding.
    pub fn release(&mut self, host: &mut dyn FilterHost) {
        if let ShaderData::Texture(t) = self {
            t.release(host);
        }
    }

    pub fn as_numeric(&self) -> Option<&NumericBinding> {
        match self {
            ShaderData::Numeric(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_texture(&self) -> Option<&TextureBinding> {
        match self {
            ShaderData::Texture(t) => Some(t),
            _ => None,
        }
    }
}
