//! Shader parameter binding for video effect filters.
//!
//! A [`ShaderFilter`] reflects the uniforms of an effect, gives each one a
//! data source (user settings, per-frame expressions, built-in frame values,
//! images, rendered sources or sidechain audio) and uploads the values every
//! frame through the host's [`CompiledProgram`].

pub mod audio;
pub mod binding;
pub mod config;
pub mod effect;
pub mod error;
pub mod expr;
pub mod filter;
pub mod gpu;
pub mod headless;
pub mod host;
pub mod properties;
pub mod settings;
pub mod shader;

pub use config::EngineConfig;
pub use error::{CompileError, ExpressionError, ResourceError};
pub use filter::{FilterStatus, ShaderFilter};
pub use host::{CompiledProgram, FilterHost, Graphics, ShaderCompiler, Texture};
pub use properties::{Properties, Property, PropertyKind};
pub use settings::{JsonSettings, SettingsStore};
