//! Contracts between the filter core and the application hosting it.

use std::any::Any;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::audio::AudioSink;
use crate::effect::ParamDescriptor;
use crate::error::{CompileError, ResourceError};

/// Builds a program from shader source text.
pub trait ShaderCompiler: Send {
    fn compile(&self, source: &str) -> Result<Box<dyn CompiledProgram>, CompileError>;
}

/// A compiled shader program and its parameter table.
pub trait CompiledProgram: Send {
    /// Parameters in declaration order. Indices into this slice are the
    /// indices accepted by the setters.
    fn params(&self) -> &[ParamDescriptor];

    fn set_value(&mut self, index: usize, data: &[u8]);

    fn set_texture(&mut self, index: usize, texture: Option<Texture>);

    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexelFormat {
    R32Float,
    Rgba8,
}

impl TexelFormat {
    pub fn bytes_per_texel(self) -> u32 {
        match self {
            TexelFormat::R32Float | TexelFormat::Rgba8 => 4,
        }
    }
}

/// Backend-specific texture object.
pub trait GpuTexture: Send + Sync + fmt::Debug {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn format(&self) -> TexelFormat;
    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to a GPU texture. The backend object is released when the
/// last clone is dropped.
#[derive(Debug, Clone)]
pub struct Texture(Arc<dyn GpuTexture>);

impl Texture {
    pub fn new(texture: impl GpuTexture + 'static) -> Self {
        Self(Arc::new(texture))
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn format(&self) -> TexelFormat {
        self.0.format()
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &Texture) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Texture creation on the render thread.
pub trait Graphics {
    /// Create a texture from tightly packed rows of `format` texels.
    fn create_texture(
        &self,
        width: u32,
        height: u32,
        format: TexelFormat,
        data: &[u8],
    ) -> Result<Texture, ResourceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Video,
    Audio,
}

/// What a source-backed texture parameter renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    /// A live source, by name.
    Named(String),
    /// A media file played by the host.
    Media(PathBuf),
}

/// Services the host provides to a filter instance.
pub trait FilterHost {
    fn graphics(&self) -> &dyn Graphics;

    /// Base size of the upstream source the filter is attached to.
    fn base_size(&self) -> (u32, u32);

    /// Current size of the filter's own output.
    fn source_size(&self) -> (u32, u32);

    /// Names of currently active sources producing `kind` output.
    fn list_sources(&self, kind: SourceKind) -> Vec<String>;

    /// Render `source` off-screen, scaled to `width` x `height`.
    fn render_source(
        &mut self,
        source: &SourceRef,
        width: u32,
        height: u32,
    ) -> Result<Texture, ResourceError>;

    /// Start delivering `source`'s audio to `sink` from the audio thread.
    /// Returns false if no such source exists.
    fn attach_audio(&mut self, source: &str, sink: Arc<dyn AudioSink>) -> bool;

    fn detach_audio(&mut self, source: &str, sink: &Arc<dyn AudioSink>);

    /// Prepare the filter pass. Returns false if the frame cannot be drawn.
    fn begin_filter(&mut self) -> bool;

    /// Draw the filter input through `program` at the given output size.
    fn end_filter(&mut self, program: &dyn CompiledProgram, width: u32, height: u32);

    /// Pass the input through untouched.
    fn skip_filter(&mut self);
}
