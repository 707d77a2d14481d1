use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::audio::AudioSink;
use crate::error::ResourceError;
use crate::host::{
    CompiledProgram, FilterHost, GpuTexture, Graphics, SourceKind, SourceRef, TexelFormat, Texture,
};

/// Texture stored as plain bytes.
#[derive(Debug)]
pub struct CpuTexture {
    width: u32,
    height: u32,
    format: TexelFormat,
    data: Vec<u8>,
}

impl GpuTexture for CpuTexture {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn format(&self) -> TexelFormat {
        self.format
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Texel values of an `R32Float` CPU texture.
pub fn texture_floats(texture: &Texture) -> Option<Vec<f32>> {
    let cpu = texture.downcast_ref::<CpuTexture>()?;
    if cpu.format != TexelFormat::R32Float {
        return None;
    }
    Some(bytemuck::pod_collect_to_vec(&cpu.data[..cpu.data.len() / 4 * 4]))
}

#[derive(Debug, Default)]
pub struct CpuGraphics {
    created: Arc<AtomicUsize>,
}

impl CpuGraphics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter of successful texture creations, shared with the caller.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        self.created.clone()
    }
}

impl Graphics for CpuGraphics {
    fn create_texture(
        &self,
        width: u32,
        height: u32,
        format: TexelFormat,
        data: &[u8],
    ) -> Result<Texture, ResourceError> {
        let expected = width as usize * height as usize * format.bytes_per_texel() as usize;
        if expected == 0 || data.len() < expected {
            return Err(ResourceError::Texture {
                width,
                height,
                message: format!("{} bytes supplied, {expected} required", data.len()),
            });
        }
        self.created.fetch_add(1, Ordering::Relaxed);
        Ok(Texture::new(CpuTexture {
            width,
            height,
            format,
            data: data[..expected].to_vec(),
        }))
    }
}

/// Fans audio packets from named sources out to attached sinks.
#[derive(Default)]
pub struct AudioRouter {
    sinks: Mutex<HashMap<String, Vec<Arc<dyn AudioSink>>>>,
}

impl AudioRouter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn attach(&self, source: &str, sink: Arc<dyn AudioSink>) {
        if let Ok(mut sinks) = self.sinks.lock() {
            sinks.entry(source.to_string()).or_default().push(sink);
        }
    }

    pub fn detach(&self, source: &str, sink: &Arc<dyn AudioSink>) {
        if let Ok(mut sinks) = self.sinks.lock()
            && let Some(list) = sinks.get_mut(source)
        {
            list.retain(|s| !std::ptr::addr_eq(Arc::as_ptr(s), Arc::as_ptr(sink)));
        }
    }

    pub fn sink_count(&self, source: &str) -> usize {
        self.sinks
            .lock()
            .map(|sinks| sinks.get(source).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Deliver one packet. Sinks are called outside the router lock.
    pub fn deliver(&self, source: &str, planes: &[&[f32]], frames: usize, muted: bool) {
        let targets: Vec<Arc<dyn AudioSink>> = match self.sinks.lock() {
            Ok(sinks) => sinks.get(source).cloned().unwrap_or_default(),
            Err(_) => return,
        };
        for sink in targets {
            sink.capture(planes, frames, muted);
        }
    }

    /// A sink that forwards everything it receives as `source`.
    pub fn input(self: &Arc<Self>, source: &str) -> Arc<dyn AudioSink> {
        Arc::new(RouterInput {
            router: self.clone(),
            source: source.to_string(),
        })
    }
}

struct RouterInput {
    router: Arc<AudioRouter>,
    source: String,
}

impl AudioSink for RouterInput {
    fn capture(&self, planes: &[&[f32]], frames: usize, muted: bool) {
        self.router.deliver(&self.source, planes, frames, muted);
    }
}

/// A host with no window: sources are sizes, renders are recorded.
pub struct HeadlessHost {
    graphics: Box<dyn Graphics>,
    created: Arc<AtomicUsize>,
    base_size: (u32, u32),
    source_size: (u32, u32),
    video_sources: BTreeMap<String, (u32, u32)>,
    audio_sources: BTreeSet<String>,
    audio: Arc<AudioRouter>,
    draws: Vec<(u32, u32)>,
    skipped: usize,
}

impl HeadlessHost {
    /// Host with CPU textures and an upstream source of `width` x `height`.
    pub fn new(width: u32, height: u32) -> Self {
        let graphics = CpuGraphics::new();
        let created = graphics.counter();
        let mut host = Self::with_graphics(width, height, Box::new(graphics));
        host.created = created;
        host
    }

    pub fn with_graphics(width: u32, height: u32, graphics: Box<dyn Graphics>) -> Self {
        Self {
            graphics,
            created: Arc::new(AtomicUsize::new(0)),
            base_size: (width, height),
            source_size: (width, height),
            video_sources: BTreeMap::new(),
            audio_sources: BTreeSet::new(),
            audio: AudioRouter::new(),
            draws: Vec::new(),
            skipped: 0,
        }
    }

    /// Size of the filter's own output, used when rendering sources.
    pub fn set_source_size(&mut self, width: u32, height: u32) {
        self.source_size = (width, height);
    }

    pub fn add_video_source(&mut self, name: &str, width: u32, height: u32) {
        self.video_sources.insert(name.to_string(), (width, height));
    }

    pub fn add_audio_source(&mut self, name: &str) {
        self.audio_sources.insert(name.to_string());
    }

    pub fn audio_router(&self) -> Arc<AudioRouter> {
        self.audio.clone()
    }

    /// Deliver a packet from `source` to whatever is attached to it.
    pub fn push_audio(&self, source: &str, planes: &[&[f32]], muted: bool) {
        let frames = planes.first().map_or(0, |p| p.len());
        self.audio.deliver(source, planes, frames, muted);
    }

    pub fn audio_sink_count(&self, source: &str) -> usize {
        self.audio.sink_count(source)
    }

    pub fn draws(&self) -> &[(u32, u32)] {
        &self.draws
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn textures_created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    fn blank(&self, width: u32, height: u32) -> Result<Texture, ResourceError> {
        let bytes = vec![0u8; width as usize * height as usize * 4];
        self.graphics
            .create_texture(width, height, TexelFormat::Rgba8, &bytes)
    }
}

impl FilterHost for HeadlessHost {
    fn graphics(&self) -> &dyn Graphics {
        self.graphics.as_ref()
    }

    fn base_size(&self) -> (u32, u32) {
        self.base_size
    }

    fn source_size(&self) -> (u32, u32) {
        self.source_size
    }

    fn list_sources(&self, kind: SourceKind) -> Vec<String> {
        match kind {
            SourceKind::Video => self.video_sources.keys().cloned().collect(),
            SourceKind::Audio => self.audio_sources.iter().cloned().collect(),
        }
    }

    fn render_source(
        &mut self,
        source: &SourceRef,
        width: u32,
        height: u32,
    ) -> Result<Texture, ResourceError> {
        match source {
            SourceRef::Named(name) => {
                let &(w, h) = self
                    .video_sources
                    .get(name)
                    .ok_or_else(|| ResourceError::SourceUnavailable(name.clone()))?;
                if w == 0 || h == 0 {
                    return Err(ResourceError::EmptySource(name.clone()));
                }
            }
            SourceRef::Media(path) => {
                if !Path::new(path).is_file() {
                    return Err(ResourceError::SourceUnavailable(path.display().to_string()));
                }
            }
        }
        self.blank(width, height)
    }

    fn attach_audio(&mut self, source: &str, sink: Arc<dyn AudioSink>) -> bool {
        if !self.audio_sources.contains(source) {
            return false;
        }
        self.audio.attach(source, sink);
        true
    }

    fn detach_audio(&mut self, source: &str, sink: &Arc<dyn AudioSink>) {
        self.audio.detach(source, sink);
    }

    fn begin_filter(&mut self) -> bool {
        true
    }

    fn end_filter(&mut self, _program: &dyn CompiledProgram, width: u32, height: u32) {
        log::trace!("draw {width}x{height}");
        self.draws.push((width, height));
    }

    fn skip_filter(&mut self) {
        self.skipped += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioCapture;

    #[test]
    fn graphics_validates_sizes() {
        let g = CpuGraphics::new();
        assert!(g.create_texture(2, 2, TexelFormat::Rgba8, &[0; 16]).is_ok());
        assert!(matches!(
            g.create_texture(2, 2, TexelFormat::Rgba8, &[0; 15]),
            Err(ResourceError::Texture { .. })
        ));
        assert!(g.create_texture(0, 2, TexelFormat::R32Float, &[]).is_err());
        assert_eq!(g.counter().load(Ordering::Relaxed), 1);
    }

    #[test]
    fn router_fans_out_and_detaches() {
        let router = AudioRouter::new();
        let a = Arc::new(AudioCapture::new(1, 4));
        let b = Arc::new(AudioCapture::new(1, 4));
        let sa: Arc<dyn AudioSink> = a.clone();
        let sb: Arc<dyn AudioSink> = b.clone();
        router.attach("mic", sa.clone());
        router.attach("mic", sb.clone());

        router.input("mic").capture(&[&[1.0]], 1, false);
        router.detach("mic", &sa);
        router.deliver("mic", &[&[2.0]], 1, false);
        assert_eq!(router.sink_count("mic"), 1);

        let mut out = Vec::new();
        a.copy_out(2, &mut out);
        assert_eq!(out, vec![1.0, 0.0]);
        b.copy_out(2, &mut out);
        assert_eq!(out, vec![2.0, 1.0]);
    }

    #[test]
    fn unknown_sources_fail() {
        let mut host = HeadlessHost::new(8, 8);
        host.add_video_source("empty", 0, 0);
        assert_eq!(
            host.render_source(&SourceRef::Named("nope".into()), 8, 8).unwrap_err(),
            ResourceError::SourceUnavailable("nope".into())
        );
        assert!(matches!(
            host.render_source(&SourceRef::Named("empty".into()), 8, 8),
            Err(ResourceError::EmptySource(_))
        ));
        let sink: Arc<dyn AudioSink> = Arc::new(AudioCapture::new(1, 4));
        assert!(!host.attach_audio("nope", sink));
    }
}
