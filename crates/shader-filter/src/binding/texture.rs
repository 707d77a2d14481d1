use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::audio::{AudioCapture, AudioSink, FftTransform, WindowFunction};
use crate::config::EngineConfig;
use crate::effect::ParamHandle;
use crate::error::ResourceError;
use crate::host::{CompiledProgram, FilterHost, Graphics, SourceKind, SourceRef, TexelFormat, Texture};
use crate::properties::{ListFormat, ListItem, ListValue, Properties, Property, PropertyKind};
use crate::settings::SettingsStore;

pub const TEXTURE_FILE_FILTER: &str = "Textures (*.bmp *.tga *.png *.jpeg *.jpg *.gif);;";
pub const MEDIA_FILE_FILTER: &str =
    "Video Files (*.mp4 *.ts *.mov *.wmv *.flv *.mkv *.avi *.gif *.webm);;";

/// What feeds a texture uniform, from its `texture_type` annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureKind {
    /// The filter input itself; never bound here.
    Ignored,
    Source,
    Audio,
    Image,
    Media,
}

impl TextureKind {
    pub fn classify(handle: &ParamHandle) -> Self {
        if handle.name() == "image" {
            return TextureKind::Ignored;
        }
        match handle.annotation_text("texture_type").as_deref() {
            Some("source") => TextureKind::Source,
            Some("audio") => TextureKind::Audio,
            Some("media") => TextureKind::Media,
            _ => TextureKind::Image,
        }
    }
}

/// Decode an image file into an RGBA texture.
pub fn load_image(graphics: &dyn Graphics, path: &Path) -> Result<Texture, ResourceError> {
    let img = image::open(path).map_err(|e| ResourceError::Image {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    graphics.create_texture(width, height, TexelFormat::Rgba8, rgba.as_raw())
}

struct AudioInput {
    capture: Arc<AudioCapture>,
    sink: Arc<dyn AudioSink>,
    source: Option<String>,
    fft: Option<FftTransform>,
    frames: usize,
    scratch: Vec<f32>,
}

impl AudioInput {
    fn switch_source(&mut self, name: Option<String>, host: &mut dyn FilterHost) {
        if self.source == name {
            return;
        }
        if let Some(old) = self.source.take() {
            host.detach_audio(&old, &self.sink);
            self.capture.clear();
            log::info!("Detached audio source '{old}'");
        }
        if let Some(new) = name {
            if host.attach_audio(&new, self.sink.clone()) {
                log::info!("Attached audio source '{new}'");
                self.source = Some(new);
            } else {
                log::warn!("Audio source '{new}' not found");
            }
        }
    }

    /// Latest samples as a `width x channels` R32F image.
    fn build_texture(&mut self, graphics: &dyn Graphics) -> Result<Texture, ResourceError> {
        let channels = self.capture.channels();
        self.capture.copy_out(self.frames, &mut self.scratch);
        let width = match self.fft.as_mut() {
            Some(fft) => fft.process_channels(&mut self.scratch, channels),
            None => self.frames,
        };
        let texels = &self.scratch[..width * channels];
        graphics.create_texture(
            width as u32,
            channels as u32,
            TexelFormat::R32Float,
            bytemuck::cast_slice(texels),
        )
    }
}

/// Binding for texture uniforms: live sources, media, images and audio.
pub struct TextureBinding {
    name: String,
    kind: TextureKind,
    source: Option<SourceRef>,
    image_path: Option<PathBuf>,
    image: Option<Texture>,
    audio: Option<AudioInput>,
    texture: Option<Texture>,
}

impl TextureBinding {
    pub fn new(handle: &ParamHandle, config: &EngineConfig) -> Self {
        let kind = TextureKind::classify(handle);
        let audio = (kind == TextureKind::Audio).then(|| {
            let channels = handle
                .annotation_int("channels")
                .map_or(config.output_channels, |c| c.max(1) as usize);
            let frames = config.audio_frames.max(1);
            let capture = Arc::new(AudioCapture::new(channels, config.ring_capacity().max(frames)));
            let sink: Arc<dyn AudioSink> = capture.clone();
            let fft = handle.annotation_bool("is_fft").unwrap_or(false).then(|| {
                let window = handle
                    .annotation_text("window")
                    .map_or(WindowFunction::None, |w| WindowFunction::from_name(&w));
                FftTransform::new(frames, window)
            });
            AudioInput {
                capture,
                sink,
                source: None,
                fft,
                frames,
                scratch: Vec::new(),
            }
        });

        Self {
            name: handle.name().to_string(),
            kind,
            source: None,
            image_path: None,
            image: None,
            audio,
            texture: None,
        }
    }

    pub fn kind(&self) -> TextureKind {
        self.kind
    }

    pub fn texture(&self) -> Option<&Texture> {
        self.texture.as_ref()
    }

    pub fn audio_capture(&self) -> Option<&Arc<AudioCapture>> {
        self.audio.as_ref().map(|a| &a.capture)
    }

    pub fn audio_source(&self) -> Option<&str> {
        self.audio.as_ref().and_then(|a| a.source.as_deref())
    }

    pub fn update(&mut self, settings: &dyn SettingsStore, host: &mut dyn FilterHost) {
        let selected = settings.get_string(&self.name).filter(|s| !s.is_empty());
        match self.kind {
            TextureKind::Source => self.source = selected.map(SourceRef::Named),
            TextureKind::Media => self.source = selected.map(|p| SourceRef::Media(PathBuf::from(p))),
            TextureKind::Audio => {
                if let Some(audio) = self.audio.as_mut() {
                    audio.switch_source(selected, host);
                }
            }
            TextureKind::Image => {
                self.image_path = selected.map(PathBuf::from);
                self.image = None;
                if let Some(path) = &self.image_path {
                    match load_image(host.graphics(), path) {
                        Ok(texture) => self.image = Some(texture),
                        Err(e) => log::warn!("Texture '{}': {e}", self.name),
                    }
                }
            }
            TextureKind::Ignored => {}
        }
    }

    pub fn render(&mut self, index: usize, program: &mut dyn CompiledProgram, host: &mut dyn FilterHost) {
        let texture = match self.kind {
            TextureKind::Ignored => return,
            TextureKind::Source | TextureKind::Media => match &self.source {
                Some(source) => {
                    let (width, height) = host.source_size();
                    host.render_source(source, width, height)
                        .map_err(|e| log::debug!("Texture '{}': {e}", self.name))
                        .ok()
                }
                None => None,
            },
            TextureKind::Audio => match self.audio.as_mut() {
                Some(audio) => audio
                    .build_texture(host.graphics())
                    .map_err(|e| log::debug!("Audio texture '{}': {e}", self.name))
                    .ok(),
                None => None,
            },
            TextureKind::Image => self.image.clone(),
        };
        program.set_texture(index, texture.clone());
        self.texture = texture;
    }

    pub fn properties(&self, host: &dyn FilterHost, props: &mut Properties) {
        let kind = match self.kind {
            TextureKind::Ignored => return,
            TextureKind::Source => source_list(host, SourceKind::Video),
            TextureKind::Audio => source_list(host, SourceKind::Audio),
            TextureKind::Media => PropertyKind::Path {
                filter: MEDIA_FILE_FILTER.to_string(),
                default_path: None,
            },
            TextureKind::Image => PropertyKind::Path {
                filter: TEXTURE_FILE_FILTER.to_string(),
                default_path: None,
            },
        };
        props.add(Property::new(&self.name, &self.name, kind));
    }

    /// Stop audio delivery and drop every texture.
    pub fn release(&mut self, host: &mut dyn FilterHost) {
        if let Some(audio) = self.audio.as_mut() {
            audio.switch_source(None, host);
        }
        self.texture = None;
        self.image = None;
        self.source = None;
    }
}

fn source_list(host: &dyn FilterHost, kind: SourceKind) -> PropertyKind {
    let mut items = vec![ListItem::new("None", ListValue::String(String::new()))];
    items.extend(
        host.list_sources(kind)
            .into_iter()
            .map(|name| ListItem::new(name.clone(), ListValue::String(name))),
    );
    PropertyKind::List {
        format: ListFormat::String,
        items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{EffectProgram, ParamDescriptor, ParamType};
    use crate::headless::HeadlessHost;
    use crate::settings::JsonSettings;

    fn text(name: &str, value: &str) -> ParamDescriptor {
        let mut bytes = value.as_bytes().to_vec();
        bytes.push(0);
        ParamDescriptor::new(name, ParamType::String).with_default(bytes)
    }

    fn flag(name: &str, value: bool) -> ParamDescriptor {
        ParamDescriptor::new(name, ParamType::Bool).with_default(i32::from(value).to_ne_bytes().to_vec())
    }

    fn texture_param(name: &str) -> ParamDescriptor {
        ParamDescriptor::new(name, ParamType::Texture)
    }

    fn program() -> EffectProgram {
        EffectProgram::new(vec![texture_param("tex")])
    }

    #[test]
    fn classification() {
        let h = |d: ParamDescriptor| TextureKind::classify(&ParamHandle::new(0, &d));
        assert_eq!(h(texture_param("image").with_annotation(text("texture_type", "audio"))), TextureKind::Ignored);
        assert_eq!(h(texture_param("t")), TextureKind::Image);
        assert_eq!(h(texture_param("t").with_annotation(text("texture_type", "bogus"))), TextureKind::Image);
        assert_eq!(h(texture_param("t").with_annotation(text("texture_type", "source"))), TextureKind::Source);
        assert_eq!(h(texture_param("t").with_annotation(text("texture_type", "media"))), TextureKind::Media);
    }

    #[test]
    fn audio_texture_is_frames_by_channels() {
        let mut host = HeadlessHost::new(64, 32);
        host.add_audio_source("mic");
        let d = texture_param("tex").with_annotation(text("texture_type", "audio"));
        let mut binding = TextureBinding::new(&ParamHandle::new(0, &d), &EngineConfig::default());

        let mut settings = JsonSettings::new();
        settings.set_string("tex", "mic");
        binding.update(&settings, &mut host);
        assert_eq!(binding.audio_source(), Some("mic"));

        host.push_audio("mic", &[&[0.5; 16], &[0.25; 16]], false);
        let mut program = program();
        binding.render(0, &mut program, &mut host);
        let tex = program.texture("tex").unwrap();
        assert_eq!((tex.width(), tex.height()), (1024, 2));
        assert_eq!(tex.format(), TexelFormat::R32Float);
        let pixels = crate::headless::texture_floats(tex).unwrap();
        assert_eq!(pixels[0], 0.5);
        assert_eq!(pixels[16], 0.0);
        assert_eq!(pixels[1024], 0.25);

        binding.release(&mut host);
        assert_eq!(binding.audio_source(), None);
        assert_eq!(host.audio_sink_count("mic"), 0);
    }

    #[test]
    fn fft_texture_is_half_width() {
        let mut host = HeadlessHost::new(64, 32);
        let d = texture_param("tex")
            .with_annotation(text("texture_type", "audio"))
            .with_annotation(flag("is_fft", true))
            .with_annotation(text("window", "hann"))
            .with_annotation(ParamDescriptor::new("channels", ParamType::Int).with_default(1i32.to_ne_bytes().to_vec()));
        let mut binding = TextureBinding::new(&ParamHandle::new(0, &d), &EngineConfig::default());
        let mut program = program();
        binding.render(0, &mut program, &mut host);
        let tex = program.texture("tex").unwrap();
        assert_eq!((tex.width(), tex.height()), (512, 1));
    }

    #[test]
    fn switching_audio_source_clears_history() {
        let mut host = HeadlessHost::new(64, 32);
        host.add_audio_source("a");
        host.add_audio_source("b");
        let d = texture_param("tex").with_annotation(text("texture_type", "audio"));
        let mut binding = TextureBinding::new(&ParamHandle::new(0, &d), &EngineConfig::default());
        let mut settings = JsonSettings::new();
        settings.set_string("tex", "a");
        binding.update(&settings, &mut host);
        host.push_audio("a", &[&[1.0; 4], &[1.0; 4]], false);

        settings.set_string("tex", "b");
        binding.update(&settings, &mut host);
        assert_eq!(host.audio_sink_count("a"), 0);
        assert_eq!(host.audio_sink_count("b"), 1);

        let mut out = Vec::new();
        binding.audio_capture().unwrap().copy_out(4, &mut out);
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn image_loads_once_per_update() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tex.png");
        image::RgbaImage::from_pixel(3, 2, image::Rgba([255, 0, 0, 255]))
            .save(&path)
            .unwrap();

        let mut host = HeadlessHost::new(64, 32);
        let mut binding = TextureBinding::new(&ParamHandle::new(0, &texture_param("tex")), &EngineConfig::default());
        let mut settings = JsonSettings::new();
        settings.set_string("tex", path.to_str().unwrap());
        binding.update(&settings, &mut host);

        let mut program = program();
        binding.render(0, &mut program, &mut host);
        binding.render(0, &mut program, &mut host);
        let tex = program.texture("tex").unwrap();
        assert_eq!((tex.width(), tex.height()), (3, 2));
        assert_eq!(host.textures_created(), 1);

        settings.set_string("tex", dir.path().join("missing.png").to_str().unwrap());
        binding.update(&settings, &mut host);
        binding.render(0, &mut program, &mut host);
        assert!(program.texture("tex").is_none());
    }

    #[test]
    fn source_renders_at_filter_size() {
        let mut host = HeadlessHost::new(64, 32);
        host.add_video_source("camera", 640, 480);
        let d = texture_param("tex").with_annotation(text("texture_type", "source"));
        let mut binding = TextureBinding::new(&ParamHandle::new(0, &d), &EngineConfig::default());
        let mut settings = JsonSettings::new();
        settings.set_string("tex", "camera");
        binding.update(&settings, &mut host);

        let mut program = program();
        binding.render(0, &mut program, &mut host);
        let tex = program.texture("tex").unwrap();
        assert_eq!((tex.width(), tex.height()), (64, 32));

        let mut props = Properties::new();
        binding.properties(&host, &mut props);
        let PropertyKind::List { items, .. } = &props.get("tex").unwrap().kind else {
            panic!("expected a source list");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].label, "camera");
    }
}
