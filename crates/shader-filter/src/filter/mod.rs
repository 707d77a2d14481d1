pub mod parameter;
pub mod state;

pub use parameter::ShaderParameter;
pub use state::{Edge, FrameState, ResizeAmounts, ResizeExpressions};

use std::path::Path;

use crate::config::EngineConfig;
use crate::error::CompileError;
use crate::expr::{Environment, builtins};
use crate::host::{CompiledProgram, FilterHost, ShaderCompiler};
use crate::properties::{Properties, Property, PropertyKind};
use crate::settings::SettingsStore;
use crate::shader::ShaderWatcher;

/// Setting holding the effect file path.
pub const SHADER_FILE_SETTING: &str = "shader_file_name";
/// Button that requests a reload.
pub const RELOAD_BUTTON: &str = "reload_effect";

const EFFECT_FILE_FILTER: &str = "Effect Files (*.effect *.shader);;All Files (*.*)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterStatus {
    /// No effect file selected yet.
    Uninitialized,
    Loaded,
    /// A reload is pending and will run on the next update.
    NeedsReload,
    /// The last reload failed; rendering passes the input through.
    ReloadFailed(CompileError),
}

pub struct ShaderFilter {
    compiler: Box<dyn ShaderCompiler>,
    config: EngineConfig,
    program: Option<Box<dyn CompiledProgram>>,
    params: Vec<ShaderParameter>,
    env: Environment,
    resize: ResizeExpressions,
    state: FrameState,
    effect_path: String,
    reload_pending: bool,
    status: FilterStatus,
    watcher: Option<ShaderWatcher>,
}

impl ShaderFilter {
    /// Create an instance and apply `settings`, loading the effect if one is
    /// selected.
    pub fn create(
        settings: &dyn SettingsStore,
        host: &mut dyn FilterHost,
        compiler: Box<dyn ShaderCompiler>,
        config: EngineConfig,
    ) -> Self {
        builtins::set_audio_info(f64::from(config.sample_rate), config.output_channels as f64);
        let env = Environment::new(config.random_seed);
        let mut filter = Self {
            compiler,
            config,
            program: None,
            params: Vec::new(),
            env,
            resize: ResizeExpressions::default(),
            state: FrameState::default(),
            effect_path: String::new(),
            reload_pending: true,
            status: FilterStatus::Uninitialized,
            watcher: None,
        };
        let (w, h) = host.base_size();
        filter.state.apply_geometry(w, h);
        filter.update(settings, host);
        filter
    }

    /// Apply changed settings. Runs a pending reload first, then hands the
    /// settings to every parameter.
    pub fn update(&mut self, settings: &dyn SettingsStore, host: &mut dyn FilterHost) {
        let path = settings.get_string(SHADER_FILE_SETTING).unwrap_or_default();
        if path != self.effect_path {
            self.effect_path = path;
            self.reload_pending = true;
            self.watch();
        }

        if self.reload_pending {
            // Failures are recorded in the status and already logged.
            let _ = self.reload(host);
        }

        for param in &mut self.params {
            param.update(settings, host);
        }
    }

    /// Mark the effect for reload on the next update.
    pub fn request_reload(&mut self) {
        self.reload_pending = true;
        if self.status == FilterStatus::Loaded {
            self.status = FilterStatus::NeedsReload;
        }
    }

    /// True when the host should call [`ShaderFilter::update`]: a reload was
    /// requested or the effect file changed on disk.
    pub fn needs_update(&mut self) -> bool {
        if self.watcher.as_ref().is_some_and(ShaderWatcher::changed) {
            log::info!("Effect file changed: {}", self.effect_path);
            self.request_reload();
        }
        self.reload_pending
    }

    fn watch(&mut self) {
        self.watcher = None;
        if !self.config.hot_reload || self.effect_path.is_empty() {
            return;
        }
        match ShaderWatcher::new(Path::new(&self.effect_path)) {
            Ok(w) => self.watcher = Some(w),
            Err(e) => log::warn!("Hot reload unavailable for {}: {e:#}", self.effect_path),
        }
    }

    /// Tear down every parameter and rebuild from the effect file.
    ///
    /// Parameters are created in two passes: all variables are registered
    /// first, then every expression is compiled, so expressions may refer to
    /// parameters declared after them.
    pub fn reload(&mut self, host: &mut dyn FilterHost) -> Result<(), CompileError> {
        self.reload_pending = false;
        self.release_params(host);
        self.program = None;
        self.env.clear();
        builtins::install(&mut self.env);
        self.resize.clear();
        self.state.resize = ResizeAmounts::default();

        if self.effect_path.is_empty() {
            self.status = FilterStatus::Uninitialized;
            return Ok(());
        }

        log::info!("Loading effect {}", self.effect_path);
        let result = self.load();
        match &result {
            Ok(()) => {
                log::info!("Effect loaded with {} parameters", self.params.len());
                self.status = FilterStatus::Loaded;
            }
            Err(e) => {
                log::error!("Effect {} failed to load: {e}", self.effect_path);
                self.status = FilterStatus::ReloadFailed(e.clone());
            }
        }
        result
    }

    fn load(&mut self) -> Result<(), CompileError> {
        let source = std::fs::read_to_string(&self.effect_path).map_err(|e| CompileError::Io {
            path: self.effect_path.clone(),
            message: e.to_string(),
        })?;
        let program = self.compiler.compile(&source)?;

        let mut params: Vec<ShaderParameter> = program
            .params()
            .iter()
            .enumerate()
            .map(|(i, d)| ShaderParameter::new(i, d, &mut self.env, &mut self.resize, &self.config))
            .collect();
        for param in &mut params {
            param.bind_expressions(&self.env);
        }
        self.resize.compile(&self.env);

        self.params = params;
        self.program = Some(program);
        Ok(())
    }

    fn release_params(&mut self, host: &mut dyn FilterHost) {
        for param in &mut self.params {
            param.release(host);
        }
        self.params.clear();
    }

    /// Advance time, recompute bound values and the output geometry.
    pub fn tick(&mut self, seconds: f32, host: &dyn FilterHost) {
        self.state.advance(seconds);
        for param in &mut self.params {
            param.tick(&self.state);
        }
        self.resize.evaluate(&mut self.state.resize);
        let (w, h) = host.base_size();
        self.state.apply_geometry(w, h);
    }

    /// Upload every parameter and draw, or pass the input through when no
    /// program is loaded.
    pub fn render(&mut self, host: &mut dyn FilterHost) {
        let Some(program) = self.program.as_mut() else {
            host.skip_filter();
            return;
        };
        if !host.begin_filter() {
            return;
        }
        for param in &mut self.params {
            param.render(&mut **program, host);
        }
        host.end_filter(&**program, self.state.total_width, self.state.total_height);
    }

    pub fn properties(&self, host: &dyn FilterHost) -> Properties {
        let mut props = Properties::new();
        props.add(Property::new(RELOAD_BUTTON, "Reload effect", PropertyKind::Button));
        props.add(Property::new(
            SHADER_FILE_SETTING,
            "Effect file",
            PropertyKind::Path {
                filter: EFFECT_FILE_FILTER.to_string(),
                default_path: None,
            },
        ));
        for param in &self.params {
            param.properties(host, &mut props);
        }
        props
    }

    pub fn width(&self) -> u32 {
        self.state.total_width
    }

    pub fn height(&self) -> u32 {
        self.state.total_height
    }

    pub fn status(&self) -> &FilterStatus {
        &self.status
    }

    pub fn params(&self) -> &[ShaderParameter] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&ShaderParameter> {
        self.params.iter().find(|p| p.name() == name)
    }

    pub fn program(&self) -> Option<&dyn CompiledProgram> {
        self.program.as_deref()
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn frame(&self) -> &FrameState {
        &self.state
    }

    pub fn effect_path(&self) -> &str {
        &self.effect_path
    }

    /// Release every parameter's host resources.
    pub fn destroy(mut self, host: &mut dyn FilterHost) {
        self.release_params(host);
        self.program = None;
        log::debug!("Filter destroyed");
    }
}
