use crate::binding::ShaderData;
use crate::config::EngineConfig;
use crate::effect::{ParamDescriptor, ParamHandle};
use crate::expr::Environment;
use crate::host::{CompiledProgram, FilterHost};
use crate::properties::Properties;
use crate::settings::SettingsStore;

use super::state::{Edge, FrameState, ResizeExpressions};

/// One uniform of the loaded program together with its binding.
pub struct ShaderParameter {
    handle: ParamHandle,
    data: ShaderData,
}

impl ShaderParameter {
    pub fn new(
        index: usize,
        descriptor: &ParamDescriptor,
        env: &mut Environment,
        resize: &mut ResizeExpressions,
        config: &EngineConfig,
    ) -> Self {
        let handle = ParamHandle::new(index, descriptor);
        for edge in Edge::ALL {
            if let Some(text) = handle.annotation_text(edge.annotation())
                && resize.claim(edge, &text)
            {
                log::debug!("{} claimed by '{}'", edge.annotation(), handle.name());
            }
        }
        let data = ShaderData::new(&handle, env, config);
        Self { handle, data }
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn handle(&self) -> &ParamHandle {
        &self.handle
    }

    pub fn data(&self) -> &ShaderData {
        &self.data
    }

    pub fn bind_expressions(&mut self, env: &Environment) {
        self.data.bind_expressions(env);
    }

    pub fn update(&mut self, settings: &dyn SettingsStore, host: &mut dyn FilterHost) {
        self.data.update(settings, host);
    }

    pub fn tick(&mut self, state: &FrameState) {
        self.data.tick(state);
    }

    pub fn render(&mut self, program: &mut dyn CompiledProgram, host: &mut dyn FilterHost) {
        self.data.render(self.handle.index(), program, host);
    }

    pub fn properties(&self, host: &dyn FilterHost, props: &mut Properties) {
        self.data.properties(host, props);
    }

    pub fn release(&mut self, host: &mut dyn FilterHost) {
        self.data.release(host);
    }
}
