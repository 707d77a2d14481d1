use std::any::Any;

use crate::host::{CompiledProgram, Texture};

use super::types::ParamDescriptor;
use super::value::ValueBox;

/// Last value uploaded to one uniform.
#[derive(Debug, Clone, Default)]
pub enum UniformSlot {
    #[default]
    Unset,
    Value(Vec<u8>),
    Texture(Option<Texture>),
}

/// A reflected effect: the parameter table plus the uniform values the
/// filter has set on it. Backends read the slots back when drawing.
#[derive(Debug)]
pub struct EffectProgram {
    params: Vec<ParamDescriptor>,
    slots: Vec<UniformSlot>,
}

impl EffectProgram {
    pub fn new(params: Vec<ParamDescriptor>) -> Self {
        let slots = vec![UniformSlot::Unset; params.len()];
        Self { params, slots }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }

    pub fn slot(&self, index: usize) -> Option<&UniformSlot> {
        self.slots.get(index)
    }

    pub fn value_bytes(&self, name: &str) -> Option<&[u8]> {
        match self.slots.get(self.index_of(name)?)? {
            UniformSlot::Value(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Uploaded value of `name` decoded as its declared type.
    pub fn value(&self, name: &str) -> Option<ValueBox> {
        let index = self.index_of(name)?;
        let bytes = self.value_bytes(name)?;
        Some(ValueBox::new(self.params[index].param_type, bytes.to_vec()))
    }

    pub fn floats(&self, name: &str) -> Option<Vec<f32>> {
        self.value(name).map(|v| v.to_floats())
    }

    pub fn ints(&self, name: &str) -> Option<Vec<i32>> {
        self.value(name).map(|v| v.to_ints())
    }

    pub fn texture(&self, name: &str) -> Option<&Texture> {
        match self.slots.get(self.index_of(name)?)? {
            UniformSlot::Texture(texture) => texture.as_ref(),
            _ => None,
        }
    }
}

impl CompiledProgram for EffectProgram {
    fn params(&self) -> &[ParamDescriptor] {
        &self.params
    }

    fn set_value(&mut self, index: usize, data: &[u8]) {
        match self.slots.get_mut(index) {
            Some(slot) => *slot = UniformSlot::Value(data.to_vec()),
            None => log::debug!("set_value: no uniform at index {index}"),
        }
    }

    fn set_texture(&mut self, index: usize, texture: Option<Texture>) {
        match self.slots.get_mut(index) {
            Some(slot) => *slot = UniformSlot::Texture(texture),
            None => log::debug!("set_texture: no uniform at index {index}"),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
