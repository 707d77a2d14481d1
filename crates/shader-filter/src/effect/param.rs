use std::collections::HashMap;

use super::types::{ParamDescriptor, ParamType};
use super::value::ValueBox;

/// One shader uniform with its default value and annotations materialised
/// up front, so nothing downstream has to query the compiler again.
///
/// Annotations are owned children, kept in declaration order. They carry no
/// annotations of their own.
#[derive(Debug, Clone)]
pub struct ParamHandle {
    index: usize,
    name: String,
    param_type: ParamType,
    value: ValueBox,
    annotations: Vec<ParamHandle>,
    by_name: HashMap<String, usize>,
}

impl ParamHandle {
    /// Build the handle for the uniform at `index` in the program's table.
    pub fn new(index: usize, descriptor: &ParamDescriptor) -> Self {
        let annotations: Vec<ParamHandle> = descriptor
            .annotations
            .iter()
            .enumerate()
            .map(|(i, note)| ParamHandle::leaf(i, note))
            .collect();

        let mut by_name = HashMap::with_capacity(annotations.len());
        for (i, note) in annotations.iter().enumerate() {
            // Later duplicates lose, matching first-declaration lookup.
            by_name.entry(note.name.clone()).or_insert(i);
        }

        Self {
            index,
            name: descriptor.name.clone(),
            param_type: descriptor.param_type,
            value: ValueBox::new(descriptor.param_type, descriptor.default.clone()),
            annotations,
            by_name,
        }
    }

    fn leaf(index: usize, descriptor: &ParamDescriptor) -> Self {
        Self {
            index,
            name: descriptor.name.clone(),
            param_type: descriptor.param_type,
            value: ValueBox::new(descriptor.param_type, descriptor.default.clone()),
            annotations: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn param_type(&self) -> ParamType {
        self.param_type
    }

    pub fn value(&self) -> &ValueBox {
        &self.value
    }

    pub fn annotations(&self) -> &[ParamHandle] {
        &self.annotations
    }

    pub fn annotation_count(&self) -> usize {
        self.annotations.len()
    }

    pub fn annotation(&self, name: &str) -> Option<&ParamHandle> {
        self.by_name.get(name).map(|&i| &self.annotations[i])
    }

    pub fn has_annotation(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn annotation_value(&self, name: &str) -> Option<&ValueBox> {
        self.annotation(name).map(ParamHandle::value)
    }

    /// String annotation, `None` when absent or empty.
    pub fn annotation_text(&self, name: &str) -> Option<String> {
        self.annotation_value(name)
            .map(ValueBox::to_text)
            .filter(|s| !s.is_empty())
    }

    pub fn annotation_float(&self, name: &str) -> Option<f32> {
        self.annotation_value(name).and_then(ValueBox::first_float)
    }

    pub fn annotation_int(&self, name: &str) -> Option<i32> {
        self.annotation_value(name).and_then(ValueBox::first_int)
    }

    pub fn annotation_bool(&self, name: &str) -> Option<bool> {
        self.annotation_value(name).and_then(ValueBox::first_bool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ParamDescriptor {
        ParamDescriptor::new("speed", ParamType::Float)
            .with_default(1.5f32.to_ne_bytes().to_vec())
            .with_annotation(
                ParamDescriptor::new("type", ParamType::String)
                    .with_default(b"slider\0".to_vec()),
            )
            .with_annotation(
                ParamDescriptor::new("min", ParamType::Float)
                    .with_default((-2.0f32).to_ne_bytes().to_vec()),
            )
            .with_annotation(
                ParamDescriptor::new("is_slider", ParamType::Bool)
                    .with_default(1i32.to_ne_bytes().to_vec()),
            )
    }

    #[test]
    fn materialises_value_and_annotations() {
        let handle = ParamHandle::new(3, &descriptor());
        assert_eq!(handle.index(), 3);
        assert_eq!(handle.name(), "speed");
        assert_eq!(handle.value().to_floats(), vec![1.5]);
        assert_eq!(handle.annotation_count(), 3);
        assert_eq!(handle.annotation_text("type").as_deref(), Some("slider"));
        assert_eq!(handle.annotation_float("min"), Some(-2.0));
        assert_eq!(handle.annotation_bool("is_slider"), Some(true));
    }

    #[test]
    fn missing_annotations_are_none() {
        let handle = ParamHandle::new(0, &descriptor());
        assert!(handle.annotation("max").is_none());
        assert!(!handle.has_annotation("max"));
        assert_eq!(handle.annotation_float("max"), None);
        // Wrong-typed lookups come back empty rather than failing.
        assert_eq!(handle.annotation_text("min"), None);
    }

    #[test]
    fn annotations_keep_declaration_order_and_have_no_children() {
        let handle = ParamHandle::new(0, &descriptor());
        let names: Vec<&str> = handle.annotations().iter().map(ParamHandle::name).collect();
        assert_eq!(names, ["type", "min", "is_slider"]);
        assert!(handle.annotations().iter().all(|a| a.annotation_count() == 0));
    }
}
