use crate::effect::ParamHandle;
use crate::properties::{Properties, Property, PropertyKind};
use crate::settings::SettingsStore;

/// Text uniform. Exposed as an editable field; nothing is uploaded.
#[derive(Debug, Clone)]
pub struct StringBinding {
    name: String,
    default: String,
    value: String,
}

impl StringBinding {
    pub fn new(handle: &ParamHandle) -> Self {
        let default = handle.value().to_text();
        Self {
            name: handle.name().to_string(),
            value: default.clone(),
            default,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn update(&mut self, settings: &dyn SettingsStore) {
        self.value = settings
            .get_string(&self.name)
            .unwrap_or_else(|| self.default.clone());
    }

    pub fn properties(&self, props: &mut Properties) {
        props.add(Property::new(&self.name, &self.name, PropertyKind::Text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{ParamDescriptor, ParamType};
    use crate::settings::JsonSettings;

    #[test]
    fn settings_override_default() {
        let d = ParamDescriptor::new("label", ParamType::String).with_default(b"hello\0".to_vec());
        let mut binding = StringBinding::new(&ParamHandle::new(0, &d));
        assert_eq!(binding.value(), "hello");

        let mut settings = JsonSettings::new();
        settings.set_string("label", "world");
        binding.update(&settings);
        assert_eq!(binding.value(), "world");

        binding.update(&JsonSettings::new());
        assert_eq!(binding.value(), "hello");
    }
}
