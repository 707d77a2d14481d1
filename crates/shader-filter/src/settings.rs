use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key/value persistence for filter settings, keyed by parameter name.
pub trait SettingsStore {
    fn has(&self, key: &str) -> bool;
    fn get_string(&self, key: &str) -> Option<String>;
    fn get_int(&self, key: &str) -> Option<i64>;
    fn get_float(&self, key: &str) -> Option<f64>;
    fn get_bool(&self, key: &str) -> Option<bool>;

    fn set_string(&mut self, key: &str, value: &str);
    fn set_int(&mut self, key: &str, value: i64);
    fn set_float(&mut self, key: &str, value: f64);
    fn set_bool(&mut self, key: &str, value: bool);
}

/// Settings held in a JSON object. Numeric getters accept any JSON number;
/// bool getters also accept numbers (non-zero is true).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonSettings {
    values: Map<String, Value>,
}

impl JsonSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }
}

impl SettingsStore for JsonSettings {
    fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn get_string(&self, key: &str) -> Option<String> {
        self.values.get(key)?.as_str().map(str::to_string)
    }

    fn get_int(&self, key: &str) -> Option<i64> {
        let value = self.values.get(key)?;
        value
            .as_i64()
            .or_else(|| value.as_f64().map(|v| v as i64))
            .or_else(|| value.as_bool().map(i64::from))
    }

    fn get_float(&self, key: &str) -> Option<f64> {
        let value = self.values.get(key)?;
        value
            .as_f64()
            .or_else(|| value.as_bool().map(|b| if b { 1.0 } else { 0.0 }))
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        let value = self.values.get(key)?;
        value
            .as_bool()
            .or_else(|| value.as_f64().map(|v| v != 0.0))
    }

    fn set_string(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), Value::from(value));
    }

    fn set_int(&mut self, key: &str, value: i64) {
        self.values.insert(key.to_string(), Value::from(value));
    }

    fn set_float(&mut self, key: &str, value: f64) {
        self.values.insert(key.to_string(), Value::from(value));
    }

    fn set_bool(&mut self, key: &str, value: bool) {
        self.values.insert(key.to_string(), Value::from(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_access_with_coercion() {
        let mut s = JsonSettings::from_json(r#"{"a": 2.75, "b": true, "c": "x", "d": 3}"#).unwrap();
        assert_eq!(s.get_int("a"), Some(2));
        assert_eq!(s.get_float("d"), Some(3.0));
        assert_eq!(s.get_bool("d"), Some(true));
        assert_eq!(s.get_int("b"), Some(1));
        assert_eq!(s.get_string("c").as_deref(), Some("x"));
        assert_eq!(s.get_string("a"), None);
        assert!(!s.has("missing"));

        s.set_float("a", -1.5);
        s.set_string("c", "y");
        assert_eq!(s.get_float("a"), Some(-1.5));
        assert_eq!(s.get_string("c").as_deref(), Some("y"));
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut s = JsonSettings::new();
        s.set_int("mode", 4);
        s.set_bool("flag", false);
        s.save(&path).unwrap();
        assert_eq!(JsonSettings::load(&path).unwrap(), s);
    }
}
