use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListFormat {
    Int,
    Float,
    String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ListValue {
    Int(i64),
    Float(f64),
    String(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListItem {
    pub label: String,
    pub value: ListValue,
}

impl ListItem {
    pub fn new(label: impl Into<String>, value: ListValue) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyKind {
    Button,
    Path {
        filter: String,
        default_path: Option<String>,
    },
    Bool,
    Int {
        min: i32,
        max: i32,
        step: i32,
        slider: bool,
    },
    Float {
        min: f64,
        max: f64,
        step: f64,
        slider: bool,
    },
    Color,
    List {
        format: ListFormat,
        items: Vec<ListItem>,
    },
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    pub name: String,
    pub description: String,
    #[serde(flatten)]
    pub kind: PropertyKind,
    pub enabled: bool,
    /// Long description, shown as a tooltip.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
}

impl Property {
    pub fn new(name: impl Into<String>, description: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            enabled: true,
            tooltip: None,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }
}

/// Ordered set of properties for one filter instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Properties {
    items: Vec<Property>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, property: Property) {
        self.items.push(property);
    }

    pub fn get(&self, name: &str) -> Option<&Property> {
        self.items.iter().find(|p| p.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.items.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.items.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
