use crate::effect::{ParamHandle, ParamType, ValueBox};
use crate::expr::{Environment, Expression, VarCell};
use crate::filter::FrameState;
use crate::host::CompiledProgram;
use crate::properties::{ListFormat, ListItem, ListValue, Properties, Property, PropertyKind};
use crate::settings::SettingsStore;

use super::builtin::Builtin;

/// UI control shape for a numeric parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    Combobox,
    List,
    Num,
    Slider,
    Color,
}

impl NumericKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "combobox" => Some(NumericKind::Combobox),
            "list" => Some(NumericKind::List),
            "num" => Some(NumericKind::Num),
            "slider" => Some(NumericKind::Slider),
            "color" => Some(NumericKind::Color),
            _ => None,
        }
    }

    /// An explicit `type` wins, then `is_slider`, then 4-float colour
    /// inference.
    pub fn classify(handle: &ParamHandle) -> Self {
        if let Some(kind) = handle
            .annotation_text("type")
            .and_then(|t| NumericKind::from_name(&t))
        {
            return kind;
        }
        if handle.annotation_bool("is_slider") == Some(true) {
            return NumericKind::Slider;
        }
        if handle.param_type() == ParamType::Vec4 {
            return NumericKind::Color;
        }
        NumericKind::Num
    }

    fn is_list(self) -> bool {
        matches!(self, NumericKind::Combobox | NumericKind::List)
    }
}

/// Where one component's value comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentState {
    Builtin,
    Editable,
    Expression,
    /// The expression failed to compile; the control is shown disabled.
    Disabled(String),
}

#[derive(Debug, Clone)]
pub struct Component {
    pub name: String,
    pub description: String,
    /// Expression variable bound to this component.
    pub variable: String,
    pub state: ComponentState,
    cell: VarCell,
    expr: Expression,
    default: f64,
    value: f64,
}

impl Component {
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn expression(&self) -> &Expression {
        &self.expr
    }

    fn store(&mut self, value: f64) {
        self.value = value;
        self.cell.set(value);
    }
}

/// `uvScale_0` -> `uv_scale_0`.
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn pack_color(rgba: &[f64]) -> i64 {
    let channel = |i: usize| -> i64 {
        let v = rgba.get(i).copied().unwrap_or(1.0).clamp(0.0, 1.0);
        (v * 255.0).round() as i64
    };
    channel(0) | (channel(1) << 8) | (channel(2) << 16) | (channel(3) << 24)
}

fn unpack_color(packed: i64) -> [f64; 4] {
    let channel = |shift: u32| ((packed >> shift) & 0xff) as f64 / 255.0;
    [channel(0), channel(8), channel(16), channel(24)]
}

/// Binding for bool, int, float, vector and matrix uniforms.
#[derive(Debug, Clone)]
pub struct NumericBinding {
    name: String,
    param_type: ParamType,
    builtin: Option<Builtin>,
    kind: NumericKind,
    min: f64,
    max: f64,
    step: f64,
    show_exprless: bool,
    components: Vec<Component>,
    list_items: Vec<ListItem>,
}

impl NumericBinding {
    /// Materialise components and register their variables. Expressions are
    /// compiled later by [`NumericBinding::bind_expressions`], once every
    /// parameter's variables exist.
    pub fn new(handle: &ParamHandle, env: &mut Environment) -> Self {
        let param_type = handle.param_type();
        let count = param_type.component_count();
        let builtin = Builtin::from_name(handle.name());
        let defaults = handle.value().to_floats();

        let mut components = Vec::with_capacity(count);
        for i in 0..count {
            let suffix = if count > 1 { format!("_{i}") } else { String::new() };
            let name = format!("{}{suffix}", handle.name());
            let variable = to_snake_case(&name);
            let text = handle
                .annotation_text(&format!("expr{suffix}"))
                .unwrap_or_default();
            let default = f64::from(defaults.get(i).copied().unwrap_or(0.0));
            let cell = env.bind(&variable);
            cell.set(default);
            components.push(Component {
                description: name.clone(),
                name,
                variable,
                state: if builtin.is_some() {
                    ComponentState::Builtin
                } else {
                    ComponentState::Editable
                },
                cell,
                expr: Expression::new(text),
                default,
                value: default,
            });
        }

        let (mut min, mut max, mut step) = if param_type.is_float() {
            (f64::from(-f32::MAX), f64::from(f32::MAX), 1.0)
        } else {
            (f64::from(i32::MIN), f64::from(i32::MAX), 1.0)
        };
        if let Some(v) = handle.annotation_float("min") {
            min = f64::from(v);
        }
        if let Some(v) = handle.annotation_float("max") {
            max = f64::from(v);
        }
        if let Some(v) = handle.annotation_float("step") {
            step = f64::from(v);
        }

        let has_expressions = components.iter().any(|c| !c.expr.is_empty());
        let show_exprless = handle
            .annotation_bool("show_exprless")
            .unwrap_or(!has_expressions);

        let kind = NumericKind::classify(handle);
        let list_items = if kind.is_list() {
            Self::list_items(handle, param_type)
        } else {
            Vec::new()
        };

        Self {
            name: handle.name().to_string(),
            param_type,
            builtin,
            kind,
            min,
            max,
            step,
            show_exprless,
            components,
            list_items,
        }
    }

    fn list_items(handle: &ParamHandle, param_type: ParamType) -> Vec<ListItem> {
        if param_type == ParamType::Bool {
            let enabled = handle
                .annotation_text("enabled_desc")
                .unwrap_or_else(|| "On".to_string());
            let disabled = handle
                .annotation_text("disabled_desc")
                .unwrap_or_else(|| "Off".to_string());
            return vec![
                ListItem::new(enabled, ListValue::Int(1)),
                ListItem::new(disabled, ListValue::Int(0)),
            ];
        }

        let mut items = Vec::new();
        for note in handle.annotations() {
            let name = note.name();
            if !name.starts_with("list_item") || name.ends_with("_name") {
                continue;
            }
            let label = handle.annotation_text(&format!("{name}_name"));
            let value = if param_type.is_float() {
                note.value().first_float().map(|v| {
                    let v = f64::from(v);
                    (label.clone().unwrap_or_else(|| v.to_string()), ListValue::Float(v))
                })
            } else {
                note.value().first_int().map(|v| {
                    (label.clone().unwrap_or_else(|| v.to_string()), ListValue::Int(i64::from(v)))
                })
            };
            if let Some((label, value)) = value {
                items.push(ListItem::new(label, value));
            }
        }
        items
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NumericKind {
        self.kind
    }

    pub fn builtin(&self) -> Option<Builtin> {
        self.builtin
    }

    pub fn range(&self) -> (f64, f64, f64) {
        (self.min, self.max, self.step)
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    fn is_color_control(&self) -> bool {
        self.kind == NumericKind::Color && self.param_type.is_float() && self.components.len() == 4
    }

    /// Compile every component expression against the complete environment.
    pub fn bind_expressions(&mut self, env: &Environment) {
        for c in &mut self.components {
            if c.expr.is_empty() {
                continue;
            }
            let result = c.expr.compile(env);
            if c.state == ComponentState::Builtin {
                // Built-ins have no control; a failed expression just leaves the raw value.
                if let Err(e) = result {
                    log::warn!("Expression for built-in '{}' failed: {e}", c.name);
                }
                continue;
            }
            match result {
                Ok(()) => c.state = ComponentState::Expression,
                Err(e) => {
                    log::warn!("Expression for '{}' failed: {e}", c.name);
                    c.state = ComponentState::Disabled(e.to_string());
                }
            }
        }
    }

    fn narrow(&self, value: f64) -> f64 {
        if self.param_type.is_float() {
            value
        } else {
            value.trunc()
        }
    }

    /// Pull user-edited values from settings. Absent keys fall back to the
    /// uniform's declared default.
    pub fn update(&mut self, settings: &dyn SettingsStore) {
        if self.builtin.is_some() {
            return;
        }

        if self.is_color_control() {
            let rgba = match settings.get_int(&self.name) {
                Some(packed) => unpack_color(packed),
                None => {
                    let d: Vec<f64> = self.components.iter().map(|c| c.default).collect();
                    unpack_color(pack_color(&d))
                }
            };
            for (c, v) in self.components.iter_mut().zip(rgba) {
                c.store(v);
            }
            return;
        }

        let param_type = self.param_type;
        let list = self.kind.is_list();
        for c in &mut self.components {
            let stored = if param_type == ParamType::Bool {
                if list {
                    settings.get_int(&c.name).map(|v| v as f64)
                } else {
                    settings.get_bool(&c.name).map(|b| if b { 1.0 } else { 0.0 })
                }
            } else if param_type.is_int() {
                settings
                    .get_int(&c.name)
                    .map(|v| v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as f64)
            } else {
                settings.get_float(&c.name)
            };
            let value = stored.unwrap_or(c.default);
            c.store(value);
        }
    }

    /// Recompute built-in and expression-driven components.
    pub fn tick(&mut self, state: &FrameState) {
        if let Some(builtin) = self.builtin {
            let values = builtin.values(state);
            for (i, c) in self.components.iter_mut().enumerate() {
                let raw = f64::from(values.get(i).copied().unwrap_or(0.0));
                c.store(raw);
                if c.expr.is_compiled() {
                    let shaped = c.expr.evaluate(raw);
                    c.store(shaped);
                }
            }
            return;
        }

        for i in 0..self.components.len() {
            let c = &self.components[i];
            if !c.expr.is_compiled() {
                continue;
            }
            let v = self.narrow(c.expr.evaluate(c.value));
            self.components[i].store(v);
        }
    }

    /// Current values as the uniform's raw bytes.
    pub fn value_box(&self) -> ValueBox {
        if self.param_type.is_float() {
            let values: Vec<f32> = self.components.iter().map(|c| c.value as f32).collect();
            ValueBox::from_floats(self.param_type, &values)
        } else {
            let values: Vec<i32> = self.components.iter().map(|c| c.value as i32).collect();
            ValueBox::from_ints(self.param_type, &values)
        }
    }

    pub fn render(&self, index: usize, program: &mut dyn CompiledProgram) {
        program.set_value(index, self.value_box().bytes());
    }

    pub fn properties(&self, props: &mut Properties) {
        if self.builtin.is_some() {
            return;
        }
        if self.is_color_control() {
            props.add(Property::new(&self.name, &self.name, PropertyKind::Color));
            return;
        }

        for c in &self.components {
            let tooltip = match &c.state {
                ComponentState::Expression => continue,
                ComponentState::Disabled(message) => message.clone(),
                _ => c.variable.clone(),
            };
            if !self.show_exprless && c.expr.is_empty() {
                continue;
            }

            let kind = if self.param_type.is_float() {
                match self.kind {
                    NumericKind::Combobox | NumericKind::List => PropertyKind::List {
                        format: ListFormat::Float,
                        items: self.list_items.clone(),
                    },
                    k => PropertyKind::Float {
                        min: self.min,
                        max: self.max,
                        step: self.step,
                        slider: k == NumericKind::Slider,
                    },
                }
            } else if self.param_type.is_int() {
                match self.kind {
                    NumericKind::Combobox | NumericKind::List => PropertyKind::List {
                        format: ListFormat::Int,
                        items: self.list_items.clone(),
                    },
                    k => PropertyKind::Int {
                        min: self.min as i32,
                        max: self.max as i32,
                        step: self.step as i32,
                        slider: k == NumericKind::Slider,
                    },
                }
            } else if self.kind.is_list() {
                PropertyKind::List {
                    format: ListFormat::Int,
                    items: self.list_items.clone(),
                }
            } else {
                PropertyKind::Bool
            };

            let enabled = !matches!(c.state, ComponentState::Disabled(_));
            props.add(
                Property::new(&c.name, &c.description, kind)
                    .enabled(enabled)
                    .tooltip(tooltip),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{EffectProgram, ParamDescriptor};
    use crate::expr::builtins;
    use crate::settings::JsonSettings;

    fn env() -> Environment {
        let mut env = Environment::new(Some(3));
        builtins::install(&mut env);
        env
    }

    fn string_note(name: &str, text: &str) -> ParamDescriptor {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        ParamDescriptor::new(name, ParamType::String).with_default(bytes)
    }

    fn float_note(name: &str, v: f32) -> ParamDescriptor {
        ParamDescriptor::new(name, ParamType::Float).with_default(v.to_ne_bytes().to_vec())
    }

    fn bool_note(name: &str, v: bool) -> ParamDescriptor {
        ParamDescriptor::new(name, ParamType::Bool).with_default(i32::from(v).to_ne_bytes().to_vec())
    }

    fn floats(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_ne_bytes()).collect()
    }

    fn handle(d: ParamDescriptor) -> ParamHandle {
        ParamHandle::new(0, &d)
    }

    #[test]
    fn four_floats_infer_color_unless_slider_or_typed() {
        let plain = handle(ParamDescriptor::new("tint", ParamType::Vec4));
        assert_eq!(NumericKind::classify(&plain), NumericKind::Color);

        let slider = handle(ParamDescriptor::new("tint", ParamType::Vec4).with_annotation(bool_note("is_slider", true)));
        assert_eq!(NumericKind::classify(&slider), NumericKind::Slider);

        let typed = handle(
            ParamDescriptor::new("tint", ParamType::Vec4)
                .with_annotation(bool_note("is_slider", true))
                .with_annotation(string_note("type", "num")),
        );
        assert_eq!(NumericKind::classify(&typed), NumericKind::Num);

        let unknown_type = handle(ParamDescriptor::new("x", ParamType::Float).with_annotation(string_note("type", "dial")));
        assert_eq!(NumericKind::classify(&unknown_type), NumericKind::Num);
    }

    #[test]
    fn snake_case_variables() {
        assert_eq!(to_snake_case("uvScale_0"), "uv_scale_0");
        assert_eq!(to_snake_case("ViewProj_3"), "view_proj_3");
        assert_eq!(to_snake_case("speed"), "speed");
    }

    #[test]
    fn components_named_and_bound() {
        let mut env = env();
        let h = handle(ParamDescriptor::new("offsetXY", ParamType::Vec2).with_default(floats(&[0.5, 2.0])));
        let binding = NumericBinding::new(&h, &mut env);
        let names: Vec<&str> = binding.components().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["offsetXY_0", "offsetXY_1"]);
        assert!(matches!(env.lookup("offset_x_y_1"), Some(crate::expr::Symbol::Variable(c)) if c.get() == 2.0));
    }

    #[test]
    fn default_ranges_cover_the_type() {
        let mut env = env();
        let f = NumericBinding::new(&handle(ParamDescriptor::new("f", ParamType::Float)), &mut env);
        assert_eq!(f.range(), (f64::from(-f32::MAX), f64::from(f32::MAX), 1.0));
        let i = NumericBinding::new(
            &handle(ParamDescriptor::new("i", ParamType::Int).with_annotation(float_note("max", 10.0))),
            &mut env,
        );
        assert_eq!(i.range(), (f64::from(i32::MIN), 10.0, 1.0));
    }

    #[test]
    fn expression_drives_value_and_hides_control() {
        let mut env = env();
        let h = handle(
            ParamDescriptor::new("speed", ParamType::Float).with_annotation(string_note("expr", "clamp(x, 0, 1)")),
        );
        let mut binding = NumericBinding::new(&h, &mut env);
        let x = env.bind("x");
        binding.bind_expressions(&env);
        assert_eq!(binding.components()[0].state, ComponentState::Expression);

        let state = FrameState::default();
        x.set(1.7);
        binding.tick(&state);
        assert_eq!(binding.components()[0].value(), 1.0);
        x.set(-0.3);
        binding.tick(&state);
        assert_eq!(binding.components()[0].value(), 0.0);

        let mut props = Properties::new();
        binding.properties(&mut props);
        assert!(props.is_empty());
    }

    #[test]
    fn failed_expression_disables_control_and_keeps_value() {
        let mut env = env();
        let h = handle(
            ParamDescriptor::new("gain", ParamType::Float)
                .with_default(floats(&[0.75]))
                .with_annotation(string_note("expr", "x +")),
        );
        let mut binding = NumericBinding::new(&h, &mut env);
        env.bind("x");
        binding.bind_expressions(&env);
        binding.update(&JsonSettings::new());
        binding.tick(&FrameState::default());
        assert_eq!(binding.components()[0].value(), 0.75);

        let mut props = Properties::new();
        binding.properties(&mut props);
        let p = props.get("gain").unwrap();
        assert!(!p.enabled);
        assert!(p.tooltip.as_deref().unwrap().contains("unexpected end"));
    }

    #[test]
    fn exprless_siblings_hidden_by_default() {
        let mut env = env();
        let h = handle(ParamDescriptor::new("pos", ParamType::Vec3).with_annotation(string_note("expr_1", "pi")));
        let mut binding = NumericBinding::new(&h, &mut env);
        binding.bind_expressions(&env);
        let mut props = Properties::new();
        binding.properties(&mut props);
        assert!(props.is_empty());

        let h = handle(
            ParamDescriptor::new("pos", ParamType::Vec3)
                .with_annotation(string_note("expr_1", "pi"))
                .with_annotation(bool_note("show_exprless", true)),
        );
        let mut binding = NumericBinding::new(&h, &mut env);
        binding.bind_expressions(&env);
        let mut props = Properties::new();
        binding.properties(&mut props);
        assert_eq!(props.names(), ["pos_0", "pos_2"]);
    }

    #[test]
    fn int_expressions_truncate() {
        let mut env = env();
        let h = handle(ParamDescriptor::new("steps", ParamType::Int).with_annotation(string_note("expr", "7.9")));
        let mut binding = NumericBinding::new(&h, &mut env);
        binding.bind_expressions(&env);
        binding.tick(&FrameState::default());
        assert_eq!(binding.value_box().to_ints(), vec![7]);
    }

    #[test]
    fn settings_and_color_round_trip() {
        let mut env = env();
        let mut settings = JsonSettings::new();
        settings.set_int("tint", 0xff00_80ff);
        settings.set_float("speed", 2.5);

        let mut tint = NumericBinding::new(&handle(ParamDescriptor::new("tint", ParamType::Vec4)), &mut env);
        tint.update(&settings);
        let rgba = tint.value_box().to_floats();
        assert_eq!(rgba[0], 1.0);
        assert!((rgba[1] - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(rgba[2], 0.0);
        assert_eq!(rgba[3], 1.0);

        let mut speed = NumericBinding::new(
            &handle(ParamDescriptor::new("speed", ParamType::Float).with_default(floats(&[1.0]))),
            &mut env,
        );
        speed.update(&settings);
        let mut program = EffectProgram::new(vec![ParamDescriptor::new("speed", ParamType::Float)]);
        speed.render(0, &mut program);
        assert_eq!(program.floats("speed"), Some(vec![2.5]));

        settings.remove("speed");
        speed.update(&settings);
        speed.render(0, &mut program);
        assert_eq!(program.floats("speed"), Some(vec![1.0]));
    }

    #[test]
    fn list_items_from_annotations() {
        let mut env = env();
        let h = handle(
            ParamDescriptor::new("mode", ParamType::Int)
                .with_annotation(string_note("type", "list"))
                .with_annotation(
                    ParamDescriptor::new("list_item_a", ParamType::Int).with_default(3i32.to_ne_bytes().to_vec()),
                )
                .with_annotation(string_note("list_item_a_name", "Three"))
                .with_annotation(
                    ParamDescriptor::new("list_item_b", ParamType::Int).with_default(5i32.to_ne_bytes().to_vec()),
                ),
        );
        let binding = NumericBinding::new(&h, &mut env);
        let mut props = Properties::new();
        binding.properties(&mut props);
        let PropertyKind::List { format, items } = &props.get("mode").unwrap().kind else {
            panic!("expected a list");
        };
        assert_eq!(*format, ListFormat::Int);
        assert_eq!(
            items,
            &vec![
                ListItem::new("Three", ListValue::Int(3)),
                ListItem::new("5", ListValue::Int(5)),
            ]
        );

        let b = handle(
            ParamDescriptor::new("flag", ParamType::Bool)
                .with_annotation(string_note("type", "combobox"))
                .with_annotation(string_note("enabled_desc", "Yes")),
        );
        let binding = NumericBinding::new(&b, &mut env);
        let mut props = Properties::new();
        binding.properties(&mut props);
        let PropertyKind::List { items, .. } = &props.get("flag").unwrap().kind else {
            panic!("expected a list");
        };
        assert_eq!(items[0].label, "Yes");
        assert_eq!(items[1].label, "Off");
    }

    #[test]
    fn builtins_follow_frame_state_and_have_no_controls() {
        let mut env = env();
        let mut binding = NumericBinding::new(&handle(ParamDescriptor::new("elapsed_time", ParamType::Float)), &mut env);
        let mut state = FrameState::default();
        state.advance(1.5);
        binding.tick(&state);
        assert_eq!(binding.components()[0].value(), 1.5);
        assert!(matches!(env.lookup("elapsed_time"), Some(crate::expr::Symbol::Variable(c)) if c.get() == 1.5));

        let mut props = Properties::new();
        binding.properties(&mut props);
        assert!(props.is_empty());
    }

    #[test]
    fn builtin_expression_shapes_the_raw_value() {
        let mut env = env();
        let h = handle(
            ParamDescriptor::new("elapsed_time", ParamType::Float)
                .with_annotation(string_note("expr", "elapsed_time * 0.5 + 1")),
        );
        let mut binding = NumericBinding::new(&h, &mut env);
        binding.bind_expressions(&env);
        assert!(binding.components()[0].expression().is_compiled());
        assert_eq!(binding.components()[0].state, ComponentState::Builtin);

        let mut state = FrameState::default();
        state.advance(3.0);
        binding.tick(&state);
        assert_eq!(binding.components()[0].value(), 2.5);
        assert_eq!(binding.value_box().to_floats(), vec![2.5]);

        let mut props = Properties::new();
        binding.properties(&mut props);
        assert!(props.is_empty());

        let h = handle(
            ParamDescriptor::new("elapsed_time", ParamType::Float).with_annotation(string_note("expr", "1 +")),
        );
        let mut broken = NumericBinding::new(&h, &mut env);
        broken.bind_expressions(&env);
        assert_eq!(broken.components()[0].state, ComponentState::Builtin);
        broken.tick(&state);
        assert_eq!(broken.components()[0].value(), 3.0);
    }
}
