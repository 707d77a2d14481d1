use super::types::ParamType;

/// Raw bytes of a parameter value tagged with its declared type.
///
/// Numeric types are stored as N x 4-byte native-endian elements (`f32` for
/// float types, `i32` for int types and bools); strings are NUL-terminated.
/// Conversions go element by element and never reinterpret bytes across
/// types.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueBox {
    param_type: ParamType,
    data: Vec<u8>,
}

impl ValueBox {
    pub fn new(param_type: ParamType, data: Vec<u8>) -> Self {
        Self { param_type, data }
    }

    pub fn from_floats(param_type: ParamType, values: &[f32]) -> Self {
        Self::new(param_type, bytemuck::cast_slice(values).to_vec())
    }

    pub fn from_ints(param_type: ParamType, values: &[i32]) -> Self {
        Self::new(param_type, bytemuck::cast_slice(values).to_vec())
    }

    pub fn from_bools(values: &[bool]) -> Self {
        let ints: Vec<i32> = values.iter().map(|&b| i32::from(b)).collect();
        Self::from_ints(ParamType::Bool, &ints)
    }

    pub fn from_string(value: &str) -> Self {
        let mut data = value.as_bytes().to_vec();
        data.push(0);
        Self::new(ParamType::String, data)
    }

    pub fn param_type(&self) -> ParamType {
        self.param_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whole 4-byte elements; a ragged tail is dropped.
    fn words(&self) -> &[u8] {
        &self.data[..self.data.len() / 4 * 4]
    }

    fn raw_f32(&self) -> Vec<f32> {
        bytemuck::pod_collect_to_vec(self.words())
    }

    fn raw_i32(&self) -> Vec<i32> {
        bytemuck::pod_collect_to_vec(self.words())
    }

    pub fn to_floats(&self) -> Vec<f32> {
        let ty = self.param_type;
        if ty.is_float() {
            self.raw_f32()
        } else if ty.is_int() {
            self.raw_i32().into_iter().map(|v| v as f32).collect()
        } else if ty == ParamType::Bool {
            self.raw_i32()
                .into_iter()
                .map(|v| if v != 0 { 1.0 } else { 0.0 })
                .collect()
        } else {
            Vec::new()
        }
    }

    /// Float sources truncate toward zero (saturating at the `i32` range).
    pub fn to_ints(&self) -> Vec<i32> {
        let ty = self.param_type;
        if ty.is_float() {
            self.raw_f32().into_iter().map(|v| v as i32).collect()
        } else if ty.is_int() {
            self.raw_i32()
        } else if ty == ParamType::Bool {
            self.raw_i32().into_iter().map(|v| i32::from(v != 0)).collect()
        } else {
            Vec::new()
        }
    }

    pub fn to_bools(&self) -> Vec<bool> {
        let ty = self.param_type;
        if ty.is_float() {
            self.raw_f32().into_iter().map(|v| v != 0.0).collect()
        } else if ty.is_int() || ty == ParamType::Bool {
            self.raw_i32().into_iter().map(|v| v != 0).collect()
        } else {
            Vec::new()
        }
    }

    /// The string value, or empty if the declared type is not `string`.
    pub fn to_text(&self) -> String {
        if self.param_type != ParamType::String {
            return String::new();
        }
        let end = self
            .data
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.data.len());
        String::from_utf8_lossy(&self.data[..end]).into_owned()
    }

    pub fn first_float(&self) -> Option<f32> {
        self.to_floats().first().copied()
    }

    pub fn first_int(&self) -> Option<i32> {
        self.to_ints().first().copied()
    }

    pub fn first_bool(&self) -> Option<bool> {
        self.to_bools().first().copied()
    }
}
