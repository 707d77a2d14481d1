use glam::{Mat4, Vec2};

use crate::error::ExpressionError;
use crate::expr::{Environment, Expression};

/// Per-edge canvas expansion in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResizeAmounts {
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Left,
    Right,
    Top,
    Bottom,
}

impl Edge {
    pub const ALL: [Edge; 4] = [Edge::Left, Edge::Right, Edge::Top, Edge::Bottom];

    /// Annotation carrying this edge's expression.
    pub fn annotation(self) -> &'static str {
        match self {
            Edge::Left => "resize_expr_left",
            Edge::Right => "resize_expr_right",
            Edge::Top => "resize_expr_top",
            Edge::Bottom => "resize_expr_bottom",
        }
    }

    fn index(self) -> usize {
        match self {
            Edge::Left => 0,
            Edge::Right => 1,
            Edge::Top => 2,
            Edge::Bottom => 3,
        }
    }
}

/// The four optional resize expressions. The first parameter to declare an
/// edge's expression owns it for the generation.
#[derive(Debug, Clone, Default)]
pub struct ResizeExpressions {
    exprs: [Expression; 4],
}

impl ResizeExpressions {
    pub fn clear(&mut self) {
        self.exprs = Default::default();
    }

    pub fn get(&self, edge: Edge) -> &Expression {
        &self.exprs[edge.index()]
    }

    /// Set `edge`'s text unless an earlier declaration already claimed it.
    pub fn claim(&mut self, edge: Edge, text: &str) -> bool {
        let slot = &mut self.exprs[edge.index()];
        if !slot.is_empty() || text.trim().is_empty() {
            return false;
        }
        *slot = Expression::new(text);
        true
    }

    pub fn compile(&mut self, env: &Environment) -> Vec<(Edge, ExpressionError)> {
        let mut errors = Vec::new();
        for edge in Edge::ALL {
            let expr = &mut self.exprs[edge.index()];
            if expr.is_empty() {
                continue;
            }
            if let Err(e) = expr.compile(env) {
                log::warn!("{} failed to compile: {e}", edge.annotation());
                errors.push((edge, e));
            }
        }
        errors
    }

    /// Evaluate compiled edges into `amounts`, truncating to whole pixels.
    /// Edges without a compiled expression keep their current amount.
    pub fn evaluate(&self, amounts: &mut ResizeAmounts) {
        let targets = [
            &mut amounts.left,
            &mut amounts.right,
            &mut amounts.top,
            &mut amounts.bottom,
        ];
        for (expr, target) in self.exprs.iter().zip(targets) {
            if expr.is_compiled() {
                *target = expr.evaluate(f64::from(*target)) as i32;
            }
        }
    }
}

/// Frame-global values the built-in uniforms read from.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameState {
    pub elapsed_time: f32,
    pub base_width: u32,
    pub base_height: u32,
    pub total_width: u32,
    pub total_height: u32,
    pub resize: ResizeAmounts,
    pub uv_offset: Vec2,
    pub uv_scale: Vec2,
    pub uv_pixel_interval: Vec2,
    pub view_proj: Mat4,
}

impl Default for FrameState {
    fn default() -> Self {
        Self {
            elapsed_time: 0.0,
            base_width: 0,
            base_height: 0,
            total_width: 0,
            total_height: 0,
            resize: ResizeAmounts::default(),
            uv_offset: Vec2::ZERO,
            uv_scale: Vec2::ONE,
            uv_pixel_interval: Vec2::ZERO,
            view_proj: Mat4::IDENTITY,
        }
    }
}

impl FrameState {
    pub fn advance(&mut self, seconds: f32) {
        self.elapsed_time += seconds;
    }

    /// Derive output size and UV transform from the upstream base size and
    /// the current resize amounts.
    pub fn apply_geometry(&mut self, base_width: u32, base_height: u32) {
        let r = self.resize;
        self.base_width = base_width;
        self.base_height = base_height;

        let total_w = i64::from(r.left) + i64::from(base_width) + i64::from(r.right);
        let total_h = i64::from(r.top) + i64::from(base_height) + i64::from(r.bottom);
        self.total_width = total_w.clamp(0, i64::from(u32::MAX)) as u32;
        self.total_height = total_h.clamp(0, i64::from(u32::MAX)) as u32;

        if base_width == 0 || base_height == 0 {
            self.uv_scale = Vec2::ONE;
            self.uv_offset = Vec2::ZERO;
            self.uv_pixel_interval = Vec2::ZERO;
        } else {
            let base = Vec2::new(base_width as f32, base_height as f32);
            self.uv_scale = Vec2::new(self.total_width as f32, self.total_height as f32) / base;
            self.uv_offset = Vec2::new(-(r.left as f32), -(r.top as f32)) / base;
            self.uv_pixel_interval = Vec2::ONE / base;
        }

        self.view_proj = Mat4::orthographic_rh(
            0.0,
            self.total_width.max(1) as f32,
            self.total_height.max(1) as f32,
            0.0,
            -100.0,
            100.0,
        );
    }
}
