use crate::filter::FrameState;

/// Uniforms whose values come from the filter rather than from settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    ViewProj,
    UvOffset,
    UvScale,
    UvPixelInterval,
    ElapsedTime,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ViewProj" => Some(Builtin::ViewProj),
            "uv_offset" => Some(Builtin::UvOffset),
            "uv_scale" => Some(Builtin::UvScale),
            "uv_pixel_interval" => Some(Builtin::UvPixelInterval),
            "elapsed_time" => Some(Builtin::ElapsedTime),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::ViewProj => "ViewProj",
            Builtin::UvOffset => "uv_offset",
            Builtin::UvScale => "uv_scale",
            Builtin::UvPixelInterval => "uv_pixel_interval",
            Builtin::ElapsedTime => "elapsed_time",
        }
    }

    /// Current value, component by component.
    pub fn values(self, state: &FrameState) -> Vec<f32> {
        match self {
            Builtin::ViewProj => state.view_proj.to_cols_array().to_vec(),
            Builtin::UvOffset => state.uv_offset.to_array().to_vec(),
            Builtin::UvScale => state.uv_scale.to_array().to_vec(),
            Builtin::UvPixelInterval => state.uv_pixel_interval.to_array().to_vec(),
            Builtin::ElapsedTime => vec![state.elapsed_time],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for b in [
            Builtin::ViewProj,
            Builtin::UvOffset,
            Builtin::UvScale,
            Builtin::UvPixelInterval,
            Builtin::ElapsedTime,
        ] {
            assert_eq!(Builtin::from_name(b.name()), Some(b));
        }
        assert_eq!(Builtin::from_name("viewproj"), None);
    }

    #[test]
    fn values_follow_frame_state() {
        let mut state = FrameState::default();
        state.advance(0.25);
        state.apply_geometry(200, 100);
        assert_eq!(Builtin::ElapsedTime.values(&state), vec![0.25]);
        assert_eq!(Builtin::UvScale.values(&state), vec![1.0, 1.0]);
        assert_eq!(Builtin::ViewProj.values(&state).len(), 16);
    }
}
