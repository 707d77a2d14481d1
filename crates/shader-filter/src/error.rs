use thiserror::Error;

/// The shader program failed to build. The filter renders as a pass-through
/// until the next reload.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("{line}:{column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },
}

/// A per-component expression failed to parse. The message is shown as the
/// tooltip of the disabled control.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message} (at offset {offset})")]
pub struct ExpressionError {
    pub offset: usize,
    pub message: String,
}

impl ExpressionError {
    pub fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

/// A GPU texture, decoded image or rendered source could not be produced.
/// Treated as "no texture bound" for the frame.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResourceError {
    #[error("failed to load image {path}: {message}")]
    Image { path: String, message: String },
    #[error("failed to create {width}x{height} texture: {message}")]
    Texture {
        width: u32,
        height: u32,
        message: String,
    },
    #[error("source '{0}' is unavailable")]
    SourceUnavailable(String),
    #[error("source '{0}' has zero size")]
    EmptySource(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_display_has_position() {
        let e = CompileError::Syntax {
            line: 3,
            column: 7,
            message: "expected ';'".into(),
        };
        assert_eq!(e.to_string(), "3:7: expected ';'");
    }

    #[test]
    fn expression_error_display() {
        let e = ExpressionError::new(3, "unexpected end of expression");
        assert_eq!(e.to_string(), "unexpected end of expression (at offset 3)");
    }
}
