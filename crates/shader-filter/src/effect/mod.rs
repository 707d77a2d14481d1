pub mod param;
pub mod program;
pub mod reflect;
pub mod types;
pub mod value;

pub use param::ParamHandle;
pub use program::{EffectProgram, UniformSlot};
pub use reflect::EffectCompiler;
pub use types::{ParamDescriptor, ParamType};
pub use value::ValueBox;
