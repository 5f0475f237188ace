//! The structured-control-flow interpreter: activation frames, a typed
//! operand stack, and instruction dispatch over a resolved module.

mod error;
mod frame;
mod interpreter;
mod value;

pub use error::{ExecutionError, Trap};
pub use frame::Frame;
pub use interpreter::Interpreter;
pub use value::Value;
