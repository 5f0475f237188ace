use thiserror::Error;

use crate::decode::{Opcode, ValueType};

/// A runtime trap: unwinds every active frame immediately. The interpreter
/// never catches a trap mid-flight; it propagates straight out of `run`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Trap {
	#[error("unreachable instruction executed")]
	Unreachable,

	#[error("division by zero")]
	DivByZero,

	#[error("integer overflow")]
	IntegerOverflow,

	#[error("expected {expected:?} on the operand stack, got {got:?}")]
	TypeMismatch { expected: ValueType, got: ValueType },

	#[error("operand stack underflow")]
	StackUnderflow,

	#[error("{0:?} is a reserved extension point with no implemented semantics")]
	Unimplemented(Opcode),
}

#[derive(Debug, Error)]
pub enum ExecutionError {
	#[error("no export named {0:?}")]
	UnknownExport(String),

	#[error("export {name:?} expects {expected} argument(s), got {got}")]
	ArgArityMismatch { name: String, expected: usize, got: usize },

	#[error("could not parse argument {index} ({value:?}) as {expected:?}")]
	ArgParseError { index: usize, value: String, expected: ValueType },

	#[error("function index {index} out of range (module defines {len} functions)")]
	FunctionIndexOutOfRange { index: u32, len: usize },

	#[error(transparent)]
	Trap(#[from] Trap),
}
