//! A bytecode virtual machine for a stack-based, structured-control-flow
//! binary module format: decode a module, then execute one of its exported
//! functions with caller-supplied arguments.
//!
//! Pipeline: [`byte_source::ByteSource`] → [`decode::Decoder`] → [`Module`] →
//! [`resolve::resolve_function`] (folded into [`Module::decode`]) →
//! [`interp::Interpreter`].

pub mod byte_source;
pub mod decode;
pub mod interp;
mod module;
pub mod resolve;

pub use interp::{ExecutionError, Interpreter, Trap, Value};
pub use module::{Error, Module};
