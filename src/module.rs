//! Top-level module value: the decoder's and resolver's output combined into
//! the shape the interpreter actually runs. Immutable once built, shared
//! (via `&Module`) across every call the interpreter makes.

use std::collections::HashMap;
use std::io;
use std::rc::Rc;

use thiserror::Error;
use tracing::debug_span;

use crate::decode::{
	DecodeError, Decoder, ExportDesc, FuncType, Import, ImportDesc, RawModule, ValueType,
};
use crate::resolve::{resolve_function, ResolveError, ResolvedFunction};

#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Decode(#[from] DecodeError),

	#[error(transparent)]
	Resolve(#[from] ResolveError),
}

/// One function-index-space entry: either a host import (not callable in
/// this crate — see `Interpreter::run`'s `Trap::Unimplemented(Opcode::Call)`
/// fallback for imports) or a defined function with its resolved body.
#[derive(Debug)]
pub enum Callable {
	Import(Import),
	Defined(DefinedFunction),
}

#[derive(Debug)]
pub struct DefinedFunction {
	pub type_idx: u32,
	pub locals: Vec<ValueType>,
	pub body: ResolvedFunction,
}

/// A decoded and block-resolved module, ready to execute.
#[derive(Debug)]
pub struct Module {
	pub types: Vec<Rc<FuncType>>,
	/// Combined function index space: function-kind imports first, in
	/// declaration order, then defined functions.
	pub functions: Vec<Callable>,
	pub exports: HashMap<String, ExportDesc>,
	pub start: Option<u32>,
}

impl Module {
	pub fn decode<R: io::Read>(reader: R) -> Result<Module, Error> {
		let _span = debug_span!("module_decode").entered();
		let raw = Decoder::decode(reader)?;
		Module::from_raw(raw)
	}

	fn from_raw(raw: RawModule) -> Result<Module, Error> {
		let RawModule { types, imports, function_type_idx, exports, start, code, .. } = raw;

		let mut functions = Vec::new();
		for import in imports {
			if matches!(import.desc, ImportDesc::Function(_)) {
				functions.push(Callable::Import(import));
			}
		}
		for (body, type_idx) in code.into_iter().zip(function_type_idx) {
			let result_type = types.get(type_idx as usize).and_then(|t| t.results.first().copied());
			let resolved = resolve_function(&body.instructions, result_type)?;
			functions.push(Callable::Defined(DefinedFunction { type_idx, locals: body.locals, body: resolved }));
		}

		Ok(Module { types, functions, exports, start })
	}

	pub fn func_type(&self, func_idx: u32) -> Option<&FuncType> {
		let type_idx = match self.functions.get(func_idx as usize)? {
			Callable::Import(Import { desc: ImportDesc::Function(idx), .. }) => *idx,
			Callable::Import(_) => return None,
			Callable::Defined(f) => f.type_idx,
		};
		self.types.get(type_idx as usize).map(Rc::as_ref)
	}
}
