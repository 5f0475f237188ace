use tracing::{debug_span, trace};

use crate::decode::{BlockType, ExternalKind, Opcode, ValueType};
use crate::module::{Callable, Module};
use crate::resolve::{BlockId, BlockKind, Instruction, ResolvedFunction};

use super::error::{ExecutionError, Trap};
use super::frame::Frame;
use super::value::Value;

/// Executes functions of one decoded, resolved [`Module`]. Stateless beyond
/// the module reference: every call starts a fresh [`Frame`], and Rust's own
/// call stack carries the return address across nested `call`s, rather than
/// the explicit return-address stack a non-recursive host would need.
pub struct Interpreter<'m> {
	module: &'m Module,
}

impl<'m> Interpreter<'m> {
	pub fn new(module: &'m Module) -> Self {
		Interpreter { module }
	}

	pub fn run_exported(&self, name: &str, args: &[String]) -> Result<Option<Value>, ExecutionError> {
		let export =
			self.module.exports.get(name).ok_or_else(|| ExecutionError::UnknownExport(name.to_string()))?;
		if export.kind != ExternalKind::Function {
			return Err(ExecutionError::UnknownExport(name.to_string()));
		}
		let func_type = self.module.func_type(export.index).ok_or_else(|| {
			ExecutionError::FunctionIndexOutOfRange { index: export.index, len: self.module.functions.len() }
		})?;
		if args.len() != func_type.params.len() {
			return Err(ExecutionError::ArgArityMismatch {
				name: name.to_string(),
				expected: func_type.params.len(),
				got: args.len(),
			});
		}
		let mut coerced = Vec::with_capacity(args.len());
		for (i, (raw, value_type)) in args.iter().zip(func_type.params.iter()).enumerate() {
			coerced.push(coerce_arg(i, raw, *value_type)?);
		}
		Ok(self.run(export.index, coerced)?)
	}

	/// Executes one function. `params` become the first locals; declared
	/// locals are zero-initialized after them.
	pub fn run(&self, func_idx: u32, params: Vec<Value>) -> Result<Option<Value>, Trap> {
		let function = match self.module.functions.get(func_idx as usize) {
			Some(Callable::Defined(f)) => f,
			// Imports and out-of-range indices have no runnable body in this
			// crate's scope; treated as the same reserved extension point as
			// call_indirect/host calls.
			_ => return Err(Trap::Unimplemented(Opcode::Call)),
		};
		let _span = debug_span!("function", func_idx).entered();

		let mut locals = params;
		locals.reserve(function.locals.len());
		for value_type in &function.locals {
			locals.push(Value::zero_of(*value_type));
		}
		let mut frame = Frame::new(locals);
		let body = &function.body;

		let mut ip: usize = 0;
		while ip < body.instructions.len() {
			let instr = &body.instructions[ip];
			trace!("executing Instruction::{:?}", instr);
			match instr {
				Instruction::Unreachable => return Err(Trap::Unreachable),
				Instruction::Nop => {}

				Instruction::Block(_) | Instruction::Loop(_) => {
					frame.block_heights.push(frame.operand_stack.len());
				}
				Instruction::If(id) => {
					let cond = pop_i32(&mut frame)?;
					frame.block_heights.push(frame.operand_stack.len());
					if cond == 0 {
						let block = body.block(*id);
						ip = match block.else_idx {
							Some(else_idx) => else_idx + 1,
							None => block.end,
						};
						continue;
					}
				}
				Instruction::Else(id) => {
					ip = body.block(*id).end;
					continue;
				}
				Instruction::End(id) => {
					let jump = close_block(&mut frame, body, *id)?;
					if let Some(start) = jump {
						ip = start;
						continue;
					}
				}
				Instruction::Br(id) => {
					ip = branch_to(&mut frame, body, *id)?;
					continue;
				}
				Instruction::BrIf(id) => {
					if pop_i32(&mut frame)? != 0 {
						ip = branch_to(&mut frame, body, *id)?;
						continue;
					}
				}
				Instruction::BrTable(_) => return Err(Trap::Unimplemented(Opcode::BrTable)),
				Instruction::Return => {
					ip = branch_to(&mut frame, body, BlockId(0))?;
					continue;
				}
				Instruction::Call(func_idx) => {
					let param_count = self
						.module
						.func_type(*func_idx)
						.ok_or(Trap::Unimplemented(Opcode::Call))?
						.params
						.len();
					let mut args = Vec::with_capacity(param_count);
					for _ in 0..param_count {
						args.push(frame.pop().ok_or(Trap::StackUnderflow)?);
					}
					// Popped in top-of-stack-first order, i.e. last-declared-param
					// first; reverse once to restore declared (first-param-first)
					// order before calling.
					args.reverse();
					if let Some(result) = self.run(*func_idx, args)? {
						frame.push(result);
					}
				}
				Instruction::CallIndirect { .. } => {
					return Err(Trap::Unimplemented(Opcode::CallIndirect))
				}

				Instruction::Drop => return Err(Trap::Unimplemented(Opcode::Drop)),
				Instruction::Select => return Err(Trap::Unimplemented(Opcode::Select)),

				Instruction::LocalGet(idx) => {
					let value = *frame.locals.get(*idx as usize).ok_or(Trap::StackUnderflow)?;
					frame.push(value);
				}
				Instruction::LocalSet(idx) => {
					let value = frame.pop().ok_or(Trap::StackUnderflow)?;
					let slot = frame.locals.get_mut(*idx as usize).ok_or(Trap::StackUnderflow)?;
					*slot = value;
				}
				Instruction::LocalTee(idx) => {
					let value = *frame.operand_stack.last().ok_or(Trap::StackUnderflow)?;
					let slot = frame.locals.get_mut(*idx as usize).ok_or(Trap::StackUnderflow)?;
					*slot = value;
				}
				Instruction::GlobalGet(_) => return Err(Trap::Unimplemented(Opcode::GlobalGet)),
				Instruction::GlobalSet(_) => return Err(Trap::Unimplemented(Opcode::GlobalSet)),

				Instruction::MemoryLoad(op, _) => return Err(Trap::Unimplemented(*op)),
				Instruction::MemoryStore(op, _) => return Err(Trap::Unimplemented(*op)),
				Instruction::MemorySize => return Err(Trap::Unimplemented(Opcode::MemorySize)),
				Instruction::MemoryGrow => return Err(Trap::Unimplemented(Opcode::MemoryGrow)),

				Instruction::I32Const(v) => frame.push(Value::I32(*v)),
				Instruction::I64Const(v) => frame.push(Value::I64(*v)),
				Instruction::F32Const(v) => frame.push(Value::F32(*v)),
				Instruction::F64Const(v) => frame.push(Value::F64(*v)),

				Instruction::Compare(op) => {
					let result = if Value::is_unary_compare(*op) {
						let a = frame.pop().ok_or(Trap::StackUnderflow)?;
						Value::compare(*op, a, a)?
					} else {
						let b = frame.pop().ok_or(Trap::StackUnderflow)?;
						let a = frame.pop().ok_or(Trap::StackUnderflow)?;
						Value::compare(*op, a, b)?
					};
					frame.push(result);
				}
				Instruction::Numeric(op) => {
					let result = if Value::is_unary_numeric(*op) {
						let a = frame.pop().ok_or(Trap::StackUnderflow)?;
						Value::unary(*op, a)?
					} else {
						let b = frame.pop().ok_or(Trap::StackUnderflow)?;
						let a = frame.pop().ok_or(Trap::StackUnderflow)?;
						Value::binary(*op, a, b)?
					};
					frame.push(result);
				}
				Instruction::Convert(op) => {
					let a = frame.pop().ok_or(Trap::StackUnderflow)?;
					frame.push(Value::convert(*op, a)?);
				}
			}
			ip += 1;
		}

		let func_type = self.module.types.get(function.type_idx as usize);
		match func_type.map(|t| t.results.len()).unwrap_or(0) {
			0 => Ok(None),
			_ => Ok(Some(frame.pop().ok_or(Trap::StackUnderflow)?)),
		}
	}
}

fn pop_i32(frame: &mut Frame) -> Result<i32, Trap> {
	match frame.pop().ok_or(Trap::StackUnderflow)? {
		Value::I32(v) => Ok(v),
		other => Err(Trap::TypeMismatch { expected: ValueType::I32, got: other.value_type() }),
	}
}

/// Performs the stack correction for a block that is closing (truncate to
/// its entry height, retaining a result value if its block type declares
/// one). Returns `Some(start)` if the block is a loop being naturally
/// reached (its own `end`, not a branch) — the main loop restarts there —
/// or `None` for a normal close (control falls through to the next
/// instruction).
fn close_block(frame: &mut Frame, body: &ResolvedFunction, id: BlockId) -> Result<Option<usize>, Trap> {
	let block = body.block(id);
	let depth = block.depth as usize;
	let kind = block.kind;
	let start = block.start;
	let keep_result = !matches!(block.block_type, BlockType::Empty);

	let entry_height = *frame.block_heights.get(depth).ok_or(Trap::StackUnderflow)?;
	let result = if keep_result { Some(frame.pop().ok_or(Trap::StackUnderflow)?) } else { None };
	frame.block_heights.truncate(depth);
	frame.truncate_to(entry_height);
	if let Some(value) = result {
		frame.push(value);
	}

	Ok(if kind == BlockKind::Loop { Some(start) } else { None })
}

/// Resolves a `br`/`br_if`/`return` target: truncates the operand stack and
/// block-height stack back to the target block's entry height (retaining a
/// result value if the block type calls for one), and returns the
/// instruction index to jump to — the block's start for a `loop` target
/// (falling through a loop's own `end` and branching out of it both restart
/// it; only a branch to an *enclosing* block actually exits one), or one past
/// its `end` otherwise. The `+ 1` matters: this function already did the
/// block's close (unlike the fallthrough path, which relies on the `end`
/// instruction itself to call `close_block`), so landing on the `end`
/// instruction here would close the same block a second time.
fn branch_to(frame: &mut Frame, body: &ResolvedFunction, id: BlockId) -> Result<usize, Trap> {
	let block = body.block(id);
	let depth = block.depth as usize;
	let kind = block.kind;
	let start = block.start;
	let end = block.end;
	let keep_result = !matches!(block.block_type, BlockType::Empty);

	let entry_height = *frame.block_heights.get(depth).ok_or(Trap::StackUnderflow)?;
	let result = if keep_result { Some(frame.pop().ok_or(Trap::StackUnderflow)?) } else { None };
	frame.block_heights.truncate(depth);
	frame.truncate_to(entry_height);
	if let Some(value) = result {
		frame.push(value);
	}

	Ok(if kind == BlockKind::Loop { start } else { end + 1 })
}

fn coerce_arg(index: usize, raw: &str, expected: ValueType) -> Result<Value, ExecutionError> {
	let parse_err = || ExecutionError::ArgParseError { index, value: raw.to_string(), expected };
	Ok(match expected {
		ValueType::I32 => Value::I32(raw.parse().map_err(|_| parse_err())?),
		ValueType::I64 => Value::I64(raw.parse().map_err(|_| parse_err())?),
		ValueType::F32 => Value::F32(raw.parse().map_err(|_| parse_err())?),
		ValueType::F64 => Value::F64(raw.parse().map_err(|_| parse_err())?),
	})
}

#[cfg(test)]
mod tests {
	use crate::decode::test_support::{build_module, Body, Sig};
	use crate::decode::ValueType::{F64, I32};
	use crate::module::Module;

	use super::*;

	fn call(bytes: &[u8], export: &str, args: &[&str]) -> Result<Option<Value>, ExecutionError> {
		let module = Module::decode(bytes).expect("module decodes");
		let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
		Interpreter::new(&module).run_exported(export, &args)
	}

	#[test]
	fn identity_returns_its_argument() {
		let bytes = build_module(
			&[Sig(vec![I32], vec![I32])],
			&[Body(0, vec![], vec![0x20, 0x00, 0x0B])], // local.get 0; end
			&[("id", 0)],
		);
		assert_eq!(call(&bytes, "id", &["42"]).unwrap(), Some(Value::I32(42)));
	}

	/// `acc = 1; loop { if n == 0 { break }; acc *= n; n -= 1 }`, exiting the
	/// loop via `br_if 1` to an enclosing block — the idiom this crate's
	/// "a loop's own `end` always restarts it" rule requires for a bounded
	/// loop, since `br 0`/fallthrough inside the loop always continues it.
	fn factorial_module() -> Vec<u8> {
		#[rustfmt::skip]
		let code = vec![
			0x41, 0x01,       // i32.const 1
			0x21, 0x01,       // local.set 1         (acc = 1)
			0x02, 0x40,       // block
			0x03, 0x40,       //   loop
			0x20, 0x00,       //     local.get 0     (n)
			0x45,             //     i32.eqz
			0x0D, 0x01,       //     br_if 1         (n == 0 -> exit to block)
			0x20, 0x01,       //     local.get 1     (acc)
			0x20, 0x00,       //     local.get 0     (n)
			0x6C,             //     i32.mul
			0x21, 0x01,       //     local.set 1     (acc *= n)
			0x20, 0x00,       //     local.get 0
			0x41, 0x01,       //     i32.const 1
			0x6B,             //     i32.sub
			0x21, 0x00,       //     local.set 0     (n -= 1)
			0x0C, 0x00,       //     br 0            (continue loop)
			0x0B,             //   end (loop)
			0x0B,             // end (block)
			0x20, 0x01,       // local.get 1         (acc)
			0x0B,             // end (function)
		];
		build_module(&[Sig(vec![I32], vec![I32])], &[Body(0, vec![I32], code)], &[("fact", 0)])
	}

	#[test]
	fn factorial_of_five_is_120() {
		let bytes = factorial_module();
		assert_eq!(call(&bytes, "fact", &["5"]).unwrap(), Some(Value::I32(120)));
	}

	#[test]
	fn factorial_of_zero_is_one() {
		let bytes = factorial_module();
		assert_eq!(call(&bytes, "fact", &["0"]).unwrap(), Some(Value::I32(1)));
	}

	/// `if n < 2 { n } else { fib(n - 1) + fib(n - 2) }`.
	fn fibonacci_module() -> Vec<u8> {
		#[rustfmt::skip]
		let code = vec![
			0x20, 0x00,       // local.get 0
			0x41, 0x02,       // i32.const 2
			0x48,             // i32.lt_s
			0x04, 0x7F,       // if (result i32)
			0x20, 0x00,       //   local.get 0
			0x05,             // else
			0x20, 0x00,       //   local.get 0
			0x41, 0x01,       //   i32.const 1
			0x6B,             //   i32.sub
			0x10, 0x00,       //   call 0
			0x20, 0x00,       //   local.get 0
			0x41, 0x02,       //   i32.const 2
			0x6B,             //   i32.sub
			0x10, 0x00,       //   call 0
			0x6A,             //   i32.add
			0x0B,             // end (if)
			0x0B,             // end (function)
		];
		build_module(&[Sig(vec![I32], vec![I32])], &[Body(0, vec![], code)], &[("fib", 0)])
	}

	#[test]
	fn fibonacci_base_cases() {
		let bytes = fibonacci_module();
		assert_eq!(call(&bytes, "fib", &["0"]).unwrap(), Some(Value::I32(0)));
		assert_eq!(call(&bytes, "fib", &["1"]).unwrap(), Some(Value::I32(1)));
	}

	#[test]
	fn fibonacci_of_ten_is_fifty_five() {
		let bytes = fibonacci_module();
		assert_eq!(call(&bytes, "fib", &["10"]).unwrap(), Some(Value::I32(55)));
	}

	/// Nested `if`/`else`, each producing an `i32` result on its own block.
	fn sign_module() -> Vec<u8> {
		#[rustfmt::skip]
		let code = vec![
			0x20, 0x00,       // local.get 0
			0x45,             // i32.eqz
			0x04, 0x7F,       // if (result i32)
			0x41, 0x00,       //   i32.const 0
			0x05,             // else
			0x20, 0x00,       //   local.get 0
			0x41, 0x00,       //   i32.const 0
			0x48,             //   i32.lt_s
			0x04, 0x7F,       //   if (result i32)
			0x41, 0x7F,       //     i32.const -1
			0x05,             //   else
			0x41, 0x01,       //     i32.const 1
			0x0B,             //   end (inner if)
			0x0B,             // end (outer if)
			0x0B,             // end (function)
		];
		build_module(&[Sig(vec![I32], vec![I32])], &[Body(0, vec![], code)], &[("sign", 0)])
	}

	#[test]
	fn sign_of_negative_zero_and_positive() {
		let bytes = sign_module();
		assert_eq!(call(&bytes, "sign", &["-7"]).unwrap(), Some(Value::I32(-1)));
		assert_eq!(call(&bytes, "sign", &["0"]).unwrap(), Some(Value::I32(0)));
		assert_eq!(call(&bytes, "sign", &["7"]).unwrap(), Some(Value::I32(1)));
	}

	#[test]
	fn hypot_sq_computes_sum_of_squares() {
		#[rustfmt::skip]
		let code = vec![
			0x20, 0x00,       // local.get 0 (a)
			0x20, 0x00,       // local.get 0 (a)
			0xA2,             // f64.mul
			0x20, 0x01,       // local.get 1 (b)
			0x20, 0x01,       // local.get 1 (b)
			0xA2,             // f64.mul
			0xA0,             // f64.add
			0x0B,             // end
		];
		let bytes = build_module(&[Sig(vec![F64, F64], vec![F64])], &[Body(0, vec![], code)], &[("hypot_sq", 0)]);
		assert_eq!(call(&bytes, "hypot_sq", &["3.0", "4.0"]).unwrap(), Some(Value::F64(25.0)));
	}

	#[test]
	fn division_by_zero_traps() {
		#[rustfmt::skip]
		let code = vec![
			0x20, 0x00, // local.get 0 (a)
			0x20, 0x01, // local.get 1 (b)
			0x6D,       // i32.div_s
			0x0B,       // end
		];
		let bytes = build_module(&[Sig(vec![I32, I32], vec![I32])], &[Body(0, vec![], code)], &[("div", 0)]);
		let err = call(&bytes, "div", &["10", "0"]).unwrap_err();
		assert!(matches!(err, ExecutionError::Trap(Trap::DivByZero)));
	}

	#[test]
	fn unknown_export_is_reported() {
		let bytes = factorial_module();
		let err = call(&bytes, "nonexistent", &[]).unwrap_err();
		assert!(matches!(err, ExecutionError::UnknownExport(_)));
	}

	#[test]
	fn arity_mismatch_is_reported() {
		let bytes = factorial_module();
		let err = call(&bytes, "fact", &[]).unwrap_err();
		assert!(matches!(err, ExecutionError::ArgArityMismatch { .. }));
	}
}
