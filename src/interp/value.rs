use crate::decode::{Opcode, ValueType};

use super::error::Trap;

/// A stack slot or local: one of the four primitive WASM value types, stored
/// bit-exact. Signedness is a property of the operation, not of this type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
	I32(i32),
	I64(i64),
	F32(f32),
	F64(f64),
}

impl Value {
	pub fn value_type(&self) -> ValueType {
		match self {
			Value::I32(_) => ValueType::I32,
			Value::I64(_) => ValueType::I64,
			Value::F32(_) => ValueType::F32,
			Value::F64(_) => ValueType::F64,
		}
	}

	pub fn zero_of(value_type: ValueType) -> Value {
		match value_type {
			ValueType::I32 => Value::I32(0),
			ValueType::I64 => Value::I64(0),
			ValueType::F32 => Value::F32(0.0),
			ValueType::F64 => Value::F64(0.0),
		}
	}

	fn as_i32(self) -> Result<i32, Trap> {
		match self {
			Value::I32(v) => Ok(v),
			other => Err(Trap::TypeMismatch { expected: ValueType::I32, got: other.value_type() }),
		}
	}

	fn as_i64(self) -> Result<i64, Trap> {
		match self {
			Value::I64(v) => Ok(v),
			other => Err(Trap::TypeMismatch { expected: ValueType::I64, got: other.value_type() }),
		}
	}

	fn as_f32(self) -> Result<f32, Trap> {
		match self {
			Value::F32(v) => Ok(v),
			other => Err(Trap::TypeMismatch { expected: ValueType::F32, got: other.value_type() }),
		}
	}

	fn as_f64(self) -> Result<f64, Trap> {
		match self {
			Value::F64(v) => Ok(v),
			other => Err(Trap::TypeMismatch { expected: ValueType::F64, got: other.value_type() }),
		}
	}

	/// Whether `op` (an `Instruction::Numeric` payload) pops one operand
	/// rather than two.
	pub fn is_unary_numeric(op: Opcode) -> bool {
		use Opcode::*;
		matches!(
			op,
			I32Clz
				| I32Ctz
				| I32Popcnt
				| I64Clz
				| I64Ctz
				| I64Popcnt
				| F32Abs
				| F32Neg
				| F32Ceil
				| F32Floor
				| F32Trunc
				| F32Nearest
				| F32Sqrt
				| F64Abs
				| F64Neg
				| F64Ceil
				| F64Floor
				| F64Trunc
				| F64Nearest
				| F64Sqrt
		)
	}

	pub fn unary(op: Opcode, a: Value) -> Result<Value, Trap> {
		use Opcode::*;
		Ok(match op {
			I32Clz => Value::I32(a.as_i32()?.leading_zeros() as i32),
			I32Ctz => Value::I32(a.as_i32()?.trailing_zeros() as i32),
			I32Popcnt => Value::I32(a.as_i32()?.count_ones() as i32),
			I64Clz => Value::I64(a.as_i64()?.leading_zeros() as i64),
			I64Ctz => Value::I64(a.as_i64()?.trailing_zeros() as i64),
			I64Popcnt => Value::I64(a.as_i64()?.count_ones() as i64),
			F32Abs => Value::F32(a.as_f32()?.abs()),
			F32Neg => Value::F32(-a.as_f32()?),
			F32Ceil => Value::F32(a.as_f32()?.ceil()),
			F32Floor => Value::F32(a.as_f32()?.floor()),
			F32Trunc => Value::F32(a.as_f32()?.trunc()),
			F32Nearest => Value::F32(round_ties_even_f32(a.as_f32()?)),
			F32Sqrt => Value::F32(a.as_f32()?.sqrt()),
			F64Abs => Value::F64(a.as_f64()?.abs()),
			F64Neg => Value::F64(-a.as_f64()?),
			F64Ceil => Value::F64(a.as_f64()?.ceil()),
			F64Floor => Value::F64(a.as_f64()?.floor()),
			F64Trunc => Value::F64(a.as_f64()?.trunc()),
			F64Nearest => Value::F64(round_ties_even_f64(a.as_f64()?)),
			F64Sqrt => Value::F64(a.as_f64()?.sqrt()),
			other => return Err(Trap::Unimplemented(other)),
		})
	}

	/// Binary numeric op. `a` is the left (first-pushed) operand, `b` the
	/// right (popped off the top).
	pub fn binary(op: Opcode, a: Value, b: Value) -> Result<Value, Trap> {
		use Opcode::*;
		Ok(match op {
			I32Add => Value::I32(a.as_i32()?.wrapping_add(b.as_i32()?)),
			I32Sub => Value::I32(a.as_i32()?.wrapping_sub(b.as_i32()?)),
			I32Mul => Value::I32(a.as_i32()?.wrapping_mul(b.as_i32()?)),
			I32DivS => {
				let (a, b) = (a.as_i32()?, b.as_i32()?);
				if b == 0 {
					return Err(Trap::DivByZero);
				}
				if a == i32::MIN && b == -1 {
					return Err(Trap::IntegerOverflow);
				}
				Value::I32(a.wrapping_div(b))
			}
			I32DivU => {
				let (a, b) = (a.as_i32()? as u32, b.as_i32()? as u32);
				if b == 0 {
					return Err(Trap::DivByZero);
				}
				Value::I32((a / b) as i32)
			}
			I32RemS => {
				let (a, b) = (a.as_i32()?, b.as_i32()?);
				if b == 0 {
					return Err(Trap::DivByZero);
				}
				Value::I32(a.wrapping_rem(b))
			}
			I32RemU => {
				let (a, b) = (a.as_i32()? as u32, b.as_i32()? as u32);
				if b == 0 {
					return Err(Trap::DivByZero);
				}
				Value::I32((a % b) as i32)
			}
			I32And => Value::I32(a.as_i32()? & b.as_i32()?),
			I32Or => Value::I32(a.as_i32()? | b.as_i32()?),
			I32Xor => Value::I32(a.as_i32()? ^ b.as_i32()?),
			I32Shl => Value::I32(a.as_i32()?.wrapping_shl(b.as_i32()? as u32 & 31)),
			I32ShrS => Value::I32(a.as_i32()?.wrapping_shr(b.as_i32()? as u32 & 31)),
			I32ShrU => Value::I32(((a.as_i32()? as u32).wrapping_shr(b.as_i32()? as u32 & 31)) as i32),

			I64Add => Value::I64(a.as_i64()?.wrapping_add(b.as_i64()?)),
			I64Sub => Value::I64(a.as_i64()?.wrapping_sub(b.as_i64()?)),
			I64Mul => Value::I64(a.as_i64()?.wrapping_mul(b.as_i64()?)),
			I64DivS => {
				let (a, b) = (a.as_i64()?, b.as_i64()?);
				if b == 0 {
					return Err(Trap::DivByZero);
				}
				if a == i64::MIN && b == -1 {
					return Err(Trap::IntegerOverflow);
				}
				Value::I64(a.wrapping_div(b))
			}
			I64DivU => {
				let (a, b) = (a.as_i64()? as u64, b.as_i64()? as u64);
				if b == 0 {
					return Err(Trap::DivByZero);
				}
				Value::I64((a / b) as i64)
			}
			I64RemS => {
				let (a, b) = (a.as_i64()?, b.as_i64()?);
				if b == 0 {
					return Err(Trap::DivByZero);
				}
				Value::I64(a.wrapping_rem(b))
			}
			I64RemU => {
				let (a, b) = (a.as_i64()? as u64, b.as_i64()? as u64);
				if b == 0 {
					return Err(Trap::DivByZero);
				}
				Value::I64((a % b) as i64)
			}
			I64And => Value::I64(a.as_i64()? & b.as_i64()?),
			I64Or => Value::I64(a.as_i64()? | b.as_i64()?),
			I64Xor => Value::I64(a.as_i64()? ^ b.as_i64()?),
			I64Shl => Value::I64(a.as_i64()?.wrapping_shl(b.as_i64()? as u32 & 63)),
			I64ShrS => Value::I64(a.as_i64()?.wrapping_shr(b.as_i64()? as u32 & 63)),
			I64ShrU => Value::I64(((a.as_i64()? as u64).wrapping_shr(b.as_i64()? as u32 & 63)) as i64),

			F32Add => Value::F32(a.as_f32()? + b.as_f32()?),
			F32Sub => Value::F32(a.as_f32()? - b.as_f32()?),
			F32Mul => Value::F32(a.as_f32()? * b.as_f32()?),
			F32Div => Value::F32(a.as_f32()? / b.as_f32()?),
			F32Min => Value::F32(nan_propagating_min_f32(a.as_f32()?, b.as_f32()?)),
			F32Max => Value::F32(nan_propagating_max_f32(a.as_f32()?, b.as_f32()?)),
			F32Copysign => Value::F32(a.as_f32()?.copysign(b.as_f32()?)),

			F64Add => Value::F64(a.as_f64()? + b.as_f64()?),
			F64Sub => Value::F64(a.as_f64()? - b.as_f64()?),
			F64Mul => Value::F64(a.as_f64()? * b.as_f64()?),
			F64Div => Value::F64(a.as_f64()? / b.as_f64()?),
			F64Min => Value::F64(nan_propagating_min_f64(a.as_f64()?, b.as_f64()?)),
			F64Max => Value::F64(nan_propagating_max_f64(a.as_f64()?, b.as_f64()?)),
			F64Copysign => Value::F64(a.as_f64()?.copysign(b.as_f64()?)),

			other => return Err(Trap::Unimplemented(other)),
		})
	}

	/// Comparison op; always produces an `i32` `0`/`1`. Unsigned-specific
	/// integer comparisons (`*LtU`/`*GtU`/`*LeU`/`*GeU`) are a reserved
	/// extension point.
	pub fn compare(op: Opcode, a: Value, b: Value) -> Result<Value, Trap> {
		use Opcode::*;
		let result = match op {
			I32Eqz => a.as_i32()? == 0,
			I32Eq => a.as_i32()? == b.as_i32()?,
			I32Ne => a.as_i32()? != b.as_i32()?,
			I32LtS => a.as_i32()? < b.as_i32()?,
			I32GtS => a.as_i32()? > b.as_i32()?,
			I32LeS => a.as_i32()? <= b.as_i32()?,
			I32GeS => a.as_i32()? >= b.as_i32()?,

			I64Eqz => a.as_i64()? == 0,
			I64Eq => a.as_i64()? == b.as_i64()?,
			I64Ne => a.as_i64()? != b.as_i64()?,
			I64LtS => a.as_i64()? < b.as_i64()?,
			I64GtS => a.as_i64()? > b.as_i64()?,
			I64LeS => a.as_i64()? <= b.as_i64()?,
			I64GeS => a.as_i64()? >= b.as_i64()?,

			F32Eq => a.as_f32()? == b.as_f32()?,
			F32Ne => a.as_f32()? != b.as_f32()?,
			F32Lt => a.as_f32()? < b.as_f32()?,
			F32Gt => a.as_f32()? > b.as_f32()?,
			F32Le => a.as_f32()? <= b.as_f32()?,
			F32Ge => a.as_f32()? >= b.as_f32()?,

			F64Eq => a.as_f64()? == b.as_f64()?,
			F64Ne => a.as_f64()? != b.as_f64()?,
			F64Lt => a.as_f64()? < b.as_f64()?,
			F64Gt => a.as_f64()? > b.as_f64()?,
			F64Le => a.as_f64()? <= b.as_f64()?,
			F64Ge => a.as_f64()? >= b.as_f64()?,

			other => return Err(Trap::Unimplemented(other)),
		};
		Ok(Value::I32(result as i32))
	}

	/// Whether `op` (an `Instruction::Compare` payload) pops one operand
	/// rather than two. Only the `eqz` family is unary.
	pub fn is_unary_compare(op: Opcode) -> bool {
		matches!(op, Opcode::I32Eqz | Opcode::I64Eqz)
	}

	/// Type conversion. Only `wrap_i64` and the sign-/zero-extending no-op
	/// promotions are implemented; truncation, float<->int conversion,
	/// demotion/promotion, and bit reinterpretation are reserved extension
	/// points.
	pub fn convert(op: Opcode, a: Value) -> Result<Value, Trap> {
		use Opcode::*;
		Ok(match op {
			I32WrapI64 => Value::I32(a.as_i64()? as i32),
			I64ExtendI32S => Value::I64(a.as_i32()? as i64),
			I64ExtendI32U => Value::I64((a.as_i32()? as u32) as i64),
			I32Extend8S => Value::I32(a.as_i32()? as i8 as i32),
			I32Extend16S => Value::I32(a.as_i32()? as i16 as i32),
			I64Extend8S => Value::I64(a.as_i64()? as i8 as i64),
			I64Extend16S => Value::I64(a.as_i64()? as i16 as i64),
			I64Extend32S => Value::I64(a.as_i64()? as i32 as i64),
			other => return Err(Trap::Unimplemented(other)),
		})
	}
}

/// Round-half-to-even: `f32::round` rounds half away from zero, so ties need
/// a separate path.
fn round_ties_even_f32(x: f32) -> f32 {
	let rounded = x.round();
	if (x - x.trunc()).abs() == 0.5 && (rounded as i64) % 2 != 0 {
		rounded - x.signum()
	} else {
		rounded
	}
}

fn round_ties_even_f64(x: f64) -> f64 {
	let rounded = x.round();
	if (x - x.trunc()).abs() == 0.5 && (rounded as i64) % 2 != 0 {
		rounded - x.signum()
	} else {
		rounded
	}
}

fn nan_propagating_min_f32(a: f32, b: f32) -> f32 {
	if a.is_nan() || b.is_nan() {
		f32::NAN
	} else {
		a.min(b)
	}
}

fn nan_propagating_max_f32(a: f32, b: f32) -> f32 {
	if a.is_nan() || b.is_nan() {
		f32::NAN
	} else {
		a.max(b)
	}
}

fn nan_propagating_min_f64(a: f64, b: f64) -> f64 {
	if a.is_nan() || b.is_nan() {
		f64::NAN
	} else {
		a.min(b)
	}
}

fn nan_propagating_max_f64(a: f64, b: f64) -> f64 {
	if a.is_nan() || b.is_nan() {
		f64::NAN
	} else {
		a.max(b)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn i32_add_wraps() {
		let result = Value::binary(Opcode::I32Add, Value::I32(i32::MAX), Value::I32(1)).unwrap();
		assert_eq!(result, Value::I32(i32::MIN));
	}

	#[test]
	fn i32_shl_masks_count_to_five_bits() {
		let by_33 = Value::binary(Opcode::I32Shl, Value::I32(1), Value::I32(33)).unwrap();
		let by_1 = Value::binary(Opcode::I32Shl, Value::I32(1), Value::I32(1)).unwrap();
		assert_eq!(by_33, Value::I32(2));
		assert_eq!(by_1, Value::I32(2));
	}

	#[test]
	fn div_by_zero_traps() {
		let err = Value::binary(Opcode::I32DivS, Value::I32(10), Value::I32(0)).unwrap_err();
		assert_eq!(err, Trap::DivByZero);
	}

	#[test]
	fn i32_div_u_treats_operands_as_unsigned() {
		let result = Value::binary(Opcode::I32DivU, Value::I32(-1), Value::I32(2)).unwrap();
		// -1 as u32 is u32::MAX; u32::MAX / 2 == 0x7FFF_FFFF
		assert_eq!(result, Value::I32(0x7FFF_FFFF));
	}

	#[test]
	fn float_min_max_propagate_nan() {
		let min = Value::binary(Opcode::F64Min, Value::F64(1.0), Value::F64(f64::NAN)).unwrap();
		match min {
			Value::F64(v) => assert!(v.is_nan()),
			_ => panic!("expected F64"),
		}
	}

	#[test]
	fn unsigned_comparisons_are_unimplemented() {
		let err = Value::compare(Opcode::I32LtU, Value::I32(1), Value::I32(2)).unwrap_err();
		assert_eq!(err, Trap::Unimplemented(Opcode::I32LtU));
	}

	#[test]
	fn rotations_are_unimplemented() {
		let err = Value::binary(Opcode::I32Rotl, Value::I32(1), Value::I32(1)).unwrap_err();
		assert_eq!(err, Trap::Unimplemented(Opcode::I32Rotl));
	}
}
