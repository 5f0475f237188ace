use std::io;
use std::rc::Rc;

use tracing::trace;

use crate::byte_source::ByteSource;

use super::error::DecodeError;
use super::types::*;

const MAGIC: u32 = 0x6D73_6100;
const SUPPORTED_VERSION: u32 = 0x0000_0001;

/// Walks a module's sections and instruction streams, producing a [`RawModule`].
///
/// Owns its own scratch state (`types`) per instance; nothing here is shared
/// across decoder runs, so decoding two modules back to back never leaks state
/// between them.
pub struct Decoder<R> {
	bytes: ByteSource<R>,
	module: RawModule,
}

impl<R: io::Read> Decoder<R> {
	pub fn decode(reader: R) -> Result<RawModule, DecodeError> {
		let decoder = Decoder { bytes: ByteSource::new(reader), module: RawModule::default() };
		decoder.decode_module()
	}

	fn decode_module(mut self) -> Result<RawModule, DecodeError> {
		self.parse_preamble()?;
		while !self.bytes.is_eof()? {
			self.parse_section()?;
		}
		Ok(self.module)
	}

	fn parse_preamble(&mut self) -> Result<(), DecodeError> {
		let magic = self.bytes.read_u32()?;
		if magic != MAGIC {
			return Err(DecodeError::BadMagic { expected: MAGIC, got: magic });
		}
		let version = self.bytes.read_u32()?;
		if version != SUPPORTED_VERSION {
			return Err(DecodeError::UnsupportedVersion { expected: SUPPORTED_VERSION, got: version });
		}
		Ok(())
	}

	fn read_string(&mut self) -> Result<String, DecodeError> {
		let len = self.bytes.read_uleb(32)? as usize;
		let bytes = self.bytes.read_bytes(len)?;
		Ok(String::from_utf8(bytes)?)
	}

	fn read_value_type(&mut self) -> Result<ValueType, DecodeError> {
		let byte = self.bytes.read_u8()?;
		ValueType::try_from(byte).map_err(|_| DecodeError::BadValueType(byte))
	}

	fn read_block_type(&mut self) -> Result<BlockType, DecodeError> {
		// Block type is a signed LEB7; 0x40 ("no result") is the only negative
		// encoding in v1, every value-type byte decodes as a positive LEB7.
		let byte = self.bytes.read_u8()?;
		if byte == 0x40 {
			return Ok(BlockType::Empty);
		}
		ValueType::try_from(byte).map(BlockType::Value).map_err(|_| DecodeError::BadBlockType(byte))
	}

	fn read_limits(&mut self) -> Result<Limits, DecodeError> {
		let flag = self.bytes.read_u8()?;
		let kind = LimitKind::try_from(flag).map_err(|e| DecodeError::BadLimitKind(flag, e))?;
		let min = self.bytes.read_uleb(32)? as u32;
		let max = match kind {
			LimitKind::Min => None,
			LimitKind::MinMax => Some(self.bytes.read_uleb(32)? as u32),
		};
		Ok(Limits { min, max })
	}

	/// A constant expression: one constant-producing opcode followed by `end`.
	fn read_init_expr(&mut self) -> Result<InitExpr, DecodeError> {
		let opcode_byte = self.bytes.read_u8()?;
		let opcode = Opcode::try_from(opcode_byte).map_err(|e| DecodeError::UnknownOpcode(opcode_byte, e))?;
		let expr = match opcode {
			Opcode::I32Const => InitExpr::I32(self.bytes.read_sleb(32)? as i32),
			Opcode::I64Const => InitExpr::I64(self.bytes.read_sleb(64)?),
			Opcode::F32Const => {
				let bits = self.bytes.read_u32()?;
				InitExpr::F32(f32::from_bits(bits))
			}
			Opcode::F64Const => {
				let bits = self.bytes.read_u64()?;
				InitExpr::F64(f64::from_bits(bits))
			}
			Opcode::GlobalGet => InitExpr::GlobalGet(self.bytes.read_uleb(32)? as u32),
			other => return Err(DecodeError::BadInitExpr(other)),
		};
		let end = self.bytes.read_u8()?;
		if end != Opcode::End as u8 {
			return Err(DecodeError::BadInitExpr(opcode));
		}
		Ok(expr)
	}

	fn parse_function_type(&mut self) -> Result<FuncType, DecodeError> {
		let form = self.bytes.read_u8()?;
		if form != FUNC_TYPE_FORM {
			return Err(DecodeError::BadValueType(form));
		}
		let num_params = self.bytes.read_uleb(32)? as usize;
		let mut params = Vec::with_capacity(num_params);
		for _ in 0..num_params {
			params.push(self.read_value_type()?);
		}
		let num_results = self.bytes.read_uleb(1)? as usize;
		let mut results = Vec::with_capacity(num_results);
		for _ in 0..num_results {
			results.push(self.read_value_type()?);
		}
		Ok(FuncType { params, results })
	}

	fn with_section_bounds<T>(
		&mut self,
		section: SectionId,
		declared_len: u64,
		body: impl FnOnce(&mut Self) -> Result<T, DecodeError>,
	) -> Result<T, DecodeError> {
		let start_offset = self.bytes.offset();
		let result = body(self)?;
		let consumed = (self.bytes.offset() - start_offset) as u64;
		if consumed != declared_len {
			return Err(DecodeError::SectionLenMismatch { section, start_offset, declared: declared_len, consumed });
		}
		Ok(result)
	}

	fn parse_type_section(&mut self, declared_len: u64) -> Result<(), DecodeError> {
		self.with_section_bounds(SectionId::Type, declared_len, |this| {
			let count = this.bytes.read_uleb(32)? as usize;
			trace!(count, "parsing type section");
			this.module.types = Vec::with_capacity(count);
			for _ in 0..count {
				let func_type = this.parse_function_type()?;
				this.module.types.push(Rc::new(func_type));
			}
			Ok(())
		})
	}

	fn parse_import_section(&mut self, declared_len: u64) -> Result<(), DecodeError> {
		self.with_section_bounds(SectionId::Import, declared_len, |this| {
			let count = this.bytes.read_uleb(32)? as usize;
			trace!(count, "parsing import section");
			for _ in 0..count {
				let module = this.read_string()?;
				let field = this.read_string()?;
				let kind_byte = this.bytes.read_u8()?;
				let kind = ExternalKind::try_from(kind_byte).map_err(|e| DecodeError::BadExternalKind(kind_byte, e))?;
				let desc = match kind {
					ExternalKind::Function => ImportDesc::Function(this.bytes.read_uleb(32)? as u32),
					ExternalKind::Table => {
						let _elem_type = this.bytes.read_u8()?;
						ImportDesc::Table(TableType { limits: this.read_limits()? })
					}
					ExternalKind::Memory => ImportDesc::Memory(MemoryType { limits: this.read_limits()? }),
					ExternalKind::Global => {
						let value_type = this.read_value_type()?;
						let mutable = this.bytes.read_u8()? != 0;
						ImportDesc::Global { value_type, mutable }
					}
				};
				this.module.imports.push(Import { module, field, desc });
			}
			Ok(())
		})
	}

	fn parse_function_section(&mut self, declared_len: u64) -> Result<(), DecodeError> {
		self.with_section_bounds(SectionId::Function, declared_len, |this| {
			let count = this.bytes.read_uleb(32)? as usize;
			trace!(count, "parsing function section");
			this.module.function_type_idx.reserve(count);
			for _ in 0..count {
				let type_idx = this.bytes.read_uleb(32)? as u32;
				if type_idx as usize >= this.module.types.len() {
					return Err(DecodeError::TypeIndexOutOfRange { index: type_idx, len: this.module.types.len() });
				}
				this.module.function_type_idx.push(type_idx);
			}
			Ok(())
		})
	}

	fn parse_table_section(&mut self, declared_len: u64) -> Result<(), DecodeError> {
		self.with_section_bounds(SectionId::Table, declared_len, |this| {
			let count = this.bytes.read_uleb(32)? as usize;
			for _ in 0..count {
				let _elem_type = this.bytes.read_u8()?;
				let limits = this.read_limits()?;
				this.module.tables.push(TableType { limits });
			}
			Ok(())
		})
	}

	fn parse_memory_section(&mut self, declared_len: u64) -> Result<(), DecodeError> {
		self.with_section_bounds(SectionId::Memory, declared_len, |this| {
			let count = this.bytes.read_uleb(32)? as usize;
			for _ in 0..count {
				let limits = this.read_limits()?;
				this.module.memories.push(MemoryType { limits });
			}
			Ok(())
		})
	}

	fn parse_global_section(&mut self, declared_len: u64) -> Result<(), DecodeError> {
		self.with_section_bounds(SectionId::Global, declared_len, |this| {
			let count = this.bytes.read_uleb(32)? as usize;
			for _ in 0..count {
				let value_type = this.read_value_type()?;
				let mutable = this.bytes.read_u8()? != 0;
				let init = this.read_init_expr()?;
				this.module.globals.push(GlobalDef { value_type, mutable, init });
			}
			Ok(())
		})
	}

	fn parse_export_section(&mut self, declared_len: u64) -> Result<(), DecodeError> {
		self.with_section_bounds(SectionId::Export, declared_len, |this| {
			let count = this.bytes.read_uleb(32)? as usize;
			trace!(count, "parsing export section");
			for _ in 0..count {
				let name = this.read_string()?;
				let kind_byte = this.bytes.read_u8()?;
				let kind = ExternalKind::try_from(kind_byte).map_err(|e| DecodeError::BadExternalKind(kind_byte, e))?;
				let index = this.bytes.read_uleb(32)? as u32;
				this.module.exports.insert(name, ExportDesc { kind, index });
			}
			Ok(())
		})
	}

	fn parse_start_section(&mut self, declared_len: u64) -> Result<(), DecodeError> {
		self.with_section_bounds(SectionId::Start, declared_len, |this| {
			this.module.start = Some(this.bytes.read_uleb(32)? as u32);
			Ok(())
		})
	}

	fn parse_element_section(&mut self, declared_len: u64) -> Result<(), DecodeError> {
		self.with_section_bounds(SectionId::Element, declared_len, |this| {
			let count = this.bytes.read_uleb(32)? as usize;
			for _ in 0..count {
				let table_index = this.bytes.read_uleb(32)? as u32;
				let offset = this.read_init_expr()?;
				let num_funcs = this.bytes.read_uleb(32)? as usize;
				let mut func_indices = Vec::with_capacity(num_funcs);
				for _ in 0..num_funcs {
					func_indices.push(this.bytes.read_uleb(32)? as u32);
				}
				this.module.elements.push(ElementSegment { table_index, offset, func_indices });
			}
			Ok(())
		})
	}

	fn parse_data_section(&mut self, declared_len: u64) -> Result<(), DecodeError> {
		self.with_section_bounds(SectionId::Data, declared_len, |this| {
			let count = this.bytes.read_uleb(32)? as usize;
			for _ in 0..count {
				let memory_index = this.bytes.read_uleb(32)? as u32;
				let offset = this.read_init_expr()?;
				let size = this.bytes.read_uleb(32)? as usize;
				let data = this.bytes.read_bytes(size)?;
				this.module.data.push(DataSegment { memory_index, offset, data });
			}
			Ok(())
		})
	}

	fn parse_memarg(&mut self) -> Result<MemArg, DecodeError> {
		Ok(MemArg { align: self.bytes.read_uleb(32)? as u32, offset: self.bytes.read_uleb(32)? as u32 })
	}

	/// Reads one flat instruction stream up to (and including) its matching
	/// top-level `end`. Nested `block`/`loop`/`if` bodies stay in the same flat
	/// vector; the block resolver gives them structure in a second pass.
	fn parse_instructions(&mut self) -> Result<Vec<RawInstruction>, DecodeError> {
		let mut instructions = Vec::new();
		let mut depth: u32 = 0;
		loop {
			let opcode_byte = self.bytes.read_u8()?;
			let opcode = Opcode::try_from(opcode_byte).map_err(|e| DecodeError::UnknownOpcode(opcode_byte, e))?;
			let instr = self.parse_one_instruction(opcode)?;
			match opcode {
				Opcode::Block | Opcode::Loop | Opcode::If => depth += 1,
				Opcode::End if depth == 0 => {
					instructions.push(instr);
					break;
				}
				Opcode::End => depth -= 1,
				_ => {}
			}
			instructions.push(instr);
		}
		Ok(instructions)
	}

	fn parse_one_instruction(&mut self, opcode: Opcode) -> Result<RawInstruction, DecodeError> {
		use Opcode::*;
		let instr = match opcode {
			Unreachable => RawInstruction::Unreachable,
			Nop => RawInstruction::Nop,
			Block => RawInstruction::Block(self.read_block_type()?),
			Loop => RawInstruction::Loop(self.read_block_type()?),
			If => RawInstruction::If(self.read_block_type()?),
			Else => RawInstruction::Else,
			End => RawInstruction::End,
			Br => RawInstruction::Br(self.bytes.read_uleb(32)? as u32),
			BrIf => RawInstruction::BrIf(self.bytes.read_uleb(32)? as u32),
			BrTable => {
				let count = self.bytes.read_uleb(32)? as usize;
				let mut targets = Vec::with_capacity(count);
				for _ in 0..count {
					targets.push(self.bytes.read_uleb(32)? as u32);
				}
				let default = self.bytes.read_uleb(32)? as u32;
				RawInstruction::BrTable(super::types::BrTable { targets, default })
			}
			Return => RawInstruction::Return,
			Call => RawInstruction::Call(self.bytes.read_uleb(32)? as u32),
			CallIndirect => {
				let type_idx = self.bytes.read_uleb(32)? as u32;
				let table_idx = self.bytes.read_uleb(1)? as u32;
				RawInstruction::CallIndirect { type_idx, table_idx }
			}
			Drop => RawInstruction::Drop,
			Select => RawInstruction::Select,
			LocalGet => RawInstruction::LocalGet(self.bytes.read_uleb(32)? as u32),
			LocalSet => RawInstruction::LocalSet(self.bytes.read_uleb(32)? as u32),
			LocalTee => RawInstruction::LocalTee(self.bytes.read_uleb(32)? as u32),
			GlobalGet => RawInstruction::GlobalGet(self.bytes.read_uleb(32)? as u32),
			GlobalSet => RawInstruction::GlobalSet(self.bytes.read_uleb(32)? as u32),
			I32Load | I64Load | F32Load | F64Load | I32Load8S | I32Load8U | I32Load16S | I32Load16U | I64Load8S
			| I64Load8U | I64Load16S | I64Load16U | I64Load32S | I64Load32U => {
				RawInstruction::MemoryLoad(opcode, self.parse_memarg()?)
			}
			I32Store | I64Store | F32Store | F64Store | I32Store8 | I32Store16 | I64Store8 | I64Store16
			| I64Store32 => RawInstruction::MemoryStore(opcode, self.parse_memarg()?),
			MemorySize => {
				let _reserved = self.bytes.read_uleb(1)?;
				RawInstruction::MemorySize
			}
			MemoryGrow => {
				let _reserved = self.bytes.read_uleb(1)?;
				RawInstruction::MemoryGrow
			}
			I32Const => RawInstruction::I32Const(self.bytes.read_sleb(32)? as i32),
			I64Const => RawInstruction::I64Const(self.bytes.read_sleb(64)?),
			F32Const => RawInstruction::F32Const(f32::from_bits(self.bytes.read_u32()?)),
			F64Const => RawInstruction::F64Const(f64::from_bits(self.bytes.read_u64()?)),
			I32Eqz | I32Eq | I32Ne | I32LtS | I32LtU | I32GtS | I32GtU | I32LeS | I32LeU | I32GeS | I32GeU
			| I64Eqz | I64Eq | I64Ne | I64LtS | I64LtU | I64GtS | I64GtU | I64LeS | I64LeU | I64GeS | I64GeU
			| F32Eq | F32Ne | F32Lt | F32Gt | F32Le | F32Ge | F64Eq | F64Ne | F64Lt | F64Gt | F64Le | F64Ge => {
				RawInstruction::Compare(opcode)
			}
			I32Clz | I32Ctz | I32Popcnt | I32Add | I32Sub | I32Mul | I32DivS | I32DivU | I32RemS | I32RemU
			| I32And | I32Or | I32Xor | I32Shl | I32ShrS | I32ShrU | I32Rotl | I32Rotr | I64Clz | I64Ctz
			| I64Popcnt | I64Add | I64Sub | I64Mul | I64DivS | I64DivU | I64RemS | I64RemU | I64And | I64Or
			| I64Xor | I64Shl | I64ShrS | I64ShrU | I64Rotl | I64Rotr | F32Abs | F32Neg | F32Ceil | F32Floor
			| F32Trunc | F32Nearest | F32Sqrt | F32Add | F32Sub | F32Mul | F32Div | F32Min | F32Max
			| F32Copysign | F64Abs | F64Neg | F64Ceil | F64Floor | F64Trunc | F64Nearest | F64Sqrt | F64Add
			| F64Sub | F64Mul | F64Div | F64Min | F64Max | F64Copysign => RawInstruction::Numeric(opcode),
			I32WrapI64 | I32TruncF32S | I32TruncF32U | I32TruncF64S | I32TruncF64U | I64ExtendI32S
			| I64ExtendI32U | I64TruncF32S | I64TruncF32U | I64TruncF64S | I64TruncF64U | F32ConvertI32S
			| F32ConvertI32U | F32ConvertI64S | F32ConvertI64U | F32DemoteF64 | F64ConvertI32S | F64ConvertI32U
			| F64ConvertI64S | F64ConvertI64U | F64PromoteF32 | I32ReinterpretF32 | I64ReinterpretF64
			| F32ReinterpretI32 | F64ReinterpretI64 | I32Extend8S | I32Extend16S | I64Extend8S | I64Extend16S
			| I64Extend32S => RawInstruction::Convert(opcode),
		};
		Ok(instr)
	}

	fn parse_locals(&mut self) -> Result<Vec<ValueType>, DecodeError> {
		let num_decls = self.bytes.read_uleb(32)? as usize;
		let mut locals = Vec::new();
		for _ in 0..num_decls {
			let count = self.bytes.read_uleb(32)? as usize;
			let value_type = self.read_value_type()?;
			locals.extend(std::iter::repeat(value_type).take(count));
		}
		Ok(locals)
	}

	fn parse_code_section(&mut self, declared_len: u64) -> Result<(), DecodeError> {
		self.with_section_bounds(SectionId::Code, declared_len, |this| {
			let count = this.bytes.read_uleb(32)? as usize;
			trace!(count, "parsing code section");
			for _ in 0..count {
				let body_size = this.bytes.read_uleb(32)? as u64;
				let body_start = this.bytes.offset();
				let locals = this.parse_locals()?;
				let instructions = this.parse_instructions()?;
				let consumed = (this.bytes.offset() - body_start) as u64;
				if consumed != body_size {
					return Err(DecodeError::SectionLenMismatch {
						section: SectionId::Code,
						start_offset: body_start,
						declared: body_size,
						consumed,
					});
				}
				this.module.code.push(RawFunctionBody { locals, instructions });
			}
			Ok(())
		})
	}

	fn parse_name_custom_section(&mut self, declared_len: u64) -> Result<NameSection, DecodeError> {
		let start_offset = self.bytes.offset();
		let mut name_section = NameSection::default();
		while (self.bytes.offset() - start_offset) < declared_len as usize {
			let subsection_id = self.bytes.read_uleb(7)? as u8;
			let subsection_len = self.bytes.read_uleb(32)? as usize;
			match subsection_id {
				0 => name_section.module_name = Some(self.read_string()?),
				1 => {
					let count = self.bytes.read_uleb(32)? as usize;
					for _ in 0..count {
						let index = self.bytes.read_uleb(32)? as u32;
						let name = self.read_string()?;
						name_section.function_names.insert(index, name);
					}
				}
				2 => {
					let count = self.bytes.read_uleb(32)? as usize;
					for _ in 0..count {
						let func_index = self.bytes.read_uleb(32)? as u32;
						let local_count = self.bytes.read_uleb(32)? as usize;
						let mut locals = std::collections::HashMap::new();
						for _ in 0..local_count {
							let local_index = self.bytes.read_uleb(32)? as u32;
							let name = self.read_string()?;
							locals.insert(local_index, name);
						}
						name_section.local_names.insert(func_index, locals);
					}
				}
				_ => {
					// Unrecognized name subsection: skip its payload verbatim.
					self.bytes.read_bytes(subsection_len)?;
				}
			}
		}
		Ok(name_section)
	}

	fn parse_section(&mut self) -> Result<(), DecodeError> {
		let section_id_byte = self.bytes.read_uleb(7)? as u8;
		let section_id =
			SectionId::try_from(section_id_byte).map_err(|e| DecodeError::UnknownSectionId(section_id_byte, e))?;
		let payload_len = self.bytes.read_uleb(32)?;
		trace!(?section_id, payload_len, "parsing section");

		if section_id == SectionId::Custom {
			let name_len_start = self.bytes.offset();
			let name = self.read_string()?;
			let name_bytes_len = (self.bytes.offset() - name_len_start) as u64;
			let payload_data_len = payload_len - name_bytes_len;
			if name == "name" {
				let name_section = self.parse_name_custom_section(payload_data_len)?;
				self.module.name_section = Some(name_section);
			} else {
				let data = self.bytes.read_bytes(payload_data_len as usize)?;
				self.module.custom_sections.push(CustomSection { name, data });
			}
			return Ok(());
		}

		match section_id {
			SectionId::Type => self.parse_type_section(payload_len),
			SectionId::Import => self.parse_import_section(payload_len),
			SectionId::Function => self.parse_function_section(payload_len),
			SectionId::Table => self.parse_table_section(payload_len),
			SectionId::Memory => self.parse_memory_section(payload_len),
			SectionId::Global => self.parse_global_section(payload_len),
			SectionId::Export => self.parse_export_section(payload_len),
			SectionId::Start => self.parse_start_section(payload_len),
			SectionId::Element => self.parse_element_section(payload_len),
			SectionId::Code => self.parse_code_section(payload_len),
			SectionId::Data => self.parse_data_section(payload_len),
			SectionId::Custom => unreachable!("handled above"),
		}
	}
}

// The `form` byte preceding a function type's signature is always 0x60.
const FUNC_TYPE_FORM: u8 = 0x60;

/// Byte-vector builders for hand-assembled minimal modules, shared by this
/// module's own decoder tests and by the interpreter's end-to-end scenario
/// tests (`crate::interp::interpreter::tests`) — a handful of bytes is
/// cheaper and more direct than shipping `.wasm` fixture files for a
/// byte-level format.
#[cfg(test)]
pub(crate) mod test_support {
	use super::{ValueType, FUNC_TYPE_FORM};

	pub(crate) fn uleb(mut v: u64) -> Vec<u8> {
		let mut out = Vec::new();
		loop {
			let byte = (v & 0x7f) as u8;
			v >>= 7;
			if v == 0 {
				out.push(byte);
				break;
			}
			out.push(byte | 0x80);
		}
		out
	}

	pub(crate) fn sleb(mut v: i64) -> Vec<u8> {
		let mut out = Vec::new();
		loop {
			let byte = (v & 0x7f) as u8;
			v >>= 7;
			let sign_bit_set = byte & 0x40 != 0;
			if (v == 0 && !sign_bit_set) || (v == -1 && sign_bit_set) {
				out.push(byte);
				break;
			}
			out.push(byte | 0x80);
		}
		out
	}

	fn section(id: u8, payload: Vec<u8>) -> Vec<u8> {
		let mut out = vec![id];
		out.extend(uleb(payload.len() as u64));
		out.extend(payload);
		out
	}

	/// One function signature: parameter and result value types.
	pub(crate) struct Sig(pub Vec<ValueType>, pub Vec<ValueType>);

	/// One function body: its (already-assigned) type index, its declared
	/// locals beyond the parameters, and its raw instruction bytes (including
	/// the trailing `end`).
	pub(crate) struct Body(pub u32, pub Vec<ValueType>, pub Vec<u8>);

	/// Assembles a minimal module: a type section, a function section, an
	/// export section (one export per body, in order, all function kind), and
	/// a code section. No imports, tables, memories, globals, or data.
	pub(crate) fn build_module(types: &[Sig], bodies: &[Body], exports: &[(&str, u32)]) -> Vec<u8> {
		let mut module = vec![0x00, 0x61, 0x73, 0x6D, 0x01, 0x00, 0x00, 0x00];

		let mut type_payload = uleb(types.len() as u64);
		for Sig(params, results) in types {
			type_payload.push(FUNC_TYPE_FORM);
			type_payload.extend(uleb(params.len() as u64));
			type_payload.extend(params.iter().map(|vt| *vt as u8));
			type_payload.extend(uleb(results.len() as u64));
			type_payload.extend(results.iter().map(|vt| *vt as u8));
		}
		module.extend(section(0x01, type_payload));

		let mut func_payload = uleb(bodies.len() as u64);
		for Body(type_idx, ..) in bodies {
			func_payload.extend(uleb(*type_idx as u64));
		}
		module.extend(section(0x03, func_payload));

		let mut export_payload = uleb(exports.len() as u64);
		for (name, idx) in exports {
			export_payload.extend(uleb(name.len() as u64));
			export_payload.extend(name.as_bytes());
			export_payload.push(0x00); // ExternalKind::Function
			export_payload.extend(uleb(*idx as u64));
		}
		module.extend(section(0x07, export_payload));

		let mut code_payload = uleb(bodies.len() as u64);
		for Body(_, locals, code) in bodies {
			let mut body = uleb(locals.len() as u64);
			for local in locals {
				body.extend(uleb(1));
				body.push(*local as u8);
			}
			body.extend(code);
			code_payload.extend(uleb(body.len() as u64));
			code_payload.extend(body);
		}
		module.extend(section(0x0A, code_payload));

		module
	}
}

#[cfg(test)]
mod tests {
	use super::test_support::{build_module, Body, Sig};
	use super::*;

	#[test]
	fn decodes_preamble_and_rejects_bad_magic() {
		let err = Decoder::decode(&[0x00, 0x00, 0x00, 0x00][..]).unwrap_err();
		assert!(matches!(err, DecodeError::BadMagic { .. }));
	}

	#[test]
	fn decodes_identity_module_end_to_end() {
		let bytes = build_module(
			&[Sig(vec![ValueType::I32], vec![ValueType::I32])],
			&[Body(0, vec![], vec![0x20, 0x00, 0x0B])], // local.get 0; end
			&[("id", 0)],
		);
		let module = Decoder::decode(&bytes[..]).unwrap();
		assert_eq!(module.types.len(), 1);
		assert_eq!(module.code.len(), 1);
		assert_eq!(module.code[0].instructions.len(), 2);
		assert_eq!(module.exports["id"].index, 0);
	}

	#[test]
	fn section_length_mismatch_is_rejected() {
		let mut bytes = build_module(
			&[Sig(vec![], vec![])],
			&[Body(0, vec![], vec![0x0B])], // end
			&[],
		);
		// Corrupt the type section's declared length (byte 9: section id 1 is
		// at offset 8, its LEB length byte at offset 9).
		assert_eq!(bytes[8], 0x01);
		bytes[9] += 1;
		let err = Decoder::decode(&bytes[..]).unwrap_err();
		assert!(matches!(err, DecodeError::SectionLenMismatch { section: SectionId::Type, .. }));
	}

	#[test]
	fn uleb_helper_matches_canonical_encoding() {
		assert_eq!(test_support::uleb(624485), vec![0xE5, 0x8E, 0x26]);
	}

	#[test]
	fn sleb_helper_matches_canonical_encoding() {
		assert_eq!(test_support::sleb(-624485), vec![0x9B, 0xF1, 0x59]);
	}
}
