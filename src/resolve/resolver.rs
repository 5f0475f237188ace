use tracing::trace;

use crate::decode::{BlockType, RawInstruction, ValueType};

use super::error::ResolveError;
use super::types::{BlockId, BlockInfo, BlockKind, Instruction, ResolvedFunction};

/// Turns one function's flat, pre-resolution instruction stream into a
/// [`ResolvedFunction`]: every block opener gets an arena entry, and every
/// branch or block/else/end instruction refers to that entry's [`BlockId`]
/// instead of a raw relative depth.
///
/// The function body itself is treated as an implicit outer block (this
/// mirrors how a `return` and a branch past the outermost structured block
/// are the same operation) so the body's own terminating `end` resolves like
/// any other block close, with no special case in the interpreter. Its
/// block type carries the function's own result type, so the interpreter's
/// generic "retain a value across this block close if its type isn't empty"
/// logic also covers handing the return value back to the caller.
pub fn resolve_function(raw: &[RawInstruction], result_type: Option<ValueType>) -> Result<ResolvedFunction, ResolveError> {
	let mut blocks = Vec::new();
	let mut instructions = Vec::with_capacity(raw.len());
	let mut open: Vec<BlockId> = Vec::new();

	let outer_block_type = match result_type {
		Some(vt) => BlockType::Value(vt),
		None => BlockType::Empty,
	};
	let outer_id = push_block(&mut blocks, BlockKind::Block, outer_block_type, 0, None, 0);
	open.push(outer_id);

	for (i, raw_instr) in raw.iter().enumerate() {
		let resolved = match raw_instr {
			RawInstruction::Block(block_type) => {
				let parent = *open.last().unwrap();
				let id = push_block(&mut blocks, BlockKind::Block, *block_type, i, Some(parent), open.len() as u32);
				open.push(id);
				Instruction::Block(id)
			}
			RawInstruction::Loop(block_type) => {
				let parent = *open.last().unwrap();
				let id = push_block(&mut blocks, BlockKind::Loop, *block_type, i, Some(parent), open.len() as u32);
				open.push(id);
				Instruction::Loop(id)
			}
			RawInstruction::If(block_type) => {
				let parent = *open.last().unwrap();
				let id = push_block(&mut blocks, BlockKind::If, *block_type, i, Some(parent), open.len() as u32);
				open.push(id);
				Instruction::If(id)
			}
			RawInstruction::Else => {
				let id = *open.last().ok_or(ResolveError::ElseWithoutIf(i))?;
				let info = &mut blocks[id.0 as usize];
				if info.kind != BlockKind::If {
					return Err(ResolveError::ElseWithoutIf(i));
				}
				if info.else_idx.is_some() {
					return Err(ResolveError::DuplicateElse(i));
				}
				info.else_idx = Some(i);
				Instruction::Else(id)
			}
			RawInstruction::End => {
				let id = open.pop().ok_or(ResolveError::UnmatchedEnd(i))?;
				blocks[id.0 as usize].end = i;
				Instruction::End(id)
			}
			RawInstruction::Br(depth) => Instruction::Br(branch_target(&open, *depth, i)?),
			RawInstruction::BrIf(depth) => Instruction::BrIf(branch_target(&open, *depth, i)?),
			RawInstruction::BrTable(table) => Instruction::BrTable(table.clone()),
			RawInstruction::Return => Instruction::Return,
			RawInstruction::Call(idx) => Instruction::Call(*idx),
			RawInstruction::CallIndirect { type_idx, table_idx } => {
				Instruction::CallIndirect { type_idx: *type_idx, table_idx: *table_idx }
			}
			RawInstruction::Drop => Instruction::Drop,
			RawInstruction::Select => Instruction::Select,
			RawInstruction::LocalGet(idx) => Instruction::LocalGet(*idx),
			RawInstruction::LocalSet(idx) => Instruction::LocalSet(*idx),
			RawInstruction::LocalTee(idx) => Instruction::LocalTee(*idx),
			RawInstruction::GlobalGet(idx) => Instruction::GlobalGet(*idx),
			RawInstruction::GlobalSet(idx) => Instruction::GlobalSet(*idx),
			RawInstruction::MemoryLoad(op, arg) => Instruction::MemoryLoad(*op, *arg),
			RawInstruction::MemoryStore(op, arg) => Instruction::MemoryStore(*op, *arg),
			RawInstruction::MemorySize => Instruction::MemorySize,
			RawInstruction::MemoryGrow => Instruction::MemoryGrow,
			RawInstruction::I32Const(v) => Instruction::I32Const(*v),
			RawInstruction::I64Const(v) => Instruction::I64Const(*v),
			RawInstruction::F32Const(v) => Instruction::F32Const(*v),
			RawInstruction::F64Const(v) => Instruction::F64Const(*v),
			RawInstruction::Compare(op) => Instruction::Compare(*op),
			RawInstruction::Numeric(op) => Instruction::Numeric(*op),
			RawInstruction::Convert(op) => Instruction::Convert(*op),
			RawInstruction::Unreachable => Instruction::Unreachable,
			RawInstruction::Nop => Instruction::Nop,
		};
		instructions.push(resolved);
	}

	if !open.is_empty() {
		return Err(ResolveError::UnclosedBlocks(open.len()));
	}

	trace!(instructions = instructions.len(), blocks = blocks.len(), "resolved function body");
	Ok(ResolvedFunction { instructions, blocks })
}

fn push_block(
	blocks: &mut Vec<BlockInfo>,
	kind: BlockKind,
	block_type: BlockType,
	start: usize,
	parent: Option<BlockId>,
	depth: u32,
) -> BlockId {
	let id = BlockId(blocks.len() as u32);
	blocks.push(BlockInfo { kind, block_type, start, else_idx: None, end: 0, parent, depth });
	id
}

/// Resolves a relative branch depth (0 = innermost enclosing block) against
/// the currently-open block stack.
fn branch_target(open: &[BlockId], depth: u32, instr: usize) -> Result<BlockId, ResolveError> {
	let available = open.len() as u32;
	if depth >= available {
		return Err(ResolveError::BranchDepthOutOfRange { instr, depth, available });
	}
	Ok(open[(available - 1 - depth) as usize])
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn flat_function_has_one_implicit_block() {
		let raw = vec![RawInstruction::Nop, RawInstruction::End];
		let resolved = resolve_function(&raw, None).unwrap();
		assert_eq!(resolved.blocks.len(), 1);
		assert_eq!(resolved.blocks[0].start, 0);
		assert_eq!(resolved.blocks[0].end, 1);
	}

	#[test]
	fn nested_block_resolves_to_distinct_ids() {
		let raw = vec![
			RawInstruction::Block(BlockType::Empty),
			RawInstruction::Nop,
			RawInstruction::End,
			RawInstruction::End,
		];
		let resolved = resolve_function(&raw, None).unwrap();
		assert_eq!(resolved.blocks.len(), 2);
		match resolved.instructions[0] {
			Instruction::Block(id) => assert_eq!(id.0, 1),
			_ => panic!("expected Block"),
		}
		assert_eq!(resolved.blocks[1].start, 0);
		assert_eq!(resolved.blocks[1].end, 2);
	}

	#[test]
	fn if_else_end_links_else_to_if_block() {
		let raw = vec![
			RawInstruction::If(BlockType::Empty),
			RawInstruction::Else,
			RawInstruction::End,
			RawInstruction::End,
		];
		let resolved = resolve_function(&raw, None).unwrap();
		let if_block = &resolved.blocks[1];
		assert_eq!(if_block.else_idx, Some(1));
		assert_eq!(if_block.end, 2);
	}

	#[test]
	fn else_without_if_is_rejected() {
		let raw = vec![RawInstruction::Else, RawInstruction::End];
		let err = resolve_function(&raw, None).unwrap_err();
		assert!(matches!(err, ResolveError::ElseWithoutIf(0)));
	}

	#[test]
	fn branch_depth_out_of_range_is_rejected() {
		let raw = vec![RawInstruction::Br(5), RawInstruction::End];
		let err = resolve_function(&raw, None).unwrap_err();
		assert!(matches!(err, ResolveError::BranchDepthOutOfRange { instr: 0, depth: 5, .. }));
	}

	#[test]
	fn br_zero_targets_innermost_block() {
		let raw = vec![
			RawInstruction::Block(BlockType::Empty),
			RawInstruction::Br(0),
			RawInstruction::End,
			RawInstruction::End,
		];
		let resolved = resolve_function(&raw, None).unwrap();
		match resolved.instructions[1] {
			Instruction::Br(id) => assert_eq!(id.0, 1),
			_ => panic!("expected Br"),
		}
	}

	#[test]
	fn br_targeting_function_body_reaches_outer_block() {
		let raw = vec![
			RawInstruction::Block(BlockType::Empty),
			RawInstruction::Br(1),
			RawInstruction::End,
			RawInstruction::End,
		];
		let resolved = resolve_function(&raw, None).unwrap();
		match resolved.instructions[1] {
			Instruction::Br(id) => assert_eq!(id.0, 0),
			_ => panic!("expected Br"),
		}
	}
}
