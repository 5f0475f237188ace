use crate::decode::{BlockType, BrTable, Opcode};

/// Index into a function's [`super::BlockInfo`] arena. Stable for the
/// lifetime of the resolved function; never reused across functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
	Block,
	Loop,
	If,
}

/// Static metadata about one structured-control block, keyed by [`BlockId`].
/// Lives once per function, shared across every call — nothing here is
/// per-activation; the runtime operand-stack height at block entry is tracked
/// separately, per call, in `Frame::block_heights`.
#[derive(Debug, Clone)]
pub struct BlockInfo {
	pub kind: BlockKind,
	pub block_type: BlockType,
	/// Index, in the resolved instruction stream, of this block's opener.
	pub start: usize,
	/// Index of the matching `else`, for `if` blocks that have one.
	pub else_idx: Option<usize>,
	/// Index of the matching `end`.
	pub end: usize,
	pub parent: Option<BlockId>,
	pub depth: u32,
}

/// A decoded instruction after block resolution: every branch target and
/// block opener refers directly to a [`BlockId`] instead of a raw relative
/// depth, and `call`'s argument order is fixed up front so the interpreter
/// never has to reason about it at call time.
#[derive(Debug, Clone)]
pub enum Instruction {
	Unreachable,
	Nop,
	Block(BlockId),
	Loop(BlockId),
	If(BlockId),
	Else(BlockId),
	End(BlockId),
	Br(BlockId),
	BrIf(BlockId),
	BrTable(BrTable),
	Return,
	Call(u32),
	CallIndirect { type_idx: u32, table_idx: u32 },

	Drop,
	Select,

	LocalGet(u32),
	LocalSet(u32),
	LocalTee(u32),
	GlobalGet(u32),
	GlobalSet(u32),

	MemoryLoad(Opcode, crate::decode::MemArg),
	MemoryStore(Opcode, crate::decode::MemArg),
	MemorySize,
	MemoryGrow,

	I32Const(i32),
	I64Const(i64),
	F32Const(f32),
	F64Const(f64),

	Compare(Opcode),
	Numeric(Opcode),
	Convert(Opcode),
}

/// A function body after resolution: a flat instruction stream plus the
/// block arena its control-flow instructions reference.
#[derive(Debug, Clone, Default)]
pub struct ResolvedFunction {
	pub instructions: Vec<Instruction>,
	pub blocks: Vec<BlockInfo>,
}

impl ResolvedFunction {
	pub fn block(&self, id: BlockId) -> &BlockInfo {
		&self.blocks[id.0 as usize]
	}
}
