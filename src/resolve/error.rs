use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
	#[error("else at instruction {0} has no matching if")]
	ElseWithoutIf(usize),

	#[error("if at instruction {0} has more than one else")]
	DuplicateElse(usize),

	#[error("end at instruction {0} has no matching block opener")]
	UnmatchedEnd(usize),

	#[error("function body ends with {0} block(s) still open")]
	UnclosedBlocks(usize),

	#[error("branch at instruction {instr} targets depth {depth}, but only {available} blocks enclose it")]
	BranchDepthOutOfRange { instr: usize, depth: u32, available: u32 },
}
