use super::value::Value;

/// Per-call activation state: indexed locals (parameters first, then
/// zero-initialized declared locals), a LIFO operand stack, and the stack of
/// operand-stack heights captured on entry to each currently-open block.
#[derive(Debug, Default)]
pub struct Frame {
	pub locals: Vec<Value>,
	pub operand_stack: Vec<Value>,
	pub block_heights: Vec<usize>,
}

impl Frame {
	pub fn new(locals: Vec<Value>) -> Self {
		// Seeded with the function body's own (implicit, depth-0) entry
		// height, so the stack-height lookup at every block depth — including
		// the outer one closed by the function's own final `end` — finds an
		// entry without a depth-0 special case.
		Frame { locals, operand_stack: Vec::new(), block_heights: vec![0] }
	}

	pub fn push(&mut self, value: Value) {
		self.operand_stack.push(value);
	}

	pub fn pop(&mut self) -> Option<Value> {
		self.operand_stack.pop()
	}

	pub fn truncate_to(&mut self, height: usize) {
		self.operand_stack.truncate(height);
	}
}
