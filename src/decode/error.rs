use crate::byte_source::ByteSourceError;
use num_enum::TryFromPrimitiveError;
use thiserror::Error;

use super::types::{ExternalKind, LimitKind, Opcode, SectionId};

#[derive(Debug, Error)]
pub enum DecodeError {
	#[error("not a WASM module: bad magic number {got:#010x}, expected {expected:#010x}")]
	BadMagic { expected: u32, got: u32 },

	#[error("unsupported version {got}, expected {expected}")]
	UnsupportedVersion { expected: u32, got: u32 },

	#[error("unknown section id {0}: {1}")]
	UnknownSectionId(u8, TryFromPrimitiveError<SectionId>),

	#[error("section {section:?} declared {declared} bytes but {consumed} were read, starting at offset {start_offset}")]
	SectionLenMismatch { section: SectionId, start_offset: usize, declared: u64, consumed: u64 },

	#[error("unknown opcode {0:#04x}: {1}")]
	UnknownOpcode(u8, TryFromPrimitiveError<Opcode>),

	#[error("bad value type byte {0:#04x}")]
	BadValueType(u8),

	#[error("bad block type byte {0:#04x}")]
	BadBlockType(u8),

	#[error("bad external kind byte {0}: {1}")]
	BadExternalKind(u8, TryFromPrimitiveError<ExternalKind>),

	#[error("bad limit kind byte {0}: {1}")]
	BadLimitKind(u8, TryFromPrimitiveError<LimitKind>),

	#[error("function body at index {0} is missing its terminating end opcode")]
	MissingEnd(usize),

	#[error("unsupported init-expression opcode {0:?}")]
	BadInitExpr(Opcode),

	#[error("function type index {index} out of range (module declares {len} types)")]
	TypeIndexOutOfRange { index: u32, len: usize },

	#[error(transparent)]
	ByteSource(#[from] ByteSourceError),

	#[error("invalid UTF-8 in name: {0}")]
	InvalidUtf8(#[from] std::string::FromUtf8Error),
}
