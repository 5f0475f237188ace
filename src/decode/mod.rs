//! Binary decoding: turns a byte stream into a [`RawModule`] with no
//! cross-references resolved. See [`crate::resolve`] for the next pass.

mod decoder;
mod error;
mod types;

pub use decoder::Decoder;
pub use error::DecodeError;
#[cfg(test)]
pub(crate) use decoder::test_support;
pub use types::{
	BlockType, BrTable, CustomSection, DataSegment, ElementSegment, ExportDesc, ExternalKind, FuncType, GlobalDef,
	Import, ImportDesc, InitExpr, Limits, MemArg, MemoryType, NameSection, Opcode, RawFunctionBody, RawInstruction,
	RawModule, SectionId, TableType, ValueType,
};
