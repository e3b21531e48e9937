//! Error taxonomy for the fspec core and front end.
//!
//! Bytecode contract violations, allocation failures, and filter failures
//! are fatal (the interpreter has no recovery path). Unknown filter names
//! and short reads are not represented here at all: they are handled in
//! place (a warning log and a continue, or a clean end-of-input signal).

use crate::frontend::error::ParseError;

/// Result type used throughout the core and front end.
pub type FspecResult<T> = Result<T, FspecError>;

#[derive(Debug, thiserror::Error)]
pub enum FspecError {
    #[error("unknown opcode byte {0:#x}")]
    UnknownOpcode(u8),

    #[error("unknown argument tag byte {0:#x}")]
    UnknownArgTag(u8),

    #[error("argument has tag {found:?}, expected one of {expected:?}")]
    UnexpectedArgTag {
        found: crate::bytecode::ArgTag,
        expected: crate::bytecode::ArgMask,
    },

    #[error("declaration id {0} is out of range (table has {1} entries)")]
    DeclarationIdOutOfRange(u16, usize),

    #[error("expected argument {nth} after op at offset {offset}, found none")]
    MissingArgument { offset: usize, nth: u8 },

    #[error("declaration {0} already had a buffer at setup time")]
    DuplicateDeclaration(u16),

    #[error("FILTER op used outside of a declaration body")]
    FilterOutsideDeclaration,

    #[error("VISUAL op used outside of a declaration body")]
    VisualOutsideDeclaration,

    #[error("READ op used outside of a declaration body")]
    ReadOutsideDeclaration,

    #[error("GOTO target declaration {0} was never set up")]
    GotoTargetInvalid(u16),

    #[error("filter '{0}' failed: {1}")]
    FilterFailed(String, String),

    #[error("unknown compression codec '{0}'")]
    UnknownCodec(String),

    #[error("unknown source encoding '{0}'")]
    UnknownEncoding(String),

    #[error("string argument at offset {0} is not valid data")]
    InvalidString(u32),

    #[error("bytecode stream truncated: {0}")]
    Truncated(String),

    #[error("allocation failed: {0}")]
    Allocation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to compile spec source")]
    Compile(#[from] ParseError),
}
