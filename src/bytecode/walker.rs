//! The bytecode walker: `next_op`, `op_get_arg`, `arg_next` (spec.md §4.1).
//!
//! Positions are plain `usize` byte offsets into the bytecode slice rather
//! than raw pointers — the pointer-into-buffer addressing of the original
//! C implementation maps cleanly onto `(&[u8], usize)` pairs, so there is
//! no need for unsafe pointer arithmetic anywhere in this module.

use super::primitives::{ArgMask, ArgTag, FspecNum, Offset, StrLen, VarId};
use super::Opcode;
use crate::error::FspecError;

/// A decoded argument's payload (spec.md §4.1 "Argument payload decoding").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgPayload {
    Num(FspecNum),
    Var(VarId),
    Off(Offset),
    /// Resolved bytes of a `STR` argument (without the trailing NUL the
    /// spec promises callers; `Arg::as_str_bytes` appends it on demand).
    Str(Vec<u8>),
    /// Inline length-prefixed blob of a `DAT` argument.
    Dat(Vec<u8>),
    Eof,
}

/// A decoded argument: its tag, its payload, and where its tag byte lives
/// in the bytecode (needed to anchor a subsequent `arg_next` call).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    pub tag_pos: usize,
    pub tag: ArgTag,
    pub payload: ArgPayload,
}

impl Arg {
    /// The argument's bytes, with the trailing NUL the spec promises
    /// callers of a `STR` argument. Panics if this isn't a `Str`/`Dat` arg.
    pub fn as_bytes_nul(&self) -> Vec<u8> {
        let bytes = match &self.payload {
            ArgPayload::Str(b) | ArgPayload::Dat(b) => b,
            other => panic!("as_bytes_nul called on non-string argument {other:?}"),
        };
        let mut out = bytes.clone();
        out.push(0);
        out
    }

    pub fn as_num(&self) -> Option<u64> {
        match self.payload {
            ArgPayload::Num(n) => Some(n.0),
            ArgPayload::Var(v) => Some(v.0 as u64),
            ArgPayload::Off(o) => Some(o.0 as u64),
            _ => None,
        }
    }
}

/// Stateless walker over a bytecode byte slice.
pub struct Walker;

impl Walker {
    /// Advance from `start` past its own instruction and return the offset
    /// of the next opcode, or `None` at end of stream.
    ///
    /// When `skip_args` is true, any `ARG` opcodes encountered after the
    /// first step are skipped transparently; when false they are returned.
    pub fn next_op(
        bytecode: &[u8],
        start: usize,
        end: usize,
        skip_args: bool,
    ) -> Result<Option<usize>, FspecError> {
        if start >= end {
            return Ok(None);
        }

        let mut off = 1usize;
        if bytecode[start] == Opcode::Arg as u8 {
            off += Self::arg_len_at(bytecode, start + 1)?;
        }

        let mut op = start + off;
        loop {
            if op >= end {
                return Ok(None);
            }

            let opcode = Opcode::from_u8(bytecode[op])?;
            if skip_args && opcode == Opcode::Arg {
                let tag_pos = op + 1;
                let alen = Self::arg_len_at(bytecode, tag_pos)?;
                op += 1 + alen;
                continue;
            }

            return Ok(Some(op));
        }
    }

    /// Find `op`'s `nth` (1-based) associated argument by walking the
    /// `ARG` opcodes immediately following it, stopping at the first
    /// non-`ARG` op. Fatal if the found argument's tag isn't in `expect`.
    pub fn op_get_arg(
        bytecode: &[u8],
        op: usize,
        end: usize,
        nth: u8,
        expect: ArgMask,
    ) -> Result<Option<Arg>, FspecError> {
        let mut cursor = op;
        let mut found_arg_op = None;

        for _ in 0..nth {
            match Self::next_op(bytecode, cursor, end, false)? {
                None => return Ok(None),
                Some(arg_op) => {
                    if bytecode[arg_op] != Opcode::Arg as u8 {
                        return Ok(None);
                    }
                    found_arg_op = Some(arg_op);
                    cursor = arg_op;
                }
            }
        }

        let arg_op = match found_arg_op {
            Some(a) => a,
            None => return Ok(None),
        };

        let tag_pos = arg_op + 1;
        let tag = ArgTag::from_u8(*bytecode.get(tag_pos).ok_or_else(|| {
            FspecError::Truncated(format!("argument tag at offset {tag_pos}"))
        })?)?;

        if !expect.allows(tag) {
            return Err(FspecError::UnexpectedArgTag {
                found: tag,
                expected: expect,
            });
        }

        Ok(Some(Self::decode_arg(bytecode, tag_pos, tag)?))
    }

    /// Same as `op_get_arg`, anchored at an existing argument, to iterate
    /// the remaining arguments of the same op.
    pub fn arg_next(
        bytecode: &[u8],
        arg: &Arg,
        end: usize,
        nth: u8,
        expect: ArgMask,
    ) -> Result<Option<Arg>, FspecError> {
        Self::op_get_arg(bytecode, arg.tag_pos - 1, end, nth, expect)
    }

    fn decode_arg(bytecode: &[u8], tag_pos: usize, tag: ArgTag) -> Result<Arg, FspecError> {
        let payload_start = tag_pos + 1;
        let payload = match tag {
            ArgTag::Num => {
                let bytes = Self::slice(bytecode, payload_start, FspecNum::WIDTH)?;
                ArgPayload::Num(FspecNum::read_le(bytes))
            }
            ArgTag::Var => {
                let bytes = Self::slice(bytecode, payload_start, VarId::WIDTH)?;
                ArgPayload::Var(VarId::read_le(bytes))
            }
            ArgTag::Off => {
                let bytes = Self::slice(bytecode, payload_start, Offset::WIDTH)?;
                ArgPayload::Off(Offset::read_le(bytes))
            }
            ArgTag::Str => {
                let bytes = Self::slice(bytecode, payload_start, Offset::WIDTH)?;
                let off = Offset::read_le(bytes).as_usize();
                let len_byte = *bytecode
                    .get(off)
                    .ok_or_else(|| FspecError::Truncated(format!("string length at offset {off}")))?;
                let len = StrLen::read_le(&[len_byte]).as_usize();
                let str_bytes = Self::slice(bytecode, off + StrLen::WIDTH, len)?;
                ArgPayload::Str(str_bytes.to_vec())
            }
            ArgTag::Dat => {
                let len_bytes = Self::slice(bytecode, payload_start, Offset::WIDTH)?;
                let len = Offset::read_le(len_bytes).as_usize();
                let data = Self::slice(bytecode, payload_start + Offset::WIDTH, len)?;
                ArgPayload::Dat(data.to_vec())
            }
            ArgTag::Eof => ArgPayload::Eof,
        };

        Ok(Arg {
            tag_pos,
            tag,
            payload,
        })
    }

    /// Total byte length of an `ARG`'s tag + payload, starting at the tag byte.
    fn arg_len_at(bytecode: &[u8], tag_pos: usize) -> Result<usize, FspecError> {
        let tag_byte = *bytecode
            .get(tag_pos)
            .ok_or_else(|| FspecError::Truncated(format!("argument tag at offset {tag_pos}")))?;
        let tag = ArgTag::from_u8(tag_byte)?;
        let payload_len = match tag {
            ArgTag::Num => FspecNum::WIDTH,
            ArgTag::Var => VarId::WIDTH,
            ArgTag::Off | ArgTag::Str => Offset::WIDTH,
            ArgTag::Dat => {
                let len_bytes = Self::slice(bytecode, tag_pos + 1, Offset::WIDTH)?;
                Offset::WIDTH + Offset::read_le(len_bytes).as_usize()
            }
            ArgTag::Eof => 0,
        };
        Ok(1 + payload_len)
    }

    fn slice(bytecode: &[u8], start: usize, len: usize) -> Result<&[u8], FspecError> {
        bytecode.get(start..start + len).ok_or_else(|| {
            FspecError::Truncated(format!(
                "expected {len} bytes at offset {start}, stream has {}",
                bytecode.len()
            ))
        })
    }
}
