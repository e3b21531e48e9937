//! Declaration table: one entry per `DECLARATION` op, populated by a single
//! setup pass before the interpreter runs (spec.md §3, §4.2).

use crate::bytecode::{ArgMask, ArgPayload, DeclKind, Opcode, Visual, Walker};
use crate::error::{FspecError, FspecResult};

/// A declared field or struct: metadata plus the growable buffer that
/// accumulates its read bytes during interpretation.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub id: u16,
    pub kind: DeclKind,
    pub name: String,
    pub visual: Visual,
    /// Offset of this declaration's own `DECLARATION` op.
    pub start: usize,
    /// Offset one past the op that ends this declaration's body.
    pub end: usize,
    /// Element size in bytes, set by the `READ` op that first reads into
    /// this declaration.
    pub element_size: usize,
    /// Current element count.
    pub nmemb: usize,
    /// Whether elements should be rendered/interpreted as signed integers,
    /// set by the `READ` op's width argument.
    pub signed: bool,
    /// Accumulated bytes read so far; always `element_size * nmemb` long
    /// once a `READ`/filter has run (spec.md §8 invariant).
    pub buffer: Vec<u8>,
}

impl Declaration {
    fn empty(id: u16) -> Self {
        Declaration {
            id,
            kind: DeclKind::Struct,
            name: String::new(),
            visual: Visual::Dec,
            start: 0,
            end: 0,
            element_size: 0,
            nmemb: 0,
            signed: false,
            buffer: Vec::new(),
        }
    }

    /// Reinterprets the buffer's first `element_size` bytes as a
    /// little-endian unsigned number (spec.md §4.3 "Variable resolution").
    /// Overflow beyond the native width is clamped by ignoring extra bytes.
    pub fn as_number(&self) -> u64 {
        let width = self.element_size.min(8);
        let mut buf = [0u8; 8];
        buf[..width].copy_from_slice(&self.buffer[..width]);
        u64::from_le_bytes(buf)
    }
}

/// All declarations in a program, densely numbered from zero, and the
/// index of the entry-point `STRUCT` declaration.
pub struct DeclarationTable {
    pub declarations: Vec<Declaration>,
    pub entry: u16,
}

impl DeclarationTable {
    /// Walks `bytecode[0..end)` once with `skip_args = true`, populating one
    /// slot per `DECLARATION` op. The declaration count comes from the
    /// first `HEADER` op's second `NUM` argument.
    pub fn setup(bytecode: &[u8], end: usize) -> FspecResult<Self> {
        let header_op = 0usize;
        if bytecode.is_empty() || Opcode::from_u8(bytecode[header_op])? != Opcode::Header {
            return Err(FspecError::Truncated(
                "bytecode stream does not start with HEADER".to_string(),
            ));
        }

        let count_arg = Walker::op_get_arg(bytecode, header_op, end, 2, ArgMask::NUM)?
            .ok_or_else(|| FspecError::MissingArgument {
                offset: header_op,
                nth: 2,
            })?;
        let count = count_arg.as_num().unwrap_or(0) as usize;

        let mut declarations: Vec<Option<Declaration>> = (0..count).map(|_| None).collect();
        let mut entry = 0u16;
        let mut have_entry = false;

        let mut cursor = header_op;
        while let Some(op) = Walker::next_op(bytecode, cursor, end, true)? {
            cursor = op;
            if Opcode::from_u8(bytecode[op])? != Opcode::Declaration {
                continue;
            }

            let kind_arg = Walker::op_get_arg(bytecode, op, end, 1, ArgMask::NUM)?
                .ok_or_else(|| FspecError::MissingArgument { offset: op, nth: 1 })?;
            let id_arg = Walker::op_get_arg(bytecode, op, end, 2, ArgMask::NUM)?
                .ok_or_else(|| FspecError::MissingArgument { offset: op, nth: 2 })?;
            let off_arg = Walker::op_get_arg(bytecode, op, end, 3, ArgMask::OFF)?
                .ok_or_else(|| FspecError::MissingArgument { offset: op, nth: 3 })?;
            let name_arg = Walker::op_get_arg(bytecode, op, end, 4, ArgMask::STR)?
                .ok_or_else(|| FspecError::MissingArgument { offset: op, nth: 4 })?;

            let kind = DeclKind::from_num(kind_arg.as_num().unwrap_or(u64::MAX))
                .ok_or_else(|| FspecError::Truncated(format!("invalid declaration kind at {op}")))?;
            let id = id_arg.as_num().unwrap_or(0) as u16;
            let body_off = match off_arg.payload {
                ArgPayload::Off(o) => o.as_usize(),
                _ => unreachable!("OFF mask guarantees Off payload"),
            };
            let name = match &name_arg.payload {
                ArgPayload::Str(bytes) => String::from_utf8_lossy(bytes).into_owned(),
                _ => unreachable!("STR mask guarantees Str payload"),
            };

            let slot = declarations
                .get_mut(id as usize)
                .ok_or(FspecError::DeclarationIdOutOfRange(id, count))?;

            if slot.is_some() {
                return Err(FspecError::DuplicateDeclaration(id));
            }

            *slot = Some(Declaration {
                id,
                kind,
                name,
                visual: Visual::Dec,
                start: op,
                end: op + body_off,
                element_size: 0,
                nmemb: 0,
                signed: false,
                buffer: Vec::new(),
            });

            if kind == DeclKind::Struct {
                entry = id;
                have_entry = true;
            }
        }

        if !have_entry && count > 0 {
            return Err(FspecError::Truncated(
                "no STRUCT declaration found during setup".to_string(),
            ));
        }

        let declarations = declarations
            .into_iter()
            .enumerate()
            .map(|(i, d)| d.unwrap_or_else(|| Declaration::empty(i as u16)))
            .collect();

        Ok(DeclarationTable {
            declarations,
            entry,
        })
    }

    pub fn get(&self, id: u16) -> FspecResult<&Declaration> {
        self.declarations
            .get(id as usize)
            .ok_or(FspecError::DeclarationIdOutOfRange(id, self.declarations.len()))
    }

    pub fn get_mut(&mut self, id: u16) -> FspecResult<&mut Declaration> {
        let len = self.declarations.len();
        self.declarations
            .get_mut(id as usize)
            .ok_or(FspecError::DeclarationIdOutOfRange(id, len))
    }
}
