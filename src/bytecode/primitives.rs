//! Fixed-width numeric subtypes used in argument payloads (spec.md §6).
//!
//! All multi-byte payloads are little-endian. These are thin newtypes so
//! the walker and interpreter read as typed code rather than juggling
//! bare `u64`/`u16`/`u32`/`u8` everywhere.

use crate::error::FspecError;

/// General-purpose number (`fspec_num`), 8 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FspecNum(pub u64);

impl FspecNum {
    pub const WIDTH: usize = 8;

    pub fn read_le(bytes: &[u8]) -> Self {
        let mut buf = [0u8; Self::WIDTH];
        buf.copy_from_slice(&bytes[..Self::WIDTH]);
        FspecNum(u64::from_le_bytes(buf))
    }
}

/// Declaration id (`fspec_var`), 2 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(pub u16);

impl VarId {
    pub const WIDTH: usize = 2;

    pub fn read_le(bytes: &[u8]) -> Self {
        let mut buf = [0u8; Self::WIDTH];
        buf.copy_from_slice(&bytes[..Self::WIDTH]);
        VarId(u16::from_le_bytes(buf))
    }
}

/// Byte offset / length (`fspec_off`), 4 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Offset(pub u32);

impl Offset {
    pub const WIDTH: usize = 4;

    pub fn read_le(bytes: &[u8]) -> Self {
        let mut buf = [0u8; Self::WIDTH];
        buf.copy_from_slice(&bytes[..Self::WIDTH]);
        Offset(u32::from_le_bytes(buf))
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// String length prefix in the bytecode's data area (`fspec_strsz`), 1 byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StrLen(pub u8);

impl StrLen {
    pub const WIDTH: usize = 1;

    pub fn read_le(bytes: &[u8]) -> Self {
        StrLen(bytes[0])
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Argument tags (spec.md §3, closed set).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgTag {
    Num = 0x00,
    Var = 0x01,
    Off = 0x02,
    Str = 0x03,
    Dat = 0x04,
    Eof = 0x05,
}

impl ArgTag {
    pub fn from_u8(byte: u8) -> Result<Self, FspecError> {
        match byte {
            0x00 => Ok(ArgTag::Num),
            0x01 => Ok(ArgTag::Var),
            0x02 => Ok(ArgTag::Off),
            0x03 => Ok(ArgTag::Str),
            0x04 => Ok(ArgTag::Dat),
            0x05 => Ok(ArgTag::Eof),
            other => Err(FspecError::UnknownArgTag(other)),
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    fn mask_bit(self) -> ArgMask {
        match self {
            ArgTag::Num => ArgMask::NUM,
            ArgTag::Var => ArgMask::VAR,
            ArgTag::Off => ArgMask::OFF,
            ArgTag::Str => ArgMask::STR,
            ArgTag::Dat => ArgMask::DAT,
            ArgTag::Eof => ArgMask::EOF,
        }
    }
}

bitflags::bitflags! {
    /// A bit-mask of allowed `ArgTag`s, passed to `op_get_arg`/`arg_next` as
    /// the `expect_mask` contract check (spec.md §4.1).
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ArgMask: u8 {
        const NUM = 1 << 0;
        const VAR = 1 << 1;
        const OFF = 1 << 2;
        const STR = 1 << 3;
        const DAT = 1 << 4;
        const EOF = 1 << 5;
    }
}

impl ArgMask {
    pub fn allows(self, tag: ArgTag) -> bool {
        self.contains(tag.mask_bit())
    }
}
