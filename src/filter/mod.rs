//! Filter registry: named, pluggable transforms over a declaration's buffer
//! (spec.md §4.4).
//!
//! A filter is a pure function of a declaration's buffer (plus whatever
//! `STR`/`NUM`/`VAR` options follow the `FILTER` op in the bytecode) that
//! may replace the buffer outright. It must leave `element_size` unchanged
//! and set `nmemb` to match the new buffer length. A filter name not found
//! in the registry is a warning, not a fatal error (spec.md §4.4, §7).

mod compression;
mod encoding;

use std::collections::HashMap;

use crate::declaration::Declaration;
use crate::error::FspecResult;

pub use compression::compression_filter;
pub use encoding::encoding_filter;

/// An option value passed to a filter after its name, shaped by the
/// argument that supplied it (spec.md §4.4: "value may be STR/NUM/VAR by
/// var's visual type").
#[derive(Debug, Clone)]
pub enum FilterArg {
    Str(String),
    Num(u64),
}

impl FilterArg {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FilterArg::Str(s) => Some(s),
            FilterArg::Num(_) => None,
        }
    }

    pub fn as_num(&self) -> Option<u64> {
        match self {
            FilterArg::Num(n) => Some(*n),
            FilterArg::Str(_) => None,
        }
    }
}

/// A filter implementation: given the remaining (already-decoded) filter
/// arguments and the current declaration, may replace its buffer.
pub type FilterFn = fn(&[FilterArg], &mut Declaration) -> FspecResult<()>;

/// Name-keyed table of filter implementations.
pub struct FilterRegistry {
    filters: HashMap<&'static str, FilterFn>,
}

impl FilterRegistry {
    /// The two built-in filters described in spec.md §4.4.
    pub fn with_builtins() -> Self {
        let mut filters: HashMap<&'static str, FilterFn> = HashMap::new();
        filters.insert("encoding", encoding_filter);
        filters.insert("compression", compression_filter);
        Self { filters }
    }

    pub fn register(&mut self, name: &'static str, f: FilterFn) {
        self.filters.insert(name, f);
    }

    pub fn get(&self, name: &str) -> Option<FilterFn> {
        self.filters.get(name).copied()
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
