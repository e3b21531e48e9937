//! The `encoding` built-in filter: converts a declaration's buffer from a
//! named source encoding to UTF-8 (spec.md §4.4).
//!
//! The original C implementation shells out to `iconv`; this uses
//! `encoding_rs` instead, which needs no host locale tables and has no
//! partial-output edge cases beyond what `encoding_rs` itself reports.

use encoding_rs::Encoding;

use super::FilterArg;
use crate::declaration::Declaration;
use crate::error::{FspecError, FspecResult};

/// `encoding(<source-encoding-name>)`. The first `FilterArg` names the
/// source encoding (the `FILTER` op's second `STR` argument overall, first
/// after the filter name); the host/output encoding is always UTF-8.
pub fn encoding_filter(args: &[FilterArg], decl: &mut Declaration) -> FspecResult<()> {
    let label = args
        .first()
        .and_then(FilterArg::as_str)
        .ok_or_else(|| FspecError::FilterFailed("encoding".into(), "missing source encoding argument".into()))?;

    let encoding = Encoding::for_label(label.as_bytes())
        .ok_or_else(|| FspecError::UnknownEncoding(label.to_string()))?;

    let (decoded, _, had_errors) = encoding.decode(&decl.buffer);
    if had_errors {
        return Err(FspecError::FilterFailed(
            "encoding".into(),
            format!("'{label}' input contained invalid sequences"),
        ));
    }

    let bytes = decoded.into_owned().into_bytes();
    decl.nmemb = if decl.element_size == 0 {
        bytes.len()
    } else {
        bytes.len() / decl.element_size
    };
    decl.buffer = bytes;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{DeclKind, Visual};

    fn decl_with(buffer: Vec<u8>) -> Declaration {
        Declaration {
            id: 0,
            kind: DeclKind::Member,
            name: "s".into(),
            visual: Visual::Str,
            start: 0,
            end: 0,
            element_size: 1,
            nmemb: buffer.len(),
            signed: false,
            buffer,
        }
    }

    #[test]
    fn passthrough_utf8_is_unchanged() {
        let mut decl = decl_with(b"hello".to_vec());
        encoding_filter(&[FilterArg::Str("UTF-8".into())], &mut decl).unwrap();
        assert_eq!(decl.buffer, b"hello");
        assert_eq!(decl.nmemb, 5);
    }

    #[test]
    fn unknown_label_is_fatal() {
        let mut decl = decl_with(b"hi".to_vec());
        let err = encoding_filter(&[FilterArg::Str("not-a-real-encoding".into())], &mut decl)
            .unwrap_err();
        assert!(matches!(err, FspecError::UnknownEncoding(_)));
    }

    #[test]
    fn latin1_converts_to_utf8() {
        // 0xE9 in windows-1252 is U+00E9 (e acute), 2 bytes in UTF-8.
        let mut decl = decl_with(vec![0xE9]);
        encoding_filter(&[FilterArg::Str("windows-1252".into())], &mut decl).unwrap();
        assert_eq!(decl.buffer, "é".as_bytes());
    }
}
