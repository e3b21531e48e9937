//! Renders a declaration's buffer as a single text line, or a fenced/
//! multi-line block for long strings and large arrays (spec.md §4.5).

use crate::bytecode::{DeclKind, Visual};
use crate::declaration::Declaration;

/// Renders one declaration to its `name: value` line. Returns `None` for
/// `STRUCT` declarations: they group members but never carry a value of
/// their own, so they produce no output line.
pub fn render(decl: &Declaration) -> Option<String> {
    if decl.kind == DeclKind::Struct {
        return None;
    }

    let body = match decl.visual {
        Visual::Nul => "...".to_string(),
        Visual::Str => render_str(decl),
        Visual::Hex => render_array(decl, render_hex_element),
        Visual::Dec => {
            let signed = decl.signed;
            render_array(decl, move |bytes| render_dec_element(bytes, signed))
        }
    };

    Some(format!("{}: {}", decl.name, body))
}

fn render_str(decl: &Declaration) -> String {
    let text = String::from_utf8_lossy(&decl.buffer);
    if text.contains('\n') {
        format!("```\n{text}\n```")
    } else {
        text.into_owned()
    }
}

fn element_bytes(decl: &Declaration, index: usize) -> &[u8] {
    let start = index * decl.element_size;
    &decl.buffer[start..start + decl.element_size]
}

/// `0x…`, most-significant byte first, leading zero *bytes* suppressed
/// (never the last remaining byte's own digits), collapsing to `0x0` only
/// when every byte is zero.
fn render_hex_element(bytes: &[u8]) -> String {
    let be: Vec<u8> = bytes.iter().rev().copied().collect();
    if be.iter().all(|&b| b == 0) {
        return "0x0".to_string();
    }

    let mut start = 0;
    while start < be.len() - 1 && be[start] == 0 {
        start += 1;
    }

    let digits: String = be[start..].iter().map(|b| format!("{b:02x}")).collect();
    format!("0x{digits}")
}

fn render_dec_element(bytes: &[u8], signed: bool) -> String {
    let width = bytes.len().min(8);
    let mut buf = [0u8; 8];
    buf[..width].copy_from_slice(&bytes[..width]);
    let unsigned = u64::from_le_bytes(buf);

    if signed && width > 0 {
        let shift = 64 - width * 8;
        let value = ((unsigned << shift) as i64) >> shift;
        value.to_string()
    } else {
        unsigned.to_string()
    }
}

fn render_array<F: Fn(&[u8]) -> String>(decl: &Declaration, fmt_element: F) -> String {
    let values: Vec<String> = (0..decl.nmemb)
        .map(|i| fmt_element(element_bytes(decl, i)))
        .collect();
    layout(&values)
}

/// 1 value = bare; 2-8 = inline braces; >8 = multi-line, 8 values per row.
fn layout(values: &[String]) -> String {
    match values.len() {
        0 => String::new(),
        1 => values[0].clone(),
        2..=8 => format!("{{ {} }}", values.join(", ")),
        _ => {
            let chunks: Vec<&[String]> = values.chunks(8).collect();
            let last = chunks.len() - 1;
            let mut out = String::from("{\n");
            for (i, chunk) in chunks.iter().enumerate() {
                out.push_str("    ");
                out.push_str(&chunk.join(", "));
                if i != last {
                    out.push(',');
                }
                out.push('\n');
            }
            out.push('}');
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(name: &str, visual: Visual, element_size: usize, signed: bool, buffer: Vec<u8>) -> Declaration {
        let nmemb = if element_size == 0 { 0 } else { buffer.len() / element_size };
        Declaration {
            id: 0,
            kind: DeclKind::Member,
            name: name.to_string(),
            visual,
            start: 0,
            end: 0,
            element_size,
            nmemb,
            signed,
            buffer,
        }
    }

    #[test]
    fn single_byte_hex() {
        let d = member("byte", Visual::Hex, 1, false, vec![0xab]);
        assert_eq!(render(&d).unwrap(), "byte: 0xab");
    }

    #[test]
    fn hex_keeps_leading_zero_in_last_byte() {
        let d = member("x", Visual::Hex, 1, false, vec![0x0a]);
        assert_eq!(render(&d).unwrap(), "x: 0x0a");
    }

    #[test]
    fn hex_zero_is_0x0() {
        let d = member("z", Visual::Hex, 2, false, vec![0x00, 0x00]);
        assert_eq!(render(&d).unwrap(), "z: 0x0");
    }

    #[test]
    fn small_array_renders_inline() {
        let d = member("data", Visual::Hex, 1, false, vec![0x10, 0x20, 0x30]);
        assert_eq!(render(&d).unwrap(), "data: { 0x10, 0x20, 0x30 }");
    }

    #[test]
    fn large_array_wraps_multiline() {
        let buffer: Vec<u8> = (1..=9u8).collect();
        let d = member("data", Visual::Dec, 1, false, buffer);
        let out = render(&d).unwrap();
        assert!(out.starts_with("data: {\n"));
        assert!(out.ends_with('}'));
        assert!(out.contains("1, 2, 3, 4, 5, 6, 7, 8,\n"));
        assert!(out.contains("    9\n"));
    }

    #[test]
    fn signed_decimal_is_negative() {
        let d = member("n", Visual::Dec, 1, true, vec![0xff]);
        assert_eq!(render(&d).unwrap(), "n: -1");
    }

    #[test]
    fn multiline_string_is_fenced() {
        let d = member("s", Visual::Str, 1, false, b"Hi\nbye".to_vec());
        assert_eq!(render(&d).unwrap(), "s: ```\nHi\nbye\n```");
    }

    #[test]
    fn single_line_string_is_not_fenced() {
        let d = member("s", Visual::Str, 1, false, b"hello".to_vec());
        assert_eq!(render(&d).unwrap(), "s: hello");
    }

    #[test]
    fn struct_declarations_render_nothing() {
        let d = Declaration {
            id: 0,
            kind: DeclKind::Struct,
            name: "root".to_string(),
            visual: Visual::Dec,
            start: 0,
            end: 0,
            element_size: 0,
            nmemb: 0,
            signed: false,
            buffer: Vec::new(),
        };
        assert!(render(&d).is_none());
    }
}
