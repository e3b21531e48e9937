//! The `compression` built-in filter: decompresses a declaration's buffer
//! with a named codec (spec.md §4.4).
//!
//! Decompressed size is not generally known up front, so each codec is
//! tried against a growing output buffer (starting at twice the input
//! size, doubling on `BufError`/short-output) until it succeeds or a
//! non-size-related error is reported, at which point the failure is
//! fatal per spec.md §7.

use std::io::Write;

use flate2::write::ZlibDecoder;

use super::FilterArg;
use crate::declaration::Declaration;
use crate::error::{FspecError, FspecResult};

const MAX_DOUBLINGS: u32 = 24; // caps growth at input_len * 2^24

trait Codec {
    /// Attempt one decompression pass into a buffer of exactly `cap` bytes.
    /// Returns `Ok(Some(bytes))` on success, `Ok(None)` if `cap` was too
    /// small and growing the buffer might help, `Err` on a real failure.
    fn try_decompress(&self, input: &[u8], cap: usize) -> FspecResult<Option<Vec<u8>>>;
}

struct Deflate;

impl Codec for Deflate {
    fn try_decompress(&self, input: &[u8], cap: usize) -> FspecResult<Option<Vec<u8>>> {
        let mut decoder = ZlibDecoder::new(Vec::with_capacity(cap));
        match decoder.write_all(input) {
            Ok(()) => {}
            Err(e) => return Err(FspecError::FilterFailed("compression".into(), e.to_string())),
        }
        match decoder.finish() {
            Ok(out) if out.len() <= cap => Ok(Some(out)),
            Ok(_) => Ok(None),
            Err(e) => Err(FspecError::FilterFailed("compression".into(), e.to_string())),
        }
    }
}

struct Zstd;

impl Codec for Zstd {
    fn try_decompress(&self, input: &[u8], cap: usize) -> FspecResult<Option<Vec<u8>>> {
        match zstd::stream::decode_all(input) {
            Ok(out) if out.len() <= cap => Ok(Some(out)),
            Ok(_) => Ok(None),
            Err(e) => Err(FspecError::FilterFailed("compression".into(), e.to_string())),
        }
    }
}

fn codec_for(name: &str) -> Option<Box<dyn Codec>> {
    match name {
        "deflate" | "zlib" => Some(Box::new(Deflate)),
        "zstd" => Some(Box::new(Zstd)),
        _ => None,
    }
}

/// `compression(<algorithm>, [size-hint], [key, value]*)`.
pub fn compression_filter(args: &[FilterArg], decl: &mut Declaration) -> FspecResult<()> {
    let name = args
        .first()
        .and_then(FilterArg::as_str)
        .ok_or_else(|| FspecError::FilterFailed("compression".into(), "missing algorithm name".into()))?;

    let codec = codec_for(name).ok_or_else(|| FspecError::UnknownCodec(name.to_string()))?;

    let hint = args.get(1).and_then(FilterArg::as_num).map(|n| n as usize);
    let mut cap = hint.unwrap_or_else(|| decl.buffer.len().max(16) * 2);

    let out = loop {
        if let Some(result) = codec.try_decompress(&decl.buffer, cap)? {
            break result;
        }
        cap = cap.saturating_mul(2);
        if cap > decl.buffer.len().max(16) << MAX_DOUBLINGS {
            return Err(FspecError::FilterFailed(
                "compression".into(),
                format!("'{name}' did not terminate within size limits"),
            ));
        }
    };

    decl.nmemb = if decl.element_size == 0 {
        out.len()
    } else {
        out.len() / decl.element_size
    };
    decl.buffer = out;
    Ok(())
}
