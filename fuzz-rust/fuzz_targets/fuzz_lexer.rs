#![no_main]

use libfuzzer_sys::fuzz_target;
use fspec::frontend::lexer::Lexer;

fuzz_target!(|data: &[u8]| {
    if let Ok(source) = std::str::from_utf8(data) {
        if source.len() > 10_000 {
            return;
        }

        // Tokenizing must never panic, regardless of how malformed the
        // input is; a ParseError is an acceptable outcome.
        let _ = Lexer::new(source).tokenize();
    }
});
