#![no_main]

use libfuzzer_sys::fuzz_target;
use fspec::frontend::lexer::Lexer;
use fspec::frontend::parser::Parser;

fuzz_target!(|data: &[u8]| {
    if let Ok(source) = std::str::from_utf8(data) {
        if source.len() > 10_000 {
            return;
        }

        let Ok(tokens) = Lexer::new(source).tokenize() else {
            return;
        };

        // Parsing must never panic on any token stream the lexer can
        // produce; a ParseError is an acceptable outcome.
        if let Ok(spec) = Parser::new(tokens).parse() {
            for s in &spec.structs {
                assert!(!s.name.is_empty(), "parsed struct must have a name");
            }
        }
    }
});
