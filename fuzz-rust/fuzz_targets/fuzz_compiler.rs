#![no_main]

use libfuzzer_sys::fuzz_target;
use fspec::declaration::DeclarationTable;
use fspec::frontend::compiler::Compiler;
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
        let Ok(spec) = Parser::new(tokens).parse() else {
            return;
        };

        // Compiling must never panic; a ParseError (duplicate name,
        // unknown count reference) is an acceptable outcome.
        if let Ok(bytecode) = Compiler::new().compile(&spec) {
            // Property: anything the compiler emits must also pass the
            // declaration table's own setup pass over the same bytecode.
            let result = DeclarationTable::setup(&bytecode, bytecode.len());
            assert!(result.is_ok(), "compiler emitted bytecode setup() rejects");
        }
    }
});
