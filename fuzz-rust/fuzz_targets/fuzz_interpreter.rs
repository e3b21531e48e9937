#![no_main]

use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use libfuzzer_sys::arbitrary::{self, Arbitrary};

use fspec::declaration::DeclarationTable;
use fspec::filter::FilterRegistry;
use fspec::frontend::compiler::Compiler;
use fspec::frontend::lexer::Lexer;
use fspec::frontend::parser::Parser;
use fspec::Interpreter;

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    source: &'a str,
    bytes: &'a [u8],
}

fuzz_target!(|input: Input| {
    if input.source.len() > 10_000 || input.bytes.len() > 100_000 {
        return;
    }

    let Ok(tokens) = Lexer::new(input.source).tokenize() else {
        return;
    };
    let Ok(spec) = Parser::new(tokens).parse() else {
        return;
    };
    let Ok(bytecode) = Compiler::new().compile(&spec) else {
        return;
    };
    let Ok(table) = DeclarationTable::setup(&bytecode, bytecode.len()) else {
        return;
    };

    let mut cursor = Cursor::new(input.bytes);
    let filters = FilterRegistry::with_builtins();
    let mut interpreter = Interpreter::new(&bytecode, table, filters, &mut cursor);
    let mut out = Vec::new();

    // The interpreter must never panic on any well-formed program, no
    // matter the input bytes; a fatal FspecError is an acceptable outcome.
    let _ = interpreter.run(&mut out);
});
