//! Lexer, parser, and compiler for the fspec declaration language, and the
//! bytecode it compiles down to (SPEC_FULL.md §6; spec.md's distilled scope
//! deliberately excludes this layer and starts from raw bytecode — see
//! Non-goals).

pub mod ast;
pub mod compiler;
pub mod error;
pub mod lexer;
pub mod parser;

pub use compiler::Compiler;
pub use error::ParseError;
pub use lexer::Lexer;
pub use parser::Parser;

/// Lex, parse, and compile fspec source text into a bytecode stream in one
/// call.
pub fn compile_source(src: &str) -> Result<Vec<u8>, ParseError> {
    let tokens = Lexer::new(src).tokenize()?;
    let spec = Parser::new(tokens).parse()?;
    Compiler::new().compile(&spec)
}
