//! fspec: a declarative binary layout spec compiler and bytecode dump
//! interpreter.
//!
//! A `.fspec` source file (see [`frontend`]) compiles down to a compact,
//! self-describing bytecode stream (see [`bytecode`]). That stream, run by
//! [`interpreter::Interpreter`] against an arbitrary byte stream, renders
//! each declared field as a line of human-readable output (see [`render`]).

pub mod bytecode;
pub mod declaration;
pub mod error;
pub mod filter;
pub mod frontend;
pub mod interpreter;
pub mod render;

pub use declaration::DeclarationTable;
pub use error::{FspecError, FspecResult};
pub use filter::FilterRegistry;
pub use frontend::compile_source;
pub use interpreter::Interpreter;

/// Compiles `source` and runs the resulting program against `input`,
/// writing rendered output to `out`. The convenience entry point the CLI
/// and integration tests both use.
pub fn dump(
    source: &str,
    input: &mut dyn std::io::Read,
    out: &mut dyn std::io::Write,
) -> FspecResult<()> {
    let bytecode = compile_source(source)?;
    let table = DeclarationTable::setup(&bytecode, bytecode.len())?;
    let filters = FilterRegistry::with_builtins();
    let mut interpreter = Interpreter::new(&bytecode, table, filters, input);
    interpreter.run(out)
}
