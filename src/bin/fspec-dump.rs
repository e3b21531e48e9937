//! `fspec-dump`: compiles an fspec source file and interprets stdin against
//! it, writing the renderer's output to stdout (SPEC_FULL.md §6.3).

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

/// Compile a binary layout spec and dump a matching input stream.
#[derive(Debug, Parser)]
#[command(name = "fspec-dump", version, about)]
struct Cli {
    /// Path to the `.fspec` source file describing the layout.
    spec_path: PathBuf,

    /// Raise log verbosity (-v for info, -vv for debug, -vvv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Write the compiled bytecode to this path before interpreting stdin.
    #[arg(long)]
    bytecode_out: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("fspec-dump: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), fspec::FspecError> {
    let source = fs::read_to_string(&cli.spec_path)?;
    let bytecode = fspec::compile_source(&source)?;

    if let Some(path) = &cli.bytecode_out {
        fs::write(path, &bytecode)?;
        log::debug!("wrote {} bytes of bytecode to {}", bytecode.len(), path.display());
    }

    let table = fspec::DeclarationTable::setup(&bytecode, bytecode.len())?;
    let filters = fspec::FilterRegistry::with_builtins();

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut interpreter = fspec::Interpreter::new(&bytecode, table, filters, &mut input);
    interpreter.run(&mut out)?;
    out.flush()?;
    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new().filter_level(level).init();
}
