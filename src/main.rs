use std::fs;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use clap::Parser as ClapParser;

use lox_interpreter_rs::error::Diagnostics;
use lox_interpreter_rs::interpreter::Interpreter;
use lox_interpreter_rs::run;

/// A tree-walking interpreter for Lox.
///
/// With a script argument, runs the file and exits. Without one, starts an
/// interactive REPL.
#[derive(ClapParser, Debug)]
#[command(name = "lox-interpreter-rs", version, about)]
struct Cli {
    /// Lox script to run. Omit to start a REPL.
    script: Option<String>,

    /// Enable verbose pipeline logging (equivalent to RUST_LOG=debug).
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::init();
    }

    match cli.script {
        Some(script) => run_file(&script),
        None => run_prompt(),
    }
}

fn run_file(path: &str) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(error) => {
            eprintln!("Error reading '{path}': {error}");
            return ExitCode::from(74);
        }
    };

    log::info!("running {path}");

    let mut interpreter = Interpreter::new();
    let mut diagnostics = Diagnostics::new();
    run(&source, &mut interpreter, &mut diagnostics);

    if diagnostics.had_error() {
        ExitCode::from(65)
    } else if diagnostics.had_runtime_error() {
        ExitCode::from(70)
    } else {
        ExitCode::SUCCESS
    }
}

fn run_prompt() -> ExitCode {
    log::info!("starting REPL");

    let mut interpreter = Interpreter::new();
    let mut diagnostics = Diagnostics::new();
    let stdin = io::stdin();

    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            return ExitCode::FAILURE;
        }

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => return ExitCode::SUCCESS,
            Ok(_) => {
                run(&line, &mut interpreter, &mut diagnostics);
                // Only the compile-error flag resets between lines; a
                // runtime error stays sticky for the life of the process,
                // matching the reference REPL's `reset()`.
                diagnostics.reset_compile_error();
            }
            Err(error) => {
                eprintln!("Error reading input: {error}");
                return ExitCode::FAILURE;
            }
        }
    }
}
