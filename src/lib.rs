pub mod class;
pub mod environment;
pub mod error;
pub mod function;
pub mod interpreter;
pub mod object;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod syntax;
pub mod token;

use error::Diagnostics;
use interpreter::Interpreter;
use parser::Parser;
use resolver::Resolver;
use scanner::Scanner;

/// Runs one program — a whole file, or a single REPL line — through the
/// full scan → parse → resolve → interpret pipeline against a persistent
/// `Interpreter`, short-circuiting before each downstream phase once
/// `diagnostics` already carries a compile error.
pub fn run(source: &str, interpreter: &mut Interpreter, diagnostics: &mut Diagnostics) {
    let tokens = Scanner::new(source, diagnostics).scan_tokens();
    log::debug!("scanned {} tokens", tokens.len());

    let statements = Parser::new(&tokens, diagnostics).parse();
    if diagnostics.had_error() {
        return;
    }
    log::debug!("parsed {} top-level statements", statements.len());

    Resolver::new(interpreter, diagnostics).resolve_stmts(&statements);
    if diagnostics.had_error() {
        return;
    }

    interpreter.interpret(&statements, diagnostics);
}
