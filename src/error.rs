use std::io;

use thiserror::Error as ThisError;

use crate::object::Object;
use crate::token::{Token, TokenType};

/// Unifies parser control-flow, runtime faults, the non-local `return`
/// signal, and I/O failures bubbling out of file loading.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Raised by `Parser::consume` when an expectation fails. Caught by
    /// `declaration()` to drive panic-mode recovery; never reaches the CLI.
    #[error("parse error")]
    Parse,

    #[error("{message}")]
    Runtime { token: Token, message: String },

    /// Not a real error: a control-flow signal unwinding to the nearest
    /// enclosing function call.
    #[error("return")]
    Return { value: Object },

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub fn runtime_error(token: &Token, message: impl Into<String>) -> Error {
    Error::Runtime {
        token: token.clone(),
        message: message.into(),
    }
}

/// Diagnostic context threaded by `&mut` reference through the scanner,
/// parser, and resolver. Replaces the process-wide `hadError` /
/// `hadRuntimeError` globals of the reference implementation so the
/// pipeline stays free of hidden state and is safe to run repeatedly
/// within a single process (REPL mode, tests).
#[derive(Debug, Default)]
pub struct Diagnostics {
    had_error: bool,
    had_runtime_error: bool,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, line: i32, message: &str) {
        self.report(line, "", message);
    }

    pub fn error_at_token(&mut self, token: &Token, message: &str) {
        if token.is_eof() {
            self.report(token.line, " at end", message);
        } else {
            self.report(token.line, &format!(" at '{}'", token.lexeme), message);
        }
    }

    fn report(&mut self, line: i32, where_: &str, message: &str) {
        self.had_error = true;
        println!("[Line {line}] Error{where_}: {message}");
        log::debug!("compile error at line {line}: {message}");
    }

    pub fn report_runtime_error(&mut self, token: &Token, message: &str) {
        self.had_runtime_error = true;
        println!("{message}\n[line {}]", token.line);
        log::debug!("runtime error at line {}: {message}", token.line);
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    /// Clears the compile-error flag between REPL lines. `had_runtime_error`
    /// is left untouched, matching the reference implementation's
    /// `errors.reset()`, which only clears the compile-error flag.
    pub fn reset_compile_error(&mut self) {
        self.had_error = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_scanner_error_with_empty_where() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.error(3, "Unexpected character.");
        assert!(diagnostics.had_error());
        assert!(!diagnostics.had_runtime_error());
    }

    #[test]
    fn reset_only_clears_compile_error() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.error(1, "bad");
        let token = Token::new(TokenType::Eof, "", 1);
        diagnostics.report_runtime_error(&token, "boom");

        diagnostics.reset_compile_error();

        assert!(!diagnostics.had_error());
        assert!(diagnostics.had_runtime_error());
    }
}
