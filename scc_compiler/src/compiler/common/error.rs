//! The errors emitted throughout all of scc

use crate::compiler::common::token::TokenKind;

/// The high-level error type, which is used by both lib.rs and main.rs
#[derive(Debug)]
pub enum SccError {
    /// Error produced by [compiler](crate::compiler) (lexing/parsing/codegen)
    Comp(Vec<Error>),
    /// Error when doing system operations (assembling/linking etc)
    Sys(String),
    /// Error in passing cli-arguments (passing invalid argument)
    Cli(Vec<String>),
}
impl SccError {
    pub fn print(self) {
        match self {
            SccError::Comp(errors) => {
                for e in &errors {
                    e.print_error();
                }
            }
            SccError::Cli(errors) => {
                for e in &errors {
                    eprintln!("scc: <command-line>: {}", e);
                }
            }
            SccError::Sys(error) => {
                eprintln!("scc: {}", error);
            }
        }
    }
}
impl From<Vec<Error>> for SccError {
    fn from(compiler_errors: Vec<Error>) -> SccError {
        SccError::Comp(compiler_errors)
    }
}

/// All error-types in [scc_compiler](crate)
#[derive(Debug, PartialEq, Clone)]
pub enum ErrorKind {
    // lex errors
    UnexpectedChar(char),
    UnterminatedLiteral(char),
    UnterminatedComment,
    CharLiteralLen(usize),
    InvalidNumber,

    // parse errors
    Expected(TokenKind),
    ExpectedOneOf(&'static str),
    ExpectedExpression,
    BreakOutsideLoop,
    ContinueOutsideLoop,
    MultipleDefaults,

    // semantic errors
    UndeclaredIdentifier(String),
    Redeclaration(String),
    NotAVariable(String),
    NotAnArray(String),
    NotAFunction(String),
    MismatchedArity(String, usize),
    ReturnInVoidFunction,
    NoMainFunction,
}

impl ErrorKind {
    /// The error message being emitted by an error
    pub fn message(&self) -> String {
        match self {
            ErrorKind::UnexpectedChar(c) => format!("unexpected character {:?}.", c),
            ErrorKind::UnterminatedLiteral(quote) => {
                format!("missing the closing {} symbol.", quote)
            }
            ErrorKind::UnterminatedComment => "unterminated block comment.".to_string(),
            ErrorKind::CharLiteralLen(len) => {
                format!("char literal must hold a single character, found {}.", len)
            }
            ErrorKind::InvalidNumber => "number literal doesn't fit in 32 bits.".to_string(),

            ErrorKind::Expected(token) => format!("{} expected.", token),
            ErrorKind::ExpectedOneOf(s) => format!("{} expected.", s),
            ErrorKind::ExpectedExpression => "id, number, '(', '-' or '!' expected.".to_string(),
            ErrorKind::BreakOutsideLoop => "'break' statement is not allowed here.".to_string(),
            ErrorKind::ContinueOutsideLoop => {
                "'continue' statement is not allowed here.".to_string()
            }
            ErrorKind::MultipleDefaults => "more than one 'default' label.".to_string(),

            ErrorKind::UndeclaredIdentifier(name) => {
                format!("{} is an undeclared identifier.", name)
            }
            ErrorKind::Redeclaration(name) => {
                format!("{} is already declared in the current scope.", name)
            }
            ErrorKind::NotAVariable(name) => format!("{} is not a variable.", name),
            ErrorKind::NotAnArray(name) => format!("{} is not an array.", name),
            ErrorKind::NotAFunction(name) => format!("{} is not a function.", name),
            ErrorKind::MismatchedArity(name, expected) => {
                format!("the function {} takes {} argument(s).", name, expected)
            }
            ErrorKind::ReturnInVoidFunction => {
                "can't return a value in a function returning void.".to_string()
            }
            ErrorKind::NoMainFunction => "no main function defined.".to_string(),
        }
    }
}

/// Main error used throughout [scc_compiler](crate), tagged with the source
/// line it was recorded on
#[derive(Debug, PartialEq, Clone)]
pub struct Error {
    pub line: i32,
    pub kind: ErrorKind,
}
impl Error {
    pub fn new(line: i32, kind: ErrorKind) -> Self {
        Error { line, kind }
    }
    pub fn print_error(&self) {
        println!("{}: {}", self.line, self.kind.message());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_message_names_expected_count() {
        let kind = ErrorKind::MismatchedArity("foo".to_string(), 1);

        assert_eq!(kind.message(), "the function foo takes 1 argument(s).");
    }

    #[test]
    fn expected_message_uses_token_notation() {
        let kind = ErrorKind::Expected(TokenKind::Semicolon);

        assert_eq!(kind.message(), "';' expected.");
    }
}
