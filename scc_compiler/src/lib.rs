//! Single-pass compiler for a small C-like teaching language.
//!
//! The pipeline has no syntax tree: the parser pulls tokens from the lexer
//! and emits three-address code as it goes, recording symbols in a scope
//! arena that the code generator later resolves operands against. See
//! [compile] for the whole pass and [lex] for the token-dump mode.

pub mod compiler;

use compiler::codegen::CodeGenerator;
use compiler::common::error::Error;
use compiler::common::symbol_table::SymbolTable;
use compiler::common::token::TokenKind;
use compiler::lexer::Lexer;
use compiler::parser::Parser;

/// Both textual artifacts of a successful compilation
#[derive(Debug)]
pub struct CompiledProgram {
    /// Three-address code, one instruction per line
    pub intermediate: String,
    /// 32-bit x86 NASM source
    pub assembly: String,
}

/// Compiles a source string down to intermediate and assembly text. Errors
/// are accumulated across the whole pass and returned in the order they
/// were recorded; any error suppresses code generation.
pub fn compile(source: &str) -> Result<CompiledProgram, Vec<Error>> {
    let (code, table) = Parser::new(source).parse()?;

    let intermediate = code
        .iter()
        .map(|instruction| instruction.to_string())
        .collect::<Vec<_>>()
        .join("\n")
        + "\n";
    let assembly = CodeGenerator::new(&table).generate(&code);

    Ok(CompiledProgram { intermediate, assembly })
}

/// Runs only the lexer, returning every token's lexeme in source order plus
/// whatever lexical errors were hit. Identifiers are classified against the
/// root scope, so keywords come out the same as in a full compile.
pub fn lex(source: &str) -> (Vec<String>, Vec<Error>) {
    let table = SymbolTable::new();
    let mut lexer = Lexer::new(source);
    let mut errors = Vec::new();
    let mut lexemes = Vec::new();

    loop {
        let token = lexer.next_token(&table, table.root(), &mut errors);
        if token.kind == TokenKind::Eof {
            break;
        }
        lexemes.push(token.lexeme);
    }

    (lexemes, errors)
}
