pub mod codegen;
pub mod common;
pub mod ir;
pub mod lexer;
pub mod parser;
