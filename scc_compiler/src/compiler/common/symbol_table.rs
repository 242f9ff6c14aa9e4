//! The scoped symbol table shared by the lexer, parser and code generator.
//!
//! Scopes live in an arena and are addressed by [ScopeId]; a closed scope is
//! never popped, so operands recorded during parsing can still resolve their
//! symbols at code-generation time.

use crate::compiler::common::token::TokenKind;
use rustc_hash::FxHashMap;

/// Handle into the scope arena. Cheap to copy and to store inside IR operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Int,
    Char,
    Void,
}
impl DataType {
    /// Size of a single value of this type on the 32-bit target
    pub fn size(&self) -> u32 {
        match self {
            DataType::Char => 1,
            DataType::Int | DataType::Void => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// Lives below the frame pointer, addressed `[ebp - (offset + size)]`
    Local,
    /// Caller-pushed slot above the saved frame pointer, `[ebp + offset + 8]`
    Argument,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableSymbol {
    pub data_type: DataType,
    pub kind: VariableKind,
    pub is_array: bool,
    pub element_size: u32,
    pub size: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub data_type: DataType,
    pub name: String,
    pub is_array: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSymbol {
    pub return_type: DataType,
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    /// Reserved words and I/O primitives, seeded into the root scope so the
    /// lexer can classify identifiers with a plain lookup
    Keyword(TokenKind),
    Variable(VariableSymbol),
    Function(FunctionSymbol),
}

#[derive(Debug)]
struct Scope {
    symbols: FxHashMap<String, Symbol>,
    parent: Option<ScopeId>,
}

#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

const KEYWORDS: &[(&str, TokenKind)] = &[
    ("void", TokenKind::Void),
    ("int", TokenKind::Int),
    ("char", TokenKind::Char),
    ("if", TokenKind::If),
    ("else", TokenKind::Else),
    ("for", TokenKind::For),
    ("do", TokenKind::Do),
    ("while", TokenKind::While),
    ("switch", TokenKind::Switch),
    ("case", TokenKind::Case),
    ("default", TokenKind::Default),
    ("return", TokenKind::Return),
    ("break", TokenKind::Break),
    ("continue", TokenKind::Continue),
    ("printInt", TokenKind::PrintInt),
    ("printStr", TokenKind::PrintStr),
    ("printChar", TokenKind::PrintChar),
    ("readInt", TokenKind::ReadInt),
    ("readStr", TokenKind::ReadStr),
];

impl SymbolTable {
    pub fn new() -> Self {
        let mut root = Scope { symbols: FxHashMap::default(), parent: None };
        for (lexeme, kind) in KEYWORDS {
            root.symbols.insert(lexeme.to_string(), Symbol::Keyword(*kind));
        }

        SymbolTable { scopes: vec![root] }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Creates a fresh child scope and returns its handle
    pub fn open_scope(&mut self, parent: ScopeId) -> ScopeId {
        self.scopes.push(Scope { symbols: FxHashMap::default(), parent: Some(parent) });

        ScopeId(self.scopes.len() - 1)
    }

    /// Declares `name` in `scope`. Returns false and leaves the table
    /// untouched if the name already exists in that exact scope.
    pub fn insert(&mut self, scope: ScopeId, name: String, symbol: Symbol) -> bool {
        let symbols = &mut self.scopes[scope.0].symbols;
        if symbols.contains_key(&name) {
            return false;
        }
        symbols.insert(name, symbol);

        true
    }

    /// Resolves `name` starting at `scope` and walking outwards to the root
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<&Symbol> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = &self.scopes[id.0];
            if let Some(symbol) = scope.symbols.get(name) {
                return Some(symbol);
            }
            current = scope.parent;
        }

        None
    }

    pub fn is_declared_in_current_scope(&self, scope: ScopeId, name: &str) -> bool {
        self.scopes[scope.0].symbols.contains_key(name)
    }

    pub fn get_variable(&self, scope: ScopeId, name: &str) -> Option<&VariableSymbol> {
        match self.lookup(scope, name) {
            Some(Symbol::Variable(var)) => Some(var),
            _ => None,
        }
    }
}
