//! Tokens of the language, produced by the [lexer](crate::compiler::lexer)

use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // single-character symbols
    Plus,
    Minus,
    Star,
    Slash,
    Mod,
    Equal,
    Less,
    Greater,
    Bang,
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Colon,
    Semicolon,

    // two-character symbols
    LessEqual,
    GreaterEqual,
    EqualEqual,
    BangEqual,
    AmpAmp,
    PipePipe,
    PlusPlus,
    MinusMinus,

    // literals
    Ident,
    Number,
    String,

    // keywords
    Void,
    Int,
    Char,
    If,
    Else,
    For,
    Do,
    While,
    Switch,
    Case,
    Default,
    Return,
    Break,
    Continue,

    // I/O primitives, reserved like keywords
    PrintInt,
    PrintStr,
    PrintChar,
    ReadInt,
    ReadStr,

    Eof,
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                TokenKind::Plus => "'+'",
                TokenKind::Minus => "'-'",
                TokenKind::Star => "'*'",
                TokenKind::Slash => "'/'",
                TokenKind::Mod => "'%'",
                TokenKind::Equal => "'='",
                TokenKind::Less => "'<'",
                TokenKind::Greater => "'>'",
                TokenKind::Bang => "'!'",
                TokenKind::LeftParen => "'('",
                TokenKind::RightParen => "')'",
                TokenKind::LeftBrace => "'{'",
                TokenKind::RightBrace => "'}'",
                TokenKind::LeftBracket => "'['",
                TokenKind::RightBracket => "']'",
                TokenKind::Comma => "','",
                TokenKind::Colon => "':'",
                TokenKind::Semicolon => "';'",
                TokenKind::LessEqual => "'<='",
                TokenKind::GreaterEqual => "'>='",
                TokenKind::EqualEqual => "'=='",
                TokenKind::BangEqual => "'!='",
                TokenKind::AmpAmp => "'&&'",
                TokenKind::PipePipe => "'||'",
                TokenKind::PlusPlus => "'++'",
                TokenKind::MinusMinus => "'--'",
                TokenKind::Ident => "identifier",
                TokenKind::Number => "number",
                TokenKind::String => "string",
                TokenKind::Void => "'void'",
                TokenKind::Int => "'int'",
                TokenKind::Char => "'char'",
                TokenKind::If => "'if'",
                TokenKind::Else => "'else'",
                TokenKind::For => "'for'",
                TokenKind::Do => "'do'",
                TokenKind::While => "'while'",
                TokenKind::Switch => "'switch'",
                TokenKind::Case => "'case'",
                TokenKind::Default => "'default'",
                TokenKind::Return => "'return'",
                TokenKind::Break => "'break'",
                TokenKind::Continue => "'continue'",
                TokenKind::PrintInt => "'printInt'",
                TokenKind::PrintStr => "'printStr'",
                TokenKind::PrintChar => "'printChar'",
                TokenKind::ReadInt => "'readInt'",
                TokenKind::ReadStr => "'readStr'",
                TokenKind::Eof => "<EOF>",
            }
        )
    }
}

/// A single token together with its source text. `value` carries the numeric
/// value for number tokens (including char literals) and the string length
/// for string tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub value: i32,
    pub line: i32,
}
impl Token {
    pub fn new(kind: TokenKind, lexeme: String, value: i32, line: i32) -> Self {
        Token { kind, lexeme, value, line }
    }
    pub fn eof(line: i32) -> Self {
        Token::new(TokenKind::Eof, String::new(), 0, line)
    }
}
