//! On-demand lexer.
//!
//! The parser pulls one token at a time and passes in its current scope, so
//! identifier classification (keyword vs plain identifier) happens against
//! the live symbol table. A small undo stack of stream positions backs
//! `peek_token` and `step_back`.

use crate::compiler::common::error::{Error, ErrorKind};
use crate::compiler::common::symbol_table::{ScopeId, Symbol, SymbolTable};
use crate::compiler::common::token::{Token, TokenKind};

/// Retained token starts for `step_back`
const MAX_STEP_BACK: usize = 8;

pub struct Lexer<'a> {
    source: &'a [u8],
    pos: usize,
    line: i32,
    starts: Vec<(usize, i32)>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer { source: source.as_bytes(), pos: 0, line: 1, starts: Vec::new() }
    }

    /// Scans and consumes the next token, remembering where it started
    pub fn next_token(
        &mut self,
        table: &SymbolTable,
        scope: ScopeId,
        errors: &mut Vec<Error>,
    ) -> Token {
        if self.starts.len() == MAX_STEP_BACK {
            self.starts.remove(0);
        }
        self.starts.push((self.pos, self.line));

        self.scan_token(table, scope, errors)
    }

    /// Scans the next token and rewinds the stream, leaving it unconsumed.
    /// Diagnostics are discarded here since the rescan on the real
    /// `next_token` call reports them.
    pub fn peek_token(&mut self, table: &SymbolTable, scope: ScopeId) -> Token {
        let (pos, line) = (self.pos, self.line);
        let mut scratch = Vec::new();
        let token = self.scan_token(table, scope, &mut scratch);
        self.pos = pos;
        self.line = line;

        token
    }

    /// Rewinds the stream to the start of the nth-last consumed token
    pub fn step_back(&mut self, steps: usize) {
        for _ in 0..steps {
            if let Some((pos, line)) = self.starts.pop() {
                self.pos = pos;
                self.line = line;
            }
        }
    }

    fn peek_char(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }
    fn peek_second(&self) -> Option<u8> {
        self.source.get(self.pos + 1).copied()
    }
    fn advance_char(&mut self) -> Option<u8> {
        let c = self.peek_char()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
        }

        Some(c)
    }

    fn scan_token(
        &mut self,
        table: &SymbolTable,
        scope: ScopeId,
        errors: &mut Vec<Error>,
    ) -> Token {
        loop {
            while matches!(self.peek_char(), Some(c) if c.is_ascii_whitespace()) {
                self.advance_char();
            }
            let Some(c) = self.peek_char() else {
                return Token::eof(self.line);
            };

            match c {
                b'a'..=b'z' | b'A'..=b'Z' | b'_' => return self.identifier(table, scope),
                b'0'..=b'9' => return self.number(errors),
                b'\'' | b'"' => return self.literal(c, errors),
                b'/' if self.peek_second() == Some(b'/') => {
                    while !matches!(self.peek_char(), None | Some(b'\n')) {
                        self.advance_char();
                    }
                }
                b'/' if self.peek_second() == Some(b'*') => {
                    let line = self.line;
                    self.advance_char();
                    self.advance_char();
                    loop {
                        match (self.peek_char(), self.peek_second()) {
                            (Some(b'*'), Some(b'/')) => {
                                self.advance_char();
                                self.advance_char();
                                break;
                            }
                            (None, _) => {
                                errors.push(Error::new(line, ErrorKind::UnterminatedComment));
                                break;
                            }
                            _ => {
                                self.advance_char();
                            }
                        }
                    }
                }
                _ => match self.symbol(c) {
                    Some(token) => return token,
                    None => {
                        errors.push(Error::new(
                            self.line,
                            ErrorKind::UnexpectedChar(c as char),
                        ));
                        self.advance_char();
                    }
                },
            }
        }
    }

    fn identifier(&mut self, table: &SymbolTable, scope: ScopeId) -> Token {
        let line = self.line;
        let mut lexeme = String::new();
        while matches!(self.peek_char(), Some(c) if c.is_ascii_alphanumeric() || c == b'_') {
            lexeme.push(self.advance_char().unwrap_or_default() as char);
        }

        let kind = match table.lookup(scope, &lexeme) {
            Some(Symbol::Keyword(kind)) => *kind,
            _ => TokenKind::Ident,
        };

        Token::new(kind, lexeme, 0, line)
    }

    fn number(&mut self, errors: &mut Vec<Error>) -> Token {
        let line = self.line;
        let mut lexeme = String::new();
        while matches!(self.peek_char(), Some(c) if c.is_ascii_digit()) {
            lexeme.push(self.advance_char().unwrap_or_default() as char);
        }

        let value = lexeme.parse().unwrap_or_else(|_| {
            errors.push(Error::new(line, ErrorKind::InvalidNumber));
            0
        });

        Token::new(TokenKind::Number, lexeme, value, line)
    }

    /// Char and string literals; both produce their text with `\n`, `\t` and
    /// `\r` escapes already resolved
    fn literal(&mut self, quote: u8, errors: &mut Vec<Error>) -> Token {
        let line = self.line;
        self.advance_char();

        let mut text = String::new();
        loop {
            match self.peek_char() {
                None => {
                    errors.push(Error::new(line, ErrorKind::UnterminatedLiteral(quote as char)));
                    break;
                }
                Some(c) if c == quote => {
                    self.advance_char();
                    break;
                }
                Some(b'\\') => {
                    self.advance_char();
                    match self.advance_char() {
                        Some(b'n') => text.push('\n'),
                        Some(b't') => text.push('\t'),
                        Some(b'r') => text.push('\r'),
                        Some(other) => {
                            // unknown escapes pass through verbatim
                            text.push('\\');
                            text.push(other as char);
                        }
                        None => (),
                    }
                }
                Some(c) => {
                    self.advance_char();
                    text.push(c as char);
                }
            }
        }

        if quote == b'\'' {
            if text.len() != 1 {
                errors.push(Error::new(line, ErrorKind::CharLiteralLen(text.len())));
            }
            let value = text.bytes().next().unwrap_or(0) as i32;

            Token::new(TokenKind::Number, text, value, line)
        } else {
            let value = text.len() as i32;

            Token::new(TokenKind::String, text, value, line)
        }
    }

    /// Operators and punctuation; two-character symbols win over their
    /// one-character prefixes. Returns None for characters outside the
    /// language.
    fn symbol(&mut self, c: u8) -> Option<Token> {
        let line = self.line;

        if let Some(second) = self.peek_second() {
            let kind = match (c, second) {
                (b'<', b'=') => Some(TokenKind::LessEqual),
                (b'>', b'=') => Some(TokenKind::GreaterEqual),
                (b'=', b'=') => Some(TokenKind::EqualEqual),
                (b'!', b'=') => Some(TokenKind::BangEqual),
                (b'&', b'&') => Some(TokenKind::AmpAmp),
                (b'|', b'|') => Some(TokenKind::PipePipe),
                (b'+', b'+') => Some(TokenKind::PlusPlus),
                (b'-', b'-') => Some(TokenKind::MinusMinus),
                _ => None,
            };
            if let Some(kind) = kind {
                self.advance_char();
                self.advance_char();
                let lexeme = format!("{}{}", c as char, second as char);

                return Some(Token::new(kind, lexeme, 0, line));
            }
        }

        let kind = match c {
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'%' => TokenKind::Mod,
            b'=' => TokenKind::Equal,
            b'<' => TokenKind::Less,
            b'>' => TokenKind::Greater,
            b'!' => TokenKind::Bang,
            b'(' => TokenKind::LeftParen,
            b')' => TokenKind::RightParen,
            b'{' => TokenKind::LeftBrace,
            b'}' => TokenKind::RightBrace,
            b'[' => TokenKind::LeftBracket,
            b']' => TokenKind::RightBracket,
            b',' => TokenKind::Comma,
            b':' => TokenKind::Colon,
            b';' => TokenKind::Semicolon,
            _ => return None,
        };
        self.advance_char();

        Some(Token::new(kind, (c as char).to_string(), 0, line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(input: &str) -> Vec<TokenKind> {
        let table = SymbolTable::new();
        let mut lexer = Lexer::new(input);
        let mut errors = Vec::new();
        let mut kinds = Vec::new();
        loop {
            let token = lexer.next_token(&table, table.root(), &mut errors);
            if token.kind == TokenKind::Eof {
                break;
            }
            kinds.push(token.kind);
        }
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);

        kinds
    }

    fn setup_err(input: &str) -> Vec<ErrorKind> {
        let table = SymbolTable::new();
        let mut lexer = Lexer::new(input);
        let mut errors = Vec::new();
        loop {
            let token = lexer.next_token(&table, table.root(), &mut errors);
            if token.kind == TokenKind::Eof {
                break;
            }
        }

        errors.into_iter().map(|e| e.kind).collect()
    }

    fn setup_tokens(input: &str) -> Vec<Token> {
        let table = SymbolTable::new();
        let mut lexer = Lexer::new(input);
        let mut errors = Vec::new();
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token(&table, table.root(), &mut errors);
            if token.kind == TokenKind::Eof {
                break;
            }
            tokens.push(token);
        }

        tokens
    }

    #[test]
    fn single_and_double_symbols() {
        assert_eq!(
            setup("+ - * / % = < > ! ( ) { } [ ] , : ;"),
            vec![
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Mod,
                TokenKind::Equal,
                TokenKind::Less,
                TokenKind::Greater,
                TokenKind::Bang,
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::LeftBracket,
                TokenKind::RightBracket,
                TokenKind::Comma,
                TokenKind::Colon,
                TokenKind::Semicolon,
            ]
        );
        assert_eq!(
            setup("<= >= == != && || ++ --"),
            vec![
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::EqualEqual,
                TokenKind::BangEqual,
                TokenKind::AmpAmp,
                TokenKind::PipePipe,
                TokenKind::PlusPlus,
                TokenKind::MinusMinus,
            ]
        );
    }

    #[test]
    fn double_symbols_win_over_singles() {
        assert_eq!(
            setup("i<=j"),
            vec![TokenKind::Ident, TokenKind::LessEqual, TokenKind::Ident]
        );
        assert_eq!(
            setup("i < = j"),
            vec![TokenKind::Ident, TokenKind::Less, TokenKind::Equal, TokenKind::Ident]
        );
    }

    #[test]
    fn keywords_are_classified_through_the_table() {
        assert_eq!(
            setup("while whilst readInt readInput"),
            vec![TokenKind::While, TokenKind::Ident, TokenKind::ReadInt, TokenKind::Ident]
        );
    }

    #[test]
    fn char_literal_becomes_number() {
        let tokens = setup_tokens("'A' '\\n'");

        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].value, 65);
        assert_eq!(tokens[1].value, 10);
    }

    #[test]
    fn string_literal_value_is_its_length() {
        let tokens = setup_tokens("\"Hello\"");

        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].lexeme, "Hello");
        assert_eq!(tokens[0].value, 5);
    }

    #[test]
    fn escapes_are_resolved() {
        let tokens = setup_tokens("\"a\\tb\\n\"");

        assert_eq!(tokens[0].lexeme, "a\tb\n");
        assert_eq!(tokens[0].value, 4);
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            setup("a // rest of line\nb /* span\nlines */ c"),
            vec![TokenKind::Ident, TokenKind::Ident, TokenKind::Ident]
        );
    }

    #[test]
    fn lines_are_counted() {
        let tokens = setup_tokens("a\nb\n\nc");

        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].line, 2);
        assert_eq!(tokens[2].line, 4);
    }

    #[test]
    fn unterminated_string() {
        assert_eq!(setup_err("\"abc"), vec![ErrorKind::UnterminatedLiteral('"')]);
    }

    #[test]
    fn long_char_literal() {
        assert_eq!(setup_err("'ab'"), vec![ErrorKind::CharLiteralLen(2)]);
    }

    #[test]
    fn unexpected_characters_are_reported_and_skipped() {
        assert_eq!(
            setup_err("a # b & c"),
            vec![ErrorKind::UnexpectedChar('#'), ErrorKind::UnexpectedChar('&')]
        );
    }

    #[test]
    fn peek_does_not_consume() {
        let table = SymbolTable::new();
        let mut lexer = Lexer::new("a b");
        let mut errors = Vec::new();

        let peeked = lexer.peek_token(&table, table.root());
        let consumed = lexer.next_token(&table, table.root(), &mut errors);

        assert_eq!(peeked, consumed);
        assert_eq!(consumed.lexeme, "a");
        assert_eq!(lexer.next_token(&table, table.root(), &mut errors).lexeme, "b");
    }

    #[test]
    fn step_back_replays_tokens() {
        let table = SymbolTable::new();
        let mut lexer = Lexer::new("a b c");
        let mut errors = Vec::new();

        lexer.next_token(&table, table.root(), &mut errors);
        lexer.next_token(&table, table.root(), &mut errors);
        lexer.step_back(2);

        assert_eq!(lexer.next_token(&table, table.root(), &mut errors).lexeme, "a");
        assert_eq!(lexer.next_token(&table, table.root(), &mut errors).lexeme, "b");
        assert_eq!(lexer.next_token(&table, table.root(), &mut errors).lexeme, "c");
    }

    #[test]
    fn lexing_twice_gives_identical_streams() {
        let input = "int main() { printStr(\"hi\\n\"); } // done";
        assert_eq!(setup_tokens(input), setup_tokens(input));
    }
}
