//! Recursive-descent parser that emits three-address code on the fly.
//!
//! There is no syntax tree: every parsing method appends the instructions
//! for what it just recognized to the instruction list, threading result
//! operands back up through return values. Control flow is linearized with
//! fresh labels while the source is still being read, which is why loops
//! keep explicit break/continue label stacks and the `for`-increment and
//! function bodies are parsed into side buffers and spliced afterwards.

use crate::compiler::common::error::{Error, ErrorKind};
use crate::compiler::common::symbol_table::{
    DataType, FunctionSymbol, Parameter, ScopeId, Symbol, SymbolTable, VariableKind,
    VariableSymbol,
};
use crate::compiler::common::token::{Token, TokenKind};
use crate::compiler::ir::{BinaryOp, Instruction, Operand, UnaryOp};
use crate::compiler::lexer::Lexer;

fn starts_expression(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Ident
            | TokenKind::Number
            | TokenKind::LeftParen
            | TokenKind::Minus
            | TokenKind::Bang
    )
}

fn binary_op(kind: TokenKind) -> BinaryOp {
    match kind {
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::Mod => BinaryOp::Mod,
        TokenKind::AmpAmp => BinaryOp::And,
        TokenKind::PipePipe => BinaryOp::Or,
        TokenKind::Less => BinaryOp::Less,
        TokenKind::Greater => BinaryOp::Greater,
        TokenKind::LessEqual => BinaryOp::LessEqual,
        TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
        TokenKind::EqualEqual => BinaryOp::EqualEqual,
        TokenKind::BangEqual => BinaryOp::BangEqual,
        _ => unreachable!("caller matched an operator token"),
    }
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    table: SymbolTable,
    scope: ScopeId,
    cur: Token,
    code: Vec<Instruction>,
    errors: Vec<Error>,
    temp_counter: usize,
    label_counter: usize,
    /// Running frame offset of the function being parsed, kept 4-byte aligned
    offset: u32,
    break_labels: Vec<Operand>,
    continue_labels: Vec<Operand>,
    current_return_type: DataType,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        let table = SymbolTable::new();
        let scope = table.root();

        Parser {
            lexer: Lexer::new(source),
            table,
            scope,
            cur: Token::eof(1),
            code: Vec::new(),
            errors: Vec::new(),
            temp_counter: 0,
            label_counter: 0,
            offset: 0,
            break_labels: Vec::new(),
            continue_labels: Vec::new(),
            current_return_type: DataType::Void,
        }
    }

    /// Parses the whole translation unit. On success the returned symbol
    /// table still holds every scope the instructions refer to.
    pub fn parse(mut self) -> Result<(Vec<Instruction>, SymbolTable), Vec<Error>> {
        self.advance();
        self.parse_functions();

        if self.errors.is_empty() {
            Ok((self.code, self.table))
        } else {
            Err(self.errors)
        }
    }

    fn advance(&mut self) {
        self.cur = self.lexer.next_token(&self.table, self.scope, &mut self.errors);
    }
    fn peek_kind(&mut self) -> TokenKind {
        self.lexer.peek_token(&self.table, self.scope).kind
    }
    fn emit(&mut self, instruction: Instruction) {
        self.code.push(instruction);
    }
    fn error(&mut self, kind: ErrorKind) {
        self.errors.push(Error::new(self.cur.line, kind));
    }

    /// Expects `kind` as the current token; records an error otherwise.
    /// Advances past the token either way so a single bad token doesn't
    /// stall the pass.
    fn consume(&mut self, kind: TokenKind) {
        if self.cur.kind != kind {
            self.error(ErrorKind::Expected(kind));
        }
        self.advance();
    }

    /// Like [consume](Self::consume) for a set of alternatives, but leaves
    /// the offending token in place so the caller can decide how to recover
    fn consume_one_of(&mut self, kinds: &[TokenKind], what: &'static str) -> bool {
        if kinds.contains(&self.cur.kind) {
            self.advance();
            true
        } else {
            self.error(ErrorKind::ExpectedOneOf(what));
            false
        }
    }

    fn match_if(&mut self, kind: TokenKind) -> bool {
        if self.cur.kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Runs `f` with a fresh instruction buffer and hands back what it
    /// emitted, restoring the previous buffer
    fn capture(&mut self, f: impl FnOnce(&mut Self)) -> Vec<Instruction> {
        let outer = std::mem::take(&mut self.code);
        f(self);

        std::mem::replace(&mut self.code, outer)
    }

    fn ident_lexeme(&self) -> String {
        if self.cur.kind == TokenKind::Ident {
            self.cur.lexeme.clone()
        } else {
            String::new()
        }
    }

    fn new_label(&mut self) -> Operand {
        self.label_counter += 1;

        Operand::Label(format!("L{}", self.label_counter))
    }

    /// Fresh int-typed temporary, declared like any other local so it gets a
    /// frame slot
    fn new_temp(&mut self) -> Operand {
        let name = format!("t{}", self.temp_counter);
        self.temp_counter += 1;
        self.declare_variable(DataType::Int, name.clone(), false, 1);

        Operand::Variable(name, self.scope)
    }

    /// Fresh char-array temporary holding `len` characters plus a NUL
    fn new_string_temp(&mut self, len: u32) -> (String, Operand) {
        let name = format!("t{}", self.temp_counter);
        self.temp_counter += 1;
        self.declare_variable(DataType::Char, name.clone(), true, len + 1);

        (name.clone(), Operand::Variable(name, self.scope))
    }

    fn declare_variable(&mut self, data_type: DataType, name: String, is_array: bool, elements: u32) {
        if self.table.is_declared_in_current_scope(self.scope, &name) {
            self.error(ErrorKind::Redeclaration(name));
            return;
        }
        let element_size = data_type.size();
        let size = element_size * elements;
        let symbol = Symbol::Variable(VariableSymbol {
            data_type,
            kind: VariableKind::Local,
            is_array,
            element_size,
            size,
            offset: self.offset,
        });
        self.table.insert(self.scope, name, symbol);

        self.offset += size;
        while self.offset % 4 != 0 {
            self.offset += 1;
        }
    }

    fn parse_functions(&mut self) {
        loop {
            let return_type = match self.cur.kind {
                TokenKind::Char => DataType::Char,
                TokenKind::Void => DataType::Void,
                _ => DataType::Int,
            };
            self.consume_one_of(
                &[TokenKind::Int, TokenKind::Char, TokenKind::Void],
                "function return type",
            );
            self.offset = 0;
            self.current_return_type = return_type;

            let line = self.cur.line;
            let name = self.ident_lexeme();
            self.consume(TokenKind::Ident);
            let parameters = self.parse_parameters();

            let symbol = Symbol::Function(FunctionSymbol {
                return_type,
                parameters: parameters.clone(),
            });
            if !self.table.insert(self.scope, name.clone(), symbol) {
                self.errors.push(Error::new(line, ErrorKind::Redeclaration(name.clone())));
            }

            let body = self.capture(|parser| parser.parse_block(Some(&parameters)));
            self.emit(Instruction::Label(Operand::Function(name)));
            self.emit(Instruction::Enter(Operand::Number(self.offset as i32)));
            self.code.extend(body);
            self.emit(Instruction::Return(None));

            if !matches!(self.cur.kind, TokenKind::Int | TokenKind::Char | TokenKind::Void) {
                break;
            }
        }

        match self.table.lookup(self.table.root(), "main") {
            Some(Symbol::Function(_)) => (),
            _ => self.error(ErrorKind::NoMainFunction),
        }
    }

    fn parse_parameters(&mut self) -> Vec<Parameter> {
        self.consume(TokenKind::LeftParen);
        let mut parameters = Vec::new();

        if matches!(self.cur.kind, TokenKind::Int | TokenKind::Char | TokenKind::Void) {
            loop {
                let data_type = match self.cur.kind {
                    TokenKind::Char => DataType::Char,
                    _ => DataType::Int,
                };
                if !self.consume_one_of(&[TokenKind::Int, TokenKind::Char], "parameter data type") {
                    break;
                }
                let name = self.ident_lexeme();
                self.consume(TokenKind::Ident);
                let is_array = if self.match_if(TokenKind::LeftBracket) {
                    self.consume(TokenKind::RightBracket);
                    true
                } else {
                    false
                };
                parameters.push(Parameter { data_type, name, is_array });

                if !self.match_if(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen);

        parameters
    }

    fn parse_block(&mut self, parameters: Option<&[Parameter]>) {
        self.consume(TokenKind::LeftBrace);
        let parent = self.scope;
        self.scope = self.table.open_scope(parent);

        if let Some(parameters) = parameters {
            // argument slots sit above the return address, 4 bytes each no
            // matter the type; arrays arrive as pointers
            for (index, param) in parameters.iter().enumerate() {
                let symbol = Symbol::Variable(VariableSymbol {
                    data_type: param.data_type,
                    kind: VariableKind::Argument,
                    is_array: param.is_array,
                    element_size: param.data_type.size(),
                    size: 4,
                    offset: index as u32 * 4,
                });
                if !self.table.insert(self.scope, param.name.clone(), symbol) {
                    self.error(ErrorKind::Redeclaration(param.name.clone()));
                }
            }
        }

        self.parse_declarations();
        self.parse_statements();

        self.scope = parent;
        self.consume(TokenKind::RightBrace);
    }

    fn parse_declarations(&mut self) {
        while matches!(self.cur.kind, TokenKind::Int | TokenKind::Char) {
            let data_type = if self.cur.kind == TokenKind::Char {
                DataType::Char
            } else {
                DataType::Int
            };
            self.advance();

            loop {
                let name = self.ident_lexeme();
                self.consume(TokenKind::Ident);

                let mut is_array = false;
                let mut elements = 1;
                if self.match_if(TokenKind::LeftBracket) {
                    is_array = true;
                    if self.cur.kind == TokenKind::Number {
                        elements = self.cur.value.max(0) as u32;
                    }
                    self.consume(TokenKind::Number);
                    self.consume(TokenKind::RightBracket);
                }
                self.declare_variable(data_type, name.clone(), is_array, elements);

                if self.cur.kind == TokenKind::Equal {
                    self.parse_initializer(&name);
                }
                if !self.match_if(TokenKind::Comma) {
                    break;
                }
            }
            self.consume(TokenKind::Semicolon);
        }
    }

    fn parse_initializer(&mut self, name: &str) {
        self.consume(TokenKind::Equal);
        let is_array = matches!(
            self.table.lookup(self.scope, name),
            Some(Symbol::Variable(var)) if var.is_array
        );

        if !is_array {
            let value = self.parse_bool();
            self.emit(Instruction::Assign(
                Operand::Variable(name.to_string(), self.scope),
                value,
            ));
        } else if self.cur.kind == TokenKind::String {
            let text = self.cur.lexeme.clone();
            self.advance();
            self.copy_string(name, &text);
        } else if self.match_if(TokenKind::LeftBrace) {
            let mut index = 0;
            loop {
                let value = self.parse_bool();
                let element = Operand::ArrayElement(
                    name.to_string(),
                    Box::new(Operand::Number(index)),
                    self.scope,
                );
                self.emit(Instruction::Assign(element, value));
                index += 1;

                if !self.match_if(TokenKind::Comma) {
                    break;
                }
            }
            self.consume(TokenKind::RightBrace);
        }
    }

    /// Unrolls a string into per-element assignments, NUL terminator included
    fn copy_string(&mut self, name: &str, text: &str) {
        for (index, byte) in text.bytes().chain(std::iter::once(0)).enumerate() {
            let element = Operand::ArrayElement(
                name.to_string(),
                Box::new(Operand::Number(index as i32)),
                self.scope,
            );
            self.emit(Instruction::Assign(element, Operand::Number(byte as i32)));
        }
    }

    fn parse_statements(&mut self) {
        while matches!(
            self.cur.kind,
            TokenKind::Ident
                | TokenKind::LeftBrace
                | TokenKind::Semicolon
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Do
                | TokenKind::For
                | TokenKind::Switch
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::Return
                | TokenKind::PrintInt
                | TokenKind::PrintStr
                | TokenKind::PrintChar
                | TokenKind::ReadInt
                | TokenKind::ReadStr
        ) {
            self.parse_statement();
        }
    }

    fn parse_statement(&mut self) {
        match self.cur.kind {
            TokenKind::Ident => {
                if self.peek_kind() == TokenKind::LeftParen {
                    let name = self.cur.lexeme.clone();
                    self.advance();
                    self.parse_call(name);
                } else {
                    let target = self.parse_id();
                    self.parse_assignment(target);
                }
                self.consume(TokenKind::Semicolon);
            }
            TokenKind::LeftBrace => self.parse_block(None),
            TokenKind::Semicolon => self.advance(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Do => self.parse_do_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Switch => self.parse_switch(),
            TokenKind::Break => {
                match self.break_labels.last() {
                    Some(label) => {
                        let label = label.clone();
                        self.emit(Instruction::Goto(label));
                    }
                    None => self.error(ErrorKind::BreakOutsideLoop),
                }
                self.advance();
                self.consume(TokenKind::Semicolon);
            }
            TokenKind::Continue => {
                match self.continue_labels.last() {
                    Some(label) => {
                        let label = label.clone();
                        self.emit(Instruction::Goto(label));
                    }
                    None => self.error(ErrorKind::ContinueOutsideLoop),
                }
                self.advance();
                self.consume(TokenKind::Semicolon);
            }
            TokenKind::Return => self.parse_return(),
            TokenKind::PrintInt | TokenKind::PrintChar => {
                let kind = self.cur.kind;
                self.advance();
                self.consume(TokenKind::LeftParen);
                let value = self.parse_expression();
                self.consume(TokenKind::RightParen);
                self.consume(TokenKind::Semicolon);
                self.emit(match kind {
                    TokenKind::PrintInt => Instruction::PrintInt(value),
                    _ => Instruction::PrintChar(value),
                });
            }
            TokenKind::PrintStr => self.parse_print_str(),
            TokenKind::ReadInt => {
                self.advance();
                self.consume(TokenKind::LeftParen);
                let target = self.parse_id();
                self.consume(TokenKind::RightParen);
                self.consume(TokenKind::Semicolon);
                self.emit(Instruction::ReadInt(target));
            }
            TokenKind::ReadStr => {
                self.advance();
                self.consume(TokenKind::LeftParen);
                let buffer = self.parse_id();
                self.consume(TokenKind::Comma);
                let limit = self.parse_expression();
                self.consume(TokenKind::RightParen);
                self.consume(TokenKind::Semicolon);
                self.emit(Instruction::ReadStr(buffer, limit));
            }
            _ => unreachable!("caller checked the statement FIRST set"),
        }
    }

    fn parse_assignment(&mut self, target: Operand) {
        match self.cur.kind {
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let op = if self.cur.kind == TokenKind::PlusPlus {
                    BinaryOp::Add
                } else {
                    BinaryOp::Sub
                };
                self.advance();
                self.emit(Instruction::Binary(
                    op,
                    target.clone(),
                    target,
                    Operand::Number(1),
                ));
            }
            _ => {
                self.consume(TokenKind::Equal);
                let value = self.parse_bool();
                self.emit(Instruction::Assign(target, value));
            }
        }
    }

    fn parse_if(&mut self) {
        self.advance();
        self.consume(TokenKind::LeftParen);
        let next_label = self.new_label();
        let cond = self.parse_bool();
        let true_label = self.new_label();
        self.emit(Instruction::If(cond, true_label.clone()));
        self.emit(Instruction::Goto(next_label.clone()));
        self.emit(Instruction::Label(true_label));
        self.consume(TokenKind::RightParen);
        self.parse_statement();

        if self.match_if(TokenKind::Else) {
            let end_label = self.new_label();
            self.emit(Instruction::Goto(end_label.clone()));
            self.emit(Instruction::Label(next_label));
            self.parse_statement();
            self.emit(Instruction::Label(end_label));
        } else {
            self.emit(Instruction::Label(next_label));
        }
    }

    fn parse_while(&mut self) {
        self.advance();
        let begin_label = self.new_label();
        let true_label = self.new_label();
        let next_label = self.new_label();
        self.break_labels.push(next_label.clone());
        self.continue_labels.push(begin_label.clone());

        self.emit(Instruction::Label(begin_label.clone()));
        self.consume(TokenKind::LeftParen);
        let cond = self.parse_bool();
        self.emit(Instruction::If(cond, true_label.clone()));
        self.emit(Instruction::Goto(next_label.clone()));
        self.emit(Instruction::Label(true_label));
        self.consume(TokenKind::RightParen);
        self.parse_statement();
        self.emit(Instruction::Goto(begin_label));
        self.emit(Instruction::Label(next_label));

        self.break_labels.pop();
        self.continue_labels.pop();
    }

    fn parse_do_while(&mut self) {
        self.advance();
        let begin_label = self.new_label();
        let cond_label = self.new_label();
        let next_label = self.new_label();
        self.break_labels.push(next_label.clone());
        // continue must re-evaluate the condition, not re-enter the body
        self.continue_labels.push(cond_label.clone());

        self.emit(Instruction::Label(begin_label.clone()));
        self.parse_block(None);
        self.consume(TokenKind::While);
        self.consume(TokenKind::LeftParen);
        self.emit(Instruction::Label(cond_label));
        let cond = self.parse_bool();
        self.emit(Instruction::If(cond, begin_label));
        self.consume(TokenKind::RightParen);
        self.consume(TokenKind::Semicolon);
        self.emit(Instruction::Label(next_label));

        self.break_labels.pop();
        self.continue_labels.pop();
    }

    fn parse_for(&mut self) {
        self.advance();
        self.consume(TokenKind::LeftParen);
        if self.cur.kind == TokenKind::Ident {
            let target = self.parse_id();
            self.parse_assignment(target);
        }
        self.consume(TokenKind::Semicolon);

        let begin_label = self.new_label();
        let true_label = self.new_label();
        let increment_label = self.new_label();
        let next_label = self.new_label();
        self.break_labels.push(next_label.clone());
        self.continue_labels.push(increment_label.clone());

        self.emit(Instruction::Label(begin_label.clone()));
        if starts_expression(self.cur.kind) {
            let cond = self.parse_bool();
            self.emit(Instruction::If(cond, true_label.clone()));
            self.emit(Instruction::Goto(next_label.clone()));
            self.emit(Instruction::Label(true_label));
        }
        self.consume(TokenKind::Semicolon);

        // the increment is written before the body but runs after it, so
        // park its instructions in a side buffer until the body is done
        let increment = if self.cur.kind == TokenKind::Ident {
            self.capture(|parser| {
                let target = parser.parse_id();
                parser.parse_assignment(target);
            })
        } else {
            Vec::new()
        };
        self.consume(TokenKind::RightParen);
        self.parse_statement();

        self.emit(Instruction::Label(increment_label));
        self.code.extend(increment);
        self.emit(Instruction::Goto(begin_label));
        self.emit(Instruction::Label(next_label));

        self.break_labels.pop();
        self.continue_labels.pop();
    }

    /// Case bodies are emitted first, in source order with real
    /// fall-through; the chain of equality tests dispatching into them only
    /// comes after the closing brace.
    fn parse_switch(&mut self) {
        self.advance();
        self.consume(TokenKind::LeftParen);
        let test_label = self.new_label();
        let default_label = self.new_label();
        let next_label = self.new_label();
        self.break_labels.push(next_label.clone());

        let cond = self.parse_bool();
        self.emit(Instruction::Goto(test_label.clone()));
        self.consume(TokenKind::RightParen);
        self.consume(TokenKind::LeftBrace);

        let mut cases = Vec::new();
        let mut has_default = false;
        while matches!(self.cur.kind, TokenKind::Case | TokenKind::Default) {
            if self.match_if(TokenKind::Default) {
                if has_default {
                    self.error(ErrorKind::MultipleDefaults);
                }
                has_default = true;
                self.consume(TokenKind::Colon);
                self.emit(Instruction::Label(default_label.clone()));
                self.parse_statements();
            } else {
                self.advance();
                // a non-literal case value computes here, in the previous
                // body's fall-through path; the dispatch below only reads
                // the finished temporary
                let value = self.parse_bool();
                self.consume(TokenKind::Colon);
                let case_label = self.new_label();
                self.emit(Instruction::Label(case_label.clone()));
                self.parse_statements();
                cases.push((value, case_label));
            }
        }
        self.consume(TokenKind::RightBrace);

        self.emit(Instruction::Goto(next_label.clone()));
        self.emit(Instruction::Label(test_label));
        for (value, case_label) in cases {
            let test = self.new_temp();
            self.emit(Instruction::Binary(
                BinaryOp::EqualEqual,
                test.clone(),
                cond.clone(),
                value,
            ));
            self.emit(Instruction::If(test, case_label));
        }
        if has_default {
            self.emit(Instruction::Goto(default_label));
        } else {
            self.emit(Instruction::Goto(next_label.clone()));
        }
        self.emit(Instruction::Label(next_label));

        self.break_labels.pop();
    }

    fn parse_return(&mut self) {
        self.advance();
        let value = if self.current_return_type != DataType::Void {
            Some(self.parse_bool())
        } else {
            if self.cur.kind != TokenKind::Semicolon {
                self.error(ErrorKind::ReturnInVoidFunction);
                self.parse_bool();
            }
            None
        };
        self.consume(TokenKind::Semicolon);
        self.emit(Instruction::Return(value));
    }

    fn parse_print_str(&mut self) {
        self.advance();
        self.consume(TokenKind::LeftParen);
        let operand = if self.cur.kind == TokenKind::Ident {
            self.parse_id()
        } else {
            // a literal gets its own char-array temporary filled in place
            let text = if self.cur.kind == TokenKind::String {
                self.cur.lexeme.clone()
            } else {
                String::new()
            };
            self.consume(TokenKind::String);
            let (name, buffer) = self.new_string_temp(text.len() as u32);
            self.copy_string(&name, &text);
            buffer
        };
        self.consume(TokenKind::RightParen);
        self.consume(TokenKind::Semicolon);
        self.emit(Instruction::PrintStr(operand));
    }

    /// An already-declared identifier used as a value: plain variable or
    /// indexed array element
    fn parse_id(&mut self) -> Operand {
        let name = self.cur.lexeme.clone();
        let line = self.cur.line;
        let symbol = match self.table.lookup(self.scope, &name) {
            Some(Symbol::Variable(var)) => Some((true, var.is_array)),
            Some(_) => Some((false, false)),
            None => None,
        };
        if symbol.is_none() {
            self.errors
                .push(Error::new(line, ErrorKind::UndeclaredIdentifier(name.clone())));
        }
        self.consume(TokenKind::Ident);

        if self.cur.kind == TokenKind::LeftBracket {
            if let Some((is_variable, is_array)) = symbol {
                if !is_variable || !is_array {
                    self.errors.push(Error::new(line, ErrorKind::NotAnArray(name.clone())));
                }
            }
            self.consume(TokenKind::LeftBracket);
            let index = self.parse_expression();
            self.consume(TokenKind::RightBracket);

            Operand::ArrayElement(name, Box::new(index), self.scope)
        } else {
            if let Some((is_variable, _)) = symbol {
                if !is_variable {
                    self.errors.push(Error::new(line, ErrorKind::NotAVariable(name.clone())));
                }
            }

            Operand::Variable(name, self.scope)
        }
    }

    fn parse_call(&mut self, name: String) -> Operand {
        let line = self.cur.line;
        let expected = match self.table.lookup(self.scope, &name) {
            Some(Symbol::Function(function)) => Some(function.parameters.len()),
            Some(_) => {
                self.errors.push(Error::new(line, ErrorKind::NotAFunction(name.clone())));
                None
            }
            None => {
                self.errors
                    .push(Error::new(line, ErrorKind::UndeclaredIdentifier(name.clone())));
                None
            }
        };

        let arguments = self.parse_arguments();
        if let Some(expected) = expected {
            if expected != arguments.len() {
                self.errors
                    .push(Error::new(line, ErrorKind::MismatchedArity(name.clone(), expected)));
            }
        }

        // cdecl: rightmost argument is pushed first, caller pops afterwards
        let cleanup = arguments.len() as i32 * 4;
        for argument in arguments.into_iter().rev() {
            self.emit(Instruction::Param(argument));
        }
        let result = self.new_temp();
        self.emit(Instruction::Call(result.clone(), Operand::Function(name)));
        self.emit(Instruction::IncStackPtr(Operand::Number(cleanup)));

        result
    }

    fn parse_arguments(&mut self) -> Vec<Operand> {
        self.consume(TokenKind::LeftParen);
        let mut arguments = Vec::new();
        if starts_expression(self.cur.kind) {
            loop {
                arguments.push(self.parse_bool());
                if !self.match_if(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen);

        arguments
    }

    // expression grammar, loosest binding first; every level flattens its
    // operator into a fresh temporary

    fn parse_bool(&mut self) -> Operand {
        if !starts_expression(self.cur.kind) {
            self.error(ErrorKind::ExpectedExpression);
            return Operand::Number(0);
        }

        let mut operand = self.parse_and();
        while self.cur.kind == TokenKind::PipePipe {
            self.advance();
            let result = self.new_temp();
            let right = self.parse_and();
            self.emit(Instruction::Binary(BinaryOp::Or, result.clone(), operand, right));
            operand = result;
        }

        operand
    }

    fn parse_and(&mut self) -> Operand {
        let mut operand = self.parse_equality();
        while self.cur.kind == TokenKind::AmpAmp {
            self.advance();
            let result = self.new_temp();
            let right = self.parse_equality();
            self.emit(Instruction::Binary(BinaryOp::And, result.clone(), operand, right));
            operand = result;
        }

        operand
    }

    fn parse_equality(&mut self) -> Operand {
        let mut operand = self.parse_relational();
        while matches!(self.cur.kind, TokenKind::EqualEqual | TokenKind::BangEqual) {
            let op = binary_op(self.cur.kind);
            self.advance();
            let result = self.new_temp();
            let right = self.parse_relational();
            self.emit(Instruction::Binary(op, result.clone(), operand, right));
            operand = result;
        }

        operand
    }

    fn parse_relational(&mut self) -> Operand {
        let mut operand = self.parse_expression();
        while matches!(
            self.cur.kind,
            TokenKind::Less | TokenKind::Greater | TokenKind::LessEqual | TokenKind::GreaterEqual
        ) {
            let op = binary_op(self.cur.kind);
            self.advance();
            let result = self.new_temp();
            let right = self.parse_expression();
            self.emit(Instruction::Binary(op, result.clone(), operand, right));
            operand = result;
        }

        operand
    }

    fn parse_expression(&mut self) -> Operand {
        let mut operand = self.parse_term();
        while matches!(self.cur.kind, TokenKind::Plus | TokenKind::Minus) {
            let op = binary_op(self.cur.kind);
            self.advance();
            let result = self.new_temp();
            let right = self.parse_term();
            self.emit(Instruction::Binary(op, result.clone(), operand, right));
            operand = result;
        }

        operand
    }

    fn parse_term(&mut self) -> Operand {
        let mut operand = self.parse_factor();
        while matches!(self.cur.kind, TokenKind::Star | TokenKind::Slash | TokenKind::Mod) {
            let op = binary_op(self.cur.kind);
            self.advance();
            let result = self.new_temp();
            let right = self.parse_factor();
            self.emit(Instruction::Binary(op, result.clone(), operand, right));
            operand = result;
        }

        operand
    }

    fn parse_factor(&mut self) -> Operand {
        match self.cur.kind {
            TokenKind::LeftParen => {
                self.advance();
                let operand = self.parse_bool();
                self.consume(TokenKind::RightParen);

                operand
            }
            TokenKind::Minus => {
                self.advance();
                let result = self.new_temp();
                let operand = self.parse_factor();
                self.emit(Instruction::Unary(UnaryOp::Neg, result.clone(), operand));

                result
            }
            TokenKind::Bang => {
                self.advance();
                let result = self.new_temp();
                let operand = self.parse_factor();
                self.emit(Instruction::Unary(UnaryOp::Not, result.clone(), operand));

                result
            }
            TokenKind::Ident => {
                if self.peek_kind() == TokenKind::LeftParen {
                    let name = self.cur.lexeme.clone();
                    self.advance();
                    self.parse_call(name)
                } else {
                    self.parse_id()
                }
            }
            TokenKind::Number => {
                let value = self.cur.value;
                self.advance();

                Operand::Number(value)
            }
            _ => {
                self.error(ErrorKind::ExpectedExpression);

                Operand::Number(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(input: &str) -> Vec<String> {
        let (code, _) = Parser::new(input).parse().expect("valid program");

        code.iter().map(|inst| inst.to_string()).collect()
    }

    fn setup_err(input: &str) -> Vec<ErrorKind> {
        let errors = Parser::new(input).parse().expect_err("invalid program");

        errors.into_iter().map(|e| e.kind).collect()
    }

    #[test]
    fn add_and_print() {
        assert_eq!(
            setup("int main() { int x, y; x = 3; y = 4; printInt(x + y); }"),
            vec![
                "main:",
                "\tenter 12",
                "\tx = 3",
                "\ty = 4",
                "\tt0 = x + y",
                "\tprintInt t0",
                "\treturn",
            ]
        );
    }

    #[test]
    fn expressions_flatten_to_single_operators() {
        assert_eq!(
            setup("int main() { int x; x = 1 + 2 * 3 - 4; }"),
            vec![
                "main:",
                "\tenter 16",
                "\tt1 = 2 * 3",
                "\tt0 = 1 + t1",
                "\tt2 = t0 - 4",
                "\tx = t2",
                "\treturn",
            ]
        );
    }

    #[test]
    fn parentheses_override_precedence() {
        let code = setup("int main() { int x; x = (1 + 2) * 3; }");

        assert!(code.contains(&"\tt0 = 1 + 2".to_string()));
        assert!(code.contains(&"\tt1 = t0 * 3".to_string()));
    }

    #[test]
    fn logical_and_unary_operators() {
        let code = setup("int main() { int a; a = 1; if (a > 0 && !a || -a < 0) a = 2; }");

        assert!(code.contains(&"\tt0 = a > 0".to_string()));
        assert!(code.contains(&"\tt2 = !a".to_string()));
        assert!(code.contains(&"\tt1 = t0 & t2".to_string()));
        assert!(code.contains(&"\tt4 = -a".to_string()));
        assert!(code.contains(&"\tt5 = t4 < 0".to_string()));
        assert!(code.contains(&"\tt3 = t1 | t5".to_string()));
    }

    #[test]
    fn frame_offsets_round_up_to_word_size() {
        // char c -> 0..1 rounds to 4, int i -> 4..8, char buf[6] -> 8..14
        // rounds to 16, int j -> 16..20
        let code = setup("int main() { char c; int i; char buf[6]; int j; }");

        assert_eq!(code[1], "\tenter 20");
    }

    #[test]
    fn lone_char_still_occupies_a_word() {
        assert_eq!(setup("int main() { char c; }")[1], "\tenter 4");
    }

    #[test]
    fn if_else_linearization() {
        assert_eq!(
            setup("int main() { int x; x = 1; if (x < 2) x = 2; else x = 3; }"),
            vec![
                "main:",
                "\tenter 8",
                "\tx = 1",
                "\tt0 = x < 2",
                "\tif t0 goto L2",
                "\tgoto L1",
                "L2:",
                "\tx = 2",
                "\tgoto L3",
                "L1:",
                "\tx = 3",
                "L3:",
                "\treturn",
            ]
        );
    }

    #[test]
    fn while_loop_linearization() {
        assert_eq!(
            setup("int main() { int i; i = 0; while (i < 3) { i++; } }"),
            vec![
                "main:",
                "\tenter 8",
                "\ti = 0",
                "L1:",
                "\tt0 = i < 3",
                "\tif t0 goto L2",
                "\tgoto L3",
                "L2:",
                "\ti = i + 1",
                "\tgoto L1",
                "L3:",
                "\treturn",
            ]
        );
    }

    #[test]
    fn do_while_tests_at_the_bottom() {
        assert_eq!(
            setup("int main() { int i; i = 5; do { i--; } while (i > 0); }"),
            vec![
                "main:",
                "\tenter 8",
                "\ti = 5",
                "L1:",
                "\ti = i - 1",
                "L2:",
                "\tt0 = i > 0",
                "\tif t0 goto L1",
                "L3:",
                "\treturn",
            ]
        );
    }

    #[test]
    fn continue_in_do_while_jumps_to_the_condition() {
        assert_eq!(
            setup("int main() { int i; i = 0; do { i = i + 1; continue; } while (i < 3); }"),
            vec![
                "main:",
                "\tenter 12",
                "\ti = 0",
                "L1:",
                "\tt0 = i + 1",
                "\ti = t0",
                "\tgoto L2",
                "L2:",
                "\tt1 = i < 3",
                "\tif t1 goto L1",
                "L3:",
                "\treturn",
            ]
        );
    }

    #[test]
    fn for_increment_is_spliced_after_the_body() {
        assert_eq!(
            setup("int main() { int i; for (i = 0; i < 3; i++) printInt(i); }"),
            vec![
                "main:",
                "\tenter 8",
                "\ti = 0",
                "L1:",
                "\tt0 = i < 3",
                "\tif t0 goto L2",
                "\tgoto L4",
                "L2:",
                "\tprintInt i",
                "L3:",
                "\ti = i + 1",
                "\tgoto L1",
                "L4:",
                "\treturn",
            ]
        );
    }

    #[test]
    fn switch_dispatch_is_linear_and_follows_the_bodies() {
        let code = setup(
            "int main() { int x; x = 2; \
             switch (x) { case 1: printInt(1); break; \
             case 2: printInt(2); \
             case 3: printInt(3); break; } }",
        );

        // three equality tests, all after the closing brace of the bodies
        let tests: Vec<&String> = code.iter().filter(|line| line.contains(" == ")).collect();
        assert_eq!(tests.len(), 3);
        assert_eq!(tests[0], "\tt0 = x == 1");
        assert_eq!(tests[1], "\tt1 = x == 2");
        assert_eq!(tests[2], "\tt2 = x == 3");

        // case 2 falls through into case 3: no jump between the two bodies
        let pos = code.iter().position(|line| line == "\tprintInt 2").unwrap();
        assert_eq!(code[pos + 1], "L6:");
        assert_eq!(code[pos + 2], "\tprintInt 3");

        // no default: the dispatch chain ends jumping to the end label
        let test_pos = code.iter().position(|line| line == "L1:").unwrap();
        assert!(code[test_pos..].contains(&"\tgoto L3".to_string()));
    }

    #[test]
    fn switch_default_catches_the_rest() {
        let code = setup(
            "int main() { int x; x = 9; \
             switch (x) { case 1: x = 0; break; default: x = 5; } }",
        );

        let dispatch = code.iter().position(|line| line == "\tif t0 goto L4").unwrap();
        assert_eq!(code[dispatch + 1], "\tgoto L2");
    }

    #[test]
    fn computed_case_value_settles_before_its_label() {
        let code = setup(
            "int main() { int x; x = 5; \
             switch (x) { case 1: printInt(1); break; case 2 + 3: printInt(2); } }",
        );

        // the value computes in the preceding fall-through path; the
        // dispatch reuses the finished temporary
        let pos = code.iter().position(|line| line == "\tt0 = 2 + 3").unwrap();
        assert_eq!(code[pos + 1], "L5:");
        assert!(code.contains(&"\tt2 = x == t0".to_string()));
    }

    #[test]
    fn call_pushes_arguments_in_reverse() {
        assert_eq!(
            setup("int foo(int a, int b) { return a; } int main() { printInt(foo(1, 2)); }"),
            vec![
                "foo:",
                "\tenter 0",
                "\treturn a",
                "\treturn",
                "main:",
                "\tenter 4",
                "\tparam 2",
                "\tparam 1",
                "\tt0 = call foo",
                "\tincStackPtr 8",
                "\tprintInt t0",
                "\treturn",
            ]
        );
    }

    #[test]
    fn string_initializer_unrolls_with_terminator() {
        assert_eq!(
            setup("int main() { char msg[6] = \"Hello\"; printStr(msg); }"),
            vec![
                "main:",
                "\tenter 8",
                "\tmsg[0] = 72",
                "\tmsg[1] = 101",
                "\tmsg[2] = 108",
                "\tmsg[3] = 108",
                "\tmsg[4] = 111",
                "\tmsg[5] = 0",
                "\tprintStr msg",
                "\treturn",
            ]
        );
    }

    #[test]
    fn brace_initializer_assigns_elements_in_order() {
        let code = setup("int main() { int a[3] = {1, 2, 4 + 4}; }");

        assert!(code.contains(&"\ta[0] = 1".to_string()));
        assert!(code.contains(&"\ta[1] = 2".to_string()));
        assert!(code.contains(&"\tt0 = 4 + 4".to_string()));
        assert!(code.contains(&"\ta[2] = t0".to_string()));
    }

    #[test]
    fn print_str_literal_gets_a_buffer_temporary() {
        assert_eq!(
            setup("int main() { printStr(\"hi\"); }"),
            vec![
                "main:",
                "\tenter 4",
                "\tt0[0] = 104",
                "\tt0[1] = 105",
                "\tt0[2] = 0",
                "\tprintStr t0",
                "\treturn",
            ]
        );
    }

    #[test]
    fn read_str_carries_the_limit() {
        let (code, _) = Parser::new("int main() { char buf[20]; readStr(buf, 19); }")
            .parse()
            .expect("valid program");

        assert!(code
            .iter()
            .any(|inst| matches!(inst, Instruction::ReadStr(_, Operand::Number(19)))));
        assert!(code.iter().any(|inst| inst.to_string() == "\treadStr buf"));
    }

    #[test]
    fn shadowing_in_nested_blocks_is_legal() {
        let code = setup("int main() { int x; x = 1; { int x; x = 2; } x = 3; }");

        assert_eq!(code[1], "\tenter 8");
    }

    #[test]
    fn redeclaration_in_same_scope() {
        assert_eq!(
            setup_err("int main() { int x; int x; }"),
            vec![ErrorKind::Redeclaration("x".to_string())]
        );
    }

    #[test]
    fn undeclared_identifier() {
        assert_eq!(
            setup_err("int main() { x = 1; }"),
            vec![ErrorKind::UndeclaredIdentifier("x".to_string())]
        );
    }

    #[test]
    fn indexing_a_scalar() {
        assert_eq!(
            setup_err("int main() { int x; x[0] = 1; }"),
            vec![ErrorKind::NotAnArray("x".to_string())]
        );
    }

    #[test]
    fn calling_a_variable() {
        assert_eq!(
            setup_err("int main() { int x; x(); }"),
            vec![ErrorKind::NotAFunction("x".to_string())]
        );
    }

    #[test]
    fn assigning_to_a_function() {
        assert_eq!(
            setup_err("void foo() { } int main() { foo = 1; }"),
            vec![ErrorKind::NotAVariable("foo".to_string())]
        );
    }

    #[test]
    fn wrong_argument_count() {
        let errors = setup_err("int foo(int a) { return a; } int main() { int x; x = foo(1, 2); }");

        assert_eq!(errors, vec![ErrorKind::MismatchedArity("foo".to_string(), 1)]);
        assert_eq!(errors[0].message(), "the function foo takes 1 argument(s).");
    }

    #[test]
    fn returning_a_value_from_void() {
        assert_eq!(
            setup_err("void foo() { return 5; } int main() { }"),
            vec![ErrorKind::ReturnInVoidFunction]
        );
    }

    #[test]
    fn break_and_continue_need_a_loop() {
        assert_eq!(setup_err("int main() { break; }"), vec![ErrorKind::BreakOutsideLoop]);
        assert_eq!(
            setup_err("int main() { continue; }"),
            vec![ErrorKind::ContinueOutsideLoop]
        );
    }

    #[test]
    fn continue_is_not_caught_by_switch() {
        assert_eq!(
            setup_err("int main() { int x; x = 1; switch (x) { case 1: continue; } }"),
            vec![ErrorKind::ContinueOutsideLoop]
        );
    }

    #[test]
    fn missing_main() {
        assert_eq!(setup_err("void foo() { }"), vec![ErrorKind::NoMainFunction]);
    }

    #[test]
    fn two_defaults_in_a_switch() {
        assert_eq!(
            setup_err(
                "int main() { int x; x = 1; \
                 switch (x) { default: x = 2; default: x = 3; } }"
            ),
            vec![ErrorKind::MultipleDefaults]
        );
    }

    #[test]
    fn errors_keep_the_pass_going() {
        // both errors on separate lines are recorded in order
        let errors = Parser::new("int main() {\n x = 1;\n y = 2;\n}")
            .parse()
            .expect_err("invalid program");

        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].line, 2);
        assert_eq!(errors[1].line, 3);
    }
}
