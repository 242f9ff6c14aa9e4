//! Three-address intermediate representation.
//!
//! Instructions are emitted by the [parser](crate::compiler::parser) while it
//! descends the source, so the program order of this list is already the
//! final control-flow linearization. `Display` renders the exact text that
//! ends up in the `.intermediate` file.

use crate::compiler::common::symbol_table::ScopeId;
use std::fmt::Display;

/// A value an instruction reads or writes. Variables and array elements are
/// late-bound: they carry the scope they were named in and are resolved
/// against the symbol table only during code generation, once all frame
/// offsets are final.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Number(i32),
    Label(String),
    Function(String),
    Variable(String, ScopeId),
    ArrayElement(String, Box<Operand>, ScopeId),
}

impl Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Operand::Number(n) => write!(f, "{}", n),
            Operand::Label(name) | Operand::Function(name) | Operand::Variable(name, _) => {
                write!(f, "{}", name)
            }
            Operand::ArrayElement(name, index, _) => write!(f, "{}[{}]", name, index),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    EqualEqual,
    BangEqual,
}
impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Less => "<",
            BinaryOp::Greater => ">",
            BinaryOp::LessEqual => "<=",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::EqualEqual => "==",
            BinaryOp::BangEqual => "!=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}
impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }
}

/// One three-address instruction. Operand arity is fixed by the variant
/// payloads, there is no separate opcode/operand-list representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// `dest = src`
    Assign(Operand, Operand),
    /// `dest = op src`
    Unary(UnaryOp, Operand, Operand),
    /// `dest = left op right`
    Binary(BinaryOp, Operand, Operand, Operand),
    /// `if cond goto target` (jump taken when cond is non-zero)
    If(Operand, Operand),
    Goto(Operand),
    /// Jump target; a `Function` operand marks a function entry, a `Label`
    /// operand a control-flow label
    Label(Operand),
    /// Push one argument slot
    Param(Operand),
    /// Function prologue with the frame size in bytes
    Enter(Operand),
    /// `dest = call function`
    Call(Operand, Operand),
    Return(Option<Operand>),
    /// Caller cleanup after a call
    IncStackPtr(Operand),
    PrintInt(Operand),
    PrintStr(Operand),
    PrintChar(Operand),
    ReadInt(Operand),
    /// Buffer and length limit; the limit is carried through even though the
    /// runtime read doesn't enforce it
    ReadStr(Operand, Operand),
}

impl Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Instruction::Assign(dest, src) => write!(f, "\t{} = {}", dest, src),
            Instruction::Unary(op, dest, src) => {
                write!(f, "\t{} = {}{}", dest, op.symbol(), src)
            }
            Instruction::Binary(op, dest, left, right) => {
                write!(f, "\t{} = {} {} {}", dest, left, op.symbol(), right)
            }
            Instruction::If(cond, target) => write!(f, "\tif {} goto {}", cond, target),
            Instruction::Goto(target) => write!(f, "\tgoto {}", target),
            Instruction::Label(name) => write!(f, "{}:", name),
            Instruction::Param(operand) => write!(f, "\tparam {}", operand),
            Instruction::Enter(size) => write!(f, "\tenter {}", size),
            Instruction::Call(dest, function) => write!(f, "\t{} = call {}", dest, function),
            Instruction::Return(None) => write!(f, "\treturn"),
            Instruction::Return(Some(value)) => write!(f, "\treturn {}", value),
            Instruction::IncStackPtr(amount) => write!(f, "\tincStackPtr {}", amount),
            Instruction::PrintInt(operand) => write!(f, "\tprintInt {}", operand),
            Instruction::PrintStr(operand) => write!(f, "\tprintStr {}", operand),
            Instruction::PrintChar(operand) => write!(f, "\tprintChar {}", operand),
            Instruction::ReadInt(operand) => write!(f, "\treadInt {}", operand),
            Instruction::ReadStr(buffer, _) => write!(f, "\treadStr {}", buffer),
        }
    }
}
