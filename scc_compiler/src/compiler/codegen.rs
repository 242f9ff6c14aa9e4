//! Translates the three-address instruction list into 32-bit x86 NASM text.
//!
//! Register conventions follow a fixed scheme instead of an allocator:
//! `eax` is the accumulator for every value move, `ecx`/`edx` are scratch
//! (second operands, division, comparison flags), `esi` holds array indices
//! and `ebx` the base pointer of argument arrays. Every value round-trips
//! through its stack slot between instructions.

use crate::compiler::common::symbol_table::{
    DataType, ScopeId, Symbol, SymbolTable, VariableKind, VariableSymbol,
};
use crate::compiler::ir::{BinaryOp, Instruction, Operand, UnaryOp};

#[cfg(target_os = "macos")]
pub const SYMBOL_PREFIX: &str = "_";
#[cfg(not(target_os = "macos"))]
pub const SYMBOL_PREFIX: &str = "";

/// Object format handed to nasm by the driver
#[cfg(target_os = "macos")]
pub const OBJECT_FORMAT: &str = "macho";
#[cfg(not(target_os = "macos"))]
pub const OBJECT_FORMAT: &str = "elf";

fn low_byte(reg: &str) -> &'static str {
    match reg {
        "eax" => "al",
        "ecx" => "cl",
        "edx" => "dl",
        _ => unreachable!("no byte access for {}", reg),
    }
}

fn alu_mnemonic(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "add",
        BinaryOp::Sub => "sub",
        BinaryOp::And => "and",
        BinaryOp::Or => "or",
        _ => unreachable!("not a direct alu op"),
    }
}

fn set_mnemonic(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Less => "setl",
        BinaryOp::Greater => "setg",
        BinaryOp::LessEqual => "setle",
        BinaryOp::GreaterEqual => "setge",
        BinaryOp::EqualEqual => "sete",
        BinaryOp::BangEqual => "setne",
        _ => unreachable!("not a comparison op"),
    }
}

pub struct CodeGenerator<'a> {
    table: &'a SymbolTable,
    output: Vec<String>,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(table: &'a SymbolTable) -> Self {
        CodeGenerator { table, output: Vec::new() }
    }

    pub fn generate(mut self, code: &[Instruction]) -> String {
        self.prologue();
        for instruction in code {
            if !matches!(instruction, Instruction::Label(_)) {
                self.comment(instruction);
            }
            self.instruction(instruction);
        }

        self.output.join("\n") + "\n"
    }

    fn prologue(&mut self) {
        self.line(format!("\textern {}printf", SYMBOL_PREFIX));
        self.line(format!("\textern {}scanf", SYMBOL_PREFIX));
        self.line(format!("\textern {}gets", SYMBOL_PREFIX));
        self.line(String::new());
        self.line("\tsegment .data".to_string());
        self.line("__int_format: db \"%d\", 0".to_string());
        self.line("__char_format: db \"%c\", 0".to_string());
        self.line("__str_format: db \"%s\", 0".to_string());
        self.line(String::new());
        self.line("\tsegment .text".to_string());
        self.line(format!("\tglobal {}main", SYMBOL_PREFIX));
        self.line(String::new());
    }

    fn line(&mut self, text: String) {
        self.output.push(text);
    }
    fn comment(&mut self, instruction: &Instruction) {
        let text = instruction.to_string();
        self.line(format!("\t; {}", text.trim_start_matches('\t')));
    }
    fn instr0(&mut self, mnemonic: &str) {
        self.line(format!("\t{}", mnemonic));
    }
    fn instr1(&mut self, mnemonic: &str, operand: &str) {
        self.line(format!("\t{} \t{}", mnemonic, operand));
    }
    fn instr2(&mut self, mnemonic: &str, first: &str, second: &str) {
        self.line(format!("\t{} \t{}, {}", mnemonic, first, second));
    }

    /// Operands were recorded by name during parsing; resolve them now that
    /// the table is complete. Only reachable for error-free programs.
    fn variable(&self, name: &str, scope: ScopeId) -> &VariableSymbol {
        match self.table.lookup(scope, name) {
            Some(Symbol::Variable(var)) => var,
            _ => unreachable!("operand '{}' was declared during parsing", name),
        }
    }

    /// Frame-relative address of a variable or array element, without a size
    /// keyword. Array elements emit their index setup as a side effect.
    fn address(&mut self, operand: &Operand) -> String {
        match operand {
            Operand::Variable(name, scope) => {
                let symbol = self.variable(name, *scope);
                match symbol.kind {
                    VariableKind::Local => format!("[ebp - {}]", symbol.offset + symbol.size),
                    VariableKind::Argument => format!("[ebp + {}]", symbol.offset + 8),
                }
            }
            Operand::ArrayElement(name, index, scope) => {
                let symbol = self.variable(name, *scope).clone();
                match symbol.kind {
                    VariableKind::Local => {
                        self.load("esi", index);
                        format!(
                            "[ebp + esi * {} - {}]",
                            symbol.element_size,
                            symbol.offset + symbol.size
                        )
                    }
                    VariableKind::Argument => {
                        // the slot holds a pointer to the caller's array
                        let slot = format!("dword [ebp + {}]", symbol.offset + 8);
                        self.instr2("mov", "ebx", &slot);
                        self.load("esi", index);
                        format!("[ebx + esi * {}]", symbol.element_size)
                    }
                }
            }
            _ => unreachable!("labels have no address"),
        }
    }

    /// Memory operand with its size keyword, or a bare immediate
    fn sized(&mut self, operand: &Operand) -> String {
        match operand {
            Operand::Number(n) => n.to_string(),
            Operand::Variable(name, scope) | Operand::ArrayElement(name, _, scope) => {
                let keyword = match self.variable(name, *scope).data_type {
                    DataType::Char => "byte",
                    _ => "dword",
                };
                let address = self.address(operand);
                format!("{} {}", keyword, address)
            }
            _ => unreachable!("labels have no memory operand"),
        }
    }

    /// Loads the value of an operand into `reg`. Chars widen with sign
    /// extension; naming a whole array yields its address (local) or the
    /// passed-in pointer (argument).
    fn load(&mut self, reg: &'static str, operand: &Operand) {
        match operand {
            Operand::Number(n) => self.instr2("mov", reg, &n.to_string()),
            Operand::Variable(name, scope) | Operand::ArrayElement(name, _, scope) => {
                let symbol = self.variable(name, *scope).clone();
                if symbol.is_array && matches!(operand, Operand::Variable(..)) {
                    match symbol.kind {
                        VariableKind::Local => {
                            let address = self.address(operand);
                            self.instr2("lea", reg, &address);
                        }
                        VariableKind::Argument => {
                            let address = self.address(operand);
                            self.instr2("mov", reg, &format!("dword {}", address));
                        }
                    }
                } else if symbol.data_type == DataType::Char {
                    let source = self.sized(operand);
                    self.instr2("movsx", reg, &source);
                } else {
                    let source = self.sized(operand);
                    self.instr2("mov", reg, &source);
                }
            }
            _ => unreachable!("labels are never loaded"),
        }
    }

    /// Address-of for the I/O calls; argument arrays already hold an address
    fn load_address(&mut self, reg: &'static str, operand: &Operand) {
        match operand {
            Operand::Variable(name, scope) => {
                let symbol = self.variable(name, *scope).clone();
                if symbol.is_array && symbol.kind == VariableKind::Argument {
                    let address = self.address(operand);
                    self.instr2("mov", reg, &format!("dword {}", address));
                } else {
                    let address = self.address(operand);
                    self.instr2("lea", reg, &address);
                }
            }
            Operand::ArrayElement(..) => {
                let address = self.address(operand);
                self.instr2("lea", reg, &address);
            }
            _ => unreachable!("can only take the address of a variable"),
        }
    }

    /// Stores `reg` into a variable or array element, through the low byte
    /// for chars
    fn store(&mut self, operand: &Operand, reg: &'static str) {
        let source = match operand {
            Operand::Variable(name, scope) | Operand::ArrayElement(name, _, scope)
                if self.variable(name, *scope).data_type == DataType::Char =>
            {
                low_byte(reg)
            }
            _ => reg,
        };
        let dest = self.sized(operand);
        self.instr2("mov", &dest, source);
    }

    /// Second alu operand: immediates and dword memory work directly,
    /// byte-sized memory has to widen through `ecx` first
    fn second_operand(&mut self, operand: &Operand) -> String {
        match operand {
            Operand::Variable(name, scope) | Operand::ArrayElement(name, _, scope)
                if self.variable(name, *scope).data_type == DataType::Char =>
            {
                self.load("ecx", operand);
                "ecx".to_string()
            }
            _ => self.sized(operand),
        }
    }

    fn name(&self, operand: &Operand) -> String {
        match operand {
            Operand::Label(label) => label.clone(),
            Operand::Function(function) => format!("{}{}", SYMBOL_PREFIX, function),
            _ => unreachable!("jump targets are labels"),
        }
    }

    fn instruction(&mut self, instruction: &Instruction) {
        match instruction {
            Instruction::Assign(dest, src) => match src {
                Operand::Number(n) => {
                    let dest = self.sized(dest);
                    self.instr2("mov", &dest, &n.to_string());
                }
                _ => {
                    self.load("eax", src);
                    self.store(dest, "eax");
                }
            },
            Instruction::Unary(UnaryOp::Neg, dest, src) => {
                self.load("eax", src);
                self.instr1("neg", "eax");
                self.store(dest, "eax");
            }
            Instruction::Unary(UnaryOp::Not, dest, src) => {
                self.instr2("xor", "edx", "edx");
                self.load("eax", src);
                self.instr2("cmp", "eax", "0");
                self.instr1("sete", "dl");
                self.store(dest, "edx");
            }
            Instruction::Binary(op, dest, left, right) => self.binary(*op, dest, left, right),
            Instruction::If(cond, target) => {
                self.load("eax", cond);
                self.instr2("cmp", "eax", "0");
                let target = self.name(target);
                self.instr1("jne", &target);
            }
            Instruction::Goto(target) => {
                let target = self.name(target);
                self.instr1("jmp", &target);
            }
            Instruction::Label(label) => {
                let label = self.name(label);
                self.line(format!("{}:", label));
            }
            Instruction::Param(operand) => self.param(operand),
            Instruction::Enter(size) => {
                self.instr1("push", "ebp");
                self.instr2("mov", "ebp", "esp");
                self.instr2("sub", "esp", &size.to_string());
            }
            Instruction::Call(dest, function) => {
                let function = self.name(function);
                self.instr1("call", &function);
                self.store(dest, "eax");
            }
            Instruction::Return(value) => {
                if let Some(value) = value {
                    self.load("eax", value);
                }
                self.instr2("mov", "esp", "ebp");
                self.instr1("pop", "ebp");
                self.instr0("ret");
            }
            Instruction::IncStackPtr(amount) => {
                self.instr2("add", "esp", &amount.to_string());
            }
            Instruction::PrintInt(value) => {
                self.load("eax", value);
                self.instr1("push", "eax");
                self.instr1("push", "dword __int_format");
                self.call_external("printf");
                self.instr2("add", "esp", "8");
            }
            Instruction::PrintChar(value) => {
                self.load("eax", value);
                self.instr1("push", "eax");
                self.instr1("push", "dword __char_format");
                self.call_external("printf");
                self.instr2("add", "esp", "8");
            }
            Instruction::PrintStr(buffer) => {
                self.load_address("eax", buffer);
                self.instr1("push", "eax");
                self.instr1("push", "dword __str_format");
                self.call_external("printf");
                self.instr2("add", "esp", "8");
            }
            Instruction::ReadInt(target) => {
                self.load_address("eax", target);
                self.instr1("push", "eax");
                self.instr1("push", "dword __int_format");
                self.call_external("scanf");
                self.instr2("add", "esp", "8");
            }
            Instruction::ReadStr(buffer, _) => {
                self.load_address("eax", buffer);
                self.instr1("push", "eax");
                self.call_external("gets");
                self.instr2("add", "esp", "4");
            }
        }
    }

    fn binary(&mut self, op: BinaryOp, dest: &Operand, left: &Operand, right: &Operand) {
        match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::And | BinaryOp::Or => {
                self.load("eax", left);
                let right = self.second_operand(right);
                self.instr2(alu_mnemonic(op), "eax", &right);
                self.store(dest, "eax");
            }
            BinaryOp::Mul => {
                self.load("eax", left);
                let right = self.mul_div_operand(right);
                self.instr1("imul", &right);
                self.store(dest, "eax");
            }
            BinaryOp::Div | BinaryOp::Mod => {
                self.load("eax", left);
                self.instr0("cdq");
                let right = self.mul_div_operand(right);
                self.instr1("idiv", &right);
                // quotient lands in eax, remainder in edx
                let result = if op == BinaryOp::Div { "eax" } else { "edx" };
                self.store(dest, result);
            }
            BinaryOp::Less
            | BinaryOp::Greater
            | BinaryOp::LessEqual
            | BinaryOp::GreaterEqual
            | BinaryOp::EqualEqual
            | BinaryOp::BangEqual => {
                self.instr2("xor", "edx", "edx");
                self.load("eax", left);
                self.load("ecx", right);
                self.instr2("cmp", "eax", "ecx");
                self.instr1(set_mnemonic(op), "dl");
                self.store(dest, "edx");
            }
        }
    }

    /// `imul`/`idiv` take no immediates, route them through `ecx`
    fn mul_div_operand(&mut self, operand: &Operand) -> String {
        match operand {
            Operand::Number(n) => {
                self.instr2("mov", "ecx", &n.to_string());
                "ecx".to_string()
            }
            _ => self.second_operand(operand),
        }
    }

    fn param(&mut self, operand: &Operand) {
        match operand {
            Operand::Number(n) => self.instr1("push", &n.to_string()),
            Operand::Variable(name, scope) | Operand::ArrayElement(name, _, scope) => {
                let symbol = self.variable(name, *scope).clone();
                let whole_array = symbol.is_array && matches!(operand, Operand::Variable(..));
                if whole_array || symbol.data_type == DataType::Char {
                    self.load("eax", operand);
                    self.instr1("push", "eax");
                } else {
                    let slot = self.sized(operand);
                    self.instr1("push", &slot);
                }
            }
            _ => unreachable!("labels are never pushed"),
        }
    }

    fn call_external(&mut self, name: &str) {
        let name = format!("{}{}", SYMBOL_PREFIX, name);
        self.instr1("call", &name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::parser::Parser;

    fn setup(input: &str) -> String {
        let (code, table) = Parser::new(input).parse().expect("valid program");

        CodeGenerator::new(&table).generate(&code)
    }

    #[test]
    fn prologue_declares_externs_and_formats() {
        let asm = setup("int main() { }");

        assert!(asm.contains(&format!("\textern {}printf", SYMBOL_PREFIX)));
        assert!(asm.contains("__int_format: db \"%d\", 0"));
        assert!(asm.contains(&format!("\tglobal {}main", SYMBOL_PREFIX)));
    }

    #[test]
    fn function_prologue_and_epilogue() {
        let asm = setup("int main() { int x; }");

        assert!(asm.contains(&format!("{}main:", SYMBOL_PREFIX)));
        assert!(asm.contains("\tpush \tebp"));
        assert!(asm.contains("\tmov \tebp, esp"));
        assert!(asm.contains("\tsub \tesp, 4"));
        assert!(asm.contains("\tmov \tesp, ebp"));
        assert!(asm.contains("\tpop \tebp"));
        assert!(asm.contains("\tret"));
    }

    #[test]
    fn locals_are_frame_relative() {
        let asm = setup("int main() { int x, y; x = 3; y = x; }");

        assert!(asm.contains("\tmov \tdword [ebp - 4], 3"));
        assert!(asm.contains("\tmov \teax, dword [ebp - 4]"));
        assert!(asm.contains("\tmov \tdword [ebp - 8], eax"));
    }

    #[test]
    fn arguments_sit_above_the_return_address() {
        let asm = setup("int foo(int a, int b) { return b; } int main() { int x; x = foo(1, 2); }");

        assert!(asm.contains("\tmov \teax, dword [ebp + 12]"));
    }

    #[test]
    fn array_elements_use_scaled_indexing() {
        let asm = setup("int main() { int a[5]; int i; i = 2; a[i] = 7; }");

        assert!(asm.contains("\tmov \tesi, dword [ebp - 24]"));
        assert!(asm.contains("\tmov \tdword [ebp + esi * 4 - 20], 7"));
    }

    #[test]
    fn argument_arrays_are_pointers() {
        let asm = setup("void foo(int a[]) { a[0] = 1; } int main() { int a[2]; foo(a); }");

        // callee goes through the passed-in base pointer
        assert!(asm.contains("\tmov \tebx, dword [ebp + 8]"));
        assert!(asm.contains("\tmov \tdword [ebx + esi * 4], 1"));
        // caller pushes the address of its local array
        assert!(asm.contains("\tlea \teax, [ebp - 8]"));
        assert!(asm.contains("\tpush \teax"));
    }

    #[test]
    fn chars_load_sign_extended_and_store_through_low_byte() {
        let asm = setup("int main() { char c; int x; c = 65; x = c; }");

        assert!(asm.contains("\tmov \tbyte [ebp - 1], 65"));
        assert!(asm.contains("\tmovsx \teax, byte [ebp - 1]"));
    }

    #[test]
    fn char_assignment_from_register_uses_al() {
        let asm = setup("int main() { char c; int x; x = 65; c = x; }");

        assert!(asm.contains("\tmov \tbyte [ebp - 1], al"));
    }

    #[test]
    fn comparisons_materialize_the_flag() {
        let asm = setup("int main() { int x; x = 1 < 2; }");

        assert!(asm.contains("\txor \tedx, edx"));
        assert!(asm.contains("\tcmp \teax, ecx"));
        assert!(asm.contains("\tsetl \tdl"));
        assert!(asm.contains("\tmov \tdword [ebp - 8], edx"));
    }

    #[test]
    fn division_sign_extends_and_mod_keeps_edx() {
        let div = setup("int main() { int x; x = 7 / 2; }");
        assert!(div.contains("\tcdq"));
        assert!(div.contains("\tmov \tecx, 2"));
        assert!(div.contains("\tidiv \tecx"));
        assert!(div.contains("\tmov \tdword [ebp - 8], eax"));

        let modulo = setup("int main() { int x; x = 7 % 2; }");
        assert!(modulo.contains("\tmov \tdword [ebp - 8], edx"));
    }

    #[test]
    fn conditional_jumps_test_against_zero() {
        let asm = setup("int main() { int x; x = 1; if (x) x = 2; }");

        assert!(asm.contains("\tcmp \teax, 0"));
        assert!(asm.contains("\tjne \tL2"));
        assert!(asm.contains("L1:"));
    }

    #[test]
    fn unary_operators() {
        let asm = setup("int main() { int x; x = -5; x = !x; }");

        assert!(asm.contains("\tneg \teax"));
        assert!(asm.contains("\tsete \tdl"));
    }

    #[test]
    fn calls_clean_up_the_stack() {
        let asm = setup("void foo() { } int main() { foo(); }");

        assert!(asm.contains(&format!("\tcall \t{}foo", SYMBOL_PREFIX)));
        assert!(asm.contains("\tadd \tesp, 0"));
    }

    #[test]
    fn print_int_calls_printf() {
        let asm = setup("int main() { printInt(42); }");

        assert!(asm.contains("\tmov \teax, 42"));
        assert!(asm.contains("\tpush \teax"));
        assert!(asm.contains("\tpush \tdword __int_format"));
        assert!(asm.contains(&format!("\tcall \t{}printf", SYMBOL_PREFIX)));
        assert!(asm.contains("\tadd \tesp, 8"));
    }

    #[test]
    fn print_str_pushes_the_buffer_address() {
        let asm = setup("int main() { char msg[4] = \"hi\"; printStr(msg); }");

        assert!(asm.contains("\tlea \teax, [ebp - 4]"));
        assert!(asm.contains("\tpush \tdword __str_format"));
    }

    #[test]
    fn read_str_calls_gets() {
        let asm = setup("int main() { char b[8]; readStr(b, 7); }");

        assert!(asm.contains(&format!("\tcall \t{}gets", SYMBOL_PREFIX)));
        assert!(asm.contains("\tadd \tesp, 4"));
    }

    #[test]
    fn every_instruction_gets_a_comment() {
        let asm = setup("int main() { int x; x = 3; }");

        assert!(asm.contains("\t; enter 4"));
        assert!(asm.contains("\t; x = 3"));
        assert!(asm.contains("\t; return"));
    }
}
