use std::fmt;

use crate::error::VmError;
use crate::tape::Tape;

/// How a parameter's raw value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// The raw value is an address; the operand is the cell stored there.
    Position,
    /// The raw value is the operand itself. Never a valid write target.
    Immediate,
    /// The raw value is an offset from the relative base.
    Relative,
}

impl Mode {
    pub fn from_digit(digit: i64) -> Option<Mode> {
        match digit {
            0 => Some(Mode::Position),
            1 => Some(Mode::Immediate),
            2 => Some(Mode::Relative),
            _ => None,
        }
    }
}

/// The mode digit of parameter `n` (1-based) in an instruction word.
pub fn mode_digit(word: i64, n: usize) -> i64 {
    (word / 10i64.pow(n as u32 + 1)) % 10
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Add,
    Multiply,
    Input,
    Output,
    JumpIfTrue,
    JumpIfFalse,
    LessThan,
    Equals,
    AdjustBase,
    Halt,
}

impl Opcode {
    pub fn from_word(word: i64) -> Option<Opcode> {
        match word % 100 {
            1 => Some(Opcode::Add),
            2 => Some(Opcode::Multiply),
            3 => Some(Opcode::Input),
            4 => Some(Opcode::Output),
            5 => Some(Opcode::JumpIfTrue),
            6 => Some(Opcode::JumpIfFalse),
            7 => Some(Opcode::LessThan),
            8 => Some(Opcode::Equals),
            9 => Some(Opcode::AdjustBase),
            99 => Some(Opcode::Halt),
            _ => None,
        }
    }

    /// Number of parameters following the opcode word.
    pub fn arity(self) -> usize {
        match self {
            Opcode::Add | Opcode::Multiply | Opcode::LessThan | Opcode::Equals => 3,
            Opcode::JumpIfTrue | Opcode::JumpIfFalse => 2,
            Opcode::Input | Opcode::Output | Opcode::AdjustBase => 1,
            Opcode::Halt => 0,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Add => "add",
            Opcode::Multiply => "mul",
            Opcode::Input => "in",
            Opcode::Output => "out",
            Opcode::JumpIfTrue => "jnz",
            Opcode::JumpIfFalse => "jz",
            Opcode::LessThan => "lt",
            Opcode::Equals => "eq",
            Opcode::AdjustBase => "arb",
            Opcode::Halt => "hlt",
        }
    }
}

/// A resolved read operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param {
    pub mode: Mode,
    /// The raw value stored in the instruction stream.
    pub raw: i64,
    /// Effective address, absent in immediate mode.
    pub addr: Option<i64>,
    pub value: i64,
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.mode, self.addr) {
            (Mode::Position, Some(addr)) => write!(f, "(*{addr} -> {})", self.value),
            (Mode::Relative, Some(addr)) => {
                write!(f, "(*rb{:+}={addr} -> {})", self.raw, self.value)
            }
            _ => write!(f, "{}", self.value),
        }
    }
}

/// One fully decoded instruction. Write targets are already resolved to
/// non-negative addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Add { a: Param, b: Param, dst: i64 },
    Multiply { a: Param, b: Param, dst: i64 },
    Input { dst: i64 },
    Output { src: Param },
    JumpIfTrue { cond: Param, target: Param },
    JumpIfFalse { cond: Param, target: Param },
    LessThan { a: Param, b: Param, dst: i64 },
    Equals { a: Param, b: Param, dst: i64 },
    AdjustBase { delta: Param },
    Halt,
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Add { .. } => Opcode::Add,
            Instruction::Multiply { .. } => Opcode::Multiply,
            Instruction::Input { .. } => Opcode::Input,
            Instruction::Output { .. } => Opcode::Output,
            Instruction::JumpIfTrue { .. } => Opcode::JumpIfTrue,
            Instruction::JumpIfFalse { .. } => Opcode::JumpIfFalse,
            Instruction::LessThan { .. } => Opcode::LessThan,
            Instruction::Equals { .. } => Opcode::Equals,
            Instruction::AdjustBase { .. } => Opcode::AdjustBase,
            Instruction::Halt => Opcode::Halt,
        }
    }

    /// Width in cells, opcode word included.
    pub fn width(&self) -> usize {
        self.opcode().arity() + 1
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.opcode().mnemonic();
        match self {
            Instruction::Add { a, b, dst } => write!(f, "{name}: {a} + {b} -> *{dst}"),
            Instruction::Multiply { a, b, dst } => write!(f, "{name}: {a} * {b} -> *{dst}"),
            Instruction::LessThan { a, b, dst } => write!(f, "{name}: {a} < {b} -> *{dst}"),
            Instruction::Equals { a, b, dst } => write!(f, "{name}: {a} == {b} -> *{dst}"),
            Instruction::Input { dst } => write!(f, "{name}: -> *{dst}"),
            Instruction::Output { src } => write!(f, "{name}: {src}"),
            Instruction::JumpIfTrue { cond, target } | Instruction::JumpIfFalse { cond, target } => {
                write!(f, "{name}: {cond} => {target}")
            }
            Instruction::AdjustBase { delta } => write!(f, "{name}: rb += {delta}"),
            Instruction::Halt => write!(f, "{name}"),
        }
    }
}

/// Parameter resolution for the instruction at `pc`.
struct Operands<'a> {
    tape: &'a Tape,
    pc: usize,
    word: i64,
    base: i64,
}

impl Operands<'_> {
    fn mode(&self, n: usize) -> Result<Mode, VmError> {
        let digit = mode_digit(self.word, n);
        Mode::from_digit(digit).ok_or(VmError::UnknownMode {
            mode: digit,
            index: n,
            pc: self.pc,
        })
    }

    fn read(&self, n: usize) -> Result<Param, VmError> {
        let mode = self.mode(n)?;
        let raw = self.tape.read(self.pc + n);
        let addr = match mode {
            Mode::Immediate => {
                return Ok(Param {
                    mode,
                    raw,
                    addr: None,
                    value: raw,
                });
            }
            Mode::Position => raw,
            Mode::Relative => self.base.wrapping_add(raw),
        };
        Ok(Param {
            mode,
            raw,
            addr: Some(addr),
            value: self.tape.get(addr)?,
        })
    }

    fn write(&self, n: usize) -> Result<i64, VmError> {
        let raw = self.tape.read(self.pc + n);
        let addr = match self.mode(n)? {
            Mode::Immediate => {
                return Err(VmError::ImmediateWrite {
                    index: n,
                    pc: self.pc,
                });
            }
            Mode::Position => raw,
            Mode::Relative => self.base.wrapping_add(raw),
        };
        if addr < 0 {
            return Err(VmError::NegativeAddress(addr));
        }
        Ok(addr)
    }
}

/// Decode the instruction at `pc` against the relative base `base`.
///
/// The caller guarantees `pc < tape.len()`. All parameters of the
/// instruction must lie within the tape.
pub fn decode(tape: &Tape, pc: usize, base: i64) -> Result<Instruction, VmError> {
    let word = tape.read(pc);
    let opcode = Opcode::from_word(word).ok_or(VmError::UnknownOpcode {
        opcode: word % 100,
        pc,
    })?;

    let available = tape.len().saturating_sub(pc + 1);
    if available < opcode.arity() {
        return Err(VmError::Truncated {
            pc,
            wanted: opcode.arity(),
            available,
        });
    }

    let ops = Operands {
        tape,
        pc,
        word,
        base,
    };
    let instruction = match opcode {
        Opcode::Add => Instruction::Add {
            a: ops.read(1)?,
            b: ops.read(2)?,
            dst: ops.write(3)?,
        },
        Opcode::Multiply => Instruction::Multiply {
            a: ops.read(1)?,
            b: ops.read(2)?,
            dst: ops.write(3)?,
        },
        Opcode::Input => Instruction::Input { dst: ops.write(1)? },
        Opcode::Output => Instruction::Output { src: ops.read(1)? },
        Opcode::JumpIfTrue => Instruction::JumpIfTrue {
            cond: ops.read(1)?,
            target: ops.read(2)?,
        },
        Opcode::JumpIfFalse => Instruction::JumpIfFalse {
            cond: ops.read(1)?,
            target: ops.read(2)?,
        },
        Opcode::LessThan => Instruction::LessThan {
            a: ops.read(1)?,
            b: ops.read(2)?,
            dst: ops.write(3)?,
        },
        Opcode::Equals => Instruction::Equals {
            a: ops.read(1)?,
            b: ops.read(2)?,
            dst: ops.write(3)?,
        },
        Opcode::AdjustBase => Instruction::AdjustBase { delta: ops.read(1)? },
        Opcode::Halt => Instruction::Halt,
    };
    Ok(instruction)
}

/// Static listing of a program. Words that do not start a complete,
/// well-formed instruction are listed as data.
pub fn disassemble(code: &[i64]) -> String {
    use std::fmt::Write;
    let mut out = String::new();
    let mut pc = 0;
    while pc < code.len() {
        let word = code[pc];
        let listed = Opcode::from_word(word).and_then(|op| {
            let arity = op.arity();
            if pc + arity >= code.len() {
                return None;
            }
            let mut operands = Vec::with_capacity(arity);
            for n in 1..=arity {
                let raw = code[pc + n];
                let text = match Mode::from_digit(mode_digit(word, n))? {
                    Mode::Position => format!("*{raw}"),
                    Mode::Immediate => format!("{raw}"),
                    Mode::Relative => format!("rb{raw:+}"),
                };
                operands.push(text);
            }
            Some((op, operands))
        });
        match listed {
            Some((op, operands)) if operands.is_empty() => {
                let _ = writeln!(out, "{pc:04}: {}", op.mnemonic());
                pc += 1;
            }
            Some((op, operands)) => {
                let _ = writeln!(out, "{pc:04}: {:<4}{}", op.mnemonic(), operands.join(", "));
                pc += op.arity() + 1;
            }
            None => {
                let _ = writeln!(out, "{pc:04}: {word}  (data)");
                pc += 1;
            }
        }
    }
    out
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn random_words_never_panic(
            cells in prop::collection::vec(any::<i64>(), 1..32),
            base in -64i64..64
        ) {
            let t = Tape::new(cells);
            let _ = decode(&t, 0, base);
        }

        #[test]
        fn disassembly_covers_every_cell(cells in prop::collection::vec(-200i64..22300, 0..64)) {
            let listing = disassemble(&cells);
            let lines = listing.lines().count();
            prop_assert!(lines <= cells.len());
            prop_assert_eq!(cells.is_empty(), lines == 0);
        }
    }
}
