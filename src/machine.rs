use crate::decode::{Instruction, decode};
use crate::error::VmError;
use crate::port::Port;
use crate::program::Program;
use crate::tape::Tape;

/// Configuration for a single machine.
#[derive(Debug, Clone, Default)]
pub struct MachineConfig {
    /// Abort with [`VmError::StepLimit`] after this many instructions.
    /// `None` runs until halt or error.
    pub step_limit: Option<usize>,
}

/// Outcome of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Running,
    Halted,
}

/// An Intcode machine: a private tape, a program counter, a relative base,
/// and the port that opcodes 3 and 4 talk to.
///
/// Execution is strictly sequential. The only points where a step can
/// block are the port calls.
pub struct Machine<P> {
    tape: Tape,
    pc: usize,
    base: i64,
    steps: usize,
    halted: bool,
    port: P,
    config: MachineConfig,
}

impl<P: Port> Machine<P> {
    pub fn new(program: &Program, port: P) -> Self {
        Self::with_config(program, port, MachineConfig::default())
    }

    pub fn with_config(program: &Program, port: P, config: MachineConfig) -> Self {
        Self::from_tape(program.load(), port, config)
    }

    pub fn from_tape(tape: Tape, port: P, config: MachineConfig) -> Self {
        Self {
            tape,
            pc: 0,
            base: 0,
            steps: 0,
            halted: false,
            port,
            config,
        }
    }

    /// Execute one instruction.
    pub fn step(&mut self) -> Result<Step, VmError> {
        if self.halted {
            return Ok(Step::Halted);
        }
        if let Some(limit) = self.config.step_limit {
            if self.steps >= limit {
                return Err(VmError::StepLimit(limit));
            }
        }
        let pc = self.pc;
        if pc >= self.tape.len() {
            return Err(VmError::RanOffEnd { pc });
        }

        let instruction = decode(&self.tape, pc, self.base)?;
        tracing::trace!("{pc:>4}: {instruction}");
        self.steps += 1;
        let next = pc + instruction.width();

        match instruction {
            Instruction::Add { a, b, dst } => {
                self.tape.set(dst, a.value.wrapping_add(b.value))?;
                self.pc = next;
            }
            Instruction::Multiply { a, b, dst } => {
                self.tape.set(dst, a.value.wrapping_mul(b.value))?;
                self.pc = next;
            }
            Instruction::Input { dst } => {
                let value = self.port.input().map_err(|source| VmError::Io {
                    op: "input",
                    pc,
                    source,
                })?;
                self.tape.set(dst, value)?;
                self.pc = next;
            }
            Instruction::Output { src } => {
                self.port.output(src.value).map_err(|source| VmError::Io {
                    op: "output",
                    pc,
                    source,
                })?;
                self.pc = next;
            }
            Instruction::JumpIfTrue { cond, target } => {
                self.pc = if cond.value != 0 {
                    jump(target.value)?
                } else {
                    next
                };
            }
            Instruction::JumpIfFalse { cond, target } => {
                self.pc = if cond.value == 0 {
                    jump(target.value)?
                } else {
                    next
                };
            }
            Instruction::LessThan { a, b, dst } => {
                self.tape.set(dst, i64::from(a.value < b.value))?;
                self.pc = next;
            }
            Instruction::Equals { a, b, dst } => {
                self.tape.set(dst, i64::from(a.value == b.value))?;
                self.pc = next;
            }
            Instruction::AdjustBase { delta } => {
                self.base = self.base.wrapping_add(delta.value);
                self.pc = next;
            }
            Instruction::Halt => {
                self.halted = true;
                return Ok(Step::Halted);
            }
        }
        Ok(Step::Running)
    }

    /// Run until halt. Returns the number of instructions executed.
    pub fn run(&mut self) -> Result<usize, VmError> {
        while self.step()? == Step::Running {}
        Ok(self.steps)
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn base(&self) -> i64 {
        self.base
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn tape(&self) -> &Tape {
        &self.tape
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    pub fn into_port(self) -> P {
        self.port
    }
}

fn jump(target: i64) -> Result<usize, VmError> {
    usize::try_from(target).map_err(|_| VmError::NegativeAddress(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, PortError};
    use crate::port::QueuePort;

    fn program(cells: &[i64]) -> Program {
        Program::new(cells.to_vec())
    }

    /// Run `cells` to halt with the given inputs, returning the outputs.
    fn run_io(cells: &[i64], inputs: &[i64]) -> Vec<i64> {
        let mut m = Machine::new(&program(cells), QueuePort::new(inputs.iter().copied()));
        m.run().unwrap();
        m.into_port().into_outputs()
    }

    const COMPARE_TO_EIGHT: &[i64] = &[
        3, 21, 1008, 21, 8, 20, 1005, 20, 22, 107, 8, 21, 20, 1006, 20, 31, 1106, 0, 36, 98, 0,
        0, 1002, 21, 125, 20, 4, 20, 1105, 1, 46, 104, 999, 1105, 1, 46, 1101, 1000, 1, 20, 4,
        20, 1105, 1, 46, 98, 99,
    ];

    #[test]
    fn test_add_multiply_program() {
        let mut m = Machine::new(
            &program(&[1, 9, 10, 3, 2, 3, 11, 0, 99, 30, 40, 50]),
            QueuePort::default(),
        );
        let steps = m.run().unwrap();
        assert_eq!(steps, 3);
        assert_eq!(m.tape().as_slice(), &[3500, 9, 10, 70, 2, 3, 11, 0, 99, 30, 40, 50]);
    }

    #[test]
    fn test_small_programs() {
        let cases: [(&[i64], &[i64]); 4] = [
            (&[1, 0, 0, 0, 99], &[2, 0, 0, 0, 99]),
            (&[2, 3, 0, 3, 99], &[2, 3, 0, 6, 99]),
            (&[2, 4, 4, 5, 99, 0], &[2, 4, 4, 5, 99, 9801]),
            (&[1, 1, 1, 4, 99, 5, 6, 0, 99], &[30, 1, 1, 4, 2, 5, 6, 0, 99]),
        ];
        for (code, expected) in cases {
            let mut m = Machine::new(&program(code), QueuePort::default());
            m.run().unwrap();
            assert_eq!(m.tape().as_slice(), expected);
        }
    }

    #[test]
    fn test_immediate_mode_multiply() {
        let mut m = Machine::new(&program(&[1002, 4, 3, 4, 33]), QueuePort::default());
        m.run().unwrap();
        assert_eq!(m.tape().as_slice(), &[1002, 4, 3, 4, 99]);
    }

    #[test]
    fn test_echo() {
        assert_eq!(run_io(&[3, 0, 4, 0, 99], &[-17]), vec![-17]);
    }

    #[test]
    fn test_comparisons() {
        // Position mode equals 8.
        let eq_pos = [3, 9, 8, 9, 10, 9, 4, 9, 99, -1, 8];
        assert_eq!(run_io(&eq_pos, &[8]), vec![1]);
        assert_eq!(run_io(&eq_pos, &[7]), vec![0]);
        // Immediate mode less than 8.
        let lt_imm = [3, 3, 1107, -1, 8, 3, 4, 3, 99];
        assert_eq!(run_io(&lt_imm, &[5]), vec![1]);
        assert_eq!(run_io(&lt_imm, &[8]), vec![0]);
    }

    #[test]
    fn test_jumps() {
        let jump_pos = [3, 12, 6, 12, 15, 1, 13, 14, 13, 4, 13, 99, -1, 0, 1, 9];
        assert_eq!(run_io(&jump_pos, &[0]), vec![0]);
        assert_eq!(run_io(&jump_pos, &[3]), vec![1]);
        let jump_imm = [3, 3, 1105, -1, 9, 1101, 0, 0, 12, 4, 12, 99, 1];
        assert_eq!(run_io(&jump_imm, &[0]), vec![0]);
        assert_eq!(run_io(&jump_imm, &[-4]), vec![1]);
    }

    #[test]
    fn test_compare_to_eight() {
        assert_eq!(run_io(COMPARE_TO_EIGHT, &[7]), vec![999]);
        assert_eq!(run_io(COMPARE_TO_EIGHT, &[8]), vec![1000]);
        assert_eq!(run_io(COMPARE_TO_EIGHT, &[9]), vec![1001]);
    }

    #[test]
    fn test_quine() {
        let quine = [109, 1, 204, -1, 1001, 100, 1, 100, 1008, 100, 16, 101, 1006, 101, 0, 99];
        assert_eq!(run_io(&quine, &[]), quine.to_vec());
    }

    #[test]
    fn test_large_numbers() {
        let out = run_io(&[1102, 34915192, 34915192, 7, 4, 7, 99, 0], &[]);
        assert_eq!(out, vec![1219070632396864]);
        let out = run_io(&[104, 1125899906842624, 99], &[]);
        assert_eq!(out, vec![1125899906842624]);
    }

    #[test]
    fn test_relative_base_adjust() {
        // rb = 5, then output relative -3 -> address 2, which holds 204.
        assert_eq!(run_io(&[109, 5, 204, -3, 99], &[]), vec![204]);
    }

    #[test]
    fn test_write_beyond_end_grows() {
        // Store input at 1000, read it back.
        let out = run_io(&[3, 1000, 4, 1000, 99], &[77]);
        assert_eq!(out, vec![77]);
    }

    #[test]
    fn test_ran_off_end() {
        let mut m = Machine::new(&program(&[1, 0, 0, 0]), QueuePort::default());
        let err = m.run().unwrap_err();
        assert!(matches!(err, VmError::RanOffEnd { pc: 4 }));
        assert_eq!(err.kind(), ErrorKind::Runaway);
        assert_eq!(m.tape().as_slice(), &[2, 0, 0, 0]);
    }

    #[test]
    fn test_unknown_opcode_stops() {
        let mut m = Machine::new(&program(&[104, 1, 42, 99]), QueuePort::default());
        let err = m.run().unwrap_err();
        assert!(matches!(err, VmError::UnknownOpcode { opcode: 42, pc: 2 }));
        assert_eq!(m.port().outputs(), &[1]);
    }

    #[test]
    fn test_input_closed_is_error() {
        let mut m = Machine::new(&program(&[3, 0, 99]), QueuePort::default());
        let err = m.run().unwrap_err();
        assert!(matches!(
            err,
            VmError::Io {
                op: "input",
                pc: 0,
                source: PortError::InputClosed
            }
        ));
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(m.tape().as_slice(), &[3, 0, 99]);
    }

    #[test]
    fn test_negative_jump() {
        let mut m = Machine::new(&program(&[1105, 1, -1]), QueuePort::default());
        assert!(matches!(m.run(), Err(VmError::NegativeAddress(-1))));
    }

    #[test]
    fn test_step_limit() {
        let config = MachineConfig {
            step_limit: Some(10),
        };
        let mut m = Machine::with_config(&program(&[1105, 1, 0]), QueuePort::default(), config);
        assert!(matches!(m.run(), Err(VmError::StepLimit(10))));
        assert_eq!(m.steps(), 10);
    }

    #[test]
    fn test_step_after_halt() {
        let mut m = Machine::new(&program(&[104, 3, 99]), QueuePort::default());
        assert_eq!(m.step().unwrap(), Step::Running);
        assert_eq!(m.pc(), 2);
        assert_eq!(m.step().unwrap(), Step::Halted);
        assert!(m.is_halted());
        assert_eq!(m.step().unwrap(), Step::Halted);
        assert_eq!(m.steps(), 2);
        assert_eq!(m.port().outputs(), &[3]);
    }

    #[test]
    fn test_borrowed_port() {
        let mut port = QueuePort::new([6]);
        {
            let mut m = Machine::new(&program(&[3, 0, 4, 0, 99]), &mut port);
            m.run().unwrap();
        }
        assert_eq!(port.outputs(), &[6]);
    }
}
