use thiserror::Error;

/// Failure to turn program text into a [`Program`](crate::program::Program).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("failed to parse int {token:?} at position {position}")]
    InvalidToken { token: String, position: usize },

    #[error("cannot patch address {addr}: program has {len} values")]
    PatchOutOfRange { addr: usize, len: usize },
}

/// Failure reported by an I/O port.
#[derive(Debug, Error)]
pub enum PortError {
    #[error("input closed")]
    InputClosed,

    #[error("output closed")]
    OutputClosed,

    #[error("console: {0}")]
    Console(#[from] std::io::Error),
}

/// Coarse category of a [`VmError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Decode,
    Operand,
    Io,
    Runaway,
}

/// Any condition that terminates a running machine.
#[derive(Debug, Error)]
pub enum VmError {
    #[error("unrecognised op {opcode} at position {pc}")]
    UnknownOpcode { opcode: i64, pc: usize },

    #[error("unrecognised mode {mode} for parameter {index} at position {pc}")]
    UnknownMode { mode: i64, index: usize, pc: usize },

    #[error("wanted {wanted} parameters but got {available} at position {pc}")]
    Truncated {
        pc: usize,
        wanted: usize,
        available: usize,
    },

    #[error("wanted address but parameter {index} is immediate at position {pc}")]
    ImmediateWrite { index: usize, pc: usize },

    #[error("negative address {0}")]
    NegativeAddress(i64),

    #[error("address {0} is beyond the tape limit")]
    AddressOutOfRange(i64),

    #[error("{op} at position {pc}")]
    Io {
        op: &'static str,
        pc: usize,
        #[source]
        source: PortError,
    },

    #[error("ran off the end of the tape at position {pc}")]
    RanOffEnd { pc: usize },

    #[error("step limit of {0} exceeded")]
    StepLimit(usize),
}

impl VmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VmError::UnknownOpcode { .. } | VmError::UnknownMode { .. } | VmError::Truncated { .. } => {
                ErrorKind::Decode
            }
            VmError::ImmediateWrite { .. }
            | VmError::NegativeAddress(_)
            | VmError::AddressOutOfRange(_) => ErrorKind::Operand,
            VmError::Io { .. } => ErrorKind::Io,
            VmError::RanOffEnd { .. } | VmError::StepLimit(_) => ErrorKind::Runaway,
        }
    }
}

/// Failure of an amplifier network as a whole.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline needs at least one stage")]
    Empty,

    #[error("could not seed the input queue of amplifier {stage}")]
    Seed { stage: usize },

    #[error("amplifier {stage} failed")]
    Stage {
        stage: usize,
        #[source]
        source: VmError,
    },

    #[error("amplifier {stage} panicked")]
    Panicked { stage: usize },

    #[error("pipeline produced no output")]
    NoOutput,
}
