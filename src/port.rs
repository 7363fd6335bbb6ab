use std::collections::VecDeque;
use std::io::{BufRead, Write};

use crossbeam_channel::{Receiver, Sender};

use crate::error::PortError;

/// The I/O capability a machine is bound to.
///
/// Opcode 3 calls `input`, opcode 4 calls `output`. Either may block. An
/// `Err` terminates the machine; a closed input is never read as zero.
pub trait Port {
    fn input(&mut self) -> Result<i64, PortError>;
    fn output(&mut self, value: i64) -> Result<(), PortError>;
}

impl<P: Port + ?Sized> Port for &mut P {
    fn input(&mut self) -> Result<i64, PortError> {
        (**self).input()
    }

    fn output(&mut self, value: i64) -> Result<(), PortError> {
        (**self).output(value)
    }
}

impl<P: Port + ?Sized> Port for Box<P> {
    fn input(&mut self) -> Result<i64, PortError> {
        (**self).input()
    }

    fn output(&mut self, value: i64) -> Result<(), PortError> {
        (**self).output(value)
    }
}

/// In-memory port: a fixed input queue and a collected output list.
///
/// Once the queued inputs are used up, further reads report
/// [`PortError::InputClosed`].
#[derive(Debug, Clone, Default)]
pub struct QueuePort {
    inputs: VecDeque<i64>,
    outputs: Vec<i64>,
}

impl QueuePort {
    pub fn new(inputs: impl IntoIterator<Item = i64>) -> Self {
        Self {
            inputs: inputs.into_iter().collect(),
            outputs: Vec::new(),
        }
    }

    pub fn push_input(&mut self, value: i64) {
        self.inputs.push_back(value);
    }

    pub fn outputs(&self) -> &[i64] {
        &self.outputs
    }

    pub fn last_output(&self) -> Option<i64> {
        self.outputs.last().copied()
    }

    pub fn into_outputs(self) -> Vec<i64> {
        self.outputs
    }
}

impl Port for QueuePort {
    fn input(&mut self) -> Result<i64, PortError> {
        self.inputs.pop_front().ok_or(PortError::InputClosed)
    }

    fn output(&mut self, value: i64) -> Result<(), PortError> {
        self.outputs.push(value);
        Ok(())
    }
}

/// Create the queue between two stages. `None` is unbounded.
pub fn queue(capacity: Option<usize>) -> (Sender<i64>, Receiver<i64>) {
    match capacity {
        Some(cap) => crossbeam_channel::bounded(cap),
        None => crossbeam_channel::unbounded(),
    }
}

/// Port backed by a pair of blocking queues.
///
/// The input queue is closed when every sender is dropped; the output
/// queue is closed by dropping this port. Values already queued stay
/// readable after the producer is gone.
pub struct ChannelPort {
    input: Receiver<i64>,
    output: Sender<i64>,
}

impl ChannelPort {
    pub fn new(input: Receiver<i64>, output: Sender<i64>) -> Self {
        Self { input, output }
    }
}

impl Port for ChannelPort {
    fn input(&mut self) -> Result<i64, PortError> {
        self.input.recv().map_err(|_| PortError::InputClosed)
    }

    fn output(&mut self, value: i64) -> Result<(), PortError> {
        self.output.send(value).map_err(|_| PortError::OutputClosed)
    }
}

/// Interactive port: prompts for one integer per line and prints each
/// output on its own line.
///
/// A line that is not exactly one integer is rejected and the prompt
/// repeats. End of input closes the port.
pub struct ConsolePort<R, W> {
    reader: R,
    writer: W,
    prompt: Option<String>,
    line: String,
}

impl<R: BufRead, W: Write> ConsolePort<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            prompt: Some("Enter integer: ".to_string()),
            line: String::new(),
        }
    }

    /// Replace the prompt, or disable it with `None`.
    pub fn with_prompt(mut self, prompt: Option<String>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl ConsolePort<std::io::StdinLock<'static>, std::io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout())
    }
}

impl<R: BufRead, W: Write> Port for ConsolePort<R, W> {
    fn input(&mut self) -> Result<i64, PortError> {
        loop {
            if let Some(prompt) = &self.prompt {
                write!(self.writer, "{prompt}")?;
                self.writer.flush()?;
            }
            self.line.clear();
            if self.reader.read_line(&mut self.line)? == 0 {
                return Err(PortError::InputClosed);
            }
            let fields: Vec<&str> = self.line.split_whitespace().collect();
            if fields.len() != 1 {
                tracing::warn!("expected one integer, got {} fields", fields.len());
                continue;
            }
            match fields[0].parse::<i64>() {
                Ok(value) => return Ok(value),
                Err(e) => tracing::warn!("invalid integer {:?}: {e}", fields[0]),
            }
        }
    }

    fn output(&mut self, value: i64) -> Result<(), PortError> {
        writeln!(self.writer, "{value}")?;
        Ok(())
    }
}
