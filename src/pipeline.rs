use std::thread;

use crossbeam_channel::{Receiver, Sender};

use crate::error::{ErrorKind, PipelineError, VmError};
use crate::machine::{Machine, MachineConfig};
use crate::port::{ChannelPort, queue};
use crate::program::Program;

/// How the last amplifier's output is routed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Topology {
    /// The last stage's outputs are the result.
    #[default]
    Linear,
    /// The last stage's outputs are forwarded back into the first stage
    /// until the last stage halts.
    Feedback,
}

/// Lifecycle of one network run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    Seeded,
    Running,
    Drained,
    Failed,
}

/// Configuration for an amplifier network.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub topology: Topology,
    /// Extra input queued for the first stage after its phase setting.
    pub stimulus: i64,
    /// Capacity of each inter-stage queue (`None` for unbounded). A queue
    /// is never smaller than the number of values seeded into it.
    pub capacity: Option<usize>,
    /// Applied to every stage.
    pub machine: MachineConfig,
}

/// Result of a drained network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// The last value seen on the output tap.
    pub output: i64,
    /// Every value the last stage produced, in order.
    pub observed: Vec<i64>,
}

/// A chain of machines, each on its own thread with a private tape, wired
/// output-to-input through blocking FIFO queues.
///
/// Stage `i` is seeded with its phase setting; stage 0 also receives the
/// stimulus. A stage's output queue is closed only when the stage stops
/// (halt or error), so successors always see every value before
/// end-of-stream.
pub struct Pipeline {
    stages: Vec<(Program, i64)>,
    config: PipelineConfig,
}

impl Pipeline {
    /// One stage per `(program, phase)` pair, in order.
    pub fn new(stages: Vec<(Program, i64)>, config: PipelineConfig) -> Self {
        Self { stages, config }
    }

    /// Every stage runs `program`, one per phase setting.
    pub fn uniform(program: &Program, phases: &[i64], config: PipelineConfig) -> Self {
        let stages = phases.iter().map(|&phase| (program.clone(), phase)).collect();
        Self::new(stages, config)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage to completion and return the tap's last value.
    ///
    /// If any stage fails, the error of the first stage that failed for a
    /// reason other than a closed queue is reported; neighbours of a
    /// failed stage see their queues close and stop instead of blocking.
    pub fn run(&self) -> Result<Outcome, PipelineError> {
        let k = self.stages.len();
        if k == 0 {
            return Err(PipelineError::Empty);
        }

        // inputs[i] feeds stage i.
        let mut inputs = Vec::with_capacity(k);
        let mut feeds = Vec::with_capacity(k);
        for (stage, &(_, phase)) in self.stages.iter().enumerate() {
            let seeds = if stage == 0 { 2 } else { 1 };
            let (tx, rx) = queue(self.config.capacity.map(|cap| cap.max(seeds)));
            tx.send(phase).map_err(|_| PipelineError::Seed { stage })?;
            feeds.push(tx);
            inputs.push(rx);
        }
        feeds[0]
            .send(self.config.stimulus)
            .map_err(|_| PipelineError::Seed { stage: 0 })?;

        // Stage i writes into stage i + 1's feed; the last stage writes to the tap.
        let (tap_tx, tap_rx) = queue(self.config.capacity);
        let first_feed = feeds.remove(0);
        feeds.push(tap_tx);
        tracing::debug!(stages = k, state = ?NetworkState::Seeded);

        let (results, observed) = thread::scope(|s| {
            let handles: Vec<_> = self
                .stages
                .iter()
                .zip(inputs)
                .zip(feeds)
                .enumerate()
                .map(|(stage, (((program, _), input), output))| {
                    let config = self.config.machine.clone();
                    s.spawn(move || run_stage(stage, program, ChannelPort::new(input, output), config))
                })
                .collect();
            tracing::debug!(state = ?NetworkState::Running);

            let observed = match self.config.topology {
                Topology::Linear => {
                    drop(first_feed);
                    tap_rx.iter().collect()
                }
                Topology::Feedback => forward(tap_rx, first_feed),
            };
            let results: Vec<_> = handles.into_iter().map(|h| h.join()).collect();
            (results, observed)
        });

        let mut failures = Vec::new();
        for (stage, joined) in results.into_iter().enumerate() {
            match joined {
                Ok(Ok(_)) => {}
                Ok(Err(source)) => failures.push((stage, source)),
                Err(_) => return Err(PipelineError::Panicked { stage }),
            }
        }
        if !failures.is_empty() {
            let root = failures
                .iter()
                .position(|(_, e)| e.kind() != ErrorKind::Io)
                .unwrap_or(0);
            let (stage, source) = failures.swap_remove(root);
            tracing::debug!(stage, state = ?NetworkState::Failed, "{source}");
            return Err(PipelineError::Stage { stage, source });
        }

        let output = observed.last().copied().ok_or(PipelineError::NoOutput)?;
        tracing::debug!(output, state = ?NetworkState::Drained);
        Ok(Outcome { output, observed })
    }
}

fn run_stage(
    stage: usize,
    program: &Program,
    port: ChannelPort,
    config: MachineConfig,
) -> Result<usize, VmError> {
    let _span = tracing::info_span!("amplifier", stage).entered();
    let mut machine = Machine::with_config(program, port, config);
    let result = machine.run();
    // Closes both queues. Every output is already enqueued at this point.
    drop(machine);
    match &result {
        Ok(steps) => tracing::debug!(steps, "halted"),
        Err(e) => tracing::debug!("stopped: {e}"),
    }
    result
}

/// Copy the last stage's outputs into the first stage's input until the
/// last stage halts, then close the first stage's input.
fn forward(tap: Receiver<i64>, first: Sender<i64>) -> Vec<i64> {
    let mut observed = Vec::new();
    let mut first = Some(first);
    for value in tap.iter() {
        observed.push(value);
        if first.as_ref().is_some_and(|tx| tx.send(value).is_err()) {
            // First stage is gone; keep draining so the last one never blocks.
            tracing::debug!("first amplifier closed its input");
            first = None;
        }
    }
    drop(first);
    tracing::debug!(forwarded = observed.len(), "feedback loop closed");
    observed
}
