use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use intcode::arcade::Arcade;
use intcode::decode::disassemble;
use intcode::machine::{Machine, MachineConfig};
use intcode::phases::best_phases;
use intcode::pipeline::{Pipeline, PipelineConfig, Topology};
use intcode::port::ConsolePort;
use intcode::program::Program;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "intcode", about = "Intcode virtual machine and amplifier networks")]
struct Cli {
    /// Log every executed instruction to stderr.
    #[arg(long, global = true)]
    trace: bool,

    /// Abort each machine after this many instructions.
    #[arg(long, global = true)]
    step_limit: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a program against stdin/stdout.
    Run {
        /// Program file. Stdin is kept for the program's own input, so "-"
        /// is not accepted here.
        #[arg(value_parser = parse_program_file)]
        program: PathBuf,

        /// Overwrite a program value before running (ADDR=VALUE, repeatable).
        #[arg(long = "set", value_parser = parse_patch)]
        patches: Vec<(usize, i64)>,

        /// Print the value at this address after the program halts.
        #[arg(long)]
        peek: Option<usize>,
    },

    /// Run a chain of amplifiers with the given phase settings.
    Amplify {
        program: PathBuf,

        /// Comma-separated phase settings, one per amplifier.
        #[arg(long, value_delimiter = ',', required = true, allow_hyphen_values = true)]
        phases: Vec<i64>,

        /// Route the last amplifier's output back into the first.
        #[arg(long)]
        feedback: bool,

        /// Initial input of the first amplifier.
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        stimulus: i64,

        /// Capacity of the queues between amplifiers (unbounded if omitted).
        #[arg(long)]
        capacity: Option<usize>,
    },

    /// Search every phase order for the largest amplifier output.
    Tune {
        program: PathBuf,

        /// Use feedback wiring and phases 5..=9 instead of 0..=4.
        #[arg(long)]
        feedback: bool,

        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        stimulus: i64,
    },

    /// Run an arcade cabinet program with an automatic joystick.
    Arcade {
        program: PathBuf,

        /// Insert quarters: set address 0 to 2 before running.
        #[arg(long)]
        free_play: bool,

        /// Draw the final screen.
        #[arg(long)]
        render: bool,
    },

    /// Print a disassembly listing.
    Disasm { program: PathBuf },
}

/// Parse an "ADDR=VALUE" patch.
fn parse_patch(s: &str) -> Result<(usize, i64), String> {
    let (addr, value) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid patch '{s}', expected ADDR=VALUE (e.g. 1=12)"))?;
    let addr = addr
        .trim()
        .parse::<usize>()
        .map_err(|e| format!("Invalid patch address: {e}"))?;
    let value = value
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("Invalid patch value: {e}"))?;
    Ok((addr, value))
}

/// Reject "-" where stdin is needed for console input.
fn parse_program_file(s: &str) -> Result<PathBuf, String> {
    if s == "-" {
        return Err("reading the program from stdin would leave no console input; pass a file".to_string());
    }
    Ok(PathBuf::from(s))
}

fn init_tracing(trace: bool) {
    let filter = if trace {
        EnvFilter::new("intcode=trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("intcode=warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_program(path: &Path) -> Result<Program> {
    let text = if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("reading program from stdin")?;
        text
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
    };
    text.parse::<Program>()
        .with_context(|| format!("loading {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.trace);
    let machine = MachineConfig {
        step_limit: cli.step_limit,
    };

    match cli.command {
        Command::Run {
            program,
            patches,
            peek,
        } => run(&program, &patches, peek, machine),
        Command::Amplify {
            program,
            phases,
            feedback,
            stimulus,
            capacity,
        } => {
            let config = PipelineConfig {
                topology: topology(feedback),
                stimulus,
                capacity,
                machine,
            };
            amplify(&program, &phases, config)
        }
        Command::Tune {
            program,
            feedback,
            stimulus,
        } => {
            let config = PipelineConfig {
                topology: topology(feedback),
                stimulus,
                capacity: None,
                machine,
            };
            tune(&program, config)
        }
        Command::Arcade {
            program,
            free_play,
            render,
        } => arcade(&program, free_play, render, machine),
        Command::Disasm { program } => {
            let program = load_program(&program)?;
            print!("{}", disassemble(program.as_slice()));
            Ok(())
        }
    }
}

fn topology(feedback: bool) -> Topology {
    if feedback {
        Topology::Feedback
    } else {
        Topology::Linear
    }
}

fn run(path: &Path, patches: &[(usize, i64)], peek: Option<usize>, config: MachineConfig) -> Result<()> {
    let mut program = load_program(path)?;
    for &(addr, value) in patches {
        program.patch(addr, value)?;
    }

    let mut machine = Machine::with_config(&program, ConsolePort::stdio(), config);
    let steps = machine.run().context("program failed")?;
    tracing::info!(steps, "halted");

    if let Some(addr) = peek {
        println!("{}", machine.tape().read(addr));
    }
    Ok(())
}

fn amplify(path: &Path, phases: &[i64], config: PipelineConfig) -> Result<()> {
    let program = load_program(path)?;
    let outcome = Pipeline::uniform(&program, phases, config).run()?;
    println!("{}", outcome.output);
    Ok(())
}

fn tune(path: &Path, config: PipelineConfig) -> Result<()> {
    let program = load_program(path)?;
    let values: Vec<i64> = match config.topology {
        Topology::Linear => (0..=4).collect(),
        Topology::Feedback => (5..=9).collect(),
    };

    let start = std::time::Instant::now();
    let best = best_phases(&program, &values, &config)?;
    tracing::info!(elapsed = ?start.elapsed(), "searched {} phase orders", (1..=values.len()).product::<usize>());

    let order: Vec<String> = best.phases.iter().map(|p| p.to_string()).collect();
    println!("{} => {}", order.join(","), best.output);
    Ok(())
}

fn arcade(path: &Path, free_play: bool, render: bool, config: MachineConfig) -> Result<()> {
    let mut program = load_program(path)?;
    if free_play {
        program.patch(0, 2)?;
    }

    let mut machine = Machine::with_config(&program, Arcade::new(), config);
    machine.run().context("arcade program failed")?;
    let cabinet = machine.into_port();

    if render {
        print!("{}", cabinet.render());
    }
    println!("blocks: {}", cabinet.block_count());
    if let Some(score) = cabinet.score() {
        println!("score: {score}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_patch() {
        assert_eq!(parse_patch("1=12"), Ok((1, 12)));
        assert_eq!(parse_patch(" 0 = -2 "), Ok((0, -2)));
        assert!(parse_patch("12").is_err());
        assert!(parse_patch("a=1").is_err());
        assert!(parse_patch("1=b").is_err());
    }

    #[test]
    fn test_cli_parses_amplify() {
        let cli = Cli::try_parse_from([
            "intcode",
            "amplify",
            "prog.txt",
            "--phases",
            "9,8,7,6,5",
            "--feedback",
        ])
        .unwrap();
        match cli.command {
            Command::Amplify {
                phases,
                feedback,
                stimulus,
                ..
            } => {
                assert_eq!(phases, vec![9, 8, 7, 6, 5]);
                assert!(feedback);
                assert_eq!(stimulus, 0);
            }
            _ => panic!("expected amplify"),
        }
    }

    #[test]
    fn test_run_rejects_stdin_program() {
        assert!(Cli::try_parse_from(["intcode", "run", "-"]).is_err());
        assert!(Cli::try_parse_from(["intcode", "run", "prog.txt"]).is_ok());
        assert!(Cli::try_parse_from(["intcode", "disasm", "-"]).is_ok());
    }

    #[test]
    fn test_cli_verify() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
