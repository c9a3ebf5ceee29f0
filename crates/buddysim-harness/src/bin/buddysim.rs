//! CLI entrypoint for the buddy allocator simulator.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use buddysim_core::BuddyConfig;
use buddysim_harness::script::{Replay, parse_script, replay};
use buddysim_harness::shell::run_shell;
use buddysim_harness::structured_log::{
    ArtifactIndex, LogEmitter, LogEntry, LogLevel, Outcome, validate_log_file,
};

/// Buddy memory allocator simulator.
#[derive(Debug, Parser)]
#[command(name = "buddysim")]
#[command(about = "Simulate a binary buddy allocator over a power-of-two pool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the interactive allocate/free/print menu on stdin/stdout.
    Shell {
        /// Pool size; prompts for it when omitted.
        #[arg(long, env = "BUDDYSIM_POOL_SIZE")]
        pool_size: Option<usize>,
    },
    /// Replay an op script and emit a JSON report.
    Replay {
        /// Script path (`alloc <n>`, `free <addr> <n>`, `print`).
        #[arg(long)]
        script: PathBuf,
        /// Pool size (power of two).
        #[arg(long, env = "BUDDYSIM_POOL_SIZE", default_value_t = 1024)]
        pool_size: usize,
        /// Output report path (if omitted, prints to stdout).
        #[arg(long)]
        output: Option<PathBuf>,
        /// Structured JSONL log path.
        #[arg(long)]
        log: Option<PathBuf>,
        /// Artifact index JSON path, linking the report and the log.
        #[arg(long)]
        artifact_index: Option<PathBuf>,
        /// Run identifier used in trace ids.
        #[arg(long, default_value = "buddysim")]
        run_id: String,
    },
    /// Validate a structured JSONL log.
    ValidateLog {
        #[arg(long)]
        log: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Shell { pool_size } => {
            let stdin = std::io::stdin();
            let stdout = std::io::stdout();
            run_shell(stdin.lock(), stdout.lock(), pool_size)?;
        }
        Command::Replay {
            script,
            pool_size,
            output,
            log,
            artifact_index,
            run_id,
        } => {
            let text = std::fs::read_to_string(&script)?;
            let steps = parse_script(&text)?;
            eprintln!(
                "Replaying {} step(s) from {} on a {pool_size}-unit pool",
                steps.len(),
                script.display()
            );
            let Replay { report, lifecycle } = replay(BuddyConfig::new(pool_size), &steps)?;

            let body = report.to_json()?;
            match &output {
                Some(path) => {
                    std::fs::write(path, &body)?;
                    eprintln!("Wrote replay report to {}", path.display());
                }
                None => println!("{body}"),
            }

            if let Some(path) = &log {
                let mut emitter = LogEmitter::to_file(path, &run_id, "replay")?;
                emitter.emit_entry(
                    LogEntry::new("", LogLevel::Info, "replay_start").with_details(
                        serde_json::json!({
                            "script": script.display().to_string(),
                            "pool_size": pool_size,
                            "steps": steps.len(),
                        }),
                    ),
                )?;
                emitter.emit_lifecycle(&lifecycle)?;
                for step in &report.steps {
                    let level = match step.outcome {
                        Outcome::Ok => LogLevel::Info,
                        Outcome::Rejected => LogLevel::Warn,
                        Outcome::Fault => LogLevel::Error,
                    };
                    let mut entry = LogEntry::new("", level, "step")
                        .with_outcome(step.outcome)
                        .with_details(serde_json::to_value(step)?);
                    entry.address = step.allocated_address;
                    emitter.emit_entry(entry)?;
                }
                emitter.emit_entry(
                    LogEntry::new("", LogLevel::Info, "replay_end")
                        .with_outcome(if report.aborted {
                            Outcome::Fault
                        } else {
                            Outcome::Ok
                        })
                        .with_details(serde_json::to_value(report.final_stats)?),
                )?;
                emitter.into_inner()?;
                eprintln!("Wrote structured log to {}", path.display());
            }

            if let Some(index_path) = &artifact_index {
                let mut index = ArtifactIndex::new(&run_id);
                if let Some(path) = &output {
                    index.add_file(path, "replay_report")?;
                }
                if let Some(path) = &log {
                    index.add_file(path, "structured_log")?;
                }
                index.add_file(&script, "script")?;
                std::fs::write(index_path, index.to_json()?)?;
                eprintln!("Wrote artifact index to {}", index_path.display());
            }

            eprintln!(
                "Replay finished: {} step(s), {} failure(s)",
                report.steps.len(),
                report.failures()
            );
            if report.aborted {
                return Err("replay aborted on an internal allocator fault".into());
            }
        }
        Command::ValidateLog { log } => {
            let (lines, errors) = validate_log_file(&log)?;
            for err in &errors {
                eprintln!("{err}");
            }
            eprintln!(
                "Validated {lines} line(s) in {}: {} error(s)",
                log.display(),
                errors.len()
            );
            if !errors.is_empty() {
                return Err(format!("{} invalid log field(s)", errors.len()).into());
            }
        }
    }

    Ok(())
}
