//! Line-based operation scripts and their replay.
//!
//! Grammar, one op per line:
//!
//! ```text
//! alloc <n>
//! free <addr> <n>
//! print
//! # comment
//! ```
//!
//! Blank lines and `#` comments are skipped. Replay runs every step against a
//! fresh allocator and records a per-step outcome. An internal engine error
//! stops the replay, since later steps would run on corrupted state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use buddysim_core::{
    BuddyAllocator, BuddyConfig, BuddyError, BuddyLogRecord, BuddyResult, BuddyStats, Snapshot,
};

use crate::render::render_state;
use crate::structured_log::Outcome;

/// One parsed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptOp {
    Alloc { requested: usize },
    Free { address: usize, requested: usize },
    Print,
}

/// An operation with its 1-based source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptStep {
    pub line: usize,
    pub op: ScriptOp,
}

/// Parse failure, tagged with the offending line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("line {line}: unknown command '{command}'")]
    UnknownCommand { line: usize, command: String },
    #[error("line {line}: '{command}' expects {expected} argument(s), got {got}")]
    Arity {
        line: usize,
        command: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("line {line}: '{token}' is not a non-negative integer")]
    InvalidNumber { line: usize, token: String },
}

impl ScriptError {
    /// Source line of the error.
    #[must_use]
    pub fn line(&self) -> usize {
        match self {
            Self::UnknownCommand { line, .. }
            | Self::Arity { line, .. }
            | Self::InvalidNumber { line, .. } => *line,
        }
    }
}

fn parse_number(token: &str, line: usize) -> Result<usize, ScriptError> {
    token.parse().map_err(|_| ScriptError::InvalidNumber {
        line,
        token: token.to_string(),
    })
}

fn expect_args(
    args: &[&str],
    command: &'static str,
    expected: usize,
    line: usize,
) -> Result<(), ScriptError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(ScriptError::Arity {
            line,
            command,
            expected,
            got: args.len(),
        })
    }
}

/// Parses a whole script. Stops at the first malformed line.
pub fn parse_script(text: &str) -> Result<Vec<ScriptStep>, ScriptError> {
    let mut steps = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut tokens = trimmed.split_whitespace();
        let Some(command) = tokens.next() else {
            continue;
        };
        let args: Vec<&str> = tokens.collect();
        let op = match command {
            "alloc" => {
                expect_args(&args, "alloc", 1, line)?;
                ScriptOp::Alloc {
                    requested: parse_number(args[0], line)?,
                }
            }
            "free" => {
                expect_args(&args, "free", 2, line)?;
                ScriptOp::Free {
                    address: parse_number(args[0], line)?,
                    requested: parse_number(args[1], line)?,
                }
            }
            "print" => {
                expect_args(&args, "print", 0, line)?;
                ScriptOp::Print
            }
            other => {
                return Err(ScriptError::UnknownCommand {
                    line,
                    command: other.to_string(),
                });
            }
        };
        steps.push(ScriptStep { line, op });
    }
    Ok(steps)
}

/// Result of one replayed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub line: usize,
    #[serde(flatten)]
    pub op: ScriptOp,
    pub outcome: Outcome,
    /// Address returned by a successful `alloc`. Kept apart from the
    /// flattened op, whose `free` variant has its own `address`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocated_address: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Rendered state for `print`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendered: Option<String>,
}

impl StepOutcome {
    fn new(step: ScriptStep) -> Self {
        Self {
            line: step.line,
            op: step.op,
            outcome: Outcome::Ok,
            allocated_address: None,
            error: None,
            rendered: None,
        }
    }

    fn with_error(mut self, err: &BuddyError) -> Self {
        self.outcome = if err.is_internal() {
            Outcome::Fault
        } else {
            Outcome::Rejected
        };
        self.error = Some(err.to_string());
        self
    }
}

/// Machine-readable replay summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub pool_size: usize,
    pub steps: Vec<StepOutcome>,
    /// True when an internal error stopped the replay early.
    pub aborted: bool,
    pub final_snapshot: Snapshot,
    pub final_stats: BuddyStats,
}

impl ReplayReport {
    /// Number of steps that did not succeed.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.outcome != Outcome::Ok)
            .count()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// A finished replay: the report plus every engine lifecycle record, in order.
#[derive(Debug, Clone)]
pub struct Replay {
    pub report: ReplayReport,
    pub lifecycle: Vec<BuddyLogRecord>,
}

/// Replays `steps` against a fresh allocator built from `config`.
///
/// Fails only if the pool size is invalid; per-step errors land in the report.
pub fn replay(config: BuddyConfig, steps: &[ScriptStep]) -> BuddyResult<Replay> {
    let mut alloc = BuddyAllocator::with_config(config)?;
    let mut lifecycle = alloc.drain_lifecycle_logs();
    let mut outcomes = Vec::with_capacity(steps.len());
    let mut aborted = false;

    for &step in steps {
        let outcome = StepOutcome::new(step);
        let outcome = match step.op {
            ScriptOp::Alloc { requested } => match alloc.allocate(requested) {
                Ok(address) => StepOutcome {
                    allocated_address: Some(address),
                    ..outcome
                },
                Err(err) => outcome.with_error(&err),
            },
            ScriptOp::Free { address, requested } => match alloc.free(address, requested) {
                Ok(()) => outcome,
                Err(err) => outcome.with_error(&err),
            },
            ScriptOp::Print => StepOutcome {
                rendered: Some(render_state(&alloc.snapshot())),
                ..outcome
            },
        };
        // Drain per step so the bounded engine buffer never drops records.
        lifecycle.extend(alloc.drain_lifecycle_logs());
        let fault = outcome.outcome == Outcome::Fault;
        outcomes.push(outcome);
        if fault {
            aborted = true;
            break;
        }
    }

    Ok(Replay {
        report: ReplayReport {
            pool_size: alloc.total_size(),
            steps: outcomes,
            aborted,
            final_snapshot: alloc.snapshot(),
            final_stats: alloc.stats(),
        },
        lifecycle,
    })
}
