//! Interactive menu over a single allocator.
//!
//! Reads from any `BufRead` and writes to any `Write`, so sessions can be
//! driven from stdin or from a byte buffer. End of input ends the session.

use std::io::{BufRead, Write};

use thiserror::Error;

use buddysim_core::{BuddyAllocator, BuddyConfig, BuddyError};

use crate::render::render_state;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// Pool setup failed or the engine reported a defect.
    #[error("allocator error: {0}")]
    Engine(#[from] BuddyError),
}

const MENU: &str = "\nOptions:\n\
                    1. Allocate memory\n\
                    2. Free memory\n\
                    3. Print memory state\n\
                    4. Exit\n";

struct Session<R, W> {
    input: R,
    output: W,
    line: String,
}

impl<R: BufRead, W: Write> Session<R, W> {
    /// Prints `prompt` and reads one trimmed line. `None` on end of input.
    fn ask(&mut self, prompt: &str) -> Result<Option<String>, ShellError> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;
        self.line.clear();
        if self.input.read_line(&mut self.line)? == 0 {
            writeln!(self.output)?;
            return Ok(None);
        }
        Ok(Some(self.line.trim().to_string()))
    }

    /// Like [`Session::ask`], but parses a number. `Some(None)` when the input
    /// is not a non-negative integer; the message has already been printed.
    fn ask_number(&mut self, prompt: &str) -> Result<Option<Option<usize>>, ShellError> {
        let Some(answer) = self.ask(prompt)? else {
            return Ok(None);
        };
        match answer.parse() {
            Ok(n) => Ok(Some(Some(n))),
            Err(_) => {
                writeln!(self.output, "Invalid number. Please try again.")?;
                Ok(Some(None))
            }
        }
    }

    fn open_pool(
        &mut self,
        pool_size: Option<usize>,
    ) -> Result<Option<BuddyAllocator>, ShellError> {
        if let Some(total) = pool_size {
            return Ok(Some(BuddyAllocator::with_config(BuddyConfig::new(total))?));
        }
        loop {
            let Some(answer) = self.ask_number("Enter the total memory pool size (in KB): ")? else {
                return Ok(None);
            };
            let Some(total) = answer else {
                continue;
            };
            match BuddyAllocator::with_config(BuddyConfig::new(total)) {
                Ok(alloc) => return Ok(Some(alloc)),
                Err(err) => writeln!(self.output, "Error: {err}.")?,
            }
        }
    }

    fn allocate(&mut self, alloc: &mut BuddyAllocator) -> Result<bool, ShellError> {
        let Some(answer) = self.ask_number("Enter the size of memory to allocate (in KB): ")? else {
            return Ok(false);
        };
        let Some(requested) = answer else {
            return Ok(true);
        };
        match alloc.allocate(requested) {
            Ok(address) => {
                let size = alloc.lookup(address).unwrap_or(requested);
                writeln!(self.output, "Allocated {size} KB at address {address}.")?;
            }
            Err(err) if err.is_exhaustion() => {
                writeln!(self.output, "Allocation failed: Not enough memory.")?;
            }
            Err(err @ BuddyError::InvalidSize { .. }) => writeln!(self.output, "Error: {err}.")?,
            Err(err) => return Err(err.into()),
        }
        Ok(true)
    }

    fn free(&mut self, alloc: &mut BuddyAllocator) -> Result<bool, ShellError> {
        let Some(address) = self.ask_number("Enter the starting address of the block to free: ")?
        else {
            return Ok(false);
        };
        let Some(size) = self.ask_number("Enter the size of the block to free (in KB): ")? else {
            return Ok(false);
        };
        let (Some(address), Some(size)) = (address, size) else {
            return Ok(true);
        };
        alloc.drain_lifecycle_logs();
        match alloc.free(address, size) {
            Ok(()) => {
                for record in alloc.lifecycle_logs().filter(|r| r.event == "merge") {
                    if let (Some(merged), Some(merged_size)) = (record.address, record.size) {
                        writeln!(
                            self.output,
                            "Merged blocks into {merged_size} KB at address {merged}."
                        )?;
                    }
                }
            }
            Err(BuddyError::MismatchedBlock { .. }) => {
                writeln!(self.output, "Error: Block not found or size mismatch.")?;
            }
            Err(err @ BuddyError::InvalidSize { .. }) => writeln!(self.output, "Error: {err}.")?,
            Err(err) => return Err(err.into()),
        }
        Ok(true)
    }
}

/// Runs the menu loop until `4`, end of input, or an engine fault.
///
/// With `pool_size` set the initial prompt is skipped.
pub fn run_shell<R: BufRead, W: Write>(
    input: R,
    output: W,
    pool_size: Option<usize>,
) -> Result<(), ShellError> {
    let mut session = Session {
        input,
        output,
        line: String::new(),
    };
    let Some(mut alloc) = session.open_pool(pool_size)? else {
        return Ok(());
    };

    loop {
        write!(session.output, "{MENU}")?;
        let Some(choice) = session.ask("Enter your choice: ")? else {
            return Ok(());
        };
        let keep_going = match choice.as_str() {
            "1" => session.allocate(&mut alloc)?,
            "2" => session.free(&mut alloc)?,
            "3" => {
                write!(session.output, "{}", render_state(&alloc.snapshot()))?;
                true
            }
            "4" => {
                writeln!(session.output, "Exiting...")?;
                false
            }
            _ => {
                writeln!(session.output, "Invalid choice. Please try again.")?;
                true
            }
        };
        if !keep_going {
            session.output.flush()?;
            return Ok(());
        }
    }
}
