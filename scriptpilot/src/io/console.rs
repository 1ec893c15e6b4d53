//! Line-based terminal I/O: user input and the yes/no confirmation prompt.

use std::io::{self, BufRead, Write};

use tracing::warn;

use crate::core::gate::Confirmer;
use crate::core::types::ExtractedScript;

/// Single line-oriented reader shared by the REPL and the confirmation gate.
///
/// Both read from the same input so answers and requests are consumed in the
/// order the user typed them.
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print `prompt` and read one line without its line ending. `None` on EOF.
    pub fn read_input(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

impl<R: BufRead, W: Write> Confirmer for Console<R, W> {
    /// Accepts `y`/`yes`/`n`/`no` in any case and re-asks on anything else.
    /// EOF or a read error counts as `no`.
    fn confirm(&mut self, _script: &ExtractedScript) -> bool {
        loop {
            match self.read_input("Execute this script? [y/n] ") {
                Ok(Some(answer)) => match answer.trim().to_ascii_lowercase().as_str() {
                    "y" | "yes" => return true,
                    "n" | "no" => return false,
                    _ => {}
                },
                Ok(None) => return false,
                Err(e) => {
                    warn!(err = %e, "failed to read confirmation answer");
                    return false;
                }
            }
        }
    }
}
