//! Interactive conflict prompt on the terminal.

use favsaver_core::{CancellationToken, Conflict, ConflictAnswer, ConflictPrompt, MatchedPhoto};
use std::io::{self, BufRead, Write};
use tracing::warn;

/// Asks the operator about each conflict on stdin/stdout.
///
/// End of input answers "skip all remaining" so a closed stdin never writes
/// over existing metadata.
pub struct TerminalPrompt<R, W> {
    input: R,
    output: W,
    cancel: CancellationToken,
}

impl TerminalPrompt<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio(cancel: CancellationToken) -> Self {
        Self::new(io::stdin().lock(), io::stdout(), cancel)
    }
}

impl<R: BufRead, W: Write> TerminalPrompt<R, W> {
    pub fn new(input: R, output: W, cancel: CancellationToken) -> Self {
        Self {
            input,
            output,
            cancel,
        }
    }

    fn disclose(&mut self, photo: &MatchedPhoto, conflict: &Conflict) -> io::Result<()> {
        let existing_rating = conflict
            .existing
            .rating
            .map(|r| r.to_string())
            .unwrap_or_else(|| "<none>".to_string());
        let incoming_rating = if photo.meta.favorite {
            format!("{} (favorite)", conflict.incoming_rating)
        } else {
            conflict.incoming_rating.to_string()
        };

        writeln!(self.output)?;
        writeln!(self.output, "Conflict detected for {}:", photo.file.relative_path)?;
        writeln!(
            self.output,
            "  Existing -> rating={}, description={}",
            existing_rating,
            display_description(conflict.existing.description_or_empty())
        )?;
        writeln!(
            self.output,
            "  Incoming -> rating={}, description={}",
            incoming_rating,
            display_description(&conflict.incoming_description)
        )?;
        Ok(())
    }

    fn read_answer(&mut self) -> io::Result<Option<ConflictAnswer>> {
        loop {
            write!(
                self.output,
                "Overwrite (y), keep existing (n), or skip all future conflicts (s)? "
            )?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            if self.cancel.is_cancelled() {
                return Ok(Some(ConflictAnswer::Keep));
            }
            match parse_answer(&line) {
                Some(answer) => return Ok(Some(answer)),
                None => writeln!(self.output, "Please enter 'y', 'n', or 's'.")?,
            }
        }
    }
}

impl<R: BufRead, W: Write> ConflictPrompt for TerminalPrompt<R, W> {
    fn ask(&mut self, photo: &MatchedPhoto, conflict: &Conflict) -> ConflictAnswer {
        if self.cancel.is_cancelled() {
            return ConflictAnswer::Keep;
        }

        let answer = self
            .disclose(photo, conflict)
            .and_then(|()| self.read_answer());
        match answer {
            Ok(Some(answer)) => answer,
            Ok(None) => {
                warn!("No more input; skipping all remaining conflicts");
                ConflictAnswer::SkipAllRemaining
            }
            Err(e) => {
                warn!("Failed to read answer ({}); skipping all remaining conflicts", e);
                ConflictAnswer::SkipAllRemaining
            }
        }
    }
}

/// Map a typed answer to a [`ConflictAnswer`].
pub fn parse_answer(input: &str) -> Option<ConflictAnswer> {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(ConflictAnswer::Overwrite),
        "n" | "no" => Some(ConflictAnswer::Keep),
        "s" | "skip" => Some(ConflictAnswer::SkipAllRemaining),
        _ => None,
    }
}

fn display_description(description: &str) -> String {
    if description.is_empty() {
        "<empty>".to_string()
    } else {
        format!("{:?}", description)
    }
}
