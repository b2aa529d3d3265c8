use std::io::{self, BufRead, Write};

/// Source of answers for required parameters that no other stage set.
pub trait Prompter {
    /// Show `description` and return the operator's answer, trimmed
    fn prompt(&mut self, description: &str) -> io::Result<String>;
}

/// Prompts on stdout and reads the answer from stdin
#[derive(Debug, Default)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn prompt(&mut self, description: &str) -> io::Result<String> {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{}: ", description)?;
        stdout.flush()?;

        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("no answer given for '{}'", description),
            ));
        }
        Ok(answer.trim().to_string())
    }
}
