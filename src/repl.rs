use rustyline::{error::ReadlineError, DefaultEditor};

use crate::{
    diagnostics::{OsierError, Result},
    runtime::Interpreter,
};

pub struct Repl {
    interpreter: Interpreter,
    next_line: usize,
}

impl Repl {
    pub fn new() -> Self {
        Self::with_interpreter(Interpreter::new())
    }

    pub fn with_interpreter(interpreter: Interpreter) -> Self {
        Self {
            interpreter,
            next_line: 1,
        }
    }

    /// Returns the exit code the session asked for.
    pub fn run(&mut self) -> Result<i32> {
        let mut editor = DefaultEditor::new().map_err(editor_error)?;
        loop {
            let line = match editor.readline(">> ") {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => return Err(editor_error(err)),
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                self.next_line += 1;
                continue;
            }
            if trimmed == ":quit" || trimmed == ":exit" {
                break;
            }
            editor.add_history_entry(trimmed).ok();
            let mut buffer = line.clone();
            let mut consumed = 1;
            if trimmed.ends_with(':') {
                // A header opens a block; a blank line closes it.
                loop {
                    match editor.readline(".. ") {
                        Ok(next) => {
                            consumed += 1;
                            if next.trim().is_empty() {
                                break;
                            }
                            editor.add_history_entry(next.trim()).ok();
                            buffer.push('\n');
                            buffer.push_str(&next);
                        }
                        Err(ReadlineError::Interrupted) => {
                            buffer.clear();
                            break;
                        }
                        Err(ReadlineError::Eof) => break,
                        Err(err) => return Err(editor_error(err)),
                    }
                }
            }
            let start = self.next_line;
            self.next_line += consumed;
            if buffer.is_empty() {
                continue;
            }
            let outcome = self.interpreter.execute_line(&buffer, start);
            for text in &outcome.output {
                println!("{text}");
            }
            if let Some(value) = outcome.value {
                println!("{value}");
            }
            if let Some(code) = self.interpreter.exit_code() {
                return Ok(code);
            }
        }
        Ok(0)
    }
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}

fn editor_error(err: ReadlineError) -> OsierError {
    OsierError::from(std::io::Error::new(std::io::ErrorKind::Other, err))
}
