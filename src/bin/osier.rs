use std::{fs, path::PathBuf, process};

use clap::{Parser, Subcommand};
use rustyline::DefaultEditor;

use osier::{DebugCommand, DebugHandler, Interpreter, OsierError, Outcome, Repl};

#[derive(Parser)]
#[command(author, version, about = "Osier language interpreter")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run an Osier script file
    Run { script: PathBuf },
    /// Start an interactive REPL session
    Repl,
    /// Evaluate a snippet of Osier code
    Eval { source: String },
}

fn main() -> Result<(), OsierError> {
    let args = Args::parse();
    match args.command.unwrap_or(Command::Repl) {
        Command::Run { script } => run_script(script),
        Command::Repl => {
            let mut interpreter = Interpreter::new();
            install_prompt_handler(&mut interpreter);
            let mut repl = Repl::with_interpreter(interpreter);
            let code = repl.run()?;
            if code != 0 {
                process::exit(code);
            }
            Ok(())
        }
        Command::Eval { source } => {
            let mut interpreter = Interpreter::new();
            let outcome = interpreter.run(&source);
            report(&outcome);
            if let Some(value) = &outcome.value {
                println!("{value}");
            }
            finish(&interpreter, &outcome)
        }
    }
}

fn run_script(path: PathBuf) -> Result<(), OsierError> {
    let source = fs::read_to_string(&path)?;
    let mut interpreter = Interpreter::new();
    install_prompt_handler(&mut interpreter);
    let outcome = interpreter.run(&source);
    report(&outcome);
    finish(&interpreter, &outcome)
}

fn report(outcome: &Outcome) {
    for line in &outcome.output {
        println!("{line}");
    }
}

fn finish(interpreter: &Interpreter, outcome: &Outcome) -> Result<(), OsierError> {
    if let Some(code) = interpreter.exit_code() {
        process::exit(code);
    }
    if outcome.error.is_some() {
        process::exit(1);
    }
    Ok(())
}

fn install_prompt_handler(interpreter: &mut Interpreter) {
    // Stdin may not be a terminal; debugging just auto-continues then.
    if let Ok(editor) = DefaultEditor::new() {
        interpreter.set_debug_handler(Box::new(PromptHandler { editor }));
    }
}

/// One line per debugger command, read with the same editor as the REPL.
struct PromptHandler {
    editor: DefaultEditor,
}

impl DebugHandler for PromptHandler {
    fn on_pause(&mut self, line: usize, statement: &str) -> DebugCommand {
        println!("Paused at line {line}: {statement}");
        loop {
            match self.editor.readline("(debug) ") {
                Ok(input) => match input.trim() {
                    "c" | "continue" => return DebugCommand::Continue,
                    "s" | "step" => return DebugCommand::Step,
                    "v" | "variables" => return DebugCommand::Variables,
                    "bt" | "callstack" => return DebugCommand::CallStack,
                    "m" | "memory" => return DebugCommand::Memory,
                    "q" | "quit" => return DebugCommand::Quit,
                    "" => continue,
                    other => println!("unknown debug command `{other}`"),
                },
                Err(_) => return DebugCommand::Quit,
            }
        }
    }

    fn show(&mut self, text: &str) {
        println!("{text}");
    }
}
