//! Interactive read-eval-print loop
//!
//! Every line is a complete RPAL expression, evaluated by a fresh machine.

use crate::interp::MachineConfig;
use crate::{compile, parse_source, run_source};
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as RlResult};
use std::path::PathBuf;

const PROMPT: &str = "rpal> ";
const HISTORY_FILE: &str = ".rpal_history";

/// REPL state
pub struct Repl {
    editor: DefaultEditor,
    config: MachineConfig,
    history_path: Option<PathBuf>,
}

/// What to do after a `:` command
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Show(String),
    Quit,
}

impl Repl {
    pub fn new(config: MachineConfig) -> RlResult<Self> {
        let mut repl = Repl {
            editor: DefaultEditor::new()?,
            config,
            history_path: dirs_home().map(|home| home.join(HISTORY_FILE)),
        };
        if let Some(path) = &repl.history_path {
            let _ = repl.editor.load_history(path);
        }
        Ok(repl)
    }

    pub fn run(&mut self) -> RlResult<()> {
        println!("RPAL {}", env!("CARGO_PKG_VERSION"));
        println!("Type :help for help, :quit to exit.\n");

        loop {
            match self.editor.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = self.editor.add_history_entry(line);

                    if line.starts_with(':') {
                        match handle_command(line) {
                            Flow::Quit => break,
                            Flow::Show(text) => println!("{text}"),
                            Flow::Continue => {}
                        }
                        continue;
                    }
                    println!("{}", evaluate_line(line, &self.config));
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("Error: {err}");
                    break;
                }
            }
        }

        if let Some(path) = &self.history_path {
            let _ = self.editor.save_history(path);
        }
        Ok(())
    }
}

fn handle_command(line: &str) -> Flow {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    match command {
        ":quit" | ":q" => Flow::Quit,
        ":help" | ":h" => Flow::Show(HELP.trim_end().to_string()),
        ":clear" => {
            print!("\x1B[2J\x1B[1;1H");
            Flow::Continue
        }
        ":ast" => Flow::Show(show_tree(rest, false)),
        ":st" => Flow::Show(show_tree(rest, true)),
        _ => Flow::Show(format!("Unknown command: {command}\nType :help for help.")),
    }
}

const HELP: &str = "\
Commands:
  :help, :h        Show this help
  :quit, :q        Exit the REPL
  :ast <expr>      Show the abstract syntax tree of an expression
  :st <expr>       Show the standardized tree of an expression
  :clear           Clear the screen

Any other line is evaluated as an RPAL expression, e.g.
  let rec f n = n eq 0 -> 1 | n * f (n - 1) in f 5
";

/// Evaluate one line, returning the text to show
fn evaluate_line(line: &str, config: &MachineConfig) -> String {
    match run_source(line, config.clone()) {
        Ok(outcome) => outcome.render(),
        Err(err) => format!("Error: {err}"),
    }
}

fn show_tree(source: &str, standardized: bool) -> String {
    let tree = if standardized { compile(source) } else { parse_source(source) };
    match tree {
        Ok(tree) => match tree.root() {
            Some(root) => tree.view(root).dump().trim_end().to_string(),
            None => String::new(),
        },
        Err(err) => format!("Error: {err}"),
    }
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
