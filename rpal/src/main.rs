//! RPAL interpreter CLI

use clap::{Parser, Subcommand};
use rpal::error::report_error;
use rpal::interp::{evaluate, MachineConfig};
use rpal::{CompileError, Outcome, RuntimeError, Tree};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rpal", version, about = "RPAL interpreter")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run an RPAL program
    Run {
        /// Source file to run
        file: PathBuf,
        /// Print the token stream
        #[arg(long)]
        lex: bool,
        /// Print the abstract syntax tree
        #[arg(long)]
        ast: bool,
        /// Print the standardized tree
        #[arg(long)]
        st: bool,
        /// Stop after printing the requested trees
        #[arg(long)]
        no_eval: bool,
        /// Print trees as JSON instead of dotted text
        #[arg(long)]
        json: bool,
        /// Abort after this many machine steps
        #[arg(long, value_name = "N")]
        max_steps: Option<u64>,
        /// Abort when nested applications exceed this depth
        #[arg(long, value_name = "N")]
        max_depth: Option<usize>,
    },
    /// Tokenize and dump tokens (debug)
    Tokens {
        /// Source file to tokenize
        file: PathBuf,
    },
    /// Parse and dump the abstract syntax tree
    Parse {
        /// Source file to parse
        file: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Parse, standardize and dump the standardized tree
    Standardize {
        /// Source file to standardize
        file: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the interactive REPL
    Repl,
}

/// Source file loaded for one command
struct Input {
    filename: String,
    source: String,
}

impl Input {
    fn read(path: &Path) -> Result<Self, Failure> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| Failure::Other(format!("cannot read {}: {e}", path.display())))?;
        Ok(Input {
            filename: path.display().to_string(),
            source,
        })
    }

    fn fail(&self, error: CompileError) -> Failure {
        Failure::Compile {
            filename: self.filename.clone(),
            source: self.source.clone(),
            error,
        }
    }
}

enum Failure {
    Compile {
        filename: String,
        source: String,
        error: CompileError,
    },
    Runtime(RuntimeError),
    Other(String),
}

impl From<RuntimeError> for Failure {
    fn from(err: RuntimeError) -> Self {
        Failure::Runtime(err)
    }
}

impl From<serde_json::Error> for Failure {
    fn from(err: serde_json::Error) -> Self {
        Failure::Other(err.to_string())
    }
}

impl From<rustyline::error::ReadlineError> for Failure {
    fn from(err: rustyline::error::ReadlineError) -> Self {
        Failure::Other(err.to_string())
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Compile { error, .. } => write!(f, "{error}"),
            Failure::Runtime(err) => write!(f, "{err}"),
            Failure::Other(msg) => f.write_str(msg),
        }
    }
}

struct RunOptions {
    lex: bool,
    ast: bool,
    st: bool,
    no_eval: bool,
    json: bool,
    config: MachineConfig,
}

fn main() {
    rpal::init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run {
            file,
            lex,
            ast,
            st,
            no_eval,
            json,
            max_steps,
            max_depth,
        } => {
            let config = MachineConfig {
                max_steps,
                max_depth,
                record_trace: false,
            };
            run_file(
                &file,
                &RunOptions {
                    lex,
                    ast,
                    st,
                    no_eval,
                    json,
                    config,
                },
            )
        }
        Command::Tokens { file } => tokenize_file(&file),
        Command::Parse { file, json } => parse_file(&file, json),
        Command::Standardize { file, json } => standardize_file(&file, json),
        Command::Repl => start_repl(),
    };

    if let Err(failure) = result {
        match &failure {
            Failure::Compile {
                filename,
                source,
                error,
            } => report_error(filename, source, error),
            _ => eprintln!("Error: {failure}"),
        }
        std::process::exit(1);
    }
}

fn run_file(path: &Path, options: &RunOptions) -> Result<(), Failure> {
    let input = Input::read(path)?;

    let tokens = rpal::lexer::tokenize(&input.source).map_err(|e| input.fail(e))?;
    if options.lex {
        print_tokens(&tokens);
    }

    let ast = rpal::parser::parse(tokens).map_err(|e| input.fail(e))?;
    if options.ast {
        print_tree(&ast, options.json)?;
    }

    let st = rpal::standardize::standardize(&ast).map_err(|e| input.fail(e))?;
    if options.st {
        print_tree(&st, options.json)?;
    }

    if options.no_eval {
        return Ok(());
    }

    let (value, output) = evaluate(&st, options.config.clone())?;
    let rendered = Outcome { value, output }.render();
    if rendered.ends_with('\n') {
        print!("{rendered}");
    } else {
        println!("{rendered}");
    }
    Ok(())
}

fn tokenize_file(path: &Path) -> Result<(), Failure> {
    let input = Input::read(path)?;
    let tokens = rpal::lexer::tokenize(&input.source).map_err(|e| input.fail(e))?;
    print_tokens(&tokens);
    Ok(())
}

fn parse_file(path: &Path, json: bool) -> Result<(), Failure> {
    let input = Input::read(path)?;
    let ast = rpal::parse_source(&input.source).map_err(|e| input.fail(e))?;
    print_tree(&ast, json)
}

fn standardize_file(path: &Path, json: bool) -> Result<(), Failure> {
    let input = Input::read(path)?;
    let st = rpal::compile(&input.source).map_err(|e| input.fail(e))?;
    print_tree(&st, json)
}

fn start_repl() -> Result<(), Failure> {
    let mut repl = rpal::repl::Repl::new(MachineConfig::default())?;
    repl.run()?;
    Ok(())
}

fn print_tokens(tokens: &[(rpal::lexer::Token, rpal::Span)]) {
    for (token, span) in tokens {
        println!("{token:?} @ {span}");
    }
}

fn print_tree(tree: &Tree, json: bool) -> Result<(), Failure> {
    let Some(root) = tree.root() else {
        return Ok(());
    };
    let view = tree.view(root);
    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print!("{view}");
    }
    Ok(())
}
