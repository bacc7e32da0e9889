//! hermelin CLI

use clap::{Parser, Subcommand};
use hermelin::config::Config;
use hermelin::error::{ScriptError, report_error};
use hermelin::interp::Context;
use hermelin::repl::Repl;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hermelin", version, about = "hermelin - embedded scripting for MIEZE data analysis")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Skip the constant folding pass
    #[arg(long, global = true)]
    no_optimize: bool,

    /// Override the recursion limit
    #[arg(long, global = true)]
    max_recursion_depth: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a script and call its `main`
    Run {
        /// Script file
        file: PathBuf,
        /// Arguments handed to the script
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Start an interactive session
    Repl,
    /// Parse and dump AST as JSON (debug)
    Parse {
        /// Source file to parse
        file: PathBuf,
    },
    /// Tokenize and dump tokens (debug)
    Tokens {
        /// Source file to tokenize
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match &cli.command {
        Command::Run { file, args } => return run_file(config, file, args),
        Command::Repl => run_repl(config),
        Command::Parse { file } => parse_file(file),
        Command::Tokens { file } => tokenize_file(file),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins; otherwise warnings, raised by `-v`
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config, hermelin::config::ConfigError> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if cli.no_optimize {
        config.optimize = false;
    }
    if let Some(depth) = cli.max_recursion_depth {
        config.max_recursion_depth = depth;
    }
    Ok(config)
}

fn run_file(config: Config, path: &Path, args: &[String]) -> ExitCode {
    let filename = path.display().to_string();
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error: cannot read {filename}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut ctx = Context::with_config(config);
    match ctx.run_source(path, &source, args) {
        Ok(Some(value)) => {
            tracing::debug!(result = %value, "main returned");
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(ScriptError::Compile(e)) => {
            report_error(&filename, &source, &e);
            ExitCode::FAILURE
        }
        Err(ScriptError::Runtime(e)) => {
            eprintln!("{e}");
            for entry in &e.traceback {
                eprintln!("  in {entry}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run_repl(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut repl = Repl::new(config)?;
    repl.run()?;
    Ok(())
}

fn parse_file(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)?;
    let filename = path.display().to_string();

    let ast = match hermelin::parser::parse_source(&filename, &source) {
        Ok(ast) => ast,
        Err(e) => {
            report_error(&filename, &source, &e);
            return Err(e.into());
        }
    };

    println!("{}", serde_json::to_string_pretty(&ast)?);
    Ok(())
}

fn tokenize_file(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)?;

    let tokens = hermelin::lexer::tokenize(&source)?;
    for (tok, span) in &tokens {
        println!("{:?} @ {}..{}", tok, span.start, span.end);
    }

    Ok(())
}
