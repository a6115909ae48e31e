use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use linescript::{interpreter::JumpTable, Interpreter, Limits, Program, Termination};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about = "Line-oriented script interpreter")]
struct Cli {
    /// Log filter, e.g. `debug` or `linescript=trace`. Falls back to RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a program.
    Run(RunArgs),
    /// List the labels and functions a program defines without running it.
    Check(CheckArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    file: PathBuf,

    /// Back-jumps allowed per for loop.
    #[arg(long)]
    max_for_iterations: Option<usize>,

    /// Nested function calls allowed.
    #[arg(long)]
    max_call_depth: Option<usize>,
}

#[derive(Debug, Args)]
struct CheckArgs {
    file: PathBuf,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Output(#[from] std::io::Error),
}

fn main() {
    let args = Cli::parse();
    init_tracing(args.log_level.as_deref());

    let result = match &args.command {
        Command::Run(args) => run_command(args),
        Command::Check(args) => check_command(args),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_program(path: &PathBuf) -> Result<Program, CliError> {
    let source = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.clone(),
        source,
    })?;
    Ok(Program::from_source(&source))
}

fn run_command(args: &RunArgs) -> Result<i32, CliError> {
    let program = read_program(&args.file)?;

    let mut limits = Limits::default();
    if let Some(n) = args.max_for_iterations {
        limits.max_for_iterations = n;
    }
    if let Some(n) = args.max_call_depth {
        limits.max_call_depth = n;
    }

    let mut interpreter = Interpreter::default().with_limits(limits);
    let code = match interpreter.run(&program)? {
        Termination::Exit(code) => code.parse().unwrap_or(0),
        Termination::EndOfProgram => 0,
    };
    Ok(code)
}

fn check_command(args: &CheckArgs) -> Result<i32, CliError> {
    let program = read_program(&args.file)?;
    let (table, errors) = JumpTable::scan(program.lines(), &Limits::default());

    for (name, line) in table.labels() {
        println!("label    {:<16} line {}", name, line + 1);
    }
    for (name, span) in table.functions() {
        println!(
            "function {:<16} lines {}-{}",
            name,
            span.start + 1,
            span.end + 1
        );
    }
    for error in errors.iter() {
        println!("{error}");
    }

    Ok(if errors.is_empty() { 0 } else { 1 })
}
