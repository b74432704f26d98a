//! statevm CLI
//!
//! Command-line tools for compiled state-script expressions: disassemble,
//! verify and evaluate them against a sandbox world.
//!
//! Logging goes to stderr and is filtered by `RUST_LOG` (default
//! `statevm=info`); soft script faults show up there as warnings.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{Shell, generate};
use statevm_runtime::{
    CharId, CharSpec, Machine, Program, Sandbox, VmConfig, disassemble, render, verify,
};
use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use tracing::debug;

#[derive(ClapParser)]
#[command(name = "svm")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "statevm - inspect and run compiled state-script bytecode", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a program as an instruction listing
    Disasm {
        /// Program file, or hex digits with --hex
        input: String,

        /// Read the program from INPUT as hex instead of a file
        #[arg(long)]
        hex: bool,
    },

    /// Check that a program decodes and every jump lands on an instruction
    Verify {
        /// Program file, or hex digits with --hex
        input: String,

        /// Read the program from INPUT as hex instead of a file
        #[arg(long)]
        hex: bool,
    },

    /// Evaluate a program against a sandbox world
    Eval {
        /// Program file, or hex digits with --hex
        input: String,

        /// Read the program from INPUT as hex instead of a file
        #[arg(long)]
        hex: bool,

        /// Sandbox world (TOML). Defaults to players 1 and 2 on opposite teams.
        #[arg(short, long, value_name = "PATH")]
        world: Option<PathBuf>,

        /// Character evaluating the program
        #[arg(short, long, default_value_t = 1)]
        subject: i32,

        /// Interpreter limits (TOML); STATEVM_* variables still apply
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Local variables to allocate; their final values are printed
        #[arg(short, long, default_value_t = 0)]
        locals: usize,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("statevm=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Disasm { input, hex } => run_disasm(&load_program(&input, hex)),
        Commands::Verify { input, hex } => run_verify(&load_program(&input, hex)),
        Commands::Eval {
            input,
            hex,
            world,
            subject,
            config,
            locals,
        } => {
            let program = load_program(&input, hex);
            run_eval(
                &program,
                world.as_deref(),
                CharId(subject),
                config.as_deref(),
                locals,
            );
        }
        Commands::Completions { shell } => run_completions(shell),
    }
}

fn fail(context: &str, e: impl Display) -> ! {
    eprintln!("Error: {}: {}", context, e);
    process::exit(1);
}

fn load_program(input: &str, hex: bool) -> Program {
    match read_program(input, hex) {
        Ok(p) => p,
        Err(e) => fail(input, e),
    }
}

/// Program bytes from a file, or from hex digits (whitespace ignored)
fn read_program(input: &str, hex: bool) -> Result<Program, String> {
    if hex {
        let digits: String = input.chars().filter(|c| !c.is_whitespace()).collect();
        hex::decode(digits)
            .map(Program::from)
            .map_err(|e| format!("invalid hex: {}", e))
    } else {
        fs::read(input)
            .map(Program::from)
            .map_err(|e| e.to_string())
    }
}

fn run_disasm(program: &Program) {
    match disassemble(program) {
        Ok(listing) => print!("{}", render(&listing)),
        Err(e) => fail("disassembly failed", e),
    }
}

fn run_verify(program: &Program) {
    match verify(program) {
        Ok(count) => println!("ok: {} instructions in {} bytes", count, program.len()),
        Err(e) => fail("verification failed", e),
    }
}

fn default_world() -> Sandbox {
    let mut world = Sandbox::new(0);
    world.add_char(CharSpec::player(1, 1));
    world.add_char(CharSpec::player(2, 2));
    world
}

fn run_eval(
    program: &Program,
    world_path: Option<&Path>,
    subject: CharId,
    config_path: Option<&Path>,
    locals: usize,
) {
    let config = match config_path {
        Some(path) => VmConfig::load(path).unwrap_or_else(|e| fail("config", e)),
        None => VmConfig::from_env(),
    };
    let mut world = match world_path {
        Some(path) => Sandbox::load(path).unwrap_or_else(|e| fail("world", e)),
        None => default_world(),
    };
    if !world.contains(subject) {
        fail("eval", format!("no character {} in the world", subject));
    }
    debug!(?config, %subject, "evaluating {} bytes", program.len());

    let mut machine = Machine::new(config);
    match machine.eval_with_locals(&mut world, subject, program, locals) {
        Ok((value, vars)) => {
            println!("{}", value);
            for (i, v) in vars.iter().enumerate() {
                println!("local({}) = {}", i, v);
            }
        }
        Err(e) => fail("evaluation aborted", e),
    }
}

fn run_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "svm", &mut io::stdout());
}
