use std::{
    fs,
    io::{stdin, stdout, BufRead, Write},
    path::PathBuf,
    process::ExitCode,
    time::{SystemTime, UNIX_EPOCH},
};

use cellforth::{cell::IMMEDIATE, Cell, Resume, SuspendReason, Vm, BOOT};
use clap::{Args, Parser};
use miette::{Context, IntoDiagnostic};

mod config;

use crate::config::{ReplConfig, VmOptions};

fn main() -> miette::Result<ExitCode> {
    use tracing_subscriber::prelude::*;

    let App {
        vm: vm_opts,
        boot,
        no_boot,
        config,
        opcodes,
        output,
        args,
    } = App::parse();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().without_time().pretty())
        .with(output.trace_filter)
        .init();

    let config = match config {
        Some(path) => ReplConfig::load(&path)?,
        None => ReplConfig::default(),
    };
    let params = vm_opts.apply(config.vm);
    tracing::debug!(?params, "building VM");

    let mut vm = Vm::new(params, (), Vm::<()>::PLATFORM)
        .into_diagnostic()
        .wrap_err("failed to build the VM")?;

    if opcodes {
        for (id, entry) in vm.opcodes() {
            let imm = if entry.flags & IMMEDIATE != 0 {
                " (immediate)"
            } else {
                ""
            };
            println!("{id:>4}  {}{imm}", entry.name);
        }
        return Ok(ExitCode::SUCCESS);
    }

    vm.natives_mut().register("getpid", getpid);
    vm.natives_mut().register("time", unix_time);

    let source = match boot.or(config.boot) {
        _ if no_boot => String::new(),
        Some(path) => fs::read_to_string(&path)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to read boot program '{}'", path.display()))?,
        None => BOOT.to_string(),
    };
    let argv = args.iter().map(String::as_str).collect::<Vec<_>>();
    let resume = vm
        .boot(&argv, &source)
        .into_diagnostic()
        .wrap_err("failed to load the boot program")?;
    let resume = match run_boot(&mut vm, resume)? {
        Ok(resume) => resume,
        Err(code) => return Ok(exit_code(code)),
    };
    tracing::info!("boot program loaded");

    repl(&mut vm, resume)
}

/// A REPL for the cellforth VM.
#[derive(Debug, Parser)]
#[clap(about, version)]
struct App {
    #[clap(flatten)]
    vm: VmOptions,

    /// Boot program to evaluate instead of the built-in one.
    #[clap(long, conflicts_with = "no_boot")]
    boot: Option<PathBuf>,

    /// Start with only the primitives installed.
    #[clap(long)]
    no_boot: bool,

    /// TOML file with VM settings. Command line options override it.
    #[clap(long, short)]
    config: Option<PathBuf>,

    /// Print the opcode table and exit.
    #[clap(long)]
    opcodes: bool,

    #[clap(flatten)]
    output: OutputOptions,

    /// Arguments made visible to the boot program as `argc`/`argv`.
    #[clap(last = true)]
    args: Vec<String>,
}

#[derive(Clone, Debug, Args)]
#[command(next_help_heading = "Output Options")]
struct OutputOptions {
    /// Tracing filter for the REPL and the VM.
    #[clap(
        long = "trace",
        alias = "log",
        env = "RUST_LOG",
        default_value = "info",
        global = true
    )]
    trace_filter: tracing_subscriber::filter::Targets,
}

/// Runs the boot program to the end of its text. Returns the exit code
/// instead if it said `BYE`.
fn run_boot(vm: &mut Vm<()>, resume: Resume) -> miette::Result<Result<Resume, Cell>> {
    let mut resume = resume;
    loop {
        let sus = vm
            .run(resume)
            .into_diagnostic()
            .wrap_err("boot program failed")?;
        flush_output(vm)?;
        match sus.reason {
            SuspendReason::Yield => resume = sus.resume,
            SuspendReason::InputExhausted => return Ok(Ok(sus.resume)),
            SuspendReason::Bye(code) => return Ok(Err(code)),
        }
    }
}

fn repl(vm: &mut Vm<()>, resume: Resume) -> miette::Result<ExitCode> {
    let mut resume = resume;
    let stdin = stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        stdout().flush().into_diagnostic()?;
        line.clear();
        if stdin.lock().read_line(&mut line).into_diagnostic()? == 0 {
            println!();
            return Ok(ExitCode::SUCCESS);
        }

        match vm.interpret(resume, line.trim_end_matches(['\n', '\r'])) {
            Ok(sus) => {
                flush_output(vm)?;
                if let SuspendReason::Bye(code) = sus.reason {
                    return Ok(exit_code(code));
                }
                println!(" ok");
                resume = sus.resume;
            }
            Err(error) => {
                flush_output(vm)?;
                println!();
                eprintln!("{:?}", miette::Report::msg(error).wrap_err("input failed"));
                tracing::debug!(stack = ?vm.data_stack(), "resetting after error");
                resume = vm.reset().into_diagnostic()?;
            }
        }
    }
}

fn flush_output(vm: &mut Vm<()>) -> miette::Result<()> {
    let mut out = stdout();
    out.write_all(vm.output.as_bytes()).into_diagnostic()?;
    out.flush().into_diagnostic()?;
    vm.output.clear();
    Ok(())
}

fn exit_code(code: Cell) -> ExitCode {
    ExitCode::from(code as u8)
}

fn getpid(_: &[Cell]) -> Cell {
    std::process::id() as Cell
}

fn unix_time(_: &[Cell]) -> Cell {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as Cell)
        .unwrap_or(0)
}
