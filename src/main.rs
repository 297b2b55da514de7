use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

use ok::diagnostic::{ansi::AnsiRenderer, json, registry, Diagnostic};
use ok::vm::VmOptions;

/// ok - a small scripting language on a register VM
#[derive(Parser, Debug)]
#[command(name = "ok", version, about)]
struct Cli {
    /// Emit diagnostics as JSON lines on stderr
    #[arg(long, global = true)]
    json: bool,

    /// Never color diagnostics
    #[arg(long, global = true)]
    no_color: bool,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile and run a source file
    Run {
        file: PathBuf,
        /// Stop after this many executed instructions
        #[arg(long, value_name = "N")]
        max_steps: Option<usize>,
    },
    /// Print the parsed program as JSON
    Ast { file: PathBuf },
    /// Print the compiled instruction listing
    Asm { file: PathBuf },
    /// Explain an error code, e.g. OK-P001, or list every code
    Explain { code: Option<String> },
    /// Print the version
    Version,
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// A failed command: what to report and the source it points into.
struct Failure {
    diagnostics: Vec<Diagnostic>,
    source: Option<String>,
}

impl Failure {
    fn new(diagnostics: Vec<Diagnostic>, source: Option<&str>) -> Self {
        Failure { diagnostics, source: source.map(str::to_string) }
    }
}

fn read_source(path: &Path) -> Result<String, Failure> {
    fs::read_to_string(path).map_err(|e| {
        let d = Diagnostic::error(format!("cannot read {}: {e}", path.display()));
        Failure::new(vec![d], None)
    })
}

fn execute(command: &Command) -> Result<(), Failure> {
    match command {
        Command::Run { file, max_steps } => {
            let source = read_source(file)?;
            debug!(file = %file.display(), bytes = source.len(), "running");
            let stdout = io::stdout();
            let mut out = stdout.lock();
            let options = VmOptions { max_steps: *max_steps };
            let result = ok::run_source(&source, options, &mut out);
            let _ = out.flush();
            result.map(|_| ()).map_err(|e| Failure::new(e.diagnostics(), Some(&source)))
        }
        Command::Ast { file } => {
            let source = read_source(file)?;
            let program = ok::parse_source(&source).map_err(|e| Failure::new(e.diagnostics(), Some(&source)))?;
            let json = serde_json::to_string_pretty(&program)
                .map_err(|e| Failure::new(vec![Diagnostic::error(e.to_string())], None))?;
            println!("{json}");
            Ok(())
        }
        Command::Asm { file } => {
            let source = read_source(file)?;
            let func = ok::compile_source(&source).map_err(|e| Failure::new(e.diagnostics(), Some(&source)))?;
            print!("{func}");
            println!("; {} registers", func.registers);
            Ok(())
        }
        Command::Explain { code: None } => {
            for entry in registry::REGISTRY {
                println!("{}  {}", entry.code, entry.short);
            }
            Ok(())
        }
        Command::Explain { code: Some(code) } => match registry::lookup(code) {
            Some(entry) => {
                print!("{}", entry.long);
                Ok(())
            }
            None => {
                let d = Diagnostic::error(format!("unknown error code '{code}'"))
                    .with_suggestion("Codes look like OK-L001, OK-P001, OK-C001 or OK-R001.");
                Err(Failure::new(vec![d], None))
            }
        },
        Command::Version => {
            println!("ok {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn report(failure: Failure, as_json: bool, use_color: bool) {
    let renderer = AnsiRenderer { use_color };
    let stderr = io::stderr();
    let mut err = stderr.lock();
    for d in failure.diagnostics {
        let d = match &failure.source {
            Some(source) => d.with_source(source.clone()),
            None => d,
        };
        let _ = if as_json {
            writeln!(err, "{}", json::render(&d))
        } else {
            write!(err, "{}", renderer.render(&d))
        };
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(failure) = execute(&cli.command) {
        let use_color = !cli.no_color && io::stderr().is_terminal();
        report(failure, cli.json, use_color);
        process::exit(1);
    }
}
