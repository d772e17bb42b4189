use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use peach::{Options, DB};
use simplelog::{ColorChoice, Config as LogConfig, LevelFilter, TermLogger, TerminalMode};

#[derive(Parser, Debug)]
#[command(name = "peach", about = "An embeddable, append-only log-structured key-value store")]
struct Cli {
    /// Data directory to open.
    #[arg(short, long, global = true)]
    db_path: Option<PathBuf>,

    /// TOML config file layered under `--db-path` and `PEACH_*` environment variables.
    #[arg(short, long, global = true, default_value = "peach.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetches the value stored for a key.
    Get { key: String },
    /// Stores a value for a key.
    Put { key: String, value: String },
    /// Removes a key.
    Delete { key: String },
    /// Reports the number of live keys.
    Size,
    /// Forces a full compaction cycle.
    Compact,
}

fn main() -> ExitCode {
    TermLogger::init(LevelFilter::Info, LogConfig::default(), TerminalMode::Mixed, ColorChoice::Auto)
        .expect("failed to initialize logger");

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("peach: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> peach::Result<()> {
    let opts = if cli.config.exists() {
        Options::load(&cli.config, cli.db_path.as_deref())?
    } else {
        Options::default_at(cli.db_path.unwrap_or_else(|| PathBuf::from("/tmp/peach")))
    };

    let db = DB::new(opts)?;

    match cli.command {
        Command::Get { key } => {
            let value = db.get(key.as_bytes())?;
            println!("{}", String::from_utf8_lossy(&value));
        }
        Command::Put { key, value } => {
            db.put(key.as_bytes(), value.as_bytes())?;
        }
        Command::Delete { key } => {
            db.delete(key.as_bytes())?;
        }
        Command::Size => {
            println!("{}", db.size());
        }
        Command::Compact => {
            db.compact()?;
        }
    }

    db.close()
}
