//! ledger-sync CLI entry point.

use clap::Parser;
use ledger_sync::cli::commands;
use ledger_sync::cli::{Cli, Commands};
use ledger_sync::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Set up tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    // Resolve effective JSON mode: --json OR non-TTY stdout
    let json = cli.json || !std::io::IsTerminal::is_terminal(&std::io::stdout());

    match run(&cli, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,rusqlite=info,hyper=info,reqwest=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli, json: bool) -> Result<(), Error> {
    let opts = cli.global_opts(json);

    match &cli.command {
        Commands::Init { force } => commands::init::execute(cli.db.as_ref(), *force, json),
        Commands::Version => commands::version::execute(json),
        Commands::Status => commands::status::execute(&opts),

        // Local writes and reads
        Commands::Tx { command } => commands::tx::execute(command, &opts),
        Commands::Profile { command } => commands::profile::execute(command, &opts),
        Commands::Forecast { command } => commands::forecast::execute(command, &opts),

        // Sync
        Commands::Sync(args) => commands::sync::execute(args, &opts),

        Commands::Config { command } => commands::config::execute(command, json),

        // Shell completions
        Commands::Completions { shell } => commands::completions::execute(shell),
    }
}
