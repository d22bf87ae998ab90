#![forbid(unsafe_code)]

mod cmd;
mod output;
mod scheduler;
mod server;

use clap::{Parser, Subcommand};
use output::{CliError, OutputMode, Reported, render_error, report};
use rehearsal_core::ErrorCode;
use rehearsal_core::config::{load_config, resolve_database_path};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "rehearsal: practice-room booking calendar with weekly slot cutover",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Config file to load instead of ./rehearsal.toml or the user config.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file (overrides REHEARSAL_DB and the config file).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Run the booking HTTP server and weekly cutover timer",
        after_help = "EXAMPLES:\n    # Serve on the configured address\n    rehearsal serve\n\n    # Serve on a specific address\n    rehearsal serve --listen 127.0.0.1:8080"
    )]
    Serve(cmd::serve::ServeArgs),

    #[command(
        about = "Apply staged slot changes now",
        long_about = "Run a manual cutover: promote every staged change and seed the week three weeks out.",
        after_help = "EXAMPLES:\n    rehearsal apply-now\n    rehearsal apply-now --json"
    )]
    ApplyNow,

    #[command(
        about = "Seed default slots for the current three-week window",
        long_about = "Give every date from this week's Sunday through the next 21 days its default slots, skipping dates that already have an entry."
    )]
    InitSlots,

    #[command(
        about = "Stage a slot change for one date",
        after_help = "EXAMPLES:\n    # Replace the slots of a date at the next cutover\n    rehearsal stage 2024-06-10 \"17:00〜19:00\" \"19:00〜21:00\"\n\n    # Clear a date at the next cutover\n    rehearsal stage 2024-06-10"
    )]
    Stage(cmd::stage::StageArgs),

    #[command(about = "Show live slots, bookings, and staged edits for a date")]
    Show(cmd::show::ShowArgs),

    #[command(about = "List every staged slot change")]
    Pending,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("REHEARSAL_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "rehearsal=debug,info"
        } else {
            "rehearsal=info,warn"
        })
    });

    let format = env::var("REHEARSAL_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let output = OutputMode::from_json_flag(cli.json);
    match run(cli, output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if err.downcast_ref::<Reported>().is_none() {
                let _ = render_error(output, &CliError::new(format!("{err:#}")));
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, output: OutputMode) -> anyhow::Result<()> {
    let working_dir = env::current_dir()?;
    let config = load_config(cli.config.as_deref(), &working_dir).map_err(|err| {
        let code = ErrorCode::ConfigParseError;
        let mut cli_err = CliError::new(format!("{err:#}"));
        cli_err.error_code = Some(code.code().to_string());
        cli_err.hint = code.hint().map(str::to_string);
        report(output, &cli_err)
    })?;
    let db_path = resolve_database_path(&config, cli.db, env::var("REHEARSAL_DB").ok());

    let ctx = cmd::Context {
        config,
        db_path,
        output,
    };

    match cli.command {
        Commands::Serve(ref args) => cmd::serve::run_serve(args, &ctx),
        Commands::ApplyNow => cmd::cutover::run_apply_now(&ctx),
        Commands::InitSlots => cmd::cutover::run_init_slots(&ctx),
        Commands::Stage(ref args) => cmd::stage::run_stage(args, &ctx),
        Commands::Show(ref args) => cmd::show::run_show(args, &ctx),
        Commands::Pending => cmd::stage::run_pending(&ctx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::parse_from(["rehearsal", "pending", "--json", "--db", "/tmp/r.sqlite3"]);
        assert!(cli.json);
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/r.sqlite3")));
        assert!(matches!(cli.command, Commands::Pending));
    }

    #[test]
    fn serve_accepts_listen_override() {
        let cli = Cli::parse_from(["rehearsal", "serve", "--listen", "127.0.0.1:9000"]);
        match cli.command {
            Commands::Serve(args) => assert_eq!(args.listen.as_deref(), Some("127.0.0.1:9000")),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
