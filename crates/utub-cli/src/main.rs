#![forbid(unsafe_code)]

mod client;
mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use std::env;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use utub_core::config::{self, EffectiveConfig};
use utub_core::{Board, ErrorCode, RenderHooks, timing};

use client::HttpClient;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "utub: keep a UTub board in sync with its server",
    long_about = None
)]
struct Cli {
    /// Log board activity at debug level (`UTUB_LOG` still wins).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print per-operation latency to stderr when the command ends.
    #[arg(long, global = true)]
    timing: bool,

    /// Output format (pretty, text, json).
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Server base URL, overriding config and `UTUB_SERVER`.
    #[arg(long, global = true, value_name = "URL")]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Read",
        about = "Load one UTub and print its board",
        long_about = "Fetch the UTub list and one UTub snapshot, reconcile them into a board and print it.",
        after_help = "EXAMPLES:\n    # Show UTub 3\n    utub show 3\n\n    # Refetch URL 12 after the snapshot\n    utub show 3 --url 12\n\n    # Emit machine-readable output\n    utub show 3 --format json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Read",
        about = "Poll a UTub and report every reconcile pass",
        long_about = "Poll one UTub at a fixed interval, reconciling each response into the same board.",
        after_help = "EXAMPLES:\n    # Poll every 2 seconds\n    utub watch 3 --every 2\n\n    # Poll five times, one JSON line per round\n    utub watch 3 --rounds 5 --format json"
    )]
    Watch(cmd::watch::WatchArgs),

    #[command(
        next_help_heading = "Offline",
        about = "Replay recorded snapshots through a board",
        long_about = "Apply snapshot files in order to one board, without a server.",
        after_help = "EXAMPLES:\n    # Replay two captures\n    utub replay before.json after.json\n\n    # Keep removals fading for 500ms and leave them pending\n    utub replay passes.json --exit-ms 500 --no-settle"
    )]
    Replay(cmd::replay::ReplayArgs),

    #[command(
        next_help_heading = "Offline",
        about = "Show what a reconcile pass would change",
        long_about = "Compare the valid identities of two snapshot files per entity kind.",
        after_help = "EXAMPLES:\n    # Diff two captures\n    utub diff before.json after.json"
    )]
    Diff(cmd::diff::DiffArgs),

    #[command(
        next_help_heading = "Shell",
        about = "Print a completion script for your shell",
        after_help = "EXAMPLES:\n    utub completions bash > ~/.local/share/bash-completion/completions/utub\n    utub completions fish > ~/.config/fish/completions/utub.fish"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

/// Default directives when `UTUB_LOG` is unset.
fn default_log_directives(verbose: bool) -> &'static str {
    if verbose || env::var_os("DEBUG").is_some() {
        "utub=debug,info"
    } else {
        "utub=info,warn"
    }
}

/// Logs go to stderr so stdout stays parseable in every output mode.
fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("UTUB_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_log_directives(verbose)));
    let json_logs = env::var("UTUB_LOG_FORMAT").is_ok_and(|format| format == "json");

    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry
            .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

/// Drain the timing recorder to stderr, as JSON when `output` is JSON.
fn report_timing(output: OutputMode) -> anyhow::Result<()> {
    let report = timing::collect_report();
    if output.is_json() {
        eprintln!("{}", serde_json::to_string_pretty(&report.to_json())?);
    } else {
        eprintln!("{report}");
    }
    Ok(())
}

/// Load the layered configuration, then apply `--server`.
fn effective_config(cli: &Cli) -> anyhow::Result<EffectiveConfig> {
    let project_root = env::current_dir()?;
    let mut config = config::load_config(&project_root)?;
    if let Some(server) = &cli.server {
        config.server.url = server.trim_end_matches('/').to_string();
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let timing_enabled = cli.timing || timing::timing_enabled_from_env();
    timing::set_timing_enabled(timing_enabled);
    debug!(timing_enabled, "starting utub");

    let config = match effective_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            let output = resolve_output_mode(cli.format, cli.json, None);
            render_error(
                output,
                &CliError::from_code(ErrorCode::ConfigParseError, format!("{err:#}")),
            )?;
            return Err(err);
        }
    };
    let output = resolve_output_mode(cli.format, cli.json, config.output.as_deref());

    let command_result = match cli.command {
        Commands::Show(ref args) => timing::timed("cmd.show", || {
            let source = HttpClient::new(&config.server);
            let mut board = Board::new(&config, RenderHooks::default())?;
            cmd::show::run_show(args, &source, &mut board, output)
        }),
        Commands::Watch(ref args) => timing::timed("cmd.watch", || {
            let source = HttpClient::new(&config.server);
            let mut board = Board::new(&config, RenderHooks::default())?;
            cmd::watch::run_watch(args, &source, &mut board, output)
        }),
        Commands::Replay(ref args) => timing::timed("cmd.replay", || {
            let mut board = cmd::replay::replay_board(args, config.exit_transition())?;
            cmd::replay::run_replay(args, &mut board, output)
        }),
        Commands::Diff(ref args) => {
            timing::timed("cmd.diff", || cmd::diff::run_diff(args, output))
        }
        Commands::Completions(ref args) => timing::timed("cmd.completions", || {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }),
    };

    if timing_enabled {
        report_timing(output)?;
    }

    command_result
}

#[cfg(test)]
mod tests {
    use super::*;
    use utub_core::model::{UrlId, UtubId};

    #[test]
    fn timing_flag_parses_before_subcommand() {
        let cli = Cli::parse_from(["utub", "--timing", "show", "3"]);
        assert!(cli.timing);
        assert!(matches!(cli.command, Commands::Show(_)));
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::parse_from([
            "utub",
            "watch",
            "3",
            "--every",
            "0.5",
            "--format",
            "json",
            "--server",
            "http://utubs.test/",
        ]);
        assert_eq!(cli.format, Some(OutputMode::Json));
        assert_eq!(cli.server.as_deref(), Some("http://utubs.test/"));
        let Commands::Watch(args) = cli.command else {
            panic!("expected watch");
        };
        assert_eq!(args.utub, UtubId(3));
        assert!((args.every - 0.5).abs() < f64::EPSILON);
        assert!(args.rounds.is_none());
    }

    #[test]
    fn hidden_json_flag_parses() {
        let cli = Cli::parse_from(["utub", "diff", "a.json", "b.json", "--json"]);
        assert!(cli.json);
        assert!(cli.format.is_none());
    }

    #[test]
    fn show_collects_repeated_url_flags() {
        let cli = Cli::parse_from(["utub", "show", "3", "--url", "10", "--url", "11"]);
        let Commands::Show(args) = cli.command else {
            panic!("expected show");
        };
        assert_eq!(args.refetch, [UrlId(10), UrlId(11)]);
    }

    #[test]
    fn replay_flags_parse() {
        let cli = Cli::parse_from([
            "utub",
            "replay",
            "a.json",
            "b.json",
            "--exit-ms",
            "250",
            "--no-settle",
        ]);
        let Commands::Replay(args) = cli.command else {
            panic!("expected replay");
        };
        assert_eq!(args.files.len(), 2);
        assert_eq!(args.exit_ms, Some(250));
        assert!(args.no_settle);
    }

    #[test]
    fn replay_requires_a_file() {
        assert!(Cli::try_parse_from(["utub", "replay"]).is_err());
    }

    #[test]
    fn non_numeric_utub_is_rejected() {
        assert!(Cli::try_parse_from(["utub", "show", "home"]).is_err());
    }

    #[test]
    fn verbose_switches_default_logging_to_debug() {
        let cli = Cli::parse_from(["utub", "diff", "a.json", "b.json", "-v"]);
        assert!(cli.verbose);
        assert_eq!(default_log_directives(true), "utub=debug,info");
    }

    #[test]
    fn completions_subcommand_parses() {
        let cli = Cli::parse_from(["utub", "completions", "bash"]);
        assert!(matches!(cli.command, Commands::Completions(_)));
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
