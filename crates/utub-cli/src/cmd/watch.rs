//! `utub watch`: poll a UTub and reconcile every response into one board.
//!
//! A failed poll leaves the board as it was; the next successful poll
//! catches up.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::io::Write;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use utub_core::board::{SnapshotOutcome, SnapshotReport};
use utub_core::model::UtubId;
use utub_core::{Board, ErrorCode, RefreshToken};

use super::deck_line;
use crate::client::SnapshotSource;
use crate::output::{OutputMode, render_error, render_json_line};

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// UTub to poll.
    pub utub: UtubId,

    /// Seconds between polls.
    #[arg(long, default_value_t = 5.0, value_parser = parse_interval)]
    pub every: f64,

    /// Stop after this many polls (runs until interrupted when omitted).
    #[arg(long)]
    pub rounds: Option<u32>,
}

fn interval(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|err| anyhow::anyhow!("invalid poll interval {secs}: {err}"))
}

fn parse_interval(raw: &str) -> std::result::Result<f64, String> {
    let secs: f64 = raw.trim().parse().map_err(|err| format!("{err}"))?;
    interval(secs).map_err(|err| err.to_string())?;
    Ok(secs)
}

/// Outcome of one poll.
#[derive(Debug, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RoundResult {
    Applied {
        round: u32,
        report: SnapshotReport,
        exits_completed: usize,
    },
    Discarded {
        round: u32,
        token: RefreshToken,
    },
    Failed {
        round: u32,
        error_code: ErrorCode,
        message: String,
        exits_completed: usize,
    },
}

/// Run the poll loop, handing each round to `on_round` and waiting with
/// `sleep` in between.
pub fn poll_rounds(
    args: &WatchArgs,
    source: &dyn SnapshotSource,
    board: &mut Board,
    mut on_round: impl FnMut(&RoundResult) -> Result<()>,
    mut sleep: impl FnMut(Duration),
) -> Result<()> {
    let interval = interval(args.every)?;
    let list = source.utubs()?;
    board.apply_utub_list(&list, Instant::now())?;
    let mut token = board.select_utub(args.utub)?;

    let mut round = 0;
    loop {
        round += 1;
        let exits_completed = board.tick(Instant::now());
        let result = match source.snapshot(args.utub) {
            Ok(snapshot) => match board.apply_snapshot(token, &snapshot, Instant::now())? {
                SnapshotOutcome::Applied(report) => RoundResult::Applied {
                    round,
                    report,
                    exits_completed,
                },
                SnapshotOutcome::Discarded { reason } => {
                    debug!(%token, ?reason, "poll response discarded");
                    RoundResult::Discarded { round, token }
                }
            },
            Err(err) => {
                board.fetch_failed(token, err.code(), err.to_string());
                RoundResult::Failed {
                    round,
                    error_code: err.code(),
                    message: err.to_string(),
                    exits_completed,
                }
            }
        };
        on_round(&result)?;

        if args.rounds.is_some_and(|limit| round >= limit) {
            break;
        }
        sleep(interval);
        token = board.begin_refresh()?;
    }
    Ok(())
}

pub fn run_watch(
    args: &WatchArgs,
    source: &dyn SnapshotSource,
    board: &mut Board,
    output: OutputMode,
) -> Result<()> {
    let result = poll_rounds(
        args,
        source,
        board,
        |round| print_round(output, round),
        std::thread::sleep,
    );
    if let Err(err) = &result {
        if let Some(fetch) = err.downcast_ref::<crate::client::FetchError>() {
            render_error(output, &fetch.to_cli_error())?;
        }
    }
    result
}

fn print_round(output: OutputMode, round: &RoundResult) -> Result<()> {
    if output.is_json() {
        return render_json_line(round);
    }
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match round {
        RoundResult::Applied {
            round,
            report,
            exits_completed,
        } => {
            writeln!(
                out,
                "round {round}: {}  {}  {}  exits {exits_completed}",
                deck_line(&report.urls),
                deck_line(&report.tags),
                deck_line(&report.members)
            )?;
        }
        RoundResult::Discarded { round, token } => {
            writeln!(out, "round {round}: response for {token} discarded")?;
        }
        RoundResult::Failed {
            round,
            error_code,
            message,
            ..
        } => {
            warn!(round, %message, "poll failed");
            writeln!(out, "round {round}: failed [{error_code}] {message}; keeping last view")?;
        }
    }
    Ok(())
}
