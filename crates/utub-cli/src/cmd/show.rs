//! `utub show`: fetch one UTub and print its board.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::io::Write;
use std::time::Instant;
use tracing::info;
use utub_core::board::{SnapshotOutcome, UrlOutcome};
use utub_core::model::{UrlId, UtubId};
use utub_core::{Board, ErrorCode};

use super::{BoardSummary, deck_line, write_deck_detail, write_summary_text};
use crate::client::SnapshotSource;
use crate::output::{
    CliError, OutputMode, pretty_kv, pretty_section, render_error, render_mode,
};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// UTub to load.
    pub utub: UtubId,

    /// Refetch single URLs after the snapshot (repeatable).
    #[arg(long = "url", value_name = "URL_ID")]
    pub refetch: Vec<UrlId>,
}

#[derive(Debug, Serialize)]
struct RefetchResult {
    url: UrlId,
    outcome: UrlOutcome,
}

#[derive(Debug, Serialize)]
struct ShowResult {
    outcome: SnapshotOutcome,
    refetched: Vec<RefetchResult>,
    board: BoardSummary,
    #[serde(skip)]
    outline: String,
}

pub fn run_show(
    args: &ShowArgs,
    source: &dyn SnapshotSource,
    board: &mut Board,
    output: OutputMode,
) -> Result<()> {
    let now = Instant::now();
    let list = match source.utubs() {
        Ok(list) => list,
        Err(err) => {
            render_error(output, &err.to_cli_error())?;
            anyhow::bail!(err);
        }
    };
    board.apply_utub_list(&list, now)?;

    let token = board.select_utub(args.utub)?;
    let snapshot = match source.snapshot(args.utub) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            board.fetch_failed(token, err.code(), err.to_string());
            render_error(output, &err.to_cli_error())?;
            anyhow::bail!(err);
        }
    };
    let outcome = board.apply_snapshot(token, &snapshot, now)?;
    if let SnapshotOutcome::Discarded { reason } = &outcome {
        let message = format!("snapshot for UTub {} was discarded ({reason:?})", args.utub);
        render_error(output, &CliError::from_code(ErrorCode::StaleResponse, &message))?;
        anyhow::bail!(message);
    }

    let mut refetched = Vec::with_capacity(args.refetch.len());
    for url in &args.refetch {
        match source.url(args.utub, *url) {
            Ok(payload) => {
                let outcome = board.apply_url(token, &payload)?;
                info!(%url, ?outcome, "url refetched");
                refetched.push(RefetchResult { url: *url, outcome });
            }
            Err(err) => {
                board.fetch_failed(token, err.code(), err.to_string());
                render_error(output, &err.to_cli_error())?;
                anyhow::bail!(err);
            }
        }
    }
    board.settle();

    let result = ShowResult {
        outcome,
        refetched,
        board: BoardSummary::of(board)?,
        outline: board.outline(),
    };
    render_mode(output, &result, render_text, render_pretty)
}

fn render_text(result: &ShowResult, w: &mut dyn Write) -> std::io::Result<()> {
    write_summary_text(w, &result.board)?;
    for refetch in &result.refetched {
        writeln!(w, "refetch {} {:?}", refetch.url, refetch.outcome)?;
    }
    Ok(())
}

fn render_pretty(result: &ShowResult, w: &mut dyn Write) -> std::io::Result<()> {
    let title = result.board.utub.map_or_else(
        || "UTub".to_string(),
        |id| format!("UTub {id}: {}", result.board.name),
    );
    pretty_section(w, &title)?;
    if let SnapshotOutcome::Applied(report) = &result.outcome {
        pretty_kv(w, "Refresh", report.token.to_string())?;
        pretty_kv(w, "URLs", deck_line(&report.urls))?;
        pretty_kv(w, "Tags", deck_line(&report.tags))?;
        pretty_kv(w, "Members", deck_line(&report.members))?;
        if report.urls.malformed + report.tags.malformed + report.members.malformed > 0 {
            writeln!(w)?;
            writeln!(w, "Skipped entities:")?;
            write_deck_detail(w, &report.urls)?;
            write_deck_detail(w, &report.tags)?;
            write_deck_detail(w, &report.members)?;
        }
    }
    for refetch in &result.refetched {
        pretty_kv(w, "Refetch", format!("url {} {:?}", refetch.url, refetch.outcome))?;
    }
    writeln!(w)?;
    write!(w, "{}", result.outline)
}
