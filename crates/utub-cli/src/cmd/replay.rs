//! `utub replay`: feed recorded snapshots through one board, offline.
//!
//! Replay runs on its own clock: pass `n` happens `n` exit transitions after
//! the first, so removals started in one pass have finished by the next and
//! the output does not depend on how fast the machine is.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use utub_core::board::SnapshotOutcome;
use utub_core::deck::ExitTransition;
use utub_core::model::UtubId;
use utub_core::{Board, ErrorCode, RenderHooks};

use super::{BoardSummary, deck_line, load_snapshots, write_deck_detail, write_summary_text};
use crate::output::{CliError, OutputMode, pretty_kv, pretty_section, render_error, render_mode};

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Snapshot files, applied in order. Each holds one UTub object or an
    /// array of them.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Fade removals out over this many milliseconds instead of the
    /// configured transition.
    #[arg(long, value_name = "MS")]
    pub exit_ms: Option<u64>,

    /// Leave exits pending at the end instead of completing them.
    #[arg(long)]
    pub no_settle: bool,
}

#[derive(Debug, Serialize)]
struct Pass {
    file: String,
    index: usize,
    selected: bool,
    outcome: SnapshotOutcome,
}

#[derive(Debug, Serialize)]
struct ReplayResult {
    passes: Vec<Pass>,
    settled: usize,
    board: BoardSummary,
    #[serde(skip)]
    outline: String,
}

/// Build the board a replay runs against.
pub fn replay_board(args: &ReplayArgs, configured: ExitTransition) -> Result<Board> {
    let transition = args.exit_ms.map_or(configured, ExitTransition::from_millis);
    Ok(Board::with_transition(transition, RenderHooks::default())?)
}

/// Instant of pass `pass` on the replay clock.
fn pass_time(start: Instant, step: Duration, pass: usize) -> Instant {
    let ticks = u32::try_from(pass).unwrap_or(u32::MAX);
    step.checked_mul(ticks)
        .and_then(|offset| start.checked_add(offset))
        .unwrap_or(start)
}

pub fn run_replay(args: &ReplayArgs, board: &mut Board, output: OutputMode) -> Result<()> {
    let mut passes = Vec::new();
    let start = Instant::now();
    let step = board.urls().transition().duration();

    for path in &args.files {
        let snapshots = load_snapshots(path, output)?;
        for (index, snapshot) in snapshots.iter().enumerate() {
            let Some(id) = snapshot.id else {
                let message = format!("{} entry {index} has no UTub id", path.display());
                render_error(
                    output,
                    &CliError::from_code(ErrorCode::SnapshotUnreadable, &message),
                )?;
                anyhow::bail!(message);
            };
            let utub = UtubId(id);

            let now = pass_time(start, step, passes.len());
            board.tick(now);
            let selected = board.active_utub() != Some(utub);
            let token = if selected {
                board.select_utub(utub)?
            } else {
                board.begin_refresh()?
            };
            let outcome = board.apply_snapshot(token, snapshot, now)?;
            debug!(file = %path.display(), index, %token, "snapshot replayed");
            passes.push(Pass {
                file: path.display().to_string(),
                index,
                selected,
                outcome,
            });
        }
    }

    let settled = if args.no_settle { 0 } else { board.settle() };
    info!(passes = passes.len(), settled, "replay finished");

    let result = ReplayResult {
        passes,
        settled,
        board: BoardSummary::of(board)?,
        outline: board.outline(),
    };
    render_mode(output, &result, render_text, render_pretty)
}

fn render_text(result: &ReplayResult, w: &mut dyn Write) -> std::io::Result<()> {
    for pass in &result.passes {
        match &pass.outcome {
            SnapshotOutcome::Applied(report) => writeln!(
                w,
                "{}#{} {}  {}  {}",
                pass.file,
                pass.index,
                deck_line(&report.urls),
                deck_line(&report.tags),
                deck_line(&report.members)
            )?,
            SnapshotOutcome::Discarded { reason } => {
                writeln!(w, "{}#{} discarded {reason:?}", pass.file, pass.index)?;
            }
        }
    }
    write_summary_text(w, &result.board)?;
    writeln!(w, "pending {}", result.board.pending_exits)
}

fn render_pretty(result: &ReplayResult, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, &format!("Replay ({} passes)", result.passes.len()))?;
    for pass in &result.passes {
        let label = format!("{}#{}", pass.file, pass.index);
        match &pass.outcome {
            SnapshotOutcome::Applied(report) => {
                let verb = if pass.selected { "select" } else { "refresh" };
                pretty_kv(w, verb, format!("{label} ({})", report.token))?;
                write_deck_detail(w, &report.urls)?;
                write_deck_detail(w, &report.tags)?;
                write_deck_detail(w, &report.members)?;
                if !report.dropped_filters.is_empty() {
                    pretty_kv(w, "filter", format!("dropped {:?}", report.dropped_filters))?;
                }
            }
            SnapshotOutcome::Discarded { reason } => {
                pretty_kv(w, "discarded", format!("{label} ({reason:?})"))?;
            }
        }
    }
    writeln!(w)?;
    pretty_kv(w, "Settled", result.settled.to_string())?;
    pretty_kv(w, "Pending", result.board.pending_exits.to_string())?;
    writeln!(w)?;
    write!(w, "{}", result.outline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use utub_core::model::UrlId;

    fn write_snapshot(dir: &std::path::Path, name: &str, json: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, json).expect("write snapshot");
        path
    }

    fn args(files: Vec<PathBuf>) -> ReplayArgs {
        ReplayArgs {
            files,
            exit_ms: None,
            no_settle: false,
        }
    }

    #[test]
    fn replay_converges_on_last_snapshot() {
        let dir = tempfile::tempdir().expect("temp dir");
        let first = write_snapshot(
            dir.path(),
            "a.json",
            r#"{"id": 1, "name": "Home", "urls": [
                {"id": 1, "title": "a", "href": "https://a.test", "tagIds": []},
                {"id": 2, "title": "b", "href": "https://b.test", "tagIds": []}
            ]}"#,
        );
        let second = write_snapshot(
            dir.path(),
            "b.json",
            r#"{"id": 1, "name": "Home", "urls": [
                {"id": 2, "title": "b", "href": "https://b.test", "tagIds": []},
                {"id": 3, "title": "c", "href": "https://c.test", "tagIds": []}
            ]}"#,
        );
        let args = args(vec![first, second]);
        let mut board = replay_board(&args, ExitTransition::Instant).expect("board");

        run_replay(&args, &mut board, OutputMode::Text).expect("replay");
        assert_eq!(
            board.urls().ids(board.document()).expect("ids"),
            [UrlId(2), UrlId(3)]
        );
    }

    #[test]
    fn no_settle_leaves_fading_rows() {
        let dir = tempfile::tempdir().expect("temp dir");
        let passes = write_snapshot(
            dir.path(),
            "passes.json",
            r#"[
                {"id": 1, "urls": [{"id": 1, "title": "a", "href": "https://a.test", "tagIds": []}]},
                {"id": 1, "urls": []}
            ]"#,
        );
        let mut args = args(vec![passes]);
        args.exit_ms = Some(60_000);
        args.no_settle = true;
        let mut board = replay_board(&args, ExitTransition::Instant).expect("board");

        run_replay(&args, &mut board, OutputMode::Json).expect("replay");
        assert_eq!(board.pending_exits(), 1);
        assert!(board.urls().ids(board.document()).expect("ids").is_empty());
    }

    #[test]
    fn fading_exits_finish_between_passes_regardless_of_speed() {
        let dir = tempfile::tempdir().expect("temp dir");
        let passes = write_snapshot(
            dir.path(),
            "passes.json",
            r#"[
                {"id": 1, "urls": [
                    {"id": 1, "title": "a", "href": "https://a.test", "tagIds": []},
                    {"id": 2, "title": "b", "href": "https://b.test", "tagIds": []}
                ]},
                {"id": 1, "urls": [{"id": 2, "title": "b", "href": "https://b.test", "tagIds": []}]},
                {"id": 1, "urls": [
                    {"id": 1, "title": "a", "href": "https://a.test", "tagIds": []},
                    {"id": 2, "title": "b", "href": "https://b.test", "tagIds": []}
                ]}
            ]"#,
        );
        let mut args = args(vec![passes]);
        args.exit_ms = Some(60_000);
        args.no_settle = true;
        let mut board = replay_board(&args, ExitTransition::Instant).expect("board");

        run_replay(&args, &mut board, OutputMode::Json).expect("replay");
        assert_eq!(board.pending_exits(), 0);
        assert_eq!(
            board.urls().ids(board.document()).expect("ids"),
            [UrlId(2), UrlId(1)]
        );
    }

    #[test]
    fn replay_clock_steps_one_transition_per_pass() {
        let start = Instant::now();
        let step = Duration::from_millis(250);
        assert_eq!(pass_time(start, step, 0), start);
        assert_eq!(pass_time(start, step, 4), start + Duration::from_secs(1));
        assert_eq!(pass_time(start, Duration::ZERO, 9), start);
    }

    #[test]
    fn snapshot_without_id_is_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let bad = write_snapshot(dir.path(), "bad.json", r#"{"name": "nameless"}"#);
        let args = args(vec![bad]);
        let mut board = replay_board(&args, ExitTransition::Instant).expect("board");

        let err = run_replay(&args, &mut board, OutputMode::Text).expect_err("must fail");
        assert!(err.to_string().contains("has no UTub id"));
    }
}
