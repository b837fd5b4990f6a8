pub mod completions;
pub mod diff;
pub mod replay;
pub mod show;
pub mod watch;

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Display;
use std::io::{self, Write};
use std::path::Path;
use utub_core::deck::DeckReport;
use utub_core::model::{MemberId, TagId, UrlId, UtubId, UtubPayload};
use utub_core::{Board, ErrorCode};

use crate::output::{CliError, OutputMode, render_error};

/// What a board shows after a command ran.
#[derive(Debug, Serialize)]
pub struct BoardSummary {
    pub utub: Option<UtubId>,
    pub name: String,
    pub owner: Option<MemberId>,
    pub utubs: Vec<UtubId>,
    pub members: Vec<MemberId>,
    pub tags: Vec<TagId>,
    pub urls: Vec<UrlId>,
    pub filter: Vec<TagId>,
    pub pending_exits: usize,
}

impl BoardSummary {
    pub fn of(board: &Board) -> Result<Self> {
        let doc = board.document();
        Ok(Self {
            utub: board.active_utub(),
            name: board.utub_name().to_string(),
            owner: board.owner(),
            utubs: board.utubs().ids(doc)?,
            members: board.members().ids(doc)?,
            tags: board.tags().ids(doc)?,
            urls: board.urls().ids(doc)?,
            filter: board.filter().selected().iter().copied().collect(),
            pending_exits: board.pending_exits(),
        })
    }
}

fn join_ids<I: Display>(ids: &[I]) -> String {
    if ids.is_empty() {
        "-".to_string()
    } else {
        ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
    }
}

/// `urls +4 -1 =2 ~0 !0` (added, removed, retained, deferred, malformed).
pub fn deck_line<I: Display>(report: &DeckReport<I>) -> String {
    format!(
        "{} +{} -{} ={} ~{} !{}",
        report.kind,
        report.added.len(),
        report.removed.len(),
        report.retained.len(),
        report.deferred.len(),
        report.malformed
    )
}

pub fn write_deck_detail<I: Display>(w: &mut dyn Write, report: &DeckReport<I>) -> io::Result<()> {
    writeln!(
        w,
        "  {:<7} added {}  removed {}  deferred {}  malformed {}",
        report.kind.as_str(),
        join_ids(&report.added),
        join_ids(&report.removed),
        join_ids(&report.deferred),
        report.malformed
    )
}

pub fn write_summary_text(w: &mut dyn Write, summary: &BoardSummary) -> io::Result<()> {
    let utub = summary
        .utub
        .map_or_else(|| "-".to_string(), |id| id.to_string());
    writeln!(w, "utub    {utub} {}", summary.name)?;
    let owner = summary
        .owner
        .map_or_else(|| "-".to_string(), |id| id.to_string());
    writeln!(w, "owner   {owner}")?;
    writeln!(w, "members {}", join_ids(&summary.members))?;
    writeln!(w, "tags    {}", join_ids(&summary.tags))?;
    writeln!(w, "urls    {}", join_ids(&summary.urls))?;
    Ok(())
}

/// Read a snapshot file holding one UTub object or an array of them.
pub fn read_snapshots(path: &Path) -> Result<Vec<UtubPayload>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    let snapshots = if value.is_array() {
        serde_json::from_value::<Vec<UtubPayload>>(value)
    } else {
        serde_json::from_value::<UtubPayload>(value).map(|one| vec![one])
    };
    snapshots.with_context(|| format!("{} is not a UTub snapshot", path.display()))
}

/// [`read_snapshots`], rendering a structured error on failure.
pub fn load_snapshots(path: &Path, output: OutputMode) -> Result<Vec<UtubPayload>> {
    match read_snapshots(path) {
        Ok(snapshots) => Ok(snapshots),
        Err(err) => {
            render_error(
                output,
                &CliError::from_code(ErrorCode::SnapshotUnreadable, format!("{err:#}")),
            )?;
            Err(err)
        }
    }
}
