//! `utub diff`: what a reconcile pass would change between two snapshots.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::PathBuf;
use utub_core::deck::{self, DeckKind, Members, Tags, Urls};
use utub_core::model::{EntityKind, MemberId, TagId, UrlId, UtubPayload};

use super::load_snapshots;
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};

#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Snapshot currently on screen.
    pub old: PathBuf,
    /// Snapshot just received. Files holding an array use their last entry.
    pub new: PathBuf,
}

/// Per-kind delta between the valid identities of two snapshots.
#[derive(Debug, Serialize)]
pub struct KindDelta<I> {
    pub kind: EntityKind,
    pub remove: Vec<I>,
    pub add: Vec<I>,
    pub malformed_old: usize,
    pub malformed_new: usize,
}

impl<I: std::fmt::Display> KindDelta<I> {
    fn line(&self) -> String {
        let list = |ids: &[I]| {
            ids.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",")
        };
        format!(
            "{} -[{}] +[{}]",
            self.kind,
            list(&self.remove),
            list(&self.add)
        )
    }
}

#[derive(Debug, Serialize)]
struct DiffResult {
    urls: KindDelta<UrlId>,
    tags: KindDelta<TagId>,
    members: KindDelta<MemberId>,
}

struct Decoded<I> {
    valid: BTreeSet<I>,
    /// Ids named only by entries that failed validation.
    held: BTreeSet<I>,
    malformed: usize,
}

fn decode_ids<K: DeckKind>(payloads: &[K::Payload]) -> Decoded<K::Id> {
    let mut decoded = Decoded {
        valid: BTreeSet::new(),
        held: BTreeSet::new(),
        malformed: 0,
    };
    for payload in payloads {
        match K::decode(payload) {
            Ok(entity) => {
                decoded.valid.insert(K::identity(&entity));
            }
            Err(err) => {
                decoded.malformed += 1;
                decoded.held.extend(err.id.map(K::Id::from));
            }
        }
    }
    decoded.held.retain(|id| !decoded.valid.contains(id));
    decoded
}

/// Delta for one kind, computed the way a reconcile pass computes it: a
/// malformed entry is never added, but an id it names is not removed either.
pub fn kind_delta<K: DeckKind>(old: &[K::Payload], new: &[K::Payload]) -> KindDelta<K::Id> {
    let old = decode_ids::<K>(old);
    let new = decode_ids::<K>(new);
    let mut listed = new.valid.clone();
    listed.extend(new.held.iter().copied());
    let delta = deck::diff(&old.valid, &listed);
    KindDelta {
        kind: K::KIND,
        remove: delta.to_remove.into_iter().collect(),
        add: delta
            .to_add
            .into_iter()
            .filter(|id| new.valid.contains(id))
            .collect(),
        malformed_old: old.malformed,
        malformed_new: new.malformed,
    }
}

fn last_snapshot(path: &std::path::Path, output: OutputMode) -> Result<UtubPayload> {
    let mut snapshots = load_snapshots(path, output)?;
    snapshots
        .pop()
        .ok_or_else(|| anyhow::anyhow!("{} holds no snapshots", path.display()))
}

pub fn run_diff(args: &DiffArgs, output: OutputMode) -> Result<()> {
    let old = last_snapshot(&args.old, output)?;
    let new = last_snapshot(&args.new, output)?;
    let result = DiffResult {
        urls: kind_delta::<Urls>(&old.urls, &new.urls),
        tags: kind_delta::<Tags>(&old.tags, &new.tags),
        members: kind_delta::<Members>(&old.members, &new.members),
    };
    render_mode(output, &result, render_text, render_pretty)
}

fn render_text(result: &DiffResult, w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "{}", result.urls.line())?;
    writeln!(w, "{}", result.tags.line())?;
    writeln!(w, "{}", result.members.line())
}

fn render_pretty(result: &DiffResult, w: &mut dyn Write) -> std::io::Result<()> {
    pretty_section(w, "Snapshot diff")?;
    pretty_kv(w, "URLs", result.urls.line())?;
    pretty_kv(w, "Tags", result.tags.line())?;
    pretty_kv(w, "Members", result.members.line())?;
    let skipped =
        result.urls.malformed_new + result.tags.malformed_new + result.members.malformed_new;
    if skipped > 0 {
        pretty_kv(w, "Skipped", format!("{skipped} malformed in new snapshot"))?;
    }
    Ok(())
}
