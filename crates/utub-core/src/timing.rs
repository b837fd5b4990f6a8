//! Opt-in latency collection for board operations.
//!
//! Deck reconciles and CLI commands wrap their work in [`timed`]. Nothing is
//! recorded unless collection was switched on with [`set_timing_enabled`]
//! (the CLI does this for `--timing` or `UTUB_TIMING=1`).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

/// `None` while collection is off.
static RECORDER: Mutex<Option<BTreeMap<String, Vec<Duration>>>> = Mutex::new(None);

fn recorder() -> MutexGuard<'static, Option<BTreeMap<String, Vec<Duration>>>> {
    RECORDER.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Latency summary per operation name, sorted by name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TimingReport {
    pub operations: Vec<OperationStats>,
}

/// Nearest-rank percentiles for one operation, plus the time spent in it
/// overall. Serialized durations are whole microseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationStats {
    pub name: String,
    pub count: usize,
    #[serde(rename = "total_us", serialize_with = "as_micros")]
    pub total: Duration,
    #[serde(rename = "p50_us", serialize_with = "as_micros")]
    pub p50: Duration,
    #[serde(rename = "p95_us", serialize_with = "as_micros")]
    pub p95: Duration,
    #[serde(rename = "max_us", serialize_with = "as_micros")]
    pub max: Duration,
}

fn as_micros<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(value.as_micros()).unwrap_or(u64::MAX))
}

impl OperationStats {
    fn from_samples(name: String, mut values: Vec<Duration>) -> Self {
        values.sort_unstable();
        let rank = |pct: usize| nearest_rank(&values, pct);
        Self {
            count: values.len(),
            total: values.iter().sum(),
            p50: rank(50),
            p95: rank(95),
            max: values.last().copied().unwrap_or_default(),
            name,
        }
    }
}

/// Whether `UTUB_TIMING` asks for timing (`1`, `true`, `yes`, `on`).
#[must_use]
pub fn timing_enabled_from_env() -> bool {
    std::env::var("UTUB_TIMING").is_ok_and(|value| is_truthy(&value))
}

/// Switch collection on or off. Switching off drops pending samples.
pub fn set_timing_enabled(enabled: bool) {
    let mut slot = recorder();
    match (enabled, slot.is_some()) {
        (true, false) => *slot = Some(BTreeMap::new()),
        (false, _) => *slot = None,
        (true, true) => {}
    }
}

#[must_use]
pub fn is_timing_enabled() -> bool {
    recorder().is_some()
}

pub fn clear_timings() {
    if let Some(samples) = recorder().as_mut() {
        samples.clear();
    }
}

/// Run `f`, recording its wall time under `name` when timing is enabled.
///
/// The lock is not held while `f` runs, so timed sections may nest.
pub fn timed<R>(name: &str, f: impl FnOnce() -> R) -> R {
    if !is_timing_enabled() {
        return f();
    }
    let started = Instant::now();
    let result = f();
    record(name, started.elapsed());
    result
}

/// Take every recorded sample and summarize it.
#[must_use]
pub fn collect_report() -> TimingReport {
    let drained = recorder().as_mut().map(std::mem::take).unwrap_or_default();
    TimingReport {
        operations: drained
            .into_iter()
            .map(|(name, values)| OperationStats::from_samples(name, values))
            .collect(),
    }
}

impl TimingReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    #[must_use]
    pub fn display_table(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TimingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("No timing samples recorded.");
        }
        let row = |f: &mut fmt::Formatter<'_>, cells: [&str; 6]| {
            let [name, count, total, p50, p95, max] = cells;
            writeln!(f, "{name:<28} {count:>6} {total:>10} {p50:>9} {p95:>9} {max:>9}")
        };
        row(f, ["operation", "count", "total", "p50", "p95", "max"])?;
        writeln!(f, "{}", "-".repeat(76))?;
        for op in &self.operations {
            row(
                f,
                [
                    &op.name,
                    &op.count.to_string(),
                    &human(op.total),
                    &human(op.p50),
                    &human(op.p95),
                    &human(op.max),
                ],
            )?;
        }
        Ok(())
    }
}

fn record(name: &str, elapsed: Duration) {
    if let Some(samples) = recorder().as_mut() {
        samples.entry(name.to_owned()).or_default().push(elapsed);
    }
}

/// `sorted` must be ascending; empty input yields zero.
fn nearest_rank(sorted: &[Duration], pct: usize) -> Duration {
    let Some(last) = sorted.len().checked_sub(1) else {
        return Duration::ZERO;
    };
    let rank = (pct.min(100) * sorted.len()).div_ceil(100);
    sorted[rank.saturating_sub(1).min(last)]
}

fn human(duration: Duration) -> String {
    match duration.as_micros() {
        us @ 1_000_000.. => format!("{}.{:03}s", us / 1_000_000, (us % 1_000_000) / 1_000),
        us @ 1_000.. => format!("{}.{:03}ms", us / 1_000, us % 1_000),
        us => format!("{us}µs"),
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
