//! Output formatting shared by every `utub` command.
//!
//! A command builds one serializable result and hands it to [`render_mode`]
//! together with a compact text renderer and a pretty renderer. JSON output is
//! always the serialized result, so scripts see the same fields regardless of
//! which human format they would have gotten.
//!
//! # Choosing the mode
//!
//! The first of these that is set wins:
//! 1. `--format` (or the hidden `--json`)
//! 2. `FORMAT` env var: `pretty`, `text` or `json`
//! 3. `output` in a config file
//! 4. [`OutputMode::Pretty`] on a terminal, [`OutputMode::Text`] otherwise
//!
//! Unknown names in (2) and (3) are ignored rather than rejected.

use clap::ValueEnum;
use serde::Serialize;
use std::io::{self, IsTerminal, Write};
use utub_core::ErrorCode;

/// Width of the rule under pretty section headings.
pub const PRETTY_RULE_WIDTH: usize = 72;

pub fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    writeln!(w, "{:-<width$}", "", width = PRETTY_RULE_WIDTH)
}

/// `key:` padded to a fixed column, then the value.
pub fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<12} {}", format!("{key}:"), value.as_ref())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    /// Sections and a board outline, for people at a terminal.
    Pretty,
    /// One fact per line, for pipes and scripts.
    Text,
    /// The serialized command result.
    Json,
}

impl OutputMode {
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }

    fn parse(raw: &str) -> Option<Self> {
        Self::from_str(raw.trim(), true).ok()
    }
}

fn pick_output_mode(
    format_flag: Option<OutputMode>,
    json_flag: bool,
    format_env: Option<&str>,
    config_output: Option<&str>,
    is_tty: bool,
) -> OutputMode {
    format_flag
        .or_else(|| json_flag.then_some(OutputMode::Json))
        .or_else(|| format_env.and_then(OutputMode::parse))
        .or_else(|| config_output.and_then(OutputMode::parse))
        .unwrap_or(if is_tty {
            OutputMode::Pretty
        } else {
            OutputMode::Text
        })
}

pub fn resolve_output_mode(
    format_flag: Option<OutputMode>,
    json_flag: bool,
    config_output: Option<&str>,
) -> OutputMode {
    pick_output_mode(
        format_flag,
        json_flag,
        std::env::var("FORMAT").ok().as_deref(),
        config_output,
        io::stdout().is_terminal(),
    )
}

fn write_mode<T: Serialize>(
    w: &mut dyn Write,
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut *w, value)?;
            writeln!(w)?;
        }
        OutputMode::Text => text_fn(value, w)?,
        OutputMode::Pretty => pretty_fn(value, w)?,
    }
    Ok(())
}

/// Print a command result to stdout in `mode`.
pub fn render_mode<T: Serialize>(
    mode: OutputMode,
    value: &T,
    text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    pretty_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_mode(&mut out, mode, value, text_fn, pretty_fn)
}

/// Print `value` as a single JSON line. `watch` emits one per round.
pub fn render_json_line<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

/// An error as shown to the user: message, `E####` code and a hint.
#[derive(Debug, Serialize)]
pub struct CliError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl CliError {
    pub fn from_code(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: code.hint().map(str::to_string),
            error_code: Some(code.code().to_string()),
        }
    }
}

fn write_error(w: &mut dyn Write, mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    if mode.is_json() {
        serde_json::to_writer_pretty(&mut *w, &serde_json::json!({ "error": error }))?;
        writeln!(w)?;
        return Ok(());
    }
    match &error.error_code {
        Some(code) => writeln!(w, "error[{code}]: {}", error.message)?,
        None => writeln!(w, "error: {}", error.message)?,
    }
    if let Some(suggestion) = &error.suggestion {
        writeln!(w, "  suggestion: {suggestion}")?;
    }
    Ok(())
}

/// Print an error to stderr in `mode`.
pub fn render_error(mode: OutputMode, error: &CliError) -> anyhow::Result<()> {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    write_error(&mut out, mode, error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Sample {
        urls: Vec<u64>,
    }

    fn text(sample: &Sample, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "urls {}", sample.urls.len())
    }

    fn pretty(sample: &Sample, w: &mut dyn Write) -> io::Result<()> {
        pretty_section(w, "Board")?;
        pretty_kv(w, "URLs", sample.urls.len().to_string())
    }

    fn rendered(mode: OutputMode) -> String {
        let mut buf = Vec::new();
        write_mode(&mut buf, mode, &Sample { urls: vec![1, 2] }, text, pretty).expect("render");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn flag_beats_everything() {
        let mode = pick_output_mode(Some(OutputMode::Text), true, Some("pretty"), Some("json"), true);
        assert_eq!(mode, OutputMode::Text);
        let mode = pick_output_mode(None, true, Some("pretty"), None, true);
        assert_eq!(mode, OutputMode::Json);
    }

    #[test]
    fn env_beats_config_and_is_case_insensitive() {
        assert_eq!(
            pick_output_mode(None, false, Some(" JSON "), Some("pretty"), true),
            OutputMode::Json
        );
    }

    #[test]
    fn unknown_names_fall_through() {
        assert_eq!(
            pick_output_mode(None, false, Some("fancy"), Some("text"), true),
            OutputMode::Text
        );
        assert_eq!(
            pick_output_mode(None, false, Some("fancy"), Some("loud"), false),
            OutputMode::Text
        );
        assert_eq!(pick_output_mode(None, false, None, None, true), OutputMode::Pretty);
    }

    #[test]
    fn each_mode_uses_its_renderer() {
        assert_eq!(rendered(OutputMode::Text), "urls 2\n");
        assert!(rendered(OutputMode::Pretty).starts_with("Board\n---"));
        assert!(rendered(OutputMode::Pretty).contains("URLs:        2"));

        let json: serde_json::Value =
            serde_json::from_str(&rendered(OutputMode::Json)).expect("json");
        assert_eq!(json["urls"], serde_json::json!([1, 2]));
    }

    #[test]
    fn errors_carry_code_and_hint() {
        let err = CliError::from_code(ErrorCode::FetchNotFound, "GET /utubs/9 returned HTTP 404");

        let mut buf = Vec::new();
        write_error(&mut buf, OutputMode::Text, &err).expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.starts_with("error[E4003]: GET /utubs/9 returned HTTP 404\n"));
        assert!(text.contains("  suggestion: "));

        let mut buf = Vec::new();
        write_error(&mut buf, OutputMode::Json, &err).expect("write");
        let json: serde_json::Value = serde_json::from_slice(&buf).expect("json");
        assert_eq!(json["error"]["error_code"], "E4003");
    }
}
