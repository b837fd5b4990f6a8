use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::deck::ExitTransition;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_EXIT_TRANSITION_MS: u64 = 300;

/// One config file as written on disk. Every field is optional so a project
/// file only needs to name what it overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub view: ViewSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub csrf_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSection {
    #[serde(default)]
    pub exit_transition_ms: Option<u64>,
}

impl ConfigFile {
    /// Fields set in `over` win over fields set in `self`.
    #[must_use]
    pub fn overlay(self, over: Self) -> Self {
        Self {
            output: over.output.or(self.output),
            server: ServerSection {
                url: over.server.url.or(self.server.url),
                timeout_secs: over.server.timeout_secs.or(self.server.timeout_secs),
                csrf_token: over.server.csrf_token.or(self.server.csrf_token),
            },
            view: ViewSection {
                exit_transition_ms: over
                    .view
                    .exit_transition_ms
                    .or(self.view.exit_transition_ms),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerConfig {
    pub url: String,
    pub timeout_secs: u64,
    /// Sent as `X-CSRFToken` when set.
    pub csrf_token: Option<String>,
}

impl ServerConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewConfig {
    pub exit_transition_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveConfig {
    pub server: ServerConfig,
    pub view: ViewConfig,
    /// Output mode named in a config file, if any.
    pub output: Option<String>,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                url: DEFAULT_SERVER_URL.to_string(),
                timeout_secs: DEFAULT_TIMEOUT_SECS,
                csrf_token: None,
            },
            view: ViewConfig {
                exit_transition_ms: DEFAULT_EXIT_TRANSITION_MS,
            },
            output: None,
        }
    }
}

impl EffectiveConfig {
    #[must_use]
    pub const fn exit_transition(&self) -> ExitTransition {
        ExitTransition::from_millis(self.view.exit_transition_ms)
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        return Ok(ConfigFile::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ConfigFile>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

#[must_use]
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".utub/config.toml")
}

pub fn load_project_config(project_root: &Path) -> Result<ConfigFile> {
    read_config_file(&project_config_path(project_root))
}

pub fn load_user_config() -> Result<ConfigFile> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(ConfigFile::default());
    };
    read_config_file(&config_dir.join("utub/config.toml"))
}

/// User file, then `.utub/config.toml` under `project_root`, then the
/// `UTUB_SERVER` and `UTUB_EXIT_MS` environment variables.
pub fn load_config(project_root: &Path) -> Result<EffectiveConfig> {
    let user = load_user_config()?;
    let project = load_project_config(project_root)?;
    resolve(user.overlay(project), |key| env::var(key).ok())
}

fn resolve(file: ConfigFile, lookup: impl Fn(&str) -> Option<String>) -> Result<EffectiveConfig> {
    let defaults = EffectiveConfig::default();

    let url = lookup("UTUB_SERVER")
        .filter(|value| !value.trim().is_empty())
        .or(file.server.url)
        .unwrap_or(defaults.server.url);

    let exit_transition_ms = match lookup("UTUB_EXIT_MS") {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("UTUB_EXIT_MS must be a whole number of milliseconds, got {raw:?}"))?,
        None => file
            .view
            .exit_transition_ms
            .unwrap_or(defaults.view.exit_transition_ms),
    };

    Ok(EffectiveConfig {
        server: ServerConfig {
            url: url.trim_end_matches('/').to_string(),
            timeout_secs: file
                .server
                .timeout_secs
                .unwrap_or(defaults.server.timeout_secs),
            csrf_token: file.server.csrf_token,
        },
        view: ViewConfig { exit_transition_ms },
        output: file.output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn missing_project_config_uses_defaults() {
        let root = tempfile::tempdir().expect("temp dir must be created");
        let file = load_project_config(root.path()).expect("load should succeed");
        assert_eq!(file, ConfigFile::default());

        let cfg = resolve(file, no_env).expect("resolve should succeed");
        assert_eq!(cfg, EffectiveConfig::default());
        assert_eq!(cfg.server.url, "http://127.0.0.1:5000");
        assert_eq!(cfg.exit_transition(), ExitTransition::from_millis(300));
    }

    #[test]
    fn project_config_is_parsed() {
        let root = tempfile::tempdir().expect("temp dir must be created");
        std::fs::create_dir_all(root.path().join(".utub")).expect("create .utub");
        std::fs::write(
            project_config_path(root.path()),
            r#"
output = "json"

[server]
url = "https://utubs.example/"
csrf_token = "abc123"

[view]
exit_transition_ms = 0
"#,
        )
        .expect("write config");

        let file = load_project_config(root.path()).expect("load should succeed");
        let cfg = resolve(file, no_env).expect("resolve should succeed");
        assert_eq!(cfg.server.url, "https://utubs.example");
        assert_eq!(cfg.server.csrf_token.as_deref(), Some("abc123"));
        assert_eq!(cfg.server.timeout(), Duration::from_secs(10));
        assert_eq!(cfg.exit_transition(), ExitTransition::Instant);
        assert_eq!(cfg.output.as_deref(), Some("json"));
    }

    #[test]
    fn malformed_project_config_is_an_error() {
        let root = tempfile::tempdir().expect("temp dir must be created");
        std::fs::create_dir_all(root.path().join(".utub")).expect("create .utub");
        std::fs::write(project_config_path(root.path()), "[view\nexit_transition_ms = ")
            .expect("write config");

        let err = load_project_config(root.path()).expect_err("parse should fail");
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn project_layer_wins_over_user_layer() {
        let user = ConfigFile {
            output: Some("pretty".to_string()),
            server: ServerSection {
                url: Some("http://user.example".to_string()),
                timeout_secs: Some(30),
                csrf_token: None,
            },
            view: ViewSection::default(),
        };
        let project = ConfigFile {
            server: ServerSection {
                url: Some("http://project.example".to_string()),
                ..ServerSection::default()
            },
            view: ViewSection {
                exit_transition_ms: Some(50),
            },
            ..ConfigFile::default()
        };

        let merged = user.overlay(project);
        assert_eq!(merged.server.url.as_deref(), Some("http://project.example"));
        assert_eq!(merged.server.timeout_secs, Some(30));
        assert_eq!(merged.view.exit_transition_ms, Some(50));
        assert_eq!(merged.output.as_deref(), Some("pretty"));
    }

    #[test]
    fn environment_overrides_files() {
        let env = HashMap::from([
            ("UTUB_SERVER", "http://env.example"),
            ("UTUB_EXIT_MS", "25"),
        ]);
        let file = ConfigFile {
            server: ServerSection {
                url: Some("http://file.example".to_string()),
                ..ServerSection::default()
            },
            view: ViewSection {
                exit_transition_ms: Some(500),
            },
            ..ConfigFile::default()
        };

        let cfg = resolve(file, |key| env.get(key).map(ToString::to_string))
            .expect("resolve should succeed");
        assert_eq!(cfg.server.url, "http://env.example");
        assert_eq!(cfg.view.exit_transition_ms, 25);
    }

    #[test]
    fn unparseable_exit_ms_is_reported() {
        let err = resolve(ConfigFile::default(), |key| {
            (key == "UTUB_EXIT_MS").then(|| "soon".to_string())
        })
        .expect_err("must fail");
        assert!(err.to_string().contains("UTUB_EXIT_MS"));
    }
}
