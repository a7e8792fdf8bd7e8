//! Configuration loader (spec §6/§10.3). TOML via `toml_edit::DocumentMut`
//! so round-trip edits preserve comments and formatting, matching the
//! teacher's `cli/src/config.rs` `ConfigStore`. A malformed file falls back
//! to a manual line scanner rather than discarding its contents outright;
//! a file that is present but unparsable by either path produces a warning
//! and an empty configuration (spec §7 `config-malformed`).

use std::io::ErrorKind;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use toml_edit::DocumentMut;
use toml_edit::Item as TomlItem;
use toml_edit::value;

use crate::notifier::NotifierConfig;

const DEFAULT_TEMPLATE: &str = r#"# agentrepl configuration.

[notifications]
enabled = false
# sound = "default"
threshold_seconds = 60
debounce_seconds = 5.0

[plugins]
paths = []
"#;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplConfig {
    pub notifier: NotifierConfig,
    pub plugin_paths: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn default_path() -> anyhow::Result<PathBuf> {
        let Some(home) = dirs::home_dir() else {
            anyhow::bail!("cannot determine home directory for config path");
        };
        Ok(home.join(".agentrepl").join("config.toml"))
    }

    /// Missing file: write the default template, return its values. Present
    /// but unparsable by both the TOML parser and the fallback scanner:
    /// warn, return `ReplConfig::default()`. Never returns `Err`.
    pub fn load(&self) -> ReplConfig {
        let contents = match read_to_string_or_none(&self.path) {
            Ok(Some(contents)) => contents,
            Ok(None) => {
                if let Err(err) = write_atomic_text(&self.path, DEFAULT_TEMPLATE) {
                    tracing::warn!(error = %err, path = %self.path.display(), "failed to write default config template");
                }
                DEFAULT_TEMPLATE.to_string()
            }
            Err(err) => {
                tracing::warn!(error = %err, path = %self.path.display(), "failed to read config file");
                return ReplConfig::default();
            }
        };

        match contents.parse::<DocumentMut>() {
            Ok(doc) => parse_document(&doc),
            Err(_) => match parse_fallback(&contents) {
                Some(config) => config,
                None => {
                    tracing::warn!(path = %self.path.display(), "config file is malformed; using empty configuration");
                    ReplConfig::default()
                }
            },
        }
    }
}

fn parse_document(doc: &DocumentMut) -> ReplConfig {
    let mut config = ReplConfig::default();

    if let Some(notifications) = doc.get("notifications").and_then(TomlItem::as_table) {
        if let Some(enabled) = notifications.get("enabled").and_then(TomlItem::as_bool) {
            config.notifier.enabled = enabled;
        }
        if let Some(sound) = notifications.get("sound").and_then(TomlItem::as_str) {
            config.notifier.sound = Some(sound.to_string());
        }
        if let Some(threshold) = notifications
            .get("threshold_seconds")
            .and_then(TomlItem::as_integer)
        {
            config.notifier.threshold_seconds = threshold.max(0) as u64;
        }
        if let Some(debounce) = notifications
            .get("debounce_seconds")
            .and_then(TomlItem::as_float)
        {
            config.notifier.debounce_seconds = debounce;
        }
    }

    if let Some(plugins) = doc.get("plugins").and_then(TomlItem::as_table) {
        if let Some(paths) = plugins.get("paths").and_then(TomlItem::as_array) {
            config.plugin_paths = paths
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
        }
    }

    config
}

/// Recovers the handful of keys this crate reads when the document fails
/// to parse as TOML outright — tolerant of a truncated or hand-edited file
/// that still has recognizable `key = value` lines.
fn parse_fallback(contents: &str) -> Option<ReplConfig> {
    let mut config = ReplConfig::default();
    let mut in_notifications = false;
    let mut in_plugins = false;
    let mut found_any = false;

    for line in contents.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('[') {
            let header = parse_table_header_name(trimmed);
            in_notifications = header == Some("notifications");
            in_plugins = header == Some("plugins");
            continue;
        }

        let Some(line) = strip_toml_comment(trimmed) else {
            continue;
        };
        let Some((key, raw_value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let raw_value = raw_value.trim();

        if in_notifications {
            match key {
                "enabled" => {
                    if let Some(b) = parse_bool_token(raw_value) {
                        config.notifier.enabled = b;
                        found_any = true;
                    }
                }
                "threshold_seconds" => {
                    if let Ok(n) = raw_value.parse::<u64>() {
                        config.notifier.threshold_seconds = n;
                        found_any = true;
                    }
                }
                "debounce_seconds" => {
                    if let Ok(n) = raw_value.parse::<f64>() {
                        config.notifier.debounce_seconds = n;
                        found_any = true;
                    }
                }
                _ => {}
            }
        } else if in_plugins && key == "paths" {
            config.plugin_paths = raw_value
                .trim_start_matches('[')
                .trim_end_matches(']')
                .split(',')
                .map(|s| s.trim().trim_matches('"').to_string())
                .filter(|s| !s.is_empty())
                .collect();
            found_any = true;
        }
    }

    found_any.then_some(config)
}

fn parse_bool_token(value: &str) -> Option<bool> {
    match value.split_whitespace().next()? {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn parse_table_header_name(line: &str) -> Option<&str> {
    let end = line.find(']')?;
    if end <= 1 {
        return None;
    }
    let name = line[1..end].trim();
    (!name.is_empty()).then_some(name)
}

fn strip_toml_comment(line: &str) -> Option<&str> {
    let line = line.split_once('#').map_or(line, |(head, _)| head).trim();
    (!line.is_empty()).then_some(line)
}

fn read_to_string_or_none(path: &Path) -> anyhow::Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(anyhow::Error::new(err).context("read config file")),
    }
}

/// Ported from the teacher's `cli/src/atomic_write.rs`: write to a
/// `tempfile::NamedTempFile` in the destination's own directory, then
/// persist over it, so a crash never leaves a half-written config.
fn write_atomic_text(path: &Path, contents: &str) -> anyhow::Result<()> {
    let Some(parent) = path.parent() else {
        anyhow::bail!("invalid path for atomic write: {}", path.display());
    };
    std::fs::create_dir_all(parent).map_err(|err| anyhow::Error::new(err).context(format!("create {}", parent.display())))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|err| anyhow::Error::new(err).context("create temp file"))?;
    tmp.write_all(contents.as_bytes())
        .map_err(|err| anyhow::Error::new(err).context("write temp file"))?;
    tmp.flush().map_err(|err| anyhow::Error::new(err).context("flush temp file"))?;

    tmp.persist(path)
        .map_err(|err| anyhow::Error::new(err.error).context(format!("persist file to {}", path.display())))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_writes_default_template_and_parses_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let store = ConfigStore::new(path.clone());

        let config = store.load();
        assert!(!config.notifier.enabled);
        assert_eq!(config.notifier.threshold_seconds, 60);
        assert!(path.exists());
    }

    #[test]
    fn well_formed_toml_is_read_with_preserved_precision() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"[notifications]
enabled = true
sound = "pop"
threshold_seconds = 120
debounce_seconds = 2.5

[plugins]
paths = ["./my_agent.so"]
"#,
        )
        .unwrap();

        let config = ConfigStore::new(path).load();
        assert!(config.notifier.enabled);
        assert_eq!(config.notifier.sound, Some("pop".to_string()));
        assert_eq!(config.notifier.threshold_seconds, 120);
        assert_eq!(config.notifier.debounce_seconds, 2.5);
        assert_eq!(config.plugin_paths, vec!["./my_agent.so".to_string()]);
    }

    #[test]
    fn malformed_toml_falls_back_to_line_scanner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"[notifications]
enabled = true
enabled = false
threshold_seconds = 90
"#,
        )
        .unwrap();

        let config = ConfigStore::new(path).load();
        assert_eq!(config.notifier.threshold_seconds, 90);
    }

    #[test]
    fn fully_unparsable_file_produces_empty_config_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "????\n???\n").unwrap();

        let config = ConfigStore::new(path).load();
        assert_eq!(config, ReplConfig::default());
    }
}
