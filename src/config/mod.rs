//! Settings persisted in a flat `KEY=value` file.
//!
//! The scraper reads the file once per run; the config form rewrites it.
//! Nothing here touches the process environment, so every caller gets the
//! settings passed explicitly.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

pub const ACCESS_TOKEN_KEY: &str = "AIRTABLE_ACCESS_TOKEN";
pub const BASE_ID_KEY: &str = "AIRTABLE_BASE_ID";
pub const ZIP_CODE_KEY: &str = "ZILLOW_ZIP_CODE";

const FILE_HEADER: &str = "# Configuration for Zillow Scraper";
const PLACEHOLDER_MARKER: &str = "YOUR_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    #[error("failed to write settings file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Credentials and search target for one scrape run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub access_token: String,
    pub base_id: String,
    pub zip_code: String,
}

impl Settings {
    /// Check presence and format of every value before any network call.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            (ACCESS_TOKEN_KEY, &self.access_token),
            (BASE_ID_KEY, &self.base_id),
            (ZIP_CODE_KEY, &self.zip_code),
        ];
        for (key, value) in fields {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(key));
            }
            if value.contains(PLACEHOLDER_MARKER) {
                return Err(ConfigError::Invalid {
                    key,
                    reason: "placeholder value".to_string(),
                });
            }
        }

        if !self.access_token.starts_with("pat") {
            return Err(ConfigError::Invalid {
                key: ACCESS_TOKEN_KEY,
                reason: "personal access tokens start with 'pat'".to_string(),
            });
        }

        if self.zip_code.len() != 5 || !self.zip_code.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::Invalid {
                key: ZIP_CODE_KEY,
                reason: format!("'{}' is not a 5-digit ZIP code", self.zip_code),
            });
        }

        Ok(())
    }
}

/// Reads and rewrites the settings file at a fixed path
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load whatever is in the file. A missing file yields empty settings;
    /// validation is up to the caller.
    pub fn load(&self) -> Result<Settings, ConfigError> {
        if !self.path.exists() {
            debug!("Settings file {} does not exist yet", self.path.display());
            return Ok(Settings::default());
        }

        let read_err = |source| ConfigError::Read {
            path: self.path.clone(),
            source,
        };

        let mut values = HashMap::new();
        for item in dotenvy::from_path_iter(&self.path).map_err(read_err)? {
            let (key, value) = item.map_err(read_err)?;
            values.insert(key, value);
        }

        let mut take = |key: &str| values.remove(key).unwrap_or_default();
        Ok(Settings {
            access_token: take(ACCESS_TOKEN_KEY),
            base_id: take(BASE_ID_KEY),
            zip_code: take(ZIP_CODE_KEY),
        })
    }

    /// Rewrite the managed keys in place, keeping every other line as is.
    pub fn save(&self, settings: &Settings) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: self.path.clone(),
            source,
        };

        let existing = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FILE_HEADER.to_string(),
            Err(e) => return Err(write_err(e)),
        };

        let mut pending = vec![
            (ACCESS_TOKEN_KEY, settings.access_token.as_str()),
            (BASE_ID_KEY, settings.base_id.as_str()),
            (ZIP_CODE_KEY, settings.zip_code.as_str()),
        ];
        let mut seen = Vec::new();
        let mut lines = Vec::new();

        for line in existing.lines() {
            match line_key(line) {
                Some(key) if seen.contains(&key) => {}
                Some(key) => {
                    if let Some(pos) = pending.iter().position(|(k, _)| *k == key) {
                        let (k, v) = pending.remove(pos);
                        lines.push(format_line(k, v));
                        seen.push(key);
                    } else {
                        lines.push(line.to_string());
                    }
                }
                None => lines.push(line.to_string()),
            }
        }
        lines.extend(pending.into_iter().map(|(k, v)| format_line(k, v)));

        let mut content = lines.join("\n");
        content.push('\n');

        // Same directory as the target so the rename stays on one filesystem
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staged = NamedTempFile::new_in(dir).map_err(write_err)?;
        staged.write_all(content.as_bytes()).map_err(write_err)?;
        staged.as_file().sync_all().map_err(write_err)?;
        staged.persist(&self.path).map_err(|e| write_err(e.error))?;

        info!("Saved settings to {}", self.path.display());
        Ok(())
    }
}

/// Managed key on this line, if any.
fn line_key(line: &str) -> Option<&'static str> {
    let trimmed = line.trim_start();
    let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
    let (key, _) = trimmed.split_once('=')?;
    [ACCESS_TOKEN_KEY, BASE_ID_KEY, ZIP_CODE_KEY]
        .into_iter()
        .find(|k| *k == key.trim())
}

fn format_line(key: &str, value: &str) -> String {
    let plain = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | '/'));
    if plain {
        return format!("{key}={value}");
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        if matches!(c, '\\' | '"' | '$') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    format!("{key}=\"{quoted}\"")
}
