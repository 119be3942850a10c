// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{AibarError, Result};

use super::Settings;

/// Environment variable that relocates the aibar home directory
const HOME_ENV: &str = "AIBAR_HOME";

impl Settings {
    /// `settings.json` under the aibar home.
    pub fn default_path() -> PathBuf {
        Self::aibar_home().join("settings.json")
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Read and validate a settings file. A missing file yields defaults;
    /// fields absent from the file keep their defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let Some(value) = read_json(path)? else {
            return Ok(Self::default());
        };
        let settings: Settings = serde_json::from_value(value)?;
        settings.validate()?;
        tracing::debug!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Write the settings next to whatever else the file holds. Keys aibar
    /// does not know about are kept; an unparseable file is replaced.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let ours = serde_json::to_value(self)?;
        let merged = match read_json(path) {
            Ok(Some(existing)) => overlay(existing, ours),
            Ok(None) => ours,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Replacing unreadable settings file");
                ours
            }
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(&merged)?)?;
        std::fs::rename(&tmp, path).map_err(|e| {
            AibarError::Config(format!("Failed to write {}: {}", path.display(), e))
        })
    }

    /// `$AIBAR_HOME`, else `~/.aibar`.
    pub fn aibar_home() -> PathBuf {
        match std::env::var_os(HOME_ENV) {
            Some(home) => PathBuf::from(home),
            None => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".aibar"),
        }
    }

    /// Where the session state blob lives.
    pub fn state_path(&self) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(|| Self::aibar_home().join("state.json"))
    }

    /// Create the home directory and the state file's parent.
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(Self::aibar_home())?;
        if let Some(parent) = self.state_path().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

fn read_json(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

/// Lay `top` over `base` object by object; `top` wins on every leaf.
fn overlay(base: Value, top: Value) -> Value {
    match (base, top) {
        (Value::Object(mut base), Value::Object(top)) => {
            for (key, value) in top {
                let merged = match base.remove(&key) {
                    Some(existing) => overlay(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            Value::Object(base)
        }
        (_, top) => top,
    }
}
