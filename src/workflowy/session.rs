use std::{collections::HashMap, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const SESSION_CONFIG_PATH: &str = ".wfconfig.json";

/// Contents of `.wfconfig.json`, written by a browser login.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(rename = "sessionid", default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

impl SessionConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<SessionConfig> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Like `load`, but a missing file is an empty config.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<SessionConfig> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No session config found");
            return Ok(SessionConfig::default());
        }
        SessionConfig::load(path)
    }

    /// Resolves `name` through `aliases`, falling back to `name` itself.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }
}
