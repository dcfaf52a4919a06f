//! `stackpack.toml` command defaults.
//!
//! ```toml
//! version = 0.1
//!
//! [default.global.parameters]
//! stack_name = "app"
//!
//! [default.package.parameters]
//! s3_bucket = "artifacts"
//!
//! [prod.package.parameters]
//! s3_bucket = "artifacts-prod"
//! ```
//!
//! Values under `global` apply to every command; command tables win over
//! `global`, and flags given on the command line win over both.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "stackpack.toml";
pub const DEFAULT_CONFIG_ENV: &str = "default";
const GLOBAL_SECTION: &str = "global";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StackpackConfig {
    #[serde(default)]
    pub version: Option<toml::Value>,
    #[serde(flatten)]
    pub environments: IndexMap<String, EnvironmentConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvironmentConfig {
    #[serde(flatten)]
    pub commands: IndexMap<String, CommandConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandConfig {
    #[serde(default)]
    pub parameters: IndexMap<String, toml::Value>,
}

impl StackpackConfig {
    /// Load the file at `path`; a missing file is an empty config.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            debug!("No config file at {}", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Parameters for `command` in `env`, with `global` values underneath.
    pub fn parameters(&self, env: &str, command: &str) -> IndexMap<String, String> {
        let Some(environment) = self.environments.get(env) else {
            return IndexMap::new();
        };

        let mut merged = IndexMap::new();
        for section in [GLOBAL_SECTION, command] {
            if let Some(config) = environment.commands.get(section) {
                for (name, value) in &config.parameters {
                    merged.insert(name.replace('-', "_"), as_parameter(value));
                }
            }
        }
        merged
    }
}

fn as_parameter(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Array(items) => items.iter().map(as_parameter).collect::<Vec<_>>().join(" "),
        other => other.to_string(),
    }
}
