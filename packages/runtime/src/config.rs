use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_NAME: &str = "tendril.config.json";

/// Runtime configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Attribute prefix that marks a directive
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// `tracing` filter used when `TENDRIL_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Warn about plugin directives and magics used without their plugin
    #[serde(default = "default_true")]
    pub warn_missing_plugins: bool,

    /// Directive names reserved by optional plugins
    #[serde(default = "default_plugin_directives")]
    pub plugin_directives: Vec<String>,

    /// Magic names (without `$`) reserved by optional plugins
    #[serde(default = "default_plugin_magics")]
    pub plugin_magics: Vec<String>,

    /// Start with the path-only evaluator
    #[serde(default)]
    pub strict_evaluator: bool,
}

fn default_prefix() -> String {
    "x-".to_string()
}

fn default_log_filter() -> String {
    "warn".to_string()
}

fn default_true() -> bool {
    true
}

fn default_plugin_directives() -> Vec<String> {
    ["intersect", "trap", "collapse", "mask", "anchor", "sort", "resize"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_plugin_magics() -> Vec<String> {
    ["persist", "focus", "anchor"].into_iter().map(String::from).collect()
}

impl Config {
    /// Load config from a directory, falling back to defaults when no file exists
    pub fn load(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config_path = dir.as_ref().join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_json(&content)
        } else {
            Ok(Config::default())
        }
    }

    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        let config: Config = serde_json::from_str(content)?;
        if config.prefix.is_empty() {
            anyhow::bail!("`prefix` must not be empty");
        }
        Ok(config)
    }

    /// Full attribute name for a directive, e.g. `x-show`
    pub fn attribute(&self, directive: &str) -> String {
        format!("{}{}", self.prefix, directive)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            log_filter: default_log_filter(),
            warn_missing_plugins: true,
            plugin_directives: default_plugin_directives(),
            plugin_magics: default_plugin_magics(),
            strict_evaluator: false,
        }
    }
}
