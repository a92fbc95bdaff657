//! `switchboard.toml` loading.
//!
//! ```toml
//! prefix = "!"
//! pipe_delimiter = "|"
//!
//! [shortcuts]
//! greet = "say hello"
//!
//! [access."todo clear"]
//! whitelist = ["1234"]
//! required_capabilities = ["manage_messages"]
//!
//! [env]
//! locale = "en"
//! ```

use crate::core::access::AccessRule;
use crate::core::error::SwitchboardError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const CONFIG_FILE: &str = "switchboard.toml";

fn default_prefix() -> String {
    "!".to_string()
}

fn default_delimiter() -> char {
    '|'
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_delimiter")]
    pub pipe_delimiter: char,
    #[serde(default)]
    pub shortcuts: BTreeMap<String, String>,
    /// Access overrides keyed by space-separated command path.
    #[serde(default)]
    pub access: BTreeMap<String, AccessRule>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            pipe_delimiter: default_delimiter(),
            shortcuts: BTreeMap::new(),
            access: BTreeMap::new(),
            env: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self, SwitchboardError> {
        let config: Config =
            toml::from_str(content).map_err(|e| SwitchboardError::ConfigError(e.to_string()))?;
        if config.pipe_delimiter.is_whitespace() || matches!(config.pipe_delimiter, '"' | '\'' | '\\')
        {
            return Err(SwitchboardError::ConfigError(format!(
                "pipe_delimiter {:?} clashes with whitespace or quoting",
                config.pipe_delimiter
            )));
        }
        Ok(config)
    }
}

/// Load `<dir>/switchboard.toml`. No file means defaults, not an error.
pub fn load_config(dir: &Path) -> Result<Config, SwitchboardError> {
    let path = dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = fs::read_to_string(&path).map_err(SwitchboardError::IoError)?;
    Config::from_toml_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_empty() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.prefix, "!");
        assert_eq!(config.pipe_delimiter, '|');
    }

    #[test]
    fn parses_sections() {
        let config = Config::from_toml_str(
            r#"
prefix = "?"
pipe_delimiter = ">"

[shortcuts]
greet = "say hello"

[access."todo add"]
whitelist = ["alice"]

[env]
locale = "fr"
"#,
        )
        .unwrap();
        assert_eq!(config.prefix, "?");
        assert_eq!(config.pipe_delimiter, '>');
        assert_eq!(config.shortcuts["greet"], "say hello");
        assert_eq!(config.access["todo add"].whitelist, vec!["alice"]);
        assert!(config.access["todo add"].blacklist.is_empty());
        assert_eq!(config.env["locale"], "fr");
    }

    #[test]
    fn rejects_quote_delimiter() {
        assert!(matches!(
            Config::from_toml_str("pipe_delimiter = '\"'"),
            Err(SwitchboardError::ConfigError(_))
        ));
        assert!(Config::from_toml_str("prefix = [").is_err());
    }
}
