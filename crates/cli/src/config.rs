use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use dropwatch_import::Endpoint;
use dropwatch_watch::{EventFilter, PathFilter};

/// Traversal behavior of one watch root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TraversalMode {
    /// Only the root directory itself.
    Flat,
    /// The root and every subdirectory existing at startup.
    #[default]
    Recursive,
    /// Recursive, plus watches for subdirectories created later.
    RecursiveAutoAdd,
}

impl TraversalMode {
    /// `(recursive, auto_add)` watch parameters.
    pub fn flags(self) -> (bool, bool) {
        match self {
            TraversalMode::Flat => (false, false),
            TraversalMode::Recursive => (true, false),
            TraversalMode::RecursiveAutoAdd => (true, true),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchRoot {
    pub path: PathBuf,
    #[serde(default)]
    pub mode: TraversalMode,
    #[serde(default)]
    pub events: EventFilter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSection {
    pub host: String,
    pub port: u16,
    /// Import command to run for each fired fileset.
    pub command: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_session_ttl")]
    pub session_ttl_seconds: u64,
    /// Owner name → pre-shared credential.
    #[serde(default)]
    pub credentials: HashMap<String, String>,
}

fn default_session_ttl() -> u64 {
    600
}

/// Membership policy for the built-in sidecar resolver.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSection {
    /// Extensions of files that represent a unit. Empty: any file is its
    /// own representative.
    pub data_extensions: Vec<String>,
    /// Extensions of companion files grouped with the representative.
    pub companion_extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Quiet period per fileset before its import fires.
    #[serde(default = "default_debounce")]
    pub debounce_seconds: f64,
    pub roots: Vec<WatchRoot>,
    #[serde(default)]
    pub filter: PathFilter,
    #[serde(default)]
    pub resolver: ResolverSection,
    pub import: ImportSection,
}

fn default_debounce() -> f64 {
    5.0
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config =
            toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.roots.is_empty() {
            bail!("no watch roots configured");
        }
        if self.debounce_seconds <= 0.0 {
            bail!("debounce_seconds must be positive");
        }
        if self.import.host.is_empty() {
            bail!("import.host must not be empty");
        }
        if self.import.port == 0 {
            bail!("import.port must not be zero");
        }
        if self.import.command.as_os_str().is_empty() {
            bail!("import.command must not be empty");
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_secs_f64(self.debounce_seconds)
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            host: self.import.host.clone(),
            port: self.import.port,
        }
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.import.session_ttl_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FULL: &str = r#"
debounce_seconds = 2.5

[[roots]]
path = "/data/drop"
mode = "recursive-auto-add"

[[roots]]
path = "/data/staging"
mode = "flat"
events = { create = true, modify = true, delete = false }

[filter]
skip_housekeeping = true
include_extensions = ["tif", "xml"]

[resolver]
data_extensions = ["tif"]
companion_extensions = ["xml"]

[import]
host = "imaging.example.org"
port = 4064
command = "/usr/local/bin/unit-import"
args = ["--quiet"]
session_ttl_seconds = 300

[import.credentials]
alice = "k1"
bob = "k2"
"#;

    #[test]
    fn full_config_parses() {
        let config: Config = toml::from_str(FULL).unwrap();
        config.validate().unwrap();

        assert_eq!(config.debounce(), Duration::from_millis(2500));
        assert_eq!(config.roots.len(), 2);
        assert_eq!(config.roots[0].mode, TraversalMode::RecursiveAutoAdd);
        assert_eq!(config.roots[0].mode.flags(), (true, true));
        assert_eq!(config.roots[1].mode.flags(), (false, false));
        assert!(!config.roots[1].events.delete);
        assert!(config.filter.skip_housekeeping);
        assert_eq!(config.resolver.data_extensions, vec!["tif"]);
        assert_eq!(config.endpoint().host, "imaging.example.org");
        assert_eq!(config.session_ttl(), Duration::from_secs(300));
        assert_eq!(config.import.credentials["alice"], "k1");
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config: Config = toml::from_str(
            r#"
[[roots]]
path = "/data/drop"

[import]
host = "localhost"
port = 4064
command = "importer"
"#,
        )
        .unwrap();
        config.validate().unwrap();

        assert_eq!(config.debounce_seconds, 5.0);
        assert_eq!(config.roots[0].mode, TraversalMode::Recursive);
        assert!(config.roots[0].events.create);
        assert!(!config.filter.skip_housekeeping);
        assert_eq!(config.import.session_ttl_seconds, 600);
    }

    #[test]
    fn validation_rejects_broken_configs() {
        let no_roots: Config = toml::from_str(
            r#"
roots = []

[import]
host = "localhost"
port = 4064
command = "importer"
"#,
        )
        .unwrap();
        assert!(no_roots.validate().is_err());

        let zero_port: Config = toml::from_str(
            r#"
[[roots]]
path = "/data/drop"

[import]
host = "localhost"
port = 0
command = "importer"
"#,
        )
        .unwrap();
        assert!(zero_port.validate().is_err());

        let bad_window: Config = toml::from_str(
            r#"
debounce_seconds = 0.0

[[roots]]
path = "/data/drop"

[import]
host = "localhost"
port = 4064
command = "importer"
"#,
        )
        .unwrap();
        assert!(bad_window.validate().is_err());
    }
}
