//! Configuration handling for Fuse
//!
//! Resolves the run mode from the command line and loads the optional
//! fuse.toml project file. Without a file, the built-in defaults describe
//! the wiki client: its aliases, shims, bundles and server supervisor.

mod mode;
mod schema;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

pub use mode::RunMode;
pub use schema::*;

/// Config file looked up in the working directory when none is given
pub const CONFIG_FILE: &str = "fuse.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bundler home and output
    #[serde(default)]
    pub bundle: BundleConfig,

    /// Module aliases
    #[serde(default = "default_aliases")]
    pub aliases: BTreeMap<String, AliasValue>,

    /// Shimmed globals
    #[serde(default = "default_shims")]
    pub shims: BTreeMap<String, ShimConfig>,

    /// Bundle entry instructions
    #[serde(default)]
    pub targets: TargetsConfig,

    /// Transform stage options
    #[serde(default)]
    pub transforms: TransformsConfig,

    /// Global prerequisite tasks
    #[serde(default)]
    pub tasks: TasksConfig,

    /// Build backend process
    #[serde(default)]
    pub backend: BackendConfig,

    /// Live-reload transport
    #[serde(default)]
    pub dev: DevConfig,

    /// Server supervisor
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// Root directory (computed from config file location)
    #[serde(skip)]
    pub root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bundle: BundleConfig::default(),
            aliases: default_aliases(),
            shims: default_shims(),
            targets: TargetsConfig::default(),
            transforms: TransformsConfig::default(),
            tasks: TasksConfig::default(),
            backend: BackendConfig::default(),
            dev: DevConfig::default(),
            supervisor: SupervisorConfig::default(),
            root: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Load configuration from a file path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let canonical_path = absolute(path.as_ref())?;

        let content = fs::read_to_string(&canonical_path)
            .with_context(|| format!("Failed to read config file: {}", canonical_path.display()))?;

        let mut config = Self::parse(&content)?;

        // Set root directory to the directory containing the config file
        config.root = canonical_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        config.validate()?;

        Ok(config)
    }

    /// Load the config file if it exists, otherwise use the defaults rooted
    /// at the current directory.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = absolute(path.as_ref())?;

        if path.exists() {
            info!("Loading configuration from {}", path.display());
            return Self::load(&path);
        }

        info!("No {} found, using built-in defaults", path.display());
        let mut config = Self::default();
        config.root = std::env::current_dir()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse fuse.toml")
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.bundle.home_dir.trim().is_empty() {
            anyhow::bail!("bundle.home_dir must not be empty");
        }

        if !self.bundle.output.contains("$name") {
            anyhow::bail!(
                "bundle.output must contain the $name placeholder, got '{}'",
                self.bundle.output
            );
        }

        if self.backend.program.trim().is_empty() {
            anyhow::bail!("backend.program must not be empty");
        }

        if self.supervisor.ext.is_empty() {
            anyhow::bail!("supervisor.ext must list at least one extension");
        }

        Ok(())
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn default_aliases() -> BTreeMap<String, AliasValue> {
    let fixed = |path: &str| AliasValue::Fixed(path.to_string());

    let mut aliases = BTreeMap::new();
    aliases.insert("brace-ext-modelist".to_string(), fixed("brace/ext/modelist.js"));
    aliases.insert("simplemde".to_string(), fixed("simplemde/dist/simplemde.min.js"));
    aliases.insert("socket-io-client".to_string(), fixed("socket.io-client/dist/socket.io.js"));
    aliases.insert(
        "vue".to_string(),
        AliasValue::ByMode {
            development: "vue/dist/vue.js".to_string(),
            production: "vue/dist/vue.min.js".to_string(),
        },
    );
    aliases.insert("vue-lodash".to_string(), fixed("vue-lodash/dist/vue-lodash.min.js"));
    aliases
}

fn default_shims() -> BTreeMap<String, ShimConfig> {
    let shim = |source: &str, exports: &str| ShimConfig {
        source: source.to_string(),
        exports: exports.to_string(),
    };

    let mut shims = BTreeMap::new();
    shims.insert("_preinit".to_string(), shim(".build/_preinit.js", "_preinit"));
    shims.insert("jquery".to_string(), shim("node_modules/jquery/dist/jquery.js", "$"));
    shims.insert("mathjax".to_string(), shim("node_modules/mathjax/MathJax.js", "MathJax"));
    shims
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.dev.port, 4444);
        assert!(!config.dev.http_server);
        assert_eq!(config.shims["jquery"].exports, "$");
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.aliases, default_aliases());
        assert_eq!(config.targets.app, "> index.js");
        assert_eq!(config.tasks.commands, vec!["node .build/_tasks.js".to_string()]);
    }

    #[test]
    fn test_overrides_merge_over_defaults() {
        let config = Config::parse(
            r#"
[bundle]
home_dir = "./web"

[aliases]
react = { development = "react/dev.js", production = "react/prod.js" }
lodash = "lodash/lodash.min.js"

[dev]
port = 5555

[tasks]
commands = []
"#,
        )
        .unwrap();

        assert_eq!(config.bundle.home_dir, "./web");
        assert_eq!(config.bundle.output, "./assets/js/$name.min.js");
        assert_eq!(config.aliases.len(), 2);
        assert_eq!(config.aliases["react"].resolve(true), "react/dev.js");
        assert_eq!(config.aliases["lodash"].resolve(true), "lodash/lodash.min.js");
        assert_eq!(config.dev.port, 5555);
        assert!(config.tasks.commands.is_empty());
        assert_eq!(config.supervisor.server_exec, "node server");
    }

    #[test]
    fn test_output_requires_name_placeholder() {
        let mut config = Config::default();
        config.bundle.output = "./assets/js/bundle.js".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("$name"));
    }

    #[test]
    fn test_load_sets_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fuse.toml");
        fs::write(&path, "[bundle]\nlog = false\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.root, dir.path());
        assert!(!config.bundle.log);
    }

    #[test]
    fn test_load_of_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("typo.toml")).unwrap_err();
        assert!(err.to_string().contains("typo.toml"));
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.supervisor.program, "nodemon");
    }
}
