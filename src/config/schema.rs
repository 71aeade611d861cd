//! Configuration schema definitions

use serde::{Deserialize, Serialize};

/// Bundler home and output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleConfig {
    /// Directory client sources are resolved from
    #[serde(default = "default_home_dir")]
    pub home_dir: String,

    /// Output path template, `$name` is replaced by the bundle name
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable bundler debug output
    #[serde(default)]
    pub debug: bool,

    /// Enable bundler logging
    #[serde(default = "default_true")]
    pub log: bool,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            home_dir: default_home_dir(),
            output: default_output(),
            debug: false,
            log: true,
        }
    }
}

fn default_home_dir() -> String {
    "./client".to_string()
}

fn default_output() -> String {
    "./assets/js/$name.min.js".to_string()
}

fn default_true() -> bool {
    true
}

/// A module alias, either a fixed path or one that depends on the run mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AliasValue {
    /// Same module path in every mode
    Fixed(String),
    /// Debug build in development, another build otherwise
    ByMode {
        development: String,
        production: String,
    },
}

impl AliasValue {
    /// Evaluate the alias for the given mode
    pub fn resolve(&self, is_development: bool) -> &str {
        match self {
            Self::Fixed(path) => path,
            Self::ByMode { development, production } => {
                if is_development {
                    development
                } else {
                    production
                }
            }
        }
    }
}

/// A non-modular source exposed as a module through its global export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShimConfig {
    /// Path of the wrapped file, relative to the project root
    pub source: String,

    /// Name of the global the file defines
    pub exports: String,
}

/// Entry-point instructions for the two declared bundles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetsConfig {
    #[serde(default = "default_app_instructions")]
    pub app: String,

    #[serde(default = "default_configure_instructions")]
    pub configure: String,
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self {
            app: default_app_instructions(),
            configure: default_configure_instructions(),
        }
    }
}

fn default_app_instructions() -> String {
    "> index.js".to_string()
}

fn default_configure_instructions() -> String {
    "> configure.js".to_string()
}

/// Options handed to individual transform stages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformsConfig {
    /// Babel presets
    #[serde(default = "default_babel_presets")]
    pub babel_presets: Vec<String>,

    /// Keep comments in transpiled output
    #[serde(default)]
    pub babel_comments: bool,

    /// Maximum line length of minified output
    #[serde(default = "default_max_line_len")]
    pub uglify_max_line_len: u64,

    /// Let the minifier drop unused code
    #[serde(default)]
    pub uglify_compress_unused: bool,
}

impl Default for TransformsConfig {
    fn default() -> Self {
        Self {
            babel_presets: default_babel_presets(),
            babel_comments: false,
            uglify_max_line_len: default_max_line_len(),
            uglify_compress_unused: false,
        }
    }
}

fn default_babel_presets() -> Vec<String> {
    vec!["es2015".to_string()]
}

fn default_max_line_len() -> u64 {
    1_000_000
}

/// Global tasks that must complete before bundling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Shell commands, run in order
    #[serde(default = "default_task_commands")]
    pub commands: Vec<String>,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            commands: default_task_commands(),
        }
    }
}

fn default_task_commands() -> Vec<String> {
    vec!["node .build/_tasks.js".to_string()]
}

/// Build backend process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Program that executes bundle plans
    #[serde(default = "default_backend_program")]
    pub program: String,

    /// Arguments passed to the program
    #[serde(default = "default_backend_args")]
    pub args: Vec<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            program: default_backend_program(),
            args: default_backend_args(),
        }
    }
}

fn default_backend_program() -> String {
    "node".to_string()
}

fn default_backend_args() -> Vec<String> {
    vec![".build/fuse-backend.js".to_string()]
}

/// Live-reload transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port of the live-reload socket
    #[serde(default = "default_port")]
    pub port: u16,

    /// Also serve the output directory over HTTP
    #[serde(default)]
    pub http_server: bool,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            http_server: false,
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    4444
}

/// Server supervisor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Supervisor program
    #[serde(default = "default_supervisor_program")]
    pub program: String,

    /// Paths never watched, regardless of mode
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,

    /// File extensions that trigger a restart
    #[serde(default = "default_ext")]
    pub ext: Vec<String>,

    /// Command run in dev mode
    #[serde(default = "default_server_exec")]
    pub server_exec: String,

    /// Paths watched in dev mode
    #[serde(default = "default_server_watch")]
    pub server_watch: Vec<String>,

    /// Command run in dev-configure mode
    #[serde(default = "default_configure_exec")]
    pub configure_exec: String,

    /// Paths watched in dev-configure mode
    #[serde(default = "default_configure_watch")]
    pub configure_watch: Vec<String>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            program: default_supervisor_program(),
            ignore: default_ignore(),
            ext: default_ext(),
            server_exec: default_server_exec(),
            server_watch: default_server_watch(),
            configure_exec: default_configure_exec(),
            configure_watch: default_configure_watch(),
        }
    }
}

fn default_supervisor_program() -> String {
    "nodemon".to_string()
}

fn default_ignore() -> Vec<String> {
    ["assets/", "client/", "data/", "repo/", "tests/"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_ext() -> Vec<String> {
    vec!["js".to_string(), "json".to_string()]
}

fn default_server_exec() -> String {
    "node server".to_string()
}

fn default_server_watch() -> Vec<String> {
    vec!["server".to_string()]
}

fn default_configure_exec() -> String {
    "node wiki configure".to_string()
}

fn default_configure_watch() -> Vec<String> {
    vec!["server/configure.js".to_string()]
}
