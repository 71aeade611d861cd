//! Transform chain descriptors
//!
//! The bundler runs sources through an ordered list of plugins. Fuse only
//! describes that list: each [`Stage`] names a plugin and its options, and the
//! backend maps it onto the real implementation.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RunMode;

/// Where a stage sits in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StagePhase {
    /// Environment injection, must run first
    Environment,
    /// Syntax and format transforms
    Syntax,
    /// Minification, must run last
    Minify,
}

/// SCSS output style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SassOutputStyle {
    Nested,
    Compressed,
}

impl SassOutputStyle {
    /// Readable output while developing, compressed for production
    pub fn for_mode(mode: RunMode) -> Self {
        if mode.is_development() {
            Self::Nested
        } else {
            Self::Compressed
        }
    }
}

/// A single plugin in the transform chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "plugin", rename_all = "kebab-case")]
pub enum Stage {
    /// Inject environment variables into bundled code
    Env { vars: BTreeMap<String, String> },

    /// Compile single-file Vue components
    Vue,

    /// Run a sub-chain for files with the given extension
    Chain { extension: String, stages: Vec<Stage> },

    /// Compile SCSS
    Sass { output_style: SassOutputStyle },

    /// Bundle CSS
    Css,

    /// Transpile with Babel
    Babel { comments: bool, presets: Vec<String> },

    /// Import JSON files as modules
    Json,

    /// Minify output
    Uglify { compress_unused: bool, max_line_len: u64 },
}

impl Stage {
    /// Build an environment stage from key/value pairs
    pub fn env<'a>(vars: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self::Env {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Plugin name for logging and debugging
    pub fn name(&self) -> &'static str {
        match self {
            Self::Env { .. } => "env",
            Self::Vue => "vue",
            Self::Chain { .. } => "chain",
            Self::Sass { .. } => "sass",
            Self::Css => "css",
            Self::Babel { .. } => "babel",
            Self::Json => "json",
            Self::Uglify { .. } => "uglify",
        }
    }

    pub fn phase(&self) -> StagePhase {
        match self {
            Self::Env { .. } => StagePhase::Environment,
            Self::Uglify { .. } => StagePhase::Minify,
            _ => StagePhase::Syntax,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chain { extension, stages } => {
                let names: Vec<&str> = stages.iter().map(Stage::name).collect();
                write!(f, "[{} {}]", extension, names.join(" > "))
            }
            other => write!(f, "{}", other.name()),
        }
    }
}

/// Error for chains that break the environment / syntax / minify ordering
#[derive(Debug, Error)]
#[error("transform stage '{stage}' cannot run after '{previous}'")]
pub struct ChainOrderError {
    pub stage: &'static str,
    pub previous: &'static str,
}

/// Ordered, filtered list of transform stages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransformChain {
    stages: Vec<Stage>,
}

impl TransformChain {
    /// Build a chain from optional entries.
    ///
    /// Absent entries are dropped. The remaining stages must keep their
    /// phases in non-decreasing order.
    pub fn new(entries: impl IntoIterator<Item = Option<Stage>>) -> Result<Self, ChainOrderError> {
        let stages: Vec<Stage> = entries.into_iter().flatten().collect();

        for pair in stages.windows(2) {
            if pair[1].phase() < pair[0].phase() {
                return Err(ChainOrderError {
                    stage: pair[1].name(),
                    previous: pair[0].name(),
                });
            }
        }

        Ok(Self { stages })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Whether a stage with the given plugin name is present at the top level
    pub fn contains(&self, name: &str) -> bool {
        self.stages.iter().any(|s| s.name() == name)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_absent_entries_are_filtered() {
        let chain = TransformChain::new([
            Some(Stage::env([("NODE_ENV", "development")])),
            None,
            Some(Stage::Json),
            None,
        ])
        .unwrap();

        assert_eq!(chain.len(), 2);
        assert_eq!(chain.stages()[1], Stage::Json);
        assert!(!chain.contains("uglify"));
    }

    #[test]
    fn test_minify_before_syntax_is_rejected() {
        let err = TransformChain::new([
            Some(Stage::Uglify {
                compress_unused: false,
                max_line_len: 80,
            }),
            Some(Stage::Vue),
        ])
        .unwrap_err();

        assert_eq!(err.stage, "vue");
        assert_eq!(err.previous, "uglify");
    }

    #[test]
    fn test_env_after_syntax_is_rejected() {
        let result = TransformChain::new([Some(Stage::Json), Some(Stage::env([("A", "b")]))]);
        assert!(result.is_err());
    }

    #[test]
    fn test_serializes_as_tagged_list() {
        let chain = TransformChain::new([
            Some(Stage::Chain {
                extension: ".scss".to_string(),
                stages: vec![
                    Stage::Sass {
                        output_style: SassOutputStyle::Compressed,
                    },
                    Stage::Css,
                ],
            }),
        ])
        .unwrap();

        let json = serde_json::to_value(&chain).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{
                "plugin": "chain",
                "extension": ".scss",
                "stages": [
                    { "plugin": "sass", "output_style": "compressed" },
                    { "plugin": "css" }
                ]
            }])
        );
    }

    #[test]
    fn test_display() {
        let stage = Stage::Chain {
            extension: ".scss".to_string(),
            stages: vec![
                Stage::Sass {
                    output_style: SassOutputStyle::Nested,
                },
                Stage::Css,
            ],
        };
        assert_eq!(stage.to_string(), "[.scss sass > css]");
    }
}
