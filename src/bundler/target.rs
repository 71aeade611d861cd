//! Bundle targets

use std::fmt;

use serde::{Deserialize, Serialize};

/// The bundles every plan declares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// Main client application
    App,
    /// Setup wizard client
    Configure,
}

impl TargetKind {
    /// Bundle name, substituted for `$name` in the output template
    pub fn name(self) -> &'static str {
        match self {
            Self::App => "app",
            Self::Configure => "configure",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named output artifact and how it is built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleTarget {
    pub kind: TargetKind,

    /// Bundle name
    pub name: String,

    /// Entry-point instructions, e.g. `> index.js`
    pub instructions: String,

    /// Rebuild continuously instead of once
    pub watch: bool,
}

impl BundleTarget {
    /// Create a one-shot target
    pub fn new(kind: TargetKind, instructions: impl Into<String>) -> Self {
        Self {
            kind,
            name: kind.name().to_string(),
            instructions: instructions.into(),
            watch: false,
        }
    }

    /// Resolve the output path for this target from a `$name` template
    pub fn output_path(&self, template: &str) -> String {
        template.replace("$name", &self.name)
    }
}
