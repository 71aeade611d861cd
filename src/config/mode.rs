//! Run mode resolution

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::bundler::TargetKind;

/// The mode a single invocation runs in.
///
/// Resolved once from the command line and never changed afterwards. Every
/// decision that depends on "are we developing?" goes through this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// One-shot production build
    Build,
    /// Watch the application bundle and supervise the server
    Dev,
    /// Watch the configuration bundle and supervise the configure wizard
    DevConfigure,
}

impl RunMode {
    /// Resolve the mode from the two development flags.
    ///
    /// `--dev` takes precedence over `--dev-configure` when both are given.
    pub fn resolve(dev: bool, dev_configure: bool) -> Self {
        if dev && dev_configure {
            warn!("Both --dev and --dev-configure given, using --dev");
        }

        if dev {
            Self::Dev
        } else if dev_configure {
            Self::DevConfigure
        } else {
            Self::Build
        }
    }

    /// Whether bundles are built for development
    pub fn is_development(self) -> bool {
        matches!(self, Self::Dev | Self::DevConfigure)
    }

    /// The bundle target kept under continuous rebuild, if any
    pub fn watch_target(self) -> Option<TargetKind> {
        match self {
            Self::Build => None,
            Self::Dev => Some(TargetKind::App),
            Self::DevConfigure => Some(TargetKind::Configure),
        }
    }

    /// Value injected as `NODE_ENV` into the produced bundles
    pub fn node_env(self) -> &'static str {
        if self.is_development() {
            "development"
        } else {
            "production"
        }
    }

    /// Human readable label used in the startup banner
    pub fn label(self) -> &'static str {
        match self {
            Self::Build => "BUILD",
            Self::Dev => "DEVELOPER",
            Self::DevConfigure => "CONFIGURE DEVELOPER",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Build => write!(f, "build"),
            Self::Dev => write!(f, "dev"),
            Self::DevConfigure => write!(f, "dev-configure"),
        }
    }
}
