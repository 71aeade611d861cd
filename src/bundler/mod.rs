//! Bundle plan construction
//!
//! Turns the project configuration and run mode into the declarative plan the
//! build backend executes: resolved aliases, shims, the transform chain and
//! the output targets.

mod backend;
mod target;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::{Config, RunMode, ShimConfig};
use crate::plugins::{ChainOrderError, SassOutputStyle, Stage, TransformChain};

pub use backend::{BackendError, BackendEvent, BuildBackend, BuildReport, BundleInfo, ProcessBackend};
pub use target::{BundleTarget, TargetKind};

/// Errors raised while building a plan
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    ChainOrder(#[from] ChainOrderError),

    #[error("bundle '{requested}' cannot watch, '{watching}' is already watched")]
    AlreadyWatching {
        requested: TargetKind,
        watching: TargetKind,
    },

    #[error("no bundle target named '{0}'")]
    UnknownTarget(TargetKind),
}

/// Live-reload transport options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevOptions {
    pub host: String,
    pub port: u16,
    pub http_server: bool,
}

/// The complete description of one bundler run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundlePlan {
    pub mode: RunMode,
    pub home_dir: String,
    pub output: String,
    pub aliases: BTreeMap<String, String>,
    pub shims: BTreeMap<String, ShimConfig>,
    pub plugins: TransformChain,
    pub targets: Vec<BundleTarget>,
    pub debug: bool,
    pub log: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev: Option<DevOptions>,
}

impl BundlePlan {
    /// Build the plan for a run mode. No target watches yet.
    pub fn build(config: &Config, mode: RunMode) -> Result<Self, PlanError> {
        let dev = mode.is_development();

        let aliases = config
            .aliases
            .iter()
            .map(|(name, value)| (name.clone(), value.resolve(dev).to_string()))
            .collect();

        let transforms = &config.transforms;
        let plugins = TransformChain::new([
            Some(Stage::env([("NODE_ENV", mode.node_env())])),
            Some(Stage::Vue),
            Some(Stage::Chain {
                extension: ".scss".to_string(),
                stages: vec![
                    Stage::Sass {
                        output_style: SassOutputStyle::for_mode(mode),
                    },
                    Stage::Css,
                ],
            }),
            Some(Stage::Babel {
                comments: transforms.babel_comments,
                presets: transforms.babel_presets.clone(),
            }),
            Some(Stage::Json),
            (!dev).then(|| Stage::Uglify {
                compress_unused: transforms.uglify_compress_unused,
                max_line_len: transforms.uglify_max_line_len,
            }),
        ])?;

        let targets = vec![
            BundleTarget::new(TargetKind::App, &config.targets.app),
            BundleTarget::new(TargetKind::Configure, &config.targets.configure),
        ];

        let dev_options = dev.then(|| DevOptions {
            host: config.dev.host.clone(),
            port: config.dev.port,
            http_server: config.dev.http_server,
        });

        debug!(
            "Plan for {} mode: {} aliases, {} shims, {} plugins",
            mode,
            config.aliases.len(),
            config.shims.len(),
            plugins.len()
        );

        Ok(Self {
            mode,
            home_dir: config.bundle.home_dir.clone(),
            output: config.bundle.output.clone(),
            aliases,
            shims: config.shims.clone(),
            plugins,
            targets,
            debug: config.bundle.debug,
            log: config.bundle.log,
            dev: dev_options,
        })
    }

    /// Mark a target for continuous rebuilding.
    ///
    /// Only one target per plan may watch.
    pub fn watch(&mut self, kind: TargetKind) -> Result<(), PlanError> {
        if let Some(watching) = self.watched() {
            if watching != kind {
                return Err(PlanError::AlreadyWatching {
                    requested: kind,
                    watching,
                });
            }
        }

        let target = self
            .targets
            .iter_mut()
            .find(|t| t.kind == kind)
            .ok_or(PlanError::UnknownTarget(kind))?;
        target.watch = true;
        Ok(())
    }

    /// The watched target, if any
    pub fn watched(&self) -> Option<TargetKind> {
        self.targets.iter().find(|t| t.watch).map(|t| t.kind)
    }

    pub fn target(&self, kind: TargetKind) -> Option<&BundleTarget> {
        self.targets.iter().find(|t| t.kind == kind)
    }

    /// Where the bundle called `name` is written
    pub fn output_of(&self, name: &str) -> Option<String> {
        self.targets
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.output_path(&self.output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn env_value(plan: &BundlePlan) -> String {
        match &plan.plugins.stages()[0] {
            Stage::Env { vars } => vars["NODE_ENV"].clone(),
            other => panic!("expected env stage first, got {}", other),
        }
    }

    #[test]
    fn test_build_mode_plan() {
        let plan = BundlePlan::build(&Config::default(), RunMode::Build).unwrap();

        assert_eq!(env_value(&plan), "production");
        assert!(plan.plugins.contains("uglify"));
        assert_eq!(plan.plugins.stages().last().map(Stage::name), Some("uglify"));
        assert!(plan.dev.is_none());
        assert_eq!(plan.aliases["vue"], "vue/dist/vue.min.js");
        assert_eq!(plan.watched(), None);
    }

    #[test]
    fn test_development_plan() {
        for mode in [RunMode::Dev, RunMode::DevConfigure] {
            let plan = BundlePlan::build(&Config::default(), mode).unwrap();

            assert_eq!(env_value(&plan), "development");
            assert!(!plan.plugins.contains("uglify"));
            assert_eq!(plan.aliases["vue"], "vue/dist/vue.js");
            assert_eq!(
                plan.dev,
                Some(DevOptions {
                    host: "localhost".to_string(),
                    port: 4444,
                    http_server: false,
                })
            );
        }
    }

    #[test]
    fn test_fixed_aliases_do_not_depend_on_mode() {
        let build = BundlePlan::build(&Config::default(), RunMode::Build).unwrap();
        let dev = BundlePlan::build(&Config::default(), RunMode::Dev).unwrap();
        assert_eq!(build.aliases["simplemde"], dev.aliases["simplemde"]);
        assert_eq!(build.aliases.len(), 5);
    }

    #[test]
    fn test_sass_style_follows_mode() {
        let plan = BundlePlan::build(&Config::default(), RunMode::Dev).unwrap();
        let chain = plan
            .plugins
            .stages()
            .iter()
            .find_map(|s| match s {
                Stage::Chain { stages, .. } => Some(stages.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            chain[0],
            Stage::Sass {
                output_style: SassOutputStyle::Nested
            }
        );
    }

    #[test]
    fn test_two_targets_declared() {
        let plan = BundlePlan::build(&Config::default(), RunMode::Build).unwrap();
        let names: Vec<&str> = plan.targets.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["app", "configure"]);
        assert_eq!(plan.target(TargetKind::Configure).unwrap().instructions, "> configure.js");
        assert_eq!(
            plan.target(TargetKind::App).unwrap().output_path(&plan.output),
            "./assets/js/app.min.js"
        );
        assert_eq!(plan.output_of("configure").as_deref(), Some("./assets/js/configure.min.js"));
        assert_eq!(plan.output_of("vendor"), None);
    }

    #[test]
    fn test_exactly_one_target_watches() {
        for mode in [RunMode::Build, RunMode::Dev, RunMode::DevConfigure] {
            let mut plan = BundlePlan::build(&Config::default(), mode).unwrap();
            if let Some(kind) = mode.watch_target() {
                plan.watch(kind).unwrap();
            }

            let watching = plan.targets.iter().filter(|t| t.watch).count();
            let expected = if mode.is_development() { 1 } else { 0 };
            assert_eq!(watching, expected, "mode {}", mode);
            assert_eq!(plan.watched(), mode.watch_target());
        }
    }

    #[test]
    fn test_second_watch_is_rejected() {
        let mut plan = BundlePlan::build(&Config::default(), RunMode::Dev).unwrap();
        plan.watch(TargetKind::App).unwrap();
        plan.watch(TargetKind::App).unwrap();

        let err = plan.watch(TargetKind::Configure).unwrap_err();
        assert!(matches!(err, PlanError::AlreadyWatching { .. }));
        assert_eq!(plan.watched(), Some(TargetKind::App));
    }

    #[test]
    fn test_plan_serializes_for_backend() {
        let mut plan = BundlePlan::build(&Config::default(), RunMode::DevConfigure).unwrap();
        plan.watch(TargetKind::Configure).unwrap();

        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["mode"], "dev-configure");
        assert_eq!(json["targets"][1]["watch"], true);
        assert_eq!(json["shims"]["mathjax"]["exports"], "MathJax");
        assert_eq!(json["dev"]["port"], 4444);
    }
}
