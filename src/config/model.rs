// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::types::TemplatePolicy;

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [engine]
/// state_dir = ".sitegraph"
/// debounce_ms = 250
/// max_depth = 16
/// template_policy = "cascade"
///
/// [layout]
/// content = ["content/**"]
/// shared = ["content/_shared/**"]
/// versions_dir = "content/versions"
/// templates = ["templates/**"]
/// structural = ["site.toml", "directives/**"]
/// assets = ["assets/**"]
///
/// [executor]
/// cmd = "render-site --plan-stdin"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub layout: LayoutSection,

    #[serde(default)]
    pub executor: ExecutorSection,
}

/// Validated configuration. Only obtainable through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    engine: EngineSection,
    layout: LayoutSection,
    executor: ExecutorSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        engine: EngineSection,
        layout: LayoutSection,
        executor: ExecutorSection,
    ) -> Self {
        Self {
            engine,
            layout,
            executor,
        }
    }

    pub fn engine(&self) -> &EngineSection {
        &self.engine
    }

    pub fn layout(&self) -> &LayoutSection {
        &self.layout
    }

    pub fn executor(&self) -> &ExecutorSection {
        &self.executor
    }
}

/// `[engine]` section: planner and coordinator behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// Directory (relative to the site root) holding the named snapshots.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Length of the collecting window that coalesces filesystem events.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Depth bound for transitive cascades. Exceeding it forces a full
    /// rebuild.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// `"cascade"` (default) or `"full"`.
    #[serde(default)]
    pub template_policy: TemplatePolicy,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".sitegraph")
}

fn default_debounce_ms() -> u64 {
    250
}

fn default_max_depth() -> usize {
    16
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            debounce_ms: default_debounce_ms(),
            max_depth: default_max_depth(),
            template_policy: TemplatePolicy::default(),
        }
    }
}

/// `[layout]` section: how root-relative paths map onto build entities.
///
/// All patterns are globs evaluated against `/`-separated paths relative to
/// the site root.
#[derive(Debug, Clone, Deserialize)]
pub struct LayoutSection {
    #[serde(default = "default_content")]
    pub content: Vec<String>,

    /// Content visible to every version.
    #[serde(default = "default_shared")]
    pub shared: Vec<String>,

    /// `<versions_dir>/<version>/...` is scoped to `<version>`.
    #[serde(default = "default_versions_dir")]
    pub versions_dir: String,

    #[serde(default = "default_templates")]
    pub templates: Vec<String>,

    /// Changes here can't be attributed to single pages (site config,
    /// directive registry) and always force a full rebuild.
    #[serde(default = "default_structural")]
    pub structural: Vec<String>,

    #[serde(default = "default_assets")]
    pub assets: Vec<String>,

    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
}

fn default_content() -> Vec<String> {
    vec!["content/**".to_string()]
}

fn default_shared() -> Vec<String> {
    vec!["content/_shared/**".to_string()]
}

fn default_versions_dir() -> String {
    "content/versions".to_string()
}

fn default_templates() -> Vec<String> {
    vec!["templates/**".to_string()]
}

fn default_structural() -> Vec<String> {
    vec!["site.toml".to_string(), "directives/**".to_string()]
}

fn default_assets() -> Vec<String> {
    vec!["assets/**".to_string()]
}

fn default_exclude() -> Vec<String> {
    vec![
        ".git/**".to_string(),
        "public/**".to_string(),
        ".sitegraph/**".to_string(),
    ]
}

impl Default for LayoutSection {
    fn default() -> Self {
        Self {
            content: default_content(),
            shared: default_shared(),
            versions_dir: default_versions_dir(),
            templates: default_templates(),
            structural: default_structural(),
            assets: default_assets(),
            exclude: default_exclude(),
        }
    }
}

/// `[executor]` section: the external render/asset collaborator.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ExecutorSection {
    /// Shell command receiving the plan as JSON on stdin and emitting one
    /// JSON unit report per line on stdout. Without it, plans are only
    /// logged.
    #[serde(default)]
    pub cmd: Option<String>,
}
