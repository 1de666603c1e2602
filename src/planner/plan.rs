// src/planner/plan.rs

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::graph::DepthExceeded;
use crate::types::VersionScope;

/// Why the planner gave up on an incremental plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum FullRebuildReason {
    /// The caller asked for a non-incremental build.
    Requested,
    /// A persisted index was missing, corrupt or from another schema.
    ColdCache,
    Unreadable { path: String },
    Structural { path: String },
    /// Template changed while the template policy is `full`.
    TemplatePolicy { path: String },
    /// A new template may shadow the one existing pages resolve to.
    TemplateAdded { path: String },
    /// A deleted producer was reached through an edge with a fallback.
    AmbiguousDeletion { producer: String, consumer: String },
    /// A dependent no longer maps to anything buildable.
    UnresolvedDependent { producer: String, consumer: String },
    DepthExceeded { producer: String, max_depth: usize },
}

impl From<DepthExceeded> for FullRebuildReason {
    fn from(err: DepthExceeded) -> Self {
        FullRebuildReason::DepthExceeded {
            producer: err.producer,
            max_depth: err.max_depth,
        }
    }
}

impl fmt::Display for FullRebuildReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FullRebuildReason::Requested => f.write_str("full build requested"),
            FullRebuildReason::ColdCache => f.write_str("no usable cache"),
            FullRebuildReason::Unreadable { path } => write!(f, "could not read {path}"),
            FullRebuildReason::Structural { path } => write!(f, "structural change in {path}"),
            FullRebuildReason::TemplatePolicy { path } => {
                write!(f, "template {path} changed (template_policy = full)")
            }
            FullRebuildReason::TemplateAdded { path } => {
                write!(f, "new template {path} may change template lookup")
            }
            FullRebuildReason::AmbiguousDeletion { producer, consumer } => write!(
                f,
                "{producer} was deleted and {consumer} may fall back to another resource"
            ),
            FullRebuildReason::UnresolvedDependent { producer, consumer } => write!(
                f,
                "{consumer} (dependent of {producer}) no longer resolves to a source"
            ),
            FullRebuildReason::DepthExceeded { producer, max_depth } => write!(
                f,
                "cascade from {producer} is deeper than {max_depth}"
            ),
        }
    }
}

/// Minimal set of work for one build.
///
/// When `full_rebuild` is set the sets are informational only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPlan {
    /// Pages and generated indexes to render.
    pub rebuild: BTreeSet<String>,
    /// Assets and bundles to reprocess.
    pub assets: BTreeSet<String>,
    /// Units whose source is gone.
    pub removed: BTreeSet<String>,
    /// Output files of removed units.
    pub orphaned_outputs: BTreeSet<String>,
    /// Units left out by a scoped request.
    pub deferred: BTreeSet<String>,
    pub full_rebuild: Option<FullRebuildReason>,
}

impl BuildPlan {
    pub fn full(reason: FullRebuildReason) -> Self {
        Self {
            full_rebuild: Some(reason),
            ..Self::default()
        }
    }

    pub fn is_full(&self) -> bool {
        self.full_rebuild.is_some()
    }

    /// Nothing to build, nothing to remove.
    pub fn is_empty(&self) -> bool {
        self.full_rebuild.is_none()
            && self.rebuild.is_empty()
            && self.assets.is_empty()
            && self.removed.is_empty()
    }

    /// Number of units the executor will touch (0 for full rebuilds).
    pub fn unit_count(&self) -> usize {
        self.rebuild.len() + self.assets.len() + self.removed.len()
    }
}

/// What triggered a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Root-relative paths reported by the watcher (or a scan).
    pub changed_paths: Vec<String>,
    pub incremental: bool,
    /// Restrict rendering to one scope; the rest is deferred.
    pub scope: Option<VersionScope>,
}

impl BuildRequest {
    pub fn incremental<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            changed_paths: paths.into_iter().map(Into::into).collect(),
            incremental: true,
            scope: None,
        }
    }

    pub fn full() -> Self {
        Self {
            changed_paths: Vec::new(),
            incremental: false,
            scope: None,
        }
    }

    pub fn with_scope(mut self, scope: Option<VersionScope>) -> Self {
        self.scope = scope;
        self
    }
}

/// Summary of one finished build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub rebuilt: usize,
    pub assets: usize,
    pub removed: usize,
    pub failed: usize,
    pub full_rebuild: bool,
    pub reason: Option<FullRebuildReason>,
    pub elapsed: Duration,
    /// Outputs whose page no longer exists: deleted sources and taxonomy
    /// terms that lost their last member.
    pub orphaned_outputs: BTreeSet<String>,
    /// Term listings whose membership changed but which are still
    /// unrendered after this build. They stay pending until rendered.
    pub stale_listings: BTreeSet<String>,
}

impl fmt::Display for BuildStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rebuilt, {} assets, {} removed, {} failed in {:?}",
            self.rebuilt, self.assets, self.removed, self.failed, self.elapsed
        )?;
        if let Some(reason) = &self.reason {
            write!(f, " (full rebuild: {reason})")?;
        }
        Ok(())
    }
}
