use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a change to a template or partial is treated by the planner.
///
/// - `Cascade`: templates are ordinary graph producers; only the pages that
///   recorded a `template`/`partial` edge to the changed file are rebuilt
///   (default behaviour).
/// - `FullRebuild`: any template change is structural and forces a full
///   rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplatePolicy {
    Cascade,
    #[serde(rename = "full")]
    FullRebuild,
}

impl Default for TemplatePolicy {
    fn default() -> Self {
        TemplatePolicy::Cascade
    }
}

impl FromStr for TemplatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cascade" => Ok(TemplatePolicy::Cascade),
            "full" => Ok(TemplatePolicy::FullRebuild),
            other => Err(format!(
                "invalid template_policy: {other} (expected \"cascade\" or \"full\")"
            )),
        }
    }
}

/// Version namespace a build entity belongs to.
///
/// Cascade rule: a `Shared` producer reaches every consumer; a producer in a
/// specific version (or in `Latest`) only reaches consumers of that same
/// scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionScope {
    /// Unversioned content, served as the "latest" docs.
    Latest,
    /// Content visible to every version.
    Shared,
    /// Content belonging to one named version, e.g. `v2`.
    Version(String),
}

impl Default for VersionScope {
    fn default() -> Self {
        VersionScope::Latest
    }
}

impl VersionScope {
    /// Whether a change to a producer in `self` must reach a consumer in
    /// `consumer`.
    pub fn cascades_to(&self, consumer: &VersionScope) -> bool {
        match self {
            VersionScope::Shared => true,
            other => other == consumer,
        }
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, VersionScope::Shared)
    }
}

impl fmt::Display for VersionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionScope::Latest => f.write_str("latest"),
            VersionScope::Shared => f.write_str("shared"),
            VersionScope::Version(v) => f.write_str(v),
        }
    }
}

impl FromStr for VersionScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_lowercase().as_str() {
            "" => Err("version scope must not be empty".to_string()),
            "latest" => Ok(VersionScope::Latest),
            "shared" => Ok(VersionScope::Shared),
            _ => Ok(VersionScope::Version(trimmed.to_string())),
        }
    }
}

/// Kind of a recorded dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyKind {
    Template,
    Partial,
    SharedContent,
    CrossVersionLink,
    TaxonomyMembership,
    AssetReference,
}

impl DependencyKind {
    /// Edges through which a consumer may silently fall back to another
    /// resource when the producer disappears. Deleting such a producer is
    /// ambiguous.
    pub fn has_fallback(self) -> bool {
        matches!(self, DependencyKind::Template | DependencyKind::Partial)
    }

    /// Cross-version links point across scopes on purpose and always cascade.
    pub fn crosses_scopes(self) -> bool {
        matches!(self, DependencyKind::CrossVersionLink)
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DependencyKind::Template => "template",
            DependencyKind::Partial => "partial",
            DependencyKind::SharedContent => "shared-content",
            DependencyKind::CrossVersionLink => "cross-version-link",
            DependencyKind::TaxonomyMembership => "taxonomy-membership",
            DependencyKind::AssetReference => "asset-reference",
        };
        f.write_str(s)
    }
}
