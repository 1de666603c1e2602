// src/layout/mod.rs

//! Mapping of root-relative paths onto build entities.
//!
//! The layout answers two questions for the planner and the coordinator:
//! what kind of entity a changed path is (content, template, asset,
//! structural, ignored) and which version scope it belongs to.

use std::fmt;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::model::LayoutSection;
use crate::types::VersionScope;

/// Classification of a single root-relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathClass {
    /// Site config, directive registry: can't be attributed to one page.
    Structural,
    /// Template or partial.
    Template,
    Asset,
    Content(VersionScope),
    /// Outside every watched namespace (or explicitly excluded).
    Ignored,
}

impl PathClass {
    /// Scope used when the path acts as a producer in the graph.
    ///
    /// Templates and assets are reachable from every version.
    pub fn producer_scope(&self) -> Option<VersionScope> {
        match self {
            PathClass::Content(scope) => Some(scope.clone()),
            PathClass::Template | PathClass::Asset => Some(VersionScope::Shared),
            PathClass::Structural | PathClass::Ignored => None,
        }
    }
}

/// Compiled `[layout]` globs.
#[derive(Clone)]
pub struct SiteLayout {
    content: GlobSet,
    shared: GlobSet,
    versions_prefix: String,
    templates: GlobSet,
    structural: GlobSet,
    assets: GlobSet,
    exclude: GlobSet,
}

impl fmt::Debug for SiteLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteLayout")
            .field("versions_prefix", &self.versions_prefix)
            .finish_non_exhaustive()
    }
}

impl SiteLayout {
    pub fn from_section(section: &LayoutSection) -> Result<Self> {
        let versions_prefix = format!("{}/", section.versions_dir.trim_matches('/'));
        Ok(Self {
            content: build_globset(&section.content).context("building content globset")?,
            shared: build_globset(&section.shared).context("building shared globset")?,
            versions_prefix,
            templates: build_globset(&section.templates).context("building templates globset")?,
            structural: build_globset(&section.structural)
                .context("building structural globset")?,
            assets: build_globset(&section.assets).context("building assets globset")?,
            exclude: build_globset(&section.exclude).context("building exclude globset")?,
        })
    }

    /// Returns true if the path should never reach the planner.
    pub fn is_excluded(&self, rel_path: &str) -> bool {
        self.exclude.is_match(rel_path)
    }

    /// Classify a root-relative, `/`-separated path.
    ///
    /// Precedence: exclude, structural, template, asset, content.
    pub fn classify(&self, rel_path: &str) -> PathClass {
        if self.exclude.is_match(rel_path) {
            return PathClass::Ignored;
        }
        if self.structural.is_match(rel_path) {
            return PathClass::Structural;
        }
        if self.templates.is_match(rel_path) {
            return PathClass::Template;
        }
        if self.assets.is_match(rel_path) {
            return PathClass::Asset;
        }
        if self.content.is_match(rel_path) {
            return PathClass::Content(self.content_scope(rel_path));
        }
        PathClass::Ignored
    }

    /// Version scope of a content path.
    ///
    /// Shared globs win over the versions directory, so
    /// `content/versions/_shared/x.md` can still be declared shared.
    pub fn content_scope(&self, rel_path: &str) -> VersionScope {
        if self.shared.is_match(rel_path) {
            return VersionScope::Shared;
        }
        if let Some(rest) = rel_path.strip_prefix(&self.versions_prefix) {
            if let Some((version, _)) = rest.split_once('/') {
                if !version.is_empty() {
                    return VersionScope::Version(version.to_string());
                }
            }
        }
        VersionScope::Latest
    }
}

/// Build a GlobSet from simple string patterns.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
