// src/graph/reports.rs

use serde::{Deserialize, Serialize};

use crate::types::{DependencyKind, VersionScope};

/// One dependency consumed while building a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedDependency {
    /// Producer id: a root-relative path or a symbolic target.
    pub id: String,
    pub kind: DependencyKind,
    /// Scope in which the producer was read; defaults to the unit's own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<VersionScope>,
}

impl ReportedDependency {
    pub fn new(id: impl Into<String>, kind: DependencyKind) -> Self {
        Self {
            id: id.into(),
            kind,
            scope: None,
        }
    }

    pub fn in_scope(mut self, scope: VersionScope) -> Self {
        self.scope = Some(scope);
        self
    }
}

fn default_success() -> bool {
    true
}

/// What a collaborator reports after building one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitReport {
    /// Page id, asset path or generated index id.
    pub unit: String,
    #[serde(default)]
    pub scope: VersionScope,
    #[serde(default)]
    pub dependencies: Vec<ReportedDependency>,
    /// Taxonomy terms the page belongs to.
    #[serde(default)]
    pub terms: Vec<String>,
    /// Assets imported by an asset unit (bundles).
    #[serde(default)]
    pub imports: Vec<String>,
    /// Output path written for this unit, relative to the output dir.
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub generated: bool,
    #[serde(default = "default_success")]
    pub success: bool,
}

impl UnitReport {
    pub fn new(unit: impl Into<String>, scope: VersionScope) -> Self {
        Self {
            unit: unit.into(),
            scope,
            dependencies: Vec::new(),
            terms: Vec::new(),
            imports: Vec::new(),
            output: None,
            title: None,
            generated: false,
            success: true,
        }
    }

    pub fn failed(unit: impl Into<String>, scope: VersionScope) -> Self {
        Self {
            success: false,
            ..Self::new(unit, scope)
        }
    }

    pub fn depends_on(mut self, id: impl Into<String>, kind: DependencyKind) -> Self {
        self.dependencies.push(ReportedDependency::new(id, kind));
        self
    }
}

/// Reports collected by one worker during a build.
///
/// Workers never touch the graph; they fill their own buffer and the
/// buffers are merged once, single-threaded, after the parallel phase.
#[derive(Debug, Default)]
pub struct ReportBuffer {
    reports: Vec<UnitReport>,
}

impl ReportBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, report: UnitReport) {
        self.reports.push(report);
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Concatenate worker buffers into one list ordered by unit id.
    ///
    /// When a unit was reported more than once, the last report wins.
    pub fn merge(buffers: impl IntoIterator<Item = ReportBuffer>) -> Vec<UnitReport> {
        let mut all: Vec<UnitReport> = buffers.into_iter().flat_map(|b| b.reports).collect();
        // Stable sort keeps per-unit arrival order, so the last one is the newest.
        all.sort_by(|a, b| a.unit.cmp(&b.unit));
        let mut merged: Vec<UnitReport> = Vec::with_capacity(all.len());
        for report in all {
            match merged.last_mut() {
                Some(last) if last.unit == report.unit => *last = report,
                _ => merged.push(report),
            }
        }
        merged
    }
}

impl Extend<UnitReport> for ReportBuffer {
    fn extend<T: IntoIterator<Item = UnitReport>>(&mut self, iter: T) {
        self.reports.extend(iter);
    }
}
