// src/exec/backend.rs

//! Pluggable build executor abstraction.
//!
//! The session hands every plan to a `BuildExecutor` instead of rendering
//! anything itself. Production uses [`CommandExecutor`](super::CommandExecutor);
//! tests provide fakes that answer with canned [`UnitReport`]s.

use std::future::Future;
use std::pin::Pin;

use anyhow::Result;

use crate::graph::{ReportBuffer, UnitReport};
use crate::planner::BuildPlan;

/// Reports returned by one build, already merged across workers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutcome {
    pub reports: Vec<UnitReport>,
}

impl BuildOutcome {
    /// Merge per-worker buffers into a single, unit-ordered list.
    pub fn from_buffers(buffers: impl IntoIterator<Item = ReportBuffer>) -> Self {
        Self {
            reports: ReportBuffer::merge(buffers),
        }
    }

    pub fn failed_count(&self) -> usize {
        self.reports.iter().filter(|r| !r.success).count()
    }
}

/// Trait abstracting who renders pages and processes assets.
///
/// `units` lists every known page and asset; implementations use it when
/// `plan.full_rebuild` is set and ignore it otherwise.
pub trait BuildExecutor: Send + Sync {
    fn execute<'a>(
        &'a self,
        plan: &'a BuildPlan,
        units: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<BuildOutcome>> + Send + 'a>>;
}
