use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use sitegraph::exec::{BuildExecutor, BuildOutcome};
use sitegraph::graph::{ReportBuffer, UnitReport};
use sitegraph::layout::{PathClass, SiteLayout};
use sitegraph::planner::BuildPlan;
use sitegraph::types::VersionScope;

/// What one call to `execute` was asked to build.
#[derive(Debug, Clone)]
pub struct ExecutedBuild {
    pub plan: BuildPlan,
    /// Units actually rendered: every unit on a full rebuild, otherwise the
    /// plan's pages and assets.
    pub units: BTreeSet<String>,
}

/// A fake executor that:
/// - records every plan it was handed
/// - answers each unit with a canned report, or a bare successful one
///   (taxonomy listings are reported as generated pages).
#[derive(Clone)]
pub struct FakeExecutor {
    layout: SiteLayout,
    canned: Arc<Mutex<HashMap<String, UnitReport>>>,
    executed: Arc<Mutex<Vec<ExecutedBuild>>>,
    fail_next: Arc<Mutex<bool>>,
}

impl FakeExecutor {
    pub fn new(layout: SiteLayout) -> Self {
        Self {
            layout,
            canned: Arc::default(),
            executed: Arc::default(),
            fail_next: Arc::default(),
        }
    }

    /// Report `report` whenever its unit is built.
    pub fn with_report(self, report: UnitReport) -> Self {
        self.set_report(report);
        self
    }

    pub fn set_report(&self, report: UnitReport) {
        self.canned.lock().unwrap().insert(report.unit.clone(), report);
    }

    /// Make the next `execute` call return an error.
    pub fn fail_next(&self) {
        *self.fail_next.lock().unwrap() = true;
    }

    pub fn executed(&self) -> Vec<ExecutedBuild> {
        self.executed.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<ExecutedBuild> {
        self.executed.lock().unwrap().last().cloned()
    }

    fn report_for(&self, unit: &str) -> UnitReport {
        if let Some(report) = self.canned.lock().unwrap().get(unit) {
            return report.clone();
        }
        if let Some(rest) = unit.strip_prefix("taxonomy/") {
            // `taxonomy/<slug>` or `taxonomy/<version>/<slug>`
            let scope = match rest.split_once('/') {
                Some((version, _)) => VersionScope::Version(version.to_string()),
                None => VersionScope::Latest,
            };
            let mut report = UnitReport::new(unit, scope);
            report.generated = true;
            return report;
        }
        let scope = match self.layout.classify(unit) {
            PathClass::Content(scope) => scope,
            PathClass::Asset => VersionScope::Shared,
            _ => VersionScope::Latest,
        };
        UnitReport::new(unit, scope)
    }
}

impl BuildExecutor for FakeExecutor {
    fn execute<'a>(
        &'a self,
        plan: &'a BuildPlan,
        units: &'a [String],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<BuildOutcome>> + Send + 'a>> {
        Box::pin(async move {
            if std::mem::take(&mut *self.fail_next.lock().unwrap()) {
                anyhow::bail!("fake executor failure");
            }

            let built: BTreeSet<String> = if plan.is_full() {
                units.iter().cloned().collect()
            } else {
                plan.rebuild.iter().chain(plan.assets.iter()).cloned().collect()
            };

            // One buffer per unit, the way parallel workers would report.
            let buffers = built.iter().map(|unit| {
                let mut buffer = ReportBuffer::new();
                buffer.push(self.report_for(unit));
                buffer
            });
            let outcome = BuildOutcome::from_buffers(buffers.collect::<Vec<_>>());

            self.executed.lock().unwrap().push(ExecutedBuild {
                plan: plan.clone(),
                units: built,
            });
            Ok(outcome)
        })
    }
}
