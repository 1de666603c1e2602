#![allow(dead_code)]

use std::sync::Arc;

use sitegraph::config::ConfigFile;
use sitegraph::fs::RealFileSystem;
use sitegraph::graph::UnitReport;
use sitegraph::layout::SiteLayout;
use sitegraph::session::BuildSession;
use sitegraph::types::{DependencyKind, VersionScope};
use sitegraph_test_utils::builders::{ConfigFileBuilder, SiteTree};
use sitegraph_test_utils::fake_executor::FakeExecutor;

pub use sitegraph_test_utils::init_tracing;

pub fn default_config() -> ConfigFile {
    ConfigFileBuilder::new().build()
}

pub fn open_session(site: &SiteTree, cfg: &ConfigFile) -> BuildSession {
    BuildSession::open(cfg, site.root(), Arc::new(RealFileSystem)).expect("open session")
}

/// Fake executor answering with the dependencies a real renderer would
/// report for `SiteTree::docs_site()`.
pub fn docs_executor(cfg: &ConfigFile) -> FakeExecutor {
    let layout = SiteLayout::from_section(cfg.layout()).expect("layout");
    FakeExecutor::new(layout)
        .with_report(
            UnitReport::new("content/index.md", VersionScope::Latest)
                .depends_on("templates/base.html", DependencyKind::Template)
                .depends_on("content/_shared/changelog.md", DependencyKind::SharedContent),
        )
        .with_report(
            UnitReport::new("content/guide.md", VersionScope::Latest)
                .depends_on("templates/base.html", DependencyKind::Template)
                .depends_on("templates/partials/nav.html", DependencyKind::Partial)
                .depends_on("assets/site.css", DependencyKind::AssetReference),
        )
        .with_report(
            UnitReport::new("content/versions/v2/guide.md", VersionScope::Version("v2".into()))
                .depends_on("templates/base.html", DependencyKind::Template),
        )
}
