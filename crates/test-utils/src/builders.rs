#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use sitegraph::config::{ConfigFile, RawConfigFile};
use sitegraph::types::TemplatePolicy;
use tempfile::TempDir;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn template_policy(mut self, policy: TemplatePolicy) -> Self {
        self.config.engine.template_policy = policy;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.engine.max_depth = depth;
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.engine.debounce_ms = ms;
        self
    }

    pub fn state_dir(mut self, dir: &str) -> Self {
        self.config.engine.state_dir = PathBuf::from(dir);
        self
    }

    pub fn executor_cmd(mut self, cmd: &str) -> Self {
        self.config.executor.cmd = Some(cmd.to_string());
        self
    }

    pub fn with_exclude(mut self, pattern: &str) -> Self {
        self.config.layout.exclude.push(pattern.to_string());
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A throwaway site directory with the default layout.
pub struct SiteTree {
    dir: TempDir,
}

impl SiteTree {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp site dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Create or overwrite `rel`, creating parent directories.
    pub fn write(&self, rel: &str, contents: &str) -> &Self {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write site file");
        self
    }

    pub fn remove(&self, rel: &str) -> &Self {
        fs::remove_file(self.path(rel)).expect("remove site file");
        self
    }

    /// Move a file or a whole directory, as an editor or `git mv` would.
    pub fn rename(&self, from: &str, to: &str) -> &Self {
        let to = self.path(to);
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).expect("create site dirs");
        }
        fs::rename(self.path(from), to).expect("rename site path");
        self
    }

    /// A small docs site: latest and v2 pages, one shared changelog, a base
    /// template, a partial and a stylesheet.
    pub fn docs_site() -> Self {
        let site = Self::new();
        site.write("site.toml", "title = \"docs\"\n")
            .write("templates/base.html", "<html>{{ content }}</html>")
            .write("templates/partials/nav.html", "<nav></nav>")
            .write("content/index.md", "# Home")
            .write("content/guide.md", "# Guide")
            .write("content/versions/v2/guide.md", "# Guide v2")
            .write("content/_shared/changelog.md", "# Changes")
            .write("assets/site.css", "body {}");
        site
    }
}

impl Default for SiteTree {
    fn default() -> Self {
        Self::new()
    }
}
