// src/graph/assets.rs

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use super::DepthExceeded;

/// Import graph between assets (stylesheets, scripts, bundles).
///
/// Kept apart from the page graph: asset edges are reported by the asset
/// pipeline, not by page rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDeps {
    /// asset -> assets it imports
    imports: BTreeMap<String, BTreeSet<String>>,
}

impl AssetDeps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_imports<S: AsRef<str>>(&mut self, asset: &str, imports: &[S]) {
        let set: BTreeSet<String> = imports.iter().map(|s| s.as_ref().to_string()).collect();
        if set.is_empty() {
            self.imports.remove(asset);
        } else {
            self.imports.insert(asset.to_string(), set);
        }
    }

    pub fn remove_asset(&mut self, asset: &str) {
        self.imports.remove(asset);
    }

    pub fn imports_of(&self, asset: &str) -> Option<&BTreeSet<String>> {
        self.imports.get(asset)
    }

    /// Assets that import `asset` directly.
    pub fn importers_of(&self, asset: &str) -> BTreeSet<String> {
        self.imports
            .iter()
            .filter(|(_, deps)| deps.contains(asset))
            .map(|(importer, _)| importer.clone())
            .collect()
    }

    /// Every asset that reaches `asset` through imports, bounded by
    /// `max_depth` hops.
    pub fn transitive_importers(&self, asset: &str, max_depth: usize) -> Result<BTreeSet<String>, DepthExceeded> {
        let mut result = BTreeSet::new();
        let mut seen: HashSet<String> = HashSet::from([asset.to_string()]);
        let mut frontier = vec![asset.to_string()];

        for _ in 0..max_depth {
            let mut next = Vec::new();
            for current in &frontier {
                for importer in self.importers_of(current) {
                    if seen.insert(importer.clone()) {
                        result.insert(importer.clone());
                        next.push(importer);
                    }
                }
            }
            if next.is_empty() {
                return Ok(result);
            }
            frontier = next;
        }

        let unexplored = frontier
            .iter()
            .any(|current| self.importers_of(current).iter().any(|i| !seen.contains(i)));
        if unexplored {
            return Err(DepthExceeded {
                producer: asset.to_string(),
                max_depth,
            });
        }
        Ok(result)
    }
}
