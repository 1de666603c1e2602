// src/graph/pages.rs

//! Page metadata index.
//!
//! Records hold only the fields every consumer of the index needs
//! ([`GUARANTEED_FIELDS`]). Anything else (front matter, raw source) is
//! loaded on demand through a [`PageLoader`] and memoised on the record.

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::types::VersionScope;

/// Fields that are always populated on a [`PageRecord`] without touching
/// the loader.
pub const GUARANTEED_FIELDS: &[&str] = &["id", "output_path", "scope", "title", "tags", "generated"];

/// Lazily loaded part of a page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageBody {
    pub front_matter: BTreeMap<String, String>,
    pub source: String,
}

/// Loads the full body of a page by id.
pub trait PageLoader: Send + Sync {
    fn load(&self, id: &str) -> Result<PageBody>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub id: String,
    pub output_path: String,
    #[serde(default)]
    pub scope: VersionScope,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub generated: bool,
    #[serde(skip)]
    body: OnceLock<PageBody>,
}

impl PageRecord {
    pub fn new(id: impl Into<String>, output_path: impl Into<String>, scope: VersionScope) -> Self {
        Self {
            id: id.into(),
            output_path: output_path.into(),
            scope,
            title: None,
            tags: Vec::new(),
            generated: false,
            body: OnceLock::new(),
        }
    }

    /// Full body, loaded through `loader` on first access.
    ///
    /// A failed load is not memoised; the next call tries again.
    pub fn body(&self, loader: &dyn PageLoader) -> Result<&PageBody> {
        if let Some(body) = self.body.get() {
            return Ok(body);
        }
        let loaded = loader.load(&self.id)?;
        Ok(self.body.get_or_init(|| loaded))
    }

    pub fn is_body_loaded(&self) -> bool {
        self.body.get().is_some()
    }
}

/// Arena of page records with an id lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<PageRecord>", into = "Vec<PageRecord>")]
pub struct PageIndex {
    slots: Vec<Option<PageRecord>>,
    by_id: HashMap<String, usize>,
    free: Vec<usize>,
}

impl PageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&PageRecord> {
        self.by_id.get(id).and_then(|&slot| self.slots[slot].as_ref())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Insert or replace the record for `record.id`.
    pub fn upsert(&mut self, record: PageRecord) {
        if let Some(&slot) = self.by_id.get(&record.id) {
            self.slots[slot] = Some(record);
            return;
        }
        let id = record.id.clone();
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(record);
                slot
            }
            None => {
                self.slots.push(Some(record));
                self.slots.len() - 1
            }
        };
        self.by_id.insert(id, slot);
    }

    pub fn remove(&mut self, id: &str) -> Option<PageRecord> {
        let slot = self.by_id.remove(id)?;
        self.free.push(slot);
        self.slots[slot].take()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PageRecord> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    /// Output path of a page, if known. Pages whose collaborator never
    /// reported an output have an empty path and yield `None`.
    pub fn output_of(&self, id: &str) -> Option<&str> {
        self.get(id)
            .map(|r| r.output_path.as_str())
            .filter(|o| !o.is_empty())
    }
}

impl From<Vec<PageRecord>> for PageIndex {
    fn from(records: Vec<PageRecord>) -> Self {
        let mut index = PageIndex::new();
        for record in records {
            index.upsert(record);
        }
        index
    }
}

impl From<PageIndex> for Vec<PageRecord> {
    fn from(index: PageIndex) -> Self {
        let mut records: Vec<PageRecord> = index.slots.into_iter().flatten().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }
}
