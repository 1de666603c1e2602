// src/graph/taxonomy.rs

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::VersionScope;

/// Term pages touched by a membership update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermDelta {
    /// Term pages the page joined.
    pub added: Vec<String>,
    /// Term pages the page left.
    pub removed: Vec<String>,
    /// Term pages that no longer have any member.
    pub emptied: Vec<String>,
}

impl TermDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Membership of pages in taxonomy term pages.
///
/// Term pages are generated consumers; they are keyed per scope so a
/// versioned page never drags the latest listing along.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyIndex {
    /// term page id -> member pages
    members: BTreeMap<String, BTreeSet<String>>,
    /// page -> term page ids
    by_page: BTreeMap<String, BTreeSet<String>>,
}

impl TaxonomyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the generated listing page for `term` in `scope`.
    pub fn term_page_id(scope: &VersionScope, term: &str) -> String {
        let slug = term.trim().to_lowercase().replace(' ', "-");
        match scope {
            VersionScope::Version(v) => format!("taxonomy/{v}/{slug}"),
            VersionScope::Latest | VersionScope::Shared => format!("taxonomy/{slug}"),
        }
    }

    pub fn members(&self, term_page: &str) -> Option<&BTreeSet<String>> {
        self.members.get(term_page)
    }

    pub fn term_pages_of(&self, page: &str) -> impl Iterator<Item = &str> {
        self.by_page
            .get(page)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    pub fn term_page_count(&self) -> usize {
        self.members.len()
    }

    /// Replace the terms of `page`.
    pub fn set_terms<S: AsRef<str>>(&mut self, page: &str, scope: &VersionScope, terms: &[S]) -> TermDelta {
        let new: BTreeSet<String> = terms
            .iter()
            .map(|t| t.as_ref())
            .filter(|t| !t.trim().is_empty())
            .map(|t| Self::term_page_id(scope, t))
            .collect();
        let old = self.by_page.remove(page).unwrap_or_default();

        let mut delta = TermDelta::default();
        for gone in old.difference(&new) {
            delta.removed.push(gone.clone());
            if self.leave(gone, page) {
                delta.emptied.push(gone.clone());
            }
        }
        for joined in new.difference(&old) {
            delta.added.push(joined.clone());
            self.members
                .entry(joined.clone())
                .or_default()
                .insert(page.to_string());
        }
        if !new.is_empty() {
            self.by_page.insert(page.to_string(), new);
        }
        delta
    }

    /// Drop `page` from every term it belonged to.
    pub fn remove_page(&mut self, page: &str) -> TermDelta {
        let old = self.by_page.remove(page).unwrap_or_default();
        let mut delta = TermDelta::default();
        for gone in old {
            if self.leave(&gone, page) {
                delta.emptied.push(gone.clone());
            }
            delta.removed.push(gone);
        }
        delta
    }

    /// Returns true if the term page has no members left.
    fn leave(&mut self, term_page: &str, page: &str) -> bool {
        let Some(set) = self.members.get_mut(term_page) else {
            return false;
        };
        set.remove(page);
        if set.is_empty() {
            self.members.remove(term_page);
            return true;
        }
        false
    }
}
