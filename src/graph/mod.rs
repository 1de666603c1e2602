// src/graph/mod.rs

//! Dependency graph between build entities.
//!
//! Edges point from a *consumer* (a page or generated index that read
//! something while rendering) to a *producer* (the file or symbolic target it
//! read). Both directions are indexed so cascades are a reverse lookup.
//!
//! - [`reports`] holds the collaborator-facing report types and the
//!   per-worker buffer that is merged in one single-threaded commit.
//! - [`taxonomy`], [`assets`] and [`pages`] are the auxiliary indexes that
//!   are persisted as their own named snapshots.

pub mod assets;
pub mod pages;
pub mod reports;
pub mod taxonomy;

use std::collections::{BTreeMap, BTreeSet, HashSet};

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{DependencyKind, VersionScope};

pub use assets::AssetDeps;
pub use pages::{PageBody, PageIndex, PageLoader, PageRecord};
pub use reports::{ReportBuffer, ReportedDependency, UnitReport};
pub use taxonomy::{TaxonomyIndex, TermDelta};

/// A bounded traversal ran out of depth while there was still graph left to
/// explore. The caller must escalate to a full rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cascade from '{producer}' exceeds depth bound {max_depth}")]
pub struct DepthExceeded {
    pub producer: String,
    pub max_depth: usize,
}

/// Directed edge `consumer -> producer`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub consumer: String,
    pub producer: String,
    pub kind: DependencyKind,
    /// Scope in which the consumer reads the producer.
    pub scope: VersionScope,
}

/// Per-consumer metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub scope: VersionScope,
    /// Generated consumers (taxonomy listings, indexes) have no source file.
    #[serde(default)]
    pub generated: bool,
}

type EdgeKey = (String, DependencyKind);

/// Forward and reverse edge index keyed by stable string identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "GraphSnapshot", into = "GraphSnapshot")]
pub struct DependencyGraph {
    nodes: BTreeMap<String, NodeInfo>,
    /// consumer -> (producer, kind) -> scope
    outgoing: BTreeMap<String, BTreeMap<EdgeKey, VersionScope>>,
    /// producer -> (consumer, kind) -> scope
    incoming: BTreeMap<String, BTreeMap<EdgeKey, VersionScope>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or update) a consumer node.
    pub fn register_node(&mut self, id: &str, scope: VersionScope, generated: bool) {
        self.nodes
            .insert(id.to_string(), NodeInfo { scope, generated });
    }

    pub fn node(&self, id: &str) -> Option<&NodeInfo> {
        self.nodes.get(id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Add or replace the edge `(consumer, producer, kind)`.
    ///
    /// `scope` is the consumer's scope; an unknown consumer is registered
    /// as a non-generated node in that scope.
    pub fn record_edge(
        &mut self,
        consumer: &str,
        producer: &str,
        kind: DependencyKind,
        scope: VersionScope,
    ) {
        self.nodes
            .entry(consumer.to_string())
            .or_insert_with(|| NodeInfo {
                scope: scope.clone(),
                generated: false,
            });
        self.outgoing
            .entry(consumer.to_string())
            .or_default()
            .insert((producer.to_string(), kind), scope.clone());
        self.incoming
            .entry(producer.to_string())
            .or_default()
            .insert((consumer.to_string(), kind), scope);
    }

    /// Remove a single edge. Returns true if it existed.
    pub fn remove_edge(&mut self, consumer: &str, producer: &str, kind: DependencyKind) -> bool {
        let key = (producer.to_string(), kind);
        let removed = remove_nested(&mut self.outgoing, consumer, &key);
        remove_nested(&mut self.incoming, producer, &(consumer.to_string(), kind));
        removed
    }

    /// Clear every outgoing edge of `consumer` so collaborators can record
    /// them afresh. Returns the number of edges dropped.
    pub fn rebuild_edges_for(&mut self, consumer: &str) -> usize {
        let Some(edges) = self.outgoing.remove(consumer) else {
            return 0;
        };
        for (producer, kind) in edges.keys() {
            remove_nested(&mut self.incoming, producer, &(consumer.to_string(), *kind));
        }
        edges.len()
    }

    /// Drop every edge that points at `producer`. Returns the number of
    /// edges dropped.
    pub fn remove_producer(&mut self, producer: &str) -> usize {
        let Some(edges) = self.incoming.remove(producer) else {
            return 0;
        };
        for (consumer, kind) in edges.keys() {
            remove_nested(&mut self.outgoing, consumer, &(producer.to_string(), *kind));
        }
        edges.len()
    }

    /// Forget an entity entirely, as consumer and as producer.
    pub fn remove_node(&mut self, id: &str) {
        self.rebuild_edges_for(id);
        self.remove_producer(id);
        self.nodes.remove(id);
    }

    /// Edges pointing at `producer`.
    pub fn edges_to(&self, producer: &str) -> Vec<DependencyEdge> {
        self.incoming
            .get(producer)
            .map(|edges| {
                edges
                    .iter()
                    .map(|((consumer, kind), scope)| DependencyEdge {
                        consumer: consumer.clone(),
                        producer: producer.to_string(),
                        kind: *kind,
                        scope: scope.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Edges leaving `consumer`.
    pub fn edges_from(&self, consumer: &str) -> Vec<DependencyEdge> {
        self.outgoing
            .get(consumer)
            .map(|edges| {
                edges
                    .iter()
                    .map(|((producer, kind), scope)| DependencyEdge {
                        consumer: consumer.to_string(),
                        producer: producer.clone(),
                        kind: *kind,
                        scope: scope.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every edge, sorted.
    pub fn edges(&self) -> Vec<DependencyEdge> {
        self.outgoing
            .keys()
            .flat_map(|consumer| self.edges_from(consumer))
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.outgoing.values().map(BTreeMap::len).sum()
    }

    pub fn has_dependents(&self, producer: &str) -> bool {
        self.incoming.get(producer).is_some_and(|e| !e.is_empty())
    }

    /// Direct dependents of `producer`, respecting the scope cascade rule.
    pub fn dependents_of(&self, producer: &str, scope: &VersionScope) -> BTreeSet<String> {
        self.scoped_dependents(producer, scope)
            .into_iter()
            .map(|(consumer, _)| consumer)
            .collect()
    }

    fn scoped_dependents(&self, producer: &str, scope: &VersionScope) -> Vec<(String, VersionScope)> {
        let Some(edges) = self.incoming.get(producer) else {
            return Vec::new();
        };
        let mut out: Vec<(String, VersionScope)> = edges
            .iter()
            .filter(|((_, kind), edge_scope)| kind.crosses_scopes() || scope.cascades_to(edge_scope))
            .map(|((consumer, _), edge_scope)| {
                let next_scope = self
                    .nodes
                    .get(consumer)
                    .map(|n| n.scope.clone())
                    .unwrap_or_else(|| edge_scope.clone());
                (consumer.clone(), next_scope)
            })
            .collect();
        out.dedup_by(|a, b| a.0 == b.0);
        out
    }

    /// Breadth-first reverse traversal bounded by `max_depth` hops.
    ///
    /// Each consumer reached becomes a producer for the next hop, in its own
    /// scope. A visited set makes cycles harmless. If consumers remain
    /// unexplored after `max_depth` hops, the result is `DepthExceeded`
    /// instead of a truncated set.
    pub fn transitive_dependents_of(
        &self,
        producer: &str,
        scope: &VersionScope,
        max_depth: usize,
    ) -> Result<BTreeSet<String>, DepthExceeded> {
        let mut result = BTreeSet::new();
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(producer.to_string());
        let mut frontier = vec![(producer.to_string(), scope.clone())];

        for _ in 0..max_depth {
            let mut next = Vec::new();
            for (current, current_scope) in &frontier {
                for (consumer, consumer_scope) in self.scoped_dependents(current, current_scope) {
                    if seen.insert(consumer.clone()) {
                        result.insert(consumer.clone());
                        next.push((consumer, consumer_scope));
                    }
                }
            }
            if next.is_empty() {
                return Ok(result);
            }
            frontier = next;
        }

        let unexplored = frontier.iter().any(|(current, current_scope)| {
            self.scoped_dependents(current, current_scope)
                .iter()
                .any(|(consumer, _)| !seen.contains(consumer))
        });
        if unexplored {
            return Err(DepthExceeded {
                producer: producer.to_string(),
                max_depth,
            });
        }
        Ok(result)
    }

    /// Groups of entities that depend on each other in a cycle.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut g: DiGraphMap<&str, ()> = DiGraphMap::new();
        for (consumer, edges) in &self.outgoing {
            for (producer, _) in edges.keys() {
                g.add_edge(producer.as_str(), consumer.as_str(), ());
            }
        }
        tarjan_scc(&g)
            .into_iter()
            .filter(|scc| scc.len() > 1 || g.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut ids: Vec<String> = scc.into_iter().map(str::to_string).collect();
                ids.sort();
                ids
            })
            .collect()
    }

    /// Merge collaborator reports into the graph.
    ///
    /// Must run single-threaded after parallel work is done. Each reported
    /// unit gets its outgoing edges rebuilt from scratch.
    pub fn commit_reports<'a>(&mut self, reports: impl IntoIterator<Item = &'a UnitReport>) {
        for report in reports {
            if !report.success {
                continue;
            }
            self.register_node(&report.unit, report.scope.clone(), report.generated);
            self.rebuild_edges_for(&report.unit);
            for dep in &report.dependencies {
                let scope = dep.scope.clone().unwrap_or_else(|| report.scope.clone());
                self.record_edge(&report.unit, &dep.id, dep.kind, scope);
            }
        }
    }
}

fn remove_nested(
    map: &mut BTreeMap<String, BTreeMap<EdgeKey, VersionScope>>,
    outer: &str,
    key: &EdgeKey,
) -> bool {
    let Some(inner) = map.get_mut(outer) else {
        return false;
    };
    let removed = inner.remove(key).is_some();
    if inner.is_empty() {
        map.remove(outer);
    }
    removed
}

/// Flat on-disk form of the graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct GraphSnapshot {
    #[serde(default)]
    nodes: BTreeMap<String, NodeInfo>,
    #[serde(default)]
    edges: Vec<DependencyEdge>,
}

impl From<GraphSnapshot> for DependencyGraph {
    fn from(snapshot: GraphSnapshot) -> Self {
        let mut graph = DependencyGraph {
            nodes: snapshot.nodes,
            ..DependencyGraph::default()
        };
        for edge in snapshot.edges {
            graph.record_edge(&edge.consumer, &edge.producer, edge.kind, edge.scope);
        }
        graph
    }
}

impl From<DependencyGraph> for GraphSnapshot {
    fn from(graph: DependencyGraph) -> Self {
        let edges = graph.edges();
        GraphSnapshot {
            nodes: graph.nodes,
            edges,
        }
    }
}
