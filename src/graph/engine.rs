//! The declaration graph.
//!
//! Uses petgraph to own every declaration of one analysis run and the
//! references recorded between them once they load. Indexes give fast
//! lookup by simple name, full name, graph key and location.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

use super::types::*;
use crate::error::Result;
use crate::model::{DeclId, Declaration, DeclarationKind, Member, Provenance};

/// Graph key: full name, generic arity and origin.
type DeclarationKey = (String, usize, String);

/// Owns all declarations of one run, plus their lookup indexes.
#[derive(Debug, Default)]
pub struct DeclarationGraph {
    graph: DiGraph<Declaration, EdgeData>,
    /// Index: simple name -> nodes.
    name_index: HashMap<String, Vec<NodeIndex>>,
    /// Index: full name -> nodes, in registration order.
    full_name_index: HashMap<String, Vec<NodeIndex>>,
    /// Index: (full name, arity, location) -> node.
    qualified_index: HashMap<DeclarationKey, NodeIndex>,
    /// Index: location -> nodes, in registration order.
    location_index: HashMap<String, Vec<NodeIndex>>,
}

impl DeclarationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Node Operations ────────────────────────────────────────

    /// Register a declaration. When its key is already taken the existing
    /// node is kept and returned.
    pub fn add(&mut self, declaration: Declaration) -> DeclId {
        let key = (
            declaration.full_name().to_string(),
            declaration.generic_arity(),
            declaration.location().to_string(),
        );
        if let Some(&idx) = self.qualified_index.get(&key) {
            trace!(declaration = %declaration, "already registered");
            return DeclId(idx);
        }

        let name = declaration.name().to_string();
        let location = declaration.location().to_string();
        debug!(declaration = %declaration, location = %location, "registering declaration");
        let idx = self.graph.add_node(declaration);

        self.name_index.entry(name).or_default().push(idx);
        self.full_name_index.entry(key.0.clone()).or_default().push(idx);
        self.location_index.entry(location).or_default().push(idx);
        self.qualified_index.insert(key, idx);
        DeclId(idx)
    }

    /// The declaration behind `id`. Ids are only handed out by this graph.
    pub fn get(&self, id: DeclId) -> &Declaration {
        &self.graph[id.0]
    }

    pub(crate) fn get_mut(&mut self, id: DeclId) -> &mut Declaration {
        &mut self.graph[id.0]
    }

    /// Attach a side-data payload. Fails when the kind is already stored.
    pub fn set_data<T: Any>(&mut self, id: DeclId, value: T) -> Result<()> {
        self.get_mut(id).set_data(value)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// All declarations, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (DeclId, &Declaration)> {
        self.graph
            .node_indices()
            .map(move |idx| (DeclId(idx), &self.graph[idx]))
    }

    pub fn ids(&self) -> Vec<DeclId> {
        self.graph.node_indices().map(DeclId).collect()
    }

    // ─── Edge Operations ────────────────────────────────────────

    /// Record an edge for every reference of a loaded declaration.
    pub(crate) fn record_references(&mut self, id: DeclId) {
        let mut seen: HashSet<(EdgeKind, NodeIndex)> = self
            .graph
            .edges_directed(id.0, Direction::Outgoing)
            .map(|edge| (edge.weight().kind, edge.target()))
            .collect();
        let references = self.get(id).references();
        for (kind, target) in references {
            if seen.insert((kind, target.0)) {
                self.graph.add_edge(id.0, target.0, EdgeData::new(kind));
            }
        }
    }

    // ─── Query Operations ───────────────────────────────────────

    /// Every declaration with this full name, across arities and locations.
    pub fn find(&self, full_name: &str) -> Vec<DeclId> {
        self.full_name_index
            .get(full_name)
            .map(|indexes| indexes.iter().copied().map(DeclId).collect())
            .unwrap_or_default()
    }

    /// The declaration registered under exactly this key.
    pub fn find_qualified(&self, full_name: &str, generic_arity: usize, location: &str) -> Option<DeclId> {
        self.qualified_index
            .get(&(full_name.to_string(), generic_arity, location.to_string()))
            .copied()
            .map(DeclId)
    }

    /// Best match for a full name and arity: the one from `prefer_location`
    /// if there is one, otherwise the first registered.
    pub fn lookup(&self, full_name: &str, generic_arity: usize, prefer_location: Option<&str>) -> Option<DeclId> {
        if let Some(location) = prefer_location {
            if let Some(id) = self.find_qualified(full_name, generic_arity, location) {
                return Some(id);
            }
        }
        self.full_name_index
            .get(full_name)?
            .iter()
            .copied()
            .find(|&idx| self.graph[idx].generic_arity() == generic_arity)
            .map(DeclId)
    }

    /// Search simple names: exact matches, then prefix, then substring
    /// (case-insensitive). Returns up to `limit` results.
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        let query_lower = query.to_lowercase();

        let mut scored: Vec<(usize, &str, NodeIndex)> = self
            .name_index
            .iter()
            .filter_map(|(name, indexes)| {
                let name_lower = name.to_lowercase();
                let score = if name == query {
                    0
                } else if name_lower.starts_with(&query_lower) {
                    1
                } else if name_lower.contains(&query_lower) {
                    2
                } else {
                    return None;
                };
                Some(indexes.iter().map(move |&idx| (score, name.as_str(), idx)))
            })
            .flatten()
            .collect();

        scored.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(b.1)).then(a.2.cmp(&b.2)));

        scored
            .into_iter()
            .take(limit)
            .map(|(_, _, idx)| self.search_result(idx))
            .collect()
    }

    /// Declarations registered from one origin, in registration order.
    pub fn declarations_in(&self, location: &str) -> Vec<DeclId> {
        self.location_index
            .get(location)
            .map(|indexes| indexes.iter().copied().map(DeclId).collect())
            .unwrap_or_default()
    }

    /// Loaded declarations listing `id` as a base class or interface.
    pub fn extended_by(&self, id: DeclId) -> Vec<DeclId> {
        let mut out: Vec<DeclId> = self
            .graph
            .edges_directed(id.0, Direction::Incoming)
            .filter(|edge| edge.weight().kind == EdgeKind::Extends)
            .map(|edge| DeclId(edge.source()))
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Who refers to this declaration.
    pub fn dependents(&self, id: DeclId) -> Vec<DependencyInfo> {
        self.graph
            .edges_directed(id.0, Direction::Incoming)
            .map(|edge| self.dependency_info(edge.source(), edge.weight().kind))
            .collect()
    }

    /// What this declaration refers to. Empty until it is loaded.
    pub fn dependencies(&self, id: DeclId) -> Vec<DependencyInfo> {
        self.graph
            .edges_directed(id.0, Direction::Outgoing)
            .map(|edge| self.dependency_info(edge.target(), edge.weight().kind))
            .collect()
    }

    /// Loaded declarations carrying an attribute whose type has this full name.
    pub fn with_attribute(&self, attribute_full_name: &str) -> Vec<DeclId> {
        self.iter()
            .filter(|(_, declaration)| {
                declaration.attributes().iter().any(|attribute| {
                    attribute
                        .declaration
                        .declaration()
                        .is_some_and(|target| self.get(target).full_name() == attribute_full_name)
                })
            })
            .map(|(id, _)| id)
            .collect()
    }

    // ─── Stats ──────────────────────────────────────────────────

    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            total_declarations: self.graph.node_count(),
            total_edges: self.graph.edge_count(),
            locations: self.location_index.len(),
            ..GraphStats::default()
        };

        for declaration in self.graph.node_weights() {
            if declaration.is_loaded() {
                stats.loaded_declarations += 1;
            }
            match declaration.kind() {
                DeclarationKind::Class => stats.classes += 1,
                DeclarationKind::Interface => stats.interfaces += 1,
                DeclarationKind::Struct => stats.structs += 1,
                DeclarationKind::Enum => stats.enums += 1,
            }
            match declaration.provenance() {
                Provenance::Syntax => stats.from_syntax += 1,
                Provenance::Metadata(_) => stats.from_metadata += 1,
            }
        }
        stats
    }

    /// Snapshot of a declaration's shape for external consumers.
    pub fn summary(&self, id: DeclId) -> DeclarationSummary {
        let declaration = self.get(id);
        let generic_parameters = declaration
            .generic_parameters()
            .iter()
            .map(|parameter| {
                if parameter.constraints.is_empty() {
                    parameter.name.clone()
                } else {
                    let constraints: Vec<String> =
                        parameter.constraints.iter().map(|c| c.display(self)).collect();
                    format!("{} : {}", parameter.name, constraints.join(", "))
                }
            })
            .collect();

        let members = declaration
            .members()
            .iter()
            .map(|member: &Member| MemberSummary {
                kind: member.kind_name().to_string(),
                name: member.name().to_string(),
                signature: member.signature(self),
                attributes: member
                    .attributes()
                    .iter()
                    .map(|a| a.syntax.text().to_string())
                    .collect(),
            })
            .collect();

        DeclarationSummary {
            kind: declaration.kind(),
            full_name: declaration.full_name().to_string(),
            location: declaration.location().to_string(),
            provenance: match declaration.provenance() {
                Provenance::Syntax => "syntax".to_string(),
                Provenance::Metadata(_) => "metadata".to_string(),
            },
            loaded: declaration.is_loaded(),
            generic_parameters,
            extends: declaration.extends().iter().map(|e| e.display(self)).collect(),
            members,
            attributes: declaration
                .attributes()
                .iter()
                .map(|a| a.syntax.text().to_string())
                .collect(),
        }
    }

    // ─── Internal Helpers ───────────────────────────────────────

    fn search_result(&self, idx: NodeIndex) -> SearchResult {
        let declaration = &self.graph[idx];
        SearchResult {
            id: DeclId(idx),
            full_name: declaration.full_name().to_string(),
            kind: declaration.kind(),
            generic_arity: declaration.generic_arity(),
            location: declaration.location().to_string(),
        }
    }

    fn dependency_info(&self, idx: NodeIndex, relationship: EdgeKind) -> DependencyInfo {
        let declaration = &self.graph[idx];
        DependencyInfo {
            id: DeclId(idx),
            full_name: declaration.full_name().to_string(),
            kind: declaration.kind(),
            location: declaration.location().to_string(),
            relationship,
        }
    }
}
