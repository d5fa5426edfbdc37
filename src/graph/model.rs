//! Graph model
//!
//! A graph is validated once at construction:
//! - node and edge ids are unique
//! - every edge connects two existing nodes
//! - the graph is acyclic
//! - probabilities lie in [0, 1]
//!
//! After construction the graph is read-only except for derived-field
//! annotation on edges.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use super::condition::Condition;
use super::errors::{GraphError, GraphResult};
use crate::dsl::NodeId;
use crate::observability::{log_event_with_fields, Event};

/// A conversion step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Marks a cohort entry point (anchor candidate)
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub entry: bool,
}

impl Node {
    pub fn new(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            label: None,
            entry: false,
        }
    }

    pub fn entry(id: impl Into<NodeId>) -> Self {
        Self {
            entry: true,
            ..Self::new(id)
        }
    }
}

/// Nominal edge probability and the parameter backing it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeProbability {
    pub mean: f64,
    /// Parameter id whose slices hold this edge's evidence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// One `conditional_p` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalBranch {
    pub condition: Condition,
    pub p: f64,
}

/// Fields the engine derives and writes back onto an edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeAnnotations {
    /// Canonical query after MSMDC discrimination
    pub generated_query: String,
    /// Cohort anchor resolved from the graph
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<NodeId>,
    /// Connection whose capabilities shaped the query
    pub connection: String,
    /// coreHash of the compiled query
    pub signature: String,
    /// True if MSMDC left some alternate undiscriminated
    #[serde(default)]
    pub ambiguous: bool,
}

/// A transition between two steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub from: NodeId,
    pub to: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p: Option<EdgeProbability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_query: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditional_p: Vec<ConditionalBranch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived: Option<EdgeAnnotations>,
}

impl Edge {
    pub fn new(id: impl Into<String>, from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            from: from.into(),
            to: to.into(),
            p: None,
            query: None,
            n_query: None,
            conditional_p: Vec::new(),
            derived: None,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_n_query(mut self, n_query: impl Into<String>) -> Self {
        self.n_query = Some(n_query.into());
        self
    }

    pub fn with_probability(mut self, mean: f64, parameter_id: Option<&str>) -> Self {
        self.p = Some(EdgeProbability {
            mean,
            id: parameter_id.map(str::to_string),
        });
        self
    }

    pub fn with_branch(mut self, condition: Condition, p: f64) -> Self {
        self.conditional_p.push(ConditionalBranch { condition, p });
        self
    }

    /// Parameter id backing this edge, if any
    pub fn parameter_id(&self) -> Option<&str> {
        self.p.as_ref().and_then(|p| p.id.as_deref())
    }
}

/// Serialized form of a graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Validated, acyclic conversion graph
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: BTreeMap<NodeId, Node>,
    edges: Vec<Edge>,
    edge_index: HashMap<String, usize>,
    successors: BTreeMap<NodeId, BTreeSet<NodeId>>,
    predecessors: BTreeMap<NodeId, BTreeSet<NodeId>>,
    topo_order: Vec<NodeId>,
    topo_rank: HashMap<NodeId, usize>,
}

impl Graph {
    /// Builds and validates a graph
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> GraphResult<Self> {
        let mut node_map = BTreeMap::new();
        for node in nodes {
            if node_map.contains_key(&node.id) {
                return Err(GraphError::DuplicateId {
                    kind: "node",
                    id: node.id,
                });
            }
            node_map.insert(node.id.clone(), node);
        }

        let mut edge_index = HashMap::new();
        let mut successors: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
        let mut predecessors: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();

        for (i, edge) in edges.iter().enumerate() {
            if edge_index.insert(edge.id.clone(), i).is_some() {
                return Err(GraphError::DuplicateId {
                    kind: "edge",
                    id: edge.id.clone(),
                });
            }
            for endpoint in [&edge.from, &edge.to] {
                if !node_map.contains_key(endpoint) {
                    return Err(GraphError::DanglingEdge {
                        edge: edge.id.clone(),
                        node: endpoint.clone(),
                    });
                }
            }
            check_probability(&edge.id, edge.p.as_ref().map(|p| p.mean))?;
            for branch in &edge.conditional_p {
                check_probability(&edge.id, Some(branch.p))?;
            }
            successors
                .entry(edge.from.clone())
                .or_default()
                .insert(edge.to.clone());
            predecessors
                .entry(edge.to.clone())
                .or_default()
                .insert(edge.from.clone());
        }

        let topo_order = topological_sort(&node_map, &successors, &predecessors)?;
        let topo_rank = topo_order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        Ok(Self {
            nodes: node_map,
            edges,
            edge_index,
            successors,
            predecessors,
            topo_order,
            topo_rank,
        })
    }

    /// Builds a graph from a deserialized document
    pub fn from_document(document: GraphDocument) -> GraphResult<Self> {
        Self::new(document.nodes, document.edges)
    }

    /// Parses and validates a JSON graph document
    pub fn from_json(json: &str) -> GraphResult<Self> {
        let raw: serde_json::Value =
            serde_json::from_str(json).map_err(|e| GraphError::InvalidDocument(e.to_string()))?;
        check_conditions(&raw)?;
        let document: GraphDocument =
            serde_json::from_value(raw).map_err(|e| GraphError::InvalidDocument(e.to_string()))?;
        let graph = Self::from_document(document)?;
        log_event_with_fields(
            Event::GraphLoaded,
            &[
                ("nodes", &graph.nodes.len().to_string()),
                ("edges", &graph.edges.len().to_string()),
            ],
        );
        Ok(graph)
    }

    /// Serializes back to a document (including derived annotations)
    pub fn to_document(&self) -> GraphDocument {
        GraphDocument {
            nodes: self.nodes.values().cloned().collect(),
            edges: self.edges.clone(),
        }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Returns an error naming the node if it does not exist
    pub fn require_node(&self, id: &str) -> GraphResult<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge(&self, id: &str) -> GraphResult<&Edge> {
        self.edge_index
            .get(id)
            .map(|&i| &self.edges[i])
            .ok_or_else(|| GraphError::UnknownEdge(id.to_string()))
    }

    /// Distinct successor nodes in id order
    pub fn successors(&self, id: &str) -> impl Iterator<Item = &NodeId> {
        self.successors.get(id).into_iter().flatten()
    }

    /// All edges joining `from` to `to` directly
    pub fn edges_between(&self, from: &str, to: &str) -> Vec<&Edge> {
        self.edges
            .iter()
            .filter(|e| e.from == from && e.to == to)
            .collect()
    }

    pub fn topological_order(&self) -> &[NodeId] {
        &self.topo_order
    }

    pub fn topo_rank(&self, id: &str) -> Option<usize> {
        self.topo_rank.get(id).copied()
    }

    /// All nodes with a directed path into `id` (excluding `id`)
    pub fn ancestors(&self, id: &str) -> BTreeSet<NodeId> {
        walk(&self.predecessors, id)
    }

    /// All nodes reachable from `id` (excluding `id`)
    pub fn descendants(&self, id: &str) -> BTreeSet<NodeId> {
        walk(&self.successors, id)
    }

    /// Returns true if a directed path leads from `from` to `to`
    pub fn reaches(&self, from: &str, to: &str) -> bool {
        from == to || self.descendants(from).contains(to)
    }

    /// Returns true if `node` is strictly upstream of `of`
    pub fn is_upstream(&self, node: &str, of: &str) -> bool {
        node != of && self.reaches(node, of)
    }

    /// Cohort entry points: flagged nodes, else nodes without predecessors
    pub fn entry_nodes(&self) -> Vec<&NodeId> {
        let flagged: Vec<&NodeId> = self
            .nodes
            .values()
            .filter(|n| n.entry)
            .map(|n| &n.id)
            .collect();
        if !flagged.is_empty() {
            return flagged;
        }
        self.nodes
            .keys()
            .filter(|id| self.predecessors.get(*id).map_or(true, |p| p.is_empty()))
            .collect()
    }

    /// Resolves the cohort anchor for a node.
    ///
    /// The anchor is the smallest-id entry node that is the node itself or
    /// one of its ancestors. Returns `None` if no entry node reaches it.
    pub fn resolve_anchor(&self, node: &str) -> GraphResult<Option<NodeId>> {
        self.require_node(node)?;
        let ancestors = self.ancestors(node);
        Ok(self
            .entry_nodes()
            .into_iter()
            .filter(|entry| entry.as_str() == node || ancestors.contains(*entry))
            .min()
            .cloned())
    }

    /// Writes derived fields onto an edge
    pub fn annotate_edge(&mut self, edge_id: &str, annotations: EdgeAnnotations) -> GraphResult<()> {
        let index = *self
            .edge_index
            .get(edge_id)
            .ok_or_else(|| GraphError::UnknownEdge(edge_id.to_string()))?;
        self.edges[index].derived = Some(annotations);
        Ok(())
    }
}

/// Migrates every branch condition up front so a failure names its edge
fn check_conditions(raw: &serde_json::Value) -> GraphResult<()> {
    let edges = raw.get("edges").and_then(|e| e.as_array());
    for edge in edges.into_iter().flatten() {
        let id = edge.get("id").and_then(|v| v.as_str()).unwrap_or_default();
        let branches = edge.get("conditional_p").and_then(|v| v.as_array());
        for (index, branch) in branches.into_iter().flatten().enumerate() {
            let condition = branch.get("condition").unwrap_or(&serde_json::Value::Null);
            Condition::migrate(condition).map_err(|source| GraphError::Condition {
                edge: id.to_string(),
                index,
                source,
            })?;
        }
    }
    Ok(())
}

fn check_probability(edge: &str, value: Option<f64>) -> GraphResult<()> {
    match value {
        Some(v) if !(0.0..=1.0).contains(&v) || v.is_nan() => Err(GraphError::InvalidProbability {
            edge: edge.to_string(),
            value: v,
        }),
        _ => Ok(()),
    }
}

fn walk(adjacency: &BTreeMap<NodeId, BTreeSet<NodeId>>, start: &str) -> BTreeSet<NodeId> {
    let mut seen = BTreeSet::new();
    let mut queue: VecDeque<&NodeId> = adjacency.get(start).into_iter().flatten().collect();
    while let Some(next) = queue.pop_front() {
        if seen.insert(next.clone()) {
            queue.extend(adjacency.get(next).into_iter().flatten());
        }
    }
    seen
}

/// Kahn's algorithm with an ordered ready set, so the order is deterministic
fn topological_sort(
    nodes: &BTreeMap<NodeId, Node>,
    successors: &BTreeMap<NodeId, BTreeSet<NodeId>>,
    predecessors: &BTreeMap<NodeId, BTreeSet<NodeId>>,
) -> GraphResult<Vec<NodeId>> {
    let mut in_degree: BTreeMap<&NodeId, usize> = nodes
        .keys()
        .map(|id| (id, predecessors.get(id).map_or(0, BTreeSet::len)))
        .collect();
    let mut ready: BTreeSet<&NodeId> = in_degree
        .iter()
        .filter(|(_, &d)| d == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(id) = ready.pop_first() {
        order.push(id.clone());
        for next in successors.get(id).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(next) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(next);
                }
            }
        }
    }

    if order.len() < nodes.len() {
        let stuck = in_degree
            .iter()
            .find(|(_, &d)| d > 0)
            .map(|(id, _)| (*id).clone())
            .unwrap_or_default();
        return Err(GraphError::Cycle { node: stuck });
    }

    Ok(order)
}
