use std::collections::{BTreeMap, BTreeSet, HashSet};
use petgraph::prelude::*;
use serde::{Serialize, Deserialize};

use crate::config::SelfRequirePolicy;
use crate::model::*;
use super::*;

/// An option value that differs between the resolved node and a requirement closing a diamond onto it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionsConflict {
	pub value: String,
	/// Requirer and the value it asked for.
	pub conflicts: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct DepsGraph {
	pub(super) graph: StableDiGraph<Node, Edge>,
	pub(super) requires: Vec<Requirement>,
	edge_seq: usize,
	pub(super) self_require_policy: SelfRequirePolicy,
	pub aliased: BTreeMap<String, String>,
	/// Range requirement text to the reference it resolved to.
	pub resolved_ranges: BTreeMap<String, String>,
	pub replaced_requires: BTreeMap<String, String>,
	/// Node reference to option name to conflict.
	pub options_conflicts: BTreeMap<String, BTreeMap<String, OptionsConflict>>,
	/// Dependency reference to the nodes requiring it with different visibility.
	pub visibility_conflicts: BTreeMap<RecipeReference, BTreeSet<String>>,
	pub error: Option<GraphError>,
}

impl DepsGraph {
	pub fn new(self_require_policy: SelfRequirePolicy) -> Self {
		DepsGraph {
			self_require_policy,
			..Default::default()
		}
	}

	pub fn root(&self) -> Option<NodeIndex> {
		self.graph.node_indices().next()
	}

	/// Nodes in insertion order.
	pub fn nodes(&self) -> Vec<NodeIndex> {
		self.graph.node_indices().collect()
	}

	pub fn len(&self) -> usize {
		self.graph.node_count()
	}

	pub fn is_empty(&self) -> bool {
		self.graph.node_count() == 0
	}

	pub fn node(&self, index: NodeIndex) -> &Node {
		&self.graph[index]
	}

	pub fn node_mut(&mut self, index: NodeIndex) -> &mut Node {
		&mut self.graph[index]
	}

	pub fn requirement(&self, id: RequireId) -> &Requirement {
		&self.requires[id.0]
	}

	pub fn requirement_mut(&mut self, id: RequireId) -> &mut Requirement {
		&mut self.requires[id.0]
	}

	/// Stores a requirement, a requirement without a defining requirement defines itself.
	pub fn add_requirement(&mut self, mut requirement: Requirement) -> RequireId {
		let id = RequireId(self.requires.len());
		requirement.defining_require.get_or_insert(id);
		self.requires.push(requirement);
		id
	}

	pub fn add_node(&mut self, node: Node) -> NodeIndex {
		log::trace!("Adding node {}", node.label());
		self.graph.add_node(node)
	}

	pub fn add_edge(&mut self, src: NodeIndex, dst: NodeIndex, require: RequireId) -> EdgeIndex {
		let seq = self.edge_seq;
		self.edge_seq += 1;
		self.graph.add_edge(src, dst, Edge { require, seq })
	}

	pub fn remove_edge(&mut self, edge: EdgeIndex) {
		self.graph.remove_edge(edge);
	}

	pub fn edge(&self, edge: EdgeIndex) -> Option<(NodeIndex, NodeIndex, RequireId)> {
		let (src, dst) = self.graph.edge_endpoints(edge)?;
		Some((src, dst, self.graph[edge].require))
	}

	fn sorted_edges(&self, node: NodeIndex, direction: petgraph::Direction) -> Vec<EdgeIndex> {
		let mut edges: Vec<(usize, EdgeIndex)> = self.graph.edges_directed(node, direction)
			.map(|e| (e.weight().seq, e.id()))
			.collect();
		edges.sort();
		edges.into_iter().map(|(_, e)| e).collect()
	}

	/// Outgoing edges in creation order.
	pub fn edges(&self, node: NodeIndex) -> Vec<EdgeIndex> {
		self.sorted_edges(node, Outgoing)
	}

	pub fn dependant_edges(&self, node: NodeIndex) -> Vec<EdgeIndex> {
		self.sorted_edges(node, Incoming)
	}

	pub fn dependants(&self, node: NodeIndex) -> Dependants {
		let mut edges = self.dependant_edges(node);
		match edges.len() {
			0 => Dependants::None,
			1 => Dependants::Single(edges.remove(0)),
			_ => Dependants::Multiple(edges),
		}
	}

	/// Direct dependencies.
	pub fn neighbors(&self, node: NodeIndex) -> Vec<NodeIndex> {
		self.edges(node).into_iter()
			.filter_map(|e| self.graph.edge_endpoints(e).map(|(_, dst)| dst))
			.collect()
	}

	/// Direct consumers.
	pub fn inverse_neighbors(&self, node: NodeIndex) -> Vec<NodeIndex> {
		self.dependant_edges(node).into_iter()
			.filter_map(|e| self.graph.edge_endpoints(e).map(|(src, _)| src))
			.collect()
	}

	/// Every node reachable from `node`, including itself.
	pub fn subgraph(&self, node: NodeIndex) -> Vec<NodeIndex> {
		let mut seen = HashSet::new();
		let mut result = Vec::new();
		let mut dfs = Dfs::new(&self.graph, node);
		while let Some(n) = dfs.next(&self.graph) {
			if seen.insert(n) {
				result.push(n);
			}
		}
		result
	}

	/// Groups nodes so every node only depends on nodes of earlier levels.
	///
	/// Nodes inside a level are sorted by reference text then package id.
	pub fn by_levels(&self) -> Vec<Vec<NodeIndex>> {
		let mut result: Vec<Vec<NodeIndex>> = Vec::new();
		let mut opened: indexmap::IndexSet<NodeIndex> = self.graph.node_indices().collect();
		while !opened.is_empty() {
			let mut level: Vec<NodeIndex> = opened.iter()
				.copied()
				.filter(|n| !self.neighbors(*n).iter().any(|d| opened.contains(d)))
				.collect();
			if level.is_empty() {
				/* Only possible with a cycle, which resolution already reported */
				log::warn!("Dependency cycle among {} nodes, leveling them together", opened.len());
				level = opened.iter().copied().collect();
			}
			level.sort_by(|a, b| self.graph[*a].sort_key().cmp(&self.graph[*b].sort_key()));
			for n in &level {
				opened.shift_remove(n);
			}
			result.push(level);
		}
		result
	}

	/// Nodes in dependency first order.
	pub fn ordered_iterate(&self) -> Vec<NodeIndex> {
		self.by_levels().into_iter().flatten().collect()
	}

	pub fn report_graph_error(&self) -> Result<(), GraphError> {
		match &self.error {
			Some(error) => Err(error.clone()),
			None => Ok(()),
		}
	}

	pub fn overrides(&self) -> Overrides {
		Overrides::create(self, self.graph.node_indices())
	}

	/// Overrides that affected the dependencies of `node`.
	pub fn node_overrides(&self, node: NodeIndex) -> Overrides {
		Overrides::create(self, self.subgraph(node))
	}

	fn serialize_node(&self, index: NodeIndex) -> serde_json::Value {
		let node = &self.graph[index];
		let mut dependencies = serde_json::Map::new();
		for transitive in node.transitive_deps.values() {
			if let Some(dep) = transitive.node {
				dependencies.insert(dep.index().to_string(), serde_json::to_value(self.requirement(transitive.require).serialize()).unwrap_or_default());
			}
		}
		let reference = node.reference.as_ref();
		serde_json::json!({
			"ref": node.label(),
			"id": index.index().to_string(),
			"recipe": node.recipe_status,
			"package_id": node.package_id(),
			"prev": node.prev,
			"rrev": reference.and_then(|r| r.revision.clone()),
			"rrev_timestamp": reference.and_then(|r| r.timestamp.clone()),
			"remote": node.remote,
			"binary_remote": node.binary_remote,
			"binary": node.binary,
			"invalid": node.recipe.invalid,
			"name": reference.map(|r| r.name.clone()),
			"version": reference.map(|r| r.version.to_string()),
			"user": reference.and_then(|r| r.user.clone()),
			"channel": reference.and_then(|r| r.channel.clone()),
			"package_type": node.package_type,
			"settings": node.settings,
			"options": node.options,
			"info": node.info,
			"context": node.context,
			"test": node.test,
			"vendor": node.recipe.vendor,
			"skipped_build_requires": node.skipped_build_requires,
			"replaced_requires": node.replaced_requires,
			"dependencies": dependencies,
		})
	}

	/// The `graph info` JSON document.
	pub fn serialize(&self) -> serde_json::Value {
		let mut nodes = serde_json::Map::new();
		for index in self.graph.node_indices() {
			nodes.insert(index.index().to_string(), self.serialize_node(index));
		}
		let mut root = serde_json::Map::new();
		if let Some(r) = self.root() {
			root.insert(r.index().to_string(), self.graph[r].label().into());
		}
		let visibility: BTreeMap<String, &BTreeSet<String>> = self.visibility_conflicts.iter()
			.map(|(k, v)| (k.repr_notime(), v))
			.collect();
		serde_json::json!({
			"nodes": nodes,
			"root": root,
			"overrides": self.overrides().serialize(),
			"resolved_ranges": self.resolved_ranges,
			"replaced_requires": self.replaced_requires,
			"options_conflicts": self.options_conflicts,
			"visibility_conflicts": visibility,
			"error": self.error.as_ref().map(|e| e.serialize()),
		})
	}

	/// Graphviz rendering, nodes labelled by reference and edges by the required reference.
	pub fn to_dot(&self) -> String {
		let labelled: StableDiGraph<String, String> = self.graph.map(
			|_, node| node.label(),
			|_, edge| self.requirement(edge.require).reference.to_string(),
		);
		format!("{}", petgraph::dot::Dot::new(&labelled))
	}
}
