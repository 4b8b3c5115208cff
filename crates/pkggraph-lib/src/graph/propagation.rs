//! Moving requirement information down the graph, from dependencies towards the root.
//!
//! Every node keeps in `transitive_deps` the dependencies it can see. When a requirement is
//! resolved it is recorded in the node declaring it and then transformed through each
//! dependant edge so consumers further down learn about it too. Doing the same lookups before
//! linking a new requirement is how diamonds, conflicts and loops are detected.
//!
//! The walks only ever follow a single dependant. While a graph is being expanded depth first
//! the node being expanded and all its ancestors have exactly one dependant; when closing a
//! diamond the edge to follow is given explicitly.

use petgraph::prelude::*;

use crate::config::SelfRequirePolicy;
use crate::model::*;
use super::*;

/// An existing requirement for the same dependency, found downstream of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownstreamMatch {
	/// `None` when the requirement points back to a node of its own chain, a loop.
	pub require: Option<RequireId>,
	/// The node the existing requirement resolved to, if it was already expanded.
	pub node: Option<NodeIndex>,
	/// The node holding the existing requirement.
	pub base: NodeIndex,
}

impl DepsGraph {
	fn single_dependant(&self, node: NodeIndex) -> Result<Option<EdgeIndex>, GraphError> {
		match self.dependants(node) {
			Dependants::None => Ok(None),
			Dependants::Single(edge) => Ok(Some(edge)),
			Dependants::Multiple(edges) => Err(GraphError::AmbiguousPropagation {
				node: self.graph[node].label(),
				count: edges.len(),
			}),
		}
	}

	fn edge_parts(&self, edge: EdgeIndex) -> Result<(NodeIndex, RequireId), GraphError> {
		let (src, _, require) = self.edge(edge).ok_or_else(|| GraphError::AmbiguousPropagation {
			node: format!("edge {}", edge.index()),
			count: 0,
		})?;
		Ok((src, require))
	}

	/// Looks for a requirement of the same dependency downstream of `node`, without modifying anything.
	///
	/// The requirement is transformed as it goes through each dependant edge so it is compared in the
	/// terms each node sees it. The match closest to the root wins. A requirement naming one of the
	/// nodes in its own chain is reported with `require == None`, unless it switches to the build
	/// context, changes version in the build context or is invisible and the policy exempts it.
	pub fn check_downstream_exists(&self, node: NodeIndex, require: RequireId) -> Result<Option<DownstreamMatch>, GraphError> {
		let mut current = node;
		let mut down = self.requirement(require).clone();
		let mut identity = Some(require);
		let mut result: Option<DownstreamMatch> = None;
		loop {
			let n = &self.graph[current];
			if let Some(reference) = &n.reference {
				if down.reference.name == reference.name {
					let switches_context = down.build && (n.context == Context::Host || down.reference.version != reference.version);
					let exempt = !down.visible() && self.self_require_policy == SelfRequirePolicy::ExemptInvisible;
					if !switches_context && !exempt {
						log::trace!("{} requires its own name {}", n.label(), down.reference);
						return Ok(Some(DownstreamMatch { require: None, node: Some(current), base: current }));
					}
				}
			}

			if let Some(prev) = n.transitive_deps.get(&down.key()) {
				if identity != Some(prev.require) || prev.node.is_some() {
					result = Some(DownstreamMatch { require: Some(prev.require), node: prev.node, base: current });
				}
			}

			if n.is_vendor() {
				return Ok(result);
			}
			let Some(edge) = self.single_dependant(current)? else {
				return Ok(result);
			};
			let (src, edge_require) = self.edge_parts(edge)?;
			match self.requirement(edge_require).transform_downstream(n.package_type, &down, None) {
				None => return Ok(result),
				Some(mut next) => {
					next.defining_require = down.defining_require;
					down = next;
					identity = None;
					current = src;
				},
			}
		}
	}

	/// Records that `require`, held by `node`, resolved to `resolved` and pushes the information to
	/// the consumers of `node`.
	///
	/// `src_node` picks the dependant to continue through when `node` has several, which only
	/// happens when closing a diamond.
	pub fn propagate_downstream(&mut self, node: NodeIndex, require: RequireId, resolved: NodeIndex, src_node: Option<NodeIndex>) -> Result<(), GraphError> {
		let mut current = node;
		let mut require = require;
		let mut src_node = src_node;
		loop {
			let key = self.requirement(require).key();
			let existing = self.graph[current].transitive_deps.get(&key).copied();
			let mut ill_formed = false;
			if let Some(existing) = existing.filter(|e| e.require != require) {
				if let Some(existing_node) = existing.node {
					if self.graph[existing_node].reference != self.graph[resolved].reference {
						return Err(GraphError::Conflict {
							node: current,
							node_ref: self.graph[current].reference.clone(),
							require: self.requirement(require).reference.clone(),
							prev_node: Some(existing_node),
							prev_require: self.requirement(existing.require).reference.clone(),
							base_previous: resolved,
							base_previous_ref: self.graph[resolved].reference.clone(),
						});
					}
				}

				let old = self.requirement(existing.require).clone();
				let (new_direct, new_visible, new_reference) = {
					let new = self.requirement(require);
					(new.direct, new.visible(), new.reference.clone())
				};
				ill_formed = (new_direct || old.direct) && new_visible != old.visible();
				if ill_formed {
					let label = self.graph[current].label();
					log::warn!("{} requires {} with different visibility", label, new_reference);
					self.visibility_conflicts.entry(new_reference).or_default().insert(label);
				}

				self.requirement_mut(require).aggregate(&old);
				let new_reference = self.requirement(require).reference.clone();
				if old.is_override && old.reference != new_reference {
					let overriden = self.requirement_mut(existing.require);
					overriden.overriden_ref = Some(overriden.reference.clone());
					overriden.override_ref = Some(new_reference);
				}
			}

			debug_assert!(self.requirement(require).version_range().is_none(), "ranges are resolved before propagation");
			/* Replacing keeps the original insertion position */
			self.graph[current].transitive_deps.insert(key, TransitiveRequirement { require, node: Some(resolved) });

			if ill_formed {
				self.prune_unreferenced_edges(current);
			}

			if self.graph[current].is_vendor() {
				return Ok(());
			}

			let edge = match src_node {
				Some(src) => self.dependant_edges(current).into_iter()
					.find(|e| self.edge(*e).map(|(s, _, _)| s == src).unwrap_or(false)),
				None => self.single_dependant(current)?,
			};
			let Some(edge) = edge else {
				return Ok(());
			};
			let (src, edge_require) = self.edge_parts(edge)?;

			let pkg_type = self.graph[current].package_type;
			let dep_pkg_type = self.graph[resolved].package_type;
			let propagated = self.requirement(require);
			let Some(mut down) = self.requirement(edge_require).transform_downstream(pkg_type, propagated, Some(dep_pkg_type)) else {
				return Ok(());
			};
			down.defining_require = propagated.defining_require;
			/* Nodes that need files keep requiring what they required, the rest can be skipped */
			if down.files() {
				down.required_nodes.extend(propagated.required_nodes.iter().copied());
			}
			down.required_nodes.insert(current);
			log::trace!("Propagating {} from {} to {}", down.reference, self.graph[current].label(), self.graph[src].label());

			require = self.add_requirement(down);
			current = src;
			src_node = None;
		}
	}

	/// Removes the edges of `node` that no direct requirement refers to anymore.
	///
	/// The edges to keep are decided on a snapshot first, then the rest are removed.
	fn prune_unreferenced_edges(&mut self, node: NodeIndex) {
		let referenced: Vec<NodeIndex> = self.graph[node].transitive_deps.values()
			.filter(|t| self.requirement(t.require).direct)
			.filter_map(|t| t.node)
			.collect();
		let orphaned: Vec<EdgeIndex> = self.edges(node).into_iter()
			.filter(|e| self.edge(*e).map(|(_, dst, _)| !referenced.contains(&dst)).unwrap_or(false))
			.collect();
		for edge in orphaned {
			log::debug!("Pruning orphaned edge of {}", self.graph[node].label());
			self.remove_edge(edge);
		}
	}

	/// Propagates after linking `node` to an already existing `prev_node`.
	///
	/// Besides the new requirement itself, everything `prev_node` already depends on now also
	/// reaches the consumers of `node`.
	pub fn propagate_closing_loop(&mut self, node: NodeIndex, require: RequireId, prev_node: NodeIndex) -> Result<(), GraphError> {
		self.propagate_downstream(node, require, prev_node, None)?;

		let snapshot: Vec<TransitiveRequirement> = self.graph[prev_node].transitive_deps.values().copied().collect();
		for transitive in snapshot {
			if self.requirement(transitive.require).is_override {
				continue;
			}
			let Some(resolved) = transitive.node else {
				continue;
			};
			self.propagate_downstream(prev_node, transitive.require, resolved, Some(node))?;
		}
		Ok(())
	}

	/// Walks the dependants of `node` looking for a second occurrence of `new_node`'s reference
	/// in the same context, which would make a true cycle.
	pub fn check_loops(&self, node: NodeIndex, new_node: NodeIndex) -> Result<Option<NodeIndex>, GraphError> {
		let new = &self.graph[new_node];
		let mut count = 0;
		let mut current = node;
		loop {
			let n = &self.graph[current];
			let same_reference = match (&n.reference, &new.reference) {
				(Some(a), Some(b)) => a.same_identity(b),
				_ => false,
			};
			if same_reference && n.context == new.context {
				if count >= 1 {
					return Ok(Some(current));
				}
				count += 1;
			}
			let Some(edge) = self.single_dependant(current)? else {
				return Ok(None);
			};
			current = self.edge_parts(edge)?.0;
		}
	}
}
