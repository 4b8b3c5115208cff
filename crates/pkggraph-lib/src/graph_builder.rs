//! Expands a root node into a complete dependency graph.
//!
//! Requirements are expanded depth first in declaration order. Before a requirement is linked
//! the graph is searched downstream for an existing requirement of the same package, which either
//! closes a diamond onto an already resolved node, adopts an override, or is a conflict.

use std::collections::{BTreeMap, VecDeque};
use petgraph::prelude::*;

use crate::config::GraphConfig;
use crate::graph::*;
use crate::lockfile::Lockfile;
use crate::model::*;
use crate::provider::{RangeResolver, RecipeProvider};

struct Profiles<'a> {
	host: &'a Profile,
	build: &'a Profile,
}

impl<'a> Profiles<'a> {
	fn for_context(&self, context: Context) -> &'a Profile {
		match context {
			Context::Host => self.host,
			Context::Build => self.build,
		}
	}
}

pub struct GraphBuilder<'p> {
	provider: &'p dyn RecipeProvider,
	config: GraphConfig,
	range_resolver: RangeResolver,
}

impl<'p> GraphBuilder<'p> {
	pub fn new(provider: &'p dyn RecipeProvider) -> Self {
		Self {
			provider,
			config: GraphConfig::default(),
			range_resolver: RangeResolver::default(),
		}
	}

	pub fn config(mut self, config: GraphConfig) -> Self {
		self.range_resolver = RangeResolver::new(config.resolve_prereleases());
		self.config = config;
		self
	}

	/// Forgets the ranges resolved by previous graphs.
	pub fn reinit(&mut self) {
		self.range_resolver.reinit();
	}

	/// Loads the complete graph required by `root`.
	///
	/// Conflicts and loops don't fail the call, they are kept in [`DepsGraph::error`] together
	/// with the graph expanded so far. Missing recipes, unresolvable ranges, lockfile misses and
	/// package type violations are returned as errors.
	pub fn load_graph(&mut self, root: Node, profile_host: &Profile, profile_build: &Profile, lockfile: Option<&Lockfile>) -> crate::Result<DepsGraph> {
		log::info!("Loading graph for {}", root.label());
		let profiles = Profiles { host: profile_host, build: profile_build };
		let mut graph = DepsGraph::new(self.config.self_require_policy());

		let mut root = root;
		let requirements = Self::prepare_node(&mut root, &profiles, BTreeMap::new(), true)?;
		let root_index = graph.add_node(root);
		Self::attach_requires(&mut graph, root_index, requirements)?;

		let mut open: VecDeque<(RequireId, NodeIndex)> = self.initialize_requires(&mut graph, root_index, &profiles)?
			.into_iter()
			.map(|r| (r, root_index))
			.collect();

		while let Some((require, node)) = open.pop_front() {
			if graph.requirement(require).is_override {
				continue;
			}
			match self.expand_require(&mut graph, require, node, &profiles, lockfile) {
				Ok(Some(new_node)) => {
					if graph.node(new_node).is_vendor() && !self.config.vendor_expand() {
						log::debug!("Not expanding vendoring package {}", graph.node(new_node).label());
						continue;
					}
					let new_requires = self.initialize_requires(&mut graph, new_node, &profiles)?;
					for r in new_requires.into_iter().rev() {
						open.push_front((r, new_node));
					}
				},
				Ok(None) => {},
				Err(crate::Error::Graph(e)) if e.is_stored() => {
					log::warn!("Graph error: {}", e);
					graph.error = Some(e);
					break;
				},
				Err(e) => return Err(e),
			}
		}

		if graph.error.is_none() {
			Self::remove_overrides(&mut graph);
		}
		graph.resolved_ranges = self.range_resolver.resolved_ranges();
		log::info!("Graph loaded with {} nodes", graph.len());
		Ok(graph)
	}

	/* Settings, options and package type of a node, returns the requirements that apply to it */
	fn prepare_node(node: &mut Node, profiles: &Profiles, down_options: BTreeMap<String, String>, is_consumer: bool) -> crate::Result<Vec<Requirement>> {
		let profile = profiles.for_context(node.context);
		node.settings = profile.settings_for(&node.recipe.settings);

		let mut options = node.recipe.default_options.clone();
		options.extend(down_options);
		options.extend(profile.option_values(node.reference.as_ref(), is_consumer)?);
		node.options = options;

		node.package_type = node.recipe.package_type.deduce(&node.options);
		node.is_conf = node.package_type == PackageType::Configuration;

		let requirements = node.recipe.requirements(&node.settings, &node.options)?;
		if node.is_conf && !requirements.is_empty() {
			return Err(crate::Error::PackageType(format!("configuration package {} cannot have requirements", node.label())));
		}
		Ok(requirements)
	}

	fn attach_requires(graph: &mut DepsGraph, node: NodeIndex, requirements: Vec<Requirement>) -> crate::Result<()> {
		for requirement in requirements {
			let key = requirement.key();
			if graph.node(node).requires.contains_key(&key) {
				return Err(crate::Error::DuplicatedRequirement(format!("{} in {}", requirement.reference, graph.node(node).label())));
			}
			let id = graph.add_requirement(requirement);
			graph.node_mut(node).requires.insert(key, id);
		}
		Ok(())
	}

	/// Seeds `transitive_deps` with the requirements of `node` that will be expanded.
	fn initialize_requires(&self, graph: &mut DepsGraph, node: NodeIndex, profiles: &Profiles) -> crate::Result<Vec<RequireId>> {
		let declared: Vec<RequireId> = graph.node(node).requires.values().copied().collect();
		let mut result = Vec::new();
		for id in declared {
			let r = graph.requirement(id);
			/* Requirements affecting the package id are always expanded */
			if !r.visible() && r.package_id_mode.is_none() {
				if r.build && self.config.skip_build() {
					graph.node_mut(node).skipped_build_requires = true;
					continue;
				}
				if r.test && self.config.skip_test() {
					continue;
				}
			}
			Self::replace_require(graph, node, id, profiles)?;
			let key = graph.requirement(id).key();
			graph.node_mut(node).transitive_deps.insert(key, TransitiveRequirement { require: id, node: None });
			result.push(id);
		}
		Ok(result)
	}

	fn replace_require(graph: &mut DepsGraph, node: NodeIndex, require: RequireId, profiles: &Profiles) -> crate::Result<()> {
		let context = if graph.requirement(require).build { Context::Build } else { graph.node(node).context };
		let original = graph.requirement(require).reference.clone();
		let Some(replacement) = profiles.for_context(context).replacement(&original)? else {
			return Ok(());
		};
		/* A package replacing its own dependency would require itself */
		if graph.node(node).name() == Some(replacement.name.as_str()) {
			return Ok(());
		}
		log::debug!("Replacing requirement {} with {}", original, replacement);
		let (from, to) = (original.repr_notime(), replacement.repr_notime());
		graph.node_mut(node).replaced_requires.insert(from.clone(), to.clone());
		graph.replaced_requires.insert(from, to);
		graph.requirement_mut(require).reference = replacement;
		Ok(())
	}

	fn expand_require(&mut self, graph: &mut DepsGraph, require: RequireId, node: NodeIndex, profiles: &Profiles, lockfile: Option<&Lockfile>) -> crate::Result<Option<NodeIndex>> {
		log::trace!("Expanding {} from {}", graph.requirement(require).reference, graph.node(node).label());
		let mut prev_node = None;
		if let Some(previous) = graph.check_downstream_exists(node, require)? {
			let Some(prev_require) = previous.require else {
				return Err(GraphError::Loop {
					node: graph.node(node).label(),
					require: graph.requirement(require).reference.clone(),
					ancestor: previous.node.map(|n| graph.node(n).label()).unwrap_or_default(),
				}.into());
			};
			prev_node = previous.node;
			let prev = graph.requirement(prev_require).clone();
			let prev_ref = match previous.node {
				Some(n) => graph.node(n).reference.clone().unwrap_or_else(|| prev.reference.clone()),
				None => prev.reference.clone(),
			};

			if prev.force || prev.is_override {
				let r = graph.requirement_mut(require);
				if prev.defining_require != Some(require) {
					if r.overriden_ref.is_none() {
						r.overriden_ref = Some(r.reference.clone());
					}
					if r.override_ref.is_none() {
						r.override_ref = Some(prev.override_ref.clone().unwrap_or_else(|| prev.reference.clone()));
					}
					r.defining_require = prev.defining_require;
				}
				log::debug!("{} overridden to {}", r.reference, prev_ref);
				r.reference = prev_ref;
			} else {
				Self::conflicting_version(graph, require, node, prev_require, previous.node, prev_ref, previous.base, self.config.resolve_prereleases())?;
			}
		}

		match prev_node {
			None => self.create_new_node(graph, node, require, profiles, lockfile).map(Some),
			Some(prev_node) => {
				log::trace!("Closing a diamond from {} onto {}", graph.node(node).label(), graph.node(prev_node).label());
				let test = graph.node(node).test || graph.requirement(require).test;
				graph.node_mut(prev_node).test &= test;
				Self::save_options_conflicts(graph, node, require, prev_node);
				let (src_type, dst_type) = (graph.node(node).package_type, graph.node(prev_node).package_type);
				graph.requirement_mut(require).process_package_type(src_type, dst_type);
				graph.add_edge(node, prev_node, require);
				graph.propagate_closing_loop(node, require, prev_node)?;
				Ok(None)
			},
		}
	}

	/// Checks that `require` is compatible with the previous requirement of the same package,
	/// narrowing it when both are ranges.
	#[allow(clippy::too_many_arguments)]
	fn conflicting_version(graph: &mut DepsGraph, require: RequireId, node: NodeIndex, prev_require: RequireId, prev_node: Option<NodeIndex>, prev_ref: RecipeReference, base_previous: NodeIndex, resolve_prereleases: bool) -> Result<(), GraphError> {
		let conflict = |graph: &DepsGraph| GraphError::Conflict {
			node,
			node_ref: graph.node(node).reference.clone(),
			require: graph.requirement(require).reference.clone(),
			prev_node,
			prev_require: graph.requirement(prev_require).reference.clone(),
			base_previous,
			base_previous_ref: graph.node(base_previous).reference.clone(),
		};

		let current = graph.requirement(require).reference.clone();
		if current.user != prev_ref.user || current.channel != prev_ref.channel {
			return Err(conflict(graph));
		}

		let version_range = graph.requirement(require).version_range();
		/* A resolved previous node is exact even if it was required with a range */
		let prev_version_range = match prev_node {
			None => graph.requirement(prev_require).version_range(),
			Some(_) => None,
		};

		match (version_range, prev_version_range) {
			(Some(range), Some(prev_range)) => {
				let Some(restricted) = range.intersection(&prev_range) else {
					return Err(conflict(graph));
				};
				log::debug!("Restricting {} to {}", current, restricted.version());
				graph.requirement_mut(require).reference.version = restricted.version();
			},
			(Some(range), None) => {
				if !range.contains(&prev_ref.version, resolve_prereleases) {
					return Err(conflict(graph));
				}
				graph.requirement_mut(require).reference = prev_ref;
			},
			(None, Some(prev_range)) => {
				if !prev_range.contains(&current.version, resolve_prereleases) {
					return Err(conflict(graph));
				}
			},
			(None, None) => {
				let revisions_differ = matches!((&current.revision, &prev_ref.revision), (Some(a), Some(b)) if a != b);
				if !current.same_identity(&prev_ref) || revisions_differ {
					return Err(conflict(graph));
				}
			},
		}
		Ok(())
	}

	/* Records requirement options that the already resolved node doesn't have */
	fn save_options_conflicts(graph: &mut DepsGraph, node: NodeIndex, require: RequireId, prev_node: NodeIndex) {
		let prev = graph.node(prev_node);
		let requirer = graph.node(node).label();
		let conflicts: Vec<(String, String, String)> = graph.requirement(require).options.iter()
			.filter_map(|(name, value)| match prev.options.get(name) {
				Some(actual) if actual != value => Some((name.clone(), actual.clone(), value.clone())),
				_ => None,
			})
			.collect();
		if conflicts.is_empty() {
			return;
		}
		let prev_label = prev.label();
		for (name, actual, wanted) in conflicts {
			log::warn!("{} requires {}:{}={} but it is already {}", requirer, prev_label, name, wanted, actual);
			let entry = graph.options_conflicts.entry(prev_label.clone()).or_default()
				.entry(name)
				.or_insert_with(|| OptionsConflict { value: actual, conflicts: Vec::new() });
			entry.conflicts.push((requirer.clone(), wanted));
		}
	}

	fn create_new_node(&mut self, graph: &mut DepsGraph, node: NodeIndex, require: RequireId, profiles: &Profiles, lockfile: Option<&Lockfile>) -> crate::Result<NodeIndex> {
		let parent_context = graph.node(node).context;
		let base = graph.node(node).label();

		if let Some(lockfile) = lockfile {
			lockfile.resolve_locked(parent_context, graph.requirement_mut(require), self.config.resolve_prereleases())?;
		}
		self.range_resolver.resolve(graph.requirement_mut(require), &base, self.provider)?;

		let reference = graph.requirement(require).reference.clone();
		let loaded = self.provider.load_recipe(&reference).map_err(|e| GraphError::Missing {
			node: base.clone(),
			require: reference.clone(),
			message: e.to_string(),
		})?;
		log::debug!("Resolved {} to {} for {}", reference, loaded.reference.repr_notime(), base);

		let r = graph.requirement(require);
		let context = if r.build { Context::Build } else { parent_context };
		let down_options = r.options.clone();
		let test = graph.node(node).test || r.test;

		let mut new = Node::new(Some(loaded.reference), loaded.recipe, context, loaded.status);
		new.remote = loaded.remote;
		new.test = test;
		let requirements = Self::prepare_node(&mut new, profiles, down_options, false)?;
		if new.is_conf && graph.node(node).recipe_status != RecipeStatus::Virtual {
			return Err(crate::Error::PackageType(format!("configuration package {} can only be required directly from the command line, not by {}", new.label(), base)));
		}

		let (src_type, dst_type) = (graph.node(node).package_type, new.package_type);
		graph.requirement_mut(require).process_package_type(src_type, dst_type);

		let new_node = graph.add_node(new);
		Self::attach_requires(graph, new_node, requirements)?;
		graph.add_edge(node, new_node, require);
		graph.propagate_downstream(node, require, new_node, None)?;

		if let Some(ancestor) = graph.check_loops(node, new_node)? {
			return Err(GraphError::Loop {
				node: graph.node(new_node).label(),
				require: graph.requirement(require).reference.clone(),
				ancestor: graph.node(ancestor).label(),
			}.into());
		}
		Ok(new_node)
	}

	/* Overrides that never met the requirement they target shouldn't be visible as dependencies */
	fn remove_overrides(graph: &mut DepsGraph) {
		for index in graph.nodes() {
			let overrides: Vec<RequireKey> = graph.node(index).transitive_deps.iter()
				.filter(|(_, t)| graph.requirement(t.require).is_override)
				.map(|(k, _)| k.clone())
				.collect();
			for key in overrides {
				graph.node_mut(index).transitive_deps.shift_remove(&key);
			}
		}
	}
}
