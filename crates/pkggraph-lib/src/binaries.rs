//! Package ids and binary statuses of a loaded graph.

use std::collections::BTreeSet;
use petgraph::prelude::*;

use crate::config::GraphConfig;
use crate::graph::*;
use crate::model::*;
use crate::provider::BinaryProvider;

/// Which packages get built from source, parsed from `--build` arguments.
///
/// - `missing` builds every package without a binary, `missing:pattern` only matching ones.
/// - `*` or a pattern always builds matching packages, `~pattern` excludes packages from that.
/// - `never` builds nothing and can't be combined.
/// - `editable` builds editable packages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildPolicy {
	never: bool,
	missing: bool,
	missing_patterns: Vec<String>,
	patterns: Vec<String>,
	excluded: Vec<String>,
	editable: bool,
}

impl BuildPolicy {
	pub fn parse<'a>(args: impl IntoIterator<Item = &'a str>) -> crate::Result<Self> {
		let mut policy = BuildPolicy::default();
		let mut count = 0;
		for arg in args {
			count += 1;
			let arg = arg.trim();
			match arg {
				"never" => policy.never = true,
				"missing" => policy.missing = true,
				"editable" => policy.editable = true,
				"" => return Err(crate::Error::Parse("empty --build argument".to_string())),
				_ => {
					if let Some(pattern) = arg.strip_prefix("missing:") {
						policy.missing_patterns.push(pattern.to_string());
					} else if let Some(pattern) = arg.strip_prefix('~').or_else(|| arg.strip_prefix('!')) {
						policy.excluded.push(pattern.to_string());
					} else {
						policy.patterns.push(arg.to_string());
					}
				},
			}
		}
		if policy.never && count > 1 {
			return Err(crate::Error::Parse("--build=never is not compatible with other options".to_string()));
		}
		Ok(policy)
	}

	/// Build regardless of an existing binary.
	pub fn forced(&self, reference: &RecipeReference) -> bool {
		if self.never || self.is_excluded(reference) {
			return false;
		}
		self.patterns.iter().any(|p| reference.matches_pattern(p))
	}

	/// Build when no binary exists.
	pub fn allowed(&self, reference: &RecipeReference) -> bool {
		if self.never || self.is_excluded(reference) {
			return false;
		}
		self.missing || self.missing_patterns.iter().any(|p| reference.matches_pattern(p))
	}

	pub fn editable(&self) -> bool {
		self.editable
	}

	fn is_excluded(&self, reference: &RecipeReference) -> bool {
		self.excluded.iter().any(|p| reference.matches_pattern(p))
	}
}

/// How much of `dep` goes into the package id of a `pkg_type` consumer when not declared.
fn deduce_package_id_mode(require: &Requirement, pkg_type: PackageType, dep_type: PackageType) -> Option<PackageIdMode> {
	if require.package_id_mode.is_some() {
		return require.package_id_mode;
	}
	if require.test || require.build {
		return None;
	}
	if pkg_type == PackageType::HeaderLibrary {
		return Some(PackageIdMode::Unrelated);
	}
	let linked = require.headers() || require.libs();
	let mode = match pkg_type {
		PackageType::SharedLibrary | PackageType::Application if linked => match dep_type {
			PackageType::SharedLibrary => PackageIdMode::Minor,
			_ => PackageIdMode::Full,
		},
		PackageType::StaticLibrary if linked => match dep_type {
			PackageType::HeaderLibrary => PackageIdMode::Full,
			_ => PackageIdMode::Minor,
		},
		_ => PackageIdMode::Semver,
	};
	Some(mode)
}

fn is_built(binary: Option<BinaryStatus>) -> bool {
	matches!(binary, Some(BinaryStatus::Build) | Some(BinaryStatus::EditableBuild) | Some(BinaryStatus::Editable))
}

pub struct BinaryAnalyzer<'p> {
	provider: &'p dyn BinaryProvider,
	config: GraphConfig,
}

impl<'p> BinaryAnalyzer<'p> {
	pub fn new(provider: &'p dyn BinaryProvider) -> Self {
		Self {
			provider,
			config: GraphConfig::default(),
		}
	}

	pub fn config(mut self, config: GraphConfig) -> Self {
		self.config = config;
		self
	}

	/// Computes the package id of every node, dependencies first, and decides how each binary
	/// is obtained.
	///
	/// Can only run once per graph, package ids can't be reassigned.
	pub fn evaluate_graph(&self, graph: &mut DepsGraph, policy: &BuildPolicy) -> crate::Result<()> {
		for index in graph.ordered_iterate() {
			Self::compute_package_id(graph, index)?;
			if graph.node(index).is_root_status() {
				continue;
			}
			self.evaluate_node(graph, index, policy);
		}
		if self.config.skip_binaries() {
			Self::skip_binaries(graph)?;
		}
		Ok(())
	}

	fn compute_package_id(graph: &mut DepsGraph, index: NodeIndex) -> crate::Result<()> {
		let node = graph.node(index);
		let mut info = PackageInfo {
			settings: node.settings.clone(),
			options: node.options.clone(),
			..Default::default()
		};
		for transitive in node.transitive_deps.values() {
			let Some(dep) = transitive.node else {
				continue;
			};
			let require = graph.requirement(transitive.require);
			let dep_node = graph.node(dep);
			let Some(reference) = &dep_node.reference else {
				continue;
			};
			let Some(mode) = deduce_package_id_mode(require, node.package_type, dep_node.package_type) else {
				continue;
			};
			if let Some(text) = mode.render(reference, dep_node.package_id()) {
				if require.build {
					info.build_requires.push(text);
				} else {
					info.requires.push(text);
				}
			}
		}
		let package_id = info.package_id();
		log::trace!("{} package id {}", node.label(), package_id);
		let node = graph.node_mut(index);
		node.set_package_id(package_id)?;
		node.info = Some(info);
		Ok(())
	}

	fn evaluate_node(&self, graph: &mut DepsGraph, index: NodeIndex, policy: &BuildPolicy) {
		let node = graph.node_mut(index);
		let Some(reference) = node.reference.clone() else {
			return;
		};
		let forced = policy.forced(&reference);
		let allowed = policy.allowed(&reference);
		node.build_allowed = allowed;

		let binary = if node.recipe.invalid.is_some() {
			BinaryStatus::Invalid
		} else if node.recipe_status == RecipeStatus::Editable {
			if policy.editable() || forced { BinaryStatus::EditableBuild } else { BinaryStatus::Editable }
		} else if node.recipe_status == RecipeStatus::Platform {
			BinaryStatus::Platform
		} else if forced {
			BinaryStatus::Build
		} else if let Some(location) = node.pref().and_then(|pref| self.provider.package_revision(&pref)) {
			node.prev = Some(location.revision);
			match location.remote {
				Some(remote) => {
					node.binary_remote = Some(remote);
					BinaryStatus::Download
				},
				None => BinaryStatus::Cache,
			}
		} else if allowed {
			BinaryStatus::Build
		} else {
			BinaryStatus::Missing
		};
		log::debug!("{}:{} {}", reference, node.package_id().unwrap_or_default(), binary);
		node.should_build = matches!(binary, BinaryStatus::Build | BinaryStatus::EditableBuild);
		node.binary = Some(binary);
	}

	/// Marks as `Skip` the binaries no consumer needs files from.
	///
	/// Starts from the root and every package built because it was forced, then follows the
	/// requirements that need files, or that a consumer declared directly, through every node
	/// that gets built.
	fn skip_binaries(graph: &mut DepsGraph) -> crate::Result<()> {
		let mut required: BTreeSet<NodeIndex> = BTreeSet::new();
		if let Some(root) = graph.root() {
			required.insert(root);
		}
		for index in graph.nodes() {
			let node = graph.node(index);
			if !is_built(node.binary) {
				continue;
			}
			if node.skipped_build_requires {
				return Err(crate::Error::Validation(format!("Package {} skipped its test/tool requires with skip_build, but was marked to be built", node.label())));
			}
			if !node.build_allowed {
				required.insert(index);
			}
		}

		let mut open = required.clone();
		while !open.is_empty() {
			let mut next = BTreeSet::new();
			for index in open {
				let node = graph.node(index);
				let is_consumer = node.recipe_status == RecipeStatus::Consumer || node.recipe_status == RecipeStatus::Virtual || is_built(node.binary);
				let mut deps_required: BTreeSet<NodeIndex> = BTreeSet::new();
				let transitive: Vec<TransitiveRequirement> = node.transitive_deps.values().copied().collect();
				for t in &transitive {
					let require = graph.requirement(t.require);
					if let Some(dep) = t.node {
						if require.files() || (require.direct && is_consumer) {
							deps_required.insert(dep);
						}
					}
					deps_required.extend(require.required_nodes.iter().copied());
				}
				for t in &transitive {
					let skip = t.node.map(|dep| !deps_required.contains(&dep)).unwrap_or(true);
					graph.requirement_mut(t.require).skip = skip;
				}
				for dep in &deps_required {
					if is_built(graph.node(*dep).binary) && !required.contains(dep) {
						next.insert(*dep);
					}
				}
				required.extend(deps_required);
			}
			open = next;
		}

		for index in graph.nodes() {
			if required.contains(&index) {
				continue;
			}
			let node = graph.node_mut(index);
			log::debug!("Skipping binary of {}", node.label());
			node.binary = Some(BinaryStatus::Skip);
		}
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn reference(s: &str) -> RecipeReference { RecipeReference::loads(s).unwrap() }

	#[test]
	fn missing_only_matching() {
		let policy = BuildPolicy::parse(["missing:zlib/*"]).unwrap();
		assert!(policy.allowed(&reference("zlib/1.0")));
		assert!(!policy.allowed(&reference("boost/1.0")));
		assert!(!policy.forced(&reference("zlib/1.0")));
	}

	#[test]
	fn forced_with_exclusion() {
		let policy = BuildPolicy::parse(["*", "~zlib"]).unwrap();
		assert!(policy.forced(&reference("boost/1.0")));
		assert!(!policy.forced(&reference("zlib/1.0")));
	}

	#[test] fn never_is_exclusive() { assert!(BuildPolicy::parse(["never", "missing"]).is_err()) }
	#[test] fn empty_policy_builds_nothing() { assert!(!BuildPolicy::default().allowed(&reference("zlib/1.0"))) }

	#[test]
	fn embed_modes() {
		let require = Requirement::new(reference("dep/1.0"));
		assert_eq!(deduce_package_id_mode(&require, PackageType::Application, PackageType::StaticLibrary), Some(PackageIdMode::Full));
		assert_eq!(deduce_package_id_mode(&require, PackageType::SharedLibrary, PackageType::SharedLibrary), Some(PackageIdMode::Minor));
		assert_eq!(deduce_package_id_mode(&require, PackageType::Unknown, PackageType::Unknown), Some(PackageIdMode::Semver));
		assert_eq!(deduce_package_id_mode(&require, PackageType::HeaderLibrary, PackageType::StaticLibrary), Some(PackageIdMode::Unrelated));
	}

	#[test]
	fn tool_and_test_requires_dont_affect_id() {
		assert_eq!(deduce_package_id_mode(&Requirement::tool(reference("cmake/3.0")), PackageType::Unknown, PackageType::Application), None);
		assert_eq!(deduce_package_id_mode(&Requirement::test(reference("gtest/1.0")), PackageType::Unknown, PackageType::Unknown), None);
	}
}
