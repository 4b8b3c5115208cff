//! The edge label of the dependency graph.
//!
//! A `Requirement` carries the reference being required plus the traits (headers, libs, run...)
//! describing what the consumer needs from it. While a graph is being expanded requirements are
//! copied and transformed as they travel downstream so every node can know which upstream
//! packages it transitively depends on.

use std::collections::{BTreeMap, BTreeSet};
use petgraph::stable_graph::NodeIndex;
use serde::*;
use super::{PackageType, RecipeReference, VersionRange, PackageIdMode};

/// Handle to a requirement stored in the graph's requirement arena.
///
/// Two handles are equal only when they refer to the same stored instance,
/// never because two requirements look alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequireId(pub(crate) usize);

impl RequireId {
	pub fn index(&self) -> usize {
		self.0
	}
}

/// Map key used by `transitive_deps`, a package can be required once per context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequireKey {
	pub name: String,
	pub build: bool,
}

impl std::fmt::Display for RequireKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		if self.build {
			write!(f, "{} (build)", self.name)
		} else {
			write!(f, "{}", self.name)
		}
	}
}

/* Python style `a or b` over tri-state traits */
fn or_trait(a: Option<bool>, b: Option<bool>) -> Option<bool> {
	if a == Some(true) { a } else { b }
}

#[derive(Debug, Clone)]
pub struct Requirement {
	pub reference: RecipeReference,
	pub headers: Option<bool>,
	pub libs: Option<bool>,
	pub run: Option<bool>,
	pub build: bool,
	pub visible: Option<bool>,
	pub transitive_headers: Option<bool>,
	pub transitive_libs: Option<bool>,
	pub test: bool,
	pub package_id_mode: Option<PackageIdMode>,
	/// Wins every conflict downstream of where it is declared.
	pub force: bool,
	/// Only redefines the reference of a requirement declared upstream, never creates an edge.
	pub is_override: bool,
	/// Declared by the node holding it, as opposed to propagated from upstream.
	pub direct: bool,
	/// Option values pushed onto the required package.
	pub options: BTreeMap<String, String>,
	/// The reference this requirement had before an override replaced it.
	pub overriden_ref: Option<RecipeReference>,
	/// The reference of the override that replaced it.
	pub override_ref: Option<RecipeReference>,
	/// Nodes a consumer needs even when this requirement doesn't need files from them.
	pub required_nodes: BTreeSet<NodeIndex>,
	/// The requirement that first introduced this dependency, kept through transformations.
	pub defining_require: Option<RequireId>,
	/// Set by binary analysis when the dependency binary isn't needed.
	pub skip: bool,
}

impl Requirement {
	pub fn new(reference: RecipeReference) -> Self {
		Requirement {
			reference,
			headers: None,
			libs: None,
			run: None,
			build: false,
			visible: None,
			transitive_headers: None,
			transitive_libs: None,
			test: false,
			package_id_mode: None,
			force: false,
			is_override: false,
			direct: true,
			options: BTreeMap::new(),
			overriden_ref: None,
			override_ref: None,
			required_nodes: BTreeSet::new(),
			defining_require: None,
			skip: false,
		}
	}

	/// A build context requirement, like a tool needed to build the consumer.
	pub fn tool(reference: RecipeReference) -> Self {
		Requirement {
			headers: Some(false),
			libs: Some(false),
			run: Some(true),
			build: true,
			visible: Some(false),
			..Requirement::new(reference)
		}
	}

	pub fn test(reference: RecipeReference) -> Self {
		Requirement {
			headers: Some(true),
			libs: Some(true),
			visible: Some(false),
			test: true,
			..Requirement::new(reference)
		}
	}

	fn downstream(reference: RecipeReference, headers: Option<bool>, libs: Option<bool>, run: Option<bool>) -> Self {
		Requirement {
			headers,
			libs,
			run,
			direct: false,
			..Requirement::new(reference)
		}
	}

	pub fn key(&self) -> RequireKey {
		RequireKey {
			name: self.reference.name.clone(),
			build: self.build,
		}
	}

	pub fn headers(&self) -> bool {
		self.headers.unwrap_or(true)
	}

	pub fn libs(&self) -> bool {
		self.libs.unwrap_or(true)
	}

	pub fn run(&self) -> bool {
		self.run.unwrap_or(false)
	}

	pub fn visible(&self) -> bool {
		self.visible.unwrap_or(true)
	}

	/// The consumer needs the dependency's package contents.
	pub fn files(&self) -> bool {
		self.headers() || self.libs() || self.run() || self.build
	}

	/// The range still to be resolved, `None` once the reference is exact.
	pub fn version_range(&self) -> Option<VersionRange> {
		if !self.reference.version.is_range() {
			return None;
		}
		VersionRange::new(self.reference.version.as_str()).ok()
	}

	/// A fresh requirement with the same reference and traits but none of the graph bookkeeping.
	pub fn copy_requirement(&self) -> Requirement {
		Requirement {
			headers: self.headers,
			libs: self.libs,
			run: self.run,
			build: self.build,
			visible: self.visible,
			transitive_headers: self.transitive_headers,
			transitive_libs: self.transitive_libs,
			direct: false,
			..Requirement::new(self.reference.clone())
		}
	}

	/// Computes what `require`, declared by the package this requirement points to,
	/// means for the consumer holding this requirement.
	///
	/// ```text
	/// consumer ---self---> pkg<pkg_type> ---require---> dep<dep_pkg_type>
	/// ```
	///
	/// `None` when nothing reaches the consumer. `dep_pkg_type` is `None` while the
	/// dependency hasn't been resolved yet.
	pub fn transform_downstream(&self, pkg_type: PackageType, require: &Requirement, dep_pkg_type: Option<PackageType>) -> Option<Requirement> {
		if !require.visible() {
			return None;
		}

		if require.build {
			return Some(Requirement {
				build: true,
				visible: Some(self.visible()),
				..Requirement::downstream(require.reference.clone(), Some(false), Some(false), require.run)
			});
		}

		if self.build {
			/* Only executables and shared libraries needed to run them travel through build requirements */
			if dep_pkg_type == Some(PackageType::SharedLibrary) || require.run() {
				return Some(Requirement {
					build: true,
					visible: Some(self.visible()),
					..Requirement::downstream(require.reference.clone(), Some(false), Some(false), Some(true))
				});
			}
			return None;
		}

		let mut down = match dep_pkg_type {
			Some(PackageType::SharedLibrary) | Some(PackageType::StaticLibrary) => match pkg_type {
				PackageType::SharedLibrary | PackageType::Application => Requirement::downstream(require.reference.clone(), Some(false), Some(false), require.run),
				PackageType::StaticLibrary => Requirement::downstream(require.reference.clone(), Some(false), Some(require.libs()), require.run),
				PackageType::HeaderLibrary => Requirement::downstream(require.reference.clone(), Some(require.headers()), Some(require.libs()), require.run),
				_ => require.copy_requirement(),
			},
			Some(PackageType::HeaderLibrary) => Requirement::downstream(require.reference.clone(), Some(false), Some(false), require.run),
			_ => {
				let mut down = require.copy_requirement();
				if matches!(pkg_type, PackageType::SharedLibrary | PackageType::Application) {
					down.headers = Some(false);
					down.libs = Some(false);
				}
				down
			},
		};

		if let Some(transitive_headers) = require.transitive_headers {
			down.headers = Some(require.headers() && transitive_headers);
		}
		if self.transitive_headers.is_some() {
			down.transitive_headers = self.transitive_headers;
		}
		if let Some(transitive_libs) = require.transitive_libs {
			down.libs = Some(require.libs() && transitive_libs);
		}
		if self.transitive_libs.is_some() {
			down.transitive_libs = self.transitive_libs;
		}

		/* An explicit false in the consumer's own requirement has priority */
		if self.visible == Some(false) {
			down.visible = Some(false);
		}
		if self.headers == Some(false) {
			down.headers = Some(false);
		}
		if self.libs == Some(false) {
			down.libs = Some(false);
		}

		if require.test || self.test {
			down.test = true;
		}
		down.force = require.force;
		down.direct = false;
		Some(down)
	}

	/// Merges `other`, the requirement a node already holds, into this one which is arriving
	/// from upstream for the same dependency.
	pub fn aggregate(&mut self, other: &Requirement) {
		debug_assert_eq!(self.build, other.build);
		if other.is_override {
			/* The override already did its job upstream */
			self.force = true;
			return;
		}
		self.headers = Some(self.headers() || other.headers());
		self.libs = Some(self.libs() || other.libs());
		self.run = or_trait(self.run, other.run);
		self.visible = Some(self.visible() || other.visible());
		self.force |= other.force;
		self.direct |= other.direct;
		self.transitive_headers = or_trait(self.transitive_headers, other.transitive_headers);
		self.transitive_libs = or_trait(self.transitive_libs, other.transitive_libs);
		if !other.test {
			self.test = false;
		}
		self.required_nodes.extend(other.required_nodes.iter().copied());
		self.package_id_mode = match (self.package_id_mode, other.package_id_mode) {
			(Some(a), Some(b)) => Some(std::cmp::max(a, b)),
			(a, b) => a.or(b),
		};
	}

	/// Completes the traits left unset by the recipe using the package types on both ends.
	pub fn process_package_type(&mut self, src_type: PackageType, dst_type: PackageType) {
		fn set_if_none(field: &mut Option<bool>, value: bool) {
			if field.is_none() {
				*field = Some(value);
			}
		}
		match dst_type {
			PackageType::Application => {
				set_if_none(&mut self.headers, false);
				set_if_none(&mut self.libs, false);
				set_if_none(&mut self.run, true);
			},
			PackageType::SharedLibrary => set_if_none(&mut self.run, true),
			PackageType::StaticLibrary => set_if_none(&mut self.run, false),
			PackageType::HeaderLibrary => {
				set_if_none(&mut self.run, false);
				set_if_none(&mut self.libs, false);
				set_if_none(&mut self.headers, true);
			},
			PackageType::BuildScripts => {
				set_if_none(&mut self.run, true);
				set_if_none(&mut self.libs, false);
				set_if_none(&mut self.headers, false);
				set_if_none(&mut self.visible, false);
			},
			_ => {},
		}
		if src_type == PackageType::HeaderLibrary {
			set_if_none(&mut self.transitive_headers, true);
			set_if_none(&mut self.transitive_libs, true);
		}
	}

	pub fn serialize(&self) -> SerializedRequirement {
		SerializedRequirement {
			reference: self.reference.repr_notime(),
			run: self.run(),
			libs: self.libs(),
			skip: self.skip,
			test: self.test,
			force: self.force,
			direct: self.direct,
			build: self.build,
			transitive_headers: self.transitive_headers,
			transitive_libs: self.transitive_libs,
			headers: self.headers(),
			package_id_mode: self.package_id_mode,
			visible: self.visible(),
		}
	}
}

/// JSON form of a requirement in graph output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedRequirement {
	#[serde(rename = "ref")]
	pub reference: String,
	pub run: bool,
	pub libs: bool,
	pub skip: bool,
	pub test: bool,
	pub force: bool,
	pub direct: bool,
	pub build: bool,
	pub transitive_headers: Option<bool>,
	pub transitive_libs: Option<bool>,
	pub headers: bool,
	pub package_id_mode: Option<PackageIdMode>,
	pub visible: bool,
}

#[cfg(test)]
mod test {
	use super::*;

	fn req(s: &str) -> Requirement { Requirement::new(RecipeReference::loads(s).unwrap()) }

	#[test] fn files_by_default() { assert!(req("a/1.0").files()) }
	#[test] fn key_distinguishes_build() { assert_ne!(req("a/1.0").key(), Requirement::tool(RecipeReference::loads("a/1.0").unwrap()).key()) }
	#[test] fn invisible_is_not_propagated() {
		let mut child = req("b/1.0");
		child.visible = Some(false);
		assert!(req("a/1.0").transform_downstream(PackageType::StaticLibrary, &child, None).is_none());
	}
	#[test] fn shared_hides_headers_and_libs() {
		let down = req("a/1.0").transform_downstream(PackageType::SharedLibrary, &req("b/1.0"), Some(PackageType::StaticLibrary)).unwrap();
		assert!(!down.headers() && !down.libs());
	}
	#[test] fn static_keeps_libs() {
		let down = req("a/1.0").transform_downstream(PackageType::StaticLibrary, &req("b/1.0"), Some(PackageType::StaticLibrary)).unwrap();
		assert!(!down.headers() && down.libs());
	}
	#[test] fn transitive_headers_refine() {
		let mut child = req("b/1.0");
		child.transitive_headers = Some(true);
		let down = req("a/1.0").transform_downstream(PackageType::StaticLibrary, &child, Some(PackageType::StaticLibrary)).unwrap();
		assert!(down.headers());
	}
	#[test] fn tool_require_stops_at_consumer() {
		let child = Requirement::tool(RecipeReference::loads("cmake/3.0").unwrap());
		let down = req("a/1.0").transform_downstream(PackageType::StaticLibrary, &child, None);
		assert!(down.is_none());
	}
	#[test] fn visible_build_require_propagates() {
		let mut child = Requirement::tool(RecipeReference::loads("cmake/3.0").unwrap());
		child.visible = Some(true);
		let down = req("a/1.0").transform_downstream(PackageType::StaticLibrary, &child, None).unwrap();
		assert!(down.build && down.run() && !down.direct);
	}
	#[test] fn through_build_edge_only_shared() {
		let tool = Requirement::tool(RecipeReference::loads("tool/1.0").unwrap());
		assert!(tool.transform_downstream(PackageType::Application, &req("zlib/1.0"), Some(PackageType::StaticLibrary)).is_none());
		assert!(tool.transform_downstream(PackageType::Application, &req("zlib/1.0"), Some(PackageType::SharedLibrary)).is_some());
	}
	#[test] fn force_is_inherited() {
		let mut child = req("b/1.0");
		child.force = true;
		assert!(req("a/1.0").transform_downstream(PackageType::Unknown, &child, None).unwrap().force);
	}
	#[test] fn aggregate_override_forces() {
		let mut r = req("b/1.0");
		let mut o = req("b/1.0");
		o.is_override = true;
		r.aggregate(&o);
		assert!(r.force);
	}
	#[test] fn aggregate_clears_test() {
		let mut r = req("b/1.0");
		r.test = true;
		r.aggregate(&req("b/1.0"));
		assert!(!r.test);
	}
	#[test] fn package_type_application() {
		let mut r = req("app/1.0");
		r.process_package_type(PackageType::Unknown, PackageType::Application);
		assert!(!r.headers() && !r.libs() && r.run());
	}
	#[test] fn package_type_keeps_explicit() {
		let mut r = req("app/1.0");
		r.headers = Some(true);
		r.process_package_type(PackageType::Unknown, PackageType::Application);
		assert!(r.headers());
	}
	#[test] fn range_detected() { assert!(req("a/[>=1.0]").version_range().is_some()) }
}
