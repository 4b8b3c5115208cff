use std::collections::BTreeMap;
use indexmap::IndexMap;
use petgraph::prelude::*;
use serde::{Serialize, Deserialize};

use crate::model::*;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Context {
	#[default] Host,
	Build,
}

impl std::fmt::Display for Context {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Context::Host => write!(f, "host"),
			Context::Build => write!(f, "build"),
		}
	}
}

/// Where the recipe of a node came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecipeStatus {
	Cache,
	Downloaded,
	Updated,
	Editable,
	/// The project being worked on, root of the graph.
	Consumer,
	/// A root made up from command line requirements only.
	Virtual,
	Platform,
}

/// What has to happen to get the binary of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryStatus {
	Cache,
	Download,
	Update,
	Build,
	Missing,
	Skip,
	Editable,
	EditableBuild,
	Invalid,
	Platform,
}

impl std::fmt::Display for BinaryStatus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{:?}", self)
	}
}

/// A dependency as seen from a node, `node` stays `None` until the requirement is expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitiveRequirement {
	pub require: RequireId,
	pub node: Option<NodeIndex>,
}

/// The consumers of a node, most operations climbing the graph need exactly one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependants {
	None,
	Single(EdgeIndex),
	Multiple(Vec<EdgeIndex>),
}

#[derive(Debug, Clone)]
pub struct Node {
	/// `None` for a root without name and version.
	pub reference: Option<RecipeReference>,
	pub recipe: Recipe,
	pub context: Context,
	pub recipe_status: RecipeStatus,
	pub remote: Option<String>,
	package_id: Option<String>,
	pub prev: Option<String>,
	pub binary: Option<BinaryStatus>,
	pub binary_remote: Option<String>,
	/// `recipe.package_type` resolved with the node options.
	pub package_type: PackageType,
	pub settings: BTreeMap<String, String>,
	pub options: BTreeMap<String, String>,
	/// Requirements declared by this node's recipe, in declaration order.
	pub requires: IndexMap<RequireKey, RequireId>,
	/// Every dependency this node sees, direct or propagated, keyed by requirement identity.
	pub transitive_deps: IndexMap<RequireKey, TransitiveRequirement>,
	pub test: bool,
	pub should_build: bool,
	pub build_allowed: bool,
	pub is_conf: bool,
	pub skipped_build_requires: bool,
	/// Original requirement text to replacement.
	pub replaced_requires: BTreeMap<String, String>,
	pub info: Option<PackageInfo>,
}

impl Node {
	pub fn new(reference: Option<RecipeReference>, recipe: Recipe, context: Context, recipe_status: RecipeStatus) -> Self {
		let package_type = recipe.package_type;
		Node {
			reference,
			recipe,
			context,
			recipe_status,
			remote: None,
			package_id: None,
			prev: None,
			binary: None,
			binary_remote: None,
			package_type,
			settings: BTreeMap::new(),
			options: BTreeMap::new(),
			requires: IndexMap::new(),
			transitive_deps: IndexMap::new(),
			test: false,
			should_build: false,
			build_allowed: false,
			is_conf: false,
			skipped_build_requires: false,
			replaced_requires: BTreeMap::new(),
			info: None,
		}
	}

	/// A root for the project being worked on.
	pub fn consumer(recipe: Recipe) -> crate::Result<Self> {
		let reference = recipe.reference()?;
		Ok(Node::new(reference, recipe, Context::Host, RecipeStatus::Consumer))
	}

	/// A root made up of requirements only, like `--requires` on the command line.
	pub fn virtual_root(requires: Vec<RequireDecl>, tool_requires: Vec<RequireDecl>) -> Self {
		let recipe = Recipe {
			requires,
			tool_requires,
			..Default::default()
		};
		Node::new(None, recipe, Context::Host, RecipeStatus::Virtual)
	}

	pub fn name(&self) -> Option<&str> {
		self.reference.as_ref().map(|r| r.name.as_str())
	}

	pub fn is_vendor(&self) -> bool {
		self.recipe.vendor
	}

	pub fn is_root_status(&self) -> bool {
		matches!(self.recipe_status, RecipeStatus::Consumer | RecipeStatus::Virtual)
	}

	pub fn package_id(&self) -> Option<&str> {
		self.package_id.as_deref()
	}

	/// The package id can only be assigned once.
	pub fn set_package_id(&mut self, package_id: String) -> crate::Result<()> {
		if let Some(existing) = &self.package_id {
			return Err(crate::Error::PackageIdAlreadySet {
				node: self.label(),
				existing: existing.clone(),
				new: package_id,
			});
		}
		self.package_id = Some(package_id);
		Ok(())
	}

	pub fn pref(&self) -> Option<PkgReference> {
		let reference = self.reference.clone()?;
		let package_id = self.package_id.clone()?;
		let mut pref = PkgReference::new(reference, &package_id);
		pref.revision = self.prev.clone();
		Some(pref)
	}

	/// Text used in messages and graph exports.
	pub fn label(&self) -> String {
		match (&self.reference, self.recipe_status) {
			(Some(r), _) => r.repr_notime(),
			(None, RecipeStatus::Virtual) => "cli".to_string(),
			(None, _) => "conanfile".to_string(),
		}
	}

	/// Ordering key of nodes inside a level.
	pub(crate) fn sort_key(&self) -> (String, String) {
		(
			self.reference.as_ref().map(|r| r.to_string()).unwrap_or_default(),
			self.package_id.clone().unwrap_or_default(),
		)
	}
}
