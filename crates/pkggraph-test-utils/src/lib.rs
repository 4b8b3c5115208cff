//! Various helper functions for testing
//!
//! functions in this module should use results and not use any panics to avoid confusion in callers

use pkggraph::graph::{DepsGraph, Node, NodeIndex};
use pkggraph::model::*;
use pkggraph::provider::LocalRecipeIndex;
use pkggraph::{BinaryAnalyzer, BuildPolicy, GraphBuilder, GraphConfig, Lockfile};

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("pkggraph error: {0}")]
	Pkggraph(#[from] pkggraph::Error),
	#[error("reference error: {0}")]
	Reference(#[from] ReferenceError),
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Builds recipes for a test index.
///
/// ```ignore
/// let pkg = TestRecipe::new("pkg/0.1")?.requires(&["dep/0.1"]).build();
/// ```
#[derive(Debug, Clone)]
pub struct TestRecipe {
	recipe: Recipe,
}

impl TestRecipe {
	/// `reference` may carry user, channel and revision.
	pub fn new(reference: &str) -> Result<Self> {
		let reference = RecipeReference::loads(reference)?;
		let recipe = Recipe {
			user: reference.user.clone(),
			channel: reference.channel.clone(),
			revision: reference.revision.clone(),
			..Recipe::new(&reference.name, reference.version.as_str())
		};
		Ok(Self { recipe })
	}

	/// A root recipe without name and version.
	pub fn consumer() -> Self {
		Self { recipe: Recipe::default() }
	}

	pub fn requires(mut self, references: &[&str]) -> Self {
		self.recipe.requires.extend(references.iter().map(|r| RequireDecl::new(r)));
		self
	}

	pub fn require(mut self, decl: RequireDecl) -> Self {
		self.recipe.requires.push(decl);
		self
	}

	pub fn tool_requires(mut self, references: &[&str]) -> Self {
		self.recipe.tool_requires.extend(references.iter().map(|r| RequireDecl::new(r)));
		self
	}

	pub fn test_requires(mut self, references: &[&str]) -> Self {
		self.recipe.test_requires.extend(references.iter().map(|r| RequireDecl::new(r)));
		self
	}

	pub fn package_type(mut self, package_type: PackageType) -> Self {
		self.recipe.package_type = package_type;
		self
	}

	pub fn option(mut self, name: &str, default: &str) -> Self {
		self.recipe.default_options.insert(name.to_string(), default.to_string());
		self
	}

	pub fn settings(mut self, settings: &[&str]) -> Self {
		self.recipe.settings.extend(settings.iter().map(|s| s.to_string()));
		self
	}

	pub fn build(self) -> Recipe {
		self.recipe
	}
}

/// An in memory index holding `recipes`.
pub fn index(recipes: impl IntoIterator<Item = Recipe>) -> Result<LocalRecipeIndex> {
	let mut index = LocalRecipeIndex::default();
	for recipe in recipes {
		index.add_recipe(recipe)?;
	}
	Ok(index)
}

/// Shorthand for an index of recipes with plain requirements, `("pkg/0.1", &["dep/0.1"])`.
pub fn chain_index(recipes: &[(&str, &[&str])]) -> Result<LocalRecipeIndex> {
	let recipes = recipes.iter()
		.map(|(reference, requires)| TestRecipe::new(reference).map(|r| r.requires(requires).build()))
		.collect::<Result<Vec<_>>>()?;
	index(recipes)
}

/// Loads the graph of a virtual root requiring `requires`.
pub fn resolve(index: &LocalRecipeIndex, requires: &[&str]) -> Result<DepsGraph> {
	let root = Node::virtual_root(requires.iter().map(|r| RequireDecl::new(r)).collect(), Vec::new());
	resolve_root(index, root, GraphConfig::default(), None)
}

/// Loads the graph of a consumer recipe.
pub fn resolve_consumer(index: &LocalRecipeIndex, consumer: Recipe) -> Result<DepsGraph> {
	resolve_root(index, Node::consumer(consumer)?, GraphConfig::default(), None)
}

pub fn resolve_root(index: &LocalRecipeIndex, root: Node, config: GraphConfig, lockfile: Option<&Lockfile>) -> Result<DepsGraph> {
	let graph = GraphBuilder::new(index)
		.config(config)
		.load_graph(root, &Profile::default(), &Profile::default(), lockfile)?;
	Ok(graph)
}

/// Runs binary analysis with `--build` arguments `build`.
pub fn analyze(index: &LocalRecipeIndex, graph: &mut DepsGraph, build: &[&str]) -> Result<()> {
	let policy = BuildPolicy::parse(build.iter().copied())?;
	BinaryAnalyzer::new(index).evaluate_graph(graph, &policy)?;
	Ok(())
}

/// First node whose reference has `name`.
pub fn find_node(graph: &DepsGraph, name: &str) -> Option<NodeIndex> {
	graph.nodes().into_iter().find(|n| graph.node(*n).name() == Some(name))
}

/// Reference text of the node named `name`, without revision.
pub fn node_ref(graph: &DepsGraph, name: &str) -> Option<String> {
	let node = graph.node(find_node(graph, name)?);
	node.reference.as_ref().map(|r| r.to_string())
}

/// Writes `contents` to `name` inside a fresh temporary directory.
///
/// The directory is removed when the returned handle drops.
pub fn write_temp(name: &str, contents: &str) -> Result<(tempfile::TempDir, std::path::PathBuf)> {
	let dir = tempfile::tempdir()?;
	let path = dir.path().join(name);
	std::fs::write(&path, contents)?;
	Ok((dir, path))
}
