use pkggraph::graph::Node;
use pkggraph::model::*;
use pkggraph::{GraphConfig, Lockfile};
use pkggraph_test_utils::*;

fn math_index() -> pkggraph::provider::LocalRecipeIndex {
	index([
		TestRecipe::new("math/1.0#r10").unwrap().build(),
		TestRecipe::new("math/1.1#r11").unwrap().build(),
		TestRecipe::new("math/1.2#r12").unwrap().build(),
		TestRecipe::new("zlib/1.0").unwrap().build(),
	]).unwrap()
}

fn root(requires: &[&str]) -> Node {
	Node::virtual_root(requires.iter().map(|r| RequireDecl::new(r)).collect(), vec![])
}

#[test]
fn range_pinned_to_locked_version() {
	let mut lockfile = Lockfile::default();
	lockfile.add([RecipeReference::loads("math/1.1#r11").unwrap()], []);
	let graph = resolve_root(&math_index(), root(&["math/[>=1.0 <2]"]), GraphConfig::default(), Some(&lockfile)).unwrap();
	let math = graph.node(find_node(&graph, "math").unwrap());
	assert_eq!(math.reference.as_ref().unwrap().repr_notime(), "math/1.1#r11");

	let unlocked = resolve(&math_index(), &["math/[>=1.0 <2]"]).unwrap();
	assert_eq!(node_ref(&unlocked, "math").unwrap(), "math/1.2");
}

#[test]
fn strict_lockfile_rejects_unlisted() {
	let mut lockfile = Lockfile::default();
	lockfile.add([RecipeReference::loads("math/1.1#r11").unwrap()], []);
	let err = resolve_root(&math_index(), root(&["math/1.1", "zlib/1.0"]), GraphConfig::default(), Some(&lockfile)).unwrap_err();
	assert!(matches!(err, Error::Pkggraph(pkggraph::Error::Lockfile(_))));
	assert!(err.to_string().contains("Requirement 'zlib/1.0' not in lockfile 'requires'"));
}

#[test]
fn partial_lockfile_resolves_unlisted() {
	let mut lockfile = Lockfile::default();
	lockfile.add([RecipeReference::loads("math/1.1#r11").unwrap()], []);
	lockfile.set_partial(true);
	let graph = resolve_root(&math_index(), root(&["math/[>=1.0]", "zlib/1.0"]), GraphConfig::default(), Some(&lockfile)).unwrap();
	assert_eq!(node_ref(&graph, "math").unwrap(), "math/1.1");
	assert_eq!(node_ref(&graph, "zlib").unwrap(), "zlib/1.0");
}

#[test]
fn lockfile_from_graph_reproduces_it() {
	let index = math_index();
	let graph = resolve(&index, &["math/[>=1.0 <2]", "zlib/1.0"]).unwrap();
	let mut lockfile = Lockfile::default();
	lockfile.update_from_graph(&graph);
	assert_eq!(lockfile.requires().len(), 2);

	let (_dir, path) = write_temp("conan.lock", "{}").unwrap();
	lockfile.save_to_disk(&path).unwrap();
	let loaded = Lockfile::load_from_disk(&path).unwrap();
	let again = resolve_root(&index, root(&["math/[>=1.0 <2]", "zlib/1.0"]), GraphConfig::default(), Some(&loaded)).unwrap();
	assert_eq!(node_ref(&again, "math").unwrap(), "math/1.2");
}
