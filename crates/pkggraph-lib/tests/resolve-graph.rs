use pkggraph::graph::*;
use pkggraph::model::*;
use pkggraph_test_utils::*;

fn game_index() -> pkggraph::provider::LocalRecipeIndex {
	chain_index(&[
		("math/1.0", &[]),
		("math/1.0.1", &[]),
		("math/1.0.2", &[]),
		("engine/1.0", &["math/1.0"]),
		("ai/1.0", &["math/1.0.1"]),
	]).unwrap()
}

fn init() {
	let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn diamond_shares_node() {
	init();
	let index = chain_index(&[
		("math/1.0", &[]),
		("engine/1.0", &["math/1.0"]),
		("ai/1.0", &["math/1.0"]),
	]).unwrap();
	let graph = resolve(&index, &["engine/1.0", "ai/1.0"]).unwrap();
	assert!(graph.error.is_none());
	assert_eq!(graph.len(), 4);

	let math = find_node(&graph, "math").unwrap();
	for name in ["engine", "ai"] {
		let node = graph.node(find_node(&graph, name).unwrap());
		assert!(node.transitive_deps.values().any(|t| t.node == Some(math)));
	}
	assert_eq!(graph.inverse_neighbors(math).len(), 2);
}

#[test]
fn diamond_conflict() {
	init();
	let graph = resolve(&game_index(), &["engine/1.0", "ai/1.0"]).unwrap();
	let err = graph.report_graph_error().unwrap_err();
	assert!(matches!(err, GraphError::Conflict { .. }));
	assert_eq!(err.to_string(), "Version conflict: Conflict between math/1.0.1 and math/1.0 in the graph.\nConflict originates from ai/1.0");

	let json = graph.serialize();
	assert_eq!(json["error"]["type"], "conflict");
	assert_eq!(json["error"]["name"], "math");
}

#[test]
fn override_solves_conflict_in_any_order() {
	init();
	let index = game_index();
	for version in ["1.0", "1.0.1", "1.0.2"] {
		let forced = format!("math/{}", version);
		let orders = [
			vec![RequireDecl::new(&forced).overriding(), RequireDecl::new("engine/1.0"), RequireDecl::new("ai/1.0")],
			vec![RequireDecl::new("engine/1.0"), RequireDecl::new("ai/1.0"), RequireDecl::new(&forced).overriding()],
		];
		for requires in orders {
			let graph = resolve_root(&index, Node::virtual_root(requires, vec![]), pkggraph::GraphConfig::default(), None).unwrap();
			assert!(graph.error.is_none(), "{:?}", graph.error);
			assert_eq!(graph.len(), 4);
			assert_eq!(node_ref(&graph, "math").unwrap(), forced);

			let expected = serde_json::json!({ "math/1.0": [forced], "math/1.0.1": [forced] });
			assert_eq!(serde_json::to_value(graph.overrides().serialize()).unwrap(), expected);
		}
	}
}

#[test]
fn forced_requirement_wins() {
	let graph = resolve_root(
		&game_index(),
		Node::virtual_root(vec![RequireDecl::new("engine/1.0"), RequireDecl::new("ai/1.0"), RequireDecl::new("math/1.0.2").forced()], vec![]),
		pkggraph::GraphConfig::default(),
		None,
	).unwrap();
	assert!(graph.error.is_none());
	assert_eq!(node_ref(&graph, "math").unwrap(), "math/1.0.2");
}

#[test]
fn unused_override_is_pruned() {
	let index = chain_index(&[("engine/1.0", &[]), ("zlib/1.0", &[])]).unwrap();
	let root = Node::virtual_root(vec![RequireDecl::new("engine/1.0"), RequireDecl::new("zlib/1.0").overriding()], vec![]);
	let graph = resolve_root(&index, root, pkggraph::GraphConfig::default(), None).unwrap();
	assert_eq!(graph.len(), 2);
	assert!(graph.overrides().is_empty());
	let root = graph.node(graph.root().unwrap());
	assert!(!root.transitive_deps.keys().any(|k| k.name == "zlib"));
}

#[test]
fn conflict_user() {
	let index = index([
		TestRecipe::new("dep/1.0").unwrap().build(),
		TestRecipe::new("dep/1.0@user").unwrap().build(),
		TestRecipe::new("pkg/1.0").unwrap().requires(&["dep/1.0@user"]).build(),
	]).unwrap();
	let graph = resolve(&index, &["pkg/1.0", "dep/1.0"]).unwrap();
	assert!(matches!(graph.error, Some(GraphError::Conflict { .. })));
}

#[test]
fn conflict_user_with_ranges() {
	let index = index([
		TestRecipe::new("dep/1.0").unwrap().build(),
		TestRecipe::new("dep/1.0@user").unwrap().build(),
		TestRecipe::new("pkg/1.0").unwrap().requires(&["dep/[>=1.0]@user"]).build(),
	]).unwrap();
	let graph = resolve(&index, &["pkg/1.0", "dep/[>=1.0]"]).unwrap();
	assert!(matches!(graph.error, Some(GraphError::Conflict { .. })));
}

#[test]
fn conflict_between_users() {
	let index = index([
		TestRecipe::new("dep/1.0@user1").unwrap().build(),
		TestRecipe::new("dep/1.0@user2").unwrap().build(),
		TestRecipe::new("liba/1.0").unwrap().requires(&["dep/1.0@user1"]).build(),
		TestRecipe::new("libb/1.0").unwrap().requires(&["dep/1.0@user2"]).build(),
	]).unwrap();
	let graph = resolve(&index, &["liba/1.0", "libb/1.0"]).unwrap();
	let err = graph.report_graph_error().unwrap_err();
	assert!(err.to_string().contains("dep/1.0@user2 and dep/1.0@user1"));
}

#[test]
fn ranges_narrowed_in_diamond() {
	let index = chain_index(&[
		("math/1.0", &[]),
		("math/1.5", &[]),
		("math/2.0", &[]),
		("engine/1.0", &["math/[>=1.0 <3]"]),
		("ai/1.0", &["math/[<2]"]),
	]).unwrap();
	let graph = resolve(&index, &["engine/1.0", "ai/1.0"]).unwrap();
	/* engine resolved math/2.0 first, which ai's range doesn't contain */
	assert!(matches!(graph.error, Some(GraphError::Conflict { .. })));

	let graph = resolve(&index, &["ai/1.0", "engine/1.0"]).unwrap();
	assert!(graph.error.is_none());
	assert_eq!(node_ref(&graph, "math").unwrap(), "math/1.5");
	assert_eq!(graph.resolved_ranges["math/[<2]"].split('#').next(), Some("math/1.5"));
}

#[test]
fn build_context_self_require_is_not_a_loop() {
	let index = index([
		TestRecipe::new("gcc/1.0").unwrap().build(),
		TestRecipe::new("gcc/2.0").unwrap().tool_requires(&["gcc/1.0"]).build(),
	]).unwrap();
	let graph = resolve(&index, &["gcc/2.0"]).unwrap();
	assert!(graph.error.is_none());
	assert_eq!(graph.len(), 3);
	let old = graph.node(graph.nodes()[2]);
	assert_eq!(old.context, Context::Build);
	assert_eq!(old.reference.as_ref().unwrap().to_string(), "gcc/1.0");
}

#[test]
fn true_cycle_is_a_loop() {
	let index = chain_index(&[("liba/0.1", &["libb/0.1"]), ("libb/0.1", &["liba/0.1"])]).unwrap();
	let graph = resolve(&index, &["liba/0.1"]).unwrap();
	assert!(matches!(graph.error, Some(GraphError::Loop { .. })));
	assert!(graph.report_graph_error().unwrap_err().to_string().starts_with("There is a cycle/loop in the graph"));
}

#[test]
fn missing_recipe_fails() {
	let index = chain_index(&[("pkg/0.1", &["dep/0.1"])]).unwrap();
	let err = resolve(&index, &["pkg/0.1"]).unwrap_err();
	assert!(matches!(err, Error::Pkggraph(pkggraph::Error::Graph(GraphError::Missing { .. }))));
}

#[test]
fn levels_are_deterministic() {
	let index = chain_index(&[
		("zlib/1.0", &[]),
		("openssl/1.0", &["zlib/1.0"]),
		("curl/1.0", &["openssl/1.0", "zlib/1.0"]),
		("app/1.0", &["curl/1.0", "zlib/1.0"]),
	]).unwrap();
	let labels = |graph: &DepsGraph| graph.ordered_iterate().into_iter().map(|n| graph.node(n).label()).collect::<Vec<_>>();
	let first = resolve(&index, &["app/1.0"]).unwrap();
	let second = resolve(&index, &["app/1.0"]).unwrap();
	assert_eq!(labels(&first), labels(&second));

	let levels = first.by_levels();
	assert_eq!(levels.len(), 5);
	let level_of = |n: NodeIndex| levels.iter().position(|l| l.contains(&n)).unwrap();
	for node in first.nodes() {
		for dep in first.neighbors(node) {
			assert!(level_of(dep) < level_of(node));
		}
	}
}

#[test]
fn visibility_conflict_is_not_fatal() {
	let index = chain_index(&[("dep/0.1", &[]), ("libb/0.1", &["dep/0.1"])]).unwrap();
	let root = Node::virtual_root(vec![RequireDecl::new("libb/0.1"), RequireDecl::new("dep/0.1").visible(false)], vec![]);
	let graph = resolve_root(&index, root, pkggraph::GraphConfig::default(), None).unwrap();
	assert!(graph.error.is_none());
	assert_eq!(graph.len(), 3);

	let dep = find_node(&graph, "dep").unwrap();
	assert_eq!(graph.inverse_neighbors(dep).len(), 2);
	let conflicts = &graph.serialize()["visibility_conflicts"];
	assert_eq!(conflicts["dep/0.1"], serde_json::json!(["cli"]));
}

#[test]
fn replaced_requires_recorded() {
	let index = chain_index(&[("zlib-ng/2.0", &[]), ("pkg/0.1", &["zlib/1.0"])]).unwrap();
	let mut profile = Profile::default();
	profile.replace_requires.insert("zlib/*".to_string(), "zlib-ng/2.0".to_string());
	let root = Node::virtual_root(vec![RequireDecl::new("pkg/0.1")], vec![]);
	let graph = pkggraph::GraphBuilder::new(&index).load_graph(root, &profile, &Profile::default(), None).unwrap();
	assert!(find_node(&graph, "zlib-ng").is_some());
	assert_eq!(graph.replaced_requires["zlib/1.0"], "zlib-ng/2.0");
	let pkg = graph.node(find_node(&graph, "pkg").unwrap());
	assert_eq!(pkg.replaced_requires["zlib/1.0"], "zlib-ng/2.0");
}

#[test]
fn graph_info_json() {
	let index = chain_index(&[("dep/0.1", &[]), ("pkg/0.1", &["dep/0.1"])]).unwrap();
	let graph = resolve(&index, &["pkg/0.1"]).unwrap();
	let json = graph.serialize();
	assert_eq!(json["root"]["0"], "cli");
	assert_eq!(json["nodes"]["1"]["name"], "pkg");
	assert_eq!(json["nodes"]["1"]["context"], "host");
	assert!(json["nodes"]["1"]["dependencies"]["2"].is_object());
	assert!(json["error"].is_null());
}
