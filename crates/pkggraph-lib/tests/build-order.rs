use pkggraph::build_order::*;
use pkggraph::graph::*;
use pkggraph::provider::LocalRecipeIndex;
use pkggraph_test_utils::*;

fn dep_pkg_index() -> LocalRecipeIndex {
	chain_index(&[
		("dep/0.1", &[]),
		("pkg/0.1", &["dep/0.1"]),
		("other/0.1", &["dep/0.1"]),
	]).unwrap()
}

fn analyzed(index: &LocalRecipeIndex, requires: &[&str], build: &[&str]) -> DepsGraph {
	let consumer = TestRecipe::consumer().requires(requires).build();
	let mut graph = resolve_consumer(index, consumer).unwrap();
	analyze(index, &mut graph, build).unwrap();
	graph
}

#[test]
fn dep_pkg_build_order() {
	let _ = env_logger::builder().is_test(true).try_init();
	let index = dep_pkg_index();
	let graph = analyzed(&index, &["pkg/0.1"], &["missing"]);
	let order = BuildOrder::from_graph(&graph, OrderBy::Recipe).unwrap();
	let json = order.serialize().unwrap();

	assert_eq!(json["order_by"], "recipe");
	assert_eq!(json["reduced"], false);
	let levels = json["order"].as_array().unwrap();
	assert_eq!(levels.len(), 2);

	let dep = &levels[0][0];
	let dep_ref = graph.node(find_node(&graph, "dep").unwrap()).reference.as_ref().unwrap().repr_notime();
	assert_eq!(dep["ref"], dep_ref.as_str());
	assert_eq!(dep["depends"], serde_json::json!([]));
	let package = &dep["packages"][0][0];
	assert_eq!(package["binary"], "Build");
	assert_eq!(package["context"], "host");
	assert_eq!(package["build_args"], "--requires=dep/0.1 --build=dep/0.1");
	assert_eq!(package["filenames"], serde_json::json!([]));
	assert!(package["prev"].is_null());

	let pkg = &levels[1][0];
	assert_eq!(pkg["depends"], serde_json::json!([dep_ref]));
	assert_eq!(pkg["packages"][0][0]["binary"], "Build");
	assert_eq!(pkg["packages"][0][0]["build_args"], "--requires=pkg/0.1 --build=pkg/0.1");
}

#[test]
fn configuration_order() {
	let index = dep_pkg_index();
	let graph = analyzed(&index, &["pkg/0.1"], &["missing"]);
	let order = BuildOrder::from_graph(&graph, OrderBy::Configuration).unwrap();
	let levels = order.configuration_levels().unwrap();
	assert_eq!(levels.len(), 2);

	let dep = &levels[0][0];
	let pkg = &levels[1][0];
	assert_eq!(dep.pref, format!("{}:{}", dep.reference, dep.package.package_id));
	assert_eq!(pkg.package.depends, vec![dep.pref.clone()]);

	let json = order.serialize().unwrap();
	assert_eq!(json["order_by"], "configuration");
	assert_eq!(json["order"][1][0]["pref"], pkg.pref.as_str());
	assert_eq!(json["order"][1][0]["binary"], "Build");
}

#[test]
fn cached_binaries_are_not_built() {
	let mut index = dep_pkg_index();
	let probe = analyzed(&index, &["pkg/0.1"], &["missing"]);
	let dep = probe.node(find_node(&probe, "dep").unwrap());
	index.add_binary(dep.reference.as_ref().unwrap(), dep.package_id().unwrap(), "prev1", None);

	let graph = analyzed(&index, &["pkg/0.1"], &["missing"]);
	let dep = graph.node(find_node(&graph, "dep").unwrap());
	assert_eq!(dep.binary, Some(BinaryStatus::Cache));
	assert_eq!(dep.prev.as_deref(), Some("prev1"));

	let mut order = BuildOrder::from_graph(&graph, OrderBy::Recipe).unwrap();
	assert_eq!(order.len(), 2);
	order.reduce();
	let levels = order.recipe_levels().unwrap();
	assert_eq!(levels.len(), 1);
	assert!(levels[0][0].reference.starts_with("pkg/0.1"));
	assert!(levels[0][0].depends.is_empty());
}

#[test]
fn tool_requires_build_args() {
	let index = index([
		TestRecipe::new("tool/0.1").unwrap().option("myopt", "1").build(),
		TestRecipe::new("pkg/0.1").unwrap().tool_requires(&["tool/0.1"]).build(),
	]).unwrap();
	let graph = analyzed(&index, &["pkg/0.1"], &["missing"]);
	let order = BuildOrder::from_graph(&graph, OrderBy::Configuration).unwrap();
	let levels = order.configuration_levels().unwrap();
	let tool = &levels[0][0];
	assert_eq!(tool.package.context, Context::Build);
	assert_eq!(tool.package.build_args.as_deref(), Some("--tool-requires=tool/0.1 --build=tool/0.1 -o:b=\"tool/0.1:myopt=1\""));
}

#[test]
fn missing_binaries_raised() {
	let index = dep_pkg_index();
	let graph = analyzed(&index, &["pkg/0.1"], &[]);
	let order = BuildOrder::from_graph(&graph, OrderBy::Recipe).unwrap();
	let err = order.raise_errors().unwrap_err();
	let dep = graph.node(find_node(&graph, "dep").unwrap());
	let expected = format!("dep/0.1:{}: Missing binary", dep.package_id().unwrap());
	assert!(err.to_string().contains(&expected), "{}", err);
	assert!(matches!(err, BuildOrderError::Missing(_)));
}

#[test]
fn analysis_runs_once() {
	let index = dep_pkg_index();
	let mut graph = analyzed(&index, &["pkg/0.1"], &["missing"]);
	assert!(analyze(&index, &mut graph, &["missing"]).is_err());
}

#[test]
fn merge_products() {
	let index = dep_pkg_index();
	let bo1 = BuildOrder::from_graph(&analyzed(&index, &["pkg/0.1"], &["missing"]), OrderBy::Recipe).unwrap();
	let bo2 = BuildOrder::from_graph(&analyzed(&index, &["other/0.1"], &["missing"]), OrderBy::Recipe).unwrap();
	let (_dir1, path1) = write_temp("bo1.json", &bo1.serialize().unwrap().to_string()).unwrap();
	let (_dir2, path2) = write_temp("bo2.json", &bo2.serialize().unwrap().to_string()).unwrap();

	let mut merged = BuildOrder::load_from_disk(&path1).unwrap();
	merged.merge(BuildOrder::load_from_disk(&path2).unwrap()).unwrap();
	let levels = merged.recipe_levels().unwrap();
	assert_eq!(levels.len(), 2);
	assert_eq!(levels[1].len(), 2);

	let dep = &levels[0][0];
	assert_eq!(dep.packages.len(), 1);
	let package = dep.packages.values().next().unwrap();
	assert_eq!(package.filenames, vec!["bo1".to_string(), "bo2".to_string()]);
}

#[test]
fn merge_different_orders_fails() {
	let index = dep_pkg_index();
	let graph = analyzed(&index, &["pkg/0.1"], &["missing"]);
	let mut recipe = BuildOrder::from_graph(&graph, OrderBy::Recipe).unwrap();
	let configuration = BuildOrder::from_graph(&graph, OrderBy::Configuration).unwrap();
	let err = recipe.merge(configuration).unwrap_err();
	assert_eq!(err.to_string(), "Cannot merge build-orders of recipe!=configuration");
}

#[test]
fn merge_reduced_fails() {
	let index = dep_pkg_index();
	let graph = analyzed(&index, &["pkg/0.1"], &["missing"]);
	let mut reduced = BuildOrder::from_graph(&graph, OrderBy::Recipe).unwrap();
	reduced.reduce();
	let (dir, path) = write_temp("bo2.json", "{}").unwrap();
	reduced.save_to_disk(&path).unwrap();

	let mut order = BuildOrder::from_graph(&graph, OrderBy::Recipe).unwrap();
	let err = order.merge(BuildOrder::load_from_disk(&path).unwrap()).unwrap_err();
	assert_eq!(err.to_string(), "Reduced build-order file cannot be merged: bo2.json");
	drop(dir);
}

#[test]
fn skipped_binaries_left_out() {
	let index = index([
		TestRecipe::new("dep/0.1").unwrap().package_type(pkggraph::model::PackageType::StaticLibrary).build(),
		TestRecipe::new("pkg/0.1").unwrap().package_type(pkggraph::model::PackageType::SharedLibrary).requires(&["dep/0.1"]).build(),
	]).unwrap();
	let probe = analyzed(&index, &["pkg/0.1"], &["missing"]);
	let pkg = probe.node(find_node(&probe, "pkg").unwrap());
	let mut cached = index.clone();
	cached.add_binary(pkg.reference.as_ref().unwrap(), pkg.package_id().unwrap(), "prev1", None);

	/* pkg is available and its static dependency is already linked into it */
	let graph = analyzed(&cached, &["pkg/0.1"], &["missing"]);
	let dep = graph.node(find_node(&graph, "dep").unwrap());
	assert_eq!(dep.binary, Some(BinaryStatus::Skip));
	let order = BuildOrder::from_graph(&graph, OrderBy::Recipe).unwrap();
	assert_eq!(order.len(), 1);
}
