//! Leveled build units derived from an analyzed graph.
//!
//! A build order groups the binaries of a graph in levels, every unit of a level only depends on
//! units of previous levels so a whole level can be built in parallel. Build orders of different
//! products or configurations are computed separately and merged afterwards.

use indexmap::IndexMap;
use serde::*;
use thiserror::Error;

use crate::graph::*;
use crate::model::RecipeReference;

mod package;
pub use package::InstallPackage;

mod recipe;
pub use recipe::InstallRecipe;

mod configuration;
pub use configuration::InstallConfiguration;

#[derive(Debug, Error)]
pub enum BuildOrderError {
	#[error("Cannot merge build-orders of {ours}!={theirs}")]
	DifferentOrder {
		ours: OrderBy,
		theirs: OrderBy,
	},
	#[error("Reduced build-order file cannot be merged: {0}")]
	Reduced(String),
	#[error("There are invalid packages:\n{0}")]
	Invalid(String),
	#[error("There are missing binaries:\n{0}")]
	Missing(String),
	#[error("Build order has a dependency cycle among: {0}")]
	Cycle(String),
	#[error("Binary of {0} was not evaluated before computing the build order")]
	Unevaluated(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderBy {
	#[default] Recipe,
	Configuration,
}

impl std::fmt::Display for OrderBy {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			OrderBy::Recipe => write!(f, "recipe"),
			OrderBy::Configuration => write!(f, "configuration"),
		}
	}
}

/// A node of the build order.
pub trait InstallUnit: Clone {
	/// Identity other units refer to in their `depends`.
	fn key(&self) -> String;
	fn depends(&self) -> &[String];
	fn set_depends(&mut self, depends: Vec<String>);
	fn needs_build(&self) -> bool;
	/// Adds what `other`, describing the same unit, knows.
	fn merge(&mut self, other: &Self);
	/// Drops packages that don't need building once the order is reduced.
	fn reduce_packages(&mut self) {}
	/// Recipe reference and package of every binary in the unit.
	fn packages(&self) -> Vec<(&str, &InstallPackage)>;
	fn packages_mut(&mut self) -> Vec<&mut InstallPackage>;
}

#[derive(Debug, Clone, PartialEq)]
enum Units {
	Recipe(IndexMap<String, InstallRecipe>),
	Configuration(IndexMap<String, InstallConfiguration>),
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "order_by", rename_all = "lowercase")]
enum SerializedOrder {
	Recipe {
		#[serde(default)]
		reduced: bool,
		order: Vec<Vec<InstallRecipe>>,
	},
	Configuration {
		#[serde(default)]
		reduced: bool,
		order: Vec<Vec<InstallConfiguration>>,
	},
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildOrder {
	units: Units,
	reduced: bool,
	/// Name of the file the order was loaded from.
	source: Option<String>,
}

fn merge_units<U: InstallUnit>(ours: &mut IndexMap<String, U>, theirs: IndexMap<String, U>) {
	for (key, unit) in theirs {
		match ours.get_mut(&key) {
			Some(existing) => existing.merge(&unit),
			None => {
				ours.insert(key, unit);
			},
		}
	}
}

/* Units that don't build are removed and their consumers depend on their dependencies instead */
fn reduce_units<U: InstallUnit>(units: &mut IndexMap<String, U>) {
	let keys: Vec<String> = units.keys().cloned().collect();
	for key in keys {
		if units.get(&key).map(|u| u.needs_build()).unwrap_or(true) {
			continue;
		}
		let Some(removed) = units.shift_remove(&key) else {
			continue;
		};
		log::trace!("Reducing {} out of the build order", key);
		for unit in units.values_mut() {
			if !unit.depends().contains(&key) {
				continue;
			}
			let mut depends: Vec<String> = unit.depends().iter().filter(|d| **d != key).cloned().collect();
			for d in removed.depends() {
				if !depends.contains(d) {
					depends.push(d.clone());
				}
			}
			unit.set_depends(depends);
		}
	}
	for unit in units.values_mut() {
		unit.reduce_packages();
	}
}

fn install_order<U: InstallUnit>(units: &IndexMap<String, U>) -> Result<Vec<Vec<U>>, BuildOrderError> {
	let mut pending: IndexMap<&str, &U> = units.iter().map(|(k, v)| (k.as_str(), v)).collect();
	let mut levels = Vec::new();
	while !pending.is_empty() {
		let ready: Vec<&str> = pending.iter()
			.filter(|(_, u)| !u.depends().iter().any(|d| pending.contains_key(d.as_str())))
			.map(|(k, _)| *k)
			.collect();
		if ready.is_empty() {
			let keys: Vec<&str> = pending.keys().copied().collect();
			return Err(BuildOrderError::Cycle(keys.join(", ")));
		}
		let level = ready.iter().filter_map(|k| pending.get(k).map(|u| (*u).clone())).collect();
		for k in ready {
			pending.shift_remove(k);
		}
		levels.push(level);
	}
	Ok(levels)
}

fn from_levels<U: InstallUnit>(order: Vec<Vec<U>>) -> IndexMap<String, U> {
	order.into_iter()
		.flatten()
		.map(|u| (u.key(), u))
		.collect()
}

/* `name/version:package_id` for messages, revisions are noise there */
fn short_pref(reference: &str, package_id: &str) -> String {
	let reference = RecipeReference::loads(reference)
		.map(|r| r.to_string())
		.unwrap_or_else(|_| reference.to_string());
	format!("{}:{}", reference, package_id)
}

impl BuildOrder {
	/// Builds the order of every binary of `graph` that has to be obtained.
	///
	/// The root, skipped binaries and platform packages are left out. Binary analysis must have
	/// run on the graph.
	pub fn from_graph(graph: &DepsGraph, order_by: OrderBy) -> Result<Self, BuildOrderError> {
		let included = |node: &Node| !node.is_root_status() && !matches!(node.binary, Some(BinaryStatus::Skip) | Some(BinaryStatus::Platform));

		let mut recipes: IndexMap<String, InstallRecipe> = IndexMap::new();
		let mut configurations: IndexMap<String, InstallConfiguration> = IndexMap::new();
		for index in graph.ordered_iterate() {
			let node = graph.node(index);
			if !included(node) {
				continue;
			}
			let (Some(reference), Some(package_id), Some(binary)) = (&node.reference, node.package_id(), node.binary) else {
				return Err(BuildOrderError::Unevaluated(node.label()));
			};
			let ref_key = reference.repr_notime();
			let pref = format!("{}:{}", ref_key, package_id);

			let mut recipe_depends: Vec<String> = Vec::new();
			let mut same_recipe_depends: Vec<String> = Vec::new();
			let mut pref_depends: Vec<String> = Vec::new();
			for transitive in node.transitive_deps.values() {
				let Some(dep) = transitive.node else {
					continue;
				};
				let dep_node = graph.node(dep);
				if !included(dep_node) {
					continue;
				}
				let (Some(dep_ref), Some(dep_pid)) = (&dep_node.reference, dep_node.package_id()) else {
					return Err(BuildOrderError::Unevaluated(dep_node.label()));
				};
				let dep_key = dep_ref.repr_notime();
				let dep_pref = format!("{}:{}", dep_key, dep_pid);
				if dep_key == ref_key {
					package::extend_unique(&mut same_recipe_depends, &[dep_pid.to_string()]);
				} else {
					package::extend_unique(&mut recipe_depends, &[dep_key]);
				}
				package::extend_unique(&mut pref_depends, &[dep_pref]);
			}

			let overrides = graph.node_overrides(index).serialize();
			match order_by {
				OrderBy::Recipe => {
					let package = InstallPackage::from_node(node, reference, package_id, binary, overrides, same_recipe_depends);
					recipes.entry(ref_key.clone())
						.or_insert_with(|| InstallRecipe::new(ref_key))
						.add(package, &recipe_depends);
				},
				OrderBy::Configuration => {
					let package = InstallPackage::from_node(node, reference, package_id, binary, overrides, pref_depends);
					let unit = InstallConfiguration { reference: ref_key, pref: pref.clone(), package };
					match configurations.get_mut(&pref) {
						Some(existing) => existing.merge(&unit),
						None => {
							configurations.insert(pref, unit);
						},
					}
				},
			}
		}

		let units = match order_by {
			OrderBy::Recipe => Units::Recipe(recipes),
			OrderBy::Configuration => Units::Configuration(configurations),
		};
		Ok(BuildOrder { units, reduced: false, source: None })
	}

	pub fn order_by(&self) -> OrderBy {
		match self.units {
			Units::Recipe(_) => OrderBy::Recipe,
			Units::Configuration(_) => OrderBy::Configuration,
		}
	}

	pub fn reduced(&self) -> bool {
		self.reduced
	}

	pub fn len(&self) -> usize {
		match &self.units {
			Units::Recipe(u) => u.len(),
			Units::Configuration(u) => u.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Keeps only units that need building.
	pub fn reduce(&mut self) {
		match &mut self.units {
			Units::Recipe(u) => reduce_units(u),
			Units::Configuration(u) => reduce_units(u),
		}
		self.reduced = true;
	}

	/// Unions `other` into this order, units describing the same recipe or configuration are merged.
	pub fn merge(&mut self, other: BuildOrder) -> Result<(), BuildOrderError> {
		for order in [&*self, &other] {
			if order.reduced {
				return Err(BuildOrderError::Reduced(order.source.clone().unwrap_or_default()));
			}
		}
		let (ours, theirs) = (self.order_by(), other.order_by());
		match (&mut self.units, other.units) {
			(Units::Recipe(a), Units::Recipe(b)) => merge_units(a, b),
			(Units::Configuration(a), Units::Configuration(b)) => merge_units(a, b),
			_ => return Err(BuildOrderError::DifferentOrder { ours, theirs }),
		}
		Ok(())
	}

	/// Fails listing every package that is missing a binary or has an invalid configuration.
	pub fn raise_errors(&self) -> Result<(), BuildOrderError> {
		let mut invalid = Vec::new();
		let mut missing = Vec::new();
		for (reference, package) in self.packages() {
			match package.binary {
				BinaryStatus::Invalid => invalid.push(format!("{}: Invalid configuration", short_pref(reference, &package.package_id))),
				BinaryStatus::Missing => missing.push(format!("{}: Missing binary", short_pref(reference, &package.package_id))),
				_ => {},
			}
		}
		if !invalid.is_empty() {
			return Err(BuildOrderError::Invalid(invalid.join("\n")));
		}
		if !missing.is_empty() {
			return Err(BuildOrderError::Missing(missing.join("\n")));
		}
		Ok(())
	}

	fn packages(&self) -> Vec<(&str, &InstallPackage)> {
		match &self.units {
			Units::Recipe(u) => u.values().flat_map(|r| r.packages()).collect(),
			Units::Configuration(u) => u.values().flat_map(|c| c.packages()).collect(),
		}
	}

	/// Recipe units by level, an error if this is a configuration order.
	pub fn recipe_levels(&self) -> Result<Vec<Vec<InstallRecipe>>, BuildOrderError> {
		match &self.units {
			Units::Recipe(u) => install_order(u),
			Units::Configuration(_) => Err(BuildOrderError::DifferentOrder { ours: OrderBy::Configuration, theirs: OrderBy::Recipe }),
		}
	}

	/// Configuration units by level, an error if this is a recipe order.
	pub fn configuration_levels(&self) -> Result<Vec<Vec<InstallConfiguration>>, BuildOrderError> {
		match &self.units {
			Units::Configuration(u) => install_order(u),
			Units::Recipe(_) => Err(BuildOrderError::DifferentOrder { ours: OrderBy::Recipe, theirs: OrderBy::Configuration }),
		}
	}

	/// `pref - binary` per package, in build order.
	pub fn summary(&self) -> Result<Vec<String>, BuildOrderError> {
		let line = |reference: &str, package: &InstallPackage| format!("{}:{} - {}", reference, package.package_id, package.binary);
		let lines = match &self.units {
			Units::Recipe(u) => install_order(u)?.iter()
				.flatten()
				.flat_map(|r| r.packages.values().map(|p| line(&r.reference, p)).collect::<Vec<_>>())
				.collect(),
			Units::Configuration(u) => install_order(u)?.iter()
				.flatten()
				.map(|c| line(&c.reference, &c.package))
				.collect(),
		};
		Ok(lines)
	}

	/// `{"order_by": ..., "reduced": ..., "order": [[unit, ...], ...]}`
	pub fn serialize(&self) -> crate::Result<serde_json::Value> {
		let serialized = match &self.units {
			Units::Recipe(u) => SerializedOrder::Recipe { reduced: self.reduced, order: install_order(u)? },
			Units::Configuration(u) => SerializedOrder::Configuration { reduced: self.reduced, order: install_order(u)? },
		};
		Ok(serde_json::to_value(serialized)?)
	}

	/// Reads a serialized order, every package records `filename` as where it came from.
	pub fn deserialize(data: &str, filename: Option<&str>) -> crate::Result<Self> {
		let serialized: SerializedOrder = serde_json::from_str(data)?;
		let (mut units, reduced) = match serialized {
			SerializedOrder::Recipe { reduced, order } => (Units::Recipe(from_levels(order)), reduced),
			SerializedOrder::Configuration { reduced, order } => (Units::Configuration(from_levels(order)), reduced),
		};
		if let Some(filename) = filename {
			let packages: Vec<&mut InstallPackage> = match &mut units {
				Units::Recipe(u) => u.values_mut().flat_map(|r| r.packages_mut()).collect(),
				Units::Configuration(u) => u.values_mut().flat_map(|c| c.packages_mut()).collect(),
			};
			for package in packages {
				package.add_filename(filename);
			}
		}
		Ok(BuildOrder { units, reduced, source: None })
	}

	/// Loads a build order file, packages record the file stem as provenance.
	pub fn load_from_disk(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
		let path = path.as_ref();
		log::debug!("Loading build order {}", path.display());
		let data = std::fs::read_to_string(path)?;
		let stem = path.file_stem().map(|s| s.to_string_lossy().to_string());
		let mut order = Self::deserialize(&data, stem.as_deref())?;
		order.source = path.file_name().map(|s| s.to_string_lossy().to_string());
		Ok(order)
	}

	pub fn save_to_disk(&self, path: impl AsRef<std::path::Path>) -> crate::Result<()> {
		std::fs::write(path, serde_json::to_string_pretty(&self.serialize()?)?)?;
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use std::collections::BTreeMap;
	use crate::model::PackageInfo;

	fn package(package_id: &str, binary: BinaryStatus, depends: &[&str]) -> InstallPackage {
		InstallPackage {
			package_id: package_id.to_string(),
			prev: None,
			context: Context::Host,
			binary,
			options: Vec::new(),
			filenames: Vec::new(),
			depends: depends.iter().map(|d| d.to_string()).collect(),
			overrides: BTreeMap::new(),
			build_args: None,
			info: PackageInfo::default(),
		}
	}

	fn configuration(reference: &str, binary: BinaryStatus, depends: &[&str]) -> InstallConfiguration {
		InstallConfiguration {
			reference: reference.to_string(),
			pref: format!("{}:pid", reference),
			package: package("pid", binary, depends),
		}
	}

	fn order(units: Vec<InstallConfiguration>) -> BuildOrder {
		let units = units.into_iter().map(|u| (u.pref.clone(), u)).collect();
		BuildOrder { units: Units::Configuration(units), reduced: false, source: None }
	}

	fn chain() -> BuildOrder {
		order(vec![
			configuration("liba/0.1", BinaryStatus::Build, &[]),
			configuration("libb/0.1", BinaryStatus::Cache, &["liba/0.1:pid"]),
			configuration("libc/0.1", BinaryStatus::Build, &["libb/0.1:pid", "liba/0.1:pid"]),
		])
	}

	#[test]
	fn levels_follow_depends() {
		let levels = chain().configuration_levels().unwrap();
		let refs: Vec<Vec<&str>> = levels.iter().map(|l| l.iter().map(|c| c.reference.as_str()).collect()).collect();
		assert_eq!(refs, vec![vec!["liba/0.1"], vec!["libb/0.1"], vec!["libc/0.1"]]);
	}

	#[test]
	fn reduce_rewires_dependencies() {
		let mut order = chain();
		order.reduce();
		let levels = order.configuration_levels().unwrap();
		assert_eq!(levels.len(), 2);
		assert_eq!(levels[1][0].package.depends, vec!["liba/0.1:pid".to_string()]);
		assert!(order.reduced());
	}

	#[test]
	fn reduced_cannot_merge() {
		let mut reduced = chain();
		reduced.reduce();
		reduced.source = Some("bo2.json".into());
		let err = chain().merge(reduced).unwrap_err();
		assert_eq!(err.to_string(), "Reduced build-order file cannot be merged: bo2.json");
	}

	#[test]
	fn different_orders_cannot_merge() {
		let recipe = BuildOrder { units: Units::Recipe(IndexMap::new()), reduced: false, source: None };
		let err = recipe.clone().merge(chain()).unwrap_err();
		assert_eq!(err.to_string(), "Cannot merge build-orders of recipe!=configuration");
		let err = chain().merge(recipe).unwrap_err();
		assert_eq!(err.to_string(), "Cannot merge build-orders of configuration!=recipe");
	}

	#[test]
	fn missing_reported_without_revision() {
		let order = order(vec![configuration("dep/1.0#rev", BinaryStatus::Missing, &[])]);
		let err = order.raise_errors().unwrap_err();
		assert!(err.to_string().contains("dep/1.0:pid: Missing binary"));
	}

	#[test]
	fn invalid_reported_first() {
		let order = order(vec![
			configuration("dep/1.0", BinaryStatus::Missing, &[]),
			configuration("other/1.0", BinaryStatus::Invalid, &[]),
		]);
		assert!(matches!(order.raise_errors(), Err(BuildOrderError::Invalid(_))));
	}

	#[test]
	fn cycle_detected() {
		let order = order(vec![
			configuration("a/1.0", BinaryStatus::Build, &["b/1.0:pid"]),
			configuration("b/1.0", BinaryStatus::Build, &["a/1.0:pid"]),
		]);
		assert!(matches!(order.configuration_levels(), Err(BuildOrderError::Cycle(_))));
	}

	#[test]
	fn deserialized_packages_record_filename() {
		let data = serde_json::to_string(&chain().serialize().unwrap()).unwrap();
		let mut a = BuildOrder::deserialize(&data, Some("bo1")).unwrap();
		let b = BuildOrder::deserialize(&data, Some("bo2")).unwrap();
		a.merge(b).unwrap();
		assert_eq!(a.len(), 3);
		let levels = a.configuration_levels().unwrap();
		assert_eq!(levels[0][0].package.filenames, vec!["bo1".to_string(), "bo2".to_string()]);
	}

	#[test]
	fn recipe_packages_sub_leveled() {
		let mut recipe = InstallRecipe::new("protobuf/1.0".to_string());
		recipe.add(package("host", BinaryStatus::Build, &["build"]), &[]);
		recipe.add(package("build", BinaryStatus::Build, &[]), &[]);
		let value = serde_json::to_value(&recipe).unwrap();
		assert_eq!(value["packages"][0][0]["package_id"], "build");
		assert_eq!(value["packages"][1][0]["package_id"], "host");
	}

	#[test]
	fn reduced_recipe_drops_cached_packages() {
		let mut recipe = InstallRecipe::new("dep/1.0".to_string());
		recipe.add(package("win", BinaryStatus::Cache, &[]), &[]);
		recipe.add(package("nix", BinaryStatus::Build, &[]), &[]);
		let mut order = BuildOrder { units: Units::Recipe(IndexMap::from([("dep/1.0".to_string(), recipe)])), reduced: false, source: None };
		order.reduce();
		let levels = order.recipe_levels().unwrap();
		assert_eq!(levels[0][0].packages.len(), 1);
		assert!(levels[0][0].packages.contains_key("nix"));
	}
}
