use indexmap::IndexMap;
use serde::*;

use super::package::{extend_unique, InstallPackage};
use super::InstallUnit;

/// Every configuration of one recipe revision.
///
/// Packages are keyed by package id. When a configuration depends on another configuration of
/// the same recipe, like a tool built for the build context, they are serialized in sub-levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SerializedRecipe", into = "SerializedRecipe")]
pub struct InstallRecipe {
	pub reference: String,
	pub depends: Vec<String>,
	pub packages: IndexMap<String, InstallPackage>,
}

#[derive(Serialize, Deserialize)]
struct SerializedRecipe {
	#[serde(rename = "ref")]
	reference: String,
	#[serde(default)]
	depends: Vec<String>,
	#[serde(default)]
	packages: Vec<Vec<InstallPackage>>,
}

impl From<SerializedRecipe> for InstallRecipe {
	fn from(value: SerializedRecipe) -> Self {
		let packages = value.packages.into_iter()
			.flatten()
			.map(|p| (p.package_id.clone(), p))
			.collect();
		InstallRecipe {
			reference: value.reference,
			depends: value.depends,
			packages,
		}
	}
}

impl From<InstallRecipe> for SerializedRecipe {
	fn from(value: InstallRecipe) -> Self {
		let packages = value.package_levels();
		SerializedRecipe {
			reference: value.reference,
			depends: value.depends,
			packages,
		}
	}
}

impl InstallRecipe {
	pub(super) fn new(reference: String) -> Self {
		InstallRecipe {
			reference,
			depends: Vec::new(),
			packages: IndexMap::new(),
		}
	}

	pub(super) fn add(&mut self, package: InstallPackage, depends: &[String]) {
		match self.packages.get_mut(&package.package_id) {
			Some(existing) => existing.merge(&package),
			None => {
				self.packages.insert(package.package_id.clone(), package);
			},
		}
		extend_unique(&mut self.depends, depends);
	}

	/* Packages depending on no other pending package of this recipe go first */
	fn package_levels(&self) -> Vec<Vec<InstallPackage>> {
		let mut pending: IndexMap<&str, &InstallPackage> = self.packages.iter()
			.map(|(k, v)| (k.as_str(), v))
			.collect();
		let mut levels = Vec::new();
		while !pending.is_empty() {
			let mut ready: Vec<&str> = pending.iter()
				.filter(|(_, p)| !p.depends.iter().any(|d| pending.contains_key(d.as_str())))
				.map(|(k, _)| *k)
				.collect();
			if ready.is_empty() {
				log::warn!("Configurations of {} depend on each other", self.reference);
				ready = pending.keys().copied().collect();
			}
			let level = ready.iter().filter_map(|k| pending.get(k).map(|p| (*p).clone())).collect();
			for k in ready {
				pending.shift_remove(k);
			}
			levels.push(level);
		}
		levels
	}
}

impl InstallUnit for InstallRecipe {
	fn key(&self) -> String {
		self.reference.clone()
	}

	fn depends(&self) -> &[String] {
		&self.depends
	}

	fn set_depends(&mut self, depends: Vec<String>) {
		self.depends = depends;
	}

	fn needs_build(&self) -> bool {
		self.packages.values().any(|p| p.needs_build())
	}

	fn merge(&mut self, other: &Self) {
		for package in other.packages.values() {
			self.add(package.clone(), &[]);
		}
		extend_unique(&mut self.depends, &other.depends);
	}

	fn reduce_packages(&mut self) {
		self.packages.retain(|_, p| p.needs_build());
		let remaining: Vec<String> = self.packages.keys().cloned().collect();
		for package in self.packages.values_mut() {
			package.depends.retain(|d| remaining.contains(d));
		}
	}

	fn packages(&self) -> Vec<(&str, &InstallPackage)> {
		self.packages.values().map(|p| (self.reference.as_str(), p)).collect()
	}

	fn packages_mut(&mut self) -> Vec<&mut InstallPackage> {
		self.packages.values_mut().collect()
	}
}
