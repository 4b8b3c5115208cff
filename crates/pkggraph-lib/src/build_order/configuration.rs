use serde::*;

use super::package::InstallPackage;
use super::InstallUnit;

/// A single binary configuration, depending on other configurations by package reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallConfiguration {
	#[serde(rename = "ref")]
	pub reference: String,
	pub pref: String,
	#[serde(flatten)]
	pub package: InstallPackage,
}

impl InstallUnit for InstallConfiguration {
	fn key(&self) -> String {
		self.pref.clone()
	}

	fn depends(&self) -> &[String] {
		&self.package.depends
	}

	fn set_depends(&mut self, depends: Vec<String>) {
		self.package.depends = depends;
	}

	fn needs_build(&self) -> bool {
		self.package.needs_build()
	}

	fn merge(&mut self, other: &Self) {
		self.package.merge(&other.package);
	}

	fn packages(&self) -> Vec<(&str, &InstallPackage)> {
		vec![(self.reference.as_str(), &self.package)]
	}

	fn packages_mut(&mut self) -> Vec<&mut InstallPackage> {
		vec![&mut self.package]
	}
}
