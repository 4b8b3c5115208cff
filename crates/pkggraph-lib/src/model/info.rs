//! The inputs that make up a package id.

use std::collections::BTreeMap;
use serde::*;
use super::RecipeReference;

/// How much of a dependency's identity goes into a consumer's package id.
///
/// Declared from loosest to strictest, aggregation keeps the strictest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PackageIdMode {
	#[serde(rename = "unrelated_mode")]
	Unrelated,
	#[serde(rename = "semver_mode")]
	Semver,
	#[serde(rename = "minor_mode")]
	Minor,
	#[serde(rename = "patch_mode")]
	Patch,
	#[serde(rename = "full_version_mode")]
	FullVersion,
	#[serde(rename = "revision_mode")]
	Revision,
	#[serde(rename = "full_mode")]
	Full,
}

impl PackageIdMode {
	/// The text recorded for a dependency, `None` when the dependency doesn't affect the id at all.
	pub fn render(&self, reference: &RecipeReference, package_id: Option<&str>) -> Option<String> {
		let version = match self {
			PackageIdMode::Unrelated => return None,
			PackageIdMode::Semver => reference.version.stable(),
			PackageIdMode::Minor => reference.version.masked(2),
			PackageIdMode::Patch => reference.version.masked(3),
			PackageIdMode::FullVersion | PackageIdMode::Revision | PackageIdMode::Full => reference.version.to_string(),
		};
		let mut text = format!("{}/{}", reference.name, version);
		if let Some(user) = &reference.user {
			text.push_str(&format!("@{}", user));
			if let Some(channel) = &reference.channel {
				text.push_str(&format!("/{}", channel));
			}
		}
		if matches!(self, PackageIdMode::Revision | PackageIdMode::Full) {
			if let Some(rev) = &reference.revision {
				text.push_str(&format!("#{}", rev));
			}
		}
		if *self == PackageIdMode::Full {
			if let Some(pid) = package_id {
				text.push_str(&format!(":{}", pid));
			}
		}
		Some(text)
	}
}

/// Settings, options and dependency identities of one binary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub settings: BTreeMap<String, String>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub options: BTreeMap<String, String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub requires: Vec<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub build_requires: Vec<String>,
}

impl PackageInfo {
	/// Text form hashed into the package id, one `[section]` per non-empty input.
	pub fn dumps(&self) -> String {
		let mut text = String::new();
		let mut section = |name: &str, lines: Vec<String>| {
			if lines.is_empty() {
				return;
			}
			text.push_str(&format!("[{}]\n", name));
			for line in lines {
				text.push_str(&line);
				text.push('\n');
			}
		};
		section("settings", self.settings.iter().map(|(k, v)| format!("{}={}", k, v)).collect());
		section("options", self.options.iter().map(|(k, v)| format!("{}={}", k, v)).collect());
		let mut requires = self.requires.clone();
		requires.sort();
		section("requires", requires);
		let mut build_requires = self.build_requires.clone();
		build_requires.sort();
		section("build_requires", build_requires);
		text
	}

	pub fn package_id(&self) -> String {
		sha256::digest(self.dumps())
	}
}
