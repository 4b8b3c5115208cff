use std::collections::BTreeMap;
use serde::*;

use crate::graph::{BinaryStatus, Context, Node};
use crate::model::{PackageInfo, RecipeReference};

/// One binary configuration of a recipe in a build order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallPackage {
	pub package_id: String,
	pub prev: Option<String>,
	pub context: Context,
	pub binary: BinaryStatus,
	/// `ref:option=value` of the node options.
	#[serde(default)]
	pub options: Vec<String>,
	/// Build order files this package was merged from.
	#[serde(default)]
	pub filenames: Vec<String>,
	#[serde(default)]
	pub depends: Vec<String>,
	#[serde(default)]
	pub overrides: BTreeMap<String, Vec<Option<String>>>,
	/// Command line arguments that build exactly this package, `None` unless it is built.
	pub build_args: Option<String>,
	#[serde(default)]
	pub info: PackageInfo,
}

impl InstallPackage {
	pub(super) fn from_node(node: &Node, reference: &RecipeReference, package_id: &str, binary: BinaryStatus, overrides: BTreeMap<String, Vec<Option<String>>>, depends: Vec<String>) -> Self {
		let options: Vec<String> = node.options.iter()
			.map(|(k, v)| format!("{}:{}={}", reference, k, v))
			.collect();
		let build_args = build_args(reference, node.context, binary, &options, &overrides);
		InstallPackage {
			package_id: package_id.to_string(),
			prev: node.prev.clone(),
			context: node.context,
			binary,
			options,
			filenames: Vec::new(),
			depends,
			overrides,
			build_args,
			info: node.info.clone().unwrap_or_default(),
		}
	}

	pub fn needs_build(&self) -> bool {
		matches!(self.binary, BinaryStatus::Build | BinaryStatus::EditableBuild)
	}

	pub(super) fn add_filename(&mut self, filename: &str) {
		if !self.filenames.iter().any(|f| f == filename) {
			self.filenames.push(filename.to_string());
		}
	}

	pub(super) fn merge(&mut self, other: &InstallPackage) {
		for filename in &other.filenames {
			self.add_filename(filename);
		}
		extend_unique(&mut self.depends, &other.depends);
	}
}

pub(super) fn extend_unique(target: &mut Vec<String>, items: &[String]) {
	for item in items {
		if !target.contains(item) {
			target.push(item.clone());
		}
	}
}

fn build_args(reference: &RecipeReference, context: Context, binary: BinaryStatus, options: &[String], overrides: &BTreeMap<String, Vec<Option<String>>>) -> Option<String> {
	if !matches!(binary, BinaryStatus::Build | BinaryStatus::EditableBuild) {
		return None;
	}
	let (requires, scope) = match context {
		Context::Host => ("--requires", "-o:h"),
		Context::Build => ("--tool-requires", "-o:b"),
	};
	let mut cmd = format!("{}={} --build={}", requires, reference, reference);
	for option in options {
		cmd.push_str(&format!(" {}=\"{}\"", scope, option));
	}
	if !overrides.is_empty() {
		if let Ok(text) = serde_json::to_string(overrides) {
			cmd.push_str(&format!(" --lockfile-overrides='{}'", text));
		}
	}
	Some(cmd)
}

#[cfg(test)]
mod test {
	use super::*;

	fn reference(s: &str) -> RecipeReference { RecipeReference::loads(s).unwrap() }

	#[test]
	fn tool_build_args() {
		let options = vec!["tool/0.1:myopt=2".to_string()];
		let args = build_args(&reference("tool/0.1#rev"), Context::Build, BinaryStatus::Build, &options, &BTreeMap::new());
		assert_eq!(args.unwrap(), "--tool-requires=tool/0.1 --build=tool/0.1 -o:b=\"tool/0.1:myopt=2\"");
	}

	#[test] fn host_build_args() { assert_eq!(build_args(&reference("dep/0.1"), Context::Host, BinaryStatus::Build, &[], &BTreeMap::new()).unwrap(), "--requires=dep/0.1 --build=dep/0.1") }
	#[test] fn no_build_args_for_cache() { assert!(build_args(&reference("dep/0.1"), Context::Host, BinaryStatus::Cache, &[], &BTreeMap::new()).is_none()) }
}
