//! Resolver behaviour switches.
//!
//! The config is a plain JSON document, usually read once by the caller and passed
//! by reference into [`GraphBuilder`](crate::graph_builder::GraphBuilder) and
//! [`BinaryAnalyzer`](crate::binaries::BinaryAnalyzer).

use serde::{Serialize, Deserialize};

/// How a requirement on a package's own name is treated when the requirement is not visible.
///
/// Repackaging scenarios (an older revision of a library wrapped inside a newer one of the same name)
/// need such a requirement to not be reported as a loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelfRequirePolicy {
	/// A non-visible requirement never conflicts with the node requiring it.
	#[default] ExemptInvisible,
	/// Only the build context switch and version change exemptions apply.
	Strict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
	skip_binaries: bool,
	skip_build: bool,
	skip_test: bool,
	resolve_prereleases: bool,
	vendor_expand: bool,
	self_require_policy: SelfRequirePolicy,
}

impl Default for GraphConfig {
	fn default() -> Self {
		Self {
			skip_binaries: true,
			skip_build: false,
			skip_test: false,
			resolve_prereleases: false,
			vendor_expand: false,
			self_require_policy: SelfRequirePolicy::default(),
		}
	}
}

impl GraphConfig {
	pub fn load_from_disk(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
		let path = path.as_ref();
		log::debug!("Loading graph config from {}", path.display());
		let data = std::fs::read_to_string(path)?;
		Ok(serde_json::from_str(&data)?)
	}

	pub fn save_to_disk(&self, path: impl AsRef<std::path::Path>) -> crate::Result<()> {
		let path = path.as_ref();
		if let Some(parent) = path.parent() {
			if !parent.as_os_str().is_empty() {
				std::fs::create_dir_all(parent)?;
			}
		}
		std::fs::write(path, serde_json::to_string_pretty(self)?)?;
		Ok(())
	}

	/// Binaries that no consumer needs are marked `Skip` instead of being fetched.
	pub fn skip_binaries(&self) -> bool {
		self.skip_binaries
	}
	pub fn set_skip_binaries(&mut self, skip_binaries: bool) {
		self.skip_binaries = skip_binaries;
	}

	/// Build context requirements are not expanded at all.
	pub fn skip_build(&self) -> bool {
		self.skip_build
	}
	pub fn set_skip_build(&mut self, skip_build: bool) {
		self.skip_build = skip_build;
	}

	/// Test requirements are not expanded at all.
	pub fn skip_test(&self) -> bool {
		self.skip_test
	}
	pub fn set_skip_test(&mut self, skip_test: bool) {
		self.skip_test = skip_test;
	}

	pub fn resolve_prereleases(&self) -> bool {
		self.resolve_prereleases
	}
	pub fn set_resolve_prereleases(&mut self, resolve_prereleases: bool) {
		self.resolve_prereleases = resolve_prereleases;
	}

	/// Expand the requirements of vendoring packages, needed when they have to be built.
	pub fn vendor_expand(&self) -> bool {
		self.vendor_expand
	}
	pub fn set_vendor_expand(&mut self, vendor_expand: bool) {
		self.vendor_expand = vendor_expand;
	}

	pub fn self_require_policy(&self) -> SelfRequirePolicy {
		self.self_require_policy
	}
	pub fn set_self_require_policy(&mut self, policy: SelfRequirePolicy) {
		self.self_require_policy = policy;
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn missing_fields_use_defaults() {
		let config: GraphConfig = serde_json::from_str(r#"{"skip_test": true}"#).unwrap();
		assert!(config.skip_test());
		assert!(config.skip_binaries());
		assert_eq!(config.self_require_policy(), SelfRequirePolicy::ExemptInvisible);
	}

	#[test]
	fn config_survives_disk() {
		let dir = std::env::temp_dir().join(format!("pkggraph-config-{}", std::process::id()));
		let path = dir.join("config.json");
		let mut config = GraphConfig::default();
		config.set_self_require_policy(SelfRequirePolicy::Strict);
		config.set_vendor_expand(true);
		config.save_to_disk(&path).unwrap();
		let loaded = GraphConfig::load_from_disk(&path).unwrap();
		assert_eq!(loaded.self_require_policy(), SelfRequirePolicy::Strict);
		assert!(loaded.vendor_expand());
		std::fs::remove_dir_all(dir).unwrap();
	}
}
