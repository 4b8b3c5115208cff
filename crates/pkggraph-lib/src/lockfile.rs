//! Pinned references that make resolution reproducible.
//!
//! While loading a graph every requirement is first matched against the lockfile, a range
//! resolves to the newest locked version it contains and an exact reference gets the locked
//! revision. A strict lockfile refuses requirements it doesn't list, a partial one lets them
//! resolve normally.

use serde::*;
use thiserror::Error;

use crate::graph::{Context, DepsGraph};
use crate::model::*;

#[derive(Debug, Error)]
pub enum LockfileError {
	#[error("Requirement '{reference}' not in lockfile '{kind}'")]
	NotLocked {
		reference: String,
		kind: String,
	},
}

const LOCKFILE_VERSION: &str = "0.5";

fn lockfile_version() -> String {
	LOCKFILE_VERSION.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lockfile {
	#[serde(default = "lockfile_version")]
	version: String,
	#[serde(default)]
	requires: Vec<RecipeReference>,
	#[serde(default)]
	build_requires: Vec<RecipeReference>,
	#[serde(default)]
	python_requires: Vec<RecipeReference>,
	#[serde(default)]
	config_requires: Vec<RecipeReference>,
	#[serde(skip)]
	partial: bool,
}

impl Default for Lockfile {
	fn default() -> Self {
		Lockfile {
			version: lockfile_version(),
			requires: Vec::new(),
			build_requires: Vec::new(),
			python_requires: Vec::new(),
			config_requires: Vec::new(),
			partial: false,
		}
	}
}

/* Newest first, a reference without revision is replaced by the same one with revision */
fn add_locked(list: &mut Vec<RecipeReference>, reference: RecipeReference) {
	if let Some(existing) = list.iter_mut().find(|r| r.same_identity(&reference) && (r.revision.is_none() || r.revision == reference.revision)) {
		if reference.revision.is_some() {
			*existing = reference;
		}
	} else {
		list.push(reference);
	}
	list.sort_by(|a, b| b.cmp(a));
}

impl Lockfile {
	pub fn load_from_disk(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
		let path = path.as_ref();
		log::debug!("Loading lockfile {}", path.display());
		let data = std::fs::read_to_string(path)?;
		let mut lockfile: Lockfile = serde_json::from_str(&data)?;
		lockfile.requires.sort_by(|a, b| b.cmp(a));
		lockfile.build_requires.sort_by(|a, b| b.cmp(a));
		Ok(lockfile)
	}

	pub fn save_to_disk(&self, path: impl AsRef<std::path::Path>) -> crate::Result<()> {
		std::fs::write(path, serde_json::to_string_pretty(self)?)?;
		Ok(())
	}

	pub fn partial(&self) -> bool {
		self.partial
	}

	pub fn set_partial(&mut self, partial: bool) {
		self.partial = partial;
	}

	pub fn requires(&self) -> &[RecipeReference] {
		&self.requires
	}

	pub fn build_requires(&self) -> &[RecipeReference] {
		&self.build_requires
	}

	pub fn add(&mut self, requires: impl IntoIterator<Item = RecipeReference>, build_requires: impl IntoIterator<Item = RecipeReference>) {
		for r in requires {
			add_locked(&mut self.requires, r);
		}
		for r in build_requires {
			add_locked(&mut self.build_requires, r);
		}
	}

	/// Locks every resolved package of `graph`.
	pub fn update_from_graph(&mut self, graph: &DepsGraph) {
		for index in graph.nodes() {
			let node = graph.node(index);
			if node.is_root_status() {
				continue;
			}
			let Some(reference) = node.reference.clone() else {
				continue;
			};
			match node.context {
				Context::Host => add_locked(&mut self.requires, reference),
				Context::Build => add_locked(&mut self.build_requires, reference),
			}
		}
	}

	/// Pins `require` to a locked reference.
	///
	/// Requirements of build context nodes and build requirements use the build section.
	pub fn resolve_locked(&self, node_context: Context, require: &mut Requirement, resolve_prereleases: bool) -> Result<(), LockfileError> {
		let (locked, kind) = if require.build || node_context == Context::Build {
			(&self.build_requires, "build_requires")
		} else {
			(&self.requires, "requires")
		};
		let wanted = &require.reference;
		let mut matches = locked.iter()
			.filter(|r| r.name == wanted.name && r.user == wanted.user && r.channel == wanted.channel);

		let found = if let Some(range) = require.version_range() {
			matches.find(|r| range.contains(&r.version, resolve_prereleases))
		} else if wanted.revision.is_none() {
			matches.find(|r| r.version == wanted.version)
		} else {
			matches.find(|r| *r == wanted)
		};

		match found {
			Some(locked) => {
				log::debug!("Locked {} to {}", wanted, locked.repr_notime());
				require.reference = locked.clone();
				Ok(())
			},
			None if self.partial => Ok(()),
			None => Err(LockfileError::NotLocked { reference: wanted.repr_notime(), kind: kind.to_string() }),
		}
	}
}
