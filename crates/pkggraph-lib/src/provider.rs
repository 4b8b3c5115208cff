//! Collaborators supplying recipe metadata and binary availability to the resolver.
//!
//! Fetching, caching and executing recipes is not the resolver's job, it only needs the
//! answers. [`LocalRecipeIndex`] answers from a JSON document.

use thiserror::Error;
use crate::graph::RecipeStatus;
use crate::model::*;

mod range_resolver;
pub use range_resolver::RangeResolver;

mod local_index;
pub use local_index::LocalRecipeIndex;
pub use local_index::IndexedBinary;

#[derive(Debug, Error)]
pub enum ProviderError {
	#[error("Unable to find '{0}' in the recipe index")]
	NotFound(String),
	#[error("Version range '{range}' from requirement '{reference}' required by '{base}' could not be resolved")]
	UnresolvedRange {
		range: String,
		reference: String,
		base: String,
	},
}

/// A recipe as returned by a provider, its reference always carries a revision.
#[derive(Debug, Clone)]
pub struct LoadedRecipe {
	pub reference: RecipeReference,
	pub recipe: Recipe,
	pub status: RecipeStatus,
	pub remote: Option<String>,
}

pub trait RecipeProvider {
	/// Loads the recipe, the latest revision when `reference` has none.
	fn load_recipe(&self, reference: &RecipeReference) -> Result<LoadedRecipe, ProviderError>;
	/// Every known reference of a package name, without revisions.
	fn list_references(&self, name: &str) -> Vec<RecipeReference>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryLocation {
	pub revision: String,
	/// `None` when the binary is already available locally.
	pub remote: Option<String>,
}

pub trait BinaryProvider {
	fn package_revision(&self, pref: &PkgReference) -> Option<BinaryLocation>;
}
