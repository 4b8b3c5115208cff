use std::collections::BTreeMap;
use serde::*;

use crate::graph::RecipeStatus;
use crate::model::*;
use super::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedBinary {
	pub revision: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub remote: Option<String>,
}

/// A recipe and binary index kept in a single JSON document.
///
/// ```json
/// {
///   "recipes": [{"name": "dep", "version": "0.1"}, {"name": "pkg", "version": "0.1", "requires": ["dep/0.1"]}],
///   "binaries": {"dep/0.1:<package_id>": {"revision": "<prev>"}}
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalRecipeIndex {
	#[serde(default)]
	recipes: Vec<Recipe>,
	/// `name/version[@user/channel]:package_id` to binary.
	#[serde(default)]
	binaries: BTreeMap<String, IndexedBinary>,
}

impl LocalRecipeIndex {
	pub fn load_from_disk(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
		let path = path.as_ref();
		log::debug!("Loading recipe index {}", path.display());
		let data = std::fs::read_to_string(path)?;
		let index: LocalRecipeIndex = serde_json::from_str(&data)?;
		/* Fail early on recipes the resolver couldn't reference */
		for recipe in &index.recipes {
			if recipe.reference()?.is_none() {
				return Err(crate::Error::Validation(format!("recipe without name or version in {}", path.display())));
			}
		}
		Ok(index)
	}

	pub fn save_to_disk(&self, path: impl AsRef<std::path::Path>) -> crate::Result<()> {
		std::fs::write(path, serde_json::to_string_pretty(self)?)?;
		Ok(())
	}

	/// Adds a recipe returning its full reference.
	pub fn add_recipe(&mut self, recipe: Recipe) -> crate::Result<RecipeReference> {
		let reference = Self::full_reference(&recipe)?;
		self.recipes.push(recipe);
		Ok(reference)
	}

	pub fn add_binary(&mut self, reference: &RecipeReference, package_id: &str, revision: &str, remote: Option<&str>) {
		self.binaries.insert(
			format!("{}:{}", reference, package_id),
			IndexedBinary { revision: revision.to_string(), remote: remote.map(|r| r.to_string()) },
		);
	}

	pub fn recipes(&self) -> &[Recipe] {
		&self.recipes
	}

	/// The recipe reference with its declared revision, or one derived from its contents.
	fn full_reference(recipe: &Recipe) -> crate::Result<RecipeReference> {
		let reference = recipe.reference()?
			.ok_or_else(|| crate::Error::Validation("recipe without name or version".to_string()))?;
		if reference.revision.is_some() {
			return Ok(reference);
		}
		let digest = sha256::digest(serde_json::to_string(recipe)?);
		Ok(reference.with_revision(&digest[..32]))
	}
}

impl RecipeProvider for LocalRecipeIndex {
	fn load_recipe(&self, reference: &RecipeReference) -> Result<LoadedRecipe, ProviderError> {
		let found = self.recipes.iter()
			.filter_map(|recipe| Self::full_reference(recipe).ok().map(|r| (r, recipe)))
			.filter(|(r, _)| r.same_identity(reference))
			.filter(|(r, _)| reference.revision.is_none() || r.revision == reference.revision)
			.last();
		match found {
			Some((full, recipe)) => Ok(LoadedRecipe {
				reference: full,
				recipe: recipe.clone(),
				status: RecipeStatus::Cache,
				remote: None,
			}),
			None => Err(ProviderError::NotFound(reference.repr_notime())),
		}
	}

	fn list_references(&self, name: &str) -> Vec<RecipeReference> {
		self.recipes.iter()
			.filter(|r| r.name.as_deref() == Some(name))
			.filter_map(|r| r.reference().ok().flatten())
			.map(|r| r.without_revision())
			.collect()
	}
}

impl BinaryProvider for LocalRecipeIndex {
	fn package_revision(&self, pref: &PkgReference) -> Option<BinaryLocation> {
		self.binaries.get(&format!("{}:{}", pref.reference, pref.package_id))
			.map(|b| BinaryLocation { revision: b.revision.clone(), remote: b.remote.clone() })
	}
}
