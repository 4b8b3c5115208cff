use std::collections::BTreeMap;
use crate::model::*;
use super::{ProviderError, RecipeProvider};

/// Resolves version ranges to the newest matching reference.
///
/// Resolutions are cached for the lifetime of the resolver so the same range expression
/// resolves the same way everywhere in a graph, call [`RangeResolver::reinit`] between graphs.
#[derive(Debug, Default, Clone)]
pub struct RangeResolver {
	cached: BTreeMap<RecipeReference, RecipeReference>,
	resolve_prereleases: bool,
}

impl RangeResolver {
	pub fn new(resolve_prereleases: bool) -> Self {
		RangeResolver {
			cached: BTreeMap::new(),
			resolve_prereleases,
		}
	}

	/// Replaces the range in `require` with the resolved reference, does nothing for exact references.
	pub fn resolve(&mut self, require: &mut Requirement, base: &str, provider: &dyn RecipeProvider) -> Result<(), ProviderError> {
		let Some(range) = require.version_range() else {
			return Ok(());
		};
		if let Some(resolved) = self.cached.get(&require.reference) {
			log::trace!("Range {} cached as {}", require.reference, resolved);
			require.reference = resolved.clone();
			return Ok(());
		}

		let wanted = &require.reference;
		let resolved = provider.list_references(&wanted.name).into_iter()
			.filter(|r| r.user == wanted.user && r.channel == wanted.channel)
			.filter(|r| range.contains(&r.version, self.resolve_prereleases))
			.max_by(|a, b| a.version.cmp(&b.version))
			.map(|r| r.without_revision())
			.ok_or_else(|| ProviderError::UnresolvedRange {
				range: range.to_string(),
				reference: wanted.to_string(),
				base: base.to_string(),
			})?;

		log::debug!("Resolved range {} to {}", wanted, resolved);
		self.cached.insert(wanted.clone(), resolved.clone());
		require.reference = resolved;
		Ok(())
	}

	/// Range requirement text to resolved reference text.
	pub fn resolved_ranges(&self) -> BTreeMap<String, String> {
		self.cached.iter()
			.map(|(k, v)| (k.to_string(), v.repr_notime()))
			.collect()
	}

	pub fn reinit(&mut self) {
		self.cached.clear();
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::provider::LocalRecipeIndex;

	fn index() -> LocalRecipeIndex {
		let mut index = LocalRecipeIndex::default();
		for v in ["1.0", "1.1", "2.0", "1.2-pre"] {
			index.add_recipe(Recipe::new("math", v)).unwrap();
		}
		index
	}

	fn require(s: &str) -> Requirement { Requirement::new(RecipeReference::loads(s).unwrap()) }

	#[test]
	fn newest_in_range() {
		let mut resolver = RangeResolver::default();
		let mut r = require("math/[>=1.0 <2.0]");
		resolver.resolve(&mut r, "app/1.0", &index()).unwrap();
		assert_eq!(r.reference.to_string(), "math/1.1");
		assert_eq!(resolver.resolved_ranges()["math/[>=1.0 <2.0]"], "math/1.1");
	}

	#[test]
	fn prereleases_when_configured() {
		let mut resolver = RangeResolver::new(true);
		let mut r = require("math/[>=1.0 <2.0]");
		resolver.resolve(&mut r, "app/1.0", &index()).unwrap();
		assert_eq!(r.reference.to_string(), "math/1.2-pre");
	}

	#[test]
	fn unresolved_range() {
		let mut resolver = RangeResolver::default();
		let mut r = require("math/[>=3.0]");
		assert!(matches!(resolver.resolve(&mut r, "app/1.0", &index()), Err(ProviderError::UnresolvedRange { .. })));
	}

	#[test]
	fn exact_untouched() {
		let mut resolver = RangeResolver::default();
		let mut r = require("math/1.0");
		resolver.resolve(&mut r, "app/1.0", &index()).unwrap();
		assert!(resolver.resolved_ranges().is_empty());
	}

	#[test]
	fn reinit_clears_cache() {
		let mut resolver = RangeResolver::default();
		let mut r = require("math/[*]");
		resolver.resolve(&mut r, "app/1.0", &index()).unwrap();
		resolver.reinit();
		assert!(resolver.resolved_ranges().is_empty());
	}
}
