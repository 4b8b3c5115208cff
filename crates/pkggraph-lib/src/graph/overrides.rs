//! Which requirements ended up pointing somewhere else than declared, and to what.

use std::collections::{BTreeMap, BTreeSet};
use petgraph::prelude::*;

use crate::model::RecipeReference;
use super::DepsGraph;

/// Overridden reference to the references that replaced it.
///
/// `None` among the values means some requirement of that reference was not overridden.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
	overrides: BTreeMap<RecipeReference, BTreeSet<Option<RecipeReference>>>,
}

impl Overrides {
	/// Collects the overrides of the requirements declared by `nodes`.
	///
	/// A reference only ever required as declared is left out.
	pub fn create(graph: &DepsGraph, nodes: impl IntoIterator<Item = NodeIndex>) -> Self {
		let mut collected: BTreeMap<RecipeReference, BTreeSet<Option<RecipeReference>>> = BTreeMap::new();
		for node in nodes {
			for id in graph.node(node).requires.values() {
				let require = graph.requirement(*id);
				match &require.overriden_ref {
					Some(overriden) => {
						collected.entry(overriden.clone()).or_default().insert(require.override_ref.clone());
					},
					/* A pure override never becomes an edge */
					None if require.is_override => {},
					None => {
						collected.entry(require.reference.clone()).or_default().insert(None);
					},
				}
			}
		}
		collected.retain(|_, values| !(values.len() == 1 && values.contains(&None)));
		Overrides { overrides: collected }
	}

	pub fn is_empty(&self) -> bool {
		self.overrides.is_empty()
	}

	pub fn get(&self, reference: &RecipeReference) -> Option<&BTreeSet<Option<RecipeReference>>> {
		self.overrides.get(reference)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&RecipeReference, &BTreeSet<Option<RecipeReference>>)> {
		self.overrides.iter()
	}

	pub fn update(&mut self, other: &Overrides) {
		for (reference, values) in &other.overrides {
			self.overrides.entry(reference.clone()).or_default().extend(values.iter().cloned());
		}
	}

	/// Keys sorted, each value list sorted with `None` first.
	pub fn serialize(&self) -> BTreeMap<String, Vec<Option<String>>> {
		self.overrides.iter()
			.map(|(reference, values)| {
				let mut values: Vec<Option<String>> = values.iter()
					.map(|v| v.as_ref().map(|r| r.repr_notime()))
					.collect();
				values.sort();
				(reference.repr_notime(), values)
			})
			.collect()
	}

	pub fn deserialize(data: &BTreeMap<String, Vec<Option<String>>>) -> crate::Result<Self> {
		let mut overrides = BTreeMap::new();
		for (reference, values) in data {
			let reference = RecipeReference::loads(reference)?;
			let values = values.iter()
				.map(|v| v.as_deref().map(RecipeReference::loads).transpose())
				.collect::<Result<BTreeSet<_>, _>>()?;
			overrides.insert(reference, values);
		}
		Ok(Overrides { overrides })
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn data(entries: &[(&str, &[Option<&str>])]) -> BTreeMap<String, Vec<Option<String>>> {
		entries.iter()
			.map(|(k, v)| (k.to_string(), v.iter().map(|x| x.map(|s| s.to_string())).collect()))
			.collect()
	}

	#[test]
	fn none_sorted_first() {
		let o = Overrides::deserialize(&data(&[("math/1.0", &[Some("math/1.0.2"), None])])).unwrap();
		assert_eq!(o.serialize()["math/1.0"], vec![None, Some("math/1.0.2".to_string())]);
	}

	#[test]
	fn update_merges_values() {
		let mut a = Overrides::deserialize(&data(&[("math/1.0", &[Some("math/1.0.2")])])).unwrap();
		let b = Overrides::deserialize(&data(&[("math/1.0", &[Some("math/1.0.3")]), ("zlib/1.0", &[None, Some("zlib/1.1")])])).unwrap();
		a.update(&b);
		assert_eq!(a.serialize()["math/1.0"].len(), 2);
		assert!(a.get(&RecipeReference::loads("zlib/1.0").unwrap()).is_some());
	}

	#[test] fn empty_by_default() { assert!(Overrides::default().is_empty()) }
}
