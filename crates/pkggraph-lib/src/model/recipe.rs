//! Recipe metadata as supplied by a [`RecipeProvider`](crate::provider::RecipeProvider).

use std::collections::BTreeMap;
use serde::*;
use super::{PackageType, PackageIdMode, RecipeReference, Requirement};

/// A requirement as declared in a recipe.
///
/// In JSON a bare string is accepted for a requirement without any trait.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequireDecl {
	#[serde(rename = "ref")]
	pub reference: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub headers: Option<bool>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub libs: Option<bool>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub run: Option<bool>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub visible: Option<bool>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub transitive_headers: Option<bool>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub transitive_libs: Option<bool>,
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub force: bool,
	#[serde(default, rename = "override", skip_serializing_if = "std::ops::Not::not")]
	pub is_override: bool,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub options: BTreeMap<String, String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub package_id_mode: Option<PackageIdMode>,
	/// Settings (or `options.<name>`) values that must all match for the requirement to apply.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub when: BTreeMap<String, String>,
}

impl RequireDecl {
	pub fn new(reference: &str) -> Self {
		RequireDecl {
			reference: reference.to_string(),
			..Default::default()
		}
	}

	pub fn visible(mut self, visible: bool) -> Self {
		self.visible = Some(visible);
		self
	}

	pub fn run(mut self, run: bool) -> Self {
		self.run = Some(run);
		self
	}

	pub fn transitive_headers(mut self, value: bool) -> Self {
		self.transitive_headers = Some(value);
		self
	}

	pub fn forced(mut self) -> Self {
		self.force = true;
		self
	}

	pub fn overriding(mut self) -> Self {
		self.is_override = true;
		self
	}

	pub fn option(mut self, name: &str, value: &str) -> Self {
		self.options.insert(name.to_string(), value.to_string());
		self
	}

	pub fn when(mut self, key: &str, value: &str) -> Self {
		self.when.insert(key.to_string(), value.to_string());
		self
	}

	pub fn applies(&self, settings: &BTreeMap<String, String>, options: &BTreeMap<String, String>) -> bool {
		self.when.iter().all(|(key, value)| {
			match key.strip_prefix("options.") {
				Some(option) => options.get(option) == Some(value),
				None => settings.get(key) == Some(value),
			}
		})
	}

	fn apply_traits(&self, mut require: Requirement) -> Requirement {
		macro_rules! override_trait {
			($($field:ident),*) => {
				$( if self.$field.is_some() { require.$field = self.$field; } )*
			};
		}
		override_trait!(headers, libs, run, visible, transitive_headers, transitive_libs);
		require.force = self.force;
		require.is_override = self.is_override;
		require.options = self.options.clone();
		require.package_id_mode = self.package_id_mode;
		require
	}
}

fn requires_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<RequireDecl>, D::Error> {
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Repr {
		Short(String),
		Full(RequireDecl),
	}
	let list = Vec::<Repr>::deserialize(deserializer)?;
	Ok(list.into_iter().map(|r| match r {
		Repr::Short(reference) => RequireDecl::new(&reference),
		Repr::Full(decl) => decl,
	}).collect())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub version: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub channel: Option<String>,
	/// When missing the provider derives one from the recipe contents.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub revision: Option<String>,
	#[serde(default)]
	pub package_type: PackageType,
	/// The package embeds its dependencies, consumers never see them.
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub vendor: bool,
	/// Names of the settings affecting the binary.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub settings: Vec<String>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub default_options: BTreeMap<String, String>,
	#[serde(default, deserialize_with = "requires_list", skip_serializing_if = "Vec::is_empty")]
	pub requires: Vec<RequireDecl>,
	#[serde(default, deserialize_with = "requires_list", skip_serializing_if = "Vec::is_empty")]
	pub tool_requires: Vec<RequireDecl>,
	#[serde(default, deserialize_with = "requires_list", skip_serializing_if = "Vec::is_empty")]
	pub test_requires: Vec<RequireDecl>,
	/// Reason the configuration can't produce a binary.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub invalid: Option<String>,
}

impl Recipe {
	pub fn new(name: &str, version: &str) -> Self {
		Recipe {
			name: Some(name.to_string()),
			version: Some(version.to_string()),
			..Default::default()
		}
	}

	/// `None` for a recipe without name or version, like a consumer project.
	pub fn reference(&self) -> crate::Result<Option<RecipeReference>> {
		let (Some(name), Some(version)) = (&self.name, &self.version) else {
			return Ok(None);
		};
		let mut text = format!("{}/{}", name, version);
		if let Some(user) = &self.user {
			text.push_str(&format!("@{}", user));
			if let Some(channel) = &self.channel {
				text.push_str(&format!("/{}", channel));
			}
		}
		let mut reference = RecipeReference::loads(&text)?;
		reference.revision = self.revision.clone();
		Ok(Some(reference))
	}

	/// Requirements that apply for the given settings and options, in declaration order.
	pub fn requirements(&self, settings: &BTreeMap<String, String>, options: &BTreeMap<String, String>) -> crate::Result<Vec<Requirement>> {
		let mut result = Vec::new();
		for decl in self.requires.iter().filter(|d| d.applies(settings, options)) {
			let reference = RecipeReference::loads(&decl.reference)?;
			result.push(decl.apply_traits(Requirement::new(reference)));
		}
		for decl in self.tool_requires.iter().filter(|d| d.applies(settings, options)) {
			let reference = RecipeReference::loads(&decl.reference)?;
			result.push(decl.apply_traits(Requirement::tool(reference)));
		}
		for decl in self.test_requires.iter().filter(|d| d.applies(settings, options)) {
			let reference = RecipeReference::loads(&decl.reference)?;
			result.push(decl.apply_traits(Requirement::test(reference)));
		}
		Ok(result)
	}
}
