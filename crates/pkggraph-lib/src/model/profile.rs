//! Per-context settings, option assignments and requirement replacements.

use std::collections::BTreeMap;
use serde::*;
use super::RecipeReference;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionAssignment {
	/// `None` targets the consumer only.
	pub pattern: Option<String>,
	pub name: String,
	pub value: String,
}

impl OptionAssignment {
	/// Parses `[pattern:]name=value`.
	pub fn parse(text: &str) -> crate::Result<Self> {
		let (lhs, value) = text.split_once('=')
			.ok_or_else(|| crate::Error::Parse(format!("invalid option '{}', expected [pattern:]name=value", text)))?;
		let (pattern, name) = match lhs.rsplit_once(':') {
			Some((pattern, name)) => (Some(pattern.trim().to_string()), name.trim()),
			None => (None, lhs.trim()),
		};
		if name.is_empty() {
			return Err(crate::Error::Parse(format!("invalid option '{}', empty name", text)));
		}
		Ok(OptionAssignment {
			pattern,
			name: name.to_string(),
			value: value.trim().to_string(),
		})
	}

	pub fn applies_to(&self, reference: Option<&RecipeReference>, is_consumer: bool) -> bool {
		match (&self.pattern, reference) {
			(None, _) => is_consumer,
			(Some(p), _) if p == "&" => is_consumer,
			(Some(p), None) => p == "*",
			(Some(p), Some(r)) => r.matches_pattern(p),
		}
	}
}

impl std::fmt::Display for OptionAssignment {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match &self.pattern {
			Some(p) => write!(f, "{}:{}={}", p, self.name, self.value),
			None => write!(f, "{}={}", self.name, self.value),
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
	#[serde(default)]
	pub settings: BTreeMap<String, String>,
	/// Assignments in `[pattern:]name=value` form, later ones win.
	#[serde(default)]
	pub options: Vec<String>,
	/// Requirement pattern to replacement reference, `*` in the replacement keeps the original field.
	#[serde(default)]
	pub replace_requires: BTreeMap<String, String>,
}

impl Profile {
	pub fn load_from_disk(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
		let data = std::fs::read_to_string(path)?;
		Ok(serde_json::from_str(&data)?)
	}

	pub fn set_setting(&mut self, name: &str, value: &str) {
		self.settings.insert(name.to_string(), value.to_string());
	}

	pub fn add_option(&mut self, text: &str) -> crate::Result<()> {
		OptionAssignment::parse(text)?;
		self.options.push(text.to_string());
		Ok(())
	}

	pub fn option_assignments(&self) -> crate::Result<Vec<OptionAssignment>> {
		self.options.iter().map(|o| OptionAssignment::parse(o)).collect()
	}

	/// Option values the profile imposes on a package.
	pub fn option_values(&self, reference: Option<&RecipeReference>, is_consumer: bool) -> crate::Result<BTreeMap<String, String>> {
		let mut values = BTreeMap::new();
		for assignment in self.option_assignments()? {
			if assignment.applies_to(reference, is_consumer) {
				values.insert(assignment.name, assignment.value);
			}
		}
		Ok(values)
	}

	/// The subset of the profile settings a recipe declares.
	pub fn settings_for(&self, declared: &[String]) -> BTreeMap<String, String> {
		self.settings.iter()
			.filter(|(k, _)| declared.iter().any(|d| d == *k || k.starts_with(&format!("{}.", d))))
			.map(|(k, v)| (k.clone(), v.clone()))
			.collect()
	}

	/// The replacement for `reference`, if any pattern matches it.
	pub fn replacement(&self, reference: &RecipeReference) -> crate::Result<Option<RecipeReference>> {
		for (pattern, alternative) in &self.replace_requires {
			if !reference.matches_pattern(pattern) {
				continue;
			}
			let mut replaced = RecipeReference::loads(alternative)?;
			if replaced.version.as_str() == "*" {
				replaced.version = reference.version.clone();
			}
			if replaced.user.as_deref() == Some("*") {
				replaced.user = reference.user.clone();
				replaced.channel = reference.channel.clone();
			}
			return Ok(Some(replaced));
		}
		Ok(None)
	}
}
