//! Recipe and package binary references.
//!
//! Text forms:
//! - recipe: `name/version[@user[/channel]][#revision[%timestamp]]`
//! - package: `<recipe>:package_id[#package_revision[%timestamp]]`

use serde::*;
use thiserror::Error;
use super::Version;

#[derive(Debug, Error)]
pub enum ReferenceError {
	#[error("invalid recipe reference '{0}', expected name/version[@user/channel][#revision]")]
	Invalid(String),
	#[error("invalid name '{name}' in reference '{reference}'")]
	InvalidName {
		name: String,
		reference: String,
	},
	#[error("invalid package reference '{0}', expected reference:package_id[#revision]")]
	InvalidPackage(String),
}

fn name_pattern() -> &'static regex::Regex {
	static NAME: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
	NAME.get_or_init(|| regex::Regex::new(r"(?i)^[a-z0-9_][a-z0-9_+.-]*$").expect("name pattern is valid"))
}

/// `true` when `value` matches the shell style `pattern` (`*` and `?` wildcards).
pub fn glob_matches(pattern: &str, value: &str) -> bool {
	let mut re = String::from("^");
	for c in pattern.chars() {
		match c {
			'*' => re.push_str(".*"),
			'?' => re.push('.'),
			c => re.push_str(&regex::escape(&c.to_string())),
		}
	}
	re.push('$');
	regex::Regex::new(&re).map(|r| r.is_match(value)).unwrap_or(false)
}

/// Identifies a recipe, possibly pinned to a revision.
///
/// Equality and hashing consider the revision but never the timestamp.
#[derive(Debug, Clone)]
pub struct RecipeReference {
	pub name: String,
	pub version: Version,
	pub user: Option<String>,
	pub channel: Option<String>,
	pub revision: Option<String>,
	pub timestamp: Option<String>,
}

impl RecipeReference {
	pub fn new(name: &str, version: &str) -> Self {
		RecipeReference {
			name: name.to_string(),
			version: Version::new(version),
			user: None,
			channel: None,
			revision: None,
			timestamp: None,
		}
	}

	pub fn loads(text: &str) -> Result<Self, ReferenceError> {
		let text = text.trim();
		let (main, revision_part) = match text.split_once('#') {
			Some((main, rev)) => (main, Some(rev)),
			None => (text, None),
		};
		let (revision, timestamp) = match revision_part {
			Some(rev) => match rev.split_once('%') {
				Some((rev, ts)) => (Some(rev.to_string()), Some(ts.to_string())),
				None => (Some(rev.to_string()), None),
			},
			None => (None, None),
		};
		if matches!(revision.as_deref(), Some("")) {
			return Err(ReferenceError::Invalid(text.to_string()));
		}
		let (name_version, user_channel) = match main.split_once('@') {
			Some((nv, uc)) => (nv, Some(uc)),
			None => (main, None),
		};
		let (name, version) = name_version.split_once('/')
			.ok_or_else(|| ReferenceError::Invalid(text.to_string()))?;
		if version.is_empty() {
			return Err(ReferenceError::Invalid(text.to_string()));
		}
		if !name_pattern().is_match(name) {
			return Err(ReferenceError::InvalidName { name: name.to_string(), reference: text.to_string() });
		}
		let (user, channel) = match user_channel {
			None | Some("") => (None, None),
			Some(uc) => match uc.split_once('/') {
				Some((u, c)) => (Some(u.to_string()), Some(c.to_string())),
				None => (Some(uc.to_string()), None),
			},
		};
		Ok(RecipeReference {
			name: name.to_string(),
			version: Version::new(version),
			user,
			channel,
			revision,
			timestamp,
		})
	}

	/// Same recipe ignoring revision and timestamp.
	pub fn same_identity(&self, other: &RecipeReference) -> bool {
		self.name == other.name
			&& self.version == other.version
			&& self.user == other.user
			&& self.channel == other.channel
	}

	pub fn with_revision(&self, revision: &str) -> RecipeReference {
		let mut r = self.clone();
		r.revision = Some(revision.to_string());
		r.timestamp = None;
		r
	}

	pub fn without_revision(&self) -> RecipeReference {
		let mut r = self.clone();
		r.revision = None;
		r.timestamp = None;
		r
	}

	/// Text form including the revision but not the timestamp.
	pub fn repr_notime(&self) -> String {
		match &self.revision {
			Some(rev) => format!("{}#{}", self, rev),
			None => self.to_string(),
		}
	}

	pub fn repr(&self) -> String {
		match &self.timestamp {
			Some(ts) if self.revision.is_some() => format!("{}%{}", self.repr_notime(), ts),
			_ => self.repr_notime(),
		}
	}

	/// Glob match used by build policies, profile options and replace-requires.
	///
	/// A pattern without a `/` only applies to the name.
	pub fn matches_pattern(&self, pattern: &str) -> bool {
		if !pattern.contains('/') {
			return glob_matches(pattern, &self.name);
		}
		glob_matches(pattern, &self.to_string()) || glob_matches(pattern, &self.repr_notime())
	}

	fn identity_tuple(&self) -> (&str, &Version, Option<&str>, Option<&str>, Option<&str>) {
		(&self.name, &self.version, self.user.as_deref(), self.channel.as_deref(), self.revision.as_deref())
	}
}

impl std::str::FromStr for RecipeReference {
	type Err = ReferenceError;
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		RecipeReference::loads(s)
	}
}

impl PartialEq for RecipeReference {
	fn eq(&self, other: &Self) -> bool {
		self.identity_tuple() == other.identity_tuple()
	}
}

impl Eq for RecipeReference {}

impl Ord for RecipeReference {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		self.identity_tuple().cmp(&other.identity_tuple())
	}
}

impl PartialOrd for RecipeReference {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}

impl std::hash::Hash for RecipeReference {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.identity_tuple().hash(state);
	}
}

/// `name/version[@user[/channel]]`, the revision is left out.
impl std::fmt::Display for RecipeReference {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}/{}", self.name, self.version)?;
		if let Some(user) = &self.user {
			write!(f, "@{}", user)?;
			if let Some(channel) = &self.channel {
				write!(f, "/{}", channel)?;
			}
		}
		Ok(())
	}
}

impl Serialize for RecipeReference {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.repr())
	}
}

impl<'de> Deserialize<'de> for RecipeReference {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let value = String::deserialize(deserializer)?;
		RecipeReference::loads(&value).map_err(de::Error::custom)
	}
}

/// Identifies one binary of a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PkgReference {
	pub reference: RecipeReference,
	pub package_id: String,
	pub revision: Option<String>,
	pub timestamp: Option<String>,
}

impl PkgReference {
	pub fn new(reference: RecipeReference, package_id: &str) -> Self {
		PkgReference {
			reference,
			package_id: package_id.to_string(),
			revision: None,
			timestamp: None,
		}
	}

	pub fn loads(text: &str) -> Result<Self, ReferenceError> {
		let (reference, package) = text.trim().split_once(':')
			.ok_or_else(|| ReferenceError::InvalidPackage(text.to_string()))?;
		let reference = RecipeReference::loads(reference)?;
		let (package_id, revision) = match package.split_once('#') {
			Some((pid, prev)) => (pid, Some(prev)),
			None => (package, None),
		};
		if package_id.is_empty() {
			return Err(ReferenceError::InvalidPackage(text.to_string()));
		}
		let (revision, timestamp) = match revision.map(|r| r.split_once('%')) {
			Some(Some((prev, ts))) => (Some(prev.to_string()), Some(ts.to_string())),
			Some(None) => (revision.map(|r| r.to_string()), None),
			None => (None, None),
		};
		Ok(PkgReference {
			reference,
			package_id: package_id.to_string(),
			revision,
			timestamp,
		})
	}

	pub fn repr_notime(&self) -> String {
		match &self.revision {
			Some(prev) => format!("{}:{}#{}", self.reference.repr_notime(), self.package_id, prev),
			None => format!("{}:{}", self.reference.repr_notime(), self.package_id),
		}
	}
}

/// `ref:package_id`, revisions are left out.
impl std::fmt::Display for PkgReference {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}:{}", self.reference, self.package_id)
	}
}

impl Serialize for PkgReference {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.repr_notime())
	}
}

impl<'de> Deserialize<'de> for PkgReference {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let value = String::deserialize(deserializer)?;
		PkgReference::loads(&value).map_err(de::Error::custom)
	}
}
