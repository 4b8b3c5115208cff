use serde::*;

/// A single dot separated segment of a version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionItem {
	Number(u64),
	Text(String),
}

impl VersionItem {
	fn parse(s: &str) -> Self {
		match s.parse::<u64>() {
			Ok(n) if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => VersionItem::Number(n),
			_ => VersionItem::Text(s.to_string()),
		}
	}
}

impl Ord for VersionItem {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		match (self, other) {
			(VersionItem::Number(a), VersionItem::Number(b)) => a.cmp(b),
			(VersionItem::Text(a), VersionItem::Text(b)) => a.cmp(b),
			/* Digits sort before letters, same as comparing the text forms */
			(VersionItem::Number(_), VersionItem::Text(_)) => std::cmp::Ordering::Less,
			(VersionItem::Text(_), VersionItem::Number(_)) => std::cmp::Ordering::Greater,
		}
	}
}

impl PartialOrd for VersionItem {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}

impl std::fmt::Display for VersionItem {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			VersionItem::Number(n) => write!(f, "{}", n),
			VersionItem::Text(s) => write!(f, "{}", s),
		}
	}
}

/// A recipe version such as `1.2.3`, `1.0-pre.1` or `2.0+build5`.
///
/// Any string is accepted, a version range expression like `[>=1.0 <2]` is also stored
/// as a `Version` until it is resolved, see [`Version::is_range`].
///
/// Trailing zero segments are not significant: `1.0` and `1.0.0` compare equal.
#[derive(Debug, Clone)]
pub struct Version {
	value: String,
	main: Vec<VersionItem>,
	pre: Option<Box<Version>>,
	build: Option<Box<Version>>,
}

impl Version {
	pub fn new(version: &str) -> Self {
		let value = version.to_string();
		let (rest, build) = match version.split_once('+') {
			Some((rest, build)) => (rest, Some(Box::new(Version::new(build)))),
			None => (version, None),
		};
		let (main, pre) = match rest.split_once('-') {
			Some((main, pre)) => (main, Some(Box::new(Version::new(pre)))),
			None => (rest, None),
		};
		Version {
			value,
			main: main.split('.').map(VersionItem::parse).collect(),
			pre,
			build,
		}
	}

	/// `true` when the version is still an unresolved range expression.
	pub fn is_range(&self) -> bool {
		self.value.starts_with('[') && self.value.ends_with(']')
	}

	pub fn as_str(&self) -> &str {
		&self.value
	}

	pub fn main(&self) -> &[VersionItem] {
		&self.main
	}

	pub fn pre(&self) -> Option<&Version> {
		self.pre.as_deref()
	}

	pub fn build(&self) -> Option<&Version> {
		self.build.as_deref()
	}

	pub fn major(&self) -> Option<&VersionItem> {
		self.main.first()
	}

	pub fn minor(&self) -> Option<&VersionItem> {
		self.main.get(1)
	}

	pub fn patch(&self) -> Option<&VersionItem> {
		self.main.get(2)
	}

	fn nonzero_items(&self) -> &[VersionItem] {
		let mut end = self.main.len();
		while end > 0 && self.main[end - 1] == VersionItem::Number(0) {
			end -= 1;
		}
		&self.main[..end]
	}

	/// Increments the segment at `index` dropping every segment after it.
	/// Missing segments count as `0` and a textual segment at `index` becomes `1`.
	pub fn bump(&self, index: usize) -> Version {
		let zero = VersionItem::Number(0);
		let mut items: Vec<String> = Vec::new();
		for i in 0..=index {
			let item = self.main.get(i).unwrap_or(&zero);
			if i < index {
				items.push(item.to_string());
			} else {
				match item {
					VersionItem::Number(n) => items.push((n + 1).to_string()),
					VersionItem::Text(_) => items.push("1".to_string()),
				}
			}
		}
		Version::new(&items.join("."))
	}

	/// The exclusive upper limit used by `^` and `~` range operators.
	pub fn upper_bound(&self, index: usize) -> Version {
		self.bump(index)
	}

	/// The version text used by semver package id mode.
	///
	/// Versions below `1.0` are never considered stable so they keep every segment.
	pub fn stable(&self) -> String {
		match self.major() {
			Some(VersionItem::Number(0)) | None => self.value.clone(),
			Some(major) => format!("{}.Y.Z", major),
		}
	}

	/// Fills the unspecified segments after `keep` with placeholders, `1.2.3` with `keep == 2` is `1.2.Z`.
	pub fn masked(&self, keep: usize) -> String {
		const PLACEHOLDERS: [&str; 3] = ["X", "Y", "Z"];
		let mut parts: Vec<String> = Vec::new();
		for i in 0..std::cmp::max(keep, 3) {
			if i < keep {
				parts.push(self.main.get(i).map(|v| v.to_string()).unwrap_or_else(|| "0".to_string()));
			} else if i < 3 {
				parts.push(PLACEHOLDERS[i].to_string());
			}
		}
		parts.join(".")
	}
}

impl From<&str> for Version {
	fn from(value: &str) -> Self {
		Version::new(value)
	}
}

impl From<String> for Version {
	fn from(value: String) -> Self {
		Version::new(&value)
	}
}

impl PartialEq for Version {
	fn eq(&self, other: &Self) -> bool {
		self.cmp(other) == std::cmp::Ordering::Equal
	}
}

impl Eq for Version {}

impl Ord for Version {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		use std::cmp::Ordering;
		let main = self.nonzero_items().cmp(other.nonzero_items());
		match (&self.pre, &other.pre) {
			(Some(a), Some(b)) => main.then_with(|| a.cmp(b)).then_with(|| self.build.cmp(&other.build)),
			/* A pre-release sorts before the release it leads up to */
			(Some(_), None) => if main == Ordering::Equal { Ordering::Less } else { main },
			(None, Some(_)) => if main == Ordering::Equal { Ordering::Greater } else { main },
			(None, None) => main.then_with(|| self.build.cmp(&other.build)),
		}
	}
}

impl PartialOrd for Version {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}

impl std::hash::Hash for Version {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.nonzero_items().hash(state);
		self.pre.hash(state);
		self.build.hash(state);
	}
}

impl std::fmt::Display for Version {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.value)
	}
}

impl Serialize for Version {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.value)
	}
}

impl<'de> Deserialize<'de> for Version {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let value = String::deserialize(deserializer)?;
		Ok(Version::new(&value))
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test] fn version_are_not_compared_lexically() { assert!(Version::new("1.2.4") < Version::new("1.2.10")) }
	#[test] fn version_short_version_is_lt() { assert!(Version::new("1.2") < Version::new("1.2.3")) }
	#[test] fn version_trailing_zeros_are_eq() { assert!(Version::new("1.0") == Version::new("1.0.0")) }
	#[test] fn version_higher_version_is_gt() { assert!(Version::new("1.2.3") < Version::new("1.2.4")) }
	#[test] fn version_prerelease_is_lt() { assert!(Version::new("1.0-pre") < Version::new("1.0")) }
	#[test] fn version_prerelease_of_next_is_gt() { assert!(Version::new("1.1-pre") > Version::new("1.0")) }
	#[test] fn version_text_is_compared_lexically() { assert!(Version::new("1.a") < Version::new("1.b")) }
	#[test] fn version_build_is_gt() { assert!(Version::new("1.0+1") > Version::new("1.0")) }
	#[test] fn version_range_detected() { assert!(Version::new("[>=1.0 <2]").is_range()) }
	#[test] fn version_bump() { assert_eq!(Version::new("1.2.3").bump(1).to_string(), "1.3") }
	#[test] fn version_stable_major() { assert_eq!(Version::new("1.2.3").stable(), "1.Y.Z") }
	#[test] fn version_stable_zero_major() { assert_eq!(Version::new("0.1").stable(), "0.1") }
	#[test] fn version_masked_minor() { assert_eq!(Version::new("1.2.3").masked(2), "1.2.Z") }
}
