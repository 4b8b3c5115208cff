//! Version range expressions, `[>=1.0 <2.0]`, `[^1.2]`, `[~1.2]`, `[*]`, `[1.0 || 2.0]`.
//!
//! A range is a list of alternatives (`||`), each alternative a list of conditions
//! that must all hold. A trailing `, include_prerelease` lets pre-release versions match.

use super::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
	Greater,
	GreaterEq,
	Less,
	LessEq,
	Equal,
}

impl std::fmt::Display for Operator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			Operator::Greater => ">",
			Operator::GreaterEq => ">=",
			Operator::Less => "<",
			Operator::LessEq => "<=",
			Operator::Equal => "=",
		};
		write!(f, "{}", s)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
	pub operator: Operator,
	pub version: Version,
}

impl Condition {
	fn new(operator: Operator, version: Version) -> Self {
		Condition { operator, version }
	}

	fn holds(&self, version: &Version) -> bool {
		match self.operator {
			Operator::Greater => version > &self.version,
			Operator::GreaterEq => version >= &self.version,
			Operator::Less => version < &self.version,
			Operator::LessEq => version <= &self.version,
			Operator::Equal => version == &self.version,
		}
	}

	fn is_lower(&self) -> bool {
		matches!(self.operator, Operator::Greater | Operator::GreaterEq | Operator::Equal)
	}

	fn is_upper(&self) -> bool {
		matches!(self.operator, Operator::Less | Operator::LessEq | Operator::Equal)
	}

	fn is_inclusive(&self) -> bool {
		matches!(self.operator, Operator::GreaterEq | Operator::LessEq | Operator::Equal)
	}

	fn as_lower(&self) -> Condition {
		match self.operator {
			Operator::Equal => Condition::new(Operator::GreaterEq, self.version.clone()),
			_ => self.clone(),
		}
	}

	fn as_upper(&self) -> Condition {
		match self.operator {
			Operator::Equal => Condition::new(Operator::LessEq, self.version.clone()),
			_ => self.clone(),
		}
	}
}

impl std::fmt::Display for Condition {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}{}", self.operator, self.version)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionSet {
	pub conditions: Vec<Condition>,
}

impl ConditionSet {
	fn parse(expression: &str) -> crate::Result<Self> {
		let mut conditions = Vec::new();
		for token in expression.split_whitespace() {
			conditions.extend(parse_condition(token)?);
		}
		Ok(ConditionSet { conditions })
	}

	fn contains(&self, version: &Version) -> bool {
		self.conditions.iter().all(|c| c.holds(version))
	}

	/// The strictest lower limit of both sets.
	fn lower_limit<'a>(&'a self, other: &'a ConditionSet) -> Option<Condition> {
		self.conditions.iter().chain(other.conditions.iter())
			.filter(|c| c.is_lower())
			.map(|c| c.as_lower())
			.max_by(|a, b| a.version.cmp(&b.version).then_with(|| b.is_inclusive().cmp(&a.is_inclusive())))
	}

	/// The strictest upper limit of both sets.
	fn upper_limit<'a>(&'a self, other: &'a ConditionSet) -> Option<Condition> {
		self.conditions.iter().chain(other.conditions.iter())
			.filter(|c| c.is_upper())
			.map(|c| c.as_upper())
			.min_by(|a, b| a.version.cmp(&b.version).then_with(|| a.is_inclusive().cmp(&b.is_inclusive())))
	}
}

fn parse_condition(token: &str) -> crate::Result<Vec<Condition>> {
	if token == "*" {
		return Ok(vec![Condition::new(Operator::GreaterEq, Version::new("0.0.0"))]);
	}
	let (operator, version) = if let Some(v) = token.strip_prefix(">=") {
		(">=", v)
	} else if let Some(v) = token.strip_prefix("<=") {
		("<=", v)
	} else if let Some(v) = token.strip_prefix('>') {
		(">", v)
	} else if let Some(v) = token.strip_prefix('<') {
		("<", v)
	} else if let Some(v) = token.strip_prefix('^') {
		("^", v)
	} else if let Some(v) = token.strip_prefix('~') {
		("~", v)
	} else if let Some(v) = token.strip_prefix('=') {
		("=", v)
	} else {
		("=", token)
	};
	if version.is_empty() {
		return Err(crate::Error::Parse(format!("Error parsing version range '{}'", token)));
	}
	let v = Version::new(version);
	let conditions = match operator {
		">=" => vec![Condition::new(Operator::GreaterEq, v)],
		"<=" => vec![Condition::new(Operator::LessEq, v)],
		">" => vec![Condition::new(Operator::Greater, v)],
		"<" => vec![Condition::new(Operator::Less, v)],
		"~" => {
			let index = if v.main().len() > 1 { 1 } else { 0 };
			let upper = v.upper_bound(index);
			vec![Condition::new(Operator::GreaterEq, v), Condition::new(Operator::Less, upper)]
		},
		"^" => {
			let index = v.main().iter()
				.position(|item| *item != super::version::VersionItem::Number(0))
				.unwrap_or(v.main().len());
			let upper = v.upper_bound(index);
			vec![Condition::new(Operator::GreaterEq, v), Condition::new(Operator::Less, upper)]
		},
		_ => vec![Condition::new(Operator::Equal, v)],
	};
	Ok(conditions)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
	expression: String,
	condition_sets: Vec<ConditionSet>,
	prerelease: bool,
}

impl VersionRange {
	/// Parses a range with or without the surrounding brackets.
	pub fn new(expression: &str) -> crate::Result<Self> {
		let expression = expression.trim();
		let expression = expression.strip_prefix('[').and_then(|e| e.strip_suffix(']')).unwrap_or(expression);
		let mut tokens = expression.split(',');
		let version_expr = tokens.next().unwrap_or_default();
		let prerelease = tokens.any(|t| t.trim() == "include_prerelease");
		let condition_sets = version_expr.split("||")
			.map(ConditionSet::parse)
			.collect::<crate::Result<Vec<_>>>()?;
		Ok(VersionRange {
			expression: expression.to_string(),
			condition_sets,
			prerelease,
		})
	}

	pub fn condition_sets(&self) -> &[ConditionSet] {
		&self.condition_sets
	}

	pub fn include_prerelease(&self) -> bool {
		self.prerelease
	}

	/// Pre-release versions only match when the range opts in or `resolve_prereleases` forces it.
	pub fn contains(&self, version: &Version, resolve_prereleases: bool) -> bool {
		if version.pre().is_some() && !(self.prerelease || resolve_prereleases) {
			return false;
		}
		self.condition_sets.iter().any(|set| set.contains(version))
	}

	/// The range satisfied by both ranges, `None` when they are disjoint.
	pub fn intersection(&self, other: &VersionRange) -> Option<VersionRange> {
		let mut sets: Vec<ConditionSet> = Vec::new();
		for lhs in &self.condition_sets {
			for rhs in &other.condition_sets {
				let lower = lhs.lower_limit(rhs);
				let upper = lhs.upper_limit(rhs);
				let valid = match (&lower, &upper) {
					(Some(l), Some(u)) => match l.version.cmp(&u.version) {
						std::cmp::Ordering::Less => true,
						std::cmp::Ordering::Equal => l.is_inclusive() && u.is_inclusive(),
						std::cmp::Ordering::Greater => false,
					},
					_ => true,
				};
				if !valid {
					continue;
				}
				let conditions: Vec<Condition> = lower.into_iter().chain(upper).collect();
				if conditions.is_empty() {
					sets.push(ConditionSet { conditions: vec![Condition::new(Operator::GreaterEq, Version::new("0.0.0"))] });
				} else {
					sets.push(ConditionSet { conditions });
				}
			}
		}
		if sets.is_empty() {
			return None;
		}
		let prerelease = self.prerelease && other.prerelease;
		let mut expression = sets.iter()
			.map(|s| s.conditions.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(" "))
			.collect::<Vec<_>>()
			.join(" || ");
		if prerelease {
			expression.push_str(", include_prerelease");
		}
		Some(VersionRange {
			expression,
			condition_sets: sets,
			prerelease,
		})
	}

	/// The range as a bracketed version, suitable to put back into a reference.
	pub fn version(&self) -> Version {
		Version::new(&format!("[{}]", self.expression))
	}
}

impl std::fmt::Display for VersionRange {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.expression)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn range(s: &str) -> VersionRange { VersionRange::new(s).unwrap() }

	#[test] fn range_contains_within() { assert!(range("[>=1.0 <2.0]").contains(&Version::new("1.5"), false)) }
	#[test] fn range_excludes_upper() { assert!(!range("[>=1.0 <2.0]").contains(&Version::new("2.0"), false)) }
	#[test] fn range_any() { assert!(range("[*]").contains(&Version::new("0.1"), false)) }
	#[test] fn range_alternatives() { assert!(range("[1.0 || 2.0]").contains(&Version::new("2.0"), false)) }
	#[test] fn range_caret() { assert!(!range("[^1.2]").contains(&Version::new("2.0"), false)) }
	#[test] fn range_caret_zero_major() { assert!(!range("[^0.1]").contains(&Version::new("0.2"), false)) }
	#[test] fn range_tilde() { assert!(range("[~1.2]").contains(&Version::new("1.2.9"), false)) }
	#[test] fn range_tilde_excludes_next_minor() { assert!(!range("[~1.2]").contains(&Version::new("1.3"), false)) }
	#[test] fn range_prerelease_excluded_by_default() { assert!(!range("[>=1.0]").contains(&Version::new("1.1-pre"), false)) }
	#[test] fn range_prerelease_opt_in() { assert!(range("[>=1.0, include_prerelease]").contains(&Version::new("1.1-pre"), false)) }
	#[test] fn range_prerelease_forced() { assert!(range("[>=1.0]").contains(&Version::new("1.1-pre"), true)) }
	#[test] fn range_intersection_disjoint() { assert!(range("[<1.0]").intersection(&range("[>=2.0]")).is_none()) }
	#[test] fn range_intersection_overlap() { assert_eq!(range("[>=1.0 <3.0]").intersection(&range("[>=2.0]")).unwrap().to_string(), ">=2.0 <3.0") }
	#[test] fn range_intersection_single_point() { assert!(range("[>=1.0 <=2.0]").intersection(&range("[>=2.0]")).unwrap().contains(&Version::new("2.0"), false)) }
	#[test] fn range_version_is_bracketed() { assert_eq!(range(">=1.0").version().to_string(), "[>=1.0]") }
}
