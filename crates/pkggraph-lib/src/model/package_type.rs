use serde::*;

/// What kind of artifact a package produces, drives how requirement traits propagate.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageType {
	/// A library whose linkage is decided by the `shared` option.
	Library,
	StaticLibrary,
	SharedLibrary,
	HeaderLibrary,
	BuildScripts,
	Application,
	PythonRequire,
	/// A package carrying configuration only, it can't have dependencies.
	Configuration,
	#[default] Unknown,
}

impl PackageType {
	/// Resolves a generic `Library` with the package options.
	pub fn deduce(self, options: &std::collections::BTreeMap<String, String>) -> PackageType {
		if self != PackageType::Library {
			return self;
		}
		let enabled = |name: &str| matches!(options.get(name).map(|s| s.to_lowercase()).as_deref(), Some("true"));
		if enabled("header_only") {
			PackageType::HeaderLibrary
		} else if enabled("shared") {
			PackageType::SharedLibrary
		} else {
			PackageType::StaticLibrary
		}
	}

	pub fn is_linkable(self) -> bool {
		matches!(self, PackageType::StaticLibrary | PackageType::SharedLibrary | PackageType::HeaderLibrary | PackageType::Library)
	}
}

impl std::fmt::Display for PackageType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			PackageType::Library => "library",
			PackageType::StaticLibrary => "static-library",
			PackageType::SharedLibrary => "shared-library",
			PackageType::HeaderLibrary => "header-library",
			PackageType::BuildScripts => "build-scripts",
			PackageType::Application => "application",
			PackageType::PythonRequire => "python-require",
			PackageType::Configuration => "configuration",
			PackageType::Unknown => "unknown",
		};
		write!(f, "{}", s)
	}
}
