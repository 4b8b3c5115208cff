//! Value types shared by the resolver: references, versions, requirements and recipe metadata.

pub mod version;
pub use version::Version;

pub mod version_range;
pub use version_range::VersionRange;

pub mod reference;
pub use reference::RecipeReference;
pub use reference::PkgReference;
pub use reference::ReferenceError;

pub mod package_type;
pub use package_type::PackageType;

pub mod requirement;
pub use requirement::Requirement;
pub use requirement::RequireId;
pub use requirement::RequireKey;

pub mod recipe;
pub use recipe::Recipe;
pub use recipe::RequireDecl;

pub mod profile;
pub use profile::Profile;

pub mod info;
pub use info::PackageInfo;
pub use info::PackageIdMode;
