//! Library error type.

pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	#[error("JSON error: {0}")]
	SerdeJSON(#[from] serde_json::Error),
	#[error("parsing error: {0}")]
	Parse(String),
	#[error("reference error: {0}")]
	Reference(#[from] crate::model::ReferenceError),
	#[error("{0}")]
	Graph(#[from] crate::graph::GraphError),
	#[error("recipe provider error: {0}")]
	Provider(#[from] crate::provider::ProviderError),
	#[error("lockfile error: {0}")]
	Lockfile(#[from] crate::lockfile::LockfileError),
	#[error("build order error: {0}")]
	BuildOrder(#[from] crate::build_order::BuildOrderError),
	/// A resolved package violates a structural constraint of its package type.
	#[error("package type error: {0}")]
	PackageType(String),
	#[error("duplicated requirement: {0}")]
	DuplicatedRequirement(String),
	#[error("package id of {node} is already {existing}, refusing to set {new}")]
	PackageIdAlreadySet {
		node: String,
		existing: String,
		new: String,
	},
	#[error("validation error: {0}")]
	Validation(String),
}
