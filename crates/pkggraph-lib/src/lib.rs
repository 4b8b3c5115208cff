//! Dependency graph resolution for recipe based package managers.
//!
//! [`GraphBuilder`] expands a root into the full graph of requirements, [`BinaryAnalyzer`] decides
//! how every binary is obtained and [`BuildOrder`] levels what has to be built.

pub mod error;
pub use error::Result;
pub use error::Error;

pub mod config;
pub use config::GraphConfig;

pub mod model;
pub mod graph;
pub use graph::DepsGraph;

pub mod provider;
pub mod lockfile;
pub use lockfile::Lockfile;

pub mod graph_builder;
pub use graph_builder::GraphBuilder;

pub mod binaries;
pub use binaries::BinaryAnalyzer;
pub use binaries::BuildPolicy;

pub mod build_order;
pub use build_order::BuildOrder;
