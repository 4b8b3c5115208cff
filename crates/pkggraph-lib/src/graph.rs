//! The resolved dependency graph.
//!
//! A [`DepsGraph`] owns every [`Node`] and every [`Requirement`](crate::model::Requirement)
//! created while it is expanded. Nodes live in a petgraph `StableDiGraph` so they keep their
//! index for the lifetime of the graph, edges point from the consumer to the dependency and
//! carry the handle of the requirement that created them.
//!
//! The transitive propagation engine lives in `propagation` as methods on `DepsGraph`:
//! [`DepsGraph::check_downstream_exists`], [`DepsGraph::propagate_downstream`],
//! [`DepsGraph::propagate_closing_loop`] and [`DepsGraph::check_loops`].

pub use petgraph::stable_graph::NodeIndex;

mod node;
pub use node::Node;
pub use node::Context;
pub use node::RecipeStatus;
pub use node::BinaryStatus;
pub use node::TransitiveRequirement;
pub use node::Dependants;

mod edge;
pub use edge::Edge;

mod error;
pub use error::GraphError;

mod deps_graph;
pub use deps_graph::DepsGraph;
pub use deps_graph::OptionsConflict;

mod propagation;
pub use propagation::DownstreamMatch;

pub mod overrides;
pub use overrides::Overrides;
