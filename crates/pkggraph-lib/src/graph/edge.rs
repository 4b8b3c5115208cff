use serde::{Serialize, Deserialize};
use crate::model::RequireId;

/// Weight of a graph edge, the edge points from the consumer to the dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
	pub require: RequireId,
	/// Creation order, petgraph doesn't keep edges of a node in insertion order.
	pub(crate) seq: usize,
}

impl Edge {
	pub fn seq(&self) -> usize {
		self.seq
	}
}
