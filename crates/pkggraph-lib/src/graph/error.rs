use petgraph::prelude::*;
use thiserror::Error;
use crate::model::RecipeReference;

fn conflict_message(node_ref: &Option<RecipeReference>, require: &RecipeReference, prev_require: &RecipeReference) -> String {
	let mut message = format!("Version conflict: Conflict between {} and {} in the graph.", require, prev_require);
	if let Some(node_ref) = node_ref {
		message.push_str(&format!("\nConflict originates from {}", node_ref));
	}
	message
}

#[derive(Debug, Clone, Error)]
pub enum GraphError {
	/// Two branches of the graph require incompatible references of the same package.
	#[error("{}", conflict_message(.node_ref, .require, .prev_require))]
	Conflict {
		/// The node whose requirement could not be satisfied.
		node: NodeIndex,
		node_ref: Option<RecipeReference>,
		require: RecipeReference,
		/// The already resolved node, `None` when the previous requirement wasn't expanded yet.
		prev_node: Option<NodeIndex>,
		prev_require: RecipeReference,
		/// Where the previous requirement was found.
		base_previous: NodeIndex,
		base_previous_ref: Option<RecipeReference>,
	},
	#[error("There is a cycle/loop in the graph:\n    Initial ancestor: {ancestor}\n    Require: {require}\n    Dependency: {node}")]
	Loop {
		node: String,
		require: RecipeReference,
		ancestor: String,
	},
	#[error("Package '{require}' not resolved: {message}")]
	Missing {
		node: String,
		require: RecipeReference,
		message: String,
	},
	#[error("{node} has {count} dependants and no source to propagate through")]
	AmbiguousPropagation {
		node: String,
		count: usize,
	},
}

impl GraphError {
	/// Errors kept in the graph so the partial result can still be inspected.
	pub fn is_stored(&self) -> bool {
		matches!(self, GraphError::Conflict { .. } | GraphError::Loop { .. })
	}

	pub fn serialize(&self) -> serde_json::Value {
		match self {
			GraphError::Conflict { node, node_ref, require, prev_node, prev_require, base_previous, base_previous_ref } => {
				let label = |r: &Option<RecipeReference>| r.as_ref().map(|r| r.repr_notime());
				serde_json::json!({
					"type": "conflict",
					"name": require.name,
					"branch1": {
						"src_id": base_previous.index().to_string(),
						"src_ref": label(base_previous_ref),
						"dst_id": prev_node.map(|n| n.index().to_string()),
						"require": prev_require.repr_notime(),
					},
					"branch2": {
						"src_id": node.index().to_string(),
						"src_ref": label(node_ref),
						"require": require.repr_notime(),
					},
				})
			},
			GraphError::Loop { .. } => serde_json::json!({ "type": "loop", "description": self.to_string() }),
			GraphError::Missing { .. } => serde_json::json!({ "type": "missing", "description": self.to_string() }),
			GraphError::AmbiguousPropagation { .. } => serde_json::json!({ "type": "propagation", "description": self.to_string() }),
		}
	}
}
