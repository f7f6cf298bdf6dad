use serde::{Deserialize, Serialize};
use tessera_graph::{GraphExecution, NodeExecution};

/// Lightweight graph identity, returned where a full `Graph` isn't needed
/// (notification payloads, listing) (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphMetadata {
  pub graph_id: String,
  pub name: String,
}

/// Pushed through `DatabaseManager::send_execution_update`'s broadcast
/// channel (§6) so RPC subscribers and the notification sink can observe
/// execution state without polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExecutionUpdate {
  Graph(GraphExecution),
  Node(NodeExecution),
}

/// Returned by `create_graph_execution`: the freshly created graph execution
/// plus the seeded `INCOMPLETE` node executions for every starting node
/// (§4.5 step 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedGraphExecution {
  pub graph_exec: GraphExecution,
  pub node_executions: Vec<NodeExecution>,
}
