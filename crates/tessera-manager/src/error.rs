use tessera_executor::CredentialError;
use tessera_graph::GraphError;
use tessera_resolver::ValidationError;
use tessera_store::StoreError;
use thiserror::Error;

/// Failures of [`crate::ExecutionManager::add_execution`] (§4.5 step 1-5).
/// None of these leave any state behind: a `GraphExecution` is only created
/// once every starting node's input has validated.
#[derive(Debug, Error)]
pub enum ManagerError {
  #[error(transparent)]
  Store(#[from] StoreError),

  #[error(transparent)]
  Graph(#[from] GraphError),

  #[error("node '{node_id}' declares credential field '{field}' with no value configured")]
  MissingCredential { node_id: String, field: String },

  #[error(transparent)]
  Credential(#[from] CredentialError),

  #[error("credential '{credential_id}' on node '{node_id}' does not match the field's declared provider/type")]
  CredentialMismatch { node_id: String, credential_id: String },

  #[error("node '{node_id}' is a webhook node but no payload was supplied for webhook '{webhook_id}'")]
  MissingWebhookPayload { node_id: String, webhook_id: String },

  #[error("starting node '{node_id}' failed input validation: {source}")]
  InputValidation { node_id: String, source: ValidationError },

  #[error("no starting node produced valid input for this run")]
  NoStartingNodes,
}
