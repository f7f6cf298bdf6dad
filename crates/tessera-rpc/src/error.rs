use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tessera_manager::ManagerError;

/// Maps [`ManagerError`] onto an HTTP status the way this ecosystem's
/// service layers do: client-caused failures (unknown graph, bad input,
/// missing credential) are 4xx, everything else is a 500.
pub struct RpcError(pub ManagerError);

impl From<ManagerError> for RpcError {
  fn from(err: ManagerError) -> Self {
    Self(err)
  }
}

impl IntoResponse for RpcError {
  fn into_response(self) -> Response {
    let status = match &self.0 {
      ManagerError::Store(tessera_store::StoreError::GraphNotFound(_))
      | ManagerError::Store(tessera_store::StoreError::GraphExecutionNotFound(_))
      | ManagerError::Store(tessera_store::StoreError::NodeExecutionNotFound(_))
      | ManagerError::Store(tessera_store::StoreError::NodeNotFound(_)) => StatusCode::NOT_FOUND,
      ManagerError::Graph(_)
      | ManagerError::MissingCredential { .. }
      | ManagerError::CredentialMismatch { .. }
      | ManagerError::MissingWebhookPayload { .. }
      | ManagerError::InputValidation { .. }
      | ManagerError::NoStartingNodes => StatusCode::BAD_REQUEST,
      ManagerError::Credential(_) => StatusCode::UNAUTHORIZED,
      ManagerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = axum::Json(json!({ "error": self.0.to_string() }));
    (status, body).into_response()
  }
}
