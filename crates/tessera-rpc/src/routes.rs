use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use tessera_manager::{AddExecutionRequest, ExecutionManager};
use tessera_graph::GraphExecutionEntry;
use tower_http::trace::TraceLayer;

use crate::error::RpcError;

/// Everything a request handler needs: one shared [`ExecutionManager`]
/// behind the `Clone` it already implements internally (§4.5).
#[derive(Clone)]
pub struct AppState {
  pub manager: ExecutionManager,
}

/// The service RPC surface (§6): `add_execution` and `cancel_execution`
/// over HTTP/JSON, in the style the pack's server examples expose their
/// service layer (one router, one trace layer, JSON bodies in and out).
pub fn router(state: AppState) -> Router {
  Router::new()
    .route("/v1/executions", post(add_execution))
    .route("/v1/executions/{graph_exec_id}/cancel", post(cancel_execution))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

async fn add_execution(
  State(state): State<AppState>,
  Json(req): Json<AddExecutionRequest>,
) -> Result<(StatusCode, Json<GraphExecutionEntry>), RpcError> {
  let entry = state.manager.add_execution(req).await?;
  Ok((StatusCode::CREATED, Json(entry)))
}

async fn cancel_execution(
  State(state): State<AppState>,
  Path(graph_exec_id): Path<String>,
) -> Result<StatusCode, RpcError> {
  state.manager.cancel_execution(&graph_exec_id).await?;
  Ok(StatusCode::NO_CONTENT)
}
