//! The HTTP/JSON RPC surface (§6) exposing the Execution Manager's two
//! operations — `add_execution` and `cancel_execution` — on
//! `execution_manager_port`. A thin `axum` layer: it does no validation of
//! its own, it just deserializes requests and forwards to
//! [`tessera_manager::ExecutionManager`], mapping [`ManagerError`] onto HTTP
//! status codes.

mod error;
mod routes;

pub use error::RpcError;
pub use routes::{router, AppState};
