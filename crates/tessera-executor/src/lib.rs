//! The node executor (§4.2) and the credential-store consumed interface
//! (§6) for the tessera execution engine.

mod credentials;
mod executor;
mod static_credentials;

pub use credentials::{CredentialError, CredentialStore};
pub use executor::{NodeExecutor, RunOutcome};
pub use static_credentials::StaticCredentialStore;
