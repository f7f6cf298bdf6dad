//! The data-flow resolver (§4.1) and input validation (§4.6) for the
//! tessera execution engine.

mod error;
mod resolver;
mod validate;

pub use error::ResolverError;
pub use resolver::Resolver;
pub use validate::{validate_input, ValidationError};
