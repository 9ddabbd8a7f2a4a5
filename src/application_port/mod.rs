mod auth_service;
mod credential_service;
mod session_verifier;

pub use auth_service::*;
pub use credential_service::*;
pub use session_verifier::*;
