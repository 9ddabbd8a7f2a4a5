mod auth_service_impl;
mod credential_service_impl;
mod jwt_codec;
mod otp_sender_log;
mod password_hasher;
mod session_verifier_impl;

pub use auth_service_impl::{IssuerPolicy, RealAuthService};
pub use credential_service_impl::*;
pub use jwt_codec::*;
pub use otp_sender_log::*;
pub use password_hasher::*;
pub use session_verifier_impl::*;
