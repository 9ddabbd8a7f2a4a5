//! Client half of the session lifecycle.
//!
//! [`SessionCoordinator`] holds the access credential for one signed-in
//! subject and decides per failed response whether to refresh and retry
//! or to end the session. Concurrent callers share a single refresh.

mod classify;
mod coordinator;
mod error;
mod freshness;
mod logout;
mod storage;
mod transport;

pub use coordinator::*;
pub use error::*;
pub use freshness::*;
pub use logout::*;
pub use storage::*;
pub use transport::*;
