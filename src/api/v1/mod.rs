mod cookie;
mod error;
mod handler;
mod router;

pub use cookie::{CookiePolicy, REFRESH_COOKIE};
pub use error::{ApiError, recover_error};
pub use router::{
    routes, with_admin, with_any_permission, with_permission, with_permissions, with_session,
};
