mod error_code;
mod session;
mod subject;

pub use error_code::*;
pub use session::*;
pub use subject::*;
