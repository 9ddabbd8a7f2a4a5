mod otp_store_memory;
mod refresh_store_memory;
mod subject_repo_memory;

pub use otp_store_memory::*;
pub use refresh_store_memory::*;
pub use subject_repo_memory::*;
