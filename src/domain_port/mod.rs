// store

mod otp_store;
mod refresh_store;

pub use otp_store::*;
pub use refresh_store::*;

// repo

mod subject_repo;

pub use subject_repo::*;

// outbound

mod otp_sender;

pub use otp_sender::*;
