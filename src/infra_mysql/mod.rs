mod refresh_store_mysql;
mod subject_repo_mysql;

pub use refresh_store_mysql::*;
pub use subject_repo_mysql::*;

mod util;
