//! CLI command handlers. Each command is in its own file.

mod clear;
mod get;
mod remove;
mod status;

pub use clear::run_clear;
pub use get::{run_get, GetArgs};
pub use remove::run_remove;
pub use status::run_status;
