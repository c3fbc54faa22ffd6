pub mod config;
pub mod logging;

pub mod artifact;
pub mod download;
pub mod host;
pub mod progress;
pub mod registry;
pub mod retry;
pub mod scheduler;
pub mod storage;
pub mod transfer;
