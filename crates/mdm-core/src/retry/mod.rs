//! Retry policy and user-facing error classification.
//!
//! Retries belong exclusively to the per-artifact orchestrator: the transfer
//! primitive never retries itself. Foreground retries are bounded; while the
//! host is backgrounded, retries continue without bound but with exponential
//! backoff between attempts so an unreachable server is not hammered.

mod classify;
mod policy;

pub use classify::{classify, user_message, ErrorClass};
pub use policy::RetryPolicy;
