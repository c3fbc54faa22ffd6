//! Classify transfer errors into short user-facing messages.
//!
//! Advisory only (for UI display); never a control-flow input.

use crate::transfer::TransferError;

/// Display class of a failed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Connectivity-style transport failure (DNS, connect, connection lost).
    Offline,
    /// Opaque transport failure with no actionable detail.
    Unknown,
    /// Everything else; the error's own description is shown verbatim.
    Other,
}

/// Classify a transfer error for display.
pub fn classify(e: &TransferError) -> ErrorClass {
    match e {
        TransferError::Transport(ce) => {
            if ce.is_couldnt_connect()
                || ce.is_couldnt_resolve_host()
                || ce.is_couldnt_resolve_proxy()
                || ce.is_recv_error()
                || ce.is_send_error()
                || ce.is_read_error()
            {
                ErrorClass::Offline
            } else {
                ErrorClass::Unknown
            }
        }
        _ => ErrorClass::Other,
    }
}

/// Short user-facing description of a failed transfer.
pub fn user_message(e: &TransferError) -> String {
    match classify(e) {
        ErrorClass::Offline => "No connection right now, please reconnect.".to_string(),
        ErrorClass::Unknown => "Something went wrong, please try again.".to_string(),
        ErrorClass::Other => e.to_string(),
    }
}
