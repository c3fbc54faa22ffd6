//! Resumable single-file HTTP transfer.
//!
//! One `run` call moves one remote file to one local path, resuming from
//! whatever is already on disk via `Range: bytes=<offset>-`, appending to the
//! destination (never truncating), and reporting per-chunk progress with a
//! once-per-second instantaneous speed sample. Blocking; callers run it on a
//! worker thread. Retries are the caller's business, never this module's.

mod error;

pub use error::TransferError;

use crate::progress::TransferProgress;
use crate::storage;
use std::fs::File;
use std::io::Write;
use std::str;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use url::Url;

/// Mutable state owned by one running transfer. Created on `run`, dropped
/// when it returns; never shared across transfers.
struct TransferState {
    file: File,
    /// Bytes on disk when the transfer started (the resume offset).
    start_offset: u64,
    /// Total bytes written including the resume offset.
    bytes_written: u64,
    /// `Content-Length + offset`; 0 until response headers are seen.
    total_expected: u64,
    /// Content-Length parsed from the current header block.
    content_length: Option<u64>,
    /// Status code of the current header block (redirects overwrite it).
    http_status: u32,
    /// Rolling 1-second speed window.
    window_start: Instant,
    window_bytes: u64,
    speed_bps: f64,
    /// Local write failure captured inside the curl callback.
    write_error: Option<std::io::Error>,
    /// Non-2xx final status captured inside the curl callback.
    http_error: Option<u32>,
}

impl TransferState {
    fn progress(&self) -> TransferProgress {
        TransferProgress {
            bytes_written: self.bytes_written,
            total_expected: self.total_expected,
            speed_bps: self.speed_bps,
        }
    }
}

/// Downloads `url` to `dest`, resuming from the current size of `dest`.
///
/// Sends `Range: bytes=<offset>-` (also at offset 0) and, when `token` is
/// present, `Authorization: Bearer <token>`. `on_progress` fires after each
/// chunk. Cancellation is cooperative via `abort`: once set, no further
/// progress callbacks are delivered and the partial file is left intact.
/// Returns the total bytes on disk (offset included) on success.
pub fn run<F>(
    url: &str,
    dest: &std::path::Path,
    token: Option<&str>,
    abort: &Arc<AtomicBool>,
    mut on_progress: F,
) -> Result<u64, TransferError>
where
    F: FnMut(TransferProgress),
{
    // Fail fast before any I/O.
    let parsed = Url::parse(url).map_err(|_| TransferError::InvalidUrl(url.to_string()))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(TransferError::InvalidUrl(url.to_string()));
    }

    let offset = storage::file_size(dest);
    let file = File::options().create(true).append(true).open(dest)?;

    let state = Arc::new(Mutex::new(TransferState {
        file,
        start_offset: offset,
        bytes_written: offset,
        total_expected: 0,
        content_length: None,
        http_status: 0,
        window_start: Instant::now(),
        window_bytes: 0,
        speed_bps: 0.0,
        write_error: None,
        http_error: None,
    }));

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(Duration::from_secs(30))?;
    // Stall detection only: abort if throughput drops below 1 KiB/s for 60s.
    // No wall-clock timeout; a stalled transfer surfaces as an unknown ETA
    // first and a low-speed abort eventually.
    easy.low_speed_limit(1024)?;
    easy.low_speed_time(Duration::from_secs(60))?;
    // Always request from the resume offset, also at 0.
    easy.range(&format!("{}-", offset))?;

    if let Some(token) = token {
        let mut list = curl::easy::List::new();
        list.append(&format!("Authorization: Bearer {}", token.trim()))?;
        easy.http_headers(list)?;
    }

    {
        let header_state = Arc::clone(&state);
        let write_state = Arc::clone(&state);
        let write_abort = Arc::clone(abort);

        let mut transfer = easy.transfer();
        transfer.header_function(move |line| {
            if let Ok(line) = str::from_utf8(line) {
                let mut s = header_state.lock().unwrap();
                parse_header_line(&mut s, line.trim());
            }
            true
        })?;
        transfer.write_function(move |data| {
            if write_abort.load(Ordering::Relaxed) {
                return Ok(0);
            }
            let mut s = write_state.lock().unwrap();

            // First chunk after headers: lock in the expected total and do
            // not write error bodies into the partial file.
            if s.http_status >= 400 {
                let code = s.http_status;
                s.http_error = Some(code);
                return Ok(0);
            }
            if s.total_expected == 0 {
                if let Some(len) = s.content_length {
                    s.total_expected = len + s.start_offset;
                }
            }

            if let Err(e) = s.file.write_all(data) {
                s.write_error = Some(e);
                return Ok(0);
            }
            s.bytes_written += data.len() as u64;
            s.window_bytes += data.len() as u64;

            let elapsed = s.window_start.elapsed();
            if elapsed >= Duration::from_secs(1) {
                s.speed_bps = s.window_bytes as f64 / elapsed.as_secs_f64();
                s.window_bytes = 0;
                s.window_start = Instant::now();
            }

            on_progress(s.progress());
            Ok(data.len())
        })?;

        if let Err(e) = transfer.perform() {
            if abort.load(Ordering::Relaxed) {
                return Err(TransferError::Cancelled);
            }
            let mut s = state.lock().unwrap();
            if let Some(io_err) = s.write_error.take() {
                return Err(TransferError::Filesystem(io_err));
            }
            if let Some(code) = s.http_error.take() {
                return Err(TransferError::Http(code));
            }
            return Err(TransferError::Transport(e));
        }
    }

    if abort.load(Ordering::Relaxed) {
        return Err(TransferError::Cancelled);
    }

    let code = easy.response_code()?;
    if !(200..300).contains(&code) {
        return Err(TransferError::Http(code));
    }

    let s = state.lock().unwrap();
    if s.total_expected > 0 && s.bytes_written < s.total_expected {
        // Servers that silently truncate must not be reported as success.
        return Err(TransferError::Incomplete {
            expected: s.total_expected,
            received: s.bytes_written,
        });
    }
    Ok(s.bytes_written)
}

/// Updates header-block state from one trimmed header line. A new status
/// line (redirect hop) resets the pending Content-Length.
fn parse_header_line(s: &mut TransferState, line: &str) {
    if line.starts_with("HTTP/") {
        s.content_length = None;
        s.http_status = line
            .split_whitespace()
            .nth(1)
            .and_then(|c| c.parse().ok())
            .unwrap_or(0);
        return;
    }
    if let Some((name, value)) = line.split_once(':') {
        if name.trim().eq_ignore_ascii_case("content-length") {
            s.content_length = value.trim().parse().ok();
        }
    }
}
