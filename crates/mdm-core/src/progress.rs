//! Progress snapshots and display formatting.
//!
//! A `TransferProgress` covers one file transfer; `ArtifactProgress` is the
//! aggregate over an artifact's primary + companion files. ETA is derived
//! from the same speed value that is reported, so the two stay consistent.

/// Snapshot of one file transfer. `bytes_written` includes the resume offset;
/// `total_expected` is 0 until response headers have been seen.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferProgress {
    pub bytes_written: u64,
    pub total_expected: u64,
    /// Instantaneous speed from the rolling 1-second window, in bytes/sec.
    pub speed_bps: f64,
}

impl TransferProgress {
    /// Fraction complete in [0.0, 1.0]; 0.0 until the total is known.
    pub fn fraction(&self) -> f64 {
        if self.total_expected == 0 {
            return 0.0;
        }
        (self.bytes_written as f64 / self.total_expected as f64).clamp(0.0, 1.0)
    }

    /// Estimated seconds remaining (None when the speed is 0 or unknown).
    pub fn eta_secs(&self) -> Option<f64> {
        eta(self.total_expected.saturating_sub(self.bytes_written), self.speed_bps)
    }
}

/// Aggregate snapshot for one artifact across both of its files.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactProgress {
    pub bytes_written: u64,
    pub total_bytes: u64,
    pub speed_bps: f64,
}

impl ArtifactProgress {
    /// Fraction complete in [0.0, 1.0]; 0.0 until the total is known.
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.bytes_written as f64 / self.total_bytes as f64).clamp(0.0, 1.0)
    }

    /// Estimated seconds remaining (None when the speed is 0 or unknown).
    pub fn eta_secs(&self) -> Option<f64> {
        eta(self.total_bytes.saturating_sub(self.bytes_written), self.speed_bps)
    }
}

fn eta(remaining: u64, speed_bps: f64) -> Option<f64> {
    if remaining == 0 {
        return Some(0.0);
    }
    if !(speed_bps > 0.0) || !speed_bps.is_finite() {
        return None;
    }
    Some(remaining as f64 / speed_bps)
}

/// "1.23 KB" / "4.56 MB" / "7.89 GB".
pub fn format_bytes(bytes: u64) -> String {
    let k = bytes as f64 / 1024.0;
    let m = k / 1024.0;
    let g = m / 1024.0;
    if g > 1.0 {
        format!("{:.2} GB", g)
    } else if m > 1.0 {
        format!("{:.2} MB", m)
    } else {
        format!("{:.2} KB", k)
    }
}

/// "1.23 MB/s" / "456.00 KB/s".
pub fn format_speed(speed_bps: f64) -> String {
    let k = speed_bps / 1024.0;
    let m = k / 1024.0;
    if m > 1.0 {
        format!("{:.2} MB/s", m)
    } else {
        format!("{:.2} KB/s", k)
    }
}

/// "HH:MM:SS", or "--:--:--" when the ETA is unknown.
pub fn format_eta(eta_secs: Option<f64>) -> String {
    match eta_secs {
        Some(secs) if secs.is_finite() => {
            let total = secs as u64;
            let hours = total / 3600;
            let mins = (total % 3600) / 60;
            let s = total % 60;
            format!("{:02}:{:02}:{:02}", hours, mins, s)
        }
        _ => "--:--:--".to_string(),
    }
}
