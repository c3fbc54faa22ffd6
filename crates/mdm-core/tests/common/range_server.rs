//! Minimal HTTP/1.1 server for integration tests: open-ended Range GET over a
//! set of static files, with a request log and fault injection.
//!
//! Responds 206 Partial Content to `Range: bytes=N-` with N > 0 and 200 OK
//! otherwise. Every GET is recorded (path, range offset, Authorization) so
//! tests can assert on the wire traffic.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

/// One observed GET request.
#[derive(Debug, Clone)]
pub struct LoggedRequest {
    pub path: String,
    pub range_offset: Option<u64>,
    pub authorization: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ServerOptions {
    /// The first N GETs answer `500 Internal Server Error` before the body
    /// is ever served.
    pub fail_first: usize,
    /// Serve only this many body bytes while advertising the full
    /// Content-Length, so the client sees a short read.
    pub truncate_to: Option<usize>,
    /// Hold every response until `TestServer::release` is called, so tests
    /// can observe downloads in flight.
    pub hold: bool,
}

struct Gate {
    open: Mutex<bool>,
    cv: Condvar,
}

impl Gate {
    fn new(open: bool) -> Self {
        Self {
            open: Mutex::new(open),
            cv: Condvar::new(),
        }
    }

    fn wait_open(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.cv.wait(open).unwrap();
        }
    }

    fn release(&self) {
        *self.open.lock().unwrap() = true;
        self.cv.notify_all();
    }
}

struct Shared {
    files: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<LoggedRequest>>,
    failures_left: AtomicUsize,
    truncate_to: Option<usize>,
    gate: Gate,
}

/// Handle to a running test server. The listener thread runs until the
/// process exits.
pub struct TestServer {
    base_url: String,
    shared: Arc<Shared>,
}

impl TestServer {
    /// Absolute URL for a served path, e.g. `url("/model.gguf")`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Snapshot of all GETs seen so far, in arrival order.
    pub fn requests(&self) -> Vec<LoggedRequest> {
        self.shared.requests.lock().unwrap().clone()
    }

    /// Number of GETs for one path.
    pub fn hits(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path == path).count()
    }

    /// Open the hold gate so held responses proceed.
    pub fn release(&self) {
        self.shared.gate.release();
    }
}

/// Starts a server serving `files` (path, body) pairs with default options.
pub fn start(files: Vec<(&str, Vec<u8>)>) -> TestServer {
    start_with_options(files, ServerOptions::default())
}

pub fn start_with_options(files: Vec<(&str, Vec<u8>)>, opts: ServerOptions) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let shared = Arc::new(Shared {
        files: files
            .into_iter()
            .map(|(p, body)| (format!("/{}", p.trim_start_matches('/')), body))
            .collect(),
        requests: Mutex::new(Vec::new()),
        failures_left: AtomicUsize::new(opts.fail_first),
        truncate_to: opts.truncate_to,
        gate: Gate::new(!opts.hold),
    });
    let accept_shared = Arc::clone(&shared);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let shared = Arc::clone(&accept_shared);
            thread::spawn(move || handle(stream, &shared));
        }
    });
    TestServer {
        base_url: format!("http://127.0.0.1:{}/", port),
        shared,
    }
}

fn handle(mut stream: TcpStream, shared: &Shared) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let Some(parsed) = parse_request(request) else {
        return;
    };
    if !parsed.method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
        return;
    }
    shared.requests.lock().unwrap().push(LoggedRequest {
        path: parsed.path.clone(),
        range_offset: parsed.range_offset,
        authorization: parsed.authorization,
    });

    shared.gate.wait_open();

    if shared
        .failures_left
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
    {
        let _ = stream
            .write_all(b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 5\r\n\r\noops\n");
        return;
    }

    let Some(body) = shared.files.get(&parsed.path) else {
        let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n");
        return;
    };
    let total = body.len() as u64;
    let offset = parsed.range_offset.unwrap_or(0).min(total);
    let slice = &body[offset as usize..];
    let advertised = slice.len();
    let sent = match shared.truncate_to {
        Some(limit) => &slice[..limit.min(slice.len())],
        None => slice,
    };
    let (status, content_range) = if offset > 0 {
        (
            "206 Partial Content",
            format!(
                "Content-Range: bytes {}-{}/{}\r\n",
                offset,
                total.saturating_sub(1),
                total
            ),
        )
    } else {
        ("200 OK", String::new())
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nAccept-Ranges: bytes\r\n{}Connection: close\r\n\r\n",
        status, advertised, content_range
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.write_all(sent);
}

struct ParsedRequest {
    method: String,
    path: String,
    range_offset: Option<u64>,
    authorization: Option<String>,
}

/// Parses the request line plus the `Range: bytes=N-` and `Authorization`
/// headers. Only open-ended ranges are understood.
fn parse_request(request: &str) -> Option<ParsedRequest> {
    let mut lines = request.lines();
    let request_line = lines.next()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();
    let mut range_offset = None;
    let mut authorization = None;
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if name.trim().eq_ignore_ascii_case("range") {
            if let Some(spec) = value.strip_prefix("bytes=") {
                if let Some(start) = spec.trim().strip_suffix('-') {
                    range_offset = start.parse::<u64>().ok();
                }
            }
        } else if name.trim().eq_ignore_ascii_case("authorization") {
            authorization = Some(value.to_string());
        }
    }
    Some(ParsedRequest {
        method,
        path,
        range_offset,
        authorization,
    })
}
