//! Minimal HTTP/1.1 server with Range support and fault injection for
//! integration tests.
//!
//! Serves a single static body for every path. GET honours `Range: bytes=N-`
//! with 206 (or 416 past the end). Faults are applied to the first GET
//! requests in arrival order; every GET's `Range` header is recorded.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RangeServerOptions {
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// If false, responses carry no Content-Length (body ends at close).
    pub send_content_length: bool,
    /// Answer every GET with this status and an empty body.
    pub status: Option<u16>,
    /// The first N GETs are closed without a response.
    pub fail_first: usize,
    /// The first N GETs send full headers but only `truncate_at` body bytes.
    pub truncate_first: usize,
    pub truncate_at: usize,
    /// Requests for `redirect_from` get a 302 to `redirect_to` (HEAD and GET).
    pub redirect: Option<(String, String)>,
    /// Send the body in 256-byte pieces with this pause between them.
    pub piece_delay: Option<Duration>,
    /// The first N ranged GETs get a 206 carrying the whole body from byte 0.
    pub partial_from_zero_first: usize,
}

impl Default for RangeServerOptions {
    fn default() -> Self {
        Self {
            support_ranges: true,
            send_content_length: true,
            status: None,
            fail_first: 0,
            truncate_first: 0,
            truncate_at: 0,
            redirect: None,
            piece_delay: None,
            partial_from_zero_first: 0,
        }
    }
}

/// Handle to a running server. The server lives until the process exits.
#[derive(Clone)]
pub struct RangeServer {
    base: String,
    gets: Arc<AtomicUsize>,
    heads: Arc<AtomicUsize>,
    ranges: Arc<Mutex<Vec<Option<String>>>>,
}

impl RangeServer {
    /// Absolute URL for `path` (leading slash optional).
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn head_count(&self) -> usize {
        self.heads.load(Ordering::SeqCst)
    }

    /// `Range` header of every GET so far, in arrival order.
    pub fn ranges(&self) -> Vec<Option<String>> {
        self.ranges.lock().unwrap().clone()
    }
}

pub fn start(body: Vec<u8>) -> RangeServer {
    start_with_options(body, RangeServerOptions::default())
}

pub fn start_with_options(body: Vec<u8>, opts: RangeServerOptions) -> RangeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let server = RangeServer {
        base: format!("http://127.0.0.1:{}", port),
        gets: Arc::new(AtomicUsize::new(0)),
        heads: Arc::new(AtomicUsize::new(0)),
        ranges: Arc::new(Mutex::new(Vec::new())),
    };
    let body = Arc::new(body);
    let opts = Arc::new(opts);
    let state = server.clone();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let opts = Arc::clone(&opts);
            let state = state.clone();
            thread::spawn(move || handle(stream, &body, &opts, &state));
        }
    });
    server
}

struct Request {
    method: String,
    path: String,
    range: Option<String>,
}

fn handle(mut stream: TcpStream, body: &[u8], opts: &RangeServerOptions, state: &RangeServer) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let Some(req) = read_request(&mut stream) else {
        return;
    };

    if let Some((from, to)) = &opts.redirect {
        if req.path == *from {
            if req.method.eq_ignore_ascii_case("HEAD") {
                state.heads.fetch_add(1, Ordering::SeqCst);
            }
            let response = format!(
                "HTTP/1.1 302 Found\r\nLocation: {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                to
            );
            let _ = stream.write_all(response.as_bytes());
            return;
        }
    }

    let total = body.len() as u64;
    if req.method.eq_ignore_ascii_case("HEAD") {
        state.heads.fetch_add(1, Ordering::SeqCst);
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            total
        );
        let _ = stream.write_all(response.as_bytes());
        return;
    }
    if !req.method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nConnection: close\r\n\r\n");
        return;
    }

    let n = state.gets.fetch_add(1, Ordering::SeqCst);
    state.ranges.lock().unwrap().push(req.range.clone());
    if n < opts.fail_first {
        return;
    }
    if let Some(status) = opts.status {
        let response = format!(
            "HTTP/1.1 {} Injected\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            status
        );
        let _ = stream.write_all(response.as_bytes());
        return;
    }

    let start = if opts.support_ranges {
        req.range.as_deref().and_then(range_start)
    } else {
        None
    };
    let (status_line, content_range, slice) = match start {
        Some(s) if s < total && n < opts.partial_from_zero_first => (
            "206 Partial Content",
            Some(format!("bytes 0-{}/{}", total - 1, total)),
            body,
        ),
        Some(s) if s >= total => (
            "416 Range Not Satisfiable",
            Some(format!("bytes */{}", total)),
            &body[0..0],
        ),
        Some(s) => (
            "206 Partial Content",
            Some(format!("bytes {}-{}/{}", s, total - 1, total)),
            &body[s as usize..],
        ),
        None => ("200 OK", None, body),
    };

    let mut head = format!("HTTP/1.1 {}\r\nConnection: close\r\n", status_line);
    if opts.send_content_length {
        head.push_str(&format!("Content-Length: {}\r\n", slice.len()));
    }
    if let Some(cr) = content_range {
        head.push_str(&format!("Content-Range: {}\r\n", cr));
    }
    head.push_str("\r\n");
    if stream.write_all(head.as_bytes()).is_err() {
        return;
    }

    let slice = if n < opts.fail_first + opts.truncate_first {
        &slice[..opts.truncate_at.min(slice.len())]
    } else {
        slice
    };
    match opts.piece_delay {
        Some(delay) => {
            for piece in slice.chunks(256) {
                if stream.write_all(piece).is_err() {
                    return;
                }
                let _ = stream.flush();
                thread::sleep(delay);
            }
        }
        None => {
            let _ = stream.write_all(slice);
        }
    }
    let _ = stream.flush();
}

fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 4096];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut tmp).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&tmp[..n]);
    }
    let text = String::from_utf8_lossy(&buf);
    let mut lines = text.lines();
    let mut first = lines.next()?.split_whitespace();
    let method = first.next()?.to_string();
    let path = first.next()?.to_string();
    let mut range = None;
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("range") {
                range = Some(value.trim().to_string());
            }
        }
    }
    Some(Request {
        method,
        path,
        range,
    })
}

/// Start offset of `bytes=N-` or `bytes=N-M`.
fn range_start(value: &str) -> Option<u64> {
    let spec = value.trim().strip_prefix("bytes=")?;
    let (a, _) = spec.split_once('-')?;
    a.trim().parse().ok()
}
