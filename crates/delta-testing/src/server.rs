//! Minimal chat-completions stub.
//!
//! One listener thread answers each POST with the next scripted body. Just
//! enough HTTP/1.1 to satisfy a real blocking client: read headers, honor
//! Content-Length, reply with Connection: close.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

pub struct StubLlmServer {
    port: u16,
    shutdown: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl StubLlmServer {
    /// Start a server that answers requests in order with `bodies`. After
    /// the script runs out it answers 500 so a runaway loop fails loudly.
    pub fn start(bodies: Vec<String>) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        let shutdown = Arc::new(AtomicBool::new(false));

        let script = Arc::new(Mutex::new(VecDeque::from(bodies)));
        let stop = Arc::clone(&shutdown);
        let handle = std::thread::spawn(move || {
            for stream in listener.incoming() {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                let Ok(stream) = stream else { continue };
                let body = script.lock().expect("script lock").pop_front();
                let _ = respond(stream, body);
            }
        });

        Ok(Self {
            port,
            shutdown,
            handle: Some(handle),
        })
    }

    /// Endpoint root to put in DELTA_BASE_URL.
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}/v1", self.port)
    }

    /// A completion that ends the run with plain text.
    pub fn final_message(text: &str) -> String {
        json!({
            "model": "stub-model",
            "choices": [{
                "message": {"content": text},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 20, "completion_tokens": 5}
        })
        .to_string()
    }

    /// A completion that requests one tool call.
    pub fn tool_call(id: &str, tool: &str, arguments: Value) -> String {
        json!({
            "model": "stub-model",
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": id,
                        "type": "function",
                        "function": {
                            "name": tool,
                            "arguments": arguments.to_string()
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 30, "completion_tokens": 12}
        })
        .to_string()
    }
}

impl Drop for StubLlmServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // Wake the accept loop.
        let _ = TcpStream::connect(("127.0.0.1", self.port));
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn respond(mut stream: TcpStream, body: Option<String>) -> std::io::Result<()> {
    drain_request(&mut stream)?;
    let (status, payload) = match body {
        Some(payload) => ("200 OK", payload),
        None => (
            "500 Internal Server Error",
            json!({"error": "stub script exhausted"}).to_string(),
        ),
    };
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        payload.len(),
        payload
    );
    stream.write_all(response.as_bytes())?;
    stream.flush()
}

/// Read headers plus a Content-Length body; the stub never inspects them.
fn drain_request(stream: &mut TcpStream) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end;
    loop {
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_header_end(&buf) {
            header_end = pos;
            break;
        }
        if buf.len() > 1_048_576 {
            return Ok(());
        }
    }

    let headers = String::from_utf8_lossy(&buf[..header_end]);
    let content_length: usize = headers
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse().ok())?
        })
        .unwrap_or(0);

    let mut already = buf.len() - header_end - 4;
    while already < content_length {
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        already += n;
    }
    Ok(())
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}
