//! Shared test helpers for arbridge-core integration tests.
//!
//! Provides an in-memory [`FakeDevice`] with a scripted probe, a scripted
//! operator, and a minimal HTTP server that answers WebDriver requests from a
//! routing closure.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use arbridge_core::driver::{
    DeviceControl, DriverError, PinchDirection, PointerAction, RenderContext,
};
use arbridge_core::geometry::{Region, WindowSize};
use arbridge_core::operator::Operator;

pub const FAKE_PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake";

// ---------------------------------------------------------------------------
// Fake device
// ---------------------------------------------------------------------------

/// A device call observed by [`FakeDevice`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Actions(Vec<PointerAction>),
    Pinch(PinchDirection, Region),
    SwitchContext(String),
    ElementText,
    PageSource,
    Screenshot,
    WindowSize,
    Quit,
}

/// In-memory device whose probe returns a scripted sequence of values.
///
/// Each `element_text` call consumes one entry of the script; `None` means
/// the probe is absent for that read. Once a single entry is left it is
/// repeated forever.
pub struct FakeDevice {
    contexts: Vec<String>,
    context: RenderContext,
    window: WindowSize,
    probe: Mutex<VecDeque<Option<String>>>,
    calls: Mutex<Vec<Call>>,
    context_lists: AtomicUsize,
    fail_gestures: bool,
    fail_screenshots: bool,
    fail_quit: bool,
    fail_probe: bool,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self {
            contexts: vec!["NATIVE_APP".to_string(), "WEBVIEW_com.example".to_string()],
            context: RenderContext::Native,
            window: WindowSize { width: 1080, height: 2400 },
            probe: Mutex::new(VecDeque::from(vec![None])),
            calls: Mutex::new(Vec::new()),
            context_lists: AtomicUsize::new(0),
            fail_gestures: false,
            fail_screenshots: false,
            fail_quit: false,
            fail_probe: false,
        }
    }

    pub fn with_contexts(mut self, contexts: &[&str]) -> Self {
        self.contexts = contexts.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn in_context(mut self, context: RenderContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_window(mut self, width: i32, height: i32) -> Self {
        self.window = WindowSize { width, height };
        self
    }

    /// Scripts the probe. `None` entries are reads where the probe is absent.
    pub fn with_probe(self, script: &[Option<&str>]) -> Self {
        let values: VecDeque<Option<String>> =
            script.iter().map(|v| v.map(str::to_string)).collect();
        *self.probe.lock().unwrap() = values;
        self
    }

    /// A probe that always shows `value`.
    pub fn with_constant_probe(self, value: &str) -> Self {
        self.with_probe(&[Some(value)])
    }

    pub fn failing_gestures(mut self) -> Self {
        self.fail_gestures = true;
        self
    }

    pub fn failing_screenshots(mut self) -> Self {
        self.fail_screenshots = true;
        self
    }

    pub fn failing_quit(mut self) -> Self {
        self.fail_quit = true;
        self
    }

    pub fn failing_probe(mut self) -> Self {
        self.fail_probe = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn probe_reads(&self) -> usize {
        self.count(|c| *c == Call::ElementText)
    }

    pub fn gestures(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Actions(_) | Call::Pinch(..)))
            .collect()
    }

    /// How often the context list was requested.
    pub fn context_lists(&self) -> usize {
        self.context_lists.load(Ordering::SeqCst)
    }

    pub fn quit_called(&self) -> bool {
        self.count(|c| *c == Call::Quit) > 0
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl DeviceControl for FakeDevice {
    async fn perform_actions(&self, actions: &[PointerAction]) -> Result<(), DriverError> {
        self.record(Call::Actions(actions.to_vec()));
        if self.fail_gestures {
            return Err(DriverError::CommandFailed("gesture rejected".to_string()));
        }
        Ok(())
    }

    async fn pinch(
        &self,
        direction: PinchDirection,
        region: Region,
        _percent: f64,
        _speed: u32,
    ) -> Result<(), DriverError> {
        self.record(Call::Pinch(direction, region));
        if self.fail_gestures {
            return Err(DriverError::CommandFailed("gesture rejected".to_string()));
        }
        Ok(())
    }

    async fn context_ids(&self) -> Result<Vec<String>, DriverError> {
        self.context_lists.fetch_add(1, Ordering::SeqCst);
        Ok(self.contexts.clone())
    }

    fn active_context(&self) -> &RenderContext {
        &self.context
    }

    async fn switch_context(&mut self, context: RenderContext) -> Result<(), DriverError> {
        self.record(Call::SwitchContext(context.id().to_string()));
        if !self.contexts.iter().any(|c| c == context.id()) {
            return Err(DriverError::WebDriver {
                error: "no such context".to_string(),
                message: context.id().to_string(),
            });
        }
        self.context = context;
        Ok(())
    }

    async fn element_text(&self, _selector: &str) -> Result<Option<String>, DriverError> {
        self.record(Call::ElementText);
        if self.fail_probe {
            return Err(DriverError::ConnectionLost("socket closed".to_string()));
        }
        let mut probe = self.probe.lock().unwrap();
        let value = if probe.len() > 1 {
            probe.pop_front().flatten()
        } else {
            probe.front().cloned().flatten()
        };
        Ok(value)
    }

    async fn page_source(&self) -> Result<String, DriverError> {
        self.record(Call::PageSource);
        Ok("<hierarchy><android.widget.FrameLayout/></hierarchy>".to_string())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        self.record(Call::Screenshot);
        if self.fail_screenshots {
            return Err(DriverError::CommandFailed("screenshot unavailable".to_string()));
        }
        Ok(FAKE_PNG.to_vec())
    }

    async fn window_size(&self) -> Result<WindowSize, DriverError> {
        self.record(Call::WindowSize);
        Ok(self.window)
    }

    async fn quit(&mut self) -> Result<(), DriverError> {
        self.record(Call::Quit);
        if self.fail_quit {
            return Err(DriverError::ConnectionLost("server went away".to_string()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scripted operator
// ---------------------------------------------------------------------------

/// Answers prompts from a fixed list, declining once the list runs out.
/// Every prompt is recorded in a shared log.
pub struct ScriptedOperator {
    answers: VecDeque<bool>,
    prompts: Arc<Mutex<Vec<String>>>,
    hang_when_done: bool,
}

impl ScriptedOperator {
    pub fn new(answers: &[bool]) -> Self {
        Self {
            answers: answers.iter().copied().collect(),
            prompts: Arc::new(Mutex::new(Vec::new())),
            hang_when_done: false,
        }
    }

    /// Once the answers run out, never answer instead of declining, like an
    /// operator who walked away from the terminal.
    pub fn then_hang(mut self) -> Self {
        self.hang_when_done = true;
        self
    }

    /// Shared handle on the prompts, usable after the operator is moved.
    pub fn prompts(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.prompts)
    }
}

#[async_trait]
impl Operator for ScriptedOperator {
    async fn confirm(&mut self, step: &str) -> std::io::Result<bool> {
        self.prompts.lock().unwrap().push(step.to_string());
        match self.answers.pop_front() {
            Some(answer) => Ok(answer),
            None if self.hang_when_done => std::future::pending().await,
            None => Ok(false),
        }
    }
}

// ---------------------------------------------------------------------------
// Mock WebDriver server
// ---------------------------------------------------------------------------

/// A request received by the mock server.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub body: Value,
}

pub type Router = Arc<dyn Fn(&str, &str, &Value) -> (u16, Value) + Send + Sync>;

/// Handle on a running mock server.
pub struct MockServer {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockServer {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn find(&self, method: &str, path_suffix: &str) -> Option<Recorded> {
        self.requests()
            .into_iter()
            .find(|r| r.method == method && r.path.ends_with(path_suffix))
    }
}

/// Starts a WebDriver-ish HTTP server on an ephemeral port. `route` receives
/// method, path and parsed JSON body and returns the status and the full
/// response envelope. Each connection serves one request.
pub async fn mock_webdriver(route: Router) -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));

    let log = Arc::clone(&requests);
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let route = Arc::clone(&route);
            let log = Arc::clone(&log);
            tokio::spawn(async move {
                serve_one(stream, route, log).await;
            });
        }
    });

    MockServer { addr, requests }
}

async fn serve_one(mut stream: TcpStream, route: Router, log: Arc<Mutex<Vec<Recorded>>>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = find_subslice(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();
    let content_length = lines
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body_bytes = &buf[header_end..(header_end + content_length).min(buf.len())];
    let body: Value = serde_json::from_slice(body_bytes).unwrap_or(Value::Null);

    let (status, response) = route(&method, &path, &body);
    log.lock().unwrap().push(Recorded { method, path, body });

    let payload = response.to_string();
    let reply = format!(
        "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
        payload.len()
    );
    stream.write_all(reply.as_bytes()).await.unwrap();
    stream.flush().await.unwrap();
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// `{"value": value}` with status 200.
pub fn ok(value: Value) -> (u16, Value) {
    (200, json!({ "value": value }))
}

/// A W3C error envelope.
pub fn webdriver_error(status: u16, error: &str, message: &str) -> (u16, Value) {
    (
        status,
        json!({ "value": { "error": error, "message": message, "stacktrace": "" } }),
    )
}
