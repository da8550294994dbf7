//! [`DeviceControl`] implementation backed by a WebDriver / Appium server.
//!
//! This module provides [`WebDriverSession`], which implements the
//! [`DeviceControl`] trait by issuing W3C WebDriver commands over HTTP.
//! Request and response bodies are built by [`crate::protocol`].
//!
//! # Example
//!
//! ```no_run
//! use arbridge_core::config::default_capabilities;
//! use arbridge_core::driver::DeviceControl;
//! use arbridge_core::webdriver::WebDriverSession;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session =
//!     WebDriverSession::start("http://127.0.0.1:4723", &default_capabilities()).await?;
//! let size = session.window_size().await?;
//! println!("screen is {size}");
//! session.quit().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Method;
use serde_json::{Map, Value};
use tracing::{debug, instrument, trace, warn};

use crate::driver::{DeviceControl, DriverError, PinchDirection, PointerAction, RenderContext};
use crate::geometry::{Region, WindowSize};
use crate::protocol;

/// Timeout for establishing a TCP connection to the server.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for a whole command round trip, session creation included.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// Maps a [`reqwest::Error`] onto the driver error vocabulary.
fn map_http_error(err: reqwest::Error) -> DriverError {
    if err.is_timeout() {
        DriverError::Timeout
    } else if err.is_connect() {
        DriverError::ConnectionLost(err.to_string())
    } else {
        DriverError::Http(err)
    }
}

/// A remote automation session reached over HTTP.
///
/// The session id is obtained by [`create_session`](Self::create_session)
/// (or [`start`](Self::start)). Until then every [`DeviceControl`] call
/// fails with [`DriverError::NotConnected`]. The active rendering context is
/// tracked locally and only changed through
/// [`switch_context`](DeviceControl::switch_context).
pub struct WebDriverSession {
    http: reqwest::Client,
    base_url: String,
    session_id: Option<String>,
    context: RenderContext,
}

impl WebDriverSession {
    /// Creates a handle for the server at `base_url` without opening a
    /// session.
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(COMMAND_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session_id: None,
            context: RenderContext::Native,
        }
    }

    /// Like [`new`](Self::new) but opens a session immediately.
    pub async fn start(
        base_url: impl Into<String>,
        capabilities: &Map<String, Value>,
    ) -> Result<Self, DriverError> {
        let mut session = Self::new(base_url);
        session.create_session(capabilities).await?;
        Ok(session)
    }

    /// Opens a new session with `capabilities` as `alwaysMatch`.
    ///
    /// Afterwards the locally tracked context is synced with the one the
    /// server reports, falling back to native if it cannot be read.
    #[instrument(skip(self, capabilities), fields(server = %self.base_url))]
    pub async fn create_session(
        &mut self,
        capabilities: &Map<String, Value>,
    ) -> Result<(), DriverError> {
        let body = protocol::new_session_body(capabilities);
        let value = self.send(Method::POST, "/session".to_string(), Some(body)).await?;
        let id = protocol::session_id(&value)?;
        debug!(session_id = %id, "session created");
        self.session_id = Some(id);

        match self.current_context().await {
            Ok(context) => self.context = context,
            Err(e) => {
                warn!(error = %e, "could not read initial context, assuming native");
                self.context = RenderContext::Native;
            }
        }
        Ok(())
    }

    /// Returns the id of the open session, if any.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.session_id.is_some()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Asks the server which context is active.
    pub async fn current_context(&self) -> Result<RenderContext, DriverError> {
        let value = self.command(Method::GET, "/context", None).await?;
        Ok(RenderContext::from_id(&protocol::string_value(&value)?))
    }

    fn session_path(&self, suffix: &str) -> Result<String, DriverError> {
        let id = self.session_id.as_deref().ok_or(DriverError::NotConnected)?;
        Ok(format!("/session/{id}{suffix}"))
    }

    /// Sends a command scoped to the open session.
    async fn command(
        &self,
        method: Method,
        suffix: &str,
        body: Option<Value>,
    ) -> Result<Value, DriverError> {
        let path = self.session_path(suffix)?;
        self.send(method, path, body).await
    }

    async fn send(
        &self,
        method: Method,
        path: String,
        body: Option<Value>,
    ) -> Result<Value, DriverError> {
        let url = format!("{}{}", self.base_url, path);
        trace!(%method, %url, "sending command");

        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.map_err(map_http_error)?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(map_http_error)?;
        trace!(status, bytes = bytes.len(), "received response");

        protocol::decode_response(status, &bytes)
    }

    /// Looks up an element in the active context. `Ok(None)` when absent.
    async fn find_element(&self, selector: &str) -> Result<Option<String>, DriverError> {
        let body = protocol::find_element_body(selector);
        match self.command(Method::POST, "/element", Some(body)).await {
            Ok(value) => protocol::element_id(&value).map(Some),
            Err(e) if e.is_element_absent() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl DeviceControl for WebDriverSession {
    #[instrument(skip(self, actions), level = "debug", fields(steps = actions.len()))]
    async fn perform_actions(&self, actions: &[PointerAction]) -> Result<(), DriverError> {
        let body = protocol::pointer_actions_body(actions);
        self.command(Method::POST, "/actions", Some(body)).await?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn pinch(
        &self,
        direction: PinchDirection,
        region: Region,
        percent: f64,
        speed: u32,
    ) -> Result<(), DriverError> {
        let body = protocol::pinch_body(direction, region, percent, speed);
        self.command(Method::POST, "/execute/sync", Some(body)).await?;
        Ok(())
    }

    async fn context_ids(&self) -> Result<Vec<String>, DriverError> {
        let value = self.command(Method::GET, "/contexts", None).await?;
        protocol::string_list(&value)
    }

    fn active_context(&self) -> &RenderContext {
        &self.context
    }

    #[instrument(skip(self), level = "debug")]
    async fn switch_context(&mut self, context: RenderContext) -> Result<(), DriverError> {
        let body = protocol::switch_context_body(context.id());
        self.command(Method::POST, "/context", Some(body)).await?;
        self.context = context;
        Ok(())
    }

    async fn element_text(&self, selector: &str) -> Result<Option<String>, DriverError> {
        let Some(element) = self.find_element(selector).await? else {
            return Ok(None);
        };
        let suffix = format!("/element/{element}/text");
        match self.command(Method::GET, &suffix, None).await {
            Ok(value) => protocol::string_value(&value).map(Some),
            Err(e) if e.is_element_absent() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn page_source(&self) -> Result<String, DriverError> {
        let value = self.command(Method::GET, "/source", None).await?;
        protocol::string_value(&value)
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        let value = self.command(Method::GET, "/screenshot", None).await?;
        let encoded: String = protocol::string_value(&value)?
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        Ok(base64::engine::general_purpose::STANDARD.decode(encoded)?)
    }

    async fn window_size(&self) -> Result<WindowSize, DriverError> {
        let value = self.command(Method::GET, "/window/rect", None).await?;
        protocol::window_size(&value)
    }

    #[instrument(skip(self), level = "debug")]
    async fn quit(&mut self) -> Result<(), DriverError> {
        let path = self.session_path("")?;
        let result = self.send(Method::DELETE, path, None).await;
        self.session_id = None;
        result.map(|_| ())
    }
}
