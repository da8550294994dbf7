//! Device-control trait for backend-agnostic touch automation.
//!
//! This module defines the [`DeviceControl`] trait, the boundary between the
//! synchronization logic in this crate and a remote automation driver. The
//! shipped implementation is [`WebDriverSession`](crate::webdriver::WebDriverSession),
//! which speaks the W3C WebDriver protocol with Appium extensions, but the
//! gesture primitives, coordinate bridge and step runner only ever see the
//! trait. Tests drive them with in-memory fakes.
//!
//! # Rendering contexts
//!
//! A device exposes one or more rendering contexts (the native view tree and
//! zero or more embedded web views). Exactly one is active at a time and all
//! element queries are scoped to it. The active context is held by the handle
//! itself and changed only through [`DeviceControl::switch_context`], which
//! takes `&mut self` so a context switch can never race an element query.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::geometry::{Region, WindowSize};

/// Context identifier that drivers use for the native view tree.
pub const NATIVE_CONTEXT: &str = "NATIVE_APP";

/// Substrings that mark a context identifier as an embedded web renderer.
const WEB_CONTEXT_MARKERS: [&str; 2] = ["WEBVIEW", "CHROMIUM"];

/// Errors that can occur while talking to the remote driver.
///
/// This enum unifies transport-level failures behind a single type so the
/// callers can treat them uniformly regardless of backend.
#[derive(Error, Debug)]
pub enum DriverError {
    /// A command or operation failed with the given message.
    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// No session has been established with the driver.
    #[error("Not connected to automation driver")]
    NotConnected,

    /// The connection to the driver was lost.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// A request did not complete in time.
    #[error("Operation timed out")]
    Timeout,

    /// The HTTP layer failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse JSON data.
    #[error("JSON parse error: {0}")]
    JsonParse(String),

    /// The driver answered with a WebDriver error object.
    #[error("WebDriver error '{error}': {message}")]
    WebDriver {
        /// The W3C error code, e.g. `no such element`.
        error: String,
        /// Human-readable detail from the driver.
        message: String,
    },

    /// A screenshot payload was not valid base64.
    #[error("Invalid screenshot payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl DriverError {
    /// Returns true if the error means "the element is not in the tree right
    /// now", as opposed to a failure of the transport itself.
    pub fn is_element_absent(&self) -> bool {
        matches!(
            self,
            DriverError::WebDriver { error, .. }
                if error == "no such element" || error == "stale element reference"
        )
    }
}

/// The rendering surface whose element tree queries are scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderContext {
    /// The platform's native view hierarchy.
    Native,
    /// An embedded web renderer, identified by the driver's context id.
    Web(String),
}

impl RenderContext {
    /// Returns true if a driver context identifier names an embedded web
    /// renderer (`WEBVIEW_*`, `CHROMIUM`).
    pub fn is_web_id(id: &str) -> bool {
        WEB_CONTEXT_MARKERS.iter().any(|marker| id.contains(marker))
    }

    /// Classifies a driver context identifier.
    ///
    /// Anything that is not web-like is treated as the native surface.
    pub fn from_id(id: &str) -> Self {
        if Self::is_web_id(id) {
            RenderContext::Web(id.to_string())
        } else {
            RenderContext::Native
        }
    }

    /// The identifier to hand back to the driver when switching.
    pub fn id(&self) -> &str {
        match self {
            RenderContext::Native => NATIVE_CONTEXT,
            RenderContext::Web(id) => id,
        }
    }

    pub fn is_web(&self) -> bool {
        matches!(self, RenderContext::Web(_))
    }
}

impl fmt::Display for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// One low-level step of a single-finger touch sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerAction {
    /// Move the pointer to viewport coordinates over `duration`.
    Move { x: i32, y: i32, duration: Duration },
    /// Put the finger down at the current position.
    Down,
    /// Hold the current state.
    Pause(Duration),
    /// Lift the finger.
    Up,
}

/// Direction of a two-finger pinch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinchDirection {
    /// Fingers move apart (zoom in / grow).
    Out,
    /// Fingers move together (zoom out / shrink).
    In,
}

impl PinchDirection {
    /// Name of the driver-side composite gesture.
    pub fn script_name(&self) -> &'static str {
        match self {
            PinchDirection::Out => "mobile: pinchOpenGesture",
            PinchDirection::In => "mobile: pinchCloseGesture",
        }
    }
}

impl fmt::Display for PinchDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinchDirection::Out => f.write_str("out"),
            PinchDirection::In => f.write_str("in"),
        }
    }
}

/// Trait for a remote device-automation handle.
///
/// Implementors forward each call to their backend. All methods are async;
/// callers await them one at a time, so implementations do not need to
/// handle overlapping requests.
///
/// The handle owns its active [`RenderContext`]; element queries are
/// answered from that context only.
#[async_trait]
pub trait DeviceControl: Send + Sync {
    /// Perform a single-finger pointer sequence addressed by coordinates.
    async fn perform_actions(&self, actions: &[PointerAction]) -> Result<(), DriverError>;

    /// Perform a composite two-finger pinch over `region`.
    ///
    /// # Arguments
    ///
    /// * `direction` - Open (out) or close (in)
    /// * `region` - Bounding box the fingers travel within
    /// * `percent` - Fraction of the region the fingers cover, `0.0..=1.0`
    /// * `speed` - Gesture speed as understood by the driver
    async fn pinch(
        &self,
        direction: PinchDirection,
        region: Region,
        percent: f64,
        speed: u32,
    ) -> Result<(), DriverError>;

    /// List the identifiers of every rendering context the device exposes.
    async fn context_ids(&self) -> Result<Vec<String>, DriverError>;

    /// The context that element queries are currently scoped to.
    fn active_context(&self) -> &RenderContext;

    /// Make `context` the active rendering context.
    async fn switch_context(&mut self, context: RenderContext) -> Result<(), DriverError>;

    /// Read the text content of the first element matching a CSS selector in
    /// the active context.
    ///
    /// Returns `Ok(None)` when no element matches, including when a matched
    /// element went stale before its text could be read.
    async fn element_text(&self, selector: &str) -> Result<Option<String>, DriverError>;

    /// Serialized element tree of the active context, for diagnostics.
    async fn page_source(&self) -> Result<String, DriverError>;

    /// Capture the full frame.
    ///
    /// # Returns
    ///
    /// Raw PNG image bytes.
    async fn screenshot(&self) -> Result<Vec<u8>, DriverError>;

    /// Current window dimensions.
    async fn window_size(&self) -> Result<WindowSize, DriverError>;

    /// End the remote session. Further calls fail with
    /// [`DriverError::NotConnected`].
    async fn quit(&mut self) -> Result<(), DriverError>;
}
