//! The coordinate bridge: reading application state back through a UI probe.
//!
//! The target application writes the placed object's screen position into a
//! text element (the *probe*) as `"<x>,<y>"`, or leaves it empty / `-` while
//! nothing is placed. That text is the only channel through which the effect
//! of a gesture can be observed, and the application updates it on its own
//! render cycle, so any single read may see a stale, partial or missing
//! value.
//!
//! [`CoordinateBridge::read`] therefore runs in two phases:
//!
//! 1. **Presence**: wait a short, fixed window for the probe to exist at all.
//!    If it never shows up we are almost certainly in the wrong rendering
//!    context, and the error carries the context list and a page source
//!    snapshot to make that obvious.
//! 2. **Settle**: poll the probe's text until it parses as a coordinate pair.
//!    Empty, sentinel, partial and non-numeric values, and the probe briefly
//!    vanishing during a re-render, are all treated as "not yet settled".
//!    Only the overall timeout or a transport failure ends the loop.

use std::time::Duration;

use tracing::{debug, info, info_span, warn, Instrument};

use crate::driver::{DeviceControl, DriverError};
use crate::error::AutomationError;
use crate::geometry::Point;
use crate::settle::{settle, Poll, SettleError};

/// Selector of the probe element the AR page renders its coordinates into.
pub const DEFAULT_PROBE_SELECTOR: &str = "#ar_coords_textview";

/// Placeholder the page shows before an object has been placed.
const UNSET_SENTINEL: &str = "-";

/// Number of page-source characters kept in presence-failure diagnostics.
const SNAPSHOT_CHARS: usize = 500;

/// Poll timings used by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeTiming {
    /// How long to wait for the probe element to exist.
    pub presence_timeout: Duration,
    /// Pause between probe reads, in both phases.
    pub poll_interval: Duration,
}

impl Default for BridgeTiming {
    fn default() -> Self {
        Self {
            presence_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Parses probe text into a [`Point`].
///
/// Returns `None` for every form that means "not settled yet": empty or
/// sentinel text, anything that does not split into exactly two
/// comma-separated fields, fields that are not numbers, and numbers that do
/// not truncate to a non-negative `i32`. Fractional values are truncated
/// toward zero.
pub fn parse_coordinates(raw: &str) -> Option<Point> {
    let text = raw.trim();
    if text.is_empty() || text == UNSET_SENTINEL {
        return None;
    }

    let mut fields = text.split(',');
    let (x, y) = match (fields.next(), fields.next(), fields.next()) {
        (Some(x), Some(y), None) => (x, y),
        _ => return None,
    };

    Some(Point::new(parse_axis(x)?, parse_axis(y)?))
}

fn parse_axis(field: &str) -> Option<i32> {
    let value: f64 = field.trim().parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    let truncated = value.trunc();
    if truncated < 0.0 || truncated > i32::MAX as f64 {
        return None;
    }
    Some(truncated as i32)
}

/// Reads settled coordinates from a probe element.
#[derive(Debug, Clone)]
pub struct CoordinateBridge {
    selector: String,
    timing: BridgeTiming,
}

impl Default for CoordinateBridge {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_SELECTOR)
    }
}

impl CoordinateBridge {
    /// Creates a bridge polling `selector` with default timings.
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            timing: BridgeTiming::default(),
        }
    }

    /// Replaces the poll timings.
    pub fn with_timing(mut self, timing: BridgeTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn timing(&self) -> &BridgeTiming {
        &self.timing
    }

    /// Waits for the probe and returns the first valid coordinate pair it
    /// shows within `timeout`.
    ///
    /// # Errors
    ///
    /// * [`AutomationError::ProbeNeverAppeared`] if the probe is absent for
    ///   the whole presence window. The settle phase is not entered.
    /// * [`AutomationError::BridgeTimeout`] if the probe never holds a valid
    ///   pair before `timeout` elapses.
    /// * [`AutomationError::TransportFailure`] if a driver call fails for a
    ///   reason other than the probe being absent.
    pub async fn read<D>(&self, device: &D, timeout: Duration) -> Result<Point, AutomationError>
    where
        D: DeviceControl + ?Sized,
    {
        let span = info_span!("bridge_read", selector = %self.selector, timeout_ms = timeout.as_millis() as u64);
        async {
            info!("waiting for object coordinates");
            self.wait_for_presence(device).await?;
            let point = self.settle_coordinates(device, timeout).await?;
            info!(x = point.x, y = point.y, "received coordinates");
            Ok(point)
        }
        .instrument(span)
        .await
    }

    async fn wait_for_presence<D>(&self, device: &D) -> Result<(), AutomationError>
    where
        D: DeviceControl + ?Sized,
    {
        let poll = Poll::new(self.timing.presence_timeout, self.timing.poll_interval);
        let selector = self.selector.as_str();
        let present = settle(
            move || device.element_text(selector),
            |_: &String| Some(()),
            poll,
        )
        .await;

        match present {
            Ok(()) => {
                debug!("probe element found");
                Ok(())
            }
            Err(SettleError::Read(e)) => Err(e.into()),
            Err(SettleError::TimedOut { .. }) => Err(self.presence_failure(device).await),
        }
    }

    async fn settle_coordinates<D>(
        &self,
        device: &D,
        timeout: Duration,
    ) -> Result<Point, AutomationError>
    where
        D: DeviceControl + ?Sized,
    {
        let poll = Poll::new(timeout, self.timing.poll_interval);
        let selector = self.selector.as_str();
        let result = settle(
            move || async move {
                let text = device.element_text(selector).await?;
                match &text {
                    Some(value) => debug!(value = %value, "probe value"),
                    None => warn!("probe element disappeared, waiting"),
                }
                Ok::<_, DriverError>(text)
            },
            |raw: &String| parse_coordinates(raw),
            poll,
        )
        .await;

        result.map_err(|e| match e {
            SettleError::Read(e) => AutomationError::TransportFailure(e),
            SettleError::TimedOut { polls, last } => AutomationError::BridgeTimeout {
                selector: self.selector.clone(),
                timeout,
                polls,
                last_value: last,
            },
        })
    }

    /// Collects what we can about where we were looking. Failures while
    /// collecting are logged and replaced with placeholders so the original
    /// problem is still reported.
    async fn presence_failure<D>(&self, device: &D) -> AutomationError
    where
        D: DeviceControl + ?Sized,
    {
        let context = device.active_context().to_string();
        let available = device.context_ids().await.unwrap_or_else(|e| {
            warn!(error = %e, "could not list contexts for diagnostics");
            Vec::new()
        });
        let snapshot = match device.page_source().await {
            Ok(source) => source.chars().take(SNAPSHOT_CHARS).collect(),
            Err(e) => {
                warn!(error = %e, "could not fetch page source for diagnostics");
                String::from("<unavailable>")
            }
        };
        warn!(%context, ?available, "probe element never appeared");

        AutomationError::ProbeNeverAppeared {
            selector: self.selector.clone(),
            context,
            available,
            snapshot,
        }
    }
}

/// Reads settled coordinates from the probe at `selector` using the default
/// timings. See [`CoordinateBridge::read`].
pub async fn read_settled_coordinates<D>(
    device: &D,
    selector: &str,
    timeout: Duration,
) -> Result<Point, AutomationError>
where
    D: DeviceControl + ?Sized,
{
    CoordinateBridge::new(selector).read(device, timeout).await
}
