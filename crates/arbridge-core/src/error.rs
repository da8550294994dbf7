//! Run-level error taxonomy.
//!
//! Transport problems surface as [`DriverError`] and are wrapped into
//! [`AutomationError::TransportFailure`]. The remaining variants are raised by
//! the coordinate bridge and the context switcher. Malformed probe content
//! never becomes an error; it is absorbed by the bridge's poll loop.

use std::time::Duration;

use thiserror::Error;

use crate::driver::DriverError;

/// Errors that abort an automation run.
#[derive(Error, Debug)]
pub enum AutomationError {
    /// The probe element never appeared during the presence window.
    ///
    /// This usually means the wrong context is active or the target app is
    /// in the wrong state, so it carries a dump of where we were looking.
    #[error(
        "probe '{selector}' never appeared in context {context} \
         (available: [{}]); page source starts with: {snapshot}",
        .available.join(", ")
    )]
    ProbeNeverAppeared {
        selector: String,
        context: String,
        available: Vec<String>,
        snapshot: String,
    },

    /// The probe existed but never held a valid coordinate pair in time.
    #[error(
        "no valid coordinates from '{selector}' after {:.1}s ({polls} polls, last value: {})",
        .timeout.as_secs_f64(),
        describe_last(.last_value)
    )]
    BridgeTimeout {
        selector: String,
        timeout: Duration,
        polls: u32,
        last_value: Option<String>,
    },

    /// No embedded web context was available to switch to.
    #[error("no web rendering context found (available: [{}])", .available.join(", "))]
    ContextSwitchFailed { available: Vec<String> },

    /// The device-control call itself failed.
    #[error("transport failure: {0}")]
    TransportFailure(#[from] DriverError),

    /// Reading the operator's answer failed.
    #[error("operator prompt failed: {0}")]
    Operator(#[source] std::io::Error),

    /// The run was stopped from outside, e.g. by Ctrl-C.
    #[error("interrupted by operator")]
    Interrupted,
}

fn describe_last(value: &Option<String>) -> String {
    match value {
        Some(v) => format!("'{v}'"),
        None => "none".to_string(),
    }
}
