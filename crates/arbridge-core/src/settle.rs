//! Bounded polling until a transiently-unstable value becomes valid.
//!
//! [`settle`] repeatedly reads a raw value, hands it to a parser, and returns
//! the first successful parse. Reads that find nothing and values the parser
//! rejects are both "not yet settled" and simply trigger another poll. Only a
//! read error or the deadline ends the loop early.
//!
//! The primitive knows nothing about what it is polling for. The coordinate
//! bridge uses it with a two-field number parser; other probe formats plug in
//! their own parser.
//!
//! Time is measured with [`tokio::time::Instant`], so tests can run the loop
//! on a paused clock.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::trace;

/// Timing for a poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poll {
    /// Give up once this much time has passed since the first read.
    pub timeout: Duration,
    /// Pause between consecutive reads.
    pub interval: Duration,
}

impl Poll {
    pub const fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }
}

/// Why a poll loop ended without a value.
#[derive(Debug)]
pub enum SettleError<R, E> {
    /// The deadline passed before any read produced a parsable value.
    TimedOut {
        /// How many reads were made.
        polls: u32,
        /// The last raw value that was present, if any read found one.
        last: Option<R>,
    },
    /// A read failed outright.
    Read(E),
}

/// Polls `read` until `parse` accepts a value or `poll.timeout` elapses.
///
/// `read` returns `Ok(None)` when the thing being polled does not currently
/// exist; that counts as "not yet settled". `parse` returns `None` for values
/// that are present but not usable yet.
///
/// Reads only start while the deadline has not passed, so no read is issued
/// after `poll.timeout`. The loop sleeps `poll.interval` between reads and
/// never sleeps past the deadline.
pub async fn settle<R, T, E, F, Fut, P>(
    mut read: F,
    mut parse: P,
    poll: Poll,
) -> Result<T, SettleError<R, E>>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<Option<R>, E>>,
    P: FnMut(&R) -> Option<T>,
{
    let start = Instant::now();
    let deadline = start + poll.timeout;
    let mut polls: u32 = 0;
    let mut last: Option<R> = None;

    while Instant::now() < deadline {
        polls += 1;
        match read().await {
            Ok(Some(raw)) => {
                if let Some(value) = parse(&raw) {
                    trace!(polls, elapsed_ms = start.elapsed().as_millis() as u64, "settled");
                    return Ok(value);
                }
                last = Some(raw);
            }
            Ok(None) => {}
            Err(e) => return Err(SettleError::Read(e)),
        }

        let now = Instant::now();
        if now >= deadline {
            break;
        }
        sleep(poll.interval.min(deadline - now)).await;
    }

    Err(SettleError::TimedOut { polls, last })
}
