//! Touch gesture primitives.
//!
//! A [`GestureSpec`] describes one logical gesture. [`GestureSpec::perform`]
//! compiles it into pointer actions (or, for pinch, a single composite driver
//! command), sends it to the device, and then waits a fixed settle delay so
//! the target application's render loop can catch up before anything reads
//! its state.
//!
//! | Gesture    | Pointer sequence                                   | Settle |
//! |------------|----------------------------------------------------|--------|
//! | tap        | move, down, pause 0.2s, up                         | 1.0s   |
//! | long press | move, down, pause `duration`, up                   | 2.0s   |
//! | drag       | move, down, pause 0.1s, move over `duration`, up   | 2.0s   |
//! | pinch      | composite open/close over a 200x200 box            | 2.0s   |

use std::fmt;
use std::time::Duration;

use tokio::time::sleep;
use tracing::info;

use crate::driver::{DeviceControl, DriverError, PinchDirection, PointerAction};
use crate::geometry::{Point, Region};

const TAP_HOLD: Duration = Duration::from_millis(200);
const DRAG_GRAB: Duration = Duration::from_millis(100);

const TAP_SETTLE: Duration = Duration::from_millis(1000);
const LONG_PRESS_SETTLE: Duration = Duration::from_millis(2000);
const DRAG_SETTLE: Duration = Duration::from_millis(2000);
const PINCH_SETTLE: Duration = Duration::from_millis(2000);

/// Default hold time of a long press.
pub const DEFAULT_LONG_PRESS: Duration = Duration::from_millis(900);
/// Default travel time of a drag.
pub const DEFAULT_DRAG_MOVE: Duration = Duration::from_millis(500);
/// Default fraction of the pinch box the fingers cover.
pub const DEFAULT_PINCH_PERCENT: f64 = 0.75;
/// Default pinch duration; the driver speed is derived from it.
pub const DEFAULT_PINCH_DURATION: Duration = Duration::from_millis(500);
/// Half the side length of the box a pinch is performed in.
pub const PINCH_HALF_EXTENT: i32 = 100;

/// A logical touch gesture.
///
/// Built once and consumed by [`perform`](Self::perform).
#[derive(Debug, Clone, PartialEq)]
pub enum GestureSpec {
    /// Short single-finger touch.
    Tap { at: Point },
    /// Single-finger touch held for `duration`.
    LongPress { at: Point, duration: Duration },
    /// Touch at `from`, travel to `to` over `duration`, release.
    Drag { from: Point, to: Point, duration: Duration },
    /// Two-finger pinch centred on `center`.
    Pinch {
        center: Point,
        direction: PinchDirection,
        percent: f64,
        duration: Duration,
    },
}

impl GestureSpec {
    pub fn tap(at: Point) -> Self {
        GestureSpec::Tap { at }
    }

    /// Long press with the default 0.9s hold.
    pub fn long_press(at: Point) -> Self {
        GestureSpec::LongPress { at, duration: DEFAULT_LONG_PRESS }
    }

    /// Drag with the default 0.5s travel time.
    pub fn drag(from: Point, to: Point) -> Self {
        GestureSpec::Drag { from, to, duration: DEFAULT_DRAG_MOVE }
    }

    /// Pinch with the default percent and duration.
    pub fn pinch(center: Point, direction: PinchDirection) -> Self {
        GestureSpec::Pinch {
            center,
            direction,
            percent: DEFAULT_PINCH_PERCENT,
            duration: DEFAULT_PINCH_DURATION,
        }
    }

    /// Returns a short, static name suitable for tracing span metadata.
    pub fn name(&self) -> &'static str {
        match self {
            GestureSpec::Tap { .. } => "tap",
            GestureSpec::LongPress { .. } => "long_press",
            GestureSpec::Drag { .. } => "drag",
            GestureSpec::Pinch { .. } => "pinch",
        }
    }

    /// The pointer sequence for single-finger gestures, `None` for pinch.
    pub fn pointer_actions(&self) -> Option<Vec<PointerAction>> {
        let actions = match *self {
            GestureSpec::Tap { at } => press(at, TAP_HOLD),
            GestureSpec::LongPress { at, duration } => press(at, duration),
            GestureSpec::Drag { from, to, duration } => vec![
                move_to(from, Duration::ZERO),
                PointerAction::Down,
                PointerAction::Pause(DRAG_GRAB),
                move_to(to, duration),
                PointerAction::Up,
            ],
            GestureSpec::Pinch { .. } => return None,
        };
        Some(actions)
    }

    /// How long to wait after the gesture before anything else happens.
    pub fn settle_delay(&self) -> Duration {
        match self {
            GestureSpec::Tap { .. } => TAP_SETTLE,
            GestureSpec::LongPress { .. } => LONG_PRESS_SETTLE,
            GestureSpec::Drag { .. } => DRAG_SETTLE,
            GestureSpec::Pinch { .. } => PINCH_SETTLE,
        }
    }

    /// Sends the gesture to `device` and waits out its settle delay.
    ///
    /// The gesture changes on-screen state and is not idempotent; two taps
    /// may well undo each other.
    pub async fn perform<D>(self, device: &D) -> Result<(), DriverError>
    where
        D: DeviceControl + ?Sized,
    {
        info!(gesture = %self, "performing gesture");

        match self {
            GestureSpec::Pinch { center, direction, percent, duration } => {
                let region = Region::around(center, PINCH_HALF_EXTENT);
                let speed = pinch_speed(duration);
                device.pinch(direction, region, percent, speed).await?;
            }
            _ => {
                if let Some(actions) = self.pointer_actions() {
                    device.perform_actions(&actions).await?;
                }
            }
        }

        info!(gesture = self.name(), "gesture completed");
        sleep(self.settle_delay()).await;
        Ok(())
    }
}

impl fmt::Display for GestureSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GestureSpec::Tap { at } => write!(f, "tap at {at}"),
            GestureSpec::LongPress { at, duration } => {
                write!(f, "long press at {at} for {:.1}s", duration.as_secs_f64())
            }
            GestureSpec::Drag { from, to, .. } => write!(f, "drag from {from} to {to}"),
            GestureSpec::Pinch { center, direction, .. } => {
                write!(f, "pinch {direction} at {center}")
            }
        }
    }
}

fn move_to(point: Point, duration: Duration) -> PointerAction {
    PointerAction::Move { x: point.x, y: point.y, duration }
}

fn press(at: Point, hold: Duration) -> Vec<PointerAction> {
    vec![
        move_to(at, Duration::ZERO),
        PointerAction::Down,
        PointerAction::Pause(hold),
        PointerAction::Up,
    ]
}

/// Driver speed for a pinch lasting `duration`: whole milliseconds.
fn pinch_speed(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}
