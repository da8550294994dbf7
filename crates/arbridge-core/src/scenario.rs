//! The placement walkthrough and the session lifecycle around it.
//!
//! [`run_session`] is the top-level entry point. It runs the fixed six-step
//! walkthrough (place, read, reset, move, grow, shrink) through a
//! [`StepRunner`], and then ends the remote session no matter how the
//! walkthrough ended. Everything that happened is returned as a
//! [`RunReport`]. [`run_session_until`] does the same but also stops the
//! walkthrough early when an interrupt future completes, e.g. on Ctrl-C.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::artifacts::ScreenshotStore;
use crate::bridge::CoordinateBridge;
use crate::config::ArBridgeConfig;
use crate::context::switch_to_web_context;
use crate::driver::{DeviceControl, PinchDirection};
use crate::error::AutomationError;
use crate::geometry::Point;
use crate::gesture::GestureSpec;
use crate::operator::Operator;
use crate::step::{StepResult, StepRunner, DEFAULT_STEP_GRACE};

/// Pause after entering the web context before anything is measured.
const WEB_SURFACE_SETTLE: Duration = Duration::from_secs(2);

/// Extra wait after an executed placement tap.
const PLACEMENT_WAIT: Duration = Duration::from_secs(3);

/// Drag target as a fraction of the window (upper right).
const MOVE_TARGET: (f64, f64) = (0.8, 0.2);

pub const STEP_PLACE: &str = "Tap [Place Object]";
pub const STEP_RESET: &str = "LongPress [Reset]";
pub const STEP_MOVE: &str = "DragDrop [Move Object]";
pub const STEP_GROW: &str = "PinchOut [Grow]";
pub const STEP_SHRINK: &str = "PinchIn [Shrink]";

pub const READ_INITIAL: &str = "Read [Initial Coordinates]";
pub const READ_AFTER_RESET: &str = "Read [After Reset]";
pub const READ_AFTER_MOVE: &str = "Read [After Move]";
pub const READ_AFTER_GROW: &str = "Read [After Grow]";

/// Everything the walkthrough needs besides the device and the operator.
#[derive(Debug, Clone)]
pub struct ScenarioSettings {
    pub bridge: CoordinateBridge,
    /// Timeout of the first read after placement.
    pub initial_read_timeout: Duration,
    /// Timeout of the re-reads after reset, move and grow.
    pub followup_read_timeout: Duration,
    /// Pause between a gesture and its "after" screenshot.
    pub step_grace: Duration,
    pub screenshot_dir: PathBuf,
}

impl Default for ScenarioSettings {
    fn default() -> Self {
        Self {
            bridge: CoordinateBridge::default(),
            initial_read_timeout: Duration::from_secs(20),
            followup_read_timeout: Duration::from_secs(10),
            step_grace: DEFAULT_STEP_GRACE,
            screenshot_dir: PathBuf::from("."),
        }
    }
}

impl ScenarioSettings {
    pub fn from_config(config: &ArBridgeConfig) -> Self {
        Self {
            bridge: CoordinateBridge::new(config.probe_selector.clone())
                .with_timing(config.timing.bridge()),
            initial_read_timeout: config.timing.initial_read_timeout(),
            followup_read_timeout: config.timing.followup_read_timeout(),
            step_grace: config.timing.step_grace(),
            screenshot_dir: config.screenshot_dir.clone(),
        }
    }
}

/// Summary of one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Every step recorded before the run ended, in order.
    pub steps: Vec<StepResult>,
    /// Last coordinates the bridge reported, if any read succeeded.
    pub final_point: Option<Point>,
    /// Why the run stopped early.
    pub error: Option<String>,
    /// Whether the run was cut short by an interrupt.
    #[serde(default)]
    pub interrupted: bool,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn executed_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.executed).count()
    }
}

/// Runs the walkthrough on `device` and then quits the session.
///
/// Teardown always happens. A failing `quit` is logged and does not replace
/// the walkthrough's own outcome in the report.
pub async fn run_session<D, O>(device: &mut D, operator: O, settings: &ScenarioSettings) -> RunReport
where
    D: DeviceControl + ?Sized,
    O: Operator,
{
    run_session_until(device, operator, settings, std::future::pending::<()>()).await
}

/// Like [`run_session`], but abandons the walkthrough as soon as `interrupt`
/// completes. The session is still quit and the steps recorded so far are
/// kept; the report's error is [`AutomationError::Interrupted`].
pub async fn run_session_until<D, O, I>(
    device: &mut D,
    operator: O,
    settings: &ScenarioSettings,
    interrupt: I,
) -> RunReport
where
    D: DeviceControl + ?Sized,
    O: Operator,
    I: Future<Output = ()>,
{
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    let span = info_span!("session", %run_id);

    async {
        let screenshots = ScreenshotStore::new(settings.screenshot_dir.clone());
        let mut runner = StepRunner::new(operator, screenshots).with_grace(settings.step_grace);
        let mut last = None;

        let outcome = tokio::select! {
            outcome = run_walkthrough(&mut *device, &mut runner, settings, &mut last) => outcome,
            () = interrupt => {
                warn!("interrupted, abandoning walkthrough");
                Err(AutomationError::Interrupted)
            }
        };
        match &outcome {
            Ok(point) => info!(%point, "walkthrough complete"),
            Err(e) => error!(error = %e, "walkthrough failed"),
        }

        match device.quit().await {
            Ok(()) => info!("session closed"),
            Err(e) => warn!(error = %e, "failed to close session"),
        }

        let interrupted = matches!(outcome, Err(AutomationError::Interrupted));
        RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            steps: runner.into_results(),
            final_point: last,
            error: outcome.err().map(|e| e.to_string()),
            interrupted,
        }
    }
    .instrument(span)
    .await
}

/// The six-step walkthrough. `last` always holds the most recent coordinates
/// so the caller can report them even when a later step fails.
pub async fn run_walkthrough<D, O>(
    device: &mut D,
    runner: &mut StepRunner<O>,
    settings: &ScenarioSettings,
    last: &mut Option<Point>,
) -> Result<Point, AutomationError>
where
    D: DeviceControl + ?Sized,
    O: Operator,
{
    let available = device.context_ids().await?;
    if !switch_to_web_context(device, &available).await? {
        return Err(AutomationError::ContextSwitchFailed { available });
    }
    sleep(WEB_SURFACE_SETTLE).await;

    let device: &D = device;
    let size = device.window_size().await?;
    info!(%size, "window size");

    if runner
        .run_step(device, STEP_PLACE, GestureSpec::tap(size.center()))
        .await?
    {
        info!("waiting for placement");
        sleep(PLACEMENT_WAIT).await;
    }

    let mut point = read(device, runner, READ_INITIAL, &settings.bridge, settings.initial_read_timeout).await?;
    *last = Some(point);

    let followup = settings.followup_read_timeout;

    if runner.run_step(device, STEP_RESET, GestureSpec::long_press(point)).await? {
        point = read(device, runner, READ_AFTER_RESET, &settings.bridge, followup).await?;
        *last = Some(point);
    }

    let target = size.fraction(MOVE_TARGET.0, MOVE_TARGET.1);
    if runner.run_step(device, STEP_MOVE, GestureSpec::drag(point, target)).await? {
        point = read(device, runner, READ_AFTER_MOVE, &settings.bridge, followup).await?;
        *last = Some(point);
    }

    if runner
        .run_step(device, STEP_GROW, GestureSpec::pinch(point, PinchDirection::Out))
        .await?
    {
        point = read(device, runner, READ_AFTER_GROW, &settings.bridge, followup).await?;
        *last = Some(point);
    }

    runner
        .run_step(device, STEP_SHRINK, GestureSpec::pinch(point, PinchDirection::In))
        .await?;

    Ok(point)
}

async fn read<D, O>(
    device: &D,
    runner: &mut StepRunner<O>,
    name: &str,
    bridge: &CoordinateBridge,
    timeout: Duration,
) -> Result<Point, AutomationError>
where
    D: DeviceControl + ?Sized,
    O: Operator,
{
    let result = bridge.read(device, timeout).await;
    runner.record_read(name, &result);
    result
}
