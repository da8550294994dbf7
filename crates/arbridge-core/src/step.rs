//! Operator-gated step execution.
//!
//! This module provides [`StepRunner`], which wraps each gesture in the
//! confirm → screenshot → gesture → grace → screenshot sequence and keeps an
//! ordered record of what happened for the end-of-run report.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::artifacts::ScreenshotStore;
use crate::driver::DeviceControl;
use crate::error::AutomationError;
use crate::geometry::Point;
use crate::gesture::GestureSpec;
use crate::operator::Operator;

/// Pause between a gesture finishing and the "after" screenshot.
pub const DEFAULT_STEP_GRACE: Duration = Duration::from_secs(2);

/// How a step ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum StepOutcome {
    Success,
    Skipped,
    Failed(String),
}

/// Record of one orchestrated step. Written once, never changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Step label as shown to the operator.
    pub name: String,
    /// Whether the step touched the device.
    pub executed: bool,
    pub outcome: StepOutcome,
    /// Coordinates read by this step, for coordinate reads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point: Option<Point>,
    /// When the step finished.
    pub finished_at: DateTime<Utc>,
}

impl StepResult {
    fn new(name: &str, executed: bool, outcome: StepOutcome, point: Option<Point>) -> Self {
        Self {
            name: name.to_string(),
            executed,
            outcome,
            point,
            finished_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == StepOutcome::Success
    }
}

/// Runs gestures behind an operator gate and records the results.
pub struct StepRunner<O> {
    operator: O,
    screenshots: ScreenshotStore,
    grace: Duration,
    results: Vec<StepResult>,
}

impl<O: Operator> StepRunner<O> {
    pub fn new(operator: O, screenshots: ScreenshotStore) -> Self {
        Self {
            operator,
            screenshots,
            grace: DEFAULT_STEP_GRACE,
            results: Vec::new(),
        }
    }

    /// Sets the pause between a gesture and the "after" screenshot.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Results recorded so far, in execution order.
    pub fn results(&self) -> &[StepResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<StepResult> {
        self.results
    }

    /// Asks the operator, and if approved runs `gesture` between two audit
    /// screenshots.
    ///
    /// # Returns
    ///
    /// `Ok(true)` if the step ran, `Ok(false)` if the operator declined. A
    /// declined step performs no gesture and captures no screenshots.
    ///
    /// # Errors
    ///
    /// A failed gesture is recorded as [`StepOutcome::Failed`] and returned.
    /// Screenshot failures are logged and otherwise ignored.
    pub async fn run_step<D>(
        &mut self,
        device: &D,
        name: &str,
        gesture: GestureSpec,
    ) -> Result<bool, AutomationError>
    where
        D: DeviceControl + ?Sized,
    {
        let span = info_span!("step", step = name, gesture = gesture.name());
        async {
            let approved = self
                .operator
                .confirm(name)
                .await
                .map_err(AutomationError::Operator)?;
            if !approved {
                info!("step skipped");
                self.results.push(StepResult::new(name, false, StepOutcome::Skipped, None));
                return Ok(false);
            }

            let start = Instant::now();
            self.snapshot(device, &format!("{name}_before")).await;

            if let Err(e) = gesture.perform(device).await {
                self.results.push(StepResult::new(
                    name,
                    true,
                    StepOutcome::Failed(e.to_string()),
                    None,
                ));
                return Err(e.into());
            }

            tokio::time::sleep(self.grace).await;
            self.snapshot(device, &format!("{name}_after")).await;

            debug!(elapsed_ms = start.elapsed().as_millis() as u64, "step complete");
            self.results.push(StepResult::new(name, true, StepOutcome::Success, None));
            Ok(true)
        }
        .instrument(span)
        .await
    }

    /// Records the outcome of a coordinate read that belongs to the run.
    pub fn record_read(&mut self, name: &str, result: &Result<Point, AutomationError>) {
        let record = match result {
            Ok(point) => StepResult::new(name, true, StepOutcome::Success, Some(*point)),
            Err(e) => StepResult::new(name, true, StepOutcome::Failed(e.to_string()), None),
        };
        self.results.push(record);
    }

    async fn snapshot<D>(&self, device: &D, label: &str)
    where
        D: DeviceControl + ?Sized,
    {
        if let Err(e) = self.screenshots.capture(device, label).await {
            warn!(label, error = %e, "screenshot failed, continuing");
        }
    }
}
