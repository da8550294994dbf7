//! # arbridge-core
//!
//! Core library for driving augmented-reality placement UIs on a mobile
//! device through a remote WebDriver / Appium session.
//!
//! An AR scene renders outside the accessibility tree, so there is no element
//! to query for "where is the object now". The target application instead
//! writes the object's screen position into a small text element (the
//! *probe*) inside its embedded web view. This crate performs gestures on the
//! device and reads that probe back to find out what each gesture did.
//!
//! ## Modules
//!
//! - [`driver`] - The [`driver::DeviceControl`] trait and its vocabulary
//! - [`webdriver`] - `DeviceControl` over HTTP to a WebDriver / Appium server
//! - [`protocol`] - WebDriver JSON request and response bodies
//! - [`gesture`] - Tap, long press, drag and pinch primitives
//! - [`context`] - Switching into the embedded web context
//! - [`settle`] - Bounded polling until a value parses
//! - [`bridge`] - Reading settled coordinates from the probe
//! - [`step`] - Operator-gated steps with audit screenshots
//! - [`scenario`] - The placement walkthrough and session teardown
//! - [`operator`] - Yes/no confirmation sources
//! - [`artifacts`] - Screenshot files
//! - [`config`] - Persistent configuration
//! - [`geometry`] - Points, window sizes and regions
//! - [`error`] - Run-level errors
//!
//! ## External Dependencies
//!
//! A WebDriver server that can reach the device must be running, e.g. Appium
//! with the UiAutomator2 driver (`appium driver install uiautomator2`).
//!
//! ## Example
//!
//! ```no_run
//! use arbridge_core::config::ArBridgeConfig;
//! use arbridge_core::operator::AutoApprove;
//! use arbridge_core::scenario::{run_session, ScenarioSettings};
//! use arbridge_core::webdriver::WebDriverSession;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ArBridgeConfig::load();
//! let mut session = WebDriverSession::start(&config.server_url, &config.capabilities).await?;
//!
//! let report = run_session(&mut session, AutoApprove, &ScenarioSettings::from_config(&config)).await;
//! for step in &report.steps {
//!     println!("{}: {:?}", step.name, step.outcome);
//! }
//! # Ok(())
//! # }
//! ```

pub mod artifacts;
pub mod bridge;
pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod geometry;
pub mod gesture;
pub mod operator;
pub mod protocol;
pub mod scenario;
pub mod settle;
pub mod step;
pub mod webdriver;
