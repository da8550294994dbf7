//! Coordinate bridge behaviour against a scripted probe, on a paused clock.

mod common;

use std::time::Duration;

use tokio::time::Instant;

use arbridge_core::bridge::{read_settled_coordinates, BridgeTiming, CoordinateBridge};
use arbridge_core::driver::RenderContext;
use arbridge_core::error::AutomationError;
use arbridge_core::geometry::Point;

use common::{Call, FakeDevice};

const SELECTOR: &str = "#ar_coords_textview";

#[tokio::test(start_paused = true)]
async fn settles_through_unset_and_partial_values() {
    let device = FakeDevice::new().with_probe(&[Some(""), Some("-"), Some("120,"), Some("120,340")]);
    let start = Instant::now();

    let point = read_settled_coordinates(&device, SELECTOR, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(point, Point::new(120, 340));
    // One presence read, then three settle reads half a second apart.
    assert_eq!(device.probe_reads(), 4);
    assert_eq!(start.elapsed(), Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn malformed_values_are_not_errors() {
    let device = FakeDevice::new().with_probe(&[
        Some(""),
        Some("12"),
        Some("a,b"),
        Some("1,2,3"),
        Some("7.9,8.1"),
    ]);

    let point = read_settled_coordinates(&device, SELECTOR, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(point, Point::new(7, 8));
}

#[tokio::test(start_paused = true)]
async fn settle_phase_reads_a_fresh_value() {
    let device = FakeDevice::new().with_probe(&[Some("10,20"), Some("30,40")]);
    let point = read_settled_coordinates(&device, SELECTOR, Duration::from_secs(5))
        .await
        .unwrap();
    // The presence read only checks that the probe exists.
    assert_eq!(point, Point::new(30, 40));
    assert_eq!(device.probe_reads(), 2);
}

#[tokio::test(start_paused = true)]
async fn disappearing_probe_keeps_polling() {
    let device = FakeDevice::new().with_probe(&[Some("-"), None, None, Some("5,6")]);
    let point = read_settled_coordinates(&device, SELECTOR, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(point, Point::new(5, 6));
}

#[tokio::test(start_paused = true)]
async fn never_valid_times_out() {
    let device = FakeDevice::new().with_constant_probe("pending");
    let start = Instant::now();

    let err = read_settled_coordinates(&device, SELECTOR, Duration::from_secs(2))
        .await
        .unwrap_err();

    match err {
        AutomationError::BridgeTimeout { selector, timeout, polls, last_value } => {
            assert_eq!(selector, SELECTOR);
            assert_eq!(timeout, Duration::from_secs(2));
            assert_eq!(polls, 4);
            assert_eq!(last_value.as_deref(), Some("pending"));
        }
        other => panic!("expected BridgeTimeout, got {other:?}"),
    }
    assert_eq!(start.elapsed(), Duration::from_secs(2));
    // No read after the deadline: one presence read plus four settle reads.
    assert_eq!(device.probe_reads(), 5);
}

#[tokio::test(start_paused = true)]
async fn absent_probe_reports_where_it_looked() {
    let device = FakeDevice::new()
        .with_contexts(&["NATIVE_APP", "WEBVIEW_com.example"])
        .in_context(RenderContext::Native)
        .with_probe(&[None]);
    let start = Instant::now();

    let err = read_settled_coordinates(&device, SELECTOR, Duration::from_secs(20))
        .await
        .unwrap_err();

    match &err {
        AutomationError::ProbeNeverAppeared { selector, context, available, snapshot } => {
            assert_eq!(selector, SELECTOR);
            assert_eq!(context, "NATIVE_APP");
            assert_eq!(available, &vec!["NATIVE_APP".to_string(), "WEBVIEW_com.example".to_string()]);
            assert!(snapshot.starts_with("<hierarchy>"));
        }
        other => panic!("expected ProbeNeverAppeared, got {other:?}"),
    }

    // Only the 5s presence window was spent; the 20s settle phase never ran.
    assert_eq!(start.elapsed(), Duration::from_secs(5));
    assert_eq!(device.probe_reads(), 10);
    assert_eq!(device.count(|c| *c == Call::PageSource), 1);
}

#[tokio::test(start_paused = true)]
async fn transport_failure_is_not_absorbed() {
    let device = FakeDevice::new().failing_probe();
    let err = read_settled_coordinates(&device, SELECTOR, Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, AutomationError::TransportFailure(_)));
    assert_eq!(device.probe_reads(), 1);
}

#[tokio::test(start_paused = true)]
async fn custom_timing_is_respected() {
    let device = FakeDevice::new().with_probe(&[None]);
    let bridge = CoordinateBridge::new(SELECTOR).with_timing(BridgeTiming {
        presence_timeout: Duration::from_secs(1),
        poll_interval: Duration::from_millis(250),
    });
    let start = Instant::now();

    let err = bridge.read(&device, Duration::from_secs(10)).await.unwrap_err();
    assert!(matches!(err, AutomationError::ProbeNeverAppeared { .. }));
    assert_eq!(start.elapsed(), Duration::from_secs(1));
    assert_eq!(device.probe_reads(), 4);
}
