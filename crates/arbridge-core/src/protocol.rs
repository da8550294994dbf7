//! JSON wire format of the W3C WebDriver protocol, plus the Appium
//! `mobile:` extensions used for pinch gestures.
//!
//! This module only builds request bodies and picks apart response values;
//! the HTTP exchange itself lives in [`crate::webdriver`].
//!
//! Every response has the shape `{"value": ...}`. Failures carry an error
//! object in `value`:
//!
//! ```json
//! {"value": {"error": "no such element", "message": "...", "stacktrace": "..."}}
//! ```

use serde_json::{json, Map, Value};

use crate::driver::{DriverError, PinchDirection, PointerAction};
use crate::geometry::{Region, WindowSize};

/// Key under which W3C drivers return element references.
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Identifier of the single touch input source used for gestures.
const FINGER_ID: &str = "finger";

/// Body of `POST /session`.
pub fn new_session_body(capabilities: &Map<String, Value>) -> Value {
    json!({
        "capabilities": {
            "alwaysMatch": capabilities,
            "firstMatch": [{}],
        }
    })
}

/// Body of `POST /session/{id}/actions` for a one-finger touch sequence.
pub fn pointer_actions_body(actions: &[PointerAction]) -> Value {
    let steps: Vec<Value> = actions.iter().map(encode_pointer_action).collect();
    json!({
        "actions": [{
            "type": "pointer",
            "id": FINGER_ID,
            "parameters": { "pointerType": "touch" },
            "actions": steps,
        }]
    })
}

fn encode_pointer_action(action: &PointerAction) -> Value {
    match *action {
        PointerAction::Move { x, y, duration } => json!({
            "type": "pointerMove",
            "duration": duration.as_millis() as u64,
            "origin": "viewport",
            "x": x,
            "y": y,
        }),
        PointerAction::Down => json!({ "type": "pointerDown", "button": 0 }),
        PointerAction::Pause(duration) => json!({
            "type": "pause",
            "duration": duration.as_millis() as u64,
        }),
        PointerAction::Up => json!({ "type": "pointerUp", "button": 0 }),
    }
}

/// Body of `POST /session/{id}/execute/sync` for a composite pinch.
pub fn pinch_body(direction: PinchDirection, region: Region, percent: f64, speed: u32) -> Value {
    json!({
        "script": direction.script_name(),
        "args": [{
            "left": region.left,
            "top": region.top,
            "width": region.width,
            "height": region.height,
            "percent": percent,
            "speed": speed,
        }]
    })
}

/// Body of `POST /session/{id}/element` for a CSS selector lookup.
pub fn find_element_body(selector: &str) -> Value {
    json!({ "using": "css selector", "value": selector })
}

/// Body of `POST /session/{id}/context`.
pub fn switch_context_body(id: &str) -> Value {
    json!({ "name": id })
}

/// Unwraps a response envelope.
///
/// Returns the `value` member, or a [`DriverError::WebDriver`] if the status
/// is not a success or `value` is an error object.
pub fn decode_response(status: u16, body: &[u8]) -> Result<Value, DriverError> {
    let envelope: Value = serde_json::from_slice(body).map_err(|e| {
        DriverError::JsonParse(format!("HTTP {status}: {e}"))
    })?;
    let value = match envelope {
        Value::Object(mut map) => map.remove("value").unwrap_or(Value::Null),
        other => {
            return Err(DriverError::JsonParse(format!(
                "HTTP {status}: expected object envelope, got {other}"
            )))
        }
    };

    if let Some(error) = value.get("error").and_then(Value::as_str) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(DriverError::WebDriver { error: error.to_string(), message });
    }

    if !(200..300).contains(&status) {
        return Err(DriverError::CommandFailed(format!("HTTP {status}: {value}")));
    }

    Ok(value)
}

/// Extracts `sessionId` from the value of a new-session response.
pub fn session_id(value: &Value) -> Result<String, DriverError> {
    value
        .get("sessionId")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| DriverError::JsonParse(format!("no sessionId in {value}")))
}

/// Extracts the element reference from a find-element response value.
pub fn element_id(value: &Value) -> Result<String, DriverError> {
    value
        .get(ELEMENT_KEY)
        .or_else(|| value.get("ELEMENT"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| DriverError::JsonParse(format!("no element reference in {value}")))
}

/// Reads a string value, e.g. element text or the current context.
pub fn string_value(value: &Value) -> Result<String, DriverError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| DriverError::JsonParse(format!("expected string, got {value}")))
}

/// Reads a list of strings, e.g. the available contexts.
pub fn string_list(value: &Value) -> Result<Vec<String>, DriverError> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .ok_or_else(|| DriverError::JsonParse(format!("expected array, got {value}")))
}

/// Reads the size from a window-rect value, truncating fractional sizes.
pub fn window_size(value: &Value) -> Result<WindowSize, DriverError> {
    let dimension = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_f64)
            .map(|v| v as i32)
            .ok_or_else(|| DriverError::JsonParse(format!("no {key} in window rect {value}")))
    };
    Ok(WindowSize {
        width: dimension("width")?,
        height: dimension("height")?,
    })
}
