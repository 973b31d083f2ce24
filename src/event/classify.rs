use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{ActionResult, ChatMessage, Event, GroupMessage, Heartbeat, UnknownEvent};

/// Decode one raw text frame. Frames that are not JSON become an empty
/// `UnknownEvent`.
pub fn classify_frame(text: &str) -> Event {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => classify(&value),
        Err(e) => {
            debug!("Frame is not valid JSON ({}): {}", e, text);
            Event::Unknown(UnknownEvent::default())
        }
    }
}

/// Resolve a decoded frame to the most specific shape it satisfies.
///
/// Candidates are tried in order: action result (only when `echo` is set),
/// then the envelope, then a refinement chosen by `post_type`. A refinement
/// that fails to decode keeps the envelope.
pub fn classify(value: &Value) -> Event {
    if value.get("echo").is_some_and(|echo| !echo.is_null()) {
        match ActionResult::deserialize(value) {
            Ok(result) => return Event::ActionResult(result),
            Err(e) => debug!("Frame has echo but is not an action result: {}", e),
        }
    }

    let envelope = decode_envelope(value);

    let refined = match value.get("post_type").and_then(Value::as_str) {
        Some("message") => match value.get("message_type").and_then(Value::as_str) {
            Some("group") => GroupMessage::deserialize(value).map(Event::GroupMessage),
            _ => ChatMessage::deserialize(value).map(Event::PrivateMessage),
        },
        Some("meta_event") => match value.get("meta_event_type").and_then(Value::as_str) {
            Some("heartbeat") => Heartbeat::deserialize(value).map(Event::Heartbeat),
            _ => return Event::Unknown(envelope),
        },
        _ => return Event::Unknown(envelope),
    };

    match refined {
        Ok(event) => event,
        Err(e) => {
            debug!(
                "Keeping envelope for malformed '{}' frame: {}",
                envelope.post_type.as_deref().unwrap_or_default(),
                e
            );
            Event::Unknown(envelope)
        }
    }
}

/// Field-by-field so one mistyped field does not discard the others.
fn decode_envelope(value: &Value) -> UnknownEvent {
    UnknownEvent {
        time: value.get("time").and_then(Value::as_i64),
        self_id: value.get("self_id").and_then(Value::as_i64),
        post_type: value
            .get("post_type")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}
