pub mod classify;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

pub use classify::classify_frame;

/// One inbound frame, resolved to exactly one shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Heartbeat(Heartbeat),
    PrivateMessage(ChatMessage),
    GroupMessage(GroupMessage),
    /// Acknowledgment of an outbound action, correlated by `echo`
    ActionResult(ActionResult),
    Unknown(UnknownEvent),
}

/// Borrowed view over the two message variants.
#[derive(Debug, Clone, Copy)]
pub enum MessageEvent<'a> {
    Private(&'a ChatMessage),
    Group(&'a GroupMessage),
}

impl Event {
    pub fn as_message(&self) -> Option<MessageEvent<'_>> {
        match self {
            Event::PrivateMessage(msg) => Some(MessageEvent::Private(msg)),
            Event::GroupMessage(msg) => Some(MessageEvent::Group(msg)),
            _ => None,
        }
    }
}

impl<'a> MessageEvent<'a> {
    /// Fields shared by private and group messages.
    pub fn fields(&self) -> &'a ChatMessage {
        match *self {
            MessageEvent::Private(msg) => msg,
            MessageEvent::Group(msg) => &msg.message,
        }
    }

    pub fn group_id(&self) -> Option<i64> {
        match self {
            MessageEvent::Private(_) => None,
            MessageEvent::Group(msg) => Some(msg.group_id),
        }
    }
}

/// Common envelope fields; every frame with a `post_type` has these.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnknownEvent {
    pub time: Option<i64>,
    pub self_id: Option<i64>,
    pub post_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BotStatus {
    pub online: bool,
    pub good: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Heartbeat {
    pub time: i64,
    pub self_id: i64,
    pub status: BotStatus,
    /// Heartbeat interval in milliseconds
    pub interval: u64,
}

impl Heartbeat {
    pub fn at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.time, 0)
    }
}

/// One element of message content, e.g. `{"type": "text", "data": {"text": "hi"}}`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Segment {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

impl Segment {
    /// Text payload of a `text` segment; `None` for every other kind.
    pub fn text(&self) -> Option<&str> {
        if self.kind != "text" {
            return None;
        }
        self.data.get("text").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[allow(dead_code)]
pub struct Sender {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub nickname: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[allow(dead_code)]
pub struct ChatMessage {
    pub time: i64,
    pub self_id: i64,
    pub message_id: i64,
    pub user_id: i64,
    pub message: Vec<Segment>,
    pub raw_message: String,
    pub sub_type: String,
    #[serde(default)]
    pub sender: Option<Sender>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GroupMessage {
    pub group_id: i64,
    #[serde(flatten)]
    pub message: ChatMessage,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[allow(dead_code)]
pub struct ActionResult {
    pub status: String,
    pub retcode: i64,
    pub echo: String,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub wording: Option<String>,
}

impl ActionResult {
    pub fn is_ok(&self) -> bool {
        self.retcode == 0
    }

    /// Best available failure description.
    pub fn error_message(&self) -> &str {
        self.wording
            .as_deref()
            .filter(|w| !w.is_empty())
            .or(self.message.as_deref())
            .unwrap_or("")
    }
}
