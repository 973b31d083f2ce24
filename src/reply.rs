use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;
use url::Url;

use crate::commands::CommandResult;
use crate::event::MessageEvent;

/// Where an outbound message goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Private(i64),
    Group(i64),
}

impl Target {
    pub fn id(&self) -> i64 {
        match self {
            Target::Private(id) | Target::Group(id) => *id,
        }
    }

    fn action(&self) -> &'static str {
        match self {
            Target::Private(_) => "send_private_msg",
            Target::Group(_) => "send_group_msg",
        }
    }

    fn id_key(&self) -> &'static str {
        match self {
            Target::Private(_) => "user_id",
            Target::Group(_) => "group_id",
        }
    }
}

impl From<MessageEvent<'_>> for Target {
    fn from(message: MessageEvent<'_>) -> Self {
        match message {
            MessageEvent::Private(msg) => Target::Private(msg.user_id),
            MessageEvent::Group(msg) => Target::Group(msg.group_id),
        }
    }
}

/// One outbound message unit, e.g. `{"type": "text", "data": {"text": "hi"}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Unit {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: Value,
}

impl Unit {
    pub fn text(text: &str) -> Self {
        Self {
            kind: "text",
            data: json!({ "text": text }),
        }
    }

    pub fn reply(message_id: i64) -> Self {
        Self {
            kind: "reply",
            data: json!({ "id": message_id }),
        }
    }

    pub fn file(uri: &str, name: Option<&str>) -> Self {
        let data = match name {
            Some(name) => json!({ "file": uri, "name": name }),
            None => json!({ "file": uri }),
        };
        Self { kind: "file", data }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageBody {
    Unit(Unit),
    /// When threading, the first unit is the reply tag.
    Units(Vec<Unit>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub target: Target,
    pub reply_to: Option<i64>,
    pub body: MessageBody,
    pub echo: String,
}

impl OutboundMessage {
    pub fn new(target: Target, body: MessageBody, reply_to: Option<i64>) -> Self {
        Self {
            target,
            reply_to,
            body,
            echo: default_echo(target.id(), reply_to),
        }
    }

    /// Text message, threaded under `reply_to` when given.
    pub fn text(target: Target, text: &str, reply_to: Option<i64>) -> Self {
        let body = match reply_to {
            Some(id) => MessageBody::Units(vec![Unit::reply(id), Unit::text(text)]),
            None => MessageBody::Unit(Unit::text(text)),
        };
        Self::new(target, body, reply_to)
    }

    /// File message; these are never threaded.
    pub fn file(target: Target, uri: &str, name: &str) -> Self {
        Self::new(target, MessageBody::Unit(Unit::file(uri, Some(name))), None)
    }

    pub fn to_frame(&self) -> ActionFrame {
        let mut params = serde_json::Map::new();
        params.insert(self.target.id_key().to_string(), json!(self.target.id()));
        params.insert("message".to_string(), json!(self.body));
        ActionFrame {
            action: self.target.action().to_string(),
            params: Value::Object(params),
            echo: self.echo.clone(),
        }
    }
}

/// `{action, params, echo}` request understood by the protocol server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionFrame {
    pub action: String,
    pub params: Value,
    pub echo: String,
}

impl ActionFrame {
    pub fn set_online_status(status: u32) -> Self {
        Self {
            action: "set_online_status".to_string(),
            params: json!({
                "status": status,
                "ext_status": 0,
                "battery_status": 0,
            }),
            echo: "auto_login".to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize action frame")
    }
}

/// `"<target>"` or `"<target>_<reply>"`.
pub fn default_echo(target_id: i64, reply_to: Option<i64>) -> String {
    match reply_to {
        Some(reply) => format!("{}_{}", target_id, reply),
        None => target_id.to_string(),
    }
}

/// Inverse of [`default_echo`]; `None` for custom echo strings.
pub fn parse_echo(echo: &str) -> Option<(i64, Option<i64>)> {
    match echo.split_once('_') {
        Some((target, reply)) => Some((target.parse().ok()?, Some(reply.parse().ok()?))),
        None => Some((echo.parse().ok()?, None)),
    }
}

/// Turn a command result into the messages answering `message`: the text
/// threaded under the triggering message first, then the file.
pub fn build_replies(
    message: MessageEvent<'_>,
    result: &CommandResult,
) -> Result<Vec<OutboundMessage>> {
    if result.is_empty() {
        bail!("Command result has neither text nor file");
    }

    let target = Target::from(message);
    let mut replies = Vec::with_capacity(2);

    if let Some(text) = &result.text {
        replies.push(OutboundMessage::text(
            target,
            text,
            Some(message.fields().message_id),
        ));
    }

    if let Some(file) = &result.file {
        replies.push(OutboundMessage::file(
            target,
            &resolve_file_uri(&file.path)?,
            &file.name,
        ));
    }

    Ok(replies)
}

/// Absolute `file://` URI for a local path; URLs pass through unchanged.
pub fn resolve_file_uri(path: &str) -> Result<String> {
    if let Ok(url) = Url::parse(path) {
        if url.scheme().len() > 1 {
            return Ok(url.into());
        }
    }
    let absolute = std::path::absolute(Path::new(path))
        .with_context(|| format!("Failed to resolve {}", path))?;
    Url::from_file_path(&absolute)
        .map(String::from)
        .map_err(|_| anyhow!("Not a valid file path: {}", absolute.display()))
}
