use std::collections::HashSet;

use crate::config::AccessConfig;
use crate::event::{Event, MessageEvent};

/// Whitelist gate in front of command dispatch.
#[derive(Debug, Clone, Default)]
pub struct AccessFilter {
    private_ids: HashSet<i64>,
    group_ids: HashSet<i64>,
}

impl AccessFilter {
    pub fn new(config: &AccessConfig) -> Self {
        Self {
            private_ids: config.private_ids.clone(),
            group_ids: config.group_ids.clone(),
        }
    }

    /// Returns the message view if the event may trigger commands.
    /// Non-message events never pass.
    pub fn admit<'a>(&self, event: &'a Event) -> Option<MessageEvent<'a>> {
        let message = event.as_message()?;
        self.allows(message).then_some(message)
    }

    pub fn allows(&self, message: MessageEvent<'_>) -> bool {
        match message {
            // Only ordinary group chat; "anonymous", "notice" etc. are ignored.
            MessageEvent::Group(msg) => {
                msg.message.sub_type == "normal" && self.group_ids.contains(&msg.group_id)
            }
            MessageEvent::Private(msg) => self.private_ids.contains(&msg.user_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ChatMessage, GroupMessage, Heartbeat, BotStatus, UnknownEvent};

    fn filter() -> AccessFilter {
        AccessFilter::new(&AccessConfig {
            private_ids: [10001].into_iter().collect(),
            group_ids: [20001].into_iter().collect(),
        })
    }

    fn chat(user_id: i64, sub_type: &str) -> ChatMessage {
        ChatMessage {
            time: 0,
            self_id: 42,
            message_id: 1,
            user_id,
            message: Vec::new(),
            raw_message: String::new(),
            sub_type: sub_type.to_string(),
            sender: None,
        }
    }

    fn group(group_id: i64, sub_type: &str) -> Event {
        Event::GroupMessage(GroupMessage {
            group_id,
            message: chat(99999, sub_type),
        })
    }

    #[test]
    fn test_private_whitelist() {
        let filter = filter();
        assert!(filter
            .admit(&Event::PrivateMessage(chat(10001, "friend")))
            .is_some());
        assert!(filter
            .admit(&Event::PrivateMessage(chat(10002, "friend")))
            .is_none());
    }

    #[test]
    fn test_group_whitelist() {
        let filter = filter();
        assert!(filter.admit(&group(20001, "normal")).is_some());
        assert!(filter.admit(&group(20002, "normal")).is_none());
    }

    #[test]
    fn test_group_requires_normal_sub_type() {
        let filter = filter();
        for sub_type in ["poke", "anonymous", "notice", ""] {
            assert!(
                filter.admit(&group(20001, sub_type)).is_none(),
                "sub_type {:?} should be rejected",
                sub_type
            );
        }
    }

    #[test]
    fn test_group_sender_does_not_need_private_whitelist() {
        let filter = filter();
        let event = group(20001, "normal");
        let Some(message) = filter.admit(&event) else {
            panic!("group message should pass");
        };
        assert_eq!(message.fields().user_id, 99999);
        assert_eq!(message.group_id(), Some(20001));
    }

    #[test]
    fn test_non_message_events_rejected() {
        let filter = filter();
        let heartbeat = Event::Heartbeat(Heartbeat {
            time: 0,
            self_id: 42,
            status: BotStatus {
                online: true,
                good: true,
            },
            interval: 30000,
        });
        assert!(filter.admit(&heartbeat).is_none());
        assert!(filter
            .admit(&Event::Unknown(UnknownEvent::default()))
            .is_none());
    }

    #[test]
    fn test_default_filter_rejects_everything() {
        let filter = AccessFilter::default();
        assert!(filter
            .admit(&Event::PrivateMessage(chat(10001, "friend")))
            .is_none());
        assert!(filter.admit(&group(20001, "normal")).is_none());
    }
}
