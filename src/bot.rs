use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tracing::{debug, error, info, warn};

use crate::access::AccessFilter;
use crate::commands::{extract_command, CommandRegistry};
use crate::coordinator::Coordinator;
use crate::event::{classify_frame, ActionResult, Event};
use crate::liveness::Liveness;
use crate::platform::{ConnectionState, Connector, FrameStream, Outbox};
use crate::reply::{build_replies, parse_echo};

/// Shared bot state: everything the receive loop and background jobs need.
pub struct Bot {
    access: AccessFilter,
    commands: CommandRegistry,
    coordinator: Arc<Coordinator>,
    liveness: Liveness,
    outbox: Outbox,
    reconnect_delay: Duration,
}

impl Bot {
    pub fn new(
        access: AccessFilter,
        commands: CommandRegistry,
        liveness: Liveness,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            access,
            commands,
            coordinator: Arc::new(Coordinator::new()),
            liveness,
            outbox: Outbox::new(),
            reconnect_delay,
        }
    }

    pub fn coordinator(&self) -> Arc<Coordinator> {
        self.coordinator.clone()
    }

    #[cfg(test)]
    pub fn is_online(&self) -> bool {
        self.liveness.is_online()
    }

    /// Liveness self-healing; only meaningful while connected.
    pub async fn check_liveness(&self) {
        if self.outbox.state().await == ConnectionState::Disconnected {
            debug!("Not connected, skipping liveness check");
            return;
        }
        if let Err(e) = self.liveness.check(&self.outbox).await {
            warn!("auto_login: {:#}", e);
        }
    }

    pub async fn handle_frame(&self, text: &str) {
        self.handle_event(classify_frame(text)).await;
    }

    pub async fn handle_event(&self, event: Event) {
        match &event {
            Event::ActionResult(result) => log_action_result(result),
            Event::Heartbeat(heartbeat) => self.liveness.record(heartbeat),
            Event::PrivateMessage(_) | Event::GroupMessage(_) => self.handle_message(&event).await,
            Event::Unknown(envelope) => debug!(
                "Ignoring event post_type={:?} from bot {:?} at {:?}",
                envelope.post_type, envelope.self_id, envelope.time
            ),
        }
    }

    async fn handle_message(&self, event: &Event) {
        let Some(message) = self.access.admit(event) else {
            return;
        };
        let Some(command) = extract_command(&message.fields().message) else {
            return;
        };

        match message.group_id() {
            Some(group_id) => info!(
                "Received command: {} from user: {} in group: {}",
                command,
                message.fields().user_id,
                group_id
            ),
            None => info!(
                "Received command: {} from user: {}",
                command,
                message.fields().user_id
            ),
        }

        // Held until the replies are out: file replies are read from the temp
        // directory by the server while it processes the send.
        let _permit = self.coordinator.begin_command().await;

        let Some(result) = self.commands.dispatch(command).await else {
            return;
        };

        let replies = match build_replies(message, &result) {
            Ok(replies) => replies,
            Err(e) => {
                warn!("Dropping reply to '{}': {:#}", command, e);
                return;
            }
        };

        for reply in replies {
            debug!(
                "Sending reply '{}' to {:?} (thread: {:?})",
                reply.echo, reply.target, reply.reply_to
            );
            let sent = match reply.to_frame().to_json() {
                Ok(frame) => self.outbox.send(frame).await,
                Err(e) => Err(e),
            };
            if let Err(e) = sent {
                error!("Failed to send reply '{}': {:#}", reply.echo, e);
                return;
            }
        }
    }

    /// Process frames in order until the stream fails; returns why it ended.
    async fn receive_loop(&self, stream: &mut dyn FrameStream) -> anyhow::Error {
        loop {
            match stream.next_frame().await {
                Some(Ok(text)) => self.handle_frame(&text).await,
                Some(Err(e)) => return e,
                None => return anyhow!("Connection closed by server"),
            }
        }
    }
}

fn log_action_result(result: &ActionResult) {
    if result.is_ok() {
        debug!("Action '{}' succeeded", result.echo);
        return;
    }
    match parse_echo(&result.echo) {
        Some((target, Some(reply_to))) => warn!(
            "Action '{}' failed <{}>: {} (reply to message {} of {})",
            result.echo,
            result.retcode,
            result.error_message(),
            reply_to,
            target
        ),
        Some((target, None)) => warn!(
            "Action '{}' failed <{}>: {} (message to {})",
            result.echo,
            result.retcode,
            result.error_message(),
            target
        ),
        None => warn!(
            "Action '{}' failed <{}>: {}",
            result.echo,
            result.retcode,
            result.error_message()
        ),
    }
}

/// Connection supervisor. Connects, runs the receive loop, and on any
/// transport failure waits the reconnect delay and starts over. Never
/// returns.
pub async fn run(bot: &Bot, connector: &dyn Connector) {
    loop {
        bot.liveness.reset();
        info!("Connecting to {}...", connector.endpoint());

        match connector.connect().await {
            Ok((sink, mut stream)) => {
                bot.outbox.attach(sink).await;
                info!("Connected to {}", connector.endpoint());

                bot.check_liveness().await;
                let reason = bot.receive_loop(stream.as_mut()).await;

                bot.outbox.detach().await;
                error!("Disconnected from {}: {:#}", connector.endpoint(), reason);
            }
            Err(e) => error!("{:#}", e),
        }

        info!("Reconnecting in {:?}", bot.reconnect_delay);
        tokio::time::sleep(bot.reconnect_delay).await;
    }
}
