use async_trait::async_trait;

use super::{CommandHandler, CommandResult};

const DEFAULT_HELP: &str = "Commands:\n/help - show this message";

/// Replies with a fixed help text.
pub struct HelpCommand {
    text: String,
}

impl HelpCommand {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Default for HelpCommand {
    fn default() -> Self {
        Self::new(DEFAULT_HELP)
    }
}

#[async_trait]
impl CommandHandler for HelpCommand {
    async fn handle(&self, _command: &str) -> Option<CommandResult> {
        Some(CommandResult::text(self.text.clone()))
    }
}
