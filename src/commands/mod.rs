pub mod help;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::event::Segment;

pub use help::HelpCommand;

/// A file produced by a command, relayed as a separate file message.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandFile {
    pub name: String,
    /// Local path or an already resolved URI
    pub path: String,
}

/// What a handler wants relayed back. At least one field must be set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandResult {
    pub text: Option<String>,
    pub file: Option<CommandFile>,
}

impl CommandResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            file: None,
        }
    }

    /// Attach a file; only handlers that produce documents call this.
    #[allow(dead_code)]
    pub fn with_file(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.file = Some(CommandFile {
            name: name.into(),
            path: path.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.file.is_none()
    }
}

/// One command's behaviour.
///
/// Receives the whole command string (without the leading `/`) and parses
/// its own arguments. Domain failures are reported to the user as text in
/// the returned result, never as an error.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, command: &str) -> Option<CommandResult>;
}

#[async_trait]
impl<F> CommandHandler for F
where
    F: Fn(&str) -> Option<CommandResult> + Send + Sync,
{
    async fn handle(&self, command: &str) -> Option<CommandResult> {
        self(command)
    }
}

/// Find the command in a message: the first text segment starting with `/`,
/// minus the slash. Later segments are ignored.
pub fn extract_command(segments: &[Segment]) -> Option<&str> {
    segments
        .iter()
        .filter_map(Segment::text)
        .find_map(|text| text.strip_prefix('/'))
}

/// Handlers keyed by name, matched by prefix in registration order.
///
/// A short name registered first shadows longer names that start with it;
/// register specific names before general ones.
#[derive(Default)]
pub struct CommandRegistry {
    entries: Vec<(String, Arc<dyn CommandHandler>)>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: impl CommandHandler + 'static,
    ) -> &mut Self {
        self.entries.push((name.into(), Arc::new(handler)));
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// First registered entry whose name is a prefix of `command`.
    pub fn find(&self, command: &str) -> Option<(&str, &dyn CommandHandler)> {
        self.entries
            .iter()
            .find(|(name, _)| command.starts_with(name.as_str()))
            .map(|(name, handler)| (name.as_str(), handler.as_ref()))
    }

    /// Run at most one handler for `command`.
    pub async fn dispatch(&self, command: &str) -> Option<CommandResult> {
        let Some((name, handler)) = self.find(command) else {
            debug!("No handler matches command: {}", command);
            return None;
        };
        debug!("Dispatching '{}' to handler '{}'", command, name);
        handler.handle(command).await
    }
}
