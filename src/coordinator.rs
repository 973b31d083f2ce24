//! Mutual exclusion between command execution and the maintenance sweep.
//!
//! Commands and the sweep both touch the temp directory: a command writes
//! files there and the protocol server reads them while the reply is sent,
//! the sweep deletes everything in it. At most one of the two is active at a
//! time. A sweep that is waiting goes before any command that has not yet
//! started, so steady command traffic cannot postpone it indefinitely.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Idle,
    CommandRunning,
    CleanupRunning,
}

#[derive(Debug)]
struct State {
    activity: Activity,
    cleanups_waiting: usize,
}

#[derive(Debug)]
pub struct Coordinator {
    state: Mutex<State>,
    changed: Notify,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Coordinator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                activity: Activity::Idle,
                cleanups_waiting: 0,
            }),
            changed: Notify::new(),
        }
    }

    pub fn activity(&self) -> Activity {
        self.lock().activity
    }

    /// Wait until neither a sweep is running nor one is waiting, then mark a
    /// command as running. Dropping the permit ends the command.
    pub async fn begin_command(&self) -> CommandPermit<'_> {
        loop {
            let notified = self.changed.notified();
            {
                let mut state = self.lock();
                if state.activity == Activity::Idle && state.cleanups_waiting == 0 {
                    state.activity = Activity::CommandRunning;
                    return CommandPermit { coordinator: self };
                }
            }
            notified.await;
        }
    }

    /// Wait for the in-flight command (if any) to finish, then mark the sweep
    /// as running. Dropping the permit ends the sweep.
    pub async fn begin_cleanup(&self) -> CleanupPermit<'_> {
        self.lock().cleanups_waiting += 1;
        let _waiting = WaitingCleanup { coordinator: self };

        loop {
            let notified = self.changed.notified();
            {
                let mut state = self.lock();
                if state.activity == Activity::Idle {
                    state.activity = Activity::CleanupRunning;
                    return CleanupPermit { coordinator: self };
                }
            }
            notified.await;
        }
    }

    fn finish(&self, expected: Activity) {
        {
            let mut state = self.lock();
            debug_assert_eq!(state.activity, expected);
            state.activity = Activity::Idle;
        }
        self.changed.notify_waiters();
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Held for the duration of one command dispatch.
#[must_use = "the command ends as soon as the permit is dropped"]
#[derive(Debug)]
pub struct CommandPermit<'a> {
    coordinator: &'a Coordinator,
}

impl Drop for CommandPermit<'_> {
    fn drop(&mut self) {
        self.coordinator.finish(Activity::CommandRunning);
    }
}

/// Held for the duration of one sweep.
#[must_use = "the sweep ends as soon as the permit is dropped"]
#[derive(Debug)]
pub struct CleanupPermit<'a> {
    coordinator: &'a Coordinator,
}

impl Drop for CleanupPermit<'_> {
    fn drop(&mut self) {
        self.coordinator.finish(Activity::CleanupRunning);
    }
}

/// Withdraws the waiting mark once `begin_cleanup` returns or is dropped.
struct WaitingCleanup<'a> {
    coordinator: &'a Coordinator,
}

impl Drop for WaitingCleanup<'_> {
    fn drop(&mut self) {
        self.coordinator.lock().cleanups_waiting -= 1;
        self.coordinator.changed.notify_waiters();
    }
}
