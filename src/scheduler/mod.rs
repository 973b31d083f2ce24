//! Fixed-period background timers: the temp-directory sweep and the
//! liveness check. Jobs start counting when added and fire for the life of
//! the process, whether or not the server connection is up.

pub mod sweep;
pub mod tasks;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, info};

/// Boxed body of one timer tick.
pub type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

pub struct Scheduler {
    inner: JobScheduler,
}

impl Scheduler {
    pub async fn new() -> Result<Self> {
        let inner = JobScheduler::new()
            .await
            .context("Failed to create job scheduler")?;
        Ok(Self { inner })
    }

    /// Run `task` every `period`; the first run is one period from now.
    ///
    /// Each tick builds a fresh future, so a task that holds shared state
    /// clones its handles inside the closure.
    pub async fn add_repeated_job<F>(&self, period: Duration, name: &str, task: F) -> Result<()>
    where
        F: Fn() -> TaskFuture + Send + Sync + 'static,
    {
        let job_name = name.to_string();
        let job = Job::new_repeated_async(period, move |_id, _lock| {
            let name = job_name.clone();
            let tick = task();
            Box::pin(async move {
                debug!("Timer fired: {}", name);
                tick.await;
            })
        })
        .with_context(|| format!("Failed to create timer '{}'", name))?;

        self.inner
            .add(job)
            .await
            .with_context(|| format!("Failed to register timer '{}'", name))?;

        info!("Timer '{}' runs every {:?}", name, period);
        Ok(())
    }

    pub async fn start(&self) -> Result<()> {
        self.inner
            .start()
            .await
            .context("Failed to start timers")?;
        info!("Background timers started");
        Ok(())
    }

    /// Stop all timers; a tick already in progress is not awaited.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner
            .shutdown()
            .await
            .context("Failed to stop timers")?;
        info!("Background timers stopped");
        Ok(())
    }
}
