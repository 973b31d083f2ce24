use std::sync::Arc;

use crate::bot::Bot;
use crate::config::Config;
use crate::scheduler::sweep::{run_maintenance, Sweep};
use crate::scheduler::Scheduler;

/// Register built-in background tasks
pub async fn register_builtin_tasks(
    scheduler: &Scheduler,
    config: &Config,
    bot: Arc<Bot>,
    sweep: Arc<dyn Sweep>,
) -> anyhow::Result<()> {
    // Maintenance sweep: gated by the coordinator so it never runs alongside a command
    let coordinator = bot.coordinator();
    scheduler
        .add_repeated_job(config.maintenance.interval(), "maintenance sweep", move || {
            let coordinator = coordinator.clone();
            let sweep = sweep.clone();
            Box::pin(async move {
                run_maintenance(&coordinator, sweep.as_ref()).await;
            })
        })
        .await?;

    // Liveness: only inspects and sends, so it does not take the coordinator
    scheduler
        .add_repeated_job(config.liveness.interval(), "liveness check", move || {
            let bot = bot.clone();
            Box::pin(async move {
                bot.check_liveness().await;
            })
        })
        .await?;

    Ok(())
}
