//! Cron-scheduled tasks.
//!
//! Tasks are registered with a 5-field cron expression
//! (`minute hour day month weekday`) and run on their own tokio timer once
//! the bot is started. Each callback receives a [`BotHandle`] so scheduled
//! work can post into rooms:
//!
//! ```no_run
//! # use trellis::{Bot, Error};
//! # fn example(bot: &mut Bot) -> Result<(), Error> {
//! bot.schedule("0 9 * * *", |bot| async move {
//!     bot.room("!room:example.org").send("Good morning!").await
//! })?;
//! # Ok(())
//! # }
//! ```

use std::{str::FromStr, sync::Arc, time::Duration};

use chrono::Utc;
use cron::Schedule;
use futures::future::BoxFuture;
use log::{debug, error, info};

use crate::{bot::BotHandle, errors::Error};

/// Boxed scheduled-task callback.
pub(crate) type TaskCallback =
    Arc<dyn Fn(BotHandle) -> BoxFuture<'static, Result<(), Error>> + Send + Sync>;

/// A registered scheduled task.
pub(crate) struct Task {
    /// Original 5-field expression, kept for logging
    pub(crate) expr: String,
    /// Parsed schedule
    pub(crate) schedule: Schedule,
    /// The callback to run at each fire time
    pub(crate) callback: TaskCallback,
}

/// Parses a user-facing 5-field cron expression.
///
/// The `cron` crate expects a seconds field, so `0` is prepended before
/// parsing; tasks fire at the top of the scheduled minute.
///
/// # Errors
///
/// [`Error::InvalidCron`] when the expression does not have exactly five
/// fields or fails to parse.
pub(crate) fn parse_cron(expr: &str) -> Result<Schedule, Error> {
    if expr.split_whitespace().count() != 5 {
        return Err(Error::InvalidCron {
            expr: expr.to_string(),
        });
    }

    Schedule::from_str(&format!("0 {expr}")).map_err(|_| Error::InvalidCron {
        expr: expr.to_string(),
    })
}

/// Spawns one timer task per registered schedule.
///
/// Callback failures are logged and do not stop the schedule.
pub(crate) fn start(tasks: Vec<Task>, bot: BotHandle) {
    if tasks.is_empty() {
        return;
    }

    info!("starting scheduler with {} task(s)", tasks.len());
    for task in tasks {
        let bot = bot.clone();
        tokio::spawn(async move {
            run_task(task, bot).await;
        });
    }
}

/// Runs a single schedule: sleep until the next fire time, invoke, repeat.
async fn run_task(task: Task, bot: BotHandle) {
    loop {
        let Some(next) = task.schedule.upcoming(Utc).next() else {
            debug!("schedule '{}' has no upcoming fire time", task.expr);
            break;
        };

        let delay = (next - Utc::now())
            .to_std()
            .unwrap_or(Duration::from_secs(0));
        debug!("schedule '{}' fires in {:?}", task.expr, delay);
        tokio::time::sleep(delay).await;

        if let Err(e) = (task.callback)(bot.clone()).await {
            error!("scheduled task '{}' failed: {}", task.expr, e);
        }
    }
}
