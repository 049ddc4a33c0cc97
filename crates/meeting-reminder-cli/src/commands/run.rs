use clap::Args;
use meeting_reminder_core::{Config, ReminderScheduler};
use tokio_util::sync::CancellationToken;

use super::{alert_device, calendar_source, parse_duration, CalendarArgs, CliResult};

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub calendar: CalendarArgs,
    /// How long before the event to remind (e.g. 2m, 90s)
    #[arg(long, value_parser = parse_duration, allow_hyphen_values = true)]
    pub reminder_time: Option<i64>,
    /// How often to poll the calendar (e.g. 5s)
    #[arg(long, value_parser = parse_duration, allow_hyphen_values = true)]
    pub poll_interval: Option<i64>,
    /// How long the alert runs without an acknowledge (e.g. 30s)
    #[arg(long, value_parser = parse_duration, allow_hyphen_values = true)]
    pub notification_duration: Option<i64>,
    /// Run without the alert hardware
    #[arg(long)]
    pub no_robot: bool,
}

impl RunArgs {
    pub fn apply(&self, config: &mut Config) {
        self.calendar.apply(config);
        if let Some(secs) = self.reminder_time {
            config.scheduler.lead_time_secs = secs;
        }
        if let Some(secs) = self.poll_interval {
            config.scheduler.poll_interval_secs = secs;
        }
        if let Some(secs) = self.notification_duration {
            config.scheduler.notification_duration_secs = secs;
        }
    }
}

pub async fn run(args: RunArgs) -> CliResult {
    let mut config = Config::load()?;
    args.apply(&mut config);

    // invalid timing is fatal before any network or hardware access
    let scheduler_config = config.scheduler.to_scheduler_config()?;

    let source = calendar_source(&config).await?;
    let device = alert_device(&config, args.no_robot)?;
    let mut scheduler = ReminderScheduler::new(scheduler_config, source, device)?;

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    tracing::info!(
        calendar = %config.calendar.calendar_id,
        query = config.calendar.query.as_deref().unwrap_or(""),
        "watching calendar"
    );
    scheduler.run(shutdown).await;
    Ok(())
}

/// Cancel `token` on SIGINT or SIGTERM.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "cannot listen for SIGTERM");
                let _ = ctrl_c.await;
                tracing::info!("received SIGINT, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        tracing::info!("received SIGINT, shutting down");
    }

    token.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use meeting_reminder_core::ReminderMode;

    #[test]
    fn flags_override_file_values() {
        let mut config = Config::default();
        let args = RunArgs {
            calendar: CalendarArgs {
                remind_end: true,
                ..Default::default()
            },
            reminder_time: Some(300),
            poll_interval: Some(10),
            notification_duration: None,
            no_robot: true,
        };
        args.apply(&mut config);

        assert_eq!(config.scheduler.lead_time_secs, 300);
        assert_eq!(config.scheduler.poll_interval_secs, 10);
        assert_eq!(config.scheduler.notification_duration_secs, 30);
        assert_eq!(config.scheduler.mode, ReminderMode::BeforeEnd);
    }
}
