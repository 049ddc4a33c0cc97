use std::time::Duration;

use clap::Subcommand;
use meeting_reminder_core::{AlertSession, Config};

use super::{alert_device, parse_duration, CliResult};

#[derive(Subcommand)]
pub enum DeviceAction {
    /// Arm the alert once and wait for the button or the timeout
    Test {
        /// How long to run the alert (e.g. 10s)
        #[arg(long, default_value = "10s", value_parser = parse_duration, allow_hyphen_values = true)]
        duration: i64,
        /// Use the log-only device
        #[arg(long)]
        no_robot: bool,
    },
}

pub async fn run(action: DeviceAction) -> CliResult {
    match action {
        DeviceAction::Test { duration, no_robot } => {
            let secs = u64::try_from(duration)
                .map_err(|_| format!("duration must not be negative, got {duration}s"))?;
            let config = Config::load()?;
            let device = alert_device(&config, no_robot)?;

            let session = AlertSession::open("device-test", Duration::from_secs(secs));
            let outcome = match device.arm(session.deadline()).await {
                Ok(signal) => session.resolve(signal).await,
                Err(err) => {
                    let _ = device.disarm().await;
                    return Err(err.into());
                }
            };
            device.disarm().await?;
            println!("{outcome}");
        }
    }
    Ok(())
}
