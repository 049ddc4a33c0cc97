use chrono::{Local, Utc};
use clap::Args;
use meeting_reminder_core::{Config, EventSource, ReminderMode};

use super::{calendar_source, CalendarArgs, CliResult};

#[derive(Args, Debug)]
pub struct NextArgs {
    #[command(flatten)]
    pub calendar: CalendarArgs,
    /// Print the event as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: NextArgs) -> CliResult {
    let mut config = Config::load()?;
    args.calendar.apply(&mut config);
    let mode = config.scheduler.mode;

    let source = calendar_source(&config).await?;
    let Some(event) = source.next_event(Utc::now(), mode).await? else {
        if args.json {
            println!("null");
        } else {
            println!("no upcoming event");
        }
        return Ok(());
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&event)?);
        return Ok(());
    }

    println!("{}", event.title);
    println!(
        "  {} - {}",
        event.start.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
        event.end.with_timezone(&Local).format("%H:%M")
    );
    if !event.location.is_empty() {
        println!("  at {}", event.location);
    }
    let verb = match mode {
        ReminderMode::BeforeStart => "starts",
        ReminderMode::BeforeEnd => "ends",
    };
    let until = event.anchor(mode) - Utc::now();
    println!("  {verb} in {}m", until.num_minutes());
    Ok(())
}
