pub mod auth;
pub mod config;
pub mod device;
pub mod next;
pub mod run;

use std::sync::Arc;

use clap::Args;
use meeting_reminder_core::integrations::{GoogleAuth, GoogleCalendarSource, GoogleCredentials};
use meeting_reminder_core::storage::{data_dir, DeviceKind};
use meeting_reminder_core::{AlertDevice, Config, GpioDevice, NullDevice, ReminderMode, SysfsBoard};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Calendar selection flags shared by `run` and `next`.
#[derive(Args, Debug, Default, Clone)]
pub struct CalendarArgs {
    /// Calendar to watch (default from config, usually "primary")
    #[arg(long)]
    pub calendar: Option<String>,
    /// Only consider events matching this free-text query
    #[arg(long)]
    pub calendar_query: Option<String>,
    /// Remind before events end instead of before they start
    #[arg(long)]
    pub remind_end: bool,
}

impl CalendarArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(calendar) = &self.calendar {
            config.calendar.calendar_id = calendar.clone();
        }
        if let Some(query) = &self.calendar_query {
            config.calendar.query = Some(query.clone());
        }
        if self.remind_end {
            config.scheduler.mode = ReminderMode::BeforeEnd;
        }
    }
}

/// Parse `90`, `45s`, `2m`, `1h` or `1m30s` into whole seconds. A leading
/// `-` is accepted so that validation can report negative values.
pub fn parse_duration(raw: &str) -> Result<i64, String> {
    let trimmed = raw.trim();
    let (sign, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed),
    };
    if body.is_empty() {
        return Err(format!("invalid duration '{raw}'"));
    }
    if let Ok(secs) = body.parse::<i64>() {
        return Ok(sign * secs);
    }

    let mut total: i64 = 0;
    let mut digits = String::new();
    for c in body.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let unit = match c {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return Err(format!("invalid duration '{raw}': unknown unit '{c}'")),
        };
        let n: i64 = digits
            .parse()
            .map_err(|_| format!("invalid duration '{raw}': expected a number before '{c}'"))?;
        total = n
            .checked_mul(unit)
            .and_then(|part| total.checked_add(part))
            .ok_or_else(|| format!("duration '{raw}' is too large"))?;
        digits.clear();
    }
    if !digits.is_empty() {
        return Err(format!("invalid duration '{raw}': missing unit after {digits}"));
    }
    Ok(sign * total)
}

/// Google Calendar source for `config`, running the browser login first if
/// no token is stored yet.
pub async fn calendar_source(
    config: &Config,
) -> Result<Arc<GoogleCalendarSource>, Box<dyn std::error::Error>> {
    let dir = data_dir()?;
    let credentials = GoogleCredentials::resolve(config.calendar.credentials_path().as_deref())?;
    let auth = GoogleAuth::new(&credentials, config.calendar.token_store(&dir));

    if auth.stored_tokens()?.is_none() {
        tracing::info!("no stored Google token, starting login");
        auth.login().await?;
    }

    let source = GoogleCalendarSource::new(Arc::new(auth), config.calendar.calendar_id.clone())
        .with_query(config.calendar.query.clone())
        .with_horizon(config.calendar.horizon()?);
    Ok(Arc::new(source))
}

/// The configured alert device, or the log-only one for `--no-robot`.
pub fn alert_device(
    config: &Config,
    no_robot: bool,
) -> Result<Arc<dyn AlertDevice>, Box<dyn std::error::Error>> {
    if no_robot {
        tracing::info!("running without alert hardware");
        return Ok(Arc::new(NullDevice));
    }

    let device = &config.device;
    match device.kind {
        DeviceKind::None => {
            tracing::info!("no alert device configured");
            Ok(Arc::new(NullDevice))
        }
        DeviceKind::Sysfs => {
            let timing = device.timing()?;
            let board = SysfsBoard::open(
                &device.gpio_root,
                &[device.led_pin.as_str(), device.buzzer_pin.as_str()],
                &[device.button_pin.as_str()],
            )?;
            tracing::info!(
                led = %device.led_pin,
                buzzer = %device.buzzer_pin,
                button = %device.button_pin,
                "gpio alert device ready"
            );
            Ok(Arc::new(GpioDevice::open(board, device.pins(), timing)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_seconds() {
        assert_eq!(parse_duration("90"), Ok(90));
        assert_eq!(parse_duration("0"), Ok(0));
    }

    #[test]
    fn parses_units() {
        assert_eq!(parse_duration("45s"), Ok(45));
        assert_eq!(parse_duration("2m"), Ok(120));
        assert_eq!(parse_duration("1h"), Ok(3600));
        assert_eq!(parse_duration("1m30s"), Ok(90));
        assert_eq!(parse_duration(" 1h5m "), Ok(3900));
    }

    #[test]
    fn keeps_sign_for_validation() {
        assert_eq!(parse_duration("-5s"), Ok(-5));
        assert_eq!(parse_duration("-30"), Ok(-30));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("-").is_err());
        assert!(parse_duration("5d").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("1m30").is_err());
    }

    #[test]
    fn calendar_args_override_config() {
        let mut config = Config::default();
        CalendarArgs {
            calendar: Some("team@example.com".to_string()),
            calendar_query: Some("robot".to_string()),
            remind_end: true,
        }
        .apply(&mut config);

        assert_eq!(config.calendar.calendar_id, "team@example.com");
        assert_eq!(config.calendar.query.as_deref(), Some("robot"));
        assert_eq!(config.scheduler.mode, ReminderMode::BeforeEnd);
    }

    #[test]
    fn zero_blink_interval_is_rejected_before_opening_gpio() {
        let mut config = Config::default();
        config.device.kind = DeviceKind::Sysfs;
        config.device.gpio_root = "/nonexistent/gpio".to_string();
        config.device.blink_interval_ms = 0;

        let err = alert_device(&config, false).err().unwrap();
        assert!(err.to_string().contains("device.blink_interval_ms"), "{err}");
    }
}
