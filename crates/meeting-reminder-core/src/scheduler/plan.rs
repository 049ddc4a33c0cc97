use chrono::{DateTime, Duration, Utc};

/// What the poll step should do with a not-yet-notified event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// The reminder moment has arrived or already passed.
    NotifyNow,
    /// Sleep this long before the reminder moment (subject to re-poll).
    WaitFor(std::time::Duration),
}

/// `wait = (anchor - now) - lead`; anything at or below zero is due.
pub fn plan_reminder(anchor: DateTime<Utc>, now: DateTime<Utc>, lead: Duration) -> Plan {
    let wait = (anchor - now)
        .checked_sub(&lead)
        .unwrap_or(Duration::MIN);
    if wait <= Duration::zero() {
        return Plan::NotifyNow;
    }
    match wait.to_std() {
        Ok(wait) => Plan::WaitFor(wait),
        Err(_) => Plan::NotifyNow,
    }
}
