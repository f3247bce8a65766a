use std::time::Duration;

/// Timing knobs for holds, locks and background reclamation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationSettings {
    pub hold_duration: Duration,
    pub lock_ttl: Duration,
    /// Total acquisition attempts before giving up with a lock conflict.
    pub lock_retries: u32,
    pub lock_backoff: Duration,
    pub reaper_interval: Duration,
    pub sweeper_interval: Duration,
}

impl Default for ReservationSettings {
    fn default() -> Self {
        Self {
            hold_duration: Duration::from_secs(5 * 60),
            lock_ttl: Duration::from_secs(10),
            lock_retries: 3,
            lock_backoff: Duration::from_millis(100),
            reaper_interval: Duration::from_secs(30),
            sweeper_interval: Duration::from_secs(60),
        }
    }
}

impl ReservationSettings {
    /// Hold duration rendered for humans, e.g. "5 minutes".
    pub fn hold_duration_label(&self) -> String {
        let secs = self.hold_duration.as_secs();
        if secs >= 60 && secs % 60 == 0 {
            let mins = secs / 60;
            format!("{} minute{}", mins, if mins == 1 { "" } else { "s" })
        } else {
            format!("{} second{}", secs, if secs == 1 { "" } else { "s" })
        }
    }
}
