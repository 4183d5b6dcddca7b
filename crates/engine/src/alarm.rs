use chrono::{DateTime, Local, TimeZone};
use couchtv_core::{AlarmConfig, AlarmTime};
use tracing::info;

/// Current wall-clock minute as `HH:MM`.
pub fn minute_of<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format("%H:%M").to_string()
}

pub fn local_minute() -> String {
    minute_of(&Local::now())
}

/// Alarm settings plus the per-minute trigger guard.
#[derive(Debug, Clone)]
pub struct AlarmClock {
    settings: AlarmConfig,
    last_fired: Option<String>,
}

impl AlarmClock {
    pub fn new(settings: AlarmConfig) -> Self {
        Self {
            settings,
            last_fired: None,
        }
    }

    pub fn settings(&self) -> AlarmConfig {
        self.settings
    }

    pub fn replace_settings(&mut self, settings: AlarmConfig) {
        self.settings = settings;
    }

    /// Polled on a fixed tick. Returns the alarm time when this tick fires.
    ///
    /// Fires at most once per matching minute string; the guard clears as soon
    /// as the minute stops matching, so moving the clock backwards across the
    /// alarm minute fires again.
    pub fn check(&mut self, now_minute: &str) -> Option<AlarmTime> {
        let alarm_minute = self.settings.time.to_string();
        if now_minute != alarm_minute {
            self.last_fired = None;
            return None;
        }
        if !self.settings.enabled {
            return None;
        }
        if self.last_fired.as_deref() == Some(now_minute) {
            return None;
        }

        self.last_fired = Some(now_minute.to_string());
        info!(time = %self.settings.time, "alarm triggered");
        Some(self.settings.time)
    }

    pub fn adjust(&mut self, minutes: i32) -> AlarmTime {
        self.settings.time = self.settings.time.shifted(minutes);
        self.settings.time
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.settings.enabled = enabled;
    }

    pub fn toggle(&mut self) -> bool {
        self.settings.enabled = !self.settings.enabled;
        self.settings.enabled
    }
}
