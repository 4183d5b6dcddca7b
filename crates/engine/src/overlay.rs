use couchtv_core::BrightnessDirection;
use std::time::{Duration, Instant};

const SELECTOR_STARTUP: Duration = Duration::from_millis(3_000);
const SELECTOR_AFTER_CHANGE: Duration = Duration::from_millis(2_000);

/// Screen overlay state: the dimming layer and the channel selector strip.
#[derive(Debug, Clone)]
pub struct Overlay {
    /// Opacity of the dark layer, 0 = full brightness.
    dimming: f64,
    selector_until: Instant,
}

impl Overlay {
    pub fn new(now: Instant) -> Self {
        Self {
            dimming: 0.0,
            selector_until: now + SELECTOR_STARTUP,
        }
    }

    pub fn dimming(&self) -> f64 {
        self.dimming
    }

    pub fn set_dimming(&mut self, opacity: f64) -> f64 {
        self.dimming = opacity.clamp(0.0, 1.0);
        self.dimming
    }

    /// Darkening grows the overlay opacity. Steps get finer as the screen
    /// gets darker.
    pub fn adjust(&mut self, direction: BrightnessDirection) -> f64 {
        let step = if self.dimming > 0.8 {
            0.01
        } else if self.dimming > 0.5 {
            0.02
        } else {
            0.05
        };
        match direction {
            BrightnessDirection::Up => self.set_dimming(self.dimming + step),
            BrightnessDirection::Down => self.set_dimming(self.dimming - step),
        }
    }

    pub fn channel_changed(&mut self, now: Instant) {
        self.selector_until = now + SELECTOR_AFTER_CHANGE;
    }

    pub fn selector_visible(&self, now: Instant) -> bool {
        now < self.selector_until
    }
}
