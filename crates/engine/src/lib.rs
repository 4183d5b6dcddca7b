pub mod alarm;
pub mod fade;
pub mod input;
pub mod overlay;
pub mod playback;

pub use alarm::{local_minute, AlarmClock};
pub use fade::{FadeProfile, FadeSession, FadeStep, ProgressiveAlarm};
pub use input::{parse_action, InputDispatcher, KeyMap};
pub use overlay::Overlay;
pub use playback::{AutoSaveTarget, PlaybackController, PlaybackSettings, ProgressSink};
