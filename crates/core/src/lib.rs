pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod urls;

pub use config::{
    AlarmSection, AnnouncerConfig, AppConfig, BackendConfig, BackendEndpoints, ConfigIntervals,
    InputConfig, KeyLayout, SimulationConfig,
};
pub use error::TvError;
pub use events::{Action, BrightnessDirection, EventBus, TvEvent};
pub use model::{
    AlarmConfig, AlarmTime, MovieFile, MovieProgress, MovieProgressMap, PlaybackItem,
    PlaybackMode, PlaylistProgress, PlaylistProgressMap, PlaylistRef, VideoProgress,
};
