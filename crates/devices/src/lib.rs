pub mod announce;
pub mod simulated;

pub use announce::{select_announcer, Announcer, ClipAnnouncer, SpeechAnnouncer};
pub use simulated::{SimulatedMediaElement, SimulatedPlaylistPlayer};

/// Player states reported by the playlist surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}

/// Notifications pushed by surfaces into the orchestrator loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    PlaylistState(PlayerState),
    MediaEnded { source: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistLoad {
    pub playlist_id: String,
    pub index: usize,
    pub start_seconds: f64,
}

/// Queue player driven by the external video platform.
///
/// Volumes are on the platform's `[0, 100]` scale, times in seconds.
pub trait PlaylistPlayer: Send {
    fn load(&mut self, request: &PlaylistLoad);
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    fn next(&mut self);
    fn previous(&mut self);
    fn seek_to(&mut self, seconds: f64);
    fn volume(&self) -> f64;
    fn set_volume(&mut self, volume: f64);
    fn current_time(&self) -> f64;
    fn current_playlist_id(&self) -> Option<String>;
    fn current_video_id(&self) -> Option<String>;
    fn playlist_index(&self) -> usize;
    fn state(&self) -> PlayerState;
}

/// A single local media source, for movies and the alarm sound.
///
/// Volume is on a `[0, 1]` scale.
pub trait MediaElement: Send {
    fn set_source(&mut self, src: &str);
    fn source(&self) -> Option<String>;
    fn current_time(&self) -> f64;
    fn set_current_time(&mut self, seconds: f64);
    fn volume(&self) -> f64;
    fn set_volume(&mut self, volume: f64);
    fn set_looping(&mut self, looping: bool);
    fn play(&mut self);
    fn pause(&mut self);
    fn is_paused(&self) -> bool;

    /// Housekeeping hook for elements that detect end-of-media by polling.
    fn poll(&mut self) {}
}

/// Every surface the controller acts on. Sources may be missing until the
/// platform reports them ready.
pub struct Surfaces {
    pub playlist: Option<Box<dyn PlaylistPlayer>>,
    pub movie: Option<Box<dyn MediaElement>>,
    pub alarm_sound: Box<dyn MediaElement>,
}
