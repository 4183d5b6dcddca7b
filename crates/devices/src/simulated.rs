use crate::{MediaElement, PlayerState, PlaylistLoad, PlaylistPlayer, SurfaceEvent};
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

/// Playhead that advances with wall-clock time while playing.
#[derive(Debug, Clone, Copy)]
struct Playhead {
    position: f64,
    playing_since: Option<Instant>,
}

impl Playhead {
    fn new() -> Self {
        Self {
            position: 0.0,
            playing_since: None,
        }
    }

    fn now(&self) -> f64 {
        match self.playing_since {
            Some(since) => self.position + since.elapsed().as_secs_f64(),
            None => self.position,
        }
    }

    fn start(&mut self) {
        if self.playing_since.is_none() {
            self.playing_since = Some(Instant::now());
        }
    }

    fn halt(&mut self) {
        self.position = self.now();
        self.playing_since = None;
    }

    fn jump(&mut self, seconds: f64) {
        self.position = seconds.max(0.0);
        if self.playing_since.is_some() {
            self.playing_since = Some(Instant::now());
        }
    }
}

/// In-process stand-in for the video platform player.
///
/// Video ids are synthesized as `<playlist>#<index>`.
pub struct SimulatedPlaylistPlayer {
    playlist_id: Option<String>,
    index: usize,
    head: Playhead,
    volume: f64,
    state: PlayerState,
    events: Option<UnboundedSender<SurfaceEvent>>,
}

impl Default for SimulatedPlaylistPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedPlaylistPlayer {
    pub fn new() -> Self {
        Self {
            playlist_id: None,
            index: 0,
            head: Playhead::new(),
            volume: 100.0,
            state: PlayerState::Unstarted,
            events: None,
        }
    }

    pub fn with_events(mut self, tx: UnboundedSender<SurfaceEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    fn transition(&mut self, state: PlayerState) {
        if self.state == state {
            return;
        }
        self.state = state;
        debug!(?state, playlist = ?self.playlist_id, index = self.index, "playlist player state");
        if let Some(tx) = &self.events {
            let _ = tx.send(SurfaceEvent::PlaylistState(state));
        }
    }

    fn jump_to_index(&mut self, index: usize) {
        self.index = index;
        self.head.jump(0.0);
        if self.state == PlayerState::Playing {
            // A new video starting is observable as a fresh Playing edge.
            self.transition(PlayerState::Buffering);
            self.transition(PlayerState::Playing);
        }
    }
}

impl PlaylistPlayer for SimulatedPlaylistPlayer {
    fn load(&mut self, request: &PlaylistLoad) {
        self.head.halt();
        self.playlist_id = Some(request.playlist_id.clone());
        self.index = request.index;
        self.head.jump(request.start_seconds);
        self.transition(PlayerState::Cued);
    }

    fn play(&mut self) {
        if self.playlist_id.is_none() {
            return;
        }
        self.head.start();
        self.transition(PlayerState::Playing);
    }

    fn pause(&mut self) {
        self.head.halt();
        if self.state == PlayerState::Playing || self.state == PlayerState::Buffering {
            self.transition(PlayerState::Paused);
        }
    }

    fn stop(&mut self) {
        self.head.halt();
        self.head.jump(0.0);
        self.transition(PlayerState::Unstarted);
    }

    fn next(&mut self) {
        self.jump_to_index(self.index + 1);
    }

    fn previous(&mut self) {
        self.jump_to_index(self.index.saturating_sub(1));
    }

    fn seek_to(&mut self, seconds: f64) {
        self.head.jump(seconds);
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn set_volume(&mut self, volume: f64) {
        self.volume = volume.clamp(0.0, 100.0);
    }

    fn current_time(&self) -> f64 {
        self.head.now()
    }

    fn current_playlist_id(&self) -> Option<String> {
        self.playlist_id.clone()
    }

    fn current_video_id(&self) -> Option<String> {
        self.playlist_id
            .as_ref()
            .map(|id| format!("{id}#{}", self.index))
    }

    fn playlist_index(&self) -> usize {
        self.index
    }

    fn state(&self) -> PlayerState {
        self.state
    }
}

/// In-process stand-in for a local media element.
pub struct SimulatedMediaElement {
    label: &'static str,
    src: Option<String>,
    head: Playhead,
    volume: f64,
    looping: bool,
    duration: Option<f64>,
    events: Option<UnboundedSender<SurfaceEvent>>,
}

impl SimulatedMediaElement {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            src: None,
            head: Playhead::new(),
            volume: 1.0,
            looping: false,
            duration: None,
            events: None,
        }
    }

    pub fn with_events(mut self, tx: UnboundedSender<SurfaceEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Every source is treated as lasting `seconds`; reaching the end while
    /// not looping pauses the element and emits `MediaEnded`.
    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    fn check_ended(&mut self) {
        let Some(duration) = self.duration else {
            return;
        };
        if self.looping || self.head.playing_since.is_none() || self.head.now() < duration {
            return;
        }
        self.head.halt();
        self.head.jump(duration);
        debug!(element = self.label, src = ?self.src, "media ended");
        if let (Some(tx), Some(src)) = (&self.events, &self.src) {
            let _ = tx.send(SurfaceEvent::MediaEnded {
                source: src.clone(),
            });
        }
    }
}

impl MediaElement for SimulatedMediaElement {
    fn set_source(&mut self, src: &str) {
        self.head.halt();
        self.head.jump(0.0);
        self.src = Some(src.to_string());
        debug!(element = self.label, src, "media source set");
    }

    fn source(&self) -> Option<String> {
        self.src.clone()
    }

    fn current_time(&self) -> f64 {
        let now = self.head.now();
        match self.duration {
            Some(d) if self.looping && d > 0.0 => now % d,
            Some(d) => now.min(d),
            None => now,
        }
    }

    fn set_current_time(&mut self, seconds: f64) {
        self.head.jump(seconds);
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn set_volume(&mut self, volume: f64) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    fn play(&mut self) {
        if self.src.is_none() {
            debug!(element = self.label, "play ignored without a source");
            return;
        }
        self.head.start();
    }

    fn pause(&mut self) {
        self.head.halt();
    }

    fn is_paused(&self) -> bool {
        self.head.playing_since.is_none()
    }

    fn poll(&mut self) {
        self.check_ended();
    }
}

#[cfg(test)]
mod tests {
    use super::{SimulatedMediaElement, SimulatedPlaylistPlayer};
    use crate::{MediaElement, PlayerState, PlaylistLoad, PlaylistPlayer, SurfaceEvent};
    use tokio::sync::mpsc::unbounded_channel;

    #[test]
    fn playlist_player_reports_state_edges() {
        let (tx, mut rx) = unbounded_channel();
        let mut player = SimulatedPlaylistPlayer::new().with_events(tx);

        player.load(&PlaylistLoad {
            playlist_id: "PLa".to_string(),
            index: 2,
            start_seconds: 30.0,
        });
        player.play();
        player.pause();

        assert_eq!(
            rx.try_recv().ok(),
            Some(SurfaceEvent::PlaylistState(PlayerState::Cued))
        );
        assert_eq!(
            rx.try_recv().ok(),
            Some(SurfaceEvent::PlaylistState(PlayerState::Playing))
        );
        assert_eq!(
            rx.try_recv().ok(),
            Some(SurfaceEvent::PlaylistState(PlayerState::Paused))
        );
        assert_eq!(player.current_video_id().as_deref(), Some("PLa#2"));
        assert!(player.current_time() >= 30.0);
    }

    #[test]
    fn play_without_playlist_is_ignored() {
        let mut player = SimulatedPlaylistPlayer::new();
        player.play();
        assert_eq!(player.state(), PlayerState::Unstarted);
    }

    #[test]
    fn media_element_clamps_volume_and_seek() {
        let mut el = SimulatedMediaElement::new("movie");
        el.set_volume(1.7);
        assert_eq!(el.volume(), 1.0);

        el.set_source("http://localhost/get-movie/a.mp4");
        el.set_current_time(-4.0);
        assert_eq!(el.current_time(), 0.0);
        assert!(el.is_paused());
    }

    #[test]
    fn media_element_reports_end_once() {
        let (tx, mut rx) = unbounded_channel();
        let mut el = SimulatedMediaElement::new("movie")
            .with_events(tx)
            .with_duration(10.0);
        el.set_source("a.mp4");
        el.set_current_time(12.0);
        el.play();
        el.poll();
        el.poll();

        assert!(matches!(rx.try_recv(), Ok(SurfaceEvent::MediaEnded { .. })));
        assert!(rx.try_recv().is_err());
        assert!(el.is_paused());
    }
}
