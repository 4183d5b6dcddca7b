use chrono::Utc;
use couchtv_core::urls::movie_stream_url;
use couchtv_core::{
    AppConfig, EventBus, MovieFile, MovieProgressMap, PlaybackItem, PlaybackMode,
    PlaylistProgress, PlaylistProgressMap, PlaylistRef, TvError, TvEvent, VideoProgress,
};
use couchtv_devices::{PlayerState, PlaylistLoad, Surfaces};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Fire-and-forget persistence of playback positions.
pub trait ProgressSink {
    fn persist_playlists(&self, progress: &PlaylistProgressMap);
    fn persist_movies(&self, progress: &MovieProgressMap);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoSaveTarget {
    Playlist,
    Movie,
}

#[derive(Debug, Clone)]
pub struct PlaybackSettings {
    /// Gap between stopping the playlist player and loading the next queue.
    pub settle: Duration,
    /// Gap between loading and seeking to the saved video position.
    pub restore: Duration,
    pub autosave: Duration,
    pub backend_url: String,
    pub movie_stream_path: String,
}

impl PlaybackSettings {
    pub fn from_app_config(cfg: &AppConfig) -> Self {
        Self {
            settle: Duration::from_millis(cfg.intervals.settle_ms),
            restore: Duration::from_millis(cfg.intervals.restore_ms),
            autosave: Duration::from_millis(cfg.intervals.autosave_ms),
            backend_url: cfg.backend.base_url.clone(),
            movie_stream_path: cfg.backend.endpoints.movie_stream.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum LoadStage {
    Load(PlaylistLoad),
    Restore,
}

#[derive(Debug, Clone, PartialEq)]
struct PendingLoad {
    due: Instant,
    stage: LoadStage,
}

/// Owns the playlist/movie mode, the saved progress and the auto-save slot.
///
/// Surfaces are handed in on every call; the controller never keeps them.
pub struct PlaybackController {
    settings: PlaybackSettings,
    channels: Vec<PlaylistRef>,
    movies: Vec<String>,
    playlist_progress: PlaylistProgressMap,
    movie_progress: MovieProgressMap,
    mode: PlaybackMode,
    current_channel: Option<String>,
    current_movie: Option<String>,
    current_video: Option<String>,
    autosave: Option<AutoSaveTarget>,
    autosave_epoch: u64,
    pending: Option<PendingLoad>,
    bus: EventBus<TvEvent>,
}

impl PlaybackController {
    pub fn new(
        settings: PlaybackSettings,
        channels: Vec<PlaylistRef>,
        bus: EventBus<TvEvent>,
    ) -> Self {
        Self {
            settings,
            channels,
            movies: Vec::new(),
            playlist_progress: PlaylistProgressMap::new(),
            movie_progress: MovieProgressMap::new(),
            mode: PlaybackMode::Playlist,
            current_channel: None,
            current_movie: None,
            current_video: None,
            autosave: None,
            autosave_epoch: 0,
            pending: None,
            bus,
        }
    }

    pub fn load_catalog(
        &mut self,
        movies: Vec<String>,
        playlist_progress: PlaylistProgressMap,
        movie_progress: MovieProgressMap,
    ) {
        info!(
            movies = movies.len(),
            playlists = playlist_progress.len(),
            "playback catalog loaded"
        );
        self.movies = movies;
        self.playlist_progress = playlist_progress;
        self.movie_progress = movie_progress;
    }

    pub fn settings(&self) -> &PlaybackSettings {
        &self.settings
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    pub fn channels(&self) -> &[PlaylistRef] {
        &self.channels
    }

    pub fn movies(&self) -> &[String] {
        &self.movies
    }

    pub fn playlist_progress(&self) -> &PlaylistProgressMap {
        &self.playlist_progress
    }

    pub fn movie_progress(&self) -> &MovieProgressMap {
        &self.movie_progress
    }

    pub fn current_channel(&self) -> Option<&str> {
        self.current_channel.as_deref()
    }

    pub fn current_movie(&self) -> Option<&str> {
        self.current_movie.as_deref()
    }

    pub fn current_item(&self) -> Option<PlaybackItem> {
        match self.mode {
            PlaybackMode::Movie => self.current_movie.as_ref().map(|filename| {
                PlaybackItem::Movie(MovieFile {
                    filename: filename.clone(),
                })
            }),
            PlaybackMode::Playlist => self
                .current_channel
                .as_ref()
                .and_then(|id| self.channels.iter().find(|c| &c.id == id))
                .cloned()
                .map(PlaybackItem::Playlist),
        }
    }

    pub fn alarm_channel_index(&self) -> Option<usize> {
        self.channels.iter().position(|c| c.is_alarm_target)
    }

    pub fn autosave(&self) -> Option<AutoSaveTarget> {
        self.autosave
    }

    /// Bumped on every auto-save start or cancel, so the timer owner can tell
    /// when to rebuild its interval.
    pub fn autosave_epoch(&self) -> u64 {
        self.autosave_epoch
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.due)
    }

    pub fn play_channel(
        &mut self,
        index: usize,
        now: Instant,
        surfaces: &mut Surfaces,
        sink: &dyn ProgressSink,
    ) -> Result<(), TvError> {
        let channel = self
            .channels
            .get(index)
            .cloned()
            .ok_or_else(|| TvError::invalid_index("channel", index, self.channels.len()))?;

        info!(index, name = %channel.name, "selecting channel");
        self.set_current_channel(&channel.id);

        if channel.is_movie_gateway {
            if self.movies.is_empty() {
                warn!("no movies available");
                return Ok(());
            }
            return self.play_movie(0, surfaces, sink);
        }

        if self.mode == PlaybackMode::Movie {
            self.stop_movie(surfaces, sink);
        }

        let saved = self
            .playlist_progress
            .get(&channel.id)
            .cloned()
            .unwrap_or_default();
        let start_seconds = if channel.no_save {
            0.0
        } else {
            saved.current_time
        };

        let Some(player) = surfaces.playlist.as_mut() else {
            return Err(TvError::UninitializedSource("playlist player"));
        };

        self.cancel_autosave();
        player.stop();
        self.pending = Some(PendingLoad {
            due: now + self.settings.settle,
            stage: LoadStage::Load(PlaylistLoad {
                playlist_id: channel.id.clone(),
                index: saved.video_index,
                start_seconds,
            }),
        });
        Ok(())
    }

    /// Runs the due step of a pending stop/load/seek sequence.
    pub fn advance(&mut self, now: Instant, surfaces: &mut Surfaces) {
        let pending = match self.pending.take() {
            Some(p) if now >= p.due => p,
            other => {
                self.pending = other;
                return;
            }
        };

        let Some(player) = surfaces.playlist.as_mut() else {
            error!("playlist player disappeared during load");
            return;
        };

        match pending.stage {
            LoadStage::Load(request) => {
                debug!(playlist = %request.playlist_id, index = request.index, start = request.start_seconds, "loading playlist");
                player.load(&request);
                self.pending = Some(PendingLoad {
                    due: now + self.settings.restore,
                    stage: LoadStage::Restore,
                });
            }
            LoadStage::Restore => {
                self.restore_video_progress(surfaces);
                if let Some(player) = surfaces.playlist.as_mut() {
                    player.play();
                }
            }
        }
    }

    pub fn play_movie(
        &mut self,
        index: usize,
        surfaces: &mut Surfaces,
        sink: &dyn ProgressSink,
    ) -> Result<(), TvError> {
        let filename = self
            .movies
            .get(index)
            .cloned()
            .ok_or_else(|| TvError::invalid_index("movie", index, self.movies.len()))?;
        if surfaces.movie.is_none() {
            return Err(TvError::UninitializedSource("movie player"));
        }

        if self.mode == PlaybackMode::Movie {
            self.save_movie_progress(surfaces, sink);
        }
        if let Some(player) = surfaces.playlist.as_mut() {
            player.pause();
        }
        self.pending = None;
        self.cancel_autosave();

        self.set_mode(PlaybackMode::Movie);
        self.current_movie = Some(filename.clone());

        let start = self
            .movie_progress
            .get(&filename)
            .map(|p| p.current_time)
            .unwrap_or(0.0);
        let src = movie_stream_url(
            &self.settings.backend_url,
            &self.settings.movie_stream_path,
            &filename,
        );
        if let Some(movie) = surfaces.movie.as_mut() {
            movie.set_source(&src);
            movie.set_current_time(start);
            movie.play();
        }

        self.start_autosave(AutoSaveTarget::Movie);
        info!(index, %filename, start, "playing movie");
        Ok(())
    }

    pub fn stop_movie(&mut self, surfaces: &mut Surfaces, sink: &dyn ProgressSink) {
        if self.mode != PlaybackMode::Movie {
            return;
        }
        info!("stopping movie, returning to playlist");

        self.save_movie_progress(surfaces, sink);
        if let Some(movie) = surfaces.movie.as_mut() {
            movie.pause();
        }

        self.set_mode(PlaybackMode::Playlist);
        self.current_movie = None;
        self.cancel_autosave();

        if let Some(player) = surfaces.playlist.as_mut() {
            player.play();
        }
    }

    pub fn next_movie(
        &mut self,
        surfaces: &mut Surfaces,
        sink: &dyn ProgressSink,
    ) -> Result<(), TvError> {
        match self.current_movie_index() {
            Some(i) if i + 1 < self.movies.len() => self.play_movie(i + 1, surfaces, sink),
            _ => Ok(()),
        }
    }

    pub fn previous_movie(
        &mut self,
        surfaces: &mut Surfaces,
        sink: &dyn ProgressSink,
    ) -> Result<(), TvError> {
        match self.current_movie_index() {
            Some(i) if i > 0 => self.play_movie(i - 1, surfaces, sink),
            _ => Ok(()),
        }
    }

    pub fn on_movie_ended(&mut self, surfaces: &mut Surfaces, sink: &dyn ProgressSink) {
        if self.mode != PlaybackMode::Movie {
            return;
        }
        match self.current_movie_index() {
            Some(i) if i + 1 < self.movies.len() => {
                if let Err(err) = self.play_movie(i + 1, surfaces, sink) {
                    warn!(error = %err, "could not advance to next movie");
                }
            }
            _ => self.stop_movie(surfaces, sink),
        }
    }

    pub fn on_player_state(&mut self, state: PlayerState, surfaces: &mut Surfaces) {
        if self.mode == PlaybackMode::Movie {
            if matches!(state, PlayerState::Playing | PlayerState::Buffering) {
                if let Some(player) = surfaces.playlist.as_mut() {
                    player.pause();
                }
            }
            return;
        }

        match state {
            PlayerState::Playing => {
                let video = surfaces
                    .playlist
                    .as_ref()
                    .and_then(|p| p.current_video_id());
                if video != self.current_video {
                    self.current_video = video;
                    self.restore_video_progress(surfaces);
                }
                self.start_autosave(AutoSaveTarget::Playlist);
            }
            PlayerState::Ended => {
                if let Some(player) = surfaces.playlist.as_mut() {
                    player.next();
                    player.play();
                }
            }
            _ => self.cancel_autosave(),
        }
    }

    pub fn autosave_tick(&mut self, surfaces: &Surfaces, sink: &dyn ProgressSink) {
        match self.autosave {
            Some(AutoSaveTarget::Playlist) => self.save_playlist_progress(surfaces, sink),
            Some(AutoSaveTarget::Movie) => self.save_movie_progress(surfaces, sink),
            None => {}
        }
    }

    pub fn save_playlist_progress(&mut self, surfaces: &Surfaces, sink: &dyn ProgressSink) {
        if self.mode != PlaybackMode::Playlist {
            return;
        }
        let Some(player) = surfaces.playlist.as_ref() else {
            return;
        };
        let Some(playlist_id) = player.current_playlist_id() else {
            return;
        };

        let video_id = player.current_video_id().unwrap_or_default();
        let current_time = player.current_time();
        let entry = self.playlist_progress.entry(playlist_id.clone()).or_default();
        entry.video_id = video_id.clone();
        entry.video_index = player.playlist_index();
        entry.current_time = current_time;
        entry.videos.insert(
            PlaylistProgress::video_key(&playlist_id, &video_id),
            VideoProgress {
                video_id,
                current_time,
                timestamp: Utc::now().timestamp_millis(),
            },
        );

        sink.persist_playlists(&self.playlist_progress);
    }

    pub fn save_movie_progress(&mut self, surfaces: &Surfaces, sink: &dyn ProgressSink) {
        let (Some(movie), Some(filename)) = (surfaces.movie.as_ref(), self.current_movie.as_ref())
        else {
            return;
        };
        self.movie_progress
            .entry(filename.clone())
            .or_default()
            .current_time = movie.current_time();

        sink.persist_movies(&self.movie_progress);
    }

    fn restore_video_progress(&self, surfaces: &mut Surfaces) {
        let Some(player) = surfaces.playlist.as_mut() else {
            return;
        };
        let (Some(playlist_id), Some(video_id)) =
            (player.current_playlist_id(), player.current_video_id())
        else {
            return;
        };
        if self
            .channels
            .iter()
            .any(|c| c.id == playlist_id && c.no_save)
        {
            return;
        }

        let saved = self
            .playlist_progress
            .get(&playlist_id)
            .and_then(|p| p.video(&playlist_id, &video_id))
            .map(|v| v.current_time)
            .unwrap_or(0.0);
        if saved > 0.0 {
            player.seek_to(saved);
            info!(%video_id, seconds = saved.floor(), "restored video position");
        }
    }

    fn current_movie_index(&self) -> Option<usize> {
        let current = self.current_movie.as_ref()?;
        self.movies.iter().position(|m| m == current)
    }

    fn set_current_channel(&mut self, id: &str) {
        self.current_channel = Some(id.to_string());
        self.bus.publish(TvEvent::ChannelChanged { id: id.to_string() });
    }

    fn set_mode(&mut self, mode: PlaybackMode) {
        if self.mode != mode {
            self.mode = mode;
            self.bus.publish(TvEvent::ModeChanged(mode));
        }
    }

    fn start_autosave(&mut self, target: AutoSaveTarget) {
        self.autosave = Some(target);
        self.autosave_epoch += 1;
    }

    fn cancel_autosave(&mut self) {
        if self.autosave.take().is_some() {
            self.autosave_epoch += 1;
        }
    }
}
