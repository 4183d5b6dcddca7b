use anyhow::Result;
use couchtv_backend::{BackendClient, PowerRelay, SpawningSink};
use couchtv_core::{
    Action, AlarmConfig, AlarmTime, AppConfig, EventBus, MovieProgressMap, PlaybackMode,
    PlaylistProgressMap, TvError, TvEvent,
};
use couchtv_devices::{
    Announcer, MediaElement, PlayerState, SimulatedMediaElement, SimulatedPlaylistPlayer,
    SurfaceEvent, Surfaces,
};
use couchtv_engine::{
    local_minute, AlarmClock, FadeProfile, FadeStep, InputDispatcher, KeyMap, Overlay,
    PlaybackController, PlaybackSettings, ProgressiveAlarm,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, unbounded_channel, UnboundedReceiver};
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

const VOLUME_STEP: f64 = 5.0;
const ALARM_ADJUST_MINUTES: i32 = 10;

/// Everything fetched from the backend at startup. Each part degrades to an
/// empty value on its own.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub movies: Vec<String>,
    pub playlist_progress: PlaylistProgressMap,
    pub movie_progress: MovieProgressMap,
    pub alarm: AlarmConfig,
}

impl Catalog {
    pub async fn fetch(client: &BackendClient, cfg: &AppConfig) -> Self {
        let movies = client.list_movies().await.unwrap_or_else(|err| {
            warn!(error = %err, "movie catalog unavailable");
            Vec::new()
        });
        let playlist_progress = client.load_playlist_progress().await.unwrap_or_else(|err| {
            warn!(error = %err, "playlist progress unavailable");
            PlaylistProgressMap::new()
        });
        let movie_progress = client.load_movie_progress().await.unwrap_or_else(|err| {
            warn!(error = %err, "movie progress unavailable");
            MovieProgressMap::new()
        });
        let alarm = client.load_alarm_settings().await.unwrap_or_else(|err| {
            warn!(error = %err, "alarm settings unavailable; alarm disabled");
            AlarmConfig::disabled_at(default_alarm_time(cfg))
        });

        Self {
            movies,
            playlist_progress,
            movie_progress,
            alarm,
        }
    }
}

fn default_alarm_time(cfg: &AppConfig) -> AlarmTime {
    cfg.alarm.default_time.parse().unwrap_or_else(|err| {
        warn!(error = %err, "bad alarm.default_time; using 08:00");
        AlarmTime::default()
    })
}

/// In-process surfaces wired to one notification channel.
pub fn simulated_surfaces(cfg: &AppConfig) -> (Surfaces, UnboundedReceiver<SurfaceEvent>) {
    let (tx, rx) = unbounded_channel();

    let mut alarm_sound = SimulatedMediaElement::new("alarm");
    alarm_sound.set_source(&cfg.alarm.sound_path);
    alarm_sound.set_looping(true);
    alarm_sound.set_volume(0.0);

    let mut movie = SimulatedMediaElement::new("movie").with_events(tx.clone());
    if cfg.simulation.movie_duration_secs > 0.0 {
        movie = movie.with_duration(cfg.simulation.movie_duration_secs);
    }

    let surfaces = Surfaces {
        playlist: Some(Box::new(SimulatedPlaylistPlayer::new().with_events(tx))),
        movie: Some(Box::new(movie)),
        alarm_sound: Box::new(alarm_sound),
    };
    (surfaces, rx)
}

/// Timers whose lifetime follows controller state: the fade ticker runs only
/// while an alarm fades, and the autosave ticker is rebuilt whenever the
/// playback controller starts or cancels an auto-save.
struct StateTimers {
    fade_period: Duration,
    fade: Option<Interval>,
    autosave: Option<Interval>,
    autosave_epoch: u64,
}

impl StateTimers {
    fn new(fade_period: Duration, playback: &PlaybackController) -> Self {
        Self {
            fade_period,
            fade: None,
            autosave: None,
            autosave_epoch: playback.autosave_epoch(),
        }
    }

    fn sync(&mut self, fade_active: bool, playback: &PlaybackController) {
        match (fade_active, self.fade.is_some()) {
            (true, false) => self.fade = Some(interval(self.fade_period)),
            (false, true) => self.fade = None,
            _ => {}
        }
        if playback.autosave_epoch() != self.autosave_epoch {
            self.autosave_epoch = playback.autosave_epoch();
            let period = playback.settings().autosave.max(Duration::from_millis(100));
            self.autosave = playback
                .autosave()
                .map(|_| interval_at(tokio::time::Instant::now() + period, period));
        }
    }
}

enum Speech {
    Phrase(String),
    Time(AlarmTime),
}

/// Owns every piece of controller state and drives it from one select loop.
pub struct Orchestrator {
    cfg: AppConfig,
    bus: EventBus<TvEvent>,
    events: UnboundedReceiver<TvEvent>,
    surfaces: Surfaces,
    surface_events: UnboundedReceiver<SurfaceEvent>,
    playback: PlaybackController,
    clock: AlarmClock,
    fade: ProgressiveAlarm,
    input: InputDispatcher,
    overlay: Overlay,
    selector_visible: bool,
    power: PowerRelay,
    sink: SpawningSink,
    announcer: Arc<dyn Announcer>,
    announcement: Option<JoinHandle<()>>,
}

impl Orchestrator {
    pub fn new(
        cfg: AppConfig,
        client: Arc<BackendClient>,
        catalog: Catalog,
        announcer: Arc<dyn Announcer>,
        (surfaces, surface_events): (Surfaces, UnboundedReceiver<SurfaceEvent>),
    ) -> Self {
        let bus = EventBus::new();
        let events = bus.subscribe();

        let mut playback = PlaybackController::new(
            PlaybackSettings::from_app_config(&cfg),
            cfg.channels.clone(),
            bus.clone(),
        );
        playback.load_catalog(
            catalog.movies,
            catalog.playlist_progress,
            catalog.movie_progress,
        );

        let now = Instant::now();
        Self {
            clock: AlarmClock::new(catalog.alarm),
            fade: ProgressiveAlarm::new(FadeProfile::from_section(&cfg.alarm)),
            input: InputDispatcher::new(KeyMap::from_config(&cfg.input), bus.clone()),
            overlay: Overlay::new(now),
            selector_visible: true,
            power: PowerRelay::new(Arc::clone(&client), bus.clone()),
            sink: SpawningSink::new(client),
            announcer,
            announcement: None,
            playback,
            surfaces,
            surface_events,
            events,
            bus,
            cfg,
        }
    }

    /// Swaps in a reloaded config: key map, fade profile and announcer
    /// settings. Timer periods keep their startup values.
    pub fn apply_config(&mut self, cfg: AppConfig) {
        self.input.replace_keymap(KeyMap::from_config(&cfg.input));
        self.fade.set_profile(FadeProfile::from_section(&cfg.alarm));
        info!(
            layout = ?cfg.input.layout,
            bindings = self.input.keymap().len(),
            "configuration applied"
        );
        self.cfg = cfg;
    }

    pub async fn run<F>(mut self, mut reload_rx: mpsc::Receiver<()>, reload: F) -> Result<()>
    where
        F: Fn() -> Result<AppConfig>,
    {
        let intervals = self.cfg.intervals.clone();
        let mut alarm_poll = interval(Duration::from_millis(intervals.alarm_poll_ms.max(100)));
        alarm_poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut overlay_tick = interval(Duration::from_millis(intervals.overlay_tick_ms.max(10)));
        overlay_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut timers = StateTimers::new(
            Duration::from_millis(intervals.fade_tick_ms.max(10)),
            &self.playback,
        );

        let mut keys = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;

        info!(
            channels = self.playback.channels().len(),
            movies = self.playback.movies().len(),
            alarm = %self.clock.settings().time,
            alarm_enabled = self.clock.settings().enabled,
            announcer = self.announcer.name(),
            subscribers = self.bus.subscriber_count(),
            "couchtv started"
        );

        loop {
            tokio::select! {
                line = keys.next_line(), if stdin_open => match line {
                    Ok(Some(key)) => {
                        let key = key.trim_end_matches(['\r', '\n']);
                        self.input.dispatch(key);
                    }
                    Ok(None) => {
                        info!("stdin closed; key input disabled");
                        stdin_open = false;
                    }
                    Err(err) => {
                        warn!(error = %err, "failed to read key input");
                        stdin_open = false;
                    }
                },
                Some(event) = self.events.recv() => {
                    self.on_event(event, Instant::now());
                }
                Some(event) = self.surface_events.recv() => {
                    self.on_surface_event(event);
                }
                _ = alarm_poll.tick() => {
                    if let Some(time) = self.clock.check(&local_minute()) {
                        self.bus.publish(TvEvent::AlarmTriggered { time });
                    }
                }
                _ = tick(&mut timers.fade) => {
                    if let FadeStep::Expired = self.fade.tick(Instant::now(), &mut self.surfaces) {
                        info!("alarm reached its maximum duration");
                    }
                }
                _ = tick(&mut timers.autosave) => {
                    self.playback.autosave_tick(&self.surfaces, &self.sink);
                }
                _ = until(self.playback.next_deadline()) => {
                    self.playback.advance(Instant::now(), &mut self.surfaces);
                }
                _ = overlay_tick.tick() => {
                    self.on_overlay_tick(Instant::now());
                }
                msg = reload_rx.recv() => {
                    if msg.is_some() {
                        match reload() {
                            Ok(cfg) => self.apply_config(cfg),
                            Err(err) => error!(error = %err, "failed to reload config"),
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("received ctrl-c; shutting down");
                    break;
                }
            }

            timers.sync(self.fade.is_active(), &self.playback);
        }

        self.shutdown();
        Ok(())
    }

    fn shutdown(&mut self) {
        match self.playback.mode() {
            PlaybackMode::Movie => self.playback.save_movie_progress(&self.surfaces, &self.sink),
            PlaybackMode::Playlist => {
                self.playback.save_playlist_progress(&self.surfaces, &self.sink)
            }
        }
        self.fade.stop(&mut self.surfaces);
        if let Some(handle) = self.announcement.take() {
            handle.abort();
        }
    }

    fn on_event(&mut self, event: TvEvent, now: Instant) {
        match event {
            TvEvent::UserInteraction => {
                if self.fade.stop(&mut self.surfaces) {
                    info!("alarm silenced by user");
                }
            }
            TvEvent::NonPowerOffInteraction => self.power.power_on(),
            TvEvent::Action(action) => self.on_action(action, now),
            TvEvent::AlarmTriggered { time } => self.on_alarm(time, now),
            TvEvent::ChannelChanged { id } => {
                debug!(%id, "channel changed");
                self.overlay.channel_changed(now);
            }
            TvEvent::ModeChanged(mode) => {
                info!(?mode, item = ?self.playback.current_item(), "playback mode")
            }
            TvEvent::AlarmChanged(settings) => {
                info!(time = %settings.time, enabled = settings.enabled, "alarm settings changed");
                self.sink.persist_alarm(settings);
            }
            TvEvent::PowerChanged { on } => self.power.confirm(on),
            TvEvent::BrightnessChanged(dimming) => debug!(dimming, "overlay dimming"),
        }
    }

    fn on_action(&mut self, action: Action, now: Instant) {
        let movie_mode = self.playback.mode() == PlaybackMode::Movie;
        match action {
            Action::SelectChannel(index) => report(self.playback.play_channel(
                index,
                now,
                &mut self.surfaces,
                &self.sink,
            )),
            Action::PowerOff => self.power_off(movie_mode),
            Action::VolumeUp => self.nudge_volume(VOLUME_STEP, movie_mode),
            Action::VolumeDown => self.nudge_volume(-VOLUME_STEP, movie_mode),
            Action::PlayPause => self.play_pause(movie_mode),
            Action::Next if movie_mode => {
                report(self.playback.next_movie(&mut self.surfaces, &self.sink))
            }
            Action::Previous if movie_mode => {
                report(self.playback.previous_movie(&mut self.surfaces, &self.sink))
            }
            Action::Next => {
                if let Some(player) = self.surfaces.playlist.as_mut() {
                    player.next();
                }
            }
            Action::Previous => {
                if let Some(player) = self.surfaces.playlist.as_mut() {
                    player.previous();
                }
            }
            Action::Seek(seconds) => self.seek(f64::from(seconds), movie_mode),
            Action::Brightness(direction) => {
                let dimming = self.overlay.adjust(direction);
                self.bus.publish(TvEvent::BrightnessChanged(dimming));
            }
            Action::AlarmTimeUp => self.adjust_alarm(ALARM_ADJUST_MINUTES),
            Action::AlarmTimeDown => self.adjust_alarm(-ALARM_ADJUST_MINUTES),
            Action::AlarmToggle => {
                let enabled = self.clock.toggle();
                self.bus.publish(TvEvent::AlarmChanged(self.clock.settings()));
                let phrase = if enabled {
                    self.cfg.announcer.alarm_on_phrase.clone()
                } else {
                    self.cfg.announcer.alarm_off_phrase.clone()
                };
                self.announce(Speech::Phrase(phrase));
            }
        }
    }

    fn power_off(&mut self, movie_mode: bool) {
        if movie_mode {
            if let Some(movie) = self.surfaces.movie.as_mut() {
                movie.pause();
            }
            return;
        }
        let Some(player) = self.surfaces.playlist.as_mut() else {
            return;
        };
        if self.power.is_on() {
            self.power.power_off();
            if player.state() == PlayerState::Playing {
                player.pause();
            }
        } else {
            self.power.power_on();
        }
    }

    fn nudge_volume(&mut self, step: f64, movie_mode: bool) {
        if movie_mode {
            if let Some(movie) = self.surfaces.movie.as_mut() {
                let percent = (movie.volume() * 100.0 + step).clamp(0.0, 100.0);
                movie.set_volume(percent / 100.0);
            }
        } else if let Some(player) = self.surfaces.playlist.as_mut() {
            player.set_volume(player.volume() + step);
        }
    }

    fn play_pause(&mut self, movie_mode: bool) {
        if movie_mode {
            if let Some(movie) = self.surfaces.movie.as_mut() {
                if movie.is_paused() {
                    movie.play();
                } else {
                    movie.pause();
                }
            }
        } else if let Some(player) = self.surfaces.playlist.as_mut() {
            match player.state() {
                PlayerState::Paused | PlayerState::Cued => player.play(),
                _ => player.pause(),
            }
        }
    }

    fn seek(&mut self, seconds: f64, movie_mode: bool) {
        if movie_mode {
            if let Some(movie) = self.surfaces.movie.as_mut() {
                movie.set_current_time((movie.current_time() + seconds).max(0.0));
            }
        } else if let Some(player) = self.surfaces.playlist.as_mut() {
            player.seek_to(player.current_time() + seconds);
        }
    }

    fn adjust_alarm(&mut self, minutes: i32) {
        let time = self.clock.adjust(minutes);
        self.clock.set_enabled(true);
        self.bus.publish(TvEvent::AlarmChanged(self.clock.settings()));
        self.announce(Speech::Time(time));
    }

    fn on_alarm(&mut self, time: AlarmTime, now: Instant) {
        info!(%time, "wake-up alarm");
        self.power.power_on();

        let Some(index) = self.playback.alarm_channel_index() else {
            warn!("no alarm channel configured");
            return;
        };
        report(
            self.playback
                .play_channel(index, now, &mut self.surfaces, &self.sink),
        );
        self.fade.start(now, &mut self.surfaces);
    }

    fn on_surface_event(&mut self, event: SurfaceEvent) {
        match event {
            SurfaceEvent::PlaylistState(state) => {
                debug!(?state, "playlist player state");
                self.playback.on_player_state(state, &mut self.surfaces);
            }
            SurfaceEvent::MediaEnded { source } => {
                let current = self.surfaces.movie.as_ref().and_then(|m| m.source());
                if current.as_deref() == Some(source.as_str()) {
                    self.playback.on_movie_ended(&mut self.surfaces, &self.sink);
                }
            }
        }
    }

    fn on_overlay_tick(&mut self, now: Instant) {
        if let Some(movie) = self.surfaces.movie.as_mut() {
            movie.poll();
        }
        self.surfaces.alarm_sound.poll();

        let visible = self.overlay.selector_visible(now);
        if visible != self.selector_visible {
            self.selector_visible = visible;
            debug!(visible, "channel selector");
        }
    }

    /// Starts an announcement, cancelling the one still playing.
    fn announce(&mut self, speech: Speech) {
        if let Some(previous) = self.announcement.take() {
            previous.abort();
        }
        let announcer = Arc::clone(&self.announcer);
        let volume = self.cfg.announcer.volume;
        self.announcement = Some(tokio::spawn(async move {
            let result = match speech {
                Speech::Phrase(text) => announcer.announce(&text, volume).await,
                Speech::Time(time) => {
                    announcer
                        .announce_time(time.hour(), time.minute(), volume)
                        .await
                }
            };
            if let Err(err) = result {
                warn!(announcer = announcer.name(), error = %err, "announcement failed");
            }
        }));
    }
}

fn report(result: Result<(), TvError>) {
    match result {
        Ok(()) => {}
        Err(err @ TvError::UninitializedSource(_)) => error!(error = %err, "playback failed"),
        Err(err) => warn!(error = %err, "playback request ignored"),
    }
}

async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}
