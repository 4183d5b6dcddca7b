use couchtv_core::AlarmSection;
use couchtv_devices::Surfaces;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeProfile {
    /// Alarm sound ramps 0 -> 1 over this span.
    pub sound_ramp: Duration,
    /// Playlist volume stays muted this long.
    pub fade_delay: Duration,
    /// Then ramps back to its captured level over this span.
    pub fade_duration: Duration,
    /// Hard ceiling for a ringing session.
    pub max_duration: Duration,
}

impl Default for FadeProfile {
    fn default() -> Self {
        Self {
            sound_ramp: Duration::from_secs(30),
            fade_delay: Duration::from_secs(20),
            fade_duration: Duration::from_secs(15),
            max_duration: Duration::from_secs(300),
        }
    }
}

impl FadeProfile {
    pub fn from_section(cfg: &AlarmSection) -> Self {
        let secs = |v: f64| Duration::from_secs_f64(v.max(0.0));
        Self {
            sound_ramp: secs(cfg.sound_ramp_secs),
            fade_delay: secs(cfg.fade_delay_secs),
            fade_duration: secs(cfg.fade_duration_secs),
            max_duration: secs(cfg.max_duration_secs),
        }
    }

    /// Alarm sound volume in `[0, 1]`.
    pub fn sound_level(&self, elapsed: Duration) -> f64 {
        ramp(elapsed, self.sound_ramp)
    }

    /// Playlist volume in `[0, initial]`.
    pub fn playlist_level(&self, elapsed: Duration, initial: f64) -> f64 {
        match elapsed.checked_sub(self.fade_delay) {
            None => 0.0,
            Some(phase) => initial * ramp(phase, self.fade_duration),
        }
    }

    pub fn expired(&self, elapsed: Duration) -> bool {
        elapsed >= self.max_duration
    }
}

fn ramp(elapsed: Duration, span: Duration) -> f64 {
    if span.is_zero() {
        return 1.0;
    }
    (elapsed.as_secs_f64() / span.as_secs_f64()).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeSession {
    pub started_at: Instant,
    pub initial_volume: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FadeStep {
    Idle,
    Ringing { sound: f64, playlist: f64 },
    Expired,
}

/// Wake-up cross-fade between the looping alarm sound and the playlist
/// player's volume. At most one session rings at a time.
pub struct ProgressiveAlarm {
    profile: FadeProfile,
    session: Option<FadeSession>,
}

impl ProgressiveAlarm {
    pub fn new(profile: FadeProfile) -> Self {
        Self {
            profile,
            session: None,
        }
    }

    pub fn set_profile(&mut self, profile: FadeProfile) {
        self.profile = profile;
    }

    pub fn profile(&self) -> FadeProfile {
        self.profile
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<FadeSession> {
        self.session
    }

    /// Returns `false` when a session is already ringing.
    pub fn start(&mut self, now: Instant, surfaces: &mut Surfaces) -> bool {
        if self.session.is_some() {
            return false;
        }

        let initial_volume = match surfaces.playlist.as_mut() {
            Some(player) => {
                let v = player.volume();
                player.set_volume(0.0);
                v
            }
            None => {
                warn!("playlist player not ready; alarm fades the sound only");
                0.0
            }
        };

        let sound = surfaces.alarm_sound.as_mut();
        sound.set_looping(true);
        sound.set_volume(0.0);
        sound.set_current_time(0.0);
        sound.play();

        self.session = Some(FadeSession {
            started_at: now,
            initial_volume,
        });
        info!(initial_volume, "progressive alarm started");
        true
    }

    pub fn tick(&mut self, now: Instant, surfaces: &mut Surfaces) -> FadeStep {
        let Some(session) = self.session else {
            return FadeStep::Idle;
        };
        let elapsed = now.saturating_duration_since(session.started_at);

        if self.profile.expired(elapsed) {
            self.stop(surfaces);
            return FadeStep::Expired;
        }

        let sound = self.profile.sound_level(elapsed);
        let playlist = self
            .profile
            .playlist_level(elapsed, session.initial_volume);

        surfaces.alarm_sound.set_volume(sound);
        if let Some(player) = surfaces.playlist.as_mut() {
            player.set_volume(playlist);
        }

        FadeStep::Ringing { sound, playlist }
    }

    /// Idempotent; returns whether a session was actually stopped.
    pub fn stop(&mut self, surfaces: &mut Surfaces) -> bool {
        if self.session.take().is_none() {
            return false;
        }
        let sound = surfaces.alarm_sound.as_mut();
        sound.pause();
        sound.set_current_time(0.0);
        sound.set_volume(0.0);
        info!("progressive alarm stopped");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::{FadeProfile, FadeStep, ProgressiveAlarm};
    use couchtv_devices::{
        MediaElement, PlaylistLoad, PlaylistPlayer, SimulatedMediaElement,
        SimulatedPlaylistPlayer, Surfaces,
    };
    use std::time::{Duration, Instant};

    fn surfaces(volume: f64) -> Surfaces {
        let mut player = SimulatedPlaylistPlayer::new();
        player.load(&PlaylistLoad {
            playlist_id: "PLwake".to_string(),
            index: 0,
            start_seconds: 0.0,
        });
        player.set_volume(volume);
        Surfaces {
            playlist: Some(Box::new(player)),
            movie: None,
            alarm_sound: Box::new(SimulatedMediaElement::new("alarm")),
        }
    }

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn playlist_stays_muted_before_delay() {
        let p = FadeProfile::default();
        let mut t = 0.0;
        while t < 20.0 {
            assert_eq!(p.playlist_level(secs(t), 80.0), 0.0);
            t += 0.1;
        }
    }

    #[test]
    fn playlist_ramps_monotonically_to_initial() {
        let p = FadeProfile::default();
        let mut prev = 0.0;
        let mut t = 20.0;
        while t <= 35.0 {
            let v = p.playlist_level(secs(t), 80.0);
            assert!(v >= prev);
            prev = v;
            t += 0.1;
        }
        assert_eq!(p.playlist_level(secs(35.0), 80.0), 80.0);
        assert_eq!(p.playlist_level(secs(120.0), 80.0), 80.0);
    }

    #[test]
    fn sound_ramps_then_clamps() {
        let p = FadeProfile::default();
        assert_eq!(p.sound_level(secs(0.0)), 0.0);
        assert!((p.sound_level(secs(15.0)) - 0.5).abs() < 1e-9);
        assert_eq!(p.sound_level(secs(30.0)), 1.0);
        assert_eq!(p.sound_level(secs(200.0)), 1.0);
    }

    #[test]
    fn volume_at_twenty_five_seconds() {
        let mut s = surfaces(80.0);
        let mut alarm = ProgressiveAlarm::new(FadeProfile::default());
        let t0 = Instant::now();
        assert!(alarm.start(t0, &mut s));

        match alarm.tick(t0 + secs(25.0), &mut s) {
            FadeStep::Ringing { playlist, sound } => {
                assert!((playlist - 80.0 * 5.0 / 15.0).abs() < 1e-6);
                assert!((sound - 25.0 / 30.0).abs() < 1e-9);
            }
            other => panic!("unexpected step {other:?}"),
        }
        let player = s.playlist.as_ref().unwrap();
        assert!((player.volume() - 26.666).abs() < 0.01);
    }

    #[test]
    fn second_start_keeps_original_session() {
        let mut s = surfaces(60.0);
        let mut alarm = ProgressiveAlarm::new(FadeProfile::default());
        let t0 = Instant::now();

        assert!(alarm.start(t0, &mut s));
        assert!(!alarm.start(t0 + secs(10.0), &mut s));

        let session = alarm.session().unwrap();
        assert_eq!(session.started_at, t0);
        assert_eq!(session.initial_volume, 60.0);
    }

    #[test]
    fn expires_at_ceiling_and_silences_sound() {
        let mut s = surfaces(50.0);
        let mut alarm = ProgressiveAlarm::new(FadeProfile::default());
        let t0 = Instant::now();
        alarm.start(t0, &mut s);
        alarm.tick(t0 + secs(40.0), &mut s);
        assert_eq!(s.alarm_sound.volume(), 1.0);

        assert_eq!(alarm.tick(t0 + secs(300.0), &mut s), FadeStep::Expired);
        assert!(!alarm.is_active());
        assert!(s.alarm_sound.is_paused());
        assert_eq!(s.alarm_sound.volume(), 0.0);
        assert_eq!(alarm.tick(t0 + secs(301.0), &mut s), FadeStep::Idle);
    }

    #[test]
    fn stop_is_idempotent() {
        let mut s = surfaces(50.0);
        let mut alarm = ProgressiveAlarm::new(FadeProfile::default());
        assert!(!alarm.stop(&mut s));

        alarm.start(Instant::now(), &mut s);
        assert!(alarm.stop(&mut s));
        assert!(!alarm.stop(&mut s));
    }
}
