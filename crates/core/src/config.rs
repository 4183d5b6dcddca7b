use crate::model::PlaylistRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_schema_version() -> u32 {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendEndpoints {
    pub load: String,
    pub save: String,
    pub movies_progress: String,
    pub movies_list: String,
    pub tv_power: String,
    pub alarm_settings: String,
    pub movie_stream: String,
}

impl Default for BackendEndpoints {
    fn default() -> Self {
        Self {
            load: "/load".to_string(),
            save: "/save".to_string(),
            movies_progress: "/movies-progress".to_string(),
            movies_list: "/movies-list".to_string(),
            tv_power: "/tv-power".to_string(),
            alarm_settings: "/alarm-settings".to_string(),
            movie_stream: "/get-movie".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
    pub endpoints: BackendEndpoints,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            request_timeout_ms: 5_000,
            endpoints: BackendEndpoints::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigIntervals {
    pub alarm_poll_ms: u64,
    pub fade_tick_ms: u64,
    pub autosave_ms: u64,
    pub settle_ms: u64,
    pub restore_ms: u64,
    pub overlay_tick_ms: u64,
    pub file_watch_poll_ms: u64,
}

impl Default for ConfigIntervals {
    fn default() -> Self {
        Self {
            alarm_poll_ms: 4_000,
            fade_tick_ms: 100,
            autosave_ms: 2_500,
            settle_ms: 1_000,
            restore_ms: 500,
            overlay_tick_ms: 100,
            file_watch_poll_ms: 10_000,
        }
    }
}

/// Progressive alarm settings. Durations are in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmSection {
    pub default_time: String,
    pub sound_path: String,
    pub sound_ramp_secs: f64,
    pub fade_delay_secs: f64,
    pub fade_duration_secs: f64,
    pub max_duration_secs: f64,
}

impl Default for AlarmSection {
    fn default() -> Self {
        Self {
            default_time: "08:00".to_string(),
            sound_path: "audio/gentle-notification.wav".to_string(),
            sound_ramp_secs: 30.0,
            fade_delay_secs: 20.0,
            fade_duration_secs: 15.0,
            max_duration_secs: 300.0,
        }
    }
}

/// Stand-in surfaces used when no real player is attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Length reported by the simulated movie element, in seconds. Zero
    /// leaves the movie without an end, so `MediaEnded` never fires.
    pub movie_duration_secs: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            movie_duration_secs: 5_400.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum KeyLayout {
    /// Media keys sent by the living-room remote on a French AZERTY host.
    #[default]
    Remote,
    /// Plain keyboard keys that do not collide with desktop shortcuts.
    Desktop,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct InputConfig {
    pub layout: KeyLayout,
    /// Extra `key identity -> action` bindings, applied over the layout table.
    pub overrides: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnouncerConfig {
    pub speech_program: String,
    pub speech_voice: Option<String>,
    pub clip_player: String,
    pub clip_dir: String,
    pub volume: f64,
    pub alarm_on_phrase: String,
    pub alarm_off_phrase: String,
}

impl Default for AnnouncerConfig {
    fn default() -> Self {
        Self {
            speech_program: "espeak-ng".to_string(),
            speech_voice: Some("fr".to_string()),
            clip_player: "paplay".to_string(),
            clip_dir: "audio".to_string(),
            volume: 0.8,
            alarm_on_phrase: "Réveil activé".to_string(),
            alarm_off_phrase: "Pas de réveil".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub intervals: ConfigIntervals,
    #[serde(default)]
    pub alarm: AlarmSection,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub announcer: AnnouncerConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default = "default_channels")]
    pub channels: Vec<PlaylistRef>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            log_level: default_log_level(),
            backend: BackendConfig::default(),
            intervals: ConfigIntervals::default(),
            alarm: AlarmSection::default(),
            input: InputConfig::default(),
            announcer: AnnouncerConfig::default(),
            simulation: SimulationConfig::default(),
            channels: default_channels(),
        }
    }
}

fn default_channels() -> Vec<PlaylistRef> {
    vec![
        PlaylistRef::new("PLy1pnOysMn9LkcL89omeqd79FH7K3zitw", "News")
            .with_logo("newsTV.png")
            .no_save(),
        PlaylistRef::new("PLmNJItE2MCubz0ibr5tB07Hp4NCZWztWL", "Basketball").with_logo("dunkTV.png"),
        PlaylistRef::new("PLI-KORiB_eLzez0JL6CR_XadP-Nm8XfJA", "Disney").with_logo("DisneyTV.png"),
        PlaylistRef::new("PL0dRZjWdHde0R7UQLzNo64bHaFtvmw4wC", "Making Of")
            .with_logo("Making of TV.png"),
        PlaylistRef::new("PLg6bQuWdqr_YpnEkOrJdh3ZVSiY6suben", "Billiard").with_logo("BTV.png"),
        PlaylistRef::new("PL9qa1Jiw7oNLToYdTLlVpabi_wXpiTpq8", "Sumo").with_logo("sumoTV.png"),
        PlaylistRef::new("PLy1pnOysMn9JrrVsp1kk6RHK_UHxQKAJi", "Wake Up")
            .with_logo("WakeUpTV.png")
            .alarm_target(),
        PlaylistRef::new("PLy1pnOysMn9JVLeoL1QrV4aSEdujD4ESV", "Sleep").with_logo("SleepTV.jpg"),
        PlaylistRef::new("movies", "Movies")
            .with_logo("MovieTV.png")
            .movie_gateway(),
    ]
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, KeyLayout};

    #[test]
    fn defaults_round_trip_through_toml() {
        let cfg = AppConfig::default();
        let text = toml::to_string_pretty(&cfg).expect("serialize");
        let back: AppConfig = toml::from_str(&text).expect("parse");

        assert_eq!(back.channels.len(), 9);
        assert_eq!(back.intervals.autosave_ms, 2_500);
        assert_eq!(back.input.layout, KeyLayout::Remote);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            log_level = "debug"

            [backend]
            base_url = "http://tv.local:5000"

            [input]
            layout = "desktop"
            "#,
        )
        .expect("parse");

        assert_eq!(cfg.backend.base_url, "http://tv.local:5000");
        assert_eq!(cfg.backend.endpoints.save, "/save");
        assert_eq!(cfg.input.layout, KeyLayout::Desktop);
        assert_eq!(cfg.alarm.max_duration_secs, 300.0);
        assert!(cfg.channels.iter().any(|c| c.is_alarm_target));
        assert_eq!(cfg.simulation.movie_duration_secs, 5_400.0);
    }

    #[test]
    fn partial_endpoint_table_keeps_other_routes() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [backend.endpoints]
            tv_power = "/relay"

            [simulation]
            movie_duration_secs = 12.0
            "#,
        )
        .expect("parse");

        assert_eq!(cfg.backend.endpoints.tv_power, "/relay");
        assert_eq!(cfg.backend.endpoints.load, "/load");
        assert_eq!(cfg.backend.endpoints.movie_stream, "/get-movie");
        assert_eq!(cfg.simulation.movie_duration_secs, 12.0);
    }
}
