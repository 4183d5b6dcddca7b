use crate::error::TvError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PlaybackMode {
    #[default]
    Playlist,
    Movie,
}

/// One entry of the channel list: a queue on the external video platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaylistRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub logo: Option<String>,
    /// Always start from the beginning, ignoring stored progress.
    #[serde(default)]
    pub no_save: bool,
    #[serde(default)]
    pub is_alarm_target: bool,
    /// Selecting this channel opens the movie catalog instead of a playlist.
    #[serde(default)]
    pub is_movie_gateway: bool,
}

impl PlaylistRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            logo: None,
            no_save: false,
            is_alarm_target: false,
            is_movie_gateway: false,
        }
    }

    pub fn with_logo(mut self, logo: impl Into<String>) -> Self {
        self.logo = Some(logo.into());
        self
    }

    pub fn no_save(mut self) -> Self {
        self.no_save = true;
        self
    }

    pub fn alarm_target(mut self) -> Self {
        self.is_alarm_target = true;
        self
    }

    pub fn movie_gateway(mut self) -> Self {
        self.is_movie_gateway = true;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MovieFile {
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackItem {
    Playlist(PlaylistRef),
    Movie(MovieFile),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoProgress {
    pub video_id: String,
    pub current_time: f64,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistProgress {
    #[serde(default)]
    pub video_id: String,
    #[serde(default)]
    pub video_index: usize,
    #[serde(default)]
    pub current_time: f64,
    /// Keyed by `<playlist id>|<video id>`.
    #[serde(default)]
    pub videos: HashMap<String, VideoProgress>,
}

impl PlaylistProgress {
    pub fn video_key(playlist_id: &str, video_id: &str) -> String {
        format!("{playlist_id}|{video_id}")
    }

    pub fn video(&self, playlist_id: &str, video_id: &str) -> Option<&VideoProgress> {
        self.videos.get(&Self::video_key(playlist_id, video_id))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MovieProgress {
    #[serde(default)]
    pub current_time: f64,
}

pub type PlaylistProgressMap = HashMap<String, PlaylistProgress>;
pub type MovieProgressMap = HashMap<String, MovieProgress>;

/// Wall-clock alarm time, serialized as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AlarmTime {
    hour: u8,
    minute: u8,
}

impl AlarmTime {
    pub fn new(hour: u8, minute: u8) -> Result<Self, TvError> {
        if hour > 23 || minute > 59 {
            return Err(TvError::Config(format!(
                "alarm time out of range: {hour}:{minute}"
            )));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    /// Shifts the time by `minutes`, wrapping around midnight.
    pub fn shifted(&self, minutes: i32) -> Self {
        let total = i32::from(self.hour) * 60 + i32::from(self.minute) + minutes;
        let total = total.rem_euclid(24 * 60);
        Self {
            hour: (total / 60) as u8,
            minute: (total % 60) as u8,
        }
    }
}

impl Default for AlarmTime {
    fn default() -> Self {
        Self { hour: 8, minute: 0 }
    }
}

impl fmt::Display for AlarmTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for AlarmTime {
    type Err = TvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (h, m) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| TvError::Config(format!("invalid alarm time {s:?}")))?;
        let hour = h
            .parse::<u8>()
            .map_err(|_| TvError::Config(format!("invalid alarm hour in {s:?}")))?;
        let minute = m
            .parse::<u8>()
            .map_err(|_| TvError::Config(format!("invalid alarm minute in {s:?}")))?;
        Self::new(hour, minute)
    }
}

impl TryFrom<String> for AlarmTime {
    type Error = TvError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AlarmTime> for String {
    fn from(value: AlarmTime) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmConfig {
    #[serde(default)]
    pub time: AlarmTime,
    #[serde(default)]
    pub enabled: bool,
}

impl AlarmConfig {
    pub fn disabled_at(time: AlarmTime) -> Self {
        Self {
            time,
            enabled: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AlarmConfig, AlarmTime, PlaylistProgress, PlaylistProgressMap};

    #[test]
    fn alarm_time_wraps_around_midnight() {
        let t: AlarmTime = "23:55".parse().unwrap();
        assert_eq!(t.shifted(10).to_string(), "00:05");

        let t: AlarmTime = "00:05".parse().unwrap();
        assert_eq!(t.shifted(-10).to_string(), "23:55");

        let t: AlarmTime = "07:30".parse().unwrap();
        assert_eq!(t.shifted(-10).to_string(), "07:20");
    }

    #[test]
    fn rejects_malformed_alarm_times() {
        assert!("7h30".parse::<AlarmTime>().is_err());
        assert!("24:00".parse::<AlarmTime>().is_err());
        assert!("12:60".parse::<AlarmTime>().is_err());
        assert_eq!("7:05".parse::<AlarmTime>().unwrap().to_string(), "07:05");
    }

    #[test]
    fn alarm_settings_use_backend_wire_shape() {
        let cfg: AlarmConfig =
            serde_json::from_str(r#"{"time":"06:40","enabled":true}"#).unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.time.hour(), 6);
        assert_eq!(
            serde_json::to_string(&cfg).unwrap(),
            r#"{"time":"06:40","enabled":true}"#
        );
    }

    #[test]
    fn alarm_settings_without_time_fall_back_to_eight() {
        let cfg: AlarmConfig = serde_json::from_str(r#"{"enabled":true}"#).unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.time, AlarmTime::default());
        assert_eq!(cfg.time.to_string(), "08:00");
    }

    #[test]
    fn playlist_progress_reads_camel_case_payload() {
        let raw = r#"{
            "PLx": {
                "videoId": "abc",
                "videoIndex": 3,
                "currentTime": 42.5,
                "videos": { "PLx|abc": { "videoId": "abc", "currentTime": 42.5, "timestamp": 1 } }
            },
            "PLy": {}
        }"#;
        let map: PlaylistProgressMap = serde_json::from_str(raw).unwrap();

        let x = &map["PLx"];
        assert_eq!(x.video_index, 3);
        assert_eq!(x.video("PLx", "abc").map(|v| v.current_time), Some(42.5));
        assert_eq!(map["PLy"], PlaylistProgress::default());
    }
}
