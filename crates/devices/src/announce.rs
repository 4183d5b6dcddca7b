use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use couchtv_core::AnnouncerConfig;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Spoken feedback for alarm changes.
///
/// Implementations run to completion; the caller cancels an announcement by
/// dropping its future, which kills the child process.
#[async_trait]
pub trait Announcer: Send + Sync {
    fn name(&self) -> &'static str;
    async fn announce(&self, text: &str, volume: f64) -> Result<()>;
    async fn announce_time(&self, hour: u8, minute: u8, volume: f64) -> Result<()>;
}

/// Speaks through a command-line synthesizer (`espeak-ng`, `espeak`).
pub struct SpeechAnnouncer {
    program: String,
    voice: Option<String>,
}

impl SpeechAnnouncer {
    pub fn new(program: impl Into<String>, voice: Option<String>) -> Self {
        Self {
            program: program.into(),
            voice,
        }
    }
}

#[async_trait]
impl Announcer for SpeechAnnouncer {
    fn name(&self) -> &'static str {
        "speech"
    }

    async fn announce(&self, text: &str, volume: f64) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        // espeak amplitude runs 0..=200 with 100 as the nominal level.
        cmd.arg("-a")
            .arg(format!("{}", (volume.clamp(0.0, 1.0) * 100.0).round() as u32));
        if let Some(voice) = &self.voice {
            cmd.arg("-v").arg(voice);
        }
        cmd.arg(text).kill_on_drop(true);

        debug!(program = %self.program, text, "speaking");
        let status = cmd
            .status()
            .await
            .with_context(|| format!("failed to run {}", self.program))?;
        if !status.success() {
            return Err(anyhow!("{} exited with {status}", self.program));
        }
        Ok(())
    }

    async fn announce_time(&self, hour: u8, minute: u8, volume: f64) -> Result<()> {
        self.announce(&format!("{hour}:{minute:02}"), volume).await
    }
}

/// Plays pre-recorded clips when no synthesizer is installed.
///
/// Phrases map to `<dir>/<phrase>.mp3`; times play `<dir>/numbers/<hour>.wav`
/// then `<dir>/numbers/<minute>.wav`.
pub struct ClipAnnouncer {
    player: String,
    clip_dir: PathBuf,
}

impl ClipAnnouncer {
    pub fn new(player: impl Into<String>, clip_dir: impl Into<PathBuf>) -> Self {
        Self {
            player: player.into(),
            clip_dir: clip_dir.into(),
        }
    }

    pub fn phrase_clip(&self, text: &str) -> PathBuf {
        self.clip_dir.join(format!("{text}.mp3"))
    }

    pub fn time_clips(&self, hour: u8, minute: u8) -> Vec<PathBuf> {
        let numbers = self.clip_dir.join("numbers");
        vec![
            numbers.join(format!("{hour}.wav")),
            numbers.join(format!("{minute}.wav")),
        ]
    }

    async fn play_clip(&self, clip: &Path, volume: f64) -> Result<()> {
        let mut cmd = Command::new(&self.player);
        if self.player.ends_with("paplay") {
            // PulseAudio volume: 65536 is 100%.
            cmd.arg(format!(
                "--volume={}",
                (volume.clamp(0.0, 1.0) * 65536.0).round() as u32
            ));
        }
        cmd.arg(clip).kill_on_drop(true);

        debug!(player = %self.player, clip = %clip.display(), "playing clip");
        let status = cmd
            .status()
            .await
            .with_context(|| format!("failed to run {}", self.player))?;
        if !status.success() {
            return Err(anyhow!(
                "{} exited with {status} for {}",
                self.player,
                clip.display()
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Announcer for ClipAnnouncer {
    fn name(&self) -> &'static str {
        "clips"
    }

    async fn announce(&self, text: &str, volume: f64) -> Result<()> {
        self.play_clip(&self.phrase_clip(text), volume).await
    }

    async fn announce_time(&self, hour: u8, minute: u8, volume: f64) -> Result<()> {
        for clip in self.time_clips(hour, minute) {
            self.play_clip(&clip, volume).await?;
        }
        Ok(())
    }
}

/// Picks the announcer once at startup: speech when the synthesizer is on
/// `PATH`, clips otherwise.
pub fn select_announcer(cfg: &AnnouncerConfig) -> Box<dyn Announcer> {
    if program_on_path(&cfg.speech_program) {
        Box::new(SpeechAnnouncer::new(
            cfg.speech_program.clone(),
            cfg.speech_voice.clone(),
        ))
    } else {
        Box::new(ClipAnnouncer::new(
            cfg.clip_player.clone(),
            cfg.clip_dir.clone(),
        ))
    }
}

pub fn program_on_path(program: &str) -> bool {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file();
    }
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| dir.join(program).is_file())
}

#[cfg(test)]
mod tests {
    use super::{program_on_path, select_announcer, ClipAnnouncer};
    use couchtv_core::AnnouncerConfig;
    use std::path::PathBuf;

    #[test]
    fn clip_paths_follow_audio_layout() {
        let clips = ClipAnnouncer::new("aplay", "audio");

        assert_eq!(
            clips.phrase_clip("Pas de réveil"),
            PathBuf::from("audio/Pas de réveil.mp3")
        );
        assert_eq!(
            clips.time_clips(7, 5),
            vec![
                PathBuf::from("audio/numbers/7.wav"),
                PathBuf::from("audio/numbers/5.wav"),
            ]
        );
    }

    #[test]
    fn falls_back_to_clips_without_synthesizer() {
        let cfg = AnnouncerConfig {
            speech_program: "couchtv-no-such-synth".to_string(),
            ..AnnouncerConfig::default()
        };
        assert!(!program_on_path(&cfg.speech_program));
        assert_eq!(select_announcer(&cfg).name(), "clips");
    }
}
