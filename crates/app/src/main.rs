mod orchestrator;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use couchtv_backend::BackendClient;
use couchtv_core::{Action, AppConfig, KeyLayout};
use couchtv_devices::announce::program_on_path;
use couchtv_devices::{select_announcer, Announcer};
use couchtv_engine::KeyMap;
use orchestrator::{simulated_surfaces, Catalog, Orchestrator};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(
    name = "couchtv",
    about = "Remote keys -> playlists, movies and the wake-up alarm"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the controller; key identities are read from stdin, one per line.
    Run,
    Doctor,
    Status,
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cmd = cli.command.unwrap_or(Commands::Run);
    let cfg_path = cli.config.unwrap_or_else(default_config_path);

    match cmd {
        Commands::Config {
            action: ConfigAction::Init,
        } => {
            init_config(&cfg_path)?;
            println!("Initialized config at {}", cfg_path.display());
            Ok(())
        }
        Commands::Doctor => {
            let cfg = load_or_default(&cfg_path)?;
            init_logging(&cfg.log_level);
            doctor(&cfg).await
        }
        Commands::Status => {
            let cfg = load_or_default(&cfg_path)?;
            init_logging(&cfg.log_level);
            status(&cfg).await
        }
        Commands::Run => {
            let cfg = load_or_default(&cfg_path)?;
            init_logging(&cfg.log_level);
            run(cfg, cfg_path).await
        }
    }
}

async fn run(cfg: AppConfig, cfg_path: PathBuf) -> Result<()> {
    let client = Arc::new(BackendClient::new(&cfg.backend).context("invalid backend config")?);
    let catalog = Catalog::fetch(&client, &cfg).await;
    let announcer: Arc<dyn Announcer> = Arc::from(select_announcer(&cfg.announcer));
    let surfaces = simulated_surfaces(&cfg);

    let (reload_tx, reload_rx) = mpsc::channel::<()>(4);
    spawn_reload_watchers(
        cfg_path.clone(),
        cfg.intervals.file_watch_poll_ms,
        reload_tx,
    )
    .await?;

    let orchestrator = Orchestrator::new(cfg, client, catalog, announcer, surfaces);
    orchestrator
        .run(reload_rx, move || load_or_default(&cfg_path))
        .await
}

async fn doctor(cfg: &AppConfig) -> Result<()> {
    println!("== couchtv doctor ==");

    let client = BackendClient::new(&cfg.backend).context("invalid backend config")?;
    match client.list_movies().await {
        Ok(movies) => println!(
            "Backend {}: reachable ({} movies)",
            client.base_url(),
            movies.len()
        ),
        Err(err) => println!("Backend {}: {err}", client.base_url()),
    }

    let announcer = select_announcer(&cfg.announcer);
    println!("Announcer: {}", announcer.name());
    if !program_on_path(&cfg.announcer.speech_program) {
        println!(
            "Speech program {:?} not found; announcements use clips from {}",
            cfg.announcer.speech_program, cfg.announcer.clip_dir
        );
    }
    if !program_on_path(&cfg.announcer.clip_player) {
        println!("Clip player {:?} not found", cfg.announcer.clip_player);
    }

    let keymap = KeyMap::from_config(&cfg.input);
    println!(
        "Key layout: {:?} ({} bindings, {} overrides)",
        cfg.input.layout,
        keymap.len(),
        cfg.input.overrides.len()
    );
    for (label, action) in [("power", Action::PowerOff), ("alarm toggle", Action::AlarmToggle)] {
        match keymap.key_for(action) {
            Some(key) => println!("  {label} key: {key:?}"),
            None => println!("  {label} key: unbound"),
        }
    }
    if cfg.channels.iter().all(|c| !c.is_alarm_target) {
        println!("No alarm channel configured; the wake-up alarm will only ring");
    }

    Ok(())
}

async fn status(cfg: &AppConfig) -> Result<()> {
    let client = BackendClient::new(&cfg.backend).context("invalid backend config")?;

    match client.load_alarm_settings().await {
        Ok(alarm) => println!(
            "alarm: {} ({})",
            alarm.time,
            if alarm.enabled { "enabled" } else { "disabled" }
        ),
        Err(err) => println!("alarm: <unavailable> {err}"),
    }
    match client.list_movies().await {
        Ok(movies) => println!("movies: {}", movies.len()),
        Err(err) => println!("movies: <unavailable> {err}"),
    }
    match client.load_playlist_progress().await {
        Ok(progress) => {
            println!("saved playlists: {}", progress.len());
            for channel in &cfg.channels {
                if let Some(p) = progress.get(&channel.id) {
                    println!(
                        "  {}: video #{} at {:.0}s",
                        channel.name, p.video_index, p.current_time
                    );
                }
            }
        }
        Err(err) => println!("saved playlists: <unavailable> {err}"),
    }
    match client.load_movie_progress().await {
        Ok(progress) => println!("saved movies: {}", progress.len()),
        Err(err) => println!("saved movies: <unavailable> {err}"),
    }

    Ok(())
}

fn default_config_path() -> PathBuf {
    let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("couchtv").join("config.toml")
}

fn init_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    let cfg = AppConfig::default();
    let toml = toml::to_string_pretty(&cfg)?;
    std::fs::write(path, toml)
        .with_context(|| format!("failed to write config file {}", path.display()))?;
    Ok(())
}

fn load_or_default(path: &Path) -> Result<AppConfig> {
    let mut cfg = if !path.exists() {
        AppConfig::default()
    } else {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&data).with_context(|| format!("failed to parse {}", path.display()))?
    };
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

fn init_logging(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // stdout stays free for `status` and `doctor` output.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn spawn_reload_watchers(path: PathBuf, poll_ms: u64, tx: mpsc::Sender<()>) -> Result<()> {
    let tx_poll = tx.clone();
    tokio::spawn(async move {
        let mut known_mtime = file_mtime(&path);
        let sleep = Duration::from_millis(poll_ms.max(2_000));
        loop {
            tokio::time::sleep(sleep).await;
            let current = file_mtime(&path);
            if current.is_some() && current != known_mtime {
                known_mtime = current;
                let _ = tx_poll.send(()).await;
            }
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let tx_hup = tx.clone();
        tokio::spawn(async move {
            if let Ok(mut sig) = signal(SignalKind::hangup()) {
                while sig.recv().await.is_some() {
                    let _ = tx_hup.send(()).await;
                }
            }
        });
    }

    Ok(())
}

fn file_mtime(path: &Path) -> Option<std::time::SystemTime> {
    std::fs::metadata(path).ok()?.modified().ok()
}

fn apply_env_overrides(cfg: &mut AppConfig) {
    if let Ok(v) = std::env::var("COUCHTV_BACKEND_URL") {
        if !v.trim().is_empty() {
            cfg.backend.base_url = v;
        }
    }
    if let Ok(v) = std::env::var("COUCHTV_LOG_LEVEL") {
        if !v.trim().is_empty() {
            cfg.log_level = v;
        }
    }
    if let Ok(v) = std::env::var("COUCHTV_KEY_LAYOUT") {
        match v.trim() {
            "remote" => cfg.input.layout = KeyLayout::Remote,
            "desktop" => cfg.input.layout = KeyLayout::Desktop,
            _ => {}
        }
    }
}
