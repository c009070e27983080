//! Fish Player - Main entry point
//!
//! Runs the animatronic fish: a greeting at startup, then one performance
//! cycle per configured interval until Ctrl+C or SIGTERM. Subcommands allow
//! queueing content and one-shot playback for bench testing.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use fish_common::config::{ConfigSource, TomlConfig};
use fish_common::{ItemType, PlaylistStore, QueueItem};
use fish_player::audio::AudioOutput;
use fish_player::config::{Config, Overrides};
#[cfg(feature = "gpio")]
use fish_player::device::Actuators;
use fish_player::device::FishDevice;
use fish_player::show::{ContentPicker, PerformanceCycle, Performer};
use fish_player::speech::PiperClient;
use tokio::signal;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for fish-player
#[derive(Parser, Debug)]
#[command(name = "fish-player")]
#[command(about = "Sound playback and motor animation for the animatronic fish")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(short, long, env = "FISH_CONFIG")]
    config: Option<PathBuf>,

    /// Directory containing the .wav/.mp3 files
    #[arg(short, long, env = "FISH_SOUND_DIR")]
    sound_dir: Option<PathBuf>,

    /// Directory for played.json and queue.json
    #[arg(short, long, env = "FISH_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Speech synthesis endpoint
    #[arg(long, env = "FISH_PIPER_URL")]
    piper_url: Option<String>,

    /// Log phrases instead of speaking them
    #[arg(long)]
    no_tts: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Perform on a schedule (default)
    Run,
    /// Append an item to the playback queue
    Enqueue {
        #[arg(value_enum)]
        kind: Kind,
        /// Sound file name or text to speak
        name: String,
    },
    /// Print the playback queue
    Queue,
    /// Play one sound file with mouth animation
    Play { file: String },
    /// Speak one text with mouth animation
    Say { text: String },
    /// List audio output devices
    #[cfg(feature = "hardware-audio")]
    Devices,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Kind {
    Song,
    Text,
}

impl From<Kind> for ItemType {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Song => ItemType::Song,
            Kind::Text => ItemType::Text,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Configuration is read before logging so its level applies; the source
    // is reported once the subscriber is installed
    let source = ConfigSource::resolve(args.config.as_deref());
    let file = TomlConfig::load_from(&source).context("Failed to load configuration")?;
    let config = Config::new(
        file,
        Overrides {
            sound_dir: args.sound_dir,
            data_dir: args.data_dir,
            piper_url: args.piper_url,
            disable_tts: args.no_tts,
        },
    );

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.default_log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    source.log();

    let store = Arc::new(PlaylistStore::init(&config.data_dir));

    match args.command.unwrap_or(Command::Run) {
        Command::Enqueue { kind, name } => {
            let item = match ItemType::from(kind) {
                ItemType::Song => QueueItem::song(name),
                ItemType::Text => QueueItem::text(name),
            };
            store
                .add_to_queue(item.clone())
                .context("Failed to write the queue")?;
            info!(name = %item.name, item_type = %item.item_type, "Queued");
            Ok(())
        }
        Command::Queue => {
            for item in store.queue_items().context("Failed to read the queue")? {
                println!("{}\t{}", item.item_type, item.name);
            }
            Ok(())
        }
        Command::Play { file } => {
            let performer = build_performer(&config, store)?;
            let result = performer.play_sound_file(&file).await;
            performer.device().close().await;
            result.with_context(|| format!("Failed to play {}", file))
        }
        Command::Say { text } => {
            let performer = build_performer(&config, store)?;
            let result = performer.say(&text).await;
            performer.device().close().await;
            result.context("Failed to speak")
        }
        #[cfg(feature = "hardware-audio")]
        Command::Devices => {
            for name in fish_player::audio::CpalOutput::list_devices()
                .context("Failed to list audio devices")?
            {
                println!("{}", name);
            }
            Ok(())
        }
        Command::Run => run(&config, store).await,
    }
}

async fn run(config: &Config, store: Arc<PlaylistStore>) -> Result<()> {
    info!("Starting fish player");
    info!("Sound directory: {}", config.sound_dir.display());
    info!("Data directory: {}", config.data_dir.display());

    let performer = Arc::new(build_performer(config, store)?);
    let device = performer.device().clone();

    if let Err(e) = performer.say(&config.greeting).await {
        warn!("Greeting failed: {}", e);
    }
    device.lock().await.stop_all();

    let picker = ContentPicker::new(config.phrases.clone(), &config.sound_dir, config.retention);
    let cycle = PerformanceCycle::new(performer, picker);

    let mut interval = tokio::time::interval(config.cycle_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; the first show follows one interval after the greeting
    interval.tick().await;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = interval.tick() => {
                let report = cycle.run().await;
                if let Some(e) = &report.content_error {
                    error!("Cycle content failed: {}", e);
                }
            }
        }
    }

    device.close().await;
    info!("Fish player shutdown complete");
    Ok(())
}

fn build_performer(config: &Config, store: Arc<PlaylistStore>) -> Result<Performer> {
    let device = open_device(config)?;
    let mut performer =
        Performer::new(device, store, &config.sound_dir).with_retention(config.retention);

    if config.enable_tts {
        let client = PiperClient::new(&config.piper_url)
            .context("Failed to create speech synthesis client")?;
        info!("Speech synthesis at {}", client.base_url());
        performer = performer.with_speech(Arc::new(client));
    } else {
        info!("Speech synthesis disabled, phrases are only logged");
    }

    Ok(performer)
}

fn open_device(config: &Config) -> Result<FishDevice> {
    let output = open_output(config)?;

    #[cfg(feature = "gpio")]
    {
        let (head, body) = fish_player::motor::cdev::open_motors(&config.gpio_chip)
            .with_context(|| format!("Failed to open motors on {}", config.gpio_chip))?;
        info!("Motors on {}", config.gpio_chip);
        Ok(FishDevice::new(Actuators::new(Box::new(head), Box::new(body)), output))
    }

    #[cfg(not(feature = "gpio"))]
    {
        warn!("Built without GPIO support, motors are simulated");
        let (device, _probes) = FishDevice::simulated(output);
        Ok(device)
    }
}

#[cfg(feature = "hardware-audio")]
fn open_output(config: &Config) -> Result<Arc<dyn AudioOutput>> {
    let output = fish_player::audio::CpalOutput::open(config.audio_device.clone())
        .context("Failed to open audio output")?;
    info!("Audio output {:?}", output.format());
    Ok(Arc::new(output))
}

#[cfg(not(feature = "hardware-audio"))]
fn open_output(config: &Config) -> Result<Arc<dyn AudioOutput>> {
    if let Some(name) = &config.audio_device {
        warn!("Built without audio hardware support, ignoring device {}", name);
    } else {
        warn!("Built without audio hardware support, audio is simulated");
    }
    Ok(Arc::new(fish_player::audio::SimulatedOutput::new()))
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
