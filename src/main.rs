use anyhow::{Context, Result};
use clap::Parser;
use command_assistant_rs::{
    actions::ActionRegistry,
    catalog::CatalogSource,
    config::{AudioSettings, ConfigStore, LaunchSettings, RecognitionSettings, RefreshSettings},
    cues::{CuePlayer, SoundBoard, SoundCue},
    dispatch::CommandDispatcher,
    display,
    listener::{Listener, TypedListener},
    lock::{InstanceLock, LockError},
    network::{self, Connectivity, TcpProbe},
    recognizer::RecognizerRefresher,
    session::Session,
    speech::{Speaker, SystemSpeaker},
};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "vosk")]
use command_assistant_rs::{
    audio_capture::{AudioCaptureConfig, CpalAudioCapture, Mailbox},
    listener::VoiceListener,
    recognizer::{vosk::VoskFactory, RecognizerFactory},
};

/// How long the recognition loop gets to notice cancellation before the
/// process exits without it
const LOOP_EXIT_GRACE: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "command-assistant", version, about = "Voice-command assistant")]
struct Args {
    /// Configuration directory (default: per-user config dir)
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Command catalog file (default: commands.json next to the executable)
    #[arg(long)]
    commands: Option<PathBuf>,

    /// Vosk model directory (overrides vosk.vosk-en)
    #[arg(long)]
    model: Option<PathBuf>,

    /// Read commands from stdin instead of the microphone
    #[arg(long)]
    typed: bool,

    /// List input devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Log writer that mirrors every line to stderr and the session log file
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

fn init_logging(store: &ConfigStore, verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }

    let log_dir = store.dir().join("log");
    let log_path = log_dir.join(format!(
        "output_{}.log",
        chrono::Local::now().format("%H_%M_%S")
    ));
    let log_file = fs::create_dir_all(&log_dir).and_then(|_| File::create(&log_path));
    match log_file {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(Tee { file })));
            builder.init();
            log::debug!("📝 Logging to {}", log_path.display());
        }
        Err(e) => {
            builder.init();
            log::warn!("⚠️ Cannot open log file {}: {}", log_path.display(), e);
        }
    }
}

#[cfg(feature = "vosk")]
fn exe_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(feature = "microphone")]
fn print_devices() -> Result<()> {
    for device in command_assistant_rs::audio_capture::list_devices()? {
        println!(
            "{:>3}: {}{} ({} ch)",
            device.index,
            device.name,
            if device.is_default { " [default]" } else { "" },
            device.channel_count
        );
    }
    Ok(())
}

#[cfg(not(feature = "microphone"))]
fn print_devices() -> Result<()> {
    println!("Audio support not compiled in (enable the `microphone` feature).");
    Ok(())
}

/// Where commands come from for this run
struct Input {
    listener: Box<dyn Listener>,
    refresher: Option<Arc<RecognizerRefresher>>,
    /// Stream stops when dropped
    #[cfg(feature = "vosk")]
    _capture: Option<CpalAudioCapture>,
}

fn typed_input() -> Input {
    println!("⌨️  Typed mode: speech recognition is disabled.");
    Input {
        listener: Box::new(TypedListener::stdin()),
        refresher: None,
        #[cfg(feature = "vosk")]
        _capture: None,
    }
}

#[cfg(feature = "vosk")]
fn voice_input(store: &ConfigStore, catalog: &CatalogSource, model: Option<PathBuf>) -> Result<Input> {
    let model = model.unwrap_or_else(|| {
        let default = exe_dir().join("models").join("vosken1");
        PathBuf::from(store.get_entry("vosk", "vosk-en", default.display().to_string()))
    });
    let audio = AudioSettings::load(store);
    let quiet = store.get_entry("vosk", "loglevel", -1i64) < 0;

    let factory: Arc<dyn RecognizerFactory> = Arc::new(
        VoskFactory::load(&model, audio.sample_rate, quiet)
            .with_context(|| format!("loading speech model {}", model.display()))?,
    );
    let slot = Arc::new(Mailbox::new());
    let refresher = Arc::new(RecognizerRefresher::new(
        store.clone(),
        catalog.clone(),
        Arc::clone(&factory),
        Arc::clone(&slot),
    ));
    // First recognizer is built before listening starts
    refresher.refresh_once().context("building the command recognizer")?;

    let frames = Arc::new(Mailbox::new());
    let capture = CpalAudioCapture::start(AudioCaptureConfig::from(&audio), Arc::clone(&frames))
        .context("starting microphone capture")?;

    Ok(Input {
        listener: Box::new(VoiceListener::new(
            frames,
            slot,
            factory,
            Arc::clone(&refresher),
        )),
        refresher: Some(refresher),
        _capture: Some(capture),
    })
}

#[cfg(not(feature = "vosk"))]
fn voice_input(_store: &ConfigStore, _catalog: &CatalogSource, _model: Option<PathBuf>) -> Result<Input> {
    Ok(typed_input())
}

fn report_connectivity(probe: &dyn Connectivity) {
    if probe.forced_offline() {
        println!("🌐 Network: FORCED OFFLINE");
    } else if probe.is_online() {
        println!("🌐 Network: ONLINE");
    } else {
        println!("🌐 Network: OFFLINE");
    }
}

/// Startup sequence, then the recognition loop until it ends or Ctrl+C.
/// Returns whether a restart was requested.
async fn run(
    args: Args,
    store: ConfigStore,
    speaker: Arc<dyn Speaker>,
    cues: Arc<dyn CuePlayer>,
    cancel: CancellationToken,
) -> Result<bool> {
    let catalog = args
        .commands
        .clone()
        .map(CatalogSource::new)
        .unwrap_or_else(CatalogSource::beside_executable);
    log::info!("📖 Command catalog: {}", catalog.path().display());

    let audio = AudioSettings::load(&store);
    log::info!(
        "🎤 Input device: {} @ {} Hz",
        audio.input_device.as_deref().unwrap_or("default"),
        audio.sample_rate
    );

    let probe: Arc<dyn Connectivity> = Arc::new(TcpProbe::new(store.clone()));
    report_connectivity(probe.as_ref());

    let launch = LaunchSettings::load(&store);
    if launch.play_startup {
        cues.play(SoundCue::Startup, true).wait();
    }
    if launch.do_welcome {
        speaker.speak(&launch.welcome_message);
    }
    if launch.print_commands {
        match catalog.load() {
            Ok(commands) => {
                let phrases: Vec<&str> = commands.phrases().collect();
                display::print_grid("Active commands", &phrases);
            }
            Err(e) => log::error!("❌ {}", e),
        }
    }

    let typed = args.typed || RecognitionSettings::load(&store).disable_vosk || !cfg!(feature = "vosk");
    let input = if typed {
        typed_input()
    } else {
        voice_input(&store, &catalog, args.model.clone())?
    };

    tokio::spawn(network::monitor(
        Arc::clone(&probe),
        network::MONITOR_INTERVAL,
        cancel.clone(),
    ));

    if let Some(refresher) = &input.refresher {
        if RefreshSettings::load(&store).enabled {
            tokio::spawn(Arc::clone(refresher).run(cancel.clone()));
        }
    }

    let dispatcher = CommandDispatcher::new(
        store.clone(),
        ActionRegistry::with_builtins(),
        speaker,
        cues,
        probe,
    );
    let restart = dispatcher.restart_flag();
    let mut session = Session::new(store, catalog, dispatcher, input.listener, cancel.clone());

    println!("🎧 Assistant ready. Press Ctrl+C to exit.");
    let mut loop_task = tokio::task::spawn_blocking(move || session.run());

    let finished = tokio::select! {
        result = &mut loop_task => Some(result),
        _ = tokio::signal::ctrl_c() => {
            println!("\nInterrupted by user.");
            None
        }
    };
    cancel.cancel();

    let result = match finished {
        Some(result) => result,
        None => match tokio::time::timeout(LOOP_EXIT_GRACE, loop_task).await {
            Ok(result) => result,
            Err(_) => {
                log::warn!("⚠️ Recognition loop still busy, not waiting for it");
                return Ok(restart.load(Ordering::SeqCst));
            }
        },
    };

    match result {
        Ok(Ok(())) => Ok(restart.load(Ordering::SeqCst)),
        Ok(Err(e)) => Err(e).context("recognition loop failed"),
        Err(e) => Err(e).context("recognition loop panicked"),
    }
}

/// Launch a fresh copy with the same arguments. Runs after the lock is
/// released so the new process can take it.
fn relaunch() -> Result<()> {
    let exe = std::env::current_exe().context("locating the executable")?;
    let child = std::process::Command::new(&exe)
        .args(std::env::args_os().skip(1))
        .spawn()
        .with_context(|| format!("relaunching {}", exe.display()))?;
    log::info!("🔁 Relaunched as pid {}", child.id());
    Ok(())
}

fn shutdown(store: &ConfigStore, speaker: &dyn Speaker, cues: &dyn CuePlayer) {
    let launch = LaunchSettings::load(store);
    if launch.do_goodbye {
        speaker.speak(&launch.shutdown_message);
    }
    if launch.play_shutdown {
        cues.play(SoundCue::Shutdown, true).wait();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let store = match &args.config_dir {
        Some(dir) => ConfigStore::in_dir(dir),
        None => ConfigStore::default_location()?,
    };
    init_logging(&store, args.verbose);
    log::info!("🚀 Starting command assistant");
    log::info!("⚙️ Configuration: {}", store.path().display());

    if args.list_devices {
        return print_devices();
    }

    let lock = match InstanceLock::acquire(store.dir()) {
        Ok(lock) => lock,
        Err(LockError::AlreadyRunning(pid)) => {
            eprintln!("❌ Assistant is already running (pid {})", pid);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let speaker: Arc<dyn Speaker> = Arc::new(SystemSpeaker::new(store.clone()));
    let cues: Arc<dyn CuePlayer> = Arc::new(SoundBoard::beside_executable(store.clone()));
    let cancel = CancellationToken::new();

    let outcome = run(
        args,
        store.clone(),
        Arc::clone(&speaker),
        Arc::clone(&cues),
        cancel.clone(),
    )
    .await;
    if let Err(e) = &outcome {
        log::error!("❌ {:#}", e);
    }

    // Runs on every exit path out of the loop
    cancel.cancel();
    shutdown(&store, speaker.as_ref(), cues.as_ref());
    drop(lock);
    println!("Resources cleaned up.");

    if matches!(outcome, Ok(true)) {
        if let Err(e) = relaunch() {
            log::error!("❌ {:#}", e);
        }
    }
    log::logger().flush();

    // The stdin reader or a busy loop task must not keep the process alive
    std::process::exit(if outcome.is_ok() { 0 } else { 1 });
}
