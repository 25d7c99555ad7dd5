use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facegate::terminal::{self, TerminalDisplay};
use facegate::{
    spawn_engine, AuthenticationPresenter, Config, NavigationController, RegistrationPresenter,
    Scheduler, Timings,
};
use facegate_core::{FaceRecognizer, IdentityStore};
use facegate_hw::{Camera, CameraSource, CaptureSession, MockCamera, V4l2Source};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "facegate", about = "Face registration and authentication kiosk")]
struct Cli {
    /// TOML config file (default: $FACEGATE_CONFIG, else built-in defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use a synthetic camera instead of a V4L2 device
    #[arg(long)]
    mock_camera: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the kiosk (default)
    Run,
    /// List V4L2 capture devices
    Devices,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(cli.config, cli.mock_camera),
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No video capture devices found");
            }
            for dev in devices {
                println!("{}  {}  (driver: {}, bus: {})", dev.path, dev.name, dev.driver, dev.bus);
            }
            Ok(())
        }
    }
}

fn run(config_path: Option<PathBuf>, mock_camera: bool) -> Result<()> {
    let config = Config::load(config_path.as_deref()).context("failed to load config")?;
    tracing::info!(
        camera = %config.camera_device,
        store = %config.store_dir.display(),
        model = %config.model_path.display(),
        threshold = config.similarity_threshold,
        "facegate starting"
    );

    let store = IdentityStore::open(&config.store_dir).context("failed to open identity store")?;
    let recognizer = FaceRecognizer::load(&config.model_path)
        .with_context(|| format!("failed to load model {}", config.model_path.display()))?;

    let source: Arc<dyn CameraSource> = if mock_camera {
        Arc::new(MockCamera::new(640, 480))
    } else {
        Arc::new(V4l2Source::new(config.camera_device.clone()))
    };

    // The UI loop is single-threaded; the presenters and display never leave it.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?;

    runtime.block_on(async move {
        let timings = Timings::default();
        let engine = spawn_engine(Box::new(recognizer), store, config.similarity_threshold);
        let interval = timings.capture_interval;
        let session = || CaptureSession::with_interval(Arc::clone(&source), interval);
        let registration = RegistrationPresenter::new(session(), engine.clone());
        let authentication = AuthenticationPresenter::new(session(), engine);

        let (scheduler, events) = Scheduler::channel();
        let controller = NavigationController::new(
            registration,
            authentication,
            Box::new(TerminalDisplay::stdout()),
            scheduler.clone(),
            timings,
        );

        std::thread::Builder::new()
            .name("facegate-stdin".into())
            .spawn(move || terminal::read_commands(std::io::stdin().lock(), &scheduler))
            .context("failed to spawn stdin reader")?;

        println!("{}", terminal::HELP);
        tracing::info!("facegate ready");
        controller.run(events).await;
        tracing::info!("facegate shutting down");
        Ok::<(), anyhow::Error>(())
    })
}
