use anyhow::{Context, Result, anyhow, bail};
use bloom_core::catalog::{SettingsStore, VoiceCatalog, find_voice_by_id};
use bloom_core::manager::SettingsManager;
use bloom_core::{Setting, SessionController, SessionOutcome, SessionState, SettingUpdate, UserAction};
use bloom_service::config::Config;
use bloom_service::convai_adapter::{ConvaiServices, ConvaiTransport};
use bloom_service::platform::{DesktopPlatform, audio_slot};
use bloom_service::settings_store::JsonSettingsStore;
use clap::{Args, Parser, Subcommand};
use convai_realtime::RestClient;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::fmt::time::ChronoLocal;

/// Pause before a replacement session so a failing agent does not spin.
const RESTART_DELAY: Duration = Duration::from_secs(1);
const KEY_HELP: &str = "keys: b = bump, r = restart, q = home";

#[derive(Parser)]
#[command(version, about = "Talk to a Bloom agent persona")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a voice session with a setting (by id or name).
    Play(PlayArgs),
    /// Manage settings.
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// List the voices available to agents.
    Voices,
    /// List the audio input devices.
    Devices,
}

#[derive(Args)]
struct PlayArgs {
    setting: String,
    /// Accelerometer feed: a file or FIFO with one `x,y,z` sample per line.
    #[arg(long)]
    motion_input: Option<PathBuf>,
    /// Microphone to use instead of the default one.
    #[arg(long)]
    input_device: Option<String>,
}

#[derive(Subcommand)]
enum SettingsCommand {
    List,
    Show {
        id: String,
    },
    /// Create a setting and provision its agent.
    Create {
        name: String,
        #[arg(long)]
        voice: String,
    },
    Update(UpdateArgs),
    Delete {
        id: String,
    },
}

#[derive(Args)]
struct UpdateArgs {
    id: String,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    agent_id: Option<String>,
    #[arg(long)]
    voice: Option<String>,
    #[arg(long, conflicts_with = "instructions_file")]
    instructions: Option<String>,
    /// Read the instructions from a file.
    #[arg(long)]
    instructions_file: Option<PathBuf>,
    #[arg(long)]
    bump_instruction: Option<String>,
    #[arg(long)]
    sensitivity: Option<f64>,
    /// Session budget in seconds.
    #[arg(long)]
    session_length: Option<i64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    // --- 3. Parse Command-Line Arguments ---
    let cli = Cli::parse();

    // --- 4. Wire up the services ---
    let services = ConvaiServices::new(RestClient::new(config.rest_config()));
    let store = JsonSettingsStore::new(config.settings_path.clone());
    tracing::debug!("Using settings file {}", store.path().display());

    match cli.command {
        Command::Play(args) => play(&store, services, args).await,
        Command::Settings(command) => manage_settings(store, services, command).await,
        Command::Voices => {
            for voice in services.voices().await? {
                match voice.description {
                    Some(description) => println!("{}\t{}\t{}", voice.voice_id, voice.name, description),
                    None => println!("{}\t{}", voice.voice_id, voice.name),
                }
            }
            Ok(())
        }
        Command::Devices => {
            print!("{}", bloom_native_utils::device::describe_inputs()?);
            Ok(())
        }
    }
}

async fn find_setting(store: &JsonSettingsStore, key: &str) -> Result<Setting> {
    if let Some(setting) = store.get(key).await? {
        return Ok(setting);
    }
    store
        .get_by_name(key)
        .await?
        .ok_or_else(|| anyhow!("No setting with id or name {key:?}"))
}

/// Where keyboard and signal input goes. Swapped for every new session.
type ActionRoute = Arc<Mutex<Option<mpsc::Sender<UserAction>>>>;

fn route(actions: &ActionRoute, action: UserAction) {
    let sender = actions.lock().ok().and_then(|slot| slot.clone());
    match sender {
        Some(tx) => {
            if let Err(e) = tx.try_send(action) {
                tracing::warn!("Dropped {:?}: {}", action, e);
            }
        }
        None => tracing::debug!("No session to receive {:?}", action),
    }
}

fn parse_key(line: &str) -> Option<UserAction> {
    match line.trim() {
        "b" => Some(UserAction::Bump),
        "r" => Some(UserAction::Restart),
        "q" => Some(UserAction::Leave),
        _ => None,
    }
}

async fn play(store: &JsonSettingsStore, services: ConvaiServices, args: PlayArgs) -> Result<()> {
    let actions: ActionRoute = Arc::new(Mutex::new(None));
    let leaving = Arc::new(AtomicBool::new(false));

    // Blocking stdin reads would hold up runtime shutdown, so keys are read
    // on a plain thread.
    std::thread::Builder::new()
        .name("bloom-keys".to_string())
        .spawn({
            let actions = actions.clone();
            move || {
                for line in std::io::stdin().lines() {
                    let Ok(line) = line else { break };
                    match parse_key(&line) {
                        Some(action) => route(&actions, action),
                        None => println!("{KEY_HELP}"),
                    }
                }
            }
        })
        .context("Failed to start keyboard thread")?;
    tokio::spawn({
        let actions = actions.clone();
        let leaving = leaving.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                leaving.store(true, Ordering::SeqCst);
                route(&actions, UserAction::Leave);
            }
        }
    });

    println!("{KEY_HELP}");
    loop {
        // Re-read every time so a restart picks up edits.
        let setting = find_setting(store, &args.setting).await?;
        tracing::info!(id = %setting.id, name = %setting.name, "starting session");

        let slot = audio_slot();
        let platform = DesktopPlatform::new(slot.clone(), args.input_device.clone(), args.motion_input.clone());
        let transport = ConvaiTransport::new(slot);
        let controller = SessionController::new(setting, transport, services.clone(), platform);

        let (action_tx, action_rx) = mpsc::channel(8);
        if let Ok(mut current) = actions.lock() {
            *current = Some(action_tx);
        }
        let reporter = tokio::spawn(report_status(controller.subscribe(), |line| println!("{line}")));

        let outcome = controller.run(action_rx).await;
        if let Ok(mut current) = actions.lock() {
            *current = None;
        }
        // The controller is gone, so the reporter flushes the final state and stops.
        if let Err(e) = reporter.await {
            tracing::warn!("Status reporter failed: {e}");
        }

        match &outcome {
            SessionOutcome::Aborted(err) => bail!("session could not start: {err}"),
            SessionOutcome::Ended(reason) => tracing::info!(?reason, "session ended"),
        }
        if !outcome.should_restart() || leaving.load(Ordering::SeqCst) {
            return Ok(());
        }
        tokio::time::sleep(RESTART_DELAY).await;
        if leaving.load(Ordering::SeqCst) {
            return Ok(());
        }
    }
}

fn status_line(state: &SessionState) -> String {
    let motion = &state.motion;
    let mut line = format!(
        "[{}] agent {} | {} | motion {:?} (threshold {:.1})",
        state.status(),
        state.agent_mode,
        state.time_display(),
        motion.availability,
        motion.threshold,
    );
    if let Some(error) = &state.error {
        line.push_str(&format!(" | error: {error}"));
    }
    line
}

/// Prints each visible change, and always the final state once the session
/// drops its sender, so an ending error is never lost.
async fn report_status(mut states: watch::Receiver<SessionState>, mut print: impl FnMut(&str)) {
    let mut last = String::new();
    loop {
        let closed = states.changed().await.is_err();
        let line = status_line(&states.borrow_and_update());
        // Motion samples change the state constantly; only print what a user would notice.
        if line != last {
            print(&line);
            last = line;
        }
        if closed {
            break;
        }
    }
}

async fn manage_settings(
    store: JsonSettingsStore,
    services: ConvaiServices,
    command: SettingsCommand,
) -> Result<()> {
    let manager = SettingsManager::new(store, services.clone());
    match command {
        SettingsCommand::List => {
            for setting in manager.store().list().await? {
                println!(
                    "{}\t{}\t{}s\tsensitivity {}",
                    setting.id, setting.name, setting.session_length, setting.accelerometer_sensitivity
                );
            }
        }
        SettingsCommand::Show { id } => {
            let setting = find_setting(manager.store(), &id).await?;
            println!("{}", serde_json::to_string_pretty(&setting)?);
        }
        SettingsCommand::Create { name, voice } => {
            check_voice(&services, &voice).await;
            let setting = manager.create(&name, &voice).await?;
            println!("Created {} ({})", setting.name, setting.id);
        }
        SettingsCommand::Update(args) => {
            let instructions = match (args.instructions, args.instructions_file) {
                (_, Some(path)) => Some(
                    tokio::fs::read_to_string(&path)
                        .await
                        .with_context(|| format!("Failed to read {}", path.display()))?,
                ),
                (instructions, None) => instructions,
            };
            if let Some(voice) = &args.voice {
                check_voice(&services, voice).await;
            }
            let update = SettingUpdate {
                name: args.name,
                agent_id: args.agent_id,
                voice_id: args.voice,
                instructions,
                bump_instruction: args.bump_instruction,
                accelerometer_sensitivity: args.sensitivity,
                session_length: args.session_length,
            };
            if update.is_empty() {
                bail!("Nothing to update");
            }
            let setting = manager.update(&args.id, update).await?;
            println!("Updated {} ({})", setting.name, setting.id);
        }
        SettingsCommand::Delete { id } => {
            manager.delete(&id).await?;
            println!("Deleted {id}");
        }
    }
    Ok(())
}

/// Warns about voice ids the catalog does not know. The catalog being
/// unreachable is not a reason to refuse the edit.
async fn check_voice(catalog: &impl VoiceCatalog, voice_id: &str) {
    match catalog.voices().await {
        Ok(voices) if find_voice_by_id(&voices, voice_id).is_none() => {
            tracing::warn!("Voice {voice_id} is not in the voice catalog");
        }
        Ok(_) => {}
        Err(e) => tracing::debug!("Could not check voice {voice_id}: {e:#}"),
    }
}
