use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use reels_guard::config::{GuardConfig, ensure_sample_config};
use reels_guard::heuristic::analyze;
use reels_guard::inspector::ScriptedInspector;
use reels_guard::overlay::TerminalPresenter;
use reels_guard::paths::{default_config_path, default_data_dir};
use reels_guard::replay::{load_script, replay};
use reels_guard::service::{DetectionService, Directive, ServiceEvent};
use reels_guard::settings::{
    BLOCKING_ENABLED_KEY, FileSettingsStore, MemorySettingsStore, PREFS_NAMESPACE,
    SettingsStore, blocking_enabled, set_blocking_enabled,
};
use reels_guard::ui_tree::UiNode;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "reels-guard")]
#[command(about = "Detect short-form video feeds in target apps and block them with an overlay")]
struct Cli {
    #[command(flatten)]
    locations: Locations,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args, Clone)]
struct Locations {
    /// Directory holding the persisted settings.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

impl Locations {
    fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(default_config_path)
    }

    fn settings(&self) -> FileSettingsStore {
        FileSettingsStore::new(self.data_dir(), PREFS_NAMESPACE)
    }

    fn load_config(&self) -> Result<GuardConfig> {
        GuardConfig::load(&self.config_path())
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show the blocking flag, configuration and target apps.
    Status,
    Enable,
    Disable,
    /// Run the short-form heuristic once against a UI-tree snapshot (JSON).
    Check(CheckArgs),
    /// Feed a scripted session (JSON lines) through the detection service.
    Replay(ReplayArgs),
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Args, Clone)]
struct CheckArgs {
    #[arg(long)]
    app: String,

    #[arg(long)]
    tree: PathBuf,
}

#[derive(Debug, Args, Clone)]
struct ReplayArgs {
    script: PathBuf,

    /// Ignore the persisted flag and start with blocking enabled.
    #[arg(long, action = ArgAction::SetTrue)]
    force_enable: bool,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Write a commented sample configuration if none exists.
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "reels_guard=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Status => print_status(&cli.locations),
        Commands::Enable => toggle(&cli.locations, true),
        Commands::Disable => toggle(&cli.locations, false),
        Commands::Check(args) => run_check(&cli.locations, args),
        Commands::Replay(args) => run_replay(&cli.locations, args).await,
        Commands::Config(ConfigCommand::Init) => {
            let path = cli.locations.config_path();
            if ensure_sample_config(&path)? {
                println!("wrote sample config to {}", path.display());
            } else {
                println!("config already exists at {}", path.display());
            }
            Ok(())
        }
    }
}

fn print_status(locations: &Locations) -> Result<()> {
    let settings = locations.settings();
    let config = locations.load_config()?;
    let enabled = blocking_enabled(&settings)?;

    println!("blocking: {}", if enabled { "enabled" } else { "disabled" });
    println!("settings: {}", settings.path().display());
    println!("config:   {}", locations.config_path().display());
    println!("policy:   {}", config.summary());
    println!("targets:");
    for app in config.registry().apps() {
        println!("  {} ({})", app.package, app.label);
    }
    Ok(())
}

fn toggle(locations: &Locations, enabled: bool) -> Result<()> {
    let settings = locations.settings();
    set_blocking_enabled(&settings, enabled)
        .with_context(|| format!("failed to persist {BLOCKING_ENABLED_KEY}"))?;

    // A running service picks this up through the toggle directive.
    println!("{}", Directive::ToggleBlocking { enabled }.to_json()?);
    Ok(())
}

fn run_check(locations: &Locations, args: CheckArgs) -> Result<()> {
    let config = locations.load_config()?;
    let registry = config.registry();
    let Some(target) = registry.get(&args.app) else {
        println!("{} is not a target app; never blocked", args.app);
        return Ok(());
    };

    let text = std::fs::read_to_string(&args.tree)
        .with_context(|| format!("failed to read snapshot {}", args.tree.display()))?;
    let root: UiNode = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse snapshot {}", args.tree.display()))?;

    let report = analyze(&root, target);
    println!("short-form markers: {}", report.short_form_present);
    if report.safe_screens.is_empty() {
        println!("safe screens:       none");
    } else {
        println!("safe screens:       {}", report.safe_screens.join(", "));
    }
    println!(
        "verdict:            {}",
        if report.is_short_form() {
            "short-form content"
        } else {
            "allowed"
        }
    );
    Ok(())
}

async fn run_replay(locations: &Locations, args: ReplayArgs) -> Result<()> {
    let config = locations.load_config()?;
    let steps = load_script(&args.script)?;

    let settings: Box<dyn SettingsStore> = if args.force_enable {
        Box::new(MemorySettingsStore::with(BLOCKING_ENABLED_KEY, true))
    } else {
        Box::new(locations.settings())
    };

    let inspector = Arc::new(ScriptedInspector::default());
    let service = DetectionService::new(
        config,
        inspector.clone(),
        Arc::new(TerminalPresenter),
        settings.as_ref(),
    )?;

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let event_handle = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                ServiceEvent::Started { enabled } => {
                    println!("service started (blocking {})", on_off(enabled))
                }
                ServiceEvent::AppEntered { app } => println!("entered {app}"),
                ServiceEvent::AppLeft { app } => println!("left {app}"),
                ServiceEvent::Evaluated {
                    app,
                    short_form,
                    detection_count,
                } => println!(
                    "evaluated {app}: {} (count {detection_count})",
                    if short_form { "short-form" } else { "other" }
                ),
                ServiceEvent::Blocked { app, at, .. } => {
                    println!("blocked {app} at {}", at.to_rfc3339())
                }
                ServiceEvent::Unblocked { app, at } => {
                    println!("unblocked {app} at {}", at.to_rfc3339())
                }
                ServiceEvent::OverlayExpired { app } => println!("overlay expired for {app}"),
                ServiceEvent::Toggled { enabled } => println!("blocking {}", on_off(enabled)),
                ServiceEvent::Stopped => println!("service stopped"),
            }
        }
    });

    let summary = replay(steps, service, inspector, Some(event_tx)).await?;
    event_handle.await.context("event task failed")?;

    println!(
        "{} evaluations, {} blocks, {} unblocks, {} discarded ticks",
        summary.evaluations, summary.blocks, summary.unblocks, summary.discarded_ticks
    );
    Ok(())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}
