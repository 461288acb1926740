use flavourd::allow_list::AllowList;
use flavourd::config::BotConfig;
use flavourd::dispatcher::{Dispatcher, SharedState};
use flavourd::flood_gate::FloodGate;
use flavourd::history_log::HistoryLog;
use flavourd::log_config::init_logging;
use flavourd::middleware::{AllowListStage, Chain, FloodStage};
use flavourd::scheduler::run_daily_reset;
use flavourd::telegram::TelegramTransport;
use flavourd::transport::ChatTransport;
use parking_lot::Mutex;
use secrecy::SecretString;
use std::path::PathBuf;
use std::sync::Arc;

fn print_usage() {
    eprintln!("Usage: flavourd [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --check-config       Load and validate the config file, then exit");
    eprintln!("  --help               Show this help message");
    eprintln!();
    eprintln!("Environment variables:");
    eprintln!("  TELEGRAM_BOT_TOKEN   Bot API token (required)");
    eprintln!("  CONFIG_PATH          Path to config file (default: config/flavourd.toml)");
    eprintln!("  LOG_FILE_PATH        Path to log file (default: logs/flavourd.log)");
    eprintln!("  RUST_LOG             Log filter (default: info)");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    // Parse CLI arguments
    let mut check_only = false;
    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            "--check-config" => check_only = true,
            _ => {
                print_usage();
                return Err(anyhow::anyhow!("Unknown option: {}", arg));
            }
        }
    }

    // Load or create configuration first (may require interactive input)
    let config_path = std::env::var("CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| BotConfig::default_path());
    let config = BotConfig::load_or_create(&config_path)?;

    if check_only {
        println!(
            "Config OK: {} allowed chats, flood limit {} per {}s",
            config.allowed_chats.len(),
            config.flood.limit,
            config.flood.window_secs
        );
        return Ok(());
    }

    run_bot(config).await
}

/// Run the bot until Ctrl-C
async fn run_bot(config: BotConfig) -> anyhow::Result<()> {
    // Initialize logging
    let log_file = std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/flavourd.log".to_string());
    if let Some(parent) = PathBuf::from(&log_file).parent() {
        std::fs::create_dir_all(parent)?;
    }
    init_logging(&log_file)?;

    let token = std::env::var("TELEGRAM_BOT_TOKEN")
        .map_err(|_| anyhow::anyhow!("TELEGRAM_BOT_TOKEN is not set"))?;
    let token = SecretString::new(token);

    let allow_list = AllowList::new(config.allowed_chats.iter().copied());
    log::info!(
        "Starting flavourd: {} allowed chats, flood limit {} per {}s",
        allow_list.len(),
        config.flood.limit,
        config.flood.window_secs
    );

    let state = SharedState::default();
    let flood_gate = Arc::new(Mutex::new(FloodGate::new(
        config.flood.limit,
        config.flood.window_secs,
    )));
    let chain = Chain::new()
        .with(FloodStage::new(flood_gate))
        .with(AllowListStage::new(allow_list));

    let transport = TelegramTransport::connect(token).await?;
    let dispatcher = Dispatcher::new(
        Arc::clone(&state),
        chain,
        HistoryLog::new(&config.history_file),
        config.fact_file.clone(),
    )
    .with_bot_username(transport.bot_username().map(str::to_string));
    let dispatcher = Arc::new(dispatcher);

    tokio::select! {
        _ = dispatcher.serve(transport) => {},
        _ = run_daily_reset(state) => {},
        _ = tokio::signal::ctrl_c() => {
            log::info!("Shutting down.");
        }
    }

    Ok(())
}
