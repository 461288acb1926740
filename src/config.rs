//! Bot configuration management.
//!
//! On first launch, if config doesn't exist, prompts user via CLI.
//! Config is stored as TOML in the config directory.

use crate::flood_gate::FloodGate;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Flood gate settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloodConfig {
    /// Commands admitted before the gate closes
    pub limit: u32,
    /// Cool-down once the gate closes
    pub window_secs: u64,
}

impl Default for FloodConfig {
    fn default() -> Self {
        Self {
            limit: FloodGate::DEFAULT_LIMIT,
            window_secs: FloodGate::DEFAULT_WINDOW_SECS,
        }
    }
}

/// Bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Chats allowed to change the board
    pub allowed_chats: Vec<i64>,
    /// One fact per line
    #[serde(default = "default_fact_file")]
    pub fact_file: PathBuf,
    /// Append-only record of every reported flavour
    #[serde(default = "default_history_file")]
    pub history_file: PathBuf,
    #[serde(default)]
    pub flood: FloodConfig,
}

fn default_fact_file() -> PathBuf {
    PathBuf::from("faktat.txt")
}

fn default_history_file() -> PathBuf {
    PathBuf::from("history.txt")
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            allowed_chats: Vec::new(),
            fact_file: default_fact_file(),
            history_file: default_history_file(),
            flood: FloodConfig::default(),
        }
    }
}

impl BotConfig {
    /// Load config from file, or create interactively if it doesn't exist
    pub fn load_or_create(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            Self::load(config_path)
        } else {
            log::info!(
                "No config found at {:?}, starting interactive setup",
                config_path
            );
            let config = Self::create_interactive()?;
            config.save(config_path)?;
            Ok(config)
        }
    }

    /// Load config from TOML file
    pub fn load(config_path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config from {:?}", config_path))?;
        let config: BotConfig =
            toml::from_str(&content).with_context(|| "Failed to parse config TOML")?;
        config.validate()?;
        log::info!(
            "Loaded config with {} allowed chats",
            config.allowed_chats.len()
        );
        Ok(config)
    }

    /// Save config to TOML file
    pub fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).with_context(|| "Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config to {:?}", config_path))?;
        log::info!("Saved config to {:?}", config_path);
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.flood.limit == 0 {
            anyhow::bail!("flood.limit must be at least 1");
        }
        if self.flood.window_secs == 0 {
            anyhow::bail!("flood.window_secs must be at least 1");
        }
        if self.allowed_chats.is_empty() {
            log::warn!("allowed_chats is empty; nobody can change the board");
        }
        Ok(())
    }

    /// Interactive CLI configuration
    fn create_interactive() -> Result<Self> {
        println!("\n=== Flavour Bot Configuration ===\n");

        let chats = prompt_required("Allowed chat IDs (comma separated)")?;
        let allowed_chats = parse_chat_ids(&chats)?;

        let defaults = Self::default();
        let fact_file = prompt_optional("Fact file (press Enter for faktat.txt)")?
            .map(PathBuf::from)
            .unwrap_or(defaults.fact_file);
        let history_file = prompt_optional("History file (press Enter for history.txt)")?
            .map(PathBuf::from)
            .unwrap_or(defaults.history_file);

        let config = Self {
            allowed_chats,
            fact_file,
            history_file,
            flood: FloodConfig::default(),
        };

        println!("\n=== Configuration Summary ===");
        println!("  Allowed chats: {:?}", config.allowed_chats);
        println!("  Fact file: {}", config.fact_file.display());
        println!("  History file: {}", config.history_file.display());
        println!(
            "  Flood limit: {} commands, {}s cool-down",
            config.flood.limit, config.flood.window_secs
        );
        println!();

        if !prompt_yes_no("Save this configuration?", true)? {
            anyhow::bail!("Configuration cancelled by user");
        }

        Ok(config)
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        PathBuf::from("config/flavourd.toml")
    }
}

/// Parse a comma separated list of chat IDs
fn parse_chat_ids(input: &str) -> Result<Vec<i64>> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .with_context(|| format!("Invalid chat ID '{}'", s))
        })
        .collect()
}

/// Prompt for required input
fn prompt_required(prompt: &str) -> Result<String> {
    loop {
        print!("{}: ", prompt);
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let input = input.trim().to_string();

        if !input.is_empty() {
            return Ok(input);
        }
        println!("This field is required.");
    }
}

/// Prompt for optional input
fn prompt_optional(prompt: &str) -> Result<Option<String>> {
    print!("{}: ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim().to_string();

    Ok(if input.is_empty() { None } else { Some(input) })
}

/// Prompt for yes/no
fn prompt_yes_no(prompt: &str, default: bool) -> Result<bool> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    print!("{} {}: ", prompt, hint);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim().to_lowercase();

    Ok(match input.as_str() {
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => default,
    })
}
