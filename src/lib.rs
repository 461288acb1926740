//! Daily baguette flavour board for a Telegram group.
//!
//! Group members report which baguette flavours the cafe has today. The
//! board forgets everything at midnight, and a global flood gate keeps the bot
//! quiet when the chat gets spammy.

pub mod allow_list;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod fact_dispenser;
pub mod flood_gate;
pub mod history_log;
pub mod log_config;
pub mod middleware;
pub mod registry;
pub mod response;
pub mod scheduler;
pub mod telegram;
pub mod transport;
