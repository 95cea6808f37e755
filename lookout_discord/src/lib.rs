mod client;
pub use client::DiscordClient;

mod embed;
pub use embed::{Embed, Field, Footer};

pub mod config;
