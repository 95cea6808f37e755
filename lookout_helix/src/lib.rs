mod oauth;
pub use oauth::AppAuth;

mod client;
pub use client::HelixClient;

mod error;
pub use error::HelixError;

pub mod data;

mod serde;

pub mod config;
