mod client;
mod diff;
mod error;
mod logger;
mod protocol;
mod types;

pub use client::{SalusClient, SalusClientBuilder};
pub use error::{Error, Result};
pub use logger::MessageLogMode;
pub use protocol::extract_token;
pub use types::*;
