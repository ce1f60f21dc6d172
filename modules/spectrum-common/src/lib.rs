pub mod config;
pub mod error;
pub mod logging;

pub use config::{Common, Config, Settings, SettingsFile, GOOGLEBOT_USER_AGENT};
pub use error::{ConfigError, Result};
