mod parsing;
mod secret;
mod settings;
mod types;

pub(crate) use types::{CorsSettings, Settings, SyncSettings};

#[cfg(test)]
use types::{ConfigError, Environment};
