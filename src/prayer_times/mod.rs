pub mod aladhan;
pub mod calculator;
pub mod provider;

use std::time::Duration;

pub use aladhan::AladhanProvider;
pub use calculator::SalahProvider;
pub use provider::{TimingsError, TimingsProvider};

use crate::config::settings::TimingsConfig;

/// Build the provider selected in `[timings]`.
pub fn from_config(config: &TimingsConfig) -> anyhow::Result<Box<dyn TimingsProvider>> {
    match config.provider.as_str() {
        "aladhan" => {
            let provider = AladhanProvider::new(
                &config.base_url,
                config.method,
                Duration::from_secs(config.timeout_secs),
            )?;
            Ok(Box::new(provider))
        }
        "offline" => Ok(Box::new(SalahProvider::new(config.locations.clone())?)),
        other => Err(anyhow::anyhow!(
            "Unknown timings provider '{}', expected aladhan or offline",
            other
        )),
    }
}
