//! Device implementations behind the [`crate::driver::SweepSource`] trait
//!
//! Real sensor SDK bindings register here next to the synthetic device; the
//! rest of the pipeline only ever sees the trait.

pub mod synthetic;

pub use synthetic::{SyntheticConfig, SyntheticLidar};

use crate::config::SenderConfig;
use crate::driver::SweepSource;
use crate::error::{Error, Result};

/// Instantiate the configured sweep source
pub fn create_source(config: &SenderConfig) -> Result<Box<dyn SweepSource>> {
    match config.device.as_str() {
        "synthetic" => {
            if !config.driver_config.is_empty() {
                log::debug!(
                    "synthetic device ignores driver_config ({})",
                    config.driver_config
                );
            }
            Ok(Box::new(SyntheticLidar::new(SyntheticConfig::default())))
        }
        other => Err(Error::UnknownDevice(other.to_string())),
    }
}
