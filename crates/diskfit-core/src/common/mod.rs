pub mod config;
pub mod constants;

pub use config::{ConfigError, DriverConfig, load_driver_config, load_json_document};
