/// Core error and configuration types shared by the schema generator crates
pub mod config;
pub mod error;

pub use config::{ConfigError, ContractSource, GeneratorConfig};
pub use error::{Error, Result};
