pub mod config;
pub mod error;

pub use config::{Config, LanguageSetup};
pub use error::*;
