pub mod config;
pub mod error;
pub mod types;

pub use config::{Credential, ExporterConfig, FileConfig, InsightsTarget, ReportingWindow, Vcs};
pub use error::ConfigError;
pub use types::*;
