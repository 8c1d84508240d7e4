//! Configuration module for reportql.
//!
//! Handles parser bounds, the reporting definition location and environment
//! variable expansion.

mod settings;

pub use settings::{expand_env_vars, ParserSettings, ReportingSettings, Settings, SettingsError};
