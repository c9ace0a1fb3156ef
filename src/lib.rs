// Public API
pub mod cli;
pub mod commands;

// Core domain types
mod config;
mod dotenv;
mod error;
mod manifest;
mod ui;

// Re-export main types
pub use config::{Config, DeploymentDefaults};
pub use dotenv::{parse_str, Dotenv, Entry, SkipReason, SkippedLine};
pub use error::{DotenvError, ManifestError};
pub use manifest::{
    DeploymentSpec, EnvValue, EnvVar, HeaderOverrides, ReservedField, ReservedKeys, Resources,
    SpecBuilder,
};
