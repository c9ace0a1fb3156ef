use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "envspec.toml";
const DEFAULT_ENV_FILE: &str = ".env";
const DEFAULT_OUTPUT: &str = "gradient-spec.yaml";
const DEFAULT_PREFIXES: &[&str] = &["PAPERSPACE_", "PAPER_SPACE_"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_env_file")]
    pub env_file: String,
    #[serde(default = "default_output")]
    pub output: String,
    #[serde(default = "default_prefixes")]
    pub reserved_prefixes: Vec<String>,
    #[serde(default = "default_true")]
    pub quote_integers: bool,
    #[serde(default)]
    pub deployment: DeploymentDefaults,
}

/// Header values used when neither the command line nor the dotenv file
/// supplies one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeploymentDefaults {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default = "default_replicas")]
    pub replicas: u32,
    #[serde(default = "default_instance_type")]
    pub instance_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            env_file: default_env_file(),
            output: default_output(),
            reserved_prefixes: default_prefixes(),
            quote_integers: true,
            deployment: DeploymentDefaults::default(),
        }
    }
}

impl Default for DeploymentDefaults {
    fn default() -> Self {
        Self {
            enabled: true,
            image: None,
            port: None,
            replicas: default_replicas(),
            instance_type: default_instance_type(),
            project_id: None,
            name: None,
        }
    }
}

impl Config {
    /// Load a config file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        toml::from_str(&contents).with_context(|| format!("Failed to parse config file {:?}", path))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let contents =
            toml::to_string_pretty(self).context("Failed to serialize envspec config file")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file {:?}", path))?;
        Ok(())
    }

    pub fn env_file_path(&self) -> Result<PathBuf> {
        expand_path(&self.env_file)
    }

    pub fn output_path(&self) -> Result<PathBuf> {
        expand_path(&self.output)
    }
}

/// Expand `~` and `$VAR` references in a user-supplied path.
pub fn expand_path(raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw)
        .map_err(|err| anyhow::anyhow!("Failed to expand path '{}': {}", raw, err))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

fn default_env_file() -> String {
    DEFAULT_ENV_FILE.to_string()
}

fn default_output() -> String {
    DEFAULT_OUTPUT.to_string()
}

fn default_prefixes() -> Vec<String> {
    DEFAULT_PREFIXES.iter().map(|p| p.to_string()).collect()
}

fn default_true() -> bool {
    true
}

fn default_replicas() -> u32 {
    1
}

fn default_instance_type() -> String {
    "C4".to_string()
}
