use super::{load_dotenv, resolve_output, spec_builder};
use crate::cli::{EnvSource, HeaderArgs};
use crate::config::Config;
use crate::dotenv::Dotenv;
use crate::manifest::{ReservedField, ReservedKeys, STDOUT_PATH};
use crate::ui::{self, Progress};
use anyhow::{Context, Result};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Overrides the PaaS CLI executable, mainly for testing.
const GRADIENT_BIN_ENV: &str = "ENVSPEC_GRADIENT_BIN";
const GRADIENT_BIN: &str = "gradient";
const API_KEY_ENV: &str = "PAPERSPACE_API_KEY";

#[derive(Debug, Clone, Default)]
pub struct DeployRequest {
    pub spec: Option<String>,
    pub name: Option<String>,
    pub project_id: Option<String>,
    pub dry_run: bool,
}

/// A fully resolved `gradient deployments create` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DeploymentCommand {
    program: OsString,
    project_id: String,
    name: String,
    spec: PathBuf,
    api_key: Option<String>,
}

impl DeploymentCommand {
    fn args(&self) -> Vec<OsString> {
        vec![
            "deployments".into(),
            "create".into(),
            "--projectId".into(),
            self.project_id.clone().into(),
            "--name".into(),
            self.name.clone().into(),
            "--spec".into(),
            self.spec.clone().into_os_string(),
        ]
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(self.args());
        if let Some(key) = &self.api_key {
            command.env(API_KEY_ENV, key);
        }
        command
    }
}

impl fmt::Display for DeploymentCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in self.args() {
            let arg = arg.to_string_lossy();
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg.replace('\'', r"'\''"))?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

pub fn execute(
    config: &Config,
    source: &EnvSource,
    header: &HeaderArgs,
    request: DeployRequest,
) -> Result<()> {
    let dotenv = load_dotenv(config, source)?;
    let builder = spec_builder(config, header);
    let spec = builder.build(&dotenv)?;

    let spec_path = resolve_output(config, request.spec.as_deref())?;
    if spec_path.as_os_str() == STDOUT_PATH {
        anyhow::bail!("Deploy needs a spec file path; '-' is not supported here");
    }
    spec.write_to(&spec_path)?;
    ui::success("Wrote", spec_path.display());

    let program = std::env::var_os(GRADIENT_BIN_ENV).unwrap_or_else(|| GRADIENT_BIN.into());
    let command = resolve_command(
        config,
        builder.reserved(),
        &dotenv,
        &request,
        program,
        &spec_path,
    )?;

    if request.dry_run {
        ui::info(format!("Dry run: {command}"));
        return Ok(());
    }

    let progress = Progress::start(
        "Deploying",
        format!("{} to project {}", command.name, command.project_id),
    );
    let status = command
        .to_command()
        .status()
        .with_context(|| format!("Failed to run {}", command.program.to_string_lossy()));

    match status {
        Ok(status) if status.success() => {
            progress.success("Deployed");
            Ok(())
        }
        Ok(status) => {
            progress.fail("Failed", format!("gradient exited with {status}"));
            anyhow::bail!("Deployment command failed: {command}");
        }
        Err(err) => {
            progress.fail("Failed", &err);
            Err(err)
        }
    }
}

fn resolve_command(
    config: &Config,
    reserved: &ReservedKeys,
    dotenv: &Dotenv,
    request: &DeployRequest,
    program: OsString,
    spec: &Path,
) -> Result<DeploymentCommand> {
    let name = request
        .name
        .clone()
        .or_else(|| {
            reserved
                .lookup(dotenv, ReservedField::DeploymentName)
                .map(str::to_string)
        })
        .or_else(|| dotenv.get("APP_NAME").map(str::to_string))
        .or_else(|| config.deployment.name.clone())
        .context("No deployment name: pass --name, set APP_NAME, or set [deployment] name")?;

    let project_id = request
        .project_id
        .clone()
        .or_else(|| {
            reserved
                .lookup(dotenv, ReservedField::ProjectId)
                .map(str::to_string)
        })
        .or_else(|| config.deployment.project_id.clone())
        .context("No project ID: pass --project-id or set a reserved PROJECT_ID key")?;

    let api_key = reserved
        .lookup(dotenv, ReservedField::ApiKey)
        .map(str::to_string);

    tracing::debug!(%name, %project_id, has_api_key = api_key.is_some(), "resolved deployment");

    Ok(DeploymentCommand {
        program,
        project_id,
        name,
        spec: spec.to_path_buf(),
        api_key,
    })
}
