use crate::cli::{Cli, Commands, EnvSource, HeaderArgs};
use crate::config::{expand_path, Config};
use crate::dotenv::Dotenv;
use crate::manifest::{HeaderOverrides, ReservedKeys, SpecBuilder};
use anyhow::Result;
use std::path::PathBuf;

mod check;
mod deploy;
mod generate;
mod init;

pub use deploy::DeployRequest;

pub fn execute(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    let load_config = || Config::load(&config_path);

    match cli.command {
        Commands::Generate {
            source,
            output,
            header,
        } => generate::execute(&load_config()?, &source, output.as_deref(), &header),

        Commands::Check { source } => check::execute(&load_config()?, &source),

        Commands::Deploy {
            source,
            spec,
            name,
            project_id,
            dry_run,
            header,
        } => deploy::execute(
            &load_config()?,
            &source,
            &header,
            DeployRequest {
                spec,
                name,
                project_id,
                dry_run,
            },
        ),

        Commands::Init { force } => init::execute(&config_path, force),
    }
}

/// Resolve the dotenv path (flag, then config) and parse it.
fn load_dotenv(config: &Config, source: &EnvSource) -> Result<Dotenv> {
    let path = match &source.env_file {
        Some(raw) => expand_path(raw)?,
        None => config.env_file_path()?,
    };
    Ok(Dotenv::load(&path)?)
}

fn resolve_output(config: &Config, flag: Option<&str>) -> Result<PathBuf> {
    match flag {
        Some(raw) => expand_path(raw),
        None => config.output_path(),
    }
}

fn spec_builder(config: &Config, header: &HeaderArgs) -> SpecBuilder {
    SpecBuilder::new(
        ReservedKeys::new(config.reserved_prefixes.iter().cloned()),
        config.deployment.clone(),
    )
    .quote_integers(header.quoting().unwrap_or(config.quote_integers))
    .overrides(HeaderOverrides {
        image: header.image.clone(),
        port: header.port,
        replicas: header.replicas,
        instance_type: header.instance_type.clone(),
    })
}
