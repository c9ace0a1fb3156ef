use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// envspec - Generate PaaS deployment specs from dotenv files
///
/// envspec reads a `.env` file and writes a deployment descriptor with a
/// fixed header (enabled, image, port, resources) and an `env:` list holding
/// every non-reserved variable. Keys starting with a reserved prefix
/// (`PAPERSPACE_`, `PAPER_SPACE_` by default) configure the header instead.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the envspec config file
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        env = "ENVSPEC_CONFIG",
        default_value = crate::config::DEFAULT_CONFIG_FILE
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a deployment spec from a dotenv file
    ///
    /// The output file is overwritten unconditionally. Use `-o -` to write
    /// the spec to standard output.
    Generate {
        #[command(flatten)]
        source: EnvSource,

        /// Output path for the generated spec (defaults to gradient-spec.yaml)
        #[arg(short, long, value_name = "FILE")]
        output: Option<String>,

        #[command(flatten)]
        header: HeaderArgs,
    },

    /// Validate a dotenv file without writing anything
    Check {
        #[command(flatten)]
        source: EnvSource,
    },

    /// Generate the spec and create a deployment with the gradient CLI
    Deploy {
        #[command(flatten)]
        source: EnvSource,

        /// Path the generated spec is written to before deploying
        #[arg(short, long, value_name = "FILE")]
        spec: Option<String>,

        /// Deployment name (defaults to the reserved DEPLOYMENT_NAME key, then APP_NAME)
        #[arg(short, long, value_name = "NAME")]
        name: Option<String>,

        /// Project ID (defaults to the reserved PROJECT_ID key)
        #[arg(long, value_name = "ID")]
        project_id: Option<String>,

        /// Print the deployment command instead of running it
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        header: HeaderArgs,
    },

    /// Write a default envspec.toml
    Init {
        /// Overwrite an existing config file
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct EnvSource {
    /// Dotenv file to read (defaults to .env)
    #[arg(short = 'e', long = "env-file", value_name = "FILE")]
    pub env_file: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct HeaderArgs {
    /// Container image, overriding the dotenv and config values
    #[arg(long, value_name = "IMAGE")]
    pub image: Option<String>,

    /// Port exposed by the container
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Number of replicas
    #[arg(long, value_name = "N")]
    pub replicas: Option<u32>,

    /// Machine type, e.g. C4 or A4000
    #[arg(long, value_name = "TYPE")]
    pub instance_type: Option<String>,

    /// Emit integer-valued entries as quoted strings
    #[arg(long, conflicts_with = "raw_integers")]
    pub quote_integers: bool,

    /// Emit integer-valued entries as YAML integers
    #[arg(long)]
    pub raw_integers: bool,
}

impl HeaderArgs {
    /// `None` when neither flag was given and the config decides.
    pub fn quoting(&self) -> Option<bool> {
        match (self.quote_integers, self.raw_integers) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}
