use super::{load_dotenv, resolve_output, spec_builder};
use crate::cli::{EnvSource, HeaderArgs};
use crate::config::Config;
use crate::manifest::STDOUT_PATH;
use crate::ui;
use anyhow::Result;

pub fn execute(
    config: &Config,
    source: &EnvSource,
    output: Option<&str>,
    header: &HeaderArgs,
) -> Result<()> {
    let dotenv = load_dotenv(config, source)?;
    for skipped in dotenv.skipped() {
        tracing::warn!(line = skipped.line, "skipping dotenv line: {}", skipped.reason);
    }

    let spec = spec_builder(config, header).build(&dotenv)?;
    let output = resolve_output(config, output)?;
    spec.write_to(&output)?;

    if output.as_os_str() != STDOUT_PATH {
        ui::success(
            "Wrote",
            format!(
                "{} ({} env entr{})",
                output.display(),
                spec.env.len(),
                if spec.env.len() == 1 { "y" } else { "ies" }
            ),
        );
    }
    Ok(())
}
