use crate::config::Config;
use crate::ui;
use anyhow::Result;
use std::path::Path;

pub fn execute(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file {} already exists (use --force to overwrite)",
            path.display()
        );
    }

    Config::default().save(path)?;
    ui::success("Created", path.display());
    Ok(())
}
