use super::{load_dotenv, spec_builder};
use crate::cli::{EnvSource, HeaderArgs};
use crate::config::Config;
use crate::dotenv::SkipReason;
use crate::manifest::ReservedField;
use crate::ui;
use anyhow::Result;

pub fn execute(config: &Config, source: &EnvSource) -> Result<()> {
    let dotenv = load_dotenv(config, source)?;
    let location = dotenv
        .path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    for skipped in dotenv.skipped() {
        let message = format!("{location}:{}: {}", skipped.line, skipped.reason);
        match skipped.reason {
            SkipReason::DuplicateKey { .. } => warnings.push(message),
            _ => issues.push(message),
        }
    }

    let builder = spec_builder(config, &HeaderArgs::default());
    match builder.build(&dotenv) {
        Ok(spec) => {
            if spec.image.is_empty() {
                let key = builder
                    .reserved()
                    .prefixes()
                    .first()
                    .map(|prefix| format!("{prefix}{}", ReservedField::Image.suffix()))
                    .unwrap_or_else(|| "[deployment] image".to_string());
                issues.push(format!("{location}: no image set (add {key})"));
            }
            let reserved = dotenv.len() - spec.env.len();
            ui::info(format!(
                "{} env entr{}, {} reserved key(s)",
                spec.env.len(),
                if spec.env.len() == 1 { "y" } else { "ies" },
                reserved
            ));
        }
        Err(err) => issues.push(format!("{location}: {err}")),
    }

    for warning in &warnings {
        ui::warn(warning);
    }

    if issues.is_empty() {
        ui::success("Check", format!("{location} is valid."));
        Ok(())
    } else {
        for issue in &issues {
            ui::error(issue);
        }
        anyhow::bail!("Dotenv validation failed ({} issue(s)).", issues.len());
    }
}
