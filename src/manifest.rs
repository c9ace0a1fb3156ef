use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::config::DeploymentDefaults;
use crate::dotenv::Dotenv;
use crate::error::ManifestError;

/// Output path that means "write to standard output".
pub const STDOUT_PATH: &str = "-";

/// Plain scalars that YAML 1.1 readers load as booleans. The emitter only
/// knows YAML 1.2, so these are left bare unless quoted here.
const YAML11_BOOL_SCALAR: &str = r"(?m)^(\s*(?:- )?[A-Za-z_][A-Za-z0-9_]*: )(y|Y|yes|Yes|YES|n|N|no|No|NO|on|On|ON|off|Off|OFF)$";

fn yaml11_bool_regex() -> &'static Regex {
    static BOOL: OnceLock<Regex> = OnceLock::new();
    BOOL.get_or_init(|| Regex::new(YAML11_BOOL_SCALAR).expect("static bool pattern compiles"))
}

/// Header fields that may be supplied through reserved dotenv keys,
/// e.g. `PAPERSPACE_IMAGE` or `PAPER_SPACE_INSTANCE_TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservedField {
    Enabled,
    Image,
    Port,
    Replicas,
    InstanceType,
    ProjectId,
    DeploymentName,
    ApiKey,
}

impl ReservedField {
    pub fn suffix(self) -> &'static str {
        match self {
            ReservedField::Enabled => "ENABLED",
            ReservedField::Image => "IMAGE",
            ReservedField::Port => "PORT",
            ReservedField::Replicas => "REPLICAS",
            ReservedField::InstanceType => "INSTANCE_TYPE",
            ReservedField::ProjectId => "PROJECT_ID",
            ReservedField::DeploymentName => "DEPLOYMENT_NAME",
            ReservedField::ApiKey => "API_KEY",
        }
    }
}

/// The set of key prefixes that are consumed by the generator and never
/// forwarded to the container environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedKeys {
    prefixes: Vec<String>,
}

impl ReservedKeys {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(Into::<String>::into)
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn is_reserved(&self, key: &str) -> bool {
        self.prefixes.iter().any(|prefix| key.starts_with(prefix))
    }

    /// Find the value for `field`, trying each prefix in order.
    pub fn lookup<'a>(&self, dotenv: &'a Dotenv, field: ReservedField) -> Option<&'a str> {
        self.prefixes
            .iter()
            .find_map(|prefix| dotenv.get(&format!("{prefix}{}", field.suffix())))
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }
}

/// A container environment value.
///
/// Integers are only emitted unquoted when integer quoting is disabled and
/// the text is the canonical rendering of an `i64`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EnvValue {
    Integer(i64),
    Text(String),
}

impl EnvValue {
    fn from_raw(raw: &str, quote_integers: bool) -> Self {
        if !quote_integers {
            if let Ok(number) = raw.parse::<i64>() {
                if number.to_string() == raw {
                    return EnvValue::Integer(number);
                }
            }
        }
        EnvValue::Text(raw.to_string())
    }
}

impl fmt::Display for EnvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvValue::Integer(n) => write!(f, "{n}"),
            EnvValue::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvVar {
    pub name: String,
    pub value: EnvValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resources {
    pub replicas: u32,
    pub instance_type: String,
}

/// Deployment descriptor in the layout the PaaS expects. Field order is the
/// order written to YAML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentSpec {
    pub enabled: bool,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub resources: Resources,
    pub env: Vec<EnvVar>,
}

impl DeploymentSpec {
    pub fn to_yaml(&self) -> Result<String, ManifestError> {
        let yaml = serde_yaml_ng::to_string(self)?;
        Ok(yaml11_bool_regex().replace_all(&yaml, "$1'$2'").into_owned())
    }

    /// Write the spec to `path`, replacing any existing file. `-` writes to
    /// standard output.
    pub fn write_to(&self, path: &Path) -> Result<(), ManifestError> {
        let yaml = self.to_yaml()?;

        if path.as_os_str() == STDOUT_PATH {
            let mut stdout = io::stdout().lock();
            return stdout
                .write_all(yaml.as_bytes())
                .and_then(|_| stdout.flush())
                .map_err(|source| ManifestError::Write {
                    path: path.to_path_buf(),
                    source,
                });
        }

        fs::write(path, yaml).map_err(|source| ManifestError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), entries = self.env.len(), "wrote deployment spec");
        Ok(())
    }
}

/// Header values given directly on the command line. These win over both
/// the dotenv file and the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderOverrides {
    pub image: Option<String>,
    pub port: Option<u16>,
    pub replicas: Option<u32>,
    pub instance_type: Option<String>,
}

/// Assembles a [`DeploymentSpec`] from a parsed dotenv file.
#[derive(Debug, Clone)]
pub struct SpecBuilder {
    reserved: ReservedKeys,
    defaults: DeploymentDefaults,
    overrides: HeaderOverrides,
    quote_integers: bool,
}

impl SpecBuilder {
    pub fn new(reserved: ReservedKeys, defaults: DeploymentDefaults) -> Self {
        Self {
            reserved,
            defaults,
            overrides: HeaderOverrides::default(),
            quote_integers: true,
        }
    }

    pub fn overrides(mut self, overrides: HeaderOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn quote_integers(mut self, quote: bool) -> Self {
        self.quote_integers = quote;
        self
    }

    pub fn reserved(&self) -> &ReservedKeys {
        &self.reserved
    }

    pub fn build(&self, dotenv: &Dotenv) -> Result<DeploymentSpec, ManifestError> {
        let enabled = match self.reserved_value(dotenv, ReservedField::Enabled) {
            Some((field, raw)) => parse_bool(&field, raw)?,
            None => self.defaults.enabled,
        };

        let image = self
            .overrides
            .image
            .clone()
            .or_else(|| {
                self.reserved
                    .lookup(dotenv, ReservedField::Image)
                    .map(str::to_string)
            })
            .or_else(|| self.defaults.image.clone())
            .unwrap_or_else(|| {
                warn!("no image configured; writing an empty image field");
                String::new()
            });

        let port = match self.overrides.port {
            Some(port) => Some(port),
            None => match self.reserved_value(dotenv, ReservedField::Port) {
                Some((field, raw)) => Some(parse_number(&field, raw)?),
                None => match dotenv.get("APP_PORT") {
                    Some(raw) => Some(parse_number("APP_PORT", raw)?),
                    None => self.defaults.port,
                },
            },
        };

        let replicas = match self.overrides.replicas {
            Some(replicas) => replicas,
            None => match self.reserved_value(dotenv, ReservedField::Replicas) {
                Some((field, raw)) => parse_number(&field, raw)?,
                None => self.defaults.replicas,
            },
        };

        let instance_type = self
            .overrides
            .instance_type
            .clone()
            .or_else(|| {
                self.reserved
                    .lookup(dotenv, ReservedField::InstanceType)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| self.defaults.instance_type.clone());

        let env = dotenv
            .iter()
            .filter(|entry| !self.reserved.is_reserved(&entry.key))
            .map(|entry| EnvVar {
                name: entry.key.clone(),
                value: EnvValue::from_raw(&entry.value, self.quote_integers),
            })
            .collect();

        Ok(DeploymentSpec {
            enabled,
            image,
            port,
            resources: Resources {
                replicas,
                instance_type,
            },
            env,
        })
    }

    /// Like [`ReservedKeys::lookup`] but also returns the full key name for
    /// error messages.
    fn reserved_value<'a>(
        &self,
        dotenv: &'a Dotenv,
        field: ReservedField,
    ) -> Option<(String, &'a str)> {
        self.reserved.prefixes().iter().find_map(|prefix| {
            let key = format!("{prefix}{}", field.suffix());
            dotenv.get(&key).map(|value| (key, value))
        })
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, raw: &str) -> Result<T, ManifestError> {
    raw.parse().map_err(|_| ManifestError::InvalidField {
        field: field.to_string(),
        value: raw.to_string(),
        expected: "a non-negative integer in range",
    })
}

fn parse_bool(field: &str, raw: &str) -> Result<bool, ManifestError> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(ManifestError::InvalidField {
            field: field.to_string(),
            value: raw.to_string(),
            expected: "true or false",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dotenv::parse_str;
    use serde_yaml_ng::Value;

    fn builder() -> SpecBuilder {
        SpecBuilder::new(
            ReservedKeys::new(["PAPERSPACE_", "PAPER_SPACE_"]),
            DeploymentDefaults::default(),
        )
    }

    fn env_pairs(spec: &DeploymentSpec) -> Vec<(String, String)> {
        spec.env
            .iter()
            .map(|var| (var.name.clone(), var.value.to_string()))
            .collect()
    }

    #[test]
    fn test_reserved_keys_match_any_prefix() {
        let reserved = ReservedKeys::new(["PAPERSPACE_", "PAPER_SPACE_", ""]);
        assert!(reserved.is_reserved("PAPERSPACE_IMAGE"));
        assert!(reserved.is_reserved("PAPER_SPACE_API_KEY"));
        assert!(!reserved.is_reserved("APP_NAME"));
        assert!(!reserved.is_reserved("MY_PAPERSPACE_X"));
        assert_eq!(reserved.prefixes().len(), 2);
    }

    #[test]
    fn test_lookup_prefers_first_prefix() {
        let dotenv = parse_str("PAPER_SPACE_IMAGE=b\nPAPERSPACE_IMAGE=a");
        let reserved = ReservedKeys::new(["PAPERSPACE_", "PAPER_SPACE_"]);
        assert_eq!(reserved.lookup(&dotenv, ReservedField::Image), Some("a"));
        assert_eq!(reserved.lookup(&dotenv, ReservedField::ApiKey), None);
    }

    #[test]
    fn test_env_list_excludes_reserved_keys() {
        let dotenv = parse_str("A=1\nPAPERSPACE_IMAGE=repo/app\nB=hello\nPAPER_SPACE_API_KEY=k");
        let spec = builder().build(&dotenv).unwrap();

        assert_eq!(
            env_pairs(&spec),
            vec![("A".into(), "1".into()), ("B".into(), "hello".into())]
        );
        assert_eq!(spec.image, "repo/app");
    }

    #[test]
    fn test_quoted_integers_are_strings() {
        let dotenv = parse_str("A=1\nB=hello");
        let spec = builder().build(&dotenv).unwrap();
        assert_eq!(spec.env[0].value, EnvValue::Text("1".into()));

        let yaml: Value = serde_yaml_ng::from_str(&spec.to_yaml().unwrap()).unwrap();
        assert_eq!(yaml["env"][0]["name"].as_str(), Some("A"));
        assert_eq!(yaml["env"][0]["value"].as_str(), Some("1"));
        assert_eq!(yaml["env"][1]["value"].as_str(), Some("hello"));
    }

    #[test]
    fn test_raw_integers_are_numbers() {
        let dotenv = parse_str("A=1\nB=007\nC=-3\nD=99999999999999999999");
        let spec = builder().quote_integers(false).build(&dotenv).unwrap();

        assert_eq!(spec.env[0].value, EnvValue::Integer(1));
        assert_eq!(spec.env[1].value, EnvValue::Text("007".into()));
        assert_eq!(spec.env[2].value, EnvValue::Integer(-3));
        assert_eq!(spec.env[3].value, EnvValue::Text("99999999999999999999".into()));

        let yaml: Value = serde_yaml_ng::from_str(&spec.to_yaml().unwrap()).unwrap();
        assert_eq!(yaml["env"][0]["value"].as_i64(), Some(1));
        assert_eq!(yaml["env"][1]["value"].as_str(), Some("007"));
    }

    #[test]
    fn test_header_defaults() {
        let spec = builder().build(&parse_str("")).unwrap();
        assert!(spec.enabled);
        assert_eq!(spec.image, "");
        assert_eq!(spec.port, None);
        assert_eq!(spec.resources.replicas, 1);
        assert_eq!(spec.resources.instance_type, "C4");
        assert!(spec.env.is_empty());
    }

    #[test]
    fn test_header_precedence() {
        let dotenv = parse_str(
            "PAPERSPACE_IMAGE=from/dotenv\nPAPERSPACE_REPLICAS=3\nPAPERSPACE_INSTANCE_TYPE=A4000\nAPP_PORT=8080",
        );
        let defaults = DeploymentDefaults {
            image: Some("from/config".into()),
            port: Some(9000),
            replicas: 2,
            ..DeploymentDefaults::default()
        };
        let base = SpecBuilder::new(ReservedKeys::new(["PAPERSPACE_"]), defaults);

        let spec = base.build(&dotenv).unwrap();
        assert_eq!(spec.image, "from/dotenv");
        assert_eq!(spec.port, Some(8080));
        assert_eq!(spec.resources.replicas, 3);
        assert_eq!(spec.resources.instance_type, "A4000");

        let spec = base
            .clone()
            .overrides(HeaderOverrides {
                image: Some("from/cli".into()),
                port: Some(80),
                replicas: Some(5),
                instance_type: Some("P4000".into()),
            })
            .build(&dotenv)
            .unwrap();
        assert_eq!(spec.image, "from/cli");
        assert_eq!(spec.port, Some(80));
        assert_eq!(spec.resources.replicas, 5);
        assert_eq!(spec.resources.instance_type, "P4000");

        let spec = base.build(&parse_str("")).unwrap();
        assert_eq!(spec.image, "from/config");
        assert_eq!(spec.port, Some(9000));
        assert_eq!(spec.resources.replicas, 2);
    }

    #[test]
    fn test_reserved_port_beats_app_port() {
        let dotenv = parse_str("APP_PORT=8080\nPAPERSPACE_PORT=443");
        let spec = builder().build(&dotenv).unwrap();
        assert_eq!(spec.port, Some(443));
        assert_eq!(env_pairs(&spec), vec![("APP_PORT".into(), "8080".into())]);
    }

    #[test]
    fn test_invalid_header_values() {
        let err = builder()
            .build(&parse_str("PAPERSPACE_PORT=http"))
            .unwrap_err();
        assert!(err.to_string().contains("PAPERSPACE_PORT"));

        let err = builder()
            .build(&parse_str("PAPER_SPACE_ENABLED=maybe"))
            .unwrap_err();
        assert!(err.to_string().contains("PAPER_SPACE_ENABLED"));

        let spec = builder()
            .build(&parse_str("PAPERSPACE_ENABLED=False"))
            .unwrap();
        assert!(!spec.enabled);
    }

    #[test]
    fn test_yaml11_bool_words_stay_strings() {
        let dotenv = parse_str("A=yes\nB=on\nC=off\nY=n\nD=yesterday\nE=no way");
        let yaml = builder().build(&dotenv).unwrap().to_yaml().unwrap();

        assert!(yaml.contains("value: 'yes'"), "{yaml}");
        assert!(yaml.contains("value: 'on'"), "{yaml}");
        assert!(yaml.contains("value: 'off'"), "{yaml}");
        assert!(yaml.contains("name: 'Y'"), "{yaml}");
        assert!(yaml.contains("value: 'n'"), "{yaml}");
        assert!(yaml.contains("value: yesterday"), "{yaml}");
        assert!(yaml.contains("value: no way"), "{yaml}");
        assert!(yaml.contains("enabled: true"), "{yaml}");

        let doc: Value = serde_yaml_ng::from_str(&yaml).unwrap();
        assert_eq!(doc["env"][0]["value"].as_str(), Some("yes"));
        assert_eq!(doc["env"][2]["value"].as_str(), Some("off"));
    }

    #[test]
    fn test_yaml11_bool_names_stay_strings() {
        let yaml = builder()
            .build(&parse_str("ON=1\nPAPERSPACE_IMAGE=no"))
            .unwrap()
            .to_yaml()
            .unwrap();
        assert!(yaml.contains("name: 'ON'"), "{yaml}");
        assert!(yaml.contains("image: 'no'"), "{yaml}");
    }

    #[test]
    fn test_yaml_layout() {
        let dotenv = parse_str("PAPERSPACE_IMAGE=repo/app:1\nAPP_PORT=8000\nNAME=x");
        let yaml = builder().build(&dotenv).unwrap().to_yaml().unwrap();

        let order: Vec<usize> = ["enabled:", "image:", "port:", "resources:", "env:"]
            .iter()
            .map(|key| yaml.find(key).unwrap())
            .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]), "{yaml}");
        assert!(yaml.contains("instanceType: C4"));
        assert!(yaml.contains("replicas: 1"));
    }

    #[test]
    fn test_write_to_overwrites() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("spec.yaml");
        fs::write(&path, "stale content that is much longer than the new spec\n".repeat(50))
            .unwrap();

        let spec = builder().build(&parse_str("A=1")).unwrap();
        spec.write_to(&path).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(!written.contains("stale"));
        assert_eq!(written, spec.to_yaml().unwrap());
    }
}
