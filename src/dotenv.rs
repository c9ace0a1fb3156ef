use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

use crate::error::DotenvError;

const KEY_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_.]*$";

fn key_regex() -> &'static Regex {
    static KEY: OnceLock<Regex> = OnceLock::new();
    KEY.get_or_init(|| Regex::new(KEY_PATTERN).expect("static key pattern compiles"))
}

/// A single `KEY=VALUE` assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// 1-based line number of the assignment that supplied the value.
    pub line: usize,
    pub key: String,
    pub value: String,
}

/// Why a non-blank, non-comment line did not become an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingSeparator,
    InvalidKey(String),
    /// Superseded by a later assignment on the given line.
    DuplicateKey { key: String, replaced_by: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingSeparator => write!(f, "no '=' separator"),
            SkipReason::InvalidKey(key) => write!(f, "invalid key '{key}'"),
            SkipReason::DuplicateKey { key, replaced_by } => {
                write!(f, "'{key}' is assigned again on line {replaced_by}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    pub line: usize,
    pub reason: SkipReason,
}

/// Parsed contents of a dotenv file, in file order.
#[derive(Debug, Clone, Default)]
pub struct Dotenv {
    pub path: Option<PathBuf>,
    entries: Vec<Entry>,
    skipped: Vec<SkippedLine>,
}

impl Dotenv {
    /// Read and parse a dotenv file from disk.
    pub fn load(path: &Path) -> Result<Self, DotenvError> {
        let contents = fs::read_to_string(path).map_err(|source| DotenvError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut dotenv = parse_str(&contents);
        dotenv.path = Some(path.to_path_buf());
        debug!(
            path = %path.display(),
            entries = dotenv.entries.len(),
            skipped = dotenv.skipped.len(),
            "loaded dotenv file"
        );
        Ok(dotenv)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    pub fn skipped(&self) -> &[SkippedLine] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse dotenv text in a single pass.
///
/// Blank lines and `#` comments are ignored. Malformed lines are recorded in
/// [`Dotenv::skipped`] rather than failing the parse. A repeated key keeps
/// the position of its first assignment and the value of its last.
pub fn parse_str(input: &str) -> Dotenv {
    let mut dotenv = Dotenv::default();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (idx, raw) in input.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);

        let Some((key, value)) = line.split_once('=') else {
            dotenv.skipped.push(SkippedLine {
                line: line_no,
                reason: SkipReason::MissingSeparator,
            });
            continue;
        };

        let key = key.trim();
        if !key_regex().is_match(key) {
            dotenv.skipped.push(SkippedLine {
                line: line_no,
                reason: SkipReason::InvalidKey(key.to_string()),
            });
            continue;
        }

        let value = unquote(value.trim()).to_string();

        match positions.get(key) {
            Some(&pos) => {
                let previous = &mut dotenv.entries[pos];
                dotenv.skipped.push(SkippedLine {
                    line: previous.line,
                    reason: SkipReason::DuplicateKey {
                        key: key.to_string(),
                        replaced_by: line_no,
                    },
                });
                previous.line = line_no;
                previous.value = value;
            }
            None => {
                positions.insert(key.to_string(), dotenv.entries.len());
                dotenv.entries.push(Entry {
                    line: line_no,
                    key: key.to_string(),
                    value,
                });
            }
        }
    }

    dotenv
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn pairs(dotenv: &Dotenv) -> Vec<(&str, &str)> {
        dotenv
            .iter()
            .map(|e| (e.key.as_str(), e.value.as_str()))
            .collect()
    }

    #[test]
    fn test_parse_basic_assignments() {
        let dotenv = parse_str("A=1\nB=hello\n");
        assert_eq!(pairs(&dotenv), vec![("A", "1"), ("B", "hello")]);
        assert!(dotenv.skipped().is_empty());
    }

    #[test]
    fn test_parse_skips_blank_and_comment_lines() {
        let dotenv = parse_str("\n# comment\n   \n  # indented comment\nA=1\n\n");
        assert_eq!(pairs(&dotenv), vec![("A", "1")]);
        assert!(dotenv.skipped().is_empty());
    }

    #[test]
    fn test_parse_value_keeps_later_equals() {
        let dotenv = parse_str("DATABASE_URL=mongodb://u:p@db:27017/?authSource=admin");
        assert_eq!(
            dotenv.get("DATABASE_URL"),
            Some("mongodb://u:p@db:27017/?authSource=admin")
        );
    }

    #[test]
    fn test_parse_strips_matching_quotes_only() {
        let dotenv = parse_str("A=\"hello world\"\nB='x'\nC=\"unbalanced\nD=\"\"");
        assert_eq!(dotenv.get("A"), Some("hello world"));
        assert_eq!(dotenv.get("B"), Some("x"));
        assert_eq!(dotenv.get("C"), Some("\"unbalanced"));
        assert_eq!(dotenv.get("D"), Some(""));
    }

    #[test]
    fn test_parse_handles_crlf_and_export() {
        let dotenv = parse_str("export A=1\r\nB = two \r\n");
        assert_eq!(pairs(&dotenv), vec![("A", "1"), ("B", "two")]);
    }

    #[test]
    fn test_parse_records_malformed_lines() {
        let dotenv = parse_str("JUSTAKEY\n1BAD=x\n=novalue\nOK=yes");
        assert_eq!(pairs(&dotenv), vec![("OK", "yes")]);

        let skipped = dotenv.skipped();
        assert_eq!(skipped.len(), 3);
        assert_eq!(skipped[0].line, 1);
        assert_eq!(skipped[0].reason, SkipReason::MissingSeparator);
        assert_eq!(skipped[1].reason, SkipReason::InvalidKey("1BAD".into()));
        assert_eq!(skipped[2].reason, SkipReason::InvalidKey(String::new()));
    }

    #[test]
    fn test_parse_duplicate_key_last_value_first_position() {
        let dotenv = parse_str("A=1\nB=2\nA=3");
        assert_eq!(pairs(&dotenv), vec![("A", "3"), ("B", "2")]);
        assert_eq!(
            dotenv.skipped(),
            &[SkippedLine {
                line: 1,
                reason: SkipReason::DuplicateKey {
                    key: "A".into(),
                    replaced_by: 3
                },
            }]
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "APP_NAME=avatar").unwrap();
        let dotenv = Dotenv::load(file.path()).unwrap();
        assert_eq!(dotenv.get("APP_NAME"), Some("avatar"));
        assert_eq!(dotenv.path.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_load_missing_file_names_path() {
        let err = Dotenv::load(Path::new("/nonexistent/.env")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/.env"));
    }
}
