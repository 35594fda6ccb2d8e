use crate::error::ConfigError;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Snapshot of process-wide configuration: the system environment,
/// optionally overlaid with variables from a `.env`-style file.
#[derive(Debug, Clone, Default)]
pub struct EnvManager {
    vars: HashMap<String, String>,
}

impl EnvManager {
    pub fn new() -> Self {
        let vars = std::env::vars().collect();
        Self { vars }
    }

    /// Build from an explicit variable map, bypassing the process
    /// environment. Used by tests and embedders with their own config store.
    pub fn from_vars(vars: HashMap<String, String>) -> Self {
        Self { vars }
    }

    /// Overlay variables from a `.env` file; file entries win over the
    /// process environment.
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::Invalid(format!("failed to read env file {}: {}", path.display(), e))
        })?;

        self.parse_env_content(&content)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    fn parse_env_content(&mut self, content: &str) -> Result<(), ConfigError> {
        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some(eq_pos) = line.find('=') else {
                return Err(ConfigError::Invalid(format!(
                    "invalid env file: expected KEY=VALUE at line {}",
                    line_num + 1
                )));
            };

            let key = line[..eq_pos].trim();
            let value = line[eq_pos + 1..].trim();

            if key.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "invalid env file: empty key at line {}",
                    line_num + 1
                )));
            }

            self.vars
                .insert(key.to_string(), unquote(value).to_string());
        }

        Ok(())
    }
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2 {
        let bytes = value.as_bytes();
        let quoted = (bytes[0] == b'"' && bytes[value.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[value.len() - 1] == b'\'');
        if quoted {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_keys_comments_and_quotes() {
        let mut env = EnvManager::from_vars(HashMap::new());
        env.parse_env_content(
            "# comment\n\nPGHOST=db.internal\nPGPASSWORD='s3cret'\nPGUSER=\"app\"\n",
        )
        .unwrap();

        assert_eq!(env.get("PGHOST"), Some("db.internal"));
        assert_eq!(env.get("PGPASSWORD"), Some("s3cret"));
        assert_eq!(env.get("PGUSER"), Some("app"));
    }

    #[test]
    fn rejects_lines_without_separator() {
        let mut env = EnvManager::from_vars(HashMap::new());
        let err = env.parse_env_content("PGHOST\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn file_overlay_wins_over_existing_vars() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "PGDATABASE=overridden").unwrap();

        let mut env = EnvManager::from_vars(HashMap::from([(
            "PGDATABASE".to_string(),
            "original".to_string(),
        )]));
        env.load_from_file(file.path()).unwrap();

        assert_eq!(env.get("PGDATABASE"), Some("overridden"));
    }
}
