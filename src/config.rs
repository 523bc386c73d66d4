use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::copy::NestedCardPolicy;
use crate::database::get_database_url;
use crate::services::CopySettings;

pub const DEFAULT_CONFIG_FILE: &str = "metacopy.yml";

/// Settings read from `metacopy.yml`; command-line flags take precedence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub database_url: Option<String>,
    pub root: Option<String>,
    pub base: Option<String>,
    pub only: Vec<String>,
    pub sequence_margin: i64,
    pub rename_depth: usize,
    pub nested_cards: NestedCardPolicy,
    pub max_connections: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            root: None,
            base: None,
            only: Vec::new(),
            sequence_margin: 1000,
            rename_depth: 1,
            nested_cards: NestedCardPolicy::AutoCopy,
            max_connections: 5,
        }
    }
}

impl Config {
    /// Read `path`, falling back to defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Teardown finds previous copies as root children named after a target,
        // which only holds when copies are renamed one level below the root
        if self.rename_depth != 1 {
            bail!(
                "rename_depth {} is not supported; only 1 lets a re-run find its previous copies",
                self.rename_depth
            );
        }
        if self.sequence_margin < 0 {
            bail!("sequence_margin must not be negative");
        }
        if self.max_connections == 0 {
            bail!("max_connections must be at least 1");
        }
        if self
            .database_url
            .as_deref()
            .is_some_and(|url| url.trim().is_empty())
        {
            bail!("database_url is set but empty");
        }
        Ok(())
    }

    pub fn with_database_url(mut self, url: Option<String>) -> Self {
        if url.is_some() {
            self.database_url = url;
        }
        self
    }

    pub fn database_url(&self) -> String {
        get_database_url(self.database_url.as_deref())
    }

    pub fn copy_settings(&self) -> CopySettings {
        CopySettings {
            sequence_margin: self.sequence_margin,
            rename_depth: self.rename_depth,
            nested_cards: self.nested_cards,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = Config::load(Path::new("/nonexistent/metacopy.yml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.database_url(), "sqlite://metabase.db?mode=rwc");
    }

    #[test]
    fn test_deserialization() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
database_url: postgres://metabase@localhost/metabase
root: Environments
base: staging
only: [prod, qa]
sequence_margin: 50
nested_cards: require_copied
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.root.as_deref(), Some("Environments"));
        assert_eq!(config.only, vec!["prod", "qa"]);
        assert_eq!(config.rename_depth, 1);
        assert_eq!(config.max_connections, 5);

        let settings = config.copy_settings();
        assert_eq!(settings.sequence_margin, 50);
        assert_eq!(settings.nested_cards, NestedCardPolicy::RequireCopied);
        assert_eq!(config.database_url(), "postgres://metabase@localhost/metabase");
    }

    #[test]
    fn test_validation() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "rename_depth: 0").unwrap();
        assert!(Config::load(file.path()).is_err());

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "rename_depth: 2").unwrap();
        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("rename_depth 2"));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "unknown_key: 1").unwrap();
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_command_line_url_wins() {
        let config = Config {
            database_url: Some("sqlite://file.db".to_string()),
            ..Config::default()
        };
        let config = config.with_database_url(Some(":memory:".to_string()));
        assert_eq!(config.database_url(), "sqlite::memory:");

        let config = config.with_database_url(None);
        assert_eq!(config.database_url(), "sqlite::memory:");
    }
}
