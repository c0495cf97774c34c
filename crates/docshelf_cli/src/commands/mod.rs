//! CLI command implementations.

pub mod compact;
pub mod inspect;
pub mod query;
pub mod records;
pub mod store;
pub mod verify;

use docshelf_codec::Value;
use docshelf_core::{Config, CoreError, Engine, Key, SchemaBuilder};
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The engine rejected the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An argument was not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// An argument was well-formed but unusable.
    #[error("{0}")]
    Usage(String),
}

/// Which database a command works on.
///
/// Unset fields fall back to the `DOCSHELF_*` environment variables and
/// then to the defaults of [`Config`].
#[derive(Debug, Default)]
pub struct Target {
    /// Directory holding the database directories.
    pub path: Option<PathBuf>,
    /// Database name.
    pub name: Option<String>,
    /// Schema version.
    pub version: Option<u32>,
}

impl Target {
    /// Builds the engine configuration. A file-backed database is required.
    pub fn config(&self) -> Result<Config, CliError> {
        let mut config = Config::from_env()?;
        if let Some(path) = &self.path {
            config = config.data_dir(path);
        }
        if let Some(name) = &self.name {
            config = config.name(name.clone());
        }
        if let Some(version) = self.version {
            config = config.version(version);
        }
        if config.data_dir.is_none() {
            return Err(CliError::Usage(
                "database path required (--path or DOCSHELF_DATA_DIR)".into(),
            ));
        }
        Ok(config)
    }

    /// Opens the database with the stores already in its catalog.
    pub fn open(&self) -> Result<Engine, CliError> {
        self.open_with(SchemaBuilder::new())
    }

    /// Opens the database and migrates it to `schema`.
    pub fn open_with(&self, schema: SchemaBuilder) -> Result<Engine, CliError> {
        let config = self.config()?;
        debug!(
            path = ?config.data_dir,
            name = %config.name,
            version = config.version,
            "opening database"
        );
        Ok(Engine::open(config, schema)?)
    }
}

/// Parses a JSON argument into a record value.
pub fn parse_value(json: &str) -> Result<Value, CliError> {
    Ok(serde_json::from_str(json)?)
}

/// Parses a JSON argument into a key.
pub fn parse_key(json: &str) -> Result<Key, CliError> {
    let value = parse_value(json)?;
    Key::from_value(&value)
        .ok_or_else(|| CliError::Usage(format!("{json} is not a valid key")))
}

/// Prints a record as pretty JSON.
pub fn print_record(record: &Value) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(record)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_parse_from_json() {
        assert_eq!(parse_key("\"1\"").unwrap(), Key::from("1"));
        assert_eq!(parse_key("7").unwrap(), Key::from(7));
        assert_eq!(
            parse_key("[1, \"a\"]").unwrap(),
            Key::Array(vec![Key::from(1), Key::from("a")])
        );
    }

    #[test]
    fn non_keys_are_rejected() {
        assert!(matches!(parse_key("null"), Err(CliError::Usage(_))));
        assert!(matches!(parse_key("{\"a\": 1}"), Err(CliError::Usage(_))));
        assert!(matches!(parse_key("not json"), Err(CliError::Json(_))));
    }

    #[test]
    fn records_parse_in_field_order() {
        let record = parse_value(r#"{"id": "1", "name": "Ana"}"#).unwrap();
        let fields: Vec<_> = record
            .as_map()
            .unwrap()
            .iter()
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(fields, ["id", "name"]);
    }

    #[test]
    fn flags_override_the_environment() {
        let target = Target {
            path: Some(PathBuf::from("/tmp/docshelf-cli")),
            name: Some("books".into()),
            version: Some(3),
        };
        let config = target.config().unwrap();
        assert_eq!(config.name, "books");
        assert_eq!(config.version, 3);
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/docshelf-cli")));
    }
}
