//! `aggcmd` configuration file.
//!
//! ```text
//! {
//!   "database": "reports",
//!   "collection": "orders",
//!   "readPreference": "secondaryPreferred",
//!   "collectionReadPreference": false
//! }
//! ```
//!
//! Every field is optional. `readPreference` is the database-level default
//! and `collectionReadPreference` the collection-level one; both accept a mode
//! name or `false`.

use std::path::Path;

use anyhow::{Context, Result};
use commands::{CollectionName, DatabaseName, ReadPreference};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CliConfig {
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub read_preference: Option<ReadPreference>,
    #[serde(default)]
    pub collection_read_preference: Option<ReadPreference>,
}

fn default_database() -> String {
    "test".to_owned()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            collection: None,
            read_preference: None,
            collection_read_preference: None,
        }
    }
}

impl CliConfig {
    /// Loads the configuration file, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn database_name(&self) -> Result<DatabaseName> {
        DatabaseName::new(self.database.as_str()).context("database name must not be empty")
    }

    /// Collection name from the command line, falling back to the config file.
    pub fn collection_name(&self, flag: Option<&str>) -> Result<CollectionName> {
        flag.or(self.collection.as_deref())
            .and_then(CollectionName::new)
            .context("no collection given; pass --collection or set \"collection\" in the config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_fields() {
        let config: CliConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, CliConfig::default());
        assert_eq!(config.database_name().unwrap().as_str(), "test");
    }

    #[test]
    fn read_preferences_parse() {
        let config: CliConfig = serde_json::from_str(
            r#"{ "collection": "orders", "readPreference": "nearest", "collectionReadPreference": false }"#,
        )
        .unwrap();
        assert_eq!(config.read_preference, Some(ReadPreference::Nearest));
        assert_eq!(config.collection_read_preference, Some(ReadPreference::Disabled));
    }

    #[test]
    fn collection_flag_overrides_config() {
        let config: CliConfig = serde_json::from_str(r#"{ "collection": "orders" }"#).unwrap();
        assert_eq!(config.collection_name(Some("events")).unwrap().as_str(), "events");
        assert_eq!(config.collection_name(None).unwrap().as_str(), "orders");
        assert!(CliConfig::default().collection_name(None).is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(serde_json::from_str::<CliConfig>(r#"{ "databse": "x" }"#).is_err());
    }
}
