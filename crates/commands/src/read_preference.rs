//! Read-Preference Resolver.
//!
//! The effective read preference of an operation comes from, in order:
//!
//! 1. a truthy `readPreference` entry in the operation's options;
//! 2. the owning collection's configured default;
//! 3. the owning database's configured default;
//! 4. [`ReadPreference::Primary`].
//!
//! [`ReadPreference::Primary`] and [`ReadPreference::Disabled`] (the boolean
//! `false` form) both mean "no override" for everything downstream.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{AggregationError, Document, Result, Value};

/// Option name carrying a per-operation read preference.
pub const READ_PREFERENCE_OPTION: &str = "readPreference";

/// Which members of a replica set may serve a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReadPreference {
    #[default]
    Primary,
    PrimaryPreferred,
    Secondary,
    SecondaryPreferred,
    Nearest,
    /// The boolean `false` form: reads are not routed by preference at all.
    Disabled,
}

impl ReadPreference {
    /// Parses a mode name (`"primary"`, `"secondaryPreferred"`, ...).
    ///
    /// Matching is case-insensitive.
    pub fn from_mode(mode: &str) -> Option<Self> {
        let parsed = match mode.to_ascii_lowercase().as_str() {
            "primary" => Self::Primary,
            "primarypreferred" => Self::PrimaryPreferred,
            "secondary" => Self::Secondary,
            "secondarypreferred" => Self::SecondaryPreferred,
            "nearest" => Self::Nearest,
            _ => return None,
        };
        Some(parsed)
    }

    /// Parses an option value: a mode name, a `{mode: ...}` document, or `false`.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(false) => Ok(Self::Disabled),
            Value::String(mode) => Self::from_mode(mode).ok_or_else(|| {
                AggregationError::configuration(format!("unknown read preference mode '{mode}'"))
            }),
            Value::Document(doc) => match doc.get("mode") {
                Some(mode) => Self::from_value(mode),
                None => Err(AggregationError::configuration(
                    "read preference document has no 'mode' field",
                )),
            },
            other => Err(AggregationError::configuration(format!(
                "unsupported read preference value {}",
                other.to_json()
            ))),
        }
    }

    /// Mode name as sent to the server; `None` for [`ReadPreference::Disabled`].
    pub fn mode(self) -> Option<&'static str> {
        match self {
            Self::Primary => Some("primary"),
            Self::PrimaryPreferred => Some("primaryPreferred"),
            Self::Secondary => Some("secondary"),
            Self::SecondaryPreferred => Some("secondaryPreferred"),
            Self::Nearest => Some("nearest"),
            Self::Disabled => None,
        }
    }

    /// Returns `true` unless this is `Primary` or `Disabled`.
    pub fn is_override(self) -> bool {
        !matches!(self, Self::Primary | Self::Disabled)
    }

    /// Value form used when the preference is merged into an options mapping.
    pub fn to_value(self) -> Value {
        match self.mode() {
            Some(mode) => Value::from(mode),
            None => Value::Bool(false),
        }
    }
}

impl std::fmt::Display for ReadPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mode().unwrap_or("false"))
    }
}

impl Serialize for ReadPreference {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.mode() {
            Some(mode) => serializer.serialize_str(mode),
            None => serializer.serialize_bool(false),
        }
    }
}

impl<'de> Deserialize<'de> for ReadPreference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Mode(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Flag(false) => Ok(Self::Disabled),
            Raw::Flag(true) => Err(serde::de::Error::custom(
                "read preference 'true' is not a mode; use a mode name or false",
            )),
            Raw::Mode(mode) => Self::from_mode(&mode)
                .ok_or_else(|| serde::de::Error::custom(format!("unknown read preference mode '{mode}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Read preferences inherited from the owning collection and database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadPreferenceDefaults {
    pub collection: Option<ReadPreference>,
    pub database: Option<ReadPreference>,
}

impl ReadPreferenceDefaults {
    pub fn new(collection: Option<ReadPreference>, database: Option<ReadPreference>) -> Self {
        Self {
            collection,
            database,
        }
    }

    /// Resolves the effective read preference for one operation.
    ///
    /// A falsy `readPreference` option counts as absent, so an explicit `false`
    /// in the options falls back to the inherited default.
    pub fn resolve(&self, options: &Document) -> Result<ReadPreference> {
        match options.get(READ_PREFERENCE_OPTION) {
            Some(value) if value.is_truthy() => ReadPreference::from_value(value),
            _ => Ok(self
                .collection
                .or(self.database)
                .unwrap_or(ReadPreference::Primary)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options_with(value: impl Into<Value>) -> Document {
        let mut options = Document::new();
        options.insert(READ_PREFERENCE_OPTION, value);
        options
    }

    #[test]
    fn explicit_option_wins() {
        let defaults = ReadPreferenceDefaults::new(Some(ReadPreference::Nearest), None);
        let resolved = defaults.resolve(&options_with("secondary")).unwrap();
        assert_eq!(resolved, ReadPreference::Secondary);
    }

    #[test]
    fn collection_default_wins_over_database_default() {
        let defaults = ReadPreferenceDefaults::new(
            Some(ReadPreference::SecondaryPreferred),
            Some(ReadPreference::Nearest),
        );
        assert_eq!(
            defaults.resolve(&Document::new()).unwrap(),
            ReadPreference::SecondaryPreferred
        );

        let defaults = ReadPreferenceDefaults::new(None, Some(ReadPreference::Nearest));
        assert_eq!(defaults.resolve(&Document::new()).unwrap(), ReadPreference::Nearest);
    }

    #[test]
    fn falls_back_to_primary() {
        let resolved = ReadPreferenceDefaults::default()
            .resolve(&Document::new())
            .unwrap();
        assert_eq!(resolved, ReadPreference::Primary);
        assert!(!resolved.is_override());
    }

    #[test]
    fn false_option_counts_as_absent() {
        let defaults = ReadPreferenceDefaults::new(None, Some(ReadPreference::Disabled));
        let resolved = defaults.resolve(&options_with(false)).unwrap();
        assert_eq!(resolved, ReadPreference::Disabled);
        assert!(!resolved.is_override());
    }

    #[test]
    fn mode_documents_are_accepted() {
        let mut mode = Document::new();
        mode.insert("mode", "primaryPreferred");
        assert_eq!(
            ReadPreference::from_value(&Value::Document(mode)).unwrap(),
            ReadPreference::PrimaryPreferred
        );
    }

    #[test]
    fn unknown_modes_are_configuration_errors() {
        let err = ReadPreferenceDefaults::default()
            .resolve(&options_with("fastest"))
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn deserializes_from_mode_names_and_false() {
        let pref: ReadPreference = serde_json::from_str("\"secondaryPreferred\"").unwrap();
        assert_eq!(pref, ReadPreference::SecondaryPreferred);
        let pref: ReadPreference = serde_json::from_str("false").unwrap();
        assert_eq!(pref, ReadPreference::Disabled);
        assert!(serde_json::from_str::<ReadPreference>("true").is_err());
    }
}
