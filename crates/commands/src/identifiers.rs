//! Newtype identifiers.
//!
//! Database and collection names are distinct newtypes even though both wrap a
//! `String`; a collection name can never be passed where a database name is
//! expected. Both reject the empty string at construction time.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed
// ---------------------------------------------------------------------------

string_id! {
    /// Name of a database on the server.
    ///
    /// Output collections of a map/reduce job may live in a database other than
    /// the one that owns the source collection.
    DatabaseName
}

string_id! {
    /// Name of a collection within a database.
    ///
    /// Written into command documents as the value of the kind field
    /// (`mapreduce`, `aggregate`) or the `ns` field (`group`).
    CollectionName
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single operation call (one map/reduce, group or aggregate).
///
/// Generated fresh for every call and recorded on its tracing span so that the
/// submission and interpretation events of one call can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId(Uuid);

impl OperationId {
    /// Generates a new random operation identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_names_are_rejected() {
        assert!(DatabaseName::new("").is_none());
        assert!(CollectionName::new(String::new()).is_none());
    }

    #[test]
    fn names_display_their_text() {
        let name = CollectionName::new("orders").unwrap();
        assert_eq!(name.as_str(), "orders");
        assert_eq!(name.to_string(), "orders");
    }

    #[test]
    fn operation_ids_are_unique() {
        assert_ne!(OperationId::new_random(), OperationId::new_random());
    }
}
