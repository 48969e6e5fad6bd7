//! Database handle: owns the ports and the database-level read preference.

use std::sync::Arc;

use commands::{
    CollectionName, CollectionResolver, CommandExecutor, DatabaseName, ReadPreference,
    RemoteEvaluator,
};

use crate::Collection;

/// A database on the server, reachable through the injected ports.
///
/// Cloning is cheap: the ports are shared behind [`Arc`]s.
#[derive(Clone)]
pub struct Database {
    name: DatabaseName,
    read_preference: Option<ReadPreference>,
    executor: Arc<dyn CommandExecutor>,
    evaluator: Arc<dyn RemoteEvaluator>,
}

impl Database {
    pub fn new(
        name: DatabaseName,
        executor: Arc<dyn CommandExecutor>,
        evaluator: Arc<dyn RemoteEvaluator>,
    ) -> Self {
        Self {
            name,
            read_preference: None,
            executor,
            evaluator,
        }
    }

    /// Sets the database-level default read preference.
    pub fn with_read_preference(mut self, read_preference: ReadPreference) -> Self {
        self.read_preference = Some(read_preference);
        self
    }

    pub fn name(&self) -> &DatabaseName {
        &self.name
    }

    pub fn read_preference(&self) -> Option<ReadPreference> {
        self.read_preference
    }

    /// Returns a handle to a collection in this database.
    pub fn collection(&self, name: CollectionName) -> Collection {
        Collection::new(self.clone(), name)
    }

    /// Returns a handle to another database reached through the same ports.
    ///
    /// The database-level read preference carries over.
    pub fn sibling(&self, name: DatabaseName) -> Database {
        Database {
            name,
            ..self.clone()
        }
    }

    pub(crate) fn executor(&self) -> &dyn CommandExecutor {
        self.executor.as_ref()
    }

    pub(crate) fn evaluator(&self) -> &dyn RemoteEvaluator {
        self.evaluator.as_ref()
    }
}

impl CollectionResolver for Database {
    type Handle = Collection;

    fn resolve(&self, database: &DatabaseName, collection: &CollectionName) -> Collection {
        if *database == self.name {
            self.collection(collection.clone())
        } else {
            self.sibling(database.clone()).collection(collection.clone())
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("read_preference", &self.read_preference)
            .finish_non_exhaustive()
    }
}
