//! Migration Registry
//!
//! Append-only, major-version keyed chain of migrations with chained
//! upgrade/downgrade.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, info, warn};

use super::{ErasedMigration, Migration, VariantOf, Versioned};
use crate::error::{MigrationError, Result};
use crate::version::ProtocolVersion;

/// Ordered collection of migrations over the tagged union `M`.
///
/// Each migration occupies the slot named by its previous version's major,
/// and slots are ordered by comparing those names as **strings**. Majors with
/// two or more digits therefore misorder (`"10" < "2"`); registering one logs
/// a warning.
///
/// Populate the registry once, then share it read-only.
pub struct MigrationRegistry<M, C = ()> {
    migrations: BTreeMap<String, Box<dyn ErasedMigration<M, C>>>,
    most_recent_version: ProtocolVersion,
}

impl<M: Versioned, C> MigrationRegistry<M, C> {
    pub fn new() -> Self {
        Self {
            migrations: BTreeMap::new(),
            most_recent_version: ProtocolVersion::new(0, 0, 0),
        }
    }

    /// Register a migration in the slot of its previous major version.
    ///
    /// Slots are immutable: a second migration for an occupied slot fails
    /// with [`MigrationError::DuplicateMigration`].
    pub fn register<T>(&mut self, migration: T) -> Result<()>
    where
        T: Migration<Context = C> + 'static,
        T::Old: VariantOf<M>,
        T::New: VariantOf<M>,
    {
        let key = migration.previous_version().major_key();
        if self.migrations.contains_key(&key) {
            return Err(MigrationError::DuplicateMigration { version: key });
        }
        if key.len() > 1 {
            warn!(
                major = %key,
                "Migration slots are ordered as strings; two-digit majors sort before single-digit ones"
            );
        }

        let current = migration.current_version().clone();
        info!(
            previous = %migration.previous_version(),
            current = %current,
            "Registered migration"
        );
        if current.major() > self.most_recent_version.major() {
            self.most_recent_version = current;
        }
        self.migrations.insert(key, Box::new(migration));
        Ok(())
    }

    /// Newest version any registered migration produces
    pub fn most_recent_version(&self) -> &ProtocolVersion {
        &self.most_recent_version
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Registered slots, in selection order
    pub fn slots(&self) -> impl Iterator<Item = &str> {
        self.migrations.keys().map(String::as_str)
    }

    /// Whether `version` is the most recent slot or has a migration path to it
    pub fn supports(&self, version: &ProtocolVersion) -> bool {
        version.same_slot(&self.most_recent_version)
            || self.migrations.contains_key(&version.major_key())
    }

    /// Bring `message`, declared at `source`, up to the most recent version.
    ///
    /// Messages already at the most recent major are returned untouched.
    pub fn upgrade(&self, message: M, source: &ProtocolVersion, context: Option<&C>) -> Result<M> {
        if source.same_slot(&self.most_recent_version) {
            return Ok(message);
        }
        self.chain_from(source)?
            .into_iter()
            .try_fold(message, |message, migration| {
                migration.upgrade_versioned(message, context)
            })
    }

    /// Take a most-recent `message` down to `target`.
    ///
    /// Applies the same chain as [`upgrade`](Self::upgrade) would from
    /// `target`, in reverse.
    pub fn downgrade(
        &self,
        message: M,
        target: &ProtocolVersion,
        context: Option<&C>,
    ) -> Result<M> {
        if target.same_slot(&self.most_recent_version) {
            return Ok(message);
        }
        self.chain_from(target)?
            .into_iter()
            .rev()
            .try_fold(message, |message, migration| {
                migration.downgrade_versioned(message, context)
            })
    }

    /// Migrations from the slot of `version` onwards.
    ///
    /// The chain must start exactly at that slot.
    fn chain_from(&self, version: &ProtocolVersion) -> Result<Vec<&dyn ErasedMigration<M, C>>> {
        let key = version.major_key();
        let unsupported = || MigrationError::UnsupportedVersion {
            version: version.version_string(),
        };
        if !self.migrations.contains_key(&key) {
            return Err(unsupported());
        }

        let chain: Vec<&dyn ErasedMigration<M, C>> = self
            .migrations
            .range(key.clone()..)
            .map(|(_, migration)| migration.as_ref())
            .collect();
        debug!(
            from = %key,
            to = %self.most_recent_version,
            steps = chain.len(),
            "Selected migration chain"
        );
        Ok(chain)
    }
}

impl<M: Versioned, C> Default for MigrationRegistry<M, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M, C> fmt::Debug for MigrationRegistry<M, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationRegistry")
            .field("slots", &self.migrations.keys().collect::<Vec<_>>())
            .field("most_recent_version", &self.most_recent_version)
            .finish()
    }
}
