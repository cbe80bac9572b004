//! Versioned migrations
//!
//! A [`Migration`] converts one concrete message type into the next major
//! version's type and back. Registries store migrations over a tagged union
//! `M` of all versions; [`VariantOf`] is the checked conversion between a
//! concrete version type and that union.

pub mod registry;
pub mod serializer;

pub use registry::MigrationRegistry;
pub use serializer::{VersionedMessageMigrator, VersionedSerializer};

use crate::error::{MigrationError, Result};
use crate::version::ProtocolVersion;

/// A concrete version type carried by the tagged union `M`
pub trait VariantOf<M>: Sized {
    fn into_versioned(self) -> M;

    /// Unwrap the matching variant, handing the message back otherwise
    fn from_versioned(message: M) -> std::result::Result<Self, M>;
}

/// Tagged unions report which major version they currently hold
pub trait Versioned {
    fn major_key(&self) -> String;
}

/// Conversion between two adjacent major versions.
///
/// `Context` carries optional side information, e.g. the configured catalog
/// needed to interpret record data. Migrations that need none use `()`.
pub trait Migration: Send + Sync {
    type Old;
    type New;
    type Context;

    fn previous_version(&self) -> &ProtocolVersion;

    fn current_version(&self) -> &ProtocolVersion;

    fn upgrade(&self, message: Self::Old, context: Option<&Self::Context>) -> Result<Self::New>;

    fn downgrade(&self, message: Self::New, context: Option<&Self::Context>) -> Result<Self::Old>;
}

/// A migration seen through the tagged union, as stored by the registry
pub(crate) trait ErasedMigration<M, C>: Send + Sync {
    fn upgrade_versioned(&self, message: M, context: Option<&C>) -> Result<M>;

    fn downgrade_versioned(&self, message: M, context: Option<&C>) -> Result<M>;
}

impl<T, M, C> ErasedMigration<M, C> for T
where
    T: Migration<Context = C>,
    T::Old: VariantOf<M>,
    T::New: VariantOf<M>,
    M: Versioned,
{
    fn upgrade_versioned(&self, message: M, context: Option<&C>) -> Result<M> {
        let old = T::Old::from_versioned(message).map_err(|found| MigrationError::VariantMismatch {
            expected: Migration::previous_version(self).major_key(),
            found: found.major_key(),
        })?;
        Ok(Migration::upgrade(self, old, context)?.into_versioned())
    }

    fn downgrade_versioned(&self, message: M, context: Option<&C>) -> Result<M> {
        let new = T::New::from_versioned(message).map_err(|found| MigrationError::VariantMismatch {
            expected: Migration::current_version(self).major_key(),
            found: found.major_key(),
        })?;
        Ok(Migration::downgrade(self, new, context)?.into_versioned())
    }
}
