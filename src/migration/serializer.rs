//! Fixed-version views over a registry

use std::sync::Arc;

use serde::Serialize;

use super::{MigrationRegistry, Versioned};
use crate::config::OutputFormat;
use crate::error::Result;
use crate::version::ProtocolVersion;

/// Writes documents for a consumer speaking one protocol version.
///
/// `serialize` downgrades the most-recent document to the captured target
/// version, then renders it as JSON.
pub struct VersionedSerializer<M> {
    registry: Arc<MigrationRegistry<M>>,
    target: ProtocolVersion,
    format: OutputFormat,
}

impl<M: Versioned + Serialize> VersionedSerializer<M> {
    pub fn new(registry: Arc<MigrationRegistry<M>>, target: ProtocolVersion) -> Self {
        Self {
            registry,
            target,
            format: OutputFormat::default(),
        }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn target_version(&self) -> &ProtocolVersion {
        &self.target
    }

    pub fn serialize(&self, document: M) -> Result<String> {
        let downgraded = self.registry.downgrade(document, &self.target, None)?;
        Ok(self.format.render(&downgraded)?)
    }
}

/// Upgrades and downgrades messages exchanged with one connector
pub struct VersionedMessageMigrator<M, C> {
    registry: Arc<MigrationRegistry<M, C>>,
    version: ProtocolVersion,
}

impl<M: Versioned, C> VersionedMessageMigrator<M, C> {
    pub fn new(registry: Arc<MigrationRegistry<M, C>>, version: ProtocolVersion) -> Self {
        Self { registry, version }
    }

    /// Protocol version spoken by the connector
    pub fn version(&self) -> &ProtocolVersion {
        &self.version
    }

    pub fn most_recent_version(&self) -> &ProtocolVersion {
        self.registry.most_recent_version()
    }

    /// Connector message to the most recent version
    pub fn upgrade(&self, message: M, context: Option<&C>) -> Result<M> {
        self.registry.upgrade(message, &self.version, context)
    }

    /// Most recent message to the connector's version
    pub fn downgrade(&self, message: M, context: Option<&C>) -> Result<M> {
        self.registry.downgrade(message, &self.version, context)
    }

    /// Downgrade a message and render it as one line for the connector
    pub fn serialize_message(&self, message: M, context: Option<&C>) -> Result<String>
    where
        M: Serialize,
    {
        let downgraded = self.downgrade(message, context)?;
        Ok(serde_json::to_string(&downgraded)?)
    }
}

impl<M, C> Clone for VersionedMessageMigrator<M, C> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            version: self.version.clone(),
        }
    }
}
