//! Registry wiring
//!
//! Builds the message and catalog registries once and hands out
//! fixed-version migrators that share them.

use std::sync::Arc;

use tracing::debug;

use super::envelope::MessageReader;
use super::models::ConfiguredAirbyteCatalog;
use super::v1::{ConfiguredCatalogMigrationV1, MessageMigrationV1};
use super::versioned::{VersionedCatalog, VersionedMessage};
use crate::config::{CompatConfig, OutputFormat};
use crate::error::{MigrationError, Result};
use crate::migration::{MigrationRegistry, VersionedMessageMigrator, VersionedSerializer};
use crate::version::{ProtocolVersion, ProtocolVersionRange};

/// Migrates protocol messages; records need the sync's configured catalog
pub type MessageMigrator = MigrationRegistry<VersionedMessage, ConfiguredAirbyteCatalog>;

/// Migrates configured catalogs
pub type CatalogMigrator = MigrationRegistry<VersionedCatalog>;

/// Entry point for obtaining migrators bound to a connector's version
#[derive(Debug, Clone)]
pub struct MigratorFactory {
    messages: Arc<MessageMigrator>,
    catalogs: Arc<CatalogMigrator>,
    supported: ProtocolVersionRange,
    format: OutputFormat,
}

impl MigratorFactory {
    /// Register every known migration and accept every version they cover
    pub fn new() -> Result<Self> {
        let mut messages = MessageMigrator::new();
        messages.register(MessageMigrationV1::new())?;

        let mut catalogs = CatalogMigrator::new();
        catalogs.register(ConfiguredCatalogMigrationV1::new())?;

        let supported = ProtocolVersionRange::new(
            ProtocolVersion::new(0, 0, 0),
            messages.most_recent_version().clone(),
        );
        Ok(Self {
            messages: Arc::new(messages),
            catalogs: Arc::new(catalogs),
            supported,
            format: OutputFormat::default(),
        })
    }

    /// Like [`new`](Self::new), narrowed to the configured version range
    pub fn from_config(config: &CompatConfig) -> Result<Self> {
        let mut factory = Self::new()?;
        factory.supported = config.supported_range()?;
        factory.format = config.output.format;
        Ok(factory)
    }

    pub fn most_recent_version(&self) -> &ProtocolVersion {
        self.messages.most_recent_version()
    }

    pub fn supported_range(&self) -> &ProtocolVersionRange {
        &self.supported
    }

    pub fn message_registry(&self) -> &Arc<MessageMigrator> {
        &self.messages
    }

    pub fn catalog_registry(&self) -> &Arc<CatalogMigrator> {
        &self.catalogs
    }

    /// Migrator for messages exchanged with a connector speaking `version`
    pub fn message_migrator(
        &self,
        version: &ProtocolVersion,
    ) -> Result<VersionedMessageMigrator<VersionedMessage, ConfiguredAirbyteCatalog>> {
        self.check_supported(version, self.messages.supports(version))?;
        Ok(VersionedMessageMigrator::new(Arc::clone(&self.messages), version.clone()))
    }

    /// Serializer writing configured catalogs for a connector speaking `version`
    pub fn catalog_serializer(
        &self,
        version: &ProtocolVersion,
    ) -> Result<VersionedSerializer<VersionedCatalog>> {
        self.check_supported(version, self.catalogs.supports(version))?;
        let serializer = VersionedSerializer::new(Arc::clone(&self.catalogs), version.clone());
        Ok(serializer.with_format(self.format))
    }

    /// Reader upgrading the output of a connector speaking `version`
    pub fn message_reader(&self, version: &ProtocolVersion) -> Result<MessageReader> {
        self.check_supported(version, self.messages.supports(version))?;
        Ok(MessageReader::new(Arc::clone(&self.messages), version.clone()))
    }

    fn check_supported(&self, version: &ProtocolVersion, registered: bool) -> Result<()> {
        if registered && self.supported.is_supported(version) {
            return Ok(());
        }
        debug!(version = %version, supported = %self.supported, "Rejecting protocol version");
        Err(MigrationError::UnsupportedVersion {
            version: version.version_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::models::{AirbyteStream, ConfiguredAirbyteStream};
    use crate::protocol::versioned::ConfiguredCatalogV1;
    use crate::schema::WellKnownType;
    use crate::version::{DEFAULT_PROTOCOL_VERSION, V0, V1};
    use serde_json::json;

    #[test]
    fn test_factory_registration() {
        let factory = MigratorFactory::new().unwrap();
        assert_eq!(factory.most_recent_version(), &V1);
        assert!(factory.supported_range().is_supported(&DEFAULT_PROTOCOL_VERSION));
        assert_eq!(factory.message_registry().len(), 1);
        assert!(factory.message_migrator(&V0).is_ok());
        assert!(factory.message_migrator(&V1).is_ok());
        assert!(matches!(
            factory.message_migrator(&ProtocolVersion::new(2, 0, 0)),
            Err(MigrationError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn test_configured_range_narrows() {
        let mut config = CompatConfig::default();
        config.protocol.min_version = "1.0.0".to_string();
        let factory = MigratorFactory::from_config(&config).unwrap();
        assert!(factory.message_reader(&V0).is_err());
        assert!(factory.message_reader(&V1).is_ok());
    }

    #[test]
    fn test_catalog_serializer_downgrades() {
        let factory = MigratorFactory::new().unwrap();
        let catalog = ConfiguredAirbyteCatalog {
            streams: vec![ConfiguredAirbyteStream::new(AirbyteStream::new(
                "users",
                None,
                json!({"type": "object", "properties": {"id": WellKnownType::Integer.to_schema()}}),
            ))],
            ..Default::default()
        };
        let document = VersionedCatalog::V1(ConfiguredCatalogV1(catalog));

        let v0 = factory.catalog_serializer(&V0).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&v0.serialize(document.clone()).unwrap()).unwrap();
        assert_eq!(
            written["streams"][0]["stream"]["json_schema"]["properties"]["id"],
            json!({"type": "number", "airbyte_type": "integer"})
        );

        let v1 = factory.catalog_serializer(&V1).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&v1.serialize(document).unwrap()).unwrap();
        assert_eq!(
            written["streams"][0]["stream"]["json_schema"]["properties"]["id"],
            WellKnownType::Integer.to_schema()
        );
    }
}
