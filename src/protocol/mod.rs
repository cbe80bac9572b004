//! Versioned wire protocol
//!
//! Message models, the per-version unions, the v0/v1 migrations and the
//! readers that sit between connector output and the registries.

pub mod envelope;
pub mod factory;
pub mod models;
pub mod v1;
pub mod versioned;

pub use envelope::{detect_from_lines, detect_protocol_version, MessageEnvelope, MessageReader};
pub use factory::{CatalogMigrator, MessageMigrator, MigratorFactory};
pub use models::{
    AirbyteCatalog, AirbyteMessage, AirbyteStream, ConfiguredAirbyteCatalog,
    ConfiguredAirbyteStream,
    MessageType, RecordMessage,
};
pub use v1::{ConfiguredCatalogMigrationV1, MessageMigrationV1};
pub use versioned::{
    ConfiguredCatalogV0, ConfiguredCatalogV1, MessageV0, MessageV1, VersionedCatalog,
    VersionedMessage,
};
