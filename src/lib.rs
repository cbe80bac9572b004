//! Protocol Compatibility Layer
//!
//! Upgrades and downgrades newline-delimited JSON protocol messages and
//! configured catalogs between major protocol versions.
//!
//! ## Features
//!
//! - **Partial JSON Scanning**: read selected fields of a line without building the whole tree
//! - **Migration Chains**: append-only registry keyed by major version, folded in either direction
//! - **Schema-Directed Rewriting**: migrate JSON-Schema documents and the records they describe
//! - **Typed Versions**: each protocol major is its own Rust type
//!
//! ## Architecture
//!
//! ```text
//! connector stdout ──► MessageEnvelope (type only)
//!                        │
//!                        ▼
//!                  VersionedMessage::V0 ──► MigrationRegistry ──► VersionedMessage::V1
//!                                              │
//!                                              ▼
//!                                 mutate_schemas / mutate_data_node
//! ```

pub mod config;
pub mod error;
pub mod json;
pub mod migration;
pub mod protocol;
pub mod schema;
pub mod version;

pub use config::{CompatConfig, OutputFormat};
pub use error::{MigrationError, ParseError, ParseResult, Result};
pub use json::{extract_fields, Cursor, JsonNumber, JsonScanner, ObjectFields};
pub use migration::{
    Migration, MigrationRegistry, VariantOf, Versioned, VersionedMessageMigrator,
    VersionedSerializer,
};
pub use protocol::{MigratorFactory, VersionedCatalog, VersionedMessage};
pub use schema::{mutate_data_node, mutate_schemas, MigratedNode, WellKnownType};
pub use version::{ProtocolVersion, ProtocolVersionRange, DEFAULT_PROTOCOL_VERSION, V0, V1};
