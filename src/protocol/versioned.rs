//! Per-version message and catalog types
//!
//! Each major version wraps the shared wire model in its own newtype, so a
//! migration's input and output types name the versions they convert
//! between. The unions are what the registries operate on.

use serde::{Deserialize, Serialize};

use super::models::{AirbyteMessage, ConfiguredAirbyteCatalog};
use crate::error::{MigrationError, Result};
use crate::migration::{VariantOf, Versioned};
use crate::version::{ProtocolVersion, V0, V1};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageV0(pub AirbyteMessage);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageV1(pub AirbyteMessage);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfiguredCatalogV0(pub ConfiguredAirbyteCatalog);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfiguredCatalogV1(pub ConfiguredAirbyteCatalog);

/// A message at any supported version; serializes as the bare message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VersionedMessage {
    V0(MessageV0),
    V1(MessageV1),
}

/// A configured catalog at any supported version
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VersionedCatalog {
    V0(ConfiguredCatalogV0),
    V1(ConfiguredCatalogV1),
}

impl VersionedMessage {
    /// Wrap a message declared at `version`
    pub fn new(message: AirbyteMessage, version: &ProtocolVersion) -> Result<Self> {
        match version.major() {
            0 => Ok(Self::V0(MessageV0(message))),
            1 => Ok(Self::V1(MessageV1(message))),
            _ => Err(MigrationError::UnsupportedVersion {
                version: version.version_string(),
            }),
        }
    }

    /// Deserialize one line declared at `version`
    pub fn parse(json: &str, version: &ProtocolVersion) -> Result<Self> {
        let message: AirbyteMessage = serde_json::from_str(json)?;
        Self::new(message, version)
    }

    pub fn version(&self) -> ProtocolVersion {
        match self {
            Self::V0(_) => V0,
            Self::V1(_) => V1,
        }
    }

    pub fn message(&self) -> &AirbyteMessage {
        match self {
            Self::V0(MessageV0(message)) | Self::V1(MessageV1(message)) => message,
        }
    }

    pub fn into_message(self) -> AirbyteMessage {
        match self {
            Self::V0(MessageV0(message)) | Self::V1(MessageV1(message)) => message,
        }
    }
}

impl VersionedCatalog {
    pub fn new(catalog: ConfiguredAirbyteCatalog, version: &ProtocolVersion) -> Result<Self> {
        match version.major() {
            0 => Ok(Self::V0(ConfiguredCatalogV0(catalog))),
            1 => Ok(Self::V1(ConfiguredCatalogV1(catalog))),
            _ => Err(MigrationError::UnsupportedVersion {
                version: version.version_string(),
            }),
        }
    }

    pub fn version(&self) -> ProtocolVersion {
        match self {
            Self::V0(_) => V0,
            Self::V1(_) => V1,
        }
    }

    pub fn catalog(&self) -> &ConfiguredAirbyteCatalog {
        match self {
            Self::V0(ConfiguredCatalogV0(catalog)) | Self::V1(ConfiguredCatalogV1(catalog)) => {
                catalog
            }
        }
    }

    pub fn into_catalog(self) -> ConfiguredAirbyteCatalog {
        match self {
            Self::V0(ConfiguredCatalogV0(catalog)) | Self::V1(ConfiguredCatalogV1(catalog)) => {
                catalog
            }
        }
    }
}

impl Versioned for VersionedMessage {
    fn major_key(&self) -> String {
        self.version().major_key()
    }
}

impl Versioned for VersionedCatalog {
    fn major_key(&self) -> String {
        self.version().major_key()
    }
}

macro_rules! variant_of {
    ($union:ident :: $variant:ident ( $newtype:ident )) => {
        impl VariantOf<$union> for $newtype {
            fn into_versioned(self) -> $union {
                $union::$variant(self)
            }

            fn from_versioned(message: $union) -> std::result::Result<Self, $union> {
                match message {
                    $union::$variant(inner) => Ok(inner),
                    other => Err(other),
                }
            }
        }
    };
}

variant_of!(VersionedMessage::V0(MessageV0));
variant_of!(VersionedMessage::V1(MessageV1));
variant_of!(VersionedCatalog::V0(ConfiguredCatalogV0));
variant_of!(VersionedCatalog::V1(ConfiguredCatalogV1));

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::models::MessageType;

    #[test]
    fn test_parse_by_declared_version() {
        let line = r#"{"type":"LOG","log":{"level":"INFO","message":"hi"}}"#;
        let v0 = VersionedMessage::parse(line, &ProtocolVersion::new(0, 2, 0)).unwrap();
        assert!(matches!(v0, VersionedMessage::V0(_)));
        assert_eq!(v0.major_key(), "0");
        let v1 = VersionedMessage::parse(line, &V1).unwrap();
        assert_eq!(v1.message().message_type, MessageType::Log);

        let err = VersionedMessage::parse(line, &ProtocolVersion::new(2, 0, 0)).unwrap_err();
        assert!(matches!(err, MigrationError::UnsupportedVersion { .. }));
    }

    #[test]
    fn test_serializes_as_bare_message() {
        let message = VersionedMessage::V1(MessageV1(AirbyteMessage::new(MessageType::State)));
        assert_eq!(serde_json::to_string(&message).unwrap(), r#"{"type":"STATE"}"#);
    }

    #[test]
    fn test_variant_of() {
        let message = VersionedMessage::V0(MessageV0(AirbyteMessage::new(MessageType::Trace)));
        let back = MessageV1::from_versioned(message.clone()).unwrap_err();
        assert_eq!(back, message);
        assert!(MessageV0::from_versioned(message).is_ok());
    }
}
