//! Reading protocol lines
//!
//! Connector output is newline-delimited JSON mixed with arbitrary log text.
//! The envelope readers look only at the fields they need using the partial
//! scanner; full deserialization happens once a line is known to be a
//! protocol message.

use std::borrow::Cow;

use tracing::{debug, warn};

use super::factory::MessageMigrator;
use super::models::{AirbyteMessage, ConfiguredAirbyteCatalog, MessageType};
use super::versioned::VersionedMessage;
use crate::error::{ParseResult, Result};
use crate::json::{JsonScanner, ObjectFields};
use crate::migration::VersionedMessageMigrator;
use crate::version::ProtocolVersion;

/// A raw line and its `type`, read without materialising the payload
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEnvelope<'a> {
    raw: &'a str,
    type_name: Option<Cow<'a, str>>,
}

impl<'a> MessageEnvelope<'a> {
    /// Read the `type` of a message line, stopping as soon as it is found
    pub fn read(line: &'a str) -> ParseResult<Self> {
        let fields = ObjectFields::new().field(
            "type",
            |type_name: &mut Option<Cow<'a, str>>, scanner: &mut JsonScanner<'a>| {
                *type_name = Some(scanner.read_string_value()?);
                Ok(())
            },
        );
        let type_name = JsonScanner::new(line).read_object(|| None, &fields, true)?.flatten();
        Ok(Self {
            raw: line,
            type_name,
        })
    }

    pub fn raw(&self) -> &'a str {
        self.raw
    }

    /// The declared `type`, exactly as written
    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    /// The declared `type`, if it names a known message type
    pub fn message_type(&self) -> Option<MessageType> {
        self.type_name().and_then(MessageType::from_wire)
    }
}

#[derive(Default)]
struct SpecProbe<'a> {
    type_name: Option<Cow<'a, str>>,
    protocol_version: Option<Cow<'a, str>>,
}

/// The protocol version a SPEC line declares.
///
/// Reads `type` and `spec.protocol_version` only. Returns `None` for other
/// message types, for a SPEC without a version, and for an unparsable
/// version string.
pub fn detect_protocol_version<'a>(line: &'a str) -> ParseResult<Option<ProtocolVersion>> {
    let spec_fields = ObjectFields::new().field(
        "protocol_version",
        |version: &mut Option<Cow<'a, str>>, scanner: &mut JsonScanner<'a>| {
            *version = Some(scanner.read_string_value()?);
            Ok(())
        },
    );
    let fields = ObjectFields::new()
        .field("type", |probe: &mut SpecProbe<'a>, scanner: &mut JsonScanner<'a>| {
            probe.type_name = Some(scanner.read_string_value()?);
            Ok(())
        })
        .field("spec", |probe: &mut SpecProbe<'a>, scanner: &mut JsonScanner<'a>| {
            // `spec` is read to its end so the outer object can continue
            probe.protocol_version = scanner.read_object(|| None, &spec_fields, false)?.flatten();
            Ok(())
        });

    let Some(probe) = JsonScanner::new(line).read_object(SpecProbe::default, &fields, true)? else {
        return Ok(None);
    };
    if probe.type_name.as_deref() != Some(MessageType::Spec.as_str()) {
        return Ok(None);
    }
    let Some(declared) = probe.protocol_version else {
        return Ok(None);
    };
    match ProtocolVersion::parse(&declared) {
        Ok(version) => Ok(Some(version)),
        Err(e) => {
            warn!(version = %declared, error = %e, "Ignoring unparsable protocol version");
            Ok(None)
        }
    }
}

/// First protocol version declared within the first `limit` lines.
///
/// Lines that are not JSON objects are skipped.
pub fn detect_from_lines<'l, I>(lines: I, limit: usize) -> Option<ProtocolVersion>
where
    I: IntoIterator<Item = &'l str>,
{
    for line in lines.into_iter().take(limit) {
        if !looks_like_object(line) {
            continue;
        }
        match detect_protocol_version(line) {
            Ok(Some(version)) => return Some(version),
            Ok(None) => {}
            Err(e) => debug!(error = %e, "Skipping malformed line during version detection"),
        }
    }
    None
}

fn looks_like_object(line: &str) -> bool {
    line.trim_start().starts_with('{')
}

/// Reads a connector's output and upgrades it to the most recent version
pub struct MessageReader {
    migrator: VersionedMessageMigrator<VersionedMessage, ConfiguredAirbyteCatalog>,
}

impl std::fmt::Debug for MessageReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageReader")
            .field("version", self.version())
            .finish_non_exhaustive()
    }
}

impl MessageReader {
    pub fn new(registry: std::sync::Arc<MessageMigrator>, version: ProtocolVersion) -> Self {
        Self {
            migrator: VersionedMessageMigrator::new(registry, version),
        }
    }

    /// Version the connector speaks
    pub fn version(&self) -> &ProtocolVersion {
        self.migrator.version()
    }

    /// Parse and upgrade one line.
    ///
    /// Returns `Ok(None)` for lines that are not protocol messages: log text,
    /// malformed JSON and objects without a known `type`.
    pub fn read_line(
        &self,
        line: &str,
        catalog: Option<&ConfiguredAirbyteCatalog>,
    ) -> Result<Option<AirbyteMessage>> {
        if !looks_like_object(line) {
            debug!(line, "Skipping non-JSON line");
            return Ok(None);
        }
        match MessageEnvelope::read(line) {
            Ok(envelope) if envelope.message_type().is_some() => {}
            Ok(envelope) => {
                debug!(
                    message_type = ?envelope.type_name(),
                    "Skipping line without a known message type"
                );
                return Ok(None);
            }
            Err(e) => {
                debug!(error = %e, "Skipping malformed line");
                return Ok(None);
            }
        }
        let message = VersionedMessage::parse(line, self.version())?;
        let upgraded = self.migrator.upgrade(message, catalog)?;
        Ok(Some(upgraded.into_message()))
    }
}
