//! Wire models shared by every protocol version
//!
//! Only the parts touched by migrations are typed; every other sub-message
//! and every unknown stream field is carried through as raw JSON.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kind of a protocol message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Record,
    State,
    Log,
    Spec,
    ConnectionStatus,
    Catalog,
    Trace,
    Control,
}

impl MessageType {
    pub const ALL: [MessageType; 8] = [
        MessageType::Record,
        MessageType::State,
        MessageType::Log,
        MessageType::Spec,
        MessageType::ConnectionStatus,
        MessageType::Catalog,
        MessageType::Trace,
        MessageType::Control,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Record => "RECORD",
            MessageType::State => "STATE",
            MessageType::Log => "LOG",
            MessageType::Spec => "SPEC",
            MessageType::ConnectionStatus => "CONNECTION_STATUS",
            MessageType::Catalog => "CATALOG",
            MessageType::Trace => "TRACE",
            MessageType::Control => "CONTROL",
        }
    }

    /// Parse the value of a message's `type` field
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

/// One line of the protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirbyteMessage {
    #[serde(rename = "type")]
    pub message_type: MessageType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<RecordMessage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<AirbyteCatalog>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control: Option<Value>,

    #[serde(
        rename = "connectionStatus",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub connection_status: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AirbyteMessage {
    /// A message of the given type with no payload
    pub fn new(message_type: MessageType) -> Self {
        Self {
            message_type,
            record: None,
            catalog: None,
            spec: None,
            state: None,
            log: None,
            trace: None,
            control: None,
            connection_status: None,
            extra: Map::new(),
        }
    }

    pub fn record(record: RecordMessage) -> Self {
        Self {
            record: Some(record),
            ..Self::new(MessageType::Record)
        }
    }

    pub fn catalog(catalog: AirbyteCatalog) -> Self {
        Self {
            catalog: Some(catalog),
            ..Self::new(MessageType::Catalog)
        }
    }
}

/// A row of data emitted for one stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMessage {
    #[serde(default)]
    pub stream: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default)]
    pub data: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emitted_at: Option<i64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RecordMessage {
    pub fn new(stream: impl Into<String>, namespace: Option<String>, data: Value) -> Self {
        Self {
            stream: stream.into(),
            namespace,
            data,
            emitted_at: None,
            extra: Map::new(),
        }
    }
}

/// Streams a source can produce
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AirbyteCatalog {
    #[serde(default)]
    pub streams: Vec<AirbyteStream>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AirbyteStream {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// JSON-Schema of the stream's records
    #[serde(default)]
    pub json_schema: Value,

    /// Sync modes, cursor and key declarations
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AirbyteStream {
    pub fn new(name: impl Into<String>, namespace: Option<String>, json_schema: Value) -> Self {
        Self {
            name: name.into(),
            namespace,
            json_schema,
            extra: Map::new(),
        }
    }

    /// Whether a record for `(stream, namespace)` belongs to this stream
    pub fn describes(&self, stream: &str, namespace: Option<&str>) -> bool {
        self.name == stream && self.namespace.as_deref() == namespace
    }
}

/// Streams selected for a sync
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfiguredAirbyteCatalog {
    #[serde(default)]
    pub streams: Vec<ConfiguredAirbyteStream>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConfiguredAirbyteCatalog {
    /// The stream a record belongs to
    pub fn find_stream(&self, stream: &str, namespace: Option<&str>) -> Option<&AirbyteStream> {
        self.streams
            .iter()
            .map(|configured| &configured.stream)
            .find(|candidate| candidate.describes(stream, namespace))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfiguredAirbyteStream {
    pub stream: AirbyteStream,

    /// Sync and destination modes, cursor field, primary key
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConfiguredAirbyteStream {
    pub fn new(stream: AirbyteStream) -> Self {
        Self {
            stream,
            extra: Map::new(),
        }
    }
}
