//! Protocol v0 to v1
//!
//! v1 declares primitive columns by `$ref` into `WellKnownTypes.json` instead
//! of `type`/`format`/`airbyte_type`, and carries every number in record data
//! as its decimal text.

use serde_json::{Map, Value};
use tracing::debug;

use super::models::{AirbyteCatalog, AirbyteMessage, ConfiguredAirbyteCatalog, MessageType};
use super::versioned::{ConfiguredCatalogV0, ConfiguredCatalogV1, MessageV0, MessageV1};
use crate::error::Result;
use crate::migration::Migration;
use crate::schema::{mutate_data_node, mutate_schemas, MigratedNode, WellKnownType};
use crate::version::{ProtocolVersion, V0, V1};

const TYPE_KEY: &str = "type";
const ONE_OF_KEY: &str = "oneOf";
const FORMAT_KEY: &str = "format";
const AIRBYTE_TYPE_KEY: &str = "airbyte_type";
const CONTENT_ENCODING_KEY: &str = "contentEncoding";

const PRIMITIVE_TYPES: [&str; 4] = ["string", "number", "integer", "boolean"];
const ARRAY_KEYWORDS: [&str; 3] = ["items", "additionalItems", "contains"];
const OBJECT_KEYWORDS: [&str; 3] = ["properties", "patternProperties", "additionalProperties"];

/// Upgrades messages between connectors and the platform
#[derive(Debug, Clone)]
pub struct MessageMigrationV1 {
    previous: ProtocolVersion,
    current: ProtocolVersion,
}

impl MessageMigrationV1 {
    pub fn new() -> Self {
        Self {
            previous: V0,
            current: V1,
        }
    }
}

impl Default for MessageMigrationV1 {
    fn default() -> Self {
        Self::new()
    }
}

impl Migration for MessageMigrationV1 {
    type Old = MessageV0;
    type New = MessageV1;
    type Context = ConfiguredAirbyteCatalog;

    fn previous_version(&self) -> &ProtocolVersion {
        &self.previous
    }

    fn current_version(&self) -> &ProtocolVersion {
        &self.current
    }

    fn upgrade(
        &self,
        message: MessageV0,
        _: Option<&ConfiguredAirbyteCatalog>,
    ) -> Result<MessageV1> {
        let MessageV0(mut message) = message;
        match message.message_type {
            MessageType::Catalog => {
                if let Some(catalog) = message.catalog.as_mut() {
                    rewrite_catalog(catalog, upgrade_schema);
                }
            }
            MessageType::Record => {
                if let Some(record) = message.record.as_mut() {
                    record.data = upgrade_record(&record.data);
                }
            }
            _ => {}
        }
        Ok(MessageV1(message))
    }

    fn downgrade(
        &self,
        message: MessageV1,
        context: Option<&ConfiguredAirbyteCatalog>,
    ) -> Result<MessageV0> {
        let MessageV1(mut message) = message;
        match message.message_type {
            MessageType::Catalog => {
                if let Some(catalog) = message.catalog.as_mut() {
                    rewrite_catalog(catalog, downgrade_schema);
                }
            }
            MessageType::Record => downgrade_record_message(&mut message, context)?,
            _ => {}
        }
        Ok(MessageV0(message))
    }
}

/// Upgrades configured catalogs handed to connectors
#[derive(Debug, Clone)]
pub struct ConfiguredCatalogMigrationV1 {
    previous: ProtocolVersion,
    current: ProtocolVersion,
}

impl ConfiguredCatalogMigrationV1 {
    pub fn new() -> Self {
        Self {
            previous: V0,
            current: V1,
        }
    }
}

impl Default for ConfiguredCatalogMigrationV1 {
    fn default() -> Self {
        Self::new()
    }
}

impl Migration for ConfiguredCatalogMigrationV1 {
    type Old = ConfiguredCatalogV0;
    type New = ConfiguredCatalogV1;
    type Context = ();

    fn previous_version(&self) -> &ProtocolVersion {
        &self.previous
    }

    fn current_version(&self) -> &ProtocolVersion {
        &self.current
    }

    fn upgrade(&self, catalog: ConfiguredCatalogV0, _: Option<&()>) -> Result<ConfiguredCatalogV1> {
        let ConfiguredCatalogV0(mut catalog) = catalog;
        rewrite_configured_catalog(&mut catalog, upgrade_schema);
        Ok(ConfiguredCatalogV1(catalog))
    }

    fn downgrade(
        &self,
        catalog: ConfiguredCatalogV1,
        _: Option<&()>,
    ) -> Result<ConfiguredCatalogV0> {
        let ConfiguredCatalogV1(mut catalog) = catalog;
        rewrite_configured_catalog(&mut catalog, downgrade_schema);
        Ok(ConfiguredCatalogV0(catalog))
    }
}

fn rewrite_catalog(catalog: &mut AirbyteCatalog, rewrite: fn(&Value) -> Value) {
    for stream in &mut catalog.streams {
        stream.json_schema = rewrite(&stream.json_schema);
    }
}

fn rewrite_configured_catalog(
    catalog: &mut ConfiguredAirbyteCatalog,
    rewrite: fn(&Value) -> Value,
) {
    for configured in &mut catalog.streams {
        configured.stream.json_schema = rewrite(&configured.stream.json_schema);
    }
}

fn downgrade_record_message(
    message: &mut AirbyteMessage,
    catalog: Option<&ConfiguredAirbyteCatalog>,
) -> Result<()> {
    let Some(record) = message.record.as_mut() else {
        return Ok(());
    };
    let Some(catalog) = catalog else {
        debug!(stream = %record.stream, "No configured catalog, record passed through");
        return Ok(());
    };
    let Some(stream) = catalog.find_stream(&record.stream, record.namespace.as_deref()) else {
        debug!(
            stream = %record.stream,
            namespace = ?record.namespace,
            "Stream not in configured catalog, record passed through"
        );
        return Ok(());
    };
    record.data = downgrade_record(&record.data, &stream.json_schema)?;
    Ok(())
}

// Schemas

/// Rewrite v0 type declarations as well-known type references
pub fn upgrade_schema(schema: &Value) -> Value {
    mutate_schemas(&is_primitive_type_declaration, &upgrade_type_declaration, schema)
}

/// Rewrite well-known type references as v0 type declarations
pub fn downgrade_schema(schema: &Value) -> Value {
    mutate_schemas(&is_downgradable, &downgrade_declaration, schema)
}

/// `type` names at least one primitive type
fn is_primitive_type_declaration(schema: &Value) -> bool {
    match schema.get(TYPE_KEY) {
        Some(Value::String(declared)) => PRIMITIVE_TYPES.contains(&declared.as_str()),
        Some(Value::Array(declared)) => declared
            .iter()
            .filter_map(Value::as_str)
            .any(|declared| PRIMITIVE_TYPES.contains(&declared)),
        _ => false,
    }
}

fn upgrade_type_declaration(schema: &Value) -> Value {
    if let Some(known) = schema
        .get(AIRBYTE_TYPE_KEY)
        .and_then(Value::as_str)
        .and_then(legacy_airbyte_type)
    {
        return known.to_schema();
    }

    let types: Vec<&str> = match schema.get(TYPE_KEY) {
        Some(Value::String(declared)) => vec![declared.as_str()],
        Some(Value::Array(declared)) => declared
            .iter()
            .filter_map(Value::as_str)
            .filter(|declared| *declared != "null")
            .collect(),
        _ => Vec::new(),
    };

    if let [single] = types.as_slice() {
        return reference_for(single, schema);
    }

    let options = types
        .iter()
        .map(|declared| match *declared {
            "array" => upgrade_schema(&typed_option("array", schema, &ARRAY_KEYWORDS)),
            "object" => upgrade_schema(&typed_option("object", schema, &OBJECT_KEYWORDS)),
            primitive => reference_for(primitive, schema),
        })
        .collect();
    let mut upgraded = Map::new();
    upgraded.insert(ONE_OF_KEY.to_string(), Value::Array(options));
    Value::Object(upgraded)
}

/// `{"type": declared}` plus the keywords of `schema` that apply to it
fn typed_option(declared: &str, schema: &Value, keywords: &[&str]) -> Value {
    let mut option = Map::new();
    option.insert(TYPE_KEY.to_string(), Value::String(declared.to_string()));
    for keyword in keywords {
        if let Some(value) = schema.get(*keyword) {
            option.insert(keyword.to_string(), value.clone());
        }
    }
    Value::Object(option)
}

fn legacy_airbyte_type(airbyte_type: &str) -> Option<WellKnownType> {
    match airbyte_type {
        "integer" | "big_integer" => Some(WellKnownType::Integer),
        "number" | "big_number" => Some(WellKnownType::Number),
        "timestamp_with_timezone" => Some(WellKnownType::TimestampWithTimezone),
        "timestamp_without_timezone" => Some(WellKnownType::TimestampWithoutTimezone),
        "time_with_timezone" => Some(WellKnownType::TimeWithTimezone),
        "time_without_timezone" => Some(WellKnownType::TimeWithoutTimezone),
        _ => None,
    }
}

/// Reference schema for a single primitive `type`, refined by `format` and
/// `contentEncoding`. Unknown types are kept as a plain declaration.
fn reference_for(declared: &str, schema: &Value) -> Value {
    let known = match declared {
        "string" => match schema.get(FORMAT_KEY).and_then(Value::as_str) {
            Some("date") => WellKnownType::Date,
            Some("date-time") => WellKnownType::TimestampWithTimezone,
            Some("time") => WellKnownType::TimeWithTimezone,
            Some(_) => WellKnownType::String,
            None => match schema.get(CONTENT_ENCODING_KEY).and_then(Value::as_str) {
                Some("base64") => WellKnownType::BinaryData,
                _ => WellKnownType::String,
            },
        },
        "number" => WellKnownType::Number,
        "integer" => WellKnownType::Integer,
        "boolean" => WellKnownType::Boolean,
        other => return serde_json::json!({ TYPE_KEY: other }),
    };
    known.to_schema()
}

fn is_downgradable(schema: &Value) -> bool {
    WellKnownType::of_schema(schema).is_some() || schema.get(ONE_OF_KEY).is_some()
}

fn downgrade_declaration(schema: &Value) -> Value {
    if let Some(known) = WellKnownType::of_schema(schema) {
        return legacy_declaration(known);
    }
    let Some(Value::Array(options)) = schema.get(ONE_OF_KEY) else {
        return schema.clone();
    };
    let options: Vec<Value> = options.iter().map(downgrade_schema).collect();

    let Value::Object(node) = schema else {
        return schema.clone();
    };
    let mut rest = node.clone();
    rest.remove(ONE_OF_KEY);
    match merge_options(&rest, &options) {
        Some(merged) => Value::Object(merged),
        None => {
            rest.insert(ONE_OF_KEY.to_string(), Value::Array(options));
            Value::Object(rest)
        }
    }
}

/// Collapse `oneOf` options into one node with a `type` array.
///
/// Only possible when every option is an object declaring one string `type`,
/// no type repeats, and no other keyword is declared twice.
fn merge_options(rest: &Map<String, Value>, options: &[Value]) -> Option<Map<String, Value>> {
    if options.is_empty() || rest.contains_key(TYPE_KEY) {
        return None;
    }
    let mut merged = rest.clone();
    let mut types = Vec::with_capacity(options.len());
    for option in options {
        let Value::Object(option) = option else {
            return None;
        };
        let declared = option.get(TYPE_KEY).and_then(Value::as_str)?;
        if types.contains(&declared) {
            return None;
        }
        types.push(declared);
        for (key, value) in option.iter().filter(|(key, _)| key.as_str() != TYPE_KEY) {
            if merged.contains_key(key) {
                return None;
            }
            merged.insert(key.clone(), value.clone());
        }
    }
    let types = types.into_iter().map(|t| Value::String(t.to_string())).collect();
    merged.insert(TYPE_KEY.to_string(), Value::Array(types));
    Some(merged)
}

fn legacy_declaration(known: WellKnownType) -> Value {
    use serde_json::json;
    match known {
        WellKnownType::String => json!({"type": "string"}),
        WellKnownType::BinaryData => json!({"type": "string", "contentEncoding": "base64"}),
        WellKnownType::Date => json!({"type": "string", "format": "date"}),
        WellKnownType::TimestampWithTimezone => json!({
            "type": "string",
            "format": "date-time",
            "airbyte_type": "timestamp_with_timezone"
        }),
        WellKnownType::TimestampWithoutTimezone => json!({
            "type": "string",
            "format": "date-time",
            "airbyte_type": "timestamp_without_timezone"
        }),
        WellKnownType::TimeWithTimezone => json!({
            "type": "string",
            "format": "time",
            "airbyte_type": "time_with_timezone"
        }),
        WellKnownType::TimeWithoutTimezone => json!({
            "type": "string",
            "format": "time",
            "airbyte_type": "time_without_timezone"
        }),
        WellKnownType::Number => json!({"type": "number"}),
        WellKnownType::Integer => json!({"type": "number", "airbyte_type": "integer"}),
        WellKnownType::Boolean => json!({"type": "boolean"}),
    }
}

// Records

/// Replace every number in `data` with its decimal text
pub fn upgrade_record(data: &Value) -> Value {
    match data {
        Value::Number(number) => Value::String(number.to_string()),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(key, value)| (key.clone(), upgrade_record(value)))
                .collect(),
        ),
        Value::Array(elements) => Value::Array(elements.iter().map(upgrade_record).collect()),
        other => other.clone(),
    }
}

/// Turn numeric text back into numbers wherever `schema` declares one
pub fn downgrade_record(data: &Value, schema: &Value) -> Result<Value> {
    let migrated = mutate_data_node(&is_numeric_reference, &downgrade_number, data, schema)?;
    Ok(migrated.node)
}

fn is_numeric_reference(schema: &Value) -> bool {
    matches!(
        WellKnownType::of_schema(schema),
        Some(WellKnownType::Integer | WellKnownType::Number)
    )
}

fn downgrade_number(schema: &Value, data: &Value) -> MigratedNode {
    let text = match data {
        Value::Number(_) => return MigratedNode::matched(data.clone()),
        Value::String(text) => text,
        _ => return MigratedNode::unmatched(data.clone()),
    };
    let integral = WellKnownType::of_schema(schema) == Some(WellKnownType::Integer);
    match serde_json::from_str::<serde_json::Number>(text) {
        Ok(number) if !integral || number.is_i64() || number.is_u64() => {
            MigratedNode::matched(Value::Number(number))
        }
        _ => MigratedNode::unmatched(data.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::models::RecordMessage;
    use serde_json::json;

    fn int_ref() -> Value {
        WellKnownType::Integer.to_schema()
    }

    #[test]
    fn test_version_metadata() {
        let migration = MessageMigrationV1::new();
        assert_eq!(Migration::previous_version(&migration).version_string(), "0.3.0");
        assert_eq!(Migration::current_version(&migration).version_string(), "1.0.0");
    }

    #[test]
    fn test_upgrade_single_types() {
        assert_eq!(
            upgrade_schema(&json!({"type": "string", "format": "date-time"})),
            WellKnownType::TimestampWithTimezone.to_schema()
        );
        assert_eq!(
            upgrade_schema(&json!({"type": "string", "contentEncoding": "base64"})),
            WellKnownType::BinaryData.to_schema()
        );
        assert_eq!(
            upgrade_schema(&json!({"type": "string", "format": "email"})),
            WellKnownType::String.to_schema()
        );
        assert_eq!(
            upgrade_schema(&json!({"type": "number", "airbyte_type": "integer"})),
            int_ref()
        );
        assert_eq!(
            upgrade_schema(&json!({"type": "number", "airbyte_type": "unheard_of"})),
            WellKnownType::Number.to_schema()
        );
        assert_eq!(
            upgrade_schema(&json!({"type": ["string", "null"], "format": "date"})),
            WellKnownType::Date.to_schema()
        );
    }

    #[test]
    fn test_upgrade_multi_type_to_one_of() {
        let upgraded = upgrade_schema(&json!({
            "type": ["null", "string", "array"],
            "items": [{"type": "string"}, {"type": "integer"}],
            "properties": {"ignored": {"type": "string"}}
        }));
        assert_eq!(
            upgraded,
            json!({"oneOf": [
                WellKnownType::String.to_schema(),
                {"type": "array", "items": [WellKnownType::String.to_schema(), int_ref()]}
            ]})
        );
    }

    #[test]
    fn test_upgrade_leaves_structure_alone() {
        let schema = json!({
            "type": "object",
            "properties": {"any": {}, "flag": true, "nested": {"type": ["object", "null"]}},
            "default": {"type": "string"}
        });
        assert_eq!(upgrade_schema(&schema), schema);
    }

    #[test]
    fn test_downgrade_one_of_merges() {
        let downgraded = downgrade_schema(&json!({"oneOf": [
            WellKnownType::Date.to_schema(),
            int_ref()
        ]}));
        assert_eq!(
            downgraded,
            json!({"type": ["string", "number"], "format": "date", "airbyte_type": "integer"})
        );
    }

    #[test]
    fn test_downgrade_one_of_conflicts_kept() {
        let downgraded = downgrade_schema(&json!({"oneOf": [
            WellKnownType::TimestampWithoutTimezone.to_schema(),
            WellKnownType::TimestampWithTimezone.to_schema()
        ]}));
        assert_eq!(
            downgraded,
            json!({"oneOf": [
                {"type": "string", "format": "date-time", "airbyte_type": "timestamp_without_timezone"},
                {"type": "string", "format": "date-time", "airbyte_type": "timestamp_with_timezone"}
            ]})
        );

        let with_booleans =
            downgrade_schema(&json!({"oneOf": [true, WellKnownType::String.to_schema()]}));
        assert_eq!(with_booleans, json!({"oneOf": [true, {"type": "string"}]}));

        assert_eq!(downgrade_schema(&json!({"oneOf": []})), json!({"oneOf": []}));
    }

    #[test]
    fn test_downgrade_foreign_refs_untouched() {
        let schema = json!({"properties": {"a": {"$ref": "#/definitions/a"}, "b": {"type": "string"}}});
        assert_eq!(downgrade_schema(&schema), schema);
    }

    #[test]
    fn test_record_numbers_become_text() {
        assert_eq!(
            upgrade_record(&json!({"int": 42, "float": 42.0, "list": [42.2, true, null], "s": "x"})),
            json!({"int": "42", "float": "42.0", "list": ["42.2", true, null], "s": "x"})
        );
    }

    #[test]
    fn test_record_text_becomes_numbers() {
        let schema = json!({
            "type": "object",
            "properties": {
                "int": int_ref(),
                "num": WellKnownType::Number.to_schema(),
                "frac": int_ref(),
                "bad": int_ref(),
                "raw": int_ref()
            }
        });
        let data = json!({"int": "42", "num": "43.2", "frac": "4.5", "bad": "arst", "raw": 7, "extra": "1"});
        assert_eq!(
            downgrade_record(&data, &schema).unwrap(),
            json!({"int": 42, "num": 43.2, "frac": "4.5", "bad": "arst", "raw": 7, "extra": "1"})
        );
    }

    #[test]
    fn test_record_downgrade_without_catalog() {
        let migration = MessageMigrationV1::new();
        let record = RecordMessage::new("users", None, json!({"id": "1"}));
        let message = MessageV1(AirbyteMessage::record(record.clone()));
        let MessageV0(downgraded) = Migration::downgrade(&migration, message, None).unwrap();
        assert_eq!(downgraded.record, Some(record));
    }
}
