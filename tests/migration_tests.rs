//! Protocol Migration Tests
//!
//! Fixture-driven checks of the v0/v1 schema and record rewrites and of the
//! reader/serializer flow a platform runs against a connector.

use protocol_compat::protocol::models::{AirbyteMessage, ConfiguredAirbyteCatalog, MessageType};
use protocol_compat::protocol::v1::{downgrade_record, downgrade_schema, upgrade_schema};
use protocol_compat::protocol::versioned::{ConfiguredCatalogV0, MessageV1};
use protocol_compat::{
    MigrationError, MigratorFactory, ProtocolVersion, VersionedCatalog, VersionedMessage, V0, V1,
};
use serde_json::{json, Value};

fn fixture(content: &str) -> Value {
    serde_json::from_str(content).expect("fixture is valid JSON")
}

fn configured_catalog() -> ConfiguredAirbyteCatalog {
    serde_json::from_str(include_str!("fixtures/v1_configured_catalog.json"))
        .expect("fixture is a configured catalog")
}

// ============================================================================
// Schema Upgrade Tests
// ============================================================================

#[test]
fn test_upgrade_multi_type_schema() {
    let v0 = fixture(include_str!("fixtures/v0_multi_type_schema.json"));
    let expected = fixture(include_str!("fixtures/v1_multi_type_schema.json"));

    assert_eq!(upgrade_schema(&v0), expected);
}

#[test]
fn test_upgrade_leaves_input_untouched() {
    let v0 = fixture(include_str!("fixtures/v0_multi_type_schema.json"));
    let before = v0.clone();
    let _ = upgrade_schema(&v0);
    assert_eq!(v0, before);
}

#[test]
fn test_upgrade_is_idempotent_on_v1_schema() {
    let v1 = fixture(include_str!("fixtures/v1_all_primitives_schema.json"));
    assert_eq!(upgrade_schema(&v1), v1);
}

// ============================================================================
// Schema Downgrade Tests
// ============================================================================

#[test]
fn test_downgrade_all_primitives() {
    let v1 = fixture(include_str!("fixtures/v1_all_primitives_schema.json"));
    let expected = fixture(include_str!("fixtures/v0_all_primitives_schema.json"));

    assert_eq!(downgrade_schema(&v1), expected);
}

#[test]
fn test_all_primitives_survive_round_trip() {
    let v1 = fixture(include_str!("fixtures/v1_all_primitives_schema.json"));
    assert_eq!(upgrade_schema(&downgrade_schema(&v1)), v1);
}

#[test]
fn test_downgrade_merges_one_of_options() {
    let v1 = fixture(include_str!("fixtures/v1_multi_type_schema.json"));
    let downgraded = downgrade_schema(&v1);
    let properties = &downgraded["properties"];

    assert_eq!(
        properties["multityped_field"],
        json!({
            "type": ["string", "object", "array"],
            "properties": {"id": {"type": "string"}},
            "patternProperties": {"integer_.*": {"type": "number", "airbyte_type": "integer"}},
            "additionalProperties": {"type": "string"},
            "items": {"type": "string"},
            "additionalItems": {"type": "string"},
            "contains": {"type": "string"}
        })
    );
    assert_eq!(
        properties["multityped_date_field"],
        json!({"type": ["string", "number"], "format": "date", "airbyte_type": "integer"})
    );
    assert_eq!(
        properties["bad_integer"],
        json!({"type": "number", "airbyte_type": "integer"})
    );
}

#[test]
fn test_downgrade_keeps_conflicting_one_of() {
    let v1 = json!({
        "oneOf": [
            {"$ref": "WellKnownTypes.json#/definitions/TimestampWithoutTimezone"},
            {"$ref": "WellKnownTypes.json#/definitions/TimestampWithTimezone"}
        ]
    });

    assert_eq!(
        downgrade_schema(&v1),
        json!({
            "oneOf": [
                {"type": "string", "format": "date-time", "airbyte_type": "timestamp_without_timezone"},
                {"type": "string", "format": "date-time", "airbyte_type": "timestamp_with_timezone"}
            ]
        })
    );
}

// ============================================================================
// Record Downgrade Tests
// ============================================================================

#[test]
fn test_downgrade_record_backtracks_through_one_of() {
    let schema = fixture(include_str!("fixtures/v1_backtracking_schema.json"));
    let data = fixture(include_str!("fixtures/v1_backtracking_record.json"));
    let expected = fixture(include_str!("fixtures/v0_backtracking_record.json"));

    assert_eq!(downgrade_record(&data, &schema).unwrap(), expected);
}

#[test]
fn test_downgrade_record_rejects_malformed_items() {
    let schema = json!({"type": "array", "items": "Integer"});
    let err = downgrade_record(&json!(["1"]), &schema).unwrap_err();
    assert!(matches!(err, MigrationError::MalformedSchema(_)));
}

// ============================================================================
// Connector Flow Tests
// ============================================================================

#[test]
fn test_reader_upgrades_connector_output() {
    let factory = MigratorFactory::new().unwrap();
    let lines: Vec<&str> = include_str!("fixtures/v0_connector_output.ndjson").lines().collect();

    let version = protocol_compat::protocol::detect_from_lines(lines.iter().copied(), 10)
        .expect("fixture declares a version");
    assert_eq!(version, ProtocolVersion::new(0, 2, 0));

    let reader = factory.message_reader(&version).unwrap();
    let messages: Vec<AirbyteMessage> = lines
        .iter()
        .filter_map(|line| reader.read_line(line, None).unwrap())
        .collect();

    let types: Vec<MessageType> = messages.iter().map(|m| m.message_type).collect();
    assert_eq!(
        types,
        vec![
            MessageType::Spec,
            MessageType::Log,
            MessageType::Catalog,
            MessageType::Record,
            MessageType::State
        ]
    );

    let catalog = messages[2].catalog.as_ref().unwrap();
    assert_eq!(
        catalog.streams[0].json_schema["properties"],
        json!({
            "id": {"$ref": "WellKnownTypes.json#/definitions/Integer"},
            "price": {"$ref": "WellKnownTypes.json#/definitions/Number"}
        })
    );

    let record = messages[3].record.as_ref().unwrap();
    assert_eq!(record.data, json!({"id": "42", "price": "42.2", "name": "widget"}));
    assert_eq!(record.emitted_at, Some(1_700_000_000_000));

    // non-record payloads are passed through
    assert_eq!(messages[4].state, Some(json!({"data": {"cursor": 42}})));
}

#[test]
fn test_serialize_record_for_old_connector() {
    let factory = MigratorFactory::new().unwrap();
    let catalog = configured_catalog();
    let migrator = factory.message_migrator(&V0).unwrap();

    let line = r#"{"type":"RECORD","record":{"stream":"foo_stream","namespace":"foo_namespace","data":{"id":"42","price":"42.2","created_at":"2022-01-01T00:00:00Z","tags":["a"],"note":"7"},"emitted_at":1}}"#;
    let message = VersionedMessage::parse(line, &V1).unwrap();
    let written = migrator.serialize_message(message, Some(&catalog)).unwrap();
    let written: Value = serde_json::from_str(&written).unwrap();

    assert_eq!(
        written["record"]["data"],
        json!({"id": 42, "price": 42.2, "created_at": "2022-01-01T00:00:00Z", "tags": ["a"], "note": "7"})
    );
}

#[test]
fn test_serialize_record_without_catalog_entry() {
    let factory = MigratorFactory::new().unwrap();
    let catalog = configured_catalog();
    let migrator = factory.message_migrator(&V0).unwrap();

    // namespace differs from the configured stream
    let line = r#"{"type":"RECORD","record":{"stream":"foo_stream","namespace":"other","data":{"id":"42"},"emitted_at":1}}"#;
    let message = VersionedMessage::parse(line, &V1).unwrap();
    let written = migrator.serialize_message(message, Some(&catalog)).unwrap();
    let written: Value = serde_json::from_str(&written).unwrap();

    assert_eq!(written["record"]["data"], json!({"id": "42"}));
}

#[test]
fn test_same_major_is_untouched() {
    let factory = MigratorFactory::new().unwrap();
    let migrator = factory.message_migrator(&ProtocolVersion::new(1, 3, 0)).unwrap();

    let message = VersionedMessage::V1(MessageV1(AirbyteMessage::new(MessageType::Trace)));
    let upgraded = migrator.upgrade(message.clone(), None).unwrap();
    assert_eq!(upgraded, message);
}

#[test]
fn test_configured_catalog_for_old_connector() {
    let factory = MigratorFactory::new().unwrap();
    let serializer = factory.catalog_serializer(&V0).unwrap();
    let document = VersionedCatalog::new(configured_catalog(), &V1).unwrap();

    let written: ConfiguredAirbyteCatalog =
        serde_json::from_str(&serializer.serialize(document).unwrap()).unwrap();
    let stream = &written.streams[0];
    assert_eq!(
        stream.stream.json_schema["properties"]["created_at"],
        json!({"type": "string", "format": "date-time", "airbyte_type": "timestamp_with_timezone"})
    );
    // configuration fields this crate does not model survive the rewrite
    assert_eq!(stream.extra["sync_mode"], json!("incremental"));
    assert_eq!(stream.stream.extra["supported_sync_modes"], json!(["full_refresh", "incremental"]));

    let upgraded = factory
        .catalog_registry()
        .upgrade(VersionedCatalog::V0(ConfiguredCatalogV0(written)), &V0, None)
        .unwrap();
    assert_eq!(upgraded.into_catalog(), configured_catalog());
}

#[test]
fn test_unsupported_connector_version() {
    let factory = MigratorFactory::new().unwrap();
    let err = factory.message_reader(&ProtocolVersion::new(2, 0, 0)).unwrap_err();
    assert!(matches!(err, MigrationError::UnsupportedVersion { .. }));
}

#[test]
fn test_reader_keeps_unknown_top_level_fields() {
    let factory = MigratorFactory::new().unwrap();
    let reader = factory.message_reader(&V1).unwrap();

    let line = r#"{"type":"STATE","state":{"data":{}},"sourceStats":{"recordCount":3}}"#;
    let message = reader.read_line(line, None).unwrap().unwrap();
    assert_eq!(
        serde_json::to_value(&message).unwrap(),
        serde_json::from_str::<Value>(line).unwrap()
    );
}

#[test]
fn test_reader_rejects_deeply_nested_line() {
    let factory = MigratorFactory::new().unwrap();
    let reader = factory.message_reader(&ProtocolVersion::new(0, 2, 0)).unwrap();

    let depth = 200_000;
    let line = format!(
        "{{\"record\": {}{}, \"type\": \"RECORD\"}}",
        "[".repeat(depth),
        "]".repeat(depth)
    );
    assert_eq!(reader.read_line(&line, None).unwrap(), None);
    assert_eq!(
        protocol_compat::protocol::detect_from_lines([line.as_str()], 10),
        None
    );
}
