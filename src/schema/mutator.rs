//! Best-effort schema-directed data rewriting
//!
//! Walks a data document alongside the schema describing it and rewrites the
//! nodes whose schema is matched. Disagreement between data and schema is
//! never an error: it is reported through [`MigratedNode::matched_schema`] so
//! that callers can choose between `oneOf` branches.

use serde_json::{Map, Value};

use super::well_known::WellKnownType;
use crate::error::{MigrationError, Result};

/// Output of one mutation step
#[derive(Debug, Clone, PartialEq)]
pub struct MigratedNode {
    pub node: Value,
    /// Advisory: whether `node` looked like an instance of the schema
    pub matched_schema: bool,
}

impl MigratedNode {
    pub fn new(node: Value, matched_schema: bool) -> Self {
        Self {
            node,
            matched_schema,
        }
    }

    pub fn matched(node: Value) -> Self {
        Self::new(node, true)
    }

    pub fn unmatched(node: Value) -> Self {
        Self::new(node, false)
    }
}

/// Apply `transform` to every data node whose schema satisfies `matcher`.
///
/// For a schema with `oneOf` (and neither `$ref` nor `type`) each branch is
/// tried in declared order and the first result with `matched_schema` wins.
/// When no branch matches, the result of the **first** branch is returned,
/// even though it may be wrong; no smarter heuristic is attempted.
///
/// Object fields absent from `properties` and array elements beyond a tuple
/// `items` list pass through unchanged. `additionalProperties` is not
/// enforced.
///
/// Fails only on malformed schemas, e.g. `items` that is neither a schema nor
/// an array of schemas.
pub fn mutate_data_node<M, T>(
    matcher: &M,
    transform: &T,
    data: &Value,
    schema: &Value,
) -> Result<MigratedNode>
where
    M: Fn(&Value) -> bool,
    T: Fn(&Value, &Value) -> MigratedNode,
{
    let object_schema = match schema {
        Value::Bool(accepts) => return Ok(MigratedNode::new(data.clone(), *accepts)),
        Value::Object(object_schema) => object_schema,
        other => {
            return Err(MigrationError::MalformedSchema(format!(
                "expected a schema object or boolean, found {other}"
            )))
        }
    };

    if let Some(options) = object_schema.get("oneOf") {
        if !object_schema.contains_key("$ref") && !object_schema.contains_key("type") {
            return mutate_one_of(matcher, transform, data, options);
        }
    }

    if matcher(schema) {
        return Ok(transform(schema, data));
    }

    match data {
        Value::Object(fields) => {
            if !declares_kind(object_schema, "object", "properties") {
                return Ok(MigratedNode::unmatched(data.clone()));
            }
            let properties = match object_schema.get("properties") {
                None => None,
                Some(Value::Object(properties)) => Some(properties),
                Some(other) => {
                    return Err(MigrationError::MalformedSchema(format!(
                        "properties must be an object, found {other}"
                    )))
                }
            };
            let mut matched_schema = true;
            let mut mutated = Map::with_capacity(fields.len());
            for (key, value) in fields {
                match properties.and_then(|p| p.get(key)) {
                    Some(property_schema) => {
                        let result = mutate_data_node(matcher, transform, value, property_schema)?;
                        matched_schema &= result.matched_schema;
                        mutated.insert(key.clone(), result.node);
                    }
                    None => {
                        mutated.insert(key.clone(), value.clone());
                    }
                }
            }
            Ok(MigratedNode::new(Value::Object(mutated), matched_schema))
        }
        Value::Array(elements) => {
            if !declares_kind(object_schema, "array", "items") {
                return Ok(MigratedNode::unmatched(data.clone()));
            }
            let mut matched_schema = true;
            let mut mutated = Vec::with_capacity(elements.len());
            match object_schema.get("items") {
                None => mutated.extend(elements.iter().cloned()),
                Some(Value::Array(tuple)) => {
                    for (index, element) in elements.iter().enumerate() {
                        match tuple.get(index) {
                            Some(element_schema) => {
                                let result =
                                    mutate_data_node(matcher, transform, element, element_schema)?;
                                matched_schema &= result.matched_schema;
                                mutated.push(result.node);
                            }
                            None => mutated.push(element.clone()),
                        }
                    }
                }
                Some(items @ (Value::Object(_) | Value::Bool(_))) => {
                    for element in elements {
                        let result = mutate_data_node(matcher, transform, element, items)?;
                        matched_schema &= result.matched_schema;
                        mutated.push(result.node);
                    }
                }
                Some(other) => {
                    return Err(MigrationError::MalformedSchema(format!(
                        "items must be a schema or an array of schemas, found {other}"
                    )))
                }
            }
            Ok(MigratedNode::new(Value::Array(mutated), matched_schema))
        }
        primitive => Ok(MigratedNode::new(
            primitive.clone(),
            satisfies_primitive(schema, primitive),
        )),
    }
}

fn mutate_one_of<M, T>(
    matcher: &M,
    transform: &T,
    data: &Value,
    options: &Value,
) -> Result<MigratedNode>
where
    M: Fn(&Value) -> bool,
    T: Fn(&Value, &Value) -> MigratedNode,
{
    let Value::Array(options) = options else {
        return Err(MigrationError::MalformedSchema(format!(
            "oneOf must be an array, found {options}"
        )));
    };
    let mut first = None;
    for option in options {
        let result = mutate_data_node(matcher, transform, data, option)?;
        if result.matched_schema {
            return Ok(result);
        }
        first.get_or_insert(result);
    }
    Ok(first.unwrap_or_else(|| MigratedNode::unmatched(data.clone())))
}

/// Whether the schema declares `kind` through `type`, or implies it by
/// carrying `implied_by` when no `type` is declared at all
fn declares_kind(schema: &Map<String, Value>, kind: &str, implied_by: &str) -> bool {
    match schema.get("type") {
        Some(Value::String(declared)) => declared == kind,
        Some(Value::Array(declared)) => declared.iter().any(|t| t.as_str() == Some(kind)),
        Some(_) => false,
        None => schema.contains_key(implied_by),
    }
}

/// Could `data` (an instance that has no children) satisfy `schema`?
pub fn satisfies_primitive(schema: &Value, data: &Value) -> bool {
    let object_schema = match schema {
        Value::Bool(accepts) => return *accepts,
        Value::Object(object_schema) => object_schema,
        _ => return false,
    };
    if let Some(reference) = object_schema.get("$ref").and_then(Value::as_str) {
        return WellKnownType::from_reference(reference)
            .map(|known| known.accepts(data))
            .unwrap_or(true);
    }
    match object_schema.get("type") {
        None => true,
        Some(Value::String(declared)) => type_accepts(declared, data),
        Some(Value::Array(declared)) => declared
            .iter()
            .filter_map(Value::as_str)
            .any(|declared| type_accepts(declared, data)),
        Some(_) => false,
    }
}

fn type_accepts(declared: &str, data: &Value) -> bool {
    match declared {
        "string" => data.is_string(),
        "number" => data.is_number(),
        "integer" => {
            data.is_i64()
                || data.is_u64()
                || data.as_f64().map(|f| f.fract() == 0.0).unwrap_or(false)
        }
        "boolean" => data.is_boolean(),
        "null" => data.is_null(),
        "object" => data.is_object(),
        "array" => data.is_array(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn is_type(expected: &'static str) -> impl Fn(&Value) -> bool {
        move |schema| schema.get("type").and_then(Value::as_str) == Some(expected)
    }

    fn uppercase(_: &Value, data: &Value) -> MigratedNode {
        match data {
            Value::String(text) => MigratedNode::matched(json!(text.to_uppercase())),
            other => MigratedNode::unmatched(other.clone()),
        }
    }

    #[test]
    fn test_object_uppercase_scenario() {
        let schema = json!({"type": "object", "properties": {"x": {"type": "string"}}});
        let data = json!({"x": "ab", "y": "cd"});
        let result = mutate_data_node(&is_type("string"), &uppercase, &data, &schema).unwrap();
        assert_eq!(result, MigratedNode::matched(json!({"x": "AB", "y": "cd"})));
    }

    #[test]
    fn test_one_of_falls_back_to_first_branch() {
        let schema = json!({"oneOf": [{"type": "string"}, {"type": "integer"}]});
        let data = json!("hello");
        let to_zero = |_: &Value, _: &Value| MigratedNode::matched(json!(0));
        let result = mutate_data_node(&is_type("integer"), &to_zero, &data, &schema).unwrap();
        // the string branch is tried first and reports a match
        assert_eq!(result, MigratedNode::matched(json!("hello")));

        let schema = json!({"oneOf": [{"type": "boolean"}, {"type": "null"}]});
        let result = mutate_data_node(&is_type("integer"), &to_zero, &data, &schema).unwrap();
        assert_eq!(result, MigratedNode::unmatched(json!("hello")));
    }

    #[test]
    fn test_one_of_picks_first_matching_branch() {
        let schema = json!({"oneOf": [
            {"type": "array", "items": {"type": "integer"}},
            {"type": "array", "items": {"type": "string"}}
        ]});
        let data = json!(["a", "b"]);
        let result = mutate_data_node(&is_type("string"), &uppercase, &data, &schema).unwrap();
        assert_eq!(result, MigratedNode::matched(json!(["A", "B"])));
    }

    #[test]
    fn test_empty_one_of() {
        let schema = json!({"oneOf": []});
        let result =
            mutate_data_node(&is_type("string"), &uppercase, &json!("a"), &schema).unwrap();
        assert_eq!(result, MigratedNode::unmatched(json!("a")));
    }

    #[test]
    fn test_tuple_items_extra_elements_pass_through() {
        let schema = json!({"type": "array", "items": [{"type": "string"}, {"type": "integer"}]});
        let data = json!(["a", 1, "c"]);
        let result = mutate_data_node(&is_type("string"), &uppercase, &data, &schema).unwrap();
        assert_eq!(result, MigratedNode::matched(json!(["A", 1, "c"])));
    }

    #[test]
    fn test_typeless_schemas_inferred_from_keywords() {
        let schema = json!({"properties": {"a": {"items": {"type": "string"}}}});
        let data = json!({"a": ["x"]});
        let result = mutate_data_node(&is_type("string"), &uppercase, &data, &schema).unwrap();
        assert_eq!(result.node, json!({"a": ["X"]}));
    }

    #[test]
    fn test_kind_mismatch_is_soft() {
        let schema = json!({"type": "string"});
        let data = json!({"a": "b"});
        let result = mutate_data_node(&is_type("integer"), &uppercase, &data, &schema).unwrap();
        assert_eq!(result, MigratedNode::unmatched(data));
    }

    #[test]
    fn test_malformed_items_is_an_error() {
        let schema = json!({"type": "array", "items": 3});
        let err =
            mutate_data_node(&is_type("string"), &uppercase, &json!([1]), &schema).unwrap_err();
        assert!(matches!(err, MigrationError::MalformedSchema(_)));
    }

    #[test]
    fn test_satisfies_primitive() {
        assert!(satisfies_primitive(&json!({}), &json!(1)));
        assert!(satisfies_primitive(&json!({"type": ["null", "integer"]}), &json!(3)));
        assert!(!satisfies_primitive(&json!({"type": "object"}), &json!(true)));
        assert!(!satisfies_primitive(&json!(false), &json!(true)));
        assert!(satisfies_primitive(
            &json!({"$ref": "WellKnownTypes.json#/definitions/Boolean"}),
            &json!(true)
        ));
        assert!(satisfies_primitive(&json!({"$ref": "#/definitions/local"}), &json!(1)));
    }
}
