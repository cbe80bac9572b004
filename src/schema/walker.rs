//! Schema rewriting by keyword traversal

use serde_json::Value;

/// Keywords whose value is one subschema, or an array of subschemas
const SINGLE_SCHEMA_KEYWORDS: [&str; 3] = ["items", "additionalItems", "contains"];

/// Keywords whose value maps names to subschemas
const SCHEMA_MAP_KEYWORDS: [&str; 2] = ["properties", "patternProperties"];

/// Keywords whose value is an array of subschemas
const SCHEMA_LIST_KEYWORDS: [&str; 3] = ["allOf", "oneOf", "anyOf"];

/// Rewrite every subschema matched by `matcher` with `transform`.
///
/// Boolean schemas are returned untouched. A matched node is replaced by the
/// transform's output and its children are not visited; otherwise the walk
/// descends through `items`, `additionalItems`, `contains`, `properties`,
/// `patternProperties`, `additionalProperties`, `allOf`, `oneOf`, `anyOf` and
/// `not`. Literal positions such as `default`, `enum` and `const` are never
/// visited. The input is not modified.
pub fn mutate_schemas<M, T>(matcher: &M, transform: &T, schema: &Value) -> Value
where
    M: Fn(&Value) -> bool,
    T: Fn(&Value) -> Value,
{
    let Value::Object(object) = schema else {
        return schema.clone();
    };
    if matcher(schema) {
        return transform(schema);
    }

    let mut mutated = object.clone();
    for (key, value) in mutated.iter_mut() {
        let key = key.as_str();
        if SINGLE_SCHEMA_KEYWORDS.contains(&key) || key == "additionalProperties" || key == "not" {
            *value = match &*value {
                Value::Array(options) => Value::Array(
                    options
                        .iter()
                        .map(|option| mutate_schemas(matcher, transform, option))
                        .collect(),
                ),
                other => mutate_schemas(matcher, transform, other),
            };
        } else if SCHEMA_MAP_KEYWORDS.contains(&key) {
            if let Value::Object(subschemas) = value {
                for subschema in subschemas.values_mut() {
                    *subschema = mutate_schemas(matcher, transform, subschema);
                }
            }
        } else if SCHEMA_LIST_KEYWORDS.contains(&key) {
            if let Value::Array(subschemas) = value {
                for subschema in subschemas.iter_mut() {
                    *subschema = mutate_schemas(matcher, transform, subschema);
                }
            }
        }
    }
    Value::Object(mutated)
}
