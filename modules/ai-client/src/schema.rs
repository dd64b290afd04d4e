use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Trait for types that can be requested as Gemini structured output.
///
/// Automatically implemented for any type that implements `JsonSchema + DeserializeOwned`.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    /// Generate a `responseSchema` Gemini accepts.
    ///
    /// Gemini takes an OpenAPI subset:
    /// 1. No `$ref`, `definitions`, `$schema`, `title` or `additionalProperties`
    /// 2. A single `type` per node; optional values use `nullable: true`
    /// 3. No `format` on integers (`uint8` and friends are rejected)
    fn gemini_schema() -> Value {
        let schema = schema_for!(Self);
        let mut value = serde_json::to_value(schema).unwrap_or_default();

        let definitions = value.get("definitions").cloned().unwrap_or(Value::Null);
        inline_refs(&mut value, &definitions);
        simplify(&mut value);

        value
    }

    fn type_name() -> String {
        <Self as JsonSchema>::schema_name()
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

const DROPPED_KEYS: &[&str] = &[
    "$schema",
    "definitions",
    "title",
    "additionalProperties",
    "default",
    "format",
    "minimum",
    "maximum",
];

fn inline_refs(value: &mut Value, definitions: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(ref_path)) = map.get("$ref").cloned() {
                if let Some(type_name) = ref_path.strip_prefix("#/definitions/") {
                    if let Some(def) = definitions.get(type_name) {
                        *value = def.clone();
                        inline_refs(value, definitions);
                        return;
                    }
                }
            }

            for (_, v) in map.iter_mut() {
                inline_refs(v, definitions);
            }
        }
        Value::Array(arr) => {
            for item in arr.iter_mut() {
                inline_refs(item, definitions);
            }
        }
        _ => {}
    }
}

fn simplify(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for key in DROPPED_KEYS {
                map.remove(*key);
            }

            if let Some(replacement) = collapse_composite(map) {
                *value = replacement;
                simplify(value);
                return;
            }

            collapse_type_array(map);

            for (key, v) in map.iter_mut() {
                match (key.as_str(), v) {
                    // Keys of `properties` are field names, not schema keywords.
                    ("properties", Value::Object(props)) => {
                        for (_, prop) in props.iter_mut() {
                            simplify(prop);
                        }
                    }
                    ("enum" | "required", _) => {}
                    (_, v) => simplify(v),
                }
            }
        }
        Value::Array(arr) => {
            for item in arr.iter_mut() {
                simplify(item);
            }
        }
        _ => {}
    }
}

/// `allOf: [X]` becomes X; `anyOf: [X, {type: null}]` becomes X with `nullable`.
fn collapse_composite(map: &mut Map<String, Value>) -> Option<Value> {
    if let Some(Value::Array(all_of)) = map.get("allOf") {
        if all_of.len() == 1 {
            return Some(merge_annotations(all_of[0].clone(), map, false));
        }
    }

    if let Some(Value::Array(any_of)) = map.get("anyOf") {
        let non_null: Vec<&Value> = any_of.iter().filter(|v| !is_null_schema(v)).collect();
        if non_null.len() == 1 && any_of.len() == 2 {
            return Some(merge_annotations(non_null[0].clone(), map, true));
        }
    }

    None
}

fn merge_annotations(mut inner: Value, outer: &Map<String, Value>, nullable: bool) -> Value {
    if let Value::Object(inner_map) = &mut inner {
        if let Some(desc) = outer.get("description") {
            inner_map.insert("description".to_string(), desc.clone());
        }
        if nullable {
            inner_map.insert("nullable".to_string(), Value::Bool(true));
        }
    }
    inner
}

fn is_null_schema(value: &Value) -> bool {
    value.get("type") == Some(&Value::String("null".to_string()))
}

fn collapse_type_array(map: &mut Map<String, Value>) {
    let Some(Value::Array(types)) = map.get("type") else {
        return;
    };
    let concrete: Vec<Value> = types
        .iter()
        .filter(|t| t.as_str() != Some("null"))
        .cloned()
        .collect();
    let had_null = concrete.len() < types.len();

    if let Some(first) = concrete.into_iter().next() {
        map.insert("type".to_string(), first);
    }
    if had_null {
        map.insert("nullable".to_string(), Value::Bool(true));
    }

    // Nullable enums list `null` among their values.
    if let Some(Value::Array(values)) = map.get_mut("enum") {
        values.retain(|v| !v.is_null());
    }
}
