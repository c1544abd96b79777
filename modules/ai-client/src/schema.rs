use schemars::{schema_for, JsonSchema};
use serde_json::{Map, Value};

/// Trait for types that can be requested as a provider-enforced response schema.
///
/// Automatically implemented for any type that implements `JsonSchema`.
pub trait ResponseSchema: JsonSchema {
    /// Generate a schema in the OpenAPI subset Gemini accepts.
    ///
    /// Gemini rejects:
    /// 1. `$schema`, `definitions`, `title` and `additionalProperties` keys
    /// 2. `$ref` references (everything must be inlined)
    /// 3. union types such as `["string", "null"]` (use `nullable: true`)
    fn response_schema() -> Value {
        let schema = schema_for!(Self);
        let mut value = serde_json::to_value(schema).unwrap_or_default();

        let definitions = match &mut value {
            Value::Object(map) => map.remove("definitions"),
            _ => None,
        };
        if let Some(defs) = definitions {
            inline_refs(&mut value, &defs);
        }
        normalize(&mut value);

        value
    }
}

impl<T: JsonSchema> ResponseSchema for T {}

const UNSUPPORTED_KEYS: &[&str] = &["$schema", "title", "additionalProperties", "definitions"];

fn inline_refs(value: &mut Value, definitions: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(ref_path)) = map.get("$ref").cloned() {
                let type_name = ref_path.trim_start_matches("#/definitions/");
                if let Some(def) = definitions.get(type_name) {
                    *value = def.clone();
                    inline_refs(value, definitions);
                    return;
                }
            }

            if let Some(Value::Array(all_of)) = map.get("allOf").cloned() {
                if let [single] = all_of.as_slice() {
                    *value = single.clone();
                    inline_refs(value, definitions);
                    return;
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

fn normalize(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for key in UNSUPPORTED_KEYS {
                map.remove(*key);
            }
            collapse_nullable(map);
            for (key, v) in map.iter_mut() {
                match (key.as_str(), v) {
                    // Property names are data, not schema keywords.
                    ("properties", Value::Object(props)) => {
                        for (_, prop) in props.iter_mut() {
                            normalize(prop);
                        }
                    }
                    (_, v) => normalize(v),
                }
            }
        }
        Value::Array(arr) => {
            for item in arr.iter_mut() {
                normalize(item);
            }
        }
        _ => {}
    }
}

fn collapse_nullable(map: &mut Map<String, Value>) {
    let Some(Value::Array(types)) = map.get("type") else {
        return;
    };
    let non_null: Vec<Value> = types
        .iter()
        .filter(|t| t.as_str() != Some("null"))
        .cloned()
        .collect();
    if non_null.len() == 1 && non_null.len() < types.len() {
        map.insert("type".to_string(), non_null[0].clone());
        map.insert("nullable".to_string(), Value::Bool(true));
    }
}
