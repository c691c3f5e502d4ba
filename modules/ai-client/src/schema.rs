use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Types returned through a forced tool-use call. Any
/// `JsonSchema + DeserializeOwned` type qualifies.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    /// Self-contained `input_schema` for the tool: nested types inlined,
    /// no `definitions` or `$schema` at the root.
    fn tool_schema() -> Value {
        let mut schema = serde_json::to_value(schema_for!(Self)).unwrap_or_default();
        let definitions = match &mut schema {
            Value::Object(root) => {
                root.remove("$schema");
                root.remove("definitions")
            }
            _ => None,
        };
        if let Some(Value::Object(definitions)) = definitions {
            inline(&mut schema, &definitions);
        }
        schema
    }

    fn type_name() -> String {
        <Self as JsonSchema>::schema_name()
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

/// Replace `{"$ref": "#/definitions/X"}` with X, and unwrap the
/// single-element `allOf` schemars emits around referenced fields.
fn inline(value: &mut Value, definitions: &Map<String, Value>) {
    match value {
        Value::Object(map) => {
            let target = map
                .get("$ref")
                .and_then(Value::as_str)
                .and_then(|path| path.strip_prefix("#/definitions/"))
                .and_then(|name| definitions.get(name))
                .or_else(|| match map.get("allOf") {
                    Some(Value::Array(parts)) if parts.len() == 1 => parts.first(),
                    _ => None,
                })
                .cloned();
            if let Some(target) = target {
                *value = target;
                return inline(value, definitions);
            }
            for child in map.values_mut() {
                inline(child, definitions);
            }
        }
        Value::Array(items) => {
            for item in items {
                inline(item, definitions);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    #[serde(rename_all = "snake_case")]
    #[allow(dead_code)]
    enum Label {
        Positive,
        Negative,
        Neutral,
    }

    #[derive(Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct Judgment {
        is_duplicate: bool,
        reasoning: Option<String>,
    }

    #[derive(Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct Labelled {
        label: Label,
        judgment: Judgment,
    }

    #[test]
    fn optional_fields_stay_optional() {
        let schema = Judgment::tool_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .expect("should have required array")
            .iter()
            .filter_map(|v| v.as_str())
            .collect();

        assert_eq!(required, vec!["is_duplicate"]);
        assert!(schema.get("additionalProperties").is_none());
    }

    #[test]
    fn nested_types_are_inlined() {
        let schema = Labelled::tool_schema();
        let obj = schema.as_object().unwrap();

        assert!(!obj.contains_key("definitions"));
        assert!(!obj.contains_key("$schema"));

        let judgment = &schema["properties"]["judgment"];
        assert!(judgment.get("$ref").is_none());
        assert!(judgment.get("allOf").is_none());
        assert_eq!(judgment["type"], "object");
        assert!(judgment["properties"]["is_duplicate"].is_object());
    }

    #[test]
    fn enum_variants_survive_inlining() {
        let schema = Labelled::tool_schema();
        let rendered = serde_json::to_string(&schema["properties"]["label"]).unwrap();
        assert!(rendered.contains("positive"));
        assert!(rendered.contains("neutral"));
    }
}
