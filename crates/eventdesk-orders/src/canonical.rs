use serde_json::Value;

/// Deterministic JSON encoding used as the digest input.
///
/// Object keys are emitted in lexicographic order at every depth, arrays
/// keep their order, and scalars use serde_json's literal encoding. No
/// whitespace is emitted.
pub fn stable_stringify(value: &Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_scalar(&Value::String(key.clone()), out);
                out.push(':');
                write_value(&map[key.as_str()], out);
            }
            out.push('}');
        }
        scalar => write_scalar(scalar, out),
    }
}

fn write_scalar(value: &Value, out: &mut String) {
    // Display on a scalar Value is its compact JSON literal.
    out.push_str(&value.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted_recursively() {
        let v = json!({"b": 1, "a": {"z": true, "m": null}, "c": [3, {"y": 1, "x": 2}]});
        assert_eq!(
            stable_stringify(&v),
            r#"{"a":{"m":null,"z":true},"b":1,"c":[3,{"x":2,"y":1}]}"#
        );
    }

    #[test]
    fn strings_are_escaped() {
        let v = json!({"note": "say \"hi\"\n"});
        assert_eq!(stable_stringify(&v), r#"{"note":"say \"hi\"\n"}"#);
    }

    #[test]
    fn array_order_matters() {
        assert_ne!(
            stable_stringify(&json!([1, 2])),
            stable_stringify(&json!([2, 1]))
        );
    }
}
