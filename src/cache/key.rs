// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Computes the cache key for one model operation.
///
/// The key is `"<tag>-<sha256>"` where the digest covers the tag, the prompt and
/// the parameters serialized with object keys sorted at every depth, so the
/// parameter order never changes the key.
///
/// # Examples
///
/// ```rust
/// use graphrag_indexer::cache::cache_key;
/// use serde_json::json;
///
/// let a = cache_key("chat", "hello", &json!({"model": "m", "temperature": 0}));
/// let b = cache_key("chat", "hello", &json!({"temperature": 0, "model": "m"}));
/// assert_eq!(a, b);
/// assert!(a.starts_with("chat-"));
/// ```
pub fn cache_key(tag: &str, prompt: &str, parameters: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tag.as_bytes());
    hasher.update([0u8]);
    hasher.update(prompt.as_bytes());
    hasher.update([0u8]);
    hasher.update(canonical_json(parameters).as_bytes());
    format!("{}-{}", tag, hex::encode(hasher.finalize()))
}

/// Serializes `value` with object keys sorted recursively.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, inner)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(inner, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, inner) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(inner, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    proptest! {
        #[test]
        fn key_is_deterministic(tag in "[a-z_]{1,12}", prompt in ".{0,64}", temp in 0u32..100) {
            let params = json!({"model": "gpt", "temperature": temp});
            prop_assert_eq!(cache_key(&tag, &prompt, &params), cache_key(&tag, &prompt, &params));
        }

        #[test]
        fn key_changes_with_each_component(
            tag in "[a-z]{1,8}",
            prompt in "[a-z ]{1,32}",
            temp in 0u32..100,
        ) {
            let params = json!({"temperature": temp});
            let base = cache_key(&tag, &prompt, &params);

            prop_assert_ne!(&base, &cache_key(&format!("{}x", tag), &prompt, &params));
            prop_assert_ne!(&base, &cache_key(&tag, &format!("{}x", prompt), &params));
            prop_assert_ne!(&base, &cache_key(&tag, &prompt, &json!({"temperature": temp + 1})));
        }
    }

    #[test]
    fn test_nested_parameter_order_is_ignored() {
        let a = json!({"outer": {"b": 1, "a": [ {"y": 1, "x": 2} ]}, "z": null});
        let b = json!({"z": null, "outer": {"a": [ {"x": 2, "y": 1} ], "b": 1}});
        assert_eq!(canonical_json(&a), canonical_json(&b));
        assert_eq!(
            canonical_json(&a),
            r#"{"outer":{"a":[{"x":2,"y":1}],"b":1},"z":null}"#
        );
    }
}
