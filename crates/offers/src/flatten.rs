//! Nested property bag flattening.
//!
//! Upstream offers come in two shapes. The market shape is already mostly
//! flat, with dotted keys. The ledger shape nests every key segment and boxes
//! enumerated values as a tagged mapping:
//!
//! ```json
//! { "model": { "@tag": "linear", "linear": { "coeffs": [0.1, 0.2, 0.0] } } }
//! ```
//!
//! Both flatten into the same dotted keys, the example above yields
//! `model = "linear"` and `model.linear.coeffs = [0.1, 0.2, 0.0]`.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::properties::Properties;

/// Field that names the active variant of a tagged mapping.
pub const TAG_FIELD: &str = "@tag";

/// Key of the experimental property group.
pub const EXPERIMENTAL_KEY: &str = "!exp";

/// Prefix under which the experimental property group is always placed.
pub const EXPERIMENTAL_PREFIX: &str = "golem.!exp";

/// Flatten a nested offer property bag.
///
/// Returns [`None`] if the provided value is not a mapping. Malformed
/// tagged mappings are skipped and reported with a debug event, so
/// the result may be partial.
pub fn flatten(input: &Value) -> Option<Properties> {
    let map = input.as_object()?;

    let mut output = BTreeMap::new();
    walk(map, None, &mut output);

    Some(Properties::from(output))
}

fn join(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}.{key}"),
        None => key.to_owned(),
    }
}

fn walk(map: &Map<String, Value>, prefix: Option<&str>, output: &mut BTreeMap<String, Value>) {
    for (key, value) in map {
        let path = if key == EXPERIMENTAL_KEY {
            String::from(EXPERIMENTAL_PREFIX)
        } else {
            join(prefix, key)
        };

        match value {
            Value::Object(nested) => walk_nested(nested, path, output),
            other => {
                output.insert(path, other.clone());
            }
        }
    }
}

fn walk_nested(map: &Map<String, Value>, path: String, output: &mut BTreeMap<String, Value>) {
    let tag = match map.get(TAG_FIELD) {
        None => return walk(map, Some(&path), output),
        Some(Value::String(tag)) => tag,
        Some(other) => {
            debug!(key = %path, tag = %other, "skipping tagged mapping with non-string tag");
            return;
        }
    };

    let Some(Value::Object(variant)) = map.get(tag) else {
        debug!(key = %path, %tag, "skipping tagged mapping without variant body");
        return;
    };

    output.insert(path.clone(), Value::String(tag.clone()));
    walk(variant, Some(&join(Some(&path), tag)), output);

    for (key, value) in map {
        if key == TAG_FIELD || key == tag {
            continue;
        }

        let sibling_path = join(Some(&path), key);

        match value {
            Value::Object(nested) => walk_nested(nested, sibling_path, output),
            other => {
                output.insert(sibling_path, other.clone());
            }
        }
    }
}

/// Rebuild a nested mapping from flattened properties.
///
/// A string value stored at a key that also prefixes other keys
/// is restored as the [`TAG_FIELD`] of a tagged mapping.
pub fn nest(properties: &Properties) -> Value {
    let mut root = Map::new();

    // Keys are visited in lexicographic order, so tag values
    // are always inserted before their variant bodies.
    for (key, value) in properties.iter() {
        let segments: Vec<&str> = key.split('.').collect();
        insert_nested(&mut root, &segments, value.clone());
    }

    Value::Object(root)
}

fn insert_nested(map: &mut Map<String, Value>, segments: &[&str], value: Value) {
    let [segment, rest @ ..] = segments else {
        return;
    };

    if rest.is_empty() {
        match map.get_mut(*segment) {
            Some(Value::Object(existing)) => {
                existing.insert(String::from(TAG_FIELD), value);
            }
            _ => {
                map.insert((*segment).to_owned(), value);
            }
        }

        return;
    }

    let entry = map
        .entry((*segment).to_owned())
        .or_insert_with(|| Value::Object(Map::new()));

    if !entry.is_object() {
        let tag = entry.take();
        let mut boxed = Map::new();
        boxed.insert(String::from(TAG_FIELD), tag);
        *entry = Value::Object(boxed);
    }

    if let Value::Object(nested) = entry {
        insert_nested(nested, rest, value);
    }
}
