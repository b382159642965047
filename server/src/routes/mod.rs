pub mod admin;
pub mod public;

use serde::Serialize;
use serde_json::Value;

/// Flattens `(id, document)` pairs into JSON objects carrying their id,
/// the shape both the public site and the admin panel render from.
pub(crate) fn with_ids<T: Serialize>(docs: Vec<(String, T)>) -> Result<Value, serde_json::Error> {
    let mut out = Vec::with_capacity(docs.len());
    for (id, doc) in docs {
        let mut value = serde_json::to_value(doc)?;
        if let Value::Object(map) = &mut value {
            map.insert("id".to_string(), Value::String(id));
        }
        out.push(value);
    }
    Ok(Value::Array(out))
}
