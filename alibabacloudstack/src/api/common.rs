//! Common types and utilities for the RPC API

use serde_json::Value;
use std::collections::BTreeMap;

/// Request parameters for an RPC call, kept sorted for signing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RpcParams {
    params: BTreeMap<String, String>,
}

impl RpcParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.params.insert(key.into(), value.to_string());
        self
    }

    pub fn add_optional<K: Into<String>, V: ToString>(mut self, key: K, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.params.insert(key.into(), v.to_string());
        }
        self
    }

    /// Repeated values as `Key.1`, `Key.2`, ...
    pub fn add_repeated<K: AsRef<str>>(mut self, key: K, values: &[String]) -> Self {
        for (idx, value) in values.iter().enumerate() {
            self.params
                .insert(format!("{}.{}", key.as_ref(), idx + 1), value.clone());
        }
        self
    }

    /// A list serialized as a JSON array string, e.g. `["s-123"]`
    pub fn add_json_list<K: Into<String>>(mut self, key: K, values: &[String]) -> Self {
        let encoded = serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string());
        self.params.insert(key.into(), encoded);
        self
    }

    pub fn insert<K: Into<String>, V: ToString>(&mut self, key: K, value: V) {
        self.params.insert(key.into(), value.to_string());
    }

    /// Copy every parameter of `other` under `prefix.`
    pub fn extend_prefixed(&mut self, prefix: &str, other: RpcParams) {
        for (k, v) in other.params {
            self.params.insert(format!("{}.{}", prefix, k), v);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.params.iter()
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.params
    }
}

/// Walk a dotted path such as `FileSystems.FileSystem[0].ZoneId`
pub fn json_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        let (name, index) = match segment.find('[') {
            Some(open) => {
                let idx = segment[open + 1..]
                    .trim_end_matches(']')
                    .parse::<usize>()
                    .ok()?;
                (&segment[..open], Some(idx))
            }
            None => (segment, None),
        };

        if !name.is_empty() {
            current = current.get(name)?;
        }
        if let Some(idx) = index {
            current = current.get(idx)?;
        }
    }
    Some(current)
}

/// String value at `path`; numbers and bools are rendered as text
pub fn json_string(value: &Value, path: &str) -> Option<String> {
    match json_path(value, path)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Numeric value at `path`; numeric strings are parsed
pub fn json_f64(value: &Value, path: &str) -> Option<f64> {
    match json_path(value, path)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

pub fn json_bool(value: &Value, path: &str) -> Option<bool> {
    match json_path(value, path)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        _ => None,
    }
}

/// Array at `path`, empty when missing or not an array
pub fn json_array<'a>(value: &'a Value, path: &str) -> &'a [Value] {
    json_path(value, path)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn params_stay_sorted_and_skip_missing_optionals() {
        let params = RpcParams::new()
            .add("ZoneId", "cn-qingdao-a")
            .add("Capacity", 100)
            .add_optional("KmsKeyId", None::<String>)
            .add_optional("Description", Some("nas"));

        let keys: Vec<_> = params.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["Capacity", "Description", "ZoneId"]);
        assert_eq!(params.get("Capacity"), Some("100"));
    }

    #[test]
    fn repeated_and_prefixed_parameters() {
        let mut params = RpcParams::new().add_repeated("InstanceId", &["i-1".into(), "i-2".into()]);
        params.extend_prefixed("AlertTemplates.1", RpcParams::new().add("RuleName", "cpu"));

        assert_eq!(params.get("InstanceId.1"), Some("i-1"));
        assert_eq!(params.get("InstanceId.2"), Some("i-2"));
        assert_eq!(params.get("AlertTemplates.1.RuleName"), Some("cpu"));
    }

    #[test]
    fn json_list_parameter() {
        let params = RpcParams::new().add_json_list("StorageSetIds", &["ss-1".into()]);
        assert_eq!(params.get("StorageSetIds"), Some(r#"["ss-1"]"#));
    }

    #[test]
    fn json_path_walks_objects_and_indexes() {
        let body = json!({
            "FileSystems": {"FileSystem": [{"FileSystemId": "31a8e4", "Capacity": 2048, "Encrypted": "true"}]}
        });

        assert_eq!(
            json_string(&body, "FileSystems.FileSystem[0].FileSystemId"),
            Some("31a8e4".to_string())
        );
        assert_eq!(json_f64(&body, "FileSystems.FileSystem[0].Capacity"), Some(2048.0));
        assert_eq!(
            json_string(&body, "FileSystems.FileSystem[0].Capacity"),
            Some("2048".to_string())
        );
        assert_eq!(json_bool(&body, "FileSystems.FileSystem[0].Encrypted"), Some(true));
        assert!(json_path(&body, "FileSystems.FileSystem[1]").is_none());
        assert_eq!(json_array(&body, "FileSystems.FileSystem").len(), 1);
        assert!(json_array(&body, "Missing.Path").is_empty());
    }
}
