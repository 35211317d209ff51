//! Utility functions for decoding CDP DOM payloads

use serde_json::Value;

use crate::types::AttributeMap;

/// Decode the flat attribute list of `DOM.describeNode` into a map.
///
/// CDP encodes attributes as `[name, value, name, value, ...]`; a trailing
/// odd element (malformed payload) is dropped.
pub fn attributes_from_pairs(flat: &[Value]) -> AttributeMap {
    let mut map = AttributeMap::with_capacity(flat.len() / 2);
    for pair in flat.chunks_exact(2) {
        if let (Some(name), Some(value)) = (pair[0].as_str(), pair[1].as_str()) {
            map.insert(name.to_string(), value.to_string());
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_name_value_pairs() {
        let flat = vec![
            json!("id"),
            json!("main"),
            json!("class"),
            json!("container wide"),
            json!("data-x"),
            json!(""),
        ];
        let map = attributes_from_pairs(&flat);
        assert_eq!(map.len(), 3);
        assert_eq!(map.get("id").map(String::as_str), Some("main"));
        assert_eq!(map.get("class").map(String::as_str), Some("container wide"));
        assert_eq!(map.get("data-x").map(String::as_str), Some(""));
    }

    #[test]
    fn drops_trailing_odd_element() {
        let flat = vec![json!("id"), json!("main"), json!("dangling")];
        let map = attributes_from_pairs(&flat);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn empty_list_gives_empty_map() {
        assert!(attributes_from_pairs(&[]).is_empty());
    }
}
