//! Remote-object property classification
//!
//! `Runtime.getProperties` returns a list of property descriptors whose
//! values are either primitives carried inline or handles to further remote
//! objects. The browser crate walks those descriptors recursively to turn a
//! page-side object into a plain JSON value; this module decides, per
//! descriptor, which of the three shapes it has.

use serde_json::Value;

use crate::types::RemoteObjectId;

/// How a property descriptor should be consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    /// Value is inline (`value.value`), including `null` subtypes.
    Primitive,
    /// Value is a nested object reachable via `value.objectId`.
    Object,
    /// Value is an array reachable via `value.objectId`.
    Array,
    /// Non-enumerable or otherwise not part of the materialized result.
    Skipped,
}

/// Read-only view over one property descriptor from `Runtime.getProperties`.
#[derive(Debug, Clone, Copy)]
pub struct PropertyView<'a> {
    raw: &'a Value,
}

impl<'a> PropertyView<'a> {
    pub fn new(raw: &'a Value) -> Self {
        Self { raw }
    }

    pub fn name(&self) -> Option<&'a str> {
        self.raw.get("name").and_then(Value::as_str)
    }

    pub fn enumerable(&self) -> bool {
        self.raw
            .get("enumerable")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    fn value_type(&self) -> &'a str {
        self.raw
            .get("value")
            .and_then(|v| v.get("type"))
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    fn value_subtype(&self) -> &'a str {
        self.raw
            .get("value")
            .and_then(|v| v.get("subtype"))
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// The inline primitive value, `Value::Null` when absent.
    pub fn primitive(&self) -> Value {
        self.raw
            .get("value")
            .and_then(|v| v.get("value"))
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Object id for nested object/array descriptors.
    pub fn object_id(&self) -> Option<RemoteObjectId> {
        self.raw
            .get("value")
            .and_then(|v| v.get("objectId"))
            .and_then(Value::as_str)
            .map(|id| RemoteObjectId(id.to_string()))
    }

    /// Classify this descriptor. A `null`-subtype value counts as primitive
    /// even when non-enumerable; everything else requires enumerability.
    pub fn kind(&self) -> PropertyKind {
        let enumerable = self.enumerable();
        let is_object = self.value_type() == "object";
        let subtype = self.value_subtype();

        if (enumerable && !is_object) || subtype == "null" {
            PropertyKind::Primitive
        } else if enumerable && is_object && subtype == "array" {
            PropertyKind::Array
        } else if enumerable && is_object {
            PropertyKind::Object
        } else {
            PropertyKind::Skipped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn view(raw: &Value) -> PropertyView<'_> {
        PropertyView::new(raw)
    }

    #[test]
    fn classifies_inline_string_as_primitive() {
        let raw = json!({
            "name": "unique_id",
            "enumerable": true,
            "value": { "type": "string", "value": "main" },
        });
        assert_eq!(view(&raw).kind(), PropertyKind::Primitive);
        assert_eq!(view(&raw).primitive(), json!("main"));
    }

    #[test]
    fn classifies_null_subtype_as_primitive() {
        // `null` results carry subtype "null"; they must materialize as null
        // even for descriptors the page marks non-enumerable.
        let raw = json!({
            "name": "unique_class_combination",
            "enumerable": false,
            "value": { "type": "object", "subtype": "null", "value": null },
        });
        assert_eq!(view(&raw).kind(), PropertyKind::Primitive);
        assert_eq!(view(&raw).primitive(), Value::Null);
    }

    #[test]
    fn classifies_nested_object() {
        let raw = json!({
            "name": "details",
            "enumerable": true,
            "value": { "type": "object", "objectId": "obj-7" },
        });
        assert_eq!(view(&raw).kind(), PropertyKind::Object);
        assert_eq!(
            view(&raw).object_id(),
            Some(RemoteObjectId("obj-7".to_string()))
        );
    }

    #[test]
    fn classifies_array() {
        let raw = json!({
            "name": "items",
            "enumerable": true,
            "value": { "type": "object", "subtype": "array", "objectId": "obj-8" },
        });
        assert_eq!(view(&raw).kind(), PropertyKind::Array);
    }

    #[test]
    fn skips_non_enumerable_functions() {
        let raw = json!({
            "name": "toString",
            "enumerable": false,
            "value": { "type": "function", "objectId": "obj-9" },
        });
        assert_eq!(view(&raw).kind(), PropertyKind::Skipped);
    }
}
