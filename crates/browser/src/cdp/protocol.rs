//! CDP protocol types
//!
//! The fundamental frame types for DevTools communication. Kept minimal;
//! domain-specific payloads stay as `serde_json::Value` and are decoded where
//! they are used.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request ID - monotonically increasing per connection.
pub type RequestId = u64;

/// Target ID from the browser.
pub type TargetId = String;

/// Session ID for attached targets.
pub type SessionId = String;

/// CDP request sent to the browser.
#[derive(Debug, Clone, Serialize)]
pub struct CDPRequest {
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

/// CDP response from the browser.
#[derive(Debug, Clone, Deserialize)]
pub struct CDPResponse {
    pub id: RequestId,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<CDPRemoteError>,
}

/// Error object carried inside a CDP response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CDPRemoteError {
    pub code: i32,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// CDP event from the browser (no request ID).
#[derive(Debug, Clone, Deserialize)]
pub struct CDPEvent {
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<SessionId>,
}

/// Unified incoming CDP message: response or event.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CDPMessage {
    Response(CDPResponse),
    Event(CDPEvent),
}

/// Target info from `Target.getTargets` / `Target.getTargetInfo`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetInfo {
    #[serde(rename = "targetId")]
    pub target_id: TargetId,
    #[serde(rename = "type")]
    pub target_type: String,
    pub title: String,
    pub url: String,
    pub attached: bool,
}

impl TargetInfo {
    /// True for ordinary page targets (not workers, extensions, devtools).
    pub fn is_page(&self) -> bool {
        self.target_type == "page"
    }

    /// True when this target looks like an unused placeholder tab.
    pub fn is_empty_page(&self) -> bool {
        self.is_page() && (self.url == "chrome://newtab/" || self.url == "about:blank")
    }
}

/// Result of `Target.attachToTarget`.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachToTargetResult {
    #[serde(rename = "sessionId")]
    pub session_id: SessionId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn response_parses_from_untagged_message() {
        let raw = r#"{"id": 3, "result": {"frameId": "F1", "loaderId": "L1"}}"#;
        let msg: CDPMessage = serde_json::from_str(raw).unwrap();
        match msg {
            CDPMessage::Response(resp) => {
                assert_eq!(resp.id, 3);
                assert_eq!(resp.result.unwrap()["frameId"], "F1");
                assert!(resp.error.is_none());
            }
            CDPMessage::Event(_) => panic!("expected response"),
        }
    }

    #[test]
    fn event_parses_from_untagged_message() {
        let raw = r#"{"method": "Page.loadEventFired", "params": {"timestamp": 1.5}, "sessionId": "S1"}"#;
        let msg: CDPMessage = serde_json::from_str(raw).unwrap();
        match msg {
            CDPMessage::Event(event) => {
                assert_eq!(event.method, "Page.loadEventFired");
                assert_eq!(event.session_id.as_deref(), Some("S1"));
                assert_eq!(event.params.unwrap()["timestamp"], 1.5);
            }
            CDPMessage::Response(_) => panic!("expected event"),
        }
    }

    #[test]
    fn error_response_carries_code_and_message() {
        let raw = r#"{"id": 9, "error": {"code": -32000, "message": "Not allowed", "data": "x"}}"#;
        let msg: CDPMessage = serde_json::from_str(raw).unwrap();
        match msg {
            CDPMessage::Response(resp) => {
                let err = resp.error.unwrap();
                assert_eq!(err.code, -32000);
                assert_eq!(err.message, "Not allowed");
            }
            CDPMessage::Event(_) => panic!("expected response"),
        }
    }

    #[test]
    fn request_serializes_without_empty_fields() {
        let request = CDPRequest {
            id: 1,
            method: "Browser.getVersion".to_string(),
            params: None,
            session_id: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("params").is_none());
        assert!(json.get("sessionId").is_none());
    }

    #[test]
    fn request_serializes_session_id_in_camel_case() {
        let request = CDPRequest {
            id: 2,
            method: "Page.enable".to_string(),
            params: Some(json!({})),
            session_id: Some("S7".to_string()),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["sessionId"], "S7");
    }

    #[test]
    fn empty_page_detection() {
        let mut info = TargetInfo {
            target_id: "T".to_string(),
            target_type: "page".to_string(),
            title: String::new(),
            url: "chrome://newtab/".to_string(),
            attached: false,
        };
        assert!(info.is_empty_page());
        info.url = "about:blank".to_string();
        assert!(info.is_empty_page());
        info.url = "https://example.com".to_string();
        assert!(!info.is_empty_page());
        info.target_type = "background_page".to_string();
        assert!(!info.is_page());
    }
}
