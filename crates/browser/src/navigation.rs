//! Navigation outcome tracking
//!
//! One [`NavigationOutcome`] is produced per `navigate()` call. While the
//! call is in flight, event handlers write into the outcome through
//! [`TabState`], the per-tab state machine. `TabState::reset` is the single
//! re-arm point: it clears every correlation field at the start of a
//! navigation so that late events from a previous page load can never leak
//! into the new outcome.
//!
//! Correlation model: the first network request observed after re-arming is
//! "the" primary request of the navigation. Only events carrying that
//! request id can decide success or failure; asset and XHR requests are
//! ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use dom::BackendNodeId;

/// Fixed reason recorded when the navigate command itself times out.
pub const FAILED_REASON_TIMEOUT: &str = "Page.navigate() timed out.";

/// Fixed reason prefix recorded when the primary request fails at the
/// network layer.
pub const FAILED_REASON_LOADING: &str = "Loading failed.";

/// Classes of navigation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The navigate command did not complete within its timeout.
    NavigationTimeout,
    /// The primary request resolved with a 4xx/5xx status.
    HttpStatus,
    /// The primary request failed at the network layer (DNS, TLS, reset).
    Loading,
    /// Any other error while orchestrating the navigation.
    Unexpected,
}

/// Case-insensitive HTTP header map. Keys are folded to lowercase on insert
/// and lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers {
    map: ahash::AHashMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `headers` object of `Network.responseReceived`.
    pub fn from_json(value: &Value) -> Self {
        let mut headers = Self::new();
        if let Some(object) = value.as_object() {
            for (name, value) in object {
                if let Some(value) = value.as_str() {
                    headers.insert(name, value);
                }
            }
        }
        headers
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        self.map.insert(name.to_ascii_lowercase(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// One hop of an in-document redirect chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectHop {
    pub url: String,
    pub root_frame: bool,
}

/// Result record of one `navigate()` call.
///
/// Mutated by event handlers while the call is in flight; a clone is handed
/// to the caller when `navigate()` returns, after which the stored copy is
/// only touched again by the next `reset`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigationOutcome {
    pub url: String,
    pub status_code: Option<u16>,
    pub headers: Headers,
    /// In-document redirect hops, in observation order. Recording stops the
    /// instant the load event fires.
    pub redirects: Vec<RedirectHop>,

    pub failed: bool,
    pub failure: Option<FailureKind>,
    pub failed_reason: Option<String>,
    /// Error type name or browser-supplied error text.
    pub failed_detail: Option<String>,
    /// Debug rendering of the underlying error, when one exists.
    pub failed_trace: Option<String>,

    /// The load event did not fire in time. A soft condition: the page may
    /// still be usable, and it never coexists with `failed`.
    pub stopped_waiting: bool,
    pub stopped_waiting_reason: Option<String>,
}

impl NavigationOutcome {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn add_redirect(&mut self, url: impl Into<String>, root_frame: bool) {
        self.redirects.push(RedirectHop {
            url: url.into(),
            root_frame,
        });
    }

    /// Mark this navigation as failed. A hard failure supersedes a prior
    /// soft stop, so `stopped_waiting` is cleared.
    pub fn set_failed(
        &mut self,
        kind: FailureKind,
        reason: impl Into<String>,
        detail: Option<String>,
        trace: Option<String>,
    ) {
        self.failed = true;
        self.failure = Some(kind);
        self.failed_reason = Some(reason.into());
        self.failed_detail = detail;
        self.failed_trace = trace;
        self.stopped_waiting = false;
        self.stopped_waiting_reason = None;
    }

    /// Mark the load-event wait as expired. No-op once the navigation has
    /// already failed hard.
    pub fn set_stopped_waiting(&mut self, reason: impl Into<String>) {
        if self.failed {
            return;
        }
        self.stopped_waiting = true;
        self.stopped_waiting_reason = Some(reason.into());
    }
}

/// Per-tab state machine written to by event handlers.
///
/// The correlation fields (`loaded`, `primary_request`, `frame_id`,
/// `record_redirects`, `outcome`) belong to the navigation in flight and are
/// re-armed by [`reset`](Self::reset). The remaining fields live as long as
/// the tab: the execution context tracks the current root frame regardless
/// of navigations, and the selected node belongs to inspect mode.
#[derive(Debug, Default)]
pub struct TabState {
    pub loaded: bool,
    pub primary_request: Option<String>,
    pub frame_id: Option<String>,
    pub record_redirects: bool,
    pub outcome: NavigationOutcome,

    pub execution_context: Option<i64>,
    pub selected_node: Option<BackendNodeId>,
}

impl TabState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-arm for a new navigation. Everything a stale event could be
    /// matched against is cleared here, in one place.
    pub fn reset(&mut self, url: &str) {
        self.loaded = false;
        self.primary_request = None;
        self.frame_id = None;
        self.record_redirects = true;
        self.outcome = NavigationOutcome::new(url);
    }

    /// `Network.requestWillBeSent`: the first request after re-arming is the
    /// primary request; its frame is the root frame of this navigation.
    pub fn on_request_will_be_sent(&mut self, request_id: &str, frame_id: Option<&str>) {
        if self.primary_request.is_none() {
            self.primary_request = Some(request_id.to_string());
        }
        if self.frame_id.is_none() {
            self.frame_id = Some(frame_id.unwrap_or("").to_string());
        }
    }

    /// `Network.responseReceived`: headers and status are stored before any
    /// failure decision, so a 4xx/5xx outcome still carries its headers.
    pub fn on_response_received(&mut self, request_id: &str, status: i64, headers: &Value) {
        if self.primary_request.as_deref() != Some(request_id) {
            return;
        }
        self.outcome.headers = Headers::from_json(headers);
        self.outcome.status_code = u16::try_from(status).ok();
        if (400..600).contains(&status) {
            self.outcome.set_failed(
                FailureKind::HttpStatus,
                format!("Received HTTP error status code {status}."),
                Some(status.to_string()),
                None,
            );
        }
    }

    /// `Network.loadingFailed` on the primary request.
    pub fn on_loading_failed(&mut self, request_id: &str, error_text: &str) {
        if self.primary_request.as_deref() != Some(request_id) {
            return;
        }
        self.outcome.set_failed(
            FailureKind::Loading,
            FAILED_REASON_LOADING,
            Some(error_text.to_string()),
            None,
        );
    }

    /// `Page.navigatedWithinDocument`: recorded only while the navigation is
    /// still in its redirect phase.
    pub fn on_navigated_within_document(&mut self, url: &str, frame_id: &str) {
        let root_frame = self.frame_id.as_deref() == Some(frame_id);
        if self.record_redirects {
            self.outcome.add_redirect(url, root_frame);
        }
    }

    /// `Page.loadEventFired`: flip the loaded flag and stop redirect
    /// recording. Deliberately nothing else - failure state is not inspected
    /// here.
    pub fn on_load_event_fired(&mut self) {
        self.loaded = true;
        self.record_redirects = false;
    }

    /// `Runtime.executionContextCreated`: remember the default context of
    /// the root frame for later script calls.
    pub fn on_execution_context_created(&mut self, context: &Value) {
        let aux = &context["auxData"];
        let frame_matches = aux
            .get("frameId")
            .and_then(Value::as_str)
            .map(|frame_id| self.frame_id.as_deref() == Some(frame_id))
            .unwrap_or(false);
        if frame_matches && aux.get("type").and_then(Value::as_str) == Some("default") {
            self.execution_context = context.get("id").and_then(Value::as_i64);
        }
    }

    /// `Overlay.inspectNodeRequested`: the user clicked a node in inspect
    /// mode.
    pub fn on_inspect_node_requested(&mut self, backend_node_id: i64) {
        self.selected_node = Some(BackendNodeId(backend_node_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn armed_state(url: &str) -> TabState {
        let mut state = TabState::new();
        state.reset(url);
        state
    }

    #[test]
    fn first_request_becomes_primary() {
        let mut state = armed_state("https://example.com");
        state.on_request_will_be_sent("req-1", Some("frame-1"));
        state.on_request_will_be_sent("req-2", Some("frame-2"));

        assert_eq!(state.primary_request.as_deref(), Some("req-1"));
        assert_eq!(state.frame_id.as_deref(), Some("frame-1"));
    }

    #[test]
    fn error_status_on_primary_request_fails_with_headers() {
        let mut state = armed_state("https://example.com");
        state.on_request_will_be_sent("req-1", Some("frame-1"));
        state.on_response_received(
            "req-1",
            500,
            &json!({ "Content-Type": "text/html", "X-Powered-By": "php" }),
        );

        let outcome = &state.outcome;
        assert!(outcome.failed);
        assert_eq!(outcome.failure, Some(FailureKind::HttpStatus));
        assert!(outcome.failed_reason.as_deref().unwrap().contains("500"));
        assert_eq!(outcome.status_code, Some(500));
        assert_eq!(outcome.headers.get("content-type"), Some("text/html"));
        assert_eq!(outcome.headers.get("CONTENT-TYPE"), Some("text/html"));
    }

    #[test]
    fn success_status_on_primary_request_only_records() {
        let mut state = armed_state("https://example.com");
        state.on_request_will_be_sent("req-1", Some("frame-1"));
        state.on_response_received("req-1", 200, &json!({ "Content-Type": "text/html" }));

        assert!(!state.outcome.failed);
        assert_eq!(state.outcome.status_code, Some(200));
        assert_eq!(state.outcome.headers.len(), 1);
    }

    #[test]
    fn secondary_request_events_never_affect_the_outcome() {
        let mut state = armed_state("https://example.com");
        state.on_request_will_be_sent("req-1", Some("frame-1"));
        state.on_response_received("req-2", 500, &json!({}));
        state.on_loading_failed("req-3", "net::ERR_CONNECTION_RESET");

        assert!(!state.outcome.failed);
        assert!(state.outcome.headers.is_empty());
    }

    #[test]
    fn loading_failed_on_primary_request_records_browser_error_text() {
        let mut state = armed_state("https://example.com");
        state.on_request_will_be_sent("req-1", Some("frame-1"));
        state.on_loading_failed("req-1", "net::ERR_NAME_NOT_RESOLVED");

        let outcome = &state.outcome;
        assert!(outcome.failed);
        assert_eq!(outcome.failure, Some(FailureKind::Loading));
        assert_eq!(outcome.failed_reason.as_deref(), Some(FAILED_REASON_LOADING));
        assert_eq!(
            outcome.failed_detail.as_deref(),
            Some("net::ERR_NAME_NOT_RESOLVED")
        );
    }

    #[test]
    fn stale_events_after_reset_do_not_corrupt_the_new_outcome() {
        let mut state = armed_state("https://first.example");
        state.on_request_will_be_sent("req-1", Some("frame-1"));

        // Second navigation begins; the first page's response arrives late.
        state.reset("https://second.example");
        state.on_response_received("req-1", 500, &json!({ "Content-Type": "text/html" }));

        assert!(!state.outcome.failed);
        assert!(state.outcome.headers.is_empty());
        assert_eq!(state.outcome.url, "https://second.example");

        // The new navigation's own primary request still works.
        state.on_request_will_be_sent("req-9", Some("frame-9"));
        state.on_response_received("req-9", 200, &json!({}));
        assert_eq!(state.outcome.status_code, Some(200));
    }

    #[test]
    fn redirects_record_in_order_and_stop_at_load() {
        let mut state = armed_state("https://example.com");
        state.on_request_will_be_sent("req-1", Some("frame-1"));
        state.on_navigated_within_document("https://example.com/a", "frame-1");
        state.on_navigated_within_document("https://example.com/b", "iframe-7");
        state.on_load_event_fired();
        state.on_navigated_within_document("https://example.com/c", "frame-1");

        let redirects = &state.outcome.redirects;
        assert_eq!(redirects.len(), 2);
        assert_eq!(redirects[0].url, "https://example.com/a");
        assert!(redirects[0].root_frame);
        assert_eq!(redirects[1].url, "https://example.com/b");
        assert!(!redirects[1].root_frame);
    }

    #[test]
    fn load_event_only_flips_flags() {
        let mut state = armed_state("https://example.com");
        state.on_request_will_be_sent("req-1", Some("frame-1"));
        state.on_response_received("req-1", 404, &json!({}));
        state.on_load_event_fired();

        // Failure state untouched by the load handler.
        assert!(state.outcome.failed);
        assert!(state.loaded);
        assert!(!state.record_redirects);
    }

    #[test]
    fn stopped_waiting_and_failed_are_mutually_exclusive() {
        let mut outcome = NavigationOutcome::new("https://example.com");
        outcome.set_stopped_waiting("load event");
        assert!(outcome.stopped_waiting);
        assert!(!outcome.failed);

        // A later hard failure supersedes the soft stop.
        outcome.set_failed(FailureKind::Unexpected, "boom", None, None);
        assert!(outcome.failed);
        assert!(!outcome.stopped_waiting);

        // And a soft stop cannot be recorded over a failure.
        outcome.set_stopped_waiting("load event");
        assert!(!outcome.stopped_waiting);
    }

    #[test]
    fn execution_context_tracks_only_the_root_frame_default_context() {
        let mut state = armed_state("https://example.com");
        state.on_request_will_be_sent("req-1", Some("frame-1"));

        state.on_execution_context_created(&json!({
            "id": 3,
            "auxData": { "frameId": "iframe-2", "type": "default" },
        }));
        assert_eq!(state.execution_context, None);

        state.on_execution_context_created(&json!({
            "id": 4,
            "auxData": { "frameId": "frame-1", "type": "isolated" },
        }));
        assert_eq!(state.execution_context, None);

        state.on_execution_context_created(&json!({
            "id": 5,
            "auxData": { "frameId": "frame-1", "type": "default" },
        }));
        assert_eq!(state.execution_context, Some(5));
    }

    #[test]
    fn execution_context_survives_rearming() {
        let mut state = armed_state("https://example.com");
        state.on_request_will_be_sent("req-1", Some("frame-1"));
        state.on_execution_context_created(&json!({
            "id": 5,
            "auxData": { "frameId": "frame-1", "type": "default" },
        }));

        state.reset("https://second.example");
        assert_eq!(state.execution_context, Some(5));
        assert!(state.primary_request.is_none());
        assert!(state.frame_id.is_none());
        assert!(!state.loaded);
        assert!(state.record_redirects);
    }

    #[test]
    fn headers_fold_key_case() {
        let headers = Headers::from_json(&json!({
            "Content-Type": "text/html",
            "SERVER": "nginx",
        }));
        assert_eq!(headers.get("content-type"), Some("text/html"));
        assert_eq!(headers.get("Server"), Some("nginx"));
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn outcome_round_trips_through_serde() {
        let mut outcome = NavigationOutcome::new("https://example.com");
        outcome.status_code = Some(301);
        outcome.add_redirect("https://example.com/home", true);
        let json = serde_json::to_string(&outcome).unwrap();
        let back: NavigationOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(back, outcome);
    }
}
