//! Tab controller
//!
//! Turns the asynchronous CDP event stream of one tab into a small set of
//! blocking operations with bounded wait times. All navigation bookkeeping
//! lives in [`TabState`]; the handlers registered here only parse event
//! payloads, filter by session, and forward into the state machine.
//!
//! Failure policy: `navigate` never returns an error - everything that goes
//! wrong is folded into the [`NavigationOutcome`]. Content accessors recover
//! to `None` (a node detaching between acquiring a handle and using it is an
//! expected race, not an error). Capture, overlay, and viewport operations
//! return `Result`.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use serde_json::{json, Value};

use dom::{
    attributes_from_pairs, AttributeMap, BackendNodeId, BoundingBox, BoxModel, NodeId,
    PropertyKind, PropertyView, RemoteObjectId, UniqueSelectors,
};

use crate::cdp::client::{CDPClient, CDPError, Subscription};
use crate::cdp::protocol::{CDPEvent, SessionId, TargetId};
use crate::cdp::CDPSession;
use crate::config::TabConfig;
use crate::error::{BrowserError, Result};
use crate::navigation::{FailureKind, NavigationOutcome, TabState, FAILED_REASON_TIMEOUT};
use crate::screenshot::{self, CaptureFormat, ClipRect, ScreenshotTile};
use crate::wait::poll_until;

/// Protocol domains a tab needs events from.
const TAB_DOMAINS: &[&str] = &["Network", "Page", "DOM", "Runtime", "Overlay"];

const JS_INNER_TEXT: &str = r#"
    function getInnerText(elem) {
        if (!elem) elem = this;
        return elem.innerText;
    }"#;

const JS_SCROLL_INTO_VIEW: &str = r#"
    async function scrollIntoView(element) {
        if (!element) element = this;

        if (!element.isConnected)
            return 'Node is detached from document';
        if (element.nodeType !== Node.ELEMENT_NODE)
            return 'Node is not of type HTMLElement';
        const visibleRatio = await new Promise(resolve => {
            const observer = new IntersectionObserver(entries => {
                resolve(entries[0].intersectionRatio);
                observer.disconnect();
            });
            observer.observe(element);
        });
        if (visibleRatio !== 1.0)
            element.scrollIntoView({
                block: 'center',
                inline: 'center',
                behavior: 'instant',
            });
        return false;
    }"#;

const JS_UNIQUE_SELECTOR: &str = r#"
    function uniqueSelector(elem) {
        if (!elem) elem = this;

        function getUniqueId(elem) {
            let id = elem.getAttribute('id')
            if (id) {
                let selector = '[id="' + id.replace(/"/g, '\\"') + '"]';
                if (document.querySelectorAll(selector).length == 1) {
                    return id;
                }
            }
            return null;
        }

        function getUniqueClassCombination(elem) {
            let className = elem.className
            if (className
                && document.getElementsByClassName(className).length == 1) {
                return className;
            }
            return null;
        }

        function getUniqueAttributeCombination(elem) {
            let attributes = Array.from(elem.attributes);
            let selector = '';
            for (var i = 0; i < attributes.length; i++) {
                let attribute = attributes[i];
                if (attribute.nodeName == 'style' || !attribute.nodeValue) {
                    continue;
                }
                selector += '[' + attribute.nodeName + '="'
                    + attribute.nodeValue.replace(/"/g, '\\"') + '"]';
            }
            if (selector && document.querySelectorAll(selector).length == 1) {
                return selector;
            }
            return null;
        }

        return {
            'name': elem.nodeName,
            'unique_id': getUniqueId(elem),
            'unique_class_combination': getUniqueClassCombination(elem),
            'unique_attribute_selector': getUniqueAttributeCombination(elem),
        };
    }"#;

const JS_SCROLL_PERCENT: &str = r#"
    (function getScrollPercent() {
        var h = document.documentElement,
            b = document.body,
            st = 'scrollTop',
            sh = 'scrollHeight';
        return (h[st]||b[st]) / ((h[sh]||b[sh]) - h.clientHeight) * 100;
    })();"#;

const JS_SCROLL_TO_POSITION: &str = r#"
    function scrollToPosition(x, y) {
        window.scrollTo(x, y);
    }"#;

const JS_SCROLL_TO_PERCENTAGE: &str = r#"
    function scrollToPercentage(percentage) {
        var h = document.documentElement,
            b = document.body,
            sh = 'scrollHeight';
        var height = h[sh]||b[sh];
        y = height * (percentage / 100.0);
        window.scrollTo(0, y);
    }"#;

/// Options of one `navigate` call.
#[derive(Debug, Clone)]
pub struct NavigateOptions {
    /// Block until the load event fires (or the load-event timeout expires).
    pub wait: bool,
    /// Hard timeout of the navigate command itself.
    pub timeout: Duration,
}

impl Default for NavigateOptions {
    fn default() -> Self {
        Self {
            wait: true,
            timeout: Duration::from_secs(10),
        }
    }
}

/// One browser tab, driven through its flattened CDP session.
pub struct Tab {
    session: CDPSession,
    state: Arc<Mutex<TabState>>,
    subscriptions: Vec<Subscription>,
    config: TabConfig,
}

impl Tab {
    /// Attach to a target: register event handlers first, then enable the
    /// protocol domains, so no early event is lost.
    pub(crate) async fn attach(
        client: Arc<CDPClient>,
        target_id: TargetId,
        config: TabConfig,
    ) -> Result<Self> {
        let session = CDPSession::attach(Arc::clone(&client), target_id).await?;
        let state = Arc::new(Mutex::new(TabState::new()));
        let subscriptions = register_handlers(&client, &state, &session.session_id);

        session.enable_domains(TAB_DOMAINS).await?;

        Ok(Self {
            session,
            state,
            subscriptions,
            config,
        })
    }

    pub fn target_id(&self) -> &TargetId {
        &self.session.target_id
    }

    /// Stop this tab's event stream and release its session. Called by
    /// `BrowserSession::close_tab`; safe to call more than once.
    pub(crate) async fn detach(&mut self) {
        for subscription in self.subscriptions.drain(..) {
            self.session.client().unsubscribe(&subscription);
        }
        if let Err(e) = self.session.detach().await {
            tracing::warn!(target_id = %self.session.target_id, error = %e, "detach failed");
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, TabState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the most recent navigation's outcome.
    pub fn last_outcome(&self) -> NavigationOutcome {
        self.lock_state().outcome.clone()
    }

    ////////////////////////////////////////////////////////////////////////
    // NAVIGATION
    ////////////////////////////////////////////////////////////////////////

    /// Navigate with default options (wait for load, 10 s command timeout).
    pub async fn navigate(&mut self, url: &str) -> NavigationOutcome {
        self.navigate_with(url, NavigateOptions::default()).await
    }

    /// Navigate to `url` and return the outcome once the page settled,
    /// failed, or the wait was given up on.
    ///
    /// Never returns an error: runtime failures are folded into the outcome
    /// so callers can log them and move on to the next URL. The returned
    /// record is a snapshot; later events cannot mutate it.
    pub async fn navigate_with(&mut self, url: &str, options: NavigateOptions) -> NavigationOutcome {
        self.lock_state().reset(url);
        tracing::debug!(target_id = %self.session.target_id, url, "navigating");

        if let Err(e) = self.drive_navigation(url, &options).await {
            let mut state = self.lock_state();
            match &e {
                BrowserError::Cdp(CDPError::Timeout { .. }) => {
                    state.outcome.set_failed(
                        FailureKind::NavigationTimeout,
                        FAILED_REASON_TIMEOUT,
                        Some(e.kind_name().to_string()),
                        None,
                    );
                }
                _ => {
                    state.outcome.set_failed(
                        FailureKind::Unexpected,
                        e.to_string(),
                        Some(e.kind_name().to_string()),
                        Some(format!("{e:?}")),
                    );
                }
            }
        }

        let outcome = self.lock_state().outcome.clone();
        if outcome.failed {
            tracing::debug!(
                url,
                reason = outcome.failed_reason.as_deref().unwrap_or(""),
                "navigation failed"
            );
        }
        outcome
    }

    async fn drive_navigation(&self, url: &str, options: &NavigateOptions) -> Result<()> {
        self.session
            .send_with_timeout("Page.navigate", Some(json!({ "url": url })), options.timeout)
            .await?;

        // An event handler may have flagged a failure while the command ran.
        if self.lock_state().outcome.failed {
            return Ok(());
        }

        if options.wait {
            let state = Arc::clone(&self.state);
            let loaded = poll_until(
                self.config.poll_interval,
                Some(self.config.load_event_timeout),
                move || state.lock().unwrap_or_else(PoisonError::into_inner).loaded,
            )
            .await;
            if !loaded {
                // Soft stop: the page may still be usable. The load itself
                // keeps running.
                self.lock_state().outcome.set_stopped_waiting("load event");
            }

            // Let page scripts run before the caller starts poking the DOM.
            tokio::time::sleep(self.config.js_settle).await;
        }

        // Fetching the document root doubles as a readiness check.
        self.session.send("DOM.getDocument", None).await?;
        Ok(())
    }

    ////////////////////////////////////////////////////////////////////////
    // NODES
    ////////////////////////////////////////////////////////////////////////

    /// Root node of the current document.
    pub async fn root_node(&self) -> Option<Value> {
        match self.session.send("DOM.getDocument", None).await {
            Ok(result) => result.get("root").cloned(),
            Err(e) => {
                tracing::debug!(error = %e, "failed to fetch document root");
                None
            }
        }
    }

    /// First node matching a CSS selector, searched from the document root.
    pub async fn node_by_selector(&self, selector: &str) -> Option<NodeId> {
        let root = self.root_node().await?;
        let root_id = root.get("nodeId")?.as_i64()?;
        let result = self
            .session
            .send(
                "DOM.querySelector",
                Some(json!({ "nodeId": root_id, "selector": selector })),
            )
            .await
            .ok()?;
        match result.get("nodeId")?.as_i64()? {
            0 => None,
            node_id => Some(NodeId(node_id)),
        }
    }

    pub async fn outer_html(&self, node_id: NodeId) -> Option<String> {
        let result = self
            .session
            .send("DOM.getOuterHTML", Some(json!({ "nodeId": node_id.0 })))
            .await
            .ok()?;
        result.get("outerHTML")?.as_str().map(str::to_string)
    }

    pub async fn outer_html_of_backend_node(&self, id: BackendNodeId) -> Option<String> {
        let result = self
            .session
            .send("DOM.getOuterHTML", Some(json!({ "backendNodeId": id.0 })))
            .await
            .ok()?;
        result.get("outerHTML")?.as_str().map(str::to_string)
    }

    /// Outer HTML of the whole document.
    pub async fn html(&self) -> Option<String> {
        let root = self.root_node().await?;
        let node_id = root.get("nodeId")?.as_i64()?;
        self.outer_html(NodeId(node_id)).await
    }

    pub async fn text_of_node(&self, node_id: NodeId) -> Option<String> {
        let object_id = self.resolve_node(node_id).await?;
        self.text_of_remote_object(&object_id).await
    }

    pub async fn text_of_backend_node(&self, id: BackendNodeId) -> Option<String> {
        let object_id = self.resolve_backend_node(id).await?;
        self.text_of_remote_object(&object_id).await
    }

    async fn text_of_remote_object(&self, object_id: &RemoteObjectId) -> Option<String> {
        let result = self
            .call_function_on_object(object_id, JS_INNER_TEXT)
            .await
            .ok()?;
        result.get("result")?.get("value")?.as_str().map(str::to_string)
    }

    pub async fn box_model_of_backend_node(&self, id: BackendNodeId) -> Option<BoxModel> {
        let result = self
            .session
            .send("DOM.getBoxModel", Some(json!({ "backendNodeId": id.0 })))
            .await
            .ok()?;
        BoxModel::from_json(result.get("model")?).ok()
    }

    /// Bounding box of a node's border quad, in viewport-local coordinates.
    pub async fn bounding_box_of_backend_node(&self, id: BackendNodeId) -> Option<BoundingBox> {
        Some(self.box_model_of_backend_node(id).await?.bounding_box())
    }

    /// Bounding box in absolute page coordinates (local box plus the current
    /// scroll offset of the visual viewport).
    pub async fn page_bounding_box_of_backend_node(
        &self,
        id: BackendNodeId,
    ) -> Option<BoundingBox> {
        let local = self.bounding_box_of_backend_node(id).await?;
        let metrics = self.layout_metrics().await.ok()?;
        let viewport = visual_viewport_rect(&metrics).ok()?;
        Some(local.translated(viewport.x, viewport.y))
    }

    pub async fn attributes_of_backend_node(&self, id: BackendNodeId) -> Option<AttributeMap> {
        let result = self
            .session
            .send("DOM.describeNode", Some(json!({ "backendNodeId": id.0 })))
            .await
            .ok()?;
        let attributes = result.get("node")?.get("attributes")?.as_array()?;
        Some(attributes_from_pairs(attributes))
    }

    /// Scroll a node into the center of the viewport. Best effort.
    pub async fn scroll_into_view(&self, id: BackendNodeId) {
        let Some(object_id) = self.resolve_backend_node(id).await else {
            return;
        };
        if let Err(e) = self.call_function_on_object(&object_id, JS_SCROLL_INTO_VIEW).await {
            tracing::debug!(error = %e, "scroll_into_view failed");
        }
    }

    /// Probe the node for selectors that identify it uniquely: an `id`
    /// attribute, the full class combination, or a conjunction of all
    /// non-style attributes. Candidates that match more than one element
    /// come back as `None`.
    pub async fn unique_selectors_of_backend_node(
        &self,
        id: BackendNodeId,
    ) -> Option<UniqueSelectors> {
        let object_id = self.resolve_backend_node(id).await?;
        let result = self
            .call_function_on_object(&object_id, JS_UNIQUE_SELECTOR)
            .await
            .ok()?;
        let result_id = result.get("result")?.get("objectId")?.as_str()?;
        let value = self
            .remote_object_value(&RemoteObjectId(result_id.to_string()))
            .await?;
        serde_json::from_value(value).ok()
    }

    ////////////////////////////////////////////////////////////////////////
    // SCROLLING
    ////////////////////////////////////////////////////////////////////////

    /// Current scroll position as a percentage of the scrollable height.
    pub async fn scroll_percentage(&self) -> Option<f64> {
        let result = self
            .session
            .send(
                "Runtime.evaluate",
                Some(json!({ "expression": JS_SCROLL_PERCENT, "silent": true })),
            )
            .await
            .ok()?;
        result.get("result")?.get("value")?.as_f64()
    }

    pub async fn scroll_to_position(&self, x: f64, y: f64) {
        self.call_in_page_context(
            JS_SCROLL_TO_POSITION,
            vec![json!({ "value": x }), json!({ "value": y })],
        )
        .await;
    }

    pub async fn scroll_to_percentage(&self, percentage: f64) {
        self.call_in_page_context(JS_SCROLL_TO_PERCENTAGE, vec![json!({ "value": percentage })])
            .await;
    }

    pub async fn scroll_to_top(&self) {
        self.scroll_to_position(0.0, 0.0).await;
    }

    ////////////////////////////////////////////////////////////////////////
    // SNAPSHOT / SCREENSHOT
    ////////////////////////////////////////////////////////////////////////

    /// Override the visible viewport size.
    pub async fn set_viewport(&self, width: u32, height: u32) -> Result<()> {
        self.session
            .send(
                "Emulation.setDeviceMetricsOverride",
                Some(json!({
                    "width": width,
                    "height": height,
                    "deviceScaleFactor": 1,
                    "mobile": false,
                })),
            )
            .await?;
        Ok(())
    }

    pub async fn reset_viewport(&self) -> Result<()> {
        self.session
            .send("Emulation.clearDeviceMetricsOverride", None)
            .await?;
        Ok(())
    }

    /// MHTML snapshot of the page.
    pub async fn snapshot(&self) -> Result<String> {
        let result = self.session.send("Page.captureSnapshot", None).await?;
        result
            .get("data")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                BrowserError::InvalidPayload("captureSnapshot returned no data".to_string())
            })
    }

    /// Full-page screenshot, lossless, stitched when the content is taller
    /// than the capture ceiling.
    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        // Measured from the top, fixed elements sit at their natural
        // position instead of floating mid-slice.
        self.scroll_to_top().await;
        tokio::time::sleep(self.config.scroll_settle).await;

        let metrics = self.layout_metrics().await?;
        let (width, height) = content_size(&metrics)?;
        self.capture(ClipRect::new(0.0, 0.0, width, height), CaptureFormat::Png, true)
            .await
    }

    /// Screenshot of the currently visible viewport only, quality-bounded.
    pub async fn viewport_screenshot(&self) -> Result<Vec<u8>> {
        let metrics = self.layout_metrics().await?;
        let clip = visual_viewport_rect(&metrics)?;
        let format = CaptureFormat::Jpeg {
            quality: self.config.capture.viewport_jpeg_quality,
        };
        self.capture(clip, format, false).await
    }

    /// Screenshot of a single node.
    ///
    /// A node larger than the visible viewport would be captured
    /// incomplete, so the viewport is temporarily enlarged to twice the
    /// needed size (pushing fixed headers/footers out of frame) and restored
    /// afterwards, even when the capture failed.
    pub async fn screenshot_of_backend_node(&self, id: BackendNodeId) -> Result<Vec<u8>> {
        let bounding = self
            .bounding_box_of_backend_node(id)
            .await
            .ok_or_else(|| BrowserError::Capture("node has no box model".to_string()))?;
        let metrics = self.layout_metrics().await?;
        let viewport = visual_viewport_rect(&metrics)?;

        let mut needs_viewport_reset = false;
        if bounding.exceeds(viewport.width, viewport.height) {
            let width = viewport.width.max(bounding.width.ceil());
            let height = viewport.height.max(bounding.height.ceil());
            self.set_viewport((width * 2.0) as u32, (height * 2.0) as u32)
                .await?;
            needs_viewport_reset = true;
        }

        self.scroll_into_view(id).await;
        let result = self.capture_node_rect(id).await;

        if needs_viewport_reset {
            if let Err(e) = self.reset_viewport().await {
                tracing::warn!(error = %e, "failed to restore viewport after capture");
            }
        }
        result
    }

    async fn capture_node_rect(&self, id: BackendNodeId) -> Result<Vec<u8>> {
        let local = self.bounding_box_of_backend_node(id).await.ok_or_else(|| {
            BrowserError::Capture("node disappeared before capture".to_string())
        })?;
        let metrics = self.layout_metrics().await?;
        let viewport = visual_viewport_rect(&metrics)?;
        let global = local.translated(viewport.x, viewport.y);
        self.capture(
            ClipRect::new(global.x, global.y, global.width, global.height),
            CaptureFormat::Png,
            false,
        )
        .await
    }

    /// Capture a clip, tiling vertically when it exceeds the ceiling and
    /// stitching the tiles back together.
    async fn capture(
        &self,
        clip: ClipRect,
        format: CaptureFormat,
        beyond_viewport: bool,
    ) -> Result<Vec<u8>> {
        let slices = screenshot::plan_slices(&clip, self.config.capture.max_slice_height);
        let mut tiles = Vec::with_capacity(slices.len());

        for slice in slices {
            // Captures of a backgrounded tab come back blank.
            self.session.send("Page.bringToFront", None).await?;

            let mut params = json!({
                "clip": slice.to_params(),
                "captureBeyondViewport": beyond_viewport,
                "fromSurface": true,
            });
            format.apply(&mut params);

            let result = self.session.send("Page.captureScreenshot", Some(params)).await?;
            let data = result.get("data").and_then(Value::as_str).ok_or_else(|| {
                BrowserError::InvalidPayload("captureScreenshot returned no data".to_string())
            })?;
            let bytes = B64.decode(data).map_err(|e| {
                BrowserError::InvalidPayload(format!("capture payload is not base64: {e}"))
            })?;
            tiles.push(ScreenshotTile {
                data: bytes,
                rect: slice,
            });
        }

        if tiles.len() == 1 {
            return Ok(tiles.remove(0).data);
        }
        screenshot::stitch(&tiles)
    }

    ////////////////////////////////////////////////////////////////////////
    // HIGHLIGHT / INSPECTION
    ////////////////////////////////////////////////////////////////////////

    /// Highlight a node with the configured overlay colors.
    pub async fn highlight_node(&self, node_id: NodeId) -> Result<()> {
        self.session
            .send(
                "Overlay.highlightNode",
                Some(json!({
                    "highlightConfig": self.config.highlight.to_json(),
                    "nodeId": node_id.0,
                })),
            )
            .await?;
        Ok(())
    }

    pub async fn highlight_rect(&self, x: i64, y: i64, width: i64, height: i64) -> Result<()> {
        self.session
            .send(
                "Overlay.highlightRect",
                Some(json!({
                    "x": x,
                    "y": y,
                    "width": width,
                    "height": height,
                    "color": self.config.highlight.content.to_json(),
                })),
            )
            .await?;
        Ok(())
    }

    pub async fn hide_highlight(&self) -> Result<()> {
        self.session.send("Overlay.hideHighlight", None).await?;
        Ok(())
    }

    /// Enter inspect mode: the browser highlights hovered nodes until the
    /// user clicks one.
    pub async fn start_node_selection(&self) -> Result<()> {
        self.lock_state().selected_node = None;
        self.session
            .send(
                "Overlay.setInspectMode",
                Some(json!({
                    "mode": "searchForNode",
                    "highlightConfig": self.config.highlight.to_json(),
                })),
            )
            .await?;
        Ok(())
    }

    /// Leave inspect mode. The explicit cancellation path for
    /// [`selected_backend_node`](Self::selected_backend_node).
    pub async fn stop_node_selection(&self) -> Result<()> {
        self.session
            .send(
                "Overlay.setInspectMode",
                Some(json!({
                    "mode": "none",
                    "highlightConfig": self.config.highlight.to_json(),
                })),
            )
            .await?;
        Ok(())
    }

    /// Block until the user clicks a node in inspect mode, then leave the
    /// mode and return the node's stable handle. Bounded only by caller
    /// cancellation.
    pub async fn selected_backend_node(&self) -> Result<BackendNodeId> {
        let state = Arc::clone(&self.state);
        poll_until(self.config.poll_interval, None, move || {
            state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .selected_node
                .is_some()
        })
        .await;

        let selected = self.lock_state().selected_node.take();
        self.stop_node_selection().await?;
        selected.ok_or_else(|| {
            BrowserError::InvalidPayload("inspect mode yielded no node".to_string())
        })
    }

    ////////////////////////////////////////////////////////////////////////
    // REMOTE OBJECTS
    ////////////////////////////////////////////////////////////////////////

    /// Materialize a page-side JavaScript object as plain JSON by walking
    /// its own properties recursively: primitives are taken inline, nested
    /// objects recurse, arrays collect their enumerable elements.
    pub async fn remote_object_value(&self, object_id: &RemoteObjectId) -> Option<Value> {
        self.remote_object_value_inner(object_id.clone()).await
    }

    fn remote_object_value_inner(
        &self,
        object_id: RemoteObjectId,
    ) -> Pin<Box<dyn Future<Output = Option<Value>> + Send + '_>> {
        Box::pin(async move {
            let properties = self.remote_object_properties(&object_id).await?;
            let mut object = serde_json::Map::new();

            for property in &properties {
                let view = PropertyView::new(property);
                let Some(name) = view.name() else { continue };
                match view.kind() {
                    PropertyKind::Primitive => {
                        object.insert(name.to_string(), view.primitive());
                    }
                    PropertyKind::Object => {
                        if let Some(nested_id) = view.object_id() {
                            if let Some(nested) = self.remote_object_value_inner(nested_id).await {
                                object.insert(name.to_string(), nested);
                            }
                        }
                    }
                    PropertyKind::Array => {
                        if let Some(nested_id) = view.object_id() {
                            let elements =
                                self.remote_array_value(&nested_id).await.unwrap_or_default();
                            object.insert(name.to_string(), Value::Array(elements));
                        }
                    }
                    PropertyKind::Skipped => {}
                }
            }

            Some(Value::Object(object))
        })
    }

    async fn remote_array_value(&self, object_id: &RemoteObjectId) -> Option<Vec<Value>> {
        let properties = self.remote_object_properties(object_id).await?;
        Some(
            properties
                .iter()
                .map(PropertyView::new)
                .filter(PropertyView::enumerable)
                .map(|view| view.primitive())
                .collect(),
        )
    }

    async fn remote_object_properties(&self, object_id: &RemoteObjectId) -> Option<Vec<Value>> {
        let result = self
            .session
            .send(
                "Runtime.getProperties",
                Some(json!({ "objectId": object_id.0, "ownProperties": true })),
            )
            .await
            .ok()?;
        result.get("result")?.as_array().cloned()
    }

    async fn resolve_node(&self, node_id: NodeId) -> Option<RemoteObjectId> {
        let result = self
            .session
            .send("DOM.resolveNode", Some(json!({ "nodeId": node_id.0 })))
            .await
            .ok()?;
        let object_id = result.get("object")?.get("objectId")?.as_str()?;
        Some(RemoteObjectId(object_id.to_string()))
    }

    async fn resolve_backend_node(&self, id: BackendNodeId) -> Option<RemoteObjectId> {
        let result = self
            .session
            .send("DOM.resolveNode", Some(json!({ "backendNodeId": id.0 })))
            .await
            .ok()?;
        let object_id = result.get("object")?.get("objectId")?.as_str()?;
        Some(RemoteObjectId(object_id.to_string()))
    }

    async fn call_function_on_object(
        &self,
        object_id: &RemoteObjectId,
        declaration: &str,
    ) -> Result<Value> {
        self.session
            .send(
                "Runtime.callFunctionOn",
                Some(json!({
                    "functionDeclaration": declaration,
                    "objectId": object_id.0,
                    "silent": true,
                })),
            )
            .await
            .map_err(Into::into)
    }

    /// Call a function in the page's root execution context. Best effort:
    /// a missing context (page not navigated yet) or a failing call is
    /// logged and swallowed.
    async fn call_in_page_context(&self, declaration: &str, arguments: Vec<Value>) {
        let context = self.lock_state().execution_context;
        let Some(context) = context else {
            tracing::debug!("no execution context recorded; skipping page call");
            return;
        };
        if let Err(e) = self
            .session
            .send(
                "Runtime.callFunctionOn",
                Some(json!({
                    "functionDeclaration": declaration,
                    "executionContextId": context,
                    "arguments": arguments,
                    "silent": true,
                })),
            )
            .await
        {
            tracing::debug!(error = %e, "page call failed");
        }
    }

    ////////////////////////////////////////////////////////////////////////
    // COORDINATES
    ////////////////////////////////////////////////////////////////////////

    async fn layout_metrics(&self) -> Result<Value> {
        self.session
            .send("Page.getLayoutMetrics", None)
            .await
            .map_err(Into::into)
    }
}

/// Register the event handlers a tab needs, filtered to its own session.
/// Handlers run on the reader task and only forward parsed payloads into the
/// state machine.
fn register_handlers(
    client: &Arc<CDPClient>,
    state: &Arc<Mutex<TabState>>,
    session_id: &SessionId,
) -> Vec<Subscription> {
    vec![
        subscribe_tab_event(
            client,
            state,
            session_id,
            "Network.requestWillBeSent",
            |state, params| {
                if let Some(request_id) = params["requestId"].as_str() {
                    state.on_request_will_be_sent(request_id, params["frameId"].as_str());
                }
            },
        ),
        subscribe_tab_event(
            client,
            state,
            session_id,
            "Network.responseReceived",
            |state, params| {
                let (Some(request_id), Some(status)) = (
                    params["requestId"].as_str(),
                    params["response"]["status"].as_i64(),
                ) else {
                    return;
                };
                state.on_response_received(request_id, status, &params["response"]["headers"]);
            },
        ),
        subscribe_tab_event(
            client,
            state,
            session_id,
            "Network.loadingFailed",
            |state, params| {
                if let Some(request_id) = params["requestId"].as_str() {
                    let error_text = params["errorText"].as_str().unwrap_or("");
                    state.on_loading_failed(request_id, error_text);
                }
            },
        ),
        subscribe_tab_event(
            client,
            state,
            session_id,
            "Page.loadEventFired",
            |state, _params| state.on_load_event_fired(),
        ),
        subscribe_tab_event(
            client,
            state,
            session_id,
            "Page.navigatedWithinDocument",
            |state, params| {
                let (Some(url), Some(frame_id)) =
                    (params["url"].as_str(), params["frameId"].as_str())
                else {
                    return;
                };
                state.on_navigated_within_document(url, frame_id);
            },
        ),
        subscribe_tab_event(
            client,
            state,
            session_id,
            "Runtime.executionContextCreated",
            |state, params| state.on_execution_context_created(&params["context"]),
        ),
        subscribe_tab_event(
            client,
            state,
            session_id,
            "Overlay.inspectNodeRequested",
            |state, params| {
                if let Some(backend_node_id) = params["backendNodeId"].as_i64() {
                    state.on_inspect_node_requested(backend_node_id);
                }
            },
        ),
    ]
}

fn subscribe_tab_event<F>(
    client: &Arc<CDPClient>,
    state: &Arc<Mutex<TabState>>,
    session_id: &SessionId,
    method: &str,
    apply: F,
) -> Subscription
where
    F: Fn(&mut TabState, &Value) + Send + Sync + 'static,
{
    let state = Arc::clone(state);
    let session_id = session_id.clone();
    client.subscribe(
        method,
        Arc::new(move |event: &CDPEvent| {
            if !is_for_session(event, &session_id) {
                return;
            }
            let Some(params) = event.params.as_ref() else {
                return;
            };
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            apply(&mut state, params);
        }),
    )
}

/// Events are shared across all sessions on the connection; a tab only
/// consumes its own.
fn is_for_session(event: &CDPEvent, session_id: &str) -> bool {
    event.session_id.as_deref() == Some(session_id)
}

fn visual_viewport_rect(metrics: &Value) -> Result<ClipRect> {
    let viewport = metrics
        .get("cssVisualViewport")
        .ok_or_else(|| BrowserError::InvalidPayload("missing cssVisualViewport".to_string()))?;
    let field = |name: &str| {
        viewport
            .get(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| BrowserError::InvalidPayload(format!("missing cssVisualViewport.{name}")))
    };
    Ok(ClipRect::new(
        field("pageX")?,
        field("pageY")?,
        field("clientWidth")?,
        field("clientHeight")?,
    ))
}

fn content_size(metrics: &Value) -> Result<(f64, f64)> {
    let content = metrics
        .get("cssContentSize")
        .ok_or_else(|| BrowserError::InvalidPayload("missing cssContentSize".to_string()))?;
    let field = |name: &str| {
        content
            .get(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| BrowserError::InvalidPayload(format!("missing cssContentSize.{name}")))
    };
    Ok((field("width")?, field("height")?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigate_options_defaults() {
        let options = NavigateOptions::default();
        assert!(options.wait);
        assert_eq!(options.timeout, Duration::from_secs(10));
    }

    #[test]
    fn session_filter_matches_only_own_session() {
        let event = CDPEvent {
            method: "Page.loadEventFired".to_string(),
            params: Some(json!({ "timestamp": 1.0 })),
            session_id: Some("S1".to_string()),
        };
        assert!(is_for_session(&event, "S1"));
        assert!(!is_for_session(&event, "S2"));

        let browser_level = CDPEvent {
            method: "Target.targetCreated".to_string(),
            params: None,
            session_id: None,
        };
        assert!(!is_for_session(&browser_level, "S1"));
    }

    #[test]
    fn viewport_rect_parses_layout_metrics() {
        let metrics = json!({
            "cssVisualViewport": {
                "pageX": 0.0,
                "pageY": 512.0,
                "clientWidth": 1280.0,
                "clientHeight": 720.0,
            },
            "cssContentSize": { "width": 1280.0, "height": 20000.0 },
        });
        let viewport = visual_viewport_rect(&metrics).unwrap();
        assert_eq!(viewport.y, 512.0);
        assert_eq!(viewport.width, 1280.0);

        let (width, height) = content_size(&metrics).unwrap();
        assert_eq!(width, 1280.0);
        assert_eq!(height, 20000.0);
    }

    #[test]
    fn viewport_rect_rejects_incomplete_metrics() {
        let metrics = json!({ "cssVisualViewport": { "pageX": 0.0 } });
        assert!(visual_viewport_rect(&metrics).is_err());
        assert!(content_size(&metrics).is_err());
    }

    // Live test needs a running Chromium with --remote-debugging-port=9222.

    #[tokio::test]
    #[ignore]
    async fn navigate_to_a_real_page() {
        use crate::config::SessionConfig;
        use crate::session::BrowserSession;

        let mut session = BrowserSession::connect(SessionConfig::default()).await.unwrap();
        let mut tab = session.create_tab().await.unwrap();

        let outcome = tab.navigate("https://example.com").await;
        assert!(!outcome.failed, "{:?}", outcome.failed_reason);
        assert_eq!(outcome.status_code, Some(200));
        assert!(tab.html().await.unwrap().contains("Example Domain"));

        session.close_tab(tab).await.unwrap();
        session.close().await.unwrap();
    }
}
