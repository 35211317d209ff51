//! Browser session management
//!
//! Owns the connection to one running browser and mediates tab lifecycle.
//! The debugging connection breaks when the browser has no open tab at all,
//! so the session keeps exactly one "empty" placeholder tab alive whenever no
//! real tab exists, and orders create/destroy so a zero-tab window can never
//! occur.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use url::Url;

use crate::cdp::client::CDPError;
use crate::cdp::protocol::{TargetId, TargetInfo};
use crate::cdp::CDPClient;
use crate::config::{SessionConfig, TabConfig};
use crate::error::{BrowserError, Result};
use crate::tab::Tab;

/// Timeout for ordinary protocol round-trips.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Browser session - manages the connection and the live-tab invariant.
///
/// Tab management is intentionally `&mut self`: the owning workflow drives
/// session lifecycle serially, even when it runs unrelated work in parallel.
pub struct BrowserSession {
    pub config: SessionConfig,
    client: Arc<CDPClient>,
    tab_count: u32,
    empty_tab: Option<TargetId>,
}

impl BrowserSession {
    /// Connect to a running browser's debugging endpoint.
    ///
    /// Connection failures are fatal here; retry policy belongs to the
    /// caller.
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let ws_url = resolve_ws_url(&config.debugger_url).await?;
        let client = CDPClient::connect(&ws_url, COMMAND_TIMEOUT)
            .await
            .map_err(|e| BrowserError::Connection {
                url: ws_url.clone(),
                reason: e.to_string(),
            })?;

        let mut session = Self {
            config,
            client,
            tab_count: 0,
            empty_tab: None,
        };
        session.adopt_existing_placeholder().await?;
        Ok(session)
    }

    /// A freshly started browser sits on a single new-tab page; adopt it as
    /// the placeholder so `create_tab` can clean it up.
    async fn adopt_existing_placeholder(&mut self) -> Result<()> {
        let result = self.client.send("Target.getTargets", None, None).await?;
        let infos: Vec<TargetInfo> = serde_json::from_value(result["targetInfos"].clone())
            .map_err(|e| BrowserError::InvalidPayload(e.to_string()))?;

        let pages: Vec<&TargetInfo> = infos.iter().filter(|t| t.is_page()).collect();
        if let [only] = pages.as_slice() {
            if only.is_empty_page() {
                tracing::debug!(target_id = %only.target_id, "adopting existing empty tab");
                self.empty_tab = Some(only.target_id.clone());
            }
        }
        Ok(())
    }

    /// Open a new tab with default tab configuration.
    pub async fn create_tab(&mut self) -> Result<Tab> {
        self.create_tab_with(TabConfig::default()).await
    }

    /// Open a new tab. Event handlers are registered before the returned
    /// `Tab` is handed out.
    pub async fn create_tab_with(&mut self, config: TabConfig) -> Result<Tab> {
        let target_id = self.create_target().await?;

        // The placeholder goes away only after the new target exists.
        if self.tab_count == 0 {
            if let Some(placeholder) = self.empty_tab.take() {
                self.close_target(&placeholder).await?;
            }
        }

        let tab = Tab::attach(Arc::clone(&self.client), target_id, config).await?;
        self.tab_count += 1;
        tracing::debug!(target_id = %tab.target_id(), live_tabs = self.tab_count, "tab created");
        Ok(tab)
    }

    /// Close a tab. When it was the last live tab, a fresh placeholder is
    /// created before the target is closed.
    pub async fn close_tab(&mut self, mut tab: Tab) -> Result<()> {
        tab.detach().await;

        if self.tab_count == 1 {
            let placeholder = self.create_target().await?;
            self.empty_tab = Some(placeholder);
        }

        self.close_target(tab.target_id()).await?;
        self.tab_count = self.tab_count.saturating_sub(1);
        tracing::debug!(target_id = %tab.target_id(), live_tabs = self.tab_count, "tab closed");
        Ok(())
    }

    /// Shut the browser down cleanly. A placeholder is ensured first so the
    /// shutdown command has a valid target to run against.
    pub async fn close(mut self) -> Result<()> {
        if self.empty_tab.is_none() {
            let placeholder = self.create_target().await?;
            self.empty_tab = Some(placeholder);
        }

        // The browser may drop the socket before acknowledging the command.
        match self.client.send("Browser.close", None, None).await {
            Ok(_) | Err(CDPError::Closed) | Err(CDPError::WebSocket(_)) => {}
            Err(e) => return Err(e.into()),
        }
        let _ = self.client.close().await;
        tracing::info!("browser session closed");
        Ok(())
    }

    pub fn tab_count(&self) -> u32 {
        self.tab_count
    }

    pub fn has_placeholder(&self) -> bool {
        self.empty_tab.is_some()
    }

    async fn create_target(&self) -> Result<TargetId> {
        let result = self
            .client
            .send(
                "Target.createTarget",
                Some(json!({ "url": "about:blank" })),
                None,
            )
            .await?;
        result["targetId"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                BrowserError::InvalidPayload("Target.createTarget returned no targetId".to_string())
            })
    }

    async fn close_target(&self, target_id: &str) -> Result<()> {
        self.client
            .send(
                "Target.closeTarget",
                Some(json!({ "targetId": target_id })),
                None,
            )
            .await?;
        Ok(())
    }
}

/// Turn a debugger endpoint into the browser-level WebSocket URL.
///
/// `ws://` URLs pass through; `http://` endpoints are resolved via the
/// browser's `/json/version` metadata.
async fn resolve_ws_url(debugger_url: &str) -> Result<String> {
    let parsed = Url::parse(debugger_url).map_err(|e| BrowserError::Endpoint {
        url: debugger_url.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "ws" | "wss" => Ok(debugger_url.to_string()),
        "http" | "https" => {
            let version_url = format!("{}/json/version", debugger_url.trim_end_matches('/'));
            let version: serde_json::Value = reqwest::get(&version_url)
                .await
                .map_err(|e| BrowserError::Connection {
                    url: version_url.clone(),
                    reason: e.to_string(),
                })?
                .json()
                .await
                .map_err(|e| BrowserError::Connection {
                    url: version_url.clone(),
                    reason: e.to_string(),
                })?;

            version["webSocketDebuggerUrl"]
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| BrowserError::Endpoint {
                    url: version_url,
                    reason: "missing webSocketDebuggerUrl".to_string(),
                })
        }
        other => Err(BrowserError::Endpoint {
            url: debugger_url.to_string(),
            reason: format!("unsupported scheme {other}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn websocket_urls_pass_through_unresolved() {
        let url = "ws://localhost:9222/devtools/browser/abc";
        assert_eq!(resolve_ws_url(url).await.unwrap(), url);
    }

    #[tokio::test]
    async fn unsupported_schemes_are_rejected() {
        let err = resolve_ws_url("ftp://localhost:9222").await.unwrap_err();
        assert!(matches!(err, BrowserError::Endpoint { .. }));
    }

    #[tokio::test]
    async fn malformed_urls_are_rejected() {
        let err = resolve_ws_url("not a url").await.unwrap_err();
        assert!(matches!(err, BrowserError::Endpoint { .. }));
    }

    // Live tests need a running Chromium with --remote-debugging-port=9222.

    #[tokio::test]
    #[ignore]
    async fn tab_round_trip_leaves_the_placeholder() {
        let mut session = BrowserSession::connect(SessionConfig::default()).await.unwrap();

        let tab = session.create_tab().await.unwrap();
        assert_eq!(session.tab_count(), 1);
        assert!(!session.has_placeholder());

        session.close_tab(tab).await.unwrap();
        assert_eq!(session.tab_count(), 0);
        assert!(session.has_placeholder());

        session.close().await.unwrap();
    }
}
