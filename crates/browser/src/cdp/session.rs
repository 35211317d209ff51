//! CDP session - a flattened connection to one browser target
//!
//! Lightweight wrapper around [`CDPClient`] carrying the target/session ids.
//! All sessions share the same WebSocket; routing happens via the session id
//! on each request and each delivered event.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use super::client::{CDPClient, CDPError, Result};
use super::protocol::{AttachToTargetResult, SessionId, TargetId, TargetInfo};

/// CDP session bound to a specific target.
#[derive(Clone)]
pub struct CDPSession {
    client: Arc<CDPClient>,
    pub target_id: TargetId,
    pub session_id: SessionId,
}

impl CDPSession {
    /// Attach to a target with flat session routing.
    ///
    /// Domain enabling is left to the caller: event handlers must be
    /// registered first, or early events of an enabled domain are lost.
    pub async fn attach(client: Arc<CDPClient>, target_id: TargetId) -> Result<Self> {
        let result = client
            .send(
                "Target.attachToTarget",
                Some(json!({
                    "targetId": target_id,
                    "flatten": true,
                })),
                None,
            )
            .await?;

        let attach_result: AttachToTargetResult =
            serde_json::from_value(result).map_err(CDPError::Json)?;

        Ok(Self {
            client,
            target_id,
            session_id: attach_result.session_id,
        })
    }

    /// The shared client this session routes through.
    pub fn client(&self) -> &Arc<CDPClient> {
        &self.client
    }

    /// Enable protocol domains for this target, in order - Overlay depends
    /// on DOM being enabled first. Individual failures are logged and
    /// skipped; a missing optional domain must not take the tab down.
    pub async fn enable_domains(&self, domains: &[&str]) -> Result<()> {
        for domain in domains {
            let method = format!("{domain}.enable");
            if let Err(e) = self.send(method.clone(), None).await {
                tracing::warn!(method = %method, error = %e, "domain enable failed");
            }
        }
        Ok(())
    }

    /// Send a command within this session's context.
    pub async fn send(&self, method: impl Into<String>, params: Option<Value>) -> Result<Value> {
        self.client
            .send(method, params, Some(self.session_id.clone()))
            .await
    }

    /// Send a command within this session's context, bounded by `timeout`.
    pub async fn send_with_timeout(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value> {
        self.client
            .send_with_timeout(method, params, Some(self.session_id.clone()), timeout)
            .await
    }

    /// Current target info.
    pub async fn target_info(&self) -> Result<TargetInfo> {
        let result = self
            .client
            .send(
                "Target.getTargetInfo",
                Some(json!({ "targetId": &self.target_id })),
                None,
            )
            .await?;

        serde_json::from_value(result["targetInfo"].clone()).map_err(CDPError::Json)
    }

    /// Detach from the target. The target itself stays alive.
    pub async fn detach(&self) -> Result<()> {
        self.client
            .send(
                "Target.detachFromTarget",
                Some(json!({ "sessionId": &self.session_id })),
                None,
            )
            .await?;
        Ok(())
    }
}
