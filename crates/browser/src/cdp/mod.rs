//! CDP (Chrome DevTools Protocol) client implementation
//!
//! Core principle: a single WebSocket connection, multiplexed sessions.
//! Events are fanned out to removable subscriber callbacks.

pub mod client;
pub mod protocol;
pub mod session;

pub use client::{CDPClient, CDPError, EventCallback, Subscription};
pub use protocol::{CDPEvent, CDPRequest, CDPResponse, TargetId, TargetInfo};
pub use session::CDPSession;
