//! Remote-browser control and page-state tracking
//!
//! Drives a running Chromium instance over the DevTools protocol and exposes
//! a synchronous-looking surface to inspection workflows: navigate and wait,
//! query the DOM, capture screenshots and snapshots, highlight and select
//! nodes interactively.
//!
//! The hard part is reconciling the asynchronous event stream with blocking
//! call semantics. Each tab owns an explicit state machine
//! ([`navigation::TabState`]) that event handlers write into; `navigate()`
//! re-arms it, issues the command, and polls it with bounded waits. Whatever
//! goes wrong at runtime ends up in the returned
//! [`NavigationOutcome`](navigation::NavigationOutcome) instead of an error,
//! so batch workflows survive individual bad pages.

pub mod cdp;
pub mod config;
pub mod error;
pub mod navigation;
pub mod process;
pub mod screenshot;
pub mod session;
pub mod tab;
pub mod wait;

pub use config::{CaptureConfig, HighlightConfig, SessionConfig, TabConfig};
pub use error::{BrowserError, Result};
pub use navigation::{FailureKind, Headers, NavigationOutcome, RedirectHop};
pub use process::{BrowserProcess, LaunchConfig};
pub use session::BrowserSession;
pub use tab::{NavigateOptions, Tab};
