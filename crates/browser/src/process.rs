//! Chromium process launcher
//!
//! Starting and stopping the browser binary is a side effect around the
//! core: the session layer only needs a debugging endpoint and does not care
//! who started the process. Kept here so tools can run self-contained.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use crate::error::{BrowserError, Result};

/// Well-known install locations, probed in order.
const BROWSER_CANDIDATES: &[&str] = &[
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/snap/bin/chromium",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
];

/// How to start the browser.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Explicit binary path; discovered from well-known locations when
    /// absent.
    pub binary: Option<PathBuf>,
    /// Profile directory (`--user-data-dir`). Kept per host so parallel
    /// machines do not fight over one profile.
    pub profile_dir: PathBuf,
    /// Remote-debugging port.
    pub port: u16,
    /// Headless operation. Off by default: inspect mode needs a visible
    /// browser.
    pub headless: bool,
    pub extra_args: Vec<String>,
}

impl LaunchConfig {
    pub fn new(profile_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: None,
            profile_dir: profile_dir.into(),
            port: 9222,
            headless: false,
            extra_args: Vec::new(),
        }
    }
}

/// Handle to a launched browser process.
pub struct BrowserProcess {
    child: Child,
}

impl BrowserProcess {
    /// Spawn the browser with remote debugging enabled.
    pub fn launch(config: &LaunchConfig) -> Result<Self> {
        let binary = config
            .binary
            .clone()
            .or_else(find_browser)
            .ok_or(BrowserError::NoBrowserBinary)?;

        let args = command_args(config);
        tracing::info!(binary = %binary.display(), port = config.port, "launching browser");

        let child = Command::new(&binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(Self { child })
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Poll whether the process is still alive.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Terminate the process and reap it. Prefer shutting the browser down
    /// through `BrowserSession::close()` first; this is the fallback.
    pub fn stop(&mut self) -> Result<()> {
        self.child.kill()?;
        self.child.wait()?;
        Ok(())
    }
}

/// Probe well-known locations for a Chromium/Chrome binary.
pub fn find_browser() -> Option<PathBuf> {
    BROWSER_CANDIDATES
        .iter()
        .map(Path::new)
        .find(|path| path.exists())
        .map(Path::to_path_buf)
}

fn command_args(config: &LaunchConfig) -> Vec<String> {
    let mut args = vec![
        format!("--remote-debugging-port={}", config.port),
        format!("--user-data-dir={}", config.profile_dir.display()),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--disable-background-networking".to_string(),
        "--disable-default-apps".to_string(),
        "--disable-sync".to_string(),
        "--disable-translate".to_string(),
        "--mute-audio".to_string(),
    ];
    if config.headless {
        args.push("--headless=new".to_string());
        args.push("--disable-gpu".to_string());
    }
    args.extend(config.extra_args.iter().cloned());
    args
}
