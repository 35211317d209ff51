//! Navigate to a page and store a full-page screenshot.

use browser::{BrowserSession, SessionConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://example.com".to_string());

    let mut session = BrowserSession::connect(SessionConfig::default()).await?;
    let mut tab = session.create_tab().await?;

    let outcome = tab.navigate(&url).await;
    if outcome.failed {
        println!(
            "navigation failed: {}",
            outcome.failed_reason.unwrap_or_default()
        );
    } else {
        if outcome.stopped_waiting {
            println!("load event never fired; capturing anyway");
        }
        println!(
            "status: {:?}, redirects: {}",
            outcome.status_code,
            outcome.redirects.len()
        );

        let png = tab.screenshot().await?;
        std::fs::write("page.png", png)?;
        println!("wrote page.png");
    }

    session.close_tab(tab).await?;
    session.close().await?;
    Ok(())
}
