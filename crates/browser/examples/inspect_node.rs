//! Interactive node selection: hover-highlight until a click, then print
//! what is known about the selected node.

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
        session.close_tab(tab).await?;
        return Ok(());
    }

    println!("click a node in the browser window...");
    tab.start_node_selection().await?;
    let node = tab.selected_backend_node().await?;

    println!("selected backend node: {:?}", node);
    if let Some(text) = tab.text_of_backend_node(node).await {
        println!("inner text: {}", text.chars().take(120).collect::<String>());
    }
    if let Some(attributes) = tab.attributes_of_backend_node(node).await {
        println!("attributes: {attributes:?}");
    }
    if let Some(selectors) = tab.unique_selectors_of_backend_node(node).await {
        println!("unique selectors: {selectors:?}");
    }

    let png = tab.screenshot_of_backend_node(node).await?;
    std::fs::write("node.png", png)?;
    println!("wrote node.png");

    session.close_tab(tab).await?;
    session.close().await?;
    Ok(())
}
