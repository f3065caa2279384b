//! chromiumoxide adapter for the retrieval phase.
//!
//! The result table is rendered client-side, so the probe's lightweight
//! client never sees it; a real browser session is required. The session is
//! launched per fetch and torn down afterwards.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};

use super::ports::BrowserPort;

const ELEMENT_POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct ChromiumBrowser;

impl ChromiumBrowser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ChromiumBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserPort for ChromiumBrowser {
    async fn fetch_element_html(
        &self,
        url: &str,
        element_id: &str,
        wait: Duration,
    ) -> Result<String, String> {
        let config = BrowserConfig::builder()
            .args(vec!["--disable-gpu", "--no-sandbox", "--disable-dev-shm-usage"])
            .build()
            .map_err(|e| format!("browser config: {}", e))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| format!("browser launch: {}", e))?;

        // The handler stream must be driven for the CDP session to make progress.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let result = fetch_inner(&browser, url, element_id, wait).await;

        if let Err(e) = browser.close().await {
            warn!("failed to close browser session: {}", e);
        }
        handler_task.abort();

        result
    }
}

async fn fetch_inner(
    browser: &Browser,
    url: &str,
    element_id: &str,
    wait: Duration,
) -> Result<String, String> {
    let page = timeout(wait, browser.new_page(url))
        .await
        .map_err(|_| format!("navigation to {} timed out after {:?}", url, wait))?
        .map_err(|e| format!("navigation failed: {}", e))?;

    // Poll for the element within the bounded wait; fail closed on timeout.
    let selector = format!("#{}", element_id);
    let deadline = Instant::now() + wait;
    loop {
        match page.find_element(selector.as_str()).await {
            Ok(element) => {
                let html = element
                    .outer_html()
                    .await
                    .map_err(|e| format!("failed to read element html: {}", e))?
                    .ok_or_else(|| format!("element #{} has no outer html", element_id))?;
                debug!("extracted #{} ({} bytes)", element_id, html.len());
                let _ = page.close().await;
                return Ok(html);
            }
            Err(_) if Instant::now() < deadline => {
                sleep(ELEMENT_POLL_INTERVAL).await;
            }
            Err(_) => {
                let _ = page.close().await;
                return Err(format!(
                    "element #{} not present after {:?}",
                    element_id, wait
                ));
            }
        }
    }
}
