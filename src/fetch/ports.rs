use std::time::Duration;

use async_trait::async_trait;

/// Lightweight reachability probe. Only the status code matters: the probe
/// exists to find out whether the source answers at all (and whether it is
/// blocking us) before the expensive browser phase is paid for.
#[async_trait]
pub trait ProbeClientPort: Send + Sync {
    async fn get_status(&self, url: &str) -> Result<u16, String>;
}

/// Browser automation facility: load a URL, wait for one element, return its
/// rendered outer HTML.
#[async_trait]
pub trait BrowserPort: Send + Sync {
    async fn fetch_element_html(
        &self,
        url: &str,
        element_id: &str,
        wait: Duration,
    ) -> Result<String, String>;
}

pub struct ReqwestProbe {
    client: reqwest::Client,
}

impl ReqwestProbe {
    pub fn new() -> Self {
        // Realistic browser headers; the bare reqwest default UA is an
        // instant 403 on this source.
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_static("pt-BR,pt;q=0.9,en;q=0.8"),
        );
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36")
            .default_headers(headers)
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }
}

impl Default for ReqwestProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProbeClientPort for ReqwestProbe {
    async fn get_status(&self, url: &str) -> Result<u16, String> {
        let resp = self.client.get(url).send().await.map_err(|e| e.to_string())?;
        Ok(resp.status().as_u16())
    }
}
