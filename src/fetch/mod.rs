//! Two-phase fetch: a lightweight HTTP probe with exponential backoff,
//! then a headless-browser retrieval of the rendered table.

pub mod browser;
pub mod html;
pub mod ports;

use std::time::Duration;

use rand::Rng;
use tokio::time::{sleep_until, Instant};
use tracing::{info, warn};

use crate::config::Config;
use crate::domain::RawTable;
use browser::ChromiumBrowser;
use ports::{BrowserPort, ProbeClientPort, ReqwestProbe};

/// Result of one fetch run.
#[derive(Debug)]
pub enum FetchOutcome {
    Table(RawTable),
    /// The probe budget ran out and the last signal was a block (403).
    Blocked { http_status: u16 },
    /// Transient network trouble or a parse failure; not a block signal.
    Failed { detail: String },
}

enum ProbeResult {
    Reachable,
    Blocked { http_status: u16 },
    Failed { detail: String },
}

pub struct Fetcher {
    config: Config,
    probe: Box<dyn ProbeClientPort>,
    browser: Box<dyn BrowserPort>,
}

impl Fetcher {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            probe: Box::new(ReqwestProbe::new()),
            browser: Box::new(ChromiumBrowser::new()),
        }
    }

    /// Constructor with explicit ports, used by tests.
    pub fn with_ports(
        config: Config,
        probe: Box<dyn ProbeClientPort>,
        browser: Box<dyn BrowserPort>,
    ) -> Self {
        Self { config, probe, browser }
    }

    /// Runs the probe and, if the source is reachable, the browser
    /// retrieval. `deadline` bounds the probe's backoff sleeps.
    pub async fn fetch(&self, deadline: Option<Instant>) -> FetchOutcome {
        match self.probe_source(deadline).await {
            ProbeResult::Reachable => {}
            ProbeResult::Blocked { http_status } => return FetchOutcome::Blocked { http_status },
            ProbeResult::Failed { detail } => return FetchOutcome::Failed { detail },
        }

        let url = &self.config.source_url;
        let wait = Duration::from_secs(self.config.browser_wait_secs);
        info!("probe ok, starting browser retrieval of {}", url);

        let html = match self
            .browser
            .fetch_element_html(url, &self.config.table_element_id, wait)
            .await
        {
            Ok(html) => html,
            Err(detail) => return FetchOutcome::Failed { detail },
        };

        match html::parse_table(&html) {
            Ok(table) => {
                info!("retrieved table with {} rows", table.len());
                FetchOutcome::Table(table)
            }
            Err(e) => FetchOutcome::Failed { detail: e.to_string() },
        }
    }

    /// Phase 1: GET the page with browser-like headers, up to the configured
    /// attempt budget, exponential backoff plus random jitter in between.
    /// A 403 is remembered as a block signal but still retried within the
    /// budget; any 200 authorizes phase 2.
    async fn probe_source(&self, deadline: Option<Instant>) -> ProbeResult {
        let url = &self.config.source_url;
        let mut last_status: Option<u16> = None;
        let mut last_error: Option<String> = None;

        for attempt in 1..=self.config.probe_max_attempts {
            if attempt > 1 {
                let backoff = self
                    .config
                    .probe_max_backoff_secs
                    .min(self.config.probe_base_backoff_secs * f64::powi(2.0, attempt as i32 - 2));
                let jitter = rand::thread_rng().gen::<f64>() * self.config.probe_jitter_secs;
                let pause = Duration::from_secs_f64(backoff + jitter);
                let wake = Instant::now() + pause;

                if let Some(deadline) = deadline {
                    if wake >= deadline {
                        warn!("probe deadline reached before attempt {}", attempt);
                        break;
                    }
                }
                sleep_until(wake).await;
            }

            match self.probe.get_status(url).await {
                Ok(200) => {
                    info!("probe attempt {}: 200, source reachable", attempt);
                    return ProbeResult::Reachable;
                }
                Ok(403) => {
                    warn!("probe attempt {}: 403, source is blocking", attempt);
                    last_status = Some(403);
                }
                Ok(status) => {
                    warn!("probe attempt {}: unexpected status {}", attempt, status);
                    last_status = Some(status);
                }
                Err(e) => {
                    warn!("probe attempt {}: {}", attempt, e);
                    last_error = Some(e);
                }
            }
        }

        if last_status == Some(403) {
            ProbeResult::Blocked { http_status: 403 }
        } else {
            ProbeResult::Failed {
                detail: match (last_status, last_error) {
                    (Some(status), _) => format!("probe exhausted, last status {}", status),
                    (None, Some(e)) => format!("probe exhausted: {}", e),
                    (None, None) => "probe exhausted with no attempts".to_string(),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn test_config() -> Config {
        Config {
            source_url: "http://example.test/resultado.php".into(),
            table_element_id: "resultado".into(),
            media_dir: "media".into(),
            probe_max_attempts: 4,
            probe_base_backoff_secs: 0.001,
            probe_max_backoff_secs: 0.002,
            probe_jitter_secs: 0.0,
            block_base_hours: 2,
            block_max_hours: 168,
            browser_wait_secs: 1,
            strict_filters: false,
            redis_url: None,
            remote: None,
        }
    }

    struct ScriptedProbe {
        statuses: Vec<u16>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ProbeClientPort for ScriptedProbe {
        async fn get_status(&self, _url: &str) -> Result<u16, String> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(*self.statuses.get(i).unwrap_or(&500))
        }
    }

    struct StaticBrowser {
        html: Result<String, String>,
    }

    #[async_trait]
    impl BrowserPort for StaticBrowser {
        async fn fetch_element_html(
            &self,
            _url: &str,
            _element_id: &str,
            _wait: Duration,
        ) -> Result<String, String> {
            self.html.clone()
        }
    }

    const TABLE_HTML: &str = "<table><tr><th>Papel</th><th>Liq.2meses</th><th>Mrg Ebit</th><th>EV/EBIT</th><th>P/L</th></tr>\
        <tr><td>PETR4</td><td>2.000.000,00</td><td>25,00%</td><td>3,50</td><td>4,20</td></tr></table>";

    #[tokio::test]
    async fn forbidden_then_ok_within_budget_proceeds_to_retrieval() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = Fetcher::with_ports(
            test_config(),
            Box::new(ScriptedProbe { statuses: vec![403, 403, 403, 200], calls: calls.clone() }),
            Box::new(StaticBrowser { html: Ok(TABLE_HTML.to_string()) }),
        );
        match fetcher.fetch(None).await {
            FetchOutcome::Table(table) => assert_eq!(table.len(), 1),
            other => panic!("expected table, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn exhausted_budget_with_403_reports_blocked() {
        let fetcher = Fetcher::with_ports(
            test_config(),
            Box::new(ScriptedProbe {
                statuses: vec![403, 403, 403, 403],
                calls: Arc::new(AtomicUsize::new(0)),
            }),
            Box::new(StaticBrowser { html: Ok(TABLE_HTML.to_string()) }),
        );
        match fetcher.fetch(None).await {
            FetchOutcome::Blocked { http_status } => assert_eq!(http_status, 403),
            other => panic!("expected blocked, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn exhausted_budget_without_403_reports_failure() {
        let fetcher = Fetcher::with_ports(
            test_config(),
            Box::new(ScriptedProbe {
                statuses: vec![500, 502, 503, 500],
                calls: Arc::new(AtomicUsize::new(0)),
            }),
            Box::new(StaticBrowser { html: Ok(TABLE_HTML.to_string()) }),
        );
        assert!(matches!(fetcher.fetch(None).await, FetchOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn missing_element_is_a_failure_not_a_block() {
        let fetcher = Fetcher::with_ports(
            test_config(),
            Box::new(ScriptedProbe {
                statuses: vec![200],
                calls: Arc::new(AtomicUsize::new(0)),
            }),
            Box::new(StaticBrowser { html: Err("element #resultado not present".into()) }),
        );
        assert!(matches!(fetcher.fetch(None).await, FetchOutcome::Failed { .. }));
    }
}
