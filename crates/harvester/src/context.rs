//! Shared, read-only state handed to every worker of one run.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use harvest_store::HarvestStore;
use page_parser::PageParser;
use site_fetcher::{FetchError, Fetcher};
use tracing::warn;

use crate::config::HarvestConfig;
use crate::dedup::DedupSet;

pub struct HarvestContext {
    pub config: HarvestConfig,
    /// Family A: server-rendered pages
    pub pages:  Fetcher,
    /// Family B: AJAX fragments and JSON endpoints
    pub api:    Fetcher,
    pub parser: Arc<dyn PageParser>,
    pub store:  Arc<dyn HarvestStore>,
    pub dedup:  DedupSet,
}

impl HarvestContext {
    /// Page fetch with one extra delayed attempt when the fetcher gave up on a 5xx.
    pub async fn get_page(&self, url: &str) -> Result<String, FetchError> {
        retry_server_error(self.config.server_error_delay, url, || self.pages.get_text(url)).await
    }

    pub async fn post_api(&self, url: &str, body: &serde_json::Value) -> Result<Vec<u8>, FetchError> {
        retry_server_error(self.config.server_error_delay, url, || self.api.post_json(url, body)).await
    }
}

pub async fn retry_server_error<T, F, Fut>(delay: Duration, url: &str, call: F) -> Result<T, FetchError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    match call().await {
        Err(e) if e.is_server_error() => {
            warn!("{} returned a server error, retrying once in {:?}", url, delay);
            tokio::time::sleep(delay).await;
            call().await
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn server_error() -> FetchError {
        FetchError::Exhausted {
            url: "u".into(),
            attempts: 3,
            last_status: Some(500),
            last: "HTTP 500".into(),
        }
    }

    #[tokio::test]
    async fn server_error_gets_one_more_try() {
        let calls = AtomicUsize::new(0);
        let res: Result<u8, _> = retry_server_error(Duration::ZERO, "u", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { if n == 0 { Err(server_error()) } else { Ok(7) } }
        })
        .await;
        assert_eq!(res.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let calls = AtomicUsize::new(0);
        let res: Result<u8, _> = retry_server_error(Duration::ZERO, "u", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchError::Status { url: "u".into(), code: 404 }) }
        })
        .await;
        assert!(res.unwrap_err().is_not_found());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
