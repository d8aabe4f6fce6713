//! Fixture transport and context builder shared by the pipeline unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use harvest_store::{HarvestStore, SqliteStore};
use page_parser::{HtmlPageParser, PageParser};
use site_fetcher::{Backoff, FetchRequest, Fetcher, RawResponse, SiteProfile, Transport, TransportError};

use crate::config::HarvestConfig;
use crate::context::HarvestContext;
use crate::dedup::DedupSet;

#[derive(Default)]
pub struct FixtureTransport {
    pages: Mutex<HashMap<String, (u16, String)>>,
    calls: Mutex<Vec<String>>,
}

impl FixtureTransport {
    pub fn page(&self, url: &str, status: u16, body: impl Into<String>) {
        self.pages.lock().unwrap().insert(url.to_string(), (status, body.into()));
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.as_str() == url).count()
    }
}

#[async_trait]
impl Transport for FixtureTransport {
    async fn send(&self, req: &FetchRequest) -> Result<RawResponse, TransportError> {
        self.calls.lock().unwrap().push(req.url.clone());
        let (status, body) = self
            .pages
            .lock()
            .unwrap()
            .get(&req.url)
            .cloned()
            .unwrap_or((404, String::new()));
        Ok(RawResponse { status, body: body.into_bytes() })
    }
}

pub fn fast(profile: SiteProfile) -> SiteProfile {
    profile
        .with_min_delay(Duration::ZERO)
        .with_backoff(Backoff::Linear(Duration::from_millis(1)))
}

pub fn context(transport: Arc<FixtureTransport>) -> (Arc<HarvestContext>, Arc<SqliteStore>) {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let config = HarvestConfig { server_error_delay: Duration::ZERO, ..HarvestConfig::default() };
    let parser: Arc<dyn PageParser> = Arc::new(HtmlPageParser::standard().unwrap());
    let dyn_store: Arc<dyn HarvestStore> = store.clone();

    let ctx = HarvestContext {
        config,
        pages: Fetcher::with_transport(fast(SiteProfile::pages()), transport.clone()),
        api: Fetcher::with_transport(fast(SiteProfile::api()), transport),
        parser,
        store: dyn_store,
        dedup: DedupSet::new(),
    };
    (Arc::new(ctx), store)
}

pub const SPB: &str = "https://spb.fhr.ru";

pub fn player_row(id: u32, name: &str, birth: &str) -> String {
    format!(
        r#"<tr class="player-row"><td><a class="player-link" href="/players/{id}/">{name}</a></td><td class="birth-date">{birth}</td><td class="position">Нападающий</td><td class="height">172</td><td class="weight">64</td><td class="grip">Левый</td></tr>"#
    )
}

pub fn roster(rows: &[String]) -> String {
    format!("<table>{}</table>", rows.concat())
}
