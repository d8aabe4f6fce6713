//! Rate-limited, retrying HTTP entry point for the regional federation sites.
//!
//! One `Fetcher` per site family. All calls on one instance are serialized behind
//! a mutex with a minimum delay between request starts, so the upstream sees at
//! most one request in flight from us per family:
//!
//!   family A (`SiteProfile::pages`): server-rendered pages, linear 3s backoff
//!   family B (`SiteProfile::api`): AJAX fragments + JSON API, cookie jar,
//!                                  exponential 2^(attempt+1)s backoff
//!
//! Network errors are retried only when the error text looks transient
//! (reset / EOF / broken pipe / timeout). 5xx is retried with the same backoff.
//! Any other non-2xx status fails on the first call.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, CONTENT_TYPE, USER_AGENT};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

const USER_AGENTS: [&str; 3] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
];

/// Substrings of transport error text that mark a failure as transient.
const RETRYABLE_PATTERNS: [&str; 7] = [
    "connection reset",
    "broken pipe",
    "unexpected eof",
    "eof",
    "timed out",
    "timeout",
    "connection closed",
];

// ── Request / response ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url:    String,
    /// JSON body, sent with `Content-Type: application/json`
    pub body:   Option<String>,
    pub user_agent: &'static str,
}

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body:   Vec<u8>,
}

/// Transport-level failure (no HTTP status was received).
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        is_retryable_text(&self.0)
    }
}

pub fn is_retryable_text(text: &str) -> bool {
    let lower = text.to_lowercase();
    RETRYABLE_PATTERNS.iter().any(|p| lower.contains(p))
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{url}: HTTP {code}")]
    Status { url: String, code: u16 },

    #[error("{url}: network error: {message}")]
    Network { url: String, message: String },

    #[error("{url}: giving up after {attempts} attempts: {last}")]
    Exhausted {
        url:         String,
        attempts:    u32,
        last_status: Option<u16>,
        last:        String,
    },
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::Status { code: 404 | 410, .. })
    }

    /// True when the final failure was an HTTP 5xx.
    pub fn is_server_error(&self) -> bool {
        match self {
            FetchError::Status { code, .. } => (500..600).contains(code),
            FetchError::Exhausted { last_status: Some(code), .. } => (500..600).contains(code),
            _ => false,
        }
    }
}

// ── Site profiles ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Same delay after every failed attempt.
    Linear(Duration),
    /// `unit * 2^(attempt+1)`, attempt counted from 0.
    Exponential { unit: Duration },
}

impl Backoff {
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Linear(d) => d,
            Backoff::Exponential { unit } => unit.saturating_mul(2u32.saturating_pow(attempt.saturating_add(1).min(16))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub name:            &'static str,
    pub accept:          &'static str,
    pub accept_language: &'static str,
    pub cache_control:   Option<&'static str>,
    pub max_attempts:    u32,
    pub backoff:         Backoff,
    pub min_delay:       Duration,
    pub timeout:         Duration,
    pub cookies:         bool,
}

impl SiteProfile {
    /// Family A: server-rendered pages.
    pub fn pages() -> Self {
        Self {
            name:            "pages",
            accept:          "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            accept_language: "ru-RU,ru;q=0.9,en;q=0.8",
            cache_control:   Some("max-age=0"),
            max_attempts:    3,
            backoff:         Backoff::Linear(Duration::from_secs(3)),
            min_delay:       Duration::from_millis(500),
            timeout:         Duration::from_secs(60),
            cookies:         false,
        }
    }

    /// Family B: JSON API and AJAX fragments.
    pub fn api() -> Self {
        Self {
            name:            "api",
            accept:          "application/json, text/html;q=0.9, */*;q=0.8",
            accept_language: "ru-RU,ru;q=0.9,en;q=0.8",
            cache_control:   None,
            max_attempts:    3,
            backoff:         Backoff::Exponential { unit: Duration::from_secs(1) },
            min_delay:       Duration::from_millis(150),
            timeout:         Duration::from_secs(30),
            cookies:         true,
        }
    }

    pub fn with_min_delay(mut self, min_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }
}

// ── Transport seam ───────────────────────────────────────────────────────────

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, req: &FetchRequest) -> std::result::Result<RawResponse, TransportError>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(profile: &SiteProfile) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_str(profile.accept)?);
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_str(profile.accept_language)?);
        if let Some(cc) = profile.cache_control {
            headers.insert(CACHE_CONTROL, HeaderValue::from_str(cc)?);
        }
        headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(profile.timeout)
            .connect_timeout(Duration::from_secs(15))
            .gzip(true)
            .cookie_store(profile.cookies)
            .build()
            .context(format!("build {} http client", profile.name))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, req: &FetchRequest) -> std::result::Result<RawResponse, TransportError> {
        let method = match req.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };

        let mut builder = self.client.request(method, &req.url).header(USER_AGENT, req.user_agent);
        if let Some(body) = &req.body {
            builder = builder.header(CONTENT_TYPE, "application/json").body(body.clone());
        }

        let resp = builder.send().await.map_err(|e| TransportError(describe(&e)))?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(|e| TransportError(describe(&e)))?;

        Ok(RawResponse { status, body: body.to_vec() })
    }
}

/// reqwest's Display hides the io cause ("error sending request"), so walk the chain.
fn describe(err: &reqwest::Error) -> String {
    let mut text = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    if err.is_timeout() && !is_retryable_text(&text) {
        text.push_str(" (timeout)");
    }
    text
}

// ── Fetcher ──────────────────────────────────────────────────────────────────

pub struct Fetcher {
    profile:   SiteProfile,
    transport: Arc<dyn Transport>,
    /// Start time of the previous request; the lock doubles as the serializer.
    gate:      Mutex<Option<Instant>>,
    ua_index:  AtomicUsize,
}

impl Fetcher {
    pub fn new(profile: SiteProfile) -> Result<Self> {
        let transport = ReqwestTransport::new(&profile)?;
        Ok(Self::with_transport(profile, Arc::new(transport)))
    }

    pub fn with_transport(profile: SiteProfile, transport: Arc<dyn Transport>) -> Self {
        Self {
            profile,
            transport,
            gate: Mutex::new(None),
            ua_index: AtomicUsize::new(0),
        }
    }

    pub async fn get(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        self.fetch(Method::Get, url, None).await
    }

    pub async fn get_text(&self, url: &str) -> std::result::Result<String, FetchError> {
        let bytes = self.get(url).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub async fn post_json(&self, url: &str, body: &serde_json::Value) -> std::result::Result<Vec<u8>, FetchError> {
        self.fetch(Method::Post, url, Some(body)).await
    }

    pub async fn fetch(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> std::result::Result<Vec<u8>, FetchError> {
        let max_attempts = self.profile.max_attempts.max(1);
        let mut last = String::new();
        let mut last_status = None;

        for attempt in 0..max_attempts {
            let req = FetchRequest {
                method,
                url: url.to_string(),
                body: body.map(|b| b.to_string()),
                user_agent: self.next_user_agent(),
            };

            match self.send_gated(&req).await {
                Ok(resp) if (200..300).contains(&resp.status) => {
                    if attempt > 0 {
                        debug!("{} succeeded after {} retries", url, attempt);
                    }
                    return Ok(resp.body);
                }
                Ok(resp) if (500..600).contains(&resp.status) => {
                    last_status = Some(resp.status);
                    last = format!("HTTP {}", resp.status);
                }
                Ok(resp) => {
                    return Err(FetchError::Status { url: url.to_string(), code: resp.status });
                }
                Err(e) if e.is_retryable() => {
                    last_status = None;
                    last = e.0;
                }
                Err(e) => {
                    return Err(FetchError::Network { url: url.to_string(), message: e.0 });
                }
            }

            if attempt + 1 < max_attempts {
                let delay = self.profile.backoff.delay(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {:?}...",
                    url,
                    attempt + 1,
                    max_attempts,
                    last,
                    delay
                );
                sleep(delay).await;
            }
        }

        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts: max_attempts,
            last_status,
            last,
        })
    }

    async fn send_gated(&self, req: &FetchRequest) -> std::result::Result<RawResponse, TransportError> {
        let mut last_start = self.gate.lock().await;
        if let Some(prev) = *last_start {
            let elapsed = prev.elapsed();
            if elapsed < self.profile.min_delay {
                sleep(self.profile.min_delay - elapsed).await;
            }
        }
        *last_start = Some(Instant::now());
        self.transport.send(req).await
    }

    fn next_user_agent(&self) -> &'static str {
        let i = self.ua_index.fetch_add(1, Ordering::Relaxed);
        USER_AGENTS[i % USER_AGENTS.len()]
    }
}
