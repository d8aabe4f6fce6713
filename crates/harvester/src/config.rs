//! Run configuration from environment variables (after `dotenv`).

use std::env;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use site_fetcher::SiteProfile;
use tracing::warn;
use url::Url;

pub const DEFAULT_ROOT_URL: &str = "https://fhr.ru/regions/";

#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Discovery page listing the regional mirrors
    pub root_url:          Url,
    pub extra_domains:     Vec<Url>,
    pub db_path:           PathBuf,
    pub log_dir:           PathBuf,
    pub domain_workers:    usize,
    pub team_workers:      usize,
    pub scan_workers:      usize,
    pub stats_workers:     usize,
    /// Age floor for players, also the cutoff for year filters
    pub min_birth_year:    Option<i32>,
    /// None disables the player-id scan
    pub scan_range:        Option<RangeInclusive<u64>>,
    pub scan_base_url:     Option<Url>,
    pub harvest_stats:     bool,
    /// Delay before the single manual retry of a 5xx domain/tournament fetch
    pub server_error_delay: Duration,
    pub page_delay:        Duration,
    pub api_delay:         Duration,
    pub page_timeout:      Duration,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            root_url: default_root_url(),
            extra_domains: Vec::new(),
            db_path: PathBuf::from("data/harvest.db"),
            log_dir: PathBuf::from("logs"),
            domain_workers: 4,
            team_workers: 4,
            scan_workers: 2,
            stats_workers: 2,
            min_birth_year: Some(2008),
            scan_range: None,
            scan_base_url: None,
            harvest_stats: true,
            server_error_delay: Duration::from_secs(10),
            page_delay: Duration::from_millis(500),
            api_delay: Duration::from_millis(150),
            page_timeout: Duration::from_secs(60),
        }
    }
}

fn default_root_url() -> Url {
    Url::parse(DEFAULT_ROOT_URL).unwrap_or_else(|_| unreachable!("constant url parses"))
}

impl HarvestConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key → value source; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut cfg = Self::default();

        if let Some(raw) = get("HARVEST_ROOT_URL") {
            match Url::parse(&raw) {
                Ok(url) => cfg.root_url = url,
                Err(e) => warn!("HARVEST_ROOT_URL {:?} invalid ({}), using {}", raw, e, DEFAULT_ROOT_URL),
            }
        }

        if let Some(raw) = get("HARVEST_EXTRA_DOMAINS") {
            cfg.extra_domains = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .filter_map(|s| match Url::parse(s) {
                    Ok(url) => Some(url),
                    Err(e) => {
                        warn!("ignoring extra domain {:?}: {}", s, e);
                        None
                    }
                })
                .collect();
        }

        if let Some(raw) = get("HARVEST_DB_PATH") {
            cfg.db_path = PathBuf::from(raw);
        }
        if let Some(raw) = get("HARVEST_LOG_DIR") {
            cfg.log_dir = PathBuf::from(raw);
        }

        cfg.domain_workers = parsed(&get, "HARVEST_DOMAIN_WORKERS", cfg.domain_workers).max(1);
        cfg.team_workers = parsed(&get, "HARVEST_TEAM_WORKERS", cfg.team_workers).max(1);
        cfg.scan_workers = parsed(&get, "HARVEST_SCAN_WORKERS", cfg.scan_workers).max(1);
        cfg.stats_workers = parsed(&get, "HARVEST_STATS_WORKERS", cfg.stats_workers).max(1);

        if let Some(raw) = get("HARVEST_MIN_BIRTH_YEAR") {
            match raw.parse::<i32>() {
                Ok(0) => cfg.min_birth_year = None,
                Ok(year) => cfg.min_birth_year = Some(year),
                Err(_) => warn!("HARVEST_MIN_BIRTH_YEAR {:?} invalid, using {:?}", raw, cfg.min_birth_year),
            }
        }

        if let Some(raw) = get("HARVEST_SCAN_RANGE") {
            cfg.scan_range = parse_scan_range(&raw);
            if cfg.scan_range.is_none() {
                warn!("HARVEST_SCAN_RANGE {:?} invalid (want START-END), scan disabled", raw);
            }
        }

        if let Some(raw) = get("HARVEST_SCAN_BASE_URL") {
            match Url::parse(&raw) {
                Ok(url) => cfg.scan_base_url = Some(url),
                Err(e) => warn!("HARVEST_SCAN_BASE_URL {:?} invalid: {}", raw, e),
            }
        }

        if let Some(raw) = get("HARVEST_STATS") {
            match parse_flag(&raw) {
                Some(flag) => cfg.harvest_stats = flag,
                None => warn!("HARVEST_STATS {:?} invalid, keeping {}", raw, cfg.harvest_stats),
            }
        }

        cfg.server_error_delay = Duration::from_secs(parsed(
            &get,
            "HARVEST_SERVER_ERROR_DELAY_SECS",
            cfg.server_error_delay.as_secs(),
        ));
        cfg.page_delay = Duration::from_millis(parsed(&get, "HARVEST_PAGE_DELAY_MS", 500));
        cfg.api_delay = Duration::from_millis(parsed(&get, "HARVEST_API_DELAY_MS", 150));
        cfg.page_timeout = Duration::from_secs(parsed(&get, "HARVEST_PAGE_TIMEOUT_SECS", 60));

        cfg
    }

    /// Family A client: server-rendered pages.
    pub fn page_profile(&self) -> SiteProfile {
        SiteProfile::pages()
            .with_min_delay(self.page_delay)
            .with_timeout(self.page_timeout)
    }

    /// Family B client: AJAX fragments and the JSON statistics endpoint.
    pub fn api_profile(&self) -> SiteProfile {
        SiteProfile::api().with_min_delay(self.api_delay)
    }
}

fn parsed<T, G>(get: &G, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => default,
        Some(raw) => raw.parse::<T>().unwrap_or_else(|_| {
            warn!("{} {:?} invalid, using {:?}", key, raw, default);
            default
        }),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// `START-END`, inclusive, START <= END.
pub fn parse_scan_range(raw: &str) -> Option<RangeInclusive<u64>> {
    let (start, end) = raw.split_once('-')?;
    let start = start.trim().parse::<u64>().ok()?;
    let end = end.trim().parse::<u64>().ok()?;
    (start <= end).then_some(start..=end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> HarvestConfig {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        HarvestConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = config(&[]);
        assert_eq!(cfg.root_url.as_str(), DEFAULT_ROOT_URL);
        assert_eq!(cfg.domain_workers, 4);
        assert_eq!(cfg.scan_workers, 2);
        assert_eq!(cfg.min_birth_year, Some(2008));
        assert!(cfg.scan_range.is_none());
        assert!(cfg.harvest_stats);
        assert_eq!(cfg.server_error_delay, Duration::from_secs(10));
    }

    #[test]
    fn overrides_and_fallbacks() {
        let cfg = config(&[
            ("HARVEST_DOMAIN_WORKERS", "0"),
            ("HARVEST_TEAM_WORKERS", "lots"),
            ("HARVEST_EXTRA_DOMAINS", "https://msk.fhr.ru/, not a url ,https://spb.fhr.ru/"),
            ("HARVEST_SCAN_RANGE", "100-250"),
            ("HARVEST_STATS", "off"),
            ("HARVEST_MIN_BIRTH_YEAR", "0"),
            ("HARVEST_ROOT_URL", "::bad::"),
        ]);
        assert_eq!(cfg.domain_workers, 1);
        assert_eq!(cfg.team_workers, 4);
        assert_eq!(cfg.extra_domains.len(), 2);
        assert_eq!(cfg.scan_range, Some(100..=250));
        assert!(!cfg.harvest_stats);
        assert_eq!(cfg.min_birth_year, None);
        assert_eq!(cfg.root_url.as_str(), DEFAULT_ROOT_URL);
    }

    #[test]
    fn scan_range_shapes() {
        assert_eq!(parse_scan_range("5-5"), Some(5..=5));
        assert_eq!(parse_scan_range(" 1 - 3 "), Some(1..=3));
        assert_eq!(parse_scan_range("9-1"), None);
        assert_eq!(parse_scan_range("12"), None);
    }
}
