/// HockeyHarvest — Page Parser
///
/// Site-specific knowledge lives here: which CSS selectors hold tournaments,
/// teams and players, and where the AJAX filter locators sit. The harvest
/// pipeline only talks to the `PageParser` trait.

pub mod html;
pub mod ids;

pub use html::{HtmlPageParser, SiteSelectors};

use anyhow::Result;
use chrono::NaiveDate;
use url::Url;

// ── Records ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct SeasonLink {
    /// "2025/2026"
    pub label:    String,
    /// None when the season is the one already rendered on the page
    pub ajax_url: Option<Url>,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TournamentRecord {
    pub ext_id:     i64,
    /// Canonical URL (year suffix stripped)
    pub url:        String,
    pub domain:     String,
    pub name:       String,
    pub season:     Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date:   Option<NaiveDate>,
    pub is_ended:   Option<bool>,
}

/// One `data-ajax` / `data-ajax-link` filter control.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterLink {
    pub label: String,
    /// Attribute value as found on the page, `params=` blob included
    pub raw:   String,
    pub url:   Url,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeamRecord {
    pub ext_id: i64,
    /// href as found on the page; dedup key within one traversal
    pub href:   String,
    pub url:    String,
    pub name:   String,
    pub city:   Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerRecord {
    pub href:        String,
    pub profile_url: String,
    pub external_id: Option<String>,
    pub source:      Option<String>,
    pub full_name:   String,
    pub birth_date:  Option<NaiveDate>,
    pub position:    Option<String>,
    pub height:      Option<i32>,
    pub weight:      Option<i32>,
    pub handedness:  Option<String>,
    pub number:      Option<i32>,
}

impl PlayerRecord {
    pub fn birth_year(&self) -> Option<i32> {
        ids::birth_year(self.birth_date)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerStatRecord {
    pub profile_url:     String,
    pub external_id:     Option<String>,
    pub source:          Option<String>,
    pub games:           i32,
    pub goals:           i32,
    pub assists:         i32,
    pub points:          i32,
    pub penalty_minutes: i32,
    pub plus_minus:      i32,
}

/// Anything the traversal walker can merge by raw href.
pub trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for TeamRecord {
    fn key(&self) -> &str {
        &self.href
    }
}

impl Keyed for PlayerRecord {
    fn key(&self) -> &str {
        &self.href
    }
}

// ── Parser capability ────────────────────────────────────────────────────────

pub trait PageParser: Send + Sync {
    /// Regional mirror roots linked from the discovery page.
    fn domains(&self, base: &Url, html: &str) -> Vec<Url>;

    fn tournament_list_url(&self, domain: &Url) -> Result<Url>;

    fn seasons(&self, base: &Url, html: &str) -> Vec<SeasonLink>;

    fn tournaments(&self, base: &Url, html: &str, season: Option<&str>) -> Vec<TournamentRecord>;

    fn filter_links(&self, base: &Url, html: &str) -> Vec<FilterLink>;

    fn teams(&self, base: &Url, html: &str) -> Vec<TeamRecord>;

    fn players(&self, base: &Url, html: &str) -> Vec<PlayerRecord>;

    /// None when the page is not a player profile.
    fn player_profile(&self, url: &Url, html: &str) -> Option<PlayerRecord>;

    fn player_profile_url(&self, base: &Url, id: u64) -> Result<Url>;

    fn stats_url(&self, tournament_url: &Url) -> Result<Url>;

    fn player_stats(&self, base: &Url, body: &[u8]) -> Result<Vec<PlayerStatRecord>>;
}
