//! Two-level (year → group) traversal over a roster-style page.

use page_parser::{ids, FilterLink, Keyed, PageParser, PlayerRecord, TeamRecord};
use site_fetcher::Fetcher;
use std::collections::BTreeMap;
use tracing::{debug, warn};
use url::Url;

use crate::classifier::classify;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WalkStats {
    pub years:          usize,
    pub years_skipped:  usize,
    pub groups:         usize,
    pub failed_fetches: usize,
}

impl WalkStats {
    /// Fragments requested and answered.
    pub fn fetched(&self) -> usize {
        (self.years - self.years_skipped + self.groups).saturating_sub(self.failed_fetches)
    }
}

#[derive(Debug)]
pub struct Walk<T> {
    /// Deduplicated by raw href, ordered by href
    pub items: Vec<T>,
    pub stats: WalkStats,
}

pub struct Walker<'a> {
    fetcher:  &'a Fetcher,
    parser:   &'a dyn PageParser,
    /// Year filters below this label are not fetched
    min_year: Option<i32>,
}

impl<'a> Walker<'a> {
    pub fn new(fetcher: &'a Fetcher, parser: &'a dyn PageParser, min_year: Option<i32>) -> Self {
        Self { fetcher, parser, min_year }
    }

    pub async fn walk_teams(&self, page_url: &Url, html: &str) -> Walk<TeamRecord> {
        let parser = self.parser;
        self.walk(page_url, html, |u, h| parser.teams(u, h)).await
    }

    pub async fn walk_players(&self, page_url: &Url, html: &str) -> Walk<PlayerRecord> {
        let parser = self.parser;
        self.walk(page_url, html, |u, h| parser.players(u, h)).await
    }

    pub async fn walk<T, F>(&self, page_url: &Url, html: &str, extract: F) -> Walk<T>
    where
        T: Keyed + Send,
        F: Fn(&Url, &str) -> Vec<T> + Sync,
    {
        let mut merged: BTreeMap<String, T> = BTreeMap::new();
        let mut stats = WalkStats::default();

        let (years, groups) = split_filters(self.parser.filter_links(page_url, html));

        if years.is_empty() && groups.is_empty() {
            merge(&mut merged, extract(page_url, html));
        } else if years.is_empty() {
            self.walk_groups(&groups, &extract, &mut merged, &mut stats).await;
        } else {
            for year in &years {
                stats.years += 1;
                if self.below_cutoff(year) {
                    debug!("skipping year filter {:?} (below {:?})", year.label, self.min_year);
                    stats.years_skipped += 1;
                    continue;
                }

                let Some(fragment) = self.fetch_fragment(&year.url, &mut stats).await else {
                    continue;
                };

                let (_, year_groups) = split_filters(self.parser.filter_links(&year.url, &fragment));
                if year_groups.is_empty() {
                    merge(&mut merged, extract(&year.url, &fragment));
                } else {
                    self.walk_groups(&year_groups, &extract, &mut merged, &mut stats).await;
                }
            }
        }

        Walk { items: merged.into_values().collect(), stats }
    }

    async fn walk_groups<T, F>(
        &self,
        groups: &[FilterLink],
        extract: &F,
        merged: &mut BTreeMap<String, T>,
        stats: &mut WalkStats,
    ) where
        T: Keyed + Send,
        F: Fn(&Url, &str) -> Vec<T> + Sync,
    {
        for group in groups {
            stats.groups += 1;
            if let Some(fragment) = self.fetch_fragment(&group.url, stats).await {
                merge(merged, extract(&group.url, &fragment));
            }
        }
    }

    fn below_cutoff(&self, year: &FilterLink) -> bool {
        match (self.min_year, ids::parse_year_label(&year.label)) {
            (Some(min), Some(label_year)) => label_year < min,
            _ => false,
        }
    }

    async fn fetch_fragment(&self, url: &Url, stats: &mut WalkStats) -> Option<String> {
        match self.fetcher.get_text(url.as_str()).await {
            Ok(body) => Some(body),
            Err(e) => {
                warn!("filter fragment failed, continuing: {}", e);
                stats.failed_fetches += 1;
                None
            }
        }
    }
}

/// (drill-into links, group links)
fn split_filters(links: Vec<FilterLink>) -> (Vec<FilterLink>, Vec<FilterLink>) {
    links
        .into_iter()
        .partition(|l| classify(&l.raw).drills_into_groups())
}

fn merge<T: Keyed>(merged: &mut BTreeMap<String, T>, items: Vec<T>) {
    for item in items {
        merged.entry(item.key().to_string()).or_insert(item);
    }
}
