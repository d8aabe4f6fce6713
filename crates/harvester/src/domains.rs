//! Per-domain harvest: duplicate-mirror check, all-season tournament listing,
//! id claiming against the run's dedup set, and the batch upsert.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use harvest_store::{NewTournament, StoredTournament};
use page_parser::{SeasonLink, TournamentRecord};
use tracing::{debug, info, warn};
use url::Url;

use crate::context::HarvestContext;

#[derive(Debug)]
pub struct DomainResult {
    pub domain:       String,
    /// Rows written by this worker (ids it won in the dedup set)
    pub tournaments:  Vec<StoredTournament>,
    /// Ids another worker had already claimed
    pub collisions:   usize,
    pub is_duplicate: bool,
    pub error:        Option<anyhow::Error>,
}

pub async fn harvest_domain(ctx: Arc<HarvestContext>, domain: Url) -> DomainResult {
    let name = domain.host_str().unwrap_or(domain.as_str()).to_string();
    match run_domain(&ctx, &domain).await {
        Ok(Harvested::Duplicate) => {
            info!(domain = %name, "mirror of already harvested data, skipping");
            DomainResult {
                domain: name,
                tournaments: Vec::new(),
                collisions: 0,
                is_duplicate: true,
                error: None,
            }
        }
        Ok(Harvested::Stored { tournaments, collisions }) => {
            info!(domain = %name, "{} tournaments stored, {} already claimed", tournaments.len(), collisions);
            DomainResult { domain: name, tournaments, collisions, is_duplicate: false, error: None }
        }
        Err(e) => {
            warn!(domain = %name, "domain failed: {:#}", e);
            DomainResult {
                domain: name,
                tournaments: Vec::new(),
                collisions: 0,
                is_duplicate: false,
                error: Some(e),
            }
        }
    }
}

enum Harvested {
    Duplicate,
    Stored { tournaments: Vec<StoredTournament>, collisions: usize },
}

async fn run_domain(ctx: &HarvestContext, domain: &Url) -> Result<Harvested> {
    let list_url = ctx.parser.tournament_list_url(domain)?;
    let html = ctx
        .get_page(list_url.as_str())
        .await
        .with_context(|| format!("tournament list {list_url}"))?;

    let seasons = ctx.parser.seasons(&list_url, &html);
    let default_season = default_season(&seasons);
    let default_label = default_season.map(|s| s.label.as_str());
    let first = ctx.parser.tournaments(&list_url, &html, default_label);

    if ctx.dedup.all_known(first.iter().map(|t| t.ext_id)) {
        return Ok(Harvested::Duplicate);
    }

    let mut merged: BTreeMap<i64, TournamentRecord> = BTreeMap::new();
    merge_newest(&mut merged, first);

    for season in &seasons {
        if default_season.is_some_and(|d| d.label == season.label) {
            continue;
        }
        let Some(ajax_url) = &season.ajax_url else {
            debug!("season {} has no locator on {}", season.label, list_url);
            continue;
        };
        let fragment = ctx
            .get_page(ajax_url.as_str())
            .await
            .with_context(|| format!("season {} on {}", season.label, list_url))?;
        merge_newest(&mut merged, ctx.parser.tournaments(ajax_url, &fragment, Some(&season.label)));
    }

    let mut claimed = Vec::new();
    let mut collisions = 0;
    for (id, record) in merged {
        if ctx.dedup.insert_if_absent(id) {
            claimed.push(NewTournament::from(record));
        } else {
            collisions += 1;
        }
    }

    let tournaments = ctx
        .store
        .create_tournaments(claimed)
        .await
        .context("tournament batch upsert")?;

    Ok(Harvested::Stored { tournaments, collisions })
}

/// The season rendered with the page: the selected option, else the first one.
fn default_season(seasons: &[SeasonLink]) -> Option<&SeasonLink> {
    seasons.iter().find(|s| s.selected).or_else(|| seasons.first())
}

/// Keeps one record per id, preferring the newest season label.
fn merge_newest(merged: &mut BTreeMap<i64, TournamentRecord>, records: Vec<TournamentRecord>) {
    for record in records {
        match merged.get(&record.ext_id) {
            Some(existing) if existing.season >= record.season => {}
            _ => {
                merged.insert(record.ext_id, record);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{context, FixtureTransport, SPB};

    fn record(id: i64, season: Option<&str>) -> TournamentRecord {
        TournamentRecord {
            ext_id: id,
            url: format!("https://spb.fhr.ru/tournaments/{id}/"),
            domain: "spb.fhr.ru".into(),
            name: format!("T{id}"),
            season: season.map(str::to_string),
            start_date: None,
            end_date: None,
            is_ended: None,
        }
    }

    #[test]
    fn newest_season_wins_per_id() {
        let mut merged = BTreeMap::new();
        merge_newest(&mut merged, vec![record(1, Some("2024/2025")), record(2, Some("2024/2025"))]);
        merge_newest(&mut merged, vec![record(1, Some("2023/2024")), record(3, Some("2023/2024"))]);
        merge_newest(&mut merged, vec![record(2, Some("2025/2026"))]);

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[&1].season.as_deref(), Some("2024/2025"));
        assert_eq!(merged[&2].season.as_deref(), Some("2025/2026"));
    }

    #[test]
    fn selected_season_is_default() {
        let seasons = vec![
            SeasonLink { label: "2025/2026".into(), ajax_url: None, selected: false },
            SeasonLink { label: "2024/2025".into(), ajax_url: None, selected: true },
        ];
        assert_eq!(default_season(&seasons).unwrap().label, "2024/2025");
        assert_eq!(default_season(&seasons[..1]).unwrap().label, "2025/2026");
        assert!(default_season(&[]).is_none());
    }

    fn item(id: u32, class: &str) -> String {
        format!(
            r#"<div class="tournament-item {class}" data-start="01.09.2024" data-end="30.04.2025"><a class="tournament-link" href="/tournaments/{id}/">Турнир {id}</a></div>"#
        )
    }

    fn list_page(season_block: &str, items: &[String]) -> String {
        format!("{season_block}{}", items.concat())
    }

    const SEASONS: &str = r#"<select class="season-select">
        <option selected>2024/2025</option>
        <option data-ajax-link="/ajax/tournaments.php?season=2023">2023/2024</option>
    </select>"#;

    #[tokio::test]
    async fn harvests_all_seasons_then_detects_mirror() {
        let transport = Arc::new(FixtureTransport::default());
        transport.page(
            &format!("{SPB}/tournaments/"),
            200,
            list_page(SEASONS, &[item(101, ""), item(102, "finished")]),
        );
        transport.page(
            &format!("{SPB}/ajax/tournaments.php?season=2023"),
            200,
            format!("{}{}", item(101, "finished"), item(103, "finished")),
        );
        transport.page(
            "https://msk.fhr.ru/tournaments/",
            200,
            list_page("", &[item(101, ""), item(102, "")]),
        );
        transport.page(
            "https://nn.fhr.ru/tournaments/",
            200,
            list_page("", &[item(101, ""), item(104, "")]),
        );
        let (ctx, _store) = context(transport);

        let spb = harvest_domain(Arc::clone(&ctx), Url::parse(&format!("{SPB}/")).unwrap()).await;
        assert!(spb.error.is_none());
        assert!(!spb.is_duplicate);
        assert_eq!(spb.tournaments.len(), 3);
        let t101 = spb.tournaments.iter().find(|t| t.ext_id == 101).unwrap();
        assert_eq!(t101.season.as_deref(), Some("2024/2025"));
        assert_eq!(t101.is_ended, Some(false));

        let msk = harvest_domain(Arc::clone(&ctx), Url::parse("https://msk.fhr.ru/").unwrap()).await;
        assert!(msk.is_duplicate);
        assert!(msk.tournaments.is_empty());

        let nn = harvest_domain(Arc::clone(&ctx), Url::parse("https://nn.fhr.ru/").unwrap()).await;
        assert!(!nn.is_duplicate);
        assert_eq!(nn.collisions, 1);
        assert_eq!(nn.tournaments.len(), 1);
        assert_eq!(nn.tournaments[0].ext_id, 104);
    }

    #[tokio::test]
    async fn server_error_retried_once_then_domain_fails() {
        let transport = Arc::new(FixtureTransport::default());
        let list = format!("{SPB}/tournaments/");
        transport.page(&list, 502, "");
        let (ctx, _store) = context(transport.clone());

        let r = harvest_domain(ctx, Url::parse(&format!("{SPB}/")).unwrap()).await;
        assert!(r.error.is_some());
        // fetcher attempts, twice
        assert_eq!(transport.calls_to(&list), 6);
    }

    #[tokio::test]
    async fn not_found_fails_without_retry() {
        let transport = Arc::new(FixtureTransport::default());
        let (ctx, _store) = context(transport.clone());

        let r = harvest_domain(ctx, Url::parse("https://gone.fhr.ru/").unwrap()).await;
        assert!(r.error.is_some());
        assert_eq!(transport.calls_to("https://gone.fhr.ru/tournaments/"), 1);
    }
}
