//! Tournament → teams, and team roster → players + player/team links.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use harvest_store::{NewPlayer, NewPlayerTeamLink, NewTeam, StoredTeam, StoredTournament, UpsertAction};
use tracing::{debug, info, warn};
use traversal::{WalkStats, Walker};
use url::Url;

use crate::context::HarvestContext;

#[derive(Debug)]
pub struct TeamDiscovery {
    pub tournament: StoredTournament,
    pub teams:      Vec<StoredTeam>,
    pub walk:       WalkStats,
    pub error:      Option<anyhow::Error>,
}

pub async fn discover_teams(ctx: Arc<HarvestContext>, tournament: StoredTournament) -> TeamDiscovery {
    match run_discovery(&ctx, &tournament).await {
        Ok((teams, walk)) => {
            debug!(tournament_id = tournament.id, "{} teams from {}", teams.len(), tournament.url);
            TeamDiscovery { tournament, teams, walk, error: None }
        }
        Err(e) => {
            warn!(tournament_id = tournament.id, "team discovery failed: {:#}", e);
            TeamDiscovery { tournament, teams: Vec::new(), walk: WalkStats::default(), error: Some(e) }
        }
    }
}

async fn run_discovery(ctx: &HarvestContext, tournament: &StoredTournament) -> Result<(Vec<StoredTeam>, WalkStats)> {
    let page_url = Url::parse(&tournament.url).with_context(|| format!("tournament url {}", tournament.url))?;
    let html = ctx.get_page(page_url.as_str()).await?;

    let walker = Walker::new(&ctx.api, ctx.parser.as_ref(), ctx.config.min_birth_year);
    let walk = walker.walk_teams(&page_url, &html).await;

    let batch: Vec<NewTeam> = walk
        .items
        .into_iter()
        .map(|r| NewTeam::from_record(r, tournament.id))
        .collect();
    let teams = ctx.store.create_teams(batch).await.context("team batch upsert")?;
    Ok((teams, walk.stats))
}

#[derive(Debug, Clone)]
pub struct RosterJob {
    pub team:       StoredTeam,
    pub tournament: StoredTournament,
}

#[derive(Debug, Default)]
pub struct RosterResult {
    pub team_url:      String,
    /// Distinct player ids upserted from this roster
    pub player_ids:    Vec<i64>,
    pub inserted:      usize,
    pub refreshed:     usize,
    /// Below the age floor or missing required fields
    pub rejected:      usize,
    pub player_errors: usize,
    pub links_written: usize,
    pub walk:          WalkStats,
    pub error:         Option<anyhow::Error>,
}

pub async fn harvest_roster(ctx: Arc<HarvestContext>, job: RosterJob) -> RosterResult {
    let mut result = RosterResult { team_url: job.team.url.clone(), ..Default::default() };
    if let Err(e) = run_roster(&ctx, &job, &mut result).await {
        warn!(team = %job.team.url, "roster failed: {:#}", e);
        result.error = Some(e);
    }
    result
}

async fn run_roster(ctx: &HarvestContext, job: &RosterJob, out: &mut RosterResult) -> Result<()> {
    let page_url = Url::parse(&job.team.url).with_context(|| format!("team url {}", job.team.url))?;
    let html = ctx.get_page(page_url.as_str()).await?;

    let walker = Walker::new(&ctx.api, ctx.parser.as_ref(), ctx.config.min_birth_year);
    let walk = walker.walk_players(&page_url, &html).await;
    out.walk = walk.stats;

    let season = job.tournament.season.as_deref();
    // player id -> number worn on this roster
    let mut roster: BTreeMap<i64, Option<i32>> = BTreeMap::new();

    for record in walk.items {
        let number = record.number;
        let player = match NewPlayer::from_record(record, season, ctx.config.min_birth_year) {
            Ok(p) => p,
            Err(reason) => {
                debug!(team = %job.team.url, "player skipped: {}", reason);
                out.rejected += 1;
                continue;
            }
        };

        let url = player.profile_url.clone();
        match ctx.store.upsert_player(player).await {
            Ok(outcome) => {
                match outcome.action {
                    UpsertAction::Inserted => out.inserted += 1,
                    UpsertAction::Refreshed => out.refreshed += 1,
                    UpsertAction::Kept => {}
                }
                roster.entry(outcome.id).or_insert(number);
            }
            Err(e) => {
                warn!(player = %url, "player upsert failed: {:#}", e);
                out.player_errors += 1;
            }
        }
    }

    let links: Vec<NewPlayerTeamLink> = roster
        .iter()
        .map(|(&player_id, &jersey_number)| NewPlayerTeamLink {
            player_id,
            team_id: job.team.id,
            tournament_id: job.tournament.id,
            season: job.tournament.season.clone(),
            active_from: job.tournament.start_date,
            active_to: job.tournament.end_date,
            jersey_number,
        })
        .collect();
    out.links_written = ctx.store.create_links(links).await.context("link batch upsert")?;
    out.player_ids = roster.into_keys().collect();

    info!(
        team = %job.team.name,
        "{} players ({} new, {} refreshed), {} rejected",
        out.player_ids.len(),
        out.inserted,
        out.refreshed,
        out.rejected
    );
    Ok(())
}
