//! Per-tournament player statistics from the JSON endpoint.

use std::sync::Arc;

use anyhow::{Context, Result};
use harvest_store::{NewPlayerStat, StoredPlayer, StoredTournament};
use page_parser::PlayerStatRecord;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use crate::context::HarvestContext;

#[derive(Debug, Default)]
pub struct StatsResult {
    pub tournament_url:  String,
    pub written:         usize,
    /// Rows whose player is not in the store yet
    pub unknown_players: usize,
    /// Endpoint answered 404: tournament publishes no statistics
    pub unavailable:     bool,
    pub error:           Option<anyhow::Error>,
}

pub async fn ingest_statistics(ctx: Arc<HarvestContext>, tournament: StoredTournament) -> StatsResult {
    let mut result = StatsResult { tournament_url: tournament.url.clone(), ..Default::default() };
    if let Err(e) = run_stats(&ctx, &tournament, &mut result).await {
        warn!(tournament_id = tournament.id, "statistics failed: {:#}", e);
        result.error = Some(e);
    }
    result
}

async fn run_stats(ctx: &HarvestContext, tournament: &StoredTournament, out: &mut StatsResult) -> Result<()> {
    let page_url = Url::parse(&tournament.url).with_context(|| format!("tournament url {}", tournament.url))?;
    let stats_url = ctx.parser.stats_url(&page_url)?;

    let body = match ctx
        .post_api(stats_url.as_str(), &json!({ "tournament_id": tournament.ext_id }))
        .await
    {
        Ok(body) => body,
        Err(e) if e.is_not_found() => {
            debug!("no statistics published for {}", tournament.url);
            out.unavailable = true;
            return Ok(());
        }
        Err(e) => return Err(e).context("statistics request"),
    };

    let rows = ctx.parser.player_stats(&stats_url, &body)?;
    let mut batch = Vec::with_capacity(rows.len());

    for row in rows {
        let Some(player) = resolve_player(ctx, &row).await? else {
            out.unknown_players += 1;
            continue;
        };
        batch.push(NewPlayerStat {
            player_id: player.id,
            tournament_id: tournament.id,
            games: row.games,
            goals: row.goals,
            assists: row.assists,
            points: row.points,
            penalty_minutes: row.penalty_minutes,
            plus_minus: row.plus_minus,
        });
    }

    out.written = ctx.store.create_statistics(batch).await.context("statistics batch upsert")?;
    Ok(())
}

async fn resolve_player(ctx: &HarvestContext, row: &PlayerStatRecord) -> Result<Option<StoredPlayer>> {
    if let (Some(ext), Some(src)) = (&row.external_id, &row.source) {
        if let Some(p) = ctx.store.player_by_external_id(ext, src).await? {
            return Ok(Some(p));
        }
    }
    ctx.store.player_by_url(&row.profile_url).await
}
