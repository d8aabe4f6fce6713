//! Brute-force player-id scan for mirrors whose rosters are not server-rendered.

use std::sync::Arc;

use harvest_store::{NewPlayer, Rejection, UpsertAction};
use tracing::{debug, warn};
use url::Url;

use crate::context::HarvestContext;

#[derive(Debug)]
pub enum ScanOutcome {
    Stored(UpsertAction),
    /// 404/410: the id does not exist
    NotFound,
    /// Page exists but carries no player card
    NotAProfile,
    Rejected(Rejection),
    Failed(String),
}

pub async fn probe_player(ctx: Arc<HarvestContext>, base: Url, id: u64) -> ScanOutcome {
    let url = match ctx.parser.player_profile_url(&base, id) {
        Ok(url) => url,
        Err(e) => return ScanOutcome::Failed(format!("{e:#}")),
    };

    let html = match ctx.pages.get_text(url.as_str()).await {
        Ok(html) => html,
        Err(e) if e.is_not_found() => return ScanOutcome::NotFound,
        Err(e) => {
            warn!("player {} probe failed: {}", id, e);
            return ScanOutcome::Failed(e.to_string());
        }
    };

    let Some(record) = ctx.parser.player_profile(&url, &html) else {
        debug!("{} is not a player profile", url);
        return ScanOutcome::NotAProfile;
    };

    let player = match NewPlayer::from_record(record, None, ctx.config.min_birth_year) {
        Ok(p) => p,
        Err(reason) => return ScanOutcome::Rejected(reason),
    };

    match ctx.store.upsert_player(player).await {
        Ok(outcome) => ScanOutcome::Stored(outcome.action),
        Err(e) => {
            warn!("player {} upsert failed: {:#}", id, e);
            ScanOutcome::Failed(format!("{e:#}"))
        }
    }
}
