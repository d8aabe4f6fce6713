/// HockeyHarvest — Storage
///
/// Repository traits consumed by the harvest pipeline, the SQLite implementation,
/// and the freshness policy deciding when a player row may be overwritten.
/// Every write is an upsert on a natural key, so a replayed run is harmless.

pub mod freshness;
pub mod models;
pub mod schema;
pub mod sqlite;

pub use models::*;
pub use sqlite::SqliteStore;

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait TournamentRepository: Send + Sync {
    /// Conflict target: url. Null incoming fields never clear stored ones.
    async fn upsert_tournament(&self, t: NewTournament) -> Result<i64>;

    /// One transaction for the whole batch.
    async fn create_tournaments(&self, batch: Vec<NewTournament>) -> Result<Vec<StoredTournament>>;

    async fn tournament_by_url(&self, url: &str) -> Result<Option<StoredTournament>>;

    async fn tournaments(&self) -> Result<Vec<StoredTournament>>;
}

#[async_trait]
pub trait TeamRepository: Send + Sync {
    async fn create_teams(&self, batch: Vec<NewTeam>) -> Result<Vec<StoredTeam>>;

    async fn team_by_url(&self, url: &str) -> Result<Option<StoredTeam>>;
}

#[async_trait]
pub trait PlayerRepository: Send + Sync {
    /// Matches on (external_id, source), else profile url; freshness decides the write.
    async fn upsert_player(&self, p: NewPlayer) -> Result<UpsertOutcome>;

    async fn player_by_external_id(&self, external_id: &str, source: &str) -> Result<Option<StoredPlayer>>;

    async fn player_by_url(&self, profile_url: &str) -> Result<Option<StoredPlayer>>;

    async fn get_player(&self, id: i64) -> Result<Option<StoredPlayer>>;

    async fn search_players(&self, name: &str, limit: usize) -> Result<Vec<StoredPlayer>>;
}

#[async_trait]
pub trait PlayerTeamRepository: Send + Sync {
    /// Keyed on (player, team, tournament); returns rows written.
    async fn create_links(&self, batch: Vec<NewPlayerTeamLink>) -> Result<usize>;
}

#[async_trait]
pub trait StatisticsRepository: Send + Sync {
    /// Keyed on (player, tournament); returns rows written.
    async fn create_statistics(&self, batch: Vec<NewPlayerStat>) -> Result<usize>;
}

/// Everything the harvest pipeline writes to.
pub trait HarvestStore:
    TournamentRepository + TeamRepository + PlayerRepository + PlayerTeamRepository + StatisticsRepository
{
}

impl<T> HarvestStore for T where
    T: TournamentRepository + TeamRepository + PlayerRepository + PlayerTeamRepository + StatisticsRepository
{
}
