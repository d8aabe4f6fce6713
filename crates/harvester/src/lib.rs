/// HockeyHarvest — Harvester
///
/// Crawl-and-ingest pipeline over the regional federation mirrors:
///   1. discover mirror domains from the root page
///   2. domain pool: duplicate-mirror check, all seasons, claim ids, store tournaments
///   3. team pool: walk tournament pages for teams, then rosters for players
///   4. statistics pool: per-tournament JSON stats
///   5. optional player-id scan
///
/// Every stage reports through `RunSummary`; only discovery can fail a run.

pub mod config;
pub mod context;
pub mod dedup;
pub mod domains;
pub mod orchestrator;
pub mod pool;
pub mod scan;
pub mod statistics;
pub mod summary;
pub mod teams;

#[cfg(test)]
mod testing;

pub use config::HarvestConfig;
pub use dedup::DedupSet;
pub use orchestrator::{Harvester, RunState};
pub use pool::WorkerPool;
pub use summary::{RunSummary, StageCounts};
