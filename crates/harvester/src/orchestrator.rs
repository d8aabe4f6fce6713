//! Run sequence: discover → harvest domains → process tournaments →
//! statistics → player scan. The orchestrator is the only consumer of the
//! pools' result channels and owns every counter.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use harvest_store::{HarvestStore, SqliteStore, StoredTournament, UpsertAction};
use logger::{now_iso, DomainResultEvent, EventLogger, RunStateEvent};
use page_parser::{ids, HtmlPageParser, PageParser};
use site_fetcher::Fetcher;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use traversal::WalkStats;
use url::Url;

use crate::config::HarvestConfig;
use crate::context::HarvestContext;
use crate::dedup::DedupSet;
use crate::domains::harvest_domain;
use crate::pool::WorkerPool;
use crate::scan::{probe_player, ScanOutcome};
use crate::statistics::ingest_statistics;
use crate::summary::{RunSummary, StageCounts};
use crate::teams::{discover_teams, harvest_roster, RosterJob};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    DiscoveringDomains,
    HarvestingDomains,
    ProcessingTournaments,
    IngestingStatistics,
    ScanningPlayers,
    Completed,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

pub struct Harvester {
    config: HarvestConfig,
    pages:  Fetcher,
    api:    Fetcher,
    parser: Arc<dyn PageParser>,
    store:  Arc<dyn HarvestStore>,
    logger: EventLogger,
    state:  watch::Sender<RunState>,
}

impl Harvester {
    pub fn new(
        config: HarvestConfig,
        pages: Fetcher,
        api: Fetcher,
        parser: Arc<dyn PageParser>,
        store: Arc<dyn HarvestStore>,
    ) -> Self {
        let logger = EventLogger::new(&config.log_dir);
        let (state, _) = watch::channel(RunState::Idle);
        Self { config, pages, api, parser, store, logger, state }
    }

    /// Production wiring: reqwest clients, the default HTML adapter, SQLite at `db_path`.
    pub fn from_config(config: HarvestConfig) -> Result<Self> {
        let pages = Fetcher::new(config.page_profile()).context("page client")?;
        let api = Fetcher::new(config.api_profile()).context("api client")?;
        let parser: Arc<dyn PageParser> = Arc::new(HtmlPageParser::standard()?);
        let store: Arc<dyn HarvestStore> = Arc::new(SqliteStore::open(&config.db_path)?);
        Ok(Self::new(config, pages, api, parser, store))
    }

    /// Observe state transitions of the coming run.
    pub fn subscribe_state(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    /// One full harvest. Returns Err only when discovery yields nothing;
    /// every other failure is counted in the summary.
    pub async fn run(self, cancel: CancellationToken) -> Result<RunSummary> {
        let started = Instant::now();
        let run_id = format!("run-{}", Utc::now().format("%Y%m%dT%H%M%S"));
        let mut summary = RunSummary::new(run_id.clone());
        info!("=== Harvest {} starting ===", run_id);

        self.transition(&run_id, RunState::DiscoveringDomains);
        let domains = match self.discover().await {
            Ok(domains) => domains,
            Err(e) => {
                error!("discovery failed: {:#}", e);
                self.transition(&run_id, RunState::Failed);
                return Err(e);
            }
        };
        info!("{} domains to harvest", domains.len());

        let Harvester { config, pages, api, parser, store, logger, state } = self;
        let stage = StageLog { logger: &logger, state: &state, run_id: &run_id };
        let ctx = Arc::new(HarvestContext { config, pages, api, parser, store, dedup: DedupSet::new() });

        stage.enter(RunState::HarvestingDomains);
        let tournaments = harvest_domains(&ctx, domains, &cancel, &stage, &mut summary).await;

        if !cancel.is_cancelled() {
            stage.enter(RunState::ProcessingTournaments);
            process_tournaments(&ctx, &tournaments, &cancel, &mut summary).await;
        }

        if ctx.config.harvest_stats && !cancel.is_cancelled() {
            stage.enter(RunState::IngestingStatistics);
            ingest_all_statistics(&ctx, &tournaments, &cancel, &mut summary).await;
        }

        if let Some(range) = ctx.config.scan_range.clone() {
            if !cancel.is_cancelled() {
                stage.enter(RunState::ScanningPlayers);
                let base = ctx
                    .config
                    .scan_base_url
                    .clone()
                    .unwrap_or_else(|| ids::site_root(&ctx.config.root_url));
                scan_players(&ctx, base, range, &cancel, &mut summary).await;
            }
        }

        summary.cancelled = cancel.is_cancelled();
        summary.elapsed = started.elapsed();
        stage.enter(RunState::Completed);

        info!("{}", summary);
        logger.log_quiet(&summary.to_event());
        Ok(summary)
    }

    async fn discover(&self) -> Result<Vec<Url>> {
        let root = &self.config.root_url;
        let mut found = match self.pages.get_text(root.as_str()).await {
            Ok(html) => self.parser.domains(root, &html),
            Err(e) if !self.config.extra_domains.is_empty() => {
                warn!("discovery page failed, using configured domains only: {}", e);
                Vec::new()
            }
            Err(e) => return Err(e).context("discovery page"),
        };
        found.extend(self.config.extra_domains.iter().map(ids::site_root));

        let mut seen = HashSet::new();
        found.retain(|d| seen.insert(d.as_str().to_string()));
        if found.is_empty() {
            bail!("no domains discovered on {}", root);
        }
        Ok(found)
    }

    fn transition(&self, run_id: &str, next: RunState) {
        StageLog { logger: &self.logger, state: &self.state, run_id }.enter(next);
    }
}

struct StageLog<'a> {
    logger: &'a EventLogger,
    state:  &'a watch::Sender<RunState>,
    run_id: &'a str,
}

impl StageLog<'_> {
    fn enter(&self, next: RunState) {
        let prev = self.state.send_replace(next);
        info!("run state {} -> {}", prev, next);
        self.logger.log_quiet(&RunStateEvent {
            ts: now_iso(),
            event: "RUN_STATE",
            run_id: self.run_id.to_string(),
            state: next.to_string(),
        });
    }
}

async fn harvest_domains(
    ctx: &Arc<HarvestContext>,
    domains: Vec<Url>,
    cancel: &CancellationToken,
    stage: &StageLog<'_>,
    summary: &mut RunSummary,
) -> Vec<StoredTournament> {
    let pool = WorkerPool::new("domain", ctx.config.domain_workers, cancel.clone());
    let worker_ctx = Arc::clone(ctx);
    let mut results = pool.run(domains, move |domain| harvest_domain(Arc::clone(&worker_ctx), domain));

    let mut tournaments = Vec::new();
    while let Some(r) = results.recv().await {
        stage.logger.log_quiet(&DomainResultEvent {
            ts: now_iso(),
            event: "DOMAIN_RESULT",
            run_id: stage.run_id.to_string(),
            domain: r.domain.clone(),
            tournaments: r.tournaments.len(),
            is_duplicate: r.is_duplicate,
            error: r.error.as_ref().map(|e| format!("{e:#}")),
        });

        summary.tournaments.duplicates += r.collisions;
        if r.error.is_some() {
            summary.domains.errors += 1;
        } else if r.is_duplicate {
            summary.domains.duplicates += 1;
        } else {
            summary.domains.processed += 1;
            summary.tournaments.processed += r.tournaments.len();
            tournaments.extend(r.tournaments);
        }
    }
    tournaments
}

async fn process_tournaments(
    ctx: &Arc<HarvestContext>,
    tournaments: &[StoredTournament],
    cancel: &CancellationToken,
    summary: &mut RunSummary,
) {
    let pool = WorkerPool::new("team", ctx.config.team_workers, cancel.clone());

    let worker_ctx = Arc::clone(ctx);
    let mut discovered = pool.run(tournaments.to_vec(), move |t| discover_teams(Arc::clone(&worker_ctx), t));

    let mut jobs = Vec::new();
    let mut seen_teams = HashSet::new();
    while let Some(d) = discovered.recv().await {
        count_walk(&mut summary.filters, &d.walk);
        if d.error.is_some() {
            summary.tournaments.errors += 1;
            continue;
        }
        for team in d.teams {
            // one roster job per team and tournament
            if !seen_teams.insert((team.id, d.tournament.id)) {
                summary.teams.duplicates += 1;
                continue;
            }
            jobs.push(RosterJob { team, tournament: d.tournament.clone() });
        }
    }
    if cancel.is_cancelled() {
        return;
    }
    info!("{} team rosters queued", jobs.len());

    let worker_ctx = Arc::clone(ctx);
    let mut rosters = pool.run(jobs, move |job| harvest_roster(Arc::clone(&worker_ctx), job));

    let mut players_seen = BTreeSet::new();
    while let Some(r) = rosters.recv().await {
        summary.players.skipped += r.rejected;
        summary.players.errors += r.player_errors;
        count_walk(&mut summary.filters, &r.walk);
        if r.error.is_some() {
            summary.teams.errors += 1;
            continue;
        }
        summary.teams.processed += 1;
        summary.links.processed += r.links_written;
        for id in r.player_ids {
            if players_seen.insert(id) {
                summary.players.processed += 1;
            } else {
                summary.players.duplicates += 1;
            }
        }
    }
}

/// Filter fragments that failed are errors even when the page itself was processed.
fn count_walk(counts: &mut StageCounts, walk: &WalkStats) {
    counts.processed += walk.fetched();
    counts.skipped += walk.years_skipped;
    counts.errors += walk.failed_fetches;
}

async fn ingest_all_statistics(
    ctx: &Arc<HarvestContext>,
    tournaments: &[StoredTournament],
    cancel: &CancellationToken,
    summary: &mut RunSummary,
) {
    let pool = WorkerPool::new("stats", ctx.config.stats_workers, cancel.clone());
    let worker_ctx = Arc::clone(ctx);
    let mut results = pool.run(tournaments.to_vec(), move |t| ingest_statistics(Arc::clone(&worker_ctx), t));

    while let Some(r) = results.recv().await {
        if r.error.is_some() {
            summary.statistics.errors += 1;
            continue;
        }
        if r.unavailable {
            summary.statistics.skipped += 1;
        }
        summary.statistics.processed += r.written;
        summary.statistics.skipped += r.unknown_players;
    }
}

async fn scan_players(
    ctx: &Arc<HarvestContext>,
    base: Url,
    ids: RangeInclusive<u64>,
    cancel: &CancellationToken,
    summary: &mut RunSummary,
) {
    info!("scanning player ids {}..={} on {}", ids.start(), ids.end(), base);
    let pool = WorkerPool::new("scan", ctx.config.scan_workers, cancel.clone());
    let worker_ctx = Arc::clone(ctx);
    let mut results = pool.run(ids, move |id| probe_player(Arc::clone(&worker_ctx), base.clone(), id));

    while let Some(outcome) = results.recv().await {
        match outcome {
            ScanOutcome::Stored(UpsertAction::Inserted | UpsertAction::Refreshed) => summary.scan.processed += 1,
            ScanOutcome::Stored(UpsertAction::Kept) => summary.scan.duplicates += 1,
            ScanOutcome::NotFound => summary.scan_not_found += 1,
            ScanOutcome::NotAProfile | ScanOutcome::Rejected(_) => summary.scan.skipped += 1,
            ScanOutcome::Failed(_) => summary.scan.errors += 1,
        }
    }
}
