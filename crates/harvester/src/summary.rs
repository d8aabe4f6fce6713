use std::fmt;
use std::time::Duration;

use logger::{now_iso, RunSummaryEvent, StageCountsEvent};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageCounts {
    pub processed:  usize,
    /// Validation skips and permanent-skip units
    pub skipped:    usize,
    pub duplicates: usize,
    pub errors:     usize,
}

impl StageCounts {
    pub fn total(&self) -> usize {
        self.processed + self.skipped + self.duplicates + self.errors
    }

    fn event(&self) -> StageCountsEvent {
        StageCountsEvent {
            processed: self.processed,
            skipped: self.skipped,
            duplicates: self.duplicates,
            errors: self.errors,
        }
    }
}

impl fmt::Display for StageCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed={} skipped={} duplicates={} errors={}",
            self.processed, self.skipped, self.duplicates, self.errors
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub run_id:         String,
    pub domains:        StageCounts,
    pub tournaments:    StageCounts,
    pub teams:          StageCounts,
    /// Year/group filter fragments fetched by the walker
    pub filters:        StageCounts,
    pub players:        StageCounts,
    pub links:          StageCounts,
    pub statistics:     StageCounts,
    pub scan:           StageCounts,
    /// Probed ids that do not exist; not errors
    pub scan_not_found: usize,
    pub cancelled:      bool,
    pub elapsed:        Duration,
}

impl RunSummary {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self { run_id: run_id.into(), ..Default::default() }
    }

    pub fn total_errors(&self) -> usize {
        [
            self.domains,
            self.tournaments,
            self.teams,
            self.filters,
            self.players,
            self.links,
            self.statistics,
            self.scan,
        ]
        .iter()
        .map(|s| s.errors)
        .sum()
    }

    pub fn to_event(&self) -> RunSummaryEvent {
        RunSummaryEvent {
            ts: now_iso(),
            event: "RUN_SUMMARY",
            run_id: self.run_id.clone(),
            cancelled: self.cancelled,
            elapsed_secs: self.elapsed.as_secs(),
            domains: self.domains.event(),
            tournaments: self.tournaments.event(),
            teams: self.teams.event(),
            filters: self.filters.event(),
            players: self.players.event(),
            links: self.links.event(),
            statistics: self.statistics.event(),
            scan: self.scan.event(),
            scan_not_found: self.scan_not_found,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "=== Harvest run {} {} in {:.1}s ===",
            self.run_id,
            if self.cancelled { "CANCELLED" } else { "finished" },
            self.elapsed.as_secs_f64()
        )?;
        writeln!(f, "  domains:     {}", self.domains)?;
        writeln!(f, "  tournaments: {}", self.tournaments)?;
        writeln!(f, "  teams:       {}", self.teams)?;
        writeln!(f, "  filters:     {}", self.filters)?;
        writeln!(f, "  players:     {}", self.players)?;
        writeln!(f, "  links:       {}", self.links)?;
        writeln!(f, "  statistics:  {}", self.statistics)?;
        write!(f, "  scan:        {} not_found={}", self.scan, self.scan_not_found)
    }
}
