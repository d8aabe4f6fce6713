//! Write-side DTOs, stored rows, and record → DTO conversion.

use chrono::{Datelike, NaiveDate};
use page_parser::{PlayerRecord, TeamRecord, TournamentRecord};
use thiserror::Error;

// ── Tournaments ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct NewTournament {
    pub ext_id:     i64,
    pub url:        String,
    pub domain:     String,
    pub name:       String,
    pub season:     Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date:   Option<NaiveDate>,
    pub is_ended:   Option<bool>,
}

impl From<TournamentRecord> for NewTournament {
    fn from(r: TournamentRecord) -> Self {
        Self {
            ext_id: r.ext_id,
            url: r.url,
            domain: r.domain,
            name: r.name,
            season: r.season,
            start_date: r.start_date,
            end_date: r.end_date,
            is_ended: r.is_ended,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredTournament {
    pub id:         i64,
    pub ext_id:     i64,
    pub url:        String,
    pub domain:     String,
    pub name:       String,
    pub season:     Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date:   Option<NaiveDate>,
    pub is_ended:   Option<bool>,
}

// ── Teams ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct NewTeam {
    pub ext_id:        i64,
    pub url:           String,
    pub name:          String,
    pub city:          Option<String>,
    pub tournament_id: i64,
}

impl NewTeam {
    pub fn from_record(r: TeamRecord, tournament_id: i64) -> Self {
        Self { ext_id: r.ext_id, url: r.url, name: r.name, city: r.city, tournament_id }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredTeam {
    pub id:            i64,
    pub ext_id:        i64,
    pub url:           String,
    pub name:          String,
    pub tournament_id: Option<i64>,
}

// ── Players ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewPlayer {
    pub external_id: Option<String>,
    pub source:      Option<String>,
    pub profile_url: String,
    pub full_name:   String,
    pub birth_date:  Option<NaiveDate>,
    pub position:    Option<String>,
    pub height:      Option<i32>,
    pub weight:      Option<i32>,
    pub handedness:  Option<String>,
    /// Season of the competition this record was seen in; freshness marker
    pub season:      Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("born {year}, minimum is {min}")]
    BelowMinBirthYear { year: i32, min: i32 },
    #[error("empty player name")]
    MissingName,
    #[error("empty profile url")]
    MissingProfileUrl,
}

impl NewPlayer {
    /// Players born before `min_birth_year` never reach the repository.
    /// An unknown birth date passes the floor.
    pub fn from_record(
        r: PlayerRecord,
        season: Option<&str>,
        min_birth_year: Option<i32>,
    ) -> Result<Self, Rejection> {
        if r.full_name.trim().is_empty() {
            return Err(Rejection::MissingName);
        }
        if r.profile_url.trim().is_empty() {
            return Err(Rejection::MissingProfileUrl);
        }
        if let (Some(min), Some(date)) = (min_birth_year, r.birth_date) {
            if date.year() < min {
                return Err(Rejection::BelowMinBirthYear { year: date.year(), min });
            }
        }

        Ok(Self {
            external_id: r.external_id,
            source: r.source,
            profile_url: r.profile_url,
            full_name: r.full_name.trim().to_string(),
            birth_date: r.birth_date,
            position: r.position,
            height: r.height,
            weight: r.weight,
            handedness: r.handedness,
            season: season.map(str::to_string),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoredPlayer {
    pub id:          i64,
    pub external_id: Option<String>,
    pub source:      Option<String>,
    pub profile_url: String,
    pub full_name:   String,
    pub birth_date:  Option<NaiveDate>,
    pub position:    Option<String>,
    pub height:      Option<i32>,
    pub weight:      Option<i32>,
    pub handedness:  Option<String>,
    /// Empty until some season has written the physical fields
    pub data_season: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    Inserted,
    /// Physical fields overwritten by a newer season
    Refreshed,
    /// Stored data kept (incoming season not newer); identity gaps may be filled
    Kept,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub id:     i64,
    pub action: UpsertAction,
}

// ── Links and statistics ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct NewPlayerTeamLink {
    pub player_id:     i64,
    pub team_id:       i64,
    pub tournament_id: i64,
    pub season:        Option<String>,
    pub active_from:   Option<NaiveDate>,
    pub active_to:     Option<NaiveDate>,
    /// Number worn on this roster
    pub jersey_number: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPlayerStat {
    pub player_id:       i64,
    pub tournament_id:   i64,
    pub games:           i32,
    pub goals:           i32,
    pub assists:         i32,
    pub points:          i32,
    pub penalty_minutes: i32,
    pub plus_minus:      i32,
}
