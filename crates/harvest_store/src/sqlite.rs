use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::freshness::merge_player;
use crate::models::*;
use crate::schema::{init_schema, TABLES};
use crate::{
    PlayerRepository, PlayerTeamRepository, StatisticsRepository, TeamRepository, TournamentRepository,
};

const TOURNAMENT_COLS: &str = "id, ext_id, url, domain, name, season, start_date, end_date, is_ended";
const TEAM_COLS: &str = "id, ext_id, url, name, tournament_id";
const PLAYER_COLS: &str =
    "id, external_id, source, profile_url, full_name, birth_date, position, height, weight, handedness, data_season";

/// One SQLite connection shared by every worker. Calls are serialized by the
/// mutex and run on the blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let conn = Connection::open(path)
            .with_context(|| format!("open sqlite db {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        conn.pragma_update(None, "foreign_keys", "ON").ok();

        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite")?;
        conn.pragma_update(None, "foreign_keys", "ON").ok();
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| anyhow!("sqlite connection poisoned"))?;
            f(&mut guard)
        })
        .await
        .context("sqlite task panicked")?
    }

    pub async fn count_rows(&self, table: &str) -> Result<i64> {
        if !TABLES.iter().any(|t| *t == table) {
            bail!("unknown table {table}");
        }
        let sql = format!("SELECT COUNT(*) FROM {table}");
        self.with_conn(move |conn| {
            conn.query_row(&sql, [], |r| r.get(0)).context("count rows")
        })
        .await
    }

    /// Row counts for every table, in schema order.
    pub async fn table_counts(&self) -> Result<Vec<(&'static str, i64)>> {
        let mut out = Vec::with_capacity(TABLES.len());
        for table in TABLES {
            out.push((table, self.count_rows(table).await?));
        }
        Ok(out)
    }
}

fn date_str(d: Option<NaiveDate>) -> Option<String> {
    d.map(|d| d.format("%Y-%m-%d").to_string())
}

fn date_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    Ok(raw.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()))
}

fn tournament_from_row(row: &Row<'_>) -> rusqlite::Result<StoredTournament> {
    let is_ended: Option<i64> = row.get(8)?;
    Ok(StoredTournament {
        id: row.get(0)?,
        ext_id: row.get(1)?,
        url: row.get(2)?,
        domain: row.get(3)?,
        name: row.get(4)?,
        season: row.get(5)?,
        start_date: date_col(row, 6)?,
        end_date: date_col(row, 7)?,
        is_ended: is_ended.map(|v| v != 0),
    })
}

fn team_from_row(row: &Row<'_>) -> rusqlite::Result<StoredTeam> {
    Ok(StoredTeam {
        id: row.get(0)?,
        ext_id: row.get(1)?,
        url: row.get(2)?,
        name: row.get(3)?,
        tournament_id: row.get(4)?,
    })
}

fn player_from_row(row: &Row<'_>) -> rusqlite::Result<StoredPlayer> {
    Ok(StoredPlayer {
        id: row.get(0)?,
        external_id: row.get(1)?,
        source: row.get(2)?,
        profile_url: row.get(3)?,
        full_name: row.get(4)?,
        birth_date: date_col(row, 5)?,
        position: row.get(6)?,
        height: row.get(7)?,
        weight: row.get(8)?,
        handedness: row.get(9)?,
        data_season: row.get(10)?,
    })
}

fn upsert_tournament_tx(tx: &Transaction<'_>, t: &NewTournament, now: &str) -> Result<StoredTournament> {
    // a mirror's copy of a known id lands on the row first written for it
    let canonical: Option<String> = tx
        .query_row(
            "SELECT url FROM tournaments WHERE ext_id = ?1 ORDER BY id LIMIT 1",
            params![t.ext_id],
            |r| r.get(0),
        )
        .optional()?;
    let url = canonical.as_deref().unwrap_or(&t.url);

    let sql = format!(
        r#"
        INSERT INTO tournaments(ext_id, url, domain, name, season, start_date, end_date, is_ended, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
        ON CONFLICT(url) DO UPDATE SET
            name=excluded.name,
            season=COALESCE(excluded.season, tournaments.season),
            start_date=COALESCE(excluded.start_date, tournaments.start_date),
            end_date=COALESCE(excluded.end_date, tournaments.end_date),
            is_ended=COALESCE(excluded.is_ended, tournaments.is_ended),
            updated_at=excluded.updated_at
        RETURNING {TOURNAMENT_COLS}
        "#
    );
    tx.query_row(
        &sql,
        params![
            t.ext_id,
            url,
            t.domain,
            t.name,
            t.season,
            date_str(t.start_date),
            date_str(t.end_date),
            t.is_ended.map(i64::from),
            now,
        ],
        tournament_from_row,
    )
    .with_context(|| format!("upsert tournament {}", t.url))
}

fn upsert_team_tx(tx: &Transaction<'_>, t: &NewTeam, now: &str) -> Result<StoredTeam> {
    // a team keeps the tournament it was first seen in
    let sql = format!(
        r#"
        INSERT INTO teams(ext_id, url, name, city, tournament_id, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
        ON CONFLICT(url) DO UPDATE SET
            name=excluded.name,
            city=COALESCE(excluded.city, teams.city),
            tournament_id=COALESCE(teams.tournament_id, excluded.tournament_id),
            updated_at=excluded.updated_at
        RETURNING {TEAM_COLS}
        "#
    );
    tx.query_row(
        &sql,
        params![t.ext_id, t.url, t.name, t.city, t.tournament_id, now],
        team_from_row,
    )
    .with_context(|| format!("upsert team {}", t.url))
}

fn find_player(conn: &Connection, p: &NewPlayer) -> Result<Option<StoredPlayer>> {
    if let (Some(ext), Some(src)) = (&p.external_id, &p.source) {
        let found = conn
            .query_row(
                &format!("SELECT {PLAYER_COLS} FROM players WHERE external_id = ?1 AND source = ?2"),
                params![ext, src],
                player_from_row,
            )
            .optional()?;
        if found.is_some() {
            return Ok(found);
        }
    }

    conn.query_row(
        &format!("SELECT {PLAYER_COLS} FROM players WHERE profile_url = ?1"),
        params![p.profile_url],
        player_from_row,
    )
    .optional()
    .context("find player")
}

fn upsert_player_tx(tx: &Transaction<'_>, p: &NewPlayer, now: &str) -> Result<UpsertOutcome> {
    let Some(stored) = find_player(tx, p)? else {
        tx.execute(
            r#"
            INSERT INTO players(external_id, source, profile_url, full_name, birth_date, position, height, weight, handedness, data_season, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
            "#,
            params![
                p.external_id,
                p.source,
                p.profile_url,
                p.full_name,
                date_str(p.birth_date),
                p.position,
                p.height,
                p.weight,
                p.handedness,
                p.season.as_deref().map(str::trim).unwrap_or_default(),
                now,
            ],
        )
        .with_context(|| format!("insert player {}", p.profile_url))?;
        return Ok(UpsertOutcome { id: tx.last_insert_rowid(), action: UpsertAction::Inserted });
    };

    let (merged, refreshed) = merge_player(&stored, p);
    if merged != stored {
        tx.execute(
            r#"
            UPDATE players SET
                external_id=?2, source=?3, full_name=?4, birth_date=?5, position=?6,
                height=?7, weight=?8, handedness=?9, data_season=?10, updated_at=?11
            WHERE id=?1
            "#,
            params![
                merged.id,
                merged.external_id,
                merged.source,
                merged.full_name,
                date_str(merged.birth_date),
                merged.position,
                merged.height,
                merged.weight,
                merged.handedness,
                merged.data_season,
                now,
            ],
        )
        .with_context(|| format!("update player {}", stored.id))?;
    }

    let action = if refreshed { UpsertAction::Refreshed } else { UpsertAction::Kept };
    Ok(UpsertOutcome { id: stored.id, action })
}

#[async_trait]
impl TournamentRepository for SqliteStore {
    async fn upsert_tournament(&self, t: NewTournament) -> Result<i64> {
        self.with_conn(move |conn| {
            let now = Utc::now().to_rfc3339();
            let tx = conn.transaction()?;
            let stored = upsert_tournament_tx(&tx, &t, &now)?;
            tx.commit()?;
            Ok(stored.id)
        })
        .await
    }

    async fn create_tournaments(&self, batch: Vec<NewTournament>) -> Result<Vec<StoredTournament>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        self.with_conn(move |conn| {
            let now = Utc::now().to_rfc3339();
            let tx = conn.transaction()?;
            let mut out = Vec::with_capacity(batch.len());
            for t in &batch {
                out.push(upsert_tournament_tx(&tx, t, &now)?);
            }
            tx.commit()?;
            debug!("tournament batch written: {}", out.len());
            Ok(out)
        })
        .await
    }

    async fn tournament_by_url(&self, url: &str) -> Result<Option<StoredTournament>> {
        let url = url.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT {TOURNAMENT_COLS} FROM tournaments WHERE url = ?1"),
                params![url],
                tournament_from_row,
            )
            .optional()
            .context("tournament by url")
        })
        .await
    }

    async fn tournaments(&self) -> Result<Vec<StoredTournament>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {TOURNAMENT_COLS} FROM tournaments ORDER BY id"))?;
            let rows = stmt
                .query_map([], tournament_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }
}

#[async_trait]
impl TeamRepository for SqliteStore {
    async fn create_teams(&self, batch: Vec<NewTeam>) -> Result<Vec<StoredTeam>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        self.with_conn(move |conn| {
            let now = Utc::now().to_rfc3339();
            let tx = conn.transaction()?;
            let mut out = Vec::with_capacity(batch.len());
            for t in &batch {
                out.push(upsert_team_tx(&tx, t, &now)?);
            }
            tx.commit()?;
            Ok(out)
        })
        .await
    }

    async fn team_by_url(&self, url: &str) -> Result<Option<StoredTeam>> {
        let url = url.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT {TEAM_COLS} FROM teams WHERE url = ?1"),
                params![url],
                team_from_row,
            )
            .optional()
            .context("team by url")
        })
        .await
    }
}

#[async_trait]
impl PlayerRepository for SqliteStore {
    async fn upsert_player(&self, p: NewPlayer) -> Result<UpsertOutcome> {
        self.with_conn(move |conn| {
            let now = Utc::now().to_rfc3339();
            let tx = conn.transaction()?;
            let outcome = upsert_player_tx(&tx, &p, &now)?;
            tx.commit()?;
            Ok(outcome)
        })
        .await
    }

    async fn player_by_external_id(&self, external_id: &str, source: &str) -> Result<Option<StoredPlayer>> {
        let (ext, src) = (external_id.to_string(), source.to_string());
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT {PLAYER_COLS} FROM players WHERE external_id = ?1 AND source = ?2"),
                params![ext, src],
                player_from_row,
            )
            .optional()
            .context("player by external id")
        })
        .await
    }

    async fn player_by_url(&self, profile_url: &str) -> Result<Option<StoredPlayer>> {
        let url = profile_url.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT {PLAYER_COLS} FROM players WHERE profile_url = ?1"),
                params![url],
                player_from_row,
            )
            .optional()
            .context("player by url")
        })
        .await
    }

    async fn get_player(&self, id: i64) -> Result<Option<StoredPlayer>> {
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT {PLAYER_COLS} FROM players WHERE id = ?1"),
                params![id],
                player_from_row,
            )
            .optional()
            .context("get player")
        })
        .await
    }

    async fn search_players(&self, name: &str, limit: usize) -> Result<Vec<StoredPlayer>> {
        let pattern = format!("%{}%", name.trim());
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PLAYER_COLS} FROM players WHERE full_name LIKE ?1 ORDER BY full_name, id LIMIT ?2"
            ))?;
            let rows = stmt
                .query_map(params![pattern, limit], player_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }
}

#[async_trait]
impl PlayerTeamRepository for SqliteStore {
    async fn create_links(&self, batch: Vec<NewPlayerTeamLink>) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        self.with_conn(move |conn| {
            let now = Utc::now().to_rfc3339();
            let tx = conn.transaction()?;
            let mut written = 0;
            {
                let mut stmt = tx.prepare(
                    r#"
                    INSERT INTO player_teams(player_id, team_id, tournament_id, season, active_from, active_to, jersey_number, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(player_id, team_id, tournament_id) DO UPDATE SET
                        season=COALESCE(excluded.season, player_teams.season),
                        active_from=COALESCE(excluded.active_from, player_teams.active_from),
                        active_to=COALESCE(excluded.active_to, player_teams.active_to),
                        jersey_number=COALESCE(excluded.jersey_number, player_teams.jersey_number),
                        updated_at=excluded.updated_at
                    "#,
                )?;
                for l in &batch {
                    written += stmt.execute(params![
                        l.player_id,
                        l.team_id,
                        l.tournament_id,
                        l.season,
                        date_str(l.active_from),
                        date_str(l.active_to),
                        l.jersey_number,
                        now,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(written)
        })
        .await
    }
}

#[async_trait]
impl StatisticsRepository for SqliteStore {
    async fn create_statistics(&self, batch: Vec<NewPlayerStat>) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        self.with_conn(move |conn| {
            let now = Utc::now().to_rfc3339();
            let tx = conn.transaction()?;
            let mut written = 0;
            {
                let mut stmt = tx.prepare(
                    r#"
                    INSERT INTO player_statistics(player_id, tournament_id, games, goals, assists, points, penalty_minutes, plus_minus, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    ON CONFLICT(player_id, tournament_id) DO UPDATE SET
                        games=excluded.games,
                        goals=excluded.goals,
                        assists=excluded.assists,
                        points=excluded.points,
                        penalty_minutes=excluded.penalty_minutes,
                        plus_minus=excluded.plus_minus,
                        updated_at=excluded.updated_at
                    "#,
                )?;
                for s in &batch {
                    written += stmt.execute(params![
                        s.player_id,
                        s.tournament_id,
                        s.games,
                        s.goals,
                        s.assists,
                        s.points,
                        s.penalty_minutes,
                        s.plus_minus,
                        now,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(written)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tournament(url: &str, season: Option<&str>) -> NewTournament {
        NewTournament {
            ext_id: 77,
            url: url.into(),
            domain: "spb.fhr.ru".into(),
            name: "Первенство СПб U16".into(),
            season: season.map(str::to_string),
            start_date: NaiveDate::from_ymd_opt(2024, 9, 1),
            end_date: None,
            is_ended: Some(false),
        }
    }

    fn player(season: Option<&str>, height: i32) -> NewPlayer {
        NewPlayer {
            external_id: Some("5001".into()),
            source: Some("spb.fhr.ru".into()),
            profile_url: "https://spb.fhr.ru/players/5001/".into(),
            full_name: "Петров Пётр".into(),
            birth_date: NaiveDate::from_ymd_opt(2010, 1, 2),
            position: Some("Вратарь".into()),
            height: Some(height),
            weight: Some(60),
            handedness: None,
            season: season.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn tournament_upsert_is_idempotent_and_keeps_known_fields() {
        let store = SqliteStore::in_memory().unwrap();
        let url = "https://spb.fhr.ru/tournaments/77/";
        let a = store.upsert_tournament(tournament(url, Some("2024/2025"))).await.unwrap();
        let b = store.upsert_tournament(tournament(url, None)).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(store.count_rows("tournaments").await.unwrap(), 1);

        let stored = store.tournament_by_url(url).await.unwrap().unwrap();
        assert_eq!(stored.season.as_deref(), Some("2024/2025"));
        assert_eq!(stored.start_date, NaiveDate::from_ymd_opt(2024, 9, 1));
        assert_eq!(stored.is_ended, Some(false));
    }

    #[tokio::test]
    async fn mirror_copy_of_known_id_updates_canonical_row() {
        let store = SqliteStore::in_memory().unwrap();
        let canonical = "https://spb.fhr.ru/tournaments/77/";
        let first = store.upsert_tournament(tournament(canonical, None)).await.unwrap();

        let mirror = NewTournament {
            domain: "msk-mirror.fhr.ru".into(),
            ..tournament("https://msk-mirror.fhr.ru/tournaments/77/", Some("2025/2026"))
        };
        assert_eq!(store.upsert_tournament(mirror).await.unwrap(), first);
        assert_eq!(store.count_rows("tournaments").await.unwrap(), 1);

        let stored = store.tournament_by_url(canonical).await.unwrap().unwrap();
        assert_eq!(stored.domain, "spb.fhr.ru");
        assert_eq!(stored.season.as_deref(), Some("2025/2026"));
    }

    #[tokio::test]
    async fn batch_returns_stored_rows() {
        let store = SqliteStore::in_memory().unwrap();
        let rows = store
            .create_tournaments(vec![
                NewTournament { ext_id: 1, ..tournament("https://spb.fhr.ru/tournaments/1/", Some("2024/2025")) },
                NewTournament { ext_id: 2, ..tournament("https://spb.fhr.ru/tournaments/2/", Some("2024/2025")) },
            ])
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_ne!(rows[0].id, rows[1].id);
        assert_eq!(store.tournaments().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn player_freshness_through_store() {
        let store = SqliteStore::in_memory().unwrap();
        let first = store.upsert_player(player(Some("2023/2024"), 170)).await.unwrap();
        assert_eq!(first.action, UpsertAction::Inserted);

        let older = store.upsert_player(player(Some("2022/2023"), 150)).await.unwrap();
        assert_eq!(older.id, first.id);
        assert_eq!(older.action, UpsertAction::Kept);
        let p = store.get_player(first.id).await.unwrap().unwrap();
        assert_eq!(p.height, Some(170));

        let newer = store.upsert_player(player(Some("2024/2025"), 181)).await.unwrap();
        assert_eq!(newer.action, UpsertAction::Refreshed);
        let p = store.player_by_external_id("5001", "spb.fhr.ru").await.unwrap().unwrap();
        assert_eq!(p.height, Some(181));
        assert_eq!(p.data_season, "2024/2025");
        assert_eq!(store.count_rows("players").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn player_matched_by_url_when_external_id_missing() {
        let store = SqliteStore::in_memory().unwrap();
        let mut bare = player(None, 170);
        bare.external_id = None;
        bare.source = None;
        let first = store.upsert_player(bare).await.unwrap();

        let again = store.upsert_player(player(Some("2024/2025"), 175)).await.unwrap();
        assert_eq!(again.id, first.id);
        let p = store.player_by_url("https://spb.fhr.ru/players/5001/").await.unwrap().unwrap();
        assert_eq!(p.external_id.as_deref(), Some("5001"));
        assert_eq!(p.height, Some(175));
    }

    #[tokio::test]
    async fn links_and_stats_upsert_on_natural_keys() {
        let store = SqliteStore::in_memory().unwrap();
        let tid = store
            .upsert_tournament(tournament("https://spb.fhr.ru/tournaments/77/", Some("2024/2025")))
            .await
            .unwrap();
        let teams = store
            .create_teams(vec![NewTeam {
                ext_id: 12,
                url: "https://spb.fhr.ru/teams/12/".into(),
                name: "СКА-1946".into(),
                city: Some("Санкт-Петербург".into()),
                tournament_id: tid,
            }])
            .await
            .unwrap();
        let ska = store.team_by_url("https://spb.fhr.ru/teams/12/").await.unwrap().unwrap();
        assert_eq!(ska.id, teams[0].id);
        assert_eq!(ska.tournament_id, Some(tid));
        assert!(store.team_by_url("https://spb.fhr.ru/teams/13/").await.unwrap().is_none());
        let pid = store.upsert_player(player(Some("2024/2025"), 170)).await.unwrap().id;

        let link = NewPlayerTeamLink {
            player_id: pid,
            team_id: teams[0].id,
            tournament_id: tid,
            season: Some("2024/2025".into()),
            active_from: NaiveDate::from_ymd_opt(2024, 9, 1),
            active_to: None,
            jersey_number: Some(17),
        };
        store.create_links(vec![link.clone()]).await.unwrap();
        // a later roster without a number keeps the known one
        store.create_links(vec![NewPlayerTeamLink { jersey_number: None, ..link }]).await.unwrap();
        assert_eq!(store.count_rows("player_teams").await.unwrap(), 1);
        let number: Option<i32> = store
            .with_conn(|c| Ok(c.query_row("SELECT jersey_number FROM player_teams", [], |r| r.get(0))?))
            .await
            .unwrap();
        assert_eq!(number, Some(17));

        let mut stat = NewPlayerStat {
            player_id: pid,
            tournament_id: tid,
            games: 10,
            goals: 3,
            assists: 4,
            points: 7,
            penalty_minutes: 2,
            plus_minus: 1,
        };
        store.create_statistics(vec![stat.clone()]).await.unwrap();
        stat.games = 11;
        assert_eq!(store.create_statistics(vec![stat]).await.unwrap(), 1);
        assert_eq!(store.count_rows("player_statistics").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn search_and_unknown_table() {
        let store = SqliteStore::in_memory().unwrap();
        store.upsert_player(player(None, 170)).await.unwrap();
        assert_eq!(store.search_players("Петров", 10).await.unwrap().len(), 1);
        assert!(store.search_players("Сидоров", 10).await.unwrap().is_empty());
        assert!(store.count_rows("sqlite_master; DROP TABLE players").await.is_err());
    }

    #[tokio::test]
    async fn file_store_reopens_with_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db").join("harvest.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.upsert_player(player(None, 170)).await.unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        let counts = store.table_counts().await.unwrap();
        assert!(counts.contains(&("players", 1)));
    }
}
