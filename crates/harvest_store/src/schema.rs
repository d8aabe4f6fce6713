use anyhow::{Context, Result};
use rusqlite::Connection;

pub const TABLES: [&str; 5] = [
    "tournaments",
    "teams",
    "players",
    "player_teams",
    "player_statistics",
];

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS tournaments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ext_id INTEGER NOT NULL,
            url TEXT NOT NULL UNIQUE,
            domain TEXT NOT NULL,
            name TEXT NOT NULL,
            season TEXT,
            start_date TEXT,
            end_date TEXT,
            is_ended INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tournaments_ext ON tournaments(ext_id);

        CREATE TABLE IF NOT EXISTS teams (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ext_id INTEGER NOT NULL,
            url TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            city TEXT,
            tournament_id INTEGER REFERENCES tournaments(id),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS players (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id TEXT,
            source TEXT,
            profile_url TEXT NOT NULL UNIQUE,
            full_name TEXT NOT NULL,
            birth_date TEXT,
            position TEXT,
            height INTEGER,
            weight INTEGER,
            handedness TEXT,
            data_season TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(external_id, source)
        );

        CREATE INDEX IF NOT EXISTS idx_players_name ON players(full_name);

        CREATE TABLE IF NOT EXISTS player_teams (
            player_id INTEGER NOT NULL REFERENCES players(id),
            team_id INTEGER NOT NULL REFERENCES teams(id),
            tournament_id INTEGER NOT NULL REFERENCES tournaments(id),
            season TEXT,
            active_from TEXT,
            active_to TEXT,
            jersey_number INTEGER,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (player_id, team_id, tournament_id)
        );

        CREATE TABLE IF NOT EXISTS player_statistics (
            player_id INTEGER NOT NULL REFERENCES players(id),
            tournament_id INTEGER NOT NULL REFERENCES tournaments(id),
            games INTEGER NOT NULL,
            goals INTEGER NOT NULL,
            assists INTEGER NOT NULL,
            points INTEGER NOT NULL,
            penalty_minutes INTEGER NOT NULL,
            plus_minus INTEGER NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (player_id, tournament_id)
        );
        "#,
    )
    .context("init schema")?;

    Ok(())
}
