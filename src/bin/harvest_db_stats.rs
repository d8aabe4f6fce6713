use anyhow::{Context, Result};
use harvest_store::{PlayerRepository, SqliteStore, TournamentRepository};

/// Row counts per table, plus an optional player name lookup:
///   harvest-db-stats [name]
#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let db_path = std::env::var("HARVEST_DB_PATH").unwrap_or_else(|_| "data/harvest.db".to_string());
    let store = SqliteStore::open(&db_path).with_context(|| format!("open db at {db_path}"))?;

    println!("db_path={db_path}");
    for (table, count) in store.table_counts().await? {
        println!("{table}: {count}");
    }

    let tournaments = store.tournaments().await?;
    let ended = tournaments.iter().filter(|t| t.is_ended == Some(true)).count();
    let latest_season = tournaments.iter().filter_map(|t| t.season.as_deref()).max();
    println!(
        "tournaments_ended={ended} latest_season={}",
        latest_season.unwrap_or("<none>")
    );

    if let Some(name) = std::env::args().nth(1) {
        let found = store.search_players(&name, 20).await?;
        println!("players matching {name:?}: {}", found.len());
        for p in found {
            println!(
                "  #{} {} born={} season={} url={}",
                p.id,
                p.full_name,
                p.birth_date.map(|d| d.to_string()).unwrap_or_else(|| "?".into()),
                if p.data_season.is_empty() { "-" } else { &p.data_season },
                p.profile_url
            );
        }
    }

    Ok(())
}
