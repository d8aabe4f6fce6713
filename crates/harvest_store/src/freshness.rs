//! Season-based freshness for player rows.
//!
//! Physical attributes (height, weight, handedness, position) follow the newest
//! season seen. Identity (name, birth date, external id) is fill-only: once set,
//! a later source never rewrites it.

use crate::models::{NewPlayer, StoredPlayer};

/// Season labels share the `YYYY/YYYY` shape, so string order is season order.
pub fn supersedes(incoming: Option<&str>, stored: &str) -> bool {
    let stored = stored.trim();
    if stored.is_empty() {
        return true;
    }
    incoming.map(str::trim).is_some_and(|inc| inc > stored)
}

/// Row to write back, and whether the physical fields were refreshed.
pub fn merge_player(stored: &StoredPlayer, incoming: &NewPlayer) -> (StoredPlayer, bool) {
    let refresh = supersedes(incoming.season.as_deref(), &stored.data_season);
    let mut merged = stored.clone();

    if merged.full_name.trim().is_empty() {
        merged.full_name = incoming.full_name.clone();
    }
    merged.birth_date = merged.birth_date.or(incoming.birth_date);
    if merged.external_id.is_none() || merged.source.is_none() {
        if let (Some(ext), Some(src)) = (&incoming.external_id, &incoming.source) {
            merged.external_id = Some(ext.clone());
            merged.source = Some(src.clone());
        }
    }

    if refresh {
        merged.position = incoming.position.clone().or(merged.position);
        merged.height = incoming.height.or(merged.height);
        merged.weight = incoming.weight.or(merged.weight);
        merged.handedness = incoming.handedness.clone().or(merged.handedness);
        if let Some(season) = incoming.season.as_deref().filter(|s| !s.trim().is_empty()) {
            merged.data_season = season.trim().to_string();
        }
    }

    (merged, refresh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn stored(season: &str) -> StoredPlayer {
        StoredPlayer {
            id: 1,
            external_id: Some("5001".into()),
            source: Some("spb.fhr.ru".into()),
            profile_url: "https://spb.fhr.ru/players/5001/".into(),
            full_name: "Иванов Иван".into(),
            birth_date: NaiveDate::from_ymd_opt(2009, 3, 5),
            position: Some("Защитник".into()),
            height: Some(170),
            weight: Some(60),
            handedness: Some("Левый".into()),
            data_season: season.into(),
        }
    }

    fn incoming(season: Option<&str>) -> NewPlayer {
        NewPlayer {
            external_id: Some("5001".into()),
            source: Some("spb.fhr.ru".into()),
            profile_url: "https://msk.fhr.ru/players/5001/".into(),
            full_name: "Ivanov Ivan".into(),
            birth_date: NaiveDate::from_ymd_opt(2009, 3, 6),
            position: Some("Нападающий".into()),
            height: Some(182),
            weight: Some(75),
            handedness: None,
            season: season.map(str::to_string),
        }
    }

    #[test]
    fn older_season_keeps_physical_fields() {
        let (merged, refreshed) = merge_player(&stored("2023/2024"), &incoming(Some("2022/2023")));
        assert!(!refreshed);
        assert_eq!(merged.height, Some(170));
        assert_eq!(merged.weight, Some(60));
        assert_eq!(merged.position.as_deref(), Some("Защитник"));
        assert_eq!(merged.data_season, "2023/2024");
    }

    #[test]
    fn newer_season_overwrites_physical_fields() {
        let (merged, refreshed) = merge_player(&stored("2023/2024"), &incoming(Some("2024/2025")));
        assert!(refreshed);
        assert_eq!(merged.height, Some(182));
        assert_eq!(merged.weight, Some(75));
        assert_eq!(merged.position.as_deref(), Some("Нападающий"));
        // incoming had no handedness; never cleared
        assert_eq!(merged.handedness.as_deref(), Some("Левый"));
        assert_eq!(merged.data_season, "2024/2025");
    }

    #[test]
    fn identity_is_never_rewritten() {
        let (merged, _) = merge_player(&stored("2023/2024"), &incoming(Some("2024/2025")));
        assert_eq!(merged.full_name, "Иванов Иван");
        assert_eq!(merged.birth_date, NaiveDate::from_ymd_opt(2009, 3, 5));
        assert_eq!(merged.profile_url, "https://spb.fhr.ru/players/5001/");
    }

    #[test]
    fn empty_marker_accepts_anything() {
        assert!(supersedes(Some("2019/2020"), ""));
        assert!(supersedes(None, ""));
        assert!(!supersedes(None, "2019/2020"));
        assert!(!supersedes(Some("2019/2020"), "2019/2020"));

        let mut bare = stored("");
        bare.external_id = None;
        bare.source = None;
        let (merged, refreshed) = merge_player(&bare, &incoming(Some("2020/2021")));
        assert!(refreshed);
        assert_eq!(merged.external_id.as_deref(), Some("5001"));
        assert_eq!(merged.data_season, "2020/2021");
    }
}
