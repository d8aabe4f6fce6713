//! Default adapter for the regional federation layout (server-rendered pages,
//! AJAX filter fragments, JSON statistics endpoint).

use anyhow::{anyhow, Context, Result};
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::debug;
use url::Url;

use crate::ids;
use crate::{FilterLink, PageParser, PlayerRecord, PlayerStatRecord, SeasonLink, TeamRecord, TournamentRecord};

/// CSS selectors and path templates for one site layout.
#[derive(Debug, Clone)]
pub struct SiteSelectors {
    pub region_link:     String,
    pub season_option:   String,
    pub tournament_item: String,
    pub tournament_link: String,
    pub filter_link:     String,
    pub team_link:       String,
    pub player_row:      String,
    pub player_link:     String,
    pub player_profile:  String,
    pub player_name:     String,
    pub birth_date:      String,
    pub position:        String,
    pub height:          String,
    pub weight:          String,
    pub grip:            String,
    pub number:          String,
    /// Relative to the mirror root
    pub tournament_list_path: String,
    /// `{id}` is replaced with the probed player id
    pub player_profile_path:  String,
    /// `{id}` is replaced with the tournament id
    pub stats_path:           String,
}

impl Default for SiteSelectors {
    fn default() -> Self {
        Self {
            region_link:     "a.region-link".into(),
            season_option:   "select.season-select option".into(),
            tournament_item: ".tournament-item".into(),
            tournament_link: "a.tournament-link".into(),
            filter_link:     ".filter [data-ajax-link], .filter [data-ajax]".into(),
            team_link:       "a.team-link".into(),
            player_row:      "tr.player-row".into(),
            player_link:     "a.player-link".into(),
            player_profile:  ".player-profile".into(),
            player_name:     ".player-name".into(),
            birth_date:      ".birth-date".into(),
            position:        ".position".into(),
            height:          ".height".into(),
            weight:          ".weight".into(),
            grip:            ".grip".into(),
            number:          ".number".into(),
            tournament_list_path: "tournaments/".into(),
            player_profile_path:  "players/{id}/".into(),
            stats_path:           "api/tournaments/{id}/stats/".into(),
        }
    }
}

struct Compiled {
    region_link:     Selector,
    season_option:   Selector,
    tournament_item: Selector,
    tournament_link: Selector,
    filter_link:     Selector,
    team_link:       Selector,
    player_row:      Selector,
    player_link:     Selector,
    player_profile:  Selector,
    player_name:     Selector,
    birth_date:      Selector,
    position:        Selector,
    height:          Selector,
    weight:          Selector,
    grip:            Selector,
    number:          Selector,
}

fn compile(raw: &str) -> Result<Selector> {
    Selector::parse(raw).map_err(|e| anyhow!("invalid selector {raw:?}: {e:?}"))
}

pub struct HtmlPageParser {
    selectors: SiteSelectors,
    sel:       Compiled,
}

impl HtmlPageParser {
    pub fn new(selectors: SiteSelectors) -> Result<Self> {
        let sel = Compiled {
            region_link:     compile(&selectors.region_link)?,
            season_option:   compile(&selectors.season_option)?,
            tournament_item: compile(&selectors.tournament_item)?,
            tournament_link: compile(&selectors.tournament_link)?,
            filter_link:     compile(&selectors.filter_link)?,
            team_link:       compile(&selectors.team_link)?,
            player_row:      compile(&selectors.player_row)?,
            player_link:     compile(&selectors.player_link)?,
            player_profile:  compile(&selectors.player_profile)?,
            player_name:     compile(&selectors.player_name)?,
            birth_date:      compile(&selectors.birth_date)?,
            position:        compile(&selectors.position)?,
            height:          compile(&selectors.height)?,
            weight:          compile(&selectors.weight)?,
            grip:            compile(&selectors.grip)?,
            number:          compile(&selectors.number)?,
        };
        Ok(Self { selectors, sel })
    }

    pub fn standard() -> Result<Self> {
        Self::new(SiteSelectors::default())
    }

    fn player_fields(&self, scope: ElementRef<'_>, record: &mut PlayerRecord) {
        record.birth_date = first_text(scope, &self.sel.birth_date).and_then(|t| ids::parse_date(&t));
        record.position = first_text(scope, &self.sel.position);
        record.height = first_text(scope, &self.sel.height).and_then(|t| ids::parse_int(&t));
        record.weight = first_text(scope, &self.sel.weight).and_then(|t| ids::parse_int(&t));
        record.handedness = first_text(scope, &self.sel.grip);
        record.number = first_text(scope, &self.sel.number).and_then(|t| ids::parse_int(&t));
    }
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_text(scope: ElementRef<'_>, sel: &Selector) -> Option<String> {
    scope.select(sel).next().map(text_of).filter(|t| !t.is_empty())
}

fn identity(profile: &Url) -> (Option<String>, Option<String>) {
    (ids::player_id(profile).map(|id| id.to_string()), ids::host_of(profile))
}

// ── JSON statistics payload ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct StatsPayload {
    #[serde(default)]
    players: Vec<StatRow>,
}

#[derive(Debug, Deserialize)]
struct StatRow {
    url: String,
    #[serde(default)]
    games: i32,
    #[serde(default)]
    goals: i32,
    #[serde(default)]
    assists: i32,
    points: Option<i32>,
    #[serde(default, alias = "pim")]
    penalty_minutes: i32,
    #[serde(default)]
    plus_minus: i32,
}

impl PageParser for HtmlPageParser {
    fn domains(&self, base: &Url, html: &str) -> Vec<Url> {
        let document = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut out = Vec::new();

        for link in document.select(&self.sel.region_link) {
            let Some(href) = link.value().attr("href") else { continue };
            let Ok(abs) = base.join(href) else {
                debug!("skipping unparseable region link {}", href);
                continue;
            };
            let root = ids::site_root(&abs);
            if seen.insert(root.as_str().to_string()) {
                out.push(root);
            }
        }
        out
    }

    fn tournament_list_url(&self, domain: &Url) -> Result<Url> {
        ids::site_root(domain)
            .join(&self.selectors.tournament_list_path)
            .context("tournament list url")
    }

    fn seasons(&self, base: &Url, html: &str) -> Vec<SeasonLink> {
        let document = Html::parse_document(html);
        document
            .select(&self.sel.season_option)
            .filter_map(|opt| {
                let label = text_of(opt);
                if label.is_empty() {
                    return None;
                }
                let ajax_url = opt
                    .value()
                    .attr("data-ajax-link")
                    .or_else(|| opt.value().attr("data-ajax"))
                    .and_then(|raw| base.join(raw).ok());
                Some(SeasonLink {
                    label,
                    ajax_url,
                    selected: opt.value().attr("selected").is_some(),
                })
            })
            .collect()
    }

    fn tournaments(&self, base: &Url, html: &str, season: Option<&str>) -> Vec<TournamentRecord> {
        let document = Html::parse_document(html);
        let mut out = Vec::new();

        for item in document.select(&self.sel.tournament_item) {
            let Some(link) = item.select(&self.sel.tournament_link).next() else { continue };
            let Some(href) = link.value().attr("href") else { continue };
            let Ok(abs) = base.join(href) else { continue };
            let Some(ext_id) = ids::tournament_id(&abs) else {
                debug!("no tournament id in {}", abs);
                continue;
            };

            let attrs = item.value();
            out.push(TournamentRecord {
                ext_id,
                url: ids::canonical_tournament_url(&abs).to_string(),
                domain: ids::host_of(&abs).unwrap_or_default(),
                name: text_of(link),
                season: season.map(str::to_string),
                start_date: attrs.attr("data-start").and_then(ids::parse_date),
                end_date: attrs.attr("data-end").and_then(ids::parse_date),
                is_ended: Some(attrs.classes().any(|c| c == "finished")),
            });
        }
        out
    }

    fn filter_links(&self, base: &Url, html: &str) -> Vec<FilterLink> {
        let document = Html::parse_document(html);
        document
            .select(&self.sel.filter_link)
            .filter_map(|el| {
                let raw = el.value().attr("data-ajax-link").or_else(|| el.value().attr("data-ajax"))?;
                let url = base.join(raw).ok()?;
                Some(FilterLink { label: text_of(el), raw: raw.to_string(), url })
            })
            .collect()
    }

    fn teams(&self, base: &Url, html: &str) -> Vec<TeamRecord> {
        let document = Html::parse_document(html);
        document
            .select(&self.sel.team_link)
            .filter_map(|a| {
                let href = a.value().attr("href")?;
                let abs = base.join(href).ok()?;
                Some(TeamRecord {
                    ext_id: ids::team_id(&abs),
                    href: href.to_string(),
                    url: abs.to_string(),
                    name: text_of(a),
                    city: a.value().attr("data-city").map(str::to_string),
                })
            })
            .collect()
    }

    fn players(&self, base: &Url, html: &str) -> Vec<PlayerRecord> {
        let document = Html::parse_document(html);
        let mut out = Vec::new();

        for row in document.select(&self.sel.player_row) {
            let Some(link) = row.select(&self.sel.player_link).next() else { continue };
            let Some(href) = link.value().attr("href") else { continue };
            let Ok(profile) = base.join(href) else { continue };
            let (external_id, source) = identity(&profile);

            let mut record = PlayerRecord {
                href: href.to_string(),
                profile_url: profile.to_string(),
                external_id,
                source,
                full_name: text_of(link),
                ..Default::default()
            };
            self.player_fields(row, &mut record);
            out.push(record);
        }
        out
    }

    fn player_profile(&self, url: &Url, html: &str) -> Option<PlayerRecord> {
        let document = Html::parse_document(html);
        let card = document.select(&self.sel.player_profile).next()?;
        let full_name = first_text(card, &self.sel.player_name)?;
        let (external_id, source) = identity(url);

        let mut record = PlayerRecord {
            href: url.path().to_string(),
            profile_url: url.to_string(),
            external_id,
            source,
            full_name,
            ..Default::default()
        };
        self.player_fields(card, &mut record);
        Some(record)
    }

    fn player_profile_url(&self, base: &Url, id: u64) -> Result<Url> {
        let path = self.selectors.player_profile_path.replace("{id}", &id.to_string());
        ids::site_root(base).join(&path).context("player profile url")
    }

    fn stats_url(&self, tournament_url: &Url) -> Result<Url> {
        let id = ids::tournament_id(tournament_url)
            .ok_or_else(|| anyhow!("no tournament id in {}", tournament_url))?;
        let path = self.selectors.stats_path.replace("{id}", &id.to_string());
        ids::site_root(tournament_url).join(&path).context("stats url")
    }

    fn player_stats(&self, base: &Url, body: &[u8]) -> Result<Vec<PlayerStatRecord>> {
        let payload: StatsPayload = serde_json::from_slice(body).context("stats JSON parse failed")?;
        let mut out = Vec::with_capacity(payload.players.len());

        for row in payload.players {
            let Ok(profile) = base.join(&row.url) else {
                debug!("skipping stats row with bad url {}", row.url);
                continue;
            };
            let (external_id, source) = identity(&profile);
            out.push(PlayerStatRecord {
                profile_url: profile.to_string(),
                external_id,
                source,
                games: row.games,
                goals: row.goals,
                assists: row.assists,
                points: row.points.unwrap_or(row.goals + row.assists),
                penalty_minutes: row.penalty_minutes,
                plus_minus: row.plus_minus,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn parser() -> HtmlPageParser {
        HtmlPageParser::standard().unwrap()
    }

    fn base() -> Url {
        Url::parse("https://spb.fhr.ru/tournaments/").unwrap()
    }

    #[test]
    fn domains_are_deduplicated_roots() {
        let html = r#"
            <a class="region-link" href="https://spb.fhr.ru/news/">SPb</a>
            <a class="region-link" href="https://spb.fhr.ru/">SPb again</a>
            <a class="region-link" href="//msk.fhr.ru">Moscow</a>
            <a class="other" href="https://ignored.ru/">x</a>
        "#;
        let got = parser().domains(&Url::parse("https://fhr.ru/regions/").unwrap(), html);
        let got: Vec<_> = got.iter().map(Url::as_str).collect();
        assert_eq!(got, vec!["https://spb.fhr.ru/", "https://msk.fhr.ru/"]);
    }

    #[test]
    fn seasons_with_locators() {
        let html = r#"
            <select class="season-select">
              <option selected data-ajax-link="/ajax/tournaments.php?params=AAA">2025/2026</option>
              <option data-ajax-link="/ajax/tournaments.php?params=BBB">2024/2025</option>
            </select>
        "#;
        let seasons = parser().seasons(&base(), html);
        assert_eq!(seasons.len(), 2);
        assert!(seasons[0].selected);
        assert_eq!(seasons[1].label, "2024/2025");
        assert_eq!(
            seasons[1].ajax_url.as_ref().unwrap().as_str(),
            "https://spb.fhr.ru/ajax/tournaments.php?params=BBB"
        );
    }

    #[test]
    fn tournaments_carry_dates_and_flags() {
        let html = r#"
            <div class="tournament-item finished" data-start="01.09.2024" data-end="2025-03-30">
              <a class="tournament-link" href="/tournaments/1234/2024/">Первенство СПб  U16</a>
            </div>
            <div class="tournament-item">
              <a class="tournament-link" href="/tournaments/no-id/">Broken</a>
            </div>
        "#;
        let got = parser().tournaments(&base(), html, Some("2024/2025"));
        assert_eq!(got.len(), 1);
        let t = &got[0];
        assert_eq!(t.ext_id, 1234);
        assert_eq!(t.url, "https://spb.fhr.ru/tournaments/1234/");
        assert_eq!(t.domain, "spb.fhr.ru");
        assert_eq!(t.name, "Первенство СПб U16");
        assert_eq!(t.start_date, NaiveDate::from_ymd_opt(2024, 9, 1));
        assert_eq!(t.end_date, NaiveDate::from_ymd_opt(2025, 3, 30));
        assert_eq!(t.is_ended, Some(true));
        assert_eq!(t.season.as_deref(), Some("2024/2025"));
    }

    #[test]
    fn roster_rows_become_players() {
        let html = r#"
            <table>
              <tr class="player-row">
                <td class="number">17</td>
                <td><a class="player-link" href="/players/5001/">Иванов Иван</a></td>
                <td class="birth-date">05.03.2009</td>
                <td class="position">Нападающий</td>
                <td class="height">181 см</td>
                <td class="weight">74</td>
                <td class="grip">Левый</td>
              </tr>
              <tr class="player-row"><td>no link</td></tr>
            </table>
        "#;
        let players = parser().players(&base(), html);
        assert_eq!(players.len(), 1);
        let p = &players[0];
        assert_eq!(p.href, "/players/5001/");
        assert_eq!(p.external_id.as_deref(), Some("5001"));
        assert_eq!(p.source.as_deref(), Some("spb.fhr.ru"));
        assert_eq!(p.birth_year(), Some(2009));
        assert_eq!(p.height, Some(181));
        assert_eq!(p.number, Some(17));
        assert_eq!(p.handedness.as_deref(), Some("Левый"));
    }

    #[test]
    fn profile_page_requires_card() {
        let url = Url::parse("https://spb.fhr.ru/players/42/").unwrap();
        let html = r#"<div class="player-profile"><h1 class="player-name">Петров Пётр</h1>
                      <span class="birth-date">2010-01-02</span></div>"#;
        let p = parser().player_profile(&url, html).unwrap();
        assert_eq!(p.full_name, "Петров Пётр");
        assert_eq!(p.external_id.as_deref(), Some("42"));

        assert!(parser().player_profile(&url, "<html><body>404</body></html>").is_none());
    }

    #[test]
    fn stats_payload_defaults_points() {
        let body = br#"{"players":[{"url":"/players/7/","games":10,"goals":3,"assists":4,"pim":6}]}"#;
        let rows = parser().player_stats(&base(), body).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].points, 7);
        assert_eq!(rows[0].penalty_minutes, 6);
        assert_eq!(rows[0].external_id.as_deref(), Some("7"));

        assert!(parser().player_stats(&base(), b"<html>").is_err());
    }

    #[test]
    fn url_builders() {
        let p = parser();
        let t = Url::parse("https://spb.fhr.ru/tournaments/1234/").unwrap();
        assert_eq!(p.stats_url(&t).unwrap().as_str(), "https://spb.fhr.ru/api/tournaments/1234/stats/");
        assert_eq!(
            p.player_profile_url(&t, 99).unwrap().as_str(),
            "https://spb.fhr.ru/players/99/"
        );
        assert_eq!(p.tournament_list_url(&t).unwrap().as_str(), "https://spb.fhr.ru/tournaments/");
    }
}
