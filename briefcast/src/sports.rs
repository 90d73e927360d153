use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::content::ContentItem;

const DEFAULT_BASE_URL: &str = "https://www.thesportsdb.com/api/v1/json";

/// Resolve a configured league key to the scoreboard API's league name.
/// An unknown key is a configuration error, surfaced at wiring time rather
/// than during a fetch.
pub fn league_name(key: &str) -> Result<&'static str> {
    match key.to_lowercase().as_str() {
        "nba" => Ok("NBA"),
        "nfl" => Ok("NFL"),
        "mlb" => Ok("MLB"),
        "nhl" => Ok("NHL"),
        "wnba" => Ok("WNBA"),
        "mls" => Ok("MLS"),
        other => Err(anyhow!("unknown league key: {}", other)),
    }
}

/// Day-scoped scoreboard API client.
pub struct ScoreboardClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ScoreboardClient {
    pub fn new(api_key: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("Briefcast/0.1.0")
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        })
    }

    /// Point the client at a different API root (tests use a mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Locate at most one event for the team in the league on the given day.
    /// No matching event is a normal outcome, not an error.
    pub async fn team_event_on(
        &self,
        league: &str,
        team: &str,
        date: NaiveDate,
    ) -> Result<Option<ContentItem>> {
        let url = format!(
            "{}/{}/eventsday.php?d={}&l={}",
            self.base_url,
            self.api_key,
            date.format("%Y-%m-%d"),
            league
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("scoreboard request failed")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("scoreboard API error: {}", status));
        }

        let body: EventsResponse = response
            .json()
            .await
            .context("failed to parse scoreboard response")?;

        let events = body.events.unwrap_or_default();
        Ok(match_event(&events, team).map(event_to_item))
    }
}

fn match_event<'a>(events: &'a [Event], team: &str) -> Option<&'a Event> {
    let wanted = team.to_lowercase();
    events.iter().find(|e| {
        e.home_team.to_lowercase().contains(&wanted) || e.away_team.to_lowercase().contains(&wanted)
    })
}

fn event_to_item(event: &Event) -> ContentItem {
    let title = match (&event.home_score, &event.away_score) {
        (Some(home), Some(away)) => format!(
            "{} {} - {} {}",
            event.home_team, home, event.away_team, away
        ),
        _ => event.name.clone(),
    };

    ContentItem {
        title,
        summary: event.name.clone(),
        source: "scoreboard".to_string(),
        date: event.date.clone().unwrap_or_default(),
        url: None,
    }
}

// Scoreboard API response structures. Scores come back as strings.
#[derive(Debug, Deserialize)]
struct EventsResponse {
    events: Option<Vec<Event>>,
}

#[derive(Debug, Deserialize)]
struct Event {
    #[serde(rename = "strEvent")]
    name: String,
    #[serde(rename = "strHomeTeam")]
    home_team: String,
    #[serde(rename = "strAwayTeam")]
    away_team: String,
    #[serde(rename = "intHomeScore")]
    home_score: Option<String>,
    #[serde(rename = "intAwayScore")]
    away_score: Option<String>,
    #[serde(rename = "dateEvent")]
    date: Option<String>,
}
