//! IGDB client.
//!
//! IGDB authenticates through Twitch client credentials. The access token is
//! cached in the client and refreshed a minute before it expires. Queries use
//! IGDB's Apicalypse syntax, posted as the request body.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::repository::{NewGame, NewGenre, NewPlatform};
use crate::services::{ServiceError, ServiceResult};

/// Refresh tokens this long before IGDB says they expire.
const TOKEN_EXPIRY_SAFETY_MARGIN: Duration = Duration::from_secs(60);

const STEAM_STORE_URL: &str = "https://store.steampowered.com/app";

const GAME_FIELDS: &str = "id, name, slug, summary, cover.image_id, first_release_date, franchise, genres.name, genres.slug, platforms.name, platforms.slug, platforms.abbreviation";

const RATE_LIMITED_MESSAGE: &str = "IGDB API rate limit exceeded. Please try again in a moment.";

/// A game record as returned by IGDB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IgdbGame {
    pub id: i64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub cover: Option<IgdbCover>,
    /// Unix seconds
    #[serde(default)]
    pub first_release_date: Option<i64>,
    #[serde(default)]
    pub franchise: Option<i64>,
    #[serde(default)]
    pub genres: Vec<IgdbNamed>,
    #[serde(default)]
    pub platforms: Vec<IgdbNamed>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IgdbCover {
    pub image_id: Option<String>,
}

/// A genre or platform reference expanded inside a game record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IgdbNamed {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub abbreviation: Option<String>,
}

impl IgdbGame {
    pub fn release_date(&self) -> Option<DateTime<Utc>> {
        self.first_release_date
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    pub fn cover_image_id(&self) -> Option<&str> {
        self.cover.as_ref().and_then(|c| c.image_id.as_deref())
    }

    pub fn to_new_game(&self) -> NewGame {
        NewGame {
            igdb_id: self.id,
            slug: self.slug.clone(),
            title: self.name.clone(),
            description: self.summary.clone().filter(|s| !s.is_empty()),
            cover_image: self.cover_image_id().map(str::to_string),
            release_date: self.release_date(),
            franchise_id: self.franchise,
        }
    }

    pub fn to_new_genres(&self) -> Vec<NewGenre> {
        self.genres
            .iter()
            .map(|g| NewGenre {
                igdb_id: g.id,
                name: g.name.clone(),
                slug: g.slug.clone().unwrap_or_else(|| slugify(&g.name)),
            })
            .collect()
    }

    pub fn to_new_platforms(&self) -> Vec<NewPlatform> {
        self.platforms
            .iter()
            .map(|p| NewPlatform {
                igdb_id: p.id,
                name: p.name.clone(),
                slug: p.slug.clone().unwrap_or_else(|| slugify(&p.name)),
                abbreviation: p.abbreviation.clone(),
            })
            .collect()
    }
}

/// Public URL for an IGDB image id at the given size (e.g. `cover_big`).
pub fn image_url(image_id: &str, size: &str) -> String {
    format!("https://images.igdb.com/igdb/image/upload/t_{}/{}.jpg", size, image_id)
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Source of game metadata. Implemented by [`IgdbClient`]; tests substitute
/// an in-memory catalog.
pub trait GameCatalog {
    /// Find the IGDB game linked to a Steam app id. `Ok(None)` when IGDB has
    /// no mapping for it.
    fn match_steam_game(&self, steam_app_id: &str) -> ServiceResult<Option<IgdbGame>>;

    fn game_details(&self, igdb_id: i64) -> ServiceResult<Option<IgdbGame>>;

    fn search_games(&self, name: &str, limit: usize) -> ServiceResult<Vec<IgdbGame>>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    access_token: String,
    refresh_at: Instant,
}

/// Blocking IGDB client with a cached access token.
pub struct IgdbClient {
    agent: ureq::Agent,
    api_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
}

impl IgdbClient {
    pub fn new(
        api_url: impl Into<String>,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token: Mutex::new(None),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.igdb.api_url.clone(),
            config.igdb.token_url.clone(),
            config.igdb.client_id.clone(),
            config.igdb.client_secret.clone(),
            Duration::from_secs(config.http_timeout_secs),
        )
    }

    /// Drop the cached token so the next request authenticates again.
    pub fn reset_token(&self) {
        let mut cached = self.token.lock().unwrap_or_else(|e| e.into_inner());
        *cached = None;
    }

    fn access_token(&self) -> ServiceResult<String> {
        let mut cached = self.token.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.access_token.clone());
            }
        }

        tracing::debug!("Requesting new IGDB access token");
        let response = self
            .agent
            .post(&self.token_url)
            .query("client_id", &self.client_id)
            .query("client_secret", &self.client_secret)
            .query("grant_type", "client_credentials")
            .call()
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to fetch IGDB access token");
                ServiceError::ExternalService("Failed to authenticate with IGDB".to_string())
            })?;
        let token: TokenResponse = response.into_json().map_err(|e| {
            tracing::error!(error = %e, "Malformed IGDB token response");
            ServiceError::ExternalService("Failed to authenticate with IGDB".to_string())
        })?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_SAFETY_MARGIN);
        tracing::info!(expires_in = token.expires_in, "IGDB access token acquired");
        *cached = Some(CachedToken {
            access_token: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    fn query_games(&self, body: &str) -> ServiceResult<Vec<IgdbGame>> {
        let token = self.access_token()?;
        let url = format!("{}/games", self.api_url);
        tracing::debug!(%url, "IGDB request");

        let result = self
            .agent
            .post(&url)
            .set("Accept", "application/json")
            .set("Client-ID", &self.client_id)
            .set("Authorization", &format!("Bearer {}", token))
            .send_string(body);

        match result {
            Ok(response) => response.into_json::<Vec<IgdbGame>>().map_err(|e| {
                tracing::error!(error = %e, "IGDB response validation failed");
                ServiceError::ExternalService("Invalid response from IGDB".to_string())
            }),
            Err(ureq::Error::Status(429, _)) => {
                tracing::warn!("IGDB rate limit hit");
                Err(ServiceError::IgdbRateLimited(RATE_LIMITED_MESSAGE.to_string()))
            }
            Err(ureq::Error::Status(status, response)) => {
                let body = response
                    .into_string()
                    .unwrap_or_else(|_| "Unable to read body".to_string());
                tracing::error!(status, body = %body, "IGDB API request failed");
                Err(ServiceError::ExternalService(format!(
                    "IGDB API error: {} - {}",
                    status, body
                )))
            }
            Err(ureq::Error::Transport(transport)) => {
                tracing::error!(error = %transport, "IGDB unreachable");
                Err(ServiceError::ExternalService(format!(
                    "Failed to reach IGDB: {}",
                    transport
                )))
            }
        }
    }
}

/// Escape a user-supplied string for use inside an Apicalypse string literal.
fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

impl GameCatalog for IgdbClient {
    fn match_steam_game(&self, steam_app_id: &str) -> ServiceResult<Option<IgdbGame>> {
        if steam_app_id.is_empty() {
            return Err(ServiceError::Validation("Steam App ID is required".to_string()));
        }
        if !steam_app_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ServiceError::Validation(
                "Steam App ID must contain only digits".to_string(),
            ));
        }

        let steam_url = format!("{}/{}", STEAM_STORE_URL, steam_app_id);
        let body = format!(
            "fields {}; where external_games.url = \"{}\"; limit 1;",
            GAME_FIELDS, steam_url
        );
        let game = self.query_games(&body)?.into_iter().next();

        match &game {
            Some(g) => tracing::info!(steam_app_id, igdb_id = g.id, name = %g.name, "Matched Steam game to IGDB"),
            None => tracing::info!(steam_app_id, "No IGDB match for Steam app"),
        }
        Ok(game)
    }

    fn game_details(&self, igdb_id: i64) -> ServiceResult<Option<IgdbGame>> {
        if igdb_id <= 0 {
            return Err(ServiceError::Validation("Invalid IGDB game id".to_string()));
        }
        let body = format!("fields {}; where id = {}; limit 1;", GAME_FIELDS, igdb_id);
        Ok(self.query_games(&body)?.into_iter().next())
    }

    fn search_games(&self, name: &str, limit: usize) -> ServiceResult<Vec<IgdbGame>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::Validation(
                "Game name is required for search".to_string(),
            ));
        }
        let body = format!(
            "search \"{}\"; fields {}; limit {};",
            escape_query(name),
            GAME_FIELDS,
            limit.clamp(1, 500)
        );
        let games = self.query_games(&body)?;
        tracing::info!(query = name, results = games.len(), "IGDB search completed");
        Ok(games)
    }
}
