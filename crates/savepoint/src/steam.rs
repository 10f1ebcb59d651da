//! Steam Web API client.
//!
//! Only the three endpoints the import flow needs are wrapped: vanity URL
//! resolution, player summaries and owned games. HTTP failures are mapped to
//! [`ServiceError`] variants so callers can tell a throttled or unavailable
//! Steam apart from a private profile.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::services::{ServiceError, ServiceResult};

/// Steam community visibility state for a public profile.
const VISIBILITY_PUBLIC: i64 = 3;

const RATE_LIMITED_MESSAGE: &str = "Too many requests to Steam. Please wait a moment and try again.";
const UNAVAILABLE_MESSAGE: &str = "Steam is temporarily unavailable. Please try again later.";
const PRIVATE_PROFILE_MESSAGE: &str = "Your Steam profile game details are set to private. To import your library, please set your game details to public in Steam Privacy Settings.";
const INVALID_STEAM_ID_MESSAGE: &str =
    "Invalid Steam ID. Please provide a 17-digit Steam ID64 or a valid Steam vanity URL.";

/// Public profile data for a Steam account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SteamProfile {
    pub steam_id64: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub profile_url: Option<String>,
    pub is_public: bool,
}

/// One game from a Steam library. Playtimes are in minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SteamOwnedGame {
    pub app_id: u64,
    pub name: String,
    pub playtime_forever: i64,
    pub playtime_windows: i64,
    pub playtime_mac: i64,
    pub playtime_linux: i64,
    pub img_icon_url: Option<String>,
    pub img_logo_url: Option<String>,
    /// Unix seconds; 0 or absent when never played
    pub rtime_last_played: Option<i64>,
}

/// Operations against the Steam Web API.
pub trait SteamApi {
    /// Resolve a vanity name (`steamcommunity.com/id/<name>`) to a Steam ID64.
    fn resolve_vanity_url(&self, vanity_url: &str) -> ServiceResult<String>;

    /// Fetch the profile for a Steam ID64. Private profiles are rejected.
    fn get_player_summary(&self, steam_id64: &str) -> ServiceResult<SteamProfile>;

    fn get_owned_games(&self, steam_id64: &str) -> ServiceResult<Vec<SteamOwnedGame>>;

    /// Accept either a 17-digit Steam ID64 or a vanity name and return the
    /// Steam ID64.
    fn validate_steam_id(&self, input: &str) -> ServiceResult<String> {
        let trimmed = input.trim();
        if is_steam_id64(trimmed) {
            tracing::debug!(steam_id64 = trimmed, "Input is already a Steam ID64");
            return Ok(trimmed.to_string());
        }

        tracing::debug!(input = trimmed, "Resolving input as a vanity URL");
        self.resolve_vanity_url(trimmed).map_err(|err| {
            tracing::warn!(input = trimmed, error = %err, "Failed to validate Steam ID");
            ServiceError::Validation(INVALID_STEAM_ID_MESSAGE.to_string())
        })
    }
}

/// True when `input` is exactly 17 ASCII digits.
pub fn is_steam_id64(input: &str) -> bool {
    input.len() == 17 && input.bytes().all(|b| b.is_ascii_digit())
}

/// Blocking Steam Web API client.
pub struct SteamClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
}

impl SteamClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.steam.base_url.clone(),
            config.steam.api_key.clone(),
            Duration::from_secs(config.http_timeout_secs),
        )
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
        failure: &str,
    ) -> ServiceResult<T> {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut request = self.agent.get(&url).query("key", &self.api_key);
        for (name, value) in query {
            request = request.query(name, value);
        }

        match request.call() {
            Ok(response) => response.into_json::<T>().map_err(|e| {
                tracing::error!(endpoint, error = %e, "Malformed Steam API response");
                ServiceError::ExternalService(failure.to_string())
            }),
            Err(ureq::Error::Status(status, _)) => {
                tracing::error!(endpoint, status, "Steam API request failed");
                Err(map_status(status, failure))
            }
            Err(ureq::Error::Transport(transport)) => {
                tracing::error!(endpoint, error = %transport, "Steam API unreachable");
                Err(ServiceError::SteamApiUnavailable(UNAVAILABLE_MESSAGE.to_string()))
            }
        }
    }
}

fn map_status(status: u16, failure: &str) -> ServiceError {
    match status {
        429 => ServiceError::RateLimited(RATE_LIMITED_MESSAGE.to_string()),
        s if s >= 500 => ServiceError::SteamApiUnavailable(UNAVAILABLE_MESSAGE.to_string()),
        _ => ServiceError::ExternalService(failure.to_string()),
    }
}

// ===== Wire Types =====

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    response: T,
}

#[derive(Debug, Deserialize)]
struct ResolveVanityResponse {
    success: i64,
    steamid: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlayerSummariesResponse {
    #[serde(default)]
    players: Vec<PlayerSummary>,
}

#[derive(Debug, Deserialize)]
struct PlayerSummary {
    steamid: String,
    personaname: String,
    #[serde(default)]
    communityvisibilitystate: i64,
    avatarfull: Option<String>,
    profileurl: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwnedGamesResponse {
    #[serde(default)]
    game_count: i64,
    games: Option<Vec<OwnedGame>>,
}

#[derive(Debug, Deserialize)]
struct OwnedGame {
    appid: u64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    playtime_forever: i64,
    playtime_windows_forever: Option<i64>,
    playtime_mac_forever: Option<i64>,
    playtime_linux_forever: Option<i64>,
    img_icon_url: Option<String>,
    img_logo_url: Option<String>,
    rtime_last_played: Option<i64>,
}

impl SteamApi for SteamClient {
    fn resolve_vanity_url(&self, vanity_url: &str) -> ServiceResult<String> {
        tracing::info!(vanity_url, "Resolving Steam vanity URL");
        let envelope: Envelope<ResolveVanityResponse> = self.get_json(
            "/ISteamUser/ResolveVanityURL/v1/",
            &[("vanityurl", vanity_url)],
            "Failed to resolve Steam vanity URL",
        )?;

        match envelope.response {
            ResolveVanityResponse {
                success: 1,
                steamid: Some(steam_id64),
                ..
            } => Ok(steam_id64),
            other => {
                tracing::warn!(vanity_url, message = ?other.message, "Vanity URL not found");
                Err(ServiceError::NotFound("Steam profile not found".to_string()))
            }
        }
    }

    fn get_player_summary(&self, steam_id64: &str) -> ServiceResult<SteamProfile> {
        tracing::info!(steam_id64, "Fetching Steam player summary");
        let envelope: Envelope<PlayerSummariesResponse> = self.get_json(
            "/ISteamUser/GetPlayerSummaries/v2/",
            &[("steamids", steam_id64)],
            "Failed to fetch player summary",
        )?;

        let player = envelope
            .response
            .players
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::NotFound("Steam profile not found".to_string()))?;

        if player.communityvisibilitystate != VISIBILITY_PUBLIC {
            tracing::warn!(steam_id64, "Steam profile is private");
            return Err(ServiceError::SteamProfilePrivate(
                PRIVATE_PROFILE_MESSAGE.to_string(),
            ));
        }

        Ok(SteamProfile {
            steam_id64: player.steamid,
            display_name: player.personaname,
            avatar_url: player.avatarfull,
            profile_url: player.profileurl,
            is_public: true,
        })
    }

    fn get_owned_games(&self, steam_id64: &str) -> ServiceResult<Vec<SteamOwnedGame>> {
        tracing::info!(steam_id64, "Fetching owned games from Steam");
        let envelope: Envelope<OwnedGamesResponse> = self.get_json(
            "/IPlayerService/GetOwnedGames/v1/",
            &[
                ("steamid", steam_id64),
                ("include_appinfo", "1"),
                ("include_played_free_games", "1"),
                ("include_extended_appinfo", "1"),
            ],
            "Failed to fetch owned games from Steam",
        )?;

        let response = envelope.response;
        let games = match response.games {
            Some(games) => games,
            // Steam omits the list for private libraries but still reports a count
            None if response.game_count > 0 => {
                tracing::warn!(steam_id64, game_count = response.game_count, "Steam library is private");
                return Err(ServiceError::SteamProfilePrivate(
                    PRIVATE_PROFILE_MESSAGE.to_string(),
                ));
            }
            None => return Ok(Vec::new()),
        };

        let owned: Vec<SteamOwnedGame> = games
            .into_iter()
            .map(|g| SteamOwnedGame {
                app_id: g.appid,
                name: g.name,
                playtime_forever: g.playtime_forever,
                playtime_windows: g.playtime_windows_forever.unwrap_or(0),
                playtime_mac: g.playtime_mac_forever.unwrap_or(0),
                playtime_linux: g.playtime_linux_forever.unwrap_or(0),
                img_icon_url: g.img_icon_url.filter(|s| !s.is_empty()),
                img_logo_url: g.img_logo_url.filter(|s| !s.is_empty()),
                rtime_last_played: g.rtime_last_played,
            })
            .collect();

        tracing::info!(steam_id64, game_count = owned.len(), "Fetched owned games");
        Ok(owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ServiceErrorCode;

    struct VanityOnly(Option<&'static str>);

    impl SteamApi for VanityOnly {
        fn resolve_vanity_url(&self, _vanity_url: &str) -> ServiceResult<String> {
            self.0
                .map(str::to_string)
                .ok_or_else(|| ServiceError::NotFound("Steam profile not found".to_string()))
        }

        fn get_player_summary(&self, _steam_id64: &str) -> ServiceResult<SteamProfile> {
            unreachable!()
        }

        fn get_owned_games(&self, _steam_id64: &str) -> ServiceResult<Vec<SteamOwnedGame>> {
            unreachable!()
        }
    }

    #[test]
    fn test_is_steam_id64() {
        assert!(is_steam_id64("76561197960287930"));
        assert!(!is_steam_id64("7656119796028793"));
        assert!(!is_steam_id64("7656119796028793a"));
        assert!(!is_steam_id64("gabelogannewell"));
    }

    #[test]
    fn test_validate_accepts_id64_without_lookup() {
        let api = VanityOnly(None);
        assert_eq!(
            api.validate_steam_id("  76561197960287930 ").unwrap(),
            "76561197960287930"
        );
    }

    #[test]
    fn test_validate_resolves_vanity() {
        let api = VanityOnly(Some("76561197960287930"));
        assert_eq!(api.validate_steam_id("gabelogannewell").unwrap(), "76561197960287930");
    }

    #[test]
    fn test_validate_failure_is_validation_error() {
        let err = VanityOnly(None).validate_steam_id("nobody").unwrap_err();
        assert_eq!(err.code(), ServiceErrorCode::ValidationError);
        assert_eq!(err.message(), INVALID_STEAM_ID_MESSAGE);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(map_status(429, "x").code(), ServiceErrorCode::RateLimited);
        assert_eq!(map_status(503, "x").code(), ServiceErrorCode::SteamApiUnavailable);
        assert_eq!(map_status(500, "x").code(), ServiceErrorCode::SteamApiUnavailable);
        assert_eq!(map_status(403, "x").code(), ServiceErrorCode::ExternalServiceError);
    }
}
