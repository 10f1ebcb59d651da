//! Connecting a Steam account and syncing its owned games into the
//! imported-games table.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::repository::{
    ImportedGameQuery, NewImportedGame, PaginatedImportedGames, SteamConnection, SteamProfileData,
};
use crate::services::{ServiceError, ServiceResult};
use crate::steam::{SteamApi, SteamOwnedGame};
use crate::{Database, Storefront, User};

const NOT_CONNECTED_MESSAGE: &str =
    "You must connect your Steam account before syncing your library.";

/// A user's Steam link as shown to them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SteamConnectionStatus {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steam_id64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
}

impl SteamConnectionStatus {
    /// A user counts as connected once both the Steam id and username are stored.
    pub fn from_connection(connection: Option<SteamConnection>) -> Self {
        match connection {
            Some(SteamConnection {
                steam_id64: Some(steam_id64),
                steam_username: Some(username),
                steam_avatar,
                steam_profile_url,
                steam_connected_at,
            }) => Self {
                connected: true,
                steam_id64: Some(steam_id64),
                username: Some(username),
                avatar_url: steam_avatar,
                profile_url: steam_profile_url,
                connected_at: steam_connected_at,
            },
            _ => Self {
                connected: false,
                steam_id64: None,
                username: None,
                avatar_url: None,
                profile_url: None,
                connected_at: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    /// Games reported by Steam
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
}

pub struct SteamService<'a, S: SteamApi + ?Sized> {
    db: &'a Database,
    api: &'a S,
}

impl<'a, S: SteamApi + ?Sized> SteamService<'a, S> {
    pub fn new(db: &'a Database, api: &'a S) -> Self {
        Self { db, api }
    }

    /// Link a Steam account given as a Steam ID64 or vanity name.
    pub fn connect_account(&self, user_id: &str, steam_input: &str) -> ServiceResult<User> {
        if self.db.find_user_by_id(user_id)?.is_none() {
            return Err(ServiceError::NotFound("User not found".to_string()));
        }

        let steam_id64 = self.api.validate_steam_id(steam_input)?;
        let profile = self.api.get_player_summary(&steam_id64)?;

        if let Some(holder) = self
            .db
            .find_other_user_by_steam_id(user_id, &profile.steam_id64)?
        {
            tracing::warn!(
                user_id,
                holder_id = %holder.id,
                steam_id64 = %profile.steam_id64,
                "Steam account already linked to another user"
            );
            return Err(ServiceError::Conflict(
                "This Steam account is already connected to another user".to_string(),
            ));
        }

        tracing::info!(
            user_id,
            steam_id64 = %profile.steam_id64,
            display_name = %profile.display_name,
            "Connecting Steam account"
        );
        let user = self.db.update_user_steam_data(
            user_id,
            &SteamProfileData {
                steam_id64: profile.steam_id64,
                username: profile.display_name,
                avatar: profile.avatar_url,
                profile_url: profile.profile_url,
                connected_at: Utc::now(),
            },
        )?;
        tracing::info!(user_id, "Steam account connected");
        Ok(user)
    }

    pub fn disconnect(&self, user_id: &str) -> ServiceResult<User> {
        let user = self.db.disconnect_steam(user_id)?;
        tracing::info!(user_id, "Steam account disconnected");
        Ok(user)
    }

    pub fn connection_status(&self, user_id: &str) -> ServiceResult<SteamConnectionStatus> {
        Ok(SteamConnectionStatus::from_connection(
            self.db.get_user_steam_data(user_id)?,
        ))
    }

    /// Pull the user's owned games from Steam. New games land as PENDING,
    /// games seen before get fresh playtime data.
    pub fn sync_owned_games(&self, user_id: &str) -> ServiceResult<SyncSummary> {
        let status = self.connection_status(user_id)?;
        let steam_id64 = match status.steam_id64 {
            Some(id) if status.connected => id,
            _ => {
                tracing::warn!(user_id, "User does not have a connected Steam account");
                return Err(ServiceError::Validation(NOT_CONNECTED_MESSAGE.to_string()));
            }
        };

        let owned = self.api.get_owned_games(&steam_id64)?;
        let games: Vec<NewImportedGame> = owned.iter().map(to_imported_game).collect();

        let before = self.db.count_imported_games_by_user_id(user_id)?;
        let written = self.db.upsert_many_imported_games(user_id, &games)?;
        let after = self.db.count_imported_games_by_user_id(user_id)?;
        let created = (after - before).max(0) as usize;

        let summary = SyncSummary {
            fetched: owned.len(),
            created,
            updated: written.saturating_sub(created),
        };
        tracing::info!(
            user_id,
            steam_id64 = %steam_id64,
            fetched = summary.fetched,
            created = summary.created,
            updated = summary.updated,
            "Steam library synced"
        );
        Ok(summary)
    }

    pub fn list_imported_games(
        &self,
        user_id: &str,
        query: &ImportedGameQuery,
    ) -> ServiceResult<PaginatedImportedGames> {
        Ok(self.db.find_imported_games_by_user_id(user_id, query)?)
    }

    pub fn dismiss_imported_game(&self, imported_game_id: &str, user_id: &str) -> ServiceResult<()> {
        self.db
            .soft_delete_imported_game(imported_game_id, user_id)
            .map_err(|e| match e {
                crate::SavepointError::NotFound(_) => {
                    ServiceError::NotFound("Imported game not found".to_string())
                }
                other => other.into(),
            })?;
        tracing::info!(user_id, imported_game_id, "Imported game dismissed");
        Ok(())
    }
}

fn to_imported_game(game: &SteamOwnedGame) -> NewImportedGame {
    NewImportedGame {
        name: game.name.clone(),
        storefront: Storefront::Steam,
        storefront_game_id: Some(game.app_id.to_string()),
        playtime: game.playtime_forever,
        playtime_windows: game.playtime_windows,
        playtime_mac: game.playtime_mac,
        playtime_linux: game.playtime_linux,
        // Steam reports 0 for never played
        last_played_at: game
            .rtime_last_played
            .filter(|t| *t > 0)
            .and_then(|t| Utc.timestamp_opt(t, 0).single()),
        img_icon_url: game.img_icon_url.clone(),
        img_logo_url: game.img_logo_url.clone(),
        igdb_match_status: None,
    }
}
