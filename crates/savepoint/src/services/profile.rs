//! Profile management: usernames, avatars and first-run setup.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::repository::{LibraryStats, ProfileUpdate};
use crate::services::steam::SteamConnectionStatus;
use crate::services::{ServiceError, ServiceResult};
use crate::validation::validate_username;
use crate::{Database, User};

/// Users created this recently are sent through setup even with a username.
const NEW_USER_THRESHOLD_MINUTES: i64 = 60;

const SUGGESTED_USERNAME_MAX_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileWithStats {
    pub user: User,
    pub stats: LibraryStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsernameAvailability {
    pub username: String,
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupStatus {
    pub needs_setup: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_username: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateProfileInput {
    pub username: String,
}

pub struct ProfileService<'a> {
    db: &'a Database,
}

impl<'a> ProfileService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn get_profile(&self, user_id: &str) -> ServiceResult<User> {
        self.db.find_user_by_id(user_id)?.ok_or_else(|| {
            tracing::warn!(user_id, "User not found");
            ServiceError::NotFound("User not found".to_string())
        })
    }

    pub fn get_profile_with_stats(&self, user_id: &str) -> ServiceResult<ProfileWithStats> {
        let user = self.get_profile(user_id)?;
        let stats = self.db.get_library_stats(user_id)?;
        tracing::info!(user_id, recent_games = stats.recent_games.len(), "Fetched profile with stats");
        Ok(ProfileWithStats { user, stats })
    }

    /// Whether a username is free. Comparison ignores case.
    pub fn check_username_availability(&self, username: &str) -> ServiceResult<UsernameAvailability> {
        let existing = self
            .db
            .find_user_by_normalized_username(&username.to_lowercase())?;
        let available = existing.is_none();
        tracing::info!(username, available, "Username availability checked");
        Ok(UsernameAvailability {
            username: username.to_string(),
            available,
        })
    }

    /// Change the username. Fails with VALIDATION_ERROR for a malformed name
    /// and CONFLICT when another user already holds it.
    pub fn update_profile(&self, user_id: &str, input: &UpdateProfileInput) -> ServiceResult<User> {
        validate_username(&input.username)?;
        self.get_profile(user_id)?;
        self.ensure_username_free(user_id, &input.username)?;

        let user = self.db.update_user_profile(
            user_id,
            &ProfileUpdate {
                username: Some(input.username.clone()),
                ..Default::default()
            },
        )?;
        tracing::info!(user_id, username = %input.username, "Profile updated");
        Ok(user)
    }

    pub fn update_avatar_url(&self, user_id: &str, avatar_url: &str) -> ServiceResult<User> {
        self.get_profile(user_id)?;
        let user = self.db.update_user_profile(
            user_id,
            &ProfileUpdate {
                image: Some(avatar_url.to_string()),
                ..Default::default()
            },
        )?;
        tracing::info!(user_id, "Avatar updated");
        Ok(user)
    }

    pub fn check_setup_status(&self, user_id: &str) -> ServiceResult<SetupStatus> {
        let user = self.get_profile(user_id)?;
        let status = setup_status_at(&user, Utc::now());
        tracing::info!(
            user_id,
            needs_setup = status.needs_setup,
            has_username = user.username.is_some(),
            "Setup status checked"
        );
        Ok(status)
    }

    /// Finish first-run setup, optionally claiming a username and avatar.
    pub fn complete_setup(
        &self,
        user_id: &str,
        username: Option<&str>,
        avatar_url: Option<&str>,
    ) -> ServiceResult<User> {
        if let Some(username) = username {
            validate_username(username)?;
            self.ensure_username_free(user_id, username)?;
        }
        self.get_profile(user_id)?;

        let user = self.db.update_user_profile(
            user_id,
            &ProfileUpdate {
                username: username.map(str::to_string),
                image: avatar_url.map(str::to_string),
                profile_setup_completed_at: Some(Utc::now()),
            },
        )?;
        tracing::info!(user_id, username = ?user.username, "Profile setup completed");
        Ok(user)
    }

    pub fn verify_user_exists(&self, user_id: &str) -> ServiceResult<()> {
        match self.db.find_user_by_id(user_id)? {
            Some(_) => Ok(()),
            None => Err(ServiceError::NotFound("User account not found".to_string())),
        }
    }

    pub fn get_steam_connection_status(&self, user_id: &str) -> ServiceResult<SteamConnectionStatus> {
        let connection = self.db.get_user_steam_data(user_id)?;
        Ok(SteamConnectionStatus::from_connection(connection))
    }

    fn ensure_username_free(&self, user_id: &str, username: &str) -> ServiceResult<()> {
        match self
            .db
            .find_user_by_normalized_username(&username.to_lowercase())?
        {
            Some(holder) if holder.id != user_id => {
                tracing::warn!(user_id, username, "Username already taken");
                Err(ServiceError::Conflict("Username already exists".to_string()))
            }
            _ => Ok(()),
        }
    }
}

/// Setup is needed until it has been completed, as long as the user has no
/// username yet or signed up less than an hour before `now`.
pub fn setup_status_at(user: &User, now: DateTime<Utc>) -> SetupStatus {
    if user.profile_setup_completed_at.is_some() {
        return SetupStatus {
            needs_setup: false,
            suggested_username: None,
        };
    }

    let is_new_user = user.created_at > now - Duration::minutes(NEW_USER_THRESHOLD_MINUTES);
    let needs_setup = user.username.is_none() || is_new_user;
    let suggested_username = if needs_setup {
        user.name.as_deref().map(suggest_username)
    } else {
        None
    };

    SetupStatus {
        needs_setup,
        suggested_username,
    }
}

/// Lowercased display name with everything but ASCII letters and digits
/// removed, capped at 20 characters.
pub fn suggest_username(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .take(SUGGESTED_USERNAME_MAX_LEN)
        .collect()
}
