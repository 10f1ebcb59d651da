//! User rows: profile fields and the Steam connection.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::db::is_unique_violation;
use crate::{new_id, Database, Result, SavepointError, User};

/// Standard columns selected when querying users.
/// Must match the order expected by `row_to_user`.
const USER_COLUMNS: &str = "id, email, name, username, username_normalized, image, steam_id64, steam_username, steam_avatar, steam_profile_url, steam_connected_at, profile_setup_completed_at, created_at";

/// Partial profile update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub image: Option<String>,
    pub profile_setup_completed_at: Option<DateTime<Utc>>,
}

/// Steam account fields written when a user connects Steam.
#[derive(Debug, Clone)]
pub struct SteamProfileData {
    pub steam_id64: String,
    pub username: String,
    pub avatar: Option<String>,
    pub profile_url: Option<String>,
    pub connected_at: DateTime<Utc>,
}

/// The Steam connection as stored on the user row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SteamConnection {
    pub steam_id64: Option<String>,
    pub steam_username: Option<String>,
    pub steam_avatar: Option<String>,
    pub steam_profile_url: Option<String>,
    pub steam_connected_at: Option<DateTime<Utc>>,
}

/// The timestamps the onboarding checklist reads from the user row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnboardingStatus {
    pub onboarding_dismissed_at: Option<DateTime<Utc>>,
    pub profile_setup_completed_at: Option<DateTime<Utc>>,
}

impl Database {
    /// Create a user. Emails are unique.
    pub fn create_user(&self, email: &str, name: Option<&str>) -> Result<User> {
        let id = new_id();
        let now = Utc::now();
        self.conn()
            .execute(
                "INSERT INTO users (id, email, name, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id, email, name, now],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    SavepointError::Duplicate(format!("User with email {}", email))
                } else {
                    e.into()
                }
            })?;

        self.find_user_by_id(&id)?
            .ok_or_else(|| SavepointError::NotFound("User".to_string()))
    }

    #[must_use = "query results should not be ignored"]
    pub fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
        let user = self
            .conn()
            .query_row(&query, params![user_id], row_to_user)
            .optional()?;
        Ok(user)
    }

    /// Look up a user by the lowercased form of their username.
    pub fn find_user_by_normalized_username(&self, normalized: &str) -> Result<Option<User>> {
        let query = format!(
            "SELECT {} FROM users WHERE username_normalized = ?1",
            USER_COLUMNS
        );
        let user = self
            .conn()
            .query_row(&query, params![normalized], row_to_user)
            .optional()?;
        Ok(user)
    }

    /// Apply a partial profile update and return the updated user.
    ///
    /// Setting a username also sets its normalized (lowercase) form; a
    /// normalized collision with another user yields `Duplicate`.
    pub fn update_user_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<User> {
        let normalized = update.username.as_ref().map(|u| u.to_lowercase());
        let changed = self
            .conn()
            .execute(
                "UPDATE users SET
                    username = COALESCE(?2, username),
                    username_normalized = COALESCE(?3, username_normalized),
                    image = COALESCE(?4, image),
                    profile_setup_completed_at = COALESCE(?5, profile_setup_completed_at)
                 WHERE id = ?1",
                params![
                    user_id,
                    update.username,
                    normalized,
                    update.image,
                    update.profile_setup_completed_at,
                ],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    SavepointError::Duplicate("Username".to_string())
                } else {
                    e.into()
                }
            })?;

        if changed == 0 {
            return Err(SavepointError::NotFound("User".to_string()));
        }

        self.find_user_by_id(user_id)?
            .ok_or_else(|| SavepointError::NotFound("User".to_string()))
    }

    pub fn get_user_steam_data(&self, user_id: &str) -> Result<Option<SteamConnection>> {
        let connection = self
            .conn()
            .query_row(
                "SELECT steam_id64, steam_username, steam_avatar, steam_profile_url, steam_connected_at
                 FROM users WHERE id = ?1",
                params![user_id],
                |row| {
                    Ok(SteamConnection {
                        steam_id64: row.get(0)?,
                        steam_username: row.get(1)?,
                        steam_avatar: row.get(2)?,
                        steam_profile_url: row.get(3)?,
                        steam_connected_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(connection)
    }

    /// Find a user other than `user_id` that already has `steam_id64` linked.
    pub fn find_other_user_by_steam_id(
        &self,
        user_id: &str,
        steam_id64: &str,
    ) -> Result<Option<User>> {
        let query = format!(
            "SELECT {} FROM users WHERE steam_id64 = ?1 AND id != ?2 LIMIT 1",
            USER_COLUMNS
        );
        let user = self
            .conn()
            .query_row(&query, params![steam_id64, user_id], row_to_user)
            .optional()?;
        Ok(user)
    }

    pub fn update_user_steam_data(&self, user_id: &str, steam: &SteamProfileData) -> Result<User> {
        let changed = self.conn().execute(
            "UPDATE users SET
                steam_id64 = ?2,
                steam_username = ?3,
                steam_avatar = ?4,
                steam_profile_url = ?5,
                steam_connected_at = ?6
             WHERE id = ?1",
            params![
                user_id,
                steam.steam_id64,
                steam.username,
                steam.avatar,
                steam.profile_url,
                steam.connected_at,
            ],
        )?;
        if changed == 0 {
            return Err(SavepointError::NotFound("User".to_string()));
        }
        self.find_user_by_id(user_id)?
            .ok_or_else(|| SavepointError::NotFound("User".to_string()))
    }

    /// Clear every Steam field on the user.
    pub fn disconnect_steam(&self, user_id: &str) -> Result<User> {
        let changed = self.conn().execute(
            "UPDATE users SET
                steam_id64 = NULL,
                steam_username = NULL,
                steam_avatar = NULL,
                steam_profile_url = NULL,
                steam_connected_at = NULL
             WHERE id = ?1",
            params![user_id],
        )?;
        if changed == 0 {
            return Err(SavepointError::NotFound("User".to_string()));
        }
        self.find_user_by_id(user_id)?
            .ok_or_else(|| SavepointError::NotFound("User".to_string()))
    }

    // ===== Onboarding =====

    pub fn get_onboarding_status(&self, user_id: &str) -> Result<Option<OnboardingStatus>> {
        let status = self
            .conn()
            .query_row(
                "SELECT onboarding_dismissed_at, profile_setup_completed_at FROM users WHERE id = ?1",
                params![user_id],
                |row| {
                    Ok(OnboardingStatus {
                        onboarding_dismissed_at: row.get(0)?,
                        profile_setup_completed_at: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(status)
    }

    /// Stamp the dismissal time. Dismissing twice keeps the first stamp.
    pub fn dismiss_onboarding(&self, user_id: &str) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE users SET onboarding_dismissed_at = COALESCE(onboarding_dismissed_at, ?2)
             WHERE id = ?1",
            params![user_id, Utc::now()],
        )?;
        if changed == 0 {
            return Err(SavepointError::NotFound("User".to_string()));
        }
        Ok(())
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        username: row.get(3)?,
        username_normalized: row.get(4)?,
        image: row.get(5)?,
        steam_id64: row.get(6)?,
        steam_username: row.get(7)?,
        steam_avatar: row.get(8)?,
        steam_profile_url: row.get(9)?,
        steam_connected_at: row.get(10)?,
        profile_setup_completed_at: row.get(11)?,
        created_at: row.get(12)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steam_data(id: &str) -> SteamProfileData {
        SteamProfileData {
            steam_id64: id.to_string(),
            username: "gaben".to_string(),
            avatar: Some("https://avatars.example/gaben.jpg".to_string()),
            profile_url: Some("https://steamcommunity.com/id/gaben".to_string()),
            connected_at: Utc::now(),
        }
    }

    #[test]
    fn test_create_and_find_user() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("player@example.com", Some("Player One")).unwrap();

        let found = db.find_user_by_id(&user.id).unwrap().unwrap();
        assert_eq!(found.email, "player@example.com");
        assert_eq!(found.name.as_deref(), Some("Player One"));
        assert!(found.username.is_none());
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let db = Database::in_memory().unwrap();
        db.create_user("player@example.com", None).unwrap();
        let err = db.create_user("player@example.com", None).unwrap_err();
        assert!(matches!(err, SavepointError::Duplicate(_)));
    }

    #[test]
    fn test_update_profile_sets_normalized_username() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("a@example.com", None).unwrap();

        let updated = db
            .update_user_profile(
                &user.id,
                &ProfileUpdate {
                    username: Some("LinkHero".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.username.as_deref(), Some("LinkHero"));
        assert_eq!(updated.username_normalized.as_deref(), Some("linkhero"));

        let by_name = db.find_user_by_normalized_username("linkhero").unwrap();
        assert_eq!(by_name.map(|u| u.id), Some(user.id));
    }

    #[test]
    fn test_partial_update_keeps_other_fields() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("a@example.com", None).unwrap();
        db.update_user_profile(
            &user.id,
            &ProfileUpdate {
                username: Some("keeper".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        let updated = db
            .update_user_profile(
                &user.id,
                &ProfileUpdate {
                    image: Some("file:///avatar.png".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.username.as_deref(), Some("keeper"));
        assert_eq!(updated.image.as_deref(), Some("file:///avatar.png"));
    }

    #[test]
    fn test_normalized_username_collision_is_duplicate() {
        let db = Database::in_memory().unwrap();
        let first = db.create_user("a@example.com", None).unwrap();
        let second = db.create_user("b@example.com", None).unwrap();
        let update = ProfileUpdate {
            username: Some("Taken".to_string()),
            ..Default::default()
        };
        db.update_user_profile(&first.id, &update).unwrap();

        let err = db
            .update_user_profile(
                &second.id,
                &ProfileUpdate {
                    username: Some("TAKEN".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, SavepointError::Duplicate(_)));
    }

    #[test]
    fn test_update_missing_user_is_not_found() {
        let db = Database::in_memory().unwrap();
        let err = db
            .update_user_profile("missing", &ProfileUpdate::default())
            .unwrap_err();
        assert!(matches!(err, SavepointError::NotFound(_)));
    }

    #[test]
    fn test_steam_connect_and_disconnect() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("a@example.com", None).unwrap();

        db.update_user_steam_data(&user.id, &steam_data("76561197960287930"))
            .unwrap();
        let steam = db.get_user_steam_data(&user.id).unwrap().unwrap();
        assert_eq!(steam.steam_id64.as_deref(), Some("76561197960287930"));
        assert_eq!(steam.steam_username.as_deref(), Some("gaben"));
        assert!(steam.steam_connected_at.is_some());

        db.disconnect_steam(&user.id).unwrap();
        let steam = db.get_user_steam_data(&user.id).unwrap().unwrap();
        assert!(steam.steam_id64.is_none());
        assert!(steam.steam_connected_at.is_none());
    }

    #[test]
    fn test_find_other_user_by_steam_id_excludes_self() {
        let db = Database::in_memory().unwrap();
        let owner = db.create_user("owner@example.com", None).unwrap();
        let other = db.create_user("other@example.com", None).unwrap();
        db.update_user_steam_data(&owner.id, &steam_data("76561197960287930"))
            .unwrap();

        assert!(db
            .find_other_user_by_steam_id(&owner.id, "76561197960287930")
            .unwrap()
            .is_none());
        let found = db
            .find_other_user_by_steam_id(&other.id, "76561197960287930")
            .unwrap();
        assert_eq!(found.map(|u| u.id), Some(owner.id));
    }

    #[test]
    fn test_dismiss_onboarding_is_sticky() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("a@example.com", None).unwrap();
        let fresh = db.get_onboarding_status(&user.id).unwrap().unwrap();
        assert!(fresh.onboarding_dismissed_at.is_none());
        assert!(fresh.profile_setup_completed_at.is_none());

        db.dismiss_onboarding(&user.id).unwrap();
        let first = db.get_onboarding_status(&user.id).unwrap().unwrap();
        db.dismiss_onboarding(&user.id).unwrap();
        let second = db.get_onboarding_status(&user.id).unwrap().unwrap();
        assert!(first.onboarding_dismissed_at.is_some());
        assert_eq!(first, second);

        assert!(db.get_onboarding_status("missing").unwrap().is_none());
        assert!(matches!(
            db.dismiss_onboarding("missing"),
            Err(SavepointError::NotFound(_))
        ));
    }
}
