//! savepoint: game library tracking core
//!
//! This crate provides the building blocks behind the `svp` command line:
//! - SQLite storage for users, games, library items, journal entries and
//!   imported Steam games
//! - Repositories over that storage returning a uniform result shape
//! - Steam Web API and IGDB clients
//! - Services composing repositories (profile, library, journal, steam, game detail)
//! - The Steam-to-library import pipeline

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod config;
pub mod db;
pub mod igdb;
pub mod import;
pub mod repository;
pub mod services;
pub mod steam;
pub mod validation;

// Re-export main types
pub use db::Database;
pub use igdb::{GameCatalog, IgdbClient, IgdbGame};
pub use import::{
    calculate_smart_status, import_game_to_library, ImportError, ImportGameInput, ImportedToLibrary,
};
pub use services::{ServiceError, ServiceErrorCode, ServiceResult};
pub use steam::{SteamApi, SteamClient, SteamOwnedGame, SteamProfile};

/// Declares a string-backed enum stored as TEXT in SQLite and serialized in
/// SCREAMING_SNAKE_CASE.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = SavepointError;

            fn from_str(s: &str) -> Result<Self> {
                let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
                match normalized.as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(SavepointError::Validation(format!(
                        "Invalid {}: {}",
                        stringify!($name),
                        s
                    ))),
                }
            }
        }

        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(self.as_str()))
            }
        }

        impl rusqlite::types::FromSql for $name {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                let text = value.as_str()?;
                text.parse()
                    .map_err(|e| rusqlite::types::FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

text_enum! {
    /// Where a library entry sits in the player's journey.
    LibraryItemStatus {
        WantToPlay => "WANT_TO_PLAY",
        Owned => "OWNED",
        Playing => "PLAYING",
        Played => "PLAYED",
    }
}

impl LibraryItemStatus {
    /// Human-readable label for display.
    pub fn label(&self) -> &'static str {
        match self {
            LibraryItemStatus::WantToPlay => "Want to Play",
            LibraryItemStatus::Owned => "Owned",
            LibraryItemStatus::Playing => "Playing",
            LibraryItemStatus::Played => "Played",
        }
    }
}

text_enum! {
    /// How the user got hold of a game.
    AcquisitionType {
        Digital => "DIGITAL",
        Physical => "PHYSICAL",
        Subscription => "SUBSCRIPTION",
    }
}

text_enum! {
    JournalMood {
        Excited => "EXCITED",
        Relaxed => "RELAXED",
        Frustrated => "FRUSTRATED",
        Accomplished => "ACCOMPLISHED",
        Curious => "CURIOUS",
        Nostalgic => "NOSTALGIC",
    }
}

text_enum! {
    JournalVisibility {
        Private => "PRIVATE",
        FriendsOnly => "FRIENDS_ONLY",
        Public => "PUBLIC",
    }
}

text_enum! {
    /// Progress of matching an imported storefront game to an IGDB entry.
    IgdbMatchStatus {
        Pending => "PENDING",
        Matched => "MATCHED",
        Unmatched => "UNMATCHED",
        Ignored => "IGNORED",
    }
}

text_enum! {
    Storefront {
        Steam => "STEAM",
    }
}

/// A registered user with profile and Steam connection data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub username: Option<String>,
    pub username_normalized: Option<String>,
    /// Avatar URL
    pub image: Option<String>,
    pub steam_id64: Option<String>,
    pub steam_username: Option<String>,
    pub steam_avatar: Option<String>,
    pub steam_profile_url: Option<String>,
    pub steam_connected_at: Option<DateTime<Utc>>,
    pub profile_setup_completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: String,
    pub igdb_id: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub id: String,
    pub igdb_id: i64,
    pub name: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abbreviation: Option<String>,
}

/// A catalog game stored locally, populated from IGDB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub igdb_id: i64,
    /// URL slug, unique across games
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    /// IGDB cover image id
    pub cover_image: Option<String>,
    pub release_date: Option<DateTime<Utc>>,
    pub franchise_id: Option<i64>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub platforms: Vec<Platform>,
    pub created_at: DateTime<Utc>,
}

/// One entry in a user's library. A user may hold several entries for the
/// same game (e.g. different platforms or playthroughs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryItem {
    pub id: i64,
    pub user_id: String,
    pub game_id: String,
    pub status: LibraryItemStatus,
    pub acquisition_type: AcquisitionType,
    pub platform: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A library item joined with the game it refers to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryItemWithGame {
    #[serde(flatten)]
    pub item: LibraryItem,
    pub game_title: String,
    pub game_slug: String,
    pub game_cover_image: Option<String>,
    pub game_release_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: String,
    pub user_id: String,
    pub game_id: String,
    pub library_item_id: Option<i64>,
    pub title: Option<String>,
    pub content: String,
    pub mood: Option<JournalMood>,
    /// Minutes played in the session this entry describes
    pub play_session: Option<i64>,
    pub visibility: JournalVisibility,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JournalEntry {
    pub fn is_public(&self) -> bool {
        self.visibility == JournalVisibility::Public
    }
}

/// A game pulled from a storefront library, waiting to be matched and curated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedGame {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub storefront: Storefront,
    pub storefront_game_id: Option<String>,
    /// Total playtime in minutes
    pub playtime: i64,
    pub playtime_windows: i64,
    pub playtime_mac: i64,
    pub playtime_linux: i64,
    pub last_played_at: Option<DateTime<Utc>>,
    pub img_icon_url: Option<String>,
    pub img_logo_url: Option<String>,
    pub igdb_match_status: IgdbMatchStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Errors raised by storage and repositories.
#[derive(Debug, thiserror::Error)]
pub enum SavepointError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Database not found. Run 'svp init' first.")]
    DatabaseNotFound,

    #[error("Schema version {found} is newer than supported version {supported}")]
    SchemaTooNew { found: u32, supported: u32 },

    #[error("Failed to serialize value: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    Duplicate(String),

    #[error("Unauthorized: {0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, SavepointError>;

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_text() {
        for status in LibraryItemStatus::ALL {
            let parsed: LibraryItemStatus = status.as_str().parse().unwrap();
            assert_eq!(&parsed, status);
        }
    }

    #[test]
    fn test_status_parse_is_lenient_about_case_and_dashes() {
        assert_eq!(
            "want-to-play".parse::<LibraryItemStatus>().unwrap(),
            LibraryItemStatus::WantToPlay
        );
        assert_eq!(
            " playing ".parse::<LibraryItemStatus>().unwrap(),
            LibraryItemStatus::Playing
        );
    }

    #[test]
    fn test_unknown_status_is_validation_error() {
        let err = "BEATEN".parse::<LibraryItemStatus>().unwrap_err();
        assert!(matches!(err, SavepointError::Validation(_)));
        assert!(err.to_string().contains("BEATEN"));
    }

    #[test]
    fn test_enum_serializes_screaming_snake() {
        let json = serde_json::to_string(&JournalVisibility::FriendsOnly).unwrap();
        assert_eq!(json, "\"FRIENDS_ONLY\"");
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(LibraryItemStatus::WantToPlay.label(), "Want to Play");
        assert_eq!(format!("{}", LibraryItemStatus::Played), "PLAYED");
    }
}
