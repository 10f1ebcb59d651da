//! Moving a synced Steam game into the user's library.
//!
//! The pipeline: load the imported game, resolve its IGDB id (manual or
//! matched by Steam app id), make sure the catalog game exists locally,
//! refuse duplicates, then create the library item. The imported game's
//! match status is updated along the way so the UI can tell matched,
//! unmatched and still-pending games apart.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::igdb::{GameCatalog, IgdbGame};
use crate::repository::NewLibraryItem;
use crate::services::{GameDetailService, LibraryService, ServiceError};
use crate::{
    AcquisitionType, Database, IgdbMatchStatus, ImportedGame, LibraryItem, LibraryItemStatus,
};

/// Imported Steam games land on this platform.
pub const IMPORT_PLATFORM: &str = "PC (Microsoft Windows)";

/// Games last played within this many days are considered in progress.
const PLAYING_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone)]
pub struct ImportGameInput {
    pub imported_game_id: String,
    pub user_id: String,
    /// Falls back to [`calculate_smart_status`] when absent
    pub status: Option<LibraryItemStatus>,
    /// Skip matching and use this IGDB id
    pub manual_igdb_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportedToLibrary {
    pub library_item: LibraryItem,
    pub game_slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImportError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    NoMatch(String),

    #[error("{0}")]
    Duplicate(String),

    #[error("{0}")]
    Igdb(String),

    /// Transient; the imported game stays PENDING so it can be retried.
    #[error("{0}")]
    Network(String),
}

impl ImportError {
    pub fn code(&self) -> &'static str {
        match self {
            ImportError::NotFound(_) => "NOT_FOUND",
            ImportError::NoMatch(_) => "NO_MATCH",
            ImportError::Duplicate(_) => "DUPLICATE",
            ImportError::Igdb(_) => "IGDB_ERROR",
            ImportError::Network(_) => "NETWORK_ERROR",
        }
    }
}

/// Pick a library status from Steam play data: never played is OWNED,
/// played within the last week is PLAYING, anything else is PLAYED.
pub fn calculate_smart_status(game: &ImportedGame, now: DateTime<Utc>) -> LibraryItemStatus {
    if game.playtime <= 0 {
        return LibraryItemStatus::Owned;
    }
    match game.last_played_at {
        Some(last) if now - last < Duration::days(PLAYING_WINDOW_DAYS) => LibraryItemStatus::Playing,
        _ => LibraryItemStatus::Played,
    }
}

pub fn import_game_to_library(
    db: &Database,
    catalog: &dyn GameCatalog,
    input: &ImportGameInput,
) -> Result<ImportedToLibrary, ImportError> {
    let ImportGameInput {
        imported_game_id,
        user_id,
        ..
    } = input;
    tracing::info!(
        imported_game_id = %imported_game_id,
        user_id = %user_id,
        status = ?input.status,
        manual_igdb_id = ?input.manual_igdb_id,
        "Starting game import to library"
    );

    let imported = match db.find_imported_game_by_id(imported_game_id, user_id) {
        Ok(Some(game)) => game,
        Ok(None) => {
            tracing::warn!(%imported_game_id, %user_id, "Imported game not found");
            return Err(ImportError::NotFound(
                "Imported game not found or access denied".to_string(),
            ));
        }
        Err(e) => {
            tracing::error!(error = %e, %imported_game_id, "Failed to fetch imported game");
            return Err(ImportError::NotFound("Failed to fetch imported game".to_string()));
        }
    };

    // A matched game is reused below so IGDB is not asked twice
    let (igdb_id, mut igdb_game) = match input.manual_igdb_id {
        Some(id) => {
            tracing::info!(%imported_game_id, manual_igdb_id = id, "Using manually selected IGDB ID");
            (id, None)
        }
        None => {
            let matched = match_imported_game(db, catalog, &imported)?;
            (matched.id, Some(matched))
        }
    };

    let game = match db.find_game_by_igdb_id(igdb_id) {
        Ok(Some(game)) => {
            tracing::info!(game_id = %game.id, igdb_id, slug = %game.slug, "Game already exists in database");
            game
        }
        Ok(None) => {
            tracing::info!(igdb_id, "Game not in database, fetching from IGDB");
            if igdb_game.is_none() {
                igdb_game = catalog.game_details(igdb_id).map_err(|e| {
                    tracing::error!(error = %e, igdb_id, "Failed to fetch game details from IGDB");
                    ImportError::Igdb("Failed to fetch game details from IGDB".to_string())
                })?;
            }
            let igdb_game = igdb_game.ok_or_else(|| {
                tracing::error!(igdb_id, "No game data returned from IGDB");
                ImportError::Igdb("Game not found in IGDB".to_string())
            })?;

            let game = GameDetailService::new(db)
                .populate_game_in_database(&igdb_game)
                .map_err(|e| {
                    tracing::error!(error = %e, igdb_id, "Failed to populate game in database");
                    ImportError::Igdb("Failed to create game record".to_string())
                })?;
            tracing::info!(game_id = %game.id, igdb_id, slug = %game.slug, "Created game in database");
            game
        }
        Err(e) => {
            tracing::error!(error = %e, igdb_id, "Failed to check if game exists in database");
            return Err(ImportError::Igdb("Failed to check game existence".to_string()));
        }
    };

    let library = LibraryService::new(db);
    // A failed lookup is treated as no existing items
    let existing = library
        .find_all_library_items_by_game_id(user_id, &game.id)
        .unwrap_or_default();
    if !existing.is_empty() {
        tracing::warn!(
            %user_id,
            game_id = %game.id,
            existing_count = existing.len(),
            "Game already in user library, marking as MATCHED"
        );
        mark(db, imported_game_id, user_id, IgdbMatchStatus::Matched);
        return Err(ImportError::Duplicate("Game already in library".to_string()));
    }

    let status = input
        .status
        .unwrap_or_else(|| calculate_smart_status(&imported, Utc::now()));
    let library_item = library
        .create_library_item(&NewLibraryItem {
            user_id: user_id.clone(),
            game_id: game.id.clone(),
            status,
            acquisition_type: AcquisitionType::Digital,
            platform: Some(IMPORT_PLATFORM.to_string()),
            started_at: None,
            completed_at: None,
        })
        .map_err(|e| {
            tracing::error!(error = %e, %user_id, game_id = %game.id, "Failed to create library item");
            ImportError::Igdb(e.message().to_string())
        })?;

    mark(db, imported_game_id, user_id, IgdbMatchStatus::Matched);
    tracing::info!(
        %imported_game_id,
        game_id = %game.id,
        library_item_id = library_item.id,
        game_slug = %game.slug,
        "Imported game to library"
    );

    Ok(ImportedToLibrary {
        library_item,
        game_slug: game.slug,
    })
}

fn match_imported_game(
    db: &Database,
    catalog: &dyn GameCatalog,
    imported: &ImportedGame,
) -> Result<IgdbGame, ImportError> {
    let Some(app_id) = imported.storefront_game_id.as_deref() else {
        tracing::error!(imported_game_id = %imported.id, "Cannot auto-match without a storefront id");
        mark(db, &imported.id, &imported.user_id, IgdbMatchStatus::Unmatched);
        return Err(ImportError::NoMatch(
            "Cannot match game without Steam App ID".to_string(),
        ));
    };

    tracing::info!(imported_game_id = %imported.id, steam_app_id = app_id, "Auto-matching Steam game to IGDB");
    match catalog.match_steam_game(app_id) {
        Ok(Some(game)) => {
            tracing::info!(imported_game_id = %imported.id, igdb_id = game.id, name = %game.name, "Matched Steam game to IGDB");
            Ok(game)
        }
        Ok(None) => {
            tracing::warn!(imported_game_id = %imported.id, steam_app_id = app_id, "No IGDB match found");
            mark(db, &imported.id, &imported.user_id, IgdbMatchStatus::Unmatched);
            Err(ImportError::NoMatch(
                "No IGDB match found for this Steam game".to_string(),
            ))
        }
        Err(e @ (ServiceError::ExternalService(_) | ServiceError::IgdbRateLimited(_))) => {
            tracing::warn!(
                imported_game_id = %imported.id,
                code = %e.code(),
                error = %e,
                "Network error during IGDB matching, game stays PENDING"
            );
            Err(ImportError::Network(e.message().to_string()))
        }
        Err(e) => {
            tracing::error!(imported_game_id = %imported.id, error = %e, "Steam to IGDB matching failed");
            mark(db, &imported.id, &imported.user_id, IgdbMatchStatus::Unmatched);
            Err(ImportError::Igdb(e.message().to_string()))
        }
    }
}

/// Status bookkeeping never fails an import.
fn mark(db: &Database, imported_game_id: &str, user_id: &str, status: IgdbMatchStatus) {
    if let Err(e) = db.update_imported_game_match_status(imported_game_id, user_id, status) {
        tracing::error!(error = %e, imported_game_id, user_id, status = %status, "Failed to update imported game status");
    }
}
