//! Library operations on top of the repository, plus adding games straight
//! from the catalog.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::igdb::GameCatalog;
use crate::repository::{LibraryFilter, LibraryItemUpdate, NewLibraryItem};
use crate::services::game_detail::GameDetailService;
use crate::services::{ServiceError, ServiceResult};
use crate::{
    AcquisitionType, Database, Game, LibraryItem, LibraryItemStatus, LibraryItemWithGame,
    SavepointError,
};

#[derive(Debug, Clone)]
pub struct UpdateLibraryItemInput {
    pub id: i64,
    pub status: LibraryItemStatus,
    /// `None` keeps the stored date, `Some(None)` clears it
    pub started_at: Option<Option<DateTime<Utc>>>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
}

/// Add a game to a library by its IGDB id.
#[derive(Debug, Clone)]
pub struct AddGameInput {
    pub user_id: String,
    pub igdb_id: i64,
    pub status: LibraryItemStatus,
    pub acquisition_type: AcquisitionType,
    pub platform: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddedGame {
    pub item: LibraryItem,
    pub game: Game,
}

pub struct LibraryService<'a> {
    db: &'a Database,
}

impl<'a> LibraryService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn create_library_item(&self, item: &NewLibraryItem) -> ServiceResult<LibraryItem> {
        tracing::info!(
            user_id = %item.user_id,
            game_id = %item.game_id,
            status = %item.status,
            "Creating library item"
        );
        if self.db.find_game_by_id(&item.game_id)?.is_none() {
            return Err(ServiceError::NotFound("Game not found".to_string()));
        }
        let created = self.db.create_library_item(item)?;
        tracing::info!(library_item_id = created.id, "Library item created");
        Ok(created)
    }

    /// Change an item's status and dates. Every status may follow every other.
    pub fn update_library_item(
        &self,
        user_id: &str,
        input: &UpdateLibraryItemInput,
    ) -> ServiceResult<LibraryItem> {
        let current = self
            .db
            .find_library_item_by_id(input.id, user_id)?
            .ok_or_else(|| ServiceError::NotFound("Library item not found".to_string()))?;

        let updated = self.db.update_library_item(
            input.id,
            user_id,
            &LibraryItemUpdate {
                status: Some(input.status),
                started_at: input.started_at,
                completed_at: input.completed_at,
                ..Default::default()
            },
        )?;

        tracing::info!(
            library_item_id = input.id,
            old_status = %current.status,
            new_status = %updated.status,
            "Library item updated"
        );
        Ok(updated)
    }

    pub fn delete_library_item(&self, item_id: i64, user_id: &str) -> ServiceResult<()> {
        if item_id <= 0 {
            return Err(ServiceError::Validation(
                "Library item id must be a positive integer".to_string(),
            ));
        }

        match self.db.delete_library_item(item_id, user_id) {
            Ok(_) => {
                tracing::info!(library_item_id = item_id, "Library item deleted");
                Ok(())
            }
            Err(SavepointError::NotFound(_)) => {
                tracing::warn!(library_item_id = item_id, user_id, "Library item not found or not owned");
                Err(ServiceError::NotFound(
                    "Library item not found or you do not have permission to delete it".to_string(),
                ))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn find_all_library_items_by_game_id(
        &self,
        user_id: &str,
        game_id: &str,
    ) -> ServiceResult<Vec<LibraryItem>> {
        Ok(self.db.find_all_library_items_by_game_id(user_id, game_id)?)
    }

    pub fn find_most_recent_library_item_by_game_id(
        &self,
        user_id: &str,
        game_id: &str,
    ) -> ServiceResult<Option<LibraryItem>> {
        Ok(self
            .db
            .find_most_recent_library_item_by_game_id(user_id, game_id)?)
    }

    pub fn get_library_items(
        &self,
        user_id: &str,
        filter: &LibraryFilter,
    ) -> ServiceResult<Vec<LibraryItemWithGame>> {
        let items = self.db.find_library_items_with_filters(user_id, filter)?;
        tracing::info!(user_id, count = items.len(), "Library items fetched");
        Ok(items)
    }

    /// Add a game by IGDB id, pulling it from the catalog first when it is
    /// not stored locally yet.
    pub fn add_game_to_library(
        &self,
        catalog: &dyn GameCatalog,
        input: &AddGameInput,
    ) -> ServiceResult<AddedGame> {
        let game = match self.db.find_game_by_igdb_id(input.igdb_id)? {
            Some(game) => game,
            None => {
                let igdb_game = catalog.game_details(input.igdb_id)?.ok_or_else(|| {
                    ServiceError::NotFound(format!("No IGDB game with id {}", input.igdb_id))
                })?;
                GameDetailService::new(self.db).populate_game_in_database(&igdb_game)?
            }
        };

        let item = self.create_library_item(&NewLibraryItem {
            user_id: input.user_id.clone(),
            game_id: game.id.clone(),
            status: input.status,
            acquisition_type: input.acquisition_type,
            platform: input.platform.clone(),
            started_at: input.started_at,
            completed_at: input.completed_at,
        })?;

        Ok(AddedGame { item, game })
    }
}
