//! Populating the local catalog from IGDB records.

use crate::igdb::IgdbGame;
use crate::services::{ServiceError, ServiceResult};
use crate::{Database, Game, SavepointError};

pub struct GameDetailService<'a> {
    db: &'a Database,
}

impl<'a> GameDetailService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Store an IGDB game with its genres and platforms, returning the local
    /// row. A game that is already stored is returned unchanged.
    pub fn populate_game_in_database(&self, igdb_game: &IgdbGame) -> ServiceResult<Game> {
        if let Some(existing) = self.db.find_game_by_igdb_id(igdb_game.id)? {
            tracing::debug!(igdb_id = igdb_game.id, "Game already in database, skipping");
            return Ok(existing);
        }

        let genre_ids: Vec<String> = self
            .db
            .upsert_genres(&igdb_game.to_new_genres())?
            .into_iter()
            .map(|g| g.id)
            .collect();
        let platform_ids: Vec<String> = self
            .db
            .upsert_platforms(&igdb_game.to_new_platforms())?
            .into_iter()
            .map(|p| p.id)
            .collect();

        match self
            .db
            .create_game_with_relations(&igdb_game.to_new_game(), &genre_ids, &platform_ids)
        {
            Ok(game) => {
                tracing::info!(
                    igdb_id = igdb_game.id,
                    game_id = %game.id,
                    slug = %game.slug,
                    "Game populated in database"
                );
                Ok(game)
            }
            // Another writer stored it first
            Err(SavepointError::Duplicate(_)) => {
                self.db.find_game_by_igdb_id(igdb_game.id)?.ok_or_else(|| {
                    tracing::error!(igdb_id = igdb_game.id, slug = %igdb_game.slug, "Slug taken by a different game");
                    ServiceError::Conflict(format!("Game slug {} already exists", igdb_game.slug))
                })
            }
            Err(e) => {
                tracing::error!(igdb_id = igdb_game.id, error = %e, "Failed to populate game");
                Err(e.into())
            }
        }
    }

    pub fn get_game_by_slug(&self, slug: &str) -> ServiceResult<Game> {
        self.db
            .find_game_by_slug(slug)?
            .ok_or_else(|| ServiceError::NotFound("Game not found".to_string()))
    }

    pub fn get_game_by_igdb_id(&self, igdb_id: i64) -> ServiceResult<Option<Game>> {
        Ok(self.db.find_game_by_igdb_id(igdb_id)?)
    }
}
