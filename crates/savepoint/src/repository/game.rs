//! Local game catalog: games and their genre/platform relations.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use crate::db::{contains_text, is_unique_violation};
use crate::{new_id, Database, Game, Genre, Platform, Result, SavepointError};

const GAME_COLUMNS: &str =
    "id, igdb_id, slug, title, description, cover_image, release_date, franchise_id, created_at";

/// A game to insert, typically built from an IGDB record.
#[derive(Debug, Clone, PartialEq)]
pub struct NewGame {
    pub igdb_id: i64,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    pub release_date: Option<DateTime<Utc>>,
    pub franchise_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewGenre {
    pub igdb_id: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPlatform {
    pub igdb_id: i64,
    pub name: String,
    pub slug: String,
    pub abbreviation: Option<String>,
}

impl Database {
    // ===== Game Lookups =====

    /// Find a game by its URL slug, with genres and platforms loaded.
    pub fn find_game_by_slug(&self, slug: &str) -> Result<Option<Game>> {
        let query = format!("SELECT {} FROM games WHERE slug = ?1", GAME_COLUMNS);
        let game = self
            .conn()
            .query_row(&query, params![slug], row_to_game)
            .optional()?;
        game.map(|g| self.with_relations(g)).transpose()
    }

    /// Find a game by IGDB id, with genres and platforms loaded.
    pub fn find_game_by_igdb_id(&self, igdb_id: i64) -> Result<Option<Game>> {
        let query = format!("SELECT {} FROM games WHERE igdb_id = ?1", GAME_COLUMNS);
        let game = self
            .conn()
            .query_row(&query, params![igdb_id], row_to_game)
            .optional()?;
        game.map(|g| self.with_relations(g)).transpose()
    }

    pub fn find_game_by_id(&self, game_id: &str) -> Result<Option<Game>> {
        let query = format!("SELECT {} FROM games WHERE id = ?1", GAME_COLUMNS);
        let game = self
            .conn()
            .query_row(&query, params![game_id], row_to_game)
            .optional()?;
        game.map(|g| self.with_relations(g)).transpose()
    }

    pub fn game_exists_by_igdb_id(&self, igdb_id: i64) -> Result<bool> {
        let exists: bool = self.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM games WHERE igdb_id = ?1)",
            params![igdb_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Case-insensitive title search over the local catalog.
    pub fn search_local_games(&self, query: &str, limit: usize) -> Result<Vec<Game>> {
        let sql = format!(
            "SELECT {} FROM games WHERE {} ORDER BY title COLLATE NOCASE LIMIT ?",
            GAME_COLUMNS,
            contains_text("title")
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let games = stmt
            .query_map(params![query, limit as i64], row_to_game)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(games)
    }

    // ===== Genre & Platform Operations =====

    /// Insert or refresh genres keyed by IGDB id. Returns the stored rows in
    /// input order.
    pub fn upsert_genres(&self, genres: &[NewGenre]) -> Result<Vec<Genre>> {
        let mut stored = Vec::with_capacity(genres.len());
        for genre in genres {
            self.conn().execute(
                "INSERT INTO genres (id, igdb_id, name, slug) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(igdb_id) DO UPDATE SET name = excluded.name, slug = excluded.slug",
                params![new_id(), genre.igdb_id, genre.name, genre.slug],
            )?;
            let row = self.conn().query_row(
                "SELECT id, igdb_id, name, slug FROM genres WHERE igdb_id = ?1",
                params![genre.igdb_id],
                row_to_genre,
            )?;
            stored.push(row);
        }
        Ok(stored)
    }

    /// Insert or refresh platforms keyed by IGDB id. Returns the stored rows
    /// in input order.
    pub fn upsert_platforms(&self, platforms: &[NewPlatform]) -> Result<Vec<Platform>> {
        let mut stored = Vec::with_capacity(platforms.len());
        for platform in platforms {
            self.conn().execute(
                "INSERT INTO platforms (id, igdb_id, name, slug, abbreviation) VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(igdb_id) DO UPDATE SET
                    name = excluded.name,
                    slug = excluded.slug,
                    abbreviation = excluded.abbreviation",
                params![
                    new_id(),
                    platform.igdb_id,
                    platform.name,
                    platform.slug,
                    platform.abbreviation
                ],
            )?;
            let row = self.conn().query_row(
                "SELECT id, igdb_id, name, slug, abbreviation FROM platforms WHERE igdb_id = ?1",
                params![platform.igdb_id],
                row_to_platform,
            )?;
            stored.push(row);
        }
        Ok(stored)
    }

    // ===== Game Creation =====

    /// Create a game and link it to already-stored genres and platforms in
    /// one transaction. A taken IGDB id or slug yields `Duplicate`.
    pub fn create_game_with_relations(
        &self,
        game: &NewGame,
        genre_ids: &[String],
        platform_ids: &[String],
    ) -> Result<Game> {
        let id = new_id();
        let tx = self.conn().unchecked_transaction()?;

        tx.execute(
            "INSERT INTO games (id, igdb_id, slug, title, description, cover_image, release_date, franchise_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id,
                game.igdb_id,
                game.slug,
                game.title,
                game.description,
                game.cover_image,
                game.release_date,
                game.franchise_id,
                Utc::now(),
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                SavepointError::Duplicate("Game".to_string())
            } else {
                e.into()
            }
        })?;

        {
            let mut genre_stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO game_genres (game_id, genre_id) VALUES (?1, ?2)",
            )?;
            for genre_id in genre_ids {
                genre_stmt.execute(params![id, genre_id])?;
            }

            let mut platform_stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO game_platforms (game_id, platform_id) VALUES (?1, ?2)",
            )?;
            for platform_id in platform_ids {
                platform_stmt.execute(params![id, platform_id])?;
            }
        }

        tx.commit()?;
        tracing::debug!(game_id = %id, igdb_id = game.igdb_id, slug = %game.slug, "Created game");

        self.find_game_by_id(&id)?
            .ok_or_else(|| SavepointError::NotFound("Game".to_string()))
    }

    fn with_relations(&self, mut game: Game) -> Result<Game> {
        let mut stmt = self.conn().prepare_cached(
            "SELECT g.id, g.igdb_id, g.name, g.slug FROM genres g
             JOIN game_genres gg ON gg.genre_id = g.id
             WHERE gg.game_id = ?1 ORDER BY g.name",
        )?;
        game.genres = stmt
            .query_map(params![game.id], row_to_genre)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = self.conn().prepare_cached(
            "SELECT p.id, p.igdb_id, p.name, p.slug, p.abbreviation FROM platforms p
             JOIN game_platforms gp ON gp.platform_id = p.id
             WHERE gp.game_id = ?1 ORDER BY p.name",
        )?;
        game.platforms = stmt
            .query_map(params![game.id], row_to_platform)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(game)
    }
}

fn row_to_game(row: &rusqlite::Row<'_>) -> rusqlite::Result<Game> {
    Ok(Game {
        id: row.get(0)?,
        igdb_id: row.get(1)?,
        slug: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        cover_image: row.get(5)?,
        release_date: row.get(6)?,
        franchise_id: row.get(7)?,
        genres: Vec::new(),
        platforms: Vec::new(),
        created_at: row.get(8)?,
    })
}

fn row_to_genre(row: &rusqlite::Row<'_>) -> rusqlite::Result<Genre> {
    Ok(Genre {
        id: row.get(0)?,
        igdb_id: row.get(1)?,
        name: row.get(2)?,
        slug: row.get(3)?,
    })
}

fn row_to_platform(row: &rusqlite::Row<'_>) -> rusqlite::Result<Platform> {
    Ok(Platform {
        id: row.get(0)?,
        igdb_id: row.get(1)?,
        name: row.get(2)?,
        slug: row.get(3)?,
        abbreviation: row.get(4)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn make_game(igdb_id: i64, slug: &str, title: &str) -> NewGame {
        NewGame {
            igdb_id,
            slug: slug.to_string(),
            title: title.to_string(),
            description: Some(format!("{} description", title)),
            cover_image: Some(format!("co{}", igdb_id)),
            release_date: None,
            franchise_id: None,
        }
    }

    /// Insert a bare game and return it.
    pub(crate) fn insert_game(db: &Database, igdb_id: i64, slug: &str, title: &str) -> Game {
        db.create_game_with_relations(&make_game(igdb_id, slug, title), &[], &[])
            .unwrap()
    }

    #[test]
    fn test_create_game_with_relations() {
        let db = Database::in_memory().unwrap();
        let genres = db
            .upsert_genres(&[
                NewGenre {
                    igdb_id: 12,
                    name: "Role-playing (RPG)".to_string(),
                    slug: "role-playing-rpg".to_string(),
                },
                NewGenre {
                    igdb_id: 31,
                    name: "Adventure".to_string(),
                    slug: "adventure".to_string(),
                },
            ])
            .unwrap();
        let platforms = db
            .upsert_platforms(&[NewPlatform {
                igdb_id: 6,
                name: "PC (Microsoft Windows)".to_string(),
                slug: "win".to_string(),
                abbreviation: Some("PC".to_string()),
            }])
            .unwrap();

        let genre_ids: Vec<String> = genres.iter().map(|g| g.id.clone()).collect();
        let platform_ids: Vec<String> = platforms.iter().map(|p| p.id.clone()).collect();
        let game = db
            .create_game_with_relations(
                &make_game(1942, "the-witcher-3-wild-hunt", "The Witcher 3: Wild Hunt"),
                &genre_ids,
                &platform_ids,
            )
            .unwrap();

        assert_eq!(game.igdb_id, 1942);
        assert_eq!(game.genres.len(), 2);
        assert_eq!(game.genres[0].name, "Adventure"); // ordered by name
        assert_eq!(game.platforms.len(), 1);
        assert_eq!(game.platforms[0].abbreviation.as_deref(), Some("PC"));

        let by_slug = db.find_game_by_slug("the-witcher-3-wild-hunt").unwrap().unwrap();
        assert_eq!(by_slug.id, game.id);
        assert_eq!(by_slug.genres.len(), 2);
    }

    #[test]
    fn test_upsert_genre_refreshes_name() {
        let db = Database::in_memory().unwrap();
        let first = db
            .upsert_genres(&[NewGenre {
                igdb_id: 5,
                name: "Shooter".to_string(),
                slug: "shooter".to_string(),
            }])
            .unwrap();
        let second = db
            .upsert_genres(&[NewGenre {
                igdb_id: 5,
                name: "Shooter (FPS)".to_string(),
                slug: "shooter".to_string(),
            }])
            .unwrap();

        assert_eq!(first[0].id, second[0].id);
        assert_eq!(second[0].name, "Shooter (FPS)");
    }

    #[test]
    fn test_duplicate_game_rejected() {
        let db = Database::in_memory().unwrap();
        insert_game(&db, 1, "celeste", "Celeste");

        let err = db
            .create_game_with_relations(&make_game(1, "celeste-2", "Celeste"), &[], &[])
            .unwrap_err();
        assert!(matches!(err, SavepointError::Duplicate(_)));

        let err = db
            .create_game_with_relations(&make_game(2, "celeste", "Celeste"), &[], &[])
            .unwrap_err();
        assert!(matches!(err, SavepointError::Duplicate(_)));
    }

    #[test]
    fn test_failed_create_leaves_no_links() {
        let db = Database::in_memory().unwrap();
        insert_game(&db, 1, "celeste", "Celeste");
        let genres = db
            .upsert_genres(&[NewGenre {
                igdb_id: 32,
                name: "Indie".to_string(),
                slug: "indie".to_string(),
            }])
            .unwrap();

        let result = db.create_game_with_relations(
            &make_game(1, "other", "Other"),
            &[genres[0].id.clone()],
            &[],
        );
        assert!(result.is_err());

        let links: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM game_genres", [], |r| r.get(0))
            .unwrap();
        assert_eq!(links, 0);
    }

    #[test]
    fn test_game_exists_by_igdb_id() {
        let db = Database::in_memory().unwrap();
        assert!(!db.game_exists_by_igdb_id(7346).unwrap());
        insert_game(&db, 7346, "hades", "Hades");
        assert!(db.game_exists_by_igdb_id(7346).unwrap());
        assert!(db.find_game_by_igdb_id(7346).unwrap().is_some());
    }

    #[test]
    fn test_search_local_games_is_case_insensitive() {
        let db = Database::in_memory().unwrap();
        insert_game(&db, 1, "hollow-knight", "Hollow Knight");
        insert_game(&db, 2, "hades", "Hades");

        let found = db.search_local_games("hollow", 10).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].slug, "hollow-knight");
    }

    #[test]
    fn test_search_local_games_treats_wildcards_literally() {
        let db = Database::in_memory().unwrap();
        insert_game(&db, 1, "portal-2", "Portal 2");
        insert_game(&db, 2, "100-orange-juice", "100% Orange Juice");
        insert_game(&db, 3, "okami", "ŌKAMI HD");

        let slugs = |query: &str| -> Vec<String> {
            db.search_local_games(query, 10)
                .unwrap()
                .into_iter()
                .map(|g| g.slug)
                .collect()
        };
        assert_eq!(slugs("%"), vec!["100-orange-juice"]);
        assert!(slugs("portal_2").is_empty());
        assert_eq!(slugs("ōkami"), vec!["okami"]);
    }
}
