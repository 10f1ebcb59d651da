//! Library items: a user's owned, wanted and played games.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::db::contains_text;
use crate::{
    AcquisitionType, Database, LibraryItem, LibraryItemStatus, LibraryItemWithGame, Result,
    SavepointError,
};

const ITEM_COLUMNS: &str = "li.id, li.user_id, li.game_id, li.status, li.acquisition_type, li.platform, li.started_at, li.completed_at, li.created_at, li.updated_at";

/// Maximum number of games returned in [`LibraryStats::recent_games`].
const RECENT_GAMES_LIMIT: i64 = 5;

#[derive(Debug, Clone)]
pub struct NewLibraryItem {
    pub user_id: String,
    pub game_id: String,
    pub status: LibraryItemStatus,
    pub acquisition_type: AcquisitionType,
    pub platform: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Fields to change on an existing item. `None` keeps the current value.
/// The nullable columns take `Some(None)` to clear them.
#[derive(Debug, Clone, Default)]
pub struct LibraryItemUpdate {
    pub status: Option<LibraryItemStatus>,
    pub acquisition_type: Option<AcquisitionType>,
    pub platform: Option<Option<String>>,
    pub started_at: Option<Option<DateTime<Utc>>>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LibrarySortField {
    #[default]
    CreatedAt,
    ReleaseDate,
    StartedAt,
    CompletedAt,
}

impl LibrarySortField {
    fn column(&self) -> &'static str {
        match self {
            LibrarySortField::CreatedAt => "li.created_at",
            LibrarySortField::ReleaseDate => "g.release_date",
            LibrarySortField::StartedAt => "li.started_at",
            LibrarySortField::CompletedAt => "li.completed_at",
        }
    }
}

impl FromStr for LibrarySortField {
    type Err = SavepointError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "created_at" | "createdat" => Ok(LibrarySortField::CreatedAt),
            "release_date" | "releasedate" => Ok(LibrarySortField::ReleaseDate),
            "started_at" | "startedat" => Ok(LibrarySortField::StartedAt),
            "completed_at" | "completedat" => Ok(LibrarySortField::CompletedAt),
            _ => Err(SavepointError::Validation(format!("Invalid sort field: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = SavepointError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(SavepointError::Validation(format!("Invalid sort order: {}", s))),
        }
    }
}

/// Filters for [`Database::find_library_items_with_filters`].
#[derive(Debug, Clone, Default)]
pub struct LibraryFilter {
    pub status: Option<LibraryItemStatus>,
    pub platform: Option<String>,
    /// Case-insensitive substring of the game title
    pub search: Option<String>,
    pub sort_by: LibrarySortField,
    pub sort_order: SortOrder,
    /// Keep only the most recently created item per game
    pub distinct_by_game: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentGame {
    pub game_id: String,
    pub title: String,
    pub cover_image: Option<String>,
    pub last_played: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryStats {
    /// Item count per status, keyed by the status' stored text
    pub status_counts: BTreeMap<String, i64>,
    /// Most recently updated PLAYING items
    pub recent_games: Vec<RecentGame>,
}

impl Database {
    // ===== Library Item CRUD =====

    pub fn create_library_item(&self, item: &NewLibraryItem) -> Result<LibraryItem> {
        let now = Utc::now();
        self.conn().execute(
            "INSERT INTO library_items (user_id, game_id, status, acquisition_type, platform, started_at, completed_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                item.user_id,
                item.game_id,
                item.status,
                item.acquisition_type,
                item.platform,
                item.started_at,
                item.completed_at,
                now,
            ],
        )?;
        let id = self.conn().last_insert_rowid();

        self.find_library_item_by_id(id, &item.user_id)?
            .ok_or_else(|| SavepointError::NotFound("Library item".to_string()))
    }

    /// Find an item, scoped to its owner.
    pub fn find_library_item_by_id(&self, item_id: i64, user_id: &str) -> Result<Option<LibraryItem>> {
        let query = format!(
            "SELECT {} FROM library_items li WHERE li.id = ?1 AND li.user_id = ?2",
            ITEM_COLUMNS
        );
        let item = self
            .conn()
            .query_row(&query, params![item_id, user_id], row_to_library_item)
            .optional()?;
        Ok(item)
    }

    /// Update an item owned by `user_id`. Items owned by anyone else are
    /// reported as `NotFound`.
    pub fn update_library_item(
        &self,
        item_id: i64,
        user_id: &str,
        update: &LibraryItemUpdate,
    ) -> Result<LibraryItem> {
        let changed = self.conn().execute(
            "UPDATE library_items SET
                status = COALESCE(?3, status),
                acquisition_type = COALESCE(?4, acquisition_type),
                platform = CASE WHEN ?5 THEN ?6 ELSE platform END,
                started_at = CASE WHEN ?7 THEN ?8 ELSE started_at END,
                completed_at = CASE WHEN ?9 THEN ?10 ELSE completed_at END,
                updated_at = ?11
             WHERE id = ?1 AND user_id = ?2",
            params![
                item_id,
                user_id,
                update.status,
                update.acquisition_type,
                update.platform.is_some(),
                update.platform.clone().flatten(),
                update.started_at.is_some(),
                update.started_at.flatten(),
                update.completed_at.is_some(),
                update.completed_at.flatten(),
                Utc::now(),
            ],
        )?;
        if changed == 0 {
            return Err(SavepointError::NotFound("Library item".to_string()));
        }

        self.find_library_item_by_id(item_id, user_id)?
            .ok_or_else(|| SavepointError::NotFound("Library item".to_string()))
    }

    /// Delete an item owned by `user_id`. Returns the deleted id.
    pub fn delete_library_item(&self, item_id: i64, user_id: &str) -> Result<i64> {
        let deleted = self.conn().execute(
            "DELETE FROM library_items WHERE id = ?1 AND user_id = ?2",
            params![item_id, user_id],
        )?;
        if deleted == 0 {
            return Err(SavepointError::NotFound("Library item".to_string()));
        }
        Ok(item_id)
    }

    // ===== Per-Game Queries =====

    /// All of the user's items for a game, oldest first.
    pub fn find_all_library_items_by_game_id(
        &self,
        user_id: &str,
        game_id: &str,
    ) -> Result<Vec<LibraryItem>> {
        let query = format!(
            "SELECT {} FROM library_items li WHERE li.user_id = ?1 AND li.game_id = ?2
             ORDER BY li.created_at ASC, li.id ASC",
            ITEM_COLUMNS
        );
        let mut stmt = self.conn().prepare(&query)?;
        let items = stmt
            .query_map(params![user_id, game_id], row_to_library_item)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    pub fn find_most_recent_library_item_by_game_id(
        &self,
        user_id: &str,
        game_id: &str,
    ) -> Result<Option<LibraryItem>> {
        let query = format!(
            "SELECT {} FROM library_items li WHERE li.user_id = ?1 AND li.game_id = ?2
             ORDER BY li.created_at DESC, li.id DESC LIMIT 1",
            ITEM_COLUMNS
        );
        let item = self
            .conn()
            .query_row(&query, params![user_id, game_id], row_to_library_item)
            .optional()?;
        Ok(item)
    }

    // ===== Listing & Stats =====

    /// List the user's items joined with their games.
    pub fn find_library_items_with_filters(
        &self,
        user_id: &str,
        filter: &LibraryFilter,
    ) -> Result<Vec<LibraryItemWithGame>> {
        let mut conditions = vec!["li.user_id = ?".to_string()];
        let mut values: Vec<String> = vec![user_id.to_string()];

        if let Some(status) = filter.status {
            conditions.push("li.status = ?".to_string());
            values.push(status.as_str().to_string());
        }
        if let Some(platform) = filter.platform.as_deref().filter(|p| !p.is_empty()) {
            conditions.push("li.platform = ?".to_string());
            values.push(platform.to_string());
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
            conditions.push(contains_text("g.title"));
            values.push(search.to_string());
        }

        let query = format!(
            "SELECT {}, g.title, g.slug, g.cover_image, g.release_date
             FROM library_items li
             JOIN games g ON g.id = li.game_id
             WHERE {}
             ORDER BY {} {}, li.id {}",
            ITEM_COLUMNS,
            conditions.join(" AND "),
            filter.sort_by.column(),
            filter.sort_order.sql(),
            filter.sort_order.sql(),
        );

        let mut stmt = self.conn().prepare(&query)?;
        let items = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                Ok(LibraryItemWithGame {
                    item: row_to_library_item(row)?,
                    game_title: row.get(10)?,
                    game_slug: row.get(11)?,
                    game_cover_image: row.get(12)?,
                    game_release_date: row.get(13)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if !filter.distinct_by_game {
            return Ok(items);
        }

        // Newest item per game, then keep the requested ordering
        let mut newest: HashMap<&str, (DateTime<Utc>, i64)> = HashMap::new();
        for entry in &items {
            let key = (entry.item.created_at, entry.item.id);
            newest
                .entry(entry.item.game_id.as_str())
                .and_modify(|best| {
                    if key > *best {
                        *best = key;
                    }
                })
                .or_insert(key);
        }
        let keep: HashSet<i64> = newest.values().map(|(_, id)| *id).collect();
        Ok(items
            .iter()
            .filter(|entry| keep.contains(&entry.item.id))
            .cloned()
            .collect())
    }

    /// Per-status counts and the most recently touched PLAYING games.
    pub fn get_library_stats(&self, user_id: &str) -> Result<LibraryStats> {
        let mut stmt = self.conn().prepare(
            "SELECT status, COUNT(*) FROM library_items WHERE user_id = ?1 GROUP BY status",
        )?;
        let status_counts = stmt
            .query_map(params![user_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;

        let mut stmt = self.conn().prepare(
            "SELECT g.id, g.title, g.cover_image, li.updated_at
             FROM library_items li JOIN games g ON g.id = li.game_id
             WHERE li.user_id = ?1 AND li.status = ?2
             ORDER BY li.updated_at DESC, li.id DESC
             LIMIT ?3",
        )?;
        let recent_games = stmt
            .query_map(
                params![user_id, LibraryItemStatus::Playing, RECENT_GAMES_LIMIT],
                |row| {
                    Ok(RecentGame {
                        game_id: row.get(0)?,
                        title: row.get(1)?,
                        cover_image: row.get(2)?,
                        last_played: row.get(3)?,
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(LibraryStats {
            status_counts,
            recent_games,
        })
    }

    /// Count the user's items, optionally restricted to one status.
    pub fn count_library_items(
        &self,
        user_id: &str,
        status: Option<LibraryItemStatus>,
    ) -> Result<i64> {
        let count = match status {
            Some(status) => self.conn().query_row(
                "SELECT COUNT(*) FROM library_items WHERE user_id = ?1 AND status = ?2",
                params![user_id, status],
                |row| row.get(0),
            )?,
            None => self.conn().query_row(
                "SELECT COUNT(*) FROM library_items WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )?,
        };
        Ok(count)
    }
}

fn row_to_library_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<LibraryItem> {
    Ok(LibraryItem {
        id: row.get(0)?,
        user_id: row.get(1)?,
        game_id: row.get(2)?,
        status: row.get(3)?,
        acquisition_type: row.get(4)?,
        platform: row.get(5)?,
        started_at: row.get(6)?,
        completed_at: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::game::tests::insert_game;
    use chrono::Duration;

    fn make_item(user_id: &str, game_id: &str, status: LibraryItemStatus) -> NewLibraryItem {
        NewLibraryItem {
            user_id: user_id.to_string(),
            game_id: game_id.to_string(),
            status,
            acquisition_type: AcquisitionType::Digital,
            platform: Some("PC (Microsoft Windows)".to_string()),
            started_at: None,
            completed_at: None,
        }
    }

    /// Backdate an item so ordering by creation time is deterministic.
    fn set_created_at(db: &Database, item_id: i64, at: DateTime<Utc>) {
        db.conn()
            .execute(
                "UPDATE library_items SET created_at = ?1 WHERE id = ?2",
                params![at, item_id],
            )
            .unwrap();
    }

    #[test]
    fn test_create_and_find_item() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("a@example.com", None).unwrap();
        let game = insert_game(&db, 1, "celeste", "Celeste");

        let item = db
            .create_library_item(&make_item(&user.id, &game.id, LibraryItemStatus::Owned))
            .unwrap();
        assert!(item.id > 0);
        assert_eq!(item.status, LibraryItemStatus::Owned);
        assert_eq!(item.acquisition_type, AcquisitionType::Digital);

        let found = db.find_library_item_by_id(item.id, &user.id).unwrap();
        assert_eq!(found, Some(item));
    }

    #[test]
    fn test_items_are_scoped_to_owner() {
        let db = Database::in_memory().unwrap();
        let owner = db.create_user("owner@example.com", None).unwrap();
        let other = db.create_user("other@example.com", None).unwrap();
        let game = insert_game(&db, 1, "celeste", "Celeste");
        let item = db
            .create_library_item(&make_item(&owner.id, &game.id, LibraryItemStatus::Owned))
            .unwrap();

        assert!(db.find_library_item_by_id(item.id, &other.id).unwrap().is_none());

        let err = db
            .update_library_item(
                item.id,
                &other.id,
                &LibraryItemUpdate {
                    status: Some(LibraryItemStatus::Played),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, SavepointError::NotFound(_)));

        let err = db.delete_library_item(item.id, &other.id).unwrap_err();
        assert!(matches!(err, SavepointError::NotFound(_)));
        assert!(db.find_library_item_by_id(item.id, &owner.id).unwrap().is_some());
    }

    #[test]
    fn test_update_changes_only_given_fields() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("a@example.com", None).unwrap();
        let game = insert_game(&db, 1, "celeste", "Celeste");
        let item = db
            .create_library_item(&make_item(&user.id, &game.id, LibraryItemStatus::WantToPlay))
            .unwrap();

        let started = Utc::now() - Duration::days(2);
        let updated = db
            .update_library_item(
                item.id,
                &user.id,
                &LibraryItemUpdate {
                    status: Some(LibraryItemStatus::Playing),
                    started_at: Some(Some(started)),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.status, LibraryItemStatus::Playing);
        assert_eq!(updated.started_at, Some(started));
        assert_eq!(updated.platform, item.platform);
        assert!(updated.updated_at >= item.updated_at);
    }

    #[test]
    fn test_update_clears_nullable_fields() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("a@example.com", None).unwrap();
        let game = insert_game(&db, 1, "celeste", "Celeste");
        let mut new_item = make_item(&user.id, &game.id, LibraryItemStatus::Played);
        new_item.started_at = Some(Utc::now() - Duration::days(10));
        new_item.completed_at = Some(Utc::now() - Duration::days(1));
        let item = db.create_library_item(&new_item).unwrap();

        let cleared = db
            .update_library_item(
                item.id,
                &user.id,
                &LibraryItemUpdate {
                    platform: Some(None),
                    completed_at: Some(None),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(cleared.platform, None);
        assert_eq!(cleared.completed_at, None);
        assert_eq!(cleared.started_at, item.started_at);
        assert_eq!(cleared.status, LibraryItemStatus::Played);
    }

    #[test]
    fn test_delete_item() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("a@example.com", None).unwrap();
        let game = insert_game(&db, 1, "celeste", "Celeste");
        let item = db
            .create_library_item(&make_item(&user.id, &game.id, LibraryItemStatus::Owned))
            .unwrap();

        assert_eq!(db.delete_library_item(item.id, &user.id).unwrap(), item.id);
        assert_eq!(db.count_library_items(&user.id, None).unwrap(), 0);
    }

    #[test]
    fn test_items_by_game_ordering() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("a@example.com", None).unwrap();
        let game = insert_game(&db, 1, "celeste", "Celeste");
        let older = db
            .create_library_item(&make_item(&user.id, &game.id, LibraryItemStatus::Played))
            .unwrap();
        let newer = db
            .create_library_item(&make_item(&user.id, &game.id, LibraryItemStatus::Playing))
            .unwrap();
        set_created_at(&db, older.id, Utc::now() - Duration::days(30));

        let all = db.find_all_library_items_by_game_id(&user.id, &game.id).unwrap();
        assert_eq!(all.iter().map(|i| i.id).collect::<Vec<_>>(), vec![older.id, newer.id]);

        let recent = db
            .find_most_recent_library_item_by_game_id(&user.id, &game.id)
            .unwrap()
            .unwrap();
        assert_eq!(recent.id, newer.id);
    }

    #[test]
    fn test_filters_status_and_search() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("a@example.com", None).unwrap();
        let celeste = insert_game(&db, 1, "celeste", "Celeste");
        let hades = insert_game(&db, 2, "hades", "Hades");
        db.create_library_item(&make_item(&user.id, &celeste.id, LibraryItemStatus::Played))
            .unwrap();
        db.create_library_item(&make_item(&user.id, &hades.id, LibraryItemStatus::Playing))
            .unwrap();

        let playing = db
            .find_library_items_with_filters(
                &user.id,
                &LibraryFilter {
                    status: Some(LibraryItemStatus::Playing),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(playing.len(), 1);
        assert_eq!(playing[0].game_slug, "hades");

        let searched = db
            .find_library_items_with_filters(
                &user.id,
                &LibraryFilter {
                    search: Some("CELE".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(searched.len(), 1);
        assert_eq!(searched[0].game_title, "Celeste");
    }

    #[test]
    fn test_search_is_literal_and_unicode_case_insensitive() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("a@example.com", None).unwrap();
        for (igdb_id, slug, title) in [
            (1, "portal-2", "Portal 2"),
            (2, "100-orange-juice", "100% Orange Juice"),
            (3, "pokemon-red", "POKÉMON Red"),
        ] {
            let game = insert_game(&db, igdb_id, slug, title);
            db.create_library_item(&make_item(&user.id, &game.id, LibraryItemStatus::Owned))
                .unwrap();
        }
        let titles = |search: &str| -> Vec<String> {
            db.find_library_items_with_filters(
                &user.id,
                &LibraryFilter {
                    search: Some(search.to_string()),
                    ..Default::default()
                },
            )
            .unwrap()
            .into_iter()
            .map(|entry| entry.game_title)
            .collect()
        };

        assert_eq!(titles("%"), vec!["100% Orange Juice"]);
        assert!(titles("Portal_2").is_empty());
        assert_eq!(titles("pokémon"), vec!["POKÉMON Red"]);
    }

    #[test]
    fn test_filters_sort_and_distinct() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("a@example.com", None).unwrap();
        let celeste = insert_game(&db, 1, "celeste", "Celeste");
        let hades = insert_game(&db, 2, "hades", "Hades");

        let first = db
            .create_library_item(&make_item(&user.id, &celeste.id, LibraryItemStatus::Played))
            .unwrap();
        let second = db
            .create_library_item(&make_item(&user.id, &hades.id, LibraryItemStatus::Owned))
            .unwrap();
        let third = db
            .create_library_item(&make_item(&user.id, &celeste.id, LibraryItemStatus::Playing))
            .unwrap();
        let now = Utc::now();
        set_created_at(&db, first.id, now - Duration::days(3));
        set_created_at(&db, second.id, now - Duration::days(2));
        set_created_at(&db, third.id, now - Duration::days(1));

        let asc = db
            .find_library_items_with_filters(
                &user.id,
                &LibraryFilter {
                    sort_order: SortOrder::Asc,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(
            asc.iter().map(|i| i.item.id).collect::<Vec<_>>(),
            vec![first.id, second.id, third.id]
        );

        let distinct = db
            .find_library_items_with_filters(
                &user.id,
                &LibraryFilter {
                    distinct_by_game: true,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(
            distinct.iter().map(|i| i.item.id).collect::<Vec<_>>(),
            vec![third.id, second.id]
        );
    }

    #[test]
    fn test_library_stats() {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("a@example.com", None).unwrap();
        let celeste = insert_game(&db, 1, "celeste", "Celeste");
        let hades = insert_game(&db, 2, "hades", "Hades");
        db.create_library_item(&make_item(&user.id, &celeste.id, LibraryItemStatus::Playing))
            .unwrap();
        db.create_library_item(&make_item(&user.id, &hades.id, LibraryItemStatus::Playing))
            .unwrap();
        db.create_library_item(&make_item(&user.id, &hades.id, LibraryItemStatus::Played))
            .unwrap();

        let stats = db.get_library_stats(&user.id).unwrap();
        assert_eq!(stats.status_counts.get("PLAYING"), Some(&2));
        assert_eq!(stats.status_counts.get("PLAYED"), Some(&1));
        assert_eq!(stats.status_counts.get("OWNED"), None);
        assert_eq!(stats.recent_games.len(), 2);

        assert_eq!(
            db.count_library_items(&user.id, Some(LibraryItemStatus::Playing))
                .unwrap(),
            2
        );
        assert_eq!(db.count_library_items(&user.id, None).unwrap(), 3);
    }

    #[test]
    fn test_sort_field_parsing() {
        assert_eq!(
            "release-date".parse::<LibrarySortField>().unwrap(),
            LibrarySortField::ReleaseDate
        );
        assert_eq!("ASC".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert!("sideways".parse::<SortOrder>().is_err());
    }
}
