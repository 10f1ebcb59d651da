//! Games imported from a storefront, waiting to be matched and curated.

use chrono::{DateTime, Duration, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::db::contains_text;
use crate::{
    new_id, Database, IgdbMatchStatus, ImportedGame, Result, SavepointError, Storefront,
};

const IMPORTED_COLUMNS: &str = "id, user_id, name, storefront, storefront_game_id, playtime, playtime_windows, playtime_mac, playtime_linux, last_played_at, img_icon_url, img_logo_url, igdb_match_status, created_at, updated_at, deleted_at";

pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Declares a snake_case query option with an `All` default.
macro_rules! query_option {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            #[default]
            #[serde(rename = "all")]
            All,
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $name::All => "all",
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = SavepointError;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
                    "all" => Ok($name::All),
                    $($text => Ok($name::$variant),)+
                    _ => Err(SavepointError::Validation(format!(
                        "Invalid {}: {}",
                        stringify!($name),
                        s
                    ))),
                }
            }
        }
    };
}

query_option! {
    PlaytimeStatus {
        Played => "played",
        NeverPlayed => "never_played",
    }
}

query_option! {
    /// Playtime buckets in minutes. Takes precedence over [`PlaytimeStatus`].
    PlaytimeRange {
        Under1h => "under_1h",
        OneTo10h => "1_to_10h",
        TenTo50h => "10_to_50h",
        Over50h => "over_50h",
    }
}

query_option! {
    /// Games with playtime recorded on a given OS.
    PlatformFilter {
        Windows => "windows",
        Mac => "mac",
        Linux => "linux",
    }
}

query_option! {
    LastPlayedFilter {
        Last30Days => "30_days",
        LastYear => "1_year",
        OverAYear => "over_1_year",
        Never => "never",
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportedGameSort {
    NameAsc,
    NameDesc,
    PlaytimeDesc,
    PlaytimeAsc,
    LastPlayedDesc,
    LastPlayedAsc,
    #[default]
    AddedDesc,
}

impl ImportedGameSort {
    fn order_by(&self) -> &'static str {
        match self {
            ImportedGameSort::NameAsc => "name COLLATE NOCASE ASC",
            ImportedGameSort::NameDesc => "name COLLATE NOCASE DESC",
            ImportedGameSort::PlaytimeDesc => "playtime DESC",
            ImportedGameSort::PlaytimeAsc => "playtime ASC",
            // Never-played games always sort last
            ImportedGameSort::LastPlayedDesc => "last_played_at IS NULL, last_played_at DESC",
            ImportedGameSort::LastPlayedAsc => "last_played_at IS NULL, last_played_at ASC",
            ImportedGameSort::AddedDesc => "created_at DESC",
        }
    }
}

impl std::str::FromStr for ImportedGameSort {
    type Err = SavepointError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "name_asc" => Ok(ImportedGameSort::NameAsc),
            "name_desc" => Ok(ImportedGameSort::NameDesc),
            "playtime_desc" => Ok(ImportedGameSort::PlaytimeDesc),
            "playtime_asc" => Ok(ImportedGameSort::PlaytimeAsc),
            "last_played_desc" => Ok(ImportedGameSort::LastPlayedDesc),
            "last_played_asc" => Ok(ImportedGameSort::LastPlayedAsc),
            "added_desc" => Ok(ImportedGameSort::AddedDesc),
            _ => Err(SavepointError::Validation(format!("Invalid sort: {}", s))),
        }
    }
}

/// Options for [`Database::find_imported_games_by_user_id`].
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedGameQuery {
    pub search: Option<String>,
    /// 1-based; values below 1 are treated as 1
    pub page: u32,
    /// Clamped to `1..=MAX_PAGE_SIZE`
    pub limit: u32,
    pub playtime_status: PlaytimeStatus,
    pub playtime_range: PlaytimeRange,
    pub platform: PlatformFilter,
    pub last_played: LastPlayedFilter,
    pub sort_by: ImportedGameSort,
}

impl Default for ImportedGameQuery {
    fn default() -> Self {
        Self {
            search: None,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            playtime_status: PlaytimeStatus::All,
            playtime_range: PlaytimeRange::All,
            platform: PlatformFilter::All,
            last_played: LastPlayedFilter::All,
            sort_by: ImportedGameSort::AddedDesc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedImportedGames {
    pub items: Vec<ImportedGame>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: i64,
}

/// A storefront game to insert or refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct NewImportedGame {
    pub name: String,
    pub storefront: Storefront,
    pub storefront_game_id: Option<String>,
    pub playtime: i64,
    pub playtime_windows: i64,
    pub playtime_mac: i64,
    pub playtime_linux: i64,
    pub last_played_at: Option<DateTime<Utc>>,
    pub img_icon_url: Option<String>,
    pub img_logo_url: Option<String>,
    /// Only used for new rows; defaults to PENDING
    pub igdb_match_status: Option<IgdbMatchStatus>,
}

impl Database {
    /// Insert new storefront games and refresh existing ones in a single
    /// transaction. A row matches when user, storefront and storefront id
    /// agree and it has not been dismissed. Returns how many games were
    /// written.
    pub fn upsert_many_imported_games(
        &self,
        user_id: &str,
        games: &[NewImportedGame],
    ) -> Result<usize> {
        let tx = self.conn().unchecked_transaction()?;
        let now = Utc::now();
        let mut written = 0;

        {
            let mut find = tx.prepare_cached(
                "SELECT id FROM imported_games
                 WHERE user_id = ?1 AND storefront = ?2 AND storefront_game_id IS ?3
                   AND deleted_at IS NULL
                 LIMIT 1",
            )?;
            let mut update = tx.prepare_cached(
                "UPDATE imported_games SET
                    name = ?2, playtime = ?3, playtime_windows = ?4, playtime_mac = ?5,
                    playtime_linux = ?6, last_played_at = ?7, img_icon_url = ?8,
                    img_logo_url = ?9, updated_at = ?10
                 WHERE id = ?1",
            )?;
            let mut insert = tx.prepare_cached(
                "INSERT INTO imported_games (id, user_id, name, storefront, storefront_game_id,
                    playtime, playtime_windows, playtime_mac, playtime_linux, last_played_at,
                    img_icon_url, img_logo_url, igdb_match_status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)",
            )?;

            for game in games {
                let existing: Option<String> = find
                    .query_row(
                        params![user_id, game.storefront, game.storefront_game_id],
                        |row| row.get(0),
                    )
                    .optional()?;

                match existing {
                    Some(id) => {
                        update.execute(params![
                            id,
                            game.name,
                            game.playtime,
                            game.playtime_windows,
                            game.playtime_mac,
                            game.playtime_linux,
                            game.last_played_at,
                            game.img_icon_url,
                            game.img_logo_url,
                            now,
                        ])?;
                    }
                    None => {
                        insert.execute(params![
                            new_id(),
                            user_id,
                            game.name,
                            game.storefront,
                            game.storefront_game_id,
                            game.playtime,
                            game.playtime_windows,
                            game.playtime_mac,
                            game.playtime_linux,
                            game.last_played_at,
                            game.img_icon_url,
                            game.img_logo_url,
                            game.igdb_match_status.unwrap_or(IgdbMatchStatus::Pending),
                            now,
                        ])?;
                    }
                }
                written += 1;
            }
        }

        tx.commit()?;
        tracing::debug!(user_id, written, "Upserted imported games");
        Ok(written)
    }

    /// Find a non-dismissed imported game owned by `user_id`.
    pub fn find_imported_game_by_id(
        &self,
        imported_game_id: &str,
        user_id: &str,
    ) -> Result<Option<ImportedGame>> {
        let query = format!(
            "SELECT {} FROM imported_games WHERE id = ?1 AND user_id = ?2 AND deleted_at IS NULL",
            IMPORTED_COLUMNS
        );
        let game = self
            .conn()
            .query_row(&query, params![imported_game_id, user_id], row_to_imported_game)
            .optional()?;
        Ok(game)
    }

    /// Page through a user's non-dismissed imported games.
    pub fn find_imported_games_by_user_id(
        &self,
        user_id: &str,
        options: &ImportedGameQuery,
    ) -> Result<PaginatedImportedGames> {
        let limit = options.limit.clamp(1, MAX_PAGE_SIZE);
        let page = options.page.max(1);
        let offset = i64::from(page - 1) * i64::from(limit);

        let mut conditions = vec!["user_id = ?".to_string(), "deleted_at IS NULL".to_string()];
        let mut values: Vec<Value> = vec![Value::Text(user_id.to_string())];

        if let Some(search) = options.search.as_deref().filter(|s| !s.is_empty()) {
            conditions.push(contains_text("name"));
            values.push(Value::Text(search.to_string()));
        }

        if options.playtime_range != PlaytimeRange::All {
            if options.playtime_status != PlaytimeStatus::All {
                tracing::warn!(
                    playtime_status = options.playtime_status.as_str(),
                    playtime_range = options.playtime_range.as_str(),
                    "Both playtime status and range filters given, using range"
                );
            }
            let clause = match options.playtime_range {
                PlaytimeRange::Under1h => "playtime < 60",
                PlaytimeRange::OneTo10h => "playtime >= 60 AND playtime < 600",
                PlaytimeRange::TenTo50h => "playtime >= 600 AND playtime < 3000",
                PlaytimeRange::Over50h | PlaytimeRange::All => "playtime >= 3000",
            };
            conditions.push(clause.to_string());
        } else {
            match options.playtime_status {
                PlaytimeStatus::Played => conditions.push("playtime > 0".to_string()),
                PlaytimeStatus::NeverPlayed => conditions.push("playtime = 0".to_string()),
                PlaytimeStatus::All => {}
            }
        }

        match options.platform {
            PlatformFilter::Windows => conditions.push("playtime_windows > 0".to_string()),
            PlatformFilter::Mac => conditions.push("playtime_mac > 0".to_string()),
            PlatformFilter::Linux => conditions.push("playtime_linux > 0".to_string()),
            PlatformFilter::All => {}
        }

        let now = Utc::now();
        match options.last_played {
            LastPlayedFilter::Last30Days => {
                conditions.push("last_played_at >= ?".to_string());
                values.push(sql_time(now - Duration::days(30)));
            }
            LastPlayedFilter::LastYear => {
                conditions.push("last_played_at >= ?".to_string());
                values.push(sql_time(now - Duration::days(365)));
            }
            LastPlayedFilter::OverAYear => {
                conditions.push("last_played_at < ?".to_string());
                values.push(sql_time(now - Duration::days(365)));
            }
            LastPlayedFilter::Never => conditions.push("last_played_at IS NULL".to_string()),
            LastPlayedFilter::All => {}
        }

        let where_clause = conditions.join(" AND ");

        let total: i64 = self.conn().query_row(
            &format!("SELECT COUNT(*) FROM imported_games WHERE {}", where_clause),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        let query = format!(
            "SELECT {} FROM imported_games WHERE {} ORDER BY {}, id LIMIT {} OFFSET {}",
            IMPORTED_COLUMNS,
            where_clause,
            options.sort_by.order_by(),
            limit,
            offset
        );
        let mut stmt = self.conn().prepare(&query)?;
        let items = stmt
            .query_map(params_from_iter(values.iter()), row_to_imported_game)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let limit_i64 = i64::from(limit);
        Ok(PaginatedImportedGames {
            items,
            total,
            page,
            limit,
            total_pages: (total + limit_i64 - 1) / limit_i64,
        })
    }

    pub fn count_imported_games_by_user_id(&self, user_id: &str) -> Result<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM imported_games WHERE user_id = ?1 AND deleted_at IS NULL",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Set the IGDB match status of an imported game owned by `user_id`.
    pub fn update_imported_game_match_status(
        &self,
        imported_game_id: &str,
        user_id: &str,
        status: IgdbMatchStatus,
    ) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE imported_games SET igdb_match_status = ?3, updated_at = ?4
             WHERE id = ?1 AND user_id = ?2",
            params![imported_game_id, user_id, status, Utc::now()],
        )?;
        if changed == 0 {
            return Err(SavepointError::NotFound("Imported game".to_string()));
        }
        Ok(())
    }

    /// Dismiss an imported game owned by `user_id`. Dismissed games are
    /// hidden from every query and a later sync creates a fresh row.
    pub fn soft_delete_imported_game(&self, imported_game_id: &str, user_id: &str) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE imported_games SET deleted_at = ?3, updated_at = ?3
             WHERE id = ?1 AND user_id = ?2 AND deleted_at IS NULL",
            params![imported_game_id, user_id, Utc::now()],
        )?;
        if changed == 0 {
            return Err(SavepointError::NotFound("Imported game".to_string()));
        }
        Ok(())
    }
}

/// Encode a timestamp the same way rusqlite stores `DateTime<Utc>` so text
/// comparisons order correctly.
fn sql_time(at: DateTime<Utc>) -> Value {
    Value::Text(at.format("%F %T%.f%:z").to_string())
}

fn row_to_imported_game(row: &rusqlite::Row<'_>) -> rusqlite::Result<ImportedGame> {
    Ok(ImportedGame {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        storefront: row.get(3)?,
        storefront_game_id: row.get(4)?,
        playtime: row.get(5)?,
        playtime_windows: row.get(6)?,
        playtime_mac: row.get(7)?,
        playtime_linux: row.get(8)?,
        last_played_at: row.get(9)?,
        img_icon_url: row.get(10)?,
        img_logo_url: row.get(11)?,
        igdb_match_status: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
        deleted_at: row.get(15)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn steam_game(app_id: &str, name: &str, playtime: i64) -> NewImportedGame {
        NewImportedGame {
            name: name.to_string(),
            storefront: Storefront::Steam,
            storefront_game_id: Some(app_id.to_string()),
            playtime,
            playtime_windows: playtime,
            playtime_mac: 0,
            playtime_linux: 0,
            last_played_at: None,
            img_icon_url: None,
            img_logo_url: None,
            igdb_match_status: None,
        }
    }

    fn setup() -> (Database, String) {
        let db = Database::in_memory().unwrap();
        let user = db.create_user("a@example.com", None).unwrap();
        (db, user.id)
    }

    fn query() -> ImportedGameQuery {
        ImportedGameQuery::default()
    }

    fn names(page: &PaginatedImportedGames) -> Vec<&str> {
        page.items.iter().map(|g| g.name.as_str()).collect()
    }

    #[test]
    fn test_upsert_inserts_then_updates() {
        let (db, user) = setup();
        assert_eq!(
            db.upsert_many_imported_games(&user, &[steam_game("570", "Dota 2", 10)])
                .unwrap(),
            1
        );
        db.upsert_many_imported_games(&user, &[steam_game("570", "Dota 2", 120)])
            .unwrap();

        let page = db.find_imported_games_by_user_id(&user, &query()).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].playtime, 120);
        assert_eq!(page.items[0].igdb_match_status, IgdbMatchStatus::Pending);
    }

    #[test]
    fn test_upsert_does_not_reset_match_status() {
        let (db, user) = setup();
        db.upsert_many_imported_games(&user, &[steam_game("570", "Dota 2", 10)])
            .unwrap();
        let id = db.find_imported_games_by_user_id(&user, &query()).unwrap().items[0]
            .id
            .clone();
        db.update_imported_game_match_status(&id, &user, IgdbMatchStatus::Matched)
            .unwrap();

        db.upsert_many_imported_games(&user, &[steam_game("570", "Dota 2", 20)])
            .unwrap();
        let game = db.find_imported_game_by_id(&id, &user).unwrap().unwrap();
        assert_eq!(game.igdb_match_status, IgdbMatchStatus::Matched);
        assert_eq!(game.playtime, 20);
    }

    #[test]
    fn test_dismissed_game_is_hidden_and_recreated_on_sync() {
        let (db, user) = setup();
        db.upsert_many_imported_games(&user, &[steam_game("570", "Dota 2", 10)])
            .unwrap();
        let id = db.find_imported_games_by_user_id(&user, &query()).unwrap().items[0]
            .id
            .clone();

        db.soft_delete_imported_game(&id, &user).unwrap();
        assert!(db.find_imported_game_by_id(&id, &user).unwrap().is_none());
        assert_eq!(db.count_imported_games_by_user_id(&user).unwrap(), 0);

        let err = db.soft_delete_imported_game(&id, &user).unwrap_err();
        assert!(matches!(err, SavepointError::NotFound(_)));

        db.upsert_many_imported_games(&user, &[steam_game("570", "Dota 2", 10)])
            .unwrap();
        assert_eq!(db.count_imported_games_by_user_id(&user).unwrap(), 1);
    }

    #[test]
    fn test_imported_games_are_scoped_to_user() {
        let (db, user) = setup();
        let other = db.create_user("b@example.com", None).unwrap().id;
        db.upsert_many_imported_games(&user, &[steam_game("570", "Dota 2", 10)])
            .unwrap();
        let id = db.find_imported_games_by_user_id(&user, &query()).unwrap().items[0]
            .id
            .clone();

        assert!(db.find_imported_game_by_id(&id, &other).unwrap().is_none());
        assert!(db.soft_delete_imported_game(&id, &other).is_err());

        let err = db
            .update_imported_game_match_status(&id, &other, IgdbMatchStatus::Ignored)
            .unwrap_err();
        assert!(matches!(err, SavepointError::NotFound(_)));
        let game = db.find_imported_game_by_id(&id, &user).unwrap().unwrap();
        assert_eq!(game.igdb_match_status, IgdbMatchStatus::Pending);
        assert_eq!(
            db.find_imported_games_by_user_id(&other, &query()).unwrap().total,
            0
        );
    }

    #[test]
    fn test_pagination_clamps_page_and_limit() {
        let (db, user) = setup();
        let games: Vec<_> = (0..30)
            .map(|i| steam_game(&i.to_string(), &format!("Game {:02}", i), i))
            .collect();
        db.upsert_many_imported_games(&user, &games).unwrap();

        let page = db
            .find_imported_games_by_user_id(
                &user,
                &ImportedGameQuery {
                    page: 0,
                    limit: 0,
                    ..query()
                },
            )
            .unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, 1);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total_pages, 30);

        let page = db
            .find_imported_games_by_user_id(
                &user,
                &ImportedGameQuery {
                    page: 2,
                    limit: 500,
                    ..query()
                },
            )
            .unwrap();
        assert_eq!(page.limit, 100);
        assert!(page.items.is_empty());
        assert_eq!(page.total, 30);
        assert_eq!(page.total_pages, 1);

        let page = db
            .find_imported_games_by_user_id(
                &user,
                &ImportedGameQuery {
                    page: 2,
                    limit: 25,
                    sort_by: ImportedGameSort::NameAsc,
                    ..query()
                },
            )
            .unwrap();
        assert_eq!(page.items.len(), 5);
        assert_eq!(page.items[0].name, "Game 25");
        assert_eq!(page.total_pages, 2);
    }

    #[test]
    fn test_playtime_filters() {
        let (db, user) = setup();
        db.upsert_many_imported_games(
            &user,
            &[
                steam_game("1", "Never", 0),
                steam_game("2", "Short", 30),
                steam_game("3", "Medium", 300),
                steam_game("4", "Long", 1200),
                steam_game("5", "Epic", 6000),
            ],
        )
        .unwrap();

        let played = db
            .find_imported_games_by_user_id(
                &user,
                &ImportedGameQuery {
                    playtime_status: PlaytimeStatus::Played,
                    ..query()
                },
            )
            .unwrap();
        assert_eq!(played.total, 4);

        let never = db
            .find_imported_games_by_user_id(
                &user,
                &ImportedGameQuery {
                    playtime_status: PlaytimeStatus::NeverPlayed,
                    ..query()
                },
            )
            .unwrap();
        assert_eq!(names(&never), vec!["Never"]);

        let range = db
            .find_imported_games_by_user_id(
                &user,
                &ImportedGameQuery {
                    playtime_range: PlaytimeRange::TenTo50h,
                    ..query()
                },
            )
            .unwrap();
        assert_eq!(names(&range), vec!["Long"]);

        // Range wins over status
        let both = db
            .find_imported_games_by_user_id(
                &user,
                &ImportedGameQuery {
                    playtime_status: PlaytimeStatus::NeverPlayed,
                    playtime_range: PlaytimeRange::Over50h,
                    ..query()
                },
            )
            .unwrap();
        assert_eq!(names(&both), vec!["Epic"]);

        let under = db
            .find_imported_games_by_user_id(
                &user,
                &ImportedGameQuery {
                    playtime_range: PlaytimeRange::Under1h,
                    sort_by: ImportedGameSort::PlaytimeAsc,
                    ..query()
                },
            )
            .unwrap();
        assert_eq!(names(&under), vec!["Never", "Short"]);
    }

    #[test]
    fn test_platform_and_search_filters() {
        let (db, user) = setup();
        let mut linux = steam_game("1", "Portal 2", 100);
        linux.playtime_linux = 40;
        db.upsert_many_imported_games(&user, &[linux, steam_game("2", "Half-Life", 50)])
            .unwrap();

        let page = db
            .find_imported_games_by_user_id(
                &user,
                &ImportedGameQuery {
                    platform: PlatformFilter::Linux,
                    ..query()
                },
            )
            .unwrap();
        assert_eq!(names(&page), vec!["Portal 2"]);

        let page = db
            .find_imported_games_by_user_id(
                &user,
                &ImportedGameQuery {
                    search: Some("half".to_string()),
                    ..query()
                },
            )
            .unwrap();
        assert_eq!(names(&page), vec!["Half-Life"]);
    }

    #[test]
    fn test_search_is_literal_and_unicode_case_insensitive() {
        let (db, user) = setup();
        db.upsert_many_imported_games(
            &user,
            &[
                steam_game("1", "Portal 2", 10),
                steam_game("2", "100% Orange Juice", 10),
                steam_game("3", "POKÉMON Snap", 10),
            ],
        )
        .unwrap();
        let search = |text: &str| {
            let page = db
                .find_imported_games_by_user_id(
                    &user,
                    &ImportedGameQuery {
                        search: Some(text.to_string()),
                        ..query()
                    },
                )
                .unwrap();
            (page.total, page.items.into_iter().map(|g| g.name).collect::<Vec<_>>())
        };

        assert_eq!(search("%"), (1, vec!["100% Orange Juice".to_string()]));
        assert_eq!(search("Portal_2"), (0, vec![]));
        assert_eq!(search("pokémon"), (1, vec!["POKÉMON Snap".to_string()]));
    }

    #[test]
    fn test_name_sort_ignores_case() {
        let (db, user) = setup();
        db.upsert_many_imported_games(
            &user,
            &[
                steam_game("1", "celeste", 10),
                steam_game("2", "Baldur's Gate 3", 10),
                steam_game("3", "apex legends", 10),
            ],
        )
        .unwrap();
        let sorted = |sort_by: ImportedGameSort| {
            let page = db
                .find_imported_games_by_user_id(&user, &ImportedGameQuery { sort_by, ..query() })
                .unwrap();
            page.items.into_iter().map(|g| g.name).collect::<Vec<_>>()
        };

        assert_eq!(
            sorted(ImportedGameSort::NameAsc),
            vec!["apex legends", "Baldur's Gate 3", "celeste"]
        );
        assert_eq!(
            sorted(ImportedGameSort::NameDesc),
            vec!["celeste", "Baldur's Gate 3", "apex legends"]
        );
    }

    #[test]
    fn test_last_played_filters_and_sort() {
        let (db, user) = setup();
        let now = Utc::now();
        let mut recent = steam_game("1", "Recent", 10);
        recent.last_played_at = Some(now - Duration::days(2));
        let mut months = steam_game("2", "Months", 10);
        months.last_played_at = Some(now - Duration::days(100));
        let mut ancient = steam_game("3", "Ancient", 10);
        ancient.last_played_at = Some(now - Duration::days(800));
        let never = steam_game("4", "Untouched", 0);
        db.upsert_many_imported_games(&user, &[recent, months, ancient, never])
            .unwrap();

        let check = |filter: LastPlayedFilter| {
            let page = db
                .find_imported_games_by_user_id(
                    &user,
                    &ImportedGameQuery {
                        last_played: filter,
                        sort_by: ImportedGameSort::LastPlayedDesc,
                        ..query()
                    },
                )
                .unwrap();
            page.items.into_iter().map(|g| g.name).collect::<Vec<_>>()
        };

        assert_eq!(check(LastPlayedFilter::Last30Days), vec!["Recent"]);
        assert_eq!(check(LastPlayedFilter::LastYear), vec!["Recent", "Months"]);
        assert_eq!(check(LastPlayedFilter::OverAYear), vec!["Ancient"]);
        assert_eq!(check(LastPlayedFilter::Never), vec!["Untouched"]);
        assert_eq!(
            check(LastPlayedFilter::All),
            vec!["Recent", "Months", "Ancient", "Untouched"]
        );

        let asc = db
            .find_imported_games_by_user_id(
                &user,
                &ImportedGameQuery {
                    sort_by: ImportedGameSort::LastPlayedAsc,
                    ..query()
                },
            )
            .unwrap();
        assert_eq!(names(&asc), vec!["Ancient", "Months", "Recent", "Untouched"]);
    }

    #[test]
    fn test_query_option_parsing() {
        assert_eq!(
            "1_to_10h".parse::<PlaytimeRange>().unwrap(),
            PlaytimeRange::OneTo10h
        );
        assert_eq!(
            "never-played".parse::<PlaytimeStatus>().unwrap(),
            PlaytimeStatus::NeverPlayed
        );
        assert_eq!(
            "30_days".parse::<LastPlayedFilter>().unwrap(),
            LastPlayedFilter::Last30Days
        );
        assert_eq!(
            "playtime_desc".parse::<ImportedGameSort>().unwrap(),
            ImportedGameSort::PlaytimeDesc
        );
        assert!("beos".parse::<PlatformFilter>().is_err());
    }
}
