//! SQLite-based storage for Savepoint.
//!
//! A single database file holds users, the local game catalog (populated
//! from IGDB), library items, journal entries and games imported from
//! storefronts. The repository modules add their queries to [`Database`].
//!
//! # Examples
//!
//! ```
//! use savepoint::Database;
//!
//! let db = Database::in_memory().unwrap();
//! assert_eq!(db.get_schema_version().unwrap(), savepoint::db::SCHEMA_VERSION);
//! ```
//!
//! For persistent storage, use `open_or_create`:
//!
//! ```no_run
//! use savepoint::Database;
//! use std::path::Path;
//!
//! let db = Database::open_or_create(Path::new("savepoint.db")).unwrap();
//! ```

use std::path::Path;

use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection, OptionalExtension};

use crate::{Result, SavepointError};

/// Current schema version. Increment when making breaking changes.
pub const SCHEMA_VERSION: u32 = 2;

/// SQL function that lowercases text with full Unicode case mapping.
const FOLD_FUNCTION: &str = "unicode_lower";

/// SQLite-backed store shared by every repository.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Create a new database at the given path, initializing the schema.
    /// Fails if the database already exists.
    pub fn create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Err(SavepointError::IoError(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("Database already exists: {}", path.display()),
            )));
        }

        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.apply_pragmas()?;
        db.register_functions()?;
        db.init_schema()?;
        Ok(db)
    }

    /// Open an existing database. Fails if it doesn't exist or has incompatible schema.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SavepointError::DatabaseNotFound);
        }

        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.apply_pragmas()?;
        db.register_functions()?;

        let version = db.get_schema_version()?;
        if version < SCHEMA_VERSION {
            db.migrate_schema(version)?;
        } else if version > SCHEMA_VERSION {
            return Err(SavepointError::SchemaTooNew {
                found: version,
                supported: SCHEMA_VERSION,
            });
        }

        Ok(db)
    }

    /// Open an existing database or create a new one.
    pub fn open_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::open(path)
        } else {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            Self::create(path)
        }
    }

    /// Create an in-memory database (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        db.register_functions()?;
        db.init_schema()?;
        Ok(db)
    }

    fn apply_pragmas(&self) -> Result<()> {
        // synchronous=NORMAL is safe with WAL mode
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA temp_store = MEMORY;",
        )?;
        Ok(())
    }

    /// SQLite's own `lower()` and `LIKE` only fold ASCII.
    fn register_functions(&self) -> Result<()> {
        self.conn.create_scalar_function(
            FOLD_FUNCTION,
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                let text: Option<String> = ctx.get(0)?;
                Ok(text.map(|t| t.to_lowercase()))
            },
        )?;
        Ok(())
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA_SQL)?;
        self.set_metadata("schema_version", &SCHEMA_VERSION.to_string())?;
        Ok(())
    }

    /// Migrate database schema from an older version.
    fn migrate_schema(&self, from_version: u32) -> Result<()> {
        // v0: file exists but was never initialized (or predates metadata)
        if from_version < 1 {
            self.init_schema()?;
            tracing::info!("Migrated database schema from v{} to v{}", from_version, SCHEMA_VERSION);
            return Ok(());
        }

        if from_version < 2 {
            let tx = self.conn.unchecked_transaction()?;
            tx.execute_batch("ALTER TABLE users ADD COLUMN onboarding_dismissed_at TEXT;")?;
            tx.execute(
                "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', '2')",
                [],
            )?;
            tx.commit()?;
            tracing::info!("Migrated database schema from v{} to v2", from_version);
        }

        Ok(())
    }

    /// Get the schema version from metadata.
    pub fn get_schema_version(&self) -> Result<u32> {
        let has_metadata: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'metadata')",
            [],
            |row| row.get(0),
        )?;
        if !has_metadata {
            return Ok(0);
        }

        match self.get_metadata("schema_version")? {
            Some(v) => v
                .parse()
                .map_err(|_| SavepointError::Validation("Invalid schema version".to_string())),
            None => Ok(0),
        }
    }

    /// Set a metadata key-value pair.
    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Get a metadata value by key.
    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// WHERE clause fragment: `column` contains the bound text, literally and
/// ignoring case. Bind the search text as is, without wildcards.
pub(crate) fn contains_text(column: &str) -> String {
    format!("instr({f}({}), {f}(?)) > 0", column, f = FOLD_FUNCTION)
}

/// True when the error is a UNIQUE/PRIMARY KEY constraint violation.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

const SCHEMA_SQL: &str = r#"
-- Metadata table for versioning
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    name TEXT,
    username TEXT,
    username_normalized TEXT UNIQUE,
    image TEXT,
    steam_id64 TEXT,
    steam_username TEXT,
    steam_avatar TEXT,
    steam_profile_url TEXT,
    steam_connected_at TEXT,
    profile_setup_completed_at TEXT,
    onboarding_dismissed_at TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_users_steam_id ON users(steam_id64);

CREATE TABLE IF NOT EXISTS games (
    id TEXT PRIMARY KEY,
    igdb_id INTEGER NOT NULL UNIQUE,
    slug TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    description TEXT,
    cover_image TEXT,
    release_date TEXT,
    franchise_id INTEGER,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS genres (
    id TEXT PRIMARY KEY,
    igdb_id INTEGER NOT NULL UNIQUE,
    name TEXT NOT NULL,
    slug TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS platforms (
    id TEXT PRIMARY KEY,
    igdb_id INTEGER NOT NULL UNIQUE,
    name TEXT NOT NULL,
    slug TEXT NOT NULL,
    abbreviation TEXT
);

CREATE TABLE IF NOT EXISTS game_genres (
    game_id TEXT NOT NULL REFERENCES games(id) ON DELETE CASCADE,
    genre_id TEXT NOT NULL REFERENCES genres(id) ON DELETE CASCADE,
    PRIMARY KEY (game_id, genre_id)
);

CREATE TABLE IF NOT EXISTS game_platforms (
    game_id TEXT NOT NULL REFERENCES games(id) ON DELETE CASCADE,
    platform_id TEXT NOT NULL REFERENCES platforms(id) ON DELETE CASCADE,
    PRIMARY KEY (game_id, platform_id)
);

CREATE TABLE IF NOT EXISTS library_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    game_id TEXT NOT NULL REFERENCES games(id) ON DELETE CASCADE,
    status TEXT NOT NULL,
    acquisition_type TEXT NOT NULL,
    platform TEXT,
    started_at TEXT,
    completed_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_library_user_game ON library_items(user_id, game_id);
CREATE INDEX IF NOT EXISTS idx_library_user_status ON library_items(user_id, status);

CREATE TABLE IF NOT EXISTS journal_entries (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    game_id TEXT NOT NULL REFERENCES games(id) ON DELETE CASCADE,
    library_item_id INTEGER REFERENCES library_items(id) ON DELETE SET NULL,
    title TEXT,
    content TEXT NOT NULL,
    mood TEXT,
    play_session INTEGER,
    visibility TEXT NOT NULL,
    published_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_journal_user ON journal_entries(user_id, created_at);
CREATE INDEX IF NOT EXISTS idx_journal_game ON journal_entries(game_id);

CREATE TABLE IF NOT EXISTS imported_games (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    storefront TEXT NOT NULL,
    storefront_game_id TEXT,
    playtime INTEGER NOT NULL DEFAULT 0,
    playtime_windows INTEGER NOT NULL DEFAULT 0,
    playtime_mac INTEGER NOT NULL DEFAULT 0,
    playtime_linux INTEGER NOT NULL DEFAULT 0,
    last_played_at TEXT,
    img_icon_url TEXT,
    img_logo_url TEXT,
    igdb_match_status TEXT NOT NULL DEFAULT 'PENDING',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_imported_user_store
    ON imported_games(user_id, storefront, storefront_game_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_in_memory_database() {
        let db = Database::in_memory().unwrap();
        assert_eq!(db.get_schema_version().unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_metadata_round_trip() {
        let db = Database::in_memory().unwrap();
        db.set_metadata("last_sync", "yesterday").unwrap();
        assert_eq!(
            db.get_metadata("last_sync").unwrap(),
            Some("yesterday".to_string())
        );
        assert_eq!(db.get_metadata("missing").unwrap(), None);
    }

    #[test]
    fn test_open_missing_database_fails() {
        let temp = TempDir::new().unwrap();
        let result = Database::open(&temp.path().join("nope.db"));
        assert!(matches!(result, Err(SavepointError::DatabaseNotFound)));
    }

    #[test]
    fn test_create_then_open() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("savepoint.db");

        {
            let db = Database::open_or_create(&path).unwrap();
            db.set_metadata("marker", "1").unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.get_metadata("marker").unwrap(), Some("1".to_string()));
    }

    #[test]
    fn test_create_fails_when_file_exists() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("savepoint.db");
        Database::create(&path).unwrap();
        assert!(Database::create(&path).is_err());
    }

    #[test]
    fn test_open_rejects_newer_schema() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("savepoint.db");
        {
            let db = Database::create(&path).unwrap();
            db.set_metadata("schema_version", "99").unwrap();
        }

        match Database::open(&path) {
            Err(SavepointError::SchemaTooNew { found, supported }) => {
                assert_eq!(found, 99);
                assert_eq!(supported, SCHEMA_VERSION);
            }
            other => panic!("expected SchemaTooNew, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_open_migrates_v1_users_table() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("savepoint.db");
        {
            let db = Database::create(&path).unwrap();
            db.conn()
                .execute_batch("ALTER TABLE users DROP COLUMN onboarding_dismissed_at;")
                .unwrap();
            db.set_metadata("schema_version", "1").unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.get_schema_version().unwrap(), 2);
        let user = db.create_user("a@example.com", None).unwrap();
        db.dismiss_onboarding(&user.id).unwrap();
        let status = db.get_onboarding_status(&user.id).unwrap().unwrap();
        assert!(status.onboarding_dismissed_at.is_some());
    }

    #[test]
    fn test_unicode_lower_function() {
        let db = Database::in_memory().unwrap();
        let folded: String = db
            .conn()
            .query_row("SELECT unicode_lower('POKÉMON Ünïcode')", [], |row| row.get(0))
            .unwrap();
        assert_eq!(folded, "pokémon ünïcode");
    }

    #[test]
    fn test_open_initializes_empty_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("empty.db");
        // A zero-byte file with no tables
        std::fs::File::create(&path).unwrap();

        let db = Database::open(&path).unwrap();
        assert_eq!(db.get_schema_version().unwrap(), SCHEMA_VERSION);
    }
}
