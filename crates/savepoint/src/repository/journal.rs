//! Journal entries: per-game notes with visibility control.

use chrono::Utc;
use rusqlite::{params, params_from_iter, OptionalExtension};

use crate::{
    new_id, Database, JournalEntry, JournalMood, JournalVisibility, Result, SavepointError,
};

const ENTRY_COLUMNS: &str = "id, user_id, game_id, library_item_id, title, content, mood, play_session, visibility, published_at, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct NewJournalEntry {
    pub user_id: String,
    pub game_id: String,
    pub library_item_id: Option<i64>,
    pub title: Option<String>,
    pub content: String,
    pub mood: Option<JournalMood>,
    pub play_session: Option<i64>,
    /// Defaults to PRIVATE
    pub visibility: Option<JournalVisibility>,
}

/// Fields to change on an entry. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct UpdateJournalEntry {
    pub title: Option<String>,
    pub content: Option<String>,
    pub mood: Option<JournalMood>,
    pub play_session: Option<i64>,
    pub visibility: Option<JournalVisibility>,
}

impl Database {
    /// Create an entry. PUBLIC entries are published immediately.
    pub fn create_journal_entry(&self, entry: &NewJournalEntry) -> Result<JournalEntry> {
        let id = new_id();
        let now = Utc::now();
        let visibility = entry.visibility.unwrap_or(JournalVisibility::Private);
        let published_at = (visibility == JournalVisibility::Public).then_some(now);

        self.conn().execute(
            "INSERT INTO journal_entries (id, user_id, game_id, library_item_id, title, content, mood, play_session, visibility, published_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
            params![
                id,
                entry.user_id,
                entry.game_id,
                entry.library_item_id,
                entry.title,
                entry.content,
                entry.mood,
                entry.play_session,
                visibility,
                published_at,
                now,
            ],
        )?;

        self.find_journal_entry(&id)?
            .ok_or_else(|| SavepointError::NotFound("Journal entry".to_string()))
    }

    /// The user's entries, newest first.
    pub fn get_journal_entries_for_user(
        &self,
        user_id: &str,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Vec<JournalEntry>> {
        // LIMIT -1 means unbounded in SQLite
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let offset = offset.unwrap_or(0) as i64;
        let query = format!(
            "SELECT {} FROM journal_entries WHERE user_id = ?1
             ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3",
            ENTRY_COLUMNS
        );
        let mut stmt = self.conn().prepare(&query)?;
        let entries = stmt
            .query_map(params![user_id, limit, offset], row_to_journal_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn count_journal_entries_for_user(&self, user_id: &str) -> Result<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM journal_entries WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Entries for a game, newest first, optionally narrowed to one author
    /// and/or one visibility.
    pub fn get_journal_entries_by_game(
        &self,
        game_id: &str,
        user_id: Option<&str>,
        visibility: Option<JournalVisibility>,
    ) -> Result<Vec<JournalEntry>> {
        let mut conditions = vec!["game_id = ?"];
        let mut values: Vec<String> = vec![game_id.to_string()];
        if let Some(user_id) = user_id {
            conditions.push("user_id = ?");
            values.push(user_id.to_string());
        }
        if let Some(visibility) = visibility {
            conditions.push("visibility = ?");
            values.push(visibility.as_str().to_string());
        }

        let query = format!(
            "SELECT {} FROM journal_entries WHERE {} ORDER BY created_at DESC, id DESC",
            ENTRY_COLUMNS,
            conditions.join(" AND ")
        );
        let mut stmt = self.conn().prepare(&query)?;
        let entries = stmt
            .query_map(params_from_iter(values.iter()), row_to_journal_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Fetch an entry as seen by `viewer`. Without a viewer the entry is
    /// returned as stored; a viewer who is not the author only sees it when
    /// it is PUBLIC.
    pub fn get_journal_entry_by_id(
        &self,
        entry_id: &str,
        viewer: Option<&str>,
    ) -> Result<Option<JournalEntry>> {
        let entry = match self.find_journal_entry(entry_id)? {
            Some(entry) => entry,
            None => return Ok(None),
        };

        match viewer {
            Some(viewer) if entry.user_id != viewer && !entry.is_public() => Ok(None),
            _ => Ok(Some(entry)),
        }
    }

    /// Update an entry. Only the author may modify it.
    ///
    /// Switching to PUBLIC stamps `published_at` if it was never set;
    /// switching to PRIVATE clears it.
    pub fn update_journal_entry(
        &self,
        entry_id: &str,
        user_id: &str,
        update: &UpdateJournalEntry,
    ) -> Result<JournalEntry> {
        let existing = self.find_owned_entry(entry_id, user_id, "modify")?;
        let now = Utc::now();

        let published_at = match update.visibility {
            Some(JournalVisibility::Public) => existing.published_at.or(Some(now)),
            Some(JournalVisibility::Private) => None,
            Some(JournalVisibility::FriendsOnly) | None => existing.published_at,
        };

        self.conn().execute(
            "UPDATE journal_entries SET
                title = COALESCE(?2, title),
                content = COALESCE(?3, content),
                mood = COALESCE(?4, mood),
                play_session = COALESCE(?5, play_session),
                visibility = COALESCE(?6, visibility),
                published_at = ?7,
                updated_at = ?8
             WHERE id = ?1",
            params![
                entry_id,
                update.title,
                update.content,
                update.mood,
                update.play_session,
                update.visibility,
                published_at,
                now,
            ],
        )?;

        self.find_journal_entry(entry_id)?
            .ok_or_else(|| SavepointError::NotFound("Journal entry".to_string()))
    }

    /// Delete an entry. Only the author may delete it.
    pub fn delete_journal_entry(&self, entry_id: &str, user_id: &str) -> Result<JournalEntry> {
        let existing = self.find_owned_entry(entry_id, user_id, "delete")?;
        self.conn()
            .execute("DELETE FROM journal_entries WHERE id = ?1", params![entry_id])?;
        Ok(existing)
    }

    /// Publish an entry, keeping its original publication time if it had one.
    pub fn make_journal_entry_public(&self, entry_id: &str, user_id: &str) -> Result<JournalEntry> {
        let existing = self.find_owned_entry(entry_id, user_id, "modify")?;
        let now = Utc::now();
        self.conn().execute(
            "UPDATE journal_entries SET visibility = ?2, published_at = ?3, updated_at = ?4 WHERE id = ?1",
            params![
                entry_id,
                JournalVisibility::Public,
                existing.published_at.unwrap_or(now),
                now,
            ],
        )?;

        self.find_journal_entry(entry_id)?
            .ok_or_else(|| SavepointError::NotFound("Journal entry".to_string()))
    }

    fn find_journal_entry(&self, entry_id: &str) -> Result<Option<JournalEntry>> {
        let query = format!("SELECT {} FROM journal_entries WHERE id = ?1", ENTRY_COLUMNS);
        let entry = self
            .conn()
            .query_row(&query, params![entry_id], row_to_journal_entry)
            .optional()?;
        Ok(entry)
    }

    fn find_owned_entry(&self, entry_id: &str, user_id: &str, action: &str) -> Result<JournalEntry> {
        let entry = self
            .find_journal_entry(entry_id)?
            .ok_or_else(|| SavepointError::NotFound("Journal entry".to_string()))?;
        if entry.user_id != user_id {
            return Err(SavepointError::Forbidden(format!(
                "cannot {} this journal entry",
                action
            )));
        }
        Ok(entry)
    }
}

fn row_to_journal_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<JournalEntry> {
    Ok(JournalEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        game_id: row.get(2)?,
        library_item_id: row.get(3)?,
        title: row.get(4)?,
        content: row.get(5)?,
        mood: row.get(6)?,
        play_session: row.get(7)?,
        visibility: row.get(8)?,
        published_at: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}
