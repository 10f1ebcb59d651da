//! Journal entries as seen through ownership rules, plus per-user stats.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::repository::{NewJournalEntry, UpdateJournalEntry};
use crate::services::{ServiceError, ServiceResult};
use crate::{Database, JournalEntry, JournalMood, JournalVisibility};

const RECENT_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoodCount {
    pub mood: JournalMood,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalStats {
    pub total_entries: usize,
    /// Sum of play_session minutes across entries
    pub total_play_minutes: i64,
    /// Most frequent mood first
    pub mood_distribution: Vec<MoodCount>,
    /// Entries written in the last 30 days
    pub recent_entries: usize,
}

pub struct JournalService<'a> {
    db: &'a Database,
}

impl<'a> JournalService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn create_journal_entry(&self, entry: &NewJournalEntry) -> ServiceResult<JournalEntry> {
        if entry.content.trim().is_empty() {
            return Err(ServiceError::Validation(
                "Journal entry content is required".to_string(),
            ));
        }
        if self.db.find_game_by_id(&entry.game_id)?.is_none() {
            return Err(ServiceError::NotFound("Game not found".to_string()));
        }
        if let Some(item_id) = entry.library_item_id {
            if self
                .db
                .find_library_item_by_id(item_id, &entry.user_id)?
                .is_none()
            {
                return Err(ServiceError::NotFound("Library item not found".to_string()));
            }
        }

        let created = self.db.create_journal_entry(entry)?;
        tracing::info!(
            user_id = %entry.user_id,
            entry_id = %created.id,
            visibility = %created.visibility,
            "Journal entry created"
        );
        Ok(created)
    }

    pub fn get_journal_entries(
        &self,
        user_id: &str,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> ServiceResult<Vec<JournalEntry>> {
        Ok(self.db.get_journal_entries_for_user(user_id, limit, offset)?)
    }

    /// A viewer sees their own entries for the game plus everyone's public ones.
    pub fn get_journal_entries_by_game(
        &self,
        game_id: &str,
        viewer: &str,
    ) -> ServiceResult<Vec<JournalEntry>> {
        let mut entries = self.db.get_journal_entries_by_game(game_id, Some(viewer), None)?;
        entries.extend(
            self.db
                .get_journal_entries_by_game(game_id, None, Some(JournalVisibility::Public))?
                .into_iter()
                .filter(|e| e.user_id != viewer),
        );
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(entries)
    }

    pub fn get_journal_entry(&self, entry_id: &str, viewer: &str) -> ServiceResult<JournalEntry> {
        self.db
            .get_journal_entry_by_id(entry_id, Some(viewer))?
            .ok_or_else(|| ServiceError::NotFound("Journal entry not found".to_string()))
    }

    pub fn update_journal_entry(
        &self,
        entry_id: &str,
        user_id: &str,
        update: &UpdateJournalEntry,
    ) -> ServiceResult<JournalEntry> {
        if update.content.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(ServiceError::Validation(
                "Journal entry content is required".to_string(),
            ));
        }
        let entry = self.db.update_journal_entry(entry_id, user_id, update)?;
        tracing::info!(user_id, entry_id, "Journal entry updated");
        Ok(entry)
    }

    pub fn delete_journal_entry(&self, entry_id: &str, user_id: &str) -> ServiceResult<JournalEntry> {
        let entry = self.db.delete_journal_entry(entry_id, user_id)?;
        tracing::info!(user_id, entry_id, "Journal entry deleted");
        Ok(entry)
    }

    pub fn publish_journal_entry(&self, entry_id: &str, user_id: &str) -> ServiceResult<JournalEntry> {
        let entry = self.db.make_journal_entry_public(entry_id, user_id)?;
        tracing::info!(user_id, entry_id, "Journal entry published");
        Ok(entry)
    }

    pub fn get_journal_stats(&self, user_id: &str) -> ServiceResult<JournalStats> {
        let entries = self.db.get_journal_entries_for_user(user_id, None, None)?;
        Ok(journal_stats_at(&entries, Utc::now()))
    }
}

pub fn journal_stats_at(entries: &[JournalEntry], now: DateTime<Utc>) -> JournalStats {
    let cutoff = now - Duration::days(RECENT_WINDOW_DAYS);

    let mut moods: HashMap<JournalMood, usize> = HashMap::new();
    for mood in entries.iter().filter_map(|e| e.mood) {
        *moods.entry(mood).or_default() += 1;
    }
    let mut mood_distribution: Vec<MoodCount> = moods
        .into_iter()
        .map(|(mood, count)| MoodCount { mood, count })
        .collect();
    mood_distribution.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.mood.as_str().cmp(b.mood.as_str()))
    });

    JournalStats {
        total_entries: entries.len(),
        total_play_minutes: entries.iter().filter_map(|e| e.play_session).sum(),
        mood_distribution,
        recent_entries: entries.iter().filter(|e| e.created_at >= cutoff).count(),
    }
}
