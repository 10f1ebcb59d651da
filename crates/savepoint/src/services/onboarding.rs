//! The getting-started checklist shown to new users.

use serde::{Deserialize, Serialize};

use crate::services::{ServiceError, ServiceResult};
use crate::{Database, LibraryItemStatus, SavepointError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingStep {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Command that completes the step, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    pub is_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingProgress {
    pub steps: Vec<OnboardingStep>,
    pub completed_count: usize,
    pub total_count: usize,
    /// Dismissed explicitly, or implied by finishing every step
    pub is_dismissed: bool,
    pub is_complete: bool,
}

struct StepTemplate {
    id: &'static str,
    title: &'static str,
    description: &'static str,
    command: Option<&'static str>,
}

const STEPS: [StepTemplate; 5] = [
    StepTemplate {
        id: "create-account",
        title: "Create your account",
        description: "Welcome to Savepoint!",
        command: None,
    },
    StepTemplate {
        id: "setup-profile",
        title: "Set up your profile",
        description: "Add a username and profile picture",
        command: Some("svp profile setup"),
    },
    StepTemplate {
        id: "add-first-game",
        title: "Add your first game",
        description: "Search for games and add them to your library",
        command: Some("svp library add"),
    },
    StepTemplate {
        id: "start-playing",
        title: "Start playing a game",
        description: "Change a game's status to Playing",
        command: Some("svp library update --status PLAYING"),
    },
    StepTemplate {
        id: "write-journal",
        title: "Write a journal entry",
        description: "Record your gaming thoughts and memories",
        command: Some("svp journal add"),
    },
];

pub struct OnboardingService<'a> {
    db: &'a Database,
}

impl<'a> OnboardingService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn get_progress(&self, user_id: &str) -> ServiceResult<OnboardingProgress> {
        let status = self.db.get_onboarding_status(user_id)?.ok_or_else(|| {
            tracing::warn!(user_id, "User not found");
            ServiceError::NotFound("User not found".to_string())
        })?;

        let done = [
            true,
            status.profile_setup_completed_at.is_some(),
            self.db.count_library_items(user_id, None)? > 0,
            self.db
                .count_library_items(user_id, Some(LibraryItemStatus::Playing))?
                > 0,
            self.db.count_journal_entries_for_user(user_id)? > 0,
        ];

        let steps: Vec<OnboardingStep> = STEPS
            .iter()
            .zip(done)
            .map(|(template, is_complete)| OnboardingStep {
                id: template.id.to_string(),
                title: template.title.to_string(),
                description: template.description.to_string(),
                command: template.command.map(str::to_string),
                is_complete,
            })
            .collect();

        let completed_count = steps.iter().filter(|s| s.is_complete).count();
        let total_count = steps.len();
        let is_complete = completed_count == total_count;
        let is_dismissed = status.onboarding_dismissed_at.is_some() || is_complete;

        tracing::info!(user_id, completed_count, total_count, is_dismissed, "Onboarding progress fetched");
        Ok(OnboardingProgress {
            steps,
            completed_count,
            total_count,
            is_dismissed,
            is_complete,
        })
    }

    /// Hide the checklist for good.
    pub fn dismiss(&self, user_id: &str) -> ServiceResult<()> {
        self.db.dismiss_onboarding(user_id).map_err(|e| match e {
            SavepointError::NotFound(_) => ServiceError::NotFound("User not found".to_string()),
            other => other.into(),
        })?;
        tracing::info!(user_id, "Onboarding dismissed");
        Ok(())
    }
}
