//! Services compose repositories and external clients into the operations
//! the CLI exposes. Every service call returns a [`ServiceResult`] whose error
//! carries a stable [`ServiceErrorCode`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::SavepointError;

pub mod avatar;
pub mod game_detail;
pub mod journal;
pub mod library;
pub mod onboarding;
pub mod profile;
pub mod steam;

pub use avatar::AvatarStore;
pub use game_detail::GameDetailService;
pub use journal::{JournalService, JournalStats, MoodCount};
pub use library::{AddGameInput, AddedGame, LibraryService, UpdateLibraryItemInput};
pub use onboarding::{OnboardingProgress, OnboardingService, OnboardingStep};
pub use profile::{ProfileService, ProfileWithStats, SetupStatus, UpdateProfileInput, UsernameAvailability};
pub use steam::{SteamConnectionStatus, SteamService, SyncSummary};

/// Machine-readable failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceErrorCode {
    ValidationError,
    NotFound,
    Conflict,
    Unauthorized,
    RateLimited,
    ExternalServiceError,
    SteamApiUnavailable,
    SteamProfilePrivate,
    IgdbRateLimited,
    InternalError,
}

impl ServiceErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceErrorCode::ValidationError => "VALIDATION_ERROR",
            ServiceErrorCode::NotFound => "NOT_FOUND",
            ServiceErrorCode::Conflict => "CONFLICT",
            ServiceErrorCode::Unauthorized => "UNAUTHORIZED",
            ServiceErrorCode::RateLimited => "RATE_LIMITED",
            ServiceErrorCode::ExternalServiceError => "EXTERNAL_SERVICE_ERROR",
            ServiceErrorCode::SteamApiUnavailable => "STEAM_API_UNAVAILABLE",
            ServiceErrorCode::SteamProfilePrivate => "STEAM_PROFILE_PRIVATE",
            ServiceErrorCode::IgdbRateLimited => "IGDB_RATE_LIMITED",
            ServiceErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ServiceErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed service call. The message is meant for the end user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    RateLimited(String),

    #[error("{0}")]
    ExternalService(String),

    #[error("{0}")]
    SteamApiUnavailable(String),

    #[error("{0}")]
    SteamProfilePrivate(String),

    #[error("{0}")]
    IgdbRateLimited(String),

    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn code(&self) -> ServiceErrorCode {
        match self {
            ServiceError::Validation(_) => ServiceErrorCode::ValidationError,
            ServiceError::NotFound(_) => ServiceErrorCode::NotFound,
            ServiceError::Conflict(_) => ServiceErrorCode::Conflict,
            ServiceError::Unauthorized(_) => ServiceErrorCode::Unauthorized,
            ServiceError::RateLimited(_) => ServiceErrorCode::RateLimited,
            ServiceError::ExternalService(_) => ServiceErrorCode::ExternalServiceError,
            ServiceError::SteamApiUnavailable(_) => ServiceErrorCode::SteamApiUnavailable,
            ServiceError::SteamProfilePrivate(_) => ServiceErrorCode::SteamProfilePrivate,
            ServiceError::IgdbRateLimited(_) => ServiceErrorCode::IgdbRateLimited,
            ServiceError::Internal(_) => ServiceErrorCode::InternalError,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ServiceError::Validation(m)
            | ServiceError::NotFound(m)
            | ServiceError::Conflict(m)
            | ServiceError::Unauthorized(m)
            | ServiceError::RateLimited(m)
            | ServiceError::ExternalService(m)
            | ServiceError::SteamApiUnavailable(m)
            | ServiceError::SteamProfilePrivate(m)
            | ServiceError::IgdbRateLimited(m)
            | ServiceError::Internal(m) => m,
        }
    }
}

impl From<SavepointError> for ServiceError {
    fn from(err: SavepointError) -> Self {
        let message = err.to_string();
        match err {
            SavepointError::NotFound(_) => ServiceError::NotFound(message),
            SavepointError::Duplicate(_) => ServiceError::Conflict(message),
            SavepointError::Forbidden(_) => ServiceError::Unauthorized(message),
            SavepointError::Validation(_) => ServiceError::Validation(message),
            other => {
                tracing::error!(error = %other, "Storage failure");
                ServiceError::Internal(message)
            }
        }
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
