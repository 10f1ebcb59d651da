//! Data access over [`Database`](crate::Database).
//!
//! Each submodule adds an `impl Database` block for one aggregate. Queries
//! that act on behalf of a user are always scoped by `user_id`, so a caller
//! can never read or modify another user's rows by guessing an id.

pub mod game;
pub mod imported_game;
pub mod journal;
pub mod library;
pub mod user;

pub use game::{NewGame, NewGenre, NewPlatform};
pub use imported_game::{
    ImportedGameQuery, ImportedGameSort, LastPlayedFilter, NewImportedGame, PaginatedImportedGames,
    PlatformFilter, PlaytimeRange, PlaytimeStatus,
};
pub use journal::{NewJournalEntry, UpdateJournalEntry};
pub use library::{
    LibraryFilter, LibraryItemUpdate, LibrarySortField, LibraryStats, NewLibraryItem, RecentGame,
    SortOrder,
};
pub use user::{OnboardingStatus, ProfileUpdate, SteamConnection, SteamProfileData};
