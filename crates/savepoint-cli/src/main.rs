//! svp: track your game library from the command line.
//!
//! This CLI provides access to savepoint functionality for:
//! - Managing your profile (username, avatar, first-run setup)
//! - Connecting Steam and syncing owned games
//! - Importing synced games into your library via IGDB
//! - Curating library entries and writing journal entries

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};

use savepoint::config::Config;
use savepoint::repository::{
    ImportedGameQuery, ImportedGameSort, LastPlayedFilter, LibraryFilter, LibrarySortField,
    NewJournalEntry, PlatformFilter, PlaytimeRange, PlaytimeStatus, SortOrder,
    UpdateJournalEntry,
};
use savepoint::services::{
    AddGameInput, AvatarStore, GameDetailService, JournalService, LibraryService,
    OnboardingService, ProfileService, SteamService, UpdateLibraryItemInput, UpdateProfileInput,
};
use savepoint::{
    import_game_to_library, AcquisitionType, Database, GameCatalog, IgdbClient, ImportError,
    ImportGameInput, JournalMood, JournalVisibility, LibraryItemStatus, SavepointError,
    ServiceError, ServiceErrorCode, SteamClient,
};

mod output;

use output::{OutputFormat, Printer};

/// Exit codes for the CLI
///
/// - 0: Success
/// - 1: Not found (the requested record does not exist)
/// - 2: Error (invalid input, conflict, unreachable service, etc.)
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const NOT_FOUND: u8 = 1;
    pub const ERROR: u8 = 2;
}

/// Track your game library, Steam imports and play journal
#[derive(Parser)]
#[command(name = "svp")]
#[command(author, version = env!("SVP_VERSION"), about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database file (defaults to the configured database_path)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Id of the user to act as
    #[arg(long, global = true, env = "SAVEPOINT_USER")]
    user: Option<String>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Suppress status messages
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database (or migrate an existing one)
    Init,

    /// Manage user accounts
    #[command(subcommand)]
    User(UserCommand),

    /// View and edit your profile
    #[command(subcommand)]
    Profile(ProfileCommand),

    /// Connect Steam and sync owned games
    #[command(subcommand)]
    Steam(SteamCommand),

    /// Browse games synced from Steam
    #[command(subcommand)]
    Imported(ImportedCommand),

    /// Add a synced Steam game to your library
    Import {
        /// Imported game id (see `svp imported list`)
        imported_game_id: String,

        /// Library status (derived from playtime when omitted)
        #[arg(long)]
        status: Option<LibraryItemStatus>,

        /// Use this IGDB game instead of matching automatically
        #[arg(long)]
        igdb_id: Option<i64>,
    },

    /// Manage library entries
    #[command(subcommand)]
    Library(LibraryCommand),

    /// Write and browse journal entries
    #[command(subcommand)]
    Journal(JournalCommand),

    /// Look up games
    #[command(subcommand)]
    Game(GameCommand),
}

#[derive(Subcommand)]
enum UserCommand {
    /// Register a new user
    Create {
        #[arg(long)]
        email: String,

        /// Display name, used to suggest a username
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// Show your profile
    Show,
    /// Show your profile with library statistics
    Stats,
    /// Check whether a username is free
    CheckUsername { username: String },
    /// Change your username
    Update {
        #[arg(long)]
        username: String,
    },
    /// Upload a new avatar image
    Avatar { file: PathBuf },
    /// Check whether first-run setup is still needed
    SetupStatus,
    /// Complete first-run setup
    Setup {
        #[arg(long)]
        username: Option<String>,

        /// Avatar image to upload
        #[arg(long)]
        avatar: Option<PathBuf>,
    },
    /// Show the getting-started checklist
    Onboarding {
        /// Hide the checklist from now on
        #[arg(long)]
        dismiss: bool,
    },
}

#[derive(Subcommand)]
enum SteamCommand {
    /// Link a Steam account by Steam ID64 or vanity name
    Connect { steam_id: String },
    /// Unlink your Steam account
    Disconnect,
    /// Show the linked Steam account
    Status,
    /// Fetch owned games from Steam
    Sync,
}

#[derive(Subcommand)]
enum ImportedCommand {
    /// List synced games
    List {
        /// Case-insensitive name filter
        #[arg(long)]
        search: Option<String>,

        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = 25)]
        limit: u32,

        /// all, played, never_played
        #[arg(long, default_value = "all")]
        playtime_status: PlaytimeStatus,

        /// all, under_1h, 1_to_10h, 10_to_50h, over_50h
        #[arg(long, default_value = "all")]
        playtime_range: PlaytimeRange,

        /// all, windows, mac, linux
        #[arg(long, default_value = "all")]
        platform: PlatformFilter,

        /// all, 30_days, 1_year, over_1_year, never
        #[arg(long, default_value = "all")]
        last_played: LastPlayedFilter,

        /// name_asc, name_desc, playtime_desc, playtime_asc,
        /// last_played_desc, last_played_asc, added_desc
        #[arg(long, default_value = "added_desc")]
        sort: ImportedGameSort,
    },
    /// Hide a synced game
    Dismiss { imported_game_id: String },
}

#[derive(Subcommand)]
enum LibraryCommand {
    /// List library entries
    List {
        #[arg(long)]
        status: Option<LibraryItemStatus>,

        #[arg(long)]
        platform: Option<String>,

        /// Case-insensitive title filter
        #[arg(long)]
        search: Option<String>,

        /// created_at, release_date, started_at, completed_at
        #[arg(long, default_value = "created_at")]
        sort_by: LibrarySortField,

        /// asc or desc
        #[arg(long, default_value = "desc")]
        order: SortOrder,

        /// Show only the newest entry per game
        #[arg(long)]
        distinct: bool,
    },
    /// Add a game by IGDB id
    Add {
        igdb_id: i64,

        #[arg(long, default_value = "WANT_TO_PLAY")]
        status: LibraryItemStatus,

        #[arg(long, default_value = "DIGITAL")]
        acquisition: AcquisitionType,

        #[arg(long)]
        platform: Option<String>,

        /// YYYY-MM-DD or RFC 3339
        #[arg(long, value_parser = parse_date)]
        started_at: Option<DateTime<Utc>>,

        /// YYYY-MM-DD or RFC 3339
        #[arg(long, value_parser = parse_date)]
        completed_at: Option<DateTime<Utc>>,
    },
    /// Change an entry's status and dates
    Update {
        item_id: i64,

        #[arg(long)]
        status: LibraryItemStatus,

        #[arg(long, value_parser = parse_date, conflicts_with = "clear_started")]
        started_at: Option<DateTime<Utc>>,

        #[arg(long, value_parser = parse_date, conflicts_with = "clear_completed")]
        completed_at: Option<DateTime<Utc>>,

        /// Remove the start date
        #[arg(long)]
        clear_started: bool,

        /// Remove the completion date
        #[arg(long)]
        clear_completed: bool,
    },
    /// Remove an entry
    Remove { item_id: i64 },
}

#[derive(Subcommand)]
enum JournalCommand {
    /// Write an entry about a game
    Add {
        /// Game slug
        #[arg(long)]
        game: String,

        #[arg(long)]
        content: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        mood: Option<JournalMood>,

        /// Minutes played in this session
        #[arg(long)]
        minutes: Option<i64>,

        #[arg(long)]
        visibility: Option<JournalVisibility>,

        /// Library entry this session belongs to
        #[arg(long)]
        library_item: Option<i64>,
    },
    /// List your entries, or entries for one game
    List {
        /// Game slug
        #[arg(long)]
        game: Option<String>,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        offset: Option<usize>,
    },
    /// Show one entry
    Show { entry_id: String },
    /// Edit an entry
    Edit {
        entry_id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        content: Option<String>,

        #[arg(long)]
        mood: Option<JournalMood>,

        #[arg(long)]
        minutes: Option<i64>,

        #[arg(long)]
        visibility: Option<JournalVisibility>,
    },
    /// Delete an entry
    Delete { entry_id: String },
    /// Make an entry public
    Publish { entry_id: String },
    /// Summarize your journal
    Stats,
}

#[derive(Subcommand)]
enum GameCommand {
    /// Search IGDB (or the local catalog with --local)
    Search {
        query: String,

        #[arg(long, default_value_t = 10)]
        limit: usize,

        #[arg(long)]
        local: bool,
    },
    /// Show a stored game by slug
    Show { slug: String },
}

fn main() -> ExitCode {
    // Logs go to stderr so JSON on stdout stays parseable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    let format = cli.format;

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            let (error, code) = classify(&e);
            if format == OutputFormat::Json {
                let error_json = serde_json::json!({
                    "error": error,
                    "message": format!("{:#}", e),
                });
                eprintln!("{}", error_json);
            } else {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::from(code)
        }
    }
}

/// Error name for JSON output and the matching exit code.
fn classify(err: &anyhow::Error) -> (&'static str, u8) {
    if let Some(e) = err.downcast_ref::<ServiceError>() {
        let exit = if e.code() == ServiceErrorCode::NotFound {
            exit_codes::NOT_FOUND
        } else {
            exit_codes::ERROR
        };
        return (e.code().as_str(), exit);
    }
    if let Some(e) = err.downcast_ref::<ImportError>() {
        let exit = match e {
            ImportError::NotFound(_) => exit_codes::NOT_FOUND,
            _ => exit_codes::ERROR,
        };
        return (e.code(), exit);
    }
    if let Some(SavepointError::NotFound(_)) = err.downcast_ref::<SavepointError>() {
        return ("NOT_FOUND", exit_codes::NOT_FOUND);
    }
    ("CommandFailed", exit_codes::ERROR)
}

/// Accepts `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 timestamp.
fn parse_date(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| format!("invalid date '{}': expected YYYY-MM-DD or RFC 3339", value))
}

/// A date flag pair as an update: keep, set, or clear.
fn date_change(value: Option<DateTime<Utc>>, clear: bool) -> Option<Option<DateTime<Utc>>> {
    if clear {
        Some(None)
    } else {
        value.map(Some)
    }
}

/// Resolved settings shared by every command.
struct App {
    config: Config,
    db_path: PathBuf,
    user: Option<String>,
    out: Printer,
}

impl App {
    fn open_db(&self) -> Result<Database> {
        Database::open(&self.db_path)
            .with_context(|| format!("Failed to open database at {}", self.db_path.display()))
    }

    /// Open the database and confirm the acting user exists.
    fn session(&self) -> Result<(Database, String)> {
        let Some(user_id) = self.user.clone() else {
            bail!("No user selected. Pass --user or set SAVEPOINT_USER.");
        };
        let db = self.open_db()?;
        ProfileService::new(&db).verify_user_exists(&user_id)?;
        Ok((db, user_id))
    }

    fn steam_client(&self) -> Result<SteamClient> {
        if !self.config.has_steam_credentials() {
            bail!(
                "Steam API key is not configured. Set SAVEPOINT_STEAM__API_KEY or steam.api_key in {}",
                savepoint::config::CONFIG_FILE_NAME
            );
        }
        Ok(SteamClient::from_config(&self.config))
    }

    /// Catalog lookups may not be needed (e.g. the game is already stored),
    /// so missing credentials only warn here.
    fn igdb_client(&self) -> IgdbClient {
        if !self.config.has_igdb_credentials() {
            tracing::warn!("IGDB credentials are not configured; catalog lookups will fail");
        }
        IgdbClient::from_config(&self.config)
    }
}

fn run(cli: Cli) -> Result<u8> {
    let cwd = std::env::current_dir().context("Failed to resolve working directory")?;
    let config = Config::load(&cwd);
    let db_path = cli.db.clone().unwrap_or_else(|| config.database_path.clone());
    let app = App {
        config,
        db_path,
        user: cli.user,
        out: Printer::new(cli.format, cli.quiet),
    };

    match cli.command {
        Commands::Init => cmd_init(&app),
        Commands::User(command) => cmd_user(&app, command),
        Commands::Profile(command) => cmd_profile(&app, command),
        Commands::Steam(command) => cmd_steam(&app, command),
        Commands::Imported(command) => cmd_imported(&app, command),
        Commands::Import {
            imported_game_id,
            status,
            igdb_id,
        } => cmd_import(&app, imported_game_id, status, igdb_id),
        Commands::Library(command) => cmd_library(&app, command),
        Commands::Journal(command) => cmd_journal(&app, command),
        Commands::Game(command) => cmd_game(&app, command),
    }
}

fn cmd_init(app: &App) -> Result<u8> {
    let existed = app.db_path.exists();
    let db = Database::open_or_create(&app.db_path)
        .with_context(|| format!("Failed to initialize {}", app.db_path.display()))?;
    let schema_version = db.get_schema_version()?;

    let result = serde_json::json!({
        "database": app.db_path.display().to_string(),
        "created": !existed,
        "schema_version": schema_version,
    });
    app.out.emit(&result, |_| {
        if existed {
            format!("Database already initialized at {}", app.db_path.display())
        } else {
            format!("Initialized database at {}", app.db_path.display())
        }
    })?;
    Ok(exit_codes::SUCCESS)
}

fn cmd_user(app: &App, command: UserCommand) -> Result<u8> {
    match command {
        UserCommand::Create { email, name } => {
            let db = app.open_db()?;
            let user = db.create_user(&email, name.as_deref())?;
            app.out.emit(&user, output::user_block)?;
            app.out
                .note(format!("Select this user with: export SAVEPOINT_USER={}", user.id));
        }
    }
    Ok(exit_codes::SUCCESS)
}

fn cmd_profile(app: &App, command: ProfileCommand) -> Result<u8> {
    let (db, user_id) = app.session()?;
    let profiles = ProfileService::new(&db);

    match command {
        ProfileCommand::Show => {
            let user = profiles.get_profile(&user_id)?;
            app.out.emit(&user, output::user_block)?;
        }
        ProfileCommand::Stats => {
            let profile = profiles.get_profile_with_stats(&user_id)?;
            app.out.emit(&profile, |p| {
                let mut lines = vec![output::user_block(&p.user), String::new()];
                for (status, count) in &p.stats.status_counts {
                    lines.push(format!("{:<14} {}", status, count));
                }
                if !p.stats.recent_games.is_empty() {
                    lines.push(String::new());
                    lines.push("Currently playing:".to_string());
                    for game in &p.stats.recent_games {
                        lines.push(format!("  {}", game.title));
                    }
                }
                lines.join("\n")
            })?;
        }
        ProfileCommand::CheckUsername { username } => {
            let availability = profiles.check_username_availability(&username)?;
            app.out.emit(&availability, |a| {
                if a.available {
                    format!("{} is available", a.username)
                } else {
                    format!("{} is taken", a.username)
                }
            })?;
        }
        ProfileCommand::Update { username } => {
            let user = profiles.update_profile(&user_id, &UpdateProfileInput { username })?;
            app.out.emit(&user, output::user_block)?;
        }
        ProfileCommand::Avatar { file } => {
            let url = store_avatar(app, &user_id, &file)?;
            let user = profiles.update_avatar_url(&user_id, &url)?;
            app.out.emit(&user, output::user_block)?;
        }
        ProfileCommand::SetupStatus => {
            let status = profiles.check_setup_status(&user_id)?;
            app.out.emit(&status, |s| match (s.needs_setup, &s.suggested_username) {
                (false, _) => "Setup complete".to_string(),
                (true, Some(suggested)) => format!("Setup needed (suggested username: {})", suggested),
                (true, None) => "Setup needed".to_string(),
            })?;
        }
        ProfileCommand::Setup { username, avatar } => {
            let avatar_url = avatar
                .map(|file| store_avatar(app, &user_id, &file))
                .transpose()?;
            let user = profiles.complete_setup(&user_id, username.as_deref(), avatar_url.as_deref())?;
            app.out.emit(&user, output::user_block)?;
        }
        ProfileCommand::Onboarding { dismiss } => {
            let onboarding = OnboardingService::new(&db);
            if dismiss {
                onboarding.dismiss(&user_id)?;
            }
            let progress = onboarding.get_progress(&user_id)?;
            app.out.emit(&progress, output::onboarding_block)?;
        }
    }
    Ok(exit_codes::SUCCESS)
}

fn store_avatar(app: &App, user_id: &str, file: &Path) -> Result<String> {
    let url = AvatarStore::from_config(&app.config).store(user_id, file)?;
    app.out.note(format!("Stored avatar at {}", url));
    Ok(url)
}

fn cmd_steam(app: &App, command: SteamCommand) -> Result<u8> {
    let (db, user_id) = app.session()?;

    match command {
        SteamCommand::Connect { steam_id } => {
            let client = app.steam_client()?;
            let user = SteamService::new(&db, &client).connect_account(&user_id, &steam_id)?;
            app.out.emit(&user, output::user_block)?;
        }
        SteamCommand::Disconnect => {
            // Unlinking never calls the Steam API, so no key is required
            let client = SteamClient::from_config(&app.config);
            let user = SteamService::new(&db, &client).disconnect(&user_id)?;
            app.out.emit(&user, |_| "Steam account disconnected".to_string())?;
        }
        SteamCommand::Status => {
            let status = ProfileService::new(&db).get_steam_connection_status(&user_id)?;
            app.out.emit(&status, |s| match (&s.username, &s.steam_id64) {
                (Some(name), Some(id)) if s.connected => format!("Connected as {} ({})", name, id),
                _ => "Not connected".to_string(),
            })?;
        }
        SteamCommand::Sync => {
            let client = app.steam_client()?;
            let summary = SteamService::new(&db, &client).sync_owned_games(&user_id)?;
            app.out.emit(&summary, |s| {
                format!(
                    "Fetched {} games from Steam ({} new, {} updated)",
                    s.fetched, s.created, s.updated
                )
            })?;
        }
    }
    Ok(exit_codes::SUCCESS)
}

fn cmd_imported(app: &App, command: ImportedCommand) -> Result<u8> {
    let (db, user_id) = app.session()?;
    let client = SteamClient::from_config(&app.config);
    let steam = SteamService::new(&db, &client);

    match command {
        ImportedCommand::List {
            search,
            page,
            limit,
            playtime_status,
            playtime_range,
            platform,
            last_played,
            sort,
        } => {
            let query = ImportedGameQuery {
                search,
                page,
                limit,
                playtime_status,
                playtime_range,
                platform,
                last_played,
                sort_by: sort,
            };
            let result = steam.list_imported_games(&user_id, &query)?;
            app.out.emit(&result, |r| {
                let mut lines = vec![format!(
                    "Page {}/{} ({} games)",
                    r.page,
                    r.total_pages.max(1),
                    r.total
                )];
                lines.extend(r.items.iter().map(output::imported_row));
                lines.join("\n")
            })?;
        }
        ImportedCommand::Dismiss { imported_game_id } => {
            steam.dismiss_imported_game(&imported_game_id, &user_id)?;
            let result = serde_json::json!({ "dismissed": imported_game_id });
            app.out.emit(&result, |_| "Dismissed".to_string())?;
        }
    }
    Ok(exit_codes::SUCCESS)
}

fn cmd_import(
    app: &App,
    imported_game_id: String,
    status: Option<LibraryItemStatus>,
    manual_igdb_id: Option<i64>,
) -> Result<u8> {
    let (db, user_id) = app.session()?;
    let catalog = app.igdb_client();

    let imported = import_game_to_library(
        &db,
        &catalog,
        &ImportGameInput {
            imported_game_id,
            user_id,
            status,
            manual_igdb_id,
        },
    )?;
    app.out.emit(&imported, |i| {
        format!(
            "Added {} to your library as {}",
            i.game_slug,
            i.library_item.status.label()
        )
    })?;
    Ok(exit_codes::SUCCESS)
}

fn cmd_library(app: &App, command: LibraryCommand) -> Result<u8> {
    let (db, user_id) = app.session()?;
    let library = LibraryService::new(&db);

    match command {
        LibraryCommand::List {
            status,
            platform,
            search,
            sort_by,
            order,
            distinct,
        } => {
            let filter = LibraryFilter {
                status,
                platform,
                search,
                sort_by,
                sort_order: order,
                distinct_by_game: distinct,
            };
            let items = library.get_library_items(&user_id, &filter)?;
            app.out.emit(&items, |rows| {
                if rows.is_empty() {
                    "Your library is empty".to_string()
                } else {
                    rows.iter().map(output::library_row).collect::<Vec<_>>().join("\n")
                }
            })?;
        }
        LibraryCommand::Add {
            igdb_id,
            status,
            acquisition,
            platform,
            started_at,
            completed_at,
        } => {
            let catalog = app.igdb_client();
            let added = library.add_game_to_library(
                &catalog,
                &AddGameInput {
                    user_id,
                    igdb_id,
                    status,
                    acquisition_type: acquisition,
                    platform,
                    started_at,
                    completed_at,
                },
            )?;
            app.out.emit(&added, |a| {
                format!("{}  {}", output::library_item_line(&a.item), a.game.title)
            })?;
        }
        LibraryCommand::Update {
            item_id,
            status,
            started_at,
            completed_at,
            clear_started,
            clear_completed,
        } => {
            let item = library.update_library_item(
                &user_id,
                &UpdateLibraryItemInput {
                    id: item_id,
                    status,
                    started_at: date_change(started_at, clear_started),
                    completed_at: date_change(completed_at, clear_completed),
                },
            )?;
            app.out.emit(&item, output::library_item_line)?;
        }
        LibraryCommand::Remove { item_id } => {
            library.delete_library_item(item_id, &user_id)?;
            let result = serde_json::json!({ "deleted": item_id });
            app.out.emit(&result, |_| format!("Removed library item #{}", item_id))?;
        }
    }
    Ok(exit_codes::SUCCESS)
}

fn cmd_journal(app: &App, command: JournalCommand) -> Result<u8> {
    let (db, user_id) = app.session()?;
    let journal = JournalService::new(&db);
    let games = GameDetailService::new(&db);

    match command {
        JournalCommand::Add {
            game,
            content,
            title,
            mood,
            minutes,
            visibility,
            library_item,
        } => {
            let game = games.get_game_by_slug(&game)?;
            let entry = journal.create_journal_entry(&NewJournalEntry {
                user_id,
                game_id: game.id,
                library_item_id: library_item,
                title,
                content,
                mood,
                play_session: minutes,
                visibility,
            })?;
            app.out.emit(&entry, output::journal_block)?;
        }
        JournalCommand::List {
            game,
            limit,
            offset,
        } => {
            let entries = match game {
                Some(slug) => {
                    let game = games.get_game_by_slug(&slug)?;
                    journal.get_journal_entries_by_game(&game.id, &user_id)?
                }
                None => journal.get_journal_entries(&user_id, limit, offset)?,
            };
            app.out.emit(&entries, |entries| {
                entries
                    .iter()
                    .map(output::journal_block)
                    .collect::<Vec<_>>()
                    .join("\n\n")
            })?;
        }
        JournalCommand::Show { entry_id } => {
            let entry = journal.get_journal_entry(&entry_id, &user_id)?;
            app.out.emit(&entry, output::journal_block)?;
        }
        JournalCommand::Edit {
            entry_id,
            title,
            content,
            mood,
            minutes,
            visibility,
        } => {
            let entry = journal.update_journal_entry(
                &entry_id,
                &user_id,
                &UpdateJournalEntry {
                    title,
                    content,
                    mood,
                    play_session: minutes,
                    visibility,
                },
            )?;
            app.out.emit(&entry, output::journal_block)?;
        }
        JournalCommand::Delete { entry_id } => {
            let entry = journal.delete_journal_entry(&entry_id, &user_id)?;
            app.out.emit(&entry, |e| format!("Deleted journal entry {}", e.id))?;
        }
        JournalCommand::Publish { entry_id } => {
            let entry = journal.publish_journal_entry(&entry_id, &user_id)?;
            app.out.emit(&entry, output::journal_block)?;
        }
        JournalCommand::Stats => {
            let stats = journal.get_journal_stats(&user_id)?;
            app.out.emit(&stats, |s| {
                let mut lines = vec![
                    format!("entries:       {}", s.total_entries),
                    format!("last 30 days:  {}", s.recent_entries),
                    format!("time played:   {}", output::playtime(s.total_play_minutes)),
                ];
                for mood in &s.mood_distribution {
                    lines.push(format!("  {:<13} {}", mood.mood, mood.count));
                }
                lines.join("\n")
            })?;
        }
    }
    Ok(exit_codes::SUCCESS)
}

fn cmd_game(app: &App, command: GameCommand) -> Result<u8> {
    match command {
        GameCommand::Search {
            query,
            limit,
            local,
        } => {
            if local {
                let db = app.open_db()?;
                let games = db.search_local_games(&query, limit)?;
                if games.is_empty() {
                    return not_found(app, &format!("No stored games match '{}'", query));
                }
                app.out.emit(&games, |games| {
                    games
                        .iter()
                        .map(|g| format!("{}  {}", g.slug, g.title))
                        .collect::<Vec<_>>()
                        .join("\n")
                })?;
            } else {
                let games = app.igdb_client().search_games(&query, limit)?;
                if games.is_empty() {
                    return not_found(app, &format!("No IGDB games match '{}'", query));
                }
                app.out.emit(&games, |games| {
                    games
                        .iter()
                        .map(|g| format!("{}  {}", g.id, g.name))
                        .collect::<Vec<_>>()
                        .join("\n")
                })?;
            }
        }
        GameCommand::Show { slug } => {
            let db = app.open_db()?;
            let game = GameDetailService::new(&db).get_game_by_slug(&slug)?;
            app.out.emit(&game, output::game_block)?;
        }
    }
    Ok(exit_codes::SUCCESS)
}

/// Report an empty result without treating it as a failure.
fn not_found(app: &App, message: &str) -> Result<u8> {
    if app.out.format() == OutputFormat::Json {
        println!("{}", serde_json::json!({ "error": "NOT_FOUND", "message": message }));
    } else {
        app.out.note(message);
    }
    Ok(exit_codes::NOT_FOUND)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_date() {
        let date = parse_date("2024-03-09").unwrap();
        assert_eq!(date.to_rfc3339(), "2024-03-09T00:00:00+00:00");

        let stamp = parse_date("2024-03-09T12:30:00+02:00").unwrap();
        assert_eq!(stamp.to_rfc3339(), "2024-03-09T10:30:00+00:00");

        assert!(parse_date("yesterday").is_err());
    }

    #[test]
    fn test_classify_errors() {
        let not_found = anyhow::Error::new(ServiceError::NotFound("Game not found".into()));
        assert_eq!(classify(&not_found), ("NOT_FOUND", exit_codes::NOT_FOUND));

        let conflict = anyhow::Error::new(ServiceError::Conflict("taken".into()));
        assert_eq!(classify(&conflict), ("CONFLICT", exit_codes::ERROR));

        let duplicate = anyhow::Error::new(ImportError::Duplicate("in library".into()));
        assert_eq!(classify(&duplicate), ("DUPLICATE", exit_codes::ERROR));

        let wrapped = anyhow::Error::new(SavepointError::DatabaseNotFound).context("opening");
        assert_eq!(classify(&wrapped), ("CommandFailed", exit_codes::ERROR));
    }
}
