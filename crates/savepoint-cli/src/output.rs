//! Rendering command results as JSON or plain text.

use std::fmt::Display;

use anyhow::Result;
use serde::Serialize;

use savepoint::igdb::image_url;
use savepoint::services::OnboardingProgress;
use savepoint::{Game, ImportedGame, JournalEntry, LibraryItem, LibraryItemWithGame, User};

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}

pub struct Printer {
    format: OutputFormat,
    quiet: bool,
}

impl Printer {
    pub fn new(format: OutputFormat, quiet: bool) -> Self {
        Self { format, quiet }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Print `value` as pretty JSON, or whatever `text` renders for it.
    pub fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce(&T) -> String) -> Result<()> {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Text => {
                let rendered = text(value);
                if !rendered.is_empty() {
                    println!("{}", rendered);
                }
            }
        }
        Ok(())
    }

    /// Status line on stderr for text output. Silent with --quiet.
    pub fn note(&self, message: impl Display) {
        if !self.quiet && self.format == OutputFormat::Text {
            eprintln!("{}", message);
        }
    }
}

pub fn playtime(minutes: i64) -> String {
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{}m", m),
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h {}m", h, m),
    }
}

pub fn user_block(user: &User) -> String {
    let mut lines = vec![
        format!("id:        {}", user.id),
        format!("email:     {}", user.email),
    ];
    if let Some(name) = &user.name {
        lines.push(format!("name:      {}", name));
    }
    lines.push(format!(
        "username:  {}",
        user.username.as_deref().unwrap_or("(not set)")
    ));
    if let Some(image) = &user.image {
        lines.push(format!("avatar:    {}", image));
    }
    if let Some(steam) = &user.steam_username {
        lines.push(format!(
            "steam:     {} ({})",
            steam,
            user.steam_id64.as_deref().unwrap_or("?")
        ));
    }
    lines.push(format!("joined:    {}", user.created_at.format("%Y-%m-%d")));
    lines.join("\n")
}

pub fn game_block(game: &Game) -> String {
    let mut lines = vec![format!("{} [{}]", game.title, game.slug)];
    lines.push(format!("igdb id:   {}", game.igdb_id));
    if let Some(date) = game.release_date {
        lines.push(format!("released:  {}", date.format("%Y-%m-%d")));
    }
    if !game.genres.is_empty() {
        let names: Vec<&str> = game.genres.iter().map(|g| g.name.as_str()).collect();
        lines.push(format!("genres:    {}", names.join(", ")));
    }
    if !game.platforms.is_empty() {
        let names: Vec<&str> = game.platforms.iter().map(|p| p.name.as_str()).collect();
        lines.push(format!("platforms: {}", names.join(", ")));
    }
    if let Some(cover) = &game.cover_image {
        lines.push(format!("cover:     {}", image_url(cover, "cover_big")));
    }
    if let Some(description) = &game.description {
        lines.push(String::new());
        lines.push(description.clone());
    }
    lines.join("\n")
}

pub fn library_item_line(item: &LibraryItem) -> String {
    format!(
        "#{}  {}  {}  {}",
        item.id,
        item.status.label(),
        item.acquisition_type,
        item.platform.as_deref().unwrap_or("-")
    )
}

pub fn library_row(row: &LibraryItemWithGame) -> String {
    format!("{}  {}", library_item_line(&row.item), row.game_title)
}

pub fn imported_row(game: &ImportedGame) -> String {
    let last_played = game
        .last_played_at
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "never".to_string());
    format!(
        "{}  {}  {}  last played {}  [{}]",
        game.id,
        game.name,
        playtime(game.playtime),
        last_played,
        game.igdb_match_status
    )
}

pub fn journal_block(entry: &JournalEntry) -> String {
    let mut header = format!("{}  {}", entry.id, entry.created_at.format("%Y-%m-%d %H:%M"));
    if let Some(title) = &entry.title {
        header.push_str(&format!("  {}", title));
    }
    let mut meta = vec![entry.visibility.to_string()];
    if let Some(mood) = entry.mood {
        meta.push(mood.to_string());
    }
    if let Some(minutes) = entry.play_session {
        meta.push(playtime(minutes));
    }
    format!("{}\n  ({})\n  {}", header, meta.join(", "), entry.content)
}

pub fn onboarding_block(progress: &OnboardingProgress) -> String {
    let mut lines = vec![format!(
        "Getting started: {}/{} complete{}",
        progress.completed_count,
        progress.total_count,
        if progress.is_dismissed { " (dismissed)" } else { "" }
    )];
    for step in &progress.steps {
        let mark = if step.is_complete { 'x' } else { ' ' };
        let mut line = format!("[{}] {}", mark, step.title);
        if let (false, Some(command)) = (step.is_complete, &step.command) {
            line.push_str(&format!("  ({})", command));
        }
        lines.push(line);
    }
    lines.join("\n")
}
