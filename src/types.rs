//! Request and response shapes for the notekeep backend.
//!
//! These types form the contract between the core library and whatever
//! boundary layer sits in front of it (the bundled CLI here, an HTTP
//! layer in a deployment).

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::Subcommand;
use serde::{Deserialize, Serialize};

use crate::NotesError;

/// A specialized Result type for notekeep operations.
pub type Result<T> = std::result::Result<T, NotesError>;

/// Default page size for listings.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Largest page size a caller may request.
pub const MAX_PAGE_SIZE: usize = 100;

/// Maximum snippet length in characters, excluding the ellipsis marker.
pub const SNIPPET_LENGTH: usize = 150;

/// Input for creating a note. The title is generated by the store; the
/// derived fields are computed from `html_content`.
#[derive(Debug, Clone, Default)]
pub struct NoteDraft {
    /// The note body; required, must not be empty
    pub html_content: String,
    /// Optional free-text category
    pub area: Option<String>,
    /// Labels in insertion order; may be empty
    pub tags: Vec<String>,
}

/// A partial update. `None` means "leave the field as it is";
/// `area: Some(None)` clears the category. Supplying `html_content`
/// triggers re-derivation of plaintext and Markdown.
#[derive(Debug, Clone, Default)]
pub struct NotePatch {
    pub html_content: Option<String>,
    pub area: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
}

impl NotePatch {
    /// True when no field is supplied. Such an update still refreshes
    /// `modified_at` on the target note.
    pub fn is_empty(&self) -> bool {
        self.html_content.is_none() && self.area.is_none() && self.tags.is_none()
    }
}

/// Filters and pagination for listing notes.
#[derive(Debug, Clone)]
pub struct ListQuery {
    /// Exact-match category filter
    pub area: Option<String>,
    /// AND-combined label filter: a note must carry every listed tag
    pub tags: Vec<String>,
    /// Page size, 1..=[`MAX_PAGE_SIZE`]
    pub limit: usize,
    /// Number of matching notes to skip
    pub offset: usize,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            area: None,
            tags: Vec::new(),
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

/// One page of notes plus the total match count across all pages.
#[derive(Debug, Clone, Serialize)]
pub struct NotePage {
    pub notes: Vec<crate::Note>,
    pub total: usize,
}

/// Which note fields a keyword search inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchField {
    Title,
    Content,
}

/// Parameters for a keyword search. Selected fields OR-combine for the
/// keyword; the area/tag filters AND-combine with the keyword and with
/// each other. An empty keyword applies no keyword constraint.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub keyword: String,
    pub area: Option<String>,
    pub tags: Vec<String>,
    pub search_in: Vec<SearchField>,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            keyword: String::new(),
            area: None,
            tags: Vec::new(),
            search_in: vec![SearchField::Title, SearchField::Content],
        }
    }
}

/// One search hit: identifying fields plus a bounded plaintext preview.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub id: i64,
    pub title: String,
    pub snippet: String,
    pub area: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A lightweight note summary as grouped under a calendar date.
#[derive(Debug, Clone, Serialize)]
pub struct CalendarEntry {
    pub id: i64,
    pub title: String,
    pub area: Option<String>,
    pub tags: Vec<String>,
}

/// Aggregate counts over the whole note collection, computed fresh on
/// each call.
#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    pub total_notes: usize,
    /// Counts per area; notes without an area fall under the `"None"` bucket
    pub notes_by_area: std::collections::BTreeMap<String, usize>,
    /// Counts per tag occurrence; a note with N tag entries contributes N
    pub notes_by_tag: std::collections::BTreeMap<String, usize>,
    /// Notes created within the trailing seven days
    pub notes_this_week: usize,
    /// Notes created since the start of the current calendar month
    pub notes_this_month: usize,
}

/// Output formats for single-note export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Html,
    Markdown,
}

impl ExportFormat {
    /// Parses a format name; anything outside {html, markdown} is a
    /// validation error.
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "html" => Ok(ExportFormat::Html),
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            other => Err(NotesError::validation(format!(
                "Invalid export format: {other}. Must be one of: html, markdown"
            ))),
        }
    }

    /// File extension for the suggested download filename.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Html => "html",
            ExportFormat::Markdown => "md",
        }
    }

    /// MIME type for the exported content.
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Html => "text/html; charset=utf-8",
            ExportFormat::Markdown => "text/markdown; charset=utf-8",
        }
    }
}

/// An exported note body with download metadata.
#[derive(Debug, Clone, Serialize)]
pub struct NoteExport {
    pub content: String,
    pub filename: String,
    pub content_type: String,
}

/// Summary of a full-backup restoration.
#[derive(Debug, Clone)]
pub struct RestoreSummary {
    /// Path to the backup archive that was restored
    pub backup_file: PathBuf,
    /// Total number of notes found in the archive
    pub total_notes: usize,
    /// Number of notes written back into the store
    pub notes_restored: usize,
    /// Number of notes skipped because the id already existed
    pub notes_skipped: usize,
    /// Notes that failed to restore: (note id as found in the archive, error)
    pub failed_notes: Vec<(String, String)>,
}

/// Available subcommands for the notekeep CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Create a new note from HTML content
    Create {
        /// HTML body of the note
        #[clap(short, long)]
        content: Option<String>,

        /// Path to a file containing the HTML body
        #[clap(short, long)]
        file: Option<PathBuf>,

        /// Category label for the note
        #[clap(short, long)]
        area: Option<String>,

        /// Tags to attach (comma-separated)
        #[clap(short, long)]
        tags: Option<String>,
    },

    /// View a note by id
    View {
        /// Id of the note to view
        id: i64,

        /// Format output as raw JSON
        #[clap(short, long)]
        json: bool,
    },

    /// List notes with optional filtering and pagination
    List {
        /// Filter notes by area
        #[clap(short, long)]
        area: Option<String>,

        /// Filter notes by tags (comma-separated, all must match)
        #[clap(short, long)]
        tags: Option<String>,

        /// Page size (1-100)
        #[clap(short = 'n', long, default_value_t = DEFAULT_PAGE_SIZE)]
        limit: usize,

        /// Number of matching notes to skip
        #[clap(short, long, default_value_t = 0)]
        offset: usize,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Search notes by keyword with optional filters
    Search {
        /// Keyword to look for (substring, case-insensitive)
        keyword: String,

        /// Filter by area
        #[clap(short, long)]
        area: Option<String>,

        /// Filter by tags (comma-separated, all must match)
        #[clap(short, long)]
        tags: Option<String>,

        /// Fields to search (comma-separated subset of: title, content)
        #[clap(short = 'i', long = "in", default_value = "title,content")]
        search_in: String,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Edit an existing note
    Edit {
        /// Id of the note to edit
        id: i64,

        /// New HTML body
        #[clap(short, long)]
        content: Option<String>,

        /// Path to a file containing the new HTML body
        #[clap(short, long)]
        file: Option<PathBuf>,

        /// New area label
        #[clap(short, long)]
        area: Option<String>,

        /// Remove the area label
        #[clap(long)]
        clear_area: bool,

        /// Replacement tag list (comma-separated; empty string clears)
        #[clap(short, long)]
        tags: Option<String>,
    },

    /// Delete a note by id
    Delete {
        /// Id of the note to delete
        id: i64,

        /// Skip confirmation prompt
        #[clap(short, long)]
        force: bool,
    },

    /// Export a note as HTML or Markdown
    Export {
        /// Id of the note to export
        id: i64,

        /// Output format (html or markdown)
        #[clap(short, long, default_value = "markdown")]
        format: String,

        /// Write to this path instead of stdout
        #[clap(short, long)]
        output: Option<PathBuf>,
    },

    /// Show notes grouped by creation date for a month
    Calendar {
        /// Year (defaults to the current year)
        #[clap(short, long)]
        year: Option<i32>,

        /// Month 1-12 (defaults to the current month)
        #[clap(short, long)]
        month: Option<u32>,
    },

    /// Show aggregate statistics for the collection
    Stats,

    /// List areas, or add one
    Areas {
        /// Create an area with this name
        #[clap(short, long)]
        add: Option<String>,

        /// Color for the created area
        #[clap(short, long)]
        color: Option<String>,
    },

    /// List tags, or add one
    Tags {
        /// Create a tag with this name
        #[clap(short, long)]
        add: Option<String>,

        /// Color for the created tag
        #[clap(short, long)]
        color: Option<String>,
    },

    /// List settings, or change one
    Setting {
        /// Update a setting, written as key=value
        #[clap(short, long)]
        set: Option<String>,
    },

    /// Create a zip backup of all notes
    Backup,

    /// Restore notes from a backup archive
    Restore {
        /// Path to the backup zip file
        backup_file: PathBuf,

        /// Overwrite notes whose id already exists
        #[clap(long)]
        overwrite: bool,
    },

    /// Insert the stock areas, tags, and settings if missing
    Seed,
}
