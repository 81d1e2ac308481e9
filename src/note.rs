//! Core data records for the notekeep backend.
//!
//! This module contains the persisted entities: [`Note`] plus the
//! [`Area`]/[`Tag`]/[`Setting`] catalog records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Format of the auto-generated note title, rendered from the creation time.
pub const TITLE_FORMAT: &str = "%Y-%m-%d_%H-%M";

/// A single note. The HTML body is authoritative; `plaintext` and
/// `markdown_content` are derived from it and re-computed by the store on
/// every write that changes `html_content`, so the three representations
/// never diverge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier, assigned by the store on creation
    pub id: i64,
    /// Auto-generated title (creation timestamp, `YYYY-MM-DD_HH-MM`);
    /// not editable after creation
    pub title: String,
    /// The note body as authored, in HTML
    pub html_content: String,
    /// Markup-free text derived from `html_content`, used for search
    pub plaintext: String,
    /// Markdown rendition derived from `html_content`, used for export
    pub markdown_content: String,
    /// Free-text category label; not a reference into the area catalog
    pub area: Option<String>,
    /// Ordered labels, duplicates permitted, may be empty; never null
    #[serde(default)]
    pub tags: Vec<String>,
    /// Set once at creation, never mutated
    pub created_at: DateTime<Utc>,
    /// Refreshed on every successful update; always >= `created_at`
    pub modified_at: DateTime<Utc>,
}

impl Note {
    /// Renders the auto-generated title for a note created at `at`.
    pub fn title_for(at: DateTime<Utc>) -> String {
        at.format(TITLE_FORMAT).to_string()
    }
}

/// A category label in the pick-list catalog. Intentionally not linked to
/// `Note.area` by any referential constraint: deleting or renaming a
/// catalog entry leaves existing notes untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Area {
    pub id: i64,
    pub name: String,
    pub color: String,
}

/// A label in the pick-list catalog. Same denormalization as [`Area`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub color: String,
}

/// A key/value application setting; the key is the identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

/// Default swatch for areas created without an explicit color.
pub const DEFAULT_AREA_COLOR: &str = "#3B82F6";

/// Default swatch for tags created without an explicit color.
pub const DEFAULT_TAG_COLOR: &str = "#6B7280";

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn title_uses_creation_minute() {
        let at = Utc.with_ymd_and_hms(2025, 1, 7, 9, 30, 59).unwrap();
        assert_eq!(Note::title_for(at), "2025-01-07_09-30");
    }
}
