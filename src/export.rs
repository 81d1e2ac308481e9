//! Single-note export as raw HTML or Markdown.

use log::info;

use crate::{content, ExportFormat, NoteExport, NoteStorage, NotesError, Result};

/// Exports one note in the requested format.
///
/// Returns the raw content string plus a suggested download filename
/// (`<title>.<ext>`) and content type. For Markdown, an empty cached
/// `markdown_content` is re-derived from the stored HTML on the fly, so
/// the export never goes out empty while the note has a body.
pub fn export_note(storage: &NoteStorage, note_id: i64, format: ExportFormat) -> Result<NoteExport> {
    let note = storage
        .get_note(note_id)
        .ok_or(NotesError::NoteNotFound { id: note_id })?;

    let content = match format {
        ExportFormat::Html => note.html_content,
        ExportFormat::Markdown => {
            if note.markdown_content.trim().is_empty() {
                content::html_to_markdown(&note.html_content)
            } else {
                note.markdown_content
            }
        }
    };

    let filename = format!("{}.{}", sanitize_filename(&note.title), format.extension());
    info!("Exported note {} as {}", note_id, filename);

    Ok(NoteExport {
        content,
        filename,
        content_type: format.content_type().to_string(),
    })
}

/// Replaces characters that are unsafe in filenames.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Config, ManualClock, NoteDraft};
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn test_storage() -> (NoteStorage, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 15, 10, 0, 0).unwrap(),
        ));
        let storage =
            NoteStorage::with_clock(Config::with_data_dir(dir.path()), clock).unwrap();
        (storage, dir)
    }

    #[test]
    fn html_export_returns_raw_body() {
        let (storage, _dir) = test_storage();
        let note = storage
            .create_note(NoteDraft {
                html_content: "<p>Hello <b>World</b></p>".to_string(),
                ..Default::default()
            })
            .unwrap();

        let export = export_note(&storage, note.id, ExportFormat::Html).unwrap();
        assert_eq!(export.content, "<p>Hello <b>World</b></p>");
        assert_eq!(export.filename, "2025-06-15_10-00.html");
        assert_eq!(export.content_type, "text/html; charset=utf-8");
    }

    #[test]
    fn markdown_export_uses_cached_rendition() {
        let (storage, _dir) = test_storage();
        let note = storage
            .create_note(NoteDraft {
                html_content: "<p>Hello <b>World</b></p>".to_string(),
                ..Default::default()
            })
            .unwrap();

        let export = export_note(&storage, note.id, ExportFormat::Markdown).unwrap();
        assert!(export.content.contains("Hello **World**"));
        assert_eq!(export.filename, "2025-06-15_10-00.md");
        assert_eq!(export.content_type, "text/markdown; charset=utf-8");
    }

    #[test]
    fn markdown_export_rederives_when_cached_field_is_empty() {
        let (storage, dir) = test_storage();
        let note = storage
            .create_note(NoteDraft {
                html_content: "<p>fallback <em>case</em></p>".to_string(),
                ..Default::default()
            })
            .unwrap();

        // Blank the derived field in the persisted file, as an external
        // editor could, and reload the cache from disk.
        let mut damaged = storage.get_note(note.id).unwrap();
        damaged.markdown_content = String::new();
        let note_file = dir
            .path()
            .join("notes")
            .join(format!("{:02}", note.id % 100))
            .join(format!("{}.json", note.id));
        std::fs::write(&note_file, serde_json::to_string_pretty(&damaged).unwrap()).unwrap();
        storage.load_notes().unwrap();
        assert!(storage.get_note(note.id).unwrap().markdown_content.is_empty());

        let export = export_note(&storage, note.id, ExportFormat::Markdown).unwrap();
        assert!(export.content.contains("fallback *case*"));
    }

    #[test]
    fn export_missing_note_is_not_found() {
        let (storage, _dir) = test_storage();
        let err = export_note(&storage, 99, ExportFormat::Html).unwrap_err();
        assert!(matches!(err, NotesError::NoteNotFound { id: 99 }));
    }

    #[test]
    fn format_parsing_validates_input() {
        assert_eq!(ExportFormat::parse("html").unwrap(), ExportFormat::Html);
        assert_eq!(
            ExportFormat::parse("Markdown").unwrap(),
            ExportFormat::Markdown
        );
        let err = ExportFormat::parse("pdf").unwrap_err();
        assert!(matches!(err, NotesError::Validation { .. }));
    }

    #[test]
    fn filenames_are_sanitized() {
        assert_eq!(sanitize_filename("2025-06-15_10-00"), "2025-06-15_10-00");
        assert_eq!(sanitize_filename("a/b\\c"), "a_b_c");
    }
}
