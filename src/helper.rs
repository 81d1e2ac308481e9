use std::{collections::HashMap, fs, path::Path, sync::{Arc, Mutex}};

use log::{debug, error, trace};
use notify::EventKind;

use crate::{Note, NotesError, Result, SearchField};

/// Handles file system events by updating the notes cache
pub async fn handle_fs_event(event: notify::Event, notes_cache: &Arc<Mutex<HashMap<i64, Note>>>) {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) => {
            for path in event.paths {
                if path.extension().is_some_and(|ext| ext == "json") {
                    match load_note_from_file(&path) {
                        Ok(note) => {
                            if let Ok(mut cache) = notes_cache.lock() {
                                cache.insert(note.id, note);
                                debug!("Updated cache from changed file: {}", path.display());
                            }
                        }
                        Err(e) => {
                            error!(
                                "Failed to load note from changed file {}: {}",
                                path.display(),
                                e
                            );
                        }
                    }
                }
            }
        }
        EventKind::Remove(_) => {
            for path in event.paths {
                if path.extension().is_some_and(|ext| ext == "json") {
                    if let Some(note_id) = note_id_from_path(&path) {
                        if let Ok(mut cache) = notes_cache.lock() {
                            if cache.remove(&note_id).is_some() {
                                debug!("Removed note {} from cache after file deletion", note_id);
                            }
                        }
                    }
                }
            }
        }
        _ => {
            // Ignore other events
        }
    }
}

/// Parses the numeric note id from a `<id>.json` file path.
pub fn note_id_from_path(path: &Path) -> Option<i64> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.parse::<i64>().ok())
}

/// Helper method to load a single note from file
pub fn load_note_from_file(path: &Path) -> Result<Note> {
    trace!("Loading note from file: {}", path.display());
    let content = fs::read_to_string(path).map_err(|e| {
        error!("Failed to open note file {}: {}", path.display(), e);
        NotesError::Io(e)
    })?;

    let note: Note = serde_json::from_str(&content)?;

    if note.id < 1 {
        let message = format!("Note from {} has an invalid id", path.display());
        error!("{}", message);
        return Err(NotesError::Validation { message });
    }

    trace!("Successfully loaded note: {}", note.id);
    Ok(note)
}

/// Parses a comma-separated tag argument into a clean tag list.
pub fn parse_tags(tags: Option<String>) -> Vec<String> {
    tags.map(|t| {
        t.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

/// Parses a comma-separated `search_in` argument into search fields.
/// Anything outside {title, content} is a validation error.
pub fn parse_search_fields(fields: &str) -> Result<Vec<SearchField>> {
    let mut parsed = Vec::new();
    for raw in fields.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        match raw.to_ascii_lowercase().as_str() {
            "title" => parsed.push(SearchField::Title),
            "content" => parsed.push(SearchField::Content),
            other => {
                return Err(NotesError::validation(format!(
                    "Invalid search field: {other}. Must be one of: title, content"
                )))
            }
        }
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tags_splits_and_trims() {
        assert_eq!(
            parse_tags(Some("AI, Python ,,  ".to_string())),
            vec!["AI".to_string(), "Python".to_string()]
        );
        assert!(parse_tags(None).is_empty());
    }

    #[test]
    fn parse_search_fields_accepts_known_fields() {
        assert_eq!(
            parse_search_fields("title,content").unwrap(),
            vec![SearchField::Title, SearchField::Content]
        );
        assert!(parse_search_fields("body").is_err());
    }

    #[test]
    fn note_id_from_path_parses_stem() {
        assert_eq!(note_id_from_path(Path::new("/x/07/42.json")), Some(42));
        assert_eq!(note_id_from_path(Path::new("/x/areas.json")), None);
    }
}
