//! End-to-end flow through the public API: create, query, aggregate,
//! export, and delete against a real on-disk store.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use notekeep::{
    calendar_notes, collect_statistics, export_note, search_notes, Config, ExportFormat,
    ListQuery, ManualClock, NoteDraft, NotePatch, NoteStorage, NotesError, SearchRequest,
};

fn storage_at(dir: &std::path::Path) -> (NoteStorage, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 6, 10, 9, 0, 0).unwrap(),
    ));
    let storage = NoteStorage::with_clock(Config::with_data_dir(dir), clock.clone()).unwrap();
    (storage, clock)
}

#[test]
fn full_note_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let (storage, clock) = storage_at(dir.path());

    // Create two notes a minute apart
    let first = storage
        .create_note(NoteDraft {
            html_content: "<p>Learning <b>Rust</b> ownership</p>".to_string(),
            area: Some("Learning".to_string()),
            tags: vec!["AI".to_string(), "Python".to_string()],
        })
        .unwrap();
    clock.advance(Duration::minutes(1));
    let second = storage
        .create_note(NoteDraft {
            html_content: "<p>Shopping list</p>".to_string(),
            area: None,
            tags: vec!["AI".to_string()],
        })
        .unwrap();

    assert_eq!(first.title, "2025-06-10_09-00");
    assert_eq!(first.plaintext, "Learning Rust ownership");
    assert!(first.markdown_content.contains("**Rust**"));

    // Tag intersection: both tags -> only the first note
    let page = storage
        .list_notes(&ListQuery {
            tags: vec!["AI".to_string(), "Python".to_string()],
            ..Default::default()
        })
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.notes[0].id, first.id);

    // Single tag -> both, newest modification first
    let page = storage
        .list_notes(&ListQuery {
            tags: vec!["AI".to_string()],
            ..Default::default()
        })
        .unwrap();
    let ids: Vec<i64> = page.notes.iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);

    // Case-insensitive substring search with a snippet
    let results = search_notes(
        &storage,
        &SearchRequest {
            keyword: "rust".to_string(),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].snippet, "Learning Rust ownership");

    // Calendar groups by creation date, sparsely
    let calendar = calendar_notes(&storage, Some(2025), Some(6)).unwrap();
    assert_eq!(calendar.len(), 1);
    assert_eq!(calendar["2025-06-10"].len(), 2);

    // Statistics: "None" bucket plus tag multi-count
    let stats = collect_statistics(&storage).unwrap();
    assert_eq!(stats.total_notes, 2);
    assert_eq!(stats.notes_by_area.get("Learning"), Some(&1));
    assert_eq!(stats.notes_by_area.get("None"), Some(&1));
    assert_eq!(stats.notes_by_tag.get("AI"), Some(&2));
    assert_eq!(stats.notes_this_week, 2);

    // Export falls back to html, markdown as requested
    let export = export_note(&storage, first.id, ExportFormat::Markdown).unwrap();
    assert!(export.content.contains("**Rust**"));
    assert_eq!(export.filename, "2025-06-10_09-00.md");

    // Update only the area: derived fields stay, modified_at advances
    clock.advance(Duration::minutes(5));
    let updated = storage
        .update_note(
            first.id,
            NotePatch {
                area: Some(Some("Personal".to_string())),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.plaintext, first.plaintext);
    assert!(updated.modified_at > first.modified_at);

    // Delete is idempotent in its reporting
    assert!(storage.delete_note(second.id).unwrap());
    assert!(!storage.delete_note(second.id).unwrap());
    assert!(matches!(
        storage.update_note(second.id, NotePatch::default()),
        Err(NotesError::NoteNotFound { .. })
    ));
}

#[test]
fn state_survives_reopening_the_store() {
    let dir = tempfile::tempdir().unwrap();

    let note_id = {
        let (storage, _clock) = storage_at(dir.path());
        storage.seed_defaults().unwrap();
        storage
            .create_note(NoteDraft {
                html_content: "<p>durable</p>".to_string(),
                area: Some("Learning".to_string()),
                tags: vec!["Tutorial".to_string()],
            })
            .unwrap()
            .id
    };

    let (reopened, _clock) = storage_at(dir.path());
    let note = reopened.get_note(note_id).unwrap();
    assert_eq!(note.plaintext, "durable");
    assert_eq!(reopened.list_areas().unwrap().len(), 4);
    assert_eq!(reopened.list_tags().unwrap().len(), 7);

    // The id sequence picks up where it left off
    let next = reopened
        .create_note(NoteDraft {
            html_content: "<p>after reopen</p>".to_string(),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(next.id, note_id + 1);
}

#[test]
fn backup_archive_restores_deleted_notes() {
    let dir = tempfile::tempdir().unwrap();
    let (storage, _clock) = storage_at(dir.path());

    let note = storage
        .create_note(NoteDraft {
            html_content: "<p>precious</p>".to_string(),
            ..Default::default()
        })
        .unwrap();

    let archive = storage.create_full_backup().unwrap();
    storage.delete_note(note.id).unwrap();

    let summary = storage.restore_full_backup(&archive, false).unwrap();
    assert_eq!(summary.notes_restored, 1);
    assert_eq!(storage.get_note(note.id).unwrap().plaintext, "precious");
}
