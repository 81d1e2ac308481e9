//! Read-side queries over the note collection: keyword search with
//! snippets, and calendar grouping by creation date.
//!
//! Everything here works from a snapshot of the store and never writes.

use std::collections::BTreeMap;

use chrono::Datelike;
use log::debug;

use crate::storage::{note_matches, sort_by_modified_desc};
use crate::{
    CalendarEntry, NoteStorage, NotesError, Result, SearchField, SearchRequest, SearchResult,
    SNIPPET_LENGTH,
};

/// Searches notes by keyword and filters.
///
/// The keyword is matched **case-insensitively** as a plain substring (no
/// ranking, tokenization, or stemming) against the title and/or plaintext
/// depending on `search_in`; the selected fields OR-combine. The area and
/// tag filters AND-combine with the keyword condition and with each other.
/// An empty keyword (or an empty `search_in`) applies no keyword
/// constraint, leaving the remaining filters in force.
///
/// Results are ordered by `modified_at` descending and each carries a
/// snippet of the note's plaintext.
pub fn search_notes(storage: &NoteStorage, request: &SearchRequest) -> Result<Vec<SearchResult>> {
    let keyword = request.keyword.trim().to_lowercase();

    let mut matching: Vec<_> = storage
        .notes_snapshot()?
        .into_iter()
        .filter(|note| note_matches(note, request.area.as_deref(), &request.tags))
        .filter(|note| {
            if keyword.is_empty() || request.search_in.is_empty() {
                return true;
            }
            request.search_in.iter().any(|field| match field {
                SearchField::Title => note.title.to_lowercase().contains(&keyword),
                SearchField::Content => note.plaintext.to_lowercase().contains(&keyword),
            })
        })
        .collect();
    sort_by_modified_desc(&mut matching);

    debug!(
        "Search for {:?} matched {} notes",
        request.keyword,
        matching.len()
    );

    Ok(matching
        .into_iter()
        .map(|note| SearchResult {
            id: note.id,
            title: note.title,
            snippet: make_snippet(&note.plaintext),
            area: note.area,
            tags: note.tags,
            created_at: note.created_at,
        })
        .collect())
}

/// Builds the bounded plaintext preview for a search hit: the first
/// [`SNIPPET_LENGTH`] characters, with a trailing `...` when the
/// plaintext is longer. Empty plaintext yields an empty snippet.
pub(crate) fn make_snippet(plaintext: &str) -> String {
    let mut snippet: String = plaintext.chars().take(SNIPPET_LENGTH).collect();
    if plaintext.chars().count() > SNIPPET_LENGTH {
        snippet.push_str("...");
    }
    snippet
}

/// Groups notes created in the given month by their creation date.
///
/// Year and month default to the storage clock's current ones. Keys are
/// `YYYY-MM-DD` strings; each list is ordered by `created_at` descending.
/// Days without notes produce no key at all; the mapping is sparse.
pub fn calendar_notes(
    storage: &NoteStorage,
    year: Option<i32>,
    month: Option<u32>,
) -> Result<BTreeMap<String, Vec<CalendarEntry>>> {
    let now = storage.now();
    let year = year.unwrap_or_else(|| now.year());
    let month = month.unwrap_or_else(|| now.month());

    if !(1..=12).contains(&month) {
        return Err(NotesError::validation(format!(
            "month must be between 1 and 12, got {}",
            month
        )));
    }

    let mut in_month: Vec<_> = storage
        .notes_snapshot()?
        .into_iter()
        .filter(|note| note.created_at.year() == year && note.created_at.month() == month)
        .collect();
    in_month.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

    let mut calendar: BTreeMap<String, Vec<CalendarEntry>> = BTreeMap::new();
    for note in in_month {
        let date_key = note.created_at.format("%Y-%m-%d").to_string();
        calendar.entry(date_key).or_default().push(CalendarEntry {
            id: note.id,
            title: note.title,
            area: note.area,
            tags: note.tags,
        });
    }

    Ok(calendar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Config, ListQuery, ManualClock, NoteDraft, NotePatch};
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn test_storage() -> (NoteStorage, TempDir, Arc<ManualClock>) {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 15, 10, 0, 0).unwrap(),
        ));
        let storage =
            NoteStorage::with_clock(Config::with_data_dir(dir.path()), clock.clone()).unwrap();
        (storage, dir, clock)
    }

    fn create(storage: &NoteStorage, html: &str, area: Option<&str>, tags: &[&str]) -> i64 {
        storage
            .create_note(NoteDraft {
                html_content: html.to_string(),
                area: area.map(str::to_string),
                tags: tags.iter().map(|t| t.to_string()).collect(),
            })
            .unwrap()
            .id
    }

    #[test]
    fn search_matches_substring_case_insensitively() {
        let (storage, _dir, _clock) = test_storage();
        let id = create(&storage, "<p>Rust ownership notes</p>", None, &[]);
        create(&storage, "<p>gardening</p>", None, &[]);

        let results = search_notes(
            &storage,
            &SearchRequest {
                keyword: "OWNERSHIP".to_string(),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, id);
    }

    #[test]
    fn search_fields_or_combine() {
        let (storage, _dir, clock) = test_storage();
        // Titles embed the creation timestamp, so pin one note's title to a
        // known minute and search for it.
        let by_title = create(&storage, "<p>nothing relevant</p>", None, &[]);
        clock.advance(Duration::minutes(1));
        let by_content = create(&storage, "<p>about 10-00 oclock</p>", None, &[]);

        let results = search_notes(
            &storage,
            &SearchRequest {
                keyword: "10-00".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
        let ids: Vec<i64> = results.iter().map(|r| r.id).collect();
        assert!(ids.contains(&by_title));
        assert!(ids.contains(&by_content));

        // Restricting to content drops the title-only match
        let content_only = search_notes(
            &storage,
            &SearchRequest {
                keyword: "10-00".to_string(),
                search_in: vec![SearchField::Content],
                ..Default::default()
            },
        )
        .unwrap();
        let ids: Vec<i64> = content_only.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![by_content]);
    }

    #[test]
    fn filters_and_combine_with_keyword() {
        let (storage, _dir, _clock) = test_storage();
        let wanted = create(
            &storage,
            "<p>rust patterns</p>",
            Some("Learning"),
            &["AI"],
        );
        create(&storage, "<p>rust patterns</p>", Some("Personal"), &["AI"]);
        create(&storage, "<p>rust patterns</p>", Some("Learning"), &[]);

        let results = search_notes(
            &storage,
            &SearchRequest {
                keyword: "rust".to_string(),
                area: Some("Learning".to_string()),
                tags: vec!["AI".to_string()],
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, wanted);
    }

    #[test]
    fn empty_keyword_applies_filters_only() {
        let (storage, _dir, _clock) = test_storage();
        create(&storage, "<p>a</p>", Some("X"), &[]);
        create(&storage, "<p>b</p>", Some("Y"), &[]);

        let results = search_notes(
            &storage,
            &SearchRequest {
                area: Some("X".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].area.as_deref(), Some("X"));
    }

    #[test]
    fn results_order_by_modification() {
        let (storage, _dir, clock) = test_storage();
        let older = create(&storage, "<p>match one</p>", None, &[]);
        clock.advance(Duration::minutes(1));
        let newer = create(&storage, "<p>match two</p>", None, &[]);

        clock.advance(Duration::minutes(1));
        storage
            .update_note(
                older,
                NotePatch {
                    area: Some(Some("touched".to_string())),
                    ..Default::default()
                },
            )
            .unwrap();

        let results = search_notes(
            &storage,
            &SearchRequest {
                keyword: "match".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
        let ids: Vec<i64> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![older, newer]);
    }

    #[test]
    fn snippet_is_bounded_and_a_prefix() {
        let word = "abcdefghij ";
        let long_text = word.repeat(30); // well past the snippet limit
        let html = format!("<p>{}</p>", long_text.trim());

        let (storage, _dir, _clock) = test_storage();
        create(&storage, &html, None, &[]);

        let results = search_notes(
            &storage,
            &SearchRequest {
                keyword: "abcdefghij".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
        let snippet = &results[0].snippet;

        assert!(snippet.chars().count() <= SNIPPET_LENGTH + 3);
        assert!(snippet.ends_with("..."));
        let prefix: String = snippet.chars().take(SNIPPET_LENGTH).collect();
        assert!(long_text.starts_with(&prefix));
    }

    #[test]
    fn short_plaintext_snippet_is_untruncated() {
        assert_eq!(make_snippet("short text"), "short text");
        assert_eq!(make_snippet(""), "");

        let exact = "x".repeat(SNIPPET_LENGTH);
        assert_eq!(make_snippet(&exact), exact);

        let over = "x".repeat(SNIPPET_LENGTH + 1);
        let snippet = make_snippet(&over);
        assert_eq!(snippet.chars().count(), SNIPPET_LENGTH + 3);
        assert!(snippet.ends_with("..."));
    }

    #[test]
    fn calendar_groups_by_creation_date_sparsely() {
        let (storage, _dir, clock) = test_storage();
        // Two notes on June 15th, one on June 20th, one in another month
        let first = create(&storage, "<p>one</p>", None, &[]);
        clock.advance(Duration::hours(2));
        let second = create(&storage, "<p>two</p>", Some("X"), &["t"]);
        clock.set(Utc.with_ymd_and_hms(2025, 6, 20, 8, 0, 0).unwrap());
        let later = create(&storage, "<p>three</p>", None, &[]);
        clock.set(Utc.with_ymd_and_hms(2025, 7, 1, 8, 0, 0).unwrap());
        create(&storage, "<p>next month</p>", None, &[]);

        let calendar = calendar_notes(&storage, Some(2025), Some(6)).unwrap();

        assert_eq!(calendar.len(), 2); // empty days produce no key
        let june15 = &calendar["2025-06-15"];
        let ids: Vec<i64> = june15.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![second, first]); // created_at descending
        assert_eq!(calendar["2025-06-20"][0].id, later);
    }

    #[test]
    fn calendar_defaults_to_current_month() {
        let (storage, _dir, clock) = test_storage();
        create(&storage, "<p>now</p>", None, &[]);
        clock.set(Utc.with_ymd_and_hms(2025, 7, 2, 9, 0, 0).unwrap());
        create(&storage, "<p>july</p>", None, &[]);

        // Clock currently says July 2025
        let calendar = calendar_notes(&storage, None, None).unwrap();
        assert_eq!(calendar.len(), 1);
        assert!(calendar.contains_key("2025-07-02"));
    }

    #[test]
    fn calendar_rejects_invalid_month() {
        let (storage, _dir, _clock) = test_storage();
        let err = calendar_notes(&storage, Some(2025), Some(13)).unwrap_err();
        assert!(matches!(err, NotesError::Validation { .. }));
    }

    #[test]
    fn query_layer_never_writes() {
        let (storage, _dir, _clock) = test_storage();
        create(&storage, "<p>stable</p>", None, &[]);

        search_notes(&storage, &SearchRequest::default()).unwrap();
        calendar_notes(&storage, None, None).unwrap();

        let page = storage.list_notes(&ListQuery::default()).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.notes[0].plaintext, "stable");
    }
}
