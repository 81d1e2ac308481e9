//! Aggregate statistics over the note collection.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, TimeZone, Utc};
use log::debug;

use crate::{NoteStorage, Result, Statistics};

/// Computes collection-wide counts as of the storage clock's now.
///
/// Everything is calculated fresh on each call; there is no cache or
/// incremental maintenance. Under concurrent writes the individual counts
/// may observe slightly different snapshots (read-committed, not a
/// point-in-time snapshot), an accepted tradeoff for a read-only,
/// infrequent operation.
pub fn collect_statistics(storage: &NoteStorage) -> Result<Statistics> {
    let now = storage.now();
    let notes = storage.notes_snapshot()?;

    let total_notes = notes.len();

    // Absent areas are bucketed under a literal "None" label, not dropped
    let mut notes_by_area: BTreeMap<String, usize> = BTreeMap::new();
    for note in &notes {
        let bucket = note.area.clone().unwrap_or_else(|| "None".to_string());
        *notes_by_area.entry(bucket).or_insert(0) += 1;
    }

    // Multi-count: a note contributes one increment per tag entry
    let mut notes_by_tag: BTreeMap<String, usize> = BTreeMap::new();
    for note in &notes {
        for tag in &note.tags {
            *notes_by_tag.entry(tag.clone()).or_insert(0) += 1;
        }
    }

    let week_ago = now - Duration::days(7);
    let notes_this_week = notes
        .iter()
        .filter(|note| note.created_at >= week_ago)
        .count();

    let month_start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now);
    let notes_this_month = notes
        .iter()
        .filter(|note| note.created_at >= month_start)
        .count();

    debug!(
        "Computed statistics over {} notes ({} areas, {} tags)",
        total_notes,
        notes_by_area.len(),
        notes_by_tag.len()
    );

    Ok(Statistics {
        total_notes,
        notes_by_area,
        notes_by_tag,
        notes_this_week,
        notes_this_month,
    })
}
