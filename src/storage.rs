use std::{
    collections::{HashMap, HashSet},
    fs::{self, File},
    io::{Read, Write},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicI64, Ordering},
        mpsc as std_mpsc, Arc, Mutex, MutexGuard,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;
use tokio::sync::mpsc;
use walkdir::WalkDir;
use zip::{write::FileOptions, ZipArchive, ZipWriter};

use crate::{
    content, handle_fs_event, load_note_from_file, Area, Clock, Config, ListQuery, Note,
    NoteDraft, NotePage, NotePatch, NotesError, RestoreSummary, Result, Setting, SystemClock,
    Tag, DEFAULT_AREA_COLOR, DEFAULT_TAG_COLOR, MAX_PAGE_SIZE,
};

/// Manages the storage, retrieval, and consistency of notes and the
/// area/tag/setting catalogs.
///
/// Notes are persisted one JSON file each under the notes directory and
/// mirrored by an in-memory cache; catalogs are single JSON files. Every
/// write lands atomically (temp file + rename), so a reader never observes
/// a note whose derived fields lag its HTML body.
///
/// Known limitation: there is no per-note locking. Concurrent updates or
/// an update racing a delete on the same id are undefined behavior under
/// the single-writer-per-note assumption.
pub struct NoteStorage {
    /// Application configuration
    config: Config,

    /// Time source used for titles, timestamps, and aggregate windows
    clock: Arc<dyn Clock>,

    /// In-memory cache of notes, indexed by note id
    notes_cache: Arc<Mutex<HashMap<i64, Note>>>,

    /// Area pick-list catalog
    areas: Arc<Mutex<Vec<Area>>>,

    /// Tag pick-list catalog
    tags: Arc<Mutex<Vec<Tag>>>,

    /// Application settings
    settings: Arc<Mutex<Vec<Setting>>>,

    /// Next id to hand out on note creation
    next_note_id: Arc<AtomicI64>,

    /// File system watcher for external edits to note files
    watcher: Option<RecommendedWatcher>,
}

/// Acquires a mutex or reports lock poisoning as a storage failure.
fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>> {
    mutex.lock().map_err(|_| NotesError::LockPoisoned {
        message: format!("Failed to acquire lock on {}", what),
    })
}

/// Serializes `value` to JSON and writes it atomically: the bytes go to a
/// temporary file in the target directory, which is then renamed over the
/// destination.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }

    let mut temp_file = NamedTempFile::new_in(dir)?;
    let json = serde_json::to_string_pretty(value)?;
    temp_file.write_all(json.as_bytes())?;
    temp_file.flush()?;
    temp_file.persist(path).map_err(|e| {
        error!("Failed to persist file {}: {}", path.display(), e.error);
        NotesError::Io(e.error)
    })?;
    Ok(())
}

fn read_json_if_present<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

/// The shared filter predicate behind listing, counting, and search.
/// `area` is an exact match; `tags` is AND-combined membership over the
/// note's ordered tag sequence. Empty filters constrain nothing.
pub(crate) fn note_matches(note: &Note, area: Option<&str>, tags: &[String]) -> bool {
    if let Some(area_filter) = area {
        if note.area.as_deref() != Some(area_filter) {
            return false;
        }
    }
    tags.iter().all(|tag| note.tags.iter().any(|t| t == tag))
}

/// Default ordering for listings: most recently touched first.
pub(crate) fn sort_by_modified_desc(notes: &mut [Note]) {
    notes.sort_by(|a, b| b.modified_at.cmp(&a.modified_at).then(b.id.cmp(&a.id)));
}

impl NoteStorage {
    /// Opens a storage instance rooted at the configured data directory,
    /// creating the directory layout if needed and loading all persisted
    /// state into memory. Uses the system wall clock.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Like [`NoteStorage::new`] but with an explicit time source, so
    /// titles and timestamps are deterministic under test.
    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let notes_dir = config.notes_dir();
        for dir in [&config.data_dir, &notes_dir, &config.backup_dir] {
            if !dir.exists() {
                debug!("Creating directory: {}", dir.display());
                fs::create_dir_all(dir).map_err(|e| {
                    error!("Failed to create directory {}: {}", dir.display(), e);
                    NotesError::DirectoryError { path: dir.clone() }
                })?;
            }
        }

        let storage = Self {
            config,
            clock,
            notes_cache: Arc::new(Mutex::new(HashMap::new())),
            areas: Arc::new(Mutex::new(Vec::new())),
            tags: Arc::new(Mutex::new(Vec::new())),
            settings: Arc::new(Mutex::new(Vec::new())),
            next_note_id: Arc::new(AtomicI64::new(1)),
            watcher: None,
        };

        storage.load_notes()?;
        storage.load_catalogs()?;
        Ok(storage)
    }

    /// Loads all notes from disk into the in-memory cache and re-seats the
    /// id counter past the highest id seen.
    ///
    /// Returns the number of notes loaded. Files that fail to parse are
    /// logged and skipped; they do not abort the load.
    pub fn load_notes(&self) -> Result<usize> {
        let notes_dir = self.config.notes_dir();
        if !notes_dir.exists() {
            fs::create_dir_all(&notes_dir)?;
            return Ok(0);
        }

        // Buffer everything before taking the lock so it is held only for
        // one batch insert.
        let mut notes_buffer = HashMap::new();
        let mut load_errors = 0usize;
        let mut max_id = 0i64;

        for entry in WalkDir::new(&notes_dir)
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                match load_note_from_file(path) {
                    Ok(note) => {
                        max_id = max_id.max(note.id);
                        notes_buffer.insert(note.id, note);
                    }
                    Err(e) => {
                        warn!("Failed to load note from {}: {}", path.display(), e);
                        load_errors += 1;
                    }
                }
            }
        }

        let notes_count = notes_buffer.len();
        {
            let mut cache = lock(&self.notes_cache, "notes cache")?;
            cache.clear();
            cache.extend(notes_buffer);
        }
        self.next_note_id.fetch_max(max_id + 1, Ordering::SeqCst);

        if load_errors > 0 {
            error!("Encountered {} errors while loading notes", load_errors);
        }
        info!("Loaded {} notes into cache", notes_count);
        Ok(notes_count)
    }

    fn load_catalogs(&self) -> Result<()> {
        if let Some(areas) = read_json_if_present::<Vec<Area>>(&self.config.areas_path())? {
            *lock(&self.areas, "area catalog")? = areas;
        }
        if let Some(tags) = read_json_if_present::<Vec<Tag>>(&self.config.tags_path())? {
            *lock(&self.tags, "tag catalog")? = tags;
        }
        if let Some(settings) = read_json_if_present::<Vec<Setting>>(&self.config.settings_path())?
        {
            *lock(&self.settings, "settings")? = settings;
        }
        Ok(())
    }

    /// Current time as seen by the storage clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Helper method to get the file path for a note
    fn note_path(&self, note_id: i64) -> PathBuf {
        // notes/<id % 100>/<id>.json keeps individual directories small
        let shard = format!("{:02}", note_id.rem_euclid(100));
        self.config
            .notes_dir()
            .join(shard)
            .join(format!("{}.json", note_id))
    }

    /// Writes a note to its file atomically, then mirrors it in the cache.
    fn persist_note(&self, note: &Note) -> Result<()> {
        let file_path = self.note_path(note.id);
        debug!("Writing note {} to {}", note.id, file_path.display());
        write_json_atomic(&file_path, note)?;

        let mut cache = lock(&self.notes_cache, "notes cache")?;
        cache.insert(note.id, note.clone());
        Ok(())
    }

    /// Creates a note from a draft.
    ///
    /// The title is generated from the clock (`YYYY-MM-DD_HH-MM`), the
    /// plaintext and Markdown representations are derived from the HTML
    /// body in the same step, and the whole record is persisted atomically.
    pub fn create_note(&self, draft: NoteDraft) -> Result<Note> {
        if draft.html_content.trim().is_empty() {
            return Err(NotesError::validation("html_content must not be empty"));
        }

        let now = self.clock.now();
        let (plaintext, markdown_content) = content::derive(&draft.html_content);
        let id = self.next_note_id.fetch_add(1, Ordering::SeqCst);

        let note = Note {
            id,
            title: Note::title_for(now),
            html_content: draft.html_content,
            plaintext,
            markdown_content,
            area: draft.area,
            tags: draft.tags,
            created_at: now,
            modified_at: now,
        };

        self.persist_note(&note)?;
        info!("Created note {} ({})", note.id, note.title);
        Ok(note)
    }

    /// Retrieves a note by its id.
    /// Returns Some(Note) if found, or None if not found.
    pub fn get_note(&self, note_id: i64) -> Option<Note> {
        match self.notes_cache.lock() {
            Ok(cache) => {
                if let Some(note) = cache.get(&note_id) {
                    return Some(note.clone());
                }
            }
            Err(e) => {
                error!("Failed to acquire lock on cache: {}", e);
                // Fall through to the file system check
            }
        }

        // Not in cache; the file may have appeared behind our back.
        let file_path = self.note_path(note_id);
        if file_path.exists() {
            match load_note_from_file(&file_path) {
                Ok(note) => {
                    if let Ok(mut cache) = self.notes_cache.lock() {
                        cache.insert(note_id, note.clone());
                    }
                    return Some(note);
                }
                Err(e) => {
                    error!("Error loading note from file: {}", e);
                    return None;
                }
            }
        }

        debug!("Note not found: {}", note_id);
        None
    }

    /// Applies a partial update to a note.
    ///
    /// Only supplied fields change. Supplying `html_content` re-derives
    /// plaintext and Markdown before anything is persisted, so the stored
    /// representations never diverge. `modified_at` is refreshed on every
    /// successful update, even when no content field changed.
    pub fn update_note(&self, note_id: i64, patch: NotePatch) -> Result<Note> {
        let mut note = self
            .get_note(note_id)
            .ok_or(NotesError::NoteNotFound { id: note_id })?;

        if let Some(html_content) = patch.html_content {
            if html_content.trim().is_empty() {
                return Err(NotesError::validation("html_content must not be empty"));
            }
            let (plaintext, markdown_content) = content::derive(&html_content);
            note.html_content = html_content;
            note.plaintext = plaintext;
            note.markdown_content = markdown_content;
        }

        if let Some(area) = patch.area {
            note.area = area;
        }

        // The tag sequence is never null: a supplied empty list becomes an
        // empty sequence, an absent field leaves the current one in place.
        if let Some(tags) = patch.tags {
            note.tags = tags;
        }

        note.modified_at = self.clock.now();
        self.persist_note(&note)?;
        info!("Note {} updated", note_id);
        Ok(note)
    }

    /// Deletes a note by id.
    ///
    /// Returns `Ok(true)` if a record existed and was removed, `Ok(false)`
    /// if the id was unknown. No cascading side effects.
    pub fn delete_note(&self, note_id: i64) -> Result<bool> {
        if self.get_note(note_id).is_none() {
            debug!("Cannot delete note {}: not found", note_id);
            return Ok(false);
        }

        let file_path = self.note_path(note_id);
        if file_path.exists() {
            fs::remove_file(&file_path)?;
            if let Some(parent) = file_path.parent() {
                self.cleanup_empty_directory(parent);
            }
        }

        let mut cache = lock(&self.notes_cache, "notes cache")?;
        cache.remove(&note_id);
        drop(cache);

        info!("Note {} deleted", note_id);
        Ok(true)
    }

    /// Removes a shard directory once its last note file is gone.
    fn cleanup_empty_directory(&self, dir_path: &Path) {
        if !dir_path.exists() || dir_path == self.config.notes_dir() {
            return;
        }
        match fs::read_dir(dir_path) {
            Ok(entries) => {
                if entries.count() == 0 {
                    if let Err(e) = fs::remove_dir(dir_path) {
                        warn!(
                            "Failed to remove empty directory {}: {}",
                            dir_path.display(),
                            e
                        );
                    }
                }
            }
            Err(e) => warn!("Failed to read directory {}: {}", dir_path.display(), e),
        }
    }

    /// Lists notes matching the query, newest modification first, with
    /// offset/limit pagination. `total` counts every match, not just the
    /// returned page, so callers can compute page counts without fetching
    /// all rows.
    pub fn list_notes(&self, query: &ListQuery) -> Result<NotePage> {
        if query.limit < 1 || query.limit > MAX_PAGE_SIZE {
            return Err(NotesError::validation(format!(
                "limit must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, query.limit
            )));
        }

        let mut matching: Vec<Note> = self
            .notes_snapshot()?
            .into_iter()
            .filter(|note| note_matches(note, query.area.as_deref(), &query.tags))
            .collect();
        sort_by_modified_desc(&mut matching);

        let total = matching.len();
        let notes = matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect();

        Ok(NotePage { notes, total })
    }

    /// Counts notes matching the same predicates as [`NoteStorage::list_notes`].
    pub fn count_notes(&self, area: Option<&str>, tags: &[String]) -> Result<usize> {
        let cache = lock(&self.notes_cache, "notes cache")?;
        Ok(cache
            .values()
            .filter(|note| note_matches(note, area, tags))
            .count())
    }

    /// Clones the current note collection out of the cache. The query and
    /// statistics layers work from this snapshot so they never hold the
    /// cache lock while computing.
    pub fn notes_snapshot(&self) -> Result<Vec<Note>> {
        let cache = lock(&self.notes_cache, "notes cache")?;
        Ok(cache.values().cloned().collect())
    }

    // Catalog operations. Areas and tags are pick-lists only; nothing here
    // touches the free-text labels already stored on notes.

    /// Returns all areas, ordered by id.
    pub fn list_areas(&self) -> Result<Vec<Area>> {
        let areas = lock(&self.areas, "area catalog")?;
        let mut out = areas.clone();
        out.sort_by_key(|a| a.id);
        Ok(out)
    }

    /// Creates an area with a unique name.
    pub fn create_area(&self, name: &str, color: Option<String>) -> Result<Area> {
        let name = name.trim();
        if name.is_empty() {
            return Err(NotesError::validation("area name must not be empty"));
        }

        let mut areas = lock(&self.areas, "area catalog")?;
        if areas.iter().any(|a| a.name == name) {
            return Err(NotesError::AreaAlreadyExists {
                name: name.to_string(),
            });
        }

        let id = areas.iter().map(|a| a.id).max().unwrap_or(0) + 1;
        let area = Area {
            id,
            name: name.to_string(),
            color: color.unwrap_or_else(|| DEFAULT_AREA_COLOR.to_string()),
        };
        areas.push(area.clone());
        write_json_atomic(&self.config.areas_path(), &*areas)?;

        info!("Created area: {}", area.name);
        Ok(area)
    }

    /// Returns all tags, ordered by id.
    pub fn list_tags(&self) -> Result<Vec<Tag>> {
        let tags = lock(&self.tags, "tag catalog")?;
        let mut out = tags.clone();
        out.sort_by_key(|t| t.id);
        Ok(out)
    }

    /// Creates a tag with a unique name.
    pub fn create_tag(&self, name: &str, color: Option<String>) -> Result<Tag> {
        let name = name.trim();
        if name.is_empty() {
            return Err(NotesError::validation("tag name must not be empty"));
        }

        let mut tags = lock(&self.tags, "tag catalog")?;
        if tags.iter().any(|t| t.name == name) {
            return Err(NotesError::TagAlreadyExists {
                name: name.to_string(),
            });
        }

        let id = tags.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        let tag = Tag {
            id,
            name: name.to_string(),
            color: color.unwrap_or_else(|| DEFAULT_TAG_COLOR.to_string()),
        };
        tags.push(tag.clone());
        write_json_atomic(&self.config.tags_path(), &*tags)?;

        info!("Created tag: {}", tag.name);
        Ok(tag)
    }

    /// Returns all settings, ordered by key.
    pub fn list_settings(&self) -> Result<Vec<Setting>> {
        let settings = lock(&self.settings, "settings")?;
        let mut out = settings.clone();
        out.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(out)
    }

    /// Updates an existing setting value by key.
    pub fn update_setting(&self, key: &str, value: &str) -> Result<Setting> {
        let mut settings = lock(&self.settings, "settings")?;
        let updated = match settings.iter_mut().find(|s| s.key == key) {
            Some(setting) => {
                setting.value = value.to_string();
                setting.clone()
            }
            None => {
                return Err(NotesError::SettingNotFound {
                    key: key.to_string(),
                })
            }
        };
        write_json_atomic(&self.config.settings_path(), &*settings)?;

        info!("Setting {} updated", key);
        Ok(updated)
    }

    /// Inserts the stock areas, tags, and settings wherever they are
    /// missing. Safe to call repeatedly.
    pub fn seed_defaults(&self) -> Result<()> {
        const AREAS: [(&str, &str); 4] = [
            ("Learning", "#10B981"),
            ("Blog Ideas", "#F59E0B"),
            ("Code Snippets", "#8B5CF6"),
            ("Personal", "#EC4899"),
        ];
        const TAGS: [(&str, &str); 7] = [
            ("AI", "#EF4444"),
            ("Python", "#3B82F6"),
            ("Architect", "#10B981"),
            ("Javascript", "#F59E0B"),
            ("Web3", "#8B5CF6"),
            ("Idea", "#EC4899"),
            ("Tutorial", "#6366F1"),
        ];
        const SETTINGS: [(&str, &str); 2] = [("dark_mode", "false"), ("default_area", "Learning")];

        for (name, color) in AREAS {
            match self.create_area(name, Some(color.to_string())) {
                Ok(_) | Err(NotesError::AreaAlreadyExists { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        for (name, color) in TAGS {
            match self.create_tag(name, Some(color.to_string())) {
                Ok(_) | Err(NotesError::TagAlreadyExists { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        let mut settings = lock(&self.settings, "settings")?;
        let mut changed = false;
        for (key, value) in SETTINGS {
            if !settings.iter().any(|s| s.key == key) {
                settings.push(Setting {
                    key: key.to_string(),
                    value: value.to_string(),
                });
                changed = true;
            }
        }
        if changed {
            write_json_atomic(&self.config.settings_path(), &*settings)?;
        }

        info!("Seeded default catalogs");
        Ok(())
    }

    /// Creates a full backup of all notes in a zip archive.
    ///
    /// Returns the path to the created backup file. Older archives beyond
    /// `max_backups` are pruned afterwards.
    pub fn create_full_backup(&self) -> Result<PathBuf> {
        if !self.config.backup_dir.exists() {
            fs::create_dir_all(&self.config.backup_dir).map_err(|e| NotesError::BackupFailed {
                message: e.to_string(),
            })?;
        }

        let timestamp = self.clock.now().format("%Y%m%d_%H%M%S");
        let backup_filename = format!("notekeep_backup_{}.zip", timestamp);
        let backup_path = self.config.backup_dir.join(backup_filename);

        let file = File::create(&backup_path).map_err(|e| NotesError::BackupFailed {
            message: e.to_string(),
        })?;
        let mut zip = ZipWriter::new(file);

        let notes = self.notes_snapshot()?;
        for note in &notes {
            let options = FileOptions::<zip::write::ExtendedFileOptions>::default()
                .compression_method(zip::CompressionMethod::Deflated)
                .unix_permissions(0o644);

            let note_json = serde_json::to_string_pretty(note)?;

            // Mirror the on-disk shard layout inside the archive
            let entry_name = format!("{:02}/{}.json", note.id.rem_euclid(100), note.id);
            zip.start_file(entry_name, options)?;
            zip.write_all(note_json.as_bytes())
                .map_err(|e| NotesError::BackupFailed {
                    message: format!("Failed to write note {} to backup: {}", note.id, e),
                })?;
        }

        zip.finish()?;
        self.cleanup_old_backups()?;

        info!(
            "Full backup created with {} notes at {}",
            notes.len(),
            backup_path.display()
        );
        Ok(backup_path)
    }

    /// Removes old backup archives beyond the configured limit, oldest
    /// first. A limit of 0 keeps everything.
    fn cleanup_old_backups(&self) -> Result<()> {
        if self.config.max_backups == 0 {
            return Ok(());
        }

        let mut backups: Vec<(std::time::SystemTime, PathBuf)> = Vec::new();
        for entry in WalkDir::new(&self.config.backup_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file()
                && path.extension().is_some_and(|ext| ext == "zip")
                && path
                    .file_name()
                    .is_some_and(|name| name.to_string_lossy().starts_with("notekeep_backup_"))
            {
                if let Ok(metadata) = entry.metadata() {
                    if let Ok(modified) = metadata.modified() {
                        backups.push((modified, path.to_path_buf()));
                    }
                }
            }
        }

        if backups.len() <= self.config.max_backups as usize {
            return Ok(());
        }

        backups.sort_by_key(|(modified, _)| *modified);
        let excess = backups.len() - self.config.max_backups as usize;
        for (_, path) in backups.into_iter().take(excess) {
            match fs::remove_file(&path) {
                Ok(_) => debug!("Removed old backup: {}", path.display()),
                Err(e) => warn!("Failed to remove old backup {}: {}", path.display(), e),
            }
        }
        Ok(())
    }

    /// Restores all notes from a full backup zip archive.
    ///
    /// Existing ids are skipped unless `overwrite_existing` is set.
    /// Returns a summary of what was restored, skipped, and failed.
    pub fn restore_full_backup(
        &self,
        backup_path: &Path,
        overwrite_existing: bool,
    ) -> Result<RestoreSummary> {
        if !backup_path.exists() || !backup_path.is_file() {
            return Err(NotesError::RestoreFailed {
                message: format!("Backup file not found: {}", backup_path.display()),
            });
        }

        let backup_file = File::open(backup_path).map_err(|e| NotesError::RestoreFailed {
            message: format!("Failed to open backup file: {}", e),
        })?;
        let mut archive = ZipArchive::new(backup_file)?;

        let existing_ids: HashSet<i64> = {
            let cache = lock(&self.notes_cache, "notes cache")?;
            cache.keys().copied().collect()
        };

        // First pass: collect entry names
        let mut entry_names = Vec::new();
        for i in 0..archive.len() {
            let file = archive.by_index(i).map_err(|e| NotesError::RestoreFailed {
                message: format!("Failed to read zip entry: {}", e),
            })?;
            let name = file.name().to_string();
            if name.ends_with(".json") {
                entry_names.push(name);
            }
        }

        // Second pass: restore each note
        let mut notes_restored = 0;
        let mut notes_skipped = 0;
        let mut failed_notes = Vec::new();

        for entry_name in &entry_names {
            let stem = entry_name
                .rsplit('/')
                .next()
                .unwrap_or(entry_name)
                .trim_end_matches(".json");

            if let Ok(id) = stem.parse::<i64>() {
                if !overwrite_existing && existing_ids.contains(&id) {
                    notes_skipped += 1;
                    continue;
                }
            }

            match self.restore_note_from_zip(&mut archive, entry_name) {
                Ok(_) => notes_restored += 1,
                Err(e) => {
                    warn!("Failed to restore note {}: {}", entry_name, e);
                    failed_notes.push((stem.to_string(), e.to_string()));
                }
            }
        }

        // Re-seat the id counter past anything that came back
        let max_id = {
            let cache = lock(&self.notes_cache, "notes cache")?;
            cache.keys().copied().max().unwrap_or(0)
        };
        self.next_note_id.fetch_max(max_id + 1, Ordering::SeqCst);

        let summary = RestoreSummary {
            backup_file: backup_path.to_path_buf(),
            total_notes: entry_names.len(),
            notes_restored,
            notes_skipped,
            failed_notes,
        };

        info!(
            "Backup restoration complete: restored {}, skipped {}, failed {} notes from {}",
            summary.notes_restored,
            summary.notes_skipped,
            summary.failed_notes.len(),
            backup_path.display()
        );
        Ok(summary)
    }

    /// Helper method to restore a single note from the zip archive.
    fn restore_note_from_zip(
        &self,
        archive: &mut ZipArchive<File>,
        entry_name: &str,
    ) -> Result<()> {
        let mut note_file = archive
            .by_name(entry_name)
            .map_err(|e| NotesError::RestoreFailed {
                message: format!("Failed to find {} in backup: {}", entry_name, e),
            })?;

        let mut note_content = String::new();
        note_file
            .read_to_string(&mut note_content)
            .map_err(|e| NotesError::RestoreFailed {
                message: format!("Failed to read {} from backup: {}", entry_name, e),
            })?;

        let note: Note = serde_json::from_str(&note_content)?;
        if note.id < 1 {
            return Err(NotesError::RestoreFailed {
                message: format!("Invalid note id in backup entry {}", entry_name),
            });
        }

        self.persist_note(&note)?;
        Ok(())
    }

    /// Starts the optional file system watcher. A no-op unless
    /// `Config.watch_files` is set; nothing in the core runs in the
    /// background without this explicit opt-in.
    pub async fn initialize(&mut self) -> Result<()> {
        if !self.config.watch_files {
            debug!("File watching disabled; nothing to initialize");
            return Ok(());
        }
        self.init_watcher_with_background_task().await
    }

    /// Initializes the watcher and starts the event handling in the background
    async fn init_watcher_with_background_task(&mut self) -> Result<()> {
        if self.watcher.is_some() {
            debug!("File system watcher already initialized");
            return Ok(());
        }

        let (std_tx, std_rx) = std_mpsc::channel();
        let (tx, mut rx) = mpsc::channel(100);

        let mut watcher: RecommendedWatcher = Watcher::new(
            std_tx,
            notify::Config::default().with_poll_interval(Duration::from_secs(2)),
        )
        .map_err(|e| {
            NotesError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to create file watcher: {}", e),
            ))
        })?;

        let notes_dir = self.config.notes_dir();
        watcher
            .watch(&notes_dir, RecursiveMode::Recursive)
            .map_err(|e| {
                NotesError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("Failed to watch directory: {}", e),
                ))
            })?;
        self.watcher = Some(watcher);

        let notes_cache = Arc::clone(&self.notes_cache);

        // Bridge the watcher's blocking channel onto a tokio channel; the
        // thread exits when the watcher is dropped.
        std::thread::spawn(move || {
            while let Ok(event) = std_rx.recv() {
                if tx.blocking_send(event).is_err() {
                    break;
                }
            }
            debug!("File system event bridge stopped");
        });

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    Ok(event) => handle_fs_event(event, &notes_cache).await,
                    Err(e) => error!("File system watcher error: {}", e),
                }
            }
            debug!("File system watcher event handler stopped");
        });

        info!("File system watcher initialized for {}", notes_dir.display());
        Ok(())
    }

    /// Stops the file system watcher if it is running.
    pub fn stop_watcher(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            drop(watcher);
            info!("File system watcher stopped");
        }
    }
}

// The cache and catalogs are shared between clones; the watcher is not.
impl Clone for NoteStorage {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            clock: Arc::clone(&self.clock),
            notes_cache: Arc::clone(&self.notes_cache),
            areas: Arc::clone(&self.areas),
            tags: Arc::clone(&self.tags),
            settings: Arc::clone(&self.settings),
            next_note_id: Arc::clone(&self.next_note_id),
            watcher: None,
        }
    }
}
