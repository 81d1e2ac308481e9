use std::{
    fs,
    io::{stdin, stdout, Write},
    path::PathBuf,
};

use log::debug;

use crate::{
    calendar_notes, collect_statistics, export_note, parse_search_fields, parse_tags,
    search_notes, Commands, ExportFormat, ListQuery, Note, NoteDraft, NotePatch, NoteStorage,
    NotesError, Result, SearchRequest, SearchResult,
};

/// CLI application handler - maps parsed commands onto the storage and
/// query layers and renders the results.
pub struct App {
    /// The note storage backend
    storage: NoteStorage,

    /// Whether to display verbose output
    verbose: bool,
}

impl App {
    /// Create a new CLI application over the given storage backend.
    pub fn new(storage: NoteStorage, verbose: bool) -> Self {
        Self { storage, verbose }
    }

    /// Run the CLI application with the given command.
    pub async fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Create {
                content,
                file,
                area,
                tags,
            } => self.handle_create(content, file, area, tags)?,

            Commands::View { id, json } => self.handle_view(id, json)?,

            Commands::List {
                area,
                tags,
                limit,
                offset,
                json,
            } => self.handle_list(area, tags, limit, offset, json)?,

            Commands::Search {
                keyword,
                area,
                tags,
                search_in,
                json,
            } => self.handle_search(keyword, area, tags, search_in, json)?,

            Commands::Edit {
                id,
                content,
                file,
                area,
                clear_area,
                tags,
            } => self.handle_edit(id, content, file, area, clear_area, tags)?,

            Commands::Delete { id, force } => self.handle_delete(id, force)?,

            Commands::Export { id, format, output } => self.handle_export(id, format, output)?,

            Commands::Calendar { year, month } => self.handle_calendar(year, month)?,

            Commands::Stats => self.handle_stats()?,

            Commands::Areas { add, color } => self.handle_areas(add, color)?,

            Commands::Tags { add, color } => self.handle_tags(add, color)?,

            Commands::Setting { set } => self.handle_setting(set)?,

            Commands::Backup => self.handle_backup()?,

            Commands::Restore {
                backup_file,
                overwrite,
            } => self.handle_restore(backup_file, overwrite)?,

            Commands::Seed => {
                self.storage.seed_defaults()?;
                println!("Default areas, tags, and settings are in place.");
            }
        }

        Ok(())
    }

    fn handle_create(
        &self,
        content: Option<String>,
        file: Option<PathBuf>,
        area: Option<String>,
        tags: Option<String>,
    ) -> Result<()> {
        let html_content = match (content, file) {
            (Some(c), _) => c,
            (None, Some(file_path)) => {
                if !file_path.exists() {
                    return Err(NotesError::validation(format!(
                        "File not found: {}",
                        file_path.display()
                    )));
                }
                fs::read_to_string(file_path)?
            }
            (None, None) => {
                return Err(NotesError::validation(
                    "Provide the note body with --content or --file",
                ))
            }
        };

        let note = self.storage.create_note(NoteDraft {
            html_content,
            area,
            tags: parse_tags(tags),
        })?;

        println!("Note created with ID: {}", note.id);
        if self.verbose {
            println!("Title: {}", note.title);
            println!("Plaintext: {}", note.plaintext);
        }
        Ok(())
    }

    fn handle_view(&self, id: i64, json: bool) -> Result<()> {
        let note = self
            .storage
            .get_note(id)
            .ok_or(NotesError::NoteNotFound { id })?;

        if json {
            println!("{}", serde_json::to_string_pretty(&note)?);
        } else {
            self.display_notes_text(std::slice::from_ref(&note), true)?;
        }
        Ok(())
    }

    fn handle_list(
        &self,
        area: Option<String>,
        tags: Option<String>,
        limit: usize,
        offset: usize,
        json: bool,
    ) -> Result<()> {
        let page = self.storage.list_notes(&ListQuery {
            area,
            tags: parse_tags(tags),
            limit,
            offset,
        })?;

        if json {
            println!("{}", serde_json::to_string_pretty(&page)?);
        } else {
            if page.notes.is_empty() {
                println!("No notes found matching the criteria.");
            } else {
                self.display_notes_text(&page.notes, false)?;
            }
            println!(
                "\nShowing {} of {} matching note{}",
                page.notes.len(),
                page.total,
                if page.total == 1 { "" } else { "s" }
            );
        }
        Ok(())
    }

    fn handle_search(
        &self,
        keyword: String,
        area: Option<String>,
        tags: Option<String>,
        search_in: String,
        json: bool,
    ) -> Result<()> {
        let request = SearchRequest {
            keyword,
            area,
            tags: parse_tags(tags),
            search_in: parse_search_fields(&search_in)?,
        };
        let results = search_notes(&self.storage, &request)?;

        if json {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "results": results,
                    "total": results.len(),
                }))?
            );
            return Ok(());
        }

        if results.is_empty() {
            println!("No notes found matching query: \"{}\"", request.keyword);
        } else {
            self.display_search_results(&results);
            println!("\nFound {} matching notes.", results.len());
        }
        Ok(())
    }

    fn handle_edit(
        &self,
        id: i64,
        content: Option<String>,
        file: Option<PathBuf>,
        area: Option<String>,
        clear_area: bool,
        tags: Option<String>,
    ) -> Result<()> {
        if content.is_some() && file.is_some() {
            return Err(NotesError::validation(
                "Cannot specify both --content and --file options",
            ));
        }
        if area.is_some() && clear_area {
            return Err(NotesError::validation(
                "Cannot specify both --area and --clear-area options",
            ));
        }

        let html_content = match (content, file) {
            (Some(c), None) => Some(c),
            (None, Some(file_path)) => Some(fs::read_to_string(file_path)?),
            _ => None,
        };

        let area_patch = if clear_area {
            Some(None)
        } else {
            area.map(Some)
        };

        let note = self.storage.update_note(
            id,
            NotePatch {
                html_content,
                area: area_patch,
                tags: tags.map(|t| parse_tags(Some(t))),
            },
        )?;

        println!("Note {} updated successfully", note.id);
        Ok(())
    }

    fn handle_delete(&self, id: i64, force: bool) -> Result<()> {
        let note = self
            .storage
            .get_note(id)
            .ok_or(NotesError::NoteNotFound { id })?;

        if !force {
            println!("You are about to delete the following note:");
            println!("ID:      {}", note.id);
            println!("Title:   {}", note.title);
            if let Some(area) = &note.area {
                println!("Area:    {}", area);
            }
            if !note.tags.is_empty() {
                println!("Tags:    {}", note.tags.join(", "));
            }
            println!("Created: {}", note.created_at.format("%Y-%m-%d %H:%M:%S"));

            println!("\nThis action cannot be undone!");
            print!("Are you sure you want to delete this note? [y/N]: ");
            stdout().flush()?;

            let mut input = String::new();
            stdin().read_line(&mut input)?;
            let input = input.trim().to_lowercase();
            if input != "y" && input != "yes" {
                println!("Deletion cancelled.");
                return Ok(());
            }
        }

        let removed = self.storage.delete_note(id)?;
        if removed {
            println!("Note '{}' ({}) has been permanently deleted.", note.title, id);
        } else {
            // Raced with another writer between the lookup and the delete
            println!("Note {} was already gone.", id);
        }
        Ok(())
    }

    fn handle_export(&self, id: i64, format: String, output: Option<PathBuf>) -> Result<()> {
        let format = ExportFormat::parse(&format)?;
        let export = export_note(&self.storage, id, format)?;

        match output {
            Some(path) => {
                let target = if path.is_dir() {
                    path.join(&export.filename)
                } else {
                    path
                };
                fs::write(&target, &export.content)?;
                println!("Exported to {}", target.display());
            }
            None => {
                debug!(
                    "Exporting note {} as {} ({})",
                    id, export.filename, export.content_type
                );
                println!("{}", export.content);
            }
        }
        Ok(())
    }

    fn handle_calendar(&self, year: Option<i32>, month: Option<u32>) -> Result<()> {
        let calendar = calendar_notes(&self.storage, year, month)?;
        if calendar.is_empty() {
            println!("No notes in the selected month.");
            return Ok(());
        }

        for (date, entries) in &calendar {
            println!("{}", console::style(date).bold());
            for entry in entries {
                let mut line = format!("  [{}] {}", entry.id, entry.title);
                if let Some(area) = &entry.area {
                    line.push_str(&format!(" ({})", area));
                }
                if !entry.tags.is_empty() {
                    line.push_str(&format!(
                        "  {}",
                        entry
                            .tags
                            .iter()
                            .map(|t| format!("#{}", t))
                            .collect::<Vec<_>>()
                            .join(" ")
                    ));
                }
                println!("{}", line);
            }
        }
        Ok(())
    }

    fn handle_stats(&self) -> Result<()> {
        let stats = collect_statistics(&self.storage)?;

        println!("Total notes:      {}", stats.total_notes);
        println!("Created this week:  {}", stats.notes_this_week);
        println!("Created this month: {}", stats.notes_this_month);

        if !stats.notes_by_area.is_empty() {
            println!("\nBy area:");
            for (area, count) in &stats.notes_by_area {
                println!("  {:<20} {}", area, count);
            }
        }
        if !stats.notes_by_tag.is_empty() {
            println!("\nBy tag:");
            for (tag, count) in &stats.notes_by_tag {
                println!("  {:<20} {}", tag, count);
            }
        }
        Ok(())
    }

    fn handle_areas(&self, add: Option<String>, color: Option<String>) -> Result<()> {
        if let Some(name) = add {
            let area = self.storage.create_area(&name, color)?;
            println!("Area created: {} ({})", area.name, area.color);
            return Ok(());
        }

        let areas = self.storage.list_areas()?;
        if areas.is_empty() {
            println!("No areas defined. Use --add or the seed command.");
        }
        for area in areas {
            println!("{:<4} {:<20} {}", area.id, area.name, area.color);
        }
        Ok(())
    }

    fn handle_tags(&self, add: Option<String>, color: Option<String>) -> Result<()> {
        if let Some(name) = add {
            let tag = self.storage.create_tag(&name, color)?;
            println!("Tag created: {} ({})", tag.name, tag.color);
            return Ok(());
        }

        let tags = self.storage.list_tags()?;
        if tags.is_empty() {
            println!("No tags defined. Use --add or the seed command.");
        }
        for tag in tags {
            println!("{:<4} {:<20} {}", tag.id, tag.name, tag.color);
        }
        Ok(())
    }

    fn handle_setting(&self, set: Option<String>) -> Result<()> {
        if let Some(assignment) = set {
            let (key, value) = assignment.split_once('=').ok_or_else(|| {
                NotesError::validation("Settings are written as key=value")
            })?;
            let setting = self.storage.update_setting(key.trim(), value.trim())?;
            println!("{} = {}", setting.key, setting.value);
            return Ok(());
        }

        let settings = self.storage.list_settings()?;
        if settings.is_empty() {
            println!("No settings stored. Use the seed command to install defaults.");
        }
        for setting in settings {
            println!("{} = {}", setting.key, setting.value);
        }
        Ok(())
    }

    fn handle_backup(&self) -> Result<()> {
        let path = self.storage.create_full_backup()?;
        println!("Backup created at {}", path.display());
        Ok(())
    }

    fn handle_restore(&self, backup_file: PathBuf, overwrite: bool) -> Result<()> {
        let summary = self.storage.restore_full_backup(&backup_file, overwrite)?;

        println!("Restore summary for {}:", summary.backup_file.display());
        println!("  Notes in archive:  {}", summary.total_notes);
        println!("  Restored:          {}", summary.notes_restored);
        println!("  Skipped (existing): {}", summary.notes_skipped);
        if !summary.failed_notes.is_empty() {
            println!("  Failed:            {}", summary.failed_notes.len());
            for (id, error) in &summary.failed_notes {
                println!("    {}: {}", id, error);
            }
        }
        Ok(())
    }

    /// Display notes in text format
    fn display_notes_text(&self, notes: &[Note], detailed: bool) -> Result<()> {
        // Use terminal width for the separator if available
        let term_width = terminal_size::terminal_size()
            .map(|(w, _)| w.0 as usize)
            .unwrap_or(80);

        for (i, note) in notes.iter().enumerate() {
            if i > 0 {
                println!("{}", "-".repeat(term_width.min(50)));
            }

            let created_at = note.created_at.format("%Y-%m-%d %H:%M");
            println!("ID: {} | Created: {}", note.id, created_at);
            println!("Title: {}", console::style(&note.title).bold());

            if let Some(area) = &note.area {
                println!("Area: {}", console::style(area).green());
            }
            if !note.tags.is_empty() {
                let tags = note
                    .tags
                    .iter()
                    .map(|tag| format!("#{}", tag))
                    .collect::<Vec<_>>()
                    .join(" ");
                println!("Tags: {}", console::style(tags).cyan());
            }

            if detailed {
                println!("\n{}", note.html_content);
            } else {
                let preview = content_preview(&note.plaintext, 100);
                if !preview.is_empty() {
                    println!("\n{}", preview);
                }
            }
        }

        Ok(())
    }

    fn display_search_results(&self, results: &[SearchResult]) {
        for (i, result) in results.iter().enumerate() {
            if i > 0 {
                println!();
            }
            println!(
                "[{}] {} ({})",
                result.id,
                console::style(&result.title).bold(),
                result.created_at.format("%Y-%m-%d %H:%M")
            );
            if !result.snippet.is_empty() {
                println!("    {}", result.snippet);
            }
        }
    }
}

/// Bounded single-line preview used in listings.
fn content_preview(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().find(|line| !line.trim().is_empty()).unwrap_or("");
    if first_line.chars().count() <= max_chars {
        first_line.to_string()
    } else {
        let truncated: String = first_line.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_on_character_boundaries() {
        assert_eq!(content_preview("short", 10), "short");
        let long = "x".repeat(20);
        assert_eq!(content_preview(&long, 10), format!("{}...", "x".repeat(10)));
        assert_eq!(content_preview("", 10), "");
    }
}
