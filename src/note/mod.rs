use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};

use tracing::{
    debug,
    info,
    warn,
};

use crate::{
    anki::{
        self,
        AnkiClient,
        NotePayload,
        DUPLICATE_ERROR,
    },
    core::AnkimdError,
    parser,
    renderer::{
        self,
        MediaFile,
    },
};

pub mod error_log;
pub mod lines;
pub mod record;

pub use error_log::{
    ErrorLog,
    FileErrorLog,
    MemoryErrorLog,
};
pub use record::{
    CardRecord,
    RecordState,
};

/// The card table of one document plus the context shared by every row:
/// declared deck, common tags, scraped media, and the backing file.
///
/// Row 0 is always the synthetic frontmatter row. Records stay in document
/// order for the whole run; reconciliation mutates rows in place and the
/// table serializes back to the document at the end.
#[derive(Debug)]
pub struct NoteSet {
    pub deck_name: String,
    pub common_tags: Vec<String>,
    pub records: Vec<CardRecord>,
    pub media: Vec<MediaFile>,
    path: PathBuf,
}

impl NoteSet {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AnkimdError> {
        let path = path.as_ref();
        info!("reading note set from {}", path.display());
        let text = fs::read_to_string(path)?;
        Self::from_text(&text, path)
    }

    /// Builds the card table from document text. `path` locates media files
    /// referenced relative to the document and is the write-back target.
    pub fn from_text(text: &str, path: impl Into<PathBuf>) -> Result<Self, AnkimdError> {
        let path = path.into();
        let file_lines: Vec<String> = text.split_inclusive('\n').map(String::from).collect();

        let (properties, body) = parser::extract_properties(&file_lines)?;
        let metadata = parser::parse_metadata(&properties)?;

        let base_dir =
            path.parent().filter(|dir| !dir.as_os_str().is_empty()).unwrap_or(Path::new("."));

        let mut records = vec![CardRecord::text_block(properties, &metadata.deck)];
        let mut media = Vec::new();

        for group in parser::group_lines(&body) {
            let parsed = parser::parse_card(&group);

            if !parsed.is_card {
                records.push(CardRecord::text_block(group, &metadata.deck));
                continue;
            }

            media.extend(renderer::scrape_media(&parsed.front, base_dir));
            media.extend(renderer::scrape_media(&parsed.back, base_dir));

            let mut record = CardRecord {
                is_card: true,
                front: Some(renderer::render(&parsed.front)),
                back: Some(renderer::render(&parsed.back)),
                id: parsed.id,
                fields: None,
                tags: metadata.tags.clone(),
                deck_name: metadata.deck.clone(),
                model_name: parsed.model_name,
                inline: parsed.inline,
                state: if parsed.id.is_some() { RecordState::Existing } else { RecordState::New },
                lines: group,
            };
            record.refresh_fields();
            records.push(record);
        }

        info!(
            "note set instantiated: deck '{}', {} cards, {} media files",
            metadata.deck,
            records.iter().filter(|record| record.is_card).count(),
            media.len()
        );

        Ok(NoteSet {
            deck_name: metadata.deck,
            common_tags: metadata.tags,
            records,
            media,
            path,
        })
    }

    /// Checks that the declared deck exists on the server and creates it if
    /// it does not. Safe to call any number of times.
    pub fn check_deck(&self, client: &dyn AnkiClient) -> Result<(), AnkimdError> {
        debug!("checking deck '{}'", self.deck_name);
        if !anki::deck_exists(client, &self.deck_name)? {
            anki::create_deck(client, &self.deck_name)?;
        }
        Ok(())
    }

    /// The anomaly-detection/repair pass, run before any upload:
    /// duplicate-content rejections of new rows are repaired by recovering
    /// the pre-existing id, other rejections are logged and set aside, rows
    /// whose id no longer resolves are demoted to new, and surviving rows
    /// are moved back into the declared deck if they strayed.
    pub fn check_notes(
        &mut self,
        client: &dyn AnkiClient,
        error_log: &mut dyn ErrorLog,
    ) -> Result<(), AnkimdError> {
        info!("checking notes");
        self.repair_new_notes(client, error_log)?;
        let live_ids = self.repair_deleted_notes(client)?;
        self.adjust_notes_deck(client, &live_ids)?;
        Ok(())
    }

    /// Validates candidate rows with the server before creation and repairs
    /// what it can. Only the exact duplicate-content rejection is repaired;
    /// every other error marks the row `Errored` for this run without
    /// blocking the rest.
    fn repair_new_notes(
        &mut self,
        client: &dyn AnkiClient,
        error_log: &mut dyn ErrorLog,
    ) -> Result<(), AnkimdError> {
        let indices = self.new_card_indices();
        if indices.is_empty() {
            return Ok(());
        }

        debug!("validating {} new notes", indices.len());
        let payloads = self.payloads(&indices);
        let results = expect_len("canAddNotesWithErrorDetail", client.can_add_notes(&payloads)?, indices.len())?;

        for (&index, result) in indices.iter().zip(results) {
            let Some(error) = result.error else { continue };

            if error == DUPLICATE_ERROR {
                self.adopt_duplicate_id(client, error_log, index, &error)?;
            } else {
                warn!("note cannot be added to the deck: {}", error);
                error_log.record(&self.records[index], &error)?;
                self.records[index].state = RecordState::Errored;
            }
        }

        Ok(())
    }

    /// Recovers the id of a note the server reported as a duplicate by
    /// searching for its front text, turning the row into an existing one.
    fn adopt_duplicate_id(
        &mut self,
        client: &dyn AnkiClient,
        error_log: &mut dyn ErrorLog,
        index: usize,
        error: &str,
    ) -> Result<(), AnkimdError> {
        let front = self.records[index].front.clone().unwrap_or_default();
        let found = client.find_notes(&front)?;

        match found.first() {
            Some(&id) => {
                info!("repaired duplicate note, adopting id {}", id);
                self.records[index].write_id(Some(id));
                Ok(())
            }
            None => {
                warn!("duplicate note not found by front text, cannot repair");
                error_log.record(&self.records[index], error)?;
                self.records[index].state = RecordState::Errored;
                Ok(())
            }
        }
    }

    /// Clears the id of every row the server no longer knows, stripping the
    /// marker from its source lines so the row is recreated as brand-new.
    /// Returns the ids that still resolve.
    fn repair_deleted_notes(&mut self, client: &dyn AnkiClient) -> Result<Vec<u64>, AnkimdError> {
        let indices = self.existing_card_indices();
        if indices.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<u64> = indices.iter().filter_map(|&i| self.records[i].id).collect();
        debug!("querying {} linked notes for stale references", ids.len());
        let infos = expect_len("notesInfo", client.notes_info(&ids)?, ids.len())?;

        let mut live_ids = Vec::new();
        for (&index, info) in indices.iter().zip(infos) {
            match info {
                Some(_) => live_ids.push(self.records[index].id.unwrap_or_default()),
                None => {
                    info!(
                        "note {} was deleted upstream, will recreate it",
                        self.records[index].id.unwrap_or_default()
                    );
                    self.records[index].write_id(None);
                }
            }
        }

        Ok(live_ids)
    }

    /// Moves every linked note found in a deck other than the declared one
    /// back into it, with a single batched move.
    fn adjust_notes_deck(
        &self,
        client: &dyn AnkiClient,
        ids: &[u64],
    ) -> Result<(), AnkimdError> {
        if ids.is_empty() {
            return Ok(());
        }

        let decks = client.get_decks(ids)?;
        let strays: Vec<u64> = decks
            .iter()
            .filter(|(deck, _)| *deck != &self.deck_name)
            .flat_map(|(_, cards)| cards.iter().copied())
            .collect();

        if !strays.is_empty() {
            info!("moving {} cards back into deck '{}'", strays.len(), self.deck_name);
            client.change_deck(&strays, &self.deck_name)?;
        }

        Ok(())
    }

    /// Submits every post-repair new row in one batch and writes the
    /// assigned ids back into the rows' source lines. Rows the server
    /// returns no id for stay new and are picked up by the next run.
    pub fn upload_new_notes(&mut self, client: &dyn AnkiClient) -> Result<(), AnkimdError> {
        let indices = self.new_card_indices();
        if indices.is_empty() {
            debug!("no new notes to upload");
            return Ok(());
        }

        info!("uploading {} new notes", indices.len());
        let payloads = self.payloads(&indices);
        let results = expect_len("addNotes", client.add_notes(&payloads)?, indices.len())?;

        for (&index, result) in indices.iter().zip(results) {
            match result {
                Some(id) => self.records[index].write_id(Some(id)),
                None => warn!("server returned no id for a new note, leaving it for a later run"),
            }
        }

        Ok(())
    }

    /// Queries the stored fields of every linked row and pushes an update
    /// for the drifted ones only; up-to-date rows are untouched so their
    /// remote-side review data is preserved.
    pub fn update_existing_notes(&mut self, client: &dyn AnkiClient) -> Result<(), AnkimdError> {
        let indices = self.existing_card_indices();
        if indices.is_empty() {
            debug!("no existing notes to update");
            return Ok(());
        }

        let ids: Vec<u64> = indices.iter().filter_map(|&i| self.records[i].id).collect();
        let infos = expect_len("notesInfo", client.notes_info(&ids)?, ids.len())?;

        let mut drifted = Vec::new();
        for (&index, info) in indices.iter().zip(infos) {
            // a reference that went stale mid-run is left for the next one
            let Some(info) = info else { continue };

            if info.note_fields().as_ref() != self.records[index].fields.as_ref() {
                drifted.push(index);
            }
        }

        info!("{} notes to update, {} up to date", drifted.len(), indices.len() - drifted.len());

        // the server offers no batch update
        for index in drifted {
            if let Some(payload) = self.records[index].payload() {
                client.update_note(&payload)?;
            }
        }

        Ok(())
    }

    /// Stores every media file referenced by the document on the server.
    pub fn upload_media(&self, client: &dyn AnkiClient) -> Result<(), AnkimdError> {
        for media in &self.media {
            debug!("storing media file '{}'", media.filename);
            client.store_media_file(&media.filename, &media.path.to_string_lossy())?;
        }
        Ok(())
    }

    /// Serializes the table back to document text, rows in original order.
    pub fn to_text(&self) -> String {
        self.records.iter().flat_map(|record| record.lines.iter()).cloned().collect()
    }

    /// Rewrites the backing file with the updated lines.
    pub fn save(&self) -> Result<(), AnkimdError> {
        info!("writing updated document to {}", self.path.display());
        fs::write(&self.path, self.to_text())?;
        Ok(())
    }

    fn new_card_indices(&self) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, record)| {
                record.is_card && record.state == RecordState::New && record.id.is_none()
            })
            .map(|(index, _)| index)
            .collect()
    }

    fn existing_card_indices(&self) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, record)| {
                record.is_card && record.state == RecordState::Existing && record.id.is_some()
            })
            .map(|(index, _)| index)
            .collect()
    }

    fn payloads(&self, indices: &[usize]) -> Vec<NotePayload> {
        indices.iter().filter_map(|&index| self.records[index].payload()).collect()
    }
}

/// Batch actions answer one entry per input, in order; anything else breaks
/// positional reassembly and is treated as a failed call.
fn expect_len<T>(action: &str, results: Vec<T>, expected: usize) -> Result<Vec<T>, AnkimdError> {
    if results.len() != expected {
        return Err(AnkimdError::Anki {
            action: action.to_string(),
            message: format!("expected {} results, got {}", expected, results.len()),
        });
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "---\ndeck: Test Deck\ntags:\n- test\n---\n\n>[!question] What is the capital of France? #card\n>Paris\n\n>[!question] What is the capital of Italy? #card\n>Rome\n^1234\n\nCapital of Spain::Madrid\n";

    #[test]
    fn from_text_builds_the_card_table() {
        let noteset = NoteSet::from_text(DOC, "cards.md").unwrap();

        assert_eq!(noteset.deck_name, "Test Deck");
        assert_eq!(noteset.common_tags, vec!["test".to_string()]);
        assert!(!noteset.records[0].is_card);

        let cards: Vec<&CardRecord> =
            noteset.records.iter().filter(|record| record.is_card).collect();
        assert_eq!(cards.len(), 3);

        assert_eq!(cards[0].front.as_deref(), Some("What is the capital of France?"));
        assert_eq!(cards[0].id, None);
        assert_eq!(cards[0].state, RecordState::New);

        assert_eq!(cards[1].id, Some(1234));
        assert_eq!(cards[1].state, RecordState::Existing);
        assert_eq!(cards[1].fields.as_ref().unwrap().back, "Rome");

        assert!(cards[2].inline);
        assert_eq!(cards[2].back.as_deref(), Some("Madrid"));
        assert_eq!(cards[2].tags, vec!["test".to_string()]);
    }

    #[test]
    fn to_text_round_trips_unmodified_documents() {
        let noteset = NoteSet::from_text(DOC, "cards.md").unwrap();
        assert_eq!(noteset.to_text(), DOC);
    }

    #[test]
    fn save_rewrites_the_backing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cards.md");
        std::fs::write(&path, DOC).unwrap();

        let mut noteset = NoteSet::from_file(&path).unwrap();
        let index = noteset
            .records
            .iter()
            .position(|record| record.is_card && record.id.is_none())
            .unwrap();
        noteset.records[index].write_id(Some(777));
        noteset.save().unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains(">Paris\n^777\n"));
    }
}
