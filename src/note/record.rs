use crate::anki::{
    NoteFields,
    NotePayload,
};

/// Explicit per-row lifecycle tag. Repair passes reclassify rows by flipping
/// this state instead of re-deriving it from nullable fields at every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Never successfully created remotely; candidate for upload.
    New,
    /// Linked to a live remote note through `id`.
    Existing,
    /// Rejected by remote validation with an unrepairable error; excluded
    /// from every later step of this run.
    Errored,
}

/// One row of the card table: a single flashcard, or the synthetic
/// frontmatter row at index 0. Rows keep their original source lines so an
/// id can be spliced in or out without re-serializing anything else.
#[derive(Debug, Clone)]
pub struct CardRecord {
    pub is_card: bool,
    pub front: Option<String>,
    pub back: Option<String>,
    pub id: Option<u64>,
    pub fields: Option<NoteFields>,
    pub tags: Vec<String>,
    pub deck_name: String,
    pub model_name: String,
    pub inline: bool,
    pub state: RecordState,
    pub lines: Vec<String>,
}

impl CardRecord {
    /// A non-card row: the frontmatter block, prose, or blank lines.
    pub fn text_block(lines: Vec<String>, deck_name: &str) -> Self {
        CardRecord {
            is_card: false,
            front: None,
            back: None,
            id: None,
            fields: None,
            tags: Vec::new(),
            deck_name: deck_name.to_string(),
            model_name: String::new(),
            inline: false,
            state: RecordState::New,
            lines,
        }
    }

    /// Recomputes the remote payload fields from front/back. Must be called
    /// whenever either side changes.
    pub fn refresh_fields(&mut self) {
        self.fields = match (&self.front, &self.back) {
            (Some(front), Some(back)) => {
                Some(NoteFields { front: front.clone(), back: back.clone() })
            }
            _ => None,
        };
    }

    /// The wire payload for this row, if it is a complete card.
    pub fn payload(&self) -> Option<NotePayload> {
        let fields = self.fields.clone()?;
        Some(NotePayload {
            deck_name: self.deck_name.clone(),
            model_name: self.model_name.clone(),
            fields,
            tags: self.tags.clone(),
            id: self.id,
        })
    }

    /// Assigns or clears the remote id, keeping the source lines in step.
    pub fn write_id(&mut self, id: Option<u64>) {
        self.id = id;
        self.lines = super::lines::write_id(&self.lines, id, self.inline);
        self.state = if id.is_some() { RecordState::Existing } else { RecordState::New };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card() -> CardRecord {
        CardRecord {
            is_card: true,
            front: Some("Q".to_string()),
            back: Some("A".to_string()),
            id: None,
            fields: None,
            tags: vec!["geo".to_string()],
            deck_name: "Deck".to_string(),
            model_name: "Basic".to_string(),
            inline: false,
            state: RecordState::New,
            lines: vec![">[!question] Q #card\n".to_string(), ">A\n".to_string()],
        }
    }

    #[test]
    fn payload_requires_fields() {
        let mut record = card();
        assert!(record.payload().is_none());

        record.refresh_fields();
        let payload = record.payload().unwrap();
        assert_eq!(payload.fields, NoteFields { front: "Q".to_string(), back: "A".to_string() });
        assert_eq!(payload.deck_name, "Deck");
        assert!(payload.id.is_none());
    }

    #[test]
    fn write_id_tracks_state() {
        let mut record = card();
        record.write_id(Some(123));
        assert_eq!(record.state, RecordState::Existing);
        assert_eq!(record.lines.last().unwrap(), "^123\n");

        record.write_id(None);
        assert_eq!(record.state, RecordState::New);
        assert_eq!(record.lines.last().unwrap(), ">A\n");
    }
}
