use std::collections::HashMap;

use serde::{
    Deserialize,
    Serialize,
};
use serde_json::{
    json,
    Value,
};
use tracing::info;

use crate::core::AnkimdError;

pub mod api;

/// Error string AnkiConnect reports for a content-identical note. Only this
/// exact message is eligible for duplicate repair.
pub const DUPLICATE_ERROR: &str = "cannot create note because it is a duplicate";

/// The `{Front, Back}` payload of a note, exactly as sent to and reported by
/// the Anki server. Structural equality of this type is the drift check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteFields {
    #[serde(rename = "Front")]
    pub front: String,
    #[serde(rename = "Back")]
    pub back: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotePayload {
    pub deck_name: String,
    pub model_name: String,
    pub fields: NoteFields,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldValue {
    pub value: String,
    #[serde(default)]
    pub order: u32,
}

/// One entry of a `notesInfo` result. The server answers an unresolvable id
/// with an empty object, which is how stale references are detected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoteInfo {
    #[serde(rename = "noteId", default)]
    pub note_id: Option<u64>,
    #[serde(default)]
    pub fields: HashMap<String, FieldValue>,
}

impl NoteInfo {
    pub fn is_empty(&self) -> bool {
        self.note_id.is_none() && self.fields.is_empty()
    }

    pub fn note_fields(&self) -> Option<NoteFields> {
        Some(NoteFields {
            front: self.fields.get("Front")?.value.clone(),
            back: self.fields.get("Back")?.value.clone(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanAddResult {
    #[serde(default)]
    pub can_add: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Request/response boundary to the Anki server. Implementors only provide
/// the generic `call`; the typed helpers are derived from it. Every batch
/// action answers in input order, which the reconciliation passes rely on
/// for positional reassembly.
pub trait AnkiClient {
    fn call(&self, action: &str, params: Value) -> Result<Value, AnkimdError>;

    fn version(&self) -> Result<u64, AnkimdError> {
        Ok(serde_json::from_value(self.call("version", Value::Null)?)?)
    }

    fn deck_names(&self) -> Result<Vec<String>, AnkimdError> {
        Ok(serde_json::from_value(self.call("deckNames", Value::Null)?)?)
    }

    fn create_deck(&self, deck: &str) -> Result<Option<u64>, AnkimdError> {
        Ok(serde_json::from_value(self.call("createDeck", json!({ "deck": deck }))?)?)
    }

    fn add_notes(&self, notes: &[NotePayload]) -> Result<Vec<Option<u64>>, AnkimdError> {
        Ok(serde_json::from_value(self.call("addNotes", json!({ "notes": notes }))?)?)
    }

    fn can_add_notes(&self, notes: &[NotePayload]) -> Result<Vec<CanAddResult>, AnkimdError> {
        Ok(serde_json::from_value(
            self.call("canAddNotesWithErrorDetail", json!({ "notes": notes }))?,
        )?)
    }

    fn update_note(&self, note: &NotePayload) -> Result<(), AnkimdError> {
        self.call("updateNote", json!({ "note": note }))?;
        Ok(())
    }

    fn notes_info(&self, ids: &[u64]) -> Result<Vec<Option<NoteInfo>>, AnkimdError> {
        let infos: Vec<NoteInfo> =
            serde_json::from_value(self.call("notesInfo", json!({ "notes": ids }))?)?;
        Ok(infos.into_iter().map(|info| if info.is_empty() { None } else { Some(info) }).collect())
    }

    fn find_notes(&self, query: &str) -> Result<Vec<u64>, AnkimdError> {
        Ok(serde_json::from_value(self.call("findNotes", json!({ "query": query }))?)?)
    }

    fn get_decks(&self, cards: &[u64]) -> Result<HashMap<String, Vec<u64>>, AnkimdError> {
        Ok(serde_json::from_value(self.call("getDecks", json!({ "cards": cards }))?)?)
    }

    fn change_deck(&self, cards: &[u64], deck: &str) -> Result<(), AnkimdError> {
        self.call("changeDeck", json!({ "cards": cards, "deck": deck }))?;
        Ok(())
    }

    fn store_media_file(&self, filename: &str, path: &str) -> Result<(), AnkimdError> {
        self.call("storeMediaFile", json!({ "filename": filename, "path": path }))?;
        Ok(())
    }
}

/// Checks if a deck already exists for the current Anki user.
pub fn deck_exists(client: &dyn AnkiClient, name: &str) -> Result<bool, AnkimdError> {
    let names = client.deck_names()?;
    Ok(names.iter().any(|deck| deck == name))
}

/// Creates a deck for the current Anki user, skipping creation when the deck
/// is already there.
pub fn create_deck(client: &dyn AnkiClient, name: &str) -> Result<(), AnkimdError> {
    if deck_exists(client, name)? {
        info!("deck '{}' already exists", name);
        return Ok(());
    }

    match client.create_deck(name)? {
        Some(id) => info!("created deck '{}' (id {})", name, id),
        None => info!("created deck '{}'", name),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_payload_serializes_in_wire_shape() {
        let payload = NotePayload {
            deck_name: "Geography".to_string(),
            model_name: "Basic".to_string(),
            fields: NoteFields { front: "Front text".to_string(), back: "Back text".to_string() },
            tags: vec!["capitals".to_string()],
            id: None,
        };

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["deckName"], "Geography");
        assert_eq!(value["modelName"], "Basic");
        assert_eq!(value["fields"]["Front"], "Front text");
        assert_eq!(value["fields"]["Back"], "Back text");
        assert_eq!(value["tags"][0], "capitals");
        assert!(value.get("id").is_none());
    }

    #[test]
    fn empty_note_info_marks_stale_reference() {
        let info: NoteInfo = serde_json::from_str("{}").unwrap();
        assert!(info.is_empty());
        assert!(info.note_fields().is_none());

        let info: NoteInfo = serde_json::from_str(
            r#"{"noteId": 55, "fields": {"Front": {"value": "A", "order": 0}, "Back": {"value": "B", "order": 1}}}"#,
        )
        .unwrap();
        assert!(!info.is_empty());
        let fields = info.note_fields().unwrap();
        assert_eq!(fields, NoteFields { front: "A".to_string(), back: "B".to_string() });
    }
}
