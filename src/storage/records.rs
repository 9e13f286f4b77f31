//! Encoding of the persisted note records.
//!
//! Active notes and trashed notes live under two independent keys, each a
//! JSON array of notes. Decoding never fails: a record that is missing or
//! does not hold a well-formed list loads as empty.

use crate::storage::note::Note;
use anyhow::Result;

pub const NOTES_KEY: &str = "sticky_notes_v4";
pub const TRASH_KEY: &str = "sticky_trash_v4";
pub const THEME_KEY: &str = "sticky_theme_v4";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Active,
    Trash,
}

impl RecordKind {
    pub fn key(self) -> &'static str {
        match self {
            RecordKind::Active => NOTES_KEY,
            RecordKind::Trash => TRASH_KEY,
        }
    }

    pub fn other(self) -> RecordKind {
        match self {
            RecordKind::Active => RecordKind::Trash,
            RecordKind::Trash => RecordKind::Active,
        }
    }

    fn accepts(self, note: &Note) -> bool {
        match self {
            RecordKind::Active => note.deleted_at.is_none(),
            RecordKind::Trash => note.deleted_at.is_some(),
        }
    }
}

pub fn encode_notes(notes: &[Note]) -> Result<String> {
    Ok(serde_json::to_string(notes)?)
}

/// Decode a record, recovering to an empty list on any defect
pub fn decode_notes(kind: RecordKind, raw: Option<&str>) -> Vec<Note> {
    let Some(raw) = raw else {
        return Vec::new();
    };

    let notes: Vec<Note> = match serde_json::from_str(raw) {
        Ok(notes) => notes,
        Err(e) => {
            log::warn!("record {} is malformed, starting empty: {}", kind.key(), e);
            return Vec::new();
        }
    };

    if let Some(bad) = notes.iter().find(|n| !kind.accepts(n)) {
        log::warn!(
            "record {} holds note {} with inconsistent deletedAt, starting empty",
            kind.key(),
            bad.id
        );
        return Vec::new();
    }

    notes
}
