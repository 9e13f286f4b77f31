use crate::service::errors::StoreError;
use crate::storage::kv::KeyValueStore;
use crate::storage::note::{Note, Swatch, generate_id, now};
use crate::storage::records::{RecordKind, decode_notes, encode_notes};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq)]
struct Collections {
    active: Vec<Note>,
    trashed: Vec<Note>,
}

impl Collections {
    fn contains_id(&self, id: &str) -> bool {
        self.active.iter().chain(self.trashed.iter()).any(|n| n.id == id)
    }
}

/// Owner of the active and trashed notes.
///
/// Pinned notes always precede unpinned ones in `active`, an id lives in
/// exactly one of the two lists, and only trashed notes carry `deleted_at`.
/// Every mutation writes both records before returning; a failed write
/// leaves the in-memory state as it was before the call. The record that
/// gains a note is written first, so an interrupted move leaves the note in
/// both records rather than in neither.
pub struct NoteStore<S: KeyValueStore> {
    backend: S,
    state: Collections,
}

impl<S: KeyValueStore> NoteStore<S> {
    /// Load the store from whatever the backend holds
    pub fn open(backend: S) -> Self {
        let active = decode_notes(
            RecordKind::Active,
            read_record(&backend, RecordKind::Active).as_deref(),
        );
        let trashed = decode_notes(
            RecordKind::Trash,
            read_record(&backend, RecordKind::Trash).as_deref(),
        );

        let mut state = Collections { active, trashed };
        drop_duplicate_ids(&mut state);
        group_pinned_first(&mut state.active);

        log::info!(
            "loaded {} notes and {} trashed notes",
            state.active.len(),
            state.trashed.len()
        );
        NoteStore { backend, state }
    }

    pub fn active(&self) -> &[Note] {
        &self.state.active
    }

    pub fn trashed(&self) -> &[Note] {
        &self.state.trashed
    }

    pub fn get(&self, id: &str) -> Option<&Note> {
        self.state.active.iter().find(|n| n.id == id)
    }

    #[cfg(test)]
    pub fn get_trashed(&self, id: &str) -> Option<&Note> {
        self.state.trashed.iter().find(|n| n.id == id)
    }

    #[cfg(test)]
    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut S {
        &mut self.backend
    }

    /// Create a note at the top of the unpinned notes
    pub fn create(
        &mut self,
        title: impl Into<String>,
        content: impl Into<String>,
        color: Swatch,
    ) -> Result<Note, StoreError> {
        let (title, content) = (title.into(), content.into());
        if Note::is_blank(&title, &content) {
            return Err(StoreError::Validation);
        }

        let mut note = Note::new(title, content, color);
        while self.state.contains_id(&note.id) {
            note.id = generate_id(&note.title);
        }

        let created = self.transact(RecordKind::Active, move |state| {
            let at = pinned_boundary(&state.active);
            state.active.insert(at, note.clone());
            Ok(note)
        })?;
        log::info!("created note {}", created.id);
        Ok(created)
    }

    /// Overwrite title, content and color in place
    pub fn update(
        &mut self,
        id: &str,
        title: impl Into<String>,
        content: impl Into<String>,
        color: Swatch,
    ) -> Result<Note, StoreError> {
        let (title, content) = (title.into(), content.into());
        if Note::is_blank(&title, &content) {
            return Err(StoreError::Validation);
        }

        self.transact(RecordKind::Active, |state| {
            let note = state
                .active
                .iter_mut()
                .find(|n| n.id == id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            note.title = title;
            note.content = content;
            note.color = color.into();
            note.updated_at = now();
            Ok(note.clone())
        })
    }

    /// Move a note to the pinned/unpinned boundary with the requested status.
    /// A note that already has that status stays where it is.
    pub fn set_pinned(&mut self, id: &str, pinned: bool) -> Result<Note, StoreError> {
        self.transact(RecordKind::Active, |state| {
            let idx = position(&state.active, id)?;
            if state.active[idx].pinned == pinned {
                return Ok(state.active[idx].clone());
            }

            let mut note = state.active.remove(idx);
            note.pinned = pinned;
            let at = pinned_boundary(&state.active);
            state.active.insert(at, note.clone());
            Ok(note)
        })
    }

    pub fn toggle_pinned(&mut self, id: &str) -> Result<Note, StoreError> {
        let pinned = self
            .get(id)
            .map(|n| n.pinned)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        self.set_pinned(id, !pinned)
    }

    /// Place `source_id` directly before `target_id`.
    ///
    /// Does nothing (and returns `false`) when either note is missing or the
    /// two sit in different pin groups.
    pub fn reorder(&mut self, source_id: &str, target_id: &str) -> Result<bool, StoreError> {
        if source_id == target_id {
            return Ok(false);
        }
        let (Some(source), Some(target)) = (self.get(source_id), self.get(target_id)) else {
            return Ok(false);
        };
        if source.pinned != target.pinned {
            log::debug!("refusing to reorder {} across pin groups", source_id);
            return Ok(false);
        }

        self.transact(RecordKind::Active, |state| {
            let from = position(&state.active, source_id)?;
            let note = state.active.remove(from);
            let to = position(&state.active, target_id)?;
            state.active.insert(to, note);
            Ok(true)
        })
    }

    pub fn move_to_trash(&mut self, id: &str) -> Result<(), StoreError> {
        self.transact(RecordKind::Trash, |state| {
            let idx = position(&state.active, id)?;
            let mut note = state.active.remove(idx);
            note.deleted_at = Some(now());
            state.trashed.insert(0, note);
            Ok(())
        })?;
        log::info!("moved note {} to trash", id);
        Ok(())
    }

    /// Bring a note back from the trash, keeping its pinned flag
    pub fn restore(&mut self, id: &str) -> Result<Note, StoreError> {
        let restored = self.transact(RecordKind::Active, |state| {
            let idx = position(&state.trashed, id)?;
            let mut note = state.trashed.remove(idx);
            note.deleted_at = None;
            state.active.insert(0, note.clone());
            group_pinned_first(&mut state.active);
            Ok(note)
        })?;
        log::info!("restored note {}", id);
        Ok(restored)
    }

    pub fn purge(&mut self, id: &str) -> Result<(), StoreError> {
        self.transact(RecordKind::Trash, |state| {
            let idx = position(&state.trashed, id)?;
            state.trashed.remove(idx);
            Ok(())
        })?;
        log::info!("purged note {}", id);
        Ok(())
    }

    /// Empty the trash, returning how many notes were destroyed
    pub fn purge_all(&mut self) -> Result<usize, StoreError> {
        let purged = self.transact(RecordKind::Trash, |state| {
            let count = state.trashed.len();
            state.trashed.clear();
            Ok(count)
        })?;
        log::info!("emptied trash ({} notes)", purged);
        Ok(purged)
    }

    /// Apply `op`, then write the records starting with `first`
    fn transact<T>(
        &mut self,
        first: RecordKind,
        op: impl FnOnce(&mut Collections) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let snapshot = self.state.clone();

        let value = match op(&mut self.state) {
            Ok(value) => value,
            Err(e) => {
                self.state = snapshot;
                return Err(e);
            }
        };

        if let Err(e) = self.persist(first) {
            log::error!("failed to persist notes, rolling back: {:#}", e);
            self.state = snapshot;
            // undoing a move gains the note back on the other side
            if let Err(e) = self.persist(first.other()) {
                log::error!("failed to rewrite previous notes: {:#}", e);
            }
            return Err(StoreError::Persistence(e));
        }

        Ok(value)
    }

    fn persist(&mut self, first: RecordKind) -> anyhow::Result<()> {
        for kind in [first, first.other()] {
            let notes = match kind {
                RecordKind::Active => &self.state.active,
                RecordKind::Trash => &self.state.trashed,
            };
            let raw = encode_notes(notes)?;
            self.backend.set(kind.key(), &raw)?;
        }
        Ok(())
    }
}

fn read_record<S: KeyValueStore>(backend: &S, kind: RecordKind) -> Option<String> {
    match backend.get(kind.key()) {
        Ok(raw) => raw,
        Err(e) => {
            log::warn!("could not read record {}, starting empty: {:#}", kind.key(), e);
            None
        }
    }
}

fn position(notes: &[Note], id: &str) -> Result<usize, StoreError> {
    notes
        .iter()
        .position(|n| n.id == id)
        .ok_or_else(|| StoreError::NotFound(id.to_string()))
}

/// Index of the first unpinned note
fn pinned_boundary(notes: &[Note]) -> usize {
    notes.iter().position(|n| !n.pinned).unwrap_or(notes.len())
}

/// Stable partition: pinned notes first, each group keeps its order
fn group_pinned_first(notes: &mut Vec<Note>) {
    let (pinned, unpinned): (Vec<Note>, Vec<Note>) = notes.drain(..).partition(|n| n.pinned);
    notes.extend(pinned);
    notes.extend(unpinned);
}

fn drop_duplicate_ids(state: &mut Collections) {
    let mut seen = HashSet::new();
    let before = state.active.len() + state.trashed.len();
    state.active.retain(|n| seen.insert(n.id.clone()));
    state.trashed.retain(|n| seen.insert(n.id.clone()));
    let dropped = before - state.active.len() - state.trashed.len();
    if dropped > 0 {
        log::warn!("dropped {} notes with duplicate ids", dropped);
    }
}
