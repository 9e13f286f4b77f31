pub mod errors;
pub mod note_store;
pub mod preferences;
pub mod query;

pub use errors::StoreError;
pub use note_store::NoteStore;
