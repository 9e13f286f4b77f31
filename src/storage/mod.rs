pub mod kv;
pub mod note;
pub mod records;
