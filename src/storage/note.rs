use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static ID_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// The fixed note palette. The first entry is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Swatch {
    #[default]
    Yellow,
    Pink,
    Green,
    Blue,
    Orange,
    Red,
    Teal,
    Purple,
}

impl Swatch {
    pub const ALL: [Swatch; 8] = [
        Swatch::Yellow,
        Swatch::Pink,
        Swatch::Green,
        Swatch::Blue,
        Swatch::Orange,
        Swatch::Red,
        Swatch::Teal,
        Swatch::Purple,
    ];

    /// Name used in the persisted records
    pub fn as_str(self) -> &'static str {
        match self {
            Swatch::Yellow => "yellow",
            Swatch::Pink => "pink",
            Swatch::Green => "green",
            Swatch::Blue => "blue",
            Swatch::Orange => "orange",
            Swatch::Red => "red",
            Swatch::Teal => "teal",
            Swatch::Purple => "purple",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Swatch::Yellow => "Yellow",
            Swatch::Pink => "Pink",
            Swatch::Green => "Green",
            Swatch::Blue => "Blue",
            Swatch::Orange => "Orange",
            Swatch::Red => "Red",
            Swatch::Teal => "Teal",
            Swatch::Purple => "Purple",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Swatch::Yellow => "🟡",
            Swatch::Pink => "💗",
            Swatch::Green => "🟢",
            Swatch::Blue => "🔵",
            Swatch::Orange => "🟠",
            Swatch::Red => "❤️",
            Swatch::Teal => "💧",
            Swatch::Purple => "🟣",
        }
    }

    pub fn parse(name: &str) -> Option<Swatch> {
        Swatch::ALL.into_iter().find(|s| s.as_str() == name)
    }

    /// Next palette entry, wrapping around
    pub fn next(self) -> Swatch {
        let idx = Swatch::ALL.iter().position(|s| *s == self).unwrap_or(0);
        Swatch::ALL[(idx + 1) % Swatch::ALL.len()]
    }

    pub fn prev(self) -> Swatch {
        let idx = Swatch::ALL.iter().position(|s| *s == self).unwrap_or(0);
        Swatch::ALL[(idx + Swatch::ALL.len() - 1) % Swatch::ALL.len()]
    }
}

/// Color as stored on a note.
///
/// Records written by other versions may carry a name outside the palette.
/// That name is kept as-is so it survives a load/save cycle; only
/// [`ColorTag::swatch`] maps it onto the default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorTag(String);

impl ColorTag {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn swatch(&self) -> Swatch {
        Swatch::parse(&self.0).unwrap_or_default()
    }

    #[cfg(test)]
    pub fn is_known(&self) -> bool {
        Swatch::parse(&self.0).is_some()
    }
}

impl From<Swatch> for ColorTag {
    fn from(swatch: Swatch) -> Self {
        ColorTag(swatch.as_str().to_string())
    }
}

impl Default for ColorTag {
    fn default() -> Self {
        Swatch::default().into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
    pub color: ColorTag,
    #[serde(default)]
    pub pinned: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Note {
    /// Create a new unpinned note with a freshly generated id
    pub fn new(title: String, content: String, color: Swatch) -> Self {
        let id = generate_id(&title);

        Note {
            id,
            title,
            content,
            color: color.into(),
            pinned: false,
            updated_at: now(),
            deleted_at: None,
        }
    }

    /// Title to show when the note has none
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            "Untitled"
        } else {
            &self.title
        }
    }

    pub fn is_blank(title: &str, content: &str) -> bool {
        title.trim().is_empty() && content.trim().is_empty()
    }
}

/// Hex MD5 of the title, a nanosecond timestamp and a process-wide sequence
/// number, so two notes created in the same instant still differ.
pub fn generate_id(title: &str) -> String {
    let seq = ID_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!(
        "{:x}",
        md5::compute(format!(
            "{}{}{}",
            title,
            Utc::now().timestamp_nanos_opt().unwrap_or(0),
            seq
        ))
    )
}

/// Current time at the millisecond precision the records are stored with
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_note_defaults() {
        let note = Note::new("Milk".into(), "Buy milk".into(), Swatch::default());
        assert_eq!(note.color.as_str(), "yellow");
        assert!(!note.pinned);
        assert!(note.deleted_at.is_none());
        assert_eq!(note.id.len(), 32);
    }

    #[test]
    fn ids_differ_for_identical_titles() {
        let a = Note::new("same".into(), String::new(), Swatch::Pink);
        let b = Note::new("same".into(), String::new(), Swatch::Pink);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn unknown_color_falls_back_only_when_resolved() {
        let note: Note = serde_json::from_str(
            r#"{"id":"1","title":"t","content":"","color":"magenta","updatedAt":1700000000000}"#,
        )
        .unwrap();
        assert_eq!(note.color.as_str(), "magenta");
        assert!(!note.color.is_known());
        assert_eq!(note.color.swatch(), Swatch::Yellow);

        let json = serde_json::to_string(&note).unwrap();
        assert!(json.contains(r#""color":"magenta""#));
    }

    #[test]
    fn pinned_defaults_to_false_and_deleted_at_is_omitted() {
        let note: Note = serde_json::from_str(
            r#"{"id":"1","title":"t","content":"c","color":"teal","updatedAt":1700000000000}"#,
        )
        .unwrap();
        assert!(!note.pinned);
        assert_eq!(note.updated_at.timestamp_millis(), 1_700_000_000_000);

        let json = serde_json::to_string(&note).unwrap();
        assert!(!json.contains("deletedAt"));
        assert!(json.contains(r#""updatedAt":1700000000000"#));
    }

    #[test]
    fn palette_cycles() {
        assert_eq!(Swatch::Purple.next(), Swatch::Yellow);
        assert_eq!(Swatch::Yellow.prev(), Swatch::Purple);
        assert_eq!(Swatch::Green.next().prev(), Swatch::Green);
    }

    #[test]
    fn display_title_falls_back() {
        let note = Note::new("  ".into(), "body".into(), Swatch::Blue);
        assert_eq!(note.display_title(), "Untitled");
    }
}
