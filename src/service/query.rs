use crate::storage::note::{Note, Swatch};

/// Color restriction offered in the filter menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorFilter {
    #[default]
    All,
    Only(Swatch),
}

impl ColorFilter {
    /// Menu entries in display order
    pub fn options() -> Vec<ColorFilter> {
        std::iter::once(ColorFilter::All)
            .chain(Swatch::ALL.into_iter().map(ColorFilter::Only))
            .collect()
    }

    pub fn label(self) -> &'static str {
        match self {
            ColorFilter::All => "All",
            ColorFilter::Only(swatch) => swatch.label(),
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            ColorFilter::All => "⭐",
            ColorFilter::Only(swatch) => swatch.emoji(),
        }
    }

    /// Matches on the stored color name, so a note whose color is not in the
    /// palette only shows up under `All`.
    pub fn matches(self, note: &Note) -> bool {
        match self {
            ColorFilter::All => true,
            ColorFilter::Only(swatch) => note.color.as_str() == swatch.as_str(),
        }
    }
}

/// Notes to display for a color filter and a free-text query.
///
/// The query is matched case-insensitively against title and content.
/// Pinned matches come first; otherwise the order of `notes` is kept.
pub fn visible_notes<'a>(notes: &'a [Note], filter: ColorFilter, query: &str) -> Vec<&'a Note> {
    let query_lower = query.trim().to_lowercase();

    let matching = notes.iter().filter(|note| filter.matches(note)).filter(|note| {
        query_lower.is_empty()
            || format!("{} {}", note.title, note.content)
                .to_lowercase()
                .contains(&query_lower)
    });

    let (pinned, unpinned): (Vec<&Note>, Vec<&Note>) = matching.partition(|n| n.pinned);
    pinned.into_iter().chain(unpinned).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(title: &str, content: &str, color: Swatch, pinned: bool) -> Note {
        let mut note = Note::new(title.into(), content.into(), color);
        note.pinned = pinned;
        note
    }

    fn titles(notes: Vec<&Note>) -> Vec<&str> {
        notes.into_iter().map(|n| n.title.as_str()).collect()
    }

    #[test]
    fn empty_query_and_all_filter_keep_everything() {
        let notes = vec![
            note("a", "", Swatch::Yellow, true),
            note("b", "", Swatch::Pink, false),
        ];
        assert_eq!(titles(visible_notes(&notes, ColorFilter::All, "  ")), vec!["a", "b"]);
    }

    #[test]
    fn query_is_case_insensitive_across_title_and_content() {
        let notes = vec![
            note("Groceries", "Buy MILK", Swatch::Yellow, false),
            note("Work", "standup at 10", Swatch::Blue, false),
            note("Milkshake", "", Swatch::Pink, false),
        ];
        assert_eq!(
            titles(visible_notes(&notes, ColorFilter::All, "milk")),
            vec!["Groceries", "Milkshake"]
        );
        assert_eq!(titles(visible_notes(&notes, ColorFilter::All, "work standup")), vec!["Work"]);
    }

    #[test]
    fn color_filter_restricts_to_stored_color() {
        let mut odd = note("odd", "", Swatch::Yellow, false);
        odd.color = serde_json::from_str(r#""magenta""#).unwrap();
        let notes = vec![
            note("y", "", Swatch::Yellow, false),
            note("p", "", Swatch::Pink, false),
            odd,
        ];

        assert_eq!(
            titles(visible_notes(&notes, ColorFilter::Only(Swatch::Yellow), "")),
            vec!["y"]
        );
        assert_eq!(titles(visible_notes(&notes, ColorFilter::All, "")).len(), 3);
    }

    #[test]
    fn pinned_matches_lead() {
        let notes = vec![
            note("plain milk", "", Swatch::Yellow, false),
            note("pinned milk", "", Swatch::Yellow, true),
            note("other", "", Swatch::Yellow, true),
        ];
        assert_eq!(
            titles(visible_notes(&notes, ColorFilter::All, "milk")),
            vec!["pinned milk", "plain milk"]
        );
    }

    #[test]
    fn menu_lists_all_then_palette() {
        let options = ColorFilter::options();
        assert_eq!(options.len(), 9);
        assert_eq!(options[0], ColorFilter::All);
        assert_eq!(options[1].label(), "Yellow");
        assert_eq!(options[8].emoji(), "🟣");
    }
}
