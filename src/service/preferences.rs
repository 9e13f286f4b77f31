use crate::storage::kv::KeyValueStore;
use crate::storage::records::THEME_KEY;
use anyhow::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    pub fn toggled(self) -> Theme {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

/// Stored theme, `Dark` when absent or unreadable
pub fn load_theme(kv: &impl KeyValueStore) -> Theme {
    match kv.get(THEME_KEY) {
        Ok(Some(raw)) if raw.trim() == "light" => Theme::Light,
        Ok(_) => Theme::Dark,
        Err(e) => {
            log::warn!("could not read theme preference: {:#}", e);
            Theme::Dark
        }
    }
}

pub fn save_theme(kv: &mut impl KeyValueStore, theme: Theme) -> Result<()> {
    kv.set(THEME_KEY, theme.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::kv::MemoryKvStore;

    #[test]
    fn theme_defaults_to_dark() {
        let mut kv = MemoryKvStore::new();
        assert_eq!(load_theme(&kv), Theme::Dark);
        kv.set(THEME_KEY, "sepia").unwrap();
        assert_eq!(load_theme(&kv), Theme::Dark);
    }

    #[test]
    fn theme_round_trips() {
        let mut kv = MemoryKvStore::new();
        save_theme(&mut kv, Theme::Dark.toggled()).unwrap();
        assert_eq!(load_theme(&kv), Theme::Light);
        save_theme(&mut kv, Theme::Light.toggled()).unwrap();
        assert_eq!(load_theme(&kv), Theme::Dark);
    }
}
